// Session state and collaborator wiring
//
// `ControllerSet` is the explicitly owned bundle of controllers shared by all
// sessions. `SessionController` is the per-connection state the router
// mutates through USE and SET.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::catalog::InformationSchemaDataNode;
use crate::config::ExecutorConfig;
use crate::models::charset;
use crate::models::{AgentRecord, ChatBotRecord, SkillRecord, TriggerRecord};
use crate::services::controllers::{
    EntityController, IntegrationController, JobsController, KnowledgeBaseController, ModelController,
    ProjectController, ViewController,
};
use crate::services::datafusion::TabularEvaluator;
use crate::services::engine::QueryEngine;
use crate::services::metrics::AccuracyEvaluator;
use crate::services::query_context::QueryContextController;

/// Process-wide collaborators, injected into every session
pub struct ControllerSet {
    pub config: ExecutorConfig,
    pub projects: Arc<dyn ProjectController>,
    pub views: Arc<dyn ViewController>,
    pub integrations: Arc<dyn IntegrationController>,
    pub models: Arc<dyn ModelController>,
    pub jobs: Arc<dyn JobsController>,
    pub triggers: Arc<dyn EntityController<TriggerRecord>>,
    pub chatbots: Arc<dyn EntityController<ChatBotRecord>>,
    pub skills: Arc<dyn EntityController<SkillRecord>>,
    pub agents: Arc<dyn EntityController<AgentRecord>>,
    pub knowledge_bases: Arc<dyn KnowledgeBaseController>,
    pub engine: Arc<dyn QueryEngine>,
    pub evaluator: Arc<TabularEvaluator>,
    pub metrics: AccuracyEvaluator,
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// One client connection
pub struct SessionController {
    /// Default database (project or integration name)
    pub database: String,
    pub username: String,
    /// 0 for metered users; the training admission guard only applies to them
    pub user_class: u8,
    pub profiling: bool,
    pub predictor_cache: bool,
    pub charset: String,
    /// Collation id reported for text columns
    pub charset_text_type: u16,
    pub connection_id: u64,
    pub contexts: Arc<QueryContextController>,
    pub controllers: Arc<ControllerSet>,
}

impl SessionController {
    pub fn new(controllers: Arc<ControllerSet>) -> Self {
        Self {
            database: controllers.config.default_project.clone(),
            username: "mindsdb".to_string(),
            user_class: 0,
            profiling: false,
            predictor_cache: true,
            charset: "utf8".to_string(),
            charset_text_type: charset::UTF8_GENERAL_CI,
            connection_id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            contexts: QueryContextController::new(),
            controllers,
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.controllers.config
    }

    /// Root of name resolution: the virtual catalog and everything below it
    pub fn datahub(&self) -> InformationSchemaDataNode {
        InformationSchemaDataNode::new(Arc::clone(&self.controllers))
    }
}
