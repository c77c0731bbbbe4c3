// In-memory controllers
//
// Reference implementations of every controller contract, backed by
// `tokio::sync::RwLock` stores. `InMemoryControllers` wires them into a
// `ControllerSet` with the default handler registry.

pub mod entities;
pub mod handlers;
pub mod integrations;
pub mod jobs;
pub mod models;
pub mod projects;

pub use entities::{InMemoryEntityController, InMemoryKnowledgeBaseController};
pub use handlers::{DummyMlHandler, MemoryDataHandler};
pub use integrations::InMemoryIntegrationController;
pub use jobs::{parse_schedule, InMemoryJobsController};
pub use models::InMemoryModelController;
pub use projects::{InMemoryProjectController, InMemoryViewController};

use serde_json::json;
use std::sync::Arc;

use crate::catalog::FILES_DATABASE;
use crate::config::Config;
use crate::error::SqlResult;
use crate::models::{
    AgentRecord, ArgType, ChatBotRecord, ConnectionArg, HandlerMeta, IntegrationKind, IntegrationRecord, SkillRecord,
    TabularResult, TriggerRecord,
};
use crate::services::controllers::ProjectController;
use crate::services::datafusion::TabularEvaluator;
use crate::services::engine::DataHubQueryEngine;
use crate::services::handlers::{DataHandler, HandlerModule, HandlerRegistry, HandlerResult, MlHandler};
use crate::services::metrics::AccuracyEvaluator;
use crate::services::session::ControllerSet;
use crate::sql::{Expr, JsonMap, Select, SelectItem};

/// Hidden column used to address rows of an in-memory table
const ROW_ID: &str = "__row_id";

/// Positions of the rows of `data` that satisfy `filter`
pub(crate) async fn matching_rows(
    evaluator: &TabularEvaluator,
    data: &TabularResult,
    filter: Option<&Expr>,
) -> SqlResult<Vec<usize>> {
    let Some(filter) = filter else {
        return Ok((0..data.row_count()).collect());
    };

    let mut indexed = data.clone();
    indexed.columns.push(ROW_ID.to_string());
    for (idx, row) in indexed.rows.iter_mut().enumerate() {
        row.push(json!(idx));
    }

    let select = Select::new(vec![SelectItem::new(Expr::ident(ROW_ID))]).with_where(Some(filter.clone()));
    let out = evaluator.query_df(&indexed, &select).await?;
    Ok(out
        .rows
        .iter()
        .filter_map(|row| row.first().and_then(|v| v.as_u64()).map(|v| v as usize))
        .collect())
}

/// Handler modules available out of the box
pub fn default_handlers(evaluator: &Arc<TabularEvaluator>) -> HandlerRegistry {
    let files_evaluator = Arc::clone(evaluator);
    let memory_evaluator = Arc::clone(evaluator);

    let mut files = HandlerMeta::new("files", IntegrationKind::Data);
    files.title = "Files".to_string();
    files.description = "Uploaded files".to_string();

    let mut memory = HandlerMeta::new("memory", IntegrationKind::Data)
        .with_arg("database", ConnectionArg::new(ArgType::Str, "Name of the in-memory database", false));
    memory.title = "Memory".to_string();
    memory.description = "Tables kept in process memory".to_string();

    let mut lightwood = HandlerMeta::new("lightwood", IntegrationKind::Ml);
    lightwood.title = "Lightwood".to_string();

    let mut openai = HandlerMeta::new("openai", IntegrationKind::Ml);
    openai.title = "OpenAI".to_string();

    HandlerRegistry::new()
        .with_module(HandlerModule::data(
            files,
            Arc::new(move |name: &str, _args: &JsonMap| -> HandlerResult<Arc<dyn DataHandler>> {
                Ok(Arc::new(MemoryDataHandler::new(name, Arc::clone(&files_evaluator))))
            }),
        ))
        .with_module(HandlerModule::data(
            memory,
            Arc::new(move |name: &str, _args: &JsonMap| -> HandlerResult<Arc<dyn DataHandler>> {
                Ok(Arc::new(MemoryDataHandler::new(name, Arc::clone(&memory_evaluator))))
            }),
        ))
        .with_module(HandlerModule::ml(
            lightwood,
            Arc::new(|name: &str, _params: &JsonMap| -> HandlerResult<Arc<dyn MlHandler>> {
                Ok(Arc::new(DummyMlHandler::new(name)))
            }),
        ))
        .with_module(HandlerModule::ml(
            openai,
            Arc::new(|name: &str, _params: &JsonMap| -> HandlerResult<Arc<dyn MlHandler>> {
                Ok(Arc::new(DummyMlHandler::new(name).requiring("openai_api_key")))
            }),
        ))
}

/// Builder of a fully in-memory [`ControllerSet`]
pub struct InMemoryControllers {
    config: Config,
    extra_modules: Vec<HandlerModule>,
}

impl InMemoryControllers {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            extra_modules: Vec::new(),
        }
    }

    /// Register an additional handler module next to the defaults
    pub fn with_handler(mut self, module: HandlerModule) -> Self {
        self.extra_modules.push(module);
        self
    }

    pub fn build(self) -> Arc<ControllerSet> {
        let Config {
            executor, evaluator, ..
        } = self.config;
        let evaluator = Arc::new(TabularEvaluator::new(&evaluator));

        let registry = self
            .extra_modules
            .into_iter()
            .fold(default_handlers(&evaluator), |registry, module| registry.with_module(module));

        let seed = vec![
            IntegrationRecord::new(FILES_DATABASE, "files", IntegrationKind::Data, JsonMap::new()),
            IntegrationRecord::new(
                executor.default_ml_engine.clone(),
                executor.default_ml_engine.clone(),
                IntegrationKind::Ml,
                JsonMap::new(),
            ),
        ];
        let integrations = Arc::new(InMemoryIntegrationController::new(registry, seed));
        let projects: Arc<dyn ProjectController> = Arc::new(InMemoryProjectController::new(&executor.default_project));

        Arc::new(ControllerSet {
            projects: Arc::clone(&projects),
            views: Arc::new(InMemoryViewController::default()),
            models: Arc::new(InMemoryModelController::new(integrations.clone())),
            integrations,
            jobs: Arc::new(InMemoryJobsController::default()),
            triggers: Arc::new(InMemoryEntityController::<TriggerRecord>::default()),
            chatbots: Arc::new(InMemoryEntityController::<ChatBotRecord>::default()),
            skills: Arc::new(InMemoryEntityController::<SkillRecord>::default()),
            agents: Arc::new(InMemoryEntityController::<AgentRecord>::default()),
            knowledge_bases: Arc::new(InMemoryKnowledgeBaseController::new(projects, Arc::clone(&evaluator))),
            engine: Arc::new(DataHubQueryEngine::new()),
            evaluator,
            metrics: AccuracyEvaluator,
            config: executor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluatorConfig;

    #[tokio::test]
    async fn test_matching_rows() {
        let evaluator = TabularEvaluator::new(&EvaluatorConfig::default());
        let data = TabularResult::new(
            vec!["name".into()],
            vec![vec![json!("a")], vec![json!("b")], vec![json!("a")]],
        );
        let filter = Expr::eq(Expr::ident("name"), Expr::string("a"));
        assert_eq!(matching_rows(&evaluator, &data, Some(&filter)).await.unwrap(), vec![0, 2]);
        assert_eq!(matching_rows(&evaluator, &data, None).await.unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_default_registry() {
        let evaluator = Arc::new(TabularEvaluator::new(&EvaluatorConfig::default()));
        let registry = default_handlers(&evaluator);
        assert_eq!(registry.kind_of("FILES"), Some(IntegrationKind::Data));
        assert_eq!(registry.kind_of("lightwood"), Some(IntegrationKind::Ml));
        assert!(registry.kind_of("nope").is_none());
    }
}
