// Controller contracts
//
// Each controller is the sole writer of its backing store. The router and the
// catalog only call these traits and never lock shared state themselves.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::ControllerError;
use crate::models::{
    AgentRecord, ChatBotRecord, IntegrationRecord, JobHistoryRecord, JobRecord, KnowledgeBaseRecord, ModelRecord,
    ProjectRecord, SkillRecord, TabularResult, TriggerRecord, ViewRecord,
};
use crate::services::handlers::{DataHandler, HandlerRegistry, MlHandler};
use crate::sql::{Identifier, JsonMap, Statement};

pub type ControllerResult<T> = Result<T, ControllerError>;

#[async_trait]
pub trait ProjectController: Send + Sync {
    async fn list(&self) -> ControllerResult<Vec<ProjectRecord>>;

    /// Case-insensitive lookup
    async fn get(&self, name: &str) -> ControllerResult<Option<ProjectRecord>>;

    async fn add(&self, name: &str) -> ControllerResult<ProjectRecord>;

    async fn delete(&self, name: &str) -> ControllerResult<()>;
}

#[async_trait]
pub trait ViewController: Send + Sync {
    async fn list(&self, project: &str) -> ControllerResult<Vec<ViewRecord>>;

    async fn get(&self, project: &str, name: &str) -> ControllerResult<Option<ViewRecord>>;

    async fn add(&self, project: &str, name: &str, query: &str) -> ControllerResult<ViewRecord>;

    async fn delete(&self, project: &str, name: &str) -> ControllerResult<()>;
}

#[async_trait]
pub trait IntegrationController: Send + Sync {
    /// Every integration, data and ML, including `files`
    async fn list(&self) -> ControllerResult<Vec<IntegrationRecord>>;

    async fn get(&self, name: &str) -> ControllerResult<Option<IntegrationRecord>>;

    async fn add(&self, name: &str, engine: &str, connection_data: JsonMap) -> ControllerResult<IntegrationRecord>;

    async fn delete(&self, name: &str) -> ControllerResult<()>;

    /// Handler instance serving a data integration
    async fn data_handler(&self, name: &str) -> ControllerResult<Arc<dyn DataHandler>>;

    /// Handler instance serving an ML engine integration
    async fn ml_handler(&self, name: &str) -> ControllerResult<Arc<dyn MlHandler>>;

    /// Import-status cache of known handler modules
    fn handlers(&self) -> &HandlerRegistry;
}

/// Everything needed to train one model version
#[derive(Debug, Clone, Default)]
pub struct TrainingRequest {
    pub project: String,
    pub name: String,
    /// ML engine integration
    pub engine_name: Option<String>,
    pub data_integration: Option<String>,
    pub query: Option<String>,
    pub targets: Vec<String>,
    pub label: Option<String>,
    /// New version becomes active once trained; retrain accepts `active = 0`
    pub activate: bool,
    pub training_options: JsonMap,
    /// Rows the query produced, already fetched by the caller
    pub training_data: Option<TabularResult>,
}

#[async_trait]
pub trait ModelController: Send + Sync {
    /// Active version when `version` is `None`
    async fn get_model(&self, project: &str, name: &str, version: Option<u32>) -> ControllerResult<Option<ModelRecord>>;

    /// Models of one project or of all projects
    async fn list_models(&self, project: Option<&str>, active_only: bool) -> ControllerResult<Vec<ModelRecord>>;

    async fn create_model(&self, request: TrainingRequest) -> ControllerResult<ModelRecord>;

    /// Train a new version reusing the previous version's settings where the
    /// request leaves them empty
    async fn retrain_model(&self, request: TrainingRequest) -> ControllerResult<ModelRecord>;

    async fn finetune_model(&self, request: TrainingRequest) -> ControllerResult<ModelRecord>;

    /// Describe output; `attribute` selects one section
    async fn describe_model(&self, project: &str, name: &str, attribute: Option<&str>) -> ControllerResult<TabularResult>;

    /// Remove a model with all of its versions
    async fn delete_model(&self, project: &str, name: &str) -> ControllerResult<()>;

    /// Apply column changes to one version; `active = true` activates it
    async fn update_model_version(&self, project: &str, name: &str, version: u32, changes: &JsonMap) -> ControllerResult<()>;

    async fn delete_model_version(&self, project: &str, name: &str, version: u32) -> ControllerResult<()>;
}

/// Parameters of CREATE JOB after resolution
#[derive(Debug, Clone)]
pub struct NewJob {
    pub project: String,
    pub name: String,
    pub query: String,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub schedule_str: Option<String>,
}

/// Executes one job's query text on behalf of the scheduler
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run_job(&self, job: &JobRecord) -> Result<(), String>;
}

#[async_trait]
pub trait JobsController: Send + Sync {
    async fn list(&self, project: Option<&str>) -> ControllerResult<Vec<JobRecord>>;

    async fn get(&self, project: &str, name: &str) -> ControllerResult<Option<JobRecord>>;

    async fn add(&self, job: NewJob) -> ControllerResult<JobRecord>;

    async fn delete(&self, project: &str, name: &str) -> ControllerResult<()>;

    async fn history(&self, project: Option<&str>) -> ControllerResult<Vec<JobHistoryRecord>>;

    /// Run every active job due at `now`; returns how many ran
    async fn run_pending(&self, now: DateTime<Utc>, runner: &dyn JobRunner) -> ControllerResult<usize>;
}

/// Record kept by a [`EntityController`]
pub trait NamedEntity: Clone + Send + Sync + 'static {
    /// Label used in user-facing messages, e.g. `Agent`
    const KIND: &'static str;

    fn name(&self) -> &str;

    fn project(&self) -> &str;

    /// Merge updated parameters into the record
    fn apply_params(&mut self, params: &JsonMap);
}

/// Project-scoped store of named records: triggers, chatbots, skills, agents
#[async_trait]
pub trait EntityController<R: NamedEntity>: Send + Sync {
    async fn list(&self, project: Option<&str>) -> ControllerResult<Vec<R>>;

    async fn get(&self, project: &str, name: &str) -> ControllerResult<Option<R>>;

    async fn add(&self, record: R) -> ControllerResult<R>;

    async fn update(&self, project: &str, name: &str, params: &JsonMap) -> ControllerResult<R>;

    async fn delete(&self, project: &str, name: &str) -> ControllerResult<()>;
}

impl NamedEntity for TriggerRecord {
    const KIND: &'static str = "Trigger";

    fn name(&self) -> &str {
        &self.name
    }

    fn project(&self) -> &str {
        &self.project
    }

    fn apply_params(&mut self, params: &JsonMap) {
        if let Some(query) = params.get("query").and_then(|v| v.as_str()) {
            self.query = query.to_string();
        }
    }
}

impl NamedEntity for ChatBotRecord {
    const KIND: &'static str = "Chatbot";

    fn name(&self) -> &str {
        &self.name
    }

    fn project(&self) -> &str {
        &self.project
    }

    fn apply_params(&mut self, params: &JsonMap) {
        for (key, value) in params {
            match key.as_str() {
                "model" | "model_name" => {
                    if let Some(model) = value.as_str() {
                        self.model_name = model.to_string();
                    }
                }
                "database" => {
                    if let Some(database) = value.as_str() {
                        self.database = database.to_string();
                    }
                }
                "is_running" => {
                    if let Some(running) = value.as_bool() {
                        self.is_running = running;
                    }
                }
                _ => {
                    self.params.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

impl NamedEntity for SkillRecord {
    const KIND: &'static str = "Skill";

    fn name(&self) -> &str {
        &self.name
    }

    fn project(&self) -> &str {
        &self.project
    }

    fn apply_params(&mut self, params: &JsonMap) {
        for (key, value) in params {
            if key == "type" {
                if let Some(skill_type) = value.as_str() {
                    self.skill_type = skill_type.to_string();
                }
            } else {
                self.params.insert(key.clone(), value.clone());
            }
        }
    }
}

impl NamedEntity for AgentRecord {
    const KIND: &'static str = "Agent";

    fn name(&self) -> &str {
        &self.name
    }

    fn project(&self) -> &str {
        &self.project
    }

    fn apply_params(&mut self, params: &JsonMap) {
        for (key, value) in params {
            match key.as_str() {
                "model" | "model_name" => {
                    if let Some(model) = value.as_str() {
                        self.model_name = model.to_string();
                    }
                }
                "skills" => {
                    if let Some(skills) = value.as_array() {
                        self.skills = skills.iter().filter_map(|s| s.as_str().map(str::to_string)).collect();
                    }
                }
                _ => {
                    self.params.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

#[async_trait]
pub trait KnowledgeBaseController: Send + Sync {
    async fn list(&self, project_id: &str) -> ControllerResult<Vec<KnowledgeBaseRecord>>;

    async fn get(&self, project_id: &str, name: &str) -> ControllerResult<Option<KnowledgeBaseRecord>>;

    async fn add(&self, record: KnowledgeBaseRecord, if_not_exists: bool) -> ControllerResult<KnowledgeBaseRecord>;

    async fn delete(&self, project_id: &str, name: &str, if_exists: bool) -> ControllerResult<()>;

    /// Whether `table` (optionally project-qualified) names a knowledge base
    async fn is_knowledge_base(&self, table: &Identifier, default_project_id: &str) -> ControllerResult<bool>;

    /// Run a SELECT/INSERT/UPDATE/DELETE addressed to a knowledge base
    async fn execute_query(&self, statement: &Statement, default_project_id: &str) -> ControllerResult<TabularResult>;
}

/// Message of a missing project-scoped entity
pub fn not_found<R: NamedEntity>(project: &str, name: &str) -> ControllerError {
    ControllerError::NotFound(format!("{} '{}' does not exist in project '{}'", R::KIND, name, project))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chatbot_update_merges_params() {
        let mut bot = ChatBotRecord {
            name: "bot".to_string(),
            project: "proj".to_string(),
            database: "slack".to_string(),
            model_name: "gpt".to_string(),
            params: JsonMap::new(),
            is_running: true,
            last_error: None,
        };
        let params = json!({"model": "other", "prompt": "hi", "is_running": false});
        bot.apply_params(params.as_object().unwrap());
        assert_eq!(bot.model_name, "other");
        assert!(!bot.is_running);
        assert_eq!(bot.params["prompt"], json!("hi"));
    }

    #[test]
    fn test_not_found_names_the_entity() {
        let err = not_found::<AgentRecord>("proj", "a1");
        assert_eq!(err.to_string(), "Agent 'a1' does not exist in project 'proj'");
    }
}
