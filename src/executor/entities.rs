// Jobs, triggers, chatbots, skills, agents and knowledge bases
//
// Each command resolves a (project, name) pair, checks the entities it
// refers to and hands the record to the owning controller.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, info};

use super::ExecuteCommands;
use crate::error::{ControllerError, SqlApiError, SqlResult};
use crate::models::{AgentRecord, ChatBotRecord, ExecuteAnswer, JobRecord, KnowledgeBaseRecord, SkillRecord, TriggerRecord};
use crate::services::controllers::{JobRunner, NewJob};
use crate::services::engine::ExecutionOptions;
use crate::services::session::{ControllerSet, SessionController};
use crate::sql::{
    parse_query, CreateAgent, CreateChatBot, CreateJob, CreateKnowledgeBase, CreateSkill, CreateTrigger, DropAgent,
    DropChatBot, DropJob, DropKnowledgeBase, DropSkill, DropTrigger, UpdateAgent, UpdateChatBot, UpdateSkill,
};

/// Vector store table used when a knowledge base names no storage
const DEFAULT_KB_TABLE: &str = "default_collection";

/// Parse a job boundary: `now`, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`
fn parse_job_date(value: &str) -> SqlResult<DateTime<Utc>> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("now") {
        return Ok(Utc::now());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| SqlApiError::SqlApi(format!("Wrong date format: {}", value)))
}

/// `EVERY 2 hours` and `2 hours` both become `every 2 hours`
fn schedule_text(repeat: &str) -> String {
    let repeat = repeat.trim();
    if repeat.to_lowercase().starts_with("every") {
        repeat.to_string()
    } else {
        format!("every {}", repeat)
    }
}

/// Skill names from an agent's `skills` parameter
fn skill_names(value: Option<JsonValue>) -> Vec<String> {
    match value {
        Some(JsonValue::Array(items)) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(JsonValue::String(list)) => list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

impl ExecuteCommands<'_> {
    pub(super) async fn answer_create_job(&mut self, statement: &CreateJob) -> SqlResult<ExecuteAnswer> {
        let (project, name) = self.scoped_name(&statement.name);
        self.require_project(&project).await?;

        let job = NewJob {
            project,
            name,
            query: statement.query_str.clone(),
            start_at: statement.start_str.as_deref().map(parse_job_date).transpose()?,
            end_at: statement.end_str.as_deref().map(parse_job_date).transpose()?,
            schedule_str: statement.repeat_str.as_deref().map(schedule_text),
        };
        let job = self.session.controllers.jobs.add(job).await?;
        info!(project = %job.project, job = %job.name, schedule = ?job.schedule_str, "Job scheduled");
        Ok(ExecuteAnswer::ok())
    }

    pub(super) async fn answer_drop_job(&mut self, statement: &DropJob) -> SqlResult<ExecuteAnswer> {
        let (project, name) = self.scoped_name(&statement.name);
        match self.session.controllers.jobs.delete(&project, &name).await {
            Ok(()) => Ok(ExecuteAnswer::ok()),
            Err(ControllerError::NotFound(_)) if statement.if_exists => Ok(ExecuteAnswer::ok()),
            Err(e) => Err(e.into()),
        }
    }

    pub(super) async fn answer_create_trigger(&mut self, statement: &CreateTrigger) -> SqlResult<ExecuteAnswer> {
        let (project, name) = self.scoped_name(&statement.name);
        self.require_project(&project).await?;

        if statement.table.len() < 2 {
            return Err(SqlApiError::SqlApi(format!(
                "Database or table not found: {}",
                statement.table
            )));
        }
        let database = statement.table.first();
        if self.session.datahub().resolve(database).await?.is_none() {
            return Err(SqlApiError::SqlApi(format!("Database does not exists: {}", database)));
        }

        let trigger = TriggerRecord {
            name,
            project,
            database: database.to_string(),
            table: statement.table.last().to_string(),
            query: statement.query_str.clone(),
            columns: statement.columns.iter().map(|c| c.last().to_string()).collect(),
            last_error: None,
        };
        self.session.controllers.triggers.add(trigger).await?;
        Ok(ExecuteAnswer::ok())
    }

    pub(super) async fn answer_drop_trigger(&mut self, statement: &DropTrigger) -> SqlResult<ExecuteAnswer> {
        let (project, name) = self.scoped_name(&statement.name);
        self.session.controllers.triggers.delete(&project, &name).await?;
        Ok(ExecuteAnswer::ok())
    }

    pub(super) async fn answer_create_chatbot(&mut self, statement: &CreateChatBot) -> SqlResult<ExecuteAnswer> {
        let (project, name) = self.scoped_name(&statement.name);
        self.require_project(&project).await?;
        let controllers = self.controllers();

        let database = statement.database.last();
        if self.session.datahub().resolve(database).await?.is_none() {
            return Err(SqlApiError::SqlApi(format!("Database does not exists: {}", database)));
        }

        // The chatbot may be backed by a model or by an agent
        let (model_project, model_name) = self.scoped_name(&statement.model);
        let backed = self.model_exists(&model_project, &model_name).await?
            || controllers.agents.get(&model_project, &model_name).await?.is_some();
        if !backed {
            return Err(SqlApiError::SqlApi(format!(
                "Model or agent does not exists: {}",
                statement.model
            )));
        }

        let chatbot = ChatBotRecord {
            name,
            project,
            database: database.to_string(),
            model_name,
            params: statement.params.clone(),
            is_running: true,
            last_error: None,
        };
        controllers.chatbots.add(chatbot).await?;
        Ok(ExecuteAnswer::ok())
    }

    pub(super) async fn answer_update_chatbot(&mut self, statement: &UpdateChatBot) -> SqlResult<ExecuteAnswer> {
        let (project, name) = self.scoped_name(&statement.name);
        if let Some(JsonValue::String(database)) = statement.updated_params.get("database") {
            if self.session.datahub().resolve(database).await?.is_none() {
                return Err(SqlApiError::SqlApi(format!("Database does not exists: {}", database)));
            }
        }
        self.session
            .controllers
            .chatbots
            .update(&project, &name, &statement.updated_params)
            .await?;
        Ok(ExecuteAnswer::ok())
    }

    pub(super) async fn answer_drop_chatbot(&mut self, statement: &DropChatBot) -> SqlResult<ExecuteAnswer> {
        let (project, name) = self.scoped_name(&statement.name);
        self.session.controllers.chatbots.delete(&project, &name).await?;
        Ok(ExecuteAnswer::ok())
    }

    pub(super) async fn answer_create_kb(&mut self, statement: &CreateKnowledgeBase) -> SqlResult<ExecuteAnswer> {
        if statement.from_select.is_some() {
            return Err(SqlApiError::NotSupportedYet(
                "Create a knowledge base from a select is not supported yet".to_string(),
            ));
        }

        let (project_name, name) = self.scoped_name(&statement.name);
        let project = self
            .session
            .controllers
            .projects
            .get(&project_name)
            .await?
            .ok_or_else(|| SqlApiError::SqlApi(format!("Project not found: {}", project_name)))?;

        let (model_project, model_name) = self.scoped_name(&statement.model);
        if !self.model_exists(&model_project, &model_name).await? {
            return Err(SqlApiError::SqlApi(format!("Model not found: {}", statement.model)));
        }

        let (vector_database, vector_database_table) = match &statement.storage {
            Some(storage) if storage.len() == 2 => (storage.first().to_string(), storage.last().to_string()),
            Some(storage) => {
                return Err(SqlApiError::SqlApi(format!(
                    "Storage must be in the form <database>.<table>: {}",
                    storage
                )))
            }
            None => (format!("{}_chromadb", name), DEFAULT_KB_TABLE.to_string()),
        };

        let record = KnowledgeBaseRecord {
            name,
            project_id: project.id,
            project: project.name,
            embedding_model: model_name,
            vector_database,
            vector_database_table,
            params: statement.params.clone(),
        };
        self.session
            .controllers
            .knowledge_bases
            .add(record, statement.if_not_exists)
            .await?;
        Ok(ExecuteAnswer::ok())
    }

    pub(super) async fn answer_drop_kb(&mut self, statement: &DropKnowledgeBase) -> SqlResult<ExecuteAnswer> {
        let (project_name, name) = self.scoped_name(&statement.name);
        let project = self
            .session
            .controllers
            .projects
            .get(&project_name)
            .await?
            .ok_or_else(|| SqlApiError::SqlApi(format!("Project not found: {}", project_name)))?;

        self.session
            .controllers
            .knowledge_bases
            .delete(&project.id, &name, statement.if_exists)
            .await?;
        Ok(ExecuteAnswer::ok())
    }

    pub(super) async fn answer_create_skill(&mut self, statement: &CreateSkill) -> SqlResult<ExecuteAnswer> {
        let (project, name) = self.scoped_name(&statement.name);
        self.require_project(&project).await?;

        let skill = SkillRecord {
            name,
            project,
            skill_type: statement.skill_type.clone(),
            params: statement.params.clone(),
        };
        self.session.controllers.skills.add(skill).await?;
        Ok(ExecuteAnswer::ok())
    }

    pub(super) async fn answer_drop_skill(&mut self, statement: &DropSkill) -> SqlResult<ExecuteAnswer> {
        let (project, name) = self.scoped_name(&statement.name);
        self.session.controllers.skills.delete(&project, &name).await?;
        Ok(ExecuteAnswer::ok())
    }

    pub(super) async fn answer_update_skill(&mut self, statement: &UpdateSkill) -> SqlResult<ExecuteAnswer> {
        let (project, name) = self.scoped_name(&statement.name);
        self.session
            .controllers
            .skills
            .update(&project, &name, &statement.updated_params)
            .await?;
        Ok(ExecuteAnswer::ok())
    }

    pub(super) async fn answer_create_agent(&mut self, statement: &CreateAgent) -> SqlResult<ExecuteAnswer> {
        let (project, name) = self.scoped_name(&statement.name);
        self.require_project(&project).await?;
        let controllers = self.controllers();

        let mut params = statement.params.clone();
        let skills = skill_names(params.remove("skills"));
        for skill in &skills {
            if controllers.skills.get(&project, skill).await?.is_none() {
                return Err(SqlApiError::SqlApi(format!("Skill with name does not exist: {}", skill)));
            }
        }

        let agent = AgentRecord {
            name,
            project,
            model_name: statement.model.clone(),
            skills,
            params,
        };
        controllers.agents.add(agent).await?;
        Ok(ExecuteAnswer::ok())
    }

    pub(super) async fn answer_drop_agent(&mut self, statement: &DropAgent) -> SqlResult<ExecuteAnswer> {
        let (project, name) = self.scoped_name(&statement.name);
        self.session.controllers.agents.delete(&project, &name).await?;
        Ok(ExecuteAnswer::ok())
    }

    pub(super) async fn answer_update_agent(&mut self, statement: &UpdateAgent) -> SqlResult<ExecuteAnswer> {
        let (project, name) = self.scoped_name(&statement.name);
        self.session
            .controllers
            .agents
            .update(&project, &name, &statement.updated_params)
            .await?;
        Ok(ExecuteAnswer::ok())
    }
}

/// Runs job queries in a fresh session whose database is the job's project
pub struct SessionJobRunner {
    controllers: Arc<ControllerSet>,
}

impl SessionJobRunner {
    pub fn new(controllers: Arc<ControllerSet>) -> Self {
        Self { controllers }
    }
}

#[async_trait]
impl JobRunner for SessionJobRunner {
    async fn run_job(&self, job: &JobRecord) -> Result<(), String> {
        let session = SessionController::new(Arc::clone(&self.controllers)).with_database(job.project.clone());

        for text in job.query.split(';').map(str::trim).filter(|q| !q.is_empty()) {
            let query = parse_query(text).map_err(|e| e.to_string())?;
            let result = self
                .controllers
                .engine
                .execute_query(&query, &session, ExecutionOptions::default())
                .await
                .map_err(|e| e.to_string())?;
            debug!(job = %job.name, rows = result.row_count(), "Job query finished");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    #[test]
    fn test_parse_job_date() {
        let dt = parse_job_date("2024-03-01 10:30:00").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day(), dt.hour(), dt.minute()), (2024, 3, 1, 10, 30));
        let day = parse_job_date("2024-03-01").unwrap();
        assert_eq!(day.hour(), 0);
        let err = parse_job_date("yesterday").unwrap_err();
        assert_eq!(err.to_string(), "Wrong date format: yesterday");
    }

    #[test]
    fn test_schedule_text() {
        assert_eq!(schedule_text("1 hour"), "every 1 hour");
        assert_eq!(schedule_text("EVERY day"), "EVERY day");
    }

    #[test]
    fn test_skill_names() {
        assert_eq!(skill_names(Some(json!(["a", "b"]))), vec!["a", "b"]);
        assert_eq!(skill_names(Some(json!("a, b"))), vec!["a", "b"]);
        assert!(skill_names(None).is_empty());
    }
}
