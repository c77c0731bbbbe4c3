use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};

use super::{format_timestamp, Row};

fn params_value(params: &Map<String, JsonValue>) -> JsonValue {
    JsonValue::String(JsonValue::Object(params.clone()).to_string())
}

/// Scheduled query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    pub id: String,
    pub project: String,
    pub name: String,
    pub query: String,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub schedule_str: Option<String>,
    pub active: bool,
    pub variables: Map<String, JsonValue>,
    pub created_at: DateTime<Utc>,
}

impl JobRecord {
    /// Row in JOBS column order
    pub fn to_row(&self) -> Row {
        vec![
            json!(self.name),
            json!(self.project),
            json!(format_timestamp(&self.start_at)),
            json!(self.end_at.as_ref().map(format_timestamp)),
            json!(self.next_run_at.as_ref().map(format_timestamp)),
            json!(self.schedule_str),
            json!(self.query),
            if self.variables.is_empty() {
                JsonValue::Null
            } else {
                params_value(&self.variables)
            },
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobHistoryRecord {
    pub name: String,
    pub project: String,
    pub run_start: DateTime<Utc>,
    pub run_end: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub query: String,
}

impl JobHistoryRecord {
    /// Row in JOBS_HISTORY column order
    pub fn to_row(&self) -> Row {
        vec![
            json!(self.name),
            json!(self.project),
            json!(format_timestamp(&self.run_start)),
            json!(self.run_end.as_ref().map(format_timestamp)),
            json!(self.error),
            json!(self.query),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggerRecord {
    pub name: String,
    pub project: String,
    pub database: String,
    pub table: String,
    pub query: String,
    pub columns: Vec<String>,
    pub last_error: Option<String>,
}

impl TriggerRecord {
    /// Row in MDB_TRIGGERS column order
    pub fn to_row(&self) -> Row {
        vec![
            json!(self.name),
            json!(self.project),
            json!(self.database),
            json!(self.table),
            json!(self.query),
            json!(self.last_error),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatBotRecord {
    pub name: String,
    pub project: String,
    pub database: String,
    pub model_name: String,
    pub params: Map<String, JsonValue>,
    pub is_running: bool,
    pub last_error: Option<String>,
}

impl ChatBotRecord {
    /// Row in CHATBOTS column order
    pub fn to_row(&self) -> Row {
        vec![
            json!(self.name),
            json!(self.project),
            json!(self.database),
            json!(self.model_name),
            params_value(&self.params),
            json!(self.is_running),
            json!(self.last_error),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillRecord {
    pub name: String,
    pub project: String,
    pub skill_type: String,
    pub params: Map<String, JsonValue>,
}

impl SkillRecord {
    pub fn to_row(&self) -> Row {
        vec![
            json!(self.name),
            json!(self.project),
            json!(self.skill_type),
            params_value(&self.params),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentRecord {
    pub name: String,
    pub project: String,
    pub model_name: String,
    pub skills: Vec<String>,
    pub params: Map<String, JsonValue>,
}

impl AgentRecord {
    pub fn to_row(&self) -> Row {
        vec![
            json!(self.name),
            json!(self.project),
            json!(self.model_name),
            json!(self.skills.join(",")),
            params_value(&self.params),
        ]
    }
}

/// Pairing of an embedding model with a vector store table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeBaseRecord {
    pub name: String,
    pub project_id: String,
    pub project: String,
    pub embedding_model: String,
    pub vector_database: String,
    pub vector_database_table: String,
    pub params: Map<String, JsonValue>,
}

impl KnowledgeBaseRecord {
    /// Row in KNOWLEDGE_BASES column order
    pub fn to_row(&self) -> Row {
        vec![
            json!(self.name),
            json!(self.project),
            json!(self.embedding_model),
            json!(format!("{}.{}", self.vector_database, self.vector_database_table)),
        ]
    }
}
