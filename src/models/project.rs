use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata namespace holding models, views, jobs and the rest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectRecord {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl ProjectRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// Table type as reported by TABLES and SHOW FULL TABLES
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TableKind {
    BaseTable,
    Model,
    View,
    SystemView,
}

impl TableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::BaseTable => "BASE TABLE",
            TableKind::Model => "MODEL",
            TableKind::View => "VIEW",
            TableKind::SystemView => "SYSTEM VIEW",
        }
    }
}

/// One entry of a data node's table listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableEntry {
    pub name: String,
    pub kind: TableKind,
    pub deletable: bool,
}

impl TableEntry {
    pub fn new(name: impl Into<String>, kind: TableKind) -> Self {
        Self {
            name: name.into(),
            kind,
            deletable: false,
        }
    }

    pub fn deletable(mut self) -> Self {
        self.deletable = true;
        self
    }
}

/// Stored view definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewRecord {
    pub id: String,
    pub project: String,
    pub name: String,
    pub query: String,
    pub created_at: DateTime<Utc>,
}

impl ViewRecord {
    pub fn new(project: impl Into<String>, name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            project: project.into(),
            name: name.into(),
            query: query.into(),
            created_at: Utc::now(),
        }
    }
}
