// Data nodes
//
// A data node is the façade a database name resolves to: the virtual catalog,
// a project, or an integration.

pub mod integration;
pub mod project;

pub use integration::IntegrationDataNode;
pub use project::{ProjectDataNode, CATALOG_BACKED_TABLES};

use async_trait::async_trait;

use crate::error::SqlResult;
use crate::models::{TableEntry, TabularResult};
use crate::services::session::SessionController;
use crate::sql::Select;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataNodeType {
    InformationSchema,
    Project,
    Integration,
}

impl DataNodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataNodeType::InformationSchema => "INFORMATION_SCHEMA",
            DataNodeType::Project => "project",
            DataNodeType::Integration => "integration",
        }
    }
}

#[async_trait]
pub trait DataNode: Send + Sync {
    fn node_type(&self) -> DataNodeType;

    fn name(&self) -> &str;

    async fn get_tables(&self, session: &SessionController) -> SqlResult<Vec<TableEntry>>;

    async fn has_table(&self, table: &str, session: &SessionController) -> SqlResult<bool> {
        Ok(self
            .get_tables(session)
            .await?
            .iter()
            .any(|t| t.name.eq_ignore_ascii_case(table)))
    }

    async fn get_table_columns(&self, table: &str, session: &SessionController) -> SqlResult<Vec<String>>;

    /// Run a single-table SELECT addressed to this node
    async fn query(&self, select: &Select, session: &SessionController) -> SqlResult<TabularResult>;

    fn as_project(&self) -> Option<&ProjectDataNode> {
        None
    }

    fn as_integration(&self) -> Option<&IntegrationDataNode> {
        None
    }
}
