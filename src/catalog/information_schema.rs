// information_schema data node
//
// Root of database name resolution and producer of the virtual catalog
// tables. Rows are synthesized on every query from the live controllers;
// residual filtering, projection and ordering run in the tabular evaluator.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::registry;
use crate::datanodes::{DataNode, DataNodeType, IntegrationDataNode, ProjectDataNode};
use crate::error::{SqlApiError, SqlResult};
use crate::models::{IntegrationKind, TableEntry, TableKind, TabularResult};
use crate::services::session::{ControllerSet, SessionController};
use crate::sql::Select;

pub const INFORMATION_SCHEMA: &str = "information_schema";

/// Persistent child node holding uploaded files
pub const FILES_DATABASE: &str = "files";

pub struct InformationSchemaDataNode {
    pub(super) controllers: Arc<ControllerSet>,
}

impl InformationSchemaDataNode {
    pub fn new(controllers: Arc<ControllerSet>) -> Self {
        Self { controllers }
    }

    /// Data node serving database `name`, or `None` when nothing matches
    ///
    /// Lookup order: information_schema itself, the `files` node, projects,
    /// then integrations. Names compare case-insensitively.
    pub async fn resolve(&self, name: &str) -> SqlResult<Option<Arc<dyn DataNode>>> {
        if name.eq_ignore_ascii_case(INFORMATION_SCHEMA) {
            return Ok(Some(Arc::new(Self::new(Arc::clone(&self.controllers)))));
        }

        if name.eq_ignore_ascii_case(FILES_DATABASE) {
            if let Some(node) = self.files_node().await? {
                return Ok(Some(Arc::new(node)));
            }
        }

        if let Some(node) = self.project_node(name).await? {
            return Ok(Some(Arc::new(node)));
        }

        let integrations = self.controllers.integrations.list().await?;
        let Some(record) = integrations
            .into_iter()
            .find(|i| i.kind == IntegrationKind::Data && i.name.eq_ignore_ascii_case(name))
        else {
            debug!(database = %name, "Database not resolved");
            return Ok(None);
        };

        let handler = self.controllers.integrations.data_handler(&record.name).await?;
        Ok(Some(Arc::new(IntegrationDataNode::new(record.name, record.engine, handler))))
    }

    pub async fn project_node(&self, name: &str) -> SqlResult<Option<ProjectDataNode>> {
        let project = self.controllers.projects.get(name).await?;
        Ok(project.map(|p| ProjectDataNode::new(p, Arc::clone(&self.controllers))))
    }

    pub async fn files_node(&self) -> SqlResult<Option<IntegrationDataNode>> {
        let Some(record) = self.controllers.integrations.get(FILES_DATABASE).await? else {
            return Ok(None);
        };
        let handler = self.controllers.integrations.data_handler(&record.name).await?;
        Ok(Some(IntegrationDataNode::new(record.name, record.engine, handler)))
    }

    /// Whether `name` resolves to any database
    pub async fn database_exists(&self, name: &str) -> SqlResult<bool> {
        Ok(self.resolve(name).await?.is_some())
    }

    /// Names of all projects in listing order
    pub(super) async fn project_names(&self) -> SqlResult<Vec<String>> {
        Ok(self
            .controllers
            .projects
            .list()
            .await?
            .into_iter()
            .map(|p| p.name)
            .collect())
    }

    pub fn columns_of(&self, table: &str) -> SqlResult<Vec<String>> {
        Ok(registry::columns_of(table)?.iter().map(|c| c.to_string()).collect())
    }
}

#[async_trait]
impl DataNode for InformationSchemaDataNode {
    fn node_type(&self) -> DataNodeType {
        DataNodeType::InformationSchema
    }

    fn name(&self) -> &str {
        INFORMATION_SCHEMA
    }

    async fn get_tables(&self, _session: &SessionController) -> SqlResult<Vec<TableEntry>> {
        Ok(registry::table_names()
            .map(|name| TableEntry::new(name, TableKind::SystemView))
            .collect())
    }

    async fn has_table(&self, table: &str, _session: &SessionController) -> SqlResult<bool> {
        Ok(registry::table_exists(table))
    }

    async fn get_table_columns(&self, table: &str, _session: &SessionController) -> SqlResult<Vec<String>> {
        self.columns_of(table)
    }

    async fn query(&self, select: &Select, session: &SessionController) -> SqlResult<TabularResult> {
        let tables = select.tables();
        if tables.len() != 1 {
            return Err(SqlApiError::BadTable(format!(
                "Only one table can be used in query to information_schema: {}",
                select
            )));
        }

        let table_name = tables[0].last();
        let table = registry::lookup(table_name).ok_or_else(|| {
            SqlApiError::TableNotFound(format!("Table information_schema.{} does not exists", table_name))
        })?;

        let data = self.produce(table, select, session).await?;
        debug!(table = table.name, rows = data.row_count(), "Catalog rows produced");

        self.controllers.evaluator.query_df(&data, select).await
    }
}
