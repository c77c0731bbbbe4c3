// Integration data node
//
// Thin façade over the handler of one data integration.

use async_trait::async_trait;
use std::sync::Arc;

use super::{DataNode, DataNodeType};
use crate::error::SqlResult;
use crate::models::{TableEntry, TabularResult};
use crate::services::handlers::DataHandler;
use crate::services::session::SessionController;
use crate::sql::Select;

pub struct IntegrationDataNode {
    name: String,
    engine: String,
    handler: Arc<dyn DataHandler>,
}

impl IntegrationDataNode {
    pub fn new(name: impl Into<String>, engine: impl Into<String>, handler: Arc<dyn DataHandler>) -> Self {
        Self {
            name: name.into(),
            engine: engine.into(),
            handler,
        }
    }

    /// Handler name the integration was created with
    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn handler(&self) -> &Arc<dyn DataHandler> {
        &self.handler
    }

    pub async fn drop_table(&self, table: &str) -> SqlResult<()> {
        Ok(self.handler.drop_table(table).await?)
    }
}

#[async_trait]
impl DataNode for IntegrationDataNode {
    fn node_type(&self) -> DataNodeType {
        DataNodeType::Integration
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn get_tables(&self, _session: &SessionController) -> SqlResult<Vec<TableEntry>> {
        Ok(self.handler.get_tables().await?)
    }

    async fn get_table_columns(&self, table: &str, _session: &SessionController) -> SqlResult<Vec<String>> {
        Ok(self.handler.get_columns(table).await?)
    }

    async fn query(&self, select: &Select, _session: &SessionController) -> SqlResult<TabularResult> {
        Ok(self.handler.query(select).await?)
    }

    fn as_integration(&self) -> Option<&IntegrationDataNode> {
        Some(self)
    }
}
