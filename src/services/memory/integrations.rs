// In-memory integration registry
//
// Keeps integration records and lazily builds one handler instance per
// integration through the handler registry.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::ControllerError;
use crate::models::{IntegrationKind, IntegrationRecord};
use crate::services::controllers::{ControllerResult, IntegrationController};
use crate::services::handlers::{DataHandler, HandlerRegistry, MlHandler};
use crate::sql::JsonMap;

pub struct InMemoryIntegrationController {
    registry: HandlerRegistry,
    records: RwLock<Vec<IntegrationRecord>>,
    data_handlers: RwLock<HashMap<String, Arc<dyn DataHandler>>>,
    ml_handlers: RwLock<HashMap<String, Arc<dyn MlHandler>>>,
}

impl InMemoryIntegrationController {
    pub fn new(registry: HandlerRegistry, seed: Vec<IntegrationRecord>) -> Self {
        Self {
            registry,
            records: RwLock::new(seed),
            data_handlers: RwLock::new(HashMap::new()),
            ml_handlers: RwLock::new(HashMap::new()),
        }
    }

    async fn record_of(&self, name: &str, kind: IntegrationKind) -> ControllerResult<IntegrationRecord> {
        let record = self
            .get(name)
            .await?
            .ok_or_else(|| ControllerError::NotFound(format!("Integration '{}' does not exists", name)))?;
        if record.kind != kind {
            return Err(ControllerError::Invalid(format!(
                "Integration '{}' is not a {} integration",
                name,
                kind.as_str()
            )));
        }
        Ok(record)
    }
}

#[async_trait]
impl IntegrationController for InMemoryIntegrationController {
    async fn list(&self) -> ControllerResult<Vec<IntegrationRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn get(&self, name: &str) -> ControllerResult<Option<IntegrationRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn add(&self, name: &str, engine: &str, connection_data: JsonMap) -> ControllerResult<IntegrationRecord> {
        let kind = self
            .registry
            .kind_of(engine)
            .ok_or_else(|| ControllerError::Invalid(format!("There is no engine '{}'", engine)))?;

        let mut records = self.records.write().await;
        if records.iter().any(|r| r.name.eq_ignore_ascii_case(name)) {
            return Err(ControllerError::AlreadyExists(format!("Integration '{}' already exists", name)));
        }
        let record = IntegrationRecord::new(name, engine, kind, connection_data);
        records.push(record.clone());
        debug!(integration = %name, engine = %engine, kind = kind.as_str(), "Integration added");
        Ok(record)
    }

    async fn delete(&self, name: &str) -> ControllerResult<()> {
        let mut records = self.records.write().await;
        let pos = records
            .iter()
            .position(|r| r.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ControllerError::NotFound(format!("Integration '{}' does not exists", name)))?;
        records.remove(pos);

        let key = name.to_lowercase();
        self.data_handlers.write().await.remove(&key);
        self.ml_handlers.write().await.remove(&key);
        Ok(())
    }

    async fn data_handler(&self, name: &str) -> ControllerResult<Arc<dyn DataHandler>> {
        let key = name.to_lowercase();
        if let Some(handler) = self.data_handlers.read().await.get(&key) {
            return Ok(Arc::clone(handler));
        }

        let record = self.record_of(name, IntegrationKind::Data).await?;
        let handler = self
            .registry
            .create_data_handler(&record.engine, &record.name, &record.connection_data)
            .map_err(|e| ControllerError::Invalid(e.to_string()))?;

        let mut cache = self.data_handlers.write().await;
        Ok(Arc::clone(cache.entry(key).or_insert(handler)))
    }

    async fn ml_handler(&self, name: &str) -> ControllerResult<Arc<dyn MlHandler>> {
        let key = name.to_lowercase();
        if let Some(handler) = self.ml_handlers.read().await.get(&key) {
            return Ok(Arc::clone(handler));
        }

        let record = self.record_of(name, IntegrationKind::Ml).await?;
        let handler = self
            .registry
            .create_ml_handler(&record.engine, &record.name, &record.connection_data)
            .map_err(|e| ControllerError::Invalid(e.to_string()))?;

        let mut cache = self.ml_handlers.write().await;
        Ok(Arc::clone(cache.entry(key).or_insert(handler)))
    }

    fn handlers(&self) -> &HandlerRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluatorConfig;
    use crate::services::datafusion::TabularEvaluator;
    use crate::services::memory::default_handlers;

    fn controller() -> InMemoryIntegrationController {
        let evaluator = Arc::new(TabularEvaluator::new(&EvaluatorConfig::default()));
        InMemoryIntegrationController::new(default_handlers(&evaluator), Vec::new())
    }

    #[tokio::test]
    async fn test_handler_instance_is_shared() {
        let integrations = controller();
        integrations.add("db1", "memory", JsonMap::new()).await.unwrap();
        let a = integrations.data_handler("db1").await.unwrap();
        let b = integrations.data_handler("DB1").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(integrations.ml_handler("db1").await.is_err());
    }

    #[tokio::test]
    async fn test_add_validates_engine_and_name() {
        let integrations = controller();
        let err = integrations.add("x", "nope", JsonMap::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "There is no engine 'nope'");

        integrations.add("x", "memory", JsonMap::new()).await.unwrap();
        let err = integrations.add("X", "memory", JsonMap::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Integration 'X' already exists");

        integrations.delete("x").await.unwrap();
        assert!(integrations.get("x").await.unwrap().is_none());
    }
}
