// DataFusion SessionManager
//
// Creates the short-lived SessionContext instances the residual evaluator
// registers in-memory row sets with.

use anyhow::Result;
use datafusion::prelude::*;

use crate::config::EvaluatorConfig;

/// Configuration for DataFusion sessions
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Batch size for query execution
    pub batch_size: usize,
    /// Number of partitions for parallel execution
    pub target_partitions: usize,
}

impl From<&EvaluatorConfig> for SessionConfig {
    fn from(config: &EvaluatorConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            target_partitions: config.target_partitions.max(1),
        }
    }
}

/// Manages DataFusion SessionContext lifecycle
///
/// Every evaluation gets a fresh context, so row sets registered for one
/// query never leak into another.
///
/// # Example
/// ```rust,ignore
/// let manager = DataFusionSessionManager::new(SessionConfig::from(&EvaluatorConfig::default()));
/// let ctx = manager.create_session()?;
/// ctx.register_batch("df", batch)?;
/// ```
pub struct DataFusionSessionManager {
    config: SessionConfig,
}

impl DataFusionSessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Create a new DataFusion SessionContext
    pub fn create_session(&self) -> Result<SessionContext> {
        let config = datafusion::prelude::SessionConfig::new()
            .with_batch_size(self.config.batch_size)
            .with_target_partitions(self.config.target_partitions)
            .with_information_schema(false);

        Ok(SessionContext::new_with_config(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::from(&EvaluatorConfig::default());
        assert_eq!(config.batch_size, 8192);
        assert!(config.target_partitions >= 1);
    }

    #[test]
    fn test_config_from_evaluator_settings() {
        let config = SessionConfig::from(&EvaluatorConfig {
            batch_size: 0,
            target_partitions: 4,
        });
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.target_partitions, 4);
    }

    #[test]
    fn test_session_manager_creation() {
        let manager = DataFusionSessionManager::new(SessionConfig::from(&EvaluatorConfig::default()));
        assert!(manager.create_session().is_ok());
    }
}
