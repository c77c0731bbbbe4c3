use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub executor: ExecutorConfig,
    pub evaluator: EvaluatorConfig,
    pub logging: LoggingConfig,
}

/// Settings that change how statements are dispatched
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    /// Project used when a session has no default database
    pub default_project: String,
    /// Engine used by CREATE MODEL without `USING engine = ...`
    pub default_ml_engine: String,
    /// Hosted mode; enables the retrain/finetune admission guard
    pub cloud: bool,
    pub training_guard_minutes: i64,
    /// Row limit forced while validating a view body
    pub view_validation_limit: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluatorConfig {
    pub batch_size: usize,
    pub target_partitions: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_project: "mindsdb".to_string(),
            default_ml_engine: "lightwood".to_string(),
            cloud: false,
            training_guard_minutes: 60,
            view_validation_limit: 1,
        }
    }
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            batch_size: 8192,
            target_partitions: num_cpus::get(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            evaluator: EvaluatorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Try to load from .env file
        let _ = dotenv::dotenv();

        let executor = ExecutorConfig::default();
        let evaluator = EvaluatorConfig::default();

        let mut builder = config::Config::builder()
            .set_default("executor.default_project", executor.default_project)?
            .set_default("executor.default_ml_engine", executor.default_ml_engine)?
            .set_default("executor.cloud", executor.cloud)?
            .set_default("executor.training_guard_minutes", executor.training_guard_minutes)?
            .set_default("executor.view_validation_limit", executor.view_validation_limit)?
            .set_default("evaluator.batch_size", evaluator.batch_size as u64)?
            .set_default("evaluator.target_partitions", evaluator.target_partitions as u64)?
            .set_default("logging.level", "info")?;

        if let Ok(project) = env::var("MINDSDB_DEFAULT_PROJECT") {
            builder = builder.set_override("executor.default_project", project)?;
        }

        if let Ok(engine) = env::var("MINDSDB_DEFAULT_ML_ENGINE") {
            builder = builder.set_override("executor.default_ml_engine", engine)?;
        }

        if let Ok(cloud) = env::var("MINDSDB_CLOUD") {
            let cloud = matches!(cloud.to_lowercase().as_str(), "1" | "true" | "yes");
            builder = builder.set_override("executor.cloud", cloud)?;
        }

        if let Ok(minutes) = env::var("MINDSDB_TRAINING_GUARD_MINUTES") {
            builder = builder.set_override(
                "executor.training_guard_minutes",
                minutes.parse::<i64>().unwrap_or(60),
            )?;
        }

        if let Ok(log_level) = env::var("MINDSDB_LOG_LEVEL") {
            builder = builder.set_override("logging.level", log_level)?;
        }

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        env::remove_var("MINDSDB_DEFAULT_PROJECT");
        env::remove_var("MINDSDB_CLOUD");

        let config = Config::from_env();
        assert!(config.is_ok());

        let config = config.unwrap();
        assert_eq!(config.executor.default_project, "mindsdb");
        assert_eq!(config.executor.default_ml_engine, "lightwood");
        assert!(!config.executor.cloud);
        assert_eq!(config.executor.training_guard_minutes, 60);
        assert_eq!(config.evaluator.batch_size, 8192);
    }
}
