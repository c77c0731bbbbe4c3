// Handler abstraction for integrations
//
// A handler is the pluggable driver behind an integration. Data handlers
// answer table listings and queries; ML handlers train and predict. The
// registry owns the import status of every known handler module and builds
// handler instances for integrations.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::error::SqlApiError;
use crate::models::{ArgType, HandlerMeta, IntegrationKind, ModelRecord, TableEntry, TabularResult};
use crate::sql::{Constant, Expr, JsonMap, Select};

/// Errors raised by handler implementations
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Connection(String),

    #[error("Table '{0}' does not exist")]
    TableNotFound(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("{0}")]
    Query(String),

    #[error(transparent)]
    Sql(#[from] SqlApiError),
}

impl From<HandlerError> for SqlApiError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::Sql(err) => err,
            other => SqlApiError::SqlApi(other.to_string()),
        }
    }
}

pub type HandlerResult<T> = Result<T, HandlerError>;

/// Driver of a data integration
#[async_trait]
pub trait DataHandler: Send + Sync {
    /// Integration name this handler serves
    fn name(&self) -> &str;

    async fn check_connection(&self) -> HandlerResult<()>;

    async fn get_tables(&self) -> HandlerResult<Vec<TableEntry>>;

    async fn get_columns(&self, table: &str) -> HandlerResult<Vec<String>>;

    /// Run a single-table SELECT whose FROM names one of this handler's tables
    async fn query(&self, select: &Select) -> HandlerResult<TabularResult>;

    /// Pass-through query in the source's own dialect
    async fn native_query(&self, query: &str) -> HandlerResult<TabularResult> {
        Err(HandlerError::Unsupported(format!(
            "Native queries are not supported by '{}': {}",
            self.name(),
            query
        )))
    }

    async fn insert(&self, table: &str, _data: TabularResult) -> HandlerResult<u64> {
        Err(HandlerError::Unsupported(format!("Insert into '{}' is not supported", table)))
    }

    async fn update(&self, table: &str, _assignments: &[(String, Constant)], _filter: Option<&Expr>) -> HandlerResult<u64> {
        Err(HandlerError::Unsupported(format!("Update of '{}' is not supported", table)))
    }

    async fn delete(&self, table: &str, _filter: Option<&Expr>) -> HandlerResult<u64> {
        Err(HandlerError::Unsupported(format!("Delete from '{}' is not supported", table)))
    }

    async fn create_table(&self, table: &str, _data: TabularResult, _replace: bool) -> HandlerResult<()> {
        Err(HandlerError::Unsupported(format!("Create table '{}' is not supported", table)))
    }

    async fn drop_table(&self, table: &str) -> HandlerResult<()> {
        Err(HandlerError::Unsupported(format!("Drop table '{}' is not supported", table)))
    }
}

/// Driver of an ML engine
#[async_trait]
pub trait MlHandler: Send + Sync {
    /// Whether creating an engine with this handler runs an initialization hook
    fn has_create_engine(&self) -> bool {
        false
    }

    async fn create_engine(&self, _params: &JsonMap) -> HandlerResult<()> {
        Ok(())
    }

    async fn check_connection(&self) -> HandlerResult<()> {
        Ok(())
    }

    /// Fit `model` on `data`; returns the accuracy when the engine reports one
    async fn learn(&self, model: &ModelRecord, data: &TabularResult) -> HandlerResult<Option<f64>>;

    /// Produce one output row per input row
    async fn predict(&self, model: &ModelRecord, input: &TabularResult, params: &JsonMap) -> HandlerResult<TabularResult>;
}

pub type DataHandlerFactory = Arc<dyn Fn(&str, &JsonMap) -> HandlerResult<Arc<dyn DataHandler>> + Send + Sync>;
pub type MlHandlerFactory = Arc<dyn Fn(&str, &JsonMap) -> HandlerResult<Arc<dyn MlHandler>> + Send + Sync>;

#[derive(Clone)]
pub enum HandlerFactory {
    Data(DataHandlerFactory),
    Ml(MlHandlerFactory),
}

/// A known handler: its metadata plus a constructor when the import succeeded
#[derive(Clone)]
pub struct HandlerModule {
    pub meta: HandlerMeta,
    factory: Option<HandlerFactory>,
}

impl HandlerModule {
    pub fn data(meta: HandlerMeta, factory: DataHandlerFactory) -> Self {
        Self {
            meta,
            factory: Some(HandlerFactory::Data(factory)),
        }
    }

    pub fn ml(meta: HandlerMeta, factory: MlHandlerFactory) -> Self {
        Self {
            meta,
            factory: Some(HandlerFactory::Ml(factory)),
        }
    }

    /// Module whose import failed; listed but never instantiated
    pub fn broken(meta: HandlerMeta) -> Self {
        Self { meta, factory: None }
    }

    pub fn is_usable(&self) -> bool {
        self.meta.import.success && self.factory.is_some()
    }
}

/// Import-status cache of handler modules, keyed by lower-cased handler name
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    modules: BTreeMap<String, HandlerModule>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, module: HandlerModule) -> Self {
        self.modules.insert(module.meta.name.to_lowercase(), module);
        self
    }

    pub fn get(&self, name: &str) -> Option<&HandlerModule> {
        self.modules.get(&name.to_lowercase())
    }

    /// Metadata of every module, in name order
    pub fn list(&self) -> Vec<&HandlerMeta> {
        self.modules.values().map(|m| &m.meta).collect()
    }

    pub fn create_data_handler(
        &self,
        handler: &str,
        integration_name: &str,
        connection_data: &JsonMap,
    ) -> HandlerResult<Arc<dyn DataHandler>> {
        match self.get(handler).and_then(|m| m.factory.as_ref()) {
            Some(HandlerFactory::Data(factory)) => factory(integration_name, connection_data),
            Some(HandlerFactory::Ml(_)) => Err(HandlerError::Unsupported(format!(
                "Handler '{}' is not a data handler",
                handler
            ))),
            None => Err(HandlerError::Unsupported(format!("Handler '{}' can not be used", handler))),
        }
    }

    pub fn create_ml_handler(
        &self,
        handler: &str,
        engine_name: &str,
        params: &JsonMap,
    ) -> HandlerResult<Arc<dyn MlHandler>> {
        match self.get(handler).and_then(|m| m.factory.as_ref()) {
            Some(HandlerFactory::Ml(factory)) => factory(engine_name, params),
            Some(HandlerFactory::Data(_)) => Err(HandlerError::Unsupported(format!(
                "Handler '{}' is not an ML handler",
                handler
            ))),
            None => Err(HandlerError::Unsupported(format!("Handler '{}' can not be used", handler))),
        }
    }

    /// Kind of the named handler, if known
    pub fn kind_of(&self, handler: &str) -> Option<IntegrationKind> {
        self.get(handler).map(|m| m.meta.kind)
    }
}

/// Connection arguments ready for a handler, with the files fetched for them
#[derive(Debug, Default)]
pub struct PreparedArgs {
    pub args: JsonMap,
    downloads: Vec<PathBuf>,
}

impl PreparedArgs {
    /// Remove the downloaded files of a connection that is not committed
    pub async fn discard(self) {
        remove_files(&self.downloads).await;
    }
}

async fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %e, "Failed to remove downloaded file");
        }
    }
}

/// Check connection arguments against the handler's declaration
///
/// Unknown keys are rejected (`as_service` is always tolerated). PATH-typed
/// arguments accept a path string, `{"path": ...}` or `{"url": ...}`; URLs are
/// downloaded into a temporary file and the argument is replaced with its path.
/// Files already downloaded are removed when a later argument is rejected.
pub async fn prepare_connection_args(meta: &HandlerMeta, args: JsonMap) -> Result<PreparedArgs, SqlApiError> {
    let mut downloads = Vec::new();
    match resolve_args(meta, args, &mut downloads).await {
        Ok(args) => Ok(PreparedArgs { args, downloads }),
        Err(e) => {
            remove_files(&downloads).await;
            Err(e)
        }
    }
}

async fn resolve_args(meta: &HandlerMeta, mut args: JsonMap, downloads: &mut Vec<PathBuf>) -> Result<JsonMap, SqlApiError> {
    let Some(accepted) = &meta.connection_args else {
        return Ok(args);
    };

    let names: Vec<String> = args.keys().cloned().collect();
    for name in names {
        if name == "as_service" {
            continue;
        }
        let Some(arg_meta) = accepted.get(&name) else {
            return Err(SqlApiError::SqlApi(format!("Unknown connection argument: {}", name)));
        };
        if arg_meta.arg_type != ArgType::Path {
            continue;
        }

        let value = args.get(&name).cloned().unwrap_or(JsonValue::Null);
        let path = match &value {
            JsonValue::String(path) => check_local_file(path)?,
            JsonValue::Object(obj) => {
                if let Some(JsonValue::String(path)) = obj.get("path") {
                    check_local_file(path)?
                } else if let Some(JsonValue::String(url)) = obj.get("url") {
                    let path = download_file(url).await?;
                    downloads.push(PathBuf::from(&path));
                    path
                } else {
                    return Err(SqlApiError::SqlApi(format!(
                        "Argument '{}' must be path or url to the file",
                        name
                    )));
                }
            }
            other => {
                return Err(SqlApiError::SqlApi(format!("Unknown type of arg: '{}'", other)));
            }
        };
        args.insert(name, JsonValue::String(path));
    }

    Ok(args)
}

fn check_local_file(path: &str) -> Result<String, SqlApiError> {
    if Path::new(path).is_file() {
        Ok(path.to_string())
    } else {
        Err(SqlApiError::SqlApi(format!("File not found at: '{}'", path)))
    }
}

/// Fetch `url` into a fresh file under the system temp directory
async fn download_file(url: &str) -> Result<String, SqlApiError> {
    let parsed = Url::parse(url).map_err(|e| SqlApiError::SqlApi(format!("Wrong file url {}: {}", url, e)))?;
    debug!(url = %parsed, "Downloading connection file");

    let response = HttpClient::new()
        .get(parsed.clone())
        .send()
        .await
        .map_err(|e| SqlApiError::SqlApi(format!("Failed to download file from {}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(SqlApiError::SqlApi(format!(
            "Failed to download file from {}: status {}",
            url,
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| SqlApiError::SqlApi(format!("Failed to download file from {}: {}", url, e)))?;

    // Keep the file extension of the url
    let extension = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|file| file.rsplit_once('.'))
        .map(|(_, ext)| format!(".{}", ext))
        .unwrap_or_default();
    let path = std::env::temp_dir().join(format!("mindsdb_{}{}", Uuid::new_v4(), extension));
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| SqlApiError::Internal(format!("Failed to store downloaded file: {}", e)))?;

    info!(url = %url, path = %path.display(), "Connection file downloaded");
    Ok(path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConnectionArg, ImportStatus};
    use serde_json::json;
    use std::io::Write;

    fn meta() -> HandlerMeta {
        HandlerMeta::new("postgres", IntegrationKind::Data)
            .with_arg("host", ConnectionArg::new(ArgType::Str, "Host", true))
            .with_arg("sslrootcert", ConnectionArg::new(ArgType::Path, "CA file", false))
    }

    fn args(value: JsonValue) -> JsonMap {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_unknown_argument_is_rejected() {
        let err = prepare_connection_args(&meta(), args(json!({"host": "h", "port": 5432})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown connection argument: port");
    }

    #[tokio::test]
    async fn test_as_service_is_tolerated() {
        let out = prepare_connection_args(&meta(), args(json!({"host": "h", "as_service": true})))
            .await
            .unwrap();
        assert_eq!(out.args.len(), 2);
        assert!(out.downloads.is_empty());
    }

    #[tokio::test]
    async fn test_path_argument_must_exist() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cert").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let out = prepare_connection_args(&meta(), args(json!({"sslrootcert": {"path": path.clone()}})))
            .await
            .unwrap();
        assert_eq!(out.args["sslrootcert"], json!(path));

        let err = prepare_connection_args(&meta(), args(json!({"sslrootcert": "/no/such/file.pem"})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "File not found at: '/no/such/file.pem'");

        let err = prepare_connection_args(&meta(), args(json!({"sslrootcert": {"other": 1}})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Argument 'sslrootcert' must be path or url to the file");
    }

    #[tokio::test]
    async fn test_malformed_url_is_rejected_before_download() {
        let err = prepare_connection_args(&meta(), args(json!({"sslrootcert": {"url": "not a url"}})))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Wrong file url not a url"));
    }

    #[tokio::test]
    async fn test_discard_removes_downloaded_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cert.pem");
        std::fs::write(&path, "cert").unwrap();

        let prepared = PreparedArgs {
            args: args(json!({"sslrootcert": path.to_string_lossy()})),
            downloads: vec![path.clone()],
        };
        prepared.discard().await;
        assert!(!path.exists());
    }

    #[test]
    fn test_broken_module_is_listed_but_unusable() {
        let registry = HandlerRegistry::new().with_module(HandlerModule::broken(
            HandlerMeta::new("Broken", IntegrationKind::Data).with_import(ImportStatus::failed("missing dependency")),
        ));
        assert_eq!(registry.list().len(), 1);
        let module = registry.get("broken").unwrap();
        assert!(!module.is_usable());
        let err = registry
            .create_data_handler("broken", "db", &JsonMap::new())
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "Handler 'broken' can not be used");
    }
}
