use serde::{Deserialize, Serialize};
use thiserror::Error;

/// SQL-level error types surfaced to the client
///
/// Every variant carries the user-visible message. The MySQL-compatible
/// error number is available through [`SqlApiError::code`].
#[derive(Debug, Error)]
pub enum SqlApiError {
    #[error("{0}")]
    BadTable(String),

    #[error("{0}")]
    TableExists(String),

    #[error("{0}")]
    TableNotFound(String),

    #[error("{0}")]
    BadDb(String),

    #[error("{0}")]
    NotSupportedYet(String),

    #[error("{0}")]
    SqlWrongArguments(String),

    #[error("{0}")]
    SqlApi(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SqlApiError {
    /// MySQL error number reported on the wire
    pub fn code(&self) -> u16 {
        match self {
            SqlApiError::BadTable(_) => 1051,
            SqlApiError::TableExists(_) => 1050,
            SqlApiError::TableNotFound(_) => 1146,
            SqlApiError::BadDb(_) => 1049,
            SqlApiError::NotSupportedYet(_) => 1235,
            SqlApiError::SqlWrongArguments(_) => 1583,
            SqlApiError::SqlApi(_) => 1149,
            SqlApiError::Internal(_) => 1105,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SqlApiError::BadTable(_) => "BAD_TABLE",
            SqlApiError::TableExists(_) => "TABLE_EXISTS",
            SqlApiError::TableNotFound(_) => "TABLE_NOT_FOUND",
            SqlApiError::BadDb(_) => "BAD_DB",
            SqlApiError::NotSupportedYet(_) => "NOT_SUPPORTED_YET",
            SqlApiError::SqlWrongArguments(_) => "WRONG_ARGUMENTS",
            SqlApiError::SqlApi(_) => "SQL_API_ERROR",
            SqlApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn detail(&self) -> ErrorDetail {
        ErrorDetail::new(self.kind(), self.to_string()).with_code(self.code())
    }
}

/// Serializable error payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

impl ErrorDetail {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }
}

/// Errors raised by metadata controllers
///
/// Not-found, duplicate and validation failures are user-facing and get
/// re-raised by the router as [`SqlApiError::SqlApi`] with the original message.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ControllerError> for SqlApiError {
    fn from(err: ControllerError) -> Self {
        match err {
            ControllerError::NotFound(msg)
            | ControllerError::AlreadyExists(msg)
            | ControllerError::Invalid(msg) => SqlApiError::SqlApi(msg),
            ControllerError::Internal(err) => SqlApiError::Internal(format!("{:#}", err)),
        }
    }
}

/// Convert anyhow::Error to SqlApiError
impl From<anyhow::Error> for SqlApiError {
    fn from(err: anyhow::Error) -> Self {
        SqlApiError::Internal(format!("{:#}", err))
    }
}

impl From<datafusion::error::DataFusionError> for SqlApiError {
    fn from(err: datafusion::error::DataFusionError) -> Self {
        SqlApiError::SqlApi(err.to_string())
    }
}

pub type SqlResult<T> = Result<T, SqlApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_errors_become_user_facing() {
        let err: SqlApiError = ControllerError::NotFound("Agent 'a1' does not exist".to_string()).into();
        assert!(matches!(err, SqlApiError::SqlApi(_)));
        assert_eq!(err.to_string(), "Agent 'a1' does not exist");

        let err: SqlApiError = ControllerError::Internal(anyhow::anyhow!("boom")).into();
        assert!(matches!(err, SqlApiError::Internal(_)));
    }

    #[test]
    fn test_error_detail_creation() {
        let detail = SqlApiError::BadDb("Database x does not exists".to_string()).detail();
        assert_eq!(detail.kind, "BAD_DB");
        assert_eq!(detail.code, Some(1049));
        assert_eq!(detail.message, "Database x does not exists");
    }
}
