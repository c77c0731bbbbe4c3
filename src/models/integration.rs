use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationKind {
    Data,
    Ml,
}

impl IntegrationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationKind::Data => "data",
            IntegrationKind::Ml => "ml",
        }
    }
}

/// Registered external or ML data source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntegrationRecord {
    pub id: String,
    pub name: String,
    /// Handler name the integration was created with
    pub engine: String,
    pub kind: IntegrationKind,
    pub connection_data: Map<String, JsonValue>,
}

impl IntegrationRecord {
    pub fn new(
        name: impl Into<String>,
        engine: impl Into<String>,
        kind: IntegrationKind,
        connection_data: Map<String, JsonValue>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            engine: engine.into(),
            kind,
            connection_data,
        }
    }

    /// Connection data serialized for catalog output
    pub fn connection_data_string(&self) -> String {
        JsonValue::Object(self.connection_data.clone()).to_string()
    }
}

/// Declared type of a handler connection argument
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    Str,
    Int,
    Bool,
    Pwd,
    Dict,
    Path,
    Url,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionArg {
    #[serde(rename = "type")]
    pub arg_type: ArgType,
    pub description: String,
    pub required: bool,
}

impl ConnectionArg {
    pub fn new(arg_type: ArgType, description: impl Into<String>, required: bool) -> Self {
        Self {
            arg_type,
            description: description.into(),
            required,
        }
    }
}

/// Import outcome recorded for a handler module
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportStatus {
    pub success: bool,
    pub error_message: Option<String>,
}

impl ImportStatus {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
        }
    }
}

/// Static description of a handler implementation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandlerMeta {
    pub name: String,
    pub kind: IntegrationKind,
    pub title: String,
    pub description: String,
    pub version: String,
    /// Declared connection arguments; `None` when the handler does not declare any
    pub connection_args: Option<BTreeMap<String, ConnectionArg>>,
    pub import: ImportStatus,
}

impl HandlerMeta {
    pub fn new(name: impl Into<String>, kind: IntegrationKind) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            kind,
            description: String::new(),
            version: "0.0.1".to_string(),
            connection_args: None,
            import: ImportStatus::succeeded(),
        }
    }

    pub fn with_arg(mut self, name: impl Into<String>, arg: ConnectionArg) -> Self {
        self.connection_args
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), arg);
        self
    }

    pub fn with_import(mut self, import: ImportStatus) -> Self {
        self.import = import;
        self
    }

    pub fn connection_args_string(&self) -> Option<String> {
        self.connection_args
            .as_ref()
            .and_then(|args| serde_json::to_string(args).ok())
    }
}
