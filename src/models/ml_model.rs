use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use uuid::Uuid;

use super::{format_timestamp, Row};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Generating,
    Training,
    Complete,
    Error,
}

impl ModelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelStatus::Generating => "generating",
            ModelStatus::Training => "training",
            ModelStatus::Complete => "complete",
            ModelStatus::Error => "error",
        }
    }

    /// Training or generating, i.e. work still in flight
    pub fn is_in_progress(&self) -> bool {
        matches!(self, ModelStatus::Generating | ModelStatus::Training)
    }
}

/// Whether a newer engine version makes the model stale
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    UpToDate,
    Available,
    Updating,
}

impl UpdateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateStatus::UpToDate => "up_to_date",
            UpdateStatus::Available => "available",
            UpdateStatus::Updating => "updating",
        }
    }
}

/// One version of a named model
///
/// Identity is (project, name, version). Exactly one version per
/// (project, name) carries `active = true`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelRecord {
    pub id: String,
    pub project: String,
    pub name: String,
    pub version: u32,
    pub active: bool,
    /// Handler name, e.g. `lightwood`
    pub engine: String,
    /// ML engine integration the model was trained with
    pub engine_name: String,
    pub status: ModelStatus,
    pub accuracy: Option<f64>,
    pub predict: Option<String>,
    pub update_status: UpdateStatus,
    pub mindsdb_version: String,
    pub error: Option<String>,
    pub select_data_query: Option<String>,
    pub training_options: Map<String, JsonValue>,
    pub current_training_phase: Option<u32>,
    pub total_training_phases: Option<u32>,
    pub training_phase_name: Option<String>,
    pub label: Option<String>,
    /// Data integration the training data came from
    pub data_integration: Option<String>,
    /// Input columns seen at training time
    pub columns: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub training_start_at: Option<DateTime<Utc>>,
    pub training_stop_at: Option<DateTime<Utc>>,
}

impl ModelRecord {
    pub fn new(project: impl Into<String>, name: impl Into<String>, engine: impl Into<String>, engine_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            project: project.into(),
            name: name.into(),
            version: 1,
            active: true,
            engine: engine.into(),
            engine_name: engine_name.into(),
            status: ModelStatus::Generating,
            accuracy: None,
            predict: None,
            update_status: UpdateStatus::UpToDate,
            mindsdb_version: env!("CARGO_PKG_VERSION").to_string(),
            error: None,
            select_data_query: None,
            training_options: Map::new(),
            current_training_phase: None,
            total_training_phases: None,
            training_phase_name: None,
            label: None,
            data_integration: None,
            columns: Vec::new(),
            created_at: Utc::now(),
            training_start_at: None,
            training_stop_at: None,
        }
    }

    pub fn mark_training(&mut self) {
        self.status = ModelStatus::Training;
        self.training_start_at = Some(Utc::now());
        self.training_stop_at = None;
    }

    pub fn mark_complete(&mut self) {
        self.status = ModelStatus::Complete;
        self.training_stop_at = Some(Utc::now());
    }

    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.status = ModelStatus::Error;
        self.error = Some(message.into());
        self.training_stop_at = Some(Utc::now());
    }

    /// Training duration formatted as `H:MM:SS`
    pub fn training_time(&self) -> Option<String> {
        let start = self.training_start_at?;
        let stop = self.training_stop_at?;
        let secs = (stop - start).num_seconds().max(0);
        Some(format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60))
    }

    fn training_options_value(&self) -> JsonValue {
        if self.training_options.is_empty() {
            JsonValue::Null
        } else {
            JsonValue::String(JsonValue::Object(self.training_options.clone()).to_string())
        }
    }

    /// Row in MODELS column order
    pub fn to_models_row(&self) -> Row {
        vec![
            json!(self.name),
            json!(self.engine_name),
            json!(self.project),
            json!(self.version),
            json!(self.status.as_str()),
            json!(self.accuracy),
            json!(self.predict),
            json!(self.update_status.as_str()),
            json!(self.mindsdb_version),
            json!(self.error),
            json!(self.select_data_query),
            self.training_options_value(),
            json!(self.current_training_phase),
            json!(self.total_training_phases),
            json!(self.training_phase_name),
            json!(self.label),
            json!(format_timestamp(&self.created_at)),
            json!(self.training_time()),
        ]
    }

    /// Row in MODELS_VERSIONS column order
    pub fn to_versions_row(&self) -> Row {
        vec![
            json!(self.name),
            json!(self.engine_name),
            json!(self.project),
            json!(self.active),
            json!(self.version),
            json!(self.status.as_str()),
            json!(self.accuracy),
            json!(self.predict),
            json!(self.update_status.as_str()),
            json!(self.mindsdb_version),
            json!(self.error),
            json!(self.select_data_query),
            self.training_options_value(),
            json!(self.label),
            json!(format_timestamp(&self.created_at)),
            json!(self.training_time()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_training_time_format() {
        let mut model = ModelRecord::new("proj", "m", "lightwood", "lightwood");
        let start = Utc::now();
        model.training_start_at = Some(start);
        model.training_stop_at = Some(start + Duration::seconds(3725));
        assert_eq!(model.training_time().as_deref(), Some("1:02:05"));
    }

    #[test]
    fn test_row_shapes() {
        let model = ModelRecord::new("proj", "m", "lightwood", "lightwood");
        assert_eq!(model.to_models_row().len(), 18);
        assert_eq!(model.to_versions_row().len(), 16);
        assert_eq!(model.to_versions_row()[3], json!(true));
    }
}
