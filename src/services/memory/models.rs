// In-memory model store
//
// Training runs inline: a version is stored as `training`, handed to its ML
// handler with the store unlocked and finished as `complete` or `error`
// before the call returns.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::ControllerError;
use crate::models::{IntegrationKind, ModelRecord, ModelStatus, TabularResult};
use crate::services::controllers::{ControllerResult, IntegrationController, ModelController, TrainingRequest};
use crate::services::handlers::MlHandler;
use crate::sql::{Constant, JsonMap};

pub struct InMemoryModelController {
    integrations: Arc<dyn IntegrationController>,
    models: RwLock<Vec<ModelRecord>>,
}

fn same_model(model: &ModelRecord, project: &str, name: &str) -> bool {
    model.project.eq_ignore_ascii_case(project) && model.name.eq_ignore_ascii_case(name)
}

impl InMemoryModelController {
    pub fn new(integrations: Arc<dyn IntegrationController>) -> Self {
        Self {
            integrations,
            models: RwLock::new(Vec::new()),
        }
    }

    /// Train `model` in place; a handler failure leaves it in `error` state
    async fn train(handler: Arc<dyn MlHandler>, model: &mut ModelRecord, data: &TabularResult) {
        match handler.learn(model, data).await {
            Ok(accuracy) => {
                model.accuracy = accuracy;
                model.mark_complete();
                debug!(project = %model.project, model = %model.name, version = model.version, "Model trained");
            }
            Err(e) => {
                warn!(project = %model.project, model = %model.name, version = model.version, error = %e, "Training failed");
                model.mark_error(e.to_string());
            }
        }
    }

    /// Store `model` under the next free version number, marked `training`
    ///
    /// The number is taken under the write lock so two trainings of one
    /// model never share it. The first version is active from the start,
    /// whatever its training ends with.
    async fn reserve(&self, mut model: ModelRecord, first: bool) -> ControllerResult<ModelRecord> {
        let mut models = self.models.write().await;
        let latest = models
            .iter()
            .filter(|m| same_model(m, &model.project, &model.name))
            .map(|m| m.version)
            .max();
        match (first, latest) {
            (true, Some(_)) => {
                return Err(ControllerError::AlreadyExists(format!("Model '{}' already exists", model.name)));
            }
            (false, None) => {
                return Err(ControllerError::NotFound(format!("Model '{}' does not exists", model.name)));
            }
            _ => {}
        }
        model.version = latest.unwrap_or(0) + 1;
        model.active = first;
        model.mark_training();
        models.push(model.clone());
        Ok(model)
    }

    /// Replace the reserved version with its trained state
    ///
    /// A later version becomes active only when asked and trained.
    async fn publish(&self, mut model: ModelRecord, activate: bool) -> ControllerResult<ModelRecord> {
        let mut models = self.models.write().await;
        let idx = models.iter().position(|m| m.id == model.id).ok_or_else(|| {
            ControllerError::NotFound(format!("Model '{}' was dropped during training", model.name))
        })?;
        model.active = models[idx].active;
        if activate && !model.active && model.status == ModelStatus::Complete {
            for other in models.iter_mut().filter(|m| same_model(m, &model.project, &model.name)) {
                other.active = false;
            }
            model.active = true;
        }
        models[idx] = model.clone();
        Ok(model)
    }

    /// Copy of the active (else latest) version carrying the request's changes
    async fn next_version(&self, request: &TrainingRequest) -> ControllerResult<ModelRecord> {
        let models = self.models.read().await;
        let versions: Vec<&ModelRecord> = models
            .iter()
            .filter(|m| same_model(m, &request.project, &request.name))
            .collect();
        let base = versions
            .iter()
            .find(|m| m.active)
            .or_else(|| versions.iter().max_by_key(|m| m.version))
            .ok_or_else(|| ControllerError::NotFound(format!("Model '{}' does not exists", request.name)))?;

        let mut model = ModelRecord::clone(base);
        model.id = uuid::Uuid::new_v4().to_string();
        model.created_at = chrono::Utc::now();
        model.active = false;
        model.error = None;
        model.accuracy = None;
        model.label = request.label.clone();
        if let Some(engine_name) = &request.engine_name {
            model.engine_name = engine_name.clone();
        }
        if request.data_integration.is_some() {
            model.data_integration = request.data_integration.clone();
        }
        if request.query.is_some() {
            model.select_data_query = request.query.clone();
        }
        if let Some(target) = request.targets.first() {
            model.predict = Some(target.clone());
            model.columns.retain(|c| !c.eq_ignore_ascii_case(target));
        }
        for (key, value) in &request.training_options {
            model.training_options.insert(key.clone(), value.clone());
        }
        Ok(model)
    }

    async fn train_next_version(&self, request: TrainingRequest) -> ControllerResult<ModelRecord> {
        let model = self.next_version(&request).await?;
        let handler = self.integrations.ml_handler(&model.engine_name).await?;
        let data = request.training_data.clone().unwrap_or_default();

        let mut model = self.reserve(model, false).await?;
        if !data.columns.is_empty() {
            model.columns = input_columns(&data, model.predict.as_deref());
        }
        Self::train(handler, &mut model, &data).await;
        self.publish(model, request.activate).await
    }
}

fn input_columns(data: &TabularResult, target: Option<&str>) -> Vec<String> {
    data.columns
        .iter()
        .filter(|c| target.map_or(true, |t| !c.eq_ignore_ascii_case(t)))
        .cloned()
        .collect()
}

#[async_trait]
impl ModelController for InMemoryModelController {
    async fn get_model(&self, project: &str, name: &str, version: Option<u32>) -> ControllerResult<Option<ModelRecord>> {
        Ok(self
            .models
            .read()
            .await
            .iter()
            .filter(|m| same_model(m, project, name))
            .find(|m| match version {
                Some(version) => m.version == version,
                None => m.active,
            })
            .cloned())
    }

    async fn list_models(&self, project: Option<&str>, active_only: bool) -> ControllerResult<Vec<ModelRecord>> {
        Ok(self
            .models
            .read()
            .await
            .iter()
            .filter(|m| project.map_or(true, |p| m.project.eq_ignore_ascii_case(p)))
            .filter(|m| !active_only || m.active)
            .cloned()
            .collect())
    }

    async fn create_model(&self, request: TrainingRequest) -> ControllerResult<ModelRecord> {
        let engine_name = request
            .engine_name
            .clone()
            .ok_or_else(|| ControllerError::Invalid("ML engine is not set".to_string()))?;
        let engine = self
            .integrations
            .get(&engine_name)
            .await?
            .filter(|r| r.kind == IntegrationKind::Ml)
            .ok_or_else(|| ControllerError::NotFound(format!("ML engine '{}' does not exists", engine_name)))?;
        let handler = self.integrations.ml_handler(&engine.name).await?;

        let mut model = ModelRecord::new(&request.project, &request.name, &engine.engine, &engine.name);
        model.predict = request.targets.first().cloned();
        model.label = request.label.clone();
        model.data_integration = request.data_integration.clone();
        model.select_data_query = request.query.clone();
        model.training_options = request.training_options.clone();

        let data = request.training_data.unwrap_or_default();
        model.columns = input_columns(&data, model.predict.as_deref());
        let mut model = self.reserve(model, true).await?;
        Self::train(handler, &mut model, &data).await;
        self.publish(model, true).await
    }

    async fn retrain_model(&self, request: TrainingRequest) -> ControllerResult<ModelRecord> {
        self.train_next_version(request).await
    }

    async fn finetune_model(&self, request: TrainingRequest) -> ControllerResult<ModelRecord> {
        self.train_next_version(request).await
    }

    async fn describe_model(&self, project: &str, name: &str, attribute: Option<&str>) -> ControllerResult<TabularResult> {
        let model = self
            .get_model(project, name, None)
            .await?
            .ok_or_else(|| ControllerError::NotFound(format!("Model not found: {}", name)))?;

        match attribute.map(str::to_lowercase).as_deref() {
            None | Some("info") => Ok(TabularResult::new(
                crate::catalog::registry::MODELS_COLUMNS
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
                vec![model.to_models_row()],
            )),
            Some("features") => {
                let mut rows: Vec<Vec<JsonValue>> = model
                    .columns
                    .iter()
                    .map(|c| vec![json!(c), json!("text"), json!("feature")])
                    .collect();
                if let Some(target) = &model.predict {
                    rows.push(vec![json!(target), json!("text"), json!("target")]);
                }
                Ok(TabularResult::new(
                    vec!["column".into(), "type".into(), "role".into()],
                    rows,
                ))
            }
            Some(other) => Err(ControllerError::Invalid(format!("Model has no attribute: {}", other))),
        }
    }

    async fn delete_model(&self, project: &str, name: &str) -> ControllerResult<()> {
        let mut models = self.models.write().await;
        let before = models.len();
        models.retain(|m| !same_model(m, project, name));
        if models.len() == before {
            return Err(ControllerError::NotFound(format!("Model does not exists: {}", name)));
        }
        Ok(())
    }

    async fn update_model_version(&self, project: &str, name: &str, version: u32, changes: &JsonMap) -> ControllerResult<()> {
        let mut models = self.models.write().await;
        let idx = models
            .iter()
            .position(|m| same_model(m, project, name) && m.version == version)
            .ok_or_else(|| {
                ControllerError::NotFound(format!("Model version {} of '{}.{}' is not found", version, project, name))
            })?;

        for (key, value) in changes {
            match key.as_str() {
                "active" => {
                    if !Constant::from_json(value).is_truthy() {
                        return Err(ControllerError::Invalid(
                            "Can't deactivate a version, activate another one instead".to_string(),
                        ));
                    }
                    for model in models.iter_mut().filter(|m| same_model(m, project, name)) {
                        model.active = false;
                    }
                    models[idx].active = true;
                }
                "tag" | "label" => {
                    models[idx].label = match value {
                        JsonValue::Null => None,
                        JsonValue::String(s) => Some(s.clone()),
                        other => Some(other.to_string()),
                    };
                }
                other => {
                    return Err(ControllerError::Invalid(format!("Can't update model version column: {}", other)));
                }
            }
        }
        Ok(())
    }

    async fn delete_model_version(&self, project: &str, name: &str, version: u32) -> ControllerResult<()> {
        let mut models = self.models.write().await;
        let idx = models
            .iter()
            .position(|m| same_model(m, project, name) && m.version == version)
            .ok_or_else(|| {
                ControllerError::NotFound(format!("Model version {} of '{}.{}' is not found", version, project, name))
            })?;
        if models[idx].active {
            return Err(ControllerError::Invalid("Can't remove active version".to_string()));
        }
        models.remove(idx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluatorConfig;
    use crate::models::IntegrationRecord;
    use crate::services::datafusion::TabularEvaluator;
    use crate::services::memory::{default_handlers, InMemoryIntegrationController};

    fn controller() -> InMemoryModelController {
        let evaluator = Arc::new(TabularEvaluator::new(&EvaluatorConfig::default()));
        let seed = vec![IntegrationRecord::new("lightwood", "lightwood", IntegrationKind::Ml, JsonMap::new())];
        let integrations = Arc::new(InMemoryIntegrationController::new(default_handlers(&evaluator), seed));
        InMemoryModelController::new(integrations)
    }

    fn request(name: &str) -> TrainingRequest {
        TrainingRequest {
            project: "proj".to_string(),
            name: name.to_string(),
            engine_name: Some("lightwood".to_string()),
            targets: vec!["y".to_string()],
            activate: true,
            training_data: Some(TabularResult::new(
                vec!["x".into(), "y".into()],
                vec![vec![json!(1), json!(2)]],
            )),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_trains_first_version() {
        let models = controller();
        let model = models.create_model(request("m")).await.unwrap();
        assert_eq!(model.version, 1);
        assert!(model.active);
        assert_eq!(model.status, ModelStatus::Complete);
        assert_eq!(model.columns, vec!["x"]);

        let err = models.create_model(request("M")).await.unwrap_err();
        assert_eq!(err.to_string(), "Model 'M' already exists");
    }

    #[tokio::test]
    async fn test_version_lifecycle() {
        let models = controller();
        models.create_model(request("m")).await.unwrap();

        let mut retrain = request("m");
        retrain.label = Some("second".to_string());
        let v2 = models.retrain_model(retrain).await.unwrap();
        assert_eq!(v2.version, 2);
        assert!(v2.active);
        assert!(!models.get_model("proj", "m", Some(1)).await.unwrap().unwrap().active);

        let err = models.delete_model_version("proj", "m", 2).await.unwrap_err();
        assert_eq!(err.to_string(), "Can't remove active version");

        let mut changes = JsonMap::new();
        changes.insert("active".to_string(), json!(1));
        models.update_model_version("proj", "m", 1, &changes).await.unwrap();
        assert_eq!(models.get_model("proj", "m", None).await.unwrap().unwrap().version, 1);

        models.delete_model_version("proj", "m", 2).await.unwrap();
        assert!(models.get_model("proj", "m", Some(2)).await.unwrap().is_none());
        assert_eq!(models.list_models(Some("proj"), false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_inactive_retrain_keeps_active_version() {
        let models = controller();
        models.create_model(request("m")).await.unwrap();
        let mut retrain = request("m");
        retrain.activate = false;
        let v2 = models.retrain_model(retrain).await.unwrap();
        assert!(!v2.active);
        assert_eq!(models.get_model("proj", "m", None).await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_failed_first_training_stays_active() {
        let models = controller();
        let mut req = request("bad");
        req.training_data = Some(TabularResult::new(vec!["x".into()], vec![vec![json!(1)]]));
        let model = models.create_model(req.clone()).await.unwrap();
        assert_eq!(model.status, ModelStatus::Error);
        assert!(model.active);
        assert_eq!(models.list_models(Some("proj"), true).await.unwrap().len(), 1);

        // A failed retrain leaves the first version active
        let v2 = models.retrain_model(req.clone()).await.unwrap();
        assert_eq!(v2.version, 2);
        assert!(!v2.active);
        assert_eq!(models.get_model("proj", "bad", None).await.unwrap().unwrap().version, 1);

        let err = models.create_model(req).await.unwrap_err();
        assert_eq!(err.to_string(), "Model 'bad' already exists");

        // A successful retrain takes over
        let v3 = models.retrain_model(request("bad")).await.unwrap();
        assert_eq!(v3.status, ModelStatus::Complete);
        assert!(v3.active);
        let active: Vec<u32> = models
            .list_models(Some("proj"), true)
            .await
            .unwrap()
            .iter()
            .map(|m| m.version)
            .collect();
        assert_eq!(active, vec![3]);
    }

    #[tokio::test]
    async fn test_retrain_changes_target() {
        let models = controller();
        let mut req = request("m");
        req.training_data = Some(TabularResult::new(
            vec!["x".into(), "y".into(), "z".into()],
            vec![vec![json!(1), json!(2), json!(3)]],
        ));
        models.create_model(req.clone()).await.unwrap();

        req.targets = vec!["z".to_string()];
        let v2 = models.retrain_model(req).await.unwrap();
        assert_eq!(v2.predict.as_deref(), Some("z"));
        assert_eq!(v2.columns, vec!["x", "y"]);
        assert_eq!(models.get_model("proj", "m", Some(1)).await.unwrap().unwrap().predict.as_deref(), Some("y"));
    }

    #[tokio::test]
    async fn test_concurrent_retrains_get_distinct_versions() {
        let models = controller();
        models.create_model(request("m")).await.unwrap();

        let (a, b) = tokio::join!(models.retrain_model(request("m")), models.retrain_model(request("m")));
        let mut versions = vec![a.unwrap().version, b.unwrap().version];
        versions.sort();
        assert_eq!(versions, vec![2, 3]);
        assert_eq!(models.list_models(Some("proj"), true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_version_is_not_found() {
        let models = controller();
        models.create_model(request("m")).await.unwrap();
        let err = models.delete_model_version("proj", "m", 11).await.unwrap_err();
        assert_eq!(err.to_string(), "Model version 11 of 'proj.m' is not found");
    }

    #[tokio::test]
    async fn test_describe_features() {
        let models = controller();
        models.create_model(request("m")).await.unwrap();
        let features = models.describe_model("proj", "m", Some("features")).await.unwrap();
        assert_eq!(features.rows.len(), 2);
        assert_eq!(features.rows[1][2], json!("target"));
        assert!(models.describe_model("proj", "m", Some("nope")).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_engine() {
        let models = controller();
        let mut req = request("m");
        req.engine_name = Some("nope".to_string());
        let err = models.create_model(req).await.unwrap_err();
        assert_eq!(err.to_string(), "ML engine 'nope' does not exists");
    }
}
