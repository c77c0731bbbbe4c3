// Model commands
//
// CREATE/RETRAIN/FINETUNE/DESCRIBE/DROP of predictors, plus the UPDATE and
// DELETE forms that address `models_versions`.

use chrono::{Duration, Utc};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use super::{is_truthy, ExecuteCommands};
use crate::catalog::registry::MODELS_COLUMNS;
use crate::datanodes::DataNode;
use crate::error::{SqlApiError, SqlResult};
use crate::models::{ExecuteAnswer, ModelRecord, TabularResult};
use crate::services::controllers::TrainingRequest;
use crate::sql::{
    parse_query, parse_select, CreatePredictor, Delete, Describe, DropPredictor, Expr, Identifier, JsonMap, Select,
    SelectItem, Update,
};

/// Which follow-up training a RETRAIN/FINETUNE asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum UpdateKind {
    Retrain,
    Finetune,
}

impl UpdateKind {
    fn as_str(&self) -> &'static str {
        match self {
            UpdateKind::Retrain => "retrain",
            UpdateKind::Finetune => "finetune",
        }
    }
}

/// Borrowed parts of a RETRAIN or FINETUNE statement
pub(super) struct UpdateRequest<'s> {
    pub kind: UpdateKind,
    pub name: &'s Identifier,
    pub integration: Option<&'s Identifier>,
    pub query: Option<&'s str>,
    pub targets: &'s [String],
    pub using: &'s JsonMap,
}

/// USING options with lower-cased keys
fn lowered(using: &JsonMap) -> JsonMap {
    using.iter().map(|(k, v)| (k.to_lowercase(), v.clone())).collect()
}

fn option_text(value: JsonValue) -> String {
    match value {
        JsonValue::String(s) => s,
        other => other.to_string(),
    }
}

fn model_table(model: &ModelRecord) -> TabularResult {
    TabularResult::new(
        MODELS_COLUMNS.iter().map(|c| c.to_string()).collect(),
        vec![model.to_models_row()],
    )
}

impl ExecuteCommands<'_> {
    pub(super) async fn answer_create_predictor(&mut self, statement: &CreatePredictor) -> SqlResult<ExecuteAnswer> {
        let (project, name) = self.scoped_name(&statement.name);
        self.require_project(&project).await?;

        if statement.if_not_exists && self.model_exists(&project, &name).await? {
            debug!(project = %project, model = %name, "Model exists, skipping create");
            return Ok(ExecuteAnswer::ok());
        }

        let mut using = lowered(&statement.using);
        let engine_name = using
            .remove("engine")
            .map(option_text)
            .unwrap_or_else(|| self.session.config().default_ml_engine.clone());
        let label = using.remove("tag").map(option_text);

        let integration = statement.integration_name.as_ref().map(|i| i.to_string());
        let training_data = self
            .fetch_training_data(integration.as_deref(), statement.query_str.as_deref(), None)
            .await?;

        let request = TrainingRequest {
            project,
            name,
            engine_name: Some(engine_name),
            data_integration: integration,
            query: statement.query_str.clone(),
            targets: statement.targets.clone(),
            label,
            activate: true,
            training_options: using,
            training_data,
        };
        let model = self.session.controllers.models.create_model(request).await?;
        info!(project = %model.project, model = %model.name, status = model.status.as_str(), "Model created");
        Ok(self.answer_table(model_table(&model), "models"))
    }

    pub(super) async fn answer_update_model(&mut self, request: UpdateRequest<'_>) -> SqlResult<ExecuteAnswer> {
        let (project, name) = self.scoped_name(request.name);
        let controllers = self.controllers();

        let model = controllers
            .models
            .get_model(&project, &name, None)
            .await?
            .ok_or_else(|| SqlApiError::SqlApi(format!("Model does not exists: {}.{}", project, name)))?;

        let mut using = lowered(request.using);

        // Engine: explicit override, else the one the model was trained with
        let engine_name = match using.remove("engine") {
            Some(engine) => option_text(engine),
            None => {
                if controllers.integrations.get(&model.engine_name).await?.is_none() {
                    return Err(SqlApiError::SqlApi(
                        "ML engine model was trained with does not esxists".to_string(),
                    ));
                }
                model.engine_name.clone()
            }
        };

        if self.session.config().cloud && self.session.user_class == 0 {
            self.check_training_guard(request.kind).await?;
        }

        let explicit_integration = request.integration.map(|i| i.to_string());
        let (integration, query) = match (request.kind, request.query) {
            (_, Some(query)) => (explicit_integration, Some(query.to_string())),
            (UpdateKind::Retrain, None) => (
                explicit_integration.or_else(|| model.data_integration.clone()),
                model.select_data_query.clone(),
            ),
            (UpdateKind::Finetune, None) => (explicit_integration, None),
        };
        let training_data = self
            .fetch_training_data(
                integration.as_deref(),
                query.as_deref(),
                Some("The database from which the model was trained no longer exists"),
            )
            .await?;

        let activate = using.remove("active").map_or(true, |v| is_truthy(&v));
        let label = using.remove("tag").map(option_text);
        let training = TrainingRequest {
            project,
            name,
            engine_name: Some(engine_name),
            data_integration: integration,
            query,
            targets: if request.targets.is_empty() {
                model.predict.clone().into_iter().collect()
            } else {
                request.targets.to_vec()
            },
            label,
            activate,
            training_options: using,
            training_data,
        };

        let updated = match request.kind {
            UpdateKind::Retrain => controllers.models.retrain_model(training).await?,
            UpdateKind::Finetune => controllers.models.finetune_model(training).await?,
        };
        info!(
            project = %updated.project,
            model = %updated.name,
            version = updated.version,
            kind = request.kind.as_str(),
            "Model version trained"
        );
        Ok(self.answer_table(model_table(&updated), "models"))
    }

    /// Refuse to start while another training is in flight inside the window
    ///
    /// Advisory only: two admissions racing through the check are tolerated.
    async fn check_training_guard(&self, kind: UpdateKind) -> SqlResult<()> {
        let window_start = Utc::now() - Duration::minutes(self.session.config().training_guard_minutes);
        let busy = self
            .session
            .controllers
            .models
            .list_models(None, false)
            .await?
            .into_iter()
            .any(|m| m.status.is_in_progress() && m.training_start_at.is_some_and(|t| t > window_start));

        if busy {
            return Err(SqlApiError::SqlApi(format!(
                "Can't start {} process while any other predictor is in status 'training' or 'generating'",
                kind.as_str()
            )));
        }
        Ok(())
    }

    /// Rows the model is trained on
    ///
    /// With an integration the query runs natively against that integration;
    /// otherwise it goes through the query engine.
    async fn fetch_training_data(
        &self,
        integration: Option<&str>,
        query: Option<&str>,
        missing_integration: Option<&str>,
    ) -> SqlResult<Option<TabularResult>> {
        let Some(query) = query else {
            return Ok(None);
        };

        let data = match integration {
            Some(database) => {
                let node = self.session.datahub().resolve(database).await?.ok_or_else(|| {
                    SqlApiError::SqlApi(match missing_integration {
                        Some(message) => message.to_string(),
                        None => format!("Database not found: {}", database),
                    })
                })?;
                node.query(&parse_select(query)?, &*self.session).await?
            }
            None => self.run_query(&parse_query(query)?).await?,
        };
        Ok(Some(data))
    }

    pub(super) async fn model_exists(&self, project: &str, name: &str) -> SqlResult<bool> {
        Ok(self
            .session
            .controllers
            .models
            .list_models(Some(project), false)
            .await?
            .iter()
            .any(|m| m.name.eq_ignore_ascii_case(name)))
    }

    pub(super) async fn answer_describe(&mut self, statement: &Describe) -> SqlResult<ExecuteAnswer> {
        let value = &statement.value;

        // The whole identifier first, then the trailing part as an attribute
        let mut candidates: Vec<(String, String, Option<&str>)> = Vec::new();
        if value.len() <= 2 {
            let (project, name) = self.scoped_name(value);
            candidates.push((project, name, None));
        }
        if value.len() >= 2 {
            let head = Identifier::new(value.parts[..value.len() - 1].iter().cloned());
            let (project, name) = self.scoped_name(&head);
            candidates.push((project, name, Some(value.last())));
        }

        for (project, name, attribute) in candidates {
            if !self.model_exists(&project, &name).await? {
                continue;
            }
            let result = self
                .session
                .controllers
                .models
                .describe_model(&project, &name, attribute)
                .await?;
            return Ok(self.answer_table(result, "describe"));
        }
        Err(SqlApiError::SqlApi(format!("Model not found: {}", value)))
    }

    pub(super) async fn answer_drop_predictor(&mut self, statement: &DropPredictor) -> SqlResult<ExecuteAnswer> {
        let (project, name) = self.scoped_name(&statement.name);

        if !self.model_exists(&project, &name).await? {
            if statement.if_exists {
                return Ok(ExecuteAnswer::ok());
            }
            return Err(SqlApiError::SqlApi(format!("Model does not exists: {}.{}", project, name)));
        }

        self.session.controllers.models.delete_model(&project, &name).await?;
        Ok(ExecuteAnswer::ok())
    }

    /// (project, name, version) of every `models_versions` row matching `filter`
    async fn matching_versions(&self, table: &Identifier, filter: Option<&Expr>) -> SqlResult<Vec<(String, String, u32)>> {
        let project = if table.len() > 1 {
            table.first().to_string()
        } else {
            self.session.database.clone()
        };
        let node = self
            .session
            .datahub()
            .project_node(&project)
            .await?
            .ok_or_else(|| SqlApiError::SqlApi(format!("Project not found: {}", project)))?;

        let select = Select::new(vec![
            SelectItem::new(Expr::ident("project")),
            SelectItem::new(Expr::ident("name")),
            SelectItem::new(Expr::ident("version")),
        ])
        .from_table(Identifier::single("models_versions"))
        .with_where(filter.cloned());

        let rows = node.query(&select, &*self.session).await?.rows;

        rows.into_iter()
            .map(|row| {
                let text = |idx: usize| row.get(idx).and_then(|v| v.as_str()).unwrap_or_default().to_string();
                let version = match row.get(2) {
                    Some(JsonValue::Number(n)) => n.as_u64(),
                    Some(JsonValue::String(s)) => s.parse().ok(),
                    _ => None,
                }
                .ok_or_else(|| SqlApiError::Internal("Model version is not a number".to_string()))?;
                Ok((text(0), text(1), version as u32))
            })
            .collect()
    }

    pub(super) async fn update_model_versions(&mut self, update: &Update) -> SqlResult<ExecuteAnswer> {
        let mut changes = JsonMap::new();
        for (column, value) in &update.update_columns {
            let value = match value {
                Expr::Constant(constant) => constant.to_json(),
                other => {
                    return Err(SqlApiError::SqlApi(format!(
                        "Only constant values are supported, got: {}",
                        other
                    )))
                }
            };
            changes.insert(column.to_lowercase(), value);
        }

        let versions = self.matching_versions(&update.table, update.where_clause.as_ref()).await?;
        for (project, name, version) in versions {
            self.session
                .controllers
                .models
                .update_model_version(&project, &name, version, &changes)
                .await?;
        }
        Ok(ExecuteAnswer::ok())
    }

    pub(super) async fn delete_model_versions(&mut self, delete: &Delete) -> SqlResult<ExecuteAnswer> {
        let versions = self.matching_versions(&delete.table, delete.where_clause.as_ref()).await?;
        if versions.is_empty() {
            return Err(SqlApiError::SqlApi(match &delete.where_clause {
                Some(filter) => format!("Model version is not found: {}", filter),
                None => "Model version is not found".to_string(),
            }));
        }
        for (project, name, version) in versions {
            self.session
                .controllers
                .models
                .delete_model_version(&project, &name, version)
                .await?;
        }
        Ok(ExecuteAnswer::ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_using_keys_are_lowered() {
        let mut using = JsonMap::new();
        using.insert("ENGINE".to_string(), json!("openai"));
        using.insert("Tag".to_string(), json!(3));
        let mut lowered = lowered(&using);
        assert_eq!(lowered.remove("engine").map(option_text).as_deref(), Some("openai"));
        assert_eq!(lowered.remove("tag").map(option_text).as_deref(), Some("3"));
    }

    #[test]
    fn test_model_table_has_models_shape() {
        let model = ModelRecord::new("proj", "m", "lightwood", "lightwood");
        let table = model_table(&model);
        assert_eq!(table.columns.len(), MODELS_COLUMNS.len());
        assert_eq!(table.rows[0].len(), MODELS_COLUMNS.len());
    }
}
