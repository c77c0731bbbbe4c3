// Project data node
//
// Tables of a project are the catalog-backed listings (filtered to this
// project), its active models and its views.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{DataNode, DataNodeType};
use crate::catalog::{registry, InformationSchemaDataNode};
use crate::error::{SqlApiError, SqlResult};
use crate::models::{ModelRecord, ProjectRecord, TableEntry, TableKind, TabularResult, UpdateStatus};
use crate::services::engine::ExecutionOptions;
use crate::services::query_context::ContextKind;
use crate::services::session::{ControllerSet, SessionController};
use crate::sql::{and_with, parse_query, Expr, Identifier, JsonMap, Select, TableRef};

/// Project tables answered by the virtual catalog with a project filter
pub const CATALOG_BACKED_TABLES: &[&str] = &[
    "models",
    "models_versions",
    "jobs",
    "jobs_history",
    "mdb_triggers",
    "chatbots",
    "skills",
    "agents",
];

/// Legacy table name still accepted for `models`
const LEGACY_MODELS_ALIAS: &str = "predictors";

pub struct ProjectDataNode {
    project: ProjectRecord,
    controllers: Arc<ControllerSet>,
}

impl ProjectDataNode {
    pub fn new(project: ProjectRecord, controllers: Arc<ControllerSet>) -> Self {
        Self { project, controllers }
    }

    pub fn project(&self) -> &ProjectRecord {
        &self.project
    }

    fn catalog_table(name: &str) -> Option<&'static str> {
        let name = if name.eq_ignore_ascii_case(LEGACY_MODELS_ALIAS) {
            "models"
        } else {
            name
        };
        CATALOG_BACKED_TABLES
            .iter()
            .copied()
            .find(|t| t.eq_ignore_ascii_case(name))
    }

    /// Table entry by name, or `None` when the project has no such table
    pub async fn resolve(&self, table: &str) -> SqlResult<Option<TableEntry>> {
        let tables = self.list_tables().await?;
        Ok(tables.into_iter().find(|t| t.name.eq_ignore_ascii_case(table)))
    }

    async fn list_tables(&self) -> SqlResult<Vec<TableEntry>> {
        let mut tables: Vec<TableEntry> = CATALOG_BACKED_TABLES
            .iter()
            .map(|name| TableEntry::new(*name, TableKind::BaseTable))
            .collect();

        let models = self
            .controllers
            .models
            .list_models(Some(&self.project.name), true)
            .await?;
        tables.extend(
            models
                .into_iter()
                .map(|m| TableEntry::new(m.name, TableKind::Model).deletable()),
        );

        let views = self.controllers.views.list(&self.project.name).await?;
        tables.extend(views.into_iter().map(|v| TableEntry::new(v.name, TableKind::View)));

        Ok(tables)
    }

    /// Run `model` over `input`, one output row per input row
    ///
    /// The active version is used unless `version` is given.
    pub async fn predict(
        &self,
        model_name: &str,
        input: &TabularResult,
        version: Option<u32>,
        params: &JsonMap,
    ) -> SqlResult<TabularResult> {
        let model = self.get_model(model_name, version).await?;
        if model.update_status == UpdateStatus::Available {
            return Err(SqlApiError::SqlApi(format!(
                "model '{}' is obsolete and needs to be updated. Run 'RETRAIN {};'",
                model_name, model_name
            )));
        }

        debug!(
            project = %self.project.name,
            model = %model.name,
            version = model.version,
            rows = input.row_count(),
            "Predict"
        );
        let handler = self.controllers.integrations.ml_handler(&model.engine_name).await?;
        Ok(handler.predict(&model, input, params).await?)
    }

    async fn get_model(&self, model_name: &str, version: Option<u32>) -> SqlResult<ModelRecord> {
        let model = self
            .controllers
            .models
            .get_model(&self.project.name, model_name, version)
            .await?;
        model.ok_or_else(|| match version {
            Some(version) => SqlApiError::SqlApi(format!(
                "Model '{}' version {} does not exists",
                model_name, version
            )),
            None => SqlApiError::SqlApi(format!("Model '{}' does not exists", model_name)),
        })
    }

    /// Execute a view body and apply the residual parts of `select`
    async fn query_view(&self, view_name: &str, select: &Select, session: &SessionController) -> SqlResult<TabularResult> {
        let view = self
            .controllers
            .views
            .get(&self.project.name, view_name)
            .await?
            .ok_or_else(|| {
                SqlApiError::TableNotFound(format!(
                    "Table '{}' not found in database '{}'",
                    view_name, self.project.name
                ))
            })?;

        let body = parse_query(&view.query)?;
        let options = ExecutionOptions {
            limit: None,
            context: Some((ContextKind::View, view.id.clone())),
        };
        let data = self
            .controllers
            .engine
            .execute_query(&body, session, options)
            .await
            .map_err(|e| {
                debug!(view = %view.name, error = %e, "View execution failed");
                SqlApiError::SqlApi(format!("Cant execute view query: {}", view.query))
            })?;

        self.controllers.evaluator.query_df(&data, select).await
    }
}

#[async_trait]
impl DataNode for ProjectDataNode {
    fn node_type(&self) -> DataNodeType {
        DataNodeType::Project
    }

    fn name(&self) -> &str {
        &self.project.name
    }

    async fn get_tables(&self, _session: &SessionController) -> SqlResult<Vec<TableEntry>> {
        self.list_tables().await
    }

    async fn get_table_columns(&self, table: &str, session: &SessionController) -> SqlResult<Vec<String>> {
        if let Some(catalog) = Self::catalog_table(table) {
            return Ok(registry::columns_of(catalog)?.iter().map(|c| c.to_string()).collect());
        }

        if let Some(model) = self
            .controllers
            .models
            .get_model(&self.project.name, table, None)
            .await?
        {
            let mut columns = model.columns.clone();
            if let Some(target) = &model.predict {
                if !columns.iter().any(|c| c == target) {
                    columns.push(target.clone());
                }
            }
            return Ok(columns);
        }

        let mut probe = Select::star_from(Identifier::new([self.project.name.as_str(), table]));
        probe.limit = Some(1);
        Ok(self.query_view(table, &probe, session).await?.columns)
    }

    async fn query(&self, select: &Select, session: &SessionController) -> SqlResult<TabularResult> {
        let table = select
            .table_name()
            .ok_or_else(|| SqlApiError::BadTable(format!("Wrong table in query to project '{}': {}", self.project.name, select)))?;

        if let Some(catalog) = Self::catalog_table(table.last()) {
            let project_filter = Expr::eq(Expr::ident("project"), Expr::string(self.project.name.clone()));
            let mut redirected = select.clone();
            redirected.from = Some(TableRef::table(Identifier::new(["information_schema", catalog])));
            redirected.where_clause = Some(and_with(redirected.where_clause.take(), project_filter));
            return InformationSchemaDataNode::new(Arc::clone(&self.controllers))
                .query(&redirected, session)
                .await;
        }

        self.query_view(table.last(), select, session).await
    }

    fn as_project(&self) -> Option<&ProjectDataNode> {
        Some(self)
    }
}
