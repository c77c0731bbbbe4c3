// Query engine
//
// Executes resolved SELECT/UNION plans and data mutations against the
// datahub. Plans address one table per SELECT; nested subqueries and UNION
// branches are executed recursively and combined in memory.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::datanodes::DataNode;
use crate::error::{SqlApiError, SqlResult};
use crate::models::TabularResult;
use crate::services::query_context::{ContextGuard, ContextKind};
use crate::services::session::SessionController;
use crate::sql::predicates::collect_equalities;
use crate::sql::{
    extract_string_equality, Constant, Expr, Identifier, JsonMap, QueryExpr, Select, Statement, TableRef,
    UnaryOperator,
};

/// Per-call execution settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionOptions {
    /// Truncate the result to this many rows
    pub limit: Option<u64>,
    /// Context held for the duration of the call
    pub context: Option<(ContextKind, String)>,
}

impl ExecutionOptions {
    pub fn with_limit(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            context: None,
        }
    }

    pub fn in_context(mut self, kind: ContextKind, id: impl Into<String>) -> Self {
        self.context = Some((kind, id.into()));
        self
    }
}

#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn execute_query(
        &self,
        query: &QueryExpr,
        session: &SessionController,
        options: ExecutionOptions,
    ) -> SqlResult<TabularResult>;

    /// Run INSERT, UPDATE, DELETE or CREATE TABLE against the target data node
    async fn execute_mutation(&self, statement: &Statement, session: &SessionController) -> SqlResult<()>;
}

/// Table reference after resolution against the datahub
struct ResolvedTable {
    node: Arc<dyn DataNode>,
    table: String,
    version: Option<u32>,
}

/// Engine over the session's datahub
#[derive(Debug, Default, Clone, Copy)]
pub struct DataHubQueryEngine;

impl DataHubQueryEngine {
    pub fn new() -> Self {
        Self
    }

    fn enter(session: &SessionController, options: &ExecutionOptions) -> SqlResult<Option<ContextGuard>> {
        match &options.context {
            Some((kind, id)) => Ok(Some(session.contexts.acquire(*kind, id.clone())?)),
            None => Ok(None),
        }
    }

    /// Split `[db.]table[.version]` and resolve the database
    async fn resolve_table(&self, name: &Identifier, session: &SessionController) -> SqlResult<ResolvedTable> {
        let datahub = session.datahub();
        let (database, table, version) = match name.parts.as_slice() {
            [table] => (session.database.clone(), table.clone(), None),
            [first, second] => match second.parse::<u32>() {
                Ok(version) if !datahub.database_exists(first).await? => {
                    (session.database.clone(), first.clone(), Some(version))
                }
                _ => (first.clone(), second.clone(), None),
            },
            [database, table, version] => {
                let version = version.parse::<u32>().map_err(|_| {
                    SqlApiError::BadTable(format!("Wrong model version in table name: {}", name))
                })?;
                (database.clone(), table.clone(), Some(version))
            }
            _ => return Err(SqlApiError::BadTable(format!("Wrong table name: {}", name))),
        };

        let node = datahub
            .resolve(&database)
            .await?
            .ok_or_else(|| SqlApiError::TableNotFound(format!("Database '{}' not found", database)))?;

        Ok(ResolvedTable { node, table, version })
    }

    async fn execute_select(&self, select: &Select, session: &SessionController) -> SqlResult<TabularResult> {
        let evaluator = &session.controllers.evaluator;
        match &select.from {
            None => {
                let frame = TabularResult::new(vec!["__row".to_string()], vec![vec![JsonValue::Null]]);
                evaluator.query_df(&frame, select).await
            }
            Some(TableRef::Subquery { query, .. }) => {
                let data = self.execute_query(query, session, ExecutionOptions::default()).await?;
                evaluator.query_df(&data, select).await
            }
            Some(TableRef::Join { .. }) => Err(SqlApiError::NotSupportedYet(format!(
                "Joins are not supported: {}",
                select
            ))),
            Some(TableRef::Table { name, .. }) => {
                let resolved = self.resolve_table(name, session).await?;
                if let Some(project) = resolved.node.as_project() {
                    let is_model = resolved.version.is_some()
                        || session
                            .controllers
                            .models
                            .get_model(&project.project().name, &resolved.table, None)
                            .await?
                            .is_some();
                    if is_model {
                        return self.predict(project, &resolved, select, session).await;
                    }
                }
                resolved.node.query(select, session).await
            }
        }
    }

    /// One prediction row from the equality constants of the WHERE clause
    async fn predict(
        &self,
        project: &crate::datanodes::ProjectDataNode,
        resolved: &ResolvedTable,
        select: &Select,
        session: &SessionController,
    ) -> SqlResult<TabularResult> {
        let mut inputs = Vec::new();
        if let Some(where_clause) = &select.where_clause {
            collect_equalities(where_clause, &mut inputs);
        }
        let input = TabularResult::new(
            inputs.iter().map(|(name, _)| name.clone()).collect(),
            vec![inputs.iter().map(|(_, value)| value.to_json()).collect()],
        );

        let output = project
            .predict(&resolved.table, &input, resolved.version, &JsonMap::new())
            .await?;

        let mut residual = select.clone();
        residual.where_clause = None;
        session.controllers.evaluator.query_df(&output, &residual).await
    }

    /// Resolve a mutation target to its data node and table name
    async fn mutation_target(&self, table: &Identifier, session: &SessionController) -> SqlResult<ResolvedTable> {
        let resolved = self.resolve_table(table, session).await?;
        if resolved.node.as_integration().is_none() && resolved.node.as_project().is_none() {
            return Err(SqlApiError::SqlApi(format!("Table '{}' is read only", table)));
        }
        Ok(resolved)
    }
}

fn constant_value(expr: &Expr) -> SqlResult<Constant> {
    match expr {
        Expr::Constant(value) => Ok(value.clone()),
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match constant_value(expr)? {
            Constant::Int(v) => Ok(Constant::Int(-v)),
            Constant::Float(v) => Ok(Constant::Float(-v)),
            other => Err(SqlApiError::SqlApi(format!("Can't negate value: {}", other))),
        },
        other => Err(SqlApiError::SqlApi(format!("Only constant values are supported, got: {}", other))),
    }
}

fn dedup_rows(result: &mut TabularResult) {
    let mut seen = HashSet::new();
    result.rows.retain(|row| seen.insert(JsonValue::Array(row.clone()).to_string()));
}

#[async_trait]
impl QueryEngine for DataHubQueryEngine {
    async fn execute_query(
        &self,
        query: &QueryExpr,
        session: &SessionController,
        options: ExecutionOptions,
    ) -> SqlResult<TabularResult> {
        let _guard = Self::enter(session, &options)?;
        session.contexts.record_query(&query.to_string());
        debug!(query = %query, limit = ?options.limit, "Executing query");

        let mut result = match query {
            QueryExpr::Select(select) => self.execute_select(select, session).await?,
            QueryExpr::Union(union) => {
                let left = self.execute_query(&union.left, session, ExecutionOptions::default()).await?;
                let right = self.execute_query(&union.right, session, ExecutionOptions::default()).await?;
                if left.columns.len() != right.columns.len() {
                    return Err(SqlApiError::SqlApi(
                        "UNION branches must return the same number of columns".to_string(),
                    ));
                }
                let mut combined = left;
                combined.rows.extend(right.rows);
                if !union.all {
                    dedup_rows(&mut combined);
                }
                combined
            }
        };

        if let Some(limit) = options.limit {
            result.rows.truncate(limit as usize);
        }
        Ok(result)
    }

    async fn execute_mutation(&self, statement: &Statement, session: &SessionController) -> SqlResult<()> {
        session.contexts.record_query(&statement.to_string());
        debug!(statement = statement.kind_name(), "Executing mutation");

        match statement {
            Statement::Insert(insert) => {
                let target = self.mutation_target(&insert.table, session).await?;
                let data = match &insert.from_select {
                    Some(query) => {
                        let mut data = self.execute_query(query, session, ExecutionOptions::default()).await?;
                        if !insert.columns.is_empty() {
                            if insert.columns.len() != data.columns.len() {
                                return Err(SqlApiError::SqlApi(
                                    "Column count doesn't match value count".to_string(),
                                ));
                            }
                            data.columns = insert.columns.clone();
                        }
                        data
                    }
                    None => {
                        let mut rows = Vec::with_capacity(insert.values.len());
                        for values in &insert.values {
                            if values.len() != insert.columns.len() {
                                return Err(SqlApiError::SqlApi(
                                    "Column count doesn't match value count".to_string(),
                                ));
                            }
                            rows.push(
                                values
                                    .iter()
                                    .map(|v| constant_value(v).map(|c| c.to_json()))
                                    .collect::<SqlResult<Vec<_>>>()?,
                            );
                        }
                        TabularResult::new(insert.columns.clone(), rows)
                    }
                };
                let integration = target.node.as_integration().ok_or_else(|| {
                    SqlApiError::SqlApi(format!("Can't insert into table of project: {}", insert.table))
                })?;
                let inserted = integration.handler().insert(&target.table, data).await?;
                debug!(table = %target.table, rows = inserted, "Rows inserted");
                Ok(())
            }
            Statement::Update(update) => {
                if update.from_select.is_some() {
                    return Err(SqlApiError::NotSupportedYet(
                        "UPDATE ... FROM (SELECT ...) is not supported".to_string(),
                    ));
                }
                let target = self.mutation_target(&update.table, session).await?;
                let integration = target.node.as_integration().ok_or_else(|| {
                    SqlApiError::SqlApi(format!("Can't update table of project: {}", update.table))
                })?;
                let assignments = update
                    .update_columns
                    .iter()
                    .map(|(column, value)| Ok((column.clone(), constant_value(value)?)))
                    .collect::<SqlResult<Vec<_>>>()?;
                integration
                    .handler()
                    .update(&target.table, &assignments, update.where_clause.as_ref())
                    .await?;
                Ok(())
            }
            Statement::Delete(delete) => {
                let target = self.mutation_target(&delete.table, session).await?;
                if let Some(project) = target.node.as_project() {
                    let is_models = ["models", "predictors"]
                        .iter()
                        .any(|t| t.eq_ignore_ascii_case(&target.table));
                    if !is_models {
                        return Err(SqlApiError::SqlApi(format!(
                            "Can't delete from table of project: {}",
                            delete.table
                        )));
                    }
                    let name = extract_string_equality(delete.where_clause.as_ref(), "name").ok_or_else(|| {
                        SqlApiError::SqlApi("Model name must be set with `name = '...'`".to_string())
                    })?;
                    session
                        .controllers
                        .models
                        .delete_model(&project.project().name, &name)
                        .await?;
                    return Ok(());
                }
                if let Some(integration) = target.node.as_integration() {
                    integration
                        .handler()
                        .delete(&target.table, delete.where_clause.as_ref())
                        .await?;
                }
                Ok(())
            }
            Statement::CreateTable(create) => {
                let target = self.mutation_target(&create.name, session).await?;
                let integration = target.node.as_integration().ok_or_else(|| {
                    SqlApiError::SqlApi(format!("Can't create table in project: {}", create.name))
                })?;
                let query = create.from_select.as_ref().ok_or_else(|| {
                    SqlApiError::NotSupportedYet("CREATE TABLE requires a SELECT query".to_string())
                })?;
                let data = self.execute_query(query, session, ExecutionOptions::default()).await?;
                integration
                    .handler()
                    .create_table(&target.table, data, create.is_replace)
                    .await?;
                Ok(())
            }
            other => Err(SqlApiError::NotSupportedYet(format!(
                "Statement can't be executed as a mutation: {}",
                other
            ))),
        }
    }
}
