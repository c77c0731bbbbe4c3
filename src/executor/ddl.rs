// Database, ML engine, table and view DDL

use tracing::{debug, info, warn};

use super::ExecuteCommands;
use crate::catalog::{FILES_DATABASE, INFORMATION_SCHEMA};
use crate::datanodes::DataNode;
use crate::error::{ControllerError, SqlApiError, SqlResult};
use crate::models::{ExecuteAnswer, IntegrationKind};
use crate::services::engine::ExecutionOptions;
use crate::services::handlers::prepare_connection_args;
use crate::services::query_context::ContextKind;
use crate::sql::{
    parse_query, CreateDatabase, CreateMlEngine, CreateView, DropDatabase, DropMlEngine, DropTables, DropView,
    Identifier, QueryExpr, TableRef,
};

/// Engine name that creates a project instead of an integration
const PROJECT_ENGINE: &str = "mindsdb";

impl ExecuteCommands<'_> {
    pub(super) async fn answer_create_database(&mut self, statement: &CreateDatabase) -> SqlResult<ExecuteAnswer> {
        if statement.name.len() != 1 {
            return Err(SqlApiError::SqlApi("Database name should contain only 1 part.".to_string()));
        }
        let name = statement.name.first();
        let engine = statement.engine.as_deref().unwrap_or(PROJECT_ENGINE);
        let controllers = self.controllers();

        let exists = self.session.datahub().database_exists(name).await?
            || controllers.integrations.get(name).await?.is_some();
        if exists {
            if statement.if_not_exists {
                return Ok(ExecuteAnswer::ok());
            }
            return Err(SqlApiError::SqlApi(format!("Database '{}' already exists.", name)));
        }

        if engine.eq_ignore_ascii_case(PROJECT_ENGINE) {
            controllers.projects.add(name).await?;
            return Ok(ExecuteAnswer::ok());
        }

        // Validate the handler and its connection arguments
        let registry = controllers.integrations.handlers();
        let module = registry
            .get(engine)
            .filter(|m| m.is_usable() && m.meta.kind == IntegrationKind::Data)
            .ok_or_else(|| SqlApiError::SqlApi(format!("Handler '{}' can not be used", engine)))?;
        let prepared = prepare_connection_args(&module.meta, statement.parameters.clone()).await?;

        // Connectivity check before anything is committed
        let handler = match registry.create_data_handler(engine, name, &prepared.args) {
            Ok(handler) => handler,
            Err(e) => {
                prepared.discard().await;
                return Err(SqlApiError::SqlApi(format!("Can't connect to db: {}", e)));
            }
        };
        if let Err(e) = handler.check_connection().await {
            warn!(database = %name, engine = %engine, error = %e, "Connection check failed");
            prepared.discard().await;
            return Err(SqlApiError::SqlApi(format!("Can't connect to db: {}", e)));
        }

        controllers.integrations.add(name, engine, prepared.args).await?;
        info!(database = %name, engine = %engine, "Integration created");
        Ok(ExecuteAnswer::ok())
    }

    pub(super) async fn answer_drop_database(&mut self, statement: &DropDatabase) -> SqlResult<ExecuteAnswer> {
        let name = statement.name.last();
        let controllers = self.controllers();

        if name.eq_ignore_ascii_case(INFORMATION_SCHEMA) {
            return Err(SqlApiError::SqlApi(format!("Unable to drop: {} is system database", name)));
        }

        if controllers.projects.get(name).await?.is_some() {
            controllers.projects.delete(name).await?;
        } else if controllers.integrations.get(name).await?.is_some() {
            controllers.integrations.delete(name).await?;
        } else if !statement.if_exists {
            return Err(SqlApiError::SqlApi(format!("Database '{}' does not exists", name)));
        }

        if self.session.database.eq_ignore_ascii_case(name) {
            self.session.database = self.session.config().default_project.clone();
        }
        Ok(ExecuteAnswer::ok())
    }

    pub(super) async fn answer_create_ml_engine(&mut self, statement: &CreateMlEngine) -> SqlResult<ExecuteAnswer> {
        let name = statement.name.last();
        let controllers = self.controllers();

        if controllers.integrations.get(name).await?.is_some() {
            return Err(SqlApiError::SqlApi(format!("Integration '{}' already exists", name)));
        }

        let module = controllers
            .integrations
            .handlers()
            .get(&statement.handler)
            .ok_or_else(|| SqlApiError::SqlApi(format!("There is no engine '{}'", statement.handler)))?;
        if !module.is_usable() {
            return Err(SqlApiError::SqlApi(format!(
                "Handler '{}' can not be used: {}",
                statement.handler,
                module.meta.import.error_message.as_deref().unwrap_or("import failed")
            )));
        }
        if module.meta.kind != IntegrationKind::Ml {
            return Err(SqlApiError::SqlApi(format!(
                "Handler '{}' is not an ML handler",
                statement.handler
            )));
        }

        controllers
            .integrations
            .add(name, &statement.handler, statement.params.clone())
            .await?;

        // Roll the integration back when the engine hook fails
        let hook = match controllers.integrations.ml_handler(name).await {
            Ok(handler) if handler.has_create_engine() => handler
                .create_engine(&statement.params)
                .await
                .map_err(|e| SqlApiError::SqlApi(e.to_string())),
            Ok(_) => Ok(()),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = hook {
            warn!(engine = %name, error = %e, "ML engine initialization failed, removing it");
            controllers.integrations.delete(name).await?;
            return Err(e);
        }

        info!(engine = %name, handler = %statement.handler, "ML engine created");
        Ok(ExecuteAnswer::ok())
    }

    pub(super) async fn answer_drop_ml_engine(&mut self, statement: &DropMlEngine) -> SqlResult<ExecuteAnswer> {
        let name = statement.name.last();
        let controllers = self.controllers();

        match controllers.integrations.get(name).await? {
            Some(record) if record.kind == IntegrationKind::Ml => {
                controllers.integrations.delete(name).await?;
            }
            _ if statement.if_exists => {}
            _ => {
                return Err(SqlApiError::SqlApi(format!("Integration '{}' does not exists", name)));
            }
        }
        Ok(ExecuteAnswer::ok())
    }

    pub(super) async fn answer_drop_tables(&mut self, statement: &DropTables) -> SqlResult<ExecuteAnswer> {
        let datahub = self.session.datahub();

        for table in &statement.tables {
            let (database, name) = self.scoped_name(table);

            if database.eq_ignore_ascii_case(FILES_DATABASE) {
                let files = datahub.files_node().await?.ok_or_else(|| {
                    SqlApiError::SqlApi(format!("Database '{}' does not exists", FILES_DATABASE))
                })?;
                if !files.has_table(&name, &*self.session).await? {
                    if statement.if_exists {
                        continue;
                    }
                    return Err(SqlApiError::SqlApi(
                        "Cannot delete a table from database 'files': table does not exists".to_string(),
                    ));
                }
                files.drop_table(&name).await?;
                continue;
            }

            let Some(project) = datahub.project_node(&database).await? else {
                return Err(SqlApiError::SqlApi(format!(
                    "Cannot delete a table from database '{}'",
                    database
                )));
            };

            match project.resolve(&name).await? {
                Some(entry) if entry.deletable => {
                    self.session
                        .controllers
                        .models
                        .delete_model(&project.project().name, &entry.name)
                        .await?;
                }
                Some(_) => {
                    return Err(SqlApiError::SqlApi(format!(
                        "Unable to delete table '{}' from project '{}'",
                        name, database
                    )));
                }
                None if statement.if_exists => {}
                None => {
                    return Err(SqlApiError::SqlApi(format!(
                        "Table '{}' does not exist in project '{}'",
                        name, database
                    )));
                }
            }
        }
        Ok(ExecuteAnswer::ok())
    }

    pub(super) async fn answer_create_view(&mut self, statement: &CreateView) -> SqlResult<ExecuteAnswer> {
        let (project, name) = self.scoped_name(&statement.name);
        self.require_project(&project).await?;

        let mut query = parse_query(&statement.query_str)?;
        if let Some(source) = &statement.from_table {
            let source = source.last();
            if self.session.datahub().resolve(source).await?.is_none() {
                return Err(SqlApiError::SqlApi(format!("Database not found: {}", source)));
            }
            qualify_tables(&mut query, source);
        }

        // Validate in an ignored context so the probe is not recorded
        let options = ExecutionOptions::with_limit(self.session.config().view_validation_limit)
            .in_context(ContextKind::Ignore, format!("{}.{}", project, name));
        self.session
            .controllers
            .engine
            .execute_query(&query, &*self.session, options)
            .await?;

        let body = query.to_string();
        debug!(project = %project, view = %name, query = %body, "Storing view");
        self.session.controllers.views.add(&project, &name, &body).await?;
        Ok(ExecuteAnswer::ok())
    }

    pub(super) async fn answer_drop_view(&mut self, statement: &DropView) -> SqlResult<ExecuteAnswer> {
        for view in &statement.names {
            let (project, name) = self.scoped_name(view);
            match self.session.controllers.views.delete(&project, &name).await {
                Ok(()) => {}
                Err(ControllerError::NotFound(_)) if statement.if_exists => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(ExecuteAnswer::ok())
    }
}

/// Point every single-part table of `query` at `database`
fn qualify_tables(query: &mut QueryExpr, database: &str) {
    match query {
        QueryExpr::Select(select) => {
            if let Some(from) = &mut select.from {
                qualify_table_ref(from, database);
            }
        }
        QueryExpr::Union(union) => {
            qualify_tables(&mut union.left, database);
            qualify_tables(&mut union.right, database);
        }
    }
}

fn qualify_table_ref(table: &mut TableRef, database: &str) {
    match table {
        TableRef::Table { name, .. } => {
            if name.len() == 1 {
                let table = name.last().to_string();
                *name = Identifier::new([database.to_string(), table]);
            }
        }
        TableRef::Subquery { query, .. } => qualify_tables(query, database),
        TableRef::Join { left, right, .. } => {
            qualify_table_ref(left, database);
            qualify_table_ref(right, database);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualify_tables_keeps_qualified_names() {
        let mut query = parse_query("SELECT a FROM t1 UNION SELECT a FROM other.t2").unwrap();
        qualify_tables(&mut query, "db1");
        let tables: Vec<String> = match &query {
            QueryExpr::Union(union) => [&union.left, &union.right]
                .iter()
                .filter_map(|q| q.as_select())
                .filter_map(|s| s.table_name())
                .map(|t| t.to_string())
                .collect(),
            QueryExpr::Select(_) => Vec::new(),
        };
        assert_eq!(tables, vec!["db1.t1", "other.t2"]);
    }
}
