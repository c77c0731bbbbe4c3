// SELECT, data mutations and EXPLAIN

use serde_json::Value as JsonValue;

use super::ExecuteCommands;
use crate::catalog::variables::lookup_variable;
use crate::error::{SqlApiError, SqlResult};
use crate::models::{ExecuteAnswer, TabularResult};
use crate::sql::{Constant, Delete, Explain, Expr, Identifier, Insert, QueryExpr, Select, Show, Statement, Update};

/// Table addressed by UPDATE/DELETE to change model versions
const MODELS_VERSIONS: &str = "models_versions";

/// Version reported by `SELECT version()` and `@@version`
const SERVER_VERSION: &str = "8.0.17";

fn targets_models_versions(table: &Identifier) -> bool {
    table.last().eq_ignore_ascii_case(MODELS_VERSIONS)
}

impl ExecuteCommands<'_> {
    pub(super) async fn answer_select(&mut self, select: &Select) -> SqlResult<ExecuteAnswer> {
        if select.from.is_none() {
            return self.answer_single_row_select(select);
        }

        if let Some(table) = select.table_name() {
            if self.is_knowledge_base(table).await? {
                let statement = Statement::Select(select.clone());
                return self.answer_kb_query(&statement, &table.last().to_string()).await;
            }
        }

        let result = self.run_query(&QueryExpr::from(select.clone())).await?;
        let table_name = select.table_name().map(|t| t.last().to_string()).unwrap_or_default();
        Ok(self.answer_table(result, &table_name))
    }

    /// `SELECT @@version, database(), 1` style selects answered from session state
    fn answer_single_row_select(&self, select: &Select) -> SqlResult<ExecuteAnswer> {
        let mut columns = Vec::with_capacity(select.targets.len());
        let mut row = Vec::with_capacity(select.targets.len());

        for target in &select.targets {
            let (name, value) = match &target.expr {
                Expr::Variable(var) => {
                    let value = lookup_variable(var)
                        .ok_or_else(|| SqlApiError::SqlApi(format!("Unknown variable '{}'", var)))?;
                    (format!("@@{}", var), value.to_json())
                }
                Expr::Function { name, .. } => {
                    let value = match name.to_lowercase().as_str() {
                        "database" => JsonValue::from(self.session.database.as_str()),
                        "current_user" | "user" => JsonValue::from(self.session.username.as_str()),
                        "version" => JsonValue::from(SERVER_VERSION),
                        "current_schema" => JsonValue::from("public"),
                        "connection_id" => JsonValue::from(self.session.connection_id),
                        _ => {
                            return Err(SqlApiError::SqlWrongArguments(format!(
                                "Unknown function: {}",
                                target.expr
                            )))
                        }
                    };
                    (format!("{}()", name.to_lowercase()), value)
                }
                Expr::Constant(Constant::String(text)) => (text.clone(), JsonValue::from(text.as_str())),
                Expr::Constant(constant) => (constant.to_string(), constant.to_json()),
                Expr::Identifier(ident) if ident.last().eq_ignore_ascii_case("session_user") => {
                    ("session_user".to_string(), JsonValue::from(self.session.username.as_str()))
                }
                other => {
                    return Err(SqlApiError::SqlWrongArguments(format!(
                        "Unknown constant type: {}",
                        other
                    )))
                }
            };
            columns.push(target.alias.clone().unwrap_or(name));
            row.push(value);
        }

        Ok(self.answer_table(TabularResult::new(columns, vec![row]), ""))
    }

    async fn is_knowledge_base(&self, table: &Identifier) -> SqlResult<bool> {
        let project_id = self.default_project_id().await?;
        Ok(self
            .session
            .controllers
            .knowledge_bases
            .is_knowledge_base(table, &project_id)
            .await?)
    }

    async fn answer_kb_query(&self, statement: &Statement, table_name: &str) -> SqlResult<ExecuteAnswer> {
        let project_id = self.default_project_id().await?;
        let result = self
            .session
            .controllers
            .knowledge_bases
            .execute_query(statement, &project_id)
            .await?;
        Ok(self.answer_table(result, table_name))
    }

    async fn run_mutation(&self, statement: &Statement) -> SqlResult<ExecuteAnswer> {
        self.session
            .controllers
            .engine
            .execute_mutation(statement, &*self.session)
            .await?;
        Ok(ExecuteAnswer::ok())
    }

    pub(super) async fn answer_delete(&mut self, statement: &Statement, delete: &Delete) -> SqlResult<ExecuteAnswer> {
        if targets_models_versions(&delete.table) {
            return self.delete_model_versions(delete).await;
        }
        if self.is_knowledge_base(&delete.table).await? {
            return self.answer_kb_query(statement, delete.table.last()).await;
        }

        // Deletes are only routed through the default project
        let default_project = self.session.config().default_project.clone();
        let in_default = self.session.database.eq_ignore_ascii_case(&default_project)
            || (delete.table.len() > 1 && delete.table.first().eq_ignore_ascii_case(&default_project));
        if !in_default {
            return Err(SqlApiError::BadTable(format!(
                "Only 'DELETE' from database '{}' is possible at this moment",
                default_project
            )));
        }

        self.run_mutation(statement).await
    }

    pub(super) async fn answer_insert(&mut self, statement: &Statement, insert: &Insert) -> SqlResult<ExecuteAnswer> {
        if self.is_knowledge_base(&insert.table).await? {
            return self.answer_kb_query(statement, insert.table.last()).await;
        }
        self.run_mutation(statement).await
    }

    pub(super) async fn answer_update(&mut self, statement: &Statement, update: &Update) -> SqlResult<ExecuteAnswer> {
        if targets_models_versions(&update.table) && update.from_select.is_none() {
            return self.update_model_versions(update).await;
        }
        if self.is_knowledge_base(&update.table).await? {
            return self.answer_kb_query(statement, update.table.last()).await;
        }
        self.run_mutation(statement).await
    }

    /// EXPLAIN degrades to the column listing of its target
    pub(super) async fn answer_explain(&mut self, explain: &Explain) -> SqlResult<ExecuteAnswer> {
        let show = Show {
            category: "columns".to_string(),
            from_table: Some(explain.target.clone()),
            ..Default::default()
        };
        self.show_columns(&show, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_models_versions_target() {
        assert!(targets_models_versions(&Identifier::new(["proj", "MODELS_VERSIONS"])));
        assert!(targets_models_versions(&Identifier::single("models_versions")));
        assert!(!targets_models_versions(&Identifier::single("models")));
    }
}
