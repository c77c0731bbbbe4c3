// Command router
//
// `ExecuteCommands` takes one parsed statement and runs the single handling
// routine of its kind. Every routine ends in an OK answer, a TABLE answer or
// an error; a partially filled table is never returned.

mod ddl;
mod dml;
mod entities;
mod evaluate;
mod models;
mod session_cmds;
mod show;

pub use entities::SessionJobRunner;

use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{SqlApiError, SqlResult};
use crate::models::{ExecuteAnswer, TabularResult};
use crate::services::engine::ExecutionOptions;
use crate::services::session::{ControllerSet, SessionController};
use crate::sql::{Constant, Expr, Identifier, QueryExpr, Statement};

/// Statement dispatcher bound to one session
pub struct ExecuteCommands<'a> {
    session: &'a mut SessionController,
}

impl<'a> ExecuteCommands<'a> {
    pub fn new(session: &'a mut SessionController) -> Self {
        Self { session }
    }

    /// Execute one statement
    ///
    /// # Errors
    /// Controller failures (not found, duplicates, validation) come back as
    /// [`SqlApiError::SqlApi`] carrying the controller's message.
    pub async fn execute_command(&mut self, statement: &Statement) -> SqlResult<ExecuteAnswer> {
        debug!(
            kind = statement.kind_name(),
            database = %self.session.database,
            "Executing statement"
        );

        match statement {
            Statement::CreateDatabase(s) => self.answer_create_database(s).await,
            Statement::DropDatabase(s) => self.answer_drop_database(s).await,
            Statement::CreateMlEngine(s) => self.answer_create_ml_engine(s).await,
            Statement::DropMlEngine(s) => self.answer_drop_ml_engine(s).await,
            Statement::DropPredictor(s) => self.answer_drop_predictor(s).await,
            Statement::DropTables(s) => self.answer_drop_tables(s).await,
            Statement::Describe(s) => self.answer_describe(s).await,
            Statement::RetrainPredictor(s) => {
                let request = models::UpdateRequest {
                    kind: models::UpdateKind::Retrain,
                    name: &s.name,
                    integration: s.integration_name.as_ref(),
                    query: s.query_str.as_deref(),
                    targets: &s.targets,
                    using: &s.using,
                };
                self.answer_update_model(request).await
            }
            Statement::FinetunePredictor(s) => {
                let request = models::UpdateRequest {
                    kind: models::UpdateKind::Finetune,
                    name: &s.name,
                    integration: s.integration_name.as_ref(),
                    query: s.query_str.as_deref(),
                    targets: &s.targets,
                    using: &s.using,
                };
                self.answer_update_model(request).await
            }
            Statement::Show(s) => self.answer_show(s).await,
            Statement::StartTransaction | Statement::CommitTransaction | Statement::RollbackTransaction => {
                Ok(ExecuteAnswer::ok())
            }
            Statement::Set(s) => self.answer_set(s),
            Statement::Use(s) => self.answer_use(s).await,
            Statement::CreatePredictor(s) => self.answer_create_predictor(s).await,
            Statement::CreateView(s) => self.answer_create_view(s).await,
            Statement::DropView(s) => self.answer_drop_view(s).await,
            Statement::Delete(s) => self.answer_delete(statement, s).await,
            Statement::Insert(s) => self.answer_insert(statement, s).await,
            Statement::Update(s) => self.answer_update(statement, s).await,
            Statement::Select(s) => self.answer_select(s).await,
            Statement::Union(u) => {
                let query = QueryExpr::Union(Box::new(u.clone()));
                let result = self.run_query(&query).await?;
                Ok(self.answer_table(result, ""))
            }
            Statement::Explain(s) => self.answer_explain(s).await,
            Statement::CreateTable(_) => {
                self.session
                    .controllers
                    .engine
                    .execute_mutation(statement, &*self.session)
                    .await?;
                Ok(ExecuteAnswer::ok())
            }
            Statement::Alter(s) => {
                debug!(table = %s.table, action = %s.action, "ALTER acknowledged without changes");
                Ok(ExecuteAnswer::ok())
            }
            Statement::CreateJob(s) => self.answer_create_job(s).await,
            Statement::DropJob(s) => self.answer_drop_job(s).await,
            Statement::CreateTrigger(s) => self.answer_create_trigger(s).await,
            Statement::DropTrigger(s) => self.answer_drop_trigger(s).await,
            Statement::CreateChatBot(s) => self.answer_create_chatbot(s).await,
            Statement::UpdateChatBot(s) => self.answer_update_chatbot(s).await,
            Statement::DropChatBot(s) => self.answer_drop_chatbot(s).await,
            Statement::CreateKnowledgeBase(s) => self.answer_create_kb(s).await,
            Statement::DropKnowledgeBase(s) => self.answer_drop_kb(s).await,
            Statement::CreateSkill(s) => self.answer_create_skill(s).await,
            Statement::DropSkill(s) => self.answer_drop_skill(s).await,
            Statement::UpdateSkill(s) => self.answer_update_skill(s).await,
            Statement::CreateAgent(s) => self.answer_create_agent(s).await,
            Statement::DropAgent(s) => self.answer_drop_agent(s).await,
            Statement::UpdateAgent(s) => self.answer_update_agent(s).await,
            Statement::Evaluate(s) => self.answer_evaluate(s).await,
            Statement::Unknown { sql } => {
                warn!(sql = %sql, "Unknown SQL statement");
                Err(SqlApiError::NotSupportedYet(format!("Unknown SQL statement: {}", sql)))
            }
        }
    }

    fn controllers(&self) -> Arc<ControllerSet> {
        Arc::clone(&self.session.controllers)
    }

    /// Split `[database.]name`; the session database is the default scope
    fn scoped_name(&self, name: &Identifier) -> (String, String) {
        if name.len() > 1 {
            (name.first().to_string(), name.last().to_string())
        } else {
            (self.session.database.clone(), name.last().to_string())
        }
    }

    /// Run a SELECT/UNION through the query engine
    async fn run_query(&self, query: &QueryExpr) -> SqlResult<TabularResult> {
        self.session
            .controllers
            .engine
            .execute_query(query, &*self.session, ExecutionOptions::default())
            .await
    }

    fn answer_table(&self, result: TabularResult, table_name: &str) -> ExecuteAnswer {
        ExecuteAnswer::from_result(result, table_name, self.session.charset_text_type)
    }

    /// Id of the session's project; empty when the session database is not a project
    async fn default_project_id(&self) -> SqlResult<String> {
        Ok(self
            .session
            .controllers
            .projects
            .get(&self.session.database)
            .await?
            .map(|p| p.id)
            .unwrap_or_default())
    }

    /// Fail unless `name` is a registered project
    async fn require_project(&self, name: &str) -> SqlResult<()> {
        match self.session.controllers.projects.get(name).await? {
            Some(_) => Ok(()),
            None => Err(SqlApiError::SqlApi(format!("Project not found: {}", name))),
        }
    }
}

/// Truthiness of a SET argument or a USING option
fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        JsonValue::String(s) => matches!(s.to_lowercase().as_str(), "1" | "true" | "on" | "yes"),
        _ => false,
    }
}

/// Constant payload of an expression, unquoting bare words
fn expr_value(expr: &Expr) -> Option<JsonValue> {
    match expr {
        Expr::Constant(Constant::Null) => None,
        Expr::Constant(value) => Some(value.to_json()),
        Expr::Identifier(ident) => Some(JsonValue::String(ident.last().to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness_of_options() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("ON")));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("off")));
        assert!(!is_truthy(&JsonValue::Null));
    }

    #[test]
    fn test_expr_value() {
        assert_eq!(expr_value(&Expr::string("utf8mb4")), Some(json!("utf8mb4")));
        assert_eq!(expr_value(&Expr::ident("latin1")), Some(json!("latin1")));
        assert_eq!(expr_value(&Expr::Constant(Constant::Null)), None);
    }
}
