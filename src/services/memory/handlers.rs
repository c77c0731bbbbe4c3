// In-memory handlers
//
// `MemoryDataHandler` keeps named tables as row sets and serves both the
// `files` node and `memory` integrations. `DummyMlHandler` trains nothing and
// predicts one row per input row, tagged with the version that produced it.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::matching_rows;
use crate::models::{ModelRecord, TableEntry, TableKind, TabularResult};
use crate::services::datafusion::TabularEvaluator;
use crate::services::handlers::{DataHandler, HandlerError, HandlerResult, MlHandler};
use crate::sql::{parse_select, Constant, Expr, JsonMap, Select};

pub struct MemoryDataHandler {
    name: String,
    tables: RwLock<BTreeMap<String, TabularResult>>,
    evaluator: Arc<TabularEvaluator>,
}

impl MemoryDataHandler {
    pub fn new(name: impl Into<String>, evaluator: Arc<TabularEvaluator>) -> Self {
        Self {
            name: name.into(),
            tables: RwLock::new(BTreeMap::new()),
            evaluator,
        }
    }

    /// Seed a table before the handler is shared
    pub fn with_table(mut self, table: impl Into<String>, data: TabularResult) -> Self {
        self.tables.get_mut().insert(table.into().to_lowercase(), data);
        self
    }

    async fn table(&self, table: &str) -> HandlerResult<TabularResult> {
        self.tables
            .read()
            .await
            .get(&table.to_lowercase())
            .cloned()
            .ok_or_else(|| HandlerError::TableNotFound(table.to_string()))
    }

    async fn store(&self, table: &str, data: TabularResult) {
        self.tables.write().await.insert(table.to_lowercase(), data);
    }
}

/// Reorder `data` into `columns`; data columns outside `columns` are an error
fn align(table: &str, columns: &[String], data: &TabularResult) -> HandlerResult<Vec<Vec<JsonValue>>> {
    let positions = data
        .columns
        .iter()
        .map(|c| {
            columns
                .iter()
                .position(|t| t.eq_ignore_ascii_case(c))
                .ok_or_else(|| HandlerError::Query(format!("Unknown column '{}' in table '{}'", c, table)))
        })
        .collect::<HandlerResult<Vec<_>>>()?;

    Ok(data
        .rows
        .iter()
        .map(|row| {
            let mut aligned = vec![JsonValue::Null; columns.len()];
            for (value, &pos) in row.iter().zip(&positions) {
                aligned[pos] = value.clone();
            }
            aligned
        })
        .collect())
}

#[async_trait]
impl DataHandler for MemoryDataHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check_connection(&self) -> HandlerResult<()> {
        Ok(())
    }

    async fn get_tables(&self) -> HandlerResult<Vec<TableEntry>> {
        Ok(self
            .tables
            .read()
            .await
            .keys()
            .map(|name| TableEntry::new(name.clone(), TableKind::BaseTable))
            .collect())
    }

    async fn get_columns(&self, table: &str) -> HandlerResult<Vec<String>> {
        Ok(self.table(table).await?.columns)
    }

    async fn query(&self, select: &Select) -> HandlerResult<TabularResult> {
        let table = select
            .table_name()
            .ok_or_else(|| HandlerError::Query(format!("Wrong table in query: {}", select)))?;
        let data = self.table(table.last()).await?;
        Ok(self.evaluator.query_df(&data, select).await?)
    }

    async fn native_query(&self, query: &str) -> HandlerResult<TabularResult> {
        let select = parse_select(query)?;
        self.query(&select).await
    }

    async fn insert(&self, table: &str, data: TabularResult) -> HandlerResult<u64> {
        let inserted = data.row_count() as u64;
        match self.table(table).await {
            Ok(mut existing) => {
                let rows = align(table, &existing.columns, &data)?;
                existing.rows.extend(rows);
                self.store(table, existing).await;
            }
            Err(HandlerError::TableNotFound(_)) => self.store(table, data).await,
            Err(e) => return Err(e),
        }
        debug!(handler = %self.name, table = %table, rows = inserted, "Rows inserted");
        Ok(inserted)
    }

    async fn update(&self, table: &str, assignments: &[(String, Constant)], filter: Option<&Expr>) -> HandlerResult<u64> {
        let mut data = self.table(table).await?;
        let targets = assignments
            .iter()
            .map(|(column, value)| {
                data.column_index(column)
                    .map(|idx| (idx, value.to_json()))
                    .ok_or_else(|| HandlerError::Query(format!("Unknown column '{}' in table '{}'", column, table)))
            })
            .collect::<HandlerResult<Vec<_>>>()?;

        let rows = matching_rows(&self.evaluator, &data, filter).await?;
        for &row in &rows {
            for (idx, value) in &targets {
                data.rows[row][*idx] = value.clone();
            }
        }
        self.store(table, data).await;
        Ok(rows.len() as u64)
    }

    async fn delete(&self, table: &str, filter: Option<&Expr>) -> HandlerResult<u64> {
        let mut data = self.table(table).await?;
        let rows = matching_rows(&self.evaluator, &data, filter).await?;
        let mut idx = 0;
        data.rows.retain(|_| {
            let keep = !rows.contains(&idx);
            idx += 1;
            keep
        });
        self.store(table, data).await;
        Ok(rows.len() as u64)
    }

    async fn create_table(&self, table: &str, data: TabularResult, replace: bool) -> HandlerResult<()> {
        if !replace && self.tables.read().await.contains_key(&table.to_lowercase()) {
            return Err(HandlerError::Query(format!("Table '{}' already exists", table)));
        }
        self.store(table, data).await;
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> HandlerResult<()> {
        match self.tables.write().await.remove(&table.to_lowercase()) {
            Some(_) => Ok(()),
            None => Err(HandlerError::TableNotFound(table.to_string())),
        }
    }
}

/// ML handler without a model behind it
pub struct DummyMlHandler {
    engine_name: String,
    /// Parameters CREATE ML_ENGINE must supply
    required_params: Vec<String>,
}

impl DummyMlHandler {
    pub fn new(engine_name: impl Into<String>) -> Self {
        Self {
            engine_name: engine_name.into(),
            required_params: Vec::new(),
        }
    }

    pub fn requiring(mut self, param: impl Into<String>) -> Self {
        self.required_params.push(param.into());
        self
    }
}

#[async_trait]
impl MlHandler for DummyMlHandler {
    fn has_create_engine(&self) -> bool {
        !self.required_params.is_empty()
    }

    async fn create_engine(&self, params: &JsonMap) -> HandlerResult<()> {
        match self.required_params.iter().find(|p| !params.contains_key(p.as_str())) {
            Some(missing) => Err(HandlerError::Query(format!("Missing parameter: {}", missing))),
            None => Ok(()),
        }
    }

    async fn learn(&self, model: &ModelRecord, data: &TabularResult) -> HandlerResult<Option<f64>> {
        if let Some(target) = &model.predict {
            if !data.columns.is_empty() && data.column_index(target).is_none() {
                return Err(HandlerError::Query(format!(
                    "Target column '{}' is not in the training data",
                    target
                )));
            }
        }
        debug!(engine = %self.engine_name, model = %model.name, rows = data.row_count(), "Learn");
        Ok(Some(0.95))
    }

    async fn predict(&self, model: &ModelRecord, input: &TabularResult, params: &JsonMap) -> HandlerResult<TabularResult> {
        let target = model.predict.clone().unwrap_or_else(|| "prediction".to_string());
        let value = params
            .get("predicted_value")
            .or_else(|| model.training_options.get("predicted_value"))
            .cloned()
            .unwrap_or(JsonValue::Null);

        let mut columns = input.columns.clone();
        columns.retain(|c| !c.eq_ignore_ascii_case(&target));
        let kept: Vec<usize> = input
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.eq_ignore_ascii_case(&target))
            .map(|(idx, _)| idx)
            .collect();
        columns.extend([target, "model_version".to_string(), "model_label".to_string()]);

        let rows = input
            .rows
            .iter()
            .map(|row| {
                let mut out: Vec<JsonValue> = kept.iter().map(|&idx| row.get(idx).cloned().unwrap_or_default()).collect();
                out.extend([value.clone(), json!(model.version), json!(model.label)]);
                out
            })
            .collect();

        Ok(TabularResult::new(columns, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluatorConfig;
    use crate::sql::Identifier;

    fn handler() -> MemoryDataHandler {
        let evaluator = Arc::new(TabularEvaluator::new(&EvaluatorConfig::default()));
        MemoryDataHandler::new("files", evaluator).with_table(
            "Sales",
            TabularResult::new(
                vec!["id".into(), "amount".into()],
                vec![vec![json!(1), json!(10)], vec![json!(2), json!(20)], vec![json!(3), json!(30)]],
            ),
        )
    }

    #[tokio::test]
    async fn test_query_and_mutations() {
        let handler = handler();
        let filter = Expr::binary(crate::sql::BinaryOperator::Gt, Expr::ident("amount"), Expr::int(15));

        let updated = handler
            .update("sales", &[("amount".to_string(), Constant::Int(0))], Some(&filter))
            .await
            .unwrap();
        assert_eq!(updated, 2);

        let deleted = handler
            .delete("sales", Some(&Expr::eq(Expr::ident("id"), Expr::int(1))))
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let select = Select::star_from(Identifier::single("sales"));
        let out = handler.query(&select).await.unwrap();
        assert_eq!(out.rows, vec![vec![json!(2), json!(0)], vec![json!(3), json!(0)]]);
    }

    #[tokio::test]
    async fn test_insert_aligns_columns() {
        let handler = handler();
        let data = TabularResult::new(vec!["amount".into(), "id".into()], vec![vec![json!(40), json!(4)]]);
        handler.insert("sales", data).await.unwrap();
        let out = handler.native_query("SELECT id FROM sales WHERE amount = 40").await.unwrap();
        assert_eq!(out.rows, vec![vec![json!(4)]]);

        let bad = TabularResult::new(vec!["nope".into()], vec![vec![json!(1)]]);
        assert!(handler.insert("sales", bad).await.is_err());
    }

    #[tokio::test]
    async fn test_drop_missing_table() {
        let handler = handler();
        assert!(handler.drop_table("sales").await.is_ok());
        let err = handler.drop_table("sales").await.unwrap_err();
        assert_eq!(err.to_string(), "Table 'sales' does not exist");
    }

    #[tokio::test]
    async fn test_prediction_carries_version_label() {
        let mut model = ModelRecord::new("proj", "m", "lightwood", "lightwood");
        model.version = 3;
        model.label = Some("tag3".to_string());
        model.predict = Some("y".to_string());

        let input = TabularResult::new(vec!["a".into()], vec![vec![json!(1)]]);
        let out = DummyMlHandler::new("lightwood")
            .predict(&model, &input, &JsonMap::new())
            .await
            .unwrap();
        assert_eq!(out.columns, vec!["a", "y", "model_version", "model_label"]);
        assert_eq!(out.rows[0], vec![json!(1), JsonValue::Null, json!(3), json!("tag3")]);
    }

    #[tokio::test]
    async fn test_create_engine_hook_checks_params() {
        let handler = DummyMlHandler::new("openai").requiring("openai_api_key");
        assert!(handler.has_create_engine());
        let err = handler.create_engine(&JsonMap::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Missing parameter: openai_api_key");
    }
}
