// EVALUATE <metric> FROM (<query>)

use serde_json::Value as JsonValue;
use tracing::debug;

use super::ExecuteCommands;
use crate::error::{SqlApiError, SqlResult};
use crate::models::{ExecuteAnswer, TabularResult};
use crate::sql::{parse_query, Evaluate, JsonMap};

const DEFAULT_DECIMALS: u32 = 3;

fn decimals(using: &JsonMap) -> u32 {
    using
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("decimals"))
        .and_then(|(_, v)| match v {
            JsonValue::Number(n) => n.as_u64(),
            JsonValue::String(s) => s.parse().ok(),
            _ => None,
        })
        .map(|d| d as u32)
        .unwrap_or(DEFAULT_DECIMALS)
}

fn column(result: &TabularResult, name: &str) -> SqlResult<Vec<JsonValue>> {
    let values = result
        .column_values(name)
        .ok_or_else(|| SqlApiError::SqlApi(format!("`{}` column is required to evaluate", name)))?;
    if values.iter().any(|v| v.is_null()) {
        return Err(SqlApiError::SqlApi(
            "There are missing values in the label/prediction columns".to_string(),
        ));
    }
    Ok(values.into_iter().cloned().collect())
}

impl ExecuteCommands<'_> {
    pub(super) async fn answer_evaluate(&mut self, statement: &Evaluate) -> SqlResult<ExecuteAnswer> {
        let metric = statement.name.last().to_lowercase();
        let query = parse_query(&statement.query_str)?;
        let data = self.run_query(&query).await?;

        let actual = column(&data, "actual")?;
        let predicted = column(&data, "prediction")?;

        let score = self
            .session
            .controllers
            .metrics
            .evaluate(&metric, &actual, &predicted, decimals(&statement.using))?;
        debug!(metric = %metric, rows = actual.len(), score, "Evaluated predictions");

        let result = TabularResult::new(vec![metric], vec![vec![JsonValue::from(score)]]);
        Ok(self.answer_table(result, ""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decimals_option() {
        let using = json!({"Decimals": 2}).as_object().cloned().unwrap();
        assert_eq!(decimals(&using), 2);
        assert_eq!(decimals(&JsonMap::new()), DEFAULT_DECIMALS);
    }

    #[test]
    fn test_missing_values_are_rejected() {
        let data = TabularResult::new(
            vec!["actual".to_string(), "prediction".to_string()],
            vec![vec![json!(1), json!(1)], vec![JsonValue::Null, json!(2)]],
        );
        let err = column(&data, "actual").unwrap_err();
        assert_eq!(err.to_string(), "There are missing values in the label/prediction columns");
        assert_eq!(column(&data, "prediction").unwrap(), vec![json!(1), json!(2)]);
    }
}
