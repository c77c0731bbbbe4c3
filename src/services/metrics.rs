// Accuracy metrics for EVALUATE
//
// Scores a column of actual values against a column of predictions.

use serde_json::Value as JsonValue;

use crate::error::{SqlApiError, SqlResult};

/// Supported metric names
pub const METRICS: &[&str] = &["accuracy_score", "mean_absolute_error", "mean_squared_error", "r2_score"];

#[derive(Debug, Default, Clone, Copy)]
pub struct AccuracyEvaluator;

fn numeric(values: &[JsonValue], column: &str) -> SqlResult<Vec<f64>> {
    values
        .iter()
        .map(|v| match v {
            JsonValue::Number(n) => n.as_f64().ok_or_else(|| non_numeric(column)),
            JsonValue::String(s) => s.trim().parse::<f64>().map_err(|_| non_numeric(column)),
            JsonValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            _ => Err(non_numeric(column)),
        })
        .collect()
}

fn non_numeric(column: &str) -> SqlApiError {
    SqlApiError::SqlApi(format!("`{}` column must contain numeric values for this metric", column))
}

fn same_value(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64() == y.as_f64(),
        (JsonValue::String(x), y) | (y, JsonValue::String(x)) if !y.is_string() => *x == y.to_string(),
        _ => a == b,
    }
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

impl AccuracyEvaluator {
    /// Compute `metric` over paired columns, rounded to `decimals`
    ///
    /// Both columns must have the same length and contain no NULLs.
    pub fn evaluate(&self, metric: &str, actual: &[JsonValue], predicted: &[JsonValue], decimals: u32) -> SqlResult<f64> {
        if actual.len() != predicted.len() {
            return Err(SqlApiError::SqlApi(
                "`actual` and `prediction` columns must have the same length".to_string(),
            ));
        }
        if actual.is_empty() {
            return Err(SqlApiError::SqlApi("Nothing to evaluate: the query returned no rows".to_string()));
        }

        let value = match metric.to_lowercase().as_str() {
            "accuracy_score" => {
                let hits = actual.iter().zip(predicted).filter(|(a, p)| same_value(a, p)).count();
                hits as f64 / actual.len() as f64
            }
            "mean_absolute_error" => {
                let a = numeric(actual, "actual")?;
                let p = numeric(predicted, "prediction")?;
                a.iter().zip(&p).map(|(x, y)| (x - y).abs()).sum::<f64>() / a.len() as f64
            }
            "mean_squared_error" => {
                let a = numeric(actual, "actual")?;
                let p = numeric(predicted, "prediction")?;
                a.iter().zip(&p).map(|(x, y)| (x - y).powi(2)).sum::<f64>() / a.len() as f64
            }
            "r2_score" => {
                let a = numeric(actual, "actual")?;
                let p = numeric(predicted, "prediction")?;
                let mean = a.iter().sum::<f64>() / a.len() as f64;
                let ss_res: f64 = a.iter().zip(&p).map(|(x, y)| (x - y).powi(2)).sum();
                let ss_tot: f64 = a.iter().map(|x| (x - mean).powi(2)).sum();
                if ss_tot == 0.0 {
                    if ss_res == 0.0 {
                        1.0
                    } else {
                        0.0
                    }
                } else {
                    1.0 - ss_res / ss_tot
                }
            }
            other => {
                return Err(SqlApiError::SqlApi(format!(
                    "Unknown metric '{}', supported metrics: {}",
                    other,
                    METRICS.join(", ")
                )));
            }
        };

        Ok(round_to(value, decimals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accuracy_score() {
        let actual = vec![json!("a"), json!("b"), json!("a")];
        let predicted = vec![json!("a"), json!("a"), json!("a")];
        let value = AccuracyEvaluator.evaluate("accuracy_score", &actual, &predicted, 3).unwrap();
        assert_eq!(value, 0.667);
    }

    #[test]
    fn test_regression_metrics() {
        let actual = vec![json!(3), json!(5), json!(7)];
        let predicted = vec![json!(2.5), json!(5), json!(8)];
        let evaluator = AccuracyEvaluator;
        assert_eq!(evaluator.evaluate("mean_absolute_error", &actual, &predicted, 3).unwrap(), 0.5);
        assert_eq!(evaluator.evaluate("mean_squared_error", &actual, &predicted, 3).unwrap(), 0.417);
        assert_eq!(evaluator.evaluate("r2_score", &actual, &predicted, 3).unwrap(), 0.844);
    }

    #[test]
    fn test_unknown_metric() {
        let err = AccuracyEvaluator
            .evaluate("f1", &[json!(1)], &[json!(1)], 3)
            .unwrap_err();
        assert!(err.to_string().starts_with("Unknown metric 'f1'"));
    }
}
