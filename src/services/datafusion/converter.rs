// DataFusion ResultConverter
//
// Moves row sets between the JSON-valued `TabularResult` model and Arrow
// record batches registered with a DataFusion session.

use anyhow::{anyhow, Context, Result};
use datafusion::arrow::array::*;
use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::arrow::util::display::array_value_to_string;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

use crate::models::{Row, TabularResult};

/// Converts between `TabularResult` and Arrow data
pub struct DataFusionResultConverter;

impl DataFusionResultConverter {
    /// Infer an Arrow type for one column of JSON values
    ///
    /// All-NULL columns become nullable Utf8. Integers mixed with floats
    /// widen to Float64; any other mix falls back to Utf8.
    pub fn infer_column_type(values: &[&JsonValue]) -> DataType {
        let mut inferred: Option<DataType> = None;
        for value in values {
            let current = match value {
                JsonValue::Null => continue,
                JsonValue::Bool(_) => DataType::Boolean,
                JsonValue::Number(n) if n.is_i64() => DataType::Int64,
                JsonValue::Number(_) => DataType::Float64,
                _ => DataType::Utf8,
            };
            inferred = Some(match (inferred, current) {
                (None, t) => t,
                (Some(a), b) if a == b => a,
                (Some(DataType::Int64), DataType::Float64) | (Some(DataType::Float64), DataType::Int64) => {
                    DataType::Float64
                }
                _ => return DataType::Utf8,
            });
        }
        inferred.unwrap_or(DataType::Utf8)
    }

    /// Build a single record batch from a row set
    ///
    /// Duplicate column names get a positional suffix so the schema stays valid.
    pub fn to_record_batch(result: &TabularResult) -> Result<RecordBatch> {
        let mut fields = Vec::with_capacity(result.columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(result.columns.len());
        let mut seen = std::collections::HashSet::new();

        for (idx, name) in result.columns.iter().enumerate() {
            let column_values: Vec<&JsonValue> = result
                .rows
                .iter()
                .map(|row| row.get(idx).unwrap_or(&JsonValue::Null))
                .collect();
            let data_type = Self::infer_column_type(&column_values);

            let field_name = if seen.insert(name.clone()) {
                name.clone()
            } else {
                format!("{}_{}", name, idx)
            };

            let array: ArrayRef = match data_type {
                DataType::Boolean => Arc::new(BooleanArray::from(
                    column_values.iter().map(|v| v.as_bool()).collect::<Vec<_>>(),
                )),
                DataType::Int64 => Arc::new(Int64Array::from(
                    column_values.iter().map(|v| v.as_i64()).collect::<Vec<_>>(),
                )),
                DataType::Float64 => Arc::new(Float64Array::from(
                    column_values.iter().map(|v| v.as_f64()).collect::<Vec<_>>(),
                )),
                _ => Arc::new(StringArray::from(
                    column_values
                        .iter()
                        .map(|v| match v {
                            JsonValue::Null => None,
                            JsonValue::String(s) => Some(s.clone()),
                            other => Some(other.to_string()),
                        })
                        .collect::<Vec<_>>(),
                )),
            };

            fields.push(Field::new(field_name, data_type, true));
            arrays.push(array);
        }

        let schema = Arc::new(Schema::new(fields));
        if arrays.is_empty() {
            return Ok(RecordBatch::new_empty(schema));
        }
        RecordBatch::try_new(schema, arrays).context("Failed to create RecordBatch")
    }

    /// Convert query execution results back to a row set
    ///
    /// # Arguments
    /// * `schema` - Arrow schema defining column names and types
    /// * `batches` - Record batches containing query results
    pub fn to_tabular_result(schema: SchemaRef, batches: &[RecordBatch]) -> Result<TabularResult> {
        let columns: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();

        let mut rows = Vec::new();
        for batch in batches {
            rows.extend(Self::batch_to_rows(batch)?);
        }

        Ok(TabularResult::new(columns, rows))
    }

    fn batch_to_rows(batch: &RecordBatch) -> Result<Vec<Row>> {
        let schema = batch.schema();
        let mut rows = Vec::with_capacity(batch.num_rows());
        for row_idx in 0..batch.num_rows() {
            let mut row = Vec::with_capacity(batch.num_columns());
            for col_idx in 0..batch.num_columns() {
                let field = schema.field(col_idx);
                row.push(Self::array_value_to_json(batch.column(col_idx), row_idx, field.data_type())?);
            }
            rows.push(row);
        }
        Ok(rows)
    }

    /// Convert a single array value to JSON
    fn array_value_to_json(array: &ArrayRef, row_idx: usize, data_type: &DataType) -> Result<JsonValue> {
        if array.is_null(row_idx) {
            return Ok(JsonValue::Null);
        }

        let value = match data_type {
            DataType::Boolean => {
                let array = array
                    .as_any()
                    .downcast_ref::<BooleanArray>()
                    .ok_or_else(|| anyhow!("Failed to downcast to BooleanArray"))?;
                json!(array.value(row_idx))
            }
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
                let text = array_value_to_string(array, row_idx)?;
                json!(text.parse::<i64>().context("Invalid integer value")?)
            }
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
                let text = array_value_to_string(array, row_idx)?;
                json!(text.parse::<u64>().context("Invalid unsigned value")?)
            }
            DataType::Float32 => {
                let array = array
                    .as_any()
                    .downcast_ref::<Float32Array>()
                    .ok_or_else(|| anyhow!("Failed to downcast to Float32Array"))?;
                json!(array.value(row_idx) as f64)
            }
            DataType::Float64 => {
                let array = array
                    .as_any()
                    .downcast_ref::<Float64Array>()
                    .ok_or_else(|| anyhow!("Failed to downcast to Float64Array"))?;
                let value = array.value(row_idx);
                if value.is_finite() {
                    json!(value)
                } else {
                    JsonValue::Null
                }
            }
            DataType::Utf8 => {
                let array = array
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .ok_or_else(|| anyhow!("Failed to downcast to StringArray"))?;
                json!(array.value(row_idx))
            }
            DataType::LargeUtf8 => {
                let array = array
                    .as_any()
                    .downcast_ref::<LargeStringArray>()
                    .ok_or_else(|| anyhow!("Failed to downcast to LargeStringArray"))?;
                json!(array.value(row_idx))
            }
            DataType::Utf8View => {
                let array = array
                    .as_any()
                    .downcast_ref::<StringViewArray>()
                    .ok_or_else(|| anyhow!("Failed to downcast to StringViewArray"))?;
                json!(array.value(row_idx))
            }
            // Dates, timestamps, decimals and nested types are reported as text
            _ => json!(array_value_to_string(array, row_idx)?),
        };

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TabularResult {
        TabularResult::new(
            vec!["NAME".into(), "VERSION".into(), "ACCURACY".into(), "ACTIVE".into(), "ERROR".into()],
            vec![
                vec![json!("m"), json!(1), json!(1), json!(true), JsonValue::Null],
                vec![json!("m"), json!(2), json!(0.75), json!(false), JsonValue::Null],
            ],
        )
    }

    #[test]
    fn test_infer_column_types() {
        let batch = DataFusionResultConverter::to_record_batch(&sample()).unwrap();
        let schema = batch.schema();
        assert_eq!(schema.field(0).data_type(), &DataType::Utf8);
        assert_eq!(schema.field(1).data_type(), &DataType::Int64);
        assert_eq!(schema.field(2).data_type(), &DataType::Float64);
        assert_eq!(schema.field(3).data_type(), &DataType::Boolean);
        assert_eq!(schema.field(4).data_type(), &DataType::Utf8);
    }

    #[test]
    fn test_batch_back_to_rows() {
        let batch = DataFusionResultConverter::to_record_batch(&sample()).unwrap();
        let result = DataFusionResultConverter::to_tabular_result(batch.schema(), &[batch]).unwrap();
        assert_eq!(result.columns[3], "ACTIVE");
        assert_eq!(result.rows[1][2], json!(0.75));
        assert_eq!(result.rows[0][3], json!(true));
        assert_eq!(result.rows[0][4], JsonValue::Null);
    }

    #[test]
    fn test_duplicate_columns_are_renamed() {
        let result = TabularResult::new(
            vec!["Value".into(), "Value".into()],
            vec![vec![json!("Ssl_version"), json!("TLSv1.1")]],
        );
        let batch = DataFusionResultConverter::to_record_batch(&result).unwrap();
        assert_eq!(batch.schema().field(1).name(), "Value_1");
    }

    #[test]
    fn test_mixed_values_fall_back_to_text() {
        let a = json!("x");
        let b = json!(1);
        assert_eq!(DataFusionResultConverter::infer_column_type(&[&a, &b]), DataType::Utf8);
        let c = json!(1.5);
        assert_eq!(DataFusionResultConverter::infer_column_type(&[&b, &c]), DataType::Float64);
        assert_eq!(DataFusionResultConverter::infer_column_type(&[]), DataType::Utf8);
    }
}
