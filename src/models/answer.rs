use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// One row of values, ordered like the owning result's columns
pub type Row = Vec<JsonValue>;

/// In-memory row set exchanged between data nodes, the query engine and the
/// residual evaluator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabularResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl TabularResult {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Result with the given columns and no rows
    pub fn empty<S: AsRef<str>>(columns: &[S]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Case-insensitive column position
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
    }

    pub fn column_values(&self, name: &str) -> Option<Vec<&JsonValue>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row.get(idx).unwrap_or(&JsonValue::Null)).collect())
    }

    /// Rows as JSON objects keyed by lower-cased column name
    pub fn records(&self) -> Vec<Map<String, JsonValue>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row.iter())
                    .map(|(c, v)| (c.to_lowercase(), v.clone()))
                    .collect()
            })
            .collect()
    }
}

/// MySQL column type reported for a result column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MysqlType {
    VarString,
    Tiny,
    Long,
    LongLong,
    Double,
    Datetime,
}

impl MysqlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MysqlType::VarString => "VAR_STRING",
            MysqlType::Tiny => "TINY",
            MysqlType::Long => "LONG",
            MysqlType::LongLong => "LONGLONG",
            MysqlType::Double => "DOUBLE",
            MysqlType::Datetime => "DATETIME",
        }
    }

    /// Type of a single value; `None` for NULL
    pub fn of_value(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Null => None,
            JsonValue::Bool(_) => Some(MysqlType::Tiny),
            JsonValue::Number(n) if n.is_i64() || n.is_u64() => Some(MysqlType::LongLong),
            JsonValue::Number(_) => Some(MysqlType::Double),
            _ => Some(MysqlType::VarString),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, MysqlType::VarString)
    }
}

/// Collation ids used as column charsets
pub mod charset {
    pub const LATIN1_SWEDISH_CI: u16 = 8;
    pub const UTF8_GENERAL_CI: u16 = 33;
    pub const UTF8MB4_GENERAL_CI: u16 = 45;
    pub const BINARY: u16 = 63;
    pub const UTF8_BIN: u16 = 83;

    /// Charset for `SET NAMES <name>`; `None` for names we do not know
    pub fn for_names(name: &str) -> Option<u16> {
        match name.to_lowercase().as_str() {
            "utf8" => Some(UTF8_GENERAL_CI),
            "utf8mb4" => Some(UTF8MB4_GENERAL_CI),
            _ => None,
        }
    }
}

/// Column descriptor attached to a TABLE answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub alias: Option<String>,
    pub table_name: String,
    pub database: Option<String>,
    pub col_type: MysqlType,
    pub charset: u16,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, table_name: impl Into<String>, col_type: MysqlType, charset: u16) -> Self {
        Self {
            name: name.into(),
            alias: None,
            table_name: table_name.into(),
            database: None,
            col_type,
            charset,
        }
    }

    pub fn text(name: impl Into<String>, table_name: impl Into<String>, charset: u16) -> Self {
        Self::new(name, table_name, MysqlType::VarString, charset)
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Name the client sees
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Derive descriptors from the first non-null value of each column
    ///
    /// Columns with only NULLs are reported as text. Text columns take the
    /// session's text charset, everything else is binary.
    pub fn infer_all(result: &TabularResult, table_name: &str, text_charset: u16) -> Vec<ColumnInfo> {
        result
            .columns
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let col_type = result
                    .rows
                    .iter()
                    .filter_map(|row| row.get(idx).and_then(MysqlType::of_value))
                    .next()
                    .unwrap_or(MysqlType::VarString);
                let charset = if col_type.is_text() {
                    text_charset
                } else {
                    charset::BINARY
                };
                ColumnInfo::new(name.clone(), table_name, col_type, charset)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerType {
    Ok,
    Table,
}

/// Uniform outcome of one dispatched statement
///
/// Failures travel as `Err(SqlApiError)`, so an answer is either OK or a
/// complete table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteAnswer {
    pub answer_type: AnswerType,
    pub columns: Vec<ColumnInfo>,
    pub data: Vec<Row>,
    /// Session state changes reported back to the client (name, value)
    pub state_track: Vec<(String, String)>,
}

impl ExecuteAnswer {
    pub fn ok() -> Self {
        Self {
            answer_type: AnswerType::Ok,
            columns: Vec::new(),
            data: Vec::new(),
            state_track: Vec::new(),
        }
    }

    pub fn table(columns: Vec<ColumnInfo>, data: Vec<Row>) -> Self {
        Self {
            answer_type: AnswerType::Table,
            columns,
            data,
            state_track: Vec::new(),
        }
    }

    /// Table answer with column types derived from the values
    pub fn from_result(result: TabularResult, table_name: &str, text_charset: u16) -> Self {
        let columns = ColumnInfo::infer_all(&result, table_name, text_charset);
        Self::table(columns, result.rows)
    }

    pub fn with_state_track(mut self, state_track: Vec<(String, String)>) -> Self {
        self.state_track = state_track;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.answer_type == AnswerType::Ok
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.display_name()).collect()
    }

    /// Rebuild a plain row set from a TABLE answer
    pub fn into_result(self) -> TabularResult {
        let columns = self.columns.iter().map(|c| c.display_name().to_string()).collect();
        TabularResult::new(columns, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_infer_column_types() {
        let result = TabularResult::new(
            vec!["name".into(), "version".into(), "accuracy".into(), "active".into(), "error".into()],
            vec![
                vec![json!("m1"), json!(1), json!(0.5), json!(true), JsonValue::Null],
                vec![json!("m2"), json!(2), JsonValue::Null, json!(false), JsonValue::Null],
            ],
        );
        let columns = ColumnInfo::infer_all(&result, "models", charset::UTF8_GENERAL_CI);
        let types: Vec<MysqlType> = columns.iter().map(|c| c.col_type).collect();
        assert_eq!(
            types,
            vec![
                MysqlType::VarString,
                MysqlType::LongLong,
                MysqlType::Double,
                MysqlType::Tiny,
                MysqlType::VarString
            ]
        );
        assert_eq!(columns[0].charset, charset::UTF8_GENERAL_CI);
        assert_eq!(columns[1].charset, charset::BINARY);
    }

    #[test]
    fn test_column_lookup_is_case_insensitive() {
        let result = TabularResult::empty(&["NAME", "PROJECT"]);
        assert_eq!(result.column_index("project"), Some(1));
        assert_eq!(result.column_index("missing"), None);
    }

    #[test]
    fn test_answer_round_trip_to_result() {
        let answer = ExecuteAnswer::table(
            vec![ColumnInfo::text("table_name", "tables", charset::UTF8_GENERAL_CI).with_alias("Tables_in_mindsdb")],
            vec![vec![json!("models")]],
        );
        let result = answer.into_result();
        assert_eq!(result.columns, vec!["Tables_in_mindsdb"]);
        assert_eq!(result.row_count(), 1);
    }
}
