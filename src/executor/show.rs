// SHOW commands
//
// Most categories are rewritten into a SELECT over information_schema and run
// through the query engine. Variables, warnings, status and a few MySQL
// compatibility categories are answered from fixed frames.

use serde_json::{json, Value as JsonValue};

use super::ExecuteCommands;
use crate::catalog::variables::variables_listing;
use crate::catalog::INFORMATION_SCHEMA;
use crate::error::{SqlApiError, SqlResult};
use crate::models::{ExecuteAnswer, TabularResult};
use crate::sql::{show_where, Expr, Identifier, Select, SelectItem, Show};

const FUNCTION_STATUS_COLUMNS: &[&str] = &[
    "Db", "Name", "Type", "Definer", "Modified", "Created", "Security_type", "Comment",
    "character_set_client", "collation_connection", "Database Collation",
];

const TABLE_STATUS_COLUMNS: &[&str] = &[
    "Name", "Engine", "Version", "Row_format", "Rows", "Avg_row_length", "Data_length",
    "Max_data_length", "Index_length", "Data_free", "Auto_increment", "Create_time",
    "Update_time", "Check_time", "Collation", "Checksum", "Create_options", "Comment",
];

const WARNINGS_COLUMNS: &[&str] = &["Level", "Code", "Message"];

/// Table types listed by SHOW TABLES
const SHOWN_TABLE_TYPES: &[&str] = &["BASE TABLE", "MODEL", "SYSTEM VIEW", "VIEW"];

fn star() -> Vec<SelectItem> {
    vec![SelectItem::new(Expr::Star)]
}

fn catalog_select(table: &str, targets: Vec<SelectItem>, where_clause: Option<Expr>) -> Select {
    Select::new(targets)
        .from_table(Identifier::new([INFORMATION_SCHEMA, table]))
        .with_where(where_clause)
}

fn aliased(pairs: &[(&str, &str)]) -> Vec<SelectItem> {
    pairs
        .iter()
        .map(|(column, alias)| SelectItem::column_as(column, alias))
        .collect()
}

fn frame(columns: &[&str], rows: Vec<Vec<JsonValue>>) -> TabularResult {
    TabularResult::new(columns.iter().map(|c| c.to_string()).collect(), rows)
}

impl ExecuteCommands<'_> {
    pub(super) async fn answer_show(&mut self, show: &Show) -> SqlResult<ExecuteAnswer> {
        let category = show.category.to_lowercase();
        match category.as_str() {
            "predictors" | "models" => {
                let filter = show_where(show, Some("PROJECT"), Some("NAME"), None);
                self.catalog_answer(catalog_select("MODELS", star(), filter), "models").await
            }
            "ml_engines" => {
                let filter = show_where(show, None, Some("NAME"), None);
                self.catalog_answer(catalog_select("ML_ENGINES", star(), filter), "ml_engines")
                    .await
            }
            "handlers" => {
                let filter = show_where(show, None, Some("NAME"), None);
                self.catalog_answer(catalog_select("HANDLERS", star(), filter), "handlers").await
            }
            "plugins" => {
                if show.like.is_some() || show.where_clause.is_some() || show.from_table.is_some() {
                    return Err(SqlApiError::SqlApi(
                        "'SHOW PLUGINS' query should be used without filters".to_string(),
                    ));
                }
                let targets = aliased(&[
                    ("PLUGIN_NAME", "Name"),
                    ("PLUGIN_STATUS", "Status"),
                    ("PLUGIN_TYPE", "Type"),
                    ("PLUGIN_LIBRARY", "Library"),
                    ("PLUGIN_LICENSE", "License"),
                ]);
                self.catalog_answer(catalog_select("PLUGINS", targets, None), "plugins").await
            }
            "databases" | "schemas" => {
                let mut targets = aliased(&[("NAME", "Database")]);
                if show.has_mode("full") {
                    targets.extend(aliased(&[("TYPE", "TYPE"), ("ENGINE", "ENGINE")]));
                }
                let filter = show_where(show, None, Some("Database"), None);
                self.catalog_answer(catalog_select("DATABASES", targets, filter), "databases")
                    .await
            }
            "tables" => self.show_tables(show, show.has_mode("full")).await,
            "full tables" => self.show_tables(show, true).await,
            "variables" | "session variables" | "session status" | "global variables" => {
                let rows = variables_listing(category.starts_with("session"))
                    .into_iter()
                    .map(|(name, value)| vec![json!(name), json!(value)])
                    .collect();
                let data = frame(&["Variable_name", "Value"], rows);
                self.frame_answer(data, show, Some("Variable_name"), "variables").await
            }
            "search_path" => {
                let data = frame(&["search_path"], vec![vec![json!("\"$user\", public")]]);
                Ok(self.answer_table(data, "search_path"))
            }
            "status" => match show.like.as_deref() {
                Some(like) if like.eq_ignore_ascii_case("ssl_version") => {
                    let data = frame(
                        &["Variable_name", "Value"],
                        vec![vec![json!("Ssl_version"), json!("TLSv1.1")]],
                    );
                    Ok(self.answer_table(data, "status"))
                }
                _ => Err(not_implemented(show)),
            },
            "function status" | "procedure status" => {
                Ok(self.answer_table(TabularResult::empty(FUNCTION_STATUS_COLUMNS), "routines"))
            }
            "index" | "indexes" | "keys" => self.show_indexes(show).await,
            "create table" => {
                let table = show
                    .from_table
                    .as_ref()
                    .map(|t| t.last().to_string())
                    .unwrap_or_default();
                let data = frame(&["Table", "Create Table"], vec![vec![json!(table), json!("")]]);
                Ok(self.answer_table(data, "create_table"))
            }
            "character set" | "charset" => {
                let targets = aliased(&[
                    ("CHARACTER_SET_NAME", "Charset"),
                    ("DEFAULT_COLLATE_NAME", "Default collation"),
                    ("DESCRIPTION", "Description"),
                    ("MAXLEN", "Maxlen"),
                ]);
                let filter = show_where(show, None, Some("Charset"), None);
                self.catalog_answer(catalog_select("CHARACTER_SETS", targets, filter), "character_sets")
                    .await
            }
            "warnings" => Ok(self.answer_table(TabularResult::empty(WARNINGS_COLUMNS), "warnings")),
            "engines" => {
                let filter = show_where(show, None, Some("ENGINE"), None);
                self.catalog_answer(catalog_select("ENGINES", star(), filter), "engines").await
            }
            "collation" => {
                let targets = aliased(&[
                    ("COLLATION_NAME", "Collation"),
                    ("CHARACTER_SET_NAME", "Charset"),
                    ("ID", "Id"),
                    ("IS_DEFAULT", "Default"),
                    ("IS_COMPILED", "Compiled"),
                    ("SORTLEN", "Sortlen"),
                    ("PAD_ATTRIBUTE", "Pad_attribute"),
                ]);
                let filter = show_where(show, None, Some("Collation"), None);
                self.catalog_answer(catalog_select("COLLATIONS", targets, filter), "collations")
                    .await
            }
            "table status" => {
                let table = show.like.as_deref().ok_or_else(|| {
                    SqlApiError::TableExists(format!("Can't determine table name in query: {}", show_text(show)))
                })?;
                Ok(self.answer_table(table_status(table), "tables"))
            }
            "columns" => self.show_columns(show, show.has_mode("full")).await,
            "full columns" => self.show_columns(show, true).await,
            "knowledge_bases" | "knowledge bases" => {
                let project = self.show_scope(show);
                let initial = Expr::eq(Expr::ident("PROJECT"), Expr::string(project));
                let filter = show_where(show, None, Some("NAME"), Some(initial));
                self.catalog_answer(catalog_select("KNOWLEDGE_BASES", star(), filter), "knowledge_bases")
                    .await
            }
            _ => Err(not_implemented(show)),
        }
    }

    /// Database named by `FROM x`, else the session database
    fn show_scope(&self, show: &Show) -> String {
        show.from_table
            .as_ref()
            .map(|t| t.last().to_string())
            .unwrap_or_else(|| self.session.database.clone())
    }

    async fn show_tables(&self, show: &Show, full: bool) -> SqlResult<ExecuteAnswer> {
        let schema = self.show_scope(show);
        if !self.session.datahub().database_exists(&schema).await? {
            return Err(SqlApiError::BadDb(format!("Database {} does not exists", schema)));
        }

        let name_column = format!("Tables_in_{}", schema);
        let mut targets = vec![SelectItem::column_as("TABLE_NAME", &name_column)];
        if full {
            targets.push(SelectItem::column_as("TABLE_TYPE", "Table_type"));
        }

        let initial = Expr::and(
            Expr::eq(Expr::ident("TABLE_SCHEMA"), Expr::string(schema.clone())),
            Expr::InList {
                expr: Box::new(Expr::ident("TABLE_TYPE")),
                list: SHOWN_TABLE_TYPES.iter().map(|t| Expr::string(*t)).collect(),
                negated: false,
            },
        );
        let filter = show_where(show, None, Some(&name_column), Some(initial));
        self.catalog_answer(catalog_select("TABLES", targets, filter), "tables").await
    }

    async fn show_indexes(&self, show: &Show) -> SqlResult<ExecuteAnswer> {
        let targets = aliased(&[
            ("TABLE_NAME", "Table"),
            ("NON_UNIQUE", "Non_unique"),
            ("INDEX_NAME", "Key_name"),
            ("SEQ_IN_INDEX", "Seq_in_index"),
            ("COLUMN_NAME", "Column_name"),
            ("COLLATION", "Collation"),
            ("CARDINALITY", "Cardinality"),
            ("SUB_PART", "Sub_part"),
            ("PACKED", "Packed"),
            ("NULLABLE", "Null"),
            ("INDEX_TYPE", "Index_type"),
            ("COMMENT", "Comment"),
            ("INDEX_COMMENT", "Index_comment"),
            ("IS_VISIBLE", "Visible"),
            ("EXPRESSION", "Expression"),
        ]);

        let mut filters = Vec::new();
        if let Some(table) = &show.from_table {
            let (schema, name) = self.scoped_name(table);
            filters.push(Expr::eq(Expr::ident("TABLE_SCHEMA"), Expr::string(schema)));
            filters.push(Expr::eq(Expr::ident("TABLE_NAME"), Expr::string(name)));
        }
        let filter = show_where(show, None, None, crate::sql::and_all(filters));
        self.catalog_answer(catalog_select("STATISTICS", targets, filter), "statistics")
            .await
    }

    pub(super) async fn show_columns(&self, show: &Show, full: bool) -> SqlResult<ExecuteAnswer> {
        let table = show
            .from_table
            .as_ref()
            .ok_or_else(|| SqlApiError::SqlApi(format!("Table name is required: {}", show_text(show))))?;
        let (schema, name) = self.scoped_name(table);

        let mut pairs = vec![("COLUMN_NAME", "Field"), ("DATA_TYPE", "Type")];
        if full {
            pairs.push(("COLLATION_NAME", "Collation"));
        }
        pairs.extend([
            ("IS_NULLABLE", "Null"),
            ("COLUMN_KEY", "Key"),
            ("COLUMN_DEFAULT", "Default"),
            ("EXTRA", "Extra"),
        ]);
        if full {
            pairs.extend([("PRIVILEGES", "Privileges"), ("COLUMN_COMMENT", "Comment")]);
        }

        let initial = Expr::and(
            Expr::eq(Expr::ident("TABLE_SCHEMA"), Expr::string(schema)),
            Expr::eq(Expr::ident("TABLE_NAME"), Expr::string(name)),
        );
        let filter = show_where(show, None, Some("Field"), Some(initial));
        self.catalog_answer(catalog_select("COLUMNS", aliased(&pairs), filter), "columns")
            .await
    }

    async fn catalog_answer(&self, select: Select, table_name: &str) -> SqlResult<ExecuteAnswer> {
        let result = self.run_query(&select.into()).await?;
        Ok(self.answer_table(result, table_name))
    }

    /// Apply the LIKE/WHERE of `show` to a fixed frame
    async fn frame_answer(
        &self,
        data: TabularResult,
        show: &Show,
        like_name: Option<&str>,
        table_name: &str,
    ) -> SqlResult<ExecuteAnswer> {
        let result = match show_where(show, None, like_name, None) {
            Some(filter) => {
                let select = Select::new(star()).with_where(Some(filter));
                self.session.controllers.evaluator.query_df(&data, &select).await?
            }
            None => data,
        };
        Ok(self.answer_table(result, table_name))
    }
}

fn show_text(show: &Show) -> String {
    crate::sql::Statement::Show(show.clone()).to_string()
}

fn not_implemented(show: &Show) -> SqlApiError {
    SqlApiError::NotSupportedYet(format!("Statement not implemented: {}", show_text(show)))
}

/// Fixed-shape TABLE STATUS row for `table`
fn table_status(table: &str) -> TabularResult {
    frame(
        TABLE_STATUS_COLUMNS,
        vec![vec![
            json!(table),
            json!("InnoDB"),
            json!(10),
            json!("Dynamic"),
            json!(1),
            json!(16384),
            json!(16384),
            json!(0),
            json!(0),
            json!(0),
            JsonValue::Null,
            json!("2020-07-13 12:00:00"),
            json!("2020-07-13 12:00:00"),
            JsonValue::Null,
            json!("utf8mb4_0900_ai_ci"),
            JsonValue::Null,
            json!(""),
            json!(""),
        ]],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_status_row_matches_columns() {
        let status = table_status("t1");
        assert_eq!(status.rows[0].len(), TABLE_STATUS_COLUMNS.len());
        assert_eq!(status.rows[0][0], json!("t1"));
    }

    #[test]
    fn test_catalog_select_targets_information_schema() {
        let select = catalog_select("MODELS", star(), None);
        assert_eq!(select.table_name().map(|t| t.to_string()).as_deref(), Some("information_schema.MODELS"));
    }
}
