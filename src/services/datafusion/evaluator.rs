// Residual tabular evaluator
//
// Applies the WHERE / select list / GROUP BY / ORDER BY / LIMIT of a parsed
// SELECT to an in-memory row set. The row set is registered with a fresh
// DataFusion session as table `df` and the statement is rendered with a style
// that resolves identifiers against the registered columns.

use std::collections::HashSet;
use tracing::debug;

use super::converter::DataFusionResultConverter;
use super::session::{DataFusionSessionManager, SessionConfig};
use crate::config::EvaluatorConfig;
use crate::error::SqlResult;
use crate::models::TabularResult;
use crate::sql::render::{render_expr, render_select, RenderStyle};
use crate::sql::{BinaryOperator, Constant, Expr, Identifier, OrderByItem, Select, SelectItem, TableRef};

const FRAME_TABLE: &str = "df";

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Render style for statements evaluated against a registered frame
struct FrameStyle<'a> {
    columns: &'a [String],
    /// Select targets whose aliases may be referenced from WHERE/ORDER BY
    targets: &'a [SelectItem],
}

impl FrameStyle<'_> {
    fn find_column(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.as_str() == name)
            .or_else(|| self.columns.iter().find(|c| c.eq_ignore_ascii_case(name)))
            .map(String::as_str)
    }
}

impl RenderStyle for FrameStyle<'_> {
    fn column(&self, ident: &Identifier) -> String {
        let name = ident.last();
        if let Some(column) = self.find_column(name) {
            return quote(column);
        }
        let aliased = self.targets.iter().find(|t| {
            t.alias
                .as_deref()
                .map(|a| a.eq_ignore_ascii_case(name))
                .unwrap_or(false)
        });
        match aliased {
            Some(target) => {
                let inner = FrameStyle {
                    columns: self.columns,
                    targets: &[],
                };
                format!("({})", render_expr(&target.expr, &inner))
            }
            None => quote(name),
        }
    }

    fn table(&self, _ident: &Identifier) -> String {
        FRAME_TABLE.to_string()
    }

    fn alias(&self, alias: &str) -> String {
        quote(alias)
    }
}

/// Rewrite the tree so it behaves like MySQL against the frame:
/// `bool_col = 0|1` compares with FALSE/TRUE and LIKE ignores case.
fn adapt_expr(expr: Expr, bool_columns: &HashSet<String>) -> Expr {
    match expr {
        Expr::BinaryOp { op, left, right } => {
            let left = adapt_expr(*left, bool_columns);
            let right = adapt_expr(*right, bool_columns);
            match op {
                BinaryOperator::Eq | BinaryOperator::NotEq => {
                    let (left, right) = match (left, right) {
                        (Expr::Identifier(ident), Expr::Constant(Constant::Int(v)))
                            if bool_columns.contains(&ident.last().to_lowercase()) && (v == 0 || v == 1) =>
                        {
                            (Expr::Identifier(ident), Expr::Constant(Constant::Bool(v == 1)))
                        }
                        (Expr::Constant(Constant::Int(v)), Expr::Identifier(ident))
                            if bool_columns.contains(&ident.last().to_lowercase()) && (v == 0 || v == 1) =>
                        {
                            (Expr::Constant(Constant::Bool(v == 1)), Expr::Identifier(ident))
                        }
                        other => other,
                    };
                    Expr::binary(op, left, right)
                }
                BinaryOperator::Like | BinaryOperator::NotLike => {
                    let lower = |e: Expr| Expr::Function {
                        name: "lower".to_string(),
                        args: vec![e],
                        distinct: false,
                    };
                    Expr::binary(op, lower(left), lower(right))
                }
                _ => Expr::binary(op, left, right),
            }
        }
        Expr::UnaryOp { op, expr } => Expr::UnaryOp {
            op,
            expr: Box::new(adapt_expr(*expr, bool_columns)),
        },
        Expr::IsNull { expr, negated } => Expr::IsNull {
            expr: Box::new(adapt_expr(*expr, bool_columns)),
            negated,
        },
        other => other,
    }
}

fn is_passthrough(select: &Select) -> bool {
    select.is_star()
        && !select.distinct
        && select.where_clause.is_none()
        && select.group_by.is_empty()
        && select.having.is_none()
        && select.order_by.is_empty()
        && select.limit.is_none()
        && select.offset.is_none()
}

/// Evaluates residual SELECT clauses over in-memory row sets
pub struct TabularEvaluator {
    sessions: DataFusionSessionManager,
}

impl TabularEvaluator {
    pub fn new(config: &EvaluatorConfig) -> Self {
        Self {
            sessions: DataFusionSessionManager::new(SessionConfig::from(config)),
        }
    }

    /// Run `select` against `data` as if `data` were its only table
    ///
    /// The FROM clause of `select` is ignored; identifiers resolve against the
    /// columns of `data` case-insensitively, falling back to select aliases.
    pub async fn query_df(&self, data: &TabularResult, select: &Select) -> SqlResult<TabularResult> {
        if is_passthrough(select) {
            return Ok(data.clone());
        }

        let batch = DataFusionResultConverter::to_record_batch(data)?;
        let schema = batch.schema();
        let columns: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
        let bool_columns: HashSet<String> = schema
            .fields()
            .iter()
            .filter(|f| f.data_type() == &datafusion::arrow::datatypes::DataType::Boolean)
            .map(|f| f.name().to_lowercase())
            .collect();

        let mut prepared = select.clone();
        prepared.from = Some(TableRef::table(Identifier::single(FRAME_TABLE)));
        prepared.where_clause = prepared.where_clause.map(|e| adapt_expr(e, &bool_columns));
        prepared.having = prepared.having.map(|e| adapt_expr(e, &bool_columns));
        prepared.order_by = prepared
            .order_by
            .into_iter()
            .map(|o| OrderByItem {
                expr: adapt_expr(o.expr, &bool_columns),
                ascending: o.ascending,
            })
            .collect();

        let style = FrameStyle {
            columns: &columns,
            targets: &select.targets,
        };
        let sql = render_select(&prepared, &style);
        debug!(sql = %sql, rows = data.row_count(), "Evaluating residual select");

        let ctx = self.sessions.create_session()?;
        ctx.register_batch(FRAME_TABLE, batch)?;
        let df = ctx.sql(&sql).await?;
        let out_schema = df.schema().inner().clone();
        let batches = df.collect().await?;

        Ok(DataFusionResultConverter::to_tabular_result(out_schema, &batches)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn evaluator() -> TabularEvaluator {
        TabularEvaluator::new(&EvaluatorConfig::default())
    }

    fn versions() -> TabularResult {
        TabularResult::new(
            vec!["NAME".into(), "PROJECT".into(), "ACTIVE".into(), "VERSION".into()],
            vec![
                vec![json!("m"), json!("proj"), json!(false), json!(1)],
                vec![json!("m"), json!("proj"), json!(true), json!(2)],
                vec![json!("other"), json!("mindsdb"), json!(true), json!(1)],
            ],
        )
    }

    #[tokio::test]
    async fn test_star_without_clauses_is_passthrough() {
        let data = versions();
        let select = Select::star_from(Identifier::single("models_versions"));
        let out = evaluator().query_df(&data, &select).await.unwrap();
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn test_filter_on_boolean_with_integer_literal() {
        let select = Select::new(vec![SelectItem::new(Expr::ident("version"))])
            .from_table(Identifier::single("models_versions"))
            .with_where(Some(Expr::and(
                Expr::eq(Expr::ident("active"), Expr::int(1)),
                Expr::eq(Expr::ident("project"), Expr::string("proj")),
            )));
        let out = evaluator().query_df(&versions(), &select).await.unwrap();
        assert_eq!(out.columns, vec!["VERSION"]);
        assert_eq!(out.rows, vec![vec![json!(2)]]);
    }

    #[tokio::test]
    async fn test_where_may_reference_select_alias() {
        let select = Select::new(vec![SelectItem::column_as("NAME", "Database")])
            .from_table(Identifier::new(["information_schema", "DATABASES"]))
            .with_where(Some(Expr::like(Expr::ident("Database"), "OTH%")));
        let out = evaluator().query_df(&versions(), &select).await.unwrap();
        assert_eq!(out.columns, vec!["Database"]);
        assert_eq!(out.rows, vec![vec![json!("other")]]);
    }

    #[tokio::test]
    async fn test_order_and_limit() {
        let mut select = Select::new(vec![SelectItem::new(Expr::ident("name")), SelectItem::new(Expr::ident("version"))]);
        select.order_by = vec![OrderByItem {
            expr: Expr::ident("version"),
            ascending: false,
        }];
        select.limit = Some(1);
        let out = evaluator().query_df(&versions(), &select).await.unwrap();
        assert_eq!(out.row_count(), 1);
        assert_eq!(out.rows[0][1], json!(2));
    }

    #[tokio::test]
    async fn test_unknown_column_is_an_error() {
        let select = Select::new(vec![SelectItem::new(Expr::ident("missing"))]);
        assert!(evaluator().query_df(&versions(), &select).await.is_err());
    }

    #[tokio::test]
    async fn test_filter_on_empty_frame_keeps_columns() {
        let data = TabularResult::empty(&["NAME", "PROJECT"]);
        let select = Select::star_from(Identifier::single("jobs"))
            .with_where(Some(Expr::eq(Expr::ident("project"), Expr::string("proj"))));
        let out = evaluator().query_df(&data, &select).await.unwrap();
        assert_eq!(out.columns, vec!["NAME", "PROJECT"]);
        assert!(out.is_empty());
    }
}
