// Predicate helpers
//
// Small tree utilities kept apart from the residual evaluator: pushdown of a
// single `column = constant` from a top-level AND chain, AND-combination of
// filters, and the WHERE synthesis used by SHOW rewrites.

use super::ast::{BinaryOperator, Constant, Expr, Show};

/// Find `column = constant` (either operand order) in `expr` or in the
/// top-level AND chain rooted at `expr`.
///
/// Equalities nested under OR/NOT are ignored: pushing them down would
/// drop rows the full filter keeps. Column matching is case-insensitive and
/// uses the trailing identifier part, so `TABLES.table_schema` matches
/// `TABLE_SCHEMA`.
pub fn extract_equality<'a>(expr: &'a Expr, column: &str) -> Option<&'a Constant> {
    match expr {
        Expr::BinaryOp {
            op: BinaryOperator::And,
            left,
            right,
        } => extract_equality(left, column).or_else(|| extract_equality(right, column)),
        Expr::BinaryOp {
            op: BinaryOperator::Eq,
            left,
            right,
        } => match (left.as_ref(), right.as_ref()) {
            (Expr::Identifier(ident), Expr::Constant(value))
            | (Expr::Constant(value), Expr::Identifier(ident))
                if ident.last().eq_ignore_ascii_case(column) =>
            {
                Some(value)
            }
            _ => None,
        },
        _ => None,
    }
}

/// Same as [`extract_equality`] but only accepts string constants
pub fn extract_string_equality(expr: Option<&Expr>, column: &str) -> Option<String> {
    match expr.and_then(|e| extract_equality(e, column)) {
        Some(Constant::String(value)) => Some(value.clone()),
        _ => None,
    }
}

/// Combine filters with AND, left-associative; `None` when empty
pub fn and_all(filters: Vec<Expr>) -> Option<Expr> {
    filters.into_iter().reduce(Expr::and)
}

/// AND `extra` onto an optional existing filter
pub fn and_with(existing: Option<Expr>, extra: Expr) -> Expr {
    match existing {
        Some(existing) => Expr::and(existing, extra),
        None => extra,
    }
}

/// Combine the filters of `SHOW category [FROM x] [LIKE 'p'] [WHERE f]`
///
/// # Arguments
/// * `show` - the SHOW statement
/// * `from_name` - column compared for equality with the FROM target's last part
/// * `like_name` - column matched against the LIKE pattern
/// * `initial` - filter placed first in the chain
pub fn show_where(
    show: &Show,
    from_name: Option<&str>,
    like_name: Option<&str>,
    initial: Option<Expr>,
) -> Option<Expr> {
    let mut filters = Vec::new();
    if let Some(initial) = initial {
        filters.push(initial);
    }
    if let (Some(from), Some(column)) = (&show.from_table, from_name) {
        filters.push(Expr::eq(Expr::ident(column), Expr::string(from.last())));
    }
    if let (Some(pattern), Some(column)) = (&show.like, like_name) {
        filters.push(Expr::like(Expr::ident(column), pattern.clone()));
    }
    if let Some(where_clause) = &show.where_clause {
        filters.push(where_clause.clone());
    }
    and_all(filters)
}

/// Collect every `column = constant` pair reachable through AND nodes
///
/// Used to turn a prediction WHERE clause into a one-row input frame.
pub fn collect_equalities(expr: &Expr, out: &mut Vec<(String, Constant)>) {
    match expr {
        Expr::BinaryOp {
            op: BinaryOperator::And,
            left,
            right,
        } => {
            collect_equalities(left, out);
            collect_equalities(right, out);
        }
        Expr::BinaryOp {
            op: BinaryOperator::Eq,
            left,
            right,
        } => {
            if let (Expr::Identifier(ident), Expr::Constant(value))
            | (Expr::Constant(value), Expr::Identifier(ident)) = (left.as_ref(), right.as_ref())
            {
                out.push((ident.last().to_string(), value.clone()));
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::ast::Identifier;

    #[test]
    fn test_extract_equality_from_and_chain() {
        let expr = Expr::and(
            Expr::like(Expr::ident("name"), "m%"),
            Expr::and(
                Expr::eq(Expr::string("proj"), Expr::ident("project")),
                Expr::eq(Expr::ident("x"), Expr::int(1)),
            ),
        );
        assert_eq!(
            extract_equality(&expr, "PROJECT"),
            Some(&Constant::String("proj".to_string()))
        );
        assert_eq!(extract_equality(&expr, "x"), Some(&Constant::Int(1)));
        assert_eq!(extract_equality(&expr, "name"), None);
    }

    #[test]
    fn test_extract_equality_ignores_or_branches() {
        let expr = Expr::or(
            Expr::eq(Expr::ident("TABLE_SCHEMA"), Expr::string("a")),
            Expr::eq(Expr::ident("TABLE_SCHEMA"), Expr::string("b")),
        );
        assert!(extract_equality(&expr, "table_schema").is_none());
    }

    #[test]
    fn test_extract_equality_qualified_column() {
        let expr = Expr::eq(
            Expr::Identifier(Identifier::new(["tables", "table_schema"])),
            Expr::string("files"),
        );
        assert_eq!(
            extract_string_equality(Some(&expr), "TABLE_SCHEMA").as_deref(),
            Some("files")
        );
    }

    #[test]
    fn test_show_where_combines_all_filters() {
        let show = Show {
            category: "models".to_string(),
            from_table: Some(Identifier::single("proj")),
            like: Some("task%".to_string()),
            where_clause: Some(Expr::eq(Expr::ident("status"), Expr::string("complete"))),
            ..Default::default()
        };
        let where_clause = show_where(&show, Some("project"), Some("name"), None).unwrap();
        assert_eq!(
            where_clause.to_string(),
            "((project = 'proj') AND (name LIKE 'task%')) AND (status = 'complete')"
        );
    }

    #[test]
    fn test_show_where_empty() {
        let show = Show::new("databases");
        assert!(show_where(&show, None, Some("Database"), None).is_none());
    }
}
