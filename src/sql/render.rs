// SQL rendering
//
// Turns the statement AST back into SQL text. The identifier policy is
// pluggable: `MySqlStyle` is used for display and persisted view bodies, the
// tabular evaluator supplies its own style that resolves column names against
// the registered row set.

use super::ast::{
    Expr, Identifier, JoinKind, OrderByItem, QueryExpr, Select, SelectItem, TableRef, UnaryOperator,
};

/// Identifier rendering policy
pub trait RenderStyle {
    /// Identifier appearing in expression position
    fn column(&self, ident: &Identifier) -> String;

    /// Identifier appearing in FROM position
    fn table(&self, ident: &Identifier) -> String;

    /// Output alias of a select target or table
    fn alias(&self, alias: &str) -> String;
}

/// Backtick quoting, only where a part is not a bare word
pub struct MySqlStyle;

pub fn is_bare_word(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn backtick(part: &str) -> String {
    if is_bare_word(part) || part == "*" {
        part.to_string()
    } else {
        format!("`{}`", part.replace('`', "``"))
    }
}

impl RenderStyle for MySqlStyle {
    fn column(&self, ident: &Identifier) -> String {
        ident.parts.iter().map(|p| backtick(p)).collect::<Vec<_>>().join(".")
    }

    fn table(&self, ident: &Identifier) -> String {
        self.column(ident)
    }

    fn alias(&self, alias: &str) -> String {
        backtick(alias)
    }
}

fn render_operand(expr: &Expr, style: &dyn RenderStyle) -> String {
    match expr {
        Expr::BinaryOp { .. } | Expr::Between { .. } | Expr::InList { .. } => {
            format!("({})", render_expr(expr, style))
        }
        _ => render_expr(expr, style),
    }
}

pub fn render_expr(expr: &Expr, style: &dyn RenderStyle) -> String {
    match expr {
        Expr::Identifier(ident) => style.column(ident),
        Expr::Constant(constant) => constant.to_string(),
        Expr::Star => "*".to_string(),
        Expr::Variable(name) => format!("@@{}", name),
        Expr::BinaryOp { op, left, right } => format!(
            "{} {} {}",
            render_operand(left, style),
            op.as_str(),
            render_operand(right, style)
        ),
        Expr::UnaryOp { op, expr } => match op {
            UnaryOperator::Not => format!("NOT {}", render_operand(expr, style)),
            UnaryOperator::Minus => format!("-{}", render_operand(expr, style)),
        },
        Expr::IsNull { expr, negated } => format!(
            "{} IS {}NULL",
            render_operand(expr, style),
            if *negated { "NOT " } else { "" }
        ),
        Expr::InList {
            expr,
            list,
            negated,
        } => format!(
            "{} {}IN ({})",
            render_operand(expr, style),
            if *negated { "NOT " } else { "" },
            list.iter()
                .map(|e| render_expr(e, style))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => format!(
            "{} {}BETWEEN {} AND {}",
            render_operand(expr, style),
            if *negated { "NOT " } else { "" },
            render_operand(low, style),
            render_operand(high, style)
        ),
        Expr::Function {
            name,
            args,
            distinct,
        } => format!(
            "{}({}{})",
            name,
            if *distinct { "DISTINCT " } else { "" },
            args.iter()
                .map(|e| render_expr(e, style))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Expr::Raw(text) => text.clone(),
    }
}

fn render_target(item: &SelectItem, style: &dyn RenderStyle) -> String {
    let expr = render_expr(&item.expr, style);
    match &item.alias {
        Some(alias) => format!("{} AS {}", expr, style.alias(alias)),
        None => expr,
    }
}

fn render_table_ref(table: &TableRef, style: &dyn RenderStyle) -> String {
    match table {
        TableRef::Table { name, alias } => match alias {
            Some(alias) => format!("{} AS {}", style.table(name), style.alias(alias)),
            None => style.table(name),
        },
        TableRef::Subquery { query, alias } => match alias {
            Some(alias) => format!("({}) AS {}", render_query(query, style), style.alias(alias)),
            None => format!("({})", render_query(query, style)),
        },
        TableRef::Join {
            left,
            right,
            kind,
            condition,
        } => {
            let keyword = match kind {
                JoinKind::Inner => "JOIN",
                JoinKind::Left => "LEFT JOIN",
                JoinKind::Right => "RIGHT JOIN",
                JoinKind::Full => "FULL JOIN",
                JoinKind::Cross => "CROSS JOIN",
            };
            let mut sql = format!(
                "{} {} {}",
                render_table_ref(left, style),
                keyword,
                render_table_ref(right, style)
            );
            if let Some(condition) = condition {
                sql.push_str(" ON ");
                sql.push_str(&render_expr(condition, style));
            }
            sql
        }
    }
}

fn render_order_item(item: &OrderByItem, style: &dyn RenderStyle) -> String {
    format!(
        "{} {}",
        render_expr(&item.expr, style),
        if item.ascending { "ASC" } else { "DESC" }
    )
}

pub fn render_select(select: &Select, style: &dyn RenderStyle) -> String {
    let mut sql = String::from("SELECT ");
    if select.distinct {
        sql.push_str("DISTINCT ");
    }
    sql.push_str(
        &select
            .targets
            .iter()
            .map(|t| render_target(t, style))
            .collect::<Vec<_>>()
            .join(", "),
    );
    if let Some(from) = &select.from {
        sql.push_str(" FROM ");
        sql.push_str(&render_table_ref(from, style));
    }
    if let Some(where_clause) = &select.where_clause {
        sql.push_str(" WHERE ");
        sql.push_str(&render_expr(where_clause, style));
    }
    if !select.group_by.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(
            &select
                .group_by
                .iter()
                .map(|e| render_expr(e, style))
                .collect::<Vec<_>>()
                .join(", "),
        );
    }
    if let Some(having) = &select.having {
        sql.push_str(" HAVING ");
        sql.push_str(&render_expr(having, style));
    }
    if !select.order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(
            &select
                .order_by
                .iter()
                .map(|o| render_order_item(o, style))
                .collect::<Vec<_>>()
                .join(", "),
        );
    }
    if let Some(limit) = select.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    if let Some(offset) = select.offset {
        sql.push_str(&format!(" OFFSET {}", offset));
    }
    sql
}

pub fn render_query(query: &QueryExpr, style: &dyn RenderStyle) -> String {
    match query {
        QueryExpr::Select(select) => render_select(select, style),
        QueryExpr::Union(union) => format!(
            "{} UNION {}{}",
            render_query(&union.left, style),
            if union.all { "ALL " } else { "" },
            render_query(&union.right, style)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::ast::{BinaryOperator, Constant};

    #[test]
    fn test_render_show_rewrite() {
        let select = Select::new(vec![SelectItem::column_as("NAME", "Database")])
            .from_table(Identifier::new(["information_schema", "DATABASES"]))
            .with_where(Some(Expr::like(Expr::ident("Database"), "mind%")));

        assert_eq!(
            select.to_string(),
            "SELECT NAME AS Database FROM information_schema.DATABASES WHERE Database LIKE 'mind%'"
        );
    }

    #[test]
    fn test_render_nested_predicates() {
        let expr = Expr::and(
            Expr::eq(Expr::ident("a"), Expr::string("it's")),
            Expr::binary(
                BinaryOperator::Or,
                Expr::IsNull {
                    expr: Box::new(Expr::ident("b")),
                    negated: true,
                },
                Expr::Constant(Constant::Bool(false)),
            ),
        );
        assert_eq!(expr.to_string(), "(a = 'it''s') AND (b IS NOT NULL OR FALSE)");
    }

    #[test]
    fn test_bare_word_detection() {
        assert!(is_bare_word("Tables_in_mindsdb"));
        assert!(!is_bare_word("Default collation"));
        assert!(!is_bare_word("1abc"));
        assert_eq!(MySqlStyle.alias("Create Table"), "`Create Table`");
    }
}
