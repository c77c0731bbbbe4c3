// Query text parsing
//
// Stored query bodies (views, jobs, EVALUATE sources) arrive as text. They are
// parsed with sqlparser's MySQL dialect and lowered into the crate AST.
// Expression shapes without a dedicated AST node are kept as raw text.

use sqlparser::ast as sp;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

use super::ast::{
    BinaryOperator, Constant, Expr, Identifier, OrderByItem, QueryExpr, Select, SelectItem,
    TableRef, UnaryOperator, Union,
};
use crate::error::{SqlApiError, SqlResult};

/// Parse a single SELECT or UNION query
pub fn parse_query(sql: &str) -> SqlResult<QueryExpr> {
    let dialect = MySqlDialect {};
    let statements = Parser::parse_sql(&dialect, sql)
        .map_err(|e| SqlApiError::SqlApi(format!("Failed to parse query: {}", e)))?;

    match statements.as_slice() {
        [sp::Statement::Query(query)] => convert_query(query),
        [] => Err(SqlApiError::SqlApi("Empty query".to_string())),
        [_] => Err(SqlApiError::SqlApi(format!(
            "Only SELECT queries are supported here: {}",
            sql
        ))),
        _ => Err(SqlApiError::SqlApi(
            "Expected a single query, got several statements".to_string(),
        )),
    }
}

/// Parse a query and require it to be a plain SELECT
pub fn parse_select(sql: &str) -> SqlResult<Select> {
    match parse_query(sql)? {
        QueryExpr::Select(select) => Ok(*select),
        QueryExpr::Union(_) => Err(SqlApiError::SqlApi(format!(
            "Expected a SELECT query, got UNION: {}",
            sql
        ))),
    }
}

fn convert_query(query: &sp::Query) -> SqlResult<QueryExpr> {
    let mut converted = convert_set_expr(&query.body)?;

    if let QueryExpr::Select(select) = &mut converted {
        if let Some(order_by) = &query.order_by {
            if let sp::OrderByKind::Expressions(items) = &order_by.kind {
                for item in items {
                    select.order_by.push(OrderByItem {
                        expr: convert_expr(&item.expr)?,
                        ascending: item.options.asc.unwrap_or(true),
                    });
                }
            }
        }

        match &query.limit_clause {
            Some(sp::LimitClause::LimitOffset { limit, offset, .. }) => {
                if let Some(limit) = limit {
                    select.limit = Some(expr_to_u64(limit)?);
                }
                if let Some(offset) = offset {
                    select.offset = Some(expr_to_u64(&offset.value)?);
                }
            }
            Some(sp::LimitClause::OffsetCommaLimit { offset, limit }) => {
                select.offset = Some(expr_to_u64(offset)?);
                select.limit = Some(expr_to_u64(limit)?);
            }
            None => {}
        }
    }

    Ok(converted)
}

fn convert_set_expr(body: &sp::SetExpr) -> SqlResult<QueryExpr> {
    match body {
        sp::SetExpr::Select(select) => Ok(QueryExpr::Select(Box::new(convert_select(select)?))),
        sp::SetExpr::Query(query) => convert_query(query),
        sp::SetExpr::SetOperation {
            op: sp::SetOperator::Union,
            set_quantifier,
            left,
            right,
        } => Ok(QueryExpr::Union(Box::new(Union {
            left: convert_set_expr(left)?,
            right: convert_set_expr(right)?,
            all: matches!(set_quantifier, sp::SetQuantifier::All),
        }))),
        other => Err(SqlApiError::NotSupportedYet(format!(
            "Unsupported query: {}",
            other
        ))),
    }
}

fn convert_select(select: &sp::Select) -> SqlResult<Select> {
    let mut targets = Vec::with_capacity(select.projection.len());
    for item in &select.projection {
        let target = match item {
            sp::SelectItem::UnnamedExpr(expr) => SelectItem::new(convert_expr(expr)?),
            sp::SelectItem::ExprWithAlias { expr, alias } => {
                SelectItem::aliased(convert_expr(expr)?, alias.value.clone())
            }
            sp::SelectItem::Wildcard(_) => SelectItem::new(Expr::Star),
            other => SelectItem::new(Expr::Raw(other.to_string())),
        };
        targets.push(target);
    }

    let from = match select.from.as_slice() {
        [] => None,
        [table] => {
            if !table.joins.is_empty() {
                return Err(SqlApiError::NotSupportedYet(
                    "Joins are not supported in stored queries".to_string(),
                ));
            }
            Some(convert_table_factor(&table.relation)?)
        }
        _ => {
            return Err(SqlApiError::NotSupportedYet(
                "Only one table is supported in stored queries".to_string(),
            ))
        }
    };

    let group_by = match &select.group_by {
        sp::GroupByExpr::Expressions(exprs, ..) => exprs
            .iter()
            .map(convert_expr)
            .collect::<SqlResult<Vec<_>>>()?,
        other => {
            return Err(SqlApiError::NotSupportedYet(format!(
                "Unsupported GROUP BY: {}",
                other
            )))
        }
    };

    Ok(Select {
        distinct: matches!(select.distinct, Some(sp::Distinct::Distinct)),
        targets,
        from,
        where_clause: select.selection.as_ref().map(convert_expr).transpose()?,
        group_by,
        having: select.having.as_ref().map(convert_expr).transpose()?,
        order_by: Vec::new(),
        limit: None,
        offset: None,
    })
}

fn convert_table_factor(factor: &sp::TableFactor) -> SqlResult<TableRef> {
    match factor {
        sp::TableFactor::Table { name, alias, .. } => Ok(TableRef::Table {
            name: object_name(name),
            alias: alias.as_ref().map(|a| a.name.value.clone()),
        }),
        sp::TableFactor::Derived {
            subquery, alias, ..
        } => Ok(TableRef::Subquery {
            query: Box::new(convert_query(subquery)?),
            alias: alias.as_ref().map(|a| a.name.value.clone()),
        }),
        other => Err(SqlApiError::NotSupportedYet(format!(
            "Unsupported table reference: {}",
            other
        ))),
    }
}

/// Unquoted parts of an object name
pub fn object_name(name: &sp::ObjectName) -> Identifier {
    Identifier::new(name.0.iter().map(|part| match part {
        sp::ObjectNamePart::Identifier(ident) => ident.value.clone(),
        other => other.to_string(),
    }))
}

fn convert_binary_operator(op: &sp::BinaryOperator) -> Option<BinaryOperator> {
    let converted = match op {
        sp::BinaryOperator::Eq => BinaryOperator::Eq,
        sp::BinaryOperator::NotEq => BinaryOperator::NotEq,
        sp::BinaryOperator::Lt => BinaryOperator::Lt,
        sp::BinaryOperator::LtEq => BinaryOperator::LtEq,
        sp::BinaryOperator::Gt => BinaryOperator::Gt,
        sp::BinaryOperator::GtEq => BinaryOperator::GtEq,
        sp::BinaryOperator::And => BinaryOperator::And,
        sp::BinaryOperator::Or => BinaryOperator::Or,
        sp::BinaryOperator::Plus => BinaryOperator::Plus,
        sp::BinaryOperator::Minus => BinaryOperator::Minus,
        sp::BinaryOperator::Multiply => BinaryOperator::Multiply,
        sp::BinaryOperator::Divide => BinaryOperator::Divide,
        sp::BinaryOperator::Modulo => BinaryOperator::Modulo,
        _ => return None,
    };
    Some(converted)
}

fn convert_value(value: &sp::Value) -> Expr {
    let constant = match value {
        sp::Value::Number(number, _) => {
            let text = number.to_string();
            match text.parse::<i64>() {
                Ok(i) => Constant::Int(i),
                Err(_) => match text.parse::<f64>() {
                    Ok(f) => Constant::Float(f),
                    Err(_) => return Expr::Raw(text),
                },
            }
        }
        sp::Value::SingleQuotedString(s) | sp::Value::DoubleQuotedString(s) => {
            Constant::String(s.clone())
        }
        sp::Value::Boolean(b) => Constant::Bool(*b),
        sp::Value::Null => Constant::Null,
        other => return Expr::Raw(other.to_string()),
    };
    Expr::Constant(constant)
}

fn convert_function(func: &sp::Function, original: &sp::Expr) -> SqlResult<Expr> {
    if func.over.is_some() || func.filter.is_some() {
        return Ok(Expr::Raw(original.to_string()));
    }

    let (args, distinct) = match &func.args {
        sp::FunctionArguments::None => (Vec::new(), false),
        sp::FunctionArguments::List(list) => {
            let distinct = matches!(
                list.duplicate_treatment,
                Some(sp::DuplicateTreatment::Distinct)
            );
            let mut args = Vec::with_capacity(list.args.len());
            for arg in &list.args {
                match arg {
                    sp::FunctionArg::Unnamed(sp::FunctionArgExpr::Expr(expr)) => {
                        args.push(convert_expr(expr)?)
                    }
                    sp::FunctionArg::Unnamed(sp::FunctionArgExpr::Wildcard) => {
                        args.push(Expr::Star)
                    }
                    _ => return Ok(Expr::Raw(original.to_string())),
                }
            }
            (args, distinct)
        }
        _ => return Ok(Expr::Raw(original.to_string())),
    };

    Ok(Expr::Function {
        name: func.name.to_string(),
        args,
        distinct,
    })
}

/// `@@name` and `@@session.name` become variables, the rest identifiers
fn identifier_or_variable(parts: Vec<String>) -> Expr {
    match parts.first().and_then(|p| p.strip_prefix("@@")) {
        Some(head) => {
            let rest = parts[1..].iter().map(String::as_str);
            Expr::Variable(std::iter::once(head).chain(rest).collect::<Vec<_>>().join("."))
        }
        None => Expr::Identifier(Identifier::new(parts)),
    }
}

fn convert_expr(expr: &sp::Expr) -> SqlResult<Expr> {
    let converted = match expr {
        sp::Expr::Identifier(ident) => identifier_or_variable(vec![ident.value.clone()]),
        sp::Expr::CompoundIdentifier(idents) => {
            identifier_or_variable(idents.iter().map(|i| i.value.clone()).collect())
        }
        sp::Expr::Value(value) => convert_value(&value.value),
        sp::Expr::Nested(inner) => convert_expr(inner)?,
        sp::Expr::BinaryOp { left, op, right } => match convert_binary_operator(op) {
            Some(op) => Expr::binary(op, convert_expr(left)?, convert_expr(right)?),
            None => Expr::Raw(expr.to_string()),
        },
        sp::Expr::UnaryOp { op, expr: inner } => match op {
            sp::UnaryOperator::Not => Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr: Box::new(convert_expr(inner)?),
            },
            sp::UnaryOperator::Minus => match convert_expr(inner)? {
                Expr::Constant(Constant::Int(i)) => Expr::int(-i),
                Expr::Constant(Constant::Float(f)) => Expr::Constant(Constant::Float(-f)),
                other => Expr::UnaryOp {
                    op: UnaryOperator::Minus,
                    expr: Box::new(other),
                },
            },
            _ => Expr::Raw(expr.to_string()),
        },
        sp::Expr::IsNull(inner) => Expr::IsNull {
            expr: Box::new(convert_expr(inner)?),
            negated: false,
        },
        sp::Expr::IsNotNull(inner) => Expr::IsNull {
            expr: Box::new(convert_expr(inner)?),
            negated: true,
        },
        sp::Expr::InList {
            expr: inner,
            list,
            negated,
        } => Expr::InList {
            expr: Box::new(convert_expr(inner)?),
            list: list.iter().map(convert_expr).collect::<SqlResult<Vec<_>>>()?,
            negated: *negated,
        },
        sp::Expr::Between {
            expr: inner,
            negated,
            low,
            high,
        } => Expr::Between {
            expr: Box::new(convert_expr(inner)?),
            low: Box::new(convert_expr(low)?),
            high: Box::new(convert_expr(high)?),
            negated: *negated,
        },
        sp::Expr::Like {
            negated,
            expr: inner,
            pattern,
            ..
        } => Expr::binary(
            if *negated {
                BinaryOperator::NotLike
            } else {
                BinaryOperator::Like
            },
            convert_expr(inner)?,
            convert_expr(pattern)?,
        ),
        sp::Expr::Function(func) => convert_function(func, expr)?,
        other => Expr::Raw(other.to_string()),
    };
    Ok(converted)
}

fn expr_to_u64(expr: &sp::Expr) -> SqlResult<u64> {
    match convert_expr(expr)? {
        Expr::Constant(Constant::Int(i)) if i >= 0 => Ok(i as u64),
        other => Err(SqlApiError::SqlApi(format!(
            "Expected a non-negative integer, got: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_variables() {
        let select = parse_select("SELECT @@version, @@session.autocommit, a").unwrap();
        let exprs: Vec<&Expr> = select.targets.iter().map(|t| &t.expr).collect();
        assert_eq!(exprs[0], &Expr::Variable("version".to_string()));
        assert_eq!(exprs[1], &Expr::Variable("session.autocommit".to_string()));
        assert_eq!(exprs[2], &Expr::ident("a"));
    }

    #[test]
    fn test_parse_select_with_clauses() {
        let select = parse_select(
            "SELECT a, b AS c FROM proj.tbl WHERE x = 1 AND y LIKE 'v%' ORDER BY a DESC LIMIT 5",
        )
        .unwrap();

        assert_eq!(select.targets.len(), 2);
        assert_eq!(select.targets[1].alias.as_deref(), Some("c"));
        assert_eq!(select.table_name(), Some(&Identifier::new(["proj", "tbl"])));
        assert_eq!(select.limit, Some(5));
        assert_eq!(select.order_by.len(), 1);
        assert!(!select.order_by[0].ascending);
        assert_eq!(
            select.where_clause.unwrap().to_string(),
            "(x = 1) AND (y LIKE 'v%')"
        );
    }

    #[test]
    fn test_parse_union_and_subquery() {
        let query = parse_query("SELECT a FROM t1 UNION ALL SELECT a FROM (SELECT a FROM t2) AS s").unwrap();
        match query {
            QueryExpr::Union(union) => {
                assert!(union.all);
                let right = union.right.as_select().unwrap();
                assert!(matches!(right.from, Some(TableRef::Subquery { .. })));
            }
            other => panic!("expected union, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_non_queries() {
        assert!(parse_query("DELETE FROM users").is_err());
        assert!(parse_query("").is_err());
        assert!(parse_query("SELECT * FROM a JOIN b ON a.id = b.id").is_err());
    }

    #[test]
    fn test_parse_functions_and_negatives() {
        let select = parse_select("SELECT count(*), max(DISTINCT v) FROM t WHERE v > -3").unwrap();
        assert_eq!(select.targets[0].expr.to_string(), "count(*)");
        assert_eq!(select.targets[1].expr.to_string(), "max(DISTINCT v)");
        assert_eq!(select.where_clause.unwrap().to_string(), "v > -3");
    }
}
