// Statement AST
//
// Concrete statement shapes consumed by the command router. A statement is
// tagged with exactly one kind; SELECT/UNION trees double as the input of the
// residual tabular evaluator.

use serde_json::{Map, Value as JsonValue};
use std::fmt;

use super::render::{render_expr, render_query, render_select, MySqlStyle};

pub type JsonMap = Map<String, JsonValue>;

/// Dotted name such as `db.table` or `project.model.3`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Identifier {
    pub parts: Vec<String>,
}

impl Identifier {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn single(name: impl Into<String>) -> Self {
        Self {
            parts: vec![name.into()],
        }
    }

    /// Trailing part; empty string for an empty identifier
    pub fn last(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or("")
    }

    pub fn first(&self) -> &str {
        self.parts.first().map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join("."))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Constant {
    pub fn to_json(&self) -> JsonValue {
        match self {
            Constant::Null => JsonValue::Null,
            Constant::Bool(b) => JsonValue::Bool(*b),
            Constant::Int(i) => JsonValue::from(*i),
            Constant::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Constant::String(s) => JsonValue::String(s.clone()),
        }
    }

    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Constant::Null,
            JsonValue::Bool(b) => Constant::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Constant::Int(i),
                None => Constant::Float(n.as_f64().unwrap_or_default()),
            },
            JsonValue::String(s) => Constant::String(s.clone()),
            other => Constant::String(other.to_string()),
        }
    }

    /// True for `1` and `TRUE`, the values SET accepts as "on"
    pub fn is_truthy(&self) -> bool {
        matches!(self, Constant::Int(1) | Constant::Bool(true))
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Null => write!(f, "NULL"),
            Constant::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Constant::Int(i) => write!(f, "{}", i),
            Constant::Float(v) => write!(f, "{:?}", v),
            Constant::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Like,
    NotLike,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::Eq => "=",
            BinaryOperator::NotEq => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Like => "LIKE",
            BinaryOperator::NotLike => "NOT LIKE",
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Identifier(Identifier),
    Constant(Constant),
    Star,
    /// Server variable reference, stored without the `@@` prefix
    Variable(String),
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expr>,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },
    /// Expression text passed through untouched
    Raw(String),
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Identifier(Identifier::single(name))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Constant(Constant::String(value.into()))
    }

    pub fn int(value: i64) -> Self {
        Expr::Constant(Constant::Int(value))
    }

    pub fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Self {
        Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn eq(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOperator::Eq, left, right)
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOperator::And, left, right)
    }

    pub fn or(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOperator::Or, left, right)
    }

    pub fn like(left: Expr, pattern: impl Into<String>) -> Self {
        Self::binary(BinaryOperator::Like, left, Expr::string(pattern))
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Expr::Constant(c) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_expr(self, &MySqlStyle))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectItem {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Self {
        Self {
            expr,
            alias: Some(alias.into()),
        }
    }

    /// `column AS Alias`, the shape used by every SHOW rewrite
    pub fn column_as(column: &str, alias: &str) -> Self {
        Self::aliased(Expr::ident(column), alias)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    Table {
        name: Identifier,
        alias: Option<String>,
    },
    Subquery {
        query: Box<QueryExpr>,
        alias: Option<String>,
    },
    Join {
        left: Box<TableRef>,
        right: Box<TableRef>,
        kind: JoinKind,
        condition: Option<Expr>,
    },
}

impl TableRef {
    pub fn table(name: Identifier) -> Self {
        TableRef::Table { name, alias: None }
    }

    fn collect_tables<'a>(&'a self, out: &mut Vec<&'a Identifier>) {
        match self {
            TableRef::Table { name, .. } => out.push(name),
            TableRef::Subquery { query, .. } => query.collect_tables(out),
            TableRef::Join { left, right, .. } => {
                left.collect_tables(out);
                right.collect_tables(out);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expr: Expr,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Select {
    pub distinct: bool,
    pub targets: Vec<SelectItem>,
    pub from: Option<TableRef>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Select {
    pub fn new(targets: Vec<SelectItem>) -> Self {
        Self {
            targets,
            ..Default::default()
        }
    }

    /// `SELECT * FROM <table>`
    pub fn star_from(table: Identifier) -> Self {
        Self {
            targets: vec![SelectItem::new(Expr::Star)],
            from: Some(TableRef::table(table)),
            ..Default::default()
        }
    }

    pub fn from_table(mut self, table: Identifier) -> Self {
        self.from = Some(TableRef::table(table));
        self
    }

    pub fn with_where(mut self, where_clause: Option<Expr>) -> Self {
        self.where_clause = where_clause;
        self
    }

    /// Identifier of the FROM clause when it is a single plain table
    pub fn table_name(&self) -> Option<&Identifier> {
        match &self.from {
            Some(TableRef::Table { name, .. }) => Some(name),
            _ => None,
        }
    }

    /// All table identifiers referenced by FROM, including joins and subqueries
    pub fn tables(&self) -> Vec<&Identifier> {
        let mut out = Vec::new();
        if let Some(from) = &self.from {
            from.collect_tables(&mut out);
        }
        out
    }

    pub fn is_star(&self) -> bool {
        self.targets.len() == 1 && self.targets[0].expr == Expr::Star
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_select(self, &MySqlStyle))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Union {
    pub left: QueryExpr,
    pub right: QueryExpr,
    pub all: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryExpr {
    Select(Box<Select>),
    Union(Box<Union>),
}

impl QueryExpr {
    fn collect_tables<'a>(&'a self, out: &mut Vec<&'a Identifier>) {
        match self {
            QueryExpr::Select(select) => {
                if let Some(from) = &select.from {
                    from.collect_tables(out);
                }
            }
            QueryExpr::Union(union) => {
                union.left.collect_tables(out);
                union.right.collect_tables(out);
            }
        }
    }

    pub fn as_select(&self) -> Option<&Select> {
        match self {
            QueryExpr::Select(select) => Some(select),
            QueryExpr::Union(_) => None,
        }
    }
}

impl From<Select> for QueryExpr {
    fn from(select: Select) -> Self {
        QueryExpr::Select(Box::new(select))
    }
}

impl fmt::Display for QueryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_query(self, &MySqlStyle))
    }
}

// ---------------------------------------------------------------------------
// Statement kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CreateDatabase {
    pub name: Identifier,
    pub engine: Option<String>,
    pub parameters: JsonMap,
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropDatabase {
    pub name: Identifier,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateMlEngine {
    pub name: Identifier,
    pub handler: String,
    pub params: JsonMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropMlEngine {
    pub name: Identifier,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropPredictor {
    pub name: Identifier,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTables {
    pub tables: Vec<Identifier>,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Describe {
    pub value: Identifier,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RetrainPredictor {
    pub name: Identifier,
    pub integration_name: Option<Identifier>,
    pub query_str: Option<String>,
    /// PREDICT columns; empty keeps the model's current target
    pub targets: Vec<String>,
    pub using: JsonMap,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FinetunePredictor {
    pub name: Identifier,
    pub integration_name: Option<Identifier>,
    pub query_str: Option<String>,
    /// PREDICT columns; empty keeps the model's current target
    pub targets: Vec<String>,
    pub using: JsonMap,
}

/// `SHOW [modes] <category> [FROM x] [LIKE 'p'] [WHERE ...]`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Show {
    pub category: String,
    pub modes: Vec<String>,
    pub from_table: Option<Identifier>,
    pub like: Option<String>,
    pub where_clause: Option<Expr>,
}

impl Show {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..Default::default()
        }
    }

    pub fn has_mode(&self, mode: &str) -> bool {
        self.modes.iter().any(|m| m.eq_ignore_ascii_case(mode))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Set {
    pub category: Option<String>,
    pub arg: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Use {
    pub value: Identifier,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreatePredictor {
    pub name: Identifier,
    pub integration_name: Option<Identifier>,
    pub query_str: Option<String>,
    pub targets: Vec<String>,
    pub using: JsonMap,
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateView {
    pub name: Identifier,
    pub query_str: String,
    pub from_table: Option<Identifier>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropView {
    pub names: Vec<Identifier>,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: Identifier,
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: Identifier,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Expr>>,
    pub from_select: Option<Box<QueryExpr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: Identifier,
    pub update_columns: Vec<(String, Expr)>,
    pub where_clause: Option<Expr>,
    pub from_select: Option<Box<Select>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Explain {
    pub target: Identifier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub name: Identifier,
    pub from_select: Option<Box<QueryExpr>>,
    pub is_replace: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alter {
    pub table: Identifier,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateJob {
    pub name: Identifier,
    pub query_str: String,
    pub start_str: Option<String>,
    pub end_str: Option<String>,
    pub repeat_str: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropJob {
    pub name: Identifier,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTrigger {
    pub name: Identifier,
    pub table: Identifier,
    pub query_str: String,
    pub columns: Vec<Identifier>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTrigger {
    pub name: Identifier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateChatBot {
    pub name: Identifier,
    pub database: Identifier,
    pub model: Identifier,
    pub params: JsonMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateChatBot {
    pub name: Identifier,
    pub updated_params: JsonMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropChatBot {
    pub name: Identifier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateKnowledgeBase {
    pub name: Identifier,
    pub model: Identifier,
    pub storage: Option<Identifier>,
    pub from_select: Option<Box<Select>>,
    pub params: JsonMap,
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropKnowledgeBase {
    pub name: Identifier,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateSkill {
    pub name: Identifier,
    pub skill_type: String,
    pub params: JsonMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropSkill {
    pub name: Identifier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSkill {
    pub name: Identifier,
    pub updated_params: JsonMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateAgent {
    pub name: Identifier,
    pub model: String,
    pub params: JsonMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropAgent {
    pub name: Identifier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateAgent {
    pub name: Identifier,
    pub updated_params: JsonMap,
}

/// `EVALUATE <metric> FROM (<query>) [USING ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluate {
    pub name: Identifier,
    pub query_str: String,
    pub using: JsonMap,
}

/// One parsed SQL command
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateDatabase(CreateDatabase),
    DropDatabase(DropDatabase),
    CreateMlEngine(CreateMlEngine),
    DropMlEngine(DropMlEngine),
    DropPredictor(DropPredictor),
    DropTables(DropTables),
    Describe(Describe),
    RetrainPredictor(RetrainPredictor),
    FinetunePredictor(FinetunePredictor),
    Show(Show),
    StartTransaction,
    CommitTransaction,
    RollbackTransaction,
    Set(Set),
    Use(Use),
    CreatePredictor(CreatePredictor),
    CreateView(CreateView),
    DropView(DropView),
    Delete(Delete),
    Insert(Insert),
    Update(Update),
    Select(Select),
    Union(Union),
    Explain(Explain),
    CreateTable(CreateTable),
    Alter(Alter),
    CreateJob(CreateJob),
    DropJob(DropJob),
    CreateTrigger(CreateTrigger),
    DropTrigger(DropTrigger),
    CreateChatBot(CreateChatBot),
    UpdateChatBot(UpdateChatBot),
    DropChatBot(DropChatBot),
    CreateKnowledgeBase(CreateKnowledgeBase),
    DropKnowledgeBase(DropKnowledgeBase),
    CreateSkill(CreateSkill),
    DropSkill(DropSkill),
    UpdateSkill(UpdateSkill),
    CreateAgent(CreateAgent),
    DropAgent(DropAgent),
    UpdateAgent(UpdateAgent),
    Evaluate(Evaluate),
    /// Statement the parser produced but the router has no handler for
    Unknown { sql: String },
}

impl Statement {
    /// Kind name used in logs
    pub fn kind_name(&self) -> &'static str {
        match self {
            Statement::CreateDatabase(_) => "CreateDatabase",
            Statement::DropDatabase(_) => "DropDatabase",
            Statement::CreateMlEngine(_) => "CreateMLEngine",
            Statement::DropMlEngine(_) => "DropMLEngine",
            Statement::DropPredictor(_) => "DropPredictor",
            Statement::DropTables(_) => "DropTables",
            Statement::Describe(_) => "Describe",
            Statement::RetrainPredictor(_) => "RetrainPredictor",
            Statement::FinetunePredictor(_) => "FinetunePredictor",
            Statement::Show(_) => "Show",
            Statement::StartTransaction => "StartTransaction",
            Statement::CommitTransaction => "CommitTransaction",
            Statement::RollbackTransaction => "RollbackTransaction",
            Statement::Set(_) => "Set",
            Statement::Use(_) => "Use",
            Statement::CreatePredictor(_) => "CreatePredictor",
            Statement::CreateView(_) => "CreateView",
            Statement::DropView(_) => "DropView",
            Statement::Delete(_) => "Delete",
            Statement::Insert(_) => "Insert",
            Statement::Update(_) => "Update",
            Statement::Select(_) => "Select",
            Statement::Union(_) => "Union",
            Statement::Explain(_) => "Explain",
            Statement::CreateTable(_) => "CreateTable",
            Statement::Alter(_) => "Alter",
            Statement::CreateJob(_) => "CreateJob",
            Statement::DropJob(_) => "DropJob",
            Statement::CreateTrigger(_) => "CreateTrigger",
            Statement::DropTrigger(_) => "DropTrigger",
            Statement::CreateChatBot(_) => "CreateChatBot",
            Statement::UpdateChatBot(_) => "UpdateChatBot",
            Statement::DropChatBot(_) => "DropChatBot",
            Statement::CreateKnowledgeBase(_) => "CreateKnowledgeBase",
            Statement::DropKnowledgeBase(_) => "DropKnowledgeBase",
            Statement::CreateSkill(_) => "CreateSkill",
            Statement::DropSkill(_) => "DropSkill",
            Statement::UpdateSkill(_) => "UpdateSkill",
            Statement::CreateAgent(_) => "CreateAgent",
            Statement::DropAgent(_) => "DropAgent",
            Statement::UpdateAgent(_) => "UpdateAgent",
            Statement::Evaluate(_) => "Evaluate",
            Statement::Unknown { .. } => "Unknown",
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Select(select) => write!(f, "{}", select),
            Statement::Union(union) => {
                let query = QueryExpr::Union(Box::new(union.clone()));
                write!(f, "{}", query)
            }
            Statement::Show(show) => {
                write!(f, "SHOW")?;
                for mode in &show.modes {
                    write!(f, " {}", mode)?;
                }
                write!(f, " {}", show.category)?;
                if let Some(from) = &show.from_table {
                    write!(f, " FROM {}", from)?;
                }
                if let Some(like) = &show.like {
                    write!(f, " LIKE '{}'", like)?;
                }
                if let Some(where_clause) = &show.where_clause {
                    write!(f, " WHERE {}", where_clause)?;
                }
                Ok(())
            }
            Statement::Use(u) => write!(f, "USE {}", u.value),
            Statement::Describe(d) => write!(f, "DESCRIBE {}", d.value),
            Statement::Unknown { sql } => f.write_str(sql),
            Statement::StartTransaction => f.write_str("START TRANSACTION"),
            Statement::CommitTransaction => f.write_str("COMMIT"),
            Statement::RollbackTransaction => f.write_str("ROLLBACK"),
            other => {
                let name = match other {
                    Statement::CreateDatabase(s) => Some(&s.name),
                    Statement::DropDatabase(s) => Some(&s.name),
                    Statement::CreateMlEngine(s) => Some(&s.name),
                    Statement::DropMlEngine(s) => Some(&s.name),
                    Statement::DropPredictor(s) => Some(&s.name),
                    Statement::RetrainPredictor(s) => Some(&s.name),
                    Statement::FinetunePredictor(s) => Some(&s.name),
                    Statement::CreatePredictor(s) => Some(&s.name),
                    Statement::CreateView(s) => Some(&s.name),
                    Statement::Delete(s) => Some(&s.table),
                    Statement::Insert(s) => Some(&s.table),
                    Statement::Update(s) => Some(&s.table),
                    Statement::Explain(s) => Some(&s.target),
                    Statement::CreateTable(s) => Some(&s.name),
                    Statement::Alter(s) => Some(&s.table),
                    Statement::CreateJob(s) => Some(&s.name),
                    Statement::DropJob(s) => Some(&s.name),
                    Statement::CreateTrigger(s) => Some(&s.name),
                    Statement::DropTrigger(s) => Some(&s.name),
                    Statement::CreateChatBot(s) => Some(&s.name),
                    Statement::UpdateChatBot(s) => Some(&s.name),
                    Statement::DropChatBot(s) => Some(&s.name),
                    Statement::CreateKnowledgeBase(s) => Some(&s.name),
                    Statement::DropKnowledgeBase(s) => Some(&s.name),
                    Statement::CreateSkill(s) => Some(&s.name),
                    Statement::DropSkill(s) => Some(&s.name),
                    Statement::UpdateSkill(s) => Some(&s.name),
                    Statement::CreateAgent(s) => Some(&s.name),
                    Statement::DropAgent(s) => Some(&s.name),
                    Statement::UpdateAgent(s) => Some(&s.name),
                    Statement::Evaluate(s) => Some(&s.name),
                    _ => None,
                };
                match name {
                    Some(name) => write!(f, "{} {}", other.kind_name(), name),
                    None => f.write_str(other.kind_name()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_tables_counts_joins_and_subqueries() {
        let inner = Select::star_from(Identifier::new(["db", "t2"]));
        let select = Select {
            targets: vec![SelectItem::new(Expr::Star)],
            from: Some(TableRef::Join {
                left: Box::new(TableRef::table(Identifier::single("t1"))),
                right: Box::new(TableRef::Subquery {
                    query: Box::new(inner.into()),
                    alias: Some("s".to_string()),
                }),
                kind: JoinKind::Inner,
                condition: None,
            }),
            ..Default::default()
        };

        let tables: Vec<String> = select.tables().iter().map(|t| t.to_string()).collect();
        assert_eq!(tables, vec!["t1", "db.t2"]);
        assert!(select.table_name().is_none());
    }

    #[test]
    fn test_constant_truthiness() {
        assert!(Constant::Int(1).is_truthy());
        assert!(Constant::Bool(true).is_truthy());
        assert!(!Constant::Int(0).is_truthy());
        assert!(!Constant::String("1".to_string()).is_truthy());
    }

    #[test]
    fn test_statement_display_for_diagnostics() {
        let show = Statement::Show(Show {
            category: "tables".to_string(),
            modes: vec!["FULL".to_string()],
            from_table: Some(Identifier::single("proj")),
            like: Some("a%".to_string()),
            where_clause: None,
        });
        assert_eq!(show.to_string(), "SHOW FULL tables FROM proj LIKE 'a%'");

        let drop = Statement::DropJob(DropJob {
            name: Identifier::new(["proj", "j1"]),
            if_exists: false,
        });
        assert_eq!(drop.to_string(), "DropJob proj.j1");
    }
}
