// End-to-end behaviour of the command router over in-memory controllers

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

use mindsdb_command_layer::catalog::{columns_of, table_names};
use mindsdb_command_layer::config::Config;
use mindsdb_command_layer::models::{ModelRecord, ModelStatus};
use mindsdb_command_layer::services::memory::InMemoryControllers;
use mindsdb_command_layer::services::{ControllerResult, ExecutionOptions, ModelController, TrainingRequest};
use mindsdb_command_layer::sql::*;
use mindsdb_command_layer::{
    ControllerSet, ExecuteAnswer, ExecuteCommands, SessionController, SessionJobRunner, SqlResult, TabularResult,
};

fn setup() -> (Arc<ControllerSet>, SessionController) {
    let controllers = InMemoryControllers::new(Config::default()).build();
    let session = SessionController::new(Arc::clone(&controllers));
    (controllers, session)
}

fn params(value: JsonValue) -> JsonMap {
    value.as_object().cloned().unwrap_or_default()
}

fn name(parts: &[&str]) -> Identifier {
    Identifier::new(parts.iter().copied())
}

async fn run(session: &mut SessionController, statement: Statement) -> SqlResult<ExecuteAnswer> {
    ExecuteCommands::new(session).execute_command(&statement).await
}

async fn expect_ok(session: &mut SessionController, statement: Statement) -> ExecuteAnswer {
    let text = statement.to_string();
    match run(session, statement).await {
        Ok(answer) => answer,
        Err(e) => panic!("{} failed: {}", text, e),
    }
}

async fn select(session: &mut SessionController, sql: &str) -> TabularResult {
    let statement = Statement::Select(parse_select(sql).unwrap());
    expect_ok(session, statement).await.into_result()
}

fn create_model(model: &str, tag: Option<&str>) -> Statement {
    let using = match tag {
        Some(tag) => params(json!({ "tag": tag })),
        None => JsonMap::new(),
    };
    Statement::CreatePredictor(CreatePredictor {
        name: name(&["mindsdb", model]),
        targets: vec!["y".to_string()],
        using,
        ..Default::default()
    })
}

fn retrain(model: &str, tag: &str) -> Statement {
    Statement::RetrainPredictor(RetrainPredictor {
        name: name(&["mindsdb", model]),
        using: params(json!({ "tag": tag })),
        ..Default::default()
    })
}

fn delete_version(model: &str, version: i64) -> Statement {
    Statement::Delete(Delete {
        table: name(&["mindsdb", "models_versions"]),
        where_clause: Some(Expr::and(
            Expr::eq(Expr::ident("name"), Expr::string(model)),
            Expr::eq(Expr::ident("version"), Expr::int(version)),
        )),
    })
}

fn predict_version(model: &str, version: u32) -> Statement {
    let version = version.to_string();
    Statement::Select(
        Select::star_from(name(&["mindsdb", model, version.as_str()]))
            .with_where(Some(Expr::eq(Expr::ident("x"), Expr::int(1)))),
    )
}

#[tokio::test]
async fn test_catalog_rows_match_column_lists() {
    let (controllers, mut session) = setup();
    expect_ok(&mut session, create_model("m", None)).await;
    expect_ok(
        &mut session,
        Statement::CreateJob(CreateJob {
            name: name(&["mindsdb", "j"]),
            query_str: "SELECT 1".to_string(),
            ..Default::default()
        }),
    )
    .await;

    for table in table_names() {
        let columns = columns_of(table).unwrap();
        assert!(!columns.is_empty(), "{} has no columns", table);

        let query = QueryExpr::from(Select::star_from(name(&["information_schema", table])));
        let result = controllers
            .engine
            .execute_query(&query, &session, ExecutionOptions::default())
            .await
            .unwrap();
        assert_eq!(result.columns.len(), columns.len(), "{}", table);
        for row in &result.rows {
            assert_eq!(row.len(), columns.len(), "{}", table);
        }
    }
}

#[tokio::test]
async fn test_tables_schema_filter() {
    let (_, mut session) = setup();
    expect_ok(&mut session, create_model("m", None)).await;

    let result = select(
        &mut session,
        "SELECT * FROM information_schema.tables WHERE table_schema = 'mindsdb'",
    )
    .await;
    assert!(!result.rows.is_empty());
    let schema = result.column_index("TABLE_SCHEMA").unwrap();
    assert!(result.rows.iter().all(|row| row[schema] == json!("mindsdb")));

    let result = select(
        &mut session,
        "SELECT * FROM information_schema.tables WHERE table_schema = 'nope'",
    )
    .await;
    assert!(result.rows.is_empty());
}

#[tokio::test]
async fn test_tables_lists_every_system_view() {
    let (_, mut session) = setup();
    let result = select(
        &mut session,
        "SELECT table_name, table_type FROM information_schema.tables",
    )
    .await;

    for table in table_names() {
        let found = result
            .rows
            .iter()
            .any(|row| row[0] == json!(table) && row[1] == json!("SYSTEM VIEW"));
        assert!(found, "{} is missing from TABLES", table);
    }
}

#[tokio::test]
async fn test_model_version_lifecycle() {
    let (_, mut session) = setup();
    expect_ok(&mut session, create_model("m", Some("first"))).await;
    expect_ok(&mut session, retrain("m", "second")).await;
    expect_ok(&mut session, retrain("m", "third")).await;

    let versions = select(
        &mut session,
        "SELECT version, active FROM information_schema.models_versions WHERE name = 'm'",
    )
    .await;
    assert_eq!(versions.rows.len(), 3);
    let active = select(&mut session, "SELECT version FROM information_schema.models WHERE name = 'm'").await;
    assert_eq!(active.rows, vec![vec![json!(3)]]);

    // An inactive version still predicts with its own metadata
    let prediction = expect_ok(&mut session, predict_version("m", 2)).await.into_result();
    let label = prediction.column_index("model_label").unwrap();
    assert_eq!(prediction.rows[0][label], json!("second"));

    let err = run(&mut session, delete_version("m", 3)).await.unwrap_err();
    assert!(err.to_string().contains("active version"), "{}", err);

    let err = run(&mut session, delete_version("m", 9)).await.unwrap_err();
    assert!(err.to_string().contains("not found"), "{}", err);

    expect_ok(&mut session, delete_version("m", 2)).await;
    let err = run(&mut session, predict_version("m", 2)).await.unwrap_err();
    assert!(err.to_string().contains("does not exist"), "{}", err);

    expect_ok(
        &mut session,
        Statement::DropPredictor(DropPredictor {
            name: name(&["mindsdb", "m"]),
            if_exists: false,
        }),
    )
    .await;
    let versions = select(
        &mut session,
        "SELECT version FROM information_schema.models_versions WHERE name = 'm'",
    )
    .await;
    assert!(versions.rows.is_empty());
}

#[tokio::test]
async fn test_job_schedules() {
    let (controllers, mut session) = setup();
    let start = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();

    expect_ok(
        &mut session,
        Statement::CreateJob(CreateJob {
            name: name(&["mindsdb", "once"]),
            query_str: "SELECT * FROM information_schema.models".to_string(),
            start_str: Some("2030-01-01 00:00:00".to_string()),
            ..Default::default()
        }),
    )
    .await;
    expect_ok(
        &mut session,
        Statement::CreateJob(CreateJob {
            name: name(&["mindsdb", "hourly"]),
            query_str: "SELECT * FROM information_schema.models".to_string(),
            start_str: Some("2030-01-01 00:00:00".to_string()),
            repeat_str: Some("hour".to_string()),
            ..Default::default()
        }),
    )
    .await;

    let once = controllers.jobs.get("mindsdb", "once").await.unwrap().unwrap();
    assert_eq!(once.start_at, start);
    assert_eq!(once.next_run_at, Some(start));
    assert!(once.schedule_str.is_none());

    let hourly = controllers.jobs.get("mindsdb", "hourly").await.unwrap().unwrap();
    assert_eq!(hourly.schedule_str.as_deref(), Some("every hour"));

    let runner = SessionJobRunner::new(Arc::clone(&controllers));
    let ran = controllers
        .jobs
        .run_pending(start + Duration::minutes(1), &runner)
        .await
        .unwrap();
    assert_eq!(ran, 2);

    let hourly = controllers.jobs.get("mindsdb", "hourly").await.unwrap().unwrap();
    let next = hourly.next_run_at.unwrap();
    assert!((next - (start + Duration::minutes(60))).num_minutes().abs() <= 2);

    let history = controllers.jobs.history(Some("mindsdb")).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|h| h.error.is_none()));
}

#[tokio::test]
async fn test_drop_missing_entities_names_them() {
    let (_, mut session) = setup();

    let statements = vec![
        Statement::DropKnowledgeBase(DropKnowledgeBase {
            name: name(&["mindsdb", "nope_kb"]),
            if_exists: false,
        }),
        Statement::DropSkill(DropSkill {
            name: name(&["mindsdb", "nope_skill"]),
        }),
        Statement::DropAgent(DropAgent {
            name: name(&["mindsdb", "nope_agent"]),
        }),
    ];

    for statement in statements {
        let missing = match &statement {
            Statement::DropKnowledgeBase(s) => s.name.last().to_string(),
            Statement::DropSkill(s) => s.name.last().to_string(),
            Statement::DropAgent(s) => s.name.last().to_string(),
            _ => unreachable!(),
        };
        let err = run(&mut session, statement).await.unwrap_err();
        assert!(err.to_string().contains(&missing), "{}", err);
    }

    expect_ok(
        &mut session,
        Statement::DropKnowledgeBase(DropKnowledgeBase {
            name: name(&["mindsdb", "nope_kb"]),
            if_exists: true,
        }),
    )
    .await;
}

#[tokio::test]
async fn test_every_statement_kind_dispatches() {
    let (_, mut session) = setup();

    let script = vec![
        Statement::CreateDatabase(CreateDatabase {
            name: name(&["proj"]),
            engine: None,
            parameters: JsonMap::new(),
            if_not_exists: false,
        }),
        Statement::CreateDatabase(CreateDatabase {
            name: name(&["demo"]),
            engine: Some("memory".to_string()),
            parameters: params(json!({ "database": "demo" })),
            if_not_exists: false,
        }),
        Statement::CreateMlEngine(CreateMlEngine {
            name: name(&["openai_engine"]),
            handler: "openai".to_string(),
            params: params(json!({ "openai_api_key": "key" })),
        }),
        create_model("m", None),
        Statement::Describe(Describe {
            value: name(&["mindsdb", "m"]),
        }),
        retrain("m", "v2"),
        Statement::FinetunePredictor(FinetunePredictor {
            name: name(&["mindsdb", "m"]),
            ..Default::default()
        }),
        Statement::Show(Show::new("models")),
        Statement::Show(Show::new("databases")),
        Statement::StartTransaction,
        Statement::CommitTransaction,
        Statement::RollbackTransaction,
        Statement::Set(Set {
            category: Some("names".to_string()),
            arg: Some(Expr::string("utf8mb4")),
        }),
        Statement::Use(Use { value: name(&["proj"]) }),
        Statement::Use(Use { value: name(&["mindsdb"]) }),
        Statement::CreateView(CreateView {
            name: name(&["mindsdb", "v"]),
            query_str: "SELECT name FROM information_schema.models".to_string(),
            from_table: None,
        }),
        Statement::Select(parse_select("SELECT 1").unwrap()),
        Statement::Select(parse_select("SELECT * FROM mindsdb.v").unwrap()),
        Statement::Explain(Explain {
            target: name(&["mindsdb", "models"]),
        }),
        Statement::CreateTable(CreateTable {
            name: name(&["demo", "t"]),
            from_select: Some(Box::new(parse_query("SELECT 1 AS a").unwrap())),
            is_replace: false,
        }),
        Statement::Insert(Insert {
            table: name(&["demo", "t"]),
            columns: vec!["a".to_string()],
            values: vec![vec![Expr::int(2)]],
            from_select: None,
        }),
        Statement::Update(Update {
            table: name(&["demo", "t"]),
            update_columns: vec![("a".to_string(), Expr::int(3))],
            where_clause: Some(Expr::eq(Expr::ident("a"), Expr::int(2))),
            from_select: None,
        }),
        Statement::Delete(Delete {
            table: name(&["demo", "t"]),
            where_clause: Some(Expr::eq(Expr::ident("a"), Expr::int(3))),
        }),
        Statement::Alter(Alter {
            table: name(&["demo", "t"]),
            action: "disable keys".to_string(),
        }),
        Statement::CreateJob(CreateJob {
            name: name(&["mindsdb", "j"]),
            query_str: "SELECT 1".to_string(),
            ..Default::default()
        }),
        Statement::DropJob(DropJob {
            name: name(&["mindsdb", "j"]),
            if_exists: false,
        }),
        Statement::CreateTrigger(CreateTrigger {
            name: name(&["mindsdb", "tr"]),
            table: name(&["demo", "t"]),
            query_str: "SELECT 1".to_string(),
            columns: Vec::new(),
        }),
        Statement::DropTrigger(DropTrigger {
            name: name(&["mindsdb", "tr"]),
        }),
        Statement::CreateChatBot(CreateChatBot {
            name: name(&["mindsdb", "bot"]),
            database: name(&["demo"]),
            model: name(&["m"]),
            params: JsonMap::new(),
        }),
        Statement::UpdateChatBot(UpdateChatBot {
            name: name(&["mindsdb", "bot"]),
            updated_params: params(json!({ "is_running": false })),
        }),
        Statement::DropChatBot(DropChatBot {
            name: name(&["mindsdb", "bot"]),
        }),
        Statement::CreateSkill(CreateSkill {
            name: name(&["mindsdb", "s"]),
            skill_type: "text2sql".to_string(),
            params: JsonMap::new(),
        }),
        Statement::UpdateSkill(UpdateSkill {
            name: name(&["mindsdb", "s"]),
            updated_params: params(json!({ "description": "sales" })),
        }),
        Statement::CreateAgent(CreateAgent {
            name: name(&["mindsdb", "a"]),
            model: "m".to_string(),
            params: params(json!({ "skills": ["s"] })),
        }),
        Statement::UpdateAgent(UpdateAgent {
            name: name(&["mindsdb", "a"]),
            updated_params: params(json!({ "prompt": "be brief" })),
        }),
        Statement::DropAgent(DropAgent {
            name: name(&["mindsdb", "a"]),
        }),
        Statement::DropSkill(DropSkill {
            name: name(&["mindsdb", "s"]),
        }),
        Statement::CreateKnowledgeBase(CreateKnowledgeBase {
            name: name(&["mindsdb", "kb"]),
            model: name(&["m"]),
            storage: None,
            from_select: None,
            params: JsonMap::new(),
            if_not_exists: false,
        }),
        Statement::Select(parse_select("SELECT * FROM kb").unwrap()),
        Statement::DropKnowledgeBase(DropKnowledgeBase {
            name: name(&["mindsdb", "kb"]),
            if_exists: false,
        }),
        Statement::Evaluate(Evaluate {
            name: name(&["accuracy_score"]),
            query_str: "SELECT 1 AS actual, 1 AS prediction".to_string(),
            using: JsonMap::new(),
        }),
        Statement::DropView(DropView {
            names: vec![name(&["mindsdb", "v"])],
            if_exists: false,
        }),
        Statement::DropTables(DropTables {
            tables: vec![name(&["mindsdb", "missing"])],
            if_exists: true,
        }),
        Statement::DropPredictor(DropPredictor {
            name: name(&["mindsdb", "m"]),
            if_exists: false,
        }),
        Statement::DropMlEngine(DropMlEngine {
            name: name(&["openai_engine"]),
            if_exists: false,
        }),
        Statement::DropDatabase(DropDatabase {
            name: name(&["demo"]),
            if_exists: false,
        }),
        Statement::DropDatabase(DropDatabase {
            name: name(&["proj"]),
            if_exists: false,
        }),
    ];

    for statement in script {
        let answer = expect_ok(&mut session, statement).await;
        assert!(answer.is_ok() || !answer.columns.is_empty());
    }

    let union = match parse_query("SELECT 1 AS a UNION ALL SELECT 2 AS a").unwrap() {
        QueryExpr::Union(union) => *union,
        QueryExpr::Select(_) => unreachable!(),
    };
    let answer = expect_ok(&mut session, Statement::Union(union)).await;
    assert_eq!(answer.data.len(), 2);

    let err = run(
        &mut session,
        Statement::Unknown {
            sql: "VACUUM".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "Unknown SQL statement: VACUUM");
}

#[tokio::test]
async fn test_evaluate_scores_predictions() {
    let (_, mut session) = setup();
    let answer = expect_ok(
        &mut session,
        Statement::Evaluate(Evaluate {
            name: name(&["accuracy_score"]),
            query_str: "SELECT 1 AS actual, 1 AS prediction UNION ALL SELECT 2 AS actual, 1 AS prediction"
                .to_string(),
            using: JsonMap::new(),
        }),
    )
    .await;
    assert_eq!(answer.column_names(), vec!["accuracy_score"]);
    assert_eq!(answer.data, vec![vec![json!(0.5)]]);
}

#[tokio::test]
async fn test_use_unknown_database() {
    let (_, mut session) = setup();
    let err = run(&mut session, Statement::Use(Use { value: name(&["nope"]) }))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Database nope does not exists");
    assert_eq!(err.code(), 1049);
    assert_eq!(session.database, "mindsdb");
}

#[tokio::test]
async fn test_single_row_select() {
    let (_, mut session) = setup();
    let answer = expect_ok(
        &mut session,
        Statement::Select(parse_select("SELECT @@version, database() AS db, 'x', NULL").unwrap()),
    )
    .await;
    assert_eq!(answer.column_names(), vec!["@@version", "db", "x", "NULL"]);
    assert_eq!(answer.data, vec![vec![json!("8.0.17"), json!("mindsdb"), json!("x"), JsonValue::Null]]);

    let err = run(
        &mut session,
        Statement::Select(parse_select("SELECT @@no_such_variable").unwrap()),
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "Unknown variable 'no_such_variable'");
}

#[tokio::test]
async fn test_failed_first_training_is_listed_and_retrainable() {
    let (_, mut session) = setup();
    let answer = expect_ok(
        &mut session,
        Statement::CreatePredictor(CreatePredictor {
            name: name(&["mindsdb", "bad"]),
            query_str: Some("SELECT 1 AS x".to_string()),
            targets: vec!["y".to_string()],
            ..Default::default()
        }),
    )
    .await
    .into_result();
    let status = answer.column_index("STATUS").unwrap();
    assert_eq!(answer.rows[0][status], json!("error"));

    let models = select(
        &mut session,
        "SELECT name, status, version FROM information_schema.models WHERE name = 'bad'",
    )
    .await;
    assert_eq!(models.rows, vec![vec![json!("bad"), json!("error"), json!(1)]]);

    let err = run(&mut session, create_model("bad", None)).await.unwrap_err();
    assert!(err.to_string().contains("already exists"), "{}", err);

    // Retraining on a column the data has recovers the model
    expect_ok(
        &mut session,
        Statement::RetrainPredictor(RetrainPredictor {
            name: name(&["mindsdb", "bad"]),
            targets: vec!["x".to_string()],
            ..Default::default()
        }),
    )
    .await;
    let models = select(
        &mut session,
        "SELECT status, version, predict FROM information_schema.models WHERE name = 'bad'",
    )
    .await;
    assert_eq!(models.rows, vec![vec![json!("complete"), json!(2), json!("x")]]);
}

#[tokio::test]
async fn test_show_models_spans_projects() {
    let (_, mut session) = setup();
    expect_ok(
        &mut session,
        Statement::CreateDatabase(CreateDatabase {
            name: name(&["proj"]),
            engine: None,
            parameters: JsonMap::new(),
            if_not_exists: false,
        }),
    )
    .await;
    expect_ok(&mut session, create_model("m", None)).await;
    expect_ok(
        &mut session,
        Statement::CreatePredictor(CreatePredictor {
            name: name(&["proj", "task_model"]),
            targets: vec!["y".to_string()],
            ..Default::default()
        }),
    )
    .await;

    let names = |answer: ExecuteAnswer| -> Vec<JsonValue> {
        let result = answer.into_result();
        let idx = result.column_index("NAME").unwrap();
        result.rows.into_iter().map(|row| row[idx].clone()).collect()
    };

    let all = names(expect_ok(&mut session, Statement::Show(Show::new("models"))).await);
    assert!(all.contains(&json!("task_model")), "{:?}", all);
    assert!(all.contains(&json!("m")), "{:?}", all);

    let show = Show {
        category: "models".to_string(),
        where_clause: Some(Expr::eq(Expr::ident("name"), Expr::string("task_model"))),
        ..Default::default()
    };
    assert_eq!(names(expect_ok(&mut session, Statement::Show(show)).await), vec![json!("task_model")]);

    let show = Show {
        category: "models".to_string(),
        from_table: Some(name(&["proj"])),
        ..Default::default()
    };
    assert_eq!(names(expect_ok(&mut session, Statement::Show(show)).await), vec![json!("task_model")]);
}

#[tokio::test]
async fn test_show_index_and_collation_columns() {
    let (_, mut session) = setup();
    let answer = expect_ok(&mut session, Statement::Show(Show::new("index"))).await;
    let columns = answer.column_names();
    assert_eq!(&columns[columns.len() - 2..], &["Visible", "Expression"]);

    let answer = expect_ok(&mut session, Statement::Show(Show::new("collation"))).await;
    assert_eq!(answer.column_names().last(), Some(&"Pad_attribute"));
}

/// Model store reporting one extra model of project `other` in training
struct TrainingElsewhere {
    inner: Arc<dyn ModelController>,
    started_at: DateTime<Utc>,
}

impl TrainingElsewhere {
    fn busy_model(&self) -> ModelRecord {
        let mut model = ModelRecord::new("other", "busy", "lightwood", "lightwood");
        model.status = ModelStatus::Training;
        model.training_start_at = Some(self.started_at);
        model.active = true;
        model
    }
}

#[async_trait]
impl ModelController for TrainingElsewhere {
    async fn get_model(&self, project: &str, name: &str, version: Option<u32>) -> ControllerResult<Option<ModelRecord>> {
        self.inner.get_model(project, name, version).await
    }

    async fn list_models(&self, project: Option<&str>, active_only: bool) -> ControllerResult<Vec<ModelRecord>> {
        let mut models = self.inner.list_models(project, active_only).await?;
        if project.map_or(true, |p| p == "other") {
            models.push(self.busy_model());
        }
        Ok(models)
    }

    async fn create_model(&self, request: TrainingRequest) -> ControllerResult<ModelRecord> {
        self.inner.create_model(request).await
    }

    async fn retrain_model(&self, request: TrainingRequest) -> ControllerResult<ModelRecord> {
        self.inner.retrain_model(request).await
    }

    async fn finetune_model(&self, request: TrainingRequest) -> ControllerResult<ModelRecord> {
        self.inner.finetune_model(request).await
    }

    async fn describe_model(&self, project: &str, name: &str, attribute: Option<&str>) -> ControllerResult<TabularResult> {
        self.inner.describe_model(project, name, attribute).await
    }

    async fn delete_model(&self, project: &str, name: &str) -> ControllerResult<()> {
        self.inner.delete_model(project, name).await
    }

    async fn update_model_version(&self, project: &str, name: &str, version: u32, changes: &JsonMap) -> ControllerResult<()> {
        self.inner.update_model_version(project, name, version, changes).await
    }

    async fn delete_model_version(&self, project: &str, name: &str, version: u32) -> ControllerResult<()> {
        self.inner.delete_model_version(project, name, version).await
    }
}

fn cloud_session(started_at: DateTime<Utc>) -> SessionController {
    let mut config = Config::default();
    config.executor.cloud = true;
    let mut set = match Arc::try_unwrap(InMemoryControllers::new(config).build()) {
        Ok(set) => set,
        Err(_) => panic!("controller set is shared"),
    };
    set.models = Arc::new(TrainingElsewhere {
        inner: Arc::clone(&set.models),
        started_at,
    });
    SessionController::new(Arc::new(set))
}

#[tokio::test]
async fn test_training_guard_blocks_recent_training() {
    let mut session = cloud_session(Utc::now() - Duration::minutes(5));
    expect_ok(&mut session, create_model("m", None)).await;

    let err = run(&mut session, retrain("m", "v2")).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Can't start retrain process while any other predictor is in status 'training' or 'generating'"
    );

    let finetune = Statement::FinetunePredictor(FinetunePredictor {
        name: name(&["mindsdb", "m"]),
        ..Default::default()
    });
    let err = run(&mut session, finetune).await.unwrap_err();
    assert!(err.to_string().starts_with("Can't start finetune process"), "{}", err);

    // Metered users only
    session.user_class = 1;
    expect_ok(&mut session, retrain("m", "v2")).await;
}

#[tokio::test]
async fn test_training_guard_ignores_stale_training() {
    let mut session = cloud_session(Utc::now() - Duration::minutes(90));
    expect_ok(&mut session, create_model("m", None)).await;
    expect_ok(&mut session, retrain("m", "v2")).await;
}
