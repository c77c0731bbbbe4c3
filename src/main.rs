use chrono::Utc;
use serde_json::json;
use tracing::{error, info};

use mindsdb_command_layer::config::Config;
use mindsdb_command_layer::services::memory::InMemoryControllers;
use mindsdb_command_layer::sql::{
    parse_select, CreateDatabase, CreateJob, CreatePredictor, Identifier, JsonMap, Show, Statement,
};
use mindsdb_command_layer::{ExecuteAnswer, ExecuteCommands, SessionController, SessionJobRunner};

fn log_answer(statement: &Statement, answer: &ExecuteAnswer) {
    if answer.is_ok() {
        info!(statement = %statement, "OK");
        return;
    }
    info!(statement = %statement, columns = ?answer.column_names(), rows = answer.data.len(), "TABLE");
    for row in &answer.data {
        info!("  {}", json!(row));
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!(
        default_project = %config.executor.default_project,
        default_ml_engine = %config.executor.default_ml_engine,
        cloud = config.executor.cloud,
        "Starting command layer"
    );

    let controllers = InMemoryControllers::new(config).build();
    let mut session = SessionController::new(controllers.clone());

    let mut memory_args = JsonMap::new();
    memory_args.insert("database".to_string(), json!("demo"));

    let script = vec![
        Statement::CreateDatabase(CreateDatabase {
            name: Identifier::single("demo"),
            engine: Some("memory".to_string()),
            parameters: memory_args,
            if_not_exists: true,
        }),
        Statement::Show(Show::new("databases")),
        Statement::CreatePredictor(CreatePredictor {
            name: Identifier::new(["mindsdb", "home_rentals"]),
            targets: vec!["rental_price".to_string()],
            ..Default::default()
        }),
        Statement::CreateJob(CreateJob {
            name: Identifier::new(["mindsdb", "refresh"]),
            query_str: "SELECT * FROM information_schema.models".to_string(),
            repeat_str: Some("1 hour".to_string()),
            ..Default::default()
        }),
        Statement::Select(parse_select(
            "SELECT table_schema, table_name, table_type FROM information_schema.tables WHERE table_schema = 'mindsdb'",
        )?),
        Statement::Select(parse_select("SELECT name, project, schedule_str FROM information_schema.jobs")?),
    ];

    let mut executor = ExecuteCommands::new(&mut session);
    for statement in &script {
        match executor.execute_command(statement).await {
            Ok(answer) => log_answer(statement, &answer),
            Err(e) => error!(statement = %statement, code = e.code(), "{}", e),
        }
    }

    // One scheduler pass over the jobs created above
    let runner = SessionJobRunner::new(controllers.clone());
    let ran = controllers.jobs.run_pending(Utc::now(), &runner).await?;
    info!(jobs = ran, "Scheduler pass finished");

    Ok(())
}
