// Catalog row producers
//
// One producer per virtual table. Producers may push down a single
// `column = constant` equality from the statement; everything else is left
// to the residual evaluator.

use futures::future::join_all;
use serde_json::{json, Value as JsonValue};
use tracing::warn;

use super::information_schema::{InformationSchemaDataNode, FILES_DATABASE, INFORMATION_SCHEMA};
use super::registry::{self, VirtualTable};
use crate::datanodes::DataNode;
use crate::error::{SqlApiError, SqlResult};
use crate::models::{IntegrationKind, Row, TableEntry, TableKind, TabularResult};
use crate::services::session::SessionController;
use crate::sql::{extract_string_equality, Select};

fn tables_row(schema: &str, entry: &TableEntry) -> Row {
    let engine = match entry.kind {
        TableKind::SystemView => json!("InnoDB"),
        _ => JsonValue::Null,
    };
    let mut row = vec![
        json!("def"),
        json!(schema),
        json!(entry.name),
        json!(entry.kind.as_str()),
        engine,
    ];
    row.resize(registry::TABLES_WIDTH, JsonValue::Null);
    row
}

/// Generic text column descriptor in COLUMNS order
fn columns_row(schema: &str, table: &str, column: &str, ordinal: usize) -> Row {
    vec![
        json!("def"),
        json!(schema),
        json!(table),
        json!(column),
        json!(ordinal),
        JsonValue::Null,
        json!("YES"),
        json!("varchar"),
        json!(1024),
        json!(3072),
        JsonValue::Null,
        JsonValue::Null,
        JsonValue::Null,
        json!("utf8"),
        json!("utf8_bin"),
        json!("varchar(1024)"),
        JsonValue::Null,
        JsonValue::Null,
        json!("select"),
        JsonValue::Null,
        JsonValue::Null,
    ]
}

fn matches_schema(filter: Option<&str>, schema: &str) -> bool {
    filter.map(|f| f.eq_ignore_ascii_case(schema)).unwrap_or(true)
}

impl InformationSchemaDataNode {
    pub(super) async fn produce(
        &self,
        table: &VirtualTable,
        select: &Select,
        session: &SessionController,
    ) -> SqlResult<TabularResult> {
        let project = extract_string_equality(select.where_clause.as_ref(), "project");
        let project = project.as_deref();
        let c = &self.controllers;

        let rows: Vec<Row> = match table.name {
            "TABLES" => self.tables_rows(select, session).await?,
            "COLUMNS" => self.columns_rows(session).await?,
            "SCHEMATA" => self
                .database_rows()
                .await?
                .into_iter()
                .map(|(name, ..)| vec![json!("def"), json!(name), json!("utf8mb4"), json!("utf8mb4_0900_ai_ci"), JsonValue::Null])
                .collect(),
            "DATABASES" => self
                .database_rows()
                .await?
                .into_iter()
                .map(|(name, kind, engine, connection_data)| vec![json!(name), json!(kind), engine, connection_data])
                .collect(),
            "ENGINES" => vec![vec![
                json!("InnoDB"),
                json!("DEFAULT"),
                json!("Supports transactions, row-level locking, and foreign keys"),
                json!("YES"),
                json!("YES"),
                json!("YES"),
            ]],
            "CHARACTER_SETS" => vec![
                vec![json!("utf8"), json!("utf8_general_ci"), json!("UTF-8 Unicode"), json!(3)],
                vec![json!("latin1"), json!("latin1_swedish_ci"), json!("cp1252 West European"), json!(1)],
                vec![json!("utf8mb4"), json!("utf8mb4_general_ci"), json!("UTF-8 Unicode"), json!(4)],
            ],
            "COLLATIONS" => vec![
                vec![json!("utf8_general_ci"), json!("utf8"), json!(33), json!("Yes"), json!("Yes"), json!(1), json!("PAD SPACE")],
                vec![json!("latin1_swedish_ci"), json!("latin1"), json!(8), json!("Yes"), json!("Yes"), json!(1), json!("PAD SPACE")],
            ],
            "MODELS" => c
                .models
                .list_models(None, true)
                .await?
                .iter()
                .map(|m| m.to_models_row())
                .collect(),
            "MODELS_VERSIONS" => c
                .models
                .list_models(None, false)
                .await?
                .iter()
                .map(|m| m.to_versions_row())
                .collect(),
            "ML_ENGINES" => c
                .integrations
                .list()
                .await?
                .iter()
                .filter(|i| i.kind == IntegrationKind::Ml)
                .map(|i| vec![json!(i.name), json!(i.engine), json!(i.connection_data_string())])
                .collect(),
            "HANDLERS" => c
                .integrations
                .handlers()
                .list()
                .into_iter()
                .map(|h| {
                    vec![
                        json!(h.name),
                        json!(h.kind.as_str()),
                        json!(h.title),
                        json!(h.description),
                        json!(h.version),
                        json!(h.connection_args_string()),
                        json!(h.import.success),
                        json!(h.import.error_message),
                    ]
                })
                .collect(),
            "JOBS" => c.jobs.list(project).await?.iter().map(|j| j.to_row()).collect(),
            "JOBS_HISTORY" => c.jobs.history(project).await?.iter().map(|h| h.to_row()).collect(),
            "MDB_TRIGGERS" => c.triggers.list(project).await?.iter().map(|t| t.to_row()).collect(),
            "CHATBOTS" => c.chatbots.list(project).await?.iter().map(|b| b.to_row()).collect(),
            "SKILLS" => c.skills.list(project).await?.iter().map(|s| s.to_row()).collect(),
            "AGENTS" => c.agents.list(project).await?.iter().map(|a| a.to_row()).collect(),
            "KNOWLEDGE_BASES" => {
                let project_name = project.unwrap_or(&session.database);
                let project = c
                    .projects
                    .get(project_name)
                    .await?
                    .ok_or_else(|| SqlApiError::SqlApi(format!("Project not found: {}", project_name)))?;
                c.knowledge_bases
                    .list(&project.id)
                    .await?
                    .iter()
                    .map(|kb| kb.to_row())
                    .collect()
            }
            _ => Vec::new(),
        };

        let columns = table.columns.iter().map(|col| col.to_string()).collect();
        Ok(TabularResult::new(columns, rows))
    }

    /// TABLES rows; `TABLE_SCHEMA = 'x'` restricts which owners are listed
    async fn tables_rows(&self, select: &Select, session: &SessionController) -> SqlResult<Vec<Row>> {
        let schema = extract_string_equality(select.where_clause.as_ref(), "TABLE_SCHEMA");
        let schema = schema.as_deref();
        let mut rows = Vec::new();

        if matches_schema(schema, INFORMATION_SCHEMA) {
            for name in registry::table_names() {
                rows.push(tables_row(INFORMATION_SCHEMA, &TableEntry::new(name, TableKind::SystemView)));
            }
        }

        if matches_schema(schema, FILES_DATABASE) {
            if let Some(files) = self.files_node().await? {
                for entry in files.get_tables(session).await? {
                    rows.push(tables_row(FILES_DATABASE, &entry));
                }
            }
        }

        let integrations: Vec<String> = self
            .controllers
            .integrations
            .list()
            .await?
            .into_iter()
            .filter(|i| i.kind == IntegrationKind::Data && !i.name.eq_ignore_ascii_case(FILES_DATABASE))
            .map(|i| i.name)
            .filter(|name| matches_schema(schema, name))
            .collect();

        let listings = join_all(integrations.iter().map(|name| async move {
            let handler = self.controllers.integrations.data_handler(name).await?;
            Ok::<_, SqlApiError>(handler.get_tables().await?)
        }))
        .await;

        for (name, listing) in integrations.iter().zip(listings) {
            match listing {
                Ok(entries) => rows.extend(entries.iter().map(|e| tables_row(name, e))),
                Err(e) => warn!(integration = %name, error = %e, "Can't get tables from integration"),
            }
        }

        for project_name in self.project_names().await? {
            if !matches_schema(schema, &project_name) {
                continue;
            }
            if let Some(node) = self.project_node(&project_name).await? {
                for entry in node.get_tables(session).await? {
                    rows.push(tables_row(&project_name, &entry));
                }
            }
        }

        Ok(rows)
    }

    /// COLUMNS rows for information_schema, the default project and `files`
    async fn columns_rows(&self, session: &SessionController) -> SqlResult<Vec<Row>> {
        let mut rows = Vec::new();

        for table in registry::VIRTUAL_TABLES {
            for (idx, column) in table.columns.iter().enumerate() {
                rows.push(columns_row(INFORMATION_SCHEMA, table.name, column, idx));
            }
        }

        let default_project = &self.controllers.config.default_project;
        if let Some(node) = self.project_node(default_project).await? {
            for entry in node.get_tables(session).await? {
                match node.get_table_columns(&entry.name, session).await {
                    Ok(columns) => {
                        for (idx, column) in columns.iter().enumerate() {
                            rows.push(columns_row(default_project, &entry.name, column, idx));
                        }
                    }
                    Err(e) => warn!(table = %entry.name, error = %e, "Can't get columns of table"),
                }
            }
        }

        if let Some(files) = self.files_node().await? {
            for entry in files.get_tables(session).await? {
                let columns = files.get_table_columns(&entry.name, session).await?;
                for (idx, column) in columns.iter().enumerate() {
                    rows.push(columns_row(FILES_DATABASE, &entry.name, column, idx));
                }
            }
        }

        Ok(rows)
    }

    /// (name, type, engine, connection data) of every database
    async fn database_rows(&self) -> SqlResult<Vec<(String, &'static str, JsonValue, JsonValue)>> {
        let mut out = vec![(INFORMATION_SCHEMA.to_string(), "system", JsonValue::Null, JsonValue::Null)];

        for name in self.project_names().await? {
            out.push((name, "project", json!("mindsdb"), JsonValue::Null));
        }

        for integration in self.controllers.integrations.list().await? {
            if integration.kind != IntegrationKind::Data {
                continue;
            }
            let connection_data = json!(integration.connection_data_string());
            out.push((integration.name, "data", json!(integration.engine), connection_data));
        }

        Ok(out)
    }
}
