// In-memory stores for project-scoped entities and knowledge bases

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::matching_rows;
use crate::error::{ControllerError, SqlApiError};
use crate::models::{KnowledgeBaseRecord, TabularResult};
use crate::services::controllers::{
    not_found, ControllerResult, EntityController, KnowledgeBaseController, NamedEntity, ProjectController,
};
use crate::services::datafusion::TabularEvaluator;
use crate::sql::{Identifier, JsonMap, Statement};

/// Generic store for triggers, chatbots, skills and agents
pub struct InMemoryEntityController<R> {
    records: RwLock<Vec<R>>,
}

impl<R> Default for InMemoryEntityController<R> {
    fn default() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

fn same_entity<R: NamedEntity>(record: &R, project: &str, name: &str) -> bool {
    record.project().eq_ignore_ascii_case(project) && record.name().eq_ignore_ascii_case(name)
}

#[async_trait]
impl<R: NamedEntity> EntityController<R> for InMemoryEntityController<R> {
    async fn list(&self, project: Option<&str>) -> ControllerResult<Vec<R>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| project.map_or(true, |p| r.project().eq_ignore_ascii_case(p)))
            .cloned()
            .collect())
    }

    async fn get(&self, project: &str, name: &str) -> ControllerResult<Option<R>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| same_entity(*r, project, name))
            .cloned())
    }

    async fn add(&self, record: R) -> ControllerResult<R> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| same_entity(r, record.project(), record.name())) {
            return Err(ControllerError::AlreadyExists(format!(
                "{} '{}' already exists in project '{}'",
                R::KIND,
                record.name(),
                record.project()
            )));
        }
        records.push(record.clone());
        debug!(kind = R::KIND, project = %record.project(), name = %record.name(), "Entity created");
        Ok(record)
    }

    async fn update(&self, project: &str, name: &str, params: &JsonMap) -> ControllerResult<R> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| same_entity::<R>(r, project, name))
            .ok_or_else(|| not_found::<R>(project, name))?;
        record.apply_params(params);
        Ok(record.clone())
    }

    async fn delete(&self, project: &str, name: &str) -> ControllerResult<()> {
        let mut records = self.records.write().await;
        let pos = records
            .iter()
            .position(|r| same_entity(r, project, name))
            .ok_or_else(|| not_found::<R>(project, name))?;
        records.remove(pos);
        Ok(())
    }
}

/// Columns of every knowledge base's content table
pub const KNOWLEDGE_BASE_COLUMNS: [&str; 3] = ["id", "content", "metadata"];

type KbKey = (String, String);

fn kb_key(project_id: &str, name: &str) -> KbKey {
    (project_id.to_string(), name.to_lowercase())
}

fn invalid(err: SqlApiError) -> ControllerError {
    ControllerError::Invalid(err.to_string())
}

/// Knowledge bases with their stored chunks kept in memory
pub struct InMemoryKnowledgeBaseController {
    projects: Arc<dyn ProjectController>,
    evaluator: Arc<TabularEvaluator>,
    records: RwLock<Vec<KnowledgeBaseRecord>>,
    content: RwLock<HashMap<KbKey, TabularResult>>,
}

impl InMemoryKnowledgeBaseController {
    pub fn new(projects: Arc<dyn ProjectController>, evaluator: Arc<TabularEvaluator>) -> Self {
        Self {
            projects,
            evaluator,
            records: RwLock::new(Vec::new()),
            content: RwLock::new(HashMap::new()),
        }
    }

    /// Project id and knowledge base name addressed by `table`
    async fn locate(&self, table: &Identifier, default_project_id: &str) -> ControllerResult<Option<KbKey>> {
        let (project_id, name) = match table.parts.as_slice() {
            [name] => (default_project_id.to_string(), name.clone()),
            [project, name] => match self.projects.get(project).await? {
                Some(project) => (project.id, name.clone()),
                None => return Ok(None),
            },
            _ => return Ok(None),
        };
        Ok(self
            .get(&project_id, &name)
            .await?
            .map(|kb| kb_key(&kb.project_id, &kb.name)))
    }

    async fn require(&self, table: &Identifier, default_project_id: &str) -> ControllerResult<KbKey> {
        self.locate(table, default_project_id)
            .await?
            .ok_or_else(|| ControllerError::NotFound(format!("Knowledge base does not exist: {}", table)))
    }
}

#[async_trait]
impl KnowledgeBaseController for InMemoryKnowledgeBaseController {
    async fn list(&self, project_id: &str) -> ControllerResult<Vec<KnowledgeBaseRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|kb| kb.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn get(&self, project_id: &str, name: &str) -> ControllerResult<Option<KnowledgeBaseRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|kb| kb.project_id == project_id && kb.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn add(&self, record: KnowledgeBaseRecord, if_not_exists: bool) -> ControllerResult<KnowledgeBaseRecord> {
        let mut records = self.records.write().await;
        if let Some(existing) = records
            .iter()
            .find(|kb| kb.project_id == record.project_id && kb.name.eq_ignore_ascii_case(&record.name))
        {
            if if_not_exists {
                return Ok(existing.clone());
            }
            return Err(ControllerError::AlreadyExists(format!(
                "Knowledge base already exists: {}",
                record.name
            )));
        }

        self.content.write().await.insert(
            kb_key(&record.project_id, &record.name),
            TabularResult::empty(&KNOWLEDGE_BASE_COLUMNS),
        );
        records.push(record.clone());
        Ok(record)
    }

    async fn delete(&self, project_id: &str, name: &str, if_exists: bool) -> ControllerResult<()> {
        let mut records = self.records.write().await;
        match records
            .iter()
            .position(|kb| kb.project_id == project_id && kb.name.eq_ignore_ascii_case(name))
        {
            Some(pos) => {
                records.remove(pos);
                self.content.write().await.remove(&kb_key(project_id, name));
                Ok(())
            }
            None if if_exists => Ok(()),
            None => Err(ControllerError::NotFound(format!("Knowledge base does not exist: {}", name))),
        }
    }

    async fn is_knowledge_base(&self, table: &Identifier, default_project_id: &str) -> ControllerResult<bool> {
        Ok(self.locate(table, default_project_id).await?.is_some())
    }

    async fn execute_query(&self, statement: &Statement, default_project_id: &str) -> ControllerResult<TabularResult> {
        match statement {
            Statement::Select(select) => {
                let table = select
                    .table_name()
                    .ok_or_else(|| ControllerError::Invalid(format!("Wrong knowledge base query: {}", select)))?;
                let key = self.require(table, default_project_id).await?;
                let data = self.content.read().await.get(&key).cloned().unwrap_or_default();
                self.evaluator.query_df(&data, select).await.map_err(invalid)
            }
            Statement::Insert(insert) => {
                let key = self.require(&insert.table, default_project_id).await?;
                let positions = insert
                    .columns
                    .iter()
                    .map(|c| {
                        KNOWLEDGE_BASE_COLUMNS
                            .iter()
                            .position(|k| k.eq_ignore_ascii_case(c))
                            .ok_or_else(|| ControllerError::Invalid(format!("Unknown knowledge base column: {}", c)))
                    })
                    .collect::<ControllerResult<Vec<_>>>()?;

                let mut content = self.content.write().await;
                let data = content
                    .entry(key)
                    .or_insert_with(|| TabularResult::empty(&KNOWLEDGE_BASE_COLUMNS));
                for values in &insert.values {
                    let mut row = vec![JsonValue::Null; KNOWLEDGE_BASE_COLUMNS.len()];
                    for (expr, &pos) in values.iter().zip(&positions) {
                        let value = expr.as_constant().ok_or_else(|| {
                            ControllerError::Invalid(format!("Only constant values are supported, got: {}", expr))
                        })?;
                        row[pos] = value.to_json();
                    }
                    if row[0].is_null() {
                        row[0] = json!(data.row_count() + 1);
                    }
                    data.rows.push(row);
                }
                Ok(TabularResult::default())
            }
            Statement::Update(update) => {
                let key = self.require(&update.table, default_project_id).await?;
                let mut content = self.content.write().await;
                let Some(data) = content.get_mut(&key) else {
                    return Ok(TabularResult::default());
                };
                let rows = matching_rows(&self.evaluator, data, update.where_clause.as_ref())
                    .await
                    .map_err(invalid)?;
                for (column, expr) in &update.update_columns {
                    let idx = data
                        .column_index(column)
                        .ok_or_else(|| ControllerError::Invalid(format!("Unknown knowledge base column: {}", column)))?;
                    let value = expr.as_constant().ok_or_else(|| {
                        ControllerError::Invalid(format!("Only constant values are supported, got: {}", expr))
                    })?;
                    for &row in &rows {
                        data.rows[row][idx] = value.to_json();
                    }
                }
                Ok(TabularResult::default())
            }
            Statement::Delete(delete) => {
                let key = self.require(&delete.table, default_project_id).await?;
                let mut content = self.content.write().await;
                let Some(data) = content.get_mut(&key) else {
                    return Ok(TabularResult::default());
                };
                let rows = matching_rows(&self.evaluator, data, delete.where_clause.as_ref())
                    .await
                    .map_err(invalid)?;
                let mut idx = 0;
                data.rows.retain(|_| {
                    let keep = !rows.contains(&idx);
                    idx += 1;
                    keep
                });
                Ok(TabularResult::default())
            }
            other => Err(ControllerError::Invalid(format!(
                "Statement is not supported for knowledge bases: {}",
                other.kind_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluatorConfig;
    use crate::models::{AgentRecord, SkillRecord};
    use crate::services::memory::InMemoryProjectController;
    use crate::sql::{parse_select, Delete, Expr, Insert};

    fn skill(project: &str, name: &str) -> SkillRecord {
        SkillRecord {
            name: name.to_string(),
            project: project.to_string(),
            skill_type: "text2sql".to_string(),
            params: JsonMap::new(),
        }
    }

    #[tokio::test]
    async fn test_entity_crud() {
        let skills = InMemoryEntityController::<SkillRecord>::default();
        skills.add(skill("proj", "s1")).await.unwrap();
        skills.add(skill("other", "s1")).await.unwrap();
        let err = skills.add(skill("proj", "S1")).await.unwrap_err();
        assert_eq!(err.to_string(), "Skill 'S1' already exists in project 'proj'");

        let params = json!({"type": "retrieval", "source": "kb"});
        let updated = skills.update("proj", "s1", params.as_object().unwrap()).await.unwrap();
        assert_eq!(updated.skill_type, "retrieval");
        assert_eq!(skills.list(Some("proj")).await.unwrap().len(), 1);

        skills.delete("proj", "s1").await.unwrap();
        let err = skills.delete("proj", "s1").await.unwrap_err();
        assert_eq!(err.to_string(), "Skill 's1' does not exist in project 'proj'");
    }

    #[tokio::test]
    async fn test_missing_agent_update() {
        let agents = InMemoryEntityController::<AgentRecord>::default();
        let err = agents.update("proj", "a", &JsonMap::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Agent 'a' does not exist in project 'proj'");
    }

    async fn knowledge_bases() -> (InMemoryKnowledgeBaseController, String) {
        let projects = Arc::new(InMemoryProjectController::new("mindsdb"));
        let project_id = projects.get("mindsdb").await.unwrap().unwrap().id;
        let evaluator = Arc::new(TabularEvaluator::new(&EvaluatorConfig::default()));
        let kbs = InMemoryKnowledgeBaseController::new(projects, evaluator);
        kbs.add(
            KnowledgeBaseRecord {
                name: "kb".to_string(),
                project_id: project_id.clone(),
                project: "mindsdb".to_string(),
                embedding_model: "emb".to_string(),
                vector_database: "chroma".to_string(),
                vector_database_table: "default_collection".to_string(),
                params: JsonMap::new(),
            },
            false,
        )
        .await
        .unwrap();
        (kbs, project_id)
    }

    #[tokio::test]
    async fn test_knowledge_base_content() {
        let (kbs, project_id) = knowledge_bases().await;
        assert!(kbs
            .is_knowledge_base(&Identifier::new(vec!["mindsdb".to_string(), "KB".to_string()]), "x")
            .await
            .unwrap());

        let insert = Statement::Insert(Insert {
            table: Identifier::single("kb"),
            columns: vec!["content".to_string()],
            values: vec![vec![Expr::string("a")], vec![Expr::string("b")]],
            from_select: None,
        });
        kbs.execute_query(&insert, &project_id).await.unwrap();
        let delete = Statement::Delete(Delete {
            table: Identifier::single("kb"),
            where_clause: Some(Expr::eq(Expr::ident("content"), Expr::string("a"))),
        });
        kbs.execute_query(&delete, &project_id).await.unwrap();

        let select = Statement::Select(parse_select("SELECT id, content FROM kb").unwrap());
        let out = kbs.execute_query(&select, &project_id).await.unwrap();
        assert_eq!(out.rows, vec![vec![json!(2), json!("b")]]);
    }

    #[tokio::test]
    async fn test_knowledge_base_drop_flags() {
        let (kbs, project_id) = knowledge_bases().await;
        assert!(kbs.delete(&project_id, "nope", true).await.is_ok());
        let err = kbs.delete(&project_id, "nope", false).await.unwrap_err();
        assert_eq!(err.to_string(), "Knowledge base does not exist: nope");
        kbs.delete(&project_id, "kb", false).await.unwrap();
        assert!(kbs.list(&project_id).await.unwrap().is_empty());
    }
}
