// In-memory project and view stores

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::ControllerError;
use crate::models::{ProjectRecord, ViewRecord};
use crate::services::controllers::{ControllerResult, ProjectController, ViewController};

pub struct InMemoryProjectController {
    projects: RwLock<Vec<ProjectRecord>>,
}

impl InMemoryProjectController {
    /// Store seeded with the default project
    pub fn new(default_project: &str) -> Self {
        Self {
            projects: RwLock::new(vec![ProjectRecord::new(default_project)]),
        }
    }
}

#[async_trait]
impl ProjectController for InMemoryProjectController {
    async fn list(&self) -> ControllerResult<Vec<ProjectRecord>> {
        Ok(self.projects.read().await.clone())
    }

    async fn get(&self, name: &str) -> ControllerResult<Option<ProjectRecord>> {
        Ok(self
            .projects
            .read()
            .await
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn add(&self, name: &str) -> ControllerResult<ProjectRecord> {
        let mut projects = self.projects.write().await;
        if projects.iter().any(|p| p.name.eq_ignore_ascii_case(name)) {
            return Err(ControllerError::AlreadyExists(format!("Project '{}' already exists", name)));
        }
        let project = ProjectRecord::new(name);
        projects.push(project.clone());
        Ok(project)
    }

    async fn delete(&self, name: &str) -> ControllerResult<()> {
        let mut projects = self.projects.write().await;
        let pos = projects
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ControllerError::NotFound(format!("Project '{}' does not exists", name)))?;
        projects.remove(pos);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryViewController {
    views: RwLock<Vec<ViewRecord>>,
}

fn same_view(view: &ViewRecord, project: &str, name: &str) -> bool {
    view.project.eq_ignore_ascii_case(project) && view.name.eq_ignore_ascii_case(name)
}

#[async_trait]
impl ViewController for InMemoryViewController {
    async fn list(&self, project: &str) -> ControllerResult<Vec<ViewRecord>> {
        Ok(self
            .views
            .read()
            .await
            .iter()
            .filter(|v| v.project.eq_ignore_ascii_case(project))
            .cloned()
            .collect())
    }

    async fn get(&self, project: &str, name: &str) -> ControllerResult<Option<ViewRecord>> {
        Ok(self
            .views
            .read()
            .await
            .iter()
            .find(|v| same_view(v, project, name))
            .cloned())
    }

    async fn add(&self, project: &str, name: &str, query: &str) -> ControllerResult<ViewRecord> {
        let mut views = self.views.write().await;
        if views.iter().any(|v| same_view(v, project, name)) {
            return Err(ControllerError::AlreadyExists(format!("View already exists: {}", name)));
        }
        let view = ViewRecord::new(project, name, query);
        views.push(view.clone());
        Ok(view)
    }

    async fn delete(&self, project: &str, name: &str) -> ControllerResult<()> {
        let mut views = self.views.write().await;
        let pos = views
            .iter()
            .position(|v| same_view(v, project, name))
            .ok_or_else(|| ControllerError::NotFound(format!("View not found: {}", name)))?;
        views.remove(pos);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_project_names_are_case_insensitive() {
        let projects = InMemoryProjectController::new("mindsdb");
        assert!(projects.get("MindsDB").await.unwrap().is_some());
        projects.add("Proj").await.unwrap();
        let err = projects.add("proj").await.unwrap_err();
        assert_eq!(err.to_string(), "Project 'proj' already exists");
        projects.delete("PROJ").await.unwrap();
        assert_eq!(projects.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_views_are_scoped_by_project() {
        let views = InMemoryViewController::default();
        views.add("a", "v", "select 1").await.unwrap();
        views.add("b", "v", "select 2").await.unwrap();
        assert_eq!(views.list("a").await.unwrap().len(), 1);
        assert_eq!(views.get("b", "V").await.unwrap().unwrap().query, "select 2");

        let err = views.delete("a", "missing").await.unwrap_err();
        assert_eq!(err.to_string(), "View not found: missing");
    }

    #[test]
    fn test_missing_project_delete() {
        let projects = InMemoryProjectController::new("mindsdb");
        let err = tokio_test::block_on(projects.delete("nope")).unwrap_err();
        assert_eq!(err.to_string(), "Project 'nope' does not exists");
    }
}
