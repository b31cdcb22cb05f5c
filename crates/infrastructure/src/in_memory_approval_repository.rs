use std::collections::HashMap;

use async_trait::async_trait;
use reportflow_application::{ApprovalWorkflowRepository, VersionedWorkflow};
use reportflow_core::{AppError, AppResult, SubjectId, WorkflowId};
use reportflow_domain::ApprovalWorkflow;
use tokio::sync::RwLock;

/// In-memory approval workflow repository.
///
/// Version stamps give the same at-most-one-writer guarantee the PostgreSQL
/// adapter provides, so the two are interchangeable behind the port.
#[derive(Debug, Default)]
pub struct InMemoryApprovalRepository {
    workflows: RwLock<HashMap<WorkflowId, StoredWorkflow>>,
}

#[derive(Debug, Clone)]
struct StoredWorkflow {
    version: i64,
    workflow: ApprovalWorkflow,
}

impl InMemoryApprovalRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            workflows: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ApprovalWorkflowRepository for InMemoryApprovalRepository {
    async fn create_workflow(&self, workflow: &ApprovalWorkflow) -> AppResult<()> {
        let mut workflows = self.workflows.write().await;

        if workflows.contains_key(&workflow.id()) {
            return Err(AppError::Conflict(format!(
                "workflow '{}' already exists",
                workflow.id()
            )));
        }

        let live_for_subject = workflows.values().any(|stored| {
            stored.workflow.subject_id() == workflow.subject_id()
                && !stored.workflow.is_terminal()
        });
        if live_for_subject {
            return Err(AppError::Conflict(format!(
                "subject '{}' already has a workflow in progress",
                workflow.subject_id()
            )));
        }

        workflows.insert(
            workflow.id(),
            StoredWorkflow {
                version: 1,
                workflow: workflow.clone(),
            },
        );
        Ok(())
    }

    async fn load_workflow(&self, workflow_id: WorkflowId) -> AppResult<Option<VersionedWorkflow>> {
        Ok(self
            .workflows
            .read()
            .await
            .get(&workflow_id)
            .map(|stored| VersionedWorkflow {
                workflow: stored.workflow.clone(),
                version: stored.version,
            }))
    }

    async fn save_workflow(
        &self,
        workflow: &ApprovalWorkflow,
        expected_version: i64,
    ) -> AppResult<()> {
        let mut workflows = self.workflows.write().await;

        let stored = workflows.get_mut(&workflow.id()).ok_or_else(|| {
            AppError::NotFound(format!("workflow '{}' does not exist", workflow.id()))
        })?;

        if stored.version != expected_version {
            return Err(AppError::Conflict(format!(
                "workflow '{}' was modified by another writer",
                workflow.id()
            )));
        }

        stored.version = expected_version + 1;
        stored.workflow = workflow.clone();
        Ok(())
    }

    async fn find_active_workflow_for_subject(
        &self,
        subject_id: SubjectId,
    ) -> AppResult<Option<VersionedWorkflow>> {
        Ok(self
            .workflows
            .read()
            .await
            .values()
            .find(|stored| {
                stored.workflow.subject_id() == subject_id && !stored.workflow.is_terminal()
            })
            .map(|stored| VersionedWorkflow {
                workflow: stored.workflow.clone(),
                version: stored.version,
            }))
    }
}
