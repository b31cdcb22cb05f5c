use async_trait::async_trait;
use reportflow_application::{ApprovalWorkflowRepository, VersionedWorkflow};
use reportflow_core::{AppError, AppResult, SubjectId, WorkflowId};
use reportflow_domain::ApprovalWorkflow;
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed repository for approval workflow aggregates.
///
/// The aggregate is stored as one JSONB row guarded by a version column;
/// saves are compare-and-swap updates on that column.
#[derive(Clone)]
pub struct PostgresApprovalRepository {
    pool: PgPool,
}

impl PostgresApprovalRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct WorkflowRow {
    payload: serde_json::Value,
    version: i64,
}

impl WorkflowRow {
    fn decode(self) -> AppResult<VersionedWorkflow> {
        let workflow: ApprovalWorkflow = serde_json::from_value(self.payload)
            .map_err(|error| AppError::Internal(format!("failed to decode workflow: {error}")))?;

        Ok(VersionedWorkflow {
            workflow,
            version: self.version,
        })
    }
}

fn encode(workflow: &ApprovalWorkflow) -> AppResult<serde_json::Value> {
    serde_json::to_value(workflow)
        .map_err(|error| AppError::Internal(format!("failed to encode workflow: {error}")))
}

#[async_trait]
impl ApprovalWorkflowRepository for PostgresApprovalRepository {
    async fn create_workflow(&self, workflow: &ApprovalWorkflow) -> AppResult<()> {
        let payload = encode(workflow)?;

        sqlx::query(
            r#"
            INSERT INTO approval_workflows
                (id, subject_id, owner_project_id, status, version, payload, created_at)
            VALUES ($1, $2, $3, $4, 1, $5, $6)
            "#,
        )
        .bind(workflow.id().as_uuid())
        .bind(workflow.subject_id().as_uuid())
        .bind(workflow.owner_project_id().as_uuid())
        .bind(workflow.status().as_str())
        .bind(payload)
        .bind(workflow.created_at())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if let sqlx::Error::Database(database_error) = &error {
                if database_error.is_unique_violation() {
                    return AppError::Conflict(format!(
                        "subject '{}' already has a workflow in progress",
                        workflow.subject_id()
                    ));
                }
            }

            AppError::Internal(format!("failed to insert workflow: {error}"))
        })?;

        Ok(())
    }

    async fn load_workflow(&self, workflow_id: WorkflowId) -> AppResult<Option<VersionedWorkflow>> {
        let row = sqlx::query_as::<_, WorkflowRow>(
            r#"
            SELECT payload, version
            FROM approval_workflows
            WHERE id = $1
            "#,
        )
        .bind(workflow_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load workflow: {error}")))?;

        row.map(WorkflowRow::decode).transpose()
    }

    async fn save_workflow(
        &self,
        workflow: &ApprovalWorkflow,
        expected_version: i64,
    ) -> AppResult<()> {
        let payload = encode(workflow)?;

        let result = sqlx::query(
            r#"
            UPDATE approval_workflows
            SET payload = $1, status = $2, version = version + 1, updated_at = now()
            WHERE id = $3 AND version = $4
            "#,
        )
        .bind(payload)
        .bind(workflow.status().as_str())
        .bind(workflow.id().as_uuid())
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to save workflow: {error}")))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Zero rows means either a missing aggregate or a lost version race.
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM approval_workflows WHERE id = $1)",
        )
        .bind(workflow.id().as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to check workflow: {error}")))?;

        if exists {
            Err(AppError::Conflict(format!(
                "workflow '{}' was modified by another writer",
                workflow.id()
            )))
        } else {
            Err(AppError::NotFound(format!(
                "workflow '{}' does not exist",
                workflow.id()
            )))
        }
    }

    async fn find_active_workflow_for_subject(
        &self,
        subject_id: SubjectId,
    ) -> AppResult<Option<VersionedWorkflow>> {
        let row = sqlx::query_as::<_, WorkflowRow>(
            r#"
            SELECT payload, version
            FROM approval_workflows
            WHERE subject_id = $1 AND status = 'in_progress'
            "#,
        )
        .bind(subject_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find workflow for subject: {error}"))
        })?;

        row.map(WorkflowRow::decode).transpose()
    }
}
