use async_trait::async_trait;
use reportflow_core::{AppResult, PrincipalId, ProjectId, StepId, SubjectId, WorkflowId};
use reportflow_domain::{ApprovalWorkflow, CommentKind, Principal, WorkflowStatus};
use serde::Serialize;

/// One aggregate snapshot loaded together with its optimistic-concurrency
/// version stamp.
#[derive(Debug, Clone)]
pub struct VersionedWorkflow {
    /// The loaded aggregate.
    pub workflow: ApprovalWorkflow,
    /// Version the aggregate had when loaded; passed back on save.
    pub version: i64,
}

/// Persistence port for approval workflow aggregates.
///
/// Saves are compare-and-swap on the version stamp so two concurrent writers
/// against the same workflow yield exactly one winner.
#[async_trait]
pub trait ApprovalWorkflowRepository: Send + Sync {
    /// Inserts a freshly created workflow at version 1.
    async fn create_workflow(&self, workflow: &ApprovalWorkflow) -> AppResult<()>;

    /// Loads one workflow with its current version.
    async fn load_workflow(&self, workflow_id: WorkflowId) -> AppResult<Option<VersionedWorkflow>>;

    /// Persists a mutated workflow when the stored version still matches.
    ///
    /// Returns a conflict error when another writer got there first; the
    /// caller must reload and reapply.
    async fn save_workflow(
        &self,
        workflow: &ApprovalWorkflow,
        expected_version: i64,
    ) -> AppResult<()>;

    /// Finds the non-terminal workflow for a subject, if one exists.
    async fn find_active_workflow_for_subject(
        &self,
        subject_id: SubjectId,
    ) -> AppResult<Option<VersionedWorkflow>>;
}

/// Workflow transition event published to downstream consumers.
///
/// Delivery is fire-and-forget; sink failures never roll back the mutation
/// that produced the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// A workflow was created and its first step entered review.
    WorkflowCreated {
        /// Created workflow.
        workflow_id: WorkflowId,
        /// Report under approval.
        subject_id: SubjectId,
        /// Project the report belongs to.
        owner_project_id: ProjectId,
        /// Creating principal.
        created_by: PrincipalId,
    },
    /// The current step was approved.
    StepApproved {
        /// Mutated workflow.
        workflow_id: WorkflowId,
        /// Decided step.
        step_id: StepId,
        /// 1-based position of the decided step.
        step_number: u32,
        /// Deciding principal.
        decided_by: PrincipalId,
    },
    /// The current step was rejected and the workflow terminated.
    StepRejected {
        /// Mutated workflow.
        workflow_id: WorkflowId,
        /// Decided step.
        step_id: StepId,
        /// 1-based position of the decided step.
        step_number: u32,
        /// Deciding principal.
        decided_by: PrincipalId,
        /// Mandatory rejection reason.
        reason: String,
    },
    /// The current step was skipped by a more senior principal.
    StepSkipped {
        /// Mutated workflow.
        workflow_id: WorkflowId,
        /// Decided step.
        step_id: StepId,
        /// 1-based position of the decided step.
        step_number: u32,
        /// Deciding principal.
        decided_by: PrincipalId,
        /// Mandatory skip reason.
        reason: String,
    },
    /// A comment was appended without a state transition.
    CommentAdded {
        /// Commented workflow.
        workflow_id: WorkflowId,
        /// Commented step.
        step_id: StepId,
        /// Commenting principal.
        author: PrincipalId,
        /// Comment classification.
        kind: CommentKind,
    },
    /// The workflow reached a terminal status.
    WorkflowFinalized {
        /// Finalized workflow.
        workflow_id: WorkflowId,
        /// Terminal status.
        status: WorkflowStatus,
        /// Principal whose decision finalized the workflow.
        decided_by: PrincipalId,
    },
}

/// Sink port for workflow transition events.
#[async_trait]
pub trait WorkflowEventSink: Send + Sync {
    /// Delivers one event to downstream consumers.
    async fn publish(&self, event: WorkflowEvent) -> AppResult<()>;
}

/// Lookup port for the external identity provider.
///
/// Reportflow never issues tokens; it only resolves the principal behind an
/// opaque bearer token presented by the transport layer.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    /// Resolves the principal behind a bearer token.
    async fn resolve_token(&self, token: &str) -> AppResult<Option<Principal>>;

    /// Finds a principal by id.
    async fn find_principal(&self, principal_id: PrincipalId) -> AppResult<Option<Principal>>;
}
