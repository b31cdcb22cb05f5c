use chrono::{DateTime, Utc};
use reportflow_application::EvaluationScope;
use reportflow_core::{PrincipalId, ProjectId};
use reportflow_domain::{ApprovalStep, ApprovalWorkflow, CommentKind, StepComment};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Incoming payload for workflow creation.
#[derive(Debug, Deserialize)]
pub struct CreateWorkflowRequest {
    pub subject_id: Uuid,
    pub owner_project_id: Uuid,
}

/// Incoming payload for a step approval.
#[derive(Debug, Deserialize)]
pub struct ApproveStepRequest {
    #[serde(default)]
    pub comment: Option<String>,
}

/// Incoming payload for a step rejection.
#[derive(Debug, Deserialize)]
pub struct RejectStepRequest {
    pub reason: String,
}

/// Incoming payload for a step skip.
#[derive(Debug, Deserialize)]
pub struct SkipStepRequest {
    pub reason: String,
}

/// Incoming payload for a step comment.
#[derive(Debug, Deserialize)]
pub struct AddCommentRequest {
    pub body: String,
    #[serde(default)]
    pub kind: Option<CommentKind>,
}

/// Scope segment of a permission evaluation request.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PermissionScopeRequest {
    Unscoped,
    Global,
    Regional,
    Project { project_id: Uuid },
    Own { principal_id: Uuid },
}

impl PermissionScopeRequest {
    pub fn into_scope(self) -> EvaluationScope {
        match self {
            Self::Unscoped => EvaluationScope::Unscoped,
            Self::Global => EvaluationScope::Global,
            Self::Regional => EvaluationScope::Regional,
            Self::Project { project_id } => {
                EvaluationScope::Project(ProjectId::from_uuid(project_id))
            }
            Self::Own { principal_id } => {
                EvaluationScope::Own(PrincipalId::from_uuid(principal_id))
            }
        }
    }
}

/// Incoming payload for a permission evaluation.
#[derive(Debug, Deserialize)]
pub struct EvaluatePermissionRequest {
    pub resource: String,
    pub action: String,
    pub scope: PermissionScopeRequest,
}

/// Outcome of a permission evaluation.
#[derive(Debug, Serialize)]
pub struct EvaluatePermissionResponse {
    pub allowed: bool,
}

/// Incoming payload for an accessible-projects filter.
#[derive(Debug, Deserialize)]
pub struct AccessibleProjectsRequest {
    pub resource: String,
    pub action: String,
    pub candidate_project_ids: Vec<Uuid>,
}

/// Candidate projects the principal may act on.
#[derive(Debug, Serialize)]
pub struct AccessibleProjectsResponse {
    pub project_ids: Vec<Uuid>,
}

/// API representation of a step comment.
#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub principal_display_name: String,
    pub role: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub kind: String,
}

impl From<&StepComment> for CommentResponse {
    fn from(comment: &StepComment) -> Self {
        Self {
            id: comment.id,
            principal_id: comment.principal_id.as_uuid(),
            principal_display_name: comment.principal_display_name.clone(),
            role: comment.role_at_time_of_comment.as_str().to_owned(),
            body: comment.body.clone(),
            timestamp: comment.timestamp,
            kind: comment.kind.as_str().to_owned(),
        }
    }
}

/// API representation of an approval step.
#[derive(Debug, Serialize)]
pub struct StepResponse {
    pub id: Uuid,
    pub step_number: u32,
    pub required_role: String,
    pub status: String,
    pub assigned_principal_id: Option<Uuid>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub is_current_step: bool,
    pub comments: Vec<CommentResponse>,
}

impl From<&ApprovalStep> for StepResponse {
    fn from(step: &ApprovalStep) -> Self {
        Self {
            id: step.id().as_uuid(),
            step_number: step.step_number(),
            required_role: step.required_role().as_str().to_owned(),
            status: step.status().as_str().to_owned(),
            assigned_principal_id: step.assigned_principal_id().map(|id| id.as_uuid()),
            submitted_at: step.submitted_at(),
            reviewed_at: step.reviewed_at(),
            is_current_step: step.is_current_step(),
            comments: step.comments().iter().map(CommentResponse::from).collect(),
        }
    }
}

/// API representation of an approval workflow.
#[derive(Debug, Serialize)]
pub struct WorkflowResponse {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub owner_project_id: Uuid,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: String,
    pub current_step_number: u32,
    pub final_decision_at: Option<DateTime<Utc>>,
    pub final_decision_by: Option<Uuid>,
    pub steps: Vec<StepResponse>,
}

impl From<&ApprovalWorkflow> for WorkflowResponse {
    fn from(workflow: &ApprovalWorkflow) -> Self {
        Self {
            id: workflow.id().as_uuid(),
            subject_id: workflow.subject_id().as_uuid(),
            owner_project_id: workflow.owner_project_id().as_uuid(),
            created_by: workflow.created_by().as_uuid(),
            created_at: workflow.created_at(),
            status: workflow.status().as_str().to_owned(),
            current_step_number: workflow.current_step_number(),
            final_decision_at: workflow.final_decision_at(),
            final_decision_by: workflow.final_decision_by().map(|id| id.as_uuid()),
            steps: workflow.steps().iter().map(StepResponse::from).collect(),
        }
    }
}
