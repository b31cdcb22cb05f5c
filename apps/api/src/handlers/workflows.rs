use std::future::Future;

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use reportflow_core::{AppError, AppResult, ProjectId, StepId, SubjectId, WorkflowId};
use reportflow_domain::{CommentKind, Principal};
use tracing::debug;
use uuid::Uuid;

use crate::dto::{
    AddCommentRequest, ApproveStepRequest, CreateWorkflowRequest, RejectStepRequest,
    SkipStepRequest, WorkflowResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

/// Attempts per mutation before surfacing a write conflict to the client.
const CONFLICT_RETRY_ATTEMPTS: u32 = 3;

pub async fn create_workflow_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<CreateWorkflowRequest>,
) -> ApiResult<(StatusCode, Json<WorkflowResponse>)> {
    let workflow = state
        .approval_service
        .create_workflow(
            &principal,
            SubjectId::from_uuid(payload.subject_id),
            ProjectId::from_uuid(payload.owner_project_id),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(WorkflowResponse::from(&workflow))))
}

pub async fn get_workflow_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(workflow_id): Path<Uuid>,
) -> ApiResult<Json<WorkflowResponse>> {
    let workflow = state
        .approval_service
        .get_workflow(&principal, WorkflowId::from_uuid(workflow_id))
        .await?;

    Ok(Json(WorkflowResponse::from(&workflow)))
}

pub async fn approve_step_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((workflow_id, step_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ApproveStepRequest>,
) -> ApiResult<Json<WorkflowResponse>> {
    let workflow_id = WorkflowId::from_uuid(workflow_id);
    let step_id = StepId::from_uuid(step_id);

    let workflow = retry_on_conflict(|| {
        state
            .approval_service
            .approve(&principal, workflow_id, step_id, payload.comment.clone())
    })
    .await?;

    Ok(Json(WorkflowResponse::from(&workflow)))
}

pub async fn reject_step_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((workflow_id, step_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<RejectStepRequest>,
) -> ApiResult<Json<WorkflowResponse>> {
    let workflow_id = WorkflowId::from_uuid(workflow_id);
    let step_id = StepId::from_uuid(step_id);

    let workflow = retry_on_conflict(|| {
        state
            .approval_service
            .reject(&principal, workflow_id, step_id, payload.reason.as_str())
    })
    .await?;

    Ok(Json(WorkflowResponse::from(&workflow)))
}

pub async fn skip_step_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((workflow_id, step_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<SkipStepRequest>,
) -> ApiResult<Json<WorkflowResponse>> {
    let workflow_id = WorkflowId::from_uuid(workflow_id);
    let step_id = StepId::from_uuid(step_id);

    let workflow = retry_on_conflict(|| {
        state
            .approval_service
            .skip(&principal, workflow_id, step_id, payload.reason.as_str())
    })
    .await?;

    Ok(Json(WorkflowResponse::from(&workflow)))
}

pub async fn add_comment_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((workflow_id, step_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<AddCommentRequest>,
) -> ApiResult<(StatusCode, Json<WorkflowResponse>)> {
    let workflow_id = WorkflowId::from_uuid(workflow_id);
    let step_id = StepId::from_uuid(step_id);
    let kind = payload.kind.unwrap_or(CommentKind::Comment);

    let workflow = retry_on_conflict(|| {
        state.approval_service.add_comment(
            &principal,
            workflow_id,
            step_id,
            payload.body.as_str(),
            kind,
        )
    })
    .await?;

    Ok((StatusCode::CREATED, Json(WorkflowResponse::from(&workflow))))
}

/// Re-runs a mutation that lost a compare-and-swap race.
///
/// Each retry reloads the aggregate inside the service, so a retried
/// decision against a step that is no longer current surfaces as an
/// invalid transition rather than a stale write.
async fn retry_on_conflict<T, F, Fut>(mut operation: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Err(AppError::Conflict(message)) if attempt < CONFLICT_RETRY_ATTEMPTS => {
                debug!(attempt, error = %message, "workflow write conflict, retrying");
            }
            result => return result,
        }
    }
}
