use axum::Json;
use axum::extract::{Extension, State};
use reportflow_core::ProjectId;
use reportflow_domain::Principal;

use crate::dto::{
    AccessibleProjectsRequest, AccessibleProjectsResponse, EvaluatePermissionRequest,
    EvaluatePermissionResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn evaluate_permission_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<EvaluatePermissionRequest>,
) -> ApiResult<Json<EvaluatePermissionResponse>> {
    let allowed = state.permission_evaluator.evaluate(
        &principal,
        payload.resource.as_str(),
        payload.action.as_str(),
        payload.scope.into_scope(),
    );

    Ok(Json(EvaluatePermissionResponse { allowed }))
}

pub async fn accessible_projects_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<AccessibleProjectsRequest>,
) -> ApiResult<Json<AccessibleProjectsResponse>> {
    let candidates: Vec<ProjectId> = payload
        .candidate_project_ids
        .iter()
        .copied()
        .map(ProjectId::from_uuid)
        .collect();

    let project_ids = state
        .permission_evaluator
        .accessible_projects(
            &principal,
            payload.resource.as_str(),
            payload.action.as_str(),
            &candidates,
        )
        .into_iter()
        .map(|project_id| project_id.as_uuid())
        .collect();

    Ok(Json(AccessibleProjectsResponse { project_ids }))
}
