use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use reportflow_core::AppError;

use crate::error::ApiResult;
use crate::state::AppState;

/// Resolves the bearer token into a principal and attaches it to the request.
///
/// Tokens are opaque; the directory is the only party that can interpret
/// them. Requests without a resolvable principal fail closed.
pub async fn require_principal(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let principal = state
        .principal_directory
        .resolve_token(token)
        .await?
        .ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
