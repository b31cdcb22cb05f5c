use std::sync::Arc;

use reportflow_application::{ApprovalService, PermissionEvaluator, PrincipalDirectory};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub approval_service: ApprovalService,
    pub permission_evaluator: PermissionEvaluator,
    pub principal_directory: Arc<dyn PrincipalDirectory>,
}
