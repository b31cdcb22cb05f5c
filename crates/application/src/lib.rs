//! Application services and ports.

#![forbid(unsafe_code)]

mod approval_ports;
mod approval_service;
mod permission_evaluator;

pub use approval_ports::{
    ApprovalWorkflowRepository, PrincipalDirectory, VersionedWorkflow, WorkflowEvent,
    WorkflowEventSink,
};
pub use approval_service::ApprovalService;
pub use permission_evaluator::{EvaluationScope, PermissionEvaluator};
