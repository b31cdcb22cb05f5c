//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod approval;
mod permission;
mod principal;
mod role;

pub use approval::{
    ApprovalStep, ApprovalWorkflow, CommentAuthor, CommentKind, StepComment, StepStatus,
    WorkflowStatus,
};
pub use permission::{PermissionKey, ScopeQualifier};
pub use principal::{AssignmentScope, Principal, RoleAssignment};
pub use role::{ApprovalChain, Role, RoleBinding, RoleCatalog, RoleLevel, RoleName};
