use std::str::FromStr;
use std::sync::Arc;

use reportflow_core::{PrincipalId, ProjectId};
use reportflow_domain::{
    AssignmentScope, PermissionKey, Principal, RoleAssignment, RoleCatalog, RoleLevel, RoleName,
};

use super::{EvaluationScope, PermissionEvaluator};

fn evaluator() -> PermissionEvaluator {
    PermissionEvaluator::new(Arc::new(RoleCatalog::builtin()))
}

fn assignment(catalog: &RoleCatalog, role: RoleName, scope: AssignmentScope) -> RoleAssignment {
    let level = catalog
        .level_of(&role)
        .unwrap_or_else(|| panic!("missing builtin role '{role}'"));
    RoleAssignment::active(role, level, scope)
}

fn permission(value: &str) -> PermissionKey {
    PermissionKey::from_str(value).unwrap_or_else(|_| panic!("bad permission '{value}'"))
}

#[test]
fn global_admin_is_allowed_everything() {
    let catalog = RoleCatalog::builtin();
    let principal = Principal::new(PrincipalId::new(), "Root").with_assignment(assignment(
        &catalog,
        RoleName::GlobalAdmin,
        AssignmentScope::Global,
    ));

    let evaluator = evaluator();
    assert!(evaluator.evaluate(&principal, "reports", "approve", EvaluationScope::Unscoped));
    assert!(evaluator.evaluate(
        &principal,
        "anything",
        "whatsoever",
        EvaluationScope::Project(ProjectId::new())
    ));
}

#[test]
fn revoked_global_admin_does_not_bypass() {
    let catalog = RoleCatalog::builtin();
    let mut revoked = assignment(&catalog, RoleName::GlobalAdmin, AssignmentScope::Global);
    revoked.deactivate();
    let principal = Principal::new(PrincipalId::new(), "Former Root").with_assignment(revoked);

    assert!(!evaluator().evaluate(&principal, "reports", "view", EvaluationScope::Unscoped));
}

#[test]
fn principal_without_assignments_or_grants_is_denied() {
    let principal = Principal::new(PrincipalId::new(), "Nobody");
    let evaluator = evaluator();

    assert!(!evaluator.evaluate(&principal, "reports", "view", EvaluationScope::Unscoped));
    assert!(!evaluator.evaluate(
        &principal,
        "reports",
        "approve",
        EvaluationScope::Project(ProjectId::new())
    ));
}

#[test]
fn unscoped_direct_grant_allows() {
    let principal = Principal::new(PrincipalId::new(), "Clerk")
        .with_direct_permission(permission("reports:export"));

    assert!(evaluator().evaluate(&principal, "reports", "export", EvaluationScope::Unscoped));
    assert!(!evaluator().evaluate(&principal, "reports", "view", EvaluationScope::Unscoped));
}

#[test]
fn regional_grant_allows_regardless_of_target() {
    let principal = Principal::new(PrincipalId::new(), "Auditor")
        .with_direct_permission(permission("reports:view-regional"));

    let evaluator = evaluator();
    assert!(evaluator.evaluate(
        &principal,
        "reports",
        "view",
        EvaluationScope::Project(ProjectId::new())
    ));
    assert!(evaluator.evaluate(&principal, "reports", "view", EvaluationScope::Regional));
}

#[test]
fn project_scope_needs_grant_and_assignment_together() {
    let catalog = RoleCatalog::builtin();
    let project_id = ProjectId::new();

    // Permission string alone is not sufficient.
    let unassigned = Principal::new(PrincipalId::new(), "Holder")
        .with_direct_permission(permission("reports:approve-project"));
    assert!(!evaluator().evaluate(
        &unassigned,
        "reports",
        "approve",
        EvaluationScope::Project(project_id)
    ));

    // Assignment alone is not sufficient either.
    let custom_level = RoleLevel::new(4).unwrap_or_else(|_| panic!("bad level"));
    let granted_nothing = Principal::new(PrincipalId::new(), "Assignee").with_assignment(
        RoleAssignment::active(
            RoleName::Custom("field-auditor".to_owned()),
            custom_level,
            AssignmentScope::Project { project_id },
        ),
    );
    assert!(!evaluator().evaluate(
        &granted_nothing,
        "reports",
        "approve",
        EvaluationScope::Project(project_id)
    ));

    // Both together flip the result to allow.
    let provisioned = unassigned.with_assignment(assignment(
        &catalog,
        RoleName::ProjectAdmin,
        AssignmentScope::Project { project_id },
    ));
    assert!(evaluator().evaluate(
        &provisioned,
        "reports",
        "approve",
        EvaluationScope::Project(project_id)
    ));

    // A different target project is still denied.
    assert!(!evaluator().evaluate(
        &provisioned,
        "reports",
        "approve",
        EvaluationScope::Project(ProjectId::new())
    ));
}

#[test]
fn builtin_role_presets_apply_to_active_assignments() {
    let catalog = RoleCatalog::builtin();
    let project_id = ProjectId::new();
    let principal = Principal::new(PrincipalId::new(), "Branch Lead").with_assignment(assignment(
        &catalog,
        RoleName::BranchAdmin,
        AssignmentScope::Project { project_id },
    ));

    let evaluator = evaluator();
    assert!(evaluator.evaluate(
        &principal,
        "reports",
        "submit",
        EvaluationScope::Project(project_id)
    ));
    assert!(!evaluator.evaluate(
        &principal,
        "reports",
        "export",
        EvaluationScope::Project(project_id)
    ));
}

#[test]
fn custom_roles_never_inherit_presets() {
    let project_id = ProjectId::new();
    let custom_level = RoleLevel::new(5).unwrap_or_else(|_| panic!("bad level"));
    let principal = Principal::new(PrincipalId::new(), "Contractor").with_assignment(
        RoleAssignment::active(
            // Even a name close to a builtin resolves no presets.
            RoleName::Custom("branch-admin-temp".to_owned()),
            custom_level,
            AssignmentScope::Project { project_id },
        ),
    );

    assert!(!evaluator().evaluate(
        &principal,
        "reports",
        "submit",
        EvaluationScope::Project(project_id)
    ));

    let with_grant =
        principal.with_direct_permission(permission("reports:submit-project"));
    assert!(evaluator().evaluate(
        &with_grant,
        "reports",
        "submit",
        EvaluationScope::Project(project_id)
    ));
}

#[test]
fn own_scope_requires_ownership() {
    let principal_id = PrincipalId::new();
    let principal = Principal::new(principal_id, "Author")
        .with_direct_permission(permission("reports:edit-own"));

    let evaluator = evaluator();
    assert!(evaluator.evaluate(
        &principal,
        "reports",
        "edit",
        EvaluationScope::Own(principal_id)
    ));
    assert!(!evaluator.evaluate(
        &principal,
        "reports",
        "edit",
        EvaluationScope::Own(PrincipalId::new())
    ));
}

#[test]
fn malformed_resource_fails_closed() {
    let principal = Principal::new(PrincipalId::new(), "Odd")
        .with_direct_permission(permission("reports:view"));

    assert!(!evaluator().evaluate(&principal, "", "view", EvaluationScope::Unscoped));
    assert!(!evaluator().evaluate(&principal, "Reports", "view", EvaluationScope::Unscoped));
}

#[test]
fn accessible_projects_filters_to_assigned_projects() {
    let catalog = RoleCatalog::builtin();
    let mine = ProjectId::new();
    let other = ProjectId::new();

    let principal = Principal::new(PrincipalId::new(), "Project Lead").with_assignment(
        assignment(
            &catalog,
            RoleName::ProjectAdmin,
            AssignmentScope::Project { project_id: mine },
        ),
    );

    let accessible = evaluator().accessible_projects(&principal, "reports", "view", &[mine, other]);
    assert_eq!(accessible, vec![mine]);
}

#[test]
fn accessible_projects_is_unchanged_for_global_admin() {
    let catalog = RoleCatalog::builtin();
    let principal = Principal::new(PrincipalId::new(), "Root").with_assignment(assignment(
        &catalog,
        RoleName::GlobalAdmin,
        AssignmentScope::Global,
    ));

    let candidates = vec![ProjectId::new(), ProjectId::new(), ProjectId::new()];
    let accessible =
        evaluator().accessible_projects(&principal, "reports", "view", &candidates);
    assert_eq!(accessible, candidates);
}
