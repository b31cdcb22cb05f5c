use std::collections::BTreeSet;
use std::sync::Arc;

use reportflow_core::{AppError, AppResult, PrincipalId, ProjectId};
use reportflow_domain::{PermissionKey, Principal, RoleCatalog, ScopeQualifier};

/// Scope a permission check is requested against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationScope {
    /// No scope; satisfied by an unqualified grant.
    Unscoped,
    /// Global scope.
    Global,
    /// Regional scope.
    Regional,
    /// Project scope with the target project the action touches.
    Project(ProjectId),
    /// Ownership scope with the owning principal of the target resource.
    Own(PrincipalId),
}

/// Decides whether a principal may perform an action on a resource.
///
/// Pure and side-effect free: safe to call concurrently on every request.
#[derive(Clone)]
pub struct PermissionEvaluator {
    catalog: Arc<RoleCatalog>,
}

impl PermissionEvaluator {
    /// Creates an evaluator over a role catalog.
    #[must_use]
    pub fn new(catalog: Arc<RoleCatalog>) -> Self {
        Self { catalog }
    }

    /// Returns whether the principal may perform `action` on `resource`.
    ///
    /// Rules are ordered and short-circuit on the first allow:
    /// 1. an active global-admin assignment allows unconditionally;
    /// 2. an unqualified effective grant allows;
    /// 3. a regional- or global-qualified grant allows regardless of target;
    /// 4. project scope requires both the project-qualified grant and an
    ///    active assignment bound to the target project (holding the
    ///    permission string alone is never sufficient); ownership scope
    ///    analogously requires the own-qualified grant and ownership;
    /// 5. everything else is denied.
    ///
    /// Malformed resource or action segments fail closed.
    #[must_use]
    pub fn evaluate(
        &self,
        principal: &Principal,
        resource: &str,
        action: &str,
        scope: EvaluationScope,
    ) -> bool {
        if principal.is_global_admin() {
            return true;
        }

        let Ok(unqualified) = PermissionKey::new(resource, action) else {
            return false;
        };

        let effective = self.effective_permissions(principal);
        if effective.contains(&unqualified) {
            return true;
        }

        if effective.contains(&unqualified.with_qualifier(Some(ScopeQualifier::Global)))
            || effective.contains(&unqualified.with_qualifier(Some(ScopeQualifier::Regional)))
        {
            return true;
        }

        match scope {
            EvaluationScope::Project(target) => {
                effective.contains(&unqualified.with_qualifier(Some(ScopeQualifier::Project)))
                    && principal.has_active_assignment_for_project(target)
            }
            EvaluationScope::Own(owner) => {
                effective.contains(&unqualified.with_qualifier(Some(ScopeQualifier::Own)))
                    && owner == principal.id()
            }
            EvaluationScope::Unscoped | EvaluationScope::Global | EvaluationScope::Regional => {
                false
            }
        }
    }

    /// Ensures the principal may perform the action, without revealing why a
    /// denial happened.
    pub fn require(
        &self,
        principal: &Principal,
        resource: &str,
        action: &str,
        scope: EvaluationScope,
    ) -> AppResult<()> {
        if self.evaluate(principal, resource, action, scope) {
            Ok(())
        } else {
            Err(AppError::Unauthorized)
        }
    }

    /// Filters candidate projects to those the principal may act on.
    ///
    /// A pure filter with no side effects; global admins see the candidate
    /// list unchanged.
    #[must_use]
    pub fn accessible_projects(
        &self,
        principal: &Principal,
        resource: &str,
        action: &str,
        candidates: &[ProjectId],
    ) -> Vec<ProjectId> {
        if principal.is_global_admin() {
            return candidates.to_vec();
        }

        candidates
            .iter()
            .copied()
            .filter(|project_id| {
                self.evaluate(principal, resource, action, EvaluationScope::Project(*project_id))
            })
            .collect()
    }

    /// Resolves the effective permission set for a principal.
    ///
    /// Preset permissions apply only to active assignments of built-in role
    /// names; custom roles contribute nothing here and rely exclusively on
    /// direct grants. Direct grants are additive, never restrictive.
    fn effective_permissions(&self, principal: &Principal) -> BTreeSet<PermissionKey> {
        let mut effective = principal.direct_permissions().clone();

        for assignment in principal.active_assignments() {
            if let Some(role) = self.catalog.find(&assignment.role_name) {
                effective.extend(role.default_permissions().iter().cloned());
            }
        }

        effective
    }
}

#[cfg(test)]
mod tests;
