use std::collections::BTreeSet;

use reportflow_core::{PrincipalId, ProjectId};
use serde::{Deserialize, Serialize};

use crate::permission::PermissionKey;
use crate::role::{RoleLevel, RoleName};

/// Scope a role assignment is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssignmentScope {
    /// Assignment grants authority everywhere.
    Global,
    /// Assignment grants authority within one country.
    Regional {
        /// ISO country code the assignment is bound to.
        country: String,
    },
    /// Assignment grants authority on one project only.
    Project {
        /// Project the holder is provisioned onto.
        project_id: ProjectId,
    },
}

impl AssignmentScope {
    /// Returns the bound project, when the scope is project-level.
    #[must_use]
    pub fn project_id(&self) -> Option<ProjectId> {
        match self {
            Self::Project { project_id } => Some(*project_id),
            Self::Global | Self::Regional { .. } => None,
        }
    }

    /// Returns whether this scope covers actions on the given project.
    ///
    /// Global and regional scopes are broader than any single project;
    /// project scopes cover only their own project.
    #[must_use]
    pub fn covers_project(&self, project_id: ProjectId) -> bool {
        match self {
            Self::Global | Self::Regional { .. } => true,
            Self::Project {
                project_id: assigned,
            } => *assigned == project_id,
        }
    }
}

/// One role held by a principal, optionally scoped.
///
/// Assignments are deactivated on revocation, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Assigned role name.
    pub role_name: RoleName,
    /// Denormalized copy of the role's hierarchy level.
    pub level: RoleLevel,
    /// Scope the assignment is bound to.
    pub scope: AssignmentScope,
    /// Whether the assignment is currently active.
    pub is_active: bool,
}

impl RoleAssignment {
    /// Creates an active assignment.
    #[must_use]
    pub fn active(role_name: RoleName, level: RoleLevel, scope: AssignmentScope) -> Self {
        Self {
            role_name,
            level,
            scope,
            is_active: true,
        }
    }

    /// Marks the assignment revoked.
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}

/// The resolved actor for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    id: PrincipalId,
    display_name: String,
    assignments: Vec<RoleAssignment>,
    direct_permissions: BTreeSet<PermissionKey>,
}

impl Principal {
    /// Creates a principal with no assignments or grants.
    #[must_use]
    pub fn new(id: PrincipalId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            assignments: Vec::new(),
            direct_permissions: BTreeSet::new(),
        }
    }

    /// Adds a role assignment.
    #[must_use]
    pub fn with_assignment(mut self, assignment: RoleAssignment) -> Self {
        self.assignments.push(assignment);
        self
    }

    /// Adds a direct permission grant. Grants are additive, never restrictive.
    #[must_use]
    pub fn with_direct_permission(mut self, permission: PermissionKey) -> Self {
        self.direct_permissions.insert(permission);
        self
    }

    /// Returns the principal identifier.
    #[must_use]
    pub fn id(&self) -> PrincipalId {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns all assignments, active and revoked.
    #[must_use]
    pub fn assignments(&self) -> &[RoleAssignment] {
        self.assignments.as_slice()
    }

    /// Iterates active assignments only.
    pub fn active_assignments(&self) -> impl Iterator<Item = &RoleAssignment> {
        self.assignments
            .iter()
            .filter(|assignment| assignment.is_active)
    }

    /// Returns the permissions granted outside role presets.
    #[must_use]
    pub fn direct_permissions(&self) -> &BTreeSet<PermissionKey> {
        &self.direct_permissions
    }

    /// Returns whether an active global-admin assignment exists.
    #[must_use]
    pub fn is_global_admin(&self) -> bool {
        self.active_assignments()
            .any(|assignment| assignment.role_name == RoleName::GlobalAdmin)
    }

    /// Returns whether an active assignment is bound to the given project.
    #[must_use]
    pub fn has_active_assignment_for_project(&self, project_id: ProjectId) -> bool {
        self.active_assignments()
            .any(|assignment| assignment.scope.project_id() == Some(project_id))
    }

    /// Returns the most senior role among active assignments, if any.
    #[must_use]
    pub fn most_senior_active_role(&self) -> Option<&RoleAssignment> {
        self.active_assignments()
            .min_by_key(|assignment| assignment.level)
    }

    /// Returns whether an active assignment satisfies a required level.
    ///
    /// When `bound_project` is set the qualifying assignment must cover that
    /// project: project-scoped assignments to another project never qualify,
    /// while global and regional scopes do. With `strictly` the assignment
    /// must outrank the required level instead of matching it.
    #[must_use]
    pub fn qualifies_for_level(
        &self,
        required: RoleLevel,
        bound_project: Option<ProjectId>,
        strictly: bool,
    ) -> bool {
        self.active_assignments().any(|assignment| {
            let senior_enough = if strictly {
                assignment.level.outranks(required)
            } else {
                assignment.level.is_at_least_as_senior_as(required)
            };

            let scope_covers = match bound_project {
                Some(project_id) => assignment.scope.covers_project(project_id),
                None => true,
            };

            senior_enough && scope_covers
        })
    }
}
