use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

use reportflow_core::{AppError, AppResult};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::permission::{PermissionKey, ScopeQualifier};

/// Built-in role identifiers plus free-form custom role names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoleName {
    /// Top of the hierarchy; carries every permission by construction.
    GlobalAdmin,
    /// Administers one region spanning several countries.
    RegionalAdmin,
    /// Administers one country.
    CountryAdmin,
    /// Administers one project.
    ProjectAdmin,
    /// Administers one branch inside a project.
    BranchAdmin,
    /// Tenant-defined role; relies exclusively on direct permission grants.
    Custom(String),
}

impl RoleName {
    /// Returns a stable storage value for this role name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::GlobalAdmin => "global-admin",
            Self::RegionalAdmin => "regional-admin",
            Self::CountryAdmin => "country-admin",
            Self::ProjectAdmin => "project-admin",
            Self::BranchAdmin => "branch-admin",
            Self::Custom(name) => name.as_str(),
        }
    }

    /// Parses a storage value; unrecognized names become custom roles.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "global-admin" => Self::GlobalAdmin,
            "regional-admin" => Self::RegionalAdmin,
            "country-admin" => Self::CountryAdmin,
            "project-admin" => Self::ProjectAdmin,
            "branch-admin" => Self::BranchAdmin,
            other => Self::Custom(other.to_owned()),
        }
    }

    /// Returns whether this is one of the five built-in role names.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }
}

impl Display for RoleName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.as_str())
    }
}

impl Serialize for RoleName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RoleName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        if value.trim().is_empty() {
            return Err(D::Error::custom("role name must not be empty"));
        }

        Ok(Self::parse(value.as_str()))
    }
}

/// Position in the role hierarchy. Level 1 is the most senior.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoleLevel(u8);

impl RoleLevel {
    /// Creates a validated hierarchy level.
    pub fn new(value: u8) -> AppResult<Self> {
        if value == 0 {
            return Err(AppError::Validation(
                "role level must be 1 or greater".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the numeric level value.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// Returns whether this level is the same as or more senior than `other`.
    #[must_use]
    pub fn is_at_least_as_senior_as(&self, other: Self) -> bool {
        self.0 <= other.0
    }

    /// Returns whether this level is strictly more senior than `other`.
    #[must_use]
    pub fn outranks(&self, other: Self) -> bool {
        self.0 < other.0
    }
}

/// The scope a role binds its holder's authority to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleBinding {
    /// Authority everywhere.
    Global,
    /// Authority within a region or country.
    Regional,
    /// Authority bound to specific projects the holder is provisioned onto.
    Project,
}

/// Immutable role catalog entry, loaded at process start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    name: RoleName,
    level: RoleLevel,
    binding: RoleBinding,
    default_permissions: BTreeSet<PermissionKey>,
}

impl Role {
    /// Returns the role name.
    #[must_use]
    pub fn name(&self) -> &RoleName {
        &self.name
    }

    /// Returns the hierarchy level.
    #[must_use]
    pub fn level(&self) -> RoleLevel {
        self.level
    }

    /// Returns the scope this role binds authority to.
    #[must_use]
    pub fn binding(&self) -> RoleBinding {
        self.binding
    }

    /// Returns the preset permissions this role carries by default.
    #[must_use]
    pub fn default_permissions(&self) -> &BTreeSet<PermissionKey> {
        &self.default_permissions
    }
}

const REPORT_ACTIONS: &[&str] = &["view", "submit", "approve", "comment", "export"];

fn builtin_role(
    name: RoleName,
    level: u8,
    binding: RoleBinding,
    actions: &[&str],
    qualifier: ScopeQualifier,
) -> Role {
    let default_permissions = actions
        .iter()
        .map(|action| PermissionKey::preset("reports", action, Some(qualifier)))
        .collect();

    Role {
        name,
        level: RoleLevel(level),
        binding,
        default_permissions,
    }
}

/// Static catalog of built-in roles, their levels and preset permissions.
///
/// Custom role names are deliberately absent: they resolve no presets and
/// rely exclusively on direct permission grants.
#[derive(Debug, Clone)]
pub struct RoleCatalog {
    roles: BTreeMap<String, Role>,
}

impl RoleCatalog {
    /// Creates the built-in catalog.
    #[must_use]
    pub fn builtin() -> Self {
        let roles = [
            builtin_role(
                RoleName::GlobalAdmin,
                1,
                RoleBinding::Global,
                REPORT_ACTIONS,
                ScopeQualifier::Global,
            ),
            builtin_role(
                RoleName::RegionalAdmin,
                2,
                RoleBinding::Regional,
                REPORT_ACTIONS,
                ScopeQualifier::Regional,
            ),
            builtin_role(
                RoleName::CountryAdmin,
                3,
                RoleBinding::Regional,
                &["view", "approve", "comment"],
                ScopeQualifier::Regional,
            ),
            builtin_role(
                RoleName::ProjectAdmin,
                4,
                RoleBinding::Project,
                &["view", "submit", "approve", "comment"],
                ScopeQualifier::Project,
            ),
            builtin_role(
                RoleName::BranchAdmin,
                5,
                RoleBinding::Project,
                &["view", "submit", "approve", "comment"],
                ScopeQualifier::Project,
            ),
        ];

        Self {
            roles: roles
                .into_iter()
                .map(|role| (role.name.as_str().to_owned(), role))
                .collect(),
        }
    }

    /// Finds a catalog entry; custom role names resolve nothing.
    #[must_use]
    pub fn find(&self, name: &RoleName) -> Option<&Role> {
        self.roles.get(name.as_str())
    }

    /// Returns the hierarchy level of a built-in role.
    #[must_use]
    pub fn level_of(&self, name: &RoleName) -> Option<RoleLevel> {
        self.find(name).map(Role::level)
    }

    /// Returns the scope binding of a built-in role.
    #[must_use]
    pub fn binding_of(&self, name: &RoleName) -> Option<RoleBinding> {
        self.find(name).map(Role::binding)
    }

    /// Returns all catalog entries ordered by name.
    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }
}

impl Default for RoleCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Fixed, ordered sequence of required role names every workflow traverses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalChain {
    required_roles: Vec<RoleName>,
}

impl ApprovalChain {
    /// Creates a validated chain of built-in role names.
    pub fn new(required_roles: Vec<RoleName>) -> AppResult<Self> {
        if required_roles.is_empty() {
            return Err(AppError::Validation(
                "approval chain must contain at least one role".to_owned(),
            ));
        }

        if let Some(custom) = required_roles.iter().find(|role| !role.is_builtin()) {
            return Err(AppError::Validation(format!(
                "approval chain role '{custom}' is not a built-in role"
            )));
        }

        Ok(Self { required_roles })
    }

    /// Returns the branch → project → country → global default chain.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            required_roles: vec![
                RoleName::BranchAdmin,
                RoleName::ProjectAdmin,
                RoleName::CountryAdmin,
                RoleName::GlobalAdmin,
            ],
        }
    }

    /// Returns the number of steps in the chain.
    #[must_use]
    pub fn len(&self) -> u32 {
        u32::try_from(self.required_roles.len()).unwrap_or(u32::MAX)
    }

    /// Returns whether the chain has no steps. Always false for validated chains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.required_roles.is_empty()
    }

    /// Returns the required role for a 1-based step number.
    #[must_use]
    pub fn required_role_for_step(&self, step_number: u32) -> Option<&RoleName> {
        step_number
            .checked_sub(1)
            .and_then(|index| self.required_roles.get(index as usize))
    }

    /// Iterates required roles in chain order.
    pub fn required_roles(&self) -> impl Iterator<Item = &RoleName> {
        self.required_roles.iter()
    }
}
