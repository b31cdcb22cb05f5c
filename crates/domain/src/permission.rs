use std::fmt::{Display, Formatter};
use std::str::FromStr;

use reportflow_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Scope qualifier attached to a permission key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeQualifier {
    /// Grant applies everywhere.
    Global,
    /// Grant applies within the holder's region or country.
    Regional,
    /// Grant applies to a specific project; requires a target id at check time.
    Project,
    /// Grant applies to resources the holder owns; requires a target id at check time.
    Own,
}

impl ScopeQualifier {
    /// Returns a stable storage value for this qualifier.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Regional => "regional",
            Self::Project => "project",
            Self::Own => "own",
        }
    }
}

impl FromStr for ScopeQualifier {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "global" => Ok(Self::Global),
            "regional" => Ok(Self::Regional),
            "project" => Ok(Self::Project),
            "own" => Ok(Self::Own),
            _ => Err(AppError::Validation(format!(
                "unknown scope qualifier '{value}'"
            ))),
        }
    }
}

/// A structured permission key `(resource, action, qualifier)`.
///
/// Rendered as `resource:action` or `resource:action-qualifier` for storage.
/// To keep the rendering unambiguous, an action must not end in a segment
/// that reads as a qualifier (`approve-own` is the qualified form of
/// `approve`, never an action of its own).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionKey {
    resource: String,
    action: String,
    qualifier: Option<ScopeQualifier>,
}

impl PermissionKey {
    /// Creates an unqualified permission key.
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> AppResult<Self> {
        Self::build(resource.into(), action.into(), None)
    }

    /// Creates a permission key with a scope qualifier.
    pub fn qualified(
        resource: impl Into<String>,
        action: impl Into<String>,
        qualifier: ScopeQualifier,
    ) -> AppResult<Self> {
        Self::build(resource.into(), action.into(), Some(qualifier))
    }

    /// Crate-internal constructor for catalog presets built from known-good parts.
    pub(crate) fn preset(
        resource: &str,
        action: &str,
        qualifier: Option<ScopeQualifier>,
    ) -> Self {
        Self {
            resource: resource.to_owned(),
            action: action.to_owned(),
            qualifier,
        }
    }

    fn build(
        resource: String,
        action: String,
        qualifier: Option<ScopeQualifier>,
    ) -> AppResult<Self> {
        validate_segment(&resource, "resource")?;
        validate_segment(&action, "action")?;

        if let Some((_, suffix)) = action.rsplit_once('-') {
            if ScopeQualifier::from_str(suffix).is_ok() {
                return Err(AppError::Validation(format!(
                    "action '{action}' ends in a scope qualifier; pass the qualifier separately"
                )));
            }
        }

        Ok(Self {
            resource,
            action,
            qualifier,
        })
    }

    /// Returns the resource segment.
    #[must_use]
    pub fn resource(&self) -> &str {
        self.resource.as_str()
    }

    /// Returns the action segment.
    #[must_use]
    pub fn action(&self) -> &str {
        self.action.as_str()
    }

    /// Returns the scope qualifier, if any.
    #[must_use]
    pub fn qualifier(&self) -> Option<ScopeQualifier> {
        self.qualifier
    }

    /// Returns the same key with the qualifier replaced.
    #[must_use]
    pub fn with_qualifier(&self, qualifier: Option<ScopeQualifier>) -> Self {
        Self {
            resource: self.resource.clone(),
            action: self.action.clone(),
            qualifier,
        }
    }

    /// Returns a stable storage value for this key.
    #[must_use]
    pub fn storage_value(&self) -> String {
        match self.qualifier {
            Some(qualifier) => format!("{}:{}-{}", self.resource, self.action, qualifier.as_str()),
            None => format!("{}:{}", self.resource, self.action),
        }
    }
}

impl Display for PermissionKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.storage_value())
    }
}

impl FromStr for PermissionKey {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (resource, action_part) = value.split_once(':').ok_or_else(|| {
            AppError::Validation(format!(
                "permission key '{value}' must be 'resource:action[-qualifier]'"
            ))
        })?;

        if let Some((action, suffix)) = action_part.rsplit_once('-') {
            if let Ok(qualifier) = ScopeQualifier::from_str(suffix) {
                return Self::build(resource.to_owned(), action.to_owned(), Some(qualifier));
            }
        }

        Self::build(resource.to_owned(), action_part.to_owned(), None)
    }
}

fn validate_segment(value: &str, label: &str) -> AppResult<()> {
    if value.is_empty() {
        return Err(AppError::Validation(format!(
            "permission {label} must not be empty"
        )));
    }

    if !value
        .chars()
        .all(|character| character.is_ascii_lowercase() || character == '_' || character == '-')
    {
        return Err(AppError::Validation(format!(
            "permission {label} '{value}' must be lowercase ascii, '-' or '_'"
        )));
    }

    Ok(())
}
