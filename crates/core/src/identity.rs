//! Identity and access descriptors returned by a platform and normalized by recon.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The account behind a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Login / username
    pub username: String,
    /// Human-readable display name
    pub display_name: Option<String>,
    /// Platform account id
    pub id: u64,
    /// Public or primary email, when the token may read it
    pub email: Option<String>,
    /// Explicit administrator flag reported by the platform
    pub is_admin_flag: bool,
}

/// Privilege level derived from an identity and the targets it can reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PrivilegeLevel {
    /// Nothing could be determined
    Unknown,
    /// Read-only access somewhere
    Read,
    /// Push access somewhere
    Write,
    /// Owns at least one target
    Owner,
    /// Instance / site administrator
    Admin,
}

impl fmt::Display for PrivilegeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "Unknown",
            Self::Read => "Read",
            Self::Write => "Write",
            Self::Owner => "Owner",
            Self::Admin => "Admin",
        };
        f.write_str(s)
    }
}

/// Visibility of a repository or project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Anyone can read
    Public,
    /// Any authenticated user of the instance can read
    Internal,
    /// Members only
    Private,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Public => "public",
            Self::Internal => "internal",
            Self::Private => "private",
        };
        f.write_str(s)
    }
}

impl FromStr for Visibility {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "internal" => Ok(Self::Internal),
            "private" => Ok(Self::Private),
            other => Err(Error::configuration(format!("Unknown visibility: {other}"))),
        }
    }
}

/// Coarse rank of an explicit access grant, comparable across platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccessRank {
    /// Can read (GitHub pull/triage, GitLab guest/reporter)
    Read,
    /// Can push (GitHub push, GitLab developer)
    Write,
    /// Can manage settings (GitHub maintain, GitLab maintainer)
    Maintain,
    /// Full control (GitHub admin, GitLab owner)
    Owner,
}

/// An explicit access grant as the platform names it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessLevel {
    /// Platform-normalized rank
    pub rank: AccessRank,
    /// The platform's own label (e.g. `"Maintainer (40)"`, `"write"`)
    pub label: String,
}

impl AccessLevel {
    /// Create an access level.
    #[must_use]
    pub fn new(rank: AccessRank, label: impl Into<String>) -> Self {
        Self {
            rank,
            label: label.into(),
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// A target as listed by the platform, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRecord {
    /// `namespace/name`
    pub full_path: String,
    /// Visibility reported by the platform
    pub visibility: Visibility,
    /// The caller owns the target
    pub owned_by_caller: bool,
    /// The target is archived / read-only
    pub archived: bool,
    /// Grant attached directly to the project or repository
    pub project_access: Option<AccessLevel>,
    /// Grant inherited through a group or namespace
    pub group_access: Option<AccessLevel>,
}

impl TargetRecord {
    /// A record with no ownership, archival or grant information.
    #[must_use]
    pub fn new(full_path: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            full_path: full_path.into(),
            visibility,
            owned_by_caller: false,
            archived: false,
            project_access: None,
            group_access: None,
        }
    }
}

/// The single access descriptor shown for a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "level", rename_all = "snake_case")]
pub enum AccessSummary {
    /// The caller is a global administrator
    AdminAll,
    /// The caller owns the target
    Owner,
    /// The target is archived
    Archived,
    /// Explicit project-level grant
    Project(AccessLevel),
    /// Grant inherited from a group or namespace
    Group(AccessLevel),
    /// Nothing known
    Unknown,
}

impl fmt::Display for AccessSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdminAll => f.write_str("Admin (all)"),
            Self::Owner => f.write_str("Owner"),
            Self::Archived => f.write_str("Archived"),
            Self::Project(level) | Self::Group(level) => write!(f, "{level}"),
            Self::Unknown => f.write_str("Unknown"),
        }
    }
}

/// A classified target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessibleTarget {
    /// `namespace/name`
    pub full_path: String,
    /// Visibility reported by the platform
    pub visibility: Visibility,
    /// Single access descriptor
    pub access_summary: AccessSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_summary_display() {
        assert_eq!(AccessSummary::AdminAll.to_string(), "Admin (all)");
        assert_eq!(AccessSummary::Owner.to_string(), "Owner");
        assert_eq!(AccessSummary::Archived.to_string(), "Archived");
        assert_eq!(AccessSummary::Unknown.to_string(), "Unknown");
        let level = AccessLevel::new(AccessRank::Maintain, "Maintainer (40)");
        assert_eq!(AccessSummary::Project(level.clone()).to_string(), "Maintainer (40)");
        assert_eq!(AccessSummary::Group(level).to_string(), "Maintainer (40)");
    }

    #[test]
    fn test_privilege_ordering() {
        assert!(PrivilegeLevel::Admin > PrivilegeLevel::Owner);
        assert!(PrivilegeLevel::Owner > PrivilegeLevel::Write);
        assert!(PrivilegeLevel::Write > PrivilegeLevel::Read);
        assert!(PrivilegeLevel::Read > PrivilegeLevel::Unknown);
    }

    #[test]
    fn test_visibility_parse() {
        assert_eq!("Public".parse::<Visibility>().unwrap(), Visibility::Public);
        assert_eq!("internal".parse::<Visibility>().unwrap(), Visibility::Internal);
        assert!("secret".parse::<Visibility>().is_err());
    }

    #[test]
    fn test_access_summary_serializes_with_kind() {
        let summary = AccessSummary::Project(AccessLevel::new(AccessRank::Write, "write"));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["kind"], "project");
        assert_eq!(json["level"]["label"], "write");
    }
}
