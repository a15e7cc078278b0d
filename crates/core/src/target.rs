//! Target repository references and branch names.

use crate::error::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A repository or project identified by `namespace/name`.
///
/// GitLab namespaces may be nested (`group/subgroup/project`); the last
/// segment is always the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetRef {
    namespace: String,
    name: String,
}

impl TargetRef {
    /// Parse a `namespace/name` reference.
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim().trim_matches('/');
        let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
        let Some((namespace, name)) = trimmed.rsplit_once('/') else {
            return Err(Error::InvalidTarget {
                value: value.to_string(),
            });
        };
        if namespace.is_empty()
            || name.is_empty()
            || namespace.split('/').any(str::is_empty)
            || trimmed.chars().any(char::is_whitespace)
        {
            return Err(Error::InvalidTarget {
                value: value.to_string(),
            });
        }
        Ok(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    /// The owning namespace (user, organization or group path).
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The repository or project name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The full `namespace/name` path.
    #[must_use]
    pub fn full_path(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for TargetRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TargetRef {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TargetRef> for String {
    fn from(value: TargetRef) -> Self {
        value.full_path()
    }
}

/// Default prefix for generated branch names.
pub const DEFAULT_BRANCH_PREFIX: &str = "lint-testing-";

/// Length of the random alphabetic suffix of generated branch names.
pub const BRANCH_SUFFIX_LEN: usize = 5;

/// Name of the branch that carries the injected pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchName(String);

impl BranchName {
    /// Use an explicit branch name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let invalid = name.is_empty()
            || name.starts_with('-')
            || name.starts_with('/')
            || name.ends_with('/')
            || name.ends_with(".lock")
            || name.contains("..")
            || name
                .chars()
                .any(|c| c.is_whitespace() || c.is_control() || "~^:?*[\\".contains(c));
        if invalid {
            return Err(Error::configuration_with_help(
                format!("'{name}' is not a valid branch name"),
                "Branch names cannot contain spaces, '..', or any of ~^:?*[\\",
            ));
        }
        Ok(Self(name))
    }

    /// Generate `prefix` followed by [`BRANCH_SUFFIX_LEN`] random ASCII letters.
    #[must_use]
    pub fn random(prefix: &str) -> Self {
        let suffix: String = rand::rng()
            .sample_iter(rand::distr::Alphabetic)
            .take(BRANCH_SUFFIX_LEN)
            .map(char::from)
            .collect();
        Self(format!("{prefix}{suffix}"))
    }

    /// The branch name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BranchName {
    fn default() -> Self {
        Self::random(DEFAULT_BRANCH_PREFIX)
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_target() {
        let target = TargetRef::parse("org/repo").unwrap();
        assert_eq!(target.namespace(), "org");
        assert_eq!(target.name(), "repo");
        assert_eq!(target.to_string(), "org/repo");
    }

    #[test]
    fn test_parse_nested_gitlab_target() {
        let target = TargetRef::parse("group/sub/project").unwrap();
        assert_eq!(target.namespace(), "group/sub");
        assert_eq!(target.name(), "project");
        assert_eq!(target.full_path(), "group/sub/project");
    }

    #[test]
    fn test_parse_strips_git_suffix_and_slashes() {
        let target = TargetRef::parse("/org/repo.git").unwrap();
        assert_eq!(target.full_path(), "org/repo");
    }

    #[test]
    fn test_parse_invalid_targets() {
        for value in ["", "repo", "/repo", "org/", "a//b", "org/my repo"] {
            assert!(
                TargetRef::parse(value).is_err(),
                "expected '{value}' to be rejected"
            );
        }
    }

    #[test]
    fn test_target_serde_as_string() {
        let target = TargetRef::parse("org/repo").unwrap();
        let json = serde_json::to_string(&target).unwrap();
        assert_eq!(json, "\"org/repo\"");
        let back: TargetRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, target);
    }

    #[test]
    fn test_random_branch_name_shape() {
        let branch = BranchName::random(DEFAULT_BRANCH_PREFIX);
        let suffix = branch.as_str().strip_prefix(DEFAULT_BRANCH_PREFIX).unwrap();
        assert_eq!(suffix.len(), BRANCH_SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_alphabetic()));
    }

    #[test]
    fn test_random_branch_names_differ() {
        // 52^5 possibilities; ten draws colliding would point at a broken generator
        let names: std::collections::HashSet<_> =
            (0..10).map(|_| BranchName::default()).collect();
        assert!(names.len() > 1);
    }

    #[test]
    fn test_invalid_branch_names() {
        for name in ["", "a b", "a..b", "-x", "x.lock", "a:b", "refs/"] {
            assert!(BranchName::new(name).is_err(), "expected '{name}' rejected");
        }
    }
}
