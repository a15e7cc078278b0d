//! Access reconnaissance.
//!
//! Turns the identity behind a token and the raw target listing into an
//! admin verdict, an overall [`PrivilegeLevel`], and one [`AccessSummary`]
//! per target.

use pipeprobe_core::{
    AccessRank, AccessSummary, AccessibleTarget, Identity, PlatformClient, PrivilegeLevel, Result,
    TargetRecord,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Options for a recon pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconConfig {
    /// Ask the platform for every visible target instead of memberships only.
    pub show_all: bool,
}

impl ReconConfig {
    /// Set the show-all flag.
    #[must_use]
    pub const fn with_show_all(mut self, show_all: bool) -> Self {
        self.show_all = show_all;
        self
    }
}

/// Result of a recon pass.
#[derive(Debug, Clone, Serialize)]
pub struct ReconReport {
    /// Platform name
    pub platform: String,
    /// The account behind the token
    pub identity: Identity,
    /// Admin verdict (explicit flag or superuser name)
    pub is_admin: bool,
    /// Derived privilege level
    pub privilege: PrivilegeLevel,
    /// Classified targets, in platform order
    pub targets: Vec<AccessibleTarget>,
}

/// Read-only enumeration of what a token can reach.
pub struct AccessRecon {
    platform: Arc<dyn PlatformClient>,
    config: ReconConfig,
}

impl AccessRecon {
    /// Create an analyzer over a platform client.
    #[must_use]
    pub fn new(platform: Arc<dyn PlatformClient>, config: ReconConfig) -> Self {
        Self { platform, config }
    }

    /// Query identity and targets, then classify them.
    pub async fn run(&self) -> Result<ReconReport> {
        let identity = self.platform.get_identity().await?;
        let admin = is_admin(&identity, self.platform.superuser_name());
        info!(
            platform = self.platform.name(),
            username = %identity.username,
            is_admin = admin,
            "Resolved token identity"
        );

        let records = self
            .platform
            .list_accessible_targets(self.config.show_all)
            .await?;
        debug!(count = records.len(), show_all = self.config.show_all, "Listed targets");

        let privilege = privilege_level(admin, &records);
        let targets = records
            .iter()
            .map(|record| AccessibleTarget {
                full_path: record.full_path.clone(),
                visibility: record.visibility,
                access_summary: summarize(record, admin),
            })
            .collect();

        Ok(ReconReport {
            platform: self.platform.name().to_string(),
            identity,
            is_admin: admin,
            privilege,
            targets,
        })
    }
}

/// Admin if the platform says so, or if the username is the superuser name.
///
/// The username comparison ignores ASCII case.
#[must_use]
pub fn is_admin(identity: &Identity, superuser: Option<&str>) -> bool {
    identity.is_admin_flag
        || superuser.is_some_and(|name| identity.username.eq_ignore_ascii_case(name))
}

/// Pick the single access descriptor for a target; the first matching rule wins.
#[must_use]
pub fn summarize(record: &TargetRecord, is_admin: bool) -> AccessSummary {
    if is_admin {
        AccessSummary::AdminAll
    } else if record.owned_by_caller {
        AccessSummary::Owner
    } else if record.archived {
        AccessSummary::Archived
    } else if let Some(level) = &record.project_access {
        AccessSummary::Project(level.clone())
    } else if let Some(level) = &record.group_access {
        AccessSummary::Group(level.clone())
    } else {
        AccessSummary::Unknown
    }
}

/// Strongest privilege the identity holds across all targets.
///
/// Archived targets are read-only, so their grants count as read access at most.
#[must_use]
pub fn privilege_level(is_admin: bool, records: &[TargetRecord]) -> PrivilegeLevel {
    if is_admin {
        return PrivilegeLevel::Admin;
    }
    records
        .iter()
        .map(|record| {
            if record.owned_by_caller {
                return PrivilegeLevel::Owner;
            }
            let rank = [&record.project_access, &record.group_access]
                .into_iter()
                .flatten()
                .map(|level| level.rank)
                .max();
            match rank {
                None => PrivilegeLevel::Unknown,
                Some(_) if record.archived => PrivilegeLevel::Read,
                Some(AccessRank::Owner) => PrivilegeLevel::Owner,
                Some(AccessRank::Maintain | AccessRank::Write) => PrivilegeLevel::Write,
                Some(AccessRank::Read) => PrivilegeLevel::Read,
            }
        })
        .max()
        .unwrap_or(PrivilegeLevel::Unknown)
}
