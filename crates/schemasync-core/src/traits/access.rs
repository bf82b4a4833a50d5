//! Project access gate consumed by the presence join path.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{info, warn};

use crate::config::AccessConfig;
use crate::error::AppError;
use crate::result::AppResult;
use crate::types::id::{ProjectId, UserId};

/// Answers whether a user may collaborate on a project.
///
/// Provided by the surrounding application; presence never creates a
/// session for a user without access.
#[async_trait]
pub trait ProjectAccess: Send + Sync + std::fmt::Debug + 'static {
    /// Check project access for a user.
    async fn authorize(&self, user_id: UserId, project_id: ProjectId) -> AppResult<bool>;
}

/// Grants every user access to every project (single-node development).
#[derive(Debug, Clone, Default)]
pub struct AllowAllAccess;

#[async_trait]
impl ProjectAccess for AllowAllAccess {
    async fn authorize(&self, _user_id: UserId, _project_id: ProjectId) -> AppResult<bool> {
        Ok(true)
    }
}

/// Explicit allow-list of project members.
#[derive(Debug, Default)]
pub struct StaticProjectAccess {
    members: DashMap<ProjectId, HashSet<UserId>>,
}

impl StaticProjectAccess {
    /// Create an empty allow-list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a user access to a project.
    pub fn grant(&self, project_id: ProjectId, user_id: UserId) {
        self.members.entry(project_id).or_default().insert(user_id);
    }

    /// Revoke a user's access to a project.
    pub fn revoke(&self, project_id: ProjectId, user_id: UserId) {
        if let Some(mut members) = self.members.get_mut(&project_id) {
            members.remove(&user_id);
        }
    }
}

#[async_trait]
impl ProjectAccess for StaticProjectAccess {
    async fn authorize(&self, user_id: UserId, project_id: ProjectId) -> AppResult<bool> {
        Ok(self
            .members
            .get(&project_id)
            .is_some_and(|members| members.contains(&user_id)))
    }
}

/// Build the access gate named by configuration.
pub fn build_project_access(config: &AccessConfig) -> AppResult<Arc<dyn ProjectAccess>> {
    match config.mode.as_str() {
        "static" => {
            let access = StaticProjectAccess::new();
            for grant in &config.grants {
                access.grant(grant.project_id, grant.user_id);
            }
            info!(grants = config.grants.len(), "Using static project access");
            Ok(Arc::new(access))
        }
        "allow_all" => {
            warn!("Project access gate disabled: every user may join every project");
            Ok(Arc::new(AllowAllAccess))
        }
        other => Err(AppError::configuration(format!(
            "Unknown access mode: '{other}'. Supported: static, allow_all"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use crate::config::AccessGrant;
    use crate::error::ErrorKind;

    use super::*;

    #[tokio::test]
    async fn test_static_access_grant_and_revoke() {
        let access = StaticProjectAccess::new();
        let project = ProjectId::new();
        let user = UserId::new();

        assert!(!access.authorize(user, project).await.unwrap());
        access.grant(project, user);
        assert!(access.authorize(user, project).await.unwrap());
        assert!(!access.authorize(UserId::new(), project).await.unwrap());
        access.revoke(project, user);
        assert!(!access.authorize(user, project).await.unwrap());
    }

    #[tokio::test]
    async fn test_static_mode_honours_configured_grants() {
        let project = ProjectId::new();
        let member = UserId::new();
        let config = AccessConfig {
            mode: "static".to_string(),
            grants: vec![AccessGrant {
                project_id: project,
                user_id: member,
            }],
        };

        let access = build_project_access(&config).unwrap();
        assert!(access.authorize(member, project).await.unwrap());
        assert!(!access.authorize(UserId::new(), project).await.unwrap());
    }

    #[tokio::test]
    async fn test_default_mode_denies_strangers() {
        let access = build_project_access(&AccessConfig::default()).unwrap();
        assert!(!access.authorize(UserId::new(), ProjectId::new()).await.unwrap());
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let config = AccessConfig {
            mode: "ldap".to_string(),
            ..AccessConfig::default()
        };
        let err = build_project_access(&config).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }
}
