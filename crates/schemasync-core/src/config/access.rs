//! Project access gate configuration.

use serde::{Deserialize, Serialize};

use crate::types::id::{ProjectId, UserId};

/// How presence joins are authorized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    /// `"static"` (only the listed grants) or `"allow_all"` (development only).
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Project memberships for the static gate.
    #[serde(default)]
    pub grants: Vec<AccessGrant>,
}

/// One user allowed on one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// Project the grant applies to.
    pub project_id: ProjectId,
    /// User being granted access.
    pub user_id: UserId,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            grants: Vec::new(),
        }
    }
}

fn default_mode() -> String {
    "static".to_string()
}
