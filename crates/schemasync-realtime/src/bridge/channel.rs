//! Channel naming for per-project presence traffic.

use schemasync_core::types::id::ProjectId;

const PROJECT_SEGMENT: &str = "presence:project:";

/// Transport channel name for a project, e.g. `schemasync:presence:project:<uuid>`.
pub fn project_channel(prefix: &str, project_id: ProjectId) -> String {
    format!("{prefix}{PROJECT_SEGMENT}{project_id}")
}

/// Recover the project id from a transport channel name.
pub fn parse_project_channel(prefix: &str, channel: &str) -> Option<ProjectId> {
    channel
        .strip_prefix(prefix)?
        .strip_prefix(PROJECT_SEGMENT)?
        .parse()
        .ok()
}
