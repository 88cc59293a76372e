//! Workspace and cache tag naming
//!
//! Tags are pure functions of the tag prefix and the resolved Go version:
//!
//! | Category  | Tag                                 |
//! |-----------|-------------------------------------|
//! | toolchain | `<prefix>-go-<version>`             |
//! | modules   | `<prefix>-go-modules`               |
//! | build     | `<prefix>-go-build-<major.minor>`   |
//!
//! Module caches are shared across Go versions. Build caches are shared
//! across patch releases only.

use crate::config::JobContext;
use crate::error::{GocacheError, GocacheResult};
use crate::toolchain::version::major_minor;
use serde::{Deserialize, Serialize};

/// Cache category name, also the last-resort tag prefix
pub const CATEGORY: &str = "go";

/// Owner used when a workspace is given without one
const DEFAULT_OWNER: &str = "default";

/// Resolve the cache workspace: input, then the job's default workspace.
/// A bare name is placed under the `default/` owner.
pub fn resolve_workspace(explicit: Option<&str>, ctx: &JobContext) -> GocacheResult<String> {
    let workspace = [explicit, ctx.default_workspace.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|w| !w.is_empty())
        .ok_or(GocacheError::WorkspaceRequired)?;

    if workspace.contains('/') {
        Ok(workspace.to_string())
    } else {
        Ok(format!("{DEFAULT_OWNER}/{workspace}"))
    }
}

/// Resolve the tag prefix: input, then the repository name, then `go`
pub fn tag_prefix(explicit: Option<&str>, ctx: &JobContext) -> String {
    [explicit, ctx.repository_name()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|p| !p.is_empty())
        .unwrap_or(CATEGORY)
        .to_string()
}

/// The three tags of one restore/save session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTags {
    pub toolchain: String,
    pub modules: String,
    pub build: String,
}

impl CacheTags {
    /// Derive all tags from the prefix and resolved version
    pub fn derive(prefix: &str, version: &str) -> Self {
        Self {
            toolchain: toolchain_tag(prefix, version),
            modules: format!("{prefix}-{CATEGORY}-modules"),
            build: format!("{prefix}-{CATEGORY}-build-{}", major_minor(version)),
        }
    }
}

/// Tag of the toolchain installation for an exact version
pub fn toolchain_tag(prefix: &str, version: &str) -> String {
    format!("{prefix}-{CATEGORY}-{version}")
}
