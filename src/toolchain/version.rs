//! Go version resolution and validation
//!
//! The version comes from the first source that names one:
//!
//! 1. the `go-version` input
//! 2. the `go` directive in `go.mod`
//! 3. the `go` directive in `go.work`
//! 4. `.go-version`
//! 5. the `golang` line in `.tool-versions`
//! 6. `go env GOVERSION` of an already installed toolchain
//! 7. the configured fallback version
//!
//! Unreadable or unparseable sources are skipped, so resolution always
//! produces a version.

use crate::error::{GocacheError, GocacheResult};
use crate::toolchain::Toolchain;
use regex_lite::Regex;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use tokio::fs;
use tracing::debug;

/// Oldest Go release that supports GOCACHEPROG
pub const CACHEPROG_MIN_VERSION: (u32, u32) = (1, 24);

/// Name `.tool-versions` registers Go under
const TOOL_VERSIONS_NAME: &str = "golang";

static GO_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^go\s+(\d+\.\d+(?:\.\d+)?)\s*$").expect("go directive pattern is valid")
});

static MAJOR_MINOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.(\d+)").expect("major.minor pattern is valid"));

/// Where a resolved version came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSource {
    Input,
    GoMod,
    GoWork,
    GoVersionFile,
    ToolVersions,
    Installed,
    Fallback,
}

impl VersionSource {
    /// Project files probed in order
    const FILE_PROBES: [Self; 4] = [Self::GoMod, Self::GoWork, Self::GoVersionFile, Self::ToolVersions];

    fn file_name(&self) -> Option<&'static str> {
        match self {
            Self::GoMod => Some("go.mod"),
            Self::GoWork => Some("go.work"),
            Self::GoVersionFile => Some(".go-version"),
            Self::ToolVersions => Some(".tool-versions"),
            _ => None,
        }
    }

    fn parse(&self, content: &str) -> Option<String> {
        match self {
            Self::GoMod | Self::GoWork => parse_go_directive(content),
            Self::GoVersionFile => parse_go_version_file(content),
            Self::ToolVersions => parse_tool_versions(content),
            _ => None,
        }
    }

    /// Read and parse this source's file in `project_dir`
    async fn probe(&self, project_dir: &Path) -> Option<String> {
        let path = project_dir.join(self.file_name()?);
        let content = fs::read_to_string(&path).await.ok()?;
        let version = self.parse(&content);
        if version.is_none() {
            debug!("{} has no usable Go version", path.display());
        }
        version
    }
}

impl fmt::Display for VersionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.file_name() {
            Some(name) => write!(f, "{name}"),
            None => match self {
                Self::Input => write!(f, "input"),
                Self::Installed => write!(f, "installed toolchain"),
                _ => write!(f, "default"),
            },
        }
    }
}

/// A resolved Go version and its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    pub version: String,
    pub source: VersionSource,
}

impl ResolvedVersion {
    fn new(version: impl Into<String>, source: VersionSource) -> Self {
        Self {
            version: version.into(),
            source,
        }
    }
}

/// Resolve the Go version for `project_dir`
pub async fn resolve_version(
    explicit: Option<&str>,
    project_dir: &Path,
    toolchain: &dyn Toolchain,
    fallback: &str,
) -> ResolvedVersion {
    if let Some(version) = explicit.map(str::trim).filter(|v| !v.is_empty()) {
        return ResolvedVersion::new(version, VersionSource::Input);
    }

    for source in VersionSource::FILE_PROBES {
        if let Some(version) = source.probe(project_dir).await {
            return ResolvedVersion::new(version, source);
        }
    }

    if let Some(version) = toolchain.installed_version().await {
        return ResolvedVersion::new(version, VersionSource::Installed);
    }

    ResolvedVersion::new(fallback, VersionSource::Fallback)
}

/// Version from a `go <version>` line of go.mod or go.work
pub fn parse_go_directive(content: &str) -> Option<String> {
    GO_DIRECTIVE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Version from a .go-version file (`1.23.4` or `go1.23.4`)
pub fn parse_go_version_file(content: &str) -> Option<String> {
    let trimmed = content.trim();
    let version = trimmed.strip_prefix("go").unwrap_or(trimmed);
    (!version.is_empty()).then(|| version.to_string())
}

/// Version from the first `golang <version>` line of .tool-versions
pub fn parse_tool_versions(content: &str) -> Option<String> {
    content
        .lines()
        .find(|line| line.starts_with(&format!("{TOOL_VERSIONS_NAME} ")))
        .and_then(|line| line.split_whitespace().nth(1))
        .map(ToString::to_string)
}

/// Leading `major.minor` of a version, or the input unchanged (`stable`)
pub fn major_minor(version: &str) -> &str {
    MAJOR_MINOR
        .find(version)
        .map_or(version, |m| m.as_str())
}

fn parse_major_minor(version: &str) -> Option<(u32, u32)> {
    let caps = MAJOR_MINOR.captures(version)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps.get(2)?.as_str().parse().ok()?;
    Some((major, minor))
}

/// Check the version supports GOCACHEPROG when the proxy is requested
pub fn validate_cacheprog(version: &str, requested: bool) -> GocacheResult<()> {
    if !requested {
        return Ok(());
    }

    let (min_major, min_minor) = CACHEPROG_MIN_VERSION;
    match parse_major_minor(version) {
        Some((major, minor)) if major > min_major || (major == min_major && minor >= min_minor) => {
            Ok(())
        }
        _ => Err(GocacheError::IncompatibleVersion {
            detected: version.to_string(),
            minimum: format!("{min_major}.{min_minor}"),
        }),
    }
}
