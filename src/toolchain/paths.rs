//! Platform-specific Go and mise directories

use std::path::{Path, PathBuf};

/// Local directories backing each cache category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePaths {
    /// mise data directory (holds installed Go toolchains)
    pub toolchain: PathBuf,
    /// Go module download cache
    pub modules: PathBuf,
    /// Go build cache
    pub build: PathBuf,
}

impl CachePaths {
    /// Detect paths from the current process environment
    pub fn detect() -> Self {
        let home = home_dir();
        let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self::resolve(&env, &home, std::env::consts::OS)
    }

    /// Resolve paths from an environment lookup, home directory and OS name
    pub fn resolve(env: &dyn Fn(&str) -> Option<String>, home: &Path, os: &str) -> Self {
        Self {
            toolchain: mise_data_dir(env, home, os),
            modules: go_mod_cache(env, home),
            build: go_build_cache(env, home, os),
        }
    }
}

/// User home directory
pub fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// `GOPATH`, defaulting to `~/go`
pub fn gopath(env: &dyn Fn(&str) -> Option<String>, home: &Path) -> PathBuf {
    env("GOPATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| home.join("go"))
}

/// `GOMODCACHE`, defaulting to `$GOPATH/pkg/mod`
pub fn go_mod_cache(env: &dyn Fn(&str) -> Option<String>, home: &Path) -> PathBuf {
    env("GOMODCACHE")
        .map(PathBuf::from)
        .unwrap_or_else(|| gopath(env, home).join("pkg").join("mod"))
}

/// `GOCACHE`, defaulting to the same per-OS location `go env GOCACHE` uses
pub fn go_build_cache(env: &dyn Fn(&str) -> Option<String>, home: &Path, os: &str) -> PathBuf {
    if let Some(dir) = env("GOCACHE") {
        return PathBuf::from(dir);
    }

    match os {
        "macos" => home.join("Library").join("Caches").join("go-build"),
        "windows" => local_app_data(env, home).join("go-build"),
        _ => home.join(".cache").join("go-build"),
    }
}

/// Directory mise keeps installed tools in
pub fn mise_data_dir(env: &dyn Fn(&str) -> Option<String>, home: &Path, os: &str) -> PathBuf {
    match os {
        "windows" => local_app_data(env, home).join("mise"),
        _ => home.join(".local").join("share").join("mise"),
    }
}

/// Default location of the mise binary
pub fn mise_bin(home: &Path, os: &str) -> PathBuf {
    let name = if os == "windows" { "mise.exe" } else { "mise" };
    home.join(".local").join("bin").join(name)
}

fn local_app_data(env: &dyn Fn(&str) -> Option<String>, home: &Path) -> PathBuf {
    env("LOCALAPPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(|| home.join("AppData").join("Local"))
}
