//! GOCACHEPROG cache registry proxy
//!
//! In protocol mode the Go build cache is not restored as a directory
//! snapshot. Instead a local `cache-registry` proxy is started during
//! restore, `GOCACHEPROG` points the go command at it, and save stops it.
//!
//! The proxy outlives the restore process. The only thing that crosses the
//! phase boundary is its [`ProxyHandle`] (pid and port) in session state.

mod registry;

pub use registry::RegistryProxy;

use crate::error::GocacheResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable the go command reads its cache program from
pub const CACHEPROG_ENV: &str = "GOCACHEPROG";

/// The proxy only ever listens on loopback
pub const PROXY_HOST: &str = "127.0.0.1";

/// A running proxy process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyHandle {
    pub pid: u32,
    pub port: u16,
}

/// Command line the go command runs as its cache program
pub fn cacheprog_command(cli_binary: &str, port: u16) -> String {
    format!("{cli_binary} go-cacheprog --endpoint http://{PROXY_HOST}:{port}")
}

/// Lifecycle of the background cache proxy
#[async_trait]
pub trait ProxyManager: Send + Sync {
    /// Find a free loopback port for the proxy
    async fn allocate_port(&self) -> GocacheResult<u16>;

    /// Launch the proxy for one workspace/tag in the background
    async fn start(&self, workspace: &str, tag: &str, port: u16) -> GocacheResult<ProxyHandle>;

    /// Wait until the proxy accepts connections
    async fn await_ready(&self, handle: &ProxyHandle, timeout: Duration) -> GocacheResult<()>;

    /// Terminate the proxy; a process that is already gone is not an error
    async fn stop(&self, pid: u32) -> GocacheResult<()>;
}
