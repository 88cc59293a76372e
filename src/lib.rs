//! gocache - Go toolchain and cache steps for CI jobs
//!
//! Resolves and installs the Go toolchain, restores the toolchain, module
//! and build caches from a remote cache before a build, and saves them
//! afterwards. The build cache can alternatively be served live through a
//! GOCACHEPROG proxy.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod orchestration;
pub mod proxy;
pub mod runner;
pub mod session;
pub mod toolchain;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{GocacheError, GocacheResult};
