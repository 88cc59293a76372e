//! Restore and save phase orchestration
//!
//! The two phases run as separate processes:
//! - restore: resolve, install and restore caches before the build
//! - save: persist the caches restore recorded after the build
//!
//! They never share memory. Restore leaves a versioned
//! [`SessionState`](crate::session::SessionState) in the job runner and save
//! reads it back.

mod restore;
mod save;

pub use restore::{Restore, RestorePhase, RestoreReport};
pub use save::{Save, SaveReport};

use crate::cache::CacheCli;
use crate::proxy::ProxyManager;
use crate::runner::JobRunner;
use crate::toolchain::Toolchain;

/// External collaborators of the restore phase
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub runner: &'a dyn JobRunner,
    pub cli: &'a dyn CacheCli,
    pub toolchain: &'a dyn Toolchain,
    pub proxy: &'a dyn ProxyManager,
}
