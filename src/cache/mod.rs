//! Remote cache entries: naming, execution and classification
//!
//! Each cache category (toolchain, modules, build) maps to one tagged entry
//! in the remote cache workspace. Entries are restored before the build and
//! saved after it by invoking the cache CLI.
//!
//! # Categories
//!
//! | Category  | Local path          | Restored when              |
//! |-----------|---------------------|----------------------------|
//! | toolchain | mise data dir       | `cache-go` is on           |
//! | modules   | `GOMODCACHE`        | `cache-modules` is on      |
//! | build     | `GOCACHE`           | `cache-build` is on and the GOCACHEPROG proxy is off |

pub mod classify;
pub mod executor;
pub mod tags;

pub use classify::classify;
pub use executor::{invoke, BoringCacheCli, CacheCli, CacheInvocation, CacheOperation, CacheOutcome};
pub use tags::{resolve_workspace, tag_prefix, toolchain_tag, CacheTags, CATEGORY};
