//! Session state crossing the restore/save process boundary

pub mod state;

pub use state::{bool_str, keys, SessionRecorder, SessionState, STATE_VERSION};
