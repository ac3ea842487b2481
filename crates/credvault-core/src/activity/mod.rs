//! Append-only audit trail of credential operations

mod log;
mod types;

pub use log::{ActivityLog, DEFAULT_LOG_CAPACITY};
pub use types::{ActivityAction, ActivityEntry, Actor};
