//! Credential records, format rules and the store that owns them

mod format;
mod mask;
mod store;
mod types;

pub use format::{infer_key_type, validate_secret, FormatRule};
pub use mask::{mask_secret, MASK_TOKEN};
pub use store::{CredentialStore, LoadReport};
pub use types::*;
