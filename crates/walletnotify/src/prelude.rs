//! Common imports for the engine crate and its adapters.

pub use walletnotify_types::error::{Error, WnResult};
pub use walletnotify_types::types::{AccountId, Timestamp};

pub use tracing::{debug, error, info, trace, warn};

// vim: ts=4
