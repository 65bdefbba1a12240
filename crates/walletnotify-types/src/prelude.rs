//! Common imports for Walletnotify crates.

pub use crate::error::{Error, WnResult};
pub use crate::types::{AccountId, Timestamp};

pub use tracing::{debug, error, info, trace, warn};

// vim: ts=4
