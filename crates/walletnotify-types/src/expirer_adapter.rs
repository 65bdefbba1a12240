//! Adapter for the expiry timer service.
//!
//! The expirer is the engine's sole cancellation source: pending requests are
//! registered here and their eventual expirations arrive through a broadcast
//! stream. Targets are formatted strings so request ids and topics share one
//! namespace.

use async_trait::async_trait;
use std::fmt::Debug;
use tokio::sync::broadcast;

use crate::prelude::*;

/// An expiry firing
#[derive(Clone, Debug)]
pub struct Expiration {
	pub target: Box<str>,
	pub expiry: Timestamp,
}

/// Target for a JSON-RPC request id
pub fn id_target(id: u64) -> String {
	format!("id:{}", id)
}

/// Target for a relay topic
pub fn topic_target(topic: &str) -> String {
	format!("topic:{}", topic)
}

/// Parse an `id:` target back into a request id
pub fn parse_id_target(target: &str) -> Option<u64> {
	target.strip_prefix("id:").and_then(|id| id.parse().ok())
}

#[async_trait]
pub trait ExpirerAdapter: Debug + Send + Sync {
	/// Register (or move) an expiry for a target
	async fn set(&self, target: &str, expiry: Timestamp) -> WnResult<()>;

	/// Drop a pending expiry; absent targets are not an error
	async fn del(&self, target: &str) -> WnResult<()>;

	fn expirations(&self) -> broadcast::Receiver<Expiration>;
}


// vim: ts=4
