//! Adapter for the pub/sub relay transport.
//!
//! The relay is an external collaborator: a topic-indexed publish/subscribe
//! channel carrying opaque encrypted payloads. Inbound traffic is delivered
//! through a broadcast stream so the engine's dispatcher and tests can both
//! observe it.

use async_trait::async_trait;
use std::fmt::Debug;
use tokio::sync::broadcast;

use crate::prelude::*;

/// An inbound relay delivery
#[derive(Clone, Debug)]
pub struct RelayMessage {
	pub topic: Box<str>,
	pub message: Vec<u8>,
	/// Relay-side publication time in milliseconds
	pub published_at: i64,
}

/// Per-publish routing parameters. Tag numbers are part of the paired relay's
/// contract and must round-trip bit-exactly.
#[derive(Clone, Copy, Debug)]
pub struct PublishOptions {
	/// Relay-side retention in seconds
	pub ttl: i64,
	pub tag: u32,
	/// Whether the relay should wake the recipient through its push gateway
	pub prompt: bool,
}

#[async_trait]
pub trait RelayAdapter: Debug + Send + Sync {
	async fn publish(&self, topic: &str, message: &[u8], opts: &PublishOptions) -> WnResult<()>;

	async fn subscribe(&self, topic: &str) -> WnResult<()>;

	async fn unsubscribe(&self, topic: &str) -> WnResult<()>;

	/// Stream of inbound messages for all subscribed topics
	fn messages(&self) -> broadcast::Receiver<RelayMessage>;
}

// vim: ts=4
