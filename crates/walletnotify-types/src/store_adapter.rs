//! Adapter for the persistent key-value stores.
//!
//! The engine owns three stores (subscriptions, messages, pending requests),
//! all sharing one generic interface. Store operations are atomic per key;
//! lifecycle events are delivered through a broadcast stream.

use async_trait::async_trait;
use std::fmt::Debug;
use tokio::sync::broadcast;

use crate::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreEventKind {
	Set,
	Update,
	Delete,
	Sync,
}

/// Store lifecycle event
#[derive(Clone, Debug)]
pub struct StoreEvent {
	pub kind: StoreEventKind,
	pub key: Box<str>,
}

#[async_trait]
pub trait StoreAdapter<T>: Debug + Send + Sync
where
	T: Clone + Send + Sync + 'static,
{
	async fn get(&self, key: &str) -> WnResult<Option<T>>;

	/// Insert or overwrite a value
	async fn set(&self, key: &str, value: T) -> WnResult<()>;

	/// Overwrite an existing value; fails with `StoreFailure` for unknown keys
	async fn update(&self, key: &str, value: T) -> WnResult<()>;

	/// Remove a value. `reason` is recorded for diagnostics; deleting an
	/// absent key is not an error.
	async fn delete(&self, key: &str, reason: &str) -> WnResult<()>;

	async fn keys(&self) -> Vec<Box<str>>;

	async fn get_all(&self) -> Vec<T>;

	fn events(&self) -> broadcast::Receiver<StoreEvent>;
}

// vim: ts=4
