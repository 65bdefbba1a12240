//! In-memory implementations of the store and expirer adapters.
//!
//! Suitable for tests and for hosts that persist state through their own
//! platform storage and rehydrate the engine on startup. Values live in a
//! `HashMap` behind an async `RwLock`; lifecycle events are fanned out over
//! broadcast channels.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use walletnotify::expirer_adapter::{Expiration, ExpirerAdapter};
use walletnotify::prelude::*;
use walletnotify::store_adapter::{StoreAdapter, StoreEvent, StoreEventKind};

/// Broadcast buffer for store and expirer events
const DEFAULT_EVENT_CAPACITY: usize = 128;

/// In-memory key-value store
pub struct StoreAdapterMem<T> {
	name: Box<str>,
	items: RwLock<HashMap<Box<str>, T>>,
	events: broadcast::Sender<StoreEvent>,
}

impl<T> StoreAdapterMem<T> {
	/// `name` identifies the store in logs (e.g. "subscriptions")
	pub fn new(name: impl Into<Box<str>>) -> Self {
		let (events, _rx) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
		Self { name: name.into(), items: RwLock::new(HashMap::new()), events }
	}

	fn emit(&self, kind: StoreEventKind, key: &str) {
		let _ignore = self.events.send(StoreEvent { kind, key: key.into() });
	}
}

#[async_trait]
impl<T> StoreAdapter<T> for StoreAdapterMem<T>
where
	T: Clone + Send + Sync + 'static,
{
	async fn get(&self, key: &str) -> WnResult<Option<T>> {
		Ok(self.items.read().await.get(key).cloned())
	}

	async fn set(&self, key: &str, value: T) -> WnResult<()> {
		let existed = self.items.write().await.insert(key.into(), value).is_some();
		self.emit(if existed { StoreEventKind::Update } else { StoreEventKind::Set }, key);
		Ok(())
	}

	async fn update(&self, key: &str, value: T) -> WnResult<()> {
		let mut items = self.items.write().await;
		if !items.contains_key(key) {
			return Err(Error::StoreFailure(format!(
				"{}: update of unknown key {}",
				self.name, key
			)));
		}
		items.insert(key.into(), value);
		drop(items);
		self.emit(StoreEventKind::Update, key);
		Ok(())
	}

	async fn delete(&self, key: &str, reason: &str) -> WnResult<()> {
		if self.items.write().await.remove(key).is_some() {
			debug!("{}: deleted {} ({})", self.name, key, reason);
			self.emit(StoreEventKind::Delete, key);
		}
		Ok(())
	}

	async fn keys(&self) -> Vec<Box<str>> {
		self.items.read().await.keys().cloned().collect()
	}

	async fn get_all(&self) -> Vec<T> {
		self.items.read().await.values().cloned().collect()
	}

	fn events(&self) -> broadcast::Receiver<StoreEvent> {
		self.events.subscribe()
	}
}

impl<T> std::fmt::Debug for StoreAdapterMem<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("StoreAdapterMem").field("name", &self.name).finish_non_exhaustive()
	}
}

/// In-memory expirer backed by tokio timers.
///
/// Each `set` arms a timer; a target re-armed with a new expiry invalidates
/// the old timer. Firings are delivered over a broadcast channel.
pub struct ExpirerAdapterMem {
	entries: Arc<RwLock<HashMap<Box<str>, Timestamp>>>,
	events: broadcast::Sender<Expiration>,
}

impl ExpirerAdapterMem {
	pub fn new() -> Self {
		let (events, _rx) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
		Self { entries: Arc::new(RwLock::new(HashMap::new())), events }
	}

	/// Force a target to expire immediately, regardless of its deadline
	pub async fn expire_now(&self, target: &str) {
		if let Some(expiry) = self.entries.write().await.remove(target) {
			let _ignore = self.events.send(Expiration { target: target.into(), expiry });
		}
	}
}

impl Default for ExpirerAdapterMem {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl ExpirerAdapter for ExpirerAdapterMem {
	async fn set(&self, target: &str, expiry: Timestamp) -> WnResult<()> {
		self.entries.write().await.insert(target.into(), expiry);

		let entries = Arc::clone(&self.entries);
		let events = self.events.clone();
		let target: Box<str> = target.into();
		tokio::spawn(async move {
			let delay = (expiry.0 - Timestamp::now().0).max(0) as u64;
			tokio::time::sleep(std::time::Duration::from_secs(delay)).await;

			// Only fire if this deadline is still the current one
			let mut entries = entries.write().await;
			if entries.get(&target) == Some(&expiry) {
				entries.remove(&target);
				drop(entries);
				let _ignore = events.send(Expiration { target, expiry });
			}
		});
		Ok(())
	}

	async fn del(&self, target: &str) -> WnResult<()> {
		self.entries.write().await.remove(target);
		Ok(())
	}

	fn expirations(&self) -> broadcast::Receiver<Expiration> {
		self.events.subscribe()
	}
}

impl std::fmt::Debug for ExpirerAdapterMem {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("ExpirerAdapterMem").finish_non_exhaustive()
	}
}


// vim: ts=4
