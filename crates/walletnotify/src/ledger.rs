//! Request ledger: correlates outgoing request ids with their response
//! context and doubles as the history used to look up the method of an
//! inbound response.
//!
//! Every entry is written before the request hits the wire, and is removed
//! exactly once: by the response path or by the expirer, never both.

use std::sync::Arc;

use walletnotify_types::expirer_adapter::{id_target, parse_id_target, ExpirerAdapter};
use walletnotify_types::store_adapter::StoreAdapter;
use walletnotify_types::types::PendingRequest;

use crate::prelude::*;

pub(crate) struct RequestLedger {
	requests: Arc<dyn StoreAdapter<PendingRequest>>,
	expirer: Arc<dyn ExpirerAdapter>,
}

impl RequestLedger {
	pub fn new(
		requests: Arc<dyn StoreAdapter<PendingRequest>>,
		expirer: Arc<dyn ExpirerAdapter>,
	) -> Self {
		Self { requests, expirer }
	}

	/// Record an outbound request and register its expiry. Must complete
	/// before the request is published.
	pub async fn insert(&self, request: PendingRequest, ttl: i64) -> WnResult<()> {
		let target = id_target(request.id);
		debug!("ledger insert: id={} method={}", request.id, request.method);
		self.requests.set(&request.id.to_string(), request).await?;
		self.expirer.set(&target, Timestamp::now().add_seconds(ttl)).await?;
		Ok(())
	}

	/// Remove and return the entry for a response. Returns `None` when the
	/// id is unknown (already expired, or never ours).
	pub async fn take(&self, id: u64) -> WnResult<Option<PendingRequest>> {
		let key = id.to_string();
		let Some(pending) = self.requests.get(&key).await? else {
			return Ok(None);
		};
		self.requests.delete(&key, "responded").await?;
		self.expirer.del(&id_target(id)).await?;
		Ok(Some(pending))
	}

	/// Drop the entry for an expired target, returning its request id if one
	/// was still pending
	pub async fn expire_target(&self, target: &str) -> WnResult<Option<u64>> {
		let Some(id) = parse_id_target(target) else {
			return Ok(None);
		};
		let key = id.to_string();
		if self.requests.get(&key).await?.is_none() {
			return Ok(None);
		}
		self.requests.delete(&key, "expired").await?;
		Ok(Some(id))
	}
}

impl std::fmt::Debug for RequestLedger {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("RequestLedger").finish_non_exhaustive()
	}
}

// vim: ts=4
