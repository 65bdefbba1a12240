//! Local mirror of active subscriptions, keyed by derived topic.

use std::collections::HashMap;
use std::sync::Arc;

use walletnotify_types::store_adapter::StoreAdapter;
use walletnotify_types::types::Subscription;

use crate::prelude::*;

pub(crate) struct Subscriptions {
	store: Arc<dyn StoreAdapter<Subscription>>,
}

impl Subscriptions {
	pub fn new(store: Arc<dyn StoreAdapter<Subscription>>) -> Self {
		Self { store }
	}

	pub async fn find(&self, topic: &str) -> WnResult<Option<Subscription>> {
		self.store.get(topic).await
	}

	/// Like [`find`], but an absent topic is an error
	pub async fn get(&self, topic: &str) -> WnResult<Subscription> {
		self.find(topic).await?.ok_or_else(|| Error::UnknownSubscription(topic.into()))
	}

	pub async fn upsert(&self, subscription: Subscription) -> WnResult<()> {
		self.store.set(&subscription.topic.clone(), subscription).await
	}

	pub async fn delete(&self, topic: &str, reason: &str) -> WnResult<()> {
		self.store.delete(topic, reason).await
	}

	pub async fn all(&self) -> Vec<Subscription> {
		self.store.get_all().await
	}

	/// All subscriptions, optionally filtered by account, keyed by topic
	pub async fn for_account(
		&self,
		account: Option<&AccountId>,
	) -> HashMap<Box<str>, Subscription> {
		self.store
			.get_all()
			.await
			.into_iter()
			.filter(|sub| account.is_none_or(|account| &sub.account == account))
			.map(|sub| (sub.topic.clone(), sub))
			.collect()
	}
}

impl std::fmt::Debug for Subscriptions {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("Subscriptions").finish_non_exhaustive()
	}
}

// vim: ts=4
