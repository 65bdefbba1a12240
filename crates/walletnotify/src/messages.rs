//! Per-subscription message records.

use std::collections::HashMap;
use std::sync::Arc;

use walletnotify_types::store_adapter::StoreAdapter;
use walletnotify_types::types::{MessageRecord, TopicMessages};

use crate::prelude::*;

pub(crate) struct Messages {
	store: Arc<dyn StoreAdapter<TopicMessages>>,
}

impl Messages {
	pub fn new(store: Arc<dyn StoreAdapter<TopicMessages>>) -> Self {
		Self { store }
	}

	/// Make sure a record exists for a topic. Tolerates archived messages
	/// arriving before the subscription itself has synced.
	pub async fn ensure(&self, topic: &str) -> WnResult<()> {
		if self.store.get(topic).await?.is_none() {
			self.store.set(topic, TopicMessages::new(topic)).await?;
		}
		Ok(())
	}

	/// Append a message under its request id. Redeliveries overwrite the
	/// prior record under the same id.
	pub async fn append(&self, topic: &str, record: MessageRecord) -> WnResult<()> {
		let mut messages =
			self.store.get(topic).await?.unwrap_or_else(|| TopicMessages::new(topic));
		messages.messages.insert(record.id, record);
		self.store.set(topic, messages).await
	}

	pub async fn history(&self, topic: &str) -> WnResult<HashMap<u64, MessageRecord>> {
		self.store
			.get(topic)
			.await?
			.map(|messages| messages.messages)
			.ok_or_else(|| Error::UnknownSubscription(topic.into()))
	}

	/// Remove one message by id, wherever it is stored
	pub async fn delete_message(&self, id: u64) -> WnResult<()> {
		for topic in self.store.keys().await {
			if let Some(mut messages) = self.store.get(&topic).await? {
				if messages.messages.remove(&id).is_some() {
					self.store.set(&topic, messages).await?;
					return Ok(());
				}
			}
		}
		debug!("delete_message: id {} not found in any topic", id);
		Ok(())
	}

	pub async fn delete_topic(&self, topic: &str, reason: &str) -> WnResult<()> {
		self.store.delete(topic, reason).await
	}
}

impl std::fmt::Debug for Messages {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("Messages").finish_non_exhaustive()
	}
}

// vim: ts=4
