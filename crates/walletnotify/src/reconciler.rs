//! Reconciliation of local subscription state against the server's
//! authoritative `sbs[]` list.
//!
//! Cleanup of dropped subscriptions runs first and serialized, so a
//! subscription that "moves" between entries can never race a fresh
//! subscribe. Applying the server list then proceeds concurrently across
//! subscriptions; a single failing entry is logged and never aborts the
//! batch.

use futures::future::join_all;
use std::collections::HashMap;

use walletnotify_types::types::{
	DappMetadata, RelayProtocol, ScopeSetting, ServerSubscription, Subscription,
};

use crate::engine::EngineInner;
use crate::prelude::*;
use crate::topic;

/// Apply a validated server subscription list for one account.
///
/// Post-condition: the set of local subscription topics owned by `account`
/// equals `{SHA256(sb.sym_key) | sb ∈ sbs}`.
pub(crate) async fn reconcile(
	inner: &EngineInner,
	account: &AccountId,
	sbs: &[ServerSubscription],
) -> WnResult<()> {
	let mut server_topics: HashMap<Box<str>, &ServerSubscription> = HashMap::new();
	for sb in sbs {
		match topic::subscription_topic(&sb.sym_key) {
			Ok(topic) => {
				server_topics.insert(topic, sb);
			}
			Err(err) => {
				warn!("skipping server subscription with bad sym key: {}", err);
			}
		}
	}

	let local: Vec<Subscription> = inner
		.subscriptions
		.all()
		.await
		.into_iter()
		.filter(|sub| &sub.account == account)
		.collect();
	let local_topics: Vec<Box<str>> = local.iter().map(|sub| sub.topic.clone()).collect();

	// Dropped subscriptions first, one at a time
	for sub in &local {
		if !server_topics.contains_key(&sub.topic) {
			cleanup_subscription(inner, &sub.topic).await;
		}
	}

	// Then upsert the server list concurrently
	let entries: Vec<(Box<str>, &ServerSubscription)> = server_topics.into_iter().collect();
	let results = join_all(entries.iter().map(|(topic, sb)| {
		let is_new = !local_topics.contains(topic);
		apply_subscription(inner, topic, sb, is_new)
	}))
	.await;

	for ((topic, _), result) in entries.iter().zip(results) {
		if let Err(err) = result {
			warn!("failed to apply subscription for topic {}: {}", topic, err);
		}
	}

	Ok(())
}

/// Tear down one subscription: unsubscribe the relay first (so the sym key is
/// still present for any in-flight decrypt), then drop the record, its
/// messages, and the key chain entry concurrently.
pub(crate) async fn cleanup_subscription(inner: &EngineInner, topic: &str) {
	debug!("cleaning up subscription on {}", topic);
	if let Err(err) = inner.relay.unsubscribe(topic).await {
		warn!("relay unsubscribe failed for {}: {}", topic, err);
	}

	let (subscription, messages, sym_key) = futures::join!(
		inner.subscriptions.delete(topic, "reconciled away"),
		inner.messages.delete_topic(topic, "reconciled away"),
		inner.crypto.delete_sym_key(topic),
	);
	for result in [subscription, messages, sym_key] {
		if let Err(err) = result {
			warn!("cleanup failed for {}: {}", topic, err);
		}
	}
}

/// Upsert one server subscription; for new topics, also install the sym key,
/// the message record, and the relay subscription.
async fn apply_subscription(
	inner: &EngineInner,
	topic: &str,
	sb: &ServerSubscription,
	is_new: bool,
) -> WnResult<()> {
	let config = inner.resolver.resolve_notify_config(&sb.app_domain).await?;

	// Scope map: every declared type, enabled iff the server lists it
	let scope: HashMap<Box<str>, ScopeSetting> = config
		.types
		.iter()
		.map(|declared| {
			(
				declared.name.clone(),
				ScopeSetting {
					description: declared.description.clone(),
					enabled: sb.scope.contains(&declared.name),
				},
			)
		})
		.collect();

	if is_new {
		inner.crypto.set_sym_key(&sb.sym_key, topic).await?;
		inner.messages.ensure(topic).await?;
		inner.relay.subscribe(topic).await?;
	}

	inner
		.subscriptions
		.upsert(Subscription {
			topic: topic.into(),
			account: sb.account.clone(),
			expiry: sb.expiry,
			sym_key: sb.sym_key.clone(),
			scope,
			metadata: DappMetadata {
				name: config.name,
				description: config.description,
				icons: config.icons,
				app_domain: sb.app_domain.clone(),
			},
			relay: RelayProtocol::default(),
		})
		.await
}

// vim: ts=4
