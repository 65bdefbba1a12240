//! Inbound protocol handlers, one per method.
//!
//! Every handler runs as a spawned task (the dispatcher does not serialize
//! handlers across inbound messages); response handlers additionally run
//! only after the dispatcher has freed the matching ledger entry.

use serde_json::json;

use walletnotify_types::relay_adapter::PublishOptions;
use walletnotify_types::types::{MessageRecord, PendingRequest};

use crate::auth::{self, act, AppClaims, BaseClaims, MessageClaims, SubscriptionsListClaims};
use crate::engine::EngineInner;
use crate::event::NotifyEvent;
use crate::prelude::*;
use crate::rpc::{
	DeleteParams, MessageParams, NotifyMethod, ResponseAuth, RpcResponse,
	SubscriptionsChangedParams,
};

/// Handle the response to an outbound `wc_notifySubscribe`. The authoritative
/// subscription body arrives later via the reconciler.
pub(crate) async fn on_subscribe_response(
	inner: &EngineInner,
	pending: PendingRequest,
	response: RpcResponse,
) {
	let error = response.error.map(|err| err.message);
	if let Some(ref message) = error {
		warn!("subscribe rejected on {}: {}", pending.topic, message);
	}
	inner.events.emit(NotifyEvent::Subscription { id: response.id, error });
}

/// Handle the response to an outbound `wc_notifyUpdate`. The actual scope
/// change surfaces via reconciliation.
pub(crate) async fn on_update_response(
	inner: &EngineInner,
	pending: PendingRequest,
	response: RpcResponse,
) {
	let error = response.error.map(|err| err.message);
	if let Some(ref message) = error {
		warn!("update rejected on {}: {}", pending.topic, message);
	}
	inner.events.emit(NotifyEvent::Update { id: response.id, topic: pending.topic, error });
}

/// Handle an inbound `wc_notifyMessage`: validate, store, acknowledge, emit.
/// The response is published before the event is emitted.
pub(crate) async fn on_message_request(
	inner: &EngineInner,
	topic: &str,
	id: u64,
	params: MessageParams,
) {
	let claims = match auth::validate::<MessageClaims>(&params.message_auth, act::NOTIFY_MESSAGE)
	{
		Ok(claims) => claims,
		Err(err) => {
			warn!("invalid message auth on {}: {}", topic, err);
			send_error(inner, topic, id, NotifyMethod::Message, &err).await;
			return;
		}
	};

	let record = MessageRecord {
		id,
		topic: topic.into(),
		message: claims.msg.clone(),
		published_at: Timestamp(claims.base.iat).millis(),
	};
	let stored = async {
		// Archived messages can arrive before the subscription has synced
		inner.messages.ensure(topic).await?;
		inner.messages.append(topic, record).await
	};
	if let Err(err) = stored.await {
		warn!("failed to store message {} on {}: {}", id, topic, err);
		send_error(inner, topic, id, NotifyMethod::Message, &err).await;
		return;
	}

	let response_auth = match build_message_response(inner, topic, &claims).await {
		Ok(jws) => jws,
		Err(err) => {
			warn!("failed to build message response on {}: {}", topic, err);
			send_error(inner, topic, id, NotifyMethod::Message, &err).await;
			return;
		}
	};
	let response = RpcResponse::result(id, json!({ "responseAuth": response_auth }));
	if let Err(err) = publish_response(inner, topic, &response, NotifyMethod::Message).await {
		warn!("failed to acknowledge message {} on {}: {}", id, topic, err);
		return;
	}

	inner.events.emit(NotifyEvent::Message { id, topic: topic.into(), message: claims.msg });
}

/// Handle an inbound `wc_notifyDelete`. Local cleanup is driven by the
/// subsequent `subscriptions_changed`, not by this handler.
pub(crate) async fn on_delete_request(
	inner: &EngineInner,
	topic: &str,
	id: u64,
	params: DeleteParams,
) {
	if let Err(err) = auth::validate::<AppClaims>(&params.delete_auth, act::NOTIFY_DELETE) {
		warn!("invalid delete auth on {}: {}", topic, err);
		send_error(inner, topic, id, NotifyMethod::Delete, &err).await;
		return;
	}
	inner.events.emit(NotifyEvent::Delete { id, topic: topic.into() });
}

/// Handle an inbound `wc_notifySubscriptionsChanged` notification.
/// Fire-and-forget: no result is published on success.
pub(crate) async fn on_subscriptions_changed_request(
	inner: &EngineInner,
	topic: &str,
	id: u64,
	params: SubscriptionsChangedParams,
) {
	let claims = match auth::validate::<SubscriptionsListClaims>(
		&params.subscriptions_changed_auth,
		act::NOTIFY_SUBSCRIPTIONS_CHANGED,
	) {
		Ok(claims) => claims,
		Err(err) => {
			warn!("invalid subscriptions_changed auth on {}: {}", topic, err);
			send_error(inner, topic, id, NotifyMethod::SubscriptionsChanged, &err).await;
			return;
		}
	};

	apply_subscriptions_list(inner, &claims).await;
}

/// Handle the response to an outbound `wc_notifyWatchSubscriptions`
pub(crate) async fn on_watch_subscriptions_response(
	inner: &EngineInner,
	pending: PendingRequest,
	response: RpcResponse,
) {
	if let Some(err) = response.error {
		warn!("watch subscriptions rejected for {}: {}", pending.request.account, err.message);
		return;
	}
	let Some(result) = response.result else {
		warn!("watch subscriptions response without result for {}", pending.request.account);
		return;
	};
	let result_auth: ResponseAuth = match serde_json::from_value(result) {
		Ok(result_auth) => result_auth,
		Err(err) => {
			warn!("malformed watch subscriptions result: {}", err);
			return;
		}
	};
	let claims = match auth::validate::<SubscriptionsListClaims>(
		&result_auth.response_auth,
		act::NOTIFY_WATCH_SUBSCRIPTIONS_RESPONSE,
	) {
		Ok(claims) => claims,
		Err(err) => {
			warn!("invalid watch subscriptions response auth: {}", err);
			return;
		}
	};

	apply_subscriptions_list(inner, &claims).await;
}

/// Reconcile a validated `sbs[]` claim set and surface the resulting local
/// state
async fn apply_subscriptions_list(inner: &EngineInner, claims: &SubscriptionsListClaims) {
	let account = match auth::account_from_did_pkh(&claims.base.sub) {
		Ok(account) => account,
		Err(err) => {
			warn!("subscriptions list without a did:pkh subject: {}", err);
			return;
		}
	};

	if let Err(err) = crate::reconciler::reconcile(inner, &account, &claims.sbs).await {
		warn!("reconciliation failed for {}: {}", account, err);
	}

	let subscriptions = inner.subscriptions.all().await;
	inner.events.emit(NotifyEvent::SubscriptionsChanged { subscriptions });
}

/// Sign the `notify_message_response` acknowledgement for an ingested message
async fn build_message_response(
	inner: &EngineInner,
	topic: &str,
	claims: &MessageClaims,
) -> WnResult<Box<str>> {
	let account = auth::account_from_did_pkh(&claims.base.sub)?;
	let identity_key = inner.identity.identity_key(&account).await?;

	let app = match &claims.app {
		Some(app) => app.clone(),
		None => {
			let subscription = inner.subscriptions.get(topic).await?;
			auth::did_web(&subscription.metadata.app_domain).into()
		}
	};

	let response = AppClaims {
		base: BaseClaims::new(
			act::NOTIFY_MESSAGE_RESPONSE,
			&identity_key,
			claims.base.iss.clone(),
			&account,
			&inner.keyserver_url,
		)?,
		app,
	};
	inner.identity.sign_claims(&account, serde_json::to_value(&response)?).await
}

/// Publish a type-0 response on a topic with the method's response tag
pub(crate) async fn publish_response(
	inner: &EngineInner,
	topic: &str,
	response: &RpcResponse,
	method: NotifyMethod,
) -> WnResult<()> {
	let bytes = inner.codec.encode_response(topic, response).await?;
	inner
		.relay
		.publish(
			topic,
			&bytes,
			&PublishOptions { ttl: method.res_ttl(), tag: method.res_tag(), prompt: false },
		)
		.await
}

/// Best-effort protocol-level error reply
pub(crate) async fn send_error(
	inner: &EngineInner,
	topic: &str,
	id: u64,
	method: NotifyMethod,
	error: &Error,
) {
	let response = RpcResponse::error(id, error.to_string());
	if let Err(err) = publish_response(inner, topic, &response, method).await {
		warn!("failed to send error reply on {}: {}", topic, err);
	}
}

// vim: ts=4
