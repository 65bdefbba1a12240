//! Inbound dispatch: relay deliveries and expirer firings.
//!
//! A single listener decodes each envelope and routes requests by their
//! method and responses by the ledgered request method. Every handler is
//! spawned: the loop never awaits one handler before dispatching the next
//! delivery, so traffic on distinct topics proceeds concurrently. A response
//! handler still only runs after its ledger entry has been freed (the take
//! happens inline, before the spawn).

use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use walletnotify_types::relay_adapter::RelayMessage;

use crate::engine::EngineInner;
use crate::event::NotifyEvent;
use crate::handler;
use crate::prelude::*;
use crate::rpc::{NotifyMethod, RequestParams, RpcPayload, RpcRequest, RpcResponse};

/// Spawn the relay message loop
pub(crate) fn spawn_message_loop(inner: Arc<EngineInner>) -> JoinHandle<()> {
	let mut messages = inner.relay.messages();
	tokio::spawn(async move {
		loop {
			match messages.recv().await {
				Ok(message) => dispatch(&inner, message).await,
				Err(RecvError::Lagged(count)) => {
					warn!("relay stream lagged, {} messages dropped", count);
				}
				Err(RecvError::Closed) => break,
			}
		}
		debug!("relay message loop stopped");
	})
}

/// Spawn the expirer loop: expired ledger entries become `RequestExpire`
/// events
pub(crate) fn spawn_expiry_loop(inner: Arc<EngineInner>) -> JoinHandle<()> {
	let mut expirations = inner.expirer.expirations();
	tokio::spawn(async move {
		loop {
			match expirations.recv().await {
				Ok(expiration) => match inner.ledger.expire_target(&expiration.target).await {
					Ok(Some(id)) => {
						debug!("request {} expired", id);
						inner.events.emit(NotifyEvent::RequestExpire { id });
					}
					Ok(None) => {}
					Err(err) => warn!("failed to expire {}: {}", expiration.target, err),
				},
				Err(RecvError::Lagged(count)) => {
					warn!("expirer stream lagged, {} expirations dropped", count);
				}
				Err(RecvError::Closed) => break,
			}
		}
		debug!("expiry loop stopped");
	})
}

async fn dispatch(inner: &Arc<EngineInner>, message: RelayMessage) {
	let payload = match inner.codec.decode(&message.topic, &message.message).await {
		Ok(payload) => payload,
		Err(err) => {
			debug!("undecodable relay message on {}: {}", message.topic, err);
			return;
		}
	};

	match payload {
		RpcPayload::Request(request) => dispatch_request(inner, message.topic, request),
		RpcPayload::Response(response) => dispatch_response(inner, message.topic, response).await,
	}
}

fn dispatch_request(inner: &Arc<EngineInner>, topic: Box<str>, request: RpcRequest) {
	let id = request.id;
	let inner = Arc::clone(inner);
	tokio::spawn(async move {
		match request.params {
			RequestParams::Message(params) => {
				handler::on_message_request(&inner, &topic, id, params).await;
			}
			RequestParams::Delete(params) => {
				handler::on_delete_request(&inner, &topic, id, params).await;
			}
			RequestParams::SubscriptionsChanged(params) => {
				handler::on_subscriptions_changed_request(&inner, &topic, id, params).await;
			}
			// The wallet never receives these; it only sends them
			other => {
				debug!("ignoring inbound {} request on {}", other.method().as_str(), topic);
			}
		}
	});
}

async fn dispatch_response(inner: &Arc<EngineInner>, topic: Box<str>, response: RpcResponse) {
	// Free the ledger entry before any handler runs or event is emitted
	let pending = match inner.ledger.take(response.id).await {
		Ok(Some(pending)) => pending,
		Ok(None) => {
			debug!("response on {} for unknown request id {}", topic, response.id);
			return;
		}
		Err(err) => {
			warn!("ledger lookup failed for response id {}: {}", response.id, err);
			return;
		}
	};

	let inner = Arc::clone(inner);
	tokio::spawn(async move {
		match NotifyMethod::from_name(&pending.method) {
			Some(NotifyMethod::Subscribe) => {
				handler::on_subscribe_response(&inner, pending, response).await;
			}
			Some(NotifyMethod::Update) => {
				handler::on_update_response(&inner, pending, response).await;
			}
			Some(NotifyMethod::WatchSubscriptions) => {
				handler::on_watch_subscriptions_response(&inner, pending, response).await;
			}
			Some(NotifyMethod::Delete) => {
				debug!("delete acknowledged for topic {}", pending.topic);
			}
			_ => {
				debug!("response for unhandled method {}", pending.method);
			}
		}
	});
}

// vim: ts=4
