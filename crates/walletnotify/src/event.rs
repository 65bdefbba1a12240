//! Typed engine events broadcast to the host application.

use tokio::sync::broadcast;

use walletnotify_types::types::{NotifyMessage, Subscription};

use crate::prelude::*;

pub const DEFAULT_EVENT_CAPACITY: usize = 128;

/// Everything the engine reports to its host
#[derive(Clone, Debug)]
pub enum NotifyEvent {
	/// A subscribe request was answered. The authoritative subscription body
	/// arrives separately through `SubscriptionsChanged`.
	Subscription { id: u64, error: Option<String> },
	/// A notification was received, stored, and acknowledged
	Message { id: u64, topic: Box<str>, message: NotifyMessage },
	/// An update request was answered
	Update { id: u64, topic: Box<str>, error: Option<String> },
	/// The dapp requested deletion of a subscription
	Delete { id: u64, topic: Box<str> },
	/// Local state was reconciled against the server's subscription list
	SubscriptionsChanged { subscriptions: Vec<Subscription> },
	/// An outbound request expired without a response
	RequestExpire { id: u64 },
}

/// Broadcast fan-out for engine events
pub(crate) struct EventEmitter {
	tx: broadcast::Sender<NotifyEvent>,
}

impl EventEmitter {
	pub fn new(capacity: usize) -> Self {
		let (tx, _rx) = broadcast::channel(capacity);
		Self { tx }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<NotifyEvent> {
		self.tx.subscribe()
	}

	pub fn emit(&self, event: NotifyEvent) {
		if self.tx.send(event).is_err() {
			trace!("engine event dropped: no receivers");
		}
	}
}

impl std::fmt::Debug for EventEmitter {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("EventEmitter").field("receivers", &self.tx.receiver_count()).finish()
	}
}

// vim: ts=4
