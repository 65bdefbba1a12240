//! Core data model shared between the engine and adapter implementations.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::HashMap;
use std::fmt;

/// Unix timestamp in seconds
#[derive(
	Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
	pub fn now() -> Self {
		let secs = std::time::SystemTime::now()
			.duration_since(std::time::UNIX_EPOCH)
			.unwrap_or_default()
			.as_secs();
		Self(secs as i64)
	}

	pub fn add_seconds(self, secs: i64) -> Self {
		Self(self.0 + secs)
	}

	/// Milliseconds representation, as used by message records
	pub fn millis(self) -> i64 {
		self.0 * 1000
	}
}

impl fmt::Display for Timestamp {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// CAIP-10 account identifier (`namespace:chain:address`)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub Box<str>);

impl AccountId {
	pub fn new(account: impl Into<Box<str>>) -> Self {
		Self(account.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for AccountId {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<&str> for AccountId {
	fn from(account: &str) -> Self {
		Self(account.into())
	}
}

/// A notification scope entry as stored on a subscription
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSetting {
	pub description: Box<str>,
	pub enabled: bool,
}

/// Dapp metadata captured from its notify config at subscription time
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DappMetadata {
	pub name: Box<str>,
	pub description: Box<str>,
	pub icons: Vec<Box<str>>,
	pub app_domain: Box<str>,
}

/// Relay routing parameters for a subscription
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayProtocol {
	pub protocol: Box<str>,
}

impl Default for RelayProtocol {
	fn default() -> Self {
		Self { protocol: "irn".into() }
	}
}

/// A live notify subscription, keyed in the subscription store by its topic.
///
/// Invariant: `topic == SHA256(sym_key)`, and `sym_key` is also present in the
/// key chain under `topic`. Mutated only by the reconciler; deleted by the
/// reconciler when the server drops the subscription.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
	pub topic: Box<str>,
	pub account: AccountId,
	pub expiry: Timestamp,
	pub sym_key: Box<str>,
	pub scope: HashMap<Box<str>, ScopeSetting>,
	pub metadata: DappMetadata,
	pub relay: RelayProtocol,
}

/// Decrypted notification content carried in the `msg` JWT claim
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyMessage {
	pub title: Box<str>,
	pub body: Box<str>,
	pub icon: Box<str>,
	pub url: Box<str>,
	#[serde(rename = "type")]
	pub msg_type: Box<str>,
}

/// A received notification, stored per subscription topic under its request id
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
	pub id: u64,
	pub topic: Box<str>,
	pub message: NotifyMessage,
	/// Publication time in milliseconds
	pub published_at: i64,
}

/// Message records for one subscription topic
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TopicMessages {
	pub topic: Box<str>,
	pub messages: HashMap<u64, MessageRecord>,
}

impl TopicMessages {
	pub fn new(topic: impl Into<Box<str>>) -> Self {
		Self { topic: topic.into(), messages: HashMap::new() }
	}
}

/// Context captured when an outbound request is sent, replayed when the
/// response (or expiry) arrives
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
	pub account: AccountId,
	pub metadata: Option<DappMetadata>,
	/// Self X25519 public key the response channel was derived from
	pub public_key: Option<Box<str>>,
	pub scope: Option<Vec<Box<str>>>,
	pub scope_update: Option<Vec<Box<str>>>,
}

/// An outbound request awaiting its response, keyed in the requests store by
/// its JSON-RPC id. Inserted before publish; removed on response or expiry.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
	pub id: u64,
	/// Topic the response is expected on
	pub topic: Box<str>,
	pub method: Box<str>,
	pub request: RequestContext,
}

/// Dapp keys resolved from its `did.json`, both lowercase hex
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DappIdentity {
	/// X25519 key agreement key
	pub key_agreement: Box<str>,
	/// Ed25519 authentication key
	pub authentication: Box<str>,
}

/// A notification type declared by a dapp in its notify config
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyType {
	pub name: Box<str>,
	pub description: Box<str>,
}

/// Parsed `wc-notify-config.json` well-known document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
	pub name: Box<str>,
	pub description: Box<str>,
	#[serde(default)]
	pub icons: Vec<Box<str>>,
	#[serde(default)]
	pub types: Vec<NotifyType>,
}

/// Server-authoritative subscription entry carried in `sbs[]` claims
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSubscription {
	pub account: AccountId,
	pub sym_key: Box<str>,
	pub scope: Vec<Box<str>>,
	pub expiry: Timestamp,
	pub app_domain: Box<str>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_timestamp_millis() {
		assert_eq!(Timestamp(1700000000).millis(), 1700000000000);
		assert_eq!(Timestamp(0).add_seconds(30).0, 30);
	}

	#[test]
	fn test_subscription_wire_shape() {
		let sub = Subscription {
			topic: "aa".into(),
			account: "eip155:1:0xABC".into(),
			expiry: Timestamp(100),
			sym_key: "bb".into(),
			scope: HashMap::new(),
			metadata: DappMetadata {
				name: "gm".into(),
				description: "".into(),
				icons: vec![],
				app_domain: "gm.example".into(),
			},
			relay: RelayProtocol::default(),
		};
		let value = serde_json::to_value(&sub).unwrap();
		assert_eq!(value["symKey"], "bb");
		assert_eq!(value["metadata"]["appDomain"], "gm.example");
		assert_eq!(value["relay"]["protocol"], "irn");
	}

	#[test]
	fn test_server_subscription_wire_shape() {
		let json = serde_json::json!({
			"account": "eip155:1:0xABC",
			"symKey": "00ff",
			"scope": ["gm_hourly"],
			"expiry": 123,
			"appDomain": "gm.example",
		});
		let sb: ServerSubscription = serde_json::from_value(json).unwrap();
		assert_eq!(sb.sym_key.as_ref(), "00ff");
		assert_eq!(sb.app_domain.as_ref(), "gm.example");
	}

	#[test]
	fn test_notify_message_type_field() {
		let json = serde_json::json!({
			"title": "t", "body": "b", "icon": "", "url": "", "type": "gm_hourly"
		});
		let msg: NotifyMessage = serde_json::from_value(json).unwrap();
		assert_eq!(msg.msg_type.as_ref(), "gm_hourly");
	}
}

// vim: ts=4
