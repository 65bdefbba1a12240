//! JSON-RPC message model for the notify protocol.
//!
//! Requests are modelled as one tagged variant per method so no handler ever
//! reaches into an untyped map. Relay tags and TTLs are part of the paired
//! relay's contract and must round-trip bit-exactly.

use serde::{Deserialize, Serialize};

use walletnotify_types::utils::random_request_id;

pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC error code used for protocol-level rejections
pub const RPC_ERROR_CODE: i32 = -32000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotifyMethod {
	Subscribe,
	Message,
	Delete,
	Update,
	WatchSubscriptions,
	SubscriptionsChanged,
}

impl NotifyMethod {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Subscribe => "wc_notifySubscribe",
			Self::Message => "wc_notifyMessage",
			Self::Delete => "wc_notifyDelete",
			Self::Update => "wc_notifyUpdate",
			Self::WatchSubscriptions => "wc_notifyWatchSubscriptions",
			Self::SubscriptionsChanged => "wc_notifySubscriptionsChanged",
		}
	}

	pub fn from_name(name: &str) -> Option<Self> {
		match name {
			"wc_notifySubscribe" => Some(Self::Subscribe),
			"wc_notifyMessage" => Some(Self::Message),
			"wc_notifyDelete" => Some(Self::Delete),
			"wc_notifyUpdate" => Some(Self::Update),
			"wc_notifyWatchSubscriptions" => Some(Self::WatchSubscriptions),
			"wc_notifySubscriptionsChanged" => Some(Self::SubscriptionsChanged),
			_ => None,
		}
	}

	/// Relay tag for requests (even numbers)
	pub fn req_tag(self) -> u32 {
		match self {
			Self::Subscribe => 4000,
			Self::Message => 4002,
			Self::Delete => 4004,
			Self::Update => 4008,
			Self::WatchSubscriptions => 4010,
			Self::SubscriptionsChanged => 4012,
		}
	}

	/// Relay tag for responses (the request tag's odd successor)
	pub fn res_tag(self) -> u32 {
		self.req_tag() + 1
	}

	/// Ledger lifetime of an outbound request in seconds
	pub fn req_ttl(self) -> i64 {
		86400
	}

	/// Relay retention of a published response in seconds
	pub fn res_ttl(self) -> i64 {
		86400
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubscribeParams {
	#[serde(rename = "subscriptionAuth")]
	pub subscription_auth: Box<str>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageParams {
	#[serde(rename = "messageAuth")]
	pub message_auth: Box<str>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteParams {
	#[serde(rename = "deleteAuth")]
	pub delete_auth: Box<str>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateParams {
	#[serde(rename = "updateAuth")]
	pub update_auth: Box<str>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WatchSubscriptionsParams {
	#[serde(rename = "watchSubscriptionsAuth")]
	pub watch_subscriptions_auth: Box<str>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubscriptionsChangedParams {
	#[serde(rename = "subscriptionsChangedAuth")]
	pub subscriptions_changed_auth: Box<str>,
}

/// Method-tagged request payload
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum RequestParams {
	#[serde(rename = "wc_notifySubscribe")]
	Subscribe(SubscribeParams),
	#[serde(rename = "wc_notifyMessage")]
	Message(MessageParams),
	#[serde(rename = "wc_notifyDelete")]
	Delete(DeleteParams),
	#[serde(rename = "wc_notifyUpdate")]
	Update(UpdateParams),
	#[serde(rename = "wc_notifyWatchSubscriptions")]
	WatchSubscriptions(WatchSubscriptionsParams),
	#[serde(rename = "wc_notifySubscriptionsChanged")]
	SubscriptionsChanged(SubscriptionsChangedParams),
}

impl RequestParams {
	pub fn method(&self) -> NotifyMethod {
		match self {
			Self::Subscribe(_) => NotifyMethod::Subscribe,
			Self::Message(_) => NotifyMethod::Message,
			Self::Delete(_) => NotifyMethod::Delete,
			Self::Update(_) => NotifyMethod::Update,
			Self::WatchSubscriptions(_) => NotifyMethod::WatchSubscriptions,
			Self::SubscriptionsChanged(_) => NotifyMethod::SubscriptionsChanged,
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcRequest {
	pub id: u64,
	pub jsonrpc: Box<str>,
	#[serde(flatten)]
	pub params: RequestParams,
}

impl RpcRequest {
	pub fn new(params: RequestParams) -> Self {
		Self { id: random_request_id(), jsonrpc: JSONRPC_VERSION.into(), params }
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcError {
	pub code: i32,
	pub message: String,
}

/// Responses carry either `result` or `error`. Unknown fields are rejected so
/// the untagged [`RpcPayload`] never mistakes a malformed request for a
/// response.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RpcResponse {
	pub id: u64,
	pub jsonrpc: Box<str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<serde_json::Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<RpcError>,
}

impl RpcResponse {
	pub fn result(id: u64, result: serde_json::Value) -> Self {
		Self { id, jsonrpc: JSONRPC_VERSION.into(), result: Some(result), error: None }
	}

	pub fn error(id: u64, message: impl Into<String>) -> Self {
		Self {
			id,
			jsonrpc: JSONRPC_VERSION.into(),
			result: None,
			error: Some(RpcError { code: RPC_ERROR_CODE, message: message.into() }),
		}
	}
}

/// Result body carrying a signed response JWT
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResponseAuth {
	#[serde(rename = "responseAuth")]
	pub response_auth: Box<str>,
}

/// Any payload arriving on a relay topic
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum RpcPayload {
	Request(RpcRequest),
	Response(RpcResponse),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_tag_table() {
		assert_eq!(NotifyMethod::Subscribe.req_tag(), 4000);
		assert_eq!(NotifyMethod::Subscribe.res_tag(), 4001);
		assert_eq!(NotifyMethod::Message.req_tag(), 4002);
		assert_eq!(NotifyMethod::Message.res_tag(), 4003);
		assert_eq!(NotifyMethod::Delete.req_tag(), 4004);
		assert_eq!(NotifyMethod::Delete.res_tag(), 4005);
		assert_eq!(NotifyMethod::Update.req_tag(), 4008);
		assert_eq!(NotifyMethod::Update.res_tag(), 4009);
		assert_eq!(NotifyMethod::WatchSubscriptions.req_tag(), 4010);
		assert_eq!(NotifyMethod::WatchSubscriptions.res_tag(), 4011);
		assert_eq!(NotifyMethod::SubscriptionsChanged.req_tag(), 4012);
		assert_eq!(NotifyMethod::SubscriptionsChanged.res_tag(), 4013);
	}

	#[test]
	fn test_method_names_round_trip() {
		for method in [
			NotifyMethod::Subscribe,
			NotifyMethod::Message,
			NotifyMethod::Delete,
			NotifyMethod::Update,
			NotifyMethod::WatchSubscriptions,
			NotifyMethod::SubscriptionsChanged,
		] {
			assert_eq!(NotifyMethod::from_name(method.as_str()), Some(method));
		}
		assert_eq!(NotifyMethod::from_name("wc_sessionRequest"), None);
	}

	#[test]
	fn test_request_wire_shape() {
		let req = RpcRequest::new(RequestParams::Message(MessageParams {
			message_auth: "ey.jwt.sig".into(),
		}));
		let value = serde_json::to_value(&req).unwrap();
		assert_eq!(value["jsonrpc"], "2.0");
		assert_eq!(value["method"], "wc_notifyMessage");
		assert_eq!(value["params"]["messageAuth"], "ey.jwt.sig");
	}

	#[test]
	fn test_payload_discriminates_request_and_response() {
		let request = serde_json::json!({
			"id": 1, "jsonrpc": "2.0",
			"method": "wc_notifyDelete",
			"params": { "deleteAuth": "jwt" },
		});
		assert!(matches!(
			serde_json::from_value::<RpcPayload>(request).unwrap(),
			RpcPayload::Request(req) if matches!(req.params, RequestParams::Delete(_))
		));

		let response = serde_json::json!({
			"id": 1, "jsonrpc": "2.0",
			"result": { "responseAuth": "jwt" },
		});
		assert!(matches!(
			serde_json::from_value::<RpcPayload>(response).unwrap(),
			RpcPayload::Response(res) if res.result.is_some()
		));
	}

	#[test]
	fn test_unknown_method_is_not_a_response() {
		let unknown = serde_json::json!({
			"id": 1, "jsonrpc": "2.0",
			"method": "wc_somethingElse",
			"params": {},
		});
		// Neither a known request nor (thanks to deny_unknown_fields) a response
		assert!(serde_json::from_value::<RpcPayload>(unknown).is_err());
	}

	#[test]
	fn test_error_response_shape() {
		let res = RpcResponse::error(7, "bad auth");
		let value = serde_json::to_value(&res).unwrap();
		assert_eq!(value["error"]["code"], RPC_ERROR_CODE);
		assert!(value.get("result").is_none());
	}
}

// vim: ts=4
