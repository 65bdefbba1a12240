//! Envelope codec: JSON-RPC payloads in and out of encrypted frames.
//!
//! The codec owns serialization only; sealing and opening are delegated to
//! the crypto adapter, which never returns cipher internals to the engine.

use std::sync::Arc;

use walletnotify_types::crypto_adapter::{CryptoAdapter, EncodeOptions};

use crate::prelude::*;
use crate::rpc::{RpcPayload, RpcRequest, RpcResponse};

#[derive(Clone)]
pub struct EnvelopeCodec {
	crypto: Arc<dyn CryptoAdapter>,
}

impl EnvelopeCodec {
	pub fn new(crypto: Arc<dyn CryptoAdapter>) -> Self {
		Self { crypto }
	}

	/// Seal a request for a topic. `opts` selects type-1 framing for the
	/// first message of a key-agreement exchange; `None` means type-0.
	pub async fn encode_request(
		&self,
		topic: &str,
		request: &RpcRequest,
		opts: Option<&EncodeOptions>,
	) -> WnResult<Vec<u8>> {
		let payload = serde_json::to_string(request)?;
		self.crypto.encode(topic, &payload, opts).await
	}

	/// Seal a response for a topic (always type-0)
	pub async fn encode_response(&self, topic: &str, response: &RpcResponse) -> WnResult<Vec<u8>> {
		let payload = serde_json::to_string(response)?;
		self.crypto.encode(topic, &payload, None).await
	}

	/// Open an inbound envelope and parse it as a request or response
	pub async fn decode(&self, topic: &str, message: &[u8]) -> WnResult<RpcPayload> {
		let payload = self.crypto.decode(topic, message).await?;
		serde_json::from_str(&payload)
			.map_err(|err| Error::InvalidMessagePayload(format!("unparseable payload: {}", err)))
	}
}

impl std::fmt::Debug for EnvelopeCodec {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("EnvelopeCodec").finish_non_exhaustive()
	}
}

// vim: ts=4
