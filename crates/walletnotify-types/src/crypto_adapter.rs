//! Adapter for the cryptographic primitives library and its key chain.
//!
//! The engine never sees raw key or cipher bytes: keypairs are referenced by
//! their hex public key, symmetric keys by the topic they are bound to, and
//! payloads cross this boundary as serialized JSON.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::prelude::*;

/// Envelope framing selector.
///
/// Type-0 carries ciphertext only and requires both peers to already share a
/// symmetric key for the topic. Type-1 attaches the sender's X25519 public key
/// and is used for the first message to a known-pubkey recipient.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvelopeType {
	#[default]
	Type0,
	Type1,
}

/// Options for [`CryptoAdapter::encode`]. Type-1 envelopes require both keys.
#[derive(Clone, Debug, Default)]
pub struct EncodeOptions {
	pub envelope_type: EnvelopeType,
	pub sender_public_key: Option<Box<str>>,
	pub receiver_public_key: Option<Box<str>>,
}

impl EncodeOptions {
	/// Type-1 options for the first message of a key-agreement exchange
	pub fn type1(sender_public_key: impl Into<Box<str>>, receiver_public_key: impl Into<Box<str>>) -> Self {
		Self {
			envelope_type: EnvelopeType::Type1,
			sender_public_key: Some(sender_public_key.into()),
			receiver_public_key: Some(receiver_public_key.into()),
		}
	}
}

#[async_trait]
pub trait CryptoAdapter: Debug + Send + Sync {
	/// Generate an X25519 keypair; the private half stays in the key chain.
	/// Returns the public key as lowercase hex.
	async fn generate_key_pair(&self) -> WnResult<Box<str>>;

	/// Derive a symmetric key from `self_public_key`'s private half and the
	/// peer's public key, store it in the key chain under its derived topic
	/// (`SHA256(sym_key)`), and return that topic.
	async fn generate_shared_key(
		&self,
		self_public_key: &str,
		peer_public_key: &str,
	) -> WnResult<Box<str>>;

	/// Install a known symmetric key (hex) under a topic
	async fn set_sym_key(&self, sym_key: &str, topic: &str) -> WnResult<()>;

	async fn delete_sym_key(&self, topic: &str) -> WnResult<()>;

	async fn has_sym_key(&self, topic: &str) -> bool;

	/// Tag a keypair for stable lookup across restarts (e.g. the persistent
	/// watch keypair)
	async fn tag_key_pair(&self, tag: &str, public_key: &str) -> WnResult<()>;

	async fn key_pair_by_tag(&self, tag: &str) -> WnResult<Option<Box<str>>>;

	/// Seal a serialized payload for a topic
	async fn encode(
		&self,
		topic: &str,
		payload: &str,
		opts: Option<&EncodeOptions>,
	) -> WnResult<Vec<u8>>;

	/// Open an envelope received on a topic, returning the serialized payload
	async fn decode(&self, topic: &str, message: &[u8]) -> WnResult<String>;
}

// vim: ts=4
