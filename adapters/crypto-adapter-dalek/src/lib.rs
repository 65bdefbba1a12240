//! X25519 + ChaCha20-Poly1305 implementation of the crypto adapter.
//!
//! Key agreement uses X25519 with the shared secret expanded through
//! HKDF-SHA256; payloads are sealed with ChaCha20-Poly1305. Envelopes are
//! framed as `type_byte || [sender_pub (32, type-1 only)] || nonce (12) ||
//! ciphertext`. All key material stays inside this adapter's key chain;
//! callers only ever see hex public keys and topic identifiers.

mod error;

use async_trait::async_trait;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use parking_lot::RwLock;
use sha2::Sha256;
use std::collections::HashMap;
use x25519_dalek::{PublicKey, StaticSecret};

pub use error::Error as CryptoError;

use walletnotify::crypto_adapter::{CryptoAdapter, EncodeOptions, EnvelopeType};
use walletnotify::prelude::*;
use walletnotify::utils::sha256_hex;

const ENVELOPE_TYPE0: u8 = 0;
const ENVELOPE_TYPE1: u8 = 1;
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// In-memory key chain plus the crypto operations the engine consumes
pub struct CryptoAdapterDalek {
	/// X25519 keypairs, keyed by hex public key
	key_pairs: RwLock<HashMap<Box<str>, StaticSecret>>,
	/// Symmetric keys, keyed by their derived topic
	sym_keys: RwLock<HashMap<Box<str>, [u8; KEY_LEN]>>,
	/// Tag -> hex public key, for persistent keypair lookup
	tags: RwLock<HashMap<Box<str>, Box<str>>>,
}

impl CryptoAdapterDalek {
	pub fn new() -> Self {
		Self {
			key_pairs: RwLock::new(HashMap::new()),
			sym_keys: RwLock::new(HashMap::new()),
			tags: RwLock::new(HashMap::new()),
		}
	}

	fn key_pair(&self, public_key: &str) -> Result<StaticSecret, CryptoError> {
		self.key_pairs
			.read()
			.get(public_key)
			.cloned()
			.ok_or_else(|| CryptoError::UnknownKeyPair(public_key.into()))
	}

	fn sym_key(&self, topic: &str) -> Result<[u8; KEY_LEN], CryptoError> {
		self.sym_keys
			.read()
			.get(topic)
			.copied()
			.ok_or_else(|| CryptoError::UnknownSymKey(topic.into()))
	}

	/// Find the local keypair whose public key hashes to `topic`; used when
	/// opening type-1 envelopes addressed to one of our published keys
	fn key_pair_for_topic(&self, topic: &str) -> Result<StaticSecret, CryptoError> {
		let key_pairs = self.key_pairs.read();
		for (public_key, secret) in key_pairs.iter() {
			if let Ok(raw) = hex::decode(public_key.as_bytes()) {
				if sha256_hex(&raw).as_ref() == topic {
					return Ok(secret.clone());
				}
			}
		}
		Err(CryptoError::UnknownKeyPair(topic.into()))
	}
}

impl Default for CryptoAdapterDalek {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl CryptoAdapter for CryptoAdapterDalek {
	async fn generate_key_pair(&self) -> WnResult<Box<str>> {
		let secret = StaticSecret::random_from_rng(OsRng);
		let public_key: Box<str> = hex::encode(PublicKey::from(&secret).as_bytes()).into();
		self.key_pairs.write().insert(public_key.clone(), secret);
		Ok(public_key)
	}

	async fn generate_shared_key(
		&self,
		self_public_key: &str,
		peer_public_key: &str,
	) -> WnResult<Box<str>> {
		let secret = self.key_pair(self_public_key)?;
		let peer = decode_public_key(peer_public_key)?;
		let sym_key = derive_sym_key(&secret, &peer)?;
		let topic = sha256_hex(&sym_key);
		self.sym_keys.write().insert(topic.clone(), sym_key);
		Ok(topic)
	}

	async fn set_sym_key(&self, sym_key: &str, topic: &str) -> WnResult<()> {
		let raw = decode_key_bytes(sym_key)?;
		self.sym_keys.write().insert(topic.into(), raw);
		Ok(())
	}

	async fn delete_sym_key(&self, topic: &str) -> WnResult<()> {
		self.sym_keys.write().remove(topic);
		Ok(())
	}

	async fn has_sym_key(&self, topic: &str) -> bool {
		self.sym_keys.read().contains_key(topic)
	}

	async fn tag_key_pair(&self, tag: &str, public_key: &str) -> WnResult<()> {
		if !self.key_pairs.read().contains_key(public_key) {
			return Err(CryptoError::UnknownKeyPair(public_key.into()).into());
		}
		self.tags.write().insert(tag.into(), public_key.into());
		Ok(())
	}

	async fn key_pair_by_tag(&self, tag: &str) -> WnResult<Option<Box<str>>> {
		Ok(self.tags.read().get(tag).cloned())
	}

	async fn encode(
		&self,
		topic: &str,
		payload: &str,
		opts: Option<&EncodeOptions>,
	) -> WnResult<Vec<u8>> {
		let envelope_type = opts.map(|opts| opts.envelope_type).unwrap_or_default();
		match envelope_type {
			EnvelopeType::Type0 => {
				let sym_key = self.sym_key(topic)?;
				let (nonce, ciphertext) = seal(&sym_key, payload.as_bytes())?;
				let mut out = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
				out.push(ENVELOPE_TYPE0);
				out.extend_from_slice(nonce.as_slice());
				out.extend_from_slice(&ciphertext);
				Ok(out)
			}
			EnvelopeType::Type1 => {
				let (sender, receiver) = opts
					.and_then(|opts| {
						Some((
							opts.sender_public_key.as_deref()?,
							opts.receiver_public_key.as_deref()?,
						))
					})
					.ok_or(CryptoError::MissingEnvelopeKeys)?;
				let secret = self.key_pair(sender)?;
				let sender_raw = decode_key_bytes(sender)?;
				let sym_key = derive_sym_key(&secret, &decode_public_key(receiver)?)?;
				let (nonce, ciphertext) = seal(&sym_key, payload.as_bytes())?;
				let mut out = Vec::with_capacity(1 + KEY_LEN + NONCE_LEN + ciphertext.len());
				out.push(ENVELOPE_TYPE1);
				out.extend_from_slice(&sender_raw);
				out.extend_from_slice(nonce.as_slice());
				out.extend_from_slice(&ciphertext);
				Ok(out)
			}
		}
	}

	async fn decode(&self, topic: &str, message: &[u8]) -> WnResult<String> {
		match message.first().copied() {
			Some(ENVELOPE_TYPE0) => {
				let rest = &message[1..];
				if rest.len() < NONCE_LEN {
					return Err(CryptoError::MalformedEnvelope.into());
				}
				let sym_key = self.sym_key(topic)?;
				let plaintext = open(&sym_key, &rest[..NONCE_LEN], &rest[NONCE_LEN..])?;
				Ok(plaintext)
			}
			Some(ENVELOPE_TYPE1) => {
				let rest = &message[1..];
				if rest.len() < KEY_LEN + NONCE_LEN {
					return Err(CryptoError::MalformedEnvelope.into());
				}
				let mut sender = [0u8; KEY_LEN];
				sender.copy_from_slice(&rest[..KEY_LEN]);
				let secret = self.key_pair_for_topic(topic)?;
				let sym_key = derive_sym_key(&secret, &PublicKey::from(sender))?;
				let nonce = &rest[KEY_LEN..KEY_LEN + NONCE_LEN];
				let plaintext = open(&sym_key, nonce, &rest[KEY_LEN + NONCE_LEN..])?;
				Ok(plaintext)
			}
			_ => Err(CryptoError::MalformedEnvelope.into()),
		}
	}
}

impl std::fmt::Debug for CryptoAdapterDalek {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("CryptoAdapterDalek")
			.field("key_pairs", &self.key_pairs.read().len())
			.field("sym_keys", &self.sym_keys.read().len())
			.finish_non_exhaustive()
	}
}

/// X25519 shared secret expanded to a symmetric key through HKDF-SHA256
fn derive_sym_key(
	secret: &StaticSecret,
	peer: &PublicKey,
) -> Result<[u8; KEY_LEN], CryptoError> {
	let shared = secret.diffie_hellman(peer);
	let hkdf = Hkdf::<Sha256>::new(None, shared.as_bytes());
	let mut sym_key = [0u8; KEY_LEN];
	hkdf.expand(&[], &mut sym_key).map_err(|_| CryptoError::Kdf)?;
	Ok(sym_key)
}

fn seal(sym_key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<(Nonce, Vec<u8>), CryptoError> {
	let cipher = ChaCha20Poly1305::new(Key::from_slice(sym_key));
	let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
	let ciphertext = cipher.encrypt(&nonce, plaintext).map_err(|_| CryptoError::Aead)?;
	Ok((nonce, ciphertext))
}

fn open(
	sym_key: &[u8; KEY_LEN],
	nonce: &[u8],
	ciphertext: &[u8],
) -> Result<String, CryptoError> {
	let cipher = ChaCha20Poly1305::new(Key::from_slice(sym_key));
	let plaintext = cipher
		.decrypt(Nonce::from_slice(nonce), ciphertext)
		.map_err(|_| CryptoError::Aead)?;
	String::from_utf8(plaintext).map_err(|_| CryptoError::MalformedEnvelope)
}

fn decode_key_bytes(key: &str) -> Result<[u8; KEY_LEN], CryptoError> {
	let raw = hex::decode(key).map_err(|_| CryptoError::InvalidHex(key.into()))?;
	raw.try_into().map_err(|_| CryptoError::InvalidKeyLength)
}

fn decode_public_key(key: &str) -> Result<PublicKey, CryptoError> {
	Ok(PublicKey::from(decode_key_bytes(key)?))
}


// vim: ts=4
