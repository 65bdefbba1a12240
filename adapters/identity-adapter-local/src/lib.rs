//! Local implementation of the identity-keys adapter.
//!
//! Generates one Ed25519 identity key per account, collects the user's
//! approval through the `on_sign` callback (CAIP-122 style message), and
//! signs claim sets as EdDSA JWTs. Key material never leaves this adapter.
//!
//! A production deployment would additionally publish the signed registration
//! to a keyserver; this adapter keeps the same surface without the network
//! round trip, which is also what the engine's tests run against.

use async_trait::async_trait;
use ed25519_dalek::pkcs8::EncodePrivateKey;
use ed25519_dalek::SigningKey;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::RwLock;
use rand_core::OsRng;
use std::collections::HashMap;
use tracing::debug;

use walletnotify::identity_adapter::{IdentityAdapter, RegisterIdentityParams};
use walletnotify::prelude::*;

pub struct IdentityAdapterLocal {
	keys: RwLock<HashMap<AccountId, SigningKey>>,
}

impl IdentityAdapterLocal {
	pub fn new() -> Self {
		Self { keys: RwLock::new(HashMap::new()) }
	}

	fn public_key_hex(key: &SigningKey) -> Box<str> {
		hex::encode(key.verifying_key().as_bytes()).into()
	}
}

impl Default for IdentityAdapterLocal {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl IdentityAdapter for IdentityAdapterLocal {
	async fn register_identity(&self, params: RegisterIdentityParams) -> WnResult<Box<str>> {
		if let Some(key) = self.keys.read().get(&params.account) {
			debug!("identity already registered for {}", params.account);
			return Ok(Self::public_key_hex(key));
		}

		let key = SigningKey::generate(&mut OsRng);
		let public_key = Self::public_key_hex(&key);

		// The user approves binding this identity key to their account
		let message = registration_message(&params, &public_key);
		let signature = (params.on_sign)(message).await?;
		if signature.is_empty() {
			return Err(Error::IdentityFailure("empty registration signature".into()));
		}

		self.keys.write().insert(params.account.clone(), key);
		debug!("registered identity key for {}", params.account);
		Ok(public_key)
	}

	async fn identity_key(&self, account: &AccountId) -> WnResult<Box<str>> {
		self.keys
			.read()
			.get(account)
			.map(Self::public_key_hex)
			.ok_or_else(|| Error::IdentityFailure(format!("no identity for {}", account)))
	}

	async fn sign_claims(
		&self,
		account: &AccountId,
		claims: serde_json::Value,
	) -> WnResult<Box<str>> {
		let der = {
			let keys = self.keys.read();
			let key = keys
				.get(account)
				.ok_or_else(|| Error::IdentityFailure(format!("no identity for {}", account)))?;
			key.to_pkcs8_der()
				.map_err(|err| Error::IdentityFailure(format!("pkcs8 export: {}", err)))?
		};

		let encoding_key = EncodingKey::from_ed_der(der.as_bytes());
		jsonwebtoken::encode(&Header::new(Algorithm::EdDSA), &claims, &encoding_key)
			.map(Into::into)
			.map_err(|err| Error::IdentityFailure(format!("jwt signing: {}", err)))
	}
}

impl std::fmt::Debug for IdentityAdapterLocal {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("IdentityAdapterLocal")
			.field("accounts", &self.keys.read().len())
			.finish_non_exhaustive()
	}
}

/// CAIP-122 style sign-in message presented to the user's wallet
fn registration_message(params: &RegisterIdentityParams, identity_key: &str) -> String {
	format!(
		"{domain} wants you to sign in with your blockchain account:\n\
		 {account}\n\n\
		 {statement}\n\n\
		 URI: https://{domain}\n\
		 Version: 1\n\
		 Resources:\n- did:key:{identity_key}",
		domain = params.domain,
		account = params.account,
		statement = params.statement,
	)
}


// vim: ts=4
