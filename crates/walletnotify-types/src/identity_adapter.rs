//! Adapter for the identity-keys service.
//!
//! The identity service registers a wallet account's Ed25519 identity key with
//! a keyserver (via a user-signed statement) and signs JWT claim sets on the
//! engine's behalf. Raw identity key material never crosses this boundary.

use async_trait::async_trait;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

use crate::prelude::*;

/// Wallet signature callback invoked with the registration message the user
/// must approve
pub type OnSign =
	Box<dyn Fn(String) -> Pin<Box<dyn Future<Output = WnResult<String>> + Send>> + Send + Sync>;

pub struct RegisterIdentityParams {
	pub account: AccountId,
	pub on_sign: OnSign,
	/// User-visible statement embedded in the signed registration message
	pub statement: Box<str>,
	/// Dapp domain the registration is scoped to
	pub domain: Box<str>,
}

#[async_trait]
pub trait IdentityAdapter: Debug + Send + Sync {
	/// Register an identity key for an account, returning its public half as
	/// lowercase hex. Idempotent for an already-registered account.
	async fn register_identity(&self, params: RegisterIdentityParams) -> WnResult<Box<str>>;

	/// Look up the registered identity key for an account
	async fn identity_key(&self, account: &AccountId) -> WnResult<Box<str>>;

	/// Sign a claim set as a JWS (EdDSA over the account's identity key)
	async fn sign_claims(
		&self,
		account: &AccountId,
		claims: serde_json::Value,
	) -> WnResult<Box<str>>;
}

// vim: ts=4
