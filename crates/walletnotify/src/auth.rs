//! JWT claim sets for every protocol action.
//!
//! Every outbound request and inbound notification carries a JWS whose claim
//! set is discriminated by the `act` claim. The engine builds typed claim
//! sets and hands them to the identity adapter for EdDSA signing; inbound
//! claim sets are decoded without signature verification (trust derives from
//! the encrypted channel) and checked for `act` and freshness.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use walletnotify_types::types::{NotifyMessage, ServerSubscription};
use walletnotify_types::utils::decode_jwt_no_verify;

use crate::prelude::*;

pub const DID_KEY_PREFIX: &str = "did:key:";
pub const DID_PKH_PREFIX: &str = "did:pkh:";
pub const DID_WEB_PREFIX: &str = "did:web:";

pub const JWT_SCP_SEPARATOR: &str = " ";

/// Lifetime of wallet-issued claim sets
pub const JWT_TTL_SECS: i64 = 30 * 86400;

/// Tolerated clock skew when checking `iat` on inbound claim sets
pub const JWT_IAT_LEEWAY_SECS: i64 = 5;

/// Multicodec prefix for Ed25519 public keys in `did:key`
const ED25519_MULTICODEC: [u8; 2] = [0xed, 0x01];

/// Statement signed by the user when registering an identity key scoped to a
/// single dapp
pub const LIMITED_IDENTITY_STATEMENT: &str =
	"I further authorize this app to send and receive messages on my behalf for \
	 THIS app using my WalletConnect identity. Read more at \
	 https://walletconnect.com/identity";

/// Statement signed by the user when registering an identity key valid across
/// all dapps
pub const UNLIMITED_IDENTITY_STATEMENT: &str =
	"I further authorize this app to send and receive messages on my behalf for \
	 ALL apps using my WalletConnect identity. Read more at \
	 https://walletconnect.com/identity";

/// `act` claim values, one per protocol action
pub mod act {
	pub const NOTIFY_SUBSCRIPTION: &str = "notify_subscription";
	pub const NOTIFY_UPDATE: &str = "notify_update";
	pub const NOTIFY_DELETE: &str = "notify_delete";
	pub const NOTIFY_MESSAGE: &str = "notify_message";
	pub const NOTIFY_MESSAGE_RESPONSE: &str = "notify_message_response";
	pub const NOTIFY_WATCH_SUBSCRIPTIONS: &str = "notify_watch_subscriptions";
	pub const NOTIFY_WATCH_SUBSCRIPTIONS_RESPONSE: &str =
		"notify_watch_subscriptions_response";
	pub const NOTIFY_SUBSCRIPTIONS_CHANGED: &str = "notify_subscriptions_changed";
}

/// Claims common to every protocol action
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BaseClaims {
	/// Issued at (unix seconds)
	pub iat: i64,
	/// Expiry (unix seconds)
	pub exp: i64,
	/// did:key of the issuer's Ed25519 key
	pub iss: Box<str>,
	/// did:key of the recipient's Ed25519 key
	pub aud: Box<str>,
	/// did:pkh of the account the action concerns
	pub sub: Box<str>,
	/// Keyserver URL the identity key is registered with
	pub ksu: Option<Box<str>>,
	/// Action discriminator
	pub act: Box<str>,
}

impl BaseClaims {
	/// Build wallet-issued base claims: `iss` from the account's identity key,
	/// `sub` from the account, `iat`/`exp` from the wall clock.
	pub fn new(
		act: &str,
		identity_key: &str,
		aud: impl Into<Box<str>>,
		account: &AccountId,
		keyserver_url: &str,
	) -> WnResult<Self> {
		let iat = Timestamp::now().0;
		Ok(Self {
			iat,
			exp: iat + JWT_TTL_SECS,
			iss: encode_ed25519_did_key(identity_key)?,
			aud: aud.into(),
			sub: did_pkh(account).into(),
			ksu: Some(keyserver_url.into()),
			act: act.into(),
		})
	}
}

/// `notify_subscription` / `notify_update` claims
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubscriptionClaims {
	#[serde(flatten)]
	pub base: BaseClaims,
	/// Enabled scope names joined by [`JWT_SCP_SEPARATOR`]
	pub scp: Box<str>,
	/// did:web of the dapp
	pub app: Box<str>,
}

/// `notify_delete` / `notify_message_response` claims
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppClaims {
	#[serde(flatten)]
	pub base: BaseClaims,
	/// did:web of the dapp
	pub app: Box<str>,
}

/// `notify_watch_subscriptions` claims
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WatchSubscriptionsClaims {
	#[serde(flatten)]
	pub base: BaseClaims,
}

/// `notify_watch_subscriptions_response` / `notify_subscriptions_changed`
/// claims carrying the server-authoritative subscription list
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubscriptionsListClaims {
	#[serde(flatten)]
	pub base: BaseClaims,
	pub sbs: Vec<ServerSubscription>,
}

/// Inbound `notify_message` claims
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageClaims {
	#[serde(flatten)]
	pub base: BaseClaims,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub app: Option<Box<str>>,
	pub msg: NotifyMessage,
}

/// Decode an inbound JWS and check its claims: `act` must equal
/// `expected_act`, `iat` must not be in the future beyond the leeway, and
/// `exp` must not have passed.
pub fn validate<T: DeserializeOwned>(jwt: &str, expected_act: &str) -> WnResult<T> {
	let value: serde_json::Value = decode_jwt_no_verify(jwt)?;

	let got = value.get("act").and_then(|act| act.as_str()).unwrap_or_default();
	if got != expected_act {
		return Err(Error::JwtActMismatch { expected: expected_act.into(), got: got.into() });
	}

	let now = Timestamp::now().0;
	let iat = value.get("iat").and_then(serde_json::Value::as_i64).unwrap_or(0);
	let exp = value.get("exp").and_then(serde_json::Value::as_i64).unwrap_or(i64::MAX);
	if iat > now + JWT_IAT_LEEWAY_SECS || exp < now {
		return Err(Error::JwtExpired);
	}

	serde_json::from_value(value).map_err(|_| Error::JwtDecodeFailed)
}

/// `did:key` of an Ed25519 public key (multicodec 0xed01, base58btc, `z`
/// multibase prefix)
pub fn encode_ed25519_did_key(public_key: &str) -> WnResult<Box<str>> {
	let raw = hex::decode(public_key)
		.map_err(|_| Error::CryptoFailure(format!("invalid hex key: {}", public_key)))?;
	let mut bytes = Vec::with_capacity(ED25519_MULTICODEC.len() + raw.len());
	bytes.extend_from_slice(&ED25519_MULTICODEC);
	bytes.extend_from_slice(&raw);
	Ok(format!("{}z{}", DID_KEY_PREFIX, bs58::encode(bytes).into_string()).into())
}

/// Recover the hex public key from an Ed25519 `did:key`
pub fn decode_ed25519_did_key(did: &str) -> WnResult<Box<str>> {
	let encoded = did
		.strip_prefix(DID_KEY_PREFIX)
		.and_then(|did| did.strip_prefix('z'))
		.ok_or(Error::JwtDecodeFailed)?;
	let bytes = bs58::decode(encoded).into_vec().map_err(|_| Error::JwtDecodeFailed)?;
	let raw = bytes.strip_prefix(&ED25519_MULTICODEC[..]).ok_or(Error::JwtDecodeFailed)?;
	Ok(hex::encode(raw).into())
}

/// `did:pkh` of a CAIP-10 account
pub fn did_pkh(account: &AccountId) -> String {
	format!("{}{}", DID_PKH_PREFIX, account)
}

/// CAIP-10 account from a `did:pkh` claim
pub fn account_from_did_pkh(did: &str) -> WnResult<AccountId> {
	did.strip_prefix(DID_PKH_PREFIX).map(AccountId::from).ok_or(Error::JwtDecodeFailed)
}

/// `did:web` of a dapp domain
pub fn did_web(domain: &str) -> String {
	format!("{}{}", DID_WEB_PREFIX, domain)
}


// vim: ts=4
