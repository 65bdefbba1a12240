//! Well-known document resolution for dapp identities and notify configs.
//!
//! Successful fetches are cached for the process lifetime (one network call
//! per domain on the happy path). Failed fetches are negatively cached with a
//! TTL so an unreachable or malformed domain is not re-fetched on every
//! operation: transient network failures recover quickly, persistent document
//! problems are retried much later.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

use walletnotify_types::fetch_adapter::FetchAdapter;
use walletnotify_types::types::{DappIdentity, NotifyConfig};

use crate::prelude::*;

pub const DID_JSON_PATH: &str = "/.well-known/did.json";
pub const NOTIFY_CONFIG_PATH: &str = "/.well-known/wc-notify-config.json";

/// Limits memory for cached documents (one entry per dapp domain)
const DEFAULT_CACHE_CAPACITY: usize = 100;

/// TTL for network errors (transient, may recover quickly)
const TTL_NETWORK_ERROR_SECS: i64 = 5 * 60;

/// TTL for persistent errors (malformed document, missing key)
const TTL_PERSISTENT_ERROR_SECS: i64 = 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureKind {
	/// Fetch failed (connection refused, timeout, non-success status)
	Network,
	/// The document was fetched but unusable
	Document,
}

impl FailureKind {
	fn ttl_secs(self) -> i64 {
		match self {
			FailureKind::Network => TTL_NETWORK_ERROR_SECS,
			FailureKind::Document => TTL_PERSISTENT_ERROR_SECS,
		}
	}

	fn from_error(error: &Error) -> Self {
		match error {
			Error::DidDocMalformed(_) | Error::VerificationMethodMissing(_) => Self::Document,
			_ => Self::Network,
		}
	}
}

#[derive(Debug, Clone)]
struct FailureEntry {
	kind: FailureKind,
	retry_after: Timestamp,
}

impl FailureEntry {
	fn new(kind: FailureKind) -> Self {
		Self { kind, retry_after: Timestamp::now().add_seconds(kind.ttl_secs()) }
	}

	fn is_expired(&self) -> bool {
		Timestamp::now() >= self.retry_after
	}
}

/// Resolver for the two well-known documents a dapp publishes
pub struct DidResolver {
	fetch: Arc<dyn FetchAdapter>,
	identities: parking_lot::RwLock<LruCache<Box<str>, DappIdentity>>,
	configs: parking_lot::RwLock<LruCache<Box<str>, NotifyConfig>>,
	/// Failed fetch attempts, keyed by document URL
	failures: parking_lot::RwLock<LruCache<String, FailureEntry>>,
}

impl DidResolver {
	pub fn new(fetch: Arc<dyn FetchAdapter>) -> Self {
		let capacity = NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
		Self {
			fetch,
			identities: parking_lot::RwLock::new(LruCache::new(capacity)),
			configs: parking_lot::RwLock::new(LruCache::new(capacity)),
			failures: parking_lot::RwLock::new(LruCache::new(capacity)),
		}
	}

	/// Resolve a dapp's key agreement and authentication keys from its
	/// `did.json`
	pub async fn resolve_keys(&self, domain: &str) -> WnResult<DappIdentity> {
		if let Some(identity) = self.identities.write().get(domain) {
			return Ok(identity.clone());
		}

		let url = format!("https://{}{}", domain, DID_JSON_PATH);
		self.check_failure(&url, domain)?;

		let doc = match self.fetch.fetch_json(&url).await {
			Ok(doc) => doc,
			Err(err) => {
				warn!("did.json fetch failed for {}: {}", domain, err);
				let err = Error::DidDocUnavailable(domain.into());
				self.record_failure(&url, &err);
				return Err(err);
			}
		};

		match parse_did_document(domain, &doc) {
			Ok(identity) => {
				self.clear_failure(&url);
				self.identities.write().put(domain.into(), identity.clone());
				Ok(identity)
			}
			Err(err) => {
				self.record_failure(&url, &err);
				Err(err)
			}
		}
	}

	/// Resolve a dapp's `wc-notify-config.json`
	pub async fn resolve_notify_config(&self, domain: &str) -> WnResult<NotifyConfig> {
		if let Some(config) = self.configs.write().get(domain) {
			return Ok(config.clone());
		}

		let url = format!("https://{}{}", domain, NOTIFY_CONFIG_PATH);
		self.check_failure(&url, domain)?;

		let doc = match self.fetch.fetch_json(&url).await {
			Ok(doc) => doc,
			Err(err) => {
				warn!("notify config fetch failed for {}: {}", domain, err);
				let err = Error::ConfigUnavailable(domain.into());
				self.record_failure(&url, &err);
				return Err(err);
			}
		};

		match serde_json::from_value::<NotifyConfig>(doc) {
			Ok(config) => {
				self.clear_failure(&url);
				self.configs.write().put(domain.into(), config.clone());
				Ok(config)
			}
			Err(err) => {
				warn!("notify config unparseable for {}: {}", domain, err);
				let err = Error::ConfigUnavailable(domain.into());
				self.record_failure(&url, &err);
				Err(err)
			}
		}
	}

	/// Short-circuit with the cached failure if a recent attempt failed
	fn check_failure(&self, url: &str, domain: &str) -> WnResult<()> {
		let mut failures = self.failures.write();
		if let Some(entry) = failures.get(url) {
			if entry.is_expired() {
				failures.pop(url);
				return Ok(());
			}
			debug!("cached fetch failure for {} (kind: {:?})", url, entry.kind);
			return Err(if url.ends_with(NOTIFY_CONFIG_PATH) {
				Error::ConfigUnavailable(domain.into())
			} else {
				match entry.kind {
					FailureKind::Network => Error::DidDocUnavailable(domain.into()),
					FailureKind::Document => Error::DidDocMalformed(domain.into()),
				}
			});
		}
		Ok(())
	}

	fn record_failure(&self, url: &str, error: &Error) {
		self.failures.write().put(url.to_string(), FailureEntry::new(FailureKind::from_error(error)));
	}

	fn clear_failure(&self, url: &str) {
		self.failures.write().pop(url);
	}
}

impl std::fmt::Debug for DidResolver {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("DidResolver")
			.field("identities", &self.identities.read().len())
			.field("configs", &self.configs.read().len())
			.field("failures", &self.failures.read().len())
			.finish_non_exhaustive()
	}
}

/// Extract the key agreement and authentication keys from a DID document
fn parse_did_document(domain: &str, doc: &serde_json::Value) -> WnResult<DappIdentity> {
	let key_agreement = first_reference(doc, "keyAgreement")
		.ok_or_else(|| Error::DidDocMalformed(domain.into()))?;
	let authentication = first_reference(doc, "authentication")
		.ok_or_else(|| Error::DidDocMalformed(domain.into()))?;

	Ok(DappIdentity {
		key_agreement: verification_method_key(doc, key_agreement)?,
		authentication: verification_method_key(doc, authentication)?,
	})
}

/// First entry of a verification relationship (`keyAgreement` or
/// `authentication`)
fn first_reference<'doc>(doc: &'doc serde_json::Value, relationship: &str) -> Option<&'doc str> {
	doc.get(relationship)?.as_array()?.first()?.as_str()
}

/// Look up a verification method by reference and decode its JWK `x`
/// coordinate to hex. References may be absolute or `#fragment`-relative.
fn verification_method_key(doc: &serde_json::Value, reference: &str) -> WnResult<Box<str>> {
	let methods = doc
		.get("verificationMethod")
		.and_then(serde_json::Value::as_array)
		.ok_or_else(|| Error::VerificationMethodMissing(reference.into()))?;

	let method = methods
		.iter()
		.find(|method| {
			method.get("id").and_then(serde_json::Value::as_str).is_some_and(|id| {
				id == reference
					|| (reference.starts_with('#') && id.ends_with(reference))
			})
		})
		.ok_or_else(|| Error::VerificationMethodMissing(reference.into()))?;

	let x = method
		.get("publicKeyJwk")
		.and_then(|jwk| jwk.get("x"))
		.and_then(serde_json::Value::as_str)
		.ok_or_else(|| Error::VerificationMethodMissing(reference.into()))?;

	let raw = URL_SAFE_NO_PAD
		.decode(x.as_bytes())
		.map_err(|_| Error::VerificationMethodMissing(reference.into()))?;
	Ok(hex::encode(raw).into())
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use std::collections::HashMap;
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[derive(Debug, Default)]
	struct MockFetch {
		docs: HashMap<String, serde_json::Value>,
		calls: AtomicUsize,
	}

	#[async_trait]
	impl FetchAdapter for MockFetch {
		async fn fetch_json(&self, url: &str) -> WnResult<serde_json::Value> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.docs
				.get(url)
				.cloned()
				.ok_or_else(|| Error::NetworkError(format!("404 for {}", url)))
		}
	}

	fn did_doc(domain: &str, key_agreement: &[u8; 32], authentication: &[u8; 32]) -> serde_json::Value {
		serde_json::json!({
			"id": format!("did:web:{}", domain),
			"verificationMethod": [
				{
					"id": format!("did:web:{}#wc-notify-subscribe-key", domain),
					"type": "JsonWebKey2020",
					"publicKeyJwk": {
						"kty": "OKP", "crv": "X25519",
						"x": URL_SAFE_NO_PAD.encode(key_agreement),
					},
				},
				{
					"id": format!("did:web:{}#wc-notify-authentication-key", domain),
					"type": "JsonWebKey2020",
					"publicKeyJwk": {
						"kty": "OKP", "crv": "Ed25519",
						"x": URL_SAFE_NO_PAD.encode(authentication),
					},
				},
			],
			"keyAgreement": [format!("did:web:{}#wc-notify-subscribe-key", domain)],
			"authentication": [format!("did:web:{}#wc-notify-authentication-key", domain)],
		})
	}

	fn resolver_for(domain: &str) -> (DidResolver, Arc<MockFetch>) {
		let mut docs = HashMap::new();
		docs.insert(
			format!("https://{}{}", domain, DID_JSON_PATH),
			did_doc(domain, &[0x11; 32], &[0x22; 32]),
		);
		docs.insert(
			format!("https://{}{}", domain, NOTIFY_CONFIG_PATH),
			serde_json::json!({
				"name": "GM Dapp",
				"description": "gm",
				"icons": [],
				"types": [{"name": "gm_hourly", "description": "Hourly gm"}],
			}),
		);
		let fetch = Arc::new(MockFetch { docs, calls: AtomicUsize::new(0) });
		(DidResolver::new(fetch.clone()), fetch)
	}

	#[tokio::test]
	async fn test_resolve_keys() {
		let (resolver, _fetch) = resolver_for("gm.example");
		let identity = resolver.resolve_keys("gm.example").await.unwrap();
		assert_eq!(identity.key_agreement.as_ref(), hex::encode([0x11; 32]));
		assert_eq!(identity.authentication.as_ref(), hex::encode([0x22; 32]));
	}

	#[tokio::test]
	async fn test_resolve_keys_cached() {
		let (resolver, fetch) = resolver_for("gm.example");
		let first = resolver.resolve_keys("gm.example").await.unwrap();
		let second = resolver.resolve_keys("gm.example").await.unwrap();
		assert_eq!(first, second);
		assert_eq!(fetch.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_resolve_notify_config_cached() {
		let (resolver, fetch) = resolver_for("gm.example");
		let config = resolver.resolve_notify_config("gm.example").await.unwrap();
		assert_eq!(config.types.len(), 1);
		resolver.resolve_notify_config("gm.example").await.unwrap();
		assert_eq!(fetch.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_unreachable_domain() {
		let fetch = Arc::new(MockFetch::default());
		let resolver = DidResolver::new(fetch.clone());
		let err = resolver.resolve_keys("down.example").await.unwrap_err();
		assert!(matches!(err, Error::DidDocUnavailable(_)));
		// Second attempt is served from the failure cache
		let err = resolver.resolve_keys("down.example").await.unwrap_err();
		assert!(matches!(err, Error::DidDocUnavailable(_)));
		assert_eq!(fetch.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_malformed_did_doc() {
		let mut docs = HashMap::new();
		docs.insert(
			format!("https://bad.example{}", DID_JSON_PATH),
			serde_json::json!({"id": "did:web:bad.example"}),
		);
		let resolver =
			DidResolver::new(Arc::new(MockFetch { docs, calls: AtomicUsize::new(0) }));
		let err = resolver.resolve_keys("bad.example").await.unwrap_err();
		assert!(matches!(err, Error::DidDocMalformed(_)));
	}

	#[tokio::test]
	async fn test_missing_verification_method() {
		let mut doc = did_doc("gm.example", &[0x11; 32], &[0x22; 32]);
		doc["keyAgreement"] = serde_json::json!(["did:web:gm.example#missing"]);
		let mut docs = HashMap::new();
		docs.insert(format!("https://gm.example{}", DID_JSON_PATH), doc);
		let resolver =
			DidResolver::new(Arc::new(MockFetch { docs, calls: AtomicUsize::new(0) }));
		let err = resolver.resolve_keys("gm.example").await.unwrap_err();
		assert!(matches!(err, Error::VerificationMethodMissing(_)));
	}

	#[test]
	fn test_fragment_relative_reference() {
		let mut doc = did_doc("gm.example", &[0x11; 32], &[0x22; 32]);
		doc["keyAgreement"] = serde_json::json!(["#wc-notify-subscribe-key"]);
		let identity = parse_did_document("gm.example", &doc).unwrap();
		assert_eq!(identity.key_agreement.as_ref(), hex::encode([0x11; 32]));
	}
}

// vim: ts=4
