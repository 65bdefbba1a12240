//! Shared fixtures for engine integration tests: a loopback relay, a
//! counting document fetcher, and peer-side (dapp / notify server) protocol
//! helpers built on the reference adapters.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

use walletnotify::auth::{did_pkh, encode_ed25519_did_key};
use walletnotify::crypto_adapter::CryptoAdapter;
use walletnotify::event::NotifyEvent;
use walletnotify::fetch_adapter::FetchAdapter;
use walletnotify::identity_adapter::{IdentityAdapter, OnSign};
use walletnotify::prelude::*;
use walletnotify::relay_adapter::{PublishOptions, RelayAdapter, RelayMessage};
use walletnotify::types::{PendingRequest, Subscription, TopicMessages};
use walletnotify::{NotifyEngine, NotifyEngineBuilder};
use walletnotify_crypto_adapter_dalek::CryptoAdapterDalek;
use walletnotify_identity_adapter_local::IdentityAdapterLocal;
use walletnotify_store_adapter_mem::{ExpirerAdapterMem, StoreAdapterMem};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

pub const DAPP_DOMAIN: &str = "gm.example";
pub const SERVER_DOMAIN: &str = "notify.test";

/// A message captured by the loopback relay
#[derive(Clone, Debug)]
pub struct Published {
	pub topic: Box<str>,
	pub message: Vec<u8>,
	pub tag: u32,
	pub ttl: i64,
	pub prompt: bool,
}

/// Loopback relay: captures everything the engine publishes and lets tests
/// inject inbound traffic
#[derive(Debug)]
pub struct MockRelay {
	tx: broadcast::Sender<RelayMessage>,
	published: Mutex<Vec<Published>>,
	/// ("subscribe" | "unsubscribe", topic) in call order
	log: Mutex<Vec<(String, Box<str>)>>,
}

impl MockRelay {
	pub fn new() -> Self {
		let (tx, _rx) = broadcast::channel(64);
		Self { tx, published: Mutex::new(Vec::new()), log: Mutex::new(Vec::new()) }
	}

	pub fn inject(&self, topic: &str, message: Vec<u8>) {
		let _ignore = self.tx.send(RelayMessage {
			topic: topic.into(),
			message,
			published_at: Timestamp::now().millis(),
		});
	}

	pub fn take_published(&self, tag: u32) -> Option<Published> {
		let mut published = self.published.lock().unwrap();
		let index = published.iter().position(|p| p.tag == tag)?;
		Some(published.remove(index))
	}

	pub async fn wait_for_tag(&self, tag: u32) -> Published {
		for _ in 0..200 {
			if let Some(published) = self.take_published(tag) {
				return published;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		panic!("nothing published with tag {}", tag);
	}

	pub fn subscribed_topics(&self) -> Vec<Box<str>> {
		self.log
			.lock()
			.unwrap()
			.iter()
			.filter(|(action, _)| action == "subscribe")
			.map(|(_, topic)| topic.clone())
			.collect()
	}

	pub fn unsubscribed_topics(&self) -> Vec<Box<str>> {
		self.log
			.lock()
			.unwrap()
			.iter()
			.filter(|(action, _)| action == "unsubscribe")
			.map(|(_, topic)| topic.clone())
			.collect()
	}
}

#[async_trait]
impl RelayAdapter for MockRelay {
	async fn publish(&self, topic: &str, message: &[u8], opts: &PublishOptions) -> WnResult<()> {
		self.published.lock().unwrap().push(Published {
			topic: topic.into(),
			message: message.to_vec(),
			tag: opts.tag,
			ttl: opts.ttl,
			prompt: opts.prompt,
		});
		Ok(())
	}

	async fn subscribe(&self, topic: &str) -> WnResult<()> {
		self.log.lock().unwrap().push(("subscribe".into(), topic.into()));
		Ok(())
	}

	async fn unsubscribe(&self, topic: &str) -> WnResult<()> {
		self.log.lock().unwrap().push(("unsubscribe".into(), topic.into()));
		Ok(())
	}

	fn messages(&self) -> broadcast::Receiver<RelayMessage> {
		self.tx.subscribe()
	}
}

/// Document fetcher with per-URL call counting
#[derive(Debug, Default)]
pub struct MockFetch {
	docs: Mutex<HashMap<String, Value>>,
	calls: Mutex<HashMap<String, usize>>,
	total: AtomicUsize,
}

impl MockFetch {
	pub fn insert(&self, url: impl Into<String>, doc: Value) {
		self.docs.lock().unwrap().insert(url.into(), doc);
	}

	pub fn calls_for(&self, url: &str) -> usize {
		self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
	}

	pub fn did_json_calls(&self, domain: &str) -> usize {
		self.calls_for(&format!("https://{}/.well-known/did.json", domain))
	}
}

#[async_trait]
impl FetchAdapter for MockFetch {
	async fn fetch_json(&self, url: &str) -> WnResult<Value> {
		*self.calls.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;
		self.total.fetch_add(1, Ordering::SeqCst);
		self.docs
			.lock()
			.unwrap()
			.get(url)
			.cloned()
			.ok_or_else(|| Error::NetworkError(format!("404 for {}", url)))
	}
}

/// A protocol peer (dapp or notify server) with its own key material
pub struct Peer {
	pub domain: String,
	pub account: AccountId,
	pub crypto: CryptoAdapterDalek,
	pub identity: IdentityAdapterLocal,
	pub key_agreement: Box<str>,
	pub authentication: Box<str>,
}

impl Peer {
	pub async fn new(domain: &str) -> Self {
		let crypto = CryptoAdapterDalek::new();
		let key_agreement = crypto.generate_key_pair().await.unwrap();

		let identity = IdentityAdapterLocal::new();
		let account = AccountId::from(format!("peer:0:{}", domain).as_str());
		identity
			.register_identity(walletnotify::identity_adapter::RegisterIdentityParams {
				account: account.clone(),
				on_sign: approve(),
				statement: "peer".into(),
				domain: domain.into(),
			})
			.await
			.unwrap();
		let authentication = identity.identity_key(&account).await.unwrap();

		Self { domain: domain.to_string(), account, crypto, identity, key_agreement, authentication }
	}

	pub fn did_doc(&self) -> Value {
		let ka = URL_SAFE_NO_PAD.encode(hex::decode(self.key_agreement.as_ref()).unwrap());
		let auth = URL_SAFE_NO_PAD.encode(hex::decode(self.authentication.as_ref()).unwrap());
		json!({
			"id": format!("did:web:{}", self.domain),
			"verificationMethod": [
				{
					"id": format!("did:web:{}#wc-notify-subscribe-key", self.domain),
					"type": "JsonWebKey2020",
					"publicKeyJwk": { "kty": "OKP", "crv": "X25519", "x": ka },
				},
				{
					"id": format!("did:web:{}#wc-notify-authentication-key", self.domain),
					"type": "JsonWebKey2020",
					"publicKeyJwk": { "kty": "OKP", "crv": "Ed25519", "x": auth },
				},
			],
			"keyAgreement": [format!("did:web:{}#wc-notify-subscribe-key", self.domain)],
			"authentication": [format!("did:web:{}#wc-notify-authentication-key", self.domain)],
		})
	}

	pub fn notify_config(&self) -> Value {
		json!({
			"name": "GM Dapp",
			"description": "Daily gm notifications",
			"icons": ["https://gm.example/icon.png"],
			"types": [
				{ "name": "gm_hourly", "description": "Hourly gm" },
				{ "name": "gm_daily", "description": "Daily gm" },
			],
		})
	}

	pub async fn sign(&self, claims: Value) -> Box<str> {
		self.identity.sign_claims(&self.account, claims).await.unwrap()
	}

	/// Base claims for peer-issued JWTs
	pub fn base_claims(&self, act: &str, wallet_account: &AccountId) -> Value {
		let now = Timestamp::now().0;
		json!({
			"iat": now,
			"exp": now + 3600,
			"iss": encode_ed25519_did_key(&self.authentication).unwrap(),
			"aud": "did:key:z6MkwalletPlaceholder",
			"sub": did_pkh(wallet_account),
			"act": act,
		})
	}
}

/// Engine plus every collaborator the tests poke at
pub struct Harness {
	pub engine: NotifyEngine,
	pub relay: Arc<MockRelay>,
	pub crypto: Arc<CryptoAdapterDalek>,
	pub identity: Arc<IdentityAdapterLocal>,
	pub expirer: Arc<ExpirerAdapterMem>,
	pub fetch: Arc<MockFetch>,
	pub subscription_store: Arc<StoreAdapterMem<Subscription>>,
	pub message_store: Arc<StoreAdapterMem<TopicMessages>>,
	pub request_store: Arc<StoreAdapterMem<PendingRequest>>,
	pub dapp: Peer,
	pub server: Peer,
}

pub fn approve() -> OnSign {
	Box::new(|_message| Box::pin(async { Ok("0xsignature".to_string()) }))
}

pub async fn harness() -> Harness {
	let _ignore = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();

	let dapp = Peer::new(DAPP_DOMAIN).await;
	let server = Peer::new(SERVER_DOMAIN).await;

	let fetch = Arc::new(MockFetch::default());
	fetch.insert(format!("https://{}/.well-known/did.json", DAPP_DOMAIN), dapp.did_doc());
	fetch.insert(
		format!("https://{}/.well-known/wc-notify-config.json", DAPP_DOMAIN),
		dapp.notify_config(),
	);
	fetch.insert(format!("https://{}/.well-known/did.json", SERVER_DOMAIN), server.did_doc());

	let relay = Arc::new(MockRelay::new());
	let crypto = Arc::new(CryptoAdapterDalek::new());
	let identity = Arc::new(IdentityAdapterLocal::new());
	let expirer = Arc::new(ExpirerAdapterMem::new());
	let subscription_store = Arc::new(StoreAdapterMem::new("subscriptions"));
	let message_store = Arc::new(StoreAdapterMem::new("messages"));
	let request_store = Arc::new(StoreAdapterMem::new("requests"));

	let engine = NotifyEngineBuilder::new()
		.relay(relay.clone())
		.crypto(crypto.clone())
		.identity(identity.clone())
		.expirer(expirer.clone())
		.fetch(fetch.clone())
		.subscription_store(subscription_store.clone())
		.message_store(message_store.clone())
		.request_store(request_store.clone())
		.notify_server_domain(SERVER_DOMAIN)
		.build()
		.unwrap();

	Harness {
		engine,
		relay,
		crypto,
		identity,
		expirer,
		fetch,
		subscription_store,
		message_store,
		request_store,
		dapp,
		server,
	}
}

impl Harness {
	/// Answer the pending watch request with a server-authoritative `sbs`
	/// list; returns the watch response topic for later pushes
	pub async fn server_answer_watch(
		&self,
		wallet_account: &AccountId,
		sbs: Vec<Value>,
	) -> Box<str> {
		let published = self.relay.wait_for_tag(4010).await;
		let sender = hex::encode(&published.message[1..33]);
		let payload =
			self.server.crypto.decode(&published.topic, &published.message).await.unwrap();
		let request: Value = serde_json::from_str(&payload).unwrap();
		let id = request["id"].as_u64().unwrap();

		let response_topic = self
			.server
			.crypto
			.generate_shared_key(&self.server.key_agreement, &sender)
			.await
			.unwrap();

		let mut claims =
			self.server.base_claims("notify_watch_subscriptions_response", wallet_account);
		claims["sbs"] = Value::Array(sbs);
		let jwt = self.server.sign(claims).await;

		let response = json!({
			"id": id, "jsonrpc": "2.0",
			"result": { "responseAuth": jwt },
		});
		let sealed = self
			.server
			.crypto
			.encode(&response_topic, &response.to_string(), None)
			.await
			.unwrap();
		self.relay.inject(&response_topic, sealed);
		response_topic
	}

	/// Push a `wc_notifySubscriptionsChanged` notification on the watch
	/// response topic
	pub async fn server_push_changed(
		&self,
		response_topic: &str,
		wallet_account: &AccountId,
		sbs: Vec<Value>,
	) {
		let mut claims = self.server.base_claims("notify_subscriptions_changed", wallet_account);
		claims["sbs"] = Value::Array(sbs);
		let jwt = self.server.sign(claims).await;

		let request = json!({
			"id": walletnotify::utils::random_request_id(),
			"jsonrpc": "2.0",
			"method": "wc_notifySubscriptionsChanged",
			"params": { "subscriptionsChangedAuth": jwt },
		});
		let sealed = self
			.server
			.crypto
			.encode(response_topic, &request.to_string(), None)
			.await
			.unwrap();
		self.relay.inject(response_topic, sealed);
	}

	/// Decode the pending subscribe request and answer it on the derived
	/// response topic; returns the request id
	pub async fn dapp_answer_subscribe(&self) -> u64 {
		let published = self.relay.wait_for_tag(4000).await;
		let sender = hex::encode(&published.message[1..33]);
		let payload =
			self.dapp.crypto.decode(&published.topic, &published.message).await.unwrap();
		let request: Value = serde_json::from_str(&payload).unwrap();
		assert_eq!(request["method"], "wc_notifySubscribe");
		let id = request["id"].as_u64().unwrap();

		let response_topic = self
			.dapp
			.crypto
			.generate_shared_key(&self.dapp.key_agreement, &sender)
			.await
			.unwrap();

		let now = Timestamp::now().0;
		let jwt = self
			.dapp
			.sign(json!({
				"iat": now, "exp": now + 3600,
				"iss": encode_ed25519_did_key(&self.dapp.authentication).unwrap(),
				"aud": "did:key:z6MkwalletPlaceholder",
				"sub": "",
				"act": "notify_subscription_response",
			}))
			.await;
		let response = json!({
			"id": id, "jsonrpc": "2.0",
			"result": { "responseAuth": jwt },
		});
		let sealed = self
			.dapp
			.crypto
			.encode(&response_topic, &response.to_string(), None)
			.await
			.unwrap();
		self.relay.inject(&response_topic, sealed);
		id
	}

	/// Encode and inject an inbound `wc_notifyMessage` on a subscription
	/// topic; returns the request id used
	pub async fn dapp_send_message(
		&self,
		subscription_topic: &str,
		sym_key: &str,
		wallet_account: &AccountId,
		msg: Value,
	) -> u64 {
		self.dapp.crypto.set_sym_key(sym_key, subscription_topic).await.unwrap();

		let mut claims = self.dapp.base_claims("notify_message", wallet_account);
		claims["app"] = json!(format!("did:web:{}", self.dapp.domain));
		claims["msg"] = msg;
		let jwt = self.dapp.sign(claims).await;

		let id = walletnotify::utils::random_request_id();
		let request = json!({
			"id": id, "jsonrpc": "2.0",
			"method": "wc_notifyMessage",
			"params": { "messageAuth": jwt },
		});
		let sealed = self
			.dapp
			.crypto
			.encode(subscription_topic, &request.to_string(), None)
			.await
			.unwrap();
		self.relay.inject(subscription_topic, sealed);
		id
	}
}

/// Server subscription entry for `sbs[]` claims
pub fn sb_entry(account: &AccountId, sym_key: &str, scope: &[&str], app_domain: &str) -> Value {
	json!({
		"account": account,
		"symKey": sym_key,
		"scope": scope,
		"expiry": Timestamp::now().add_seconds(30 * 86400).0,
		"appDomain": app_domain,
	})
}

/// Random 32-byte symmetric key as hex
pub fn random_sym_key() -> String {
	use rand_core::RngCore;
	let mut raw = [0u8; 32];
	rand_core::OsRng.fill_bytes(&mut raw);
	hex::encode(raw)
}

/// The literal test message from the protocol examples
pub fn test_message() -> Value {
	json!({
		"title": "Test Message",
		"body": "Test",
		"icon": "",
		"url": "https://test.coms",
		"type": "gm_hourly",
	})
}

pub async fn next_event(events: &mut broadcast::Receiver<NotifyEvent>) -> NotifyEvent {
	tokio::time::timeout(Duration::from_secs(2), events.recv())
		.await
		.expect("timed out waiting for engine event")
		.expect("event stream closed")
}

/// Skip events until one matches
pub async fn wait_for_event(
	events: &mut broadcast::Receiver<NotifyEvent>,
	matches: impl Fn(&NotifyEvent) -> bool,
) -> NotifyEvent {
	for _ in 0..20 {
		let event = next_event(events).await;
		if matches(&event) {
			return event;
		}
	}
	panic!("expected event did not arrive");
}

// vim: ts=4
