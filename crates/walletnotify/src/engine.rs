//! Engine facade - assembles the adapters and exposes the public operations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

use walletnotify_types::crypto_adapter::{CryptoAdapter, EncodeOptions};
use walletnotify_types::expirer_adapter::ExpirerAdapter;
use walletnotify_types::fetch_adapter::FetchAdapter;
use walletnotify_types::identity_adapter::{IdentityAdapter, OnSign, RegisterIdentityParams};
use walletnotify_types::relay_adapter::{PublishOptions, RelayAdapter};
use walletnotify_types::store_adapter::StoreAdapter;
use walletnotify_types::types::{
	DappMetadata, MessageRecord, NotifyMessage, PendingRequest, RequestContext, Subscription,
	TopicMessages,
};

use crate::auth::{
	self, act, AppClaims, BaseClaims, MessageClaims, SubscriptionClaims,
	WatchSubscriptionsClaims, JWT_SCP_SEPARATOR, LIMITED_IDENTITY_STATEMENT,
	UNLIMITED_IDENTITY_STATEMENT,
};
use crate::did::DidResolver;
use crate::dispatcher;
use crate::envelope::EnvelopeCodec;
use crate::event::{EventEmitter, NotifyEvent, DEFAULT_EVENT_CAPACITY};
use crate::ledger::RequestLedger;
use crate::messages::Messages;
use crate::prelude::*;
use crate::rpc::{
	DeleteParams, NotifyMethod, RequestParams, RpcPayload, RpcRequest, SubscribeParams,
	UpdateParams, WatchSubscriptionsParams,
};
use crate::subscriptions::Subscriptions;
use crate::topic;

pub const DEFAULT_KEYSERVER_URL: &str = "https://keys.walletconnect.com";
pub const DEFAULT_NOTIFY_SERVER_DOMAIN: &str = "notify.walletconnect.com";

/// Everything the engine's tasks share
#[derive(Debug)]
pub(crate) struct EngineInner {
	pub relay: Arc<dyn RelayAdapter>,
	pub crypto: Arc<dyn CryptoAdapter>,
	pub identity: Arc<dyn IdentityAdapter>,
	pub expirer: Arc<dyn ExpirerAdapter>,
	pub resolver: DidResolver,
	pub codec: EnvelopeCodec,
	pub ledger: RequestLedger,
	pub subscriptions: Subscriptions,
	pub messages: Messages,
	pub events: EventEmitter,
	pub keyserver_url: Box<str>,
	pub notify_server_domain: Box<str>,
}

impl EngineInner {
	/// Seal and publish a request with its method's tag and TTL
	async fn publish_request(
		&self,
		topic: &str,
		request: &RpcRequest,
		opts: Option<&EncodeOptions>,
	) -> WnResult<()> {
		let method = request.params.method();
		let bytes = self.codec.encode_request(topic, request, opts).await?;
		self.relay
			.publish(
				topic,
				&bytes,
				&PublishOptions { ttl: method.req_ttl(), tag: method.req_tag(), prompt: false },
			)
			.await
	}

	/// Open the watch channel with the notify server for one account:
	/// resolve the server's keys, derive the watch and response topics from a
	/// persistent keypair, and send `wc_notifyWatchSubscriptions`.
	pub(crate) async fn watch_subscriptions(&self, account: &AccountId) -> WnResult<()> {
		let identity_key = self.identity.identity_key(account).await?;
		let server = self.resolver.resolve_keys(&self.notify_server_domain).await?;
		let watch_topic = topic::subscribe_topic(&server.key_agreement)?;

		// The watch keypair is persistent so this device's response topic is
		// stable across restarts
		let tag = format!("watch:{}", account);
		let public_key = match self.crypto.key_pair_by_tag(&tag).await? {
			Some(public_key) => public_key,
			None => {
				let public_key = self.crypto.generate_key_pair().await?;
				self.crypto.tag_key_pair(&tag, &public_key).await?;
				public_key
			}
		};
		let response_topic =
			self.crypto.generate_shared_key(&public_key, &server.key_agreement).await?;
		self.relay.subscribe(&response_topic).await?;

		let claims = WatchSubscriptionsClaims {
			base: BaseClaims::new(
				act::NOTIFY_WATCH_SUBSCRIPTIONS,
				&identity_key,
				auth::encode_ed25519_did_key(&server.authentication)?,
				account,
				&self.keyserver_url,
			)?,
		};
		let watch_subscriptions_auth =
			self.identity.sign_claims(account, serde_json::to_value(&claims)?).await?;

		let request = RpcRequest::new(RequestParams::WatchSubscriptions(
			WatchSubscriptionsParams { watch_subscriptions_auth },
		));
		self.ledger
			.insert(
				PendingRequest {
					id: request.id,
					topic: response_topic,
					method: NotifyMethod::WatchSubscriptions.as_str().into(),
					request: RequestContext {
						account: account.clone(),
						metadata: None,
						public_key: Some(public_key.clone()),
						scope: None,
						scope_update: None,
					},
				},
				NotifyMethod::WatchSubscriptions.req_ttl(),
			)
			.await?;

		let opts = EncodeOptions::type1(public_key, server.key_agreement);
		self.publish_request(&watch_topic, &request, Some(&opts)).await
	}
}

/// Receipt for an accepted subscribe request
#[derive(Clone, Debug)]
pub struct SubscribeTicket {
	pub id: u64,
	pub subscription_auth: Box<str>,
}

pub struct NotifyEngineBuilder {
	relay: Option<Arc<dyn RelayAdapter>>,
	crypto: Option<Arc<dyn CryptoAdapter>>,
	identity: Option<Arc<dyn IdentityAdapter>>,
	expirer: Option<Arc<dyn ExpirerAdapter>>,
	fetch: Option<Arc<dyn FetchAdapter>>,
	subscription_store: Option<Arc<dyn StoreAdapter<Subscription>>>,
	message_store: Option<Arc<dyn StoreAdapter<TopicMessages>>>,
	request_store: Option<Arc<dyn StoreAdapter<PendingRequest>>>,
	keyserver_url: Box<str>,
	notify_server_domain: Box<str>,
	event_capacity: usize,
}

impl NotifyEngineBuilder {
	pub fn new() -> Self {
		Self {
			relay: None,
			crypto: None,
			identity: None,
			expirer: None,
			fetch: None,
			subscription_store: None,
			message_store: None,
			request_store: None,
			keyserver_url: DEFAULT_KEYSERVER_URL.into(),
			notify_server_domain: DEFAULT_NOTIFY_SERVER_DOMAIN.into(),
			event_capacity: DEFAULT_EVENT_CAPACITY,
		}
	}

	// Adapters
	pub fn relay(&mut self, relay: Arc<dyn RelayAdapter>) -> &mut Self {
		self.relay = Some(relay);
		self
	}
	pub fn crypto(&mut self, crypto: Arc<dyn CryptoAdapter>) -> &mut Self {
		self.crypto = Some(crypto);
		self
	}
	pub fn identity(&mut self, identity: Arc<dyn IdentityAdapter>) -> &mut Self {
		self.identity = Some(identity);
		self
	}
	pub fn expirer(&mut self, expirer: Arc<dyn ExpirerAdapter>) -> &mut Self {
		self.expirer = Some(expirer);
		self
	}
	pub fn fetch(&mut self, fetch: Arc<dyn FetchAdapter>) -> &mut Self {
		self.fetch = Some(fetch);
		self
	}
	pub fn subscription_store(
		&mut self,
		store: Arc<dyn StoreAdapter<Subscription>>,
	) -> &mut Self {
		self.subscription_store = Some(store);
		self
	}
	pub fn message_store(&mut self, store: Arc<dyn StoreAdapter<TopicMessages>>) -> &mut Self {
		self.message_store = Some(store);
		self
	}
	pub fn request_store(&mut self, store: Arc<dyn StoreAdapter<PendingRequest>>) -> &mut Self {
		self.request_store = Some(store);
		self
	}

	// Options
	pub fn keyserver_url(&mut self, keyserver_url: impl Into<Box<str>>) -> &mut Self {
		self.keyserver_url = keyserver_url.into();
		self
	}
	pub fn notify_server_domain(&mut self, domain: impl Into<Box<str>>) -> &mut Self {
		self.notify_server_domain = domain.into();
		self
	}
	pub fn event_capacity(&mut self, capacity: usize) -> &mut Self {
		self.event_capacity = capacity;
		self
	}

	/// Assemble the engine and start its dispatch loops
	pub fn build(&mut self) -> WnResult<NotifyEngine> {
		let relay = self.relay.take().ok_or_else(|| missing("relay"))?;
		let crypto = self.crypto.take().ok_or_else(|| missing("crypto"))?;
		let identity = self.identity.take().ok_or_else(|| missing("identity"))?;
		let expirer = self.expirer.take().ok_or_else(|| missing("expirer"))?;
		let fetch = self.fetch.take().ok_or_else(|| missing("fetch"))?;
		let subscription_store =
			self.subscription_store.take().ok_or_else(|| missing("subscription store"))?;
		let message_store = self.message_store.take().ok_or_else(|| missing("message store"))?;
		let request_store = self.request_store.take().ok_or_else(|| missing("request store"))?;

		let inner = Arc::new(EngineInner {
			codec: EnvelopeCodec::new(crypto.clone()),
			resolver: DidResolver::new(fetch),
			ledger: RequestLedger::new(request_store, expirer.clone()),
			subscriptions: Subscriptions::new(subscription_store),
			messages: Messages::new(message_store),
			events: EventEmitter::new(self.event_capacity),
			relay,
			crypto,
			identity,
			expirer,
			keyserver_url: std::mem::take(&mut self.keyserver_url),
			notify_server_domain: std::mem::take(&mut self.notify_server_domain),
		});

		let tasks = vec![
			dispatcher::spawn_message_loop(inner.clone()),
			dispatcher::spawn_expiry_loop(inner.clone()),
		];
		Ok(NotifyEngine { inner, tasks, started: AtomicBool::new(true) })
	}
}

impl Default for NotifyEngineBuilder {
	fn default() -> Self {
		Self::new()
	}
}

fn missing(adapter: &str) -> Error {
	error!("cannot build engine: no {} adapter configured", adapter);
	Error::NotInitialized
}

/// The wallet-side notify client
pub struct NotifyEngine {
	inner: Arc<EngineInner>,
	tasks: Vec<JoinHandle<()>>,
	started: AtomicBool,
}

impl NotifyEngine {
	pub fn builder() -> NotifyEngineBuilder {
		NotifyEngineBuilder::new()
	}

	/// Stream of engine events
	pub fn events(&self) -> tokio::sync::broadcast::Receiver<NotifyEvent> {
		self.inner.events.subscribe()
	}

	/// Stop the dispatch loops. Public operations fail with `NotInitialized`
	/// afterwards.
	pub fn shutdown(&self) {
		self.started.store(false, Ordering::SeqCst);
		for task in &self.tasks {
			task.abort();
		}
	}

	fn ensure_started(&self) -> WnResult<()> {
		if self.started.load(Ordering::SeqCst) {
			Ok(())
		} else {
			Err(Error::NotInitialized)
		}
	}

	/// Register an account's identity key and open its watch channel.
	/// Registration succeeding is enough for this call to succeed; a watch
	/// failure is logged and retried on the next register.
	pub async fn register(
		&self,
		account: &AccountId,
		on_sign: OnSign,
		is_limited: bool,
		domain: &str,
	) -> WnResult<Box<str>> {
		self.ensure_started()?;
		let statement =
			if is_limited { LIMITED_IDENTITY_STATEMENT } else { UNLIMITED_IDENTITY_STATEMENT };
		let identity_key = self
			.inner
			.identity
			.register_identity(RegisterIdentityParams {
				account: account.clone(),
				on_sign,
				statement: statement.into(),
				domain: domain.into(),
			})
			.await?;
		info!("registered identity for {}", account);

		if let Err(err) = self.inner.watch_subscriptions(account).await {
			warn!("watch subscriptions failed for {}: {}", account, err);
		}
		Ok(identity_key)
	}

	/// Subscribe `account` to a dapp's notifications, requesting every scope
	/// the dapp declares. The subscription itself arrives asynchronously via
	/// a `SubscriptionsChanged` event.
	pub async fn subscribe(
		&self,
		app_domain: &str,
		account: &AccountId,
	) -> WnResult<SubscribeTicket> {
		self.ensure_started()?;
		let inner = &self.inner;

		let identity_key = inner.identity.identity_key(account).await?;
		let dapp = inner.resolver.resolve_keys(app_domain).await?;
		let config = inner.resolver.resolve_notify_config(app_domain).await?;
		let subscribe_topic = topic::subscribe_topic(&dapp.key_agreement)?;

		// Ephemeral keypair for this exchange only
		let public_key = inner.crypto.generate_key_pair().await?;
		let response_topic =
			inner.crypto.generate_shared_key(&public_key, &dapp.key_agreement).await?;
		inner.relay.subscribe(&response_topic).await?;

		let scope: Vec<Box<str>> =
			config.types.iter().map(|declared| declared.name.clone()).collect();
		let claims = SubscriptionClaims {
			base: BaseClaims::new(
				act::NOTIFY_SUBSCRIPTION,
				&identity_key,
				auth::encode_ed25519_did_key(&dapp.authentication)?,
				account,
				&inner.keyserver_url,
			)?,
			scp: scope.join(JWT_SCP_SEPARATOR).into(),
			app: auth::did_web(app_domain).into(),
		};
		let subscription_auth =
			inner.identity.sign_claims(account, serde_json::to_value(&claims)?).await?;

		let request = RpcRequest::new(RequestParams::Subscribe(SubscribeParams {
			subscription_auth: subscription_auth.clone(),
		}));
		// Ledger before publish: an instantaneous response must correlate
		inner
			.ledger
			.insert(
				PendingRequest {
					id: request.id,
					topic: response_topic,
					method: NotifyMethod::Subscribe.as_str().into(),
					request: RequestContext {
						account: account.clone(),
						metadata: Some(DappMetadata {
							name: config.name,
							description: config.description,
							icons: config.icons,
							app_domain: app_domain.into(),
						}),
						public_key: Some(public_key.clone()),
						scope: Some(scope),
						scope_update: None,
					},
				},
				NotifyMethod::Subscribe.req_ttl(),
			)
			.await?;

		let opts = EncodeOptions::type1(public_key, dapp.key_agreement);
		inner.publish_request(&subscribe_topic, &request, Some(&opts)).await?;

		Ok(SubscribeTicket { id: request.id, subscription_auth })
	}

	/// Request a scope change for a subscription. The change lands locally
	/// via reconciliation once the server confirms.
	pub async fn update(&self, subscription_topic: &str, scope: &[&str]) -> WnResult<bool> {
		self.ensure_started()?;
		let inner = &self.inner;

		let subscription = inner.subscriptions.get(subscription_topic).await?;
		let identity_key = inner.identity.identity_key(&subscription.account).await?;
		let dapp = inner.resolver.resolve_keys(&subscription.metadata.app_domain).await?;

		let claims = SubscriptionClaims {
			base: BaseClaims::new(
				act::NOTIFY_UPDATE,
				&identity_key,
				auth::encode_ed25519_did_key(&dapp.authentication)?,
				&subscription.account,
				&inner.keyserver_url,
			)?,
			scp: scope.join(JWT_SCP_SEPARATOR).into(),
			app: auth::did_web(&subscription.metadata.app_domain).into(),
		};
		let update_auth = inner
			.identity
			.sign_claims(&subscription.account, serde_json::to_value(&claims)?)
			.await?;

		let request = RpcRequest::new(RequestParams::Update(UpdateParams { update_auth }));
		inner
			.ledger
			.insert(
				PendingRequest {
					id: request.id,
					topic: subscription_topic.into(),
					method: NotifyMethod::Update.as_str().into(),
					request: RequestContext {
						account: subscription.account.clone(),
						metadata: Some(subscription.metadata.clone()),
						public_key: None,
						scope: None,
						scope_update: Some(
							scope.iter().map(|name| Box::from(*name)).collect(),
						),
					},
				},
				NotifyMethod::Update.req_ttl(),
			)
			.await?;

		inner.publish_request(subscription_topic, &request, None).await?;
		Ok(true)
	}

	/// Ask the dapp to delete a subscription. Local cleanup happens when the
	/// server confirms via `subscriptions_changed`.
	pub async fn delete_subscription(&self, subscription_topic: &str) -> WnResult<()> {
		self.ensure_started()?;
		let inner = &self.inner;

		let subscription = inner.subscriptions.get(subscription_topic).await?;
		let identity_key = inner.identity.identity_key(&subscription.account).await?;
		let dapp = inner.resolver.resolve_keys(&subscription.metadata.app_domain).await?;

		let claims = AppClaims {
			base: BaseClaims::new(
				act::NOTIFY_DELETE,
				&identity_key,
				auth::encode_ed25519_did_key(&dapp.authentication)?,
				&subscription.account,
				&inner.keyserver_url,
			)?,
			app: auth::did_web(&subscription.metadata.app_domain).into(),
		};
		let delete_auth = inner
			.identity
			.sign_claims(&subscription.account, serde_json::to_value(&claims)?)
			.await?;

		let request = RpcRequest::new(RequestParams::Delete(DeleteParams { delete_auth }));
		inner
			.ledger
			.insert(
				PendingRequest {
					id: request.id,
					topic: subscription_topic.into(),
					method: NotifyMethod::Delete.as_str().into(),
					request: RequestContext {
						account: subscription.account.clone(),
						metadata: Some(subscription.metadata.clone()),
						public_key: None,
						scope: None,
						scope_update: None,
					},
				},
				NotifyMethod::Delete.req_ttl(),
			)
			.await?;

		inner.publish_request(subscription_topic, &request, None).await
	}

	/// Decrypt a `wc_notifyMessage` envelope without touching any state.
	/// Used by hosts that receive raw pushes out of band.
	pub async fn decrypt_message(
		&self,
		subscription_topic: &str,
		ciphertext: &[u8],
	) -> WnResult<NotifyMessage> {
		self.ensure_started()?;
		let payload = self.inner.codec.decode(subscription_topic, ciphertext).await?;
		let RpcPayload::Request(request) = payload else {
			return Err(Error::InvalidMessagePayload("expected a request".into()));
		};
		let RequestParams::Message(params) = request.params else {
			return Err(Error::InvalidMessagePayload("expected wc_notifyMessage".into()));
		};
		let claims = auth::validate::<MessageClaims>(&params.message_auth, act::NOTIFY_MESSAGE)?;
		Ok(claims.msg)
	}

	/// All stored messages for a subscription topic, keyed by request id
	pub async fn message_history(
		&self,
		subscription_topic: &str,
	) -> WnResult<HashMap<u64, MessageRecord>> {
		self.ensure_started()?;
		self.inner.messages.history(subscription_topic).await
	}

	/// All active subscriptions, optionally filtered by account, keyed by
	/// topic
	pub async fn active_subscriptions(
		&self,
		account: Option<&AccountId>,
	) -> WnResult<HashMap<Box<str>, Subscription>> {
		self.ensure_started()?;
		Ok(self.inner.subscriptions.for_account(account).await)
	}

	/// Remove one stored message by its request id
	pub async fn delete_notify_message(&self, id: u64) -> WnResult<()> {
		self.ensure_started()?;
		self.inner.messages.delete_message(id).await
	}
}

impl Drop for NotifyEngine {
	fn drop(&mut self) {
		for task in &self.tasks {
			task.abort();
		}
	}
}

impl std::fmt::Debug for NotifyEngine {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("NotifyEngine")
			.field("started", &self.started.load(Ordering::SeqCst))
			.finish_non_exhaustive()
	}
}

// vim: ts=4
