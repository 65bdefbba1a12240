//! Walletnotify is a wallet-side client for encrypted dapp notifications.
//!
//! # Features
//!
//! - Dapp discovery through well-known documents (`did.json`,
//!   `wc-notify-config.json`), cached per process
//! - Per-subscription symmetric channels derived via X25519 key agreement
//! - JWT claim sets (EdDSA) authorizing every protocol action
//! - Typed JSON-RPC dispatch over a pub/sub relay
//! - Device-local subscription and message stores, reconciled against the
//!   notify server's authoritative state through a watch channel
//!
//! External collaborators (relay, crypto, identity keys, stores, expirer,
//! HTTP fetch) plug in through the adapter traits re-exported from
//! `walletnotify-types`; reference implementations live in the `adapters/`
//! crates.

// Re-export shared types and adapter traits from walletnotify-types
pub use walletnotify_types::crypto_adapter;
pub use walletnotify_types::error;
pub use walletnotify_types::expirer_adapter;
pub use walletnotify_types::fetch_adapter;
pub use walletnotify_types::identity_adapter;
pub use walletnotify_types::relay_adapter;
pub use walletnotify_types::store_adapter;
pub use walletnotify_types::types;
pub use walletnotify_types::utils;

// Local modules
pub mod auth;
pub mod did;
pub mod envelope;
pub mod engine;
pub mod event;
pub mod prelude;
pub mod rpc;
pub mod topic;

mod dispatcher;
mod handler;
mod ledger;
mod messages;
mod reconciler;
mod subscriptions;

pub use crate::engine::{NotifyEngine, NotifyEngineBuilder, SubscribeTicket};
pub use crate::event::NotifyEvent;

// vim: ts=4
