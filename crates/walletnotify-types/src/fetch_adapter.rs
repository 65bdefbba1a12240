//! Adapter for fetching well-known JSON documents over HTTP.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::prelude::*;

#[async_trait]
pub trait FetchAdapter: Debug + Send + Sync {
	/// GET a JSON document. Transport and non-success status failures map to
	/// `NetworkError`; the resolver layers document-specific error kinds on
	/// top.
	async fn fetch_json(&self, url: &str) -> WnResult<serde_json::Value>;
}

// vim: ts=4
