//! HTTPS implementation of the fetch adapter, built on hyper.
//!
//! Fetches the `did.json` and `wc-notify-config.json` well-known documents.
//! All failures surface as `NetworkError`; the engine's resolver layers
//! document-specific error kinds (and its failure cache) on top.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::debug;

use walletnotify::fetch_adapter::FetchAdapter;
use walletnotify::prelude::*;

pub struct FetchAdapterHyper {
	client: Client<HttpsConnector<HttpConnector>, Empty<Bytes>>,
}

impl FetchAdapterHyper {
	pub fn new() -> WnResult<Self> {
		let https = hyper_rustls::HttpsConnectorBuilder::new()
			.with_native_roots()
			.map_err(|err| Error::NetworkError(format!("tls roots: {}", err)))?
			.https_only()
			.enable_http1()
			.build();
		let client = Client::builder(TokioExecutor::new()).build(https);
		Ok(Self { client })
	}
}

#[async_trait]
impl FetchAdapter for FetchAdapterHyper {
	async fn fetch_json(&self, url: &str) -> WnResult<serde_json::Value> {
		let uri: hyper::Uri = url
			.parse()
			.map_err(|err| Error::NetworkError(format!("invalid url {}: {}", url, err)))?;

		debug!("GET {}", url);
		let response = self
			.client
			.get(uri)
			.await
			.map_err(|err| Error::NetworkError(format!("GET {}: {}", url, err)))?;

		let status = response.status();
		if !status.is_success() {
			return Err(Error::NetworkError(format!("GET {}: status {}", url, status)));
		}

		let body = response
			.into_body()
			.collect()
			.await
			.map_err(|err| Error::NetworkError(format!("GET {}: body: {}", url, err)))?
			.to_bytes();
		serde_json::from_slice(&body)
			.map_err(|err| Error::NetworkError(format!("GET {}: invalid json: {}", url, err)))
	}
}

impl std::fmt::Debug for FetchAdapterHyper {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("FetchAdapterHyper").finish_non_exhaustive()
	}
}

// vim: ts=4
