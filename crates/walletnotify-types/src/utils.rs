//! Utility functions

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngExt;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

use crate::prelude::*;

/// Lowercase hex SHA-256 digest; the primitive behind all topic derivation
pub fn sha256_hex(data: &[u8]) -> Box<str> {
	hex::encode(Sha256::digest(data)).into()
}

/// Random positive JSON-RPC request id (63-bit, never zero)
pub fn random_request_id() -> u64 {
	let mut rng = rand::rng();
	rng.random_range(1..=i64::MAX as u64)
}

/// Decode a JWT payload without verifying the signature.
///
/// The engine trusts the encrypted channel the JWT arrived on; claim-level
/// checks (act, iat/exp) happen after decoding.
pub fn decode_jwt_no_verify<T: DeserializeOwned>(jwt: &str) -> WnResult<T> {
	let mut parts = jwt.splitn(3, '.');
	let _header = parts.next().ok_or(Error::JwtDecodeFailed)?;
	let payload = parts.next().ok_or(Error::JwtDecodeFailed)?;
	let _sig = parts.next().ok_or(Error::JwtDecodeFailed)?;
	let payload =
		URL_SAFE_NO_PAD.decode(payload.as_bytes()).map_err(|_| Error::JwtDecodeFailed)?;
	let payload: T = serde_json::from_slice(&payload).map_err(|_| Error::JwtDecodeFailed)?;
	Ok(payload)
}


// vim: ts=4
