//! Topic derivation. All relay topics are lowercase hex SHA-256 digests.
//!
//! Response topics (the hash of an X25519 shared secret) are derived by the
//! crypto adapter via `generate_shared_key`, since they require private key
//! material; the pure derivations live here.

use walletnotify_types::utils::sha256_hex;

use crate::prelude::*;

/// Topic a dapp listens on for subscribe requests: `SHA256(dapp_pub)`.
/// Both parties know it from the dapp's DID document.
pub fn subscribe_topic(dapp_public_key: &str) -> WnResult<Box<str>> {
	Ok(sha256_hex(&decode_key(dapp_public_key)?))
}

/// Topic of an established subscription: `SHA256(sym_key)`
pub fn subscription_topic(sym_key: &str) -> WnResult<Box<str>> {
	Ok(sha256_hex(&decode_key(sym_key)?))
}

fn decode_key(key: &str) -> WnResult<Vec<u8>> {
	hex::decode(key).map_err(|_| Error::CryptoFailure(format!("invalid hex key: {}", key)))
}

#[cfg(test)]
mod tests {
	use super::*;

	const ZERO_KEY: &str = "0000000000000000000000000000000000000000000000000000000000000000";
	// SHA-256 of 32 zero bytes
	const ZERO_DIGEST: &str = "66687aadf862bd776c8fc18b8e9f8e20089714856ee233b3902a591d0d5f2925";

	#[test]
	fn test_subscribe_topic_known_vector() {
		assert_eq!(subscribe_topic(ZERO_KEY).unwrap().as_ref(), ZERO_DIGEST);
	}

	#[test]
	fn test_subscription_topic_matches_subscribe_topic() {
		// Both derive SHA256 over the raw key bytes
		assert_eq!(subscribe_topic(ZERO_KEY).unwrap(), subscription_topic(ZERO_KEY).unwrap());
	}

	#[test]
	fn test_invalid_hex_rejected() {
		assert!(matches!(subscribe_topic("zz"), Err(Error::CryptoFailure(_))));
	}

	#[test]
	fn test_topic_is_lowercase_hex() {
		let topic = subscription_topic("00ff").unwrap();
		assert_eq!(topic.len(), 64);
		assert!(topic.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
	}
}

// vim: ts=4
