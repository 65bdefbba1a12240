use std::fmt;

use walletnotify::error::Error as WnError;

/// Internal error type for the dalek crypto adapter
#[derive(Debug)]
pub enum Error {
	UnknownKeyPair(Box<str>),
	UnknownSymKey(Box<str>),
	InvalidHex(Box<str>),
	InvalidKeyLength,
	MissingEnvelopeKeys,
	MalformedEnvelope,
	Aead,
	Kdf,
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Error::UnknownKeyPair(key) => write!(f, "unknown keypair: {}", key),
			Error::UnknownSymKey(topic) => write!(f, "no sym key for topic: {}", topic),
			Error::InvalidHex(value) => write!(f, "invalid hex: {}", value),
			Error::InvalidKeyLength => write!(f, "key must be 32 bytes"),
			Error::MissingEnvelopeKeys => {
				write!(f, "type-1 envelope requires sender and receiver keys")
			}
			Error::MalformedEnvelope => write!(f, "malformed envelope"),
			Error::Aead => write!(f, "aead failure"),
			Error::Kdf => write!(f, "key derivation failure"),
		}
	}
}

impl std::error::Error for Error {}

impl From<Error> for WnError {
	fn from(err: Error) -> Self {
		WnError::CryptoFailure(err.to_string())
	}
}

// vim: ts=4
