//! Error handling subsystem. Implements the shared Error type.

use tracing::warn;

pub type WnResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	// Engine preconditions
	NotInitialized,
	UnknownSubscription(Box<str>), // topic

	// Well-known document resolution
	DidDocUnavailable(Box<str>),          // dapp domain
	DidDocMalformed(Box<str>),            // dapp domain
	VerificationMethodMissing(Box<str>),  // verification method reference
	ConfigUnavailable(Box<str>),          // dapp domain

	// JWT claim sets
	JwtDecodeFailed,
	JwtActMismatch { expected: Box<str>, got: Box<str> },
	JwtExpired,

	// External collaborators
	CryptoFailure(String),
	RelayFailure(String),
	StoreFailure(String),
	IdentityFailure(String),

	// Inbound traffic
	InvalidMessagePayload(String),

	// Network and system
	NetworkError(String),
	Timeout,
	Parse,
	Internal(String),
	Io(std::io::Error),
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{:?}", self)
	}
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		warn!("io error: {}", err);
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(_err: serde_json::Error) -> Self {
		warn!("json error: {}", _err);
		Error::Parse
	}
}

impl From<std::num::ParseIntError> for Error {
	fn from(_err: std::num::ParseIntError) -> Self {
		warn!("parse int error: {}", _err);
		Error::Parse
	}
}

impl From<std::time::SystemTimeError> for Error {
	fn from(_err: std::time::SystemTimeError) -> Self {
		warn!("system time error: {}", _err);
		Error::Internal("system time error".into())
	}
}

// vim: ts=4
