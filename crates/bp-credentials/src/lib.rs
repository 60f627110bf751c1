//! # bp-credentials
//!
//! Credential retrieval for bucketpush.
//!
//! A push token is an opaque [`SecretToken`]: its `Debug` and `Display`
//! output is always `***`, so it can sit inside structs that get logged
//! without leaking. The raw value is only reachable through
//! [`SecretToken::expose`].
//!
//! Tokens come from a [`SecretStore`], looked up by secret identifier:
//!
//! - [`FileSecretStore`]: one file per secret in a directory (the layout
//!   used by mounted secret volumes).
//! - [`StaticSecretStore`]: in-memory map, for tests and embedding.

pub mod error;
pub mod store;
pub mod token;

pub use error::CredentialError;
pub use store::{FileSecretStore, SecretStore, StaticSecretStore};
pub use token::SecretToken;
