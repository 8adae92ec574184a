//! # secretsd-crypto
//!
//! Transport-secret codecs for the Secret Service wire protocol.
//!
//! A client negotiates one codec per session via `OpenSession`:
//!
//! - `plain` — no key exchange, encrypt and decrypt are the identity.
//! - `dh-ietf1024-sha256-aes128-cbc-pkcs7` — Diffie–Hellman over RFC 2409
//!   MODP group 2, HKDF-SHA-256 key derivation, AES-128-CBC with PKCS#7
//!   padding and a fresh random IV per message.
//!
//! This layer protects secrets in transit over the session bus only; at-rest
//! encryption belongs to the password store.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
mod dh;
mod errors;
mod session;

pub use constants::{ALGORITHM_DH_AES, ALGORITHM_PLAIN};
pub use dh::DhCipher;
pub use errors::CryptoError;
pub use session::SessionCipher;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, CryptoError>;
