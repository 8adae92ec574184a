//! Error type for codec negotiation and transport-secret processing.

use thiserror::Error;

/// Errors raised while negotiating a session codec or processing a secret.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The algorithm string from `OpenSession` is not one we implement.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The secret parameters field does not hold a 16-byte IV.
    #[error("invalid IV length: {0}")]
    InvalidIvLength(usize),

    /// Ciphertext is empty or not a multiple of the AES block size.
    #[error("invalid ciphertext length: {0}")]
    InvalidCiphertextLength(usize),

    /// PKCS#7 padding failed validation after decryption.
    #[error("invalid padding")]
    InvalidPadding,

    /// HKDF expansion failed (requested length out of range).
    #[error("key derivation failed")]
    KeyDerivation,
}
