//! Codec negotiation for `OpenSession`.

use zeroize::Zeroizing;

use crate::constants::{ALGORITHM_DH_AES, ALGORITHM_PLAIN};
use crate::dh::DhCipher;
use crate::errors::CryptoError;
use crate::Result;

/// The transport codec owned by one bus session.
pub enum SessionCipher {
    /// Identity codec: empty parameters, ciphertext equals plaintext.
    Plain,
    /// AES-128-CBC keyed by the DH exchange.
    DhAes(DhCipher),
}

impl std::fmt::Debug for SessionCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => f.write_str("SessionCipher::Plain"),
            Self::DhAes(_) => f.write_str("SessionCipher::DhAes(..)"),
        }
    }
}

impl SessionCipher {
    /// Negotiate a codec from the `OpenSession` algorithm string.
    ///
    /// Returns the codec and the key-exchange output to send back to the
    /// client: empty for `plain`, the server DH public value for DH-AES.
    pub fn negotiate(algorithm: &str, input: &[u8]) -> Result<(Self, Vec<u8>)> {
        match algorithm {
            ALGORITHM_PLAIN => Ok((Self::Plain, Vec::new())),
            ALGORITHM_DH_AES => {
                let (cipher, output) = DhCipher::negotiate(input)?;
                Ok((Self::DhAes(cipher), output))
            }
            other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    /// The algorithm string this codec was negotiated with.
    pub fn algorithm(&self) -> &'static str {
        match self {
            Self::Plain => ALGORITHM_PLAIN,
            Self::DhAes(_) => ALGORITHM_DH_AES,
        }
    }

    /// Encrypt a plaintext into `(parameters, value)` for a secret struct.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        match self {
            Self::Plain => Ok((Vec::new(), plaintext.to_vec())),
            Self::DhAes(cipher) => cipher.encrypt(plaintext),
        }
    }

    /// Decrypt the `(parameters, value)` of an incoming secret struct.
    pub fn decrypt(&self, params: &[u8], value: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        match self {
            Self::Plain => Ok(Zeroizing::new(value.to_vec())),
            Self::DhAes(cipher) => cipher.decrypt(params, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_is_identity() {
        let (cipher, output) = SessionCipher::negotiate(ALGORITHM_PLAIN, &[]).unwrap();
        assert!(output.is_empty());
        assert_eq!(cipher.algorithm(), "plain");

        let (params, value) = cipher.encrypt(b"pw").unwrap();
        assert!(params.is_empty());
        assert_eq!(value, b"pw");
        assert_eq!(&**cipher.decrypt(&params, &value).unwrap(), b"pw");
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let err = SessionCipher::negotiate("rot13", &[]).unwrap_err();
        assert!(matches!(err, CryptoError::UnsupportedAlgorithm(_)));
    }

    #[test]
    fn dh_negotiation_returns_group_sized_public() {
        // A fixed non-trivial client public: 2^64 as big-endian bytes.
        let mut client_public = vec![0u8; 9];
        client_public[0] = 1;
        let (cipher, output) = SessionCipher::negotiate(ALGORITHM_DH_AES, &client_public).unwrap();
        assert_eq!(output.len(), 128);
        assert_eq!(cipher.algorithm(), ALGORITHM_DH_AES);
    }
}
