//! The `(oayays)` secret struct transferred over the bus.

use serde::{Deserialize, Serialize};
use zbus::zvariant::{OwnedObjectPath, Type};

/// A secret in transit: `(session, parameters, value, content_type)`.
///
/// For `plain` sessions `parameters` is empty and `value` is the plaintext;
/// for DH-AES sessions `parameters` holds the 16-byte IV and `value` the
/// ciphertext.
#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct Secret {
    /// The session whose codec protects `value`.
    pub session: OwnedObjectPath,
    /// Codec parameters (empty or an IV).
    pub parameters: Vec<u8>,
    /// The (possibly encrypted) secret bytes.
    pub value: Vec<u8>,
    /// MIME type of the plaintext, e.g. `text/plain`.
    pub content_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_signature_is_oayays() {
        assert_eq!(Secret::SIGNATURE.to_string(), "(oayays)");
    }
}
