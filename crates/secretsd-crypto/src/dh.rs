//! DH key agreement and the AES-128-CBC transport codec.
//!
//! Key exchange follows the `dh-ietf1024-sha256-aes128-cbc-pkcs7` profile:
//! RFC 2409 MODP group 2, shared secret left-padded to the group size, then
//! HKDF-SHA-256 with empty salt and empty info down to a 16-byte AES key.

use std::sync::LazyLock;

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes128;
use hkdf::Hkdf;
use num_bigint::{BigUint, RandBigInt};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::constants::{AES_BLOCK_SIZE, AES_KEY_SIZE, DH_GROUP_SIZE, DH_PRIME_HEX};
use crate::errors::CryptoError;
use crate::Result;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

static DH_PRIME: LazyLock<BigUint> = LazyLock::new(|| {
    BigUint::parse_bytes(DH_PRIME_HEX, 16).expect("MODP group 2 prime is valid hex")
});

static DH_GENERATOR: LazyLock<BigUint> = LazyLock::new(|| BigUint::from(2u32));

/// Per-session AES cipher derived from a completed DH exchange.
///
/// The key is wiped when the cipher is dropped, which happens when the
/// owning session closes.
pub struct DhCipher {
    key: Zeroizing<[u8; AES_KEY_SIZE]>,
}

impl DhCipher {
    /// Complete the server side of the key exchange.
    ///
    /// `client_public` is the client's DH public value as big-endian bytes.
    /// Returns the cipher and the server's public value, left-padded to the
    /// group size for the `OpenSession` reply.
    pub fn negotiate(client_public: &[u8]) -> Result<(Self, Vec<u8>)> {
        let prime = &*DH_PRIME;

        let mut rng = rand::thread_rng();
        let private = rng.gen_biguint_below(prime);
        let public = DH_GENERATOR.modpow(&private, prime);

        let client = BigUint::from_bytes_be(client_public);
        let shared = client.modpow(&private, prime);
        let shared_padded = Zeroizing::new(left_pad(&shared.to_bytes_be()));

        let key = derive_key(&shared_padded)?;
        Ok((Self { key }, left_pad(&public.to_bytes_be())))
    }

    /// Encrypt a plaintext, returning `(iv, ciphertext)`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        let padded = Zeroizing::new(pkcs7_pad(plaintext));

        let mut iv = [0u8; AES_BLOCK_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);

        let ciphertext = Aes128CbcEnc::new((&*self.key).into(), (&iv).into())
            .encrypt_padded_vec_mut::<NoPadding>(&padded);

        Ok((iv.to_vec(), ciphertext))
    }

    /// Decrypt `(iv, ciphertext)` back to the plaintext.
    ///
    /// Rejects a params field that is not a 16-byte IV, ciphertext that is
    /// empty or not block-aligned, and any PKCS#7 padding violation.
    pub fn decrypt(&self, params: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if params.len() != AES_BLOCK_SIZE {
            return Err(CryptoError::InvalidIvLength(params.len()));
        }
        if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK_SIZE != 0 {
            return Err(CryptoError::InvalidCiphertextLength(ciphertext.len()));
        }

        let mut iv = [0u8; AES_BLOCK_SIZE];
        iv.copy_from_slice(params);

        let decrypted = Aes128CbcDec::new((&*self.key).into(), (&iv).into())
            .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
            .map_err(|_| CryptoError::InvalidCiphertextLength(ciphertext.len()))?;
        let decrypted = Zeroizing::new(decrypted);

        pkcs7_unpad(&decrypted).map(|stripped| Zeroizing::new(stripped.to_vec()))
    }
}

/// Derive the 16-byte AES key from the padded shared secret.
fn derive_key(shared: &[u8]) -> Result<Zeroizing<[u8; AES_KEY_SIZE]>> {
    let hk = Hkdf::<Sha256>::new(None, shared);
    let mut key = Zeroizing::new([0u8; AES_KEY_SIZE]);
    hk.expand(&[], key.as_mut())
        .map_err(|_| CryptoError::KeyDerivation)?;
    Ok(key)
}

/// Left-pad a big-endian value to the DH group size.
fn left_pad(bytes: &[u8]) -> Vec<u8> {
    let mut padded = vec![0u8; DH_GROUP_SIZE];
    padded[DH_GROUP_SIZE - bytes.len()..].copy_from_slice(bytes);
    padded
}

/// PKCS#7-pad to a multiple of the AES block size.
///
/// Always appends between 1 and 16 bytes; an aligned input gains a full
/// padding block.
fn pkcs7_pad(data: &[u8]) -> Vec<u8> {
    let pad_len = AES_BLOCK_SIZE - (data.len() % AES_BLOCK_SIZE);
    let mut padded = Vec::with_capacity(data.len() + pad_len);
    padded.extend_from_slice(data);
    padded.resize(data.len() + pad_len, pad_len as u8);
    padded
}

/// Validate and strip PKCS#7 padding.
fn pkcs7_unpad(data: &[u8]) -> Result<&[u8]> {
    let Some(&last) = data.last() else {
        return Err(CryptoError::InvalidPadding);
    };
    let pad_len = last as usize;
    if pad_len == 0 || pad_len > AES_BLOCK_SIZE || pad_len > data.len() {
        return Err(CryptoError::InvalidPadding);
    }
    if data[data.len() - pad_len..].iter().any(|&b| b != last) {
        return Err(CryptoError::InvalidPadding);
    }
    Ok(&data[..data.len() - pad_len])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build the client half of an exchange so both endpoints can be tested
    /// in-process.
    fn client_exchange(server_public: &[u8], client_private: &BigUint) -> DhCipher {
        let shared = BigUint::from_bytes_be(server_public).modpow(client_private, &DH_PRIME);
        let key = derive_key(&left_pad(&shared.to_bytes_be())).unwrap();
        DhCipher { key }
    }

    fn pair() -> (DhCipher, DhCipher) {
        let mut rng = rand::thread_rng();
        let client_private = rng.gen_biguint_below(&DH_PRIME);
        let client_public = DH_GENERATOR.modpow(&client_private, &DH_PRIME);

        let (server, server_public) = DhCipher::negotiate(&left_pad(&client_public.to_bytes_be()))
            .unwrap();
        assert_eq!(server_public.len(), DH_GROUP_SIZE);

        (server, client_exchange(&server_public, &client_private))
    }

    #[test]
    fn pad_appends_one_to_block_size_bytes() {
        for len in 0..=48 {
            let data = vec![0xab; len];
            let padded = pkcs7_pad(&data);
            let pad = padded.len() - len;
            assert!((1..=AES_BLOCK_SIZE).contains(&pad), "len={len} pad={pad}");
            assert_eq!(padded.len() % AES_BLOCK_SIZE, 0);
            assert_eq!(pkcs7_unpad(&padded).unwrap(), &data[..]);
        }
    }

    #[test]
    fn unpad_rejects_corrupt_padding() {
        assert!(pkcs7_unpad(&[]).is_err());
        assert!(pkcs7_unpad(&[0u8; 16]).is_err());
        assert!(pkcs7_unpad(&[17u8; 16]).is_err());
        let mut padded = pkcs7_pad(b"abc");
        padded[14] ^= 0x01;
        assert!(pkcs7_unpad(&padded).is_err());
    }

    #[test]
    fn round_trip_across_endpoints() {
        let (server, client) = pair();
        for len in [0usize, 15, 16, 17, 4096] {
            let plaintext: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let (iv, ct) = server.encrypt(&plaintext).unwrap();
            assert_eq!(iv.len(), AES_BLOCK_SIZE);
            assert_eq!(ct.len() % AES_BLOCK_SIZE, 0);
            assert!(ct.len() > plaintext.len());
            let decrypted = client.decrypt(&iv, &ct).unwrap();
            assert_eq!(&*decrypted, &plaintext, "len={len}");
        }
    }

    #[test]
    fn single_block_message_encrypts_to_one_block() {
        let (server, _) = pair();
        let (iv, ct) = server.encrypt(b"hello").unwrap();
        assert_eq!(iv.len(), 16);
        assert_eq!(ct.len(), 16);
        let decrypted = server.decrypt(&iv, &ct).unwrap();
        assert_eq!(&**decrypted, b"hello");
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let (server, _) = pair();
        let (iv, mut ct) = server.encrypt(b"hello").unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0x01;
        assert!(server.decrypt(&iv, &ct).is_err());
    }

    #[test]
    fn decrypt_validates_lengths() {
        let (server, _) = pair();
        let (iv, ct) = server.encrypt(b"hello").unwrap();
        assert!(matches!(
            server.decrypt(&iv[..15], &ct),
            Err(CryptoError::InvalidIvLength(15))
        ));
        assert!(matches!(
            server.decrypt(&iv, &[]),
            Err(CryptoError::InvalidCiphertextLength(0))
        ));
        assert!(matches!(
            server.decrypt(&iv, &ct[..15]),
            Err(CryptoError::InvalidCiphertextLength(15))
        ));
    }
}
