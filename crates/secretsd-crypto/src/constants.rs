//! Algorithm names and sizes fixed by the Secret Service specification.

/// Algorithm string for unencrypted sessions.
pub const ALGORITHM_PLAIN: &str = "plain";

/// Algorithm string for DH-negotiated AES sessions.
pub const ALGORITHM_DH_AES: &str = "dh-ietf1024-sha256-aes128-cbc-pkcs7";

/// AES block size in bytes; also the IV length carried in secret parameters.
pub const AES_BLOCK_SIZE: usize = 16;

/// Derived AES-128 key size in bytes.
pub const AES_KEY_SIZE: usize = 16;

/// Length in bytes of DH public values and the shared secret (1024 bits).
///
/// Values shorter than the group size are left-padded with zeros before
/// use.
pub const DH_GROUP_SIZE: usize = 128;

/// RFC 2409 MODP group 2 prime (1024 bits), big-endian hex.
pub(crate) const DH_PRIME_HEX: &[u8] = b"FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1\
29024E088A67CC74020BBEA63B139B22514A08798E3404DD\
EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245\
E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE65381\
FFFFFFFFFFFFFFFF";
