//! The bus-facing error taxonomy.

use secretsd_crypto::CryptoError;
use secretsd_store::StoreError;
use zbus::DBusError;

/// Errors returned to bus clients.
///
/// Variant names map onto `org.freedesktop.Secret.Error.*`; the `ZBus`
/// passthrough carries standard `org.freedesktop.DBus.Error.*` names
/// (notably `InvalidArgs`) unchanged.
#[derive(Debug, DBusError)]
#[zbus(prefix = "org.freedesktop.Secret.Error")]
pub enum ServiceError {
    /// Transparent wrapper for zbus / standard D-Bus errors.
    #[zbus(error)]
    ZBus(zbus::Error),
    /// Operation refused on a locked object.
    IsLocked(String),
    /// The referenced session does not exist or is closed.
    NoSession(String),
    /// The path parses but no such object exists.
    NoSuchObject(String),
    /// `CreateCollection` name clash.
    AlreadyExists(String),
    /// Unknown algorithm, bad crypto input, or a store fault surfaced to
    /// the client.
    NotSupported(String),
}

impl ServiceError {
    /// A standard `org.freedesktop.DBus.Error.InvalidArgs`.
    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::ZBus(zbus::fdo::Error::InvalidArgs(msg.into()).into())
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NoSuchObject(what),
            other => Self::NotSupported(other.to_string()),
        }
    }
}

impl From<CryptoError> for ServiceError {
    fn from(err: CryptoError) -> Self {
        Self::NotSupported(err.to_string())
    }
}

impl From<zbus::zvariant::Error> for ServiceError {
    fn from(err: zbus::zvariant::Error) -> Self {
        Self::ZBus(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_becomes_no_such_object() {
        let err = ServiceError::from(StoreError::NotFound("item x".into()));
        assert!(matches!(err, ServiceError::NoSuchObject(_)));
    }

    #[test]
    fn store_backend_fault_becomes_not_supported() {
        let err = ServiceError::from(StoreError::Backend("gpg exploded".into()));
        assert!(matches!(err, ServiceError::NotSupported(_)));
    }

    #[test]
    fn crypto_faults_become_not_supported() {
        let err = ServiceError::from(CryptoError::InvalidPadding);
        assert!(matches!(err, ServiceError::NotSupported(_)));
    }
}
