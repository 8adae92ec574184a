//! Session registry: per-client handles owning the transport codec.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use secretsd_crypto::SessionCipher;
use tracing::debug;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::error::ServiceError;
use crate::paths;

/// One open session. The codec lives behind a lock so `Close` can drop it
/// (zeroising any AES key) while concurrent calls observe `NoSession`.
pub struct Session {
    id: String,
    path: String,
    client: Option<String>,
    cipher: Mutex<Option<SessionCipher>>,
}

impl Session {
    fn new(id: String, cipher: SessionCipher, client: Option<String>) -> Self {
        Self {
            path: paths::session(&id),
            id,
            client,
            cipher: Mutex::new(Some(cipher)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The session's object path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Unique bus name of the client that opened the session, if known.
    pub fn client(&self) -> Option<&str> {
        self.client.as_deref()
    }

    /// Encrypt a plaintext with this session's codec.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>), ServiceError> {
        let guard = self.cipher.lock().unwrap_or_else(|e| e.into_inner());
        let cipher = guard
            .as_ref()
            .ok_or_else(|| ServiceError::NoSession("session is closed".into()))?;
        Ok(cipher.encrypt(plaintext)?)
    }

    /// Decrypt an incoming `(parameters, value)` pair.
    pub fn decrypt(&self, params: &[u8], value: &[u8]) -> Result<Zeroizing<Vec<u8>>, ServiceError> {
        let guard = self.cipher.lock().unwrap_or_else(|e| e.into_inner());
        let cipher = guard
            .as_ref()
            .ok_or_else(|| ServiceError::NoSession("session is closed".into()))?;
        Ok(cipher.decrypt(params, value)?)
    }

    /// Drop the codec; the derived key is wiped as it falls out of scope.
    pub fn close(&self) {
        let mut guard = self.cipher.lock().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    /// Whether `close` has run.
    pub fn is_closed(&self) -> bool {
        self.cipher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }
}

/// Registry of open sessions, keyed by id.
///
/// A session object exists on the bus exactly while its entry is here; the
/// bus layer keeps the two in sync.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    /// Negotiate a codec and register a session for it.
    ///
    /// Returns the session and the key-exchange output for the client.
    pub fn open(
        &self,
        algorithm: &str,
        input: &[u8],
        client: Option<String>,
    ) -> Result<(Arc<Session>, Vec<u8>), ServiceError> {
        let (cipher, output) = SessionCipher::negotiate(algorithm, input)?;

        // Hyphen-free id: path elements allow [A-Za-z0-9_] only.
        let id = format!("s{}", Uuid::new_v4().as_simple());
        let session = Arc::new(Session::new(id.clone(), cipher, client));

        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, session.clone());
        debug!(session = %session.path(), algorithm, "session opened");
        Ok((session, output))
    }

    /// Look up a session by object path.
    pub fn get(&self, path: &str) -> Option<Arc<Session>> {
        let id = paths::parse_session(path)?;
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }

    /// Look up a session by object path, failing with `NoSession`.
    pub fn resolve(&self, path: &str) -> Result<Arc<Session>, ServiceError> {
        self.get(path)
            .filter(|session| !session.is_closed())
            .ok_or_else(|| ServiceError::NoSession(format!("no such session: {path}")))
    }

    /// Remove a session by object path, without closing it.
    pub fn remove(&self, path: &str) -> Option<Arc<Session>> {
        let id = paths::parse_session(path)?;
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
    }

    /// Remove every session owned by a departed client.
    pub fn remove_client(&self, client: &str) -> Vec<Arc<Session>> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let ids: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| s.client() == Some(client))
            .map(|(id, _)| id.clone())
            .collect();
        ids.into_iter().filter_map(|id| sessions.remove(&id)).collect()
    }

    /// Snapshot and clear the registry; callers tear the sessions down
    /// without any lock held.
    pub fn drain(&self) -> Vec<Arc<Session>> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.drain().map(|(_, s)| s).collect()
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// True when no sessions are open.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_resolve_close() {
        let registry = SessionRegistry::default();
        let (session, output) = registry.open("plain", &[], None).unwrap();
        assert!(output.is_empty());
        assert!(session.path().starts_with(paths::SESSION_BASE));

        let resolved = registry.resolve(session.path()).unwrap();
        assert_eq!(resolved.id(), session.id());

        registry.remove(session.path()).unwrap();
        session.close();
        assert!(matches!(
            registry.resolve(session.path()),
            Err(ServiceError::NoSession(_))
        ));
        assert!(matches!(
            session.encrypt(b"x"),
            Err(ServiceError::NoSession(_))
        ));
    }

    #[test]
    fn unknown_algorithm_is_not_supported() {
        let registry = SessionRegistry::default();
        assert!(matches!(
            registry.open("rot13", &[], None),
            Err(ServiceError::NotSupported(_))
        ));
    }

    #[test]
    fn ids_are_path_safe_and_unique() {
        let registry = SessionRegistry::default();
        let (a, _) = registry.open("plain", &[], None).unwrap();
        let (b, _) = registry.open("plain", &[], None).unwrap();
        assert_ne!(a.id(), b.id());
        for id in [a.id(), b.id()] {
            assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        }
    }

    #[test]
    fn remove_client_reclaims_only_that_clients_sessions() {
        let registry = SessionRegistry::default();
        let (mine, _) = registry
            .open("plain", &[], Some(":1.42".to_string()))
            .unwrap();
        let (other, _) = registry
            .open("plain", &[], Some(":1.99".to_string()))
            .unwrap();

        let removed = registry.remove_client(":1.42");
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id(), mine.id());
        assert!(registry.get(other.path()).is_some());
    }
}
