//! The root `org.freedesktop.Secret.Service` object.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use zbus::message::Header;
use zbus::object_server::SignalEmitter;
use zbus::zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};
use zbus::{interface, Connection, ObjectServer};

use super::{export_collection, to_object_paths, SessionIface};
use crate::error::ServiceError;
use crate::paths;
use crate::secret::Secret;
use crate::state::ServiceState;

/// Dispatches the service-level operations and holds the shared state.
pub struct SecretService {
    state: Arc<ServiceState>,
}

impl SecretService {
    pub fn new(state: Arc<ServiceState>) -> Self {
        Self { state }
    }
}

#[interface(name = "org.freedesktop.Secret.Service")]
impl SecretService {
    /// Negotiate a transport codec and create a session for it.
    async fn open_session(
        &self,
        algorithm: String,
        input: OwnedValue,
        #[zbus(header)] header: Header<'_>,
        #[zbus(object_server)] server: &ObjectServer,
    ) -> Result<(OwnedValue, OwnedObjectPath), ServiceError> {
        // Plain sessions usually carry an empty string variant; anything
        // that is not a byte array counts as no key-exchange input.
        let input_bytes = Vec::<u8>::try_from(input).unwrap_or_default();
        let client = header.sender().map(|name| name.to_string());

        let (session, output) = self.state.open_session(&algorithm, &input_bytes, client)?;
        if let Err(err) = server
            .at(
                session.path(),
                SessionIface::new(self.state.clone(), session.path().to_string()),
            )
            .await
        {
            self.state.close_session(session.path());
            return Err(err.into());
        }

        let output = Value::from(output)
            .try_to_owned()
            .map_err(|e| ServiceError::ZBus(e.into()))?;
        Ok((output, OwnedObjectPath::try_from(session.path().to_string())?))
    }

    /// Create (and export) a collection; the second return is the prompt
    /// slot, `/` because no prompt is ever needed.
    async fn create_collection(
        &self,
        properties: HashMap<String, OwnedValue>,
        alias: String,
        #[zbus(object_server)] server: &ObjectServer,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> Result<(OwnedObjectPath, OwnedObjectPath), ServiceError> {
        let created = self.state.create_collection(&properties, &alias).await?;

        export_collection(server, &self.state, &created.name, &created.path).await?;
        if let Some(alias_path) = &created.alias_path {
            export_collection(server, &self.state, &created.name, alias_path).await?;
        }

        Self::collection_created(&emitter, ObjectPath::try_from(created.path.as_str())?).await?;
        self.collections_changed(&emitter).await?;

        Ok((OwnedObjectPath::try_from(created.path)?, paths::no_object()))
    }

    /// Subset-match across every collection, partitioned by lock state.
    async fn search_items(
        &self,
        attributes: HashMap<String, String>,
    ) -> Result<(Vec<OwnedObjectPath>, Vec<OwnedObjectPath>), ServiceError> {
        let query = attributes.into_iter().collect();
        let (unlocked, locked) = self.state.search_all(&query).await?;
        Ok((to_object_paths(unlocked)?, to_object_paths(locked)?))
    }

    /// Clear the in-memory lock flag of every recognised collection path.
    async fn unlock(
        &self,
        objects: Vec<OwnedObjectPath>,
    ) -> Result<(Vec<OwnedObjectPath>, OwnedObjectPath), ServiceError> {
        let object_strings: Vec<String> = objects.iter().map(|p| p.to_string()).collect();
        let toggled = self.state.set_locked(&object_strings, false);
        Ok((to_object_paths(toggled)?, paths::no_object()))
    }

    /// Set the in-memory lock flag of every recognised collection path.
    async fn lock(
        &self,
        objects: Vec<OwnedObjectPath>,
    ) -> Result<(Vec<OwnedObjectPath>, OwnedObjectPath), ServiceError> {
        let object_strings: Vec<String> = objects.iter().map(|p| p.to_string()).collect();
        let toggled = self.state.set_locked(&object_strings, true);
        Ok((to_object_paths(toggled)?, paths::no_object()))
    }

    /// Fetch many secrets at once; failing entries are omitted.
    async fn get_secrets(
        &self,
        items: Vec<OwnedObjectPath>,
        session: OwnedObjectPath,
    ) -> Result<HashMap<OwnedObjectPath, Secret>, ServiceError> {
        let item_strings: Vec<String> = items.iter().map(|p| p.to_string()).collect();
        let secrets = self.state.get_secrets(&item_strings, session.as_str()).await?;

        let mut result = HashMap::with_capacity(secrets.len());
        for (path, secret) in secrets {
            result.insert(OwnedObjectPath::try_from(path)?, secret);
        }
        Ok(result)
    }

    /// The canonical path behind an alias, `/` when unset.
    async fn read_alias(&self, name: String) -> Result<OwnedObjectPath, ServiceError> {
        Ok(OwnedObjectPath::try_from(self.state.read_alias(&name).await)?)
    }

    /// Point an alias at a collection (`/` removes it).
    async fn set_alias(
        &self,
        name: String,
        collection: OwnedObjectPath,
    ) -> Result<(), ServiceError> {
        self.state.set_alias(&name, collection.as_str()).await
    }

    #[zbus(signal)]
    async fn collection_created(
        emitter: &SignalEmitter<'_>,
        collection: ObjectPath<'_>,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    async fn collection_deleted(
        emitter: &SignalEmitter<'_>,
        collection: ObjectPath<'_>,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    async fn collection_changed(
        emitter: &SignalEmitter<'_>,
        collection: ObjectPath<'_>,
    ) -> zbus::Result<()>;

    /// Paths of all materialised collections.
    #[zbus(property)]
    async fn collections(&self) -> Vec<OwnedObjectPath> {
        self.state
            .collection_paths()
            .into_iter()
            .filter_map(|p| OwnedObjectPath::try_from(p).ok())
            .collect()
    }
}

/// Emit `CollectionDeleted` from handlers outside this module.
pub(crate) async fn emit_collection_deleted(conn: &Connection, collection_path: &str) {
    emit(conn, collection_path, SignalKind::Deleted).await;
}

/// Emit `CollectionChanged` from handlers outside this module.
pub(crate) async fn emit_collection_changed(conn: &Connection, collection_path: &str) {
    emit(conn, collection_path, SignalKind::Changed).await;
}

enum SignalKind {
    Deleted,
    Changed,
}

async fn emit(conn: &Connection, collection_path: &str, kind: SignalKind) {
    let result: zbus::Result<()> = async {
        let emitter = SignalEmitter::new(conn, paths::SERVICE_PATH)?;
        let path = ObjectPath::try_from(collection_path)?;
        match kind {
            SignalKind::Deleted => SecretService::collection_deleted(&emitter, path).await,
            SignalKind::Changed => SecretService::collection_changed(&emitter, path).await,
        }
    }
    .await;
    if let Err(err) = result {
        debug!(collection = collection_path, %err, "failed to emit collection signal");
    }
}

/// Re-announce the `Collections` property after a structural change.
pub(crate) async fn refresh_collections(server: &ObjectServer) {
    let result: zbus::Result<()> = async {
        let iface = server
            .interface::<_, SecretService>(paths::SERVICE_PATH)
            .await?;
        let emitter = iface.signal_emitter().clone();
        let res = iface.get().await.collections_changed(&emitter).await;
        res
    }
    .await;
    if let Err(err) = result {
        debug!(%err, "failed to refresh Collections property");
    }
}
