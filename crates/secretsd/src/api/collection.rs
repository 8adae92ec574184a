//! `org.freedesktop.Secret.Collection` objects.
//!
//! One instance is exported per path; a collection reachable through an
//! alias gets a second instance at the alias path sharing the same name.
//! Signals always fire from the canonical collection path.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use zbus::object_server::SignalEmitter;
use zbus::zvariant::{ObjectPath, OwnedObjectPath, OwnedValue};
use zbus::{interface, Connection, ObjectServer};

use super::{export_item, service, to_fdo, to_object_paths};
use crate::error::ServiceError;
use crate::paths;
use crate::secret::Secret;
use crate::state::{ItemDisposition, ServiceState};

pub struct CollectionIface {
    state: Arc<ServiceState>,
    name: String,
}

impl CollectionIface {
    pub fn new(state: Arc<ServiceState>, name: String) -> Self {
        Self { state, name }
    }
}

#[interface(name = "org.freedesktop.Secret.Collection")]
impl CollectionIface {
    /// Delete this collection and all of its items.
    async fn delete(
        &self,
        #[zbus(object_server)] server: &ObjectServer,
        #[zbus(connection)] conn: &Connection,
    ) -> Result<OwnedObjectPath, ServiceError> {
        let deleted = self.state.delete_collection(&self.name).await?;

        for item_path in &deleted.item_paths {
            let _ = server.remove::<super::ItemIface, _>(item_path.as_str()).await;
        }
        let _ = server.remove::<Self, _>(deleted.path.as_str()).await;
        for alias_path in &deleted.alias_paths {
            let _ = server.remove::<Self, _>(alias_path.as_str()).await;
        }

        service::emit_collection_deleted(conn, &deleted.path).await;
        service::refresh_collections(server).await;
        Ok(paths::no_object())
    }

    /// Subset-match within this collection.
    async fn search_items(
        &self,
        attributes: HashMap<String, String>,
    ) -> Result<Vec<OwnedObjectPath>, ServiceError> {
        let query = attributes.into_iter().collect();
        to_object_paths(self.state.search_collection(&self.name, &query).await?)
    }

    /// Store a secret, reusing an attribute-equal item when one exists.
    async fn create_item(
        &self,
        properties: HashMap<String, OwnedValue>,
        secret: Secret,
        replace: bool,
        #[zbus(object_server)] server: &ObjectServer,
        #[zbus(connection)] conn: &Connection,
    ) -> Result<(OwnedObjectPath, OwnedObjectPath), ServiceError> {
        let outcome = self
            .state
            .create_item(&self.name, &properties, &secret, replace)
            .await?;

        match outcome.disposition {
            ItemDisposition::Created => {
                export_item(server, &self.state, &self.name, &outcome.record.id).await?;
                emit_item_created(conn, &self.name, &outcome.path).await;
                refresh_items(server, &self.state, &self.name).await;
            }
            ItemDisposition::Replaced => {
                emit_item_changed(conn, &self.name, &outcome.path).await;
            }
            ItemDisposition::Existing => {
                // Returned unchanged; just make sure it is on the bus.
                export_item(server, &self.state, &self.name, &outcome.record.id).await?;
            }
        }

        Ok((OwnedObjectPath::try_from(outcome.path)?, paths::no_object()))
    }

    #[zbus(signal)]
    async fn item_created(emitter: &SignalEmitter<'_>, item: ObjectPath<'_>) -> zbus::Result<()>;

    #[zbus(signal)]
    async fn item_deleted(emitter: &SignalEmitter<'_>, item: ObjectPath<'_>) -> zbus::Result<()>;

    #[zbus(signal)]
    async fn item_changed(emitter: &SignalEmitter<'_>, item: ObjectPath<'_>) -> zbus::Result<()>;

    /// Paths of the items in this collection.
    #[zbus(property)]
    async fn items(&self) -> zbus::fdo::Result<Vec<OwnedObjectPath>> {
        let item_paths = self
            .state
            .collection_item_paths(&self.name)
            .await
            .map_err(to_fdo)?;
        to_object_paths(item_paths).map_err(to_fdo)
    }

    #[zbus(property)]
    async fn label(&self) -> zbus::fdo::Result<String> {
        let record = self.state.collection_record(&self.name).await.map_err(to_fdo)?;
        Ok(record.label)
    }

    #[zbus(property)]
    async fn set_label(
        &self,
        label: String,
        #[zbus(connection)] conn: &Connection,
    ) -> zbus::fdo::Result<()> {
        self.state
            .set_collection_label(&self.name, &label)
            .await
            .map_err(to_fdo)?;
        service::emit_collection_changed(conn, &paths::collection(&self.name)).await;
        Ok(())
    }

    #[zbus(property)]
    async fn locked(&self) -> bool {
        self.state.collections.is_locked(&self.name)
    }

    #[zbus(property)]
    async fn created(&self) -> zbus::fdo::Result<u64> {
        let record = self.state.collection_record(&self.name).await.map_err(to_fdo)?;
        Ok(record.created)
    }

    #[zbus(property)]
    async fn modified(&self) -> zbus::fdo::Result<u64> {
        let record = self.state.collection_record(&self.name).await.map_err(to_fdo)?;
        Ok(record.modified)
    }
}

/// Emit `ItemCreated` from the canonical collection path.
pub(crate) async fn emit_item_created(conn: &Connection, collection: &str, item_path: &str) {
    emit(conn, collection, item_path, ItemSignal::Created).await;
}

/// Emit `ItemDeleted` from the canonical collection path.
pub(crate) async fn emit_item_deleted(conn: &Connection, collection: &str, item_path: &str) {
    emit(conn, collection, item_path, ItemSignal::Deleted).await;
}

/// Emit `ItemChanged` from the canonical collection path.
pub(crate) async fn emit_item_changed(conn: &Connection, collection: &str, item_path: &str) {
    emit(conn, collection, item_path, ItemSignal::Changed).await;
}

enum ItemSignal {
    Created,
    Deleted,
    Changed,
}

async fn emit(conn: &Connection, collection: &str, item_path: &str, kind: ItemSignal) {
    let collection_path = paths::collection(collection);
    let result: zbus::Result<()> = async {
        let emitter = SignalEmitter::new(conn, collection_path.as_str())?;
        let item = ObjectPath::try_from(item_path)?;
        match kind {
            ItemSignal::Created => CollectionIface::item_created(&emitter, item).await,
            ItemSignal::Deleted => CollectionIface::item_deleted(&emitter, item).await,
            ItemSignal::Changed => CollectionIface::item_changed(&emitter, item).await,
        }
    }
    .await;
    if let Err(err) = result {
        debug!(collection, item = item_path, %err, "failed to emit item signal");
    }
}

/// Re-announce the `Items` property at the canonical path and every alias
/// export of the collection.
pub(crate) async fn refresh_items(server: &ObjectServer, state: &Arc<ServiceState>, name: &str) {
    let mut targets = vec![paths::collection(name)];
    if let Some(entry) = state.collections.get(name) {
        targets.extend(entry.alias_paths());
    }

    for path in targets {
        let result: zbus::Result<()> = async {
            let iface = server.interface::<_, CollectionIface>(path.as_str()).await?;
            let emitter = iface.signal_emitter().clone();
            let res = iface.get().await.items_changed(&emitter).await;
            res
        }
        .await;
        if let Err(err) = result {
            debug!(collection = name, %err, "failed to refresh Items property");
        }
    }
}
