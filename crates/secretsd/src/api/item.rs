//! `org.freedesktop.Secret.Item` objects.

use std::collections::HashMap;
use std::sync::Arc;

use zbus::zvariant::OwnedObjectPath;
use zbus::{interface, Connection, ObjectServer};

use super::{collection, to_fdo};
use crate::error::ServiceError;
use crate::paths;
use crate::secret::Secret;
use crate::state::ServiceState;

pub struct ItemIface {
    state: Arc<ServiceState>,
    collection: String,
    id: String,
}

impl ItemIface {
    pub fn new(state: Arc<ServiceState>, collection: String, id: String) -> Self {
        Self {
            state,
            collection,
            id,
        }
    }

    fn path(&self) -> String {
        paths::item(&self.collection, &self.id)
    }
}

#[interface(name = "org.freedesktop.Secret.Item")]
impl ItemIface {
    /// Delete this item from the store and the bus.
    async fn delete(
        &self,
        #[zbus(object_server)] server: &ObjectServer,
        #[zbus(connection)] conn: &Connection,
    ) -> Result<OwnedObjectPath, ServiceError> {
        let path = self.state.delete_item(&self.collection, &self.id).await?;
        let _ = server.remove::<Self, _>(path.as_str()).await;

        collection::refresh_items(server, &self.state, &self.collection).await;
        collection::emit_item_deleted(conn, &self.collection, &path).await;
        Ok(paths::no_object())
    }

    /// Read the secret, encrypted for the given session.
    async fn get_secret(&self, session: OwnedObjectPath) -> Result<Secret, ServiceError> {
        self.state
            .get_secret(&self.collection, &self.id, session.as_str())
            .await
    }

    /// Overwrite the secret (and content type, unless empty).
    async fn set_secret(
        &self,
        secret: Secret,
        #[zbus(connection)] conn: &Connection,
    ) -> Result<(), ServiceError> {
        self.state
            .set_secret(&self.collection, &self.id, &secret)
            .await?;
        collection::emit_item_changed(conn, &self.collection, &self.path()).await;
        Ok(())
    }

    /// Items follow their collection's lock flag.
    #[zbus(property)]
    async fn locked(&self) -> bool {
        self.state.collections.is_locked(&self.collection)
    }

    #[zbus(property)]
    async fn attributes(&self) -> zbus::fdo::Result<HashMap<String, String>> {
        let record = self
            .state
            .item_record(&self.collection, &self.id)
            .await
            .map_err(to_fdo)?;
        Ok(record.attributes.into_iter().collect())
    }

    #[zbus(property)]
    async fn set_attributes(
        &self,
        attributes: HashMap<String, String>,
        #[zbus(connection)] conn: &Connection,
    ) -> zbus::fdo::Result<()> {
        self.state
            .set_item_attributes(&self.collection, &self.id, attributes.into_iter().collect())
            .await
            .map_err(to_fdo)?;
        collection::emit_item_changed(conn, &self.collection, &self.path()).await;
        Ok(())
    }

    #[zbus(property)]
    async fn label(&self) -> zbus::fdo::Result<String> {
        let record = self
            .state
            .item_record(&self.collection, &self.id)
            .await
            .map_err(to_fdo)?;
        Ok(record.label)
    }

    #[zbus(property)]
    async fn set_label(
        &self,
        label: String,
        #[zbus(connection)] conn: &Connection,
    ) -> zbus::fdo::Result<()> {
        self.state
            .set_item_label(&self.collection, &self.id, &label)
            .await
            .map_err(to_fdo)?;
        collection::emit_item_changed(conn, &self.collection, &self.path()).await;
        Ok(())
    }

    #[zbus(property)]
    async fn created(&self) -> zbus::fdo::Result<u64> {
        let record = self
            .state
            .item_record(&self.collection, &self.id)
            .await
            .map_err(to_fdo)?;
        Ok(record.created)
    }

    #[zbus(property)]
    async fn modified(&self) -> zbus::fdo::Result<u64> {
        let record = self
            .state
            .item_record(&self.collection, &self.id)
            .await
            .map_err(to_fdo)?;
        Ok(record.modified)
    }
}
