//! Shared service state and the operations behind every bus method.
//!
//! The bus interfaces in [`crate::api`] are thin adapters over this layer:
//! they translate wire types, export/unexport objects, and emit signals,
//! while the semantics (session resolution, duplicate detection, alias
//! handling, lock partitioning) live here where they can be exercised
//! against the in-memory store.

use std::collections::HashMap;
use std::sync::Arc;

use secretsd_store::{sanitize_name, Attributes, CollectionRecord, ItemRecord, SecretStore};
use tracing::{debug, warn};
use uuid::Uuid;
use zbus::zvariant::{OwnedObjectPath, OwnedValue};

use crate::collections::CollectionRegistry;
use crate::config::Config;
use crate::error::ServiceError;
use crate::items::ItemRegistry;
use crate::paths;
use crate::prompts::PromptRegistry;
use crate::secret::Secret;
use crate::sessions::SessionRegistry;

/// Property key carrying a collection label in `CreateCollection`.
pub const PROP_COLLECTION_LABEL: &str = "org.freedesktop.Secret.Collection.Label";

/// Property key carrying an item label in `CreateItem`.
pub const PROP_ITEM_LABEL: &str = "org.freedesktop.Secret.Item.Label";

/// Property key carrying item attributes in `CreateItem`.
pub const PROP_ITEM_ATTRIBUTES: &str = "org.freedesktop.Secret.Item.Attributes";

/// What `create_item` did, so the bus layer knows which signal to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemDisposition {
    /// A fresh item was persisted.
    Created,
    /// An attribute-equal duplicate was overwritten (`replace = true`).
    Replaced,
    /// An attribute-equal duplicate was returned untouched.
    Existing,
}

/// Result of `create_item`.
pub struct ItemOutcome {
    pub record: ItemRecord,
    pub path: String,
    pub disposition: ItemDisposition,
}

/// Result of `create_collection`.
pub struct NewCollection {
    pub name: String,
    pub path: String,
    /// Alias path to additionally export, when an alias was supplied and
    /// persisted.
    pub alias_path: Option<String>,
}

/// Result of `delete_collection`: everything the bus layer must unexport.
pub struct DeletedCollection {
    pub path: String,
    pub alias_paths: Vec<String>,
    pub item_paths: Vec<String>,
}

/// State shared by every bus object.
pub struct ServiceState {
    pub config: Config,
    pub store: Arc<dyn SecretStore>,
    pub sessions: SessionRegistry,
    pub collections: CollectionRegistry,
    pub items: ItemRegistry,
    pub prompts: PromptRegistry,
}

impl ServiceState {
    pub fn new(config: Config, store: Arc<dyn SecretStore>) -> Self {
        Self {
            config,
            store,
            sessions: SessionRegistry::default(),
            collections: CollectionRegistry::default(),
            items: ItemRegistry::default(),
            prompts: PromptRegistry::default(),
        }
    }

    // ── sessions ───────────────────────────────────────────────────────

    /// `Service.OpenSession`: negotiate a codec and register the session.
    pub fn open_session(
        &self,
        algorithm: &str,
        input: &[u8],
        client: Option<String>,
    ) -> Result<(Arc<crate::sessions::Session>, Vec<u8>), ServiceError> {
        self.sessions.open(algorithm, input, client)
    }

    /// `Session.Close` and disconnect cleanup: drop the registry entry and
    /// zeroise the codec.
    pub fn close_session(&self, path: &str) -> bool {
        match self.sessions.remove(path) {
            Some(session) => {
                session.close();
                debug!(session = path, "session closed");
                true
            }
            None => false,
        }
    }

    // ── collections ────────────────────────────────────────────────────

    /// Materialise every stored collection, returning `(name, item_ids)`
    /// pairs for the bus layer to export.
    pub async fn bootstrap_collections(
        &self,
    ) -> Result<Vec<(String, Vec<String>)>, ServiceError> {
        let names = self.store.collections().await.map_err(|err| {
            warn!(%err, "failed to list collections from store");
            ServiceError::from(err)
        })?;

        let mut out = Vec::with_capacity(names.len());
        for name in names {
            self.collections.insert(&name);
            let ids = self.store.items(&name).await.unwrap_or_else(|err| {
                warn!(collection = %name, %err, "failed to list items");
                Vec::new()
            });
            out.push((name, ids));
        }
        Ok(out)
    }

    /// Resolve (or create) the collection behind the `default` alias.
    ///
    /// Returns the collection name and whether it was newly created.
    pub async fn ensure_default_collection(&self) -> Result<(String, bool), ServiceError> {
        if let Ok(Some(target)) = self.store.alias("default").await {
            if self.store.collection(&target).await.is_ok() {
                let entry = self.collections.insert(&target);
                entry.add_alias_path(paths::alias("default"));
                return Ok((target, false));
            }
        }

        let name = sanitize_name(&self.config.default_collection);
        self.store.create_collection(&name, "Default").await?;
        self.store.set_alias("default", Some(&name)).await?;
        let entry = self.collections.insert(&name);
        entry.add_alias_path(paths::alias("default"));
        Ok((name, true))
    }

    /// `Service.CreateCollection`.
    pub async fn create_collection(
        &self,
        properties: &HashMap<String, OwnedValue>,
        alias: &str,
    ) -> Result<NewCollection, ServiceError> {
        let label = string_prop(properties, PROP_COLLECTION_LABEL)?.unwrap_or_default();

        let name = if !alias.is_empty() {
            alias
        } else if !label.is_empty() {
            label.as_str()
        } else {
            "collection"
        };
        let name = sanitize_name(name);

        if self.collections.contains(&name) {
            return Err(ServiceError::AlreadyExists(format!(
                "collection already exists: {name}"
            )));
        }

        self.store.create_collection(&name, &label).await?;
        let entry = self.collections.insert(&name);

        let alias_path = if alias.is_empty() {
            None
        } else {
            match self.store.set_alias(alias, Some(&name)).await {
                Ok(()) => {
                    let path = paths::alias(alias);
                    entry.add_alias_path(path.clone());
                    Some(path)
                }
                Err(err) => {
                    warn!(alias, %err, "failed to persist alias");
                    None
                }
            }
        };

        Ok(NewCollection {
            path: paths::collection(&name),
            name,
            alias_path,
        })
    }

    /// `Collection.Delete`.
    pub async fn delete_collection(&self, name: &str) -> Result<DeletedCollection, ServiceError> {
        self.store.delete_collection(name).await?;
        let entry = self.collections.remove(name);
        Ok(DeletedCollection {
            path: paths::collection(name),
            alias_paths: entry.map(|e| e.alias_paths()).unwrap_or_default(),
            item_paths: self.items.remove_collection(name),
        })
    }

    /// Collection metadata for property reads.
    pub async fn collection_record(&self, name: &str) -> Result<CollectionRecord, ServiceError> {
        Ok(self.store.collection(name).await?)
    }

    /// `Collection.Label` writes.
    pub async fn set_collection_label(&self, name: &str, label: &str) -> Result<(), ServiceError> {
        Ok(self.store.set_collection_label(name, label).await?)
    }

    /// Item paths of one collection, for the `Items` property.
    pub async fn collection_item_paths(&self, name: &str) -> Result<Vec<String>, ServiceError> {
        let ids = self.store.items(name).await?;
        Ok(ids.iter().map(|id| paths::item(name, id)).collect())
    }

    // ── items ──────────────────────────────────────────────────────────

    /// `Collection.CreateItem`: resolve the session, decrypt the transport
    /// secret, extract label and attributes, detect an attribute-equal
    /// duplicate, then create, replace, or return the existing item.
    pub async fn create_item(
        &self,
        collection: &str,
        properties: &HashMap<String, OwnedValue>,
        secret: &Secret,
        replace: bool,
    ) -> Result<ItemOutcome, ServiceError> {
        let session = self.sessions.resolve(secret.session.as_str())?;
        let plaintext = session.decrypt(&secret.parameters, &secret.value)?;

        let label = string_prop(properties, PROP_ITEM_LABEL)?.unwrap_or_default();
        let attributes = attributes_prop(properties)?;

        let duplicate = if attributes.is_empty() {
            None
        } else {
            self.store
                .search_items(collection, &attributes)
                .await
                .map_err(|err| {
                    warn!(collection, %err, "store search failed");
                    ServiceError::from(err)
                })?
                .into_iter()
                .find(|record| record.attributes == attributes)
        };

        match duplicate {
            Some(existing) if replace => {
                let mut record = existing.clone();
                record.secret = plaintext.to_vec();
                record.content_type = secret.content_type.clone();
                if !label.is_empty() {
                    record.label = label;
                }
                let record = self.store.update_item(collection, &existing.id, record).await?;
                Ok(ItemOutcome {
                    path: paths::item(collection, &record.id),
                    record,
                    disposition: ItemDisposition::Replaced,
                })
            }
            // Clients re-store the same credential over and over; answering
            // with the existing item keeps the collection free of duplicates.
            Some(existing) => Ok(ItemOutcome {
                path: paths::item(collection, &existing.id),
                record: existing,
                disposition: ItemDisposition::Existing,
            }),
            None => {
                let record = ItemRecord {
                    id: format!("i{}", Uuid::new_v4().as_simple()),
                    label,
                    secret: plaintext.to_vec(),
                    content_type: secret.content_type.clone(),
                    attributes,
                    ..ItemRecord::default()
                };
                let record = self.store.insert_item(collection, record).await?;
                Ok(ItemOutcome {
                    path: paths::item(collection, &record.id),
                    record,
                    disposition: ItemDisposition::Created,
                })
            }
        }
    }

    /// `Item.Delete`.
    pub async fn delete_item(&self, collection: &str, id: &str) -> Result<String, ServiceError> {
        self.store.delete_item(collection, id).await?;
        let path = paths::item(collection, id);
        self.items.remove(&path);
        Ok(path)
    }

    /// One item's stored record.
    pub async fn item_record(&self, collection: &str, id: &str) -> Result<ItemRecord, ServiceError> {
        Ok(self.store.item(collection, id).await?)
    }

    /// `Item.GetSecret`: read and encrypt for the given session.
    pub async fn get_secret(
        &self,
        collection: &str,
        id: &str,
        session_path: &str,
    ) -> Result<Secret, ServiceError> {
        let session = self.sessions.resolve(session_path)?;
        let record = self.store.item(collection, id).await?;
        let (parameters, value) = session.encrypt(&record.secret)?;
        Ok(Secret {
            session: OwnedObjectPath::try_from(session_path.to_string())?,
            parameters,
            value,
            content_type: record.content_type,
        })
    }

    /// `Item.SetSecret`: decrypt and overwrite, preserving creation time.
    /// An empty content-type keeps the stored one.
    pub async fn set_secret(
        &self,
        collection: &str,
        id: &str,
        secret: &Secret,
    ) -> Result<(), ServiceError> {
        let session = self.sessions.resolve(secret.session.as_str())?;
        let plaintext = session.decrypt(&secret.parameters, &secret.value)?;

        let mut record = self.store.item(collection, id).await?;
        record.secret = plaintext.to_vec();
        record.content_type = secret.content_type.clone();
        self.store.update_item(collection, id, record).await?;
        Ok(())
    }

    /// `Item.Label` writes.
    pub async fn set_item_label(
        &self,
        collection: &str,
        id: &str,
        label: &str,
    ) -> Result<(), ServiceError> {
        let mut record = self.store.item(collection, id).await?;
        record.label = label.to_string();
        self.store.update_item(collection, id, record).await?;
        Ok(())
    }

    /// `Item.Attributes` writes.
    pub async fn set_item_attributes(
        &self,
        collection: &str,
        id: &str,
        attributes: Attributes,
    ) -> Result<(), ServiceError> {
        let mut record = self.store.item(collection, id).await?;
        record.attributes = attributes;
        self.store.update_item(collection, id, record).await?;
        Ok(())
    }

    // ── service-level operations ───────────────────────────────────────

    /// `Service.SearchItems`: subset-match across all collections,
    /// partitioned into `(unlocked, locked)` by the in-memory flag.
    pub async fn search_all(
        &self,
        query: &Attributes,
    ) -> Result<(Vec<String>, Vec<String>), ServiceError> {
        let results = self.store.search_all_items(query).await?;

        let mut unlocked = Vec::new();
        let mut locked = Vec::new();
        for (collection, records) in results {
            let bucket = if self.collections.is_locked(&collection) {
                &mut locked
            } else {
                &mut unlocked
            };
            for record in records {
                bucket.push(paths::item(&collection, &record.id));
            }
        }
        Ok((unlocked, locked))
    }

    /// `Collection.SearchItems`.
    pub async fn search_collection(
        &self,
        collection: &str,
        query: &Attributes,
    ) -> Result<Vec<String>, ServiceError> {
        let records = self.store.search_items(collection, query).await?;
        Ok(records
            .iter()
            .map(|record| paths::item(collection, &record.id))
            .collect())
    }

    /// `Service.Lock` / `Service.Unlock`: toggle the in-memory flag for
    /// every recognised collection path, returning the toggled paths.
    pub fn set_locked(&self, objects: &[String], locked: bool) -> Vec<String> {
        let mut toggled = Vec::new();
        for path in objects {
            if !paths::is_collection_path(path) {
                continue;
            }
            let Some(name) = paths::parse_collection(path) else {
                continue;
            };
            let Some(entry) = self.collections.get(&name) else {
                continue;
            };
            entry.set_locked(locked);
            toggled.push(path.clone());
        }
        toggled
    }

    /// `Service.GetSecrets`: best effort; items that fail to parse, load,
    /// or encrypt are silently omitted.
    pub async fn get_secrets(
        &self,
        items: &[String],
        session_path: &str,
    ) -> Result<HashMap<String, Secret>, ServiceError> {
        let session = self.sessions.resolve(session_path)?;
        let session_obj = OwnedObjectPath::try_from(session_path.to_string())?;

        let mut secrets = HashMap::new();
        for path in items {
            let Some((collection, id)) = paths::parse_item(path) else {
                continue;
            };
            let Ok(record) = self.store.item(&collection, &id).await else {
                continue;
            };
            let Ok((parameters, value)) = session.encrypt(&record.secret) else {
                continue;
            };
            secrets.insert(
                path.clone(),
                Secret {
                    session: session_obj.clone(),
                    parameters,
                    value,
                    content_type: record.content_type,
                },
            );
        }
        Ok(secrets)
    }

    /// `Service.ReadAlias`: the canonical collection path, or `/` when the
    /// alias is unknown (not an error).
    pub async fn read_alias(&self, name: &str) -> String {
        match self.store.alias(name).await {
            Ok(Some(target)) => paths::collection(&target),
            Ok(None) => "/".to_string(),
            Err(err) => {
                debug!(alias = name, %err, "alias lookup failed");
                "/".to_string()
            }
        }
    }

    /// `Service.SetAlias`: `/` removes the alias, anything else must parse
    /// as a collection path. Runtime changes only update the persisted
    /// mapping; alias exports are re-resolved at the next start.
    pub async fn set_alias(&self, name: &str, collection_path: &str) -> Result<(), ServiceError> {
        if collection_path == "/" {
            self.store.set_alias(name, None).await?;
            return Ok(());
        }

        let collection = paths::parse_collection(collection_path).ok_or_else(|| {
            ServiceError::NoSuchObject(format!("not a collection path: {collection_path}"))
        })?;
        self.store.set_alias(name, Some(&collection)).await?;
        Ok(())
    }

    /// Canonical paths of all materialised collections, sorted.
    pub fn collection_paths(&self) -> Vec<String> {
        self.collections
            .names()
            .iter()
            .map(|name| paths::collection(name))
            .collect()
    }
}

/// Extract an optional string property, rejecting non-string values.
fn string_prop(
    properties: &HashMap<String, OwnedValue>,
    key: &str,
) -> Result<Option<String>, ServiceError> {
    match properties.get(key) {
        None => Ok(None),
        Some(value) => {
            let s: &str = value
                .downcast_ref()
                .map_err(|_| ServiceError::invalid_args(format!("{key} must be a string")))?;
            Ok(Some(s.to_string()))
        }
    }
}

/// Extract the attributes property, accepting both `a{ss}` and `a{sv}`
/// (with string values) forms.
fn attributes_prop(properties: &HashMap<String, OwnedValue>) -> Result<Attributes, ServiceError> {
    let Some(value) = properties.get(PROP_ITEM_ATTRIBUTES) else {
        return Ok(Attributes::new());
    };

    let clone = |v: &OwnedValue| {
        v.try_clone()
            .map_err(|e| ServiceError::invalid_args(e.to_string()))
    };

    if let Ok(map) = HashMap::<String, String>::try_from(clone(value)?) {
        return Ok(map.into_iter().collect());
    }

    let map = HashMap::<String, OwnedValue>::try_from(clone(value)?).map_err(|_| {
        ServiceError::invalid_args(format!("{PROP_ITEM_ATTRIBUTES} must be a map of strings"))
    })?;

    let mut attributes = Attributes::new();
    for (key, value) in map {
        let s: &str = value.downcast_ref().map_err(|_| {
            ServiceError::invalid_args(format!("attribute {key} must be a string"))
        })?;
        attributes.insert(key, s.to_string());
    }
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zbus::zvariant::Value;

    fn owned(value: Value<'_>) -> OwnedValue {
        value.try_to_owned().unwrap()
    }

    #[test]
    fn string_prop_rejects_non_strings() {
        let mut properties = HashMap::new();
        properties.insert(PROP_ITEM_LABEL.to_string(), owned(Value::from(7u32)));
        assert!(string_prop(&properties, PROP_ITEM_LABEL).is_err());

        properties.insert(PROP_ITEM_LABEL.to_string(), owned(Value::from("x")));
        assert_eq!(
            string_prop(&properties, PROP_ITEM_LABEL).unwrap().as_deref(),
            Some("x")
        );
    }

    #[test]
    fn attributes_accept_plain_string_maps() {
        let mut map = HashMap::new();
        map.insert("svc".to_string(), "smtp".to_string());
        let mut properties = HashMap::new();
        properties.insert(PROP_ITEM_ATTRIBUTES.to_string(), owned(Value::from(map)));

        let attributes = attributes_prop(&properties).unwrap();
        assert_eq!(attributes.get("svc").map(String::as_str), Some("smtp"));
    }

    #[test]
    fn attributes_accept_variant_maps_with_string_values() {
        let mut map: HashMap<String, Value<'_>> = HashMap::new();
        map.insert("svc".to_string(), Value::from("smtp"));
        let mut properties = HashMap::new();
        properties.insert(PROP_ITEM_ATTRIBUTES.to_string(), owned(Value::from(map)));

        let attributes = attributes_prop(&properties).unwrap();
        assert_eq!(attributes.get("svc").map(String::as_str), Some("smtp"));
    }

    #[test]
    fn attributes_reject_non_string_variant_values() {
        let mut map: HashMap<String, Value<'_>> = HashMap::new();
        map.insert("svc".to_string(), Value::from(5u32));
        let mut properties = HashMap::new();
        properties.insert(PROP_ITEM_ATTRIBUTES.to_string(), owned(Value::from(map)));

        assert!(attributes_prop(&properties).is_err());
    }

    #[test]
    fn missing_attributes_mean_empty_map() {
        assert!(attributes_prop(&HashMap::new()).unwrap().is_empty());
    }
}
