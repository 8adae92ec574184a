//! In-memory store used by the test suites.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::store::SecretStore;
use crate::types::{attributes_match, unix_now, Attributes, CollectionRecord, ItemRecord};
use crate::{sanitize_name, Result, StoreError};

#[derive(Default)]
struct Inner {
    collections: BTreeMap<String, CollectionRecord>,
    items: BTreeMap<String, BTreeMap<String, ItemRecord>>,
    aliases: BTreeMap<String, String>,
}

/// A [`SecretStore`] holding everything in process memory.
///
/// Mirrors the adapter's observable behaviour (timestamp stamping,
/// content-type defaults, collection auto-creation) so service tests
/// exercise the same contract without the CLI.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn collections(&self) -> Result<Vec<String>> {
        Ok(self.read().collections.keys().cloned().collect())
    }

    async fn collection(&self, name: &str) -> Result<CollectionRecord> {
        self.read()
            .collections
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("collection {name}")))
    }

    async fn create_collection(&self, name: &str, label: &str) -> Result<()> {
        let name = sanitize_name(name);
        let now = unix_now();
        self.write().collections.insert(
            name.clone(),
            CollectionRecord {
                name,
                label: label.to_string(),
                created: now,
                modified: now,
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut inner = self.write();
        inner
            .collections
            .remove(name)
            .ok_or_else(|| StoreError::NotFound(format!("collection {name}")))?;
        inner.items.remove(name);
        Ok(())
    }

    async fn set_collection_label(&self, name: &str, label: &str) -> Result<()> {
        let mut inner = self.write();
        let record = inner
            .collections
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(format!("collection {name}")))?;
        record.label = label.to_string();
        record.modified = unix_now();
        Ok(())
    }

    async fn items(&self, collection: &str) -> Result<Vec<String>> {
        Ok(self
            .read()
            .items
            .get(collection)
            .map(|items| items.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn item(&self, collection: &str, id: &str) -> Result<ItemRecord> {
        self.read()
            .items
            .get(collection)
            .and_then(|items| items.get(id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("item {collection}/{id}")))
    }

    async fn insert_item(&self, collection: &str, mut record: ItemRecord) -> Result<ItemRecord> {
        if record.id.is_empty() {
            record.id = uuid::Uuid::new_v4().as_simple().to_string();
        }
        let now = unix_now();
        if record.created == 0 {
            record.created = now;
        }
        record.modified = now;
        if record.content_type.is_empty() {
            record.content_type = "text/plain".to_string();
        }

        let mut inner = self.write();
        if !inner.collections.contains_key(collection) {
            inner.collections.insert(
                collection.to_string(),
                CollectionRecord {
                    name: collection.to_string(),
                    label: collection.to_string(),
                    created: now,
                    modified: now,
                },
            );
        }
        inner
            .items
            .entry(collection.to_string())
            .or_default()
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update_item(
        &self,
        collection: &str,
        id: &str,
        mut record: ItemRecord,
    ) -> Result<ItemRecord> {
        let mut inner = self.write();
        let existing = inner
            .items
            .get_mut(collection)
            .and_then(|items| items.get_mut(id))
            .ok_or_else(|| StoreError::NotFound(format!("item {collection}/{id}")))?;

        record.id = id.to_string();
        record.created = existing.created;
        record.modified = unix_now();
        if record.content_type.is_empty() {
            record.content_type = existing.content_type.clone();
        }
        *existing = record.clone();
        Ok(record)
    }

    async fn delete_item(&self, collection: &str, id: &str) -> Result<()> {
        self.write()
            .items
            .get_mut(collection)
            .and_then(|items| items.remove(id))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("item {collection}/{id}")))
    }

    async fn search_items(&self, collection: &str, query: &Attributes) -> Result<Vec<ItemRecord>> {
        Ok(self
            .read()
            .items
            .get(collection)
            .map(|items| {
                items
                    .values()
                    .filter(|record| attributes_match(&record.attributes, query))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn search_all_items(
        &self,
        query: &Attributes,
    ) -> Result<BTreeMap<String, Vec<ItemRecord>>> {
        let inner = self.read();
        let mut results = BTreeMap::new();
        for (collection, items) in &inner.items {
            let matched: Vec<ItemRecord> = items
                .values()
                .filter(|record| attributes_match(&record.attributes, query))
                .cloned()
                .collect();
            if !matched.is_empty() {
                results.insert(collection.clone(), matched);
            }
        }
        Ok(results)
    }

    async fn alias(&self, name: &str) -> Result<Option<String>> {
        Ok(self.read().aliases.get(name).cloned())
    }

    async fn set_alias(&self, name: &str, target: Option<&str>) -> Result<()> {
        let mut inner = self.write();
        match target {
            Some(collection) => {
                inner
                    .aliases
                    .insert(name.to_string(), collection.to_string());
            }
            None => {
                inner.aliases.remove(name);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn insert_stamps_and_auto_creates_collection() {
        let store = MemoryStore::new();
        let record = store
            .insert_item(
                "login",
                ItemRecord {
                    secret: b"pw".to_vec(),
                    ..ItemRecord::default()
                },
            )
            .await
            .unwrap();

        assert!(!record.id.is_empty());
        assert!(record.created > 0);
        assert_eq!(record.content_type, "text/plain");
        assert_eq!(store.collections().await.unwrap(), vec!["login"]);

        let read_back = store.item("login", &record.id).await.unwrap();
        assert_eq!(read_back.secret, b"pw");
    }

    #[tokio::test]
    async fn update_preserves_created_and_content_type() {
        let store = MemoryStore::new();
        let inserted = store
            .insert_item(
                "login",
                ItemRecord {
                    secret: b"pw".to_vec(),
                    content_type: "text/plain".into(),
                    ..ItemRecord::default()
                },
            )
            .await
            .unwrap();

        let updated = store
            .update_item(
                "login",
                &inserted.id,
                ItemRecord {
                    secret: b"pw2".to_vec(),
                    created: 12345, // must be ignored
                    ..ItemRecord::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.created, inserted.created);
        assert!(updated.modified >= inserted.modified);
        assert_eq!(updated.content_type, "text/plain");
        assert_eq!(
            store.item("login", &inserted.id).await.unwrap().secret,
            b"pw2"
        );
    }

    #[tokio::test]
    async fn search_partitions_by_collection() {
        let store = MemoryStore::new();
        for (collection, svc) in [("a", "smtp"), ("b", "imap")] {
            store
                .insert_item(
                    collection,
                    ItemRecord {
                        secret: b"x".to_vec(),
                        attributes: attrs(&[("svc", svc)]),
                        ..ItemRecord::default()
                    },
                )
                .await
                .unwrap();
        }

        let all = store.search_all_items(&attrs(&[])).await.unwrap();
        assert_eq!(all.len(), 2);

        let smtp = store.search_all_items(&attrs(&[("svc", "smtp")])).await.unwrap();
        assert_eq!(smtp.keys().collect::<Vec<_>>(), vec!["a"]);
    }

    #[tokio::test]
    async fn delete_collection_cascades() {
        let store = MemoryStore::new();
        let record = store
            .insert_item("login", ItemRecord::default())
            .await
            .unwrap();
        store.delete_collection("login").await.unwrap();
        assert!(store.item("login", &record.id).await.is_err());
        assert!(store.collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn alias_round_trip_and_removal() {
        let store = MemoryStore::new();
        assert_eq!(store.alias("default").await.unwrap(), None);
        store.set_alias("default", Some("login")).await.unwrap();
        assert_eq!(
            store.alias("default").await.unwrap(),
            Some("login".to_string())
        );
        store.set_alias("default", None).await.unwrap();
        assert_eq!(store.alias("default").await.unwrap(), None);
    }
}
