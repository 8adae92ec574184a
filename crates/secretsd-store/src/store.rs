use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::types::{Attributes, CollectionRecord, ItemRecord};
use crate::Result;

/// The persistence contract the service consumes.
///
/// Implementations own their internal serialisation; callers may invoke
/// methods concurrently. All searches use subset matching on attributes
/// (see [`crate::attributes_match`]).
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// All collection names, sorted.
    async fn collections(&self) -> Result<Vec<String>>;

    /// Load one collection's metadata.
    async fn collection(&self, name: &str) -> Result<CollectionRecord>;

    /// Create a collection. The name is expected to be sanitized already.
    async fn create_collection(&self, name: &str, label: &str) -> Result<()>;

    /// Delete a collection and every item in it.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Update a collection's label, recording a new modification time.
    async fn set_collection_label(&self, name: &str, label: &str) -> Result<()>;

    /// All item ids in a collection.
    async fn items(&self, collection: &str) -> Result<Vec<String>>;

    /// Load one item.
    async fn item(&self, collection: &str, id: &str) -> Result<ItemRecord>;

    /// Insert a new item, creating the collection if needed. Returns the
    /// record as persisted (id and timestamps filled in).
    async fn insert_item(&self, collection: &str, record: ItemRecord) -> Result<ItemRecord>;

    /// Overwrite an existing item. The stored creation time is preserved and
    /// an empty `content_type` keeps the existing one. Returns the record as
    /// persisted.
    async fn update_item(
        &self,
        collection: &str,
        id: &str,
        record: ItemRecord,
    ) -> Result<ItemRecord>;

    /// Delete one item.
    async fn delete_item(&self, collection: &str, id: &str) -> Result<()>;

    /// Items in one collection whose attributes subset-match `query`.
    async fn search_items(&self, collection: &str, query: &Attributes) -> Result<Vec<ItemRecord>>;

    /// Matching items across every collection, keyed by collection name.
    /// Collections that fail to load are skipped.
    async fn search_all_items(
        &self,
        query: &Attributes,
    ) -> Result<BTreeMap<String, Vec<ItemRecord>>>;

    /// Resolve an alias to a collection name, `None` when unset.
    async fn alias(&self, name: &str) -> Result<Option<String>>;

    /// Set (`Some`) or remove (`None`) an alias.
    async fn set_alias(&self, name: &str, target: Option<&str>) -> Result<()>;
}
