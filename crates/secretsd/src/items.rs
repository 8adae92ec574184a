//! Item registry: tracks which item objects are exported on the bus.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::paths;

/// Maps exported item paths back to `(collection, id)`.
///
/// The object server owns the interface values; this registry is the index
/// that lets `Collection.Delete` unexport every child and keeps exports
/// idempotent.
#[derive(Default)]
pub struct ItemRegistry {
    entries: RwLock<HashMap<String, (String, String)>>,
}

impl ItemRegistry {
    /// Record an exported item, returning its path. Re-recording the same
    /// item is a no-op.
    pub fn insert(&self, collection: &str, id: &str) -> String {
        let path = paths::item(collection, id);
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.clone(), (collection.to_string(), id.to_string()));
        path
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(path)
    }

    /// Forget one item; returns true when it was known.
    pub fn remove(&self, path: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(path)
            .is_some()
    }

    /// Forget every item of a collection, returning their paths so the bus
    /// layer can unexport them.
    pub fn remove_collection(&self, collection: &str) -> Vec<String> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let removed: Vec<String> = entries
            .iter()
            .filter(|(_, (owner, _))| owner == collection)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &removed {
            entries.remove(path);
        }
        removed
    }

    /// Paths of all exported items in one collection, sorted.
    pub fn collection_paths(&self, collection: &str) -> Vec<String> {
        let mut result: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(_, (owner, _))| owner == collection)
            .map(|(path, _)| path.clone())
            .collect();
        result.sort();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_items_per_collection() {
        let registry = ItemRegistry::default();
        let a = registry.insert("login", "i01");
        registry.insert("login", "i02");
        registry.insert("web", "i03");

        assert!(registry.contains(&a));
        assert_eq!(registry.collection_paths("login").len(), 2);

        let removed = registry.remove_collection("login");
        assert_eq!(removed.len(), 2);
        assert!(!registry.contains(&a));
        assert_eq!(registry.collection_paths("web").len(), 1);
    }

    #[test]
    fn remove_reports_whether_known() {
        let registry = ItemRegistry::default();
        let path = registry.insert("login", "i01");
        assert!(registry.remove(&path));
        assert!(!registry.remove(&path));
    }
}
