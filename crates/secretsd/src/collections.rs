//! Collection registry: the in-memory objects mirroring stored collections.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// In-memory state of one collection.
///
/// The `locked` flag is process-local: `Lock`/`Unlock` toggle it and
/// searches partition by it, but it is not persisted (the store is guarded
/// by the user's own GPG session).
pub struct CollectionEntry {
    name: String,
    locked: AtomicBool,
    /// Alias paths this collection is additionally exported at.
    alias_paths: Mutex<Vec<String>>,
}

impl CollectionEntry {
    fn new(name: String) -> Self {
        Self {
            name,
            locked: AtomicBool::new(false),
            alias_paths: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// Set the lock flag; idempotent.
    pub fn set_locked(&self, locked: bool) {
        self.locked.store(locked, Ordering::Relaxed);
    }

    /// Record an additional export path for this collection.
    pub fn add_alias_path(&self, path: String) {
        let mut paths = self.alias_paths.lock().unwrap_or_else(|e| e.into_inner());
        if !paths.contains(&path) {
            paths.push(path);
        }
    }

    /// All alias paths this collection is exported at.
    pub fn alias_paths(&self) -> Vec<String> {
        self.alias_paths
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Registry of materialised collections, keyed by canonical name.
#[derive(Default)]
pub struct CollectionRegistry {
    entries: RwLock<HashMap<String, Arc<CollectionEntry>>>,
}

impl CollectionRegistry {
    /// Insert (or fetch) the entry for `name`.
    pub fn insert(&self, name: &str) -> Arc<CollectionEntry> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CollectionEntry::new(name.to_string())))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<CollectionEntry>> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<CollectionEntry>> {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
    }

    /// Collection names, sorted for deterministic listings.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Whether the collection holding `name` is locked; unknown names count
    /// as unlocked.
    pub fn is_locked(&self, name: &str) -> bool {
        self.get(name).map(|entry| entry.locked()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_idempotent() {
        let registry = CollectionRegistry::default();
        let a = registry.insert("login");
        let b = registry.insert("login");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.names(), vec!["login"]);
    }

    #[test]
    fn lock_flag_is_idempotent() {
        let registry = CollectionRegistry::default();
        let entry = registry.insert("login");
        assert!(!entry.locked());
        entry.set_locked(true);
        entry.set_locked(true);
        assert!(registry.is_locked("login"));
        entry.set_locked(false);
        assert!(!registry.is_locked("login"));
    }

    #[test]
    fn alias_paths_deduplicate() {
        let entry = CollectionRegistry::default().insert("login");
        entry.add_alias_path("/org/freedesktop/secrets/aliases/default".into());
        entry.add_alias_path("/org/freedesktop/secrets/aliases/default".into());
        assert_eq!(entry.alias_paths().len(), 1);
    }
}
