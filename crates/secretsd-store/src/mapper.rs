//! Mapping between service names and password-store entry paths.

use crate::errors::StoreError;
use crate::Result;

/// Entry name of the per-collection metadata record.
pub(crate) const META_ENTRY: &str = "_meta";

/// Entry name of the aliases record, directly under the prefix.
pub(crate) const ALIASES_ENTRY: &str = "_aliases";

/// Translates collection / item names into store entry paths under a
/// configurable prefix.
#[derive(Debug, Clone)]
pub struct Mapper {
    prefix: String,
}

impl Mapper {
    /// Create a mapper rooted at `prefix` (e.g. `secret-service`).
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The store prefix all entries live under.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Store path of a collection directory.
    pub fn collection_path(&self, name: &str) -> String {
        format!("{}/{}", self.prefix, name)
    }

    /// Store path of an item entry.
    pub fn item_path(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.prefix, collection, id)
    }

    /// Store path of a collection's metadata entry.
    pub fn collection_meta_path(&self, name: &str) -> String {
        format!("{}/{}/{}", self.prefix, name, META_ENTRY)
    }

    /// Store path of the aliases entry.
    pub fn aliases_path(&self) -> String {
        format!("{}/{}", self.prefix, ALIASES_ENTRY)
    }

    /// Split a store path into `(collection, item_id)`; the item id is empty
    /// for paths one level below the prefix.
    pub fn parse(&self, path: &str) -> Result<(String, String)> {
        let rest = path
            .strip_prefix(&self.prefix)
            .and_then(|r| r.strip_prefix('/'))
            .ok_or_else(|| StoreError::Backend(format!("path outside prefix: {path}")))?;
        match rest.split_once('/') {
            Some((collection, item)) => Ok((collection.to_string(), item.to_string())),
            None => Ok((rest.to_string(), String::new())),
        }
    }
}

/// Replace characters that would break store or bus paths with underscores.
pub fn sanitize_name(name: &str) -> String {
    name.replace(['/', '\\', ' '], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_paths_under_prefix() {
        let m = Mapper::new("secret-service");
        assert_eq!(m.collection_path("default"), "secret-service/default");
        assert_eq!(m.item_path("default", "i01"), "secret-service/default/i01");
        assert_eq!(
            m.collection_meta_path("default"),
            "secret-service/default/_meta"
        );
        assert_eq!(m.aliases_path(), "secret-service/_aliases");
    }

    #[test]
    fn parse_round_trips() {
        let m = Mapper::new("secret-service");
        assert_eq!(
            m.parse("secret-service/default/i01").unwrap(),
            ("default".to_string(), "i01".to_string())
        );
        assert_eq!(
            m.parse("secret-service/default").unwrap(),
            ("default".to_string(), String::new())
        );
        assert!(m.parse("elsewhere/default").is_err());
    }

    #[test]
    fn sanitize_replaces_separators() {
        assert_eq!(sanitize_name("my collection"), "my_collection");
        assert_eq!(sanitize_name("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_name("plain"), "plain");
    }
}
