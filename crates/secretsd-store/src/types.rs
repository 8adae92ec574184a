use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Searchable item attributes, kept sorted so persisted records and on-disk
/// diffs are deterministic.
pub type Attributes = BTreeMap<String, String>;

/// A stored secret with its metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemRecord {
    /// Stable identifier, valid as a bus path element.
    pub id: String,
    /// Human-readable label.
    pub label: String,
    /// The secret value, binary-safe.
    pub secret: Vec<u8>,
    /// MIME type of the secret; empty means "keep existing / text/plain".
    pub content_type: String,
    /// Searchable attributes.
    pub attributes: Attributes,
    /// Creation time, seconds since epoch.
    pub created: u64,
    /// Last modification time, seconds since epoch.
    pub modified: u64,
}

/// Collection metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionRecord {
    /// Canonical short name, used in paths.
    pub name: String,
    /// Human-readable label.
    pub label: String,
    /// Creation time, seconds since epoch.
    pub created: u64,
    /// Last modification time, seconds since epoch.
    pub modified: u64,
}

/// Current time in seconds since the Unix epoch.
///
/// # Panics
///
/// Panics if the system clock is set before 1970.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time is before the Unix epoch")
        .as_secs()
}

/// Subset match: every `(k, v)` of `query` must be present and equal in
/// `attributes`. The empty query matches everything.
pub fn attributes_match(attributes: &Attributes, query: &Attributes) -> bool {
    query
        .iter()
        .all(|(k, v)| attributes.get(k).is_some_and(|av| av == v))
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

    #[test]
    fn empty_query_matches_all() {
        assert!(attributes_match(&attrs(&[("svc", "smtp")]), &attrs(&[])));
        assert!(attributes_match(&attrs(&[]), &attrs(&[])));
    }

    #[test]
    fn subset_semantics() {
        let item = attrs(&[("svc", "smtp"), ("user", "a")]);
        assert!(attributes_match(&item, &attrs(&[("svc", "smtp")])));
        assert!(!attributes_match(&item, &attrs(&[("svc", "imap")])));
        assert!(!attributes_match(&item, &attrs(&[("host", "x")])));
        assert!(!attributes_match(
            &attrs(&[("svc", "smtp")]),
            &attrs(&[("svc", "smtp"), ("user", "a")])
        ));
    }
}
