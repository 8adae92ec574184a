//! Object-path construction and parsing for the service object graph.
//!
//! The path layout is fixed by the Secret Service specification:
//!
//! ```text
//! /org/freedesktop/secrets                      service root
//! /org/freedesktop/secrets/collection/<name>    collection
//! /org/freedesktop/secrets/collection/<n>/<id>  item
//! /org/freedesktop/secrets/session/<id>         session
//! /org/freedesktop/secrets/prompt/<id>          prompt
//! /org/freedesktop/secrets/aliases/<name>       collection alias
//! ```

use zbus::zvariant::{ObjectPath, OwnedObjectPath};

/// Path of the root service object.
pub const SERVICE_PATH: &str = "/org/freedesktop/secrets";

/// Base path for collections.
pub const COLLECTION_BASE: &str = "/org/freedesktop/secrets/collection";

/// Base path for sessions.
pub const SESSION_BASE: &str = "/org/freedesktop/secrets/session";

/// Base path for prompts.
pub const PROMPT_BASE: &str = "/org/freedesktop/secrets/prompt";

/// Base path for collection aliases.
pub const ALIAS_BASE: &str = "/org/freedesktop/secrets/aliases";

/// The root path doubles as "no object": the prompt slot of replies that
/// need no prompt and the result of resolving an unknown alias.
pub fn no_object() -> OwnedObjectPath {
    ObjectPath::from_static_str_unchecked("/").into()
}

pub fn collection(name: &str) -> String {
    format!("{COLLECTION_BASE}/{name}")
}

pub fn item(collection: &str, id: &str) -> String {
    format!("{COLLECTION_BASE}/{collection}/{id}")
}

pub fn session(id: &str) -> String {
    format!("{SESSION_BASE}/{id}")
}

pub fn prompt(id: &str) -> String {
    format!("{PROMPT_BASE}/{id}")
}

pub fn alias(name: &str) -> String {
    format!("{ALIAS_BASE}/{name}")
}

/// Extract the collection name from a collection (or item) path.
pub fn parse_collection(path: &str) -> Option<String> {
    let rest = strip_base(path, COLLECTION_BASE)?;
    Some(rest.split('/').next().unwrap_or(rest).to_string())
}

/// Extract `(collection, item_id)` from an item path.
pub fn parse_item(path: &str) -> Option<(String, String)> {
    let rest = strip_base(path, COLLECTION_BASE)?;
    let (collection, id) = rest.split_once('/')?;
    if collection.is_empty() || id.is_empty() {
        return None;
    }
    Some((collection.to_string(), id.to_string()))
}

/// Extract the session id from a session path.
pub fn parse_session(path: &str) -> Option<String> {
    strip_base(path, SESSION_BASE).map(str::to_string)
}

/// Extract the prompt id from a prompt path.
pub fn parse_prompt(path: &str) -> Option<String> {
    strip_base(path, PROMPT_BASE).map(str::to_string)
}

/// True for a collection path: the base plus exactly one segment.
pub fn is_collection_path(path: &str) -> bool {
    matches!(strip_base(path, COLLECTION_BASE), Some(rest) if !rest.is_empty() && !rest.contains('/'))
}

/// True for an item path: the base plus exactly two non-empty segments.
pub fn is_item_path(path: &str) -> bool {
    parse_item(path).is_some()
}

fn strip_base<'a>(path: &'a str, base: &str) -> Option<&'a str> {
    path.strip_prefix(base)?.strip_prefix('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_parse_round_trip() {
        assert_eq!(
            parse_collection(&collection("login")).as_deref(),
            Some("login")
        );
        assert_eq!(
            parse_item(&item("login", "i01")),
            Some(("login".to_string(), "i01".to_string()))
        );
        assert_eq!(parse_session(&session("s01")).as_deref(), Some("s01"));
        assert_eq!(parse_prompt(&prompt("p01")).as_deref(), Some("p01"));
    }

    #[test]
    fn predicates_count_segments() {
        assert!(is_collection_path(&collection("login")));
        assert!(!is_collection_path(&item("login", "i01")));
        assert!(!is_collection_path(SERVICE_PATH));

        assert!(is_item_path(&item("login", "i01")));
        assert!(!is_item_path(&collection("login")));
        assert!(!is_item_path("/org/freedesktop/secrets/collection//i01"));
    }

    #[test]
    fn parse_rejects_foreign_prefixes() {
        assert_eq!(parse_collection("/org/example/other/login"), None);
        assert_eq!(parse_session(&collection("login")), None);
        assert_eq!(parse_item(&session("s01")), None);
    }

    #[test]
    fn collection_name_extracted_from_item_path() {
        assert_eq!(
            parse_collection(&item("login", "i01")).as_deref(),
            Some("login")
        );
    }
}
