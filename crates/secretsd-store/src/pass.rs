//! Reference store adapter driving the `gopass` CLI.
//!
//! Layout under the configured prefix:
//!
//! ```text
//! <prefix>/_aliases              alias -> collection mapping
//! <prefix>/<collection>/_meta    collection metadata
//! <prefix>/<collection>/<id>     one item per entry
//! ```
//!
//! An item entry is line-oriented: the first line holds the secret, a `---`
//! separator follows, then `key: value` metadata. Service-owned keys carry
//! the `_ss_` prefix; every other key is a user attribute. Attribute keys may
//! contain colons (`xdg:schema`), so parsing splits on the first `": "`.
//!
//! Secrets are written base64-encoded (marked `_ss_encoding: base64`) so
//! arbitrary bytes survive the line-oriented tool; records without the
//! marker are read as raw first-line text for compatibility with entries
//! written by other frontends.

use std::collections::BTreeMap;
use std::process::Stdio;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::mapper::Mapper;
use crate::store::SecretStore;
use crate::types::{attributes_match, unix_now, Attributes, CollectionRecord, ItemRecord};
use crate::{sanitize_name, Result, StoreError};

const META_PREFIX: &str = "_ss_";
const LABEL_KEY: &str = "_ss_label";
const CREATED_KEY: &str = "_ss_created";
const MODIFIED_KEY: &str = "_ss_modified";
const CONTENT_TYPE_KEY: &str = "_ss_content_type";
const ENCODING_KEY: &str = "_ss_encoding";
const COLL_LABEL_KEY: &str = "_ss_coll_label";
const COLL_CREATED_KEY: &str = "_ss_coll_created";
const COLL_MODIFIED_KEY: &str = "_ss_coll_modified";

const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Store backed by a password-store CLI (`gopass` by default).
///
/// Every operation shells out; invocations are serialised through an
/// internal mutex because the tool is not re-entrant.
pub struct PassStore {
    bin: String,
    mapper: Mapper,
    cli: tokio::sync::Mutex<()>,
}

impl PassStore {
    /// Create an adapter invoking `bin` with entries under `prefix`.
    pub fn new(bin: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            mapper: Mapper::new(prefix),
            cli: tokio::sync::Mutex::new(()),
        }
    }

    /// Run the tool, returning stdout on success.
    async fn run(&self, args: &[&str]) -> Result<String> {
        let _guard = self.cli.lock().await;
        debug!(bin = %self.bin, ?args, "store call");
        let output = Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = format!("{}{}", stdout, stderr);
            if detail.contains("not found") {
                return Err(StoreError::NotFound(args.join(" ")));
            }
            return Err(StoreError::Backend(format!(
                "{} {} failed: {}",
                self.bin,
                args.join(" "),
                detail.trim()
            )));
        }
        Ok(stdout)
    }

    /// Write an entry via `insert -f`, feeding the content on stdin.
    async fn insert(&self, path: &str, content: &str) -> Result<()> {
        let _guard = self.cli.lock().await;
        debug!(bin = %self.bin, path, "store insert");
        let mut child = Command::new(&self.bin)
            .args(["insert", "-f", path])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| StoreError::Backend("insert: no stdin pipe".into()))?;
        stdin.write_all(content.as_bytes()).await?;
        drop(stdin);

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(StoreError::Backend(format!(
                "{} insert {} failed: {}",
                self.bin,
                path,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    /// Entry names directly under a store path, with `_`-prefixed entries
    /// (metadata, aliases) filtered out. A missing path yields an empty list.
    async fn list_entries(&self, path: &str, want_item: bool) -> Result<Vec<String>> {
        let out = match self.run(&["ls", "--flat", path]).await {
            Ok(out) => out,
            Err(StoreError::NotFound(_)) => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        let mut seen = std::collections::BTreeSet::new();
        for line in out.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Ok((collection, item)) = self.mapper.parse(line) else {
                continue;
            };
            let name = if want_item { item } else { collection };
            if name.is_empty() || name.starts_with('_') {
                continue;
            }
            seen.insert(name);
        }
        Ok(seen.into_iter().collect())
    }
}

#[async_trait]
impl SecretStore for PassStore {
    async fn collections(&self) -> Result<Vec<String>> {
        self.list_entries(self.mapper.prefix(), false).await
    }

    async fn collection(&self, name: &str) -> Result<CollectionRecord> {
        let meta_path = self.mapper.collection_meta_path(name);
        match self.run(&["show", "-n", &meta_path]).await {
            Ok(out) => {
                let mut record = CollectionRecord {
                    name: name.to_string(),
                    label: name.to_string(),
                    ..CollectionRecord::default()
                };
                parse_meta_lines(&out, |key, value| match key {
                    COLL_LABEL_KEY => record.label = value.to_string(),
                    COLL_CREATED_KEY => record.created = value.parse().unwrap_or(0),
                    COLL_MODIFIED_KEY => record.modified = value.parse().unwrap_or(0),
                    _ => {}
                });
                Ok(record)
            }
            Err(_) => {
                // No metadata entry; the collection still exists if any of
                // its entries do (created by another frontend).
                let items = self.items(name).await.unwrap_or_default();
                if items.is_empty() {
                    return Err(StoreError::NotFound(format!("collection {name}")));
                }
                let now = unix_now();
                Ok(CollectionRecord {
                    name: name.to_string(),
                    label: name.to_string(),
                    created: now,
                    modified: now,
                })
            }
        }
    }

    async fn create_collection(&self, name: &str, label: &str) -> Result<()> {
        let name = sanitize_name(name);
        let now = unix_now();
        let content = format_collection_meta(label, now, now);
        self.insert(&self.mapper.collection_meta_path(&name), &content)
            .await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.run(&["rm", "-rf", &self.mapper.collection_path(name)])
            .await
            .map(|_| ())
    }

    async fn set_collection_label(&self, name: &str, label: &str) -> Result<()> {
        let existing = self.collection(name).await?;
        let content = format_collection_meta(label, existing.created, unix_now());
        self.insert(&self.mapper.collection_meta_path(name), &content)
            .await
    }

    async fn items(&self, collection: &str) -> Result<Vec<String>> {
        self.list_entries(&self.mapper.collection_path(collection), true)
            .await
    }

    async fn item(&self, collection: &str, id: &str) -> Result<ItemRecord> {
        let out = self
            .run(&["show", "-n", &self.mapper.item_path(collection, id)])
            .await
            .map_err(|_| StoreError::NotFound(format!("item {collection}/{id}")))?;
        Ok(parse_item(id, &out))
    }

    async fn insert_item(&self, collection: &str, mut record: ItemRecord) -> Result<ItemRecord> {
        if record.id.is_empty() {
            record.id = uuid::Uuid::new_v4().as_simple().to_string();
        }
        if self.collection(collection).await.is_err() {
            self.create_collection(collection, collection).await?;
        }

        let now = unix_now();
        if record.created == 0 {
            record.created = now;
        }
        record.modified = now;
        if record.content_type.is_empty() {
            record.content_type = DEFAULT_CONTENT_TYPE.to_string();
        }

        self.insert(
            &self.mapper.item_path(collection, &record.id),
            &format_item(&record),
        )
        .await?;
        Ok(record)
    }

    async fn update_item(
        &self,
        collection: &str,
        id: &str,
        mut record: ItemRecord,
    ) -> Result<ItemRecord> {
        let existing = self.item(collection, id).await?;

        record.id = id.to_string();
        record.created = existing.created;
        record.modified = unix_now();
        if record.content_type.is_empty() {
            record.content_type = existing.content_type;
        }

        self.insert(
            &self.mapper.item_path(collection, id),
            &format_item(&record),
        )
        .await?;
        Ok(record)
    }

    async fn delete_item(&self, collection: &str, id: &str) -> Result<()> {
        self.run(&["rm", "-f", &self.mapper.item_path(collection, id)])
            .await
            .map(|_| ())
    }

    async fn search_items(&self, collection: &str, query: &Attributes) -> Result<Vec<ItemRecord>> {
        let mut results = Vec::new();
        for id in self.items(collection).await? {
            let record = match self.item(collection, &id).await {
                Ok(record) => record,
                Err(err) => {
                    debug!(collection, id, %err, "skipping unreadable item");
                    continue;
                }
            };
            if attributes_match(&record.attributes, query) {
                results.push(record);
            }
        }
        Ok(results)
    }

    async fn search_all_items(
        &self,
        query: &Attributes,
    ) -> Result<BTreeMap<String, Vec<ItemRecord>>> {
        let mut results = BTreeMap::new();
        for collection in self.collections().await? {
            match self.search_items(&collection, query).await {
                Ok(items) if !items.is_empty() => {
                    results.insert(collection, items);
                }
                Ok(_) => {}
                Err(err) => {
                    debug!(collection, %err, "skipping collection during search");
                }
            }
        }
        Ok(results)
    }

    async fn alias(&self, name: &str) -> Result<Option<String>> {
        let out = match self.run(&["show", "-n", &self.mapper.aliases_path()]).await {
            Ok(out) => out,
            // No aliases entry yet: the conventional default alias still
            // resolves so a store populated by hand keeps working.
            Err(_) => {
                return Ok((name == "default").then(|| "default".to_string()));
            }
        };

        let target = parse_aliases(&out).remove(name);
        if target.is_none() && name == "default" {
            return Ok(Some("default".to_string()));
        }
        Ok(target)
    }

    async fn set_alias(&self, name: &str, target: Option<&str>) -> Result<()> {
        let mut aliases = match self.run(&["show", "-n", &self.mapper.aliases_path()]).await {
            Ok(out) => parse_aliases(&out),
            Err(_) => BTreeMap::new(),
        };

        match target {
            Some(collection) => {
                aliases.insert(name.to_string(), collection.to_string());
            }
            None => {
                aliases.remove(name);
            }
        }

        let mut content = String::from("aliases\n---\n");
        for (alias, collection) in &aliases {
            content.push_str(&format!("{alias}: {collection}\n"));
        }
        self.insert(&self.mapper.aliases_path(), &content).await
    }
}

/// Invoke `handler` for every `key: value` line after the `---` separator.
fn parse_meta_lines(content: &str, mut handler: impl FnMut(&str, &str)) {
    let mut in_meta = false;
    for line in content.lines() {
        let line = line.trim();
        if line == "---" {
            in_meta = true;
            continue;
        }
        if !in_meta {
            continue;
        }
        if let Some((key, value)) = line.split_once(": ") {
            handler(key, value);
        }
    }
}

fn parse_aliases(content: &str) -> BTreeMap<String, String> {
    let mut aliases = BTreeMap::new();
    parse_meta_lines(content, |key, value| {
        if !key.starts_with('_') {
            aliases.insert(key.to_string(), value.to_string());
        }
    });
    aliases
}

fn parse_item(id: &str, content: &str) -> ItemRecord {
    let mut record = ItemRecord {
        id: id.to_string(),
        secret: content.lines().next().unwrap_or_default().as_bytes().to_vec(),
        content_type: DEFAULT_CONTENT_TYPE.to_string(),
        ..ItemRecord::default()
    };

    let mut base64_encoded = false;
    let body = content.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    parse_meta_lines(body, |key, value| match key {
        LABEL_KEY => record.label = value.to_string(),
        CREATED_KEY => record.created = value.parse().unwrap_or(0),
        MODIFIED_KEY => record.modified = value.parse().unwrap_or(0),
        CONTENT_TYPE_KEY => record.content_type = value.to_string(),
        ENCODING_KEY => base64_encoded = value == "base64",
        _ => {
            if !key.starts_with(META_PREFIX) {
                record.attributes.insert(key.to_string(), value.to_string());
            }
        }
    });

    if base64_encoded {
        if let Ok(decoded) = BASE64.decode(&record.secret) {
            record.secret = decoded;
        }
    }
    record
}

fn format_item(record: &ItemRecord) -> String {
    let mut content = BASE64.encode(&record.secret);
    content.push_str("\n---\n");
    content.push_str(&format!("{LABEL_KEY}: {}\n", record.label));
    content.push_str(&format!("{CREATED_KEY}: {}\n", record.created));
    content.push_str(&format!("{MODIFIED_KEY}: {}\n", record.modified));
    content.push_str(&format!("{CONTENT_TYPE_KEY}: {}\n", record.content_type));
    content.push_str(&format!("{ENCODING_KEY}: base64\n"));
    // BTreeMap iteration keeps attribute lines in sorted key order.
    for (key, value) in &record.attributes {
        content.push_str(&format!("{key}: {value}\n"));
    }
    content
}

fn format_collection_meta(label: &str, created: u64, modified: u64) -> String {
    format!(
        "collection-metadata\n---\n{COLL_LABEL_KEY}: {label}\n\
         {COLL_CREATED_KEY}: {created}\n{COLL_MODIFIED_KEY}: {modified}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_record_round_trips_through_text() {
        let mut record = ItemRecord {
            id: "i01".into(),
            label: "mail password".into(),
            secret: b"hunter2\nwith newline \xff".to_vec(),
            content_type: "application/octet-stream".into(),
            created: 1700000000,
            modified: 1700000100,
            ..ItemRecord::default()
        };
        record.attributes.insert("service".into(), "smtp".into());
        record
            .attributes
            .insert("xdg:schema".into(), "org.freedesktop.Secret.Generic".into());

        let parsed = parse_item("i01", &format_item(&record));
        assert_eq!(parsed, record);
    }

    #[test]
    fn attribute_lines_are_sorted() {
        let mut record = ItemRecord {
            id: "i01".into(),
            ..ItemRecord::default()
        };
        record.attributes.insert("zeta".into(), "1".into());
        record.attributes.insert("alpha".into(), "2".into());

        let text = format_item(&record);
        let alpha = text.find("alpha: ").unwrap();
        let zeta = text.find("zeta: ").unwrap();
        assert!(alpha < zeta);
    }

    #[test]
    fn legacy_raw_records_still_parse() {
        let content = "hunter2\n---\n_ss_label: old\nservice: smtp\n";
        let parsed = parse_item("i02", content);
        assert_eq!(parsed.secret, b"hunter2");
        assert_eq!(parsed.label, "old");
        assert_eq!(parsed.content_type, "text/plain");
        assert_eq!(parsed.attributes.get("service").unwrap(), "smtp");
    }

    #[test]
    fn collection_meta_round_trips() {
        let text = format_collection_meta("Login", 1700000000, 1700000001);
        let mut label = String::new();
        let mut created = 0;
        let mut modified = 0;
        parse_meta_lines(&text, |key, value| match key {
            COLL_LABEL_KEY => label = value.to_string(),
            COLL_CREATED_KEY => created = value.parse().unwrap(),
            COLL_MODIFIED_KEY => modified = value.parse().unwrap(),
            _ => {}
        });
        assert_eq!(label, "Login");
        assert_eq!(created, 1700000000);
        assert_eq!(modified, 1700000001);
    }

    #[test]
    fn aliases_parse_and_skip_private_keys() {
        let aliases = parse_aliases("aliases\n---\ndefault: login\n_private: x\n");
        assert_eq!(aliases.get("default").unwrap(), "login");
        assert!(!aliases.contains_key("_private"));
    }
}
