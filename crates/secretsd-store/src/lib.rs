//! # secretsd-store
//!
//! Persistence layer for the secretsd daemon: the [`SecretStore`] contract
//! the service consumes, the reference adapter that drives the `gopass` CLI,
//! and an in-memory store used by tests.
//!
//! The store sees plaintext secrets; at-rest encryption is the password
//! store's own GPG layer.

#![forbid(unsafe_code)]

mod errors;
mod mapper;
mod memory;
mod pass;
mod store;
mod types;

pub use errors::StoreError;
pub use mapper::{sanitize_name, Mapper};
pub use memory::MemoryStore;
pub use pass::PassStore;
pub use store::SecretStore;
pub use types::{attributes_match, unix_now, Attributes, CollectionRecord, ItemRecord};

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StoreError>;
