//! Storage backends for the Snipper URL shortener.
//!
//! Two key/value stores (in-memory and append-only file) sit under
//! [`KvUrlStorage`]; [`PostgresUrlStorage`] talks to the database directly.
//! [`open`] picks one from [`StorageSettings`].

pub mod backend;
pub mod kv;
pub mod kv_storage;
pub mod postgres;

pub use backend::{open, StorageBackend, StorageSettings};
pub use kv::{FileStore, MemoryStore, Replay};
pub use kv_storage::KvUrlStorage;
pub use postgres::PostgresUrlStorage;
pub use snipper_core::{KeyValueStore, StorageError, UrlRecord, UrlStorage};
