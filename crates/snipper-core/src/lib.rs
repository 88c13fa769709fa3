//! Core types and traits for the Snipper URL shortener.
//!
//! This crate provides the shared domain model, the error taxonomy and the
//! storage and service traits used by the storage backends, the shortener
//! service and the HTTP gateway.

pub mod error;
pub mod kv;
pub mod repository;
pub mod shortcode;
pub mod shortener;

pub use error::{CoreError, KvError, ShortenerError, StorageError};
pub use kv::KeyValueStore;
pub use repository::{UrlRecord, UrlStorage};
pub use shortcode::ShortCode;
pub use shortener::{BatchItem, BatchResult, Shortener};
