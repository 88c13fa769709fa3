//! URL shortener service implementation.
//!
//! This crate provides [`ShortenerService`], the domain façade over a
//! storage backend, and the [`DeletionPipeline`] that applies deletions in
//! the background. Core types are re-exported from `snipper_core`.

pub mod deletion;
pub mod service;

pub use deletion::{DeletionConfig, DeletionPipeline};
pub use service::{ShortenerConfig, ShortenerService};
pub use snipper_core::{BatchItem, BatchResult, Shortener, ShortenerError};
