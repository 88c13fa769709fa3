use crate::error::StorageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result type for URL storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A stored URL record.
///
/// Records are immutable once created, except for the one-way `deleted` flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// The full short URL, `{host}/{id}/`.
    pub short_url: String,
    /// The original URL that was shortened.
    pub original_url: String,
    /// Set once the record has been tombstoned.
    #[serde(default)]
    pub deleted: bool,
}

impl UrlRecord {
    /// Creates an active record.
    pub fn new(short_url: impl Into<String>, original_url: impl Into<String>) -> Self {
        Self {
            short_url: short_url.into(),
            original_url: original_url.into(),
            deleted: false,
        }
    }

    /// Rejects records that could never have come out of the shortener.
    pub fn validate(&self) -> Result<()> {
        if self.short_url.is_empty() {
            return Err(StorageError::InvalidRecord(
                "short url cannot be empty".to_string(),
            ));
        }
        if self.original_url.is_empty() {
            return Err(StorageError::InvalidRecord(format!(
                "original url cannot be empty for {}",
                self.short_url
            )));
        }
        Ok(())
    }
}

/// Domain-level persistence for URL records and per-user ownership.
///
/// Every backend must behave identically from the caller's point of view:
/// a second save of an existing short URL fails with
/// [`StorageError::Duplicate`] carrying that short URL, and lookups of
/// tombstoned records still return the record with `deleted = true`.
#[async_trait]
pub trait UrlStorage: Send + Sync + 'static {
    /// Saves a record and appends its short URL to the user's index.
    async fn save_data(&self, user_token: &str, record: UrlRecord) -> Result<()>;

    /// Saves every record or none of them.
    async fn save_data_batch(&self, user_token: &str, records: Vec<UrlRecord>) -> Result<()>;

    /// Returns the record for `short_url`, including tombstoned ones.
    async fn get_original_url(&self, short_url: &str) -> Result<UrlRecord>;

    /// Returns the user's records in insertion order.
    /// An unknown token yields an empty list.
    async fn get_user_urls(&self, user_token: &str) -> Result<Vec<UrlRecord>>;

    /// Tombstones every matching record. Unknown short URLs are skipped.
    async fn delete_urls(&self, short_urls: &[String]) -> Result<()>;

    async fn ping(&self) -> Result<()>;

    /// Flushes and releases the backend. Call at most once.
    async fn shutdown(&self) -> Result<()>;
}
