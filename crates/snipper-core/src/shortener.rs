use crate::repository::UrlRecord;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, crate::error::ShortenerError>;

/// One entry of a batch shorten request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    /// Caller-chosen identifier echoed back in the result.
    pub correlation_id: String,
    pub original_url: String,
}

/// One entry of a batch shorten response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub correlation_id: String,
    pub short_url: String,
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Validates and shortens `original_url` on behalf of `user_token`,
    /// returning the full short URL.
    async fn save_data(&self, user_token: &str, original_url: &str) -> Result<String>;

    /// Shortens every item or none of them.
    async fn save_data_batch(
        &self,
        user_token: &str,
        items: Vec<BatchItem>,
    ) -> Result<Vec<BatchResult>>;

    /// Looks up a full short URL. The caller decides what a tombstoned
    /// record means.
    async fn get_original_url(&self, short_url: &str) -> Result<UrlRecord>;

    async fn get_user_urls(&self, user_token: &str) -> Result<Vec<UrlRecord>>;

    /// Schedules the bare identifiers `ids` for deletion and returns
    /// without waiting for storage.
    fn delete_urls(&self, ids: Vec<String>) -> Result<()>;

    async fn ping(&self) -> Result<()>;

    /// Builds the full short URL served for `code`.
    fn short_url_for(&self, code: &ShortCode) -> String;

    /// Refuses new deletions and waits for the queued ones to finish.
    async fn shutdown(&self) -> Result<()>;
}
