use crate::deletion::{DeletionConfig, DeletionPipeline};
use async_trait::async_trait;
use snipper_core::repository::Result as StorageResult;
use snipper_core::{
    BatchItem, BatchResult, ShortCode, Shortener, ShortenerError, StorageError, UrlRecord,
    UrlStorage,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace};
use typed_builder::TypedBuilder;

type Result<T> = std::result::Result<T, ShortenerError>;

pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, TypedBuilder)]
pub struct ShortenerConfig {
    /// Prefix of every short URL, e.g. `http://localhost:8080`.
    #[builder(setter(into))]
    pub host_url: String,
    /// Bound on each synchronous storage call.
    #[builder(default = DEFAULT_OP_TIMEOUT)]
    pub op_timeout: Duration,
    #[builder(default)]
    pub deletion: DeletionConfig,
}

/// The domain façade over a [`UrlStorage`].
///
/// This service handles:
/// - URL validation and short code derivation
/// - Bounding every storage call with a timeout
/// - Owning the deletion pipeline and its shutdown
pub struct ShortenerService {
    storage: Arc<dyn UrlStorage>,
    deletion: DeletionPipeline,
    config: ShortenerConfig,
}

impl ShortenerService {
    /// Creates the service and starts its deletion workers.
    /// Must be called inside a tokio runtime.
    pub fn new(storage: Arc<dyn UrlStorage>, config: ShortenerConfig) -> Self {
        let deletion = DeletionPipeline::start(Arc::clone(&storage), config.deletion.clone());
        Self {
            storage,
            deletion,
            config,
        }
    }

    /// A URL is valid when it parses with a non-empty scheme and host.
    pub fn is_url_valid(raw: &str) -> Result<()> {
        if raw.is_empty() {
            return Err(ShortenerError::InvalidUrl(
                "URL cannot be empty".to_string(),
            ));
        }

        let parsed =
            url::Url::parse(raw).map_err(|e| ShortenerError::InvalidUrl(format!("{raw}: {e}")))?;

        if parsed.scheme().is_empty() || parsed.host_str().is_none_or(str::is_empty) {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a scheme and a host: {raw}"
            )));
        }

        Ok(())
    }

    /// Number of deletion batches still queued or in flight.
    pub fn pending_deletions(&self) -> usize {
        self.deletion.pending()
    }

    fn record_for(&self, original_url: &str) -> UrlRecord {
        let short_url = ShortCode::from_url(original_url).to_url(&self.config.host_url);
        UrlRecord::new(short_url, original_url)
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = StorageResult<T>> + Send,
    {
        match tokio::time::timeout(self.config.op_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(convert_storage_error(operation, e)),
            Err(_) => {
                error!(
                    operation,
                    timeout_ms = self.config.op_timeout.as_millis() as u64,
                    "storage operation timed out"
                );
                Err(ShortenerError::Timeout(operation.to_string()))
            }
        }
    }
}

/// Domain errors pass through quietly; infrastructure errors are logged
/// here, where they are detected, before crossing the service boundary.
fn convert_storage_error(operation: &'static str, e: StorageError) -> ShortenerError {
    match &e {
        StorageError::Duplicate(_) | StorageError::NotFound(_) | StorageError::InvalidRecord(_) => {
            debug!(operation, error = %e, "storage rejected request");
        }
        _ => error!(operation, error = %e, "storage operation failed"),
    }
    e.into()
}

#[async_trait]
impl Shortener for ShortenerService {
    async fn save_data(&self, user_token: &str, original_url: &str) -> Result<String> {
        Self::is_url_valid(original_url)?;

        let record = self.record_for(original_url);
        let short_url = record.short_url.clone();
        self.bounded("save_data", self.storage.save_data(user_token, record))
            .await?;

        debug!(short_url = %short_url, "shortened url");
        Ok(short_url)
    }

    async fn save_data_batch(
        &self,
        user_token: &str,
        items: Vec<BatchItem>,
    ) -> Result<Vec<BatchResult>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        for item in &items {
            Self::is_url_valid(&item.original_url)?;
        }

        let records: Vec<UrlRecord> = items
            .iter()
            .map(|item| self.record_for(&item.original_url))
            .collect();
        let results = items
            .into_iter()
            .zip(&records)
            .map(|(item, record)| BatchResult {
                correlation_id: item.correlation_id,
                short_url: record.short_url.clone(),
            })
            .collect();

        self.bounded(
            "save_data_batch",
            self.storage.save_data_batch(user_token, records),
        )
        .await?;

        Ok(results)
    }

    async fn get_original_url(&self, short_url: &str) -> Result<UrlRecord> {
        trace!(short_url = %short_url, "resolving short url");
        self.bounded("get_original_url", self.storage.get_original_url(short_url))
            .await
    }

    async fn get_user_urls(&self, user_token: &str) -> Result<Vec<UrlRecord>> {
        self.bounded("get_user_urls", self.storage.get_user_urls(user_token))
            .await
    }

    fn delete_urls(&self, ids: Vec<String>) -> Result<()> {
        let short_urls = ids
            .iter()
            .map(|id| ShortCode::new_unchecked(id.as_str()).to_url(&self.config.host_url))
            .collect();
        self.deletion.enqueue(short_urls)
    }

    async fn ping(&self) -> Result<()> {
        self.bounded("ping", self.storage.ping()).await
    }

    fn short_url_for(&self, code: &ShortCode) -> String {
        code.to_url(&self.config.host_url)
    }

    async fn shutdown(&self) -> Result<()> {
        self.deletion.shutdown().await;
        info!("shortener service stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snipper_storage::{KvUrlStorage, MemoryStore};

    const HOST: &str = "http://localhost:8080";

    fn test_service() -> ShortenerService {
        let storage = Arc::new(KvUrlStorage::new(MemoryStore::new()));
        ShortenerService::new(storage, ShortenerConfig::builder().host_url(HOST).build())
    }

    #[test]
    fn url_validation() {
        assert!(ShortenerService::is_url_valid("https://example.com").is_ok());
        assert!(ShortenerService::is_url_valid("http://localhost:8080/a?b=c").is_ok());

        assert!(ShortenerService::is_url_valid("").is_err());
        assert!(ShortenerService::is_url_valid("not-a-valid-url").is_err());
        assert!(ShortenerService::is_url_valid("example.com/path").is_err());
        assert!(ShortenerService::is_url_valid("mailto:someone@example.com").is_err());
    }

    #[tokio::test]
    async fn resubmission_by_another_user_conflicts() {
        let service = test_service();

        let short_url = service
            .save_data("u1", "https://example.com/")
            .await
            .unwrap();
        assert_eq!(short_url, "http://localhost:8080/tVnH7dP7/");

        let err = service
            .save_data("u2", "https://example.com/")
            .await
            .unwrap_err();
        assert!(matches!(err, ShortenerError::Duplicate(ref url) if *url == short_url));

        assert!(service.get_user_urls("u2").await.unwrap().is_empty());
        assert_eq!(service.get_user_urls("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_url_never_reaches_storage() {
        let service = test_service();

        let err = service.save_data("u1", "not-a-url").await.unwrap_err();
        assert!(matches!(err, ShortenerError::InvalidUrl(_)));
        assert!(service.get_user_urls("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lookup_lifecycle() {
        let service = test_service();
        let short_url = service.short_url_for(&ShortCode::from_url("https://example.com/"));

        let err = service.get_original_url(&short_url).await.unwrap_err();
        assert!(matches!(err, ShortenerError::NotFound(_)));

        service
            .save_data("u1", "https://example.com/")
            .await
            .unwrap();
        let record = service.get_original_url(&short_url).await.unwrap();
        assert_eq!(record.original_url, "https://example.com/");
        assert!(!record.deleted);

        service.delete_urls(vec!["tVnH7dP7".to_string()]).unwrap();
        service.shutdown().await.unwrap();

        let record = service.get_original_url(&short_url).await.unwrap();
        assert!(record.deleted);
    }

    #[tokio::test]
    async fn batch_returns_short_urls_by_correlation_id() {
        let service = test_service();

        let results = service
            .save_data_batch(
                "u1",
                vec![
                    BatchItem {
                        correlation_id: "a".to_string(),
                        original_url: "http://github.com/".to_string(),
                    },
                    BatchItem {
                        correlation_id: "b".to_string(),
                        original_url: "http://gitlab.com".to_string(),
                    },
                ],
            )
            .await
            .unwrap();

        assert_eq!(
            results,
            vec![
                BatchResult {
                    correlation_id: "a".to_string(),
                    short_url: "http://localhost:8080/hnTOWmuz/".to_string(),
                },
                BatchResult {
                    correlation_id: "b".to_string(),
                    short_url: "http://localhost:8080/PSynyReI/".to_string(),
                },
            ]
        );
        assert_eq!(service.get_user_urls("u1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn batch_with_invalid_item_saves_nothing() {
        let service = test_service();

        let err = service
            .save_data_batch(
                "u1",
                vec![
                    BatchItem {
                        correlation_id: "a".to_string(),
                        original_url: "https://bitbucket.org".to_string(),
                    },
                    BatchItem {
                        correlation_id: "b".to_string(),
                        original_url: "bogus".to_string(),
                    },
                ],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::InvalidUrl(_)));
        assert!(service.get_user_urls("u1").await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn deleting_250_urls_eventually_tombstones_all() {
        let service = test_service();
        let mut ids = Vec::with_capacity(250);
        for i in 0..250 {
            let url = format!("https://example.com/page/{i}");
            service.save_data("u1", &url).await.unwrap();
            ids.push(ShortCode::from_url(&url).to_string());
        }

        service.delete_urls(ids).unwrap();

        awaitility::at_most(Duration::from_secs(10))
            .poll_interval(Duration::from_millis(100))
            .until_async(|| async {
                let records = service.get_user_urls("u1").await.unwrap();
                records.len() == 250 && records.iter().all(|r| r.deleted)
            })
            .await;

        service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn deletions_are_refused_after_shutdown() {
        let service = test_service();

        service.shutdown().await.unwrap();

        let err = service.delete_urls(vec!["abc".to_string()]).unwrap_err();
        assert!(matches!(err, ShortenerError::ShuttingDown));
    }

    #[tokio::test]
    async fn ping_in_memory() {
        let service = test_service();
        service.ping().await.unwrap();
    }

    /// Storage whose every call outlives the service timeout.
    struct StalledStorage;

    #[async_trait]
    impl UrlStorage for StalledStorage {
        async fn save_data(&self, _: &str, _: UrlRecord) -> StorageResult<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }

        async fn save_data_batch(&self, _: &str, _: Vec<UrlRecord>) -> StorageResult<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }

        async fn get_original_url(&self, short_url: &str) -> StorageResult<UrlRecord> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(StorageError::NotFound(short_url.to_string()))
        }

        async fn get_user_urls(&self, _: &str) -> StorageResult<Vec<UrlRecord>> {
            Ok(vec![])
        }

        async fn delete_urls(&self, _: &[String]) -> StorageResult<()> {
            Ok(())
        }

        async fn ping(&self) -> StorageResult<()> {
            Err(StorageError::Unavailable("connection refused".to_string()))
        }

        async fn shutdown(&self) -> StorageResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn slow_storage_times_out() {
        let config = ShortenerConfig::builder()
            .host_url(HOST)
            .op_timeout(Duration::from_millis(50))
            .build();
        let service = ShortenerService::new(Arc::new(StalledStorage), config);

        let err = service
            .save_data("u1", "https://example.com/")
            .await
            .unwrap_err();
        assert!(matches!(err, ShortenerError::Timeout(_)));
    }

    #[tokio::test]
    async fn storage_failure_is_generic_at_the_boundary() {
        let service = ShortenerService::new(
            Arc::new(StalledStorage),
            ShortenerConfig::builder().host_url(HOST).build(),
        );

        let err = service.ping().await.unwrap_err();
        assert!(matches!(err, ShortenerError::Storage(_)));
    }
}
