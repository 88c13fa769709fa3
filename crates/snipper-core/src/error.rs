use thiserror::Error;

/// Errors raised while parsing or deriving core domain values.
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("invalid short url: {0}")]
    InvalidShortUrl(String),
}

/// Errors of the byte-oriented key/value layer.
#[derive(Debug, Clone, Error)]
pub enum KvError {
    #[error("key not found: {0}")]
    NotFound(String),
    #[error("key/value write failed: {0}")]
    Io(String),
    #[error("key/value encoding failed: {0}")]
    Encoding(String),
    #[error("failed to load dump: {0}")]
    DumpLoad(String),
    #[error("key/value store is closed")]
    Closed,
}

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("short url not found: {0}")]
    NotFound(String),
    #[error("short url already exists: {0}")]
    Duplicate(String),
    #[error("invalid url record: {0}")]
    InvalidRecord(String),
    #[error("failed to load dump: {0}")]
    DumpLoad(String),
    #[error("storage io failed: {0}")]
    Io(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
}

impl From<KvError> for StorageError {
    fn from(value: KvError) -> Self {
        match value {
            KvError::NotFound(key) => Self::NotFound(key),
            KvError::Io(message) => Self::Io(message),
            KvError::Encoding(message) => Self::InvalidData(message),
            KvError::DumpLoad(message) => Self::DumpLoad(message),
            KvError::Closed => Self::Unavailable("key/value store is closed".to_string()),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("short url already exists: {0}")]
    Duplicate(String),
    #[error("short url not found: {0}")]
    NotFound(String),
    #[error("operation timed out: {0}")]
    Timeout(String),
    #[error("shortener is shutting down")]
    ShuttingDown,
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StorageError> for ShortenerError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::Duplicate(short_url) => Self::Duplicate(short_url),
            StorageError::NotFound(short_url) => Self::NotFound(short_url),
            StorageError::InvalidRecord(message) => Self::InvalidUrl(message),
            StorageError::Timeout(message) => Self::Timeout(message),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<CoreError> for ShortenerError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidShortUrl(message) => Self::InvalidUrl(message),
        }
    }
}
