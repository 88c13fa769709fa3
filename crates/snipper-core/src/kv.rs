use crate::error::KvError;

/// Result type for key/value operations.
pub type Result<T> = std::result::Result<T, KvError>;

/// A byte-oriented key/value store.
///
/// Implementations are synchronous: every operation completes under a
/// process-local lock, so there is nothing to await.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Returns the value stored under `key`.
    /// A missing key is reported as [`KvError::NotFound`].
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Stores `value` only if `key` is absent.
    ///
    /// Returns `false` without writing when the key already exists. The
    /// check and the write happen under one lock acquisition.
    fn set_if_absent(&self, key: &str, value: &[u8]) -> Result<bool>;

    /// Releases any resources held by the store.
    fn shutdown(&self) -> Result<()>;
}
