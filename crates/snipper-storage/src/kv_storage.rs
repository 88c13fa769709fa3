use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use snipper_core::repository::{Result, UrlRecord, UrlStorage};
use snipper_core::{KeyValueStore, KvError, StorageError};
use std::collections::HashSet;
use tracing::{debug, trace, warn};

const RECORD_PREFIX: &str = "url:";
const USER_PREFIX: &str = "user:";

fn record_key(short_url: &str) -> String {
    format!("{RECORD_PREFIX}{short_url}")
}

fn user_key(user_token: &str) -> String {
    format!("{USER_PREFIX}{user_token}")
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StorageError::InvalidData(e.to_string()))
}

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| StorageError::InvalidData(format!("value of '{key}': {e}")))
}

/// URL storage layered on a [`KeyValueStore`].
///
/// Records live under `url:{short_url}` and each user's ordered index
/// under `user:{token}`, both JSON-encoded. Every mutation goes through
/// one write gate, so duplicate checks, index updates and tombstoning
/// never interleave.
#[derive(Debug)]
pub struct KvUrlStorage<S> {
    store: S,
    write_gate: Mutex<()>,
}

impl<S: KeyValueStore> KvUrlStorage<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            write_gate: Mutex::new(()),
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.store.get(key) {
            Ok(bytes) => decode(key, &bytes).map(Some),
            Err(KvError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn load_record(&self, short_url: &str) -> Result<Option<UrlRecord>> {
        self.load(&record_key(short_url))
    }

    fn load_user_index(&self, user_token: &str) -> Result<Vec<String>> {
        Ok(self
            .load::<Vec<String>>(&user_key(user_token))?
            .unwrap_or_default())
    }

    /// Must be called with the write gate held.
    fn append_to_user_index(&self, user_token: &str, short_urls: &[&str]) -> Result<()> {
        let mut index = self.load_user_index(user_token)?;
        let before = index.len();
        for short_url in short_urls {
            if !index.iter().any(|owned| owned == short_url) {
                index.push((*short_url).to_string());
            }
        }
        if index.len() == before {
            return Ok(());
        }
        self.store.set(&user_key(user_token), &encode(&index)?)?;
        Ok(())
    }

    /// Must be called with the write gate held.
    fn insert_record(&self, record: &UrlRecord) -> Result<()> {
        let inserted = self
            .store
            .set_if_absent(&record_key(&record.short_url), &encode(record)?)?;
        if !inserted {
            return Err(StorageError::Duplicate(record.short_url.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: KeyValueStore> UrlStorage for KvUrlStorage<S> {
    async fn save_data(&self, user_token: &str, record: UrlRecord) -> Result<()> {
        record.validate()?;

        let _gate = self.write_gate.lock();
        self.insert_record(&record)?;
        self.append_to_user_index(user_token, &[record.short_url.as_str()])?;

        debug!(short_url = %record.short_url, "saved url record");
        Ok(())
    }

    async fn save_data_batch(&self, user_token: &str, records: Vec<UrlRecord>) -> Result<()> {
        for record in &records {
            record.validate()?;
        }

        let _gate = self.write_gate.lock();

        // Check everything first so a rejected batch writes nothing.
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(record.short_url.as_str())
                || self.load_record(&record.short_url)?.is_some()
            {
                return Err(StorageError::Duplicate(record.short_url.clone()));
            }
        }

        for record in &records {
            self.insert_record(record)?;
        }
        let short_urls: Vec<&str> = records.iter().map(|r| r.short_url.as_str()).collect();
        self.append_to_user_index(user_token, &short_urls)?;

        debug!(count = records.len(), "saved url record batch");
        Ok(())
    }

    async fn get_original_url(&self, short_url: &str) -> Result<UrlRecord> {
        trace!(short_url = %short_url, "fetching url record");
        self.load_record(short_url)?
            .ok_or_else(|| StorageError::NotFound(short_url.to_string()))
    }

    async fn get_user_urls(&self, user_token: &str) -> Result<Vec<UrlRecord>> {
        let index = self.load_user_index(user_token)?;
        let mut records = Vec::with_capacity(index.len());
        for short_url in index {
            match self.load_record(&short_url)? {
                Some(record) => records.push(record),
                None => warn!(short_url = %short_url, "user index points at a missing record"),
            }
        }
        Ok(records)
    }

    async fn delete_urls(&self, short_urls: &[String]) -> Result<()> {
        let _gate = self.write_gate.lock();

        let mut deleted = 0usize;
        for short_url in short_urls {
            let Some(mut record) = self.load_record(short_url)? else {
                trace!(short_url = %short_url, "skipping unknown short url");
                continue;
            };
            if record.deleted {
                continue;
            }
            record.deleted = true;
            self.store.set(&record_key(short_url), &encode(&record)?)?;
            deleted += 1;
        }

        debug!(requested = short_urls.len(), deleted, "tombstoned url records");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        let _gate = self.write_gate.lock();
        self.store.shutdown()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{FileStore, MemoryStore};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn storage() -> KvUrlStorage<MemoryStore> {
        KvUrlStorage::new(MemoryStore::new())
    }

    fn record(short: &str, url: &str) -> UrlRecord {
        UrlRecord::new(format!("http://localhost:8080/{short}/"), url)
    }

    #[tokio::test]
    async fn save_and_get() {
        let storage = storage();
        let saved = record("abc", "https://example.com");

        storage.save_data("u1", saved.clone()).await.unwrap();

        let got = storage.get_original_url(&saved.short_url).await.unwrap();
        assert_eq!(got, saved);
        assert!(!got.deleted);
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let storage = storage();

        let err = storage
            .get_original_url("http://localhost:8080/nope/")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn duplicate_save_reports_existing_short_url() {
        let storage = storage();
        let first = record("abc", "https://example.com");

        storage.save_data("u1", first.clone()).await.unwrap();
        let err = storage
            .save_data("u2", first.clone())
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Duplicate(ref url) if *url == first.short_url));
        assert!(storage.get_user_urls("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_record_is_rejected() {
        let storage = storage();

        let err = storage
            .save_data("u1", UrlRecord::new("", "https://example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidRecord(_)));
    }

    #[tokio::test]
    async fn user_urls_keep_insertion_order() {
        let storage = storage();

        storage.save_data("u1", record("b", "https://b.example")).await.unwrap();
        storage.save_data("u1", record("a", "https://a.example")).await.unwrap();
        storage.save_data("u1", record("c", "https://c.example")).await.unwrap();

        let urls: Vec<String> = storage
            .get_user_urls("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.original_url)
            .collect();
        assert_eq!(
            urls,
            vec!["https://b.example", "https://a.example", "https://c.example"]
        );
    }

    #[tokio::test]
    async fn unknown_user_has_no_urls() {
        let storage = storage();
        assert!(storage.get_user_urls("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_is_all_or_nothing() {
        let storage = storage();
        storage.save_data("u1", record("dup", "https://dup.example")).await.unwrap();

        let err = storage
            .save_data_batch(
                "u2",
                vec![
                    record("fresh", "https://fresh.example"),
                    record("dup", "https://dup.example"),
                ],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Duplicate(_)));
        assert!(storage
            .get_original_url("http://localhost:8080/fresh/")
            .await
            .is_err());
        assert!(storage.get_user_urls("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_rejects_duplicates_within_itself() {
        let storage = storage();

        let err = storage
            .save_data_batch(
                "u1",
                vec![
                    record("same", "https://same.example"),
                    record("same", "https://same.example"),
                ],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Duplicate(_)));
        assert!(storage.get_user_urls("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_saves_and_indexes_every_record() {
        let storage = storage();

        storage
            .save_data_batch(
                "u1",
                vec![
                    record("one", "https://one.example"),
                    record("two", "https://two.example"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(storage.get_user_urls("u1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_tombstones_and_skips_unknown() {
        let storage = storage();
        let kept = record("keep", "https://keep.example");
        let gone = record("gone", "https://gone.example");
        storage.save_data("u1", kept.clone()).await.unwrap();
        storage.save_data("u1", gone.clone()).await.unwrap();

        storage
            .delete_urls(&[
                gone.short_url.clone(),
                "http://localhost:8080/unknown/".to_string(),
            ])
            .await
            .unwrap();

        assert!(storage.get_original_url(&gone.short_url).await.unwrap().deleted);
        assert!(!storage.get_original_url(&kept.short_url).await.unwrap().deleted);
        // Tombstoned records stay in the owner's index.
        assert_eq!(storage.get_user_urls("u1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn deleted_record_still_blocks_resubmission() {
        let storage = storage();
        let saved = record("abc", "https://example.com");
        storage.save_data("u1", saved.clone()).await.unwrap();
        storage.delete_urls(&[saved.short_url.clone()]).await.unwrap();

        let err = storage.save_data("u1", saved).await.unwrap_err();
        assert!(matches!(err, StorageError::Duplicate(_)));
    }

    #[tokio::test]
    async fn concurrent_saves_of_one_url_have_one_winner() {
        let storage = Arc::new(storage());
        let mut handles = vec![];

        for i in 0..10 {
            let storage = Arc::clone(&storage);
            handles.push(tokio::spawn(async move {
                storage
                    .save_data(&format!("user-{i}"), record("race", "https://race.example"))
                    .await
            }));
        }

        let mut ok = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => ok += 1,
                Err(e) => assert!(matches!(e, StorageError::Duplicate(_))),
            }
        }
        assert_eq!(ok, 1);
    }

    #[tokio::test]
    async fn file_backed_storage_survives_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("urls.jsonl");
        let saved = record("abc", "https://example.com");

        {
            let (store, _) = FileStore::open(&path).unwrap();
            let storage = KvUrlStorage::new(store);
            storage.save_data("u1", saved.clone()).await.unwrap();
            storage.delete_urls(&[saved.short_url.clone()]).await.unwrap();
            storage.shutdown().await.unwrap();
        }

        let (store, replay) = FileStore::open(&path).unwrap();
        assert!(replay.is_complete());
        let storage = KvUrlStorage::new(store);

        let got = storage.get_original_url(&saved.short_url).await.unwrap();
        assert!(got.deleted);
        assert_eq!(storage.get_user_urls("u1").await.unwrap(), vec![got]);
    }

    #[tokio::test]
    async fn writes_fail_after_file_store_shutdown() {
        let dir = TempDir::new().unwrap();
        let (store, _) = FileStore::open(dir.path().join("urls.jsonl")).unwrap();
        let storage = KvUrlStorage::new(store);
        storage.shutdown().await.unwrap();

        let err = storage
            .save_data("u1", record("abc", "https://example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));
    }
}
