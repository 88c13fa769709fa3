use crate::kv::{FileStore, MemoryStore};
use crate::kv_storage::KvUrlStorage;
use crate::postgres::PostgresUrlStorage;
use snipper_core::repository::Result;
use snipper_core::{StorageError, UrlStorage};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use typed_builder::TypedBuilder;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Which persistence backend to run on. Resolved once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    InMemory,
    File { path: PathBuf },
    Postgres { dsn: String },
}

impl StorageBackend {
    /// Picks a backend from the optional file path and DSN.
    ///
    /// At most one may be set; neither selects the in-memory backend.
    pub fn select(file_path: Option<PathBuf>, dsn: Option<String>) -> Result<Self> {
        match (file_path, dsn) {
            (None, None) => Ok(Self::InMemory),
            (Some(path), None) => Ok(Self::File { path }),
            (None, Some(dsn)) => Ok(Self::Postgres { dsn }),
            (Some(_), Some(_)) => Err(StorageError::Unavailable(
                "a file path and a database dsn are mutually exclusive".to_string(),
            )),
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // The dsn may carry credentials, so it is never printed.
        match self {
            StorageBackend::InMemory => write!(f, "in-memory"),
            StorageBackend::File { path } => write!(f, "file({})", path.display()),
            StorageBackend::Postgres { .. } => write!(f, "postgres"),
        }
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct StorageSettings {
    #[builder(default = StorageBackend::InMemory)]
    pub backend: StorageBackend,
    /// Abort start-up when the dump file cannot be fully replayed.
    #[builder(default)]
    pub strict_dump_load: bool,
    #[builder(default = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,
}

/// Opens the storage selected by `settings`.
pub async fn open(settings: &StorageSettings) -> Result<Arc<dyn UrlStorage>> {
    match &settings.backend {
        StorageBackend::InMemory => {
            info!("using in-memory storage");
            Ok(Arc::new(KvUrlStorage::new(MemoryStore::new())))
        }
        StorageBackend::File { path } => {
            let (store, replay) = FileStore::open(path)?;
            match replay.error {
                Some(error) if settings.strict_dump_load => return Err(error.into()),
                Some(error) => warn!(
                    path = %path.display(),
                    entries = replay.entries,
                    skipped = replay.skipped,
                    error = %error,
                    "dump file only partially loaded, continuing"
                ),
                None => info!(
                    path = %path.display(),
                    entries = replay.entries,
                    "using file storage"
                ),
            }
            Ok(Arc::new(KvUrlStorage::new(store)))
        }
        StorageBackend::Postgres { dsn } => {
            let storage = PostgresUrlStorage::connect(dsn, settings.max_connections).await?;
            storage.init_schema().await?;
            info!(max_connections = settings.max_connections, "using postgres storage");
            Ok(Arc::new(storage))
        }
    }
}
