use clap::{Parser, ValueEnum};
use snipper_shortener::{DeletionConfig, ShortenerConfig};
use snipper_storage::backend::DEFAULT_MAX_CONNECTIONS;
use snipper_storage::{StorageBackend, StorageError, StorageSettings};
use snipper_telemetry::{LogFormat, TelemetryConfig};
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const LISTEN_ADDR_ENV: &str = "SNIPPER_LISTEN_ADDR";
pub const BASE_URL_ENV: &str = "SNIPPER_BASE_URL";
pub const FILE_STORAGE_PATH_ENV: &str = "SNIPPER_FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "SNIPPER_DATABASE_DSN";
pub const STRICT_DUMP_LOAD_ENV: &str = "SNIPPER_STRICT_DUMP_LOAD";
pub const DB_MAX_CONNECTIONS_ENV: &str = "SNIPPER_DB_MAX_CONNECTIONS";
pub const LOG_LEVEL_ENV: &str = "SNIPPER_LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "SNIPPER_LOG_FORMAT";
pub const SECRET_KEY_ENV: &str = "SNIPPER_SECRET_KEY";
pub const REQUEST_TIMEOUT_MS_ENV: &str = "SNIPPER_REQUEST_TIMEOUT_MS";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_SECRET_KEY: &str = "super_secret";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

impl Display for LogFormatArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormatArg::Text => write!(f, "text"),
            LogFormatArg::Json => write!(f, "json"),
        }
    }
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "snipper", about = "URL shortening HTTP service")]
pub struct CLI {
    #[arg(short = 'a', long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Prefix of every short URL handed out.
    #[arg(short = 'b', long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Persist to an append-only file instead of memory.
    #[arg(
        short = 'f',
        long,
        env = FILE_STORAGE_PATH_ENV,
        conflicts_with = "database_dsn"
    )]
    pub file_storage_path: Option<PathBuf>,

    /// Persist to PostgreSQL.
    #[arg(short = 'd', long, env = DATABASE_DSN_ENV, hide_env_values = true)]
    pub database_dsn: Option<String>,

    /// Refuse to start when the storage file cannot be fully replayed.
    #[arg(long, env = STRICT_DUMP_LOAD_ENV)]
    pub strict_dump_load: bool,

    #[arg(long, env = DB_MAX_CONNECTIONS_ENV, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub db_max_connections: u32,

    #[arg(short = 'l', long, env = LOG_LEVEL_ENV, default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    #[arg(
        long,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormatArg::Text
    )]
    pub log_format: LogFormatArg,

    /// Key signing the user token cookie.
    #[arg(
        long,
        env = SECRET_KEY_ENV,
        default_value = DEFAULT_SECRET_KEY,
        hide_env_values = true,
        hide_default_value = true
    )]
    pub secret_key: String,

    /// Timeout for storage calls made while serving a request.
    #[arg(long, env = REQUEST_TIMEOUT_MS_ENV, default_value_t = DEFAULT_REQUEST_TIMEOUT_MS)]
    pub request_timeout_ms: u64,
}

impl CLI {
    pub fn storage_settings(&self) -> Result<StorageSettings, StorageError> {
        let backend =
            StorageBackend::select(self.file_storage_path.clone(), self.database_dsn.clone())?;
        Ok(StorageSettings::builder()
            .backend(backend)
            .strict_dump_load(self.strict_dump_load)
            .max_connections(self.db_max_connections)
            .build())
    }

    pub fn shortener_config(&self) -> ShortenerConfig {
        ShortenerConfig::builder()
            .host_url(self.base_url.clone())
            .op_timeout(Duration::from_millis(self.request_timeout_ms))
            .deletion(DeletionConfig::default())
            .build()
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig::builder()
            .level(self.log_level.clone())
            .format(self.log_format.into())
            .build()
    }

    pub fn uses_default_secret(&self) -> bool {
        self.secret_key == DEFAULT_SECRET_KEY
    }
}
