use async_trait::async_trait;
use snipper_core::repository::{Result, UrlRecord, UrlStorage};
use snipper_core::StorageError;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, info};

/// Creates `url_data` and `user_url` if they do not exist yet.
pub const SCHEMA: &str = include_str!("../ddl/postgres/schema.sql");

/// PostgreSQL implementation of the storage contract.
///
/// Duplicate detection relies on the unique constraint on
/// `url_data.short_url`; a violation is reported as
/// [`StorageError::Duplicate`] just like the key/value backends. Saves and
/// batch saves each run in a single transaction.
#[derive(Debug, Clone)]
pub struct PostgresUrlStorage {
    pool: PgPool,
}

impl PostgresUrlStorage {
    /// Creates a storage from an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a storage by opening a new connection pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Applies [`SCHEMA`].
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        info!("postgres schema is ready");
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

fn record_from_row(row: &PgRow) -> Result<UrlRecord> {
    let short_url: String = row.try_get("short_url").map_err(map_sqlx_error)?;
    let original_url: String = row.try_get("original_url").map_err(map_sqlx_error)?;
    let deleted: Option<bool> = row.try_get("deleted").map_err(map_sqlx_error)?;

    Ok(UrlRecord {
        short_url,
        original_url,
        deleted: deleted.unwrap_or(false),
    })
}

async fn insert_record(
    tx: &mut Transaction<'_, Postgres>,
    user_token: &str,
    record: &UrlRecord,
) -> Result<()> {
    let inserted = sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO url_data (short_url, original_url)
        VALUES ($1, $2)
        RETURNING url_data_id
        "#,
    )
    .bind(&record.short_url)
    .bind(&record.original_url)
    .fetch_one(&mut **tx)
    .await;

    let url_data_id = match inserted {
        Ok(id) => id,
        Err(err) if is_unique_violation(&err) => {
            return Err(StorageError::Duplicate(record.short_url.clone()))
        }
        Err(err) => return Err(map_sqlx_error(err)),
    };

    sqlx::query(
        r#"
        INSERT INTO user_url (user_token, url_data_id)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(user_token)
    .bind(url_data_id)
    .execute(&mut **tx)
    .await
    .map_err(map_sqlx_error)?;

    Ok(())
}

#[async_trait]
impl UrlStorage for PostgresUrlStorage {
    async fn save_data(&self, user_token: &str, record: UrlRecord) -> Result<()> {
        record.validate()?;

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        insert_record(&mut tx, user_token, &record).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        debug!(short_url = %record.short_url, "saved url record");
        Ok(())
    }

    async fn save_data_batch(&self, user_token: &str, records: Vec<UrlRecord>) -> Result<()> {
        for record in &records {
            record.validate()?;
        }

        // Dropping the transaction on error rolls the whole batch back.
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for record in &records {
            insert_record(&mut tx, user_token, record).await?;
        }
        tx.commit().await.map_err(map_sqlx_error)?;

        debug!(count = records.len(), "saved url record batch");
        Ok(())
    }

    async fn get_original_url(&self, short_url: &str) -> Result<UrlRecord> {
        let row = sqlx::query(
            r#"
            SELECT short_url, original_url, deleted
            FROM url_data
            WHERE short_url = $1
            "#,
        )
        .bind(short_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Err(StorageError::NotFound(short_url.to_string()));
        };

        record_from_row(&row)
    }

    async fn get_user_urls(&self, user_token: &str) -> Result<Vec<UrlRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT d.short_url, d.original_url, d.deleted
            FROM url_data d
            JOIN user_url u ON u.url_data_id = d.url_data_id
            WHERE u.user_token = $1
            ORDER BY d.url_data_id
            "#,
        )
        .bind(user_token)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn delete_urls(&self, short_urls: &[String]) -> Result<()> {
        if short_urls.is_empty() {
            return Ok(());
        }

        let result = sqlx::query(
            r#"
            UPDATE url_data
            SET deleted = TRUE
            WHERE short_url = ANY($1)
            "#,
        )
        .bind(short_urls)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(
            requested = short_urls.len(),
            deleted = result.rows_affected(),
            "tombstoned url records"
        );
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.pool.close().await;
        info!("postgres pool closed");
        Ok(())
    }
}
