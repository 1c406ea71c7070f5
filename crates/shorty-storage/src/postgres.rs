use async_trait::async_trait;
use shorty_core::{Lookup, Result, Stats, Storage, StorageError};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use tracing::{debug, info};

/// Schema applied on connect. Idempotent.
pub const SCHEMA: &str = include_str!("../ddl/postgres/short_urls.sql");

/// PostgreSQL implementation of the storage contract.
///
/// Soft delete is a `deleted` flag. A partial unique index keeps
/// `original_url` unique among live rows, which is the same rule the
/// in-memory backend applies when deduplicating. Because the database
/// enforces it, [`put`](Storage::put) fails with `AlreadyExists` where the
/// in-memory backends would overwrite.
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Creates a storage from an existing connection pool.
    ///
    /// The schema is expected to exist; see [`PostgresStorage::migrate`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool and makes sure the schema exists.
    pub async fn connect(database_dsn: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_dsn)
            .await
            .map_err(map_sqlx_error)?;

        let storage = Self::new(pool);
        storage.migrate().await?;
        info!(max_connections, "connected to postgres storage");
        Ok(storage)
    }

    /// Creates the table and indexes if they do not exist.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn live_holder(&self, original_url: &str) -> Result<Option<String>> {
        let row = sqlx::query(
            r#"
            SELECT short_url
            FROM short_urls
            WHERE original_url = $1
              AND NOT deleted
            LIMIT 1
            "#,
        )
        .bind(original_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(|row| row.try_get("short_url").map_err(map_sqlx_error))
            .transpose()
    }

    /// Maps a unique violation on insert to `AlreadyExists`, naming the live
    /// holder of the URL when there is one.
    async fn conflict(&self, short_id: &str, original_url: &str, err: sqlx::Error) -> StorageError {
        if !is_unique_violation(&err) {
            return map_sqlx_error(err);
        }

        match self.live_holder(original_url).await {
            Ok(Some(existing)) => StorageError::AlreadyExists { short_id: existing },
            Ok(None) => StorageError::AlreadyExists {
                short_id: short_id.to_owned(),
            },
            Err(err) => err,
        }
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

const UPSERT: &str = r#"
    INSERT INTO short_urls (short_url, original_url, user_id, deleted)
    VALUES ($1, $2, $3, FALSE)
    ON CONFLICT (short_url) DO UPDATE
    SET original_url = EXCLUDED.original_url,
        user_id = EXCLUDED.user_id,
        deleted = FALSE
"#;

#[async_trait]
impl Storage for PostgresStorage {
    async fn put(&self, short_id: &str, original_url: &str, owner_id: &str) -> Result<()> {
        let result = sqlx::query(UPSERT)
            .bind(short_id)
            .bind(original_url)
            .bind(owner_id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => Err(self.conflict(short_id, original_url, err).await),
        }
    }

    async fn put_many(&self, entries: &HashMap<String, String>, owner_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        for (short_id, original_url) in entries {
            let result = sqlx::query(UPSERT)
                .bind(short_id)
                .bind(original_url)
                .bind(owner_id)
                .execute(&mut *tx)
                .await;

            if let Err(err) = result {
                // The transaction is aborted; roll back before asking who
                // holds the conflicting URL.
                tx.rollback().await.map_err(map_sqlx_error)?;
                return Err(self.conflict(short_id, original_url, err).await);
            }
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(entries = entries.len(), owner_id, "stored batch");
        Ok(())
    }

    async fn insert(&self, short_id: &str, original_url: &str, owner_id: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO short_urls (short_url, original_url, user_id, deleted)
            VALUES ($1, $2, $3, FALSE)
            ON CONFLICT (original_url) WHERE NOT deleted DO NOTHING
            RETURNING short_url
            "#,
        )
        .bind(short_id)
        .bind(original_url)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(_)) => Ok(()),
            Ok(None) => match self.live_holder(original_url).await? {
                Some(existing) => Err(StorageError::AlreadyExists { short_id: existing }),
                None => Err(StorageError::Query(format!(
                    "insert of '{short_id}' conflicted but no live record holds '{original_url}'"
                ))),
            },
            Err(err) => Err(self.conflict(short_id, original_url, err).await),
        }
    }

    async fn get(&self, short_id: &str) -> Result<Lookup> {
        let row = sqlx::query(
            r#"
            SELECT original_url, deleted
            FROM short_urls
            WHERE short_url = $1
            "#,
        )
        .bind(short_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(Lookup::Missing);
        };

        let original_url: String = row.try_get("original_url").map_err(map_sqlx_error)?;
        let deleted: bool = row.try_get("deleted").map_err(map_sqlx_error)?;

        Ok(if deleted {
            Lookup::Deleted(original_url)
        } else {
            Lookup::Live(original_url)
        })
    }

    async fn find_short_id(&self, original_url: &str) -> Result<Option<String>> {
        self.live_holder(original_url).await
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<HashMap<String, String>> {
        let rows = sqlx::query(
            r#"
            SELECT short_url, original_url
            FROM short_urls
            WHERE user_id = $1
              AND NOT deleted
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter()
            .map(|row| -> Result<(String, String)> {
                let short_url: String = row.try_get("short_url").map_err(map_sqlx_error)?;
                let original_url: String = row.try_get("original_url").map_err(map_sqlx_error)?;
                Ok((short_url, original_url))
            })
            .collect()
    }

    async fn soft_delete(&self, short_ids: &[String], owner_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut affected = 0u64;

        for short_id in short_ids {
            affected += sqlx::query(
                r#"
                UPDATE short_urls
                SET deleted = TRUE
                WHERE short_url = $1
                  AND user_id = $2
                "#,
            )
            .bind(short_id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(requested = short_ids.len(), affected, owner_id, "soft deleted records");
        Ok(())
    }

    async fn stats(&self) -> Result<Stats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS urls, COUNT(DISTINCT user_id) AS users
            FROM short_urls
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let urls: i64 = row.try_get("urls").map_err(map_sqlx_error)?;
        let users: i64 = row.try_get("users").map_err(map_sqlx_error)?;

        Ok(Stats {
            urls: to_count(urls)?,
            users: to_count(users)?,
        })
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        info!("closed postgres storage");
        Ok(())
    }
}

fn to_count(value: i64) -> Result<usize> {
    usize::try_from(value)
        .map_err(|e| StorageError::InvalidData(format!("invalid count '{value}': {e}")))
}
