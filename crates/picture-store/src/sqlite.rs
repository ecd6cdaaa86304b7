use std::{path::Path, str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};
use tracing::debug;

use crate::{Document, DocumentStore, StoreError};

/// Default SQLite busy timeout in milliseconds when the DB is under load.
const SQLITE_BUSY_TIMEOUT_MS: u64 = 5_000;

/// SQLite-backed document store.
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes (or creates) a connection pool to the SQLite database located at
    /// the given URL (e.g. `sqlite:///var/lib/pictures/pictures.db`) and applies
    /// the embedded migrations.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_millis(SQLITE_BUSY_TIMEOUT_MS));

        // Every connection to `:memory:` opens a fresh database, so the pool
        // must hold exactly one connection for the lifetime of the store.
        let in_memory = database_url.contains(":memory:");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(8)
        };

        let pool = pool_options.connect_with(options).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Connects to a file path via `sqlite://` scheme.
    pub async fn connect_file(path: &Path) -> Result<Self, StoreError> {
        let url = format!("sqlite://{}", path.display());
        Self::connect(&url).await
    }
}

#[async_trait]
impl DocumentStore for Database {
    async fn merge_upsert(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> Result<(), StoreError> {
        let body = serde_json::to_string(&Value::Object(fields))?;

        // `json_patch` implements RFC 7396, matching `merge_patch` used by the
        // in-memory store. Patching `{}` on insert strips null members, so the
        // update path patches with the raw body rather than `excluded.body`.
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body, updated_at)
            VALUES (?, ?, json_patch('{}', ?), ?)
            ON CONFLICT (collection, id) DO UPDATE SET
                body = json_patch(documents.body, ?),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(&body)
        .bind(Utc::now().to_rfc3339())
        .bind(&body)
        .execute(&self.pool)
        .await?;

        debug!(collection, id, "document merged");
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let body: String = row.try_get("body")?;
        match serde_json::from_str::<Value>(&body)? {
            Value::Object(fields) => Ok(Some(fields)),
            _ => Err(StoreError::NotAnObject {
                collection: collection.to_owned(),
                id: id.to_owned(),
            }),
        }
    }
}
