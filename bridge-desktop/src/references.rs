//! Cache reference storage using SQLite

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{AssetReference, ReferenceStore},
};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use std::path::PathBuf;
use tracing::{debug, warn};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS asset_references (
        asset_title TEXT PRIMARY KEY,
        local_path TEXT NOT NULL,
        source_url TEXT NOT NULL,
        last_accessed_at INTEGER NOT NULL
    )
"#;

/// SQLite-backed store for cached asset references
///
/// One row per asset title; writes are upserts so a re-download replaces the
/// previous record.
pub struct SqliteReferenceStore {
    pool: SqlitePool,
}

impl SqliteReferenceStore {
    /// Open (or create) the reference database at `db_path`
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }

        // SQLite URLs want forward slashes
        let path_str = db_path.to_string_lossy().replace('\\', "/");
        let db_url = format!("sqlite://{}?mode=rwc", path_str);

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to connect to DB: {}", e)))?;
        Self::create_schema(&pool).await?;

        debug!(path = ?db_path, "Initialized reference store");
        Ok(Self { pool })
    }

    /// Create an in-memory store (for testing)
    pub async fn in_memory() -> Result<Self> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to connect to DB: {}", e)))?;
        Self::create_schema(&pool).await?;
        Ok(Self { pool })
    }

    async fn create_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to create table: {}", e)))?;
        Ok(())
    }

    fn from_millis(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis)
            .single()
            .unwrap_or_else(|| {
                warn!(millis, "Invalid stored access time; using epoch");
                DateTime::<Utc>::default()
            })
    }

    fn row_to_reference(row: &sqlx::sqlite::SqliteRow) -> AssetReference {
        let local_path: String = row.get("local_path");
        AssetReference {
            asset_title: row.get("asset_title"),
            local_path: PathBuf::from(local_path),
            source_url: row.get("source_url"),
            last_accessed_at: Self::from_millis(row.get("last_accessed_at")),
        }
    }
}

#[async_trait]
impl ReferenceStore for SqliteReferenceStore {
    async fn persist_reference(&self, reference: &AssetReference) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO asset_references (asset_title, local_path, source_url, last_accessed_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(asset_title) DO UPDATE SET
                local_path = excluded.local_path,
                source_url = excluded.source_url,
                last_accessed_at = excluded.last_accessed_at
            "#,
        )
        .bind(&reference.asset_title)
        .bind(reference.local_path.to_string_lossy().into_owned())
        .bind(&reference.source_url)
        .bind(reference.last_accessed_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("Failed to persist reference: {}", e)))?;

        debug!(asset_title = %reference.asset_title, "Persisted reference");
        Ok(())
    }

    async fn resolve_reference(&self, asset_title: &str) -> Result<Option<AssetReference>> {
        let row = sqlx::query(
            "SELECT asset_title, local_path, source_url, last_accessed_at \
             FROM asset_references WHERE asset_title = ?",
        )
        .bind(asset_title)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("Failed to resolve reference: {}", e)))?;

        Ok(row.as_ref().map(Self::row_to_reference))
    }

    async fn remove_reference(&self, asset_title: &str) -> Result<()> {
        sqlx::query("DELETE FROM asset_references WHERE asset_title = ?")
            .bind(asset_title)
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to remove reference: {}", e)))?;

        debug!(asset_title, "Removed reference");
        Ok(())
    }

    async fn list_references(&self) -> Result<Vec<AssetReference>> {
        let rows = sqlx::query(
            "SELECT asset_title, local_path, source_url, last_accessed_at \
             FROM asset_references ORDER BY last_accessed_at ASC, asset_title ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("Failed to list references: {}", e)))?;

        Ok(rows.iter().map(Self::row_to_reference).collect())
    }

    async fn touch_reference(&self, asset_title: &str, accessed_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE asset_references SET last_accessed_at = ? WHERE asset_title = ?")
            .bind(accessed_at.timestamp_millis())
            .bind(asset_title)
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to touch reference: {}", e)))?;
        Ok(())
    }
}
