/// SQLite-backed content store
use crate::{
    error::{PanelError, PanelResult},
    models::{Collection, StoredRecord},
    store::{ContentStore, SnapshotHub, SnapshotStream},
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Stores each record as a JSON body keyed by collection.
///
/// Every successful write reloads the affected collection and publishes the
/// full snapshot to all subscribers of this process.
pub struct SqliteContentStore {
    db: SqlitePool,
    hub: SnapshotHub,
    /// Held across load and publish so an older snapshot never lands last
    refresh_lock: Mutex<()>,
}

fn write_error(e: sqlx::Error) -> PanelError {
    PanelError::Store(e.to_string())
}

impl SqliteContentStore {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            hub: SnapshotHub::new(),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Load one collection, newest first
    async fn load(&self, collection: Collection) -> PanelResult<Vec<StoredRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, body
            FROM content_record
            WHERE collection = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(collection.as_str())
        .fetch_all(&self.db)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("id");
            let body: String = row.get("body");
            match serde_json::from_str::<Map<String, Value>>(&body) {
                Ok(fields) => records.push(StoredRecord { id, fields }),
                Err(e) => tracing::warn!("Skipping unreadable {} record {}: {}", collection, id, e),
            }
        }

        Ok(records)
    }

    /// Reload and publish a collection snapshot
    pub async fn refresh(&self, collection: Collection) {
        let _guard = self.refresh_lock.lock().await;
        match self.load(collection).await {
            Ok(records) => self.hub.publish(collection, records),
            Err(e) => {
                tracing::error!("Failed to load {} snapshot: {}", collection, e);
                self.hub.publish_error(collection, e.to_string());
            }
        }
    }

    async fn fetch_fields(&self, collection: Collection, id: &str) -> PanelResult<Map<String, Value>> {
        let row = sqlx::query("SELECT body FROM content_record WHERE collection = ?1 AND id = ?2")
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(write_error)?;

        let row = row.ok_or_else(|| PanelError::NotFound(format!("{} record {}", collection, id)))?;
        let body: String = row.get("body");
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    async fn subscribe(&self, collection: Collection) -> PanelResult<SnapshotStream> {
        if !self.hub.has_snapshot(collection) {
            self.refresh(collection).await;
        }
        Ok(self.hub.subscribe(collection))
    }

    async fn insert(&self, collection: Collection, fields: Map<String, Value>) -> PanelResult<String> {
        let id = Uuid::new_v4().to_string();
        let created_at = fields.get("createdAt").and_then(Value::as_i64).unwrap_or(0);
        let body = serde_json::to_string(&fields)?;

        sqlx::query(
            r#"
            INSERT INTO content_record (id, collection, created_at, body)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&id)
        .bind(collection.as_str())
        .bind(created_at)
        .bind(&body)
        .execute(&self.db)
        .await
        .map_err(write_error)?;

        tracing::debug!("Inserted {} record {}", collection, id);
        self.refresh(collection).await;
        Ok(id)
    }

    async fn update(&self, collection: Collection, id: &str, patch: Map<String, Value>) -> PanelResult<()> {
        let mut fields = self.fetch_fields(collection, id).await?;
        for (key, value) in patch {
            fields.insert(key, value);
        }
        let created_at = fields.get("createdAt").and_then(Value::as_i64).unwrap_or(0);
        let body = serde_json::to_string(&fields)?;

        let result = sqlx::query(
            r#"
            UPDATE content_record
            SET body = ?1, created_at = ?2
            WHERE collection = ?3 AND id = ?4
            "#,
        )
        .bind(&body)
        .bind(created_at)
        .bind(collection.as_str())
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(write_error)?;

        if result.rows_affected() == 0 {
            return Err(PanelError::NotFound(format!("{} record {}", collection, id)));
        }

        tracing::debug!("Updated {} record {}", collection, id);
        self.refresh(collection).await;
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> PanelResult<()> {
        sqlx::query("DELETE FROM content_record WHERE collection = ?1 AND id = ?2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(write_error)?;

        tracing::debug!("Deleted {} record {}", collection, id);
        self.refresh(collection).await;
        Ok(())
    }
}
