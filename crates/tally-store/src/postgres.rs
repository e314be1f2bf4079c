//! Postgres record store.
//!
//! Documents live in a single `tally_documents` table as `jsonb`. A row-level
//! trigger issues `pg_notify('tally_changes', '')` after every insert, update
//! or delete, and a background [`PgListener`] task turns those notifications
//! into [`Change`] events. Writes made by other processes against the same
//! database therefore reach this process's subscribers too.
//!
//! Only the `created` and `updated` fields are indexed.

use crate::document::{
    CHANGE_CHANNEL_CAPACITY, Change, ChangeFeed, DelResult, Document, PutResult, QueryOptions,
    QueryResult, Row, assign_id,
};
use crate::error::StoreError;
use crate::RecordStore;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgListener, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{PgPool, Row as _};
use std::time::Duration;
use tokio::sync::{OnceCell, broadcast};
use tokio::task::JoinHandle;

/// Notification channel used by the change trigger.
pub const CHANGE_CHANNEL: &str = "tally_changes";

/// Fields that have a Postgres expression index.
const INDEXED_FIELDS: &[&str] = &["created", "updated"];

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS tally_documents (
    id   TEXT PRIMARY KEY,
    body JSONB NOT NULL,
    seq  BIGSERIAL NOT NULL
);

CREATE INDEX IF NOT EXISTS tally_documents_created_idx
    ON tally_documents (((body->>'created')::bigint), seq);

CREATE INDEX IF NOT EXISTS tally_documents_updated_idx
    ON tally_documents (((body->>'updated')::bigint), seq);

CREATE OR REPLACE FUNCTION tally_notify_change() RETURNS trigger AS $$
BEGIN
    PERFORM pg_notify('tally_changes', '');
    RETURN NULL;
END;
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS tally_documents_notify ON tally_documents;
CREATE TRIGGER tally_documents_notify
    AFTER INSERT OR UPDATE OR DELETE ON tally_documents
    FOR EACH ROW EXECUTE FUNCTION tally_notify_change();
"#;

/// Postgres-backed store.
pub struct PostgresStore {
    pool: PgPool,
    changes: broadcast::Sender<Change>,
    listener: OnceCell<JoinHandle<()>>,
}

impl PostgresStore {
    /// Connect to the database. The schema is created by [`RecordStore::ready`].
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::with_pool(pool))
    }

    /// Wrap an existing pool.
    pub fn with_pool(pool: PgPool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            pool,
            changes,
            listener: OnceCell::new(),
        }
    }

    async fn start_listener(&self) -> Result<JoinHandle<()>, StoreError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;
        tracing::info!(channel = CHANGE_CHANNEL, "Listening for store changes");

        let changes = self.changes.clone();
        Ok(tokio::spawn(async move {
            loop {
                // Notifications sent while disconnected are lost, so a dropped
                // connection or an error still signals one change.
                match listener.try_recv().await {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        tracing::warn!("Change listener connection lost, reconnecting");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Change listener error, retrying");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
                let _ = changes.send(Change);
            }
        }))
    }
}

impl Drop for PostgresStore {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.get() {
            handle.abort();
        }
    }
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn ready(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        self.listener
            .get_or_try_init(|| self.start_listener())
            .await?;
        Ok(())
    }

    async fn put(&self, mut doc: Document) -> Result<PutResult, StoreError> {
        let id = assign_id(&mut doc);
        sqlx::query(
            "INSERT INTO tally_documents (id, body) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE \
             SET body = EXCLUDED.body, seq = nextval('tally_documents_seq_seq')",
        )
        .bind(&id)
        .bind(Json(Value::Object(doc)))
        .execute(&self.pool)
        .await?;
        tracing::debug!(id = %id, "Stored document");
        Ok(PutResult { id })
    }

    async fn get(&self, id: &str) -> Result<Document, StoreError> {
        let row = sqlx::query("SELECT body FROM tally_documents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found(id))?;
        let Json(body): Json<Value> = row.try_get("body")?;
        into_document(body)
    }

    async fn del(&self, id: &str) -> Result<DelResult, StoreError> {
        let result = sqlx::query("DELETE FROM tally_documents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(id));
        }
        tracing::debug!(id = %id, "Deleted document");
        Ok(DelResult { id: id.to_string() })
    }

    async fn query(&self, index: &str, opts: QueryOptions) -> Result<QueryResult, StoreError> {
        if !INDEXED_FIELDS.contains(&index) {
            return Err(StoreError::IndexNotFound {
                index: index.to_string(),
            });
        }

        let direction = if opts.descending { "DESC" } else { "ASC" };
        // `index` is one of INDEXED_FIELDS, so interpolating it is safe.
        let sql = format!(
            "SELECT id, body FROM tally_documents \
             WHERE body->>'{index}' IS NOT NULL \
             ORDER BY (body->>'{index}')::bigint {direction}, seq {direction} \
             LIMIT $1"
        );
        let limit = opts
            .limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
            .unwrap_or(i64::MAX);

        let records = sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?;

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let id: String = record.try_get("id")?;
            let Json(body): Json<Value> = record.try_get("body")?;
            let doc = into_document(body)?;
            rows.push(Row {
                id,
                key: doc.get(index).cloned().unwrap_or(Value::Null),
                doc: opts.include_docs.then_some(doc),
            });
        }

        Ok(QueryResult { rows })
    }

    fn subscribe(&self) -> ChangeFeed {
        self.changes.subscribe()
    }
}

fn into_document(body: Value) -> Result<Document, StoreError> {
    match body {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidDocument(format!(
            "expected a JSON object, found {other}"
        ))),
    }
}
