use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::StoryboardError;

/// One stored record. Writes always replace the whole document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

/// Persistence collaborator. Subscriptions deliver full snapshots of the
/// collection, never deltas.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn load_all(&self, collection: &str) -> Result<Vec<Document>, StoryboardError>;

    async fn subscribe(
        &self,
        collection: &str,
    ) -> Result<mpsc::Receiver<Vec<Document>>, StoryboardError>;

    async fn upsert(&self, collection: &str, id: &str, record: &Value)
        -> Result<(), StoryboardError>;

    async fn remove(&self, collection: &str, id: &str) -> Result<(), StoryboardError>;
}

/// Postgres-backed store: one JSONB row per document, `pg_notify` on
/// every write so other instances can refresh.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

fn channel(collection: &str) -> String {
    format!("documents_{collection}")
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn notify(&self, collection: &str, id: &str) -> Result<(), StoryboardError> {
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(channel(collection))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn load_all(&self, collection: &str) -> Result<Vec<Document>, StoryboardError> {
        let rows: Vec<(String, Value)> =
            sqlx::query_as("SELECT id, data FROM documents WHERE collection = $1 ORDER BY id")
                .bind(collection)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(id, data)| Document { id, data })
            .collect())
    }

    async fn subscribe(
        &self,
        collection: &str,
    ) -> Result<mpsc::Receiver<Vec<Document>>, StoryboardError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(&channel(collection)).await?;
        info!("Subscribed to document changes on '{collection}'");

        let (tx, rx) = mpsc::channel(16);
        let store = self.clone();
        let collection = collection.to_string();
        tokio::spawn(async move {
            loop {
                let notification = match listener.recv().await {
                    Ok(n) => n,
                    Err(e) => {
                        warn!("Document listener on '{collection}' stopped: {e}");
                        break;
                    }
                };
                debug!("Change notification for {collection}/{}", notification.payload());
                match store.load_all(&collection).await {
                    Ok(snapshot) => {
                        if tx.send(snapshot).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Reloading '{collection}' after notification failed: {e}"),
                }
            }
        });

        Ok(rx)
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        record: &Value,
    ) -> Result<(), StoryboardError> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (collection, id)
            DO UPDATE SET data = EXCLUDED.data, updated_at = now()
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(record)
        .execute(&self.pool)
        .await?;
        self.notify(collection, id).await
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<(), StoryboardError> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.notify(collection, id).await
    }
}
