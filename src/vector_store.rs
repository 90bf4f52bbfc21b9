//! Vector index adapter.
//!
//! SQLite-backed store: chunk text + metadata in a table, embeddings as
//! little-endian f32 blobs, brute-force cosine similarity for search.
//! Record ids are `{doc_id}_{chunk_id}`, so re-upserting the same chunks
//! is a safe retry rather than a duplicate.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use crate::chunk::Chunk;
use crate::errors::VectorStoreError;

/// A stored record returned from a nearest-neighbor query.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub id: String,
    pub text: String,
    pub doc_id: String,
    pub chunk_id: i64,
    pub score: f32,
}

/// Upsert and scoped nearest-neighbor search over chunk vectors.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Upsert one record per chunk. `chunks` and `embeddings` must be the
    /// same length and aligned by index.
    async fn add_embeddings(
        &self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), VectorStoreError>;

    /// Cosine nearest-neighbor search. When `doc_id` is given, results are
    /// restricted to records whose metadata `doc_id` matches exactly. An
    /// empty collection or a filter matching nothing yields an empty `Vec`,
    /// never an error.
    async fn query(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        doc_id: Option<&str>,
    ) -> Result<Vec<RetrievedChunk>, VectorStoreError>;
}

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    /// Open (or create) the store. Initialization failures are reported
    /// here, distinct from per-query errors.
    pub async fn new(db_path: &Path) -> Result<Self, VectorStoreError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| VectorStoreError::Init(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), VectorStoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chunk_vectors (
                id TEXT PRIMARY KEY,
                document TEXT NOT NULL,
                doc_id TEXT NOT NULL,
                chunk_id INTEGER NOT NULL,
                embedding BLOB NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| VectorStoreError::Init(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunk_vectors_doc ON chunk_vectors(doc_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::Init(e.to_string()))?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn add_embeddings(
        &self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), VectorStoreError> {
        if chunks.len() != embeddings.len() {
            return Err(VectorStoreError::InvalidInput(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }
        if chunks.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| VectorStoreError::Backend(e.to_string()))?;

        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            let blob = Self::serialize_embedding(embedding);

            sqlx::query(
                "INSERT OR REPLACE INTO chunk_vectors (id, document, doc_id, chunk_id, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(chunk.record_id())
            .bind(&chunk.text)
            .bind(&chunk.doc_id)
            .bind(chunk.chunk_id as i64)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
        tracing::debug!("upserted {} chunk vectors", chunks.len());
        Ok(())
    }

    async fn query(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        doc_id: Option<&str>,
    ) -> Result<Vec<RetrievedChunk>, VectorStoreError> {
        let rows = if let Some(doc_id) = doc_id {
            sqlx::query(
                "SELECT id, document, doc_id, chunk_id, embedding
                 FROM chunk_vectors WHERE doc_id = ?1",
            )
            .bind(doc_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VectorStoreError::Backend(e.to_string()))?
        } else {
            sqlx::query("SELECT id, document, doc_id, chunk_id, embedding FROM chunk_vectors")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| VectorStoreError::Backend(e.to_string()))?
        };

        let mut scored: Vec<RetrievedChunk> = rows
            .iter()
            .map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                let stored = Self::deserialize_embedding(&embedding_bytes);
                RetrievedChunk {
                    id: row.get("id"),
                    text: row.get("document"),
                    doc_id: row.get("doc_id"),
                    chunk_id: row.get("chunk_id"),
                    score: Self::cosine_similarity(query_embedding, &stored),
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);

        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(doc_id: &str, chunk_id: usize, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            doc_id: doc_id.to_string(),
            chunk_id,
        }
    }

    async fn open_store(dir: &tempfile::TempDir) -> SqliteVectorStore {
        SqliteVectorStore::new(&dir.path().join("vectors.db"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let chunks = vec![chunk("d1", 0, "alpha"), chunk("d1", 1, "beta")];
        let embeddings = vec![vec![1.0, 0.0], vec![0.0, 1.0]];

        store.add_embeddings(&chunks, &embeddings).await.unwrap();
        store.add_embeddings(&chunks, &embeddings).await.unwrap();

        let results = store.query(&[1.0, 0.0], 10, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "d1_0");
        assert_eq!(results[0].text, "alpha");
    }

    #[tokio::test]
    async fn query_is_scoped_to_doc_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store
            .add_embeddings(
                &[chunk("d1", 0, "one"), chunk("d2", 0, "two"), chunk("d2", 1, "three")],
                &[vec![1.0, 0.0], vec![1.0, 0.0], vec![0.9, 0.1]],
            )
            .await
            .unwrap();

        let results = store.query(&[1.0, 0.0], 10, Some("d2")).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.doc_id == "d2"));
    }

    #[tokio::test]
    async fn empty_collection_returns_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let results = store.query(&[1.0, 0.0], 5, None).await.unwrap();
        assert!(results.is_empty());

        let scoped = store.query(&[1.0, 0.0], 5, Some("missing")).await.unwrap();
        assert!(scoped.is_empty());
    }

    #[tokio::test]
    async fn mismatched_lengths_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let err = store
            .add_embeddings(&[chunk("d1", 0, "one")], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn results_are_ordered_by_similarity() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store
            .add_embeddings(
                &[chunk("d1", 0, "far"), chunk("d1", 1, "near")],
                &[vec![0.0, 1.0], vec![1.0, 0.0]],
            )
            .await
            .unwrap();

        let results = store.query(&[1.0, 0.0], 1, Some("d1")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "near");
    }
}
