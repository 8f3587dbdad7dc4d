//! Vector index abstraction.
//!
//! The [`VectorStore`] trait defines the operations the ingestion pipeline
//! and retriever need from the chunk index, enabling pluggable backends
//! (SQLite here, in-memory for tests).
//!
//! Upserts are keyed by the stable chunk id, so re-ingesting a volume
//! overwrites its chunks in place. The store tolerates concurrent writers
//! from other processes for that reason.

pub mod memory;

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{Chunk, ScoredChunk};

/// Abstract chunk index backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorStore::upsert) | Insert or overwrite chunks with their vectors |
/// | [`query`](VectorStore::query) | Cosine-ranked nearest chunks, optionally volume-scoped |
/// | [`count`](VectorStore::count) | Number of indexed chunks |
/// | [`delete_collection`](VectorStore::delete_collection) | Drop every indexed chunk |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite chunks and their embedding vectors.
    ///
    /// `vectors` is parallel to `chunks`, one vector per chunk.
    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()>;

    /// Return the `k` nearest chunks to `query_vec` by cosine similarity,
    /// best first. Ties break on ascending chunk index. When
    /// `source_filter` is set, only chunks from that volume are candidates.
    async fn query(
        &self,
        query_vec: &[f32],
        k: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<ScoredChunk>>;

    /// Number of chunks currently indexed.
    async fn count(&self) -> Result<i64>;

    /// Remove every indexed chunk.
    async fn delete_collection(&self) -> Result<()>;
}

/// SQLite-backed chunk index.
///
/// Vectors are stored as little-endian f32 BLOBs; similarity is computed
/// in-process over the candidate rows.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != vectors.len() {
            bail!(
                "upsert mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            );
        }

        let mut tx = self.pool.begin().await?;

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            let blob = vec_to_blob(vector);
            sqlx::query(
                r#"
                INSERT INTO chunks (id, source_file, page, chunk_index, text, embedding)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    source_file = excluded.source_file,
                    page = excluded.page,
                    chunk_index = excluded.chunk_index,
                    text = excluded.text,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.source_file)
            .bind(chunk.page)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&blob)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        query_vec: &[f32],
        k: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        let rows = match source_filter {
            Some(source) => {
                sqlx::query(
                    "SELECT id, source_file, page, chunk_index, text, embedding FROM chunks WHERE source_file = ?",
                )
                .bind(source)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT id, source_file, page, chunk_index, text, embedding FROM chunks")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut candidates: Vec<ScoredChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let embedding = blob_to_vec(&blob);
                let score = cosine_similarity(query_vec, &embedding);
                ScoredChunk {
                    chunk: Chunk {
                        id: row.get("id"),
                        source_file: row.get("source_file"),
                        page: row.get("page"),
                        chunk_index: row.get("chunk_index"),
                        text: row.get("text"),
                    },
                    score,
                    embedding,
                }
            })
            .collect();

        rank_candidates(&mut candidates, k);
        Ok(candidates)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn delete_collection(&self) -> Result<()> {
        sqlx::query("DELETE FROM chunks").execute(&self.pool).await?;
        Ok(())
    }
}

/// Sort candidates best-first (score desc, chunk index asc for a
/// deterministic tie-break) and keep the top `k`.
pub(crate) fn rank_candidates(candidates: &mut Vec<ScoredChunk>, k: usize) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
    });
    candidates.truncate(k);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    async fn temp_store() -> (tempfile::TempDir, SqliteStore) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("test.sqlite");
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .unwrap()
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .unwrap();
        migrate::apply_schema(&pool).await.unwrap();
        (tmp, SqliteStore::new(pool))
    }

    fn chunk(id: &str, source: &str, index: i64) -> Chunk {
        Chunk {
            id: id.to_string(),
            source_file: source.to_string(),
            page: 1,
            chunk_index: index,
            text: format!("chunk {} of {}", index, source),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_query_roundtrip() {
        let (_tmp, store) = temp_store().await;
        store
            .upsert(
                &[chunk("a", "v1.txt", 0), chunk("b", "v1.txt", 1)],
                &[vec![1.0, 0.0], vec![0.0, 1.0]],
            )
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 2);

        let results = store.query(&[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.id, "a");
        assert!(results[0].score > results[1].score);
        assert_eq!(results[0].embedding, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_upsert_same_id_overwrites() {
        let (_tmp, store) = temp_store().await;
        store
            .upsert(&[chunk("a", "v1.txt", 0)], &[vec![1.0, 0.0]])
            .await
            .unwrap();
        store
            .upsert(&[chunk("a", "v1.txt", 0)], &[vec![0.0, 1.0]])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let results = store.query(&[0.0, 1.0], 1, None).await.unwrap();
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_query_with_source_filter() {
        let (_tmp, store) = temp_store().await;
        store
            .upsert(
                &[chunk("a", "v1.txt", 0), chunk("b", "v2.txt", 0)],
                &[vec![1.0, 0.0], vec![1.0, 0.0]],
            )
            .await
            .unwrap();

        let results = store.query(&[1.0, 0.0], 5, Some("v2.txt")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.source_file, "v2.txt");
    }

    #[tokio::test]
    async fn test_mismatched_vector_count_rejected() {
        let (_tmp, store) = temp_store().await;
        let err = store
            .upsert(&[chunk("a", "v1.txt", 0)], &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("upsert mismatch"));
    }

    #[tokio::test]
    async fn test_delete_collection() {
        let (_tmp, store) = temp_store().await;
        store
            .upsert(&[chunk("a", "v1.txt", 0)], &[vec![1.0]])
            .await
            .unwrap();
        store.delete_collection().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.query(&[1.0], 5, None).await.unwrap().is_empty());
    }
}
