//! In-memory [`VectorStore`] used by tests.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::embedding::cosine_similarity;
use crate::models::{Chunk, ScoredChunk};

use super::{rank_candidates, VectorStore};

/// Chunk index held entirely in memory, keyed by chunk id.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, (Chunk, Vec<f32>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != vectors.len() {
            bail!(
                "upsert mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            );
        }

        let mut records = self.records.lock().expect("store lock");
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            records.insert(chunk.id.clone(), (chunk.clone(), vector.clone()));
        }
        Ok(())
    }

    async fn query(
        &self,
        query_vec: &[f32],
        k: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        let records = self.records.lock().expect("store lock");

        let mut candidates: Vec<ScoredChunk> = records
            .values()
            .filter(|(chunk, _)| source_filter.map_or(true, |s| chunk.source_file == s))
            .map(|(chunk, embedding)| ScoredChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(query_vec, embedding),
                embedding: embedding.clone(),
            })
            .collect();

        rank_candidates(&mut candidates, k);
        Ok(candidates)
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.records.lock().expect("store lock").len() as i64)
    }

    async fn delete_collection(&self) -> Result<()> {
        self.records.lock().expect("store lock").clear();
        Ok(())
    }
}
