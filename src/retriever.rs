//! Query-time retrieval over the chunk index.
//!
//! Turns a free-text query into ranked chunks (similarity or
//! diversity-aware MMR ranking) and into a formatted, source-attributed
//! context block for prompt assembly.

use anyhow::{bail, Result};
use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::models::ScoredChunk;
use crate::store::VectorStore;

/// Fixed sentinel returned when retrieval finds nothing, so prompt
/// assembly always has a well-formed context section.
pub const NO_CONTEXT_SENTINEL: &str = "No relevant information found in the database.";

/// Ranking strategy for retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Plain nearest-neighbor ranking by cosine similarity.
    Similarity,
    /// Maximal marginal relevance: trade relevance against redundancy
    /// among the selected results.
    Mmr,
}

impl SearchMode {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "similarity" => Ok(SearchMode::Similarity),
            "mmr" => Ok(SearchMode::Mmr),
            other => bail!("Unknown search type: '{}'. Use similarity or mmr.", other),
        }
    }
}

/// Read path from the vector index: embeds queries and ranks candidates.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// The configured ranking strategy.
    pub fn default_mode(&self) -> Result<SearchMode> {
        SearchMode::parse(&self.config.search_type)
    }

    /// The configured result count.
    pub fn default_k(&self) -> usize {
        self.config.k
    }

    /// Retrieve the `k` most relevant chunks for `query`, best first.
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        mode: SearchMode,
    ) -> Result<Vec<ScoredChunk>> {
        let query_vec = self.embedder.embed(query).await?;

        match mode {
            SearchMode::Similarity => self.store.query(&query_vec, k, None).await,
            SearchMode::Mmr => {
                let fetch_k = self.config.fetch_k.max(k);
                let pool = self.store.query(&query_vec, fetch_k, None).await?;
                Ok(mmr_select(pool, k, self.config.lambda_mult))
            }
        }
    }

    /// Retrieve chunks from a single volume only, ranked by similarity.
    pub async fn retrieve_by_volume(
        &self,
        query: &str,
        volume_name: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let query_vec = self.embedder.embed(query).await?;
        self.store.query(&query_vec, k, Some(volume_name)).await
    }

    /// Retrieve and format results as a context block with source
    /// attribution. Never returns an empty string.
    pub async fn retrieve_with_context(&self, query: &str, k: usize) -> Result<String> {
        let mode = self.default_mode()?;
        let results = self.retrieve(query, k, mode).await?;
        Ok(format_context(&results))
    }
}

/// Format retrieved chunks as numbered, source-attributed blocks separated
/// by an explicit delimiter. An empty result set yields the fixed
/// no-context sentinel.
pub fn format_context(results: &[ScoredChunk]) -> String {
    if results.is_empty() {
        return NO_CONTEXT_SENTINEL.to_string();
    }

    let parts: Vec<String> = results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "[Source {}: {}, Page {}]\n{}",
                i + 1,
                r.chunk.source_file,
                r.chunk.page,
                r.chunk.text
            )
        })
        .collect();

    parts.join("\n\n---\n\n")
}

/// Greedy maximal-marginal-relevance selection.
///
/// Repeatedly picks the candidate maximizing
/// `lambda * relevance - (1 - lambda) * max_similarity_to_selected`,
/// until `k` are chosen. Candidates arrive best-first, so the first pick
/// is always the most relevant chunk.
fn mmr_select(candidates: Vec<ScoredChunk>, k: usize, lambda: f32) -> Vec<ScoredChunk> {
    let mut remaining = candidates;
    let mut selected: Vec<ScoredChunk> = Vec::with_capacity(k);

    while selected.len() < k && !remaining.is_empty() {
        let mut best_idx = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (i, cand) in remaining.iter().enumerate() {
            let max_sim = selected
                .iter()
                .map(|s| cosine_similarity(&cand.embedding, &s.embedding))
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if selected.is_empty() { 0.0 } else { max_sim };

            let mmr = lambda * cand.score - (1.0 - lambda) * redundancy;
            if mmr > best_score {
                best_score = mmr;
                best_idx = i;
            }
        }

        selected.push(remaining.remove(best_idx));
    }

    selected
}
