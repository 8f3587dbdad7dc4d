//! Ingestion pipeline orchestration.
//!
//! Coordinates the full flow for one volume: registry check → load →
//! chunk → embed (batched) → index upsert → registry write. Any stage
//! failure aborts that file with an error outcome and leaves the registry
//! untouched; directory ingestion processes files independently in sorted
//! order, so one bad volume never aborts the batch.

use anyhow::Result;
use std::path::Path;

use crate::chunker;
use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::loader;
use crate::registry;
use crate::store::VectorStore;

/// Outcome class for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStatus {
    Success,
    Skipped,
    Error,
}

/// Result of ingesting one file.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub filename: String,
    pub status: IngestStatus,
    pub chunks: usize,
    pub pages: usize,
    pub detail: Option<String>,
}

impl IngestOutcome {
    fn skipped(filename: String) -> Self {
        Self {
            filename,
            status: IngestStatus::Skipped,
            chunks: 0,
            pages: 0,
            detail: Some("Already processed. Use --force to re-ingest.".to_string()),
        }
    }

    fn error(filename: String, err: anyhow::Error) -> Self {
        Self {
            filename,
            status: IngestStatus::Error,
            chunks: 0,
            pages: 0,
            detail: Some(format!("{:#}", err)),
        }
    }
}

/// Ingest a single volume into the chunk index.
///
/// With `force`, the registry skip-check is bypassed and the volume is
/// re-embedded; stable chunk ids make the upsert overwrite the old chunks.
pub async fn ingest_file(
    config: &Config,
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingProvider,
    path: &Path,
    force: bool,
) -> IngestOutcome {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    if !force {
        match registry::is_embedded(&config.db.registry_path, &filename) {
            Ok(true) => return IngestOutcome::skipped(filename),
            Ok(false) => {}
            Err(e) => return IngestOutcome::error(filename, e),
        }
    }

    match embed_volume(config, store, embedder, path).await {
        Ok((chunks, pages)) => IngestOutcome {
            filename,
            status: IngestStatus::Success,
            chunks,
            pages,
            detail: None,
        },
        Err(e) => IngestOutcome::error(filename, e),
    }
}

/// Load, chunk, embed, upsert, then record in the registry, in that
/// order. The registry write commits last, so a partially indexed volume
/// is never marked embedded.
async fn embed_volume(
    config: &Config,
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingProvider,
    path: &Path,
) -> Result<(usize, usize)> {
    let doc = loader::load_document(path)?;
    let pages = doc.pages.len();

    let chunks = chunker::split_document(
        &doc,
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
    )?;

    let mut vectors = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(config.ollama.batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        vectors.extend(embedder.embed_batch(&texts).await?);
    }

    store.upsert(&chunks, &vectors).await?;

    registry::mark_embedded(
        &config.db.registry_path,
        &doc.filename,
        chunks.len(),
        pages,
        path,
    )?;

    Ok((chunks.len(), pages))
}

/// Ingest every supported file in a directory, in sorted filename order.
///
/// Files are independent: an error in one is reported and the batch
/// continues with the next.
pub async fn ingest_directory(
    config: &Config,
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingProvider,
    dir: &Path,
    force: bool,
) -> Result<Vec<IngestOutcome>> {
    let files = loader::list_library_files(dir)?;

    if files.is_empty() {
        println!("No files found in {}", dir.display());
        return Ok(Vec::new());
    }

    println!("Found {} files to process", files.len());

    let mut outcomes = Vec::with_capacity(files.len());
    for path in &files {
        let outcome = ingest_file(config, store, embedder, path, force).await;
        match outcome.status {
            IngestStatus::Success => {
                println!("✓ {}: {} chunks", outcome.filename, outcome.chunks);
            }
            IngestStatus::Skipped => {
                println!("○ {}: skipped (already processed)", outcome.filename);
            }
            IngestStatus::Error => {
                println!(
                    "✗ {}: error - {}",
                    outcome.filename,
                    outcome.detail.as_deref().unwrap_or("unknown")
                );
            }
        }
        outcomes.push(outcome);
    }

    Ok(outcomes)
}

/// Clear the registry and re-embed every file in the library directory.
///
/// The index itself is not dropped; stable chunk ids make the re-embed an
/// in-place overwrite.
pub async fn clear_and_reingest(
    config: &Config,
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingProvider,
    dir: &Path,
) -> Result<Vec<IngestOutcome>> {
    registry::clear_registry(&config.db.registry_path)?;
    ingest_directory(config, store, embedder, dir, true).await
}

/// Print registry entry count, indexed chunk total, and per-volume lines.
pub async fn print_status(config: &Config, store: &dyn VectorStore) -> Result<()> {
    let reg = registry::load_registry(&config.db.registry_path)?;
    let chunk_count = store.count().await?;

    println!("Ingestion status");
    println!("  volumes processed: {}", reg.len());
    println!("  chunks indexed:    {}", chunk_count);

    if reg.is_empty() {
        println!("  no files processed yet");
    } else {
        for (name, entry) in &reg {
            println!(
                "  - {}: {} chunks, {} pages",
                name, entry.chunks, entry.pages
            );
        }
    }

    Ok(())
}
