//! Integration tests for the ingestion pipeline and retriever, run
//! against the in-memory store and a deterministic fake embedder.

use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use anyhow::Result;
use async_trait::async_trait;

use shiori::config::Config;
use shiori::embedding::EmbeddingProvider;
use shiori::ingest::{self, IngestStatus};
use shiori::loader;
use shiori::registry;
use shiori::retriever::{Retriever, SearchMode, NO_CONTEXT_SENTINEL};
use shiori::store::memory::MemoryStore;
use shiori::store::VectorStore;

/// Keyword-axis embedder: one dimension per keyword, counting occurrences.
/// Texts sharing keywords get similar vectors; fully deterministic.
struct KeywordEmbedder;

const KEYWORDS: [&str; 6] = ["protagonist", "journey", "dragon", "capital", "sword", "village"];

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test-embedder"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                KEYWORDS
                    .iter()
                    .map(|kw| lower.matches(kw).count() as f32)
                    // Bias dimension so no vector is all-zero.
                    .chain(std::iter::once(0.1))
                    .collect()
            })
            .collect())
    }
}

fn setup() -> (TempDir, Config) {
    let tmp = TempDir::new().unwrap();
    let config = Config::minimal(tmp.path());
    std::fs::create_dir_all(&config.library.docs_dir).unwrap();
    (tmp, config)
}

fn write_volume(config: &Config, name: &str, body: &str) -> std::path::PathBuf {
    let path = config.library.docs_dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

const VOL1: &str = "The protagonist left the village at dawn. Her journey began on the \
north road, sword at her side.\n\nBy nightfall she reached the walls of the capital, where \
the story truly starts.";

const VOL2: &str = "Deep in the mountains a dragon stirred. The dragon had slept for a \
hundred years beneath the stone.\n\nIts waking shook the village far below.";

#[tokio::test]
async fn test_ingest_file_success_updates_registry_and_index() {
    let (_tmp, config) = setup();
    let store = MemoryStore::new();
    let embedder = KeywordEmbedder;

    let path = write_volume(&config, "vol1.txt", VOL1);
    let outcome = ingest::ingest_file(&config, &store, &embedder, &path, false).await;

    assert_eq!(outcome.status, IngestStatus::Success);
    assert!(outcome.chunks > 0);
    assert_eq!(outcome.pages, 1);

    let reg = registry::load_registry(&config.db.registry_path).unwrap();
    let entry = &reg["vol1.txt"];
    assert!(entry.is_embedded());
    assert_eq!(entry.chunks, outcome.chunks);
    assert_eq!(entry.pages, 1);

    assert_eq!(store.count().await.unwrap(), outcome.chunks as i64);
}

#[tokio::test]
async fn test_second_ingest_is_skipped_and_count_unchanged() {
    let (_tmp, config) = setup();
    let store = MemoryStore::new();
    let embedder = KeywordEmbedder;

    let path = write_volume(&config, "vol1.txt", VOL1);
    let first = ingest::ingest_file(&config, &store, &embedder, &path, false).await;
    assert_eq!(first.status, IngestStatus::Success);
    let count_after_first = store.count().await.unwrap();

    let second = ingest::ingest_file(&config, &store, &embedder, &path, false).await;
    assert_eq!(second.status, IngestStatus::Skipped);
    assert_eq!(store.count().await.unwrap(), count_after_first);
}

#[tokio::test]
async fn test_force_reingest_overwrites_instead_of_duplicating() {
    let (_tmp, config) = setup();
    let store = MemoryStore::new();
    let embedder = KeywordEmbedder;

    let path = write_volume(&config, "vol1.txt", VOL1);
    ingest::ingest_file(&config, &store, &embedder, &path, false).await;
    let count = store.count().await.unwrap();

    let forced = ingest::ingest_file(&config, &store, &embedder, &path, true).await;
    assert_eq!(forced.status, IngestStatus::Success);
    assert_eq!(store.count().await.unwrap(), count);
}

#[tokio::test]
async fn test_unsupported_file_fails_without_registry_entry() {
    let (_tmp, config) = setup();
    let store = MemoryStore::new();
    let embedder = KeywordEmbedder;

    let path = write_volume(&config, "notes.docx", "not supported");
    let outcome = ingest::ingest_file(&config, &store, &embedder, &path, false).await;

    assert_eq!(outcome.status, IngestStatus::Error);
    assert!(outcome.detail.unwrap().contains("Unsupported file type"));
    assert!(registry::load_registry(&config.db.registry_path)
        .unwrap()
        .is_empty());
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_directory_ingest_continues_past_bad_file() {
    let (_tmp, config) = setup();
    let store = MemoryStore::new();
    let embedder = KeywordEmbedder;

    write_volume(&config, "a_vol1.txt", VOL1);
    write_volume(&config, "b_bad.pdf", "this is not a real pdf");
    write_volume(&config, "c_vol2.txt", VOL2);

    let outcomes =
        ingest::ingest_directory(&config, &store, &embedder, &config.library.docs_dir, false)
            .await
            .unwrap();

    // Sorted filename order, independent outcomes.
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].filename, "a_vol1.txt");
    assert_eq!(outcomes[0].status, IngestStatus::Success);
    assert_eq!(outcomes[1].filename, "b_bad.pdf");
    assert_eq!(outcomes[1].status, IngestStatus::Error);
    assert_eq!(outcomes[2].filename, "c_vol2.txt");
    assert_eq!(outcomes[2].status, IngestStatus::Success);

    let reg = registry::load_registry(&config.db.registry_path).unwrap();
    assert_eq!(reg.len(), 2);
    assert!(!reg.contains_key("b_bad.pdf"));
}

#[tokio::test]
async fn test_clear_and_reingest_rebuilds_registry() {
    let (_tmp, config) = setup();
    let store = MemoryStore::new();
    let embedder = KeywordEmbedder;

    write_volume(&config, "vol1.txt", VOL1);
    write_volume(&config, "vol2.txt", VOL2);

    ingest::ingest_directory(&config, &store, &embedder, &config.library.docs_dir, false)
        .await
        .unwrap();
    let count = store.count().await.unwrap();

    let outcomes =
        ingest::clear_and_reingest(&config, &store, &embedder, &config.library.docs_dir)
            .await
            .unwrap();

    assert!(outcomes.iter().all(|o| o.status == IngestStatus::Success));
    let reg = registry::load_registry(&config.db.registry_path).unwrap();
    assert_eq!(reg.len(), 2);
    // Stable chunk ids: the re-embed overwrote, never duplicated.
    assert_eq!(store.count().await.unwrap(), count);
}

#[tokio::test]
async fn test_empty_index_yields_sentinel_context() {
    let (_tmp, config) = setup();
    let store: Arc<dyn VectorStore> = Arc::new(MemoryStore::new());
    let retriever = Retriever::new(store, Arc::new(KeywordEmbedder), config.retrieval.clone());

    let block = retriever.retrieve_with_context("anything at all", 5).await.unwrap();
    assert_eq!(block, NO_CONTEXT_SENTINEL);
    assert!(!block.is_empty());
}

#[tokio::test]
async fn test_retrieval_finds_relevant_volume() {
    let (_tmp, config) = setup();
    let store = Arc::new(MemoryStore::new());
    let embedder = KeywordEmbedder;

    let p1 = write_volume(&config, "vol1.txt", VOL1);
    let p2 = write_volume(&config, "vol2.txt", VOL2);
    ingest::ingest_file(&config, store.as_ref(), &embedder, &p1, false).await;
    ingest::ingest_file(&config, store.as_ref(), &embedder, &p2, false).await;

    let retriever = Retriever::new(
        store,
        Arc::new(KeywordEmbedder),
        config.retrieval.clone(),
    );

    let results = retriever
        .retrieve("the dragon in the mountains", 1, SearchMode::Similarity)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.source_file, "vol2.txt");

    let block = retriever
        .retrieve_with_context("the dragon in the mountains", 1)
        .await
        .unwrap();
    assert!(block.contains("[Source 1: vol2.txt, Page 1]"));
}

#[tokio::test]
async fn test_volume_scoped_retrieval() {
    let (_tmp, config) = setup();
    let store = Arc::new(MemoryStore::new());
    let embedder = KeywordEmbedder;

    let p1 = write_volume(&config, "vol1.txt", VOL1);
    let p2 = write_volume(&config, "vol2.txt", VOL2);
    ingest::ingest_file(&config, store.as_ref(), &embedder, &p1, false).await;
    ingest::ingest_file(&config, store.as_ref(), &embedder, &p2, false).await;

    let retriever = Retriever::new(
        store,
        Arc::new(KeywordEmbedder),
        config.retrieval.clone(),
    );

    // "village" appears in both volumes; scoping restricts the candidates.
    let results = retriever
        .retrieve_by_volume("the village", "vol1.txt", 5)
        .await
        .unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.chunk.source_file == "vol1.txt"));
}

/// Minimal valid PDF containing `phrase`, with byte offsets computed so
/// pdf-extract can parse it.
fn minimal_pdf_with_phrase(phrase: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET\n", phrase);

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!("4 0 obj << /Length {} >> stream\n{}endstream endobj\n", content.len(), content)
            .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

#[test]
fn test_pdf_loader_extracts_text() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("vol1.pdf");
    std::fs::write(&path, minimal_pdf_with_phrase("a quiet village evening")).unwrap();

    let doc = loader::load_document(&path).unwrap();
    assert_eq!(doc.filename, "vol1.pdf");
    assert!(!doc.pages.is_empty());
    let joined = doc.pages.join("\n");
    assert!(joined.contains("quiet village"), "got: {}", joined);
}

#[test]
fn test_invalid_pdf_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("broken.pdf");
    std::fs::write(&path, b"not a pdf at all").unwrap();
    assert!(loader::load_document(&path).is_err());
}

#[test]
fn test_registry_three_page_entry_shape() {
    let tmp = TempDir::new().unwrap();
    let reg_path = tmp.path().join("registry.json");

    registry::mark_embedded(&reg_path, "vol1.pdf", 42, 3, Path::new("/lib/vol1.pdf")).unwrap();

    let reg = registry::load_registry(&reg_path).unwrap();
    let entry = &reg["vol1.pdf"];
    assert!(entry.chunks > 0);
    assert_eq!(entry.pages, 3);
}
