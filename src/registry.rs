//! Ingestion registry: the durable ledger of embedded volumes.
//!
//! A JSON object keyed by filename, read fully on every check and written
//! fully via atomic replace (write to a sibling temp file, then rename).
//! An entry with status `embedded` means the volume's chunks were written
//! to the index; this is an at-least-once guarantee, not a transaction.
//! A crash between index write and registry write under-reports, and the
//! next run re-embeds, which is safe because index upserts are keyed by stable
//! chunk ids.

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;

use crate::models::{RegistryEntry, STATUS_EMBEDDED};

pub type Registry = BTreeMap<String, RegistryEntry>;

/// Load the registry, treating a missing file as empty.
pub fn load_registry(path: &Path) -> Result<Registry> {
    if !path.exists() {
        return Ok(Registry::new());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read registry: {}", path.display()))?;

    let registry: Registry = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse registry: {}", path.display()))?;

    Ok(registry)
}

/// Write the registry atomically: serialize to a sibling temp file, then
/// rename over the target.
pub fn save_registry(path: &Path, registry: &Registry) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(registry)?;

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, content)
        .with_context(|| format!("Failed to write registry: {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to replace registry: {}", path.display()))?;

    Ok(())
}

/// True when `filename` is recorded as fully embedded.
pub fn is_embedded(path: &Path, filename: &str) -> Result<bool> {
    let registry = load_registry(path)?;
    Ok(registry.get(filename).is_some_and(|e| e.is_embedded()))
}

/// Record a successfully embedded volume. Read-modify-write of the whole
/// file, stamped with the current time.
pub fn mark_embedded(
    path: &Path,
    filename: &str,
    chunks: usize,
    pages: usize,
    file_path: &Path,
) -> Result<()> {
    let mut registry = load_registry(path)?;
    registry.insert(
        filename.to_string(),
        RegistryEntry {
            status: STATUS_EMBEDDED.to_string(),
            chunks,
            pages,
            last_updated: Utc::now(),
            file_path: file_path.to_path_buf(),
        },
    );
    save_registry(path, &registry)
}

/// Drop every entry, leaving an empty registry file behind.
pub fn clear_registry(path: &Path) -> Result<()> {
    save_registry(path, &Registry::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("registry.json");
        assert!(load_registry(&path).unwrap().is_empty());
        assert!(!is_embedded(&path, "vol1.pdf").unwrap());
    }

    #[test]
    fn test_mark_and_check() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("registry.json");

        mark_embedded(&path, "vol1.pdf", 42, 3, Path::new("/library/vol1.pdf")).unwrap();

        assert!(is_embedded(&path, "vol1.pdf").unwrap());
        assert!(!is_embedded(&path, "vol2.pdf").unwrap());

        let registry = load_registry(&path).unwrap();
        let entry = &registry["vol1.pdf"];
        assert_eq!(entry.chunks, 42);
        assert_eq!(entry.pages, 3);
        assert_eq!(entry.status, STATUS_EMBEDDED);
    }

    #[test]
    fn test_roundtrip_preserves_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("registry.json");

        mark_embedded(&path, "a.txt", 1, 1, Path::new("a.txt")).unwrap();
        mark_embedded(&path, "b.txt", 2, 1, Path::new("b.txt")).unwrap();

        let registry = load_registry(&path).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains_key("a.txt"));
        assert!(registry.contains_key("b.txt"));
    }

    #[test]
    fn test_clear() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("registry.json");

        mark_embedded(&path, "vol1.pdf", 5, 2, Path::new("vol1.pdf")).unwrap();
        clear_registry(&path).unwrap();

        assert!(load_registry(&path).unwrap().is_empty());
        // The file itself remains, holding an empty object.
        assert!(path.exists());
    }
}
