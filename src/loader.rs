//! Volume loading for PDF and plain-text files.
//!
//! Returns a [`Document`] whose pages preserve the source's reading order:
//! PDF pages are split on the form feeds `pdf-extract` emits between pages;
//! text and markdown files load as a single section.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::models::{Document, FileType};

/// Load a volume using the loader appropriate for its extension.
///
/// Unknown extensions are an unsupported-input error; the caller fails that
/// file only, not the batch.
pub fn load_document(path: &Path) -> Result<Document> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => load_pdf(path, filename),
        "txt" | "md" => load_text(path, filename),
        other => bail!("Unsupported file type: .{}", other),
    }
}

fn load_pdf(path: &Path, filename: String) -> Result<Document> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .map_err(|e| anyhow::anyhow!("PDF extraction failed for {}: {}", filename, e))?;

    // pdf-extract separates pages with form feeds.
    let pages: Vec<String> = text
        .split('\u{c}')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    let pages = if pages.is_empty() {
        vec![text.trim().to_string()]
    } else {
        pages
    };

    Ok(Document {
        filename,
        file_type: FileType::Pdf,
        pages,
    })
}

fn load_text(path: &Path, filename: String) -> Result<Document> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(Document {
        filename,
        file_type: FileType::Text,
        pages: vec![body],
    })
}

/// True when `path` has an extension one of the loaders accepts.
pub fn is_supported(path: &Path) -> bool {
    matches!(
        path.extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .as_deref(),
        Some("pdf") | Some("txt") | Some("md")
    )
}

/// List supported files under `dir`, sorted by filename for deterministic
/// batch order.
pub fn list_library_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        bail!("Library directory does not exist: {}", dir.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).max_depth(1) {
        let entry = entry?;
        if entry.file_type().is_file() && is_supported(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_extension_rejected() {
        let err = load_document(Path::new("notes.docx")).unwrap_err();
        assert!(err.to_string().contains("Unsupported file type"));
    }

    #[test]
    fn test_load_text_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("vol1.txt");
        std::fs::write(&path, "Some volume text.").unwrap();

        let doc = load_document(&path).unwrap();
        assert_eq!(doc.filename, "vol1.txt");
        assert_eq!(doc.file_type, FileType::Text);
        assert_eq!(doc.pages, vec!["Some volume text.".to_string()]);
    }

    #[test]
    fn test_list_library_files_sorted_and_filtered() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("b.txt"), "b").unwrap();
        std::fs::write(tmp.path().join("a.md"), "a").unwrap();
        std::fs::write(tmp.path().join("c.docx"), "c").unwrap();

        let files = list_library_files(tmp.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.md", "b.txt"]);
    }

    #[test]
    fn test_missing_directory_errors() {
        assert!(list_library_files(Path::new("/no/such/dir")).is_err());
    }
}
