//! Overlapping text chunker for source volumes.
//!
//! Splits document text into chunks of at most `chunk_size` characters,
//! where each chunk after the first repeats the trailing `chunk_overlap`
//! characters of its predecessor. Text is first divided into pieces on a
//! separator ladder, coarsest first (paragraph break, line break, sentence
//! end, space, hard cut); a piece that exceeds the size limit is re-split
//! at the next finer level. Pieces are then packed into chunks up to
//! `chunk_size`, so chunk boundaries always fall on piece boundaries.
//!
//! Splitting is a pure function of the input and configuration: the same
//! text always produces the same chunks, ids, and indices.

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};

use crate::models::{Chunk, Document};

/// Separator ladder, coarsest first. Separators stay attached to the
/// piece they terminate, so concatenating pieces reproduces the input.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Split text into overlapping pieces of at most `chunk_size` characters.
///
/// # Guarantees
///
/// - Each piece is at most `chunk_size` bytes (modulo a multi-byte
///   character straddling a hard cut).
/// - Each piece after the first begins with exactly the trailing
///   `chunk_overlap` bytes of its predecessor.
/// - Concatenating the first piece with every later piece's
///   post-overlap remainder reconstructs the input.
///
/// # Errors
///
/// `chunk_size == 0` or `chunk_overlap >= chunk_size` is a configuration
/// error and fails immediately.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
    let spans = split_spans(text, chunk_size, chunk_overlap)?;
    Ok(spans
        .into_iter()
        .map(|(start, end)| text[start..end].to_string())
        .collect())
}

/// Core splitting routine returning byte ranges into `text`.
fn split_spans(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<(usize, usize)>> {
    if chunk_size == 0 {
        bail!("chunk_size must be > 0");
    }
    if chunk_overlap >= chunk_size {
        bail!(
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            chunk_overlap,
            chunk_size
        );
    }

    if text.len() <= chunk_size {
        return Ok(vec![(0, text.len())]);
    }

    // A piece must leave room for the overlap prefix repeated from the
    // previous chunk, or packing could overflow chunk_size.
    let max_piece = chunk_size - chunk_overlap;
    let mut boundaries = Vec::new();
    collect_pieces(text, 0, 0, max_piece, &mut boundaries);

    // Pack pieces greedily: flush when absorbing the next piece would push
    // the chunk past chunk_size, then start the next chunk chunk_overlap
    // characters before the flush point.
    let mut spans = Vec::new();
    let mut chunk_start = 0usize;
    let mut core_start = 0usize;
    let mut prev_end = 0usize;

    for &b in &boundaries {
        if b - chunk_start > chunk_size && prev_end > core_start {
            spans.push((chunk_start, prev_end));
            chunk_start = floor_char_boundary(text, prev_end - chunk_overlap);
            core_start = prev_end;
        }
        prev_end = b;
    }
    spans.push((chunk_start, text.len()));

    Ok(spans)
}

/// Recursively divide `text` into pieces of at most `max_piece` bytes,
/// pushing each piece's absolute end offset onto `out`.
///
/// Tries the separator at `level` first; pieces still over the limit are
/// re-split at the next finer level, ending with a hard character cut.
fn collect_pieces(text: &str, base: usize, level: usize, max_piece: usize, out: &mut Vec<usize>) {
    if text.len() <= max_piece {
        out.push(base + text.len());
        return;
    }

    if level >= SEPARATORS.len() {
        // Hard cut at character boundaries.
        let mut start = 0usize;
        while text.len() - start > max_piece {
            let mut end = floor_char_boundary(text, start + max_piece);
            if end <= start {
                end = next_char_boundary(text, start + 1);
            }
            out.push(base + end);
            start = end;
        }
        out.push(base + text.len());
        return;
    }

    let sep = SEPARATORS[level];
    let mut start = 0usize;
    let mut found = false;

    while let Some(pos) = text[start..].find(sep) {
        let end = start + pos + sep.len();
        found = true;
        if end - start <= max_piece {
            out.push(base + end);
        } else {
            collect_pieces(&text[start..end], base + start, level + 1, max_piece, out);
        }
        start = end;
    }

    if !found {
        collect_pieces(text, base, level + 1, max_piece, out);
        return;
    }

    if start < text.len() {
        let tail = &text[start..];
        if tail.len() <= max_piece {
            out.push(base + text.len());
        } else {
            collect_pieces(tail, base + start, level + 1, max_piece, out);
        }
    }
}

/// Split a loaded document into chunks with page and index metadata.
///
/// Pages are joined with a blank line before splitting, so the overlap
/// invariant holds across the whole volume; each chunk carries the 1-based
/// page containing its first post-overlap character. Whitespace-only
/// documents produce no chunks.
pub fn split_document(
    doc: &Document,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Chunk>> {
    let mut full = String::new();
    let mut page_starts = Vec::with_capacity(doc.pages.len());
    for (i, page) in doc.pages.iter().enumerate() {
        if i > 0 {
            full.push_str("\n\n");
        }
        page_starts.push(full.len());
        full.push_str(page);
    }

    if full.trim().is_empty() {
        return Ok(Vec::new());
    }

    let spans = split_spans(&full, chunk_size, chunk_overlap)?;

    let chunks = spans
        .into_iter()
        .enumerate()
        .map(|(i, (start, end))| {
            // The overlap prefix repeats the previous chunk's tail; page
            // attribution follows the first new character.
            let content_start = if i == 0 {
                start
            } else {
                (start + chunk_overlap).min(end - 1)
            };
            Chunk {
                id: chunk_id(&doc.filename, i as i64),
                source_file: doc.filename.clone(),
                page: page_for_offset(&page_starts, content_start),
                chunk_index: i as i64,
                text: full[start..end].to_string(),
            }
        })
        .collect();

    Ok(chunks)
}

/// Stable chunk identifier: SHA-256 of `filename:chunk_index`.
///
/// Re-ingesting a volume reproduces the same ids, so index upserts
/// overwrite rather than duplicate.
pub fn chunk_id(filename: &str, chunk_index: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(filename.as_bytes());
    hasher.update(b":");
    hasher.update(chunk_index.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// 1-based page number of the page containing `offset`.
fn page_for_offset(page_starts: &[usize], offset: usize) -> i64 {
    let mut page = 1i64;
    for (i, &s) in page_starts.iter().enumerate() {
        if s <= offset {
            page = i as i64 + 1;
        } else {
            break;
        }
    }
    page
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Snap a byte index forward to the nearest valid UTF-8 char boundary.
fn next_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}
