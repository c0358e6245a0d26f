use crate::models::DocumentChunk;
use std::collections::HashSet;
use std::path::Path;

pub const QUESTION_PREVIEW_CHARS: usize = 45;

/// `"file.pdf, page 3"` or just `"file.md"`.
pub fn source_label(chunk: &DocumentChunk) -> String {
    let name = Path::new(&chunk.source_path)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("unknown");

    match chunk.page {
        Some(page) => format!("{name}, page {page}"),
        None => name.to_string(),
    }
}

/// Labels for one turn's sources, first occurrence wins.
pub fn dedup_source_labels(sources: &[DocumentChunk]) -> Vec<String> {
    let mut seen = HashSet::new();
    sources
        .iter()
        .map(source_label)
        .filter(|label| seen.insert(label.clone()))
        .collect()
}

pub fn question_preview(text: &str, max_chars: usize) -> String {
    let flattened = text.trim().replace('\n', " ");
    if flattened.chars().count() <= max_chars {
        return flattened;
    }

    let head: String = flattened.chars().take(max_chars).collect();
    format!("{}…", head.trim_end())
}
