use crate::error::IngestError;
use crate::models::{DocumentChunk, IngestionOptions, LoadedUnit};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;

/// Paragraph, line, word, then hard character cuts.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl ChunkingConfig {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self, IngestError> {
        let config = Self {
            max_chars,
            overlap_chars,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "max_chars must be greater than zero".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than max {}",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

impl From<&IngestionOptions> for ChunkingConfig {
    fn from(value: &IngestionOptions) -> Self {
        Self {
            max_chars: value.chunk_max_chars,
            overlap_chars: value.chunk_overlap_chars,
        }
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Splits `text` into trimmed, non-blank spans of at most `max_chars`
/// characters, preferring the coarsest separator present in the text.
pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    split_recursive(text, &SEPARATORS, config)
        .into_iter()
        .map(|chunk| chunk.trim().to_string())
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

fn split_recursive(text: &str, separators: &[&str], config: ChunkingConfig) -> Vec<String> {
    let Some(position) = separators
        .iter()
        .position(|separator| separator.is_empty() || text.contains(separator))
    else {
        return vec![text.to_string()];
    };
    let separator = separators[position];
    let finer = &separators[position + 1..];

    let pieces: Vec<String> = if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split(separator)
            .filter(|piece| !piece.is_empty())
            .map(str::to_string)
            .collect()
    };

    let mut chunks = Vec::new();
    let mut pending: Vec<String> = Vec::new();

    for piece in pieces {
        if char_len(&piece) < config.max_chars {
            pending.push(piece);
            continue;
        }

        if !pending.is_empty() {
            chunks.extend(merge_pieces(&pending, separator, config));
            pending.clear();
        }

        if finer.is_empty() {
            chunks.push(piece);
        } else {
            chunks.extend(split_recursive(&piece, finer, config));
        }
    }

    if !pending.is_empty() {
        chunks.extend(merge_pieces(&pending, separator, config));
    }

    chunks
}

// Greedy merge; the tail of each emitted chunk (up to `overlap_chars`) seeds the next.
fn merge_pieces(pieces: &[String], separator: &str, config: ChunkingConfig) -> Vec<String> {
    let separator_len = char_len(separator);
    let mut merged = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let len = char_len(piece);
        let joiner = |window: &VecDeque<&str>| if window.is_empty() { 0 } else { separator_len };

        if !window.is_empty() && total + len + joiner(&window) > config.max_chars {
            push_joined(&mut merged, &window, separator);

            while total > config.overlap_chars
                || (total > 0 && total + len + joiner(&window) > config.max_chars)
            {
                let Some(front) = window.pop_front() else {
                    break;
                };
                total = total.saturating_sub(char_len(front) + joiner(&window));
            }
        }

        total += len + joiner(&window);
        window.push_back(piece);
    }

    push_joined(&mut merged, &window, separator);
    merged
}

fn push_joined(target: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        target.push(trimmed.to_string());
    }
}

/// Chunks every unit; each chunk inherits the path and page of its unit.
pub fn split_units(
    units: &[LoadedUnit],
    config: ChunkingConfig,
) -> Result<Vec<DocumentChunk>, IngestError> {
    config.validate()?;

    let mut chunks = Vec::new();
    for unit in units {
        for (index, text) in split_text(&unit.text, config).into_iter().enumerate() {
            let chunk_index = index as u64;
            chunks.push(DocumentChunk {
                chunk_id: make_chunk_id(&unit.meta.source_path, unit.meta.page, chunk_index, &text),
                text,
                source_path: unit.meta.source_path.clone(),
                page: unit.meta.page,
                chunk_index,
            });
        }
    }

    Ok(chunks)
}

fn make_chunk_id(source_path: &str, page: Option<u32>, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_path.as_bytes());
    hasher.update(page.unwrap_or(0).to_le_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
