//! Splits generated text into ordered display units no longer than a char limit.
//!
//! Sentence mode keeps each delimiter attached to the sentence it ends and never cuts inside a
//! sentence: a sentence longer than the limit becomes its own oversized unit. Whitespace between
//! two sentences of the same unit is kept as written; only unit edges are trimmed. Line mode does
//! the same with newline-separated lines and rejoins them with `\n`.

use crate::config::ChunkMode;

/// Chunking parameters, usually taken from the delivery config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOptions {
    pub mode: ChunkMode,
    pub delimiter: String,
    pub max_unit_chars: usize,
}

impl ChunkOptions {
    pub fn from_config(delivery: &crate::config::DeliveryConfig) -> Self {
        Self {
            mode: delivery.chunk_mode,
            delimiter: delivery.sentence_delimiter.clone(),
            max_unit_chars: delivery.max_unit_chars,
        }
    }
}

/// Chunk `text` according to `options`.
pub fn chunk_text(text: &str, options: &ChunkOptions) -> Vec<String> {
    match options.mode {
        ChunkMode::Sentence => chunk_sentences(text, &options.delimiter, options.max_unit_chars),
        ChunkMode::Line => chunk_lines(text, options.max_unit_chars),
    }
}

/// Sentence mode. A sentence that is only whitespace plus its delimiter is dropped. An empty
/// delimiter treats the whole text as one sentence.
pub fn chunk_sentences(text: &str, delimiter: &str, max_unit_chars: usize) -> Vec<String> {
    if delimiter.is_empty() {
        return pack(std::iter::once(("", text.trim())), max_unit_chars);
    }
    let sentences = text
        .split_inclusive(delimiter)
        .map(|piece| {
            let body = piece.trim_start();
            // whitespace before a sentence joins it to the previous one
            (&piece[..piece.len() - body.len()], body.trim_end())
        })
        .filter(|(_, s)| !s.strip_suffix(delimiter).unwrap_or(*s).trim().is_empty());
    pack(sentences, max_unit_chars)
}

/// Line mode: blank lines dropped, lines inside a unit joined by `\n`.
pub fn chunk_lines(text: &str, max_unit_chars: usize) -> Vec<String> {
    pack(text.lines().map(|l| ("\n", l.trim_end())), max_unit_chars)
}

/// Greedy packing of `(separator, piece)` pairs. The separator only counts, and is only
/// written, when the piece joins a non-empty unit.
fn pack<'a>(
    pieces: impl Iterator<Item = (&'a str, &'a str)>,
    max_unit_chars: usize,
) -> Vec<String> {
    let mut units = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for (separator, piece) in pieces {
        if piece.trim().is_empty() {
            continue;
        }
        let len = piece.chars().count();
        let separator_len = separator.chars().count();
        if current.is_empty() {
            current.push_str(piece);
            current_len = len;
        } else if current_len + separator_len + len > max_unit_chars {
            units.push(std::mem::take(&mut current));
            current.push_str(piece);
            current_len = len;
        } else {
            current.push_str(separator);
            current.push_str(piece);
            current_len += separator_len + len;
        }
    }
    if !current.is_empty() {
        units.push(current);
    }
    units
}
