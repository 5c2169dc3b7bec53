//! Context-window-aware text chunking
//!
//! Splits arbitrary text into size-bounded, context-preserving chunks by
//! trying separators in priority order: paragraph breaks first, then lines,
//! sentences, clauses, words, and finally individual characters. The
//! empty-string separator guarantees termination because single characters
//! are always smaller than a positive chunk size.
//!
//! Separators stay attached to the piece they terminate, so chunks are
//! contiguous slices of the input and offsets are exact.

use crate::error::DelverResult;
use crate::tokens::TokenEstimator;
use crate::validation_error;

/// Separator priority used when none is supplied explicitly
pub const DEFAULT_SEPARATORS: [&str; 6] = ["\n\n", "\n", ". ", ", ", " ", ""];

/// Rough character-per-token ratio used when converting a token budget into
/// a character budget for trimming
const CHARS_PER_TOKEN: usize = 3;

/// Never trim below this many characters; tiny fragments are useless as
/// prompt context
const MIN_TRIM_CHARS: usize = 140;

/// A bounded-size slice of text with its position in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Offset of the chunk's first character in the source text, in chars
    pub start_offset: usize,
}

/// Recursive, boundary-aware text splitter
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextChunker {
    /// Create a chunker with the default separator priority
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> DelverResult<Self> {
        Self::with_separators(
            chunk_size,
            chunk_overlap,
            DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Create a chunker with a custom separator priority
    pub fn with_separators(
        chunk_size: usize,
        chunk_overlap: usize,
        separators: Vec<String>,
    ) -> DelverResult<Self> {
        if chunk_size == 0 {
            return Err(validation_error!(
                "Chunk size must be greater than 0",
                "chunk_size",
                "chunker"
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(validation_error!(
                "Chunk overlap must be smaller than the chunk size",
                "chunk_overlap",
                "chunker"
            ));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split text into ordered chunks of at most `chunk_size` characters
    ///
    /// Consecutive chunks share up to `chunk_overlap` characters of trailing
    /// context. The only chunks that can exceed `chunk_size` are atomic
    /// pieces that no remaining separator can divide.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        if !text.is_empty() {
            self.split_level(text, 0, &self.separators, &mut chunks);
        }
        chunks
    }

    /// Trim text so that its estimated token count fits within `token_budget`
    ///
    /// Overflow is converted into a character budget and the leading chunk of
    /// a zero-overlap split is kept, repeating until the estimate fits. Used
    /// to guarantee a generated prompt never exceeds a downstream service's
    /// input limit.
    pub fn trim_to_fit(
        &self,
        text: &str,
        token_budget: usize,
        estimator: &TokenEstimator,
    ) -> String {
        let mut current = text.to_string();
        loop {
            let tokens = estimator.count(&current);
            if tokens <= token_budget {
                return current;
            }
            let char_len = current.chars().count();
            if char_len <= MIN_TRIM_CHARS {
                // Cannot shrink any further without destroying the context
                return current;
            }

            let overflow = tokens - token_budget;
            let target = char_len
                .saturating_sub(overflow * CHARS_PER_TOKEN)
                .clamp(MIN_TRIM_CHARS, char_len - 1);

            let trimmer = Self {
                chunk_size: target,
                chunk_overlap: 0,
                separators: self.separators.clone(),
            };
            let leading = trimmer
                .split(&current)
                .into_iter()
                .next()
                .map(|chunk| chunk.text)
                .unwrap_or_default();

            // A boundary-respecting cut is preferred, but fall back to a hard
            // cut when the first chunk did not actually shrink the text
            current = if leading.is_empty() || leading.chars().count() >= char_len {
                current.chars().take(target).collect()
            } else {
                leading
            };
        }
    }

    /// Split one level of the separator hierarchy
    ///
    /// `base_offset` is the char offset of `text` within the original input.
    fn split_level(
        &self,
        text: &str,
        base_offset: usize,
        separators: &[String],
        out: &mut Vec<Chunk>,
    ) {
        // Pick the first separator present in the text; the empty separator
        // always matches. If nothing matches, the text is atomic.
        let Some(position) = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep.as_str()))
        else {
            out.push(Chunk {
                text: text.to_string(),
                start_offset: base_offset,
            });
            return;
        };
        let separator = &separators[position];
        let finer = &separators[position + 1..];

        let pieces = split_keeping_separator(text, separator);

        // Accumulate small pieces; flush when the next piece would overflow,
        // then seed the following group with tail pieces that fit within the
        // configured overlap.
        let mut pending: Vec<(usize, &str)> = Vec::new();
        let mut pending_len = 0usize;

        for (offset, piece) in pieces {
            let piece_len = piece.chars().count();

            if piece_len >= self.chunk_size {
                // Oversized piece: flush whatever is pending, then re-split
                // the piece with the remaining, finer separators.
                if !pending.is_empty() {
                    emit(&pending, base_offset, out);
                    pending.clear();
                    pending_len = 0;
                }
                self.split_level(piece, base_offset + offset, finer, out);
                continue;
            }

            if !pending.is_empty() && pending_len + piece_len > self.chunk_size {
                emit(&pending, base_offset, out);

                // Retain tail pieces while their combined length stays within
                // the overlap; they become the start of the next group.
                let mut kept = Vec::new();
                let mut kept_len = 0usize;
                for &(tail_offset, tail_piece) in pending.iter().rev() {
                    let tail_len = tail_piece.chars().count();
                    if kept_len + tail_len > self.chunk_overlap {
                        break;
                    }
                    kept.push((tail_offset, tail_piece));
                    kept_len += tail_len;
                }
                kept.reverse();
                pending = kept;
                pending_len = kept_len;

                // The overlap yields when it would push the group past the
                // size bound: drop carried pieces from the front until the
                // incoming piece fits.
                while !pending.is_empty() && pending_len + piece_len > self.chunk_size {
                    let (_, dropped) = pending.remove(0);
                    pending_len -= dropped.chars().count();
                }
            }

            pending.push((offset, piece));
            pending_len += piece_len;
        }

        if !pending.is_empty() {
            emit(&pending, base_offset, out);
        }
    }
}

/// Merge a run of contiguous pieces into a single chunk
fn emit(pieces: &[(usize, &str)], base_offset: usize, out: &mut Vec<Chunk>) {
    let text: String = pieces.iter().map(|(_, piece)| *piece).collect();
    out.push(Chunk {
        text,
        start_offset: base_offset + pieces[0].0,
    });
}

/// Split text on a separator, keeping the separator attached to the piece it
/// terminates. Offsets are char positions relative to `text`. An empty
/// separator splits into individual characters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<(usize, &'a str)> {
    let mut pieces = Vec::new();

    if separator.is_empty() {
        for (char_pos, (byte_pos, ch)) in text.char_indices().enumerate() {
            pieces.push((char_pos, &text[byte_pos..byte_pos + ch.len_utf8()]));
        }
        return pieces;
    }

    let mut start = 0usize;
    let mut char_pos = 0usize;
    for (match_start, _) in text.match_indices(separator) {
        if match_start < start {
            // Overlapping occurrence inside an already-consumed piece
            continue;
        }
        let end = match_start + separator.len();
        let piece = &text[start..end];
        pieces.push((char_pos, piece));
        char_pos += piece.chars().count();
        start = end;
    }
    if start < text.len() {
        pieces.push((char_pos, &text[start..]));
    }
    pieces
}
