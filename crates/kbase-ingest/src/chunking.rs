//! Text chunking.
//!
//! Recursive character splitting: try separators from coarse to fine
//! (paragraph, line, CJK/Latin sentence ends, space, character), re-split
//! only the pieces that are still too long, then greedily merge small pieces
//! back up to the chunk size with a trailing overlap.
//!
//! Markdown is first cut into header-scoped sections (levels 1-3) so that
//! text under different headers never lands in the same chunk.

use std::collections::VecDeque;

use tracing::warn;

use kbase_core::{Error, Result};

/// Target chunk size in characters.
pub const CHUNK_SIZE: usize = 1000;
/// Characters carried over from the end of one chunk into the next.
pub const CHUNK_OVERLAP: usize = 100;

/// Separators in precedence order. `""` means "between any two characters".
pub const SEPARATORS: &[&str] = &["\n\n", "\n", "。", "！", "？", ".", " ", ""];

/// Header markers, longest first so `##` is not read as `#`.
const MARKDOWN_HEADERS: &[&str] = &["###", "##", "#"];

/// Joins consecutive paragraphs that share a header path.
const PARAGRAPH_JOIN: &str = "  \n";

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Recursive splitter that respects document structure.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    separators: Vec<&'static str>,
}

impl RecursiveChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: SEPARATORS.to_vec(),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_text(text, &self.separators)
    }

    fn split_text(&self, text: &str, separators: &[&'static str]) -> Vec<String> {
        let (separator, remaining) = pick_separator(text, separators);
        let splits = split_keeping_separator(text, separator);

        let mut chunks = Vec::new();
        let mut good_splits: Vec<&str> = Vec::new();

        for piece in splits {
            if char_len(piece) < self.chunk_size {
                good_splits.push(piece);
                continue;
            }

            if !good_splits.is_empty() {
                chunks.extend(self.merge_splits(&good_splits));
                good_splits.clear();
            }

            if remaining.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_text(piece, remaining));
            }
        }

        if !good_splits.is_empty() {
            chunks.extend(self.merge_splits(&good_splits));
        }

        chunks
    }

    /// Greedily pack pieces into chunks of at most `chunk_size` characters.
    /// After each emitted chunk, the window keeps at most `chunk_overlap`
    /// characters of trailing pieces to seed the next one.
    fn merge_splits(&self, splits: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);

            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total, self.chunk_size
                    );
                }
                if !window.is_empty() {
                    if let Some(doc) = join_pieces(&window) {
                        docs.push(doc);
                    }
                    while total > self.chunk_overlap
                        || (total + len > self.chunk_size && total > 0)
                    {
                        match window.pop_front() {
                            Some(first) => total -= char_len(first),
                            None => break,
                        }
                    }
                }
            }

            window.push_back(piece);
            total += len;
        }

        if let Some(doc) = join_pieces(&window) {
            docs.push(doc);
        }

        docs
    }
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self::new(CHUNK_SIZE, CHUNK_OVERLAP)
    }
}

/// First separator present in `text`, plus the finer separators after it.
fn pick_separator<'a>(
    text: &str,
    separators: &'a [&'static str],
) -> (&'static str, &'a [&'static str]) {
    for (i, &separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return (separator, &[]);
        }
        if text.contains(separator) {
            return (separator, &separators[i + 1..]);
        }
    }
    (separators.last().copied().unwrap_or(""), &[])
}

/// Split on `separator`, keeping it at the end of the piece it terminates.
fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    text.split_inclusive(separator)
        .filter(|piece| !piece.is_empty())
        .collect()
}

fn join_pieces(pieces: &VecDeque<&str>) -> Option<String> {
    let joined: String = pieces.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// A run of markdown text under one header path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownSection {
    pub content: String,
    /// `(level, title)` for each enclosing header, outermost first.
    pub headers: Vec<(usize, String)>,
}

/// `Some((level, title))` when the trimmed line is a level 1-3 header.
fn parse_header(line: &str) -> Option<(usize, String)> {
    MARKDOWN_HEADERS.iter().find_map(|marker| {
        let rest = line.strip_prefix(marker)?;
        if rest.is_empty() || rest.starts_with(' ') {
            Some((marker.len(), rest.trim().to_string()))
        } else {
            None
        }
    })
}

/// Invisible format characters (BOM, zero-width, bidi controls, soft hyphen)
/// and private-use code points.
fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{061C}'
            | '\u{180E}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{206F}'
            | '\u{FEFF}'
            | '\u{FFF9}'..='\u{FFFB}'
            | '\u{E000}'..='\u{F8FF}'
            | '\u{E0001}'
            | '\u{E0020}'..='\u{E007F}'
            | '\u{F0000}'..='\u{10FFFF}'
    )
}

fn is_printable(c: char) -> bool {
    c == ' ' || !(c.is_control() || c.is_whitespace() || is_invisible(c))
}

/// Cut markdown into header-scoped sections.
///
/// Header lines are dropped from content. Blank lines end a paragraph and
/// consecutive paragraphs with the same header path are joined back together.
/// Fenced code blocks are copied through without header detection.
pub fn split_markdown_sections(text: &str) -> Vec<MarkdownSection> {
    let mut paragraphs: Vec<MarkdownSection> = Vec::new();
    let mut header_stack: Vec<(usize, String)> = Vec::new();
    let mut current_headers: Vec<(usize, String)> = Vec::new();
    let mut current_lines: Vec<String> = Vec::new();
    let mut fence: Option<&str> = None;

    let mut flush = |lines: &mut Vec<String>, headers: &[(usize, String)]| {
        if !lines.is_empty() {
            paragraphs.push(MarkdownSection {
                content: lines.join("\n"),
                headers: headers.to_vec(),
            });
            lines.clear();
        }
    };

    for line in text.split('\n') {
        let stripped: String = line.trim().chars().filter(|&c| is_printable(c)).collect();

        match fence {
            None => {
                if stripped.starts_with("```") && stripped.matches("```").count() == 1 {
                    fence = Some("```");
                } else if stripped.starts_with("~~~") {
                    fence = Some("~~~");
                }
            }
            Some(marker) => {
                if stripped.starts_with(marker) {
                    fence = None;
                }
            }
        }

        if fence.is_some() {
            current_lines.push(stripped);
            continue;
        }

        if let Some((level, title)) = parse_header(&stripped) {
            header_stack.retain(|(l, _)| *l < level);
            header_stack.push((level, title));
            flush(&mut current_lines, &current_headers);
        } else if !stripped.is_empty() {
            current_lines.push(stripped);
        } else {
            flush(&mut current_lines, &current_headers);
        }

        current_headers = header_stack.clone();
    }
    flush(&mut current_lines, &current_headers);

    let mut sections: Vec<MarkdownSection> = Vec::new();
    for paragraph in paragraphs {
        match sections.last_mut() {
            Some(last) if last.headers == paragraph.headers => {
                last.content.push_str(PARAGRAPH_JOIN);
                last.content.push_str(&paragraph.content);
            }
            _ => sections.push(paragraph),
        }
    }
    sections
}

/// Chunker used by the ingestion pipeline.
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    splitter: RecursiveChunker,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            splitter: RecursiveChunker::new(chunk_size, chunk_overlap),
        }
    }

    /// Split text into ordered chunk strings.
    pub fn chunk(&self, text: &str, is_markdown: bool) -> Result<Vec<String>> {
        if text.trim().is_empty() {
            return Err(Error::Chunking("Cannot chunk empty text".into()));
        }

        if !is_markdown {
            return Ok(self.splitter.split(text));
        }

        Ok(split_markdown_sections(text)
            .iter()
            .flat_map(|section| self.splitter.split(&section.content))
            .collect())
    }
}
