//! File text extraction for uploaded blobs.
//!
//! The declared MIME type wins when it is recognized; otherwise the storage
//! path's extension decides. Unknown types are read as UTF-8 text.

use lopdf::Document;
use tracing::{debug, warn};

use kbase_core::{Error, Result};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_MARKDOWN: &str = "text/markdown";
pub const MIME_MARKDOWN_X: &str = "text/x-markdown";

/// How a blob is turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Pdf,
    Markdown,
    PlainText,
}

impl FileType {
    /// Detect from the declared MIME type and the storage path.
    pub fn detect(declared_type: &str, storage_path: &str) -> Self {
        let declared = declared_type.trim().to_lowercase();
        let ext = extension(storage_path);

        if declared == MIME_PDF || ext.as_deref() == Some("pdf") {
            Self::Pdf
        } else if declared == MIME_MARKDOWN
            || declared == MIME_MARKDOWN_X
            || matches!(ext.as_deref(), Some("md" | "markdown"))
        {
            Self::Markdown
        } else {
            Self::PlainText
        }
    }
}

fn extension(path: &str) -> Option<String> {
    std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Text pulled out of a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    /// Whether the chunker should split on markdown headers first.
    pub is_markdown: bool,
}

/// Extract plain text from a blob.
pub fn extract_text(bytes: &[u8], declared_type: &str, storage_path: &str) -> Result<ExtractedText> {
    let file_type = FileType::detect(declared_type, storage_path);

    let text = match file_type {
        FileType::Pdf => extract_pdf(bytes)?,
        FileType::Markdown | FileType::PlainText => decode_utf8(bytes)?,
    };

    if text.trim().is_empty() {
        return Err(Error::EmptyContent);
    }

    debug!(
        "Extracted {} chars from {} ({:?})",
        text.chars().count(),
        storage_path,
        file_type
    );

    Ok(ExtractedText {
        text,
        is_markdown: file_type == FileType::Markdown,
    })
}

fn decode_utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| Error::Decode(format!("Invalid UTF-8: {}", e)))
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| Error::Decode(format!("Failed to load PDF: {}", e)))?;

    let pages = doc
        .get_pages()
        .into_keys()
        .map(|page_number| (page_number, doc.extract_text(&[page_number])));
    Ok(join_page_texts(pages))
}

/// Page texts in page order, each followed by a newline. A page whose text
/// cannot be extracted is logged and contributes an empty line.
fn join_page_texts<E: std::fmt::Display>(
    pages: impl IntoIterator<Item = (u32, std::result::Result<String, E>)>,
) -> String {
    let mut text = String::new();
    for (page_number, page_text) in pages {
        match page_text {
            Ok(page_text) => text.push_str(&page_text),
            Err(e) => warn!("Skipping PDF page {}: {}", page_number, e),
        }
        text.push('\n');
    }
    text
}
