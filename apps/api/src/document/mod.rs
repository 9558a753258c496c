//! Uploaded document → plain text.
//!
//! `extract` returns the document as a list of chunks (pages where the
//! format has them); `normalize_text` turns the joined chunks into the text
//! the segmenter sees.

pub mod docx;

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_TEXT: &str = "text/plain";

const FORM_FEED: char = '\u{c}';

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("corrupt document: {0}")]
    CorruptFile(String),

    #[error("document contains no text")]
    Empty,
}

/// Canonical mime type for an upload, from its declared content type or,
/// failing that, its file extension.
pub fn resolve_mime(content_type: Option<&str>, file_name: Option<&str>) -> Option<&'static str> {
    let declared = content_type
        .map(|ct| ct.split(';').next().unwrap_or_default().trim().to_lowercase())
        .and_then(|ct| match ct.as_str() {
            MIME_PDF | "application/x-pdf" => Some(MIME_PDF),
            MIME_DOCX => Some(MIME_DOCX),
            MIME_TEXT => Some(MIME_TEXT),
            _ => None,
        });

    declared.or_else(|| {
        let extension = file_name?.rsplit_once('.')?.1.to_lowercase();
        match extension.as_str() {
            "pdf" => Some(MIME_PDF),
            "docx" => Some(MIME_DOCX),
            "txt" | "text" | "md" => Some(MIME_TEXT),
            _ => None,
        }
    })
}

/// Extracts text chunks from a document of the given mime type.
pub async fn extract(bytes: Bytes, mime: &str) -> Result<Vec<String>, DocumentError> {
    let chunks = match mime {
        MIME_PDF => extract_pdf(bytes).await?,
        MIME_DOCX => tokio::task::spawn_blocking(move || docx::extract_docx(&bytes))
            .await
            .map_err(|e| DocumentError::CorruptFile(format!("DOCX reader failed: {e}")))??,
        MIME_TEXT => extract_plain(&bytes)?,
        other => return Err(DocumentError::UnsupportedFormat(other.to_string())),
    };

    debug!("Extracted {} chunk(s) from {mime}", chunks.len());
    Ok(chunks)
}

/// pdf-extract can panic on malformed input; the blocking task contains it.
async fn extract_pdf(bytes: Bytes) -> Result<Vec<String>, DocumentError> {
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| DocumentError::CorruptFile(format!("PDF reader failed: {e}")))?
        .map_err(|e| DocumentError::CorruptFile(format!("unreadable PDF: {e}")))?;

    Ok(text
        .split(FORM_FEED)
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .map(str::to_string)
        .collect())
}

fn extract_plain(bytes: &[u8]) -> Result<Vec<String>, DocumentError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| DocumentError::CorruptFile(format!("text is not valid UTF-8: {e}")))?;
    let text = text.trim_start_matches('\u{feff}');
    Ok(vec![text.to_string()])
}

/// Normalizes line endings and whitespace: runs of spaces collapse to one,
/// trailing space is dropped, and at most one blank line separates text.
pub fn normalize_text(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(unified.len());
    let mut blank_run = 0;

    for line in unified.lines() {
        let line = line
            .split(|c: char| c.is_whitespace())
            .filter(|w| !w.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 || out.is_empty() {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(&line);
        out.push('\n');
    }

    out.trim_end().to_string()
}
