use tracing::debug;

use crate::error::ExtractionError;

#[cfg(test)]
use mockall::automock;

/// Turns uploaded document bytes into plain text
#[cfg_attr(test, automock)]
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// Pure-Rust PDF text extraction
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        if bytes.is_empty() {
            return Err(ExtractionError::EmptyUpload);
        }
        let raw = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ExtractionError::Unreadable(e.to_string()))?;
        debug!(bytes = bytes.len(), chars = raw.len(), "Extracted PDF text");
        normalize_text(&raw)
    }
}

/// Collapse the blank-line runs page breaks leave behind; whitespace-only
/// output means the document had no extractable text.
pub fn normalize_text(raw: &str) -> Result<String, ExtractionError> {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0usize;
    for line in raw.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 || out.is_empty() {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    let text = out.trim_end().to_string();
    if text.is_empty() {
        Err(ExtractionError::NoText)
    } else {
        Ok(text)
    }
}

/// First `max_chars` characters of `text`, cut on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_upload_rejected() {
        assert!(matches!(
            PdfTextExtractor.extract_text(&[]),
            Err(ExtractionError::EmptyUpload)
        ));
    }

    #[test]
    fn test_non_pdf_bytes_are_unreadable() {
        assert!(matches!(
            PdfTextExtractor.extract_text(b"this is not a pdf"),
            Err(ExtractionError::Unreadable(_))
        ));
    }

    #[test]
    fn test_whitespace_only_text_signals_no_text() {
        assert!(matches!(
            normalize_text("\n\n   \n\u{c}\n"),
            Err(ExtractionError::NoText)
        ));
    }

    #[test]
    fn test_normalize_collapses_blank_runs() {
        let text = normalize_text("\n\nEmocromo\n\n\n\nGlicemia 90 mg/dL  \n").expect("has text");
        assert_eq!(text, "Emocromo\n\nGlicemia 90 mg/dL");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("perché sì", 6), "perché");
        assert_eq!(truncate_chars("breve", 100), "breve");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
