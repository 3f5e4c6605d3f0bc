use serde::Serialize;

use crate::disclaimer::Disclaimer;

pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Plain-text file offered for download after a successful analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadArtifact {
    pub filename: String,
    pub content_type: &'static str,
    pub body: String,
}

impl DownloadArtifact {
    /// Body is the displayed text minus its trailing disclaimer
    pub fn new(displayed: &str, stem: &str, disclaimer: &Disclaimer) -> Self {
        Self {
            filename: format!("{}.txt", sanitize_stem(stem)),
            content_type: TEXT_CONTENT_TYPE,
            body: disclaimer.strip(displayed).to_string(),
        }
    }

    /// Value for a `Content-Disposition` header
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }
}

/// Spaces become underscores; anything unsafe in a filename is dropped
pub fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .trim()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            c if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') => Some(c),
            _ => None,
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "report".to_string()
    } else {
        cleaned.to_string()
    }
}
