//! Document context — the text of the currently loaded document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Text extracted from an uploaded document.
///
/// Lives only in a [`Session`](crate::session::Session); re-upload is
/// required in every new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentContext {
    /// Full extracted text, pages joined in order
    pub raw_text: String,

    /// Number of pages in the source document
    pub page_count: usize,

    /// Original file name, if the client supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,

    /// Hex SHA-256 of the uploaded bytes
    pub sha256: String,

    pub loaded_at: DateTime<Utc>,
}

impl DocumentContext {
    /// Number of characters of extracted text.
    pub fn char_count(&self) -> usize {
        self.raw_text.chars().count()
    }

    /// A short label for logs and UI: file name if known, else the
    /// first 12 hex digits of the fingerprint.
    pub fn label(&self) -> String {
        match &self.source_name {
            Some(name) => name.clone(),
            None => self.sha256.chars().take(12).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(source_name: Option<&str>) -> DocumentContext {
        DocumentContext {
            raw_text: "Héllo".into(),
            page_count: 1,
            source_name: source_name.map(String::from),
            sha256: "0123456789abcdef0123".into(),
            loaded_at: Utc::now(),
        }
    }

    #[test]
    fn char_count_counts_chars_not_bytes() {
        assert_eq!(doc(None).char_count(), 5);
    }

    #[test]
    fn label_prefers_file_name() {
        assert_eq!(doc(Some("report.pdf")).label(), "report.pdf");
        assert_eq!(doc(None).label(), "0123456789ab");
    }
}
