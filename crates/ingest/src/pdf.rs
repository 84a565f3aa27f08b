//! PDF text extraction backed by `lopdf`.

use std::path::Path;

use chrono::Utc;
use docchat_core::{DocumentContext, DocumentError};
use lopdf::Document;
use sha2::{Digest, Sha256};

/// Upload limit used when none is configured (20 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

const MAX_SOURCE_NAME_LEN: usize = 255;

/// Extracts plain text from PDF uploads.
#[derive(Debug, Clone)]
pub struct PdfIngestor {
    max_upload_bytes: usize,
}

impl Default for PdfIngestor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl PdfIngestor {
    pub fn new(max_upload_bytes: usize) -> Self {
        Self { max_upload_bytes }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Extract the text of every page, in page order.
    ///
    /// Each page is trimmed; non-empty pages are joined with `"\n"`.
    pub fn extract_text(&self, bytes: &[u8]) -> Result<DocumentContext, DocumentError> {
        self.extract_named(bytes, None)
    }

    /// [`extract_text`](Self::extract_text) with the client-supplied file name
    /// attached to the result. Only the final path component is kept.
    pub fn extract_named(
        &self,
        bytes: &[u8],
        source_name: Option<&str>,
    ) -> Result<DocumentContext, DocumentError> {
        if bytes.len() > self.max_upload_bytes {
            return Err(DocumentError::TooLarge {
                size: bytes.len(),
                limit: self.max_upload_bytes,
            });
        }
        if bytes.is_empty() {
            return Err(DocumentError::Unreadable("empty upload".into()));
        }

        let doc = Document::load_mem(bytes)
            .map_err(|e| DocumentError::Unreadable(format!("failed to load PDF: {e}")))?;

        if doc.is_encrypted() {
            return Err(DocumentError::Unreadable(
                "encrypted PDFs are not supported".into(),
            ));
        }

        let pages = doc.get_pages();
        let page_count = pages.len();
        let mut page_texts = Vec::with_capacity(page_count);

        // BTreeMap keyed by page number, so iteration is reading order
        for page_number in pages.keys() {
            match doc.extract_text(&[*page_number]) {
                Ok(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        page_texts.push(text.to_string());
                    }
                }
                Err(e) => {
                    tracing::warn!(page = page_number, error = %e, "Skipping unreadable PDF page");
                }
            }
        }

        if page_texts.is_empty() {
            return Err(DocumentError::NoText);
        }

        let raw_text = page_texts.join("\n");
        let sha256 = fingerprint(bytes);

        tracing::debug!(
            pages = page_count,
            chars = raw_text.len(),
            sha256 = %&sha256[..12],
            "Extracted PDF text"
        );

        Ok(DocumentContext {
            raw_text,
            page_count,
            source_name: source_name.and_then(clean_source_name),
            sha256,
            loaded_at: Utc::now(),
        })
    }

    /// Run extraction on the blocking pool.
    ///
    /// A panic inside the PDF parser surfaces as
    /// [`DocumentError::Unreadable`] instead of taking the task down.
    pub async fn ingest(
        &self,
        bytes: Vec<u8>,
        source_name: Option<String>,
    ) -> Result<DocumentContext, DocumentError> {
        let ingestor = self.clone();
        tokio::task::spawn_blocking(move || ingestor.extract_named(&bytes, source_name.as_deref()))
            .await
            .map_err(|e| DocumentError::Unreadable(format!("PDF parser aborted: {e}")))?
    }
}

/// Hex SHA-256 of the raw upload.
fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn clean_source_name(raw: &str) -> Option<String> {
    let name = Path::new(raw.trim()).file_name()?.to_str()?;
    let name: String = name
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_SOURCE_NAME_LEN)
        .collect();
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    /// Build an in-memory PDF with one page per entry. Empty strings make
    /// pages with no text operators.
    fn build_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let operations = if text.is_empty() {
                Vec::new()
            } else {
                vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ]
            };
            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages.len() as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn pages_joined_in_order() {
        let bytes = build_pdf(&["Hello", "World"]);
        let ctx = PdfIngestor::default().extract_text(&bytes).unwrap();
        assert_eq!(ctx.raw_text, "Hello\nWorld");
        assert_eq!(ctx.page_count, 2);
        assert_eq!(ctx.sha256.len(), 64);
        assert!(ctx.source_name.is_none());
    }

    #[test]
    fn blank_pages_are_skipped() {
        let bytes = build_pdf(&["First", "", "Third"]);
        let ctx = PdfIngestor::default().extract_text(&bytes).unwrap();
        assert_eq!(ctx.raw_text, "First\nThird");
        assert_eq!(ctx.page_count, 3);
    }

    #[test]
    fn corrupt_bytes_are_unreadable() {
        let err = PdfIngestor::default()
            .extract_text(b"this is not a pdf")
            .unwrap_err();
        assert!(matches!(err, DocumentError::Unreadable(_)));
    }

    #[test]
    fn empty_upload_is_unreadable() {
        let err = PdfIngestor::default().extract_text(&[]).unwrap_err();
        assert!(matches!(err, DocumentError::Unreadable(_)));
    }

    #[test]
    fn text_free_pdf_has_no_text() {
        let bytes = build_pdf(&["", ""]);
        let err = PdfIngestor::default().extract_text(&bytes).unwrap_err();
        assert!(matches!(err, DocumentError::NoText));
    }

    #[test]
    fn oversized_upload_rejected_before_parsing() {
        let bytes = build_pdf(&["Hello"]);
        let ingestor = PdfIngestor::new(16);
        match ingestor.extract_text(&bytes).unwrap_err() {
            DocumentError::TooLarge { size, limit } => {
                assert_eq!(size, bytes.len());
                assert_eq!(limit, 16);
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }

    #[test]
    fn fingerprint_is_stable() {
        let bytes = build_pdf(&["Alpha"]);
        let a = PdfIngestor::default().extract_text(&bytes).unwrap();
        let b = PdfIngestor::default().extract_text(&bytes).unwrap();
        assert_eq!(a.sha256, b.sha256);
        assert_eq!(a.sha256, fingerprint(&bytes));
    }

    #[test]
    fn source_name_keeps_file_component() {
        assert_eq!(
            clean_source_name("/tmp/uploads/report.pdf").as_deref(),
            Some("report.pdf")
        );
        assert_eq!(clean_source_name("  notes.pdf ").as_deref(), Some("notes.pdf"));
        assert_eq!(clean_source_name(""), None);
        assert_eq!(clean_source_name("/"), None);
    }

    #[tokio::test]
    async fn ingest_runs_off_the_runtime() {
        let bytes = build_pdf(&["Summary page"]);
        let ctx = PdfIngestor::default()
            .ingest(bytes, Some("summary.pdf".into()))
            .await
            .unwrap();
        assert_eq!(ctx.raw_text, "Summary page");
        assert_eq!(ctx.label(), "summary.pdf");
    }
}
