//! Document extraction: turns an uploaded file into plain text.
//!
//! PDF goes through `pdf_extract` on a blocking thread; text-like formats are
//! decoded as UTF-8. Anything else is rejected per file, never per turn.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::attachment::Attachment;

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "csv", "json", "rtf"];

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),

    #[error("document contains no extractable text")]
    Empty,

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("file is not valid UTF-8 text")]
    Encoding,

    #[error("extraction timed out after {0}s")]
    Timeout(u64),

    #[error("extraction task failed: {0}")]
    Task(String),
}

/// The external document-extraction service: `extract(attachment) -> text`.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, attachment: &Attachment) -> Result<String, ExtractionError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DocumentKind {
    Pdf,
    Text,
}

fn detect_kind(attachment: &Attachment) -> Result<DocumentKind, ExtractionError> {
    let content_type = attachment
        .content_type
        .as_deref()
        .map(|c| c.split(';').next().unwrap_or(c).trim().to_ascii_lowercase());
    let extension = attachment.extension();

    if content_type.as_deref() == Some("application/pdf") || extension.as_deref() == Some("pdf") {
        return Ok(DocumentKind::Pdf);
    }
    if content_type.as_deref().is_some_and(|c| c.starts_with("text/"))
        || extension
            .as_deref()
            .is_some_and(|e| TEXT_EXTENSIONS.contains(&e))
    {
        return Ok(DocumentKind::Text);
    }

    Err(ExtractionError::Unsupported(
        content_type
            .or(extension)
            .unwrap_or_else(|| "unknown".to_string()),
    ))
}

/// In-process extractor backed by `pdf-extract`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDocumentExtractor;

#[async_trait]
impl DocumentExtractor for LocalDocumentExtractor {
    async fn extract(&self, attachment: &Attachment) -> Result<String, ExtractionError> {
        let text = match detect_kind(attachment)? {
            DocumentKind::Pdf => {
                let data = attachment.data.clone();
                tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
                    .await
                    .map_err(|e| ExtractionError::Task(e.to_string()))?
                    .map_err(|e| ExtractionError::Pdf(e.to_string()))?
            }
            DocumentKind::Text => String::from_utf8(attachment.data.to_vec())
                .map_err(|_| ExtractionError::Encoding)?,
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(ExtractionError::Empty);
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn attachment(name: &str, content_type: Option<&str>, data: &'static [u8]) -> Attachment {
        Attachment::new(name, content_type.map(String::from), Bytes::from_static(data))
    }

    #[test]
    fn test_detect_kind_by_content_type_and_extension() {
        assert_eq!(
            detect_kind(&attachment("x", Some("application/pdf"), b"")).unwrap(),
            DocumentKind::Pdf
        );
        assert_eq!(
            detect_kind(&attachment("resume.PDF", None, b"")).unwrap(),
            DocumentKind::Pdf
        );
        assert_eq!(
            detect_kind(&attachment("notes", Some("text/plain; charset=utf-8"), b"")).unwrap(),
            DocumentKind::Text
        );
        assert_eq!(
            detect_kind(&attachment("essay.md", None, b"")).unwrap(),
            DocumentKind::Text
        );
    }

    #[test]
    fn test_detect_kind_rejects_images() {
        let err = detect_kind(&attachment("photo.png", Some("image/png"), b"")).unwrap_err();
        assert!(matches!(err, ExtractionError::Unsupported(t) if t == "image/png"));
    }

    #[tokio::test]
    async fn test_extracts_plain_text_trimmed() {
        let a = attachment("essay.txt", None, b"  My essay draft\n");
        let text = LocalDocumentExtractor.extract(&a).await.unwrap();
        assert_eq!(text, "My essay draft");
    }

    #[tokio::test]
    async fn test_blank_text_is_empty_error() {
        let a = attachment("blank.txt", None, b" \n\t");
        let err = LocalDocumentExtractor.extract(&a).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Empty));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_encoding_error() {
        let a = attachment("bad.txt", None, &[0xff, 0xfe, 0x00]);
        let err = LocalDocumentExtractor.extract(&a).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Encoding));
    }

    #[tokio::test]
    async fn test_corrupt_pdf_fails_without_panicking() {
        let a = attachment("broken.pdf", Some("application/pdf"), b"not a pdf at all");
        assert!(LocalDocumentExtractor.extract(&a).await.is_err());
    }
}
