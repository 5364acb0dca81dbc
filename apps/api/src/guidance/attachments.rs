//! Attachment Resolver: fan-out extraction, fan-in in submission order.
//!
//! One failing or slow file never aborts the others or the turn: it becomes a
//! labeled placeholder block instead.

use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::extraction::{DocumentExtractor, ExtractionError};
use crate::models::attachment::Attachment;

/// Per-document cap on text placed into the prompt.
pub const MAX_ATTACHMENT_CHARS: usize = 20_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttachmentText {
    Extracted { text: String, truncated: bool },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedAttachment {
    pub file_name: String,
    pub outcome: AttachmentText,
}

impl ResolvedAttachment {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, AttachmentText::Failed { .. })
    }

    /// The labeled block this attachment contributes to the prompt.
    pub fn render_block(&self) -> String {
        match &self.outcome {
            AttachmentText::Extracted { text, truncated } => {
                let marker = if *truncated { "\n[... truncated]" } else { "" };
                format!("=== {} ===\n{}{}", self.file_name, text, marker)
            }
            AttachmentText::Failed { reason } => format!(
                "=== {} ===\n[Could not process this file: {}]",
                self.file_name, reason
            ),
        }
    }
}

/// Extracts every attachment concurrently, each bounded by `timeout`.
/// The result has one entry per input, in input order.
pub async fn resolve_attachments(
    extractor: &dyn DocumentExtractor,
    attachments: &[Attachment],
    timeout: Duration,
) -> Vec<ResolvedAttachment> {
    if attachments.is_empty() {
        return Vec::new();
    }

    let resolved = join_all(attachments.iter().map(|attachment| async move {
        let result = match tokio::time::timeout(timeout, extractor.extract(attachment)).await {
            Ok(result) => result,
            Err(_) => Err(ExtractionError::Timeout(timeout.as_secs())),
        };
        let outcome = match result {
            Ok(text) => {
                let (text, truncated) = truncate_chars(&text, MAX_ATTACHMENT_CHARS);
                AttachmentText::Extracted { text, truncated }
            }
            Err(e) => {
                warn!("Attachment '{}' could not be processed: {e}", attachment.file_name);
                AttachmentText::Failed {
                    reason: e.to_string(),
                }
            }
        };
        ResolvedAttachment {
            file_name: attachment.file_name.clone(),
            outcome,
        }
    }))
    .await;

    info!(
        "Resolved {} attachment(s), {} failed",
        resolved.len(),
        resolved.iter().filter(|r| r.is_failed()).count()
    );
    resolved
}

/// Concatenated labeled blocks, in submission order.
pub fn render_attachment_context(resolved: &[ResolvedAttachment]) -> String {
    if resolved.is_empty() {
        return "No documents attached.".to_string();
    }
    resolved
        .iter()
        .map(ResolvedAttachment::render_block)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => (text[..cut].to_string(), true),
        None => (text.to_string(), false),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;

    /// Fails any file named `bad*`, sleeps on `slow*`, and makes the first
    /// file the slowest so completion order differs from submission order.
    struct FakeExtractor;

    #[async_trait]
    impl DocumentExtractor for FakeExtractor {
        async fn extract(&self, attachment: &Attachment) -> Result<String, ExtractionError> {
            let name = attachment.file_name.as_str();
            if name.starts_with("bad") {
                return Err(ExtractionError::Unsupported("image/png".into()));
            }
            if name.starts_with("slow") {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if name.starts_with("first") {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Ok(format!("contents of {name}"))
        }
    }

    fn files(names: &[&str]) -> Vec<Attachment> {
        names
            .iter()
            .map(|n| Attachment::new(*n, None, Bytes::new()))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_failure_is_isolated_and_order_is_stable() {
        let attachments = files(&["first.txt", "bad.png", "third.txt"]);
        let resolved =
            resolve_attachments(&FakeExtractor, &attachments, Duration::from_secs(5)).await;

        let names: Vec<_> = resolved.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["first.txt", "bad.png", "third.txt"]);
        assert_eq!(resolved.iter().filter(|r| r.is_failed()).count(), 1);
        assert!(resolved[1].is_failed());

        let context = render_attachment_context(&resolved);
        let first = context.find("=== first.txt ===").unwrap();
        let bad = context.find("=== bad.png ===").unwrap();
        let third = context.find("=== third.txt ===").unwrap();
        assert!(first < bad && bad < third);
        assert!(context.contains("contents of first.txt"));
        assert!(context.contains("contents of third.txt"));
        assert_eq!(context.matches("[Could not process this file:").count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_extraction_times_out_into_placeholder() {
        let attachments = files(&["slow.pdf", "ok.txt"]);
        let resolved =
            resolve_attachments(&FakeExtractor, &attachments, Duration::from_secs(2)).await;
        assert_eq!(
            resolved[0].outcome,
            AttachmentText::Failed {
                reason: "extraction timed out after 2s".into()
            }
        );
        assert!(!resolved[1].is_failed());
    }

    #[tokio::test]
    async fn test_no_attachments() {
        let resolved = resolve_attachments(&FakeExtractor, &[], Duration::from_secs(1)).await;
        assert!(resolved.is_empty());
        assert_eq!(render_attachment_context(&resolved), "No documents attached.");
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        let (text, truncated) = truncate_chars("héllo", 2);
        assert_eq!(text, "hé");
        assert!(truncated);
        let (text, truncated) = truncate_chars("hi", 2);
        assert_eq!(text, "hi");
        assert!(!truncated);
    }

    #[test]
    fn test_truncated_block_is_marked() {
        let r = ResolvedAttachment {
            file_name: "long.txt".into(),
            outcome: AttachmentText::Extracted {
                text: "abc".into(),
                truncated: true,
            },
        };
        assert!(r.render_block().ends_with("[... truncated]"));
    }
}
