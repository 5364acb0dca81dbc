//! Notification sink: tells the human operator about degraded outcomes.
//! Purely observational: nothing in the turn depends on delivery.

use serde::Serialize;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub detail: String,
}

impl Notice {
    pub fn attachment_failed(file_name: &str, reason: &str) -> Self {
        Self {
            level: NoticeLevel::Warning,
            title: format!("Could not process {file_name}"),
            detail: reason.to_string(),
        }
    }

    pub fn generation_failed(reason: &str) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: "The assistant's reply could not be completed".to_string(),
            detail: reason.to_string(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice);
}

/// Default sink: notices become structured log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Warning => warn!(title = %notice.title, detail = %notice.detail, "notice"),
            NoticeLevel::Error => error!(title = %notice.title, detail = %notice.detail, "notice"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_constructors() {
        let n = Notice::attachment_failed("transcript.pdf", "unsupported file type");
        assert_eq!(n.level, NoticeLevel::Warning);
        assert!(n.title.contains("transcript.pdf"));

        let n = Notice::generation_failed("timeout");
        assert_eq!(n.level, NoticeLevel::Error);
        assert_eq!(n.detail, "timeout");
    }

    #[test]
    fn test_notice_serializes_level() {
        let json = serde_json::to_value(Notice::generation_failed("x")).unwrap();
        assert_eq!(json["level"], "error");
    }
}
