use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::attachment::AttachmentRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle of a message. Only `Streaming` accepts new content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Streaming,
    Complete,
    Failed,
    Cancelled,
}

#[derive(Debug, Error, PartialEq)]
pub enum MessageError {
    #[error("message {0} is no longer streaming")]
    Sealed(Uuid),

    #[error("user message {0} is immutable")]
    UserMessage(Uuid),
}

/// One conversation turn.
///
/// User messages are born `Complete`. Assistant messages are born `Streaming`
/// with empty content, grow by `append`, and become immutable on `seal`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    content: String,
    pub created_at: DateTime<Utc>,
    pub attachments: Vec<AttachmentRef>,
    status: MessageStatus,
}

impl Message {
    pub fn user(content: impl Into<String>, attachments: Vec<AttachmentRef>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            content: content.into(),
            created_at: Utc::now(),
            attachments,
            status: MessageStatus::Complete,
        }
    }

    pub fn assistant_pending() -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            content: String::new(),
            created_at: Utc::now(),
            attachments: Vec::new(),
            status: MessageStatus::Streaming,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn status(&self) -> MessageStatus {
        self.status
    }

    pub fn is_streaming(&self) -> bool {
        self.status == MessageStatus::Streaming
    }

    /// Appends a streamed chunk. Content only ever grows.
    pub fn append(&mut self, chunk: &str) -> Result<(), MessageError> {
        if self.role == Role::User {
            return Err(MessageError::UserMessage(self.id));
        }
        if !self.is_streaming() {
            return Err(MessageError::Sealed(self.id));
        }
        self.content.push_str(chunk);
        Ok(())
    }

    /// Ends the stream. A sealed message keeps its first terminal status.
    pub fn seal(&mut self, status: MessageStatus) {
        if self.is_streaming() && status != MessageStatus::Streaming {
            self.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_message_starts_empty_and_streaming() {
        let m = Message::assistant_pending();
        assert_eq!(m.role, Role::Assistant);
        assert_eq!(m.content(), "");
        assert!(m.is_streaming());
    }

    #[test]
    fn test_append_grows_content() {
        let mut m = Message::assistant_pending();
        m.append("Hel").unwrap();
        m.append("lo").unwrap();
        assert_eq!(m.content(), "Hello");
    }

    #[test]
    fn test_sealed_message_rejects_append() {
        let mut m = Message::assistant_pending();
        m.append("done").unwrap();
        m.seal(MessageStatus::Complete);
        assert_eq!(m.append(" more"), Err(MessageError::Sealed(m.id)));
        assert_eq!(m.content(), "done");
    }

    #[test]
    fn test_seal_keeps_first_terminal_status() {
        let mut m = Message::assistant_pending();
        m.seal(MessageStatus::Failed);
        m.seal(MessageStatus::Complete);
        assert_eq!(m.status(), MessageStatus::Failed);
    }

    #[test]
    fn test_user_message_is_immutable() {
        let mut m = Message::user("I love robotics", vec![]);
        assert_eq!(m.status(), MessageStatus::Complete);
        assert_eq!(m.append("!"), Err(MessageError::UserMessage(m.id)));
        assert_eq!(m.content(), "I love robotics");
    }
}
