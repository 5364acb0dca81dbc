use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user-supplied document submitted alongside a message.
/// The core never inspects `data` itself; it only hands it to a `DocumentExtractor`.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub id: Uuid,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, content_type: Option<String>, data: Bytes) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            content_type,
            data,
        }
    }

    /// Lowercased file extension, if the name has one.
    pub fn extension(&self) -> Option<String> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }

    pub fn to_ref(&self) -> AttachmentRef {
        AttachmentRef {
            id: self.id,
            file_name: self.file_name.clone(),
            content_type: self.content_type.clone(),
            size_bytes: self.data.len(),
        }
    }
}

/// What a `Message` keeps about an attachment once the turn is over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub id: Uuid,
    pub file_name: String,
    pub content_type: Option<String>,
    pub size_bytes: usize,
}
