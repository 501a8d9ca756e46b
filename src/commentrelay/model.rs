use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A top-level comment or a reply to one
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: Uuid,
    pub video_id: String,
    pub parent_id: Option<Uuid>,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    /// Builds a fresh record with a generated id and creation timestamp
    pub fn new(
        video_id: impl Into<String>,
        parent_id: Option<Uuid>,
        author_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            video_id: video_id.into(),
            parent_id,
            author_id: author_id.into(),
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Body of `POST /comments`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateCommentRequest {
    pub video_id: String,
    pub author_id: String,
    pub content: String,
}

/// Body of `POST /comments/{id}/replies`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateReplyRequest {
    pub author_id: String,
    pub content: String,
}
