//! Event wire types
//!
//! `CommentEvent` is built once per successful write and handed, unchanged,
//! to both the durable log and the in-memory broker. The same JSON shape is
//! used on the log and on the live stream:
//!
//! ```json
//! { "eventId": "...", "type": "comment", "payload": { "id": "...", "videoId": "..." } }
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::commentrelay::model::Comment;

/// Discriminates top-level comments from replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Comment,
    Reply,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Reply => "reply",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON form of a comment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPayload {
    pub id: String,
    pub video_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Comment> for CommentPayload {
    fn from(comment: &Comment) -> Self {
        Self {
            id: comment.id.to_string(),
            video_id: comment.video_id.clone(),
            parent_id: comment.parent_id.map(|id| id.to_string()),
            author_id: comment.author_id.clone(),
            content: comment.content.clone(),
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

/// Immutable event delivered to the durable log and to live subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentEvent {
    pub event_id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub payload: CommentPayload,
}

impl CommentEvent {
    /// The event id is the comment's own id.
    pub fn new(kind: EventKind, comment: &Comment) -> Self {
        Self {
            event_id: comment.id.to_string(),
            kind,
            payload: CommentPayload::from(comment),
        }
    }

    /// Broker topic key for this event.
    pub fn video_id(&self) -> &str {
        &self.payload.video_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn comment_event_omits_parent_id() {
        let comment = Comment::new("v1", None, "alice", "first");
        let event = CommentEvent::new(EventKind::Comment, &comment);

        let json: Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventId"], comment.id.to_string());
        assert_eq!(json["type"], "comment");
        assert_eq!(json["payload"]["videoId"], "v1");
        assert_eq!(json["payload"]["authorId"], "alice");
        assert!(json["payload"].get("parentId").is_none());
        assert!(json["payload"].get("createdAt").is_some());
        assert!(json["payload"].get("updatedAt").is_some());
    }

    #[test]
    fn reply_event_carries_parent_id() {
        let parent = Comment::new("v1", None, "alice", "first");
        let reply = Comment::new("v1", Some(parent.id), "bob", "second");
        let event = CommentEvent::new(EventKind::Reply, &reply);

        let json: Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "reply");
        assert_eq!(json["payload"]["parentId"], parent.id.to_string());
        assert_eq!(event.video_id(), "v1");
        assert_eq!(event.event_id, reply.id.to_string());
    }
}
