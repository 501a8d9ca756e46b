use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use log::debug;
use uuid::Uuid;

use crate::commentrelay::model::Comment;
use crate::error::Result;

/// Durable storage for comment records
#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn save(&self, comment: &Comment) -> Result<()>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Comment>>;

    /// Top-level comments of a video, oldest first
    async fn by_video(&self, video_id: &str) -> Result<Vec<Comment>>;

    /// Replies to a comment, oldest first
    async fn replies_for(&self, parent_id: Uuid) -> Result<Vec<Comment>>;
}

/// Process-local store keyed by comment id
#[derive(Default)]
pub struct InMemoryCommentStore {
    comments: DashMap<Uuid, (u64, Comment)>,
    sequence: AtomicU64,
}

impl InMemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    fn collect<F>(&self, keep: F) -> Vec<Comment>
    where
        F: Fn(&Comment) -> bool,
    {
        let mut found: Vec<(u64, Comment)> = self
            .comments
            .iter()
            .filter(|entry| keep(&entry.value().1))
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by(|(a_seq, a), (b_seq, b)| a.created_at.cmp(&b.created_at).then(a_seq.cmp(b_seq)));
        found.into_iter().map(|(_, comment)| comment).collect()
    }
}

#[async_trait]
impl CommentStore for InMemoryCommentStore {
    async fn save(&self, comment: &Comment) -> Result<()> {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.comments.insert(comment.id, (seq, comment.clone()));
        debug!("Stored comment {} for video {}", comment.id, comment.video_id);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Comment>> {
        Ok(self.comments.get(&id).map(|entry| entry.value().1.clone()))
    }

    async fn by_video(&self, video_id: &str) -> Result<Vec<Comment>> {
        Ok(self.collect(|c| c.video_id == video_id && c.is_top_level()))
    }

    async fn replies_for(&self, parent_id: Uuid) -> Result<Vec<Comment>> {
        Ok(self.collect(|c| c.parent_id == Some(parent_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn find_by_id_returns_saved_comment() {
        let store = InMemoryCommentStore::new();
        let comment = Comment::new("v1", None, "alice", "hi");
        store.save(&comment).await.unwrap();

        assert_eq!(store.find_by_id(comment.id).await.unwrap(), Some(comment));
        assert_eq!(store.find_by_id(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn by_video_lists_only_top_level_in_order() {
        let store = InMemoryCommentStore::new();
        let first = Comment::new("v1", None, "alice", "one");
        let second = Comment::new("v1", None, "bob", "two");
        let reply = Comment::new("v1", Some(first.id), "carol", "re");
        let other = Comment::new("v2", None, "dave", "elsewhere");

        for c in [&first, &second, &reply, &other] {
            store.save(c).await.unwrap();
        }

        let listed = store.by_video("v1").await.unwrap();
        assert_eq!(listed, vec![first.clone(), second]);

        let replies = store.replies_for(first.id).await.unwrap();
        assert_eq!(replies, vec![reply]);
        assert_eq!(store.len(), 4);
    }
}
