use std::sync::Arc;

use log::{debug, info, warn};
use uuid::Uuid;

use crate::commentrelay::event::{CommentEvent, EventKind};
use crate::commentrelay::eventlog::EventLog;
use crate::commentrelay::model::{Comment, CreateCommentRequest, CreateReplyRequest};
use crate::commentrelay::session::CommentBroker;
use crate::commentrelay::store::CommentStore;
use crate::error::{CommentRelayError, ErrorCode, Result};

/// Durable log topics per event kind
#[derive(Debug, Clone)]
pub struct LogTopics {
    pub comment_created: String,
    pub comment_replied: String,
}

impl LogTopics {
    pub fn for_kind(&self, kind: EventKind) -> &str {
        match kind {
            EventKind::Comment => &self.comment_created,
            EventKind::Reply => &self.comment_replied,
        }
    }
}

impl Default for LogTopics {
    fn default() -> Self {
        Self {
            comment_created: "comments.created".to_string(),
            comment_replied: "comments.replied".to_string(),
        }
    }
}

/// Validates and stores comments, then dispatches one event per write
pub struct CommentService {
    store: Arc<dyn CommentStore>,
    log: Arc<dyn EventLog>,
    broker: Arc<CommentBroker>,
    topics: LogTopics,
}

impl CommentService {
    pub fn new(
        store: Arc<dyn CommentStore>,
        log: Arc<dyn EventLog>,
        broker: Arc<CommentBroker>,
        topics: LogTopics,
    ) -> Self {
        Self {
            store,
            log,
            broker,
            topics,
        }
    }

    pub fn broker(&self) -> &Arc<CommentBroker> {
        &self.broker
    }

    /// Stores a top-level comment and broadcasts it to the video's subscribers
    pub async fn create_comment(&self, req: CreateCommentRequest) -> Result<Comment> {
        let author = req.author_id.trim();
        let content = req.content.trim();
        if req.video_id.trim().is_empty() || author.is_empty() || content.is_empty() {
            debug!("Rejecting comment with missing fields");
            return Err(CommentRelayError::from_code(ErrorCode::InvalidPayload));
        }

        let comment = Comment::new(req.video_id.as_str(), None, author, content);
        self.store.save(&comment).await?;
        info!("Created comment {} on video {}", comment.id, comment.video_id);

        self.dispatch(EventKind::Comment, &comment).await;
        Ok(comment)
    }

    /// Stores a reply to a top-level comment and broadcasts it under the parent's video
    pub async fn create_reply(&self, parent_id: Uuid, req: CreateReplyRequest) -> Result<Comment> {
        let author = req.author_id.trim();
        let content = req.content.trim();
        if author.is_empty() || content.is_empty() {
            debug!("Rejecting reply to {} with missing fields", parent_id);
            return Err(CommentRelayError::from_code(ErrorCode::InvalidPayload));
        }

        let parent = match self.store.find_by_id(parent_id).await? {
            Some(parent) => parent,
            None => return Err(CommentRelayError::from_code(ErrorCode::ParentNotFound)),
        };
        if !parent.is_top_level() {
            debug!("Rejecting reply to nested comment {}", parent_id);
            return Err(CommentRelayError::from_code(ErrorCode::ParentNotTopLevel));
        }

        let reply = Comment::new(parent.video_id.as_str(), Some(parent.id), author, content);
        self.store.save(&reply).await?;
        info!("Created reply {} to comment {} on video {}", reply.id, parent.id, reply.video_id);

        self.dispatch(EventKind::Reply, &reply).await;
        Ok(reply)
    }

    pub async fn list_top_level(&self, video_id: &str) -> Result<Vec<Comment>> {
        self.store.by_video(video_id).await
    }

    pub async fn list_replies(&self, parent_id: Uuid) -> Result<Vec<Comment>> {
        self.store.replies_for(parent_id).await
    }

    /// Hands one immutable event to the durable log and to the broker.
    ///
    /// Neither sink can fail the write: log errors are only reported and the
    /// broker never blocks.
    async fn dispatch(&self, kind: EventKind, comment: &Comment) {
        let event = Arc::new(CommentEvent::new(kind, comment));

        match serde_json::to_vec(&*event) {
            Ok(value) => {
                let topic = self.topics.for_kind(kind);
                if let Err(e) = self.log.publish(topic, &event.event_id, &value).await {
                    warn!("Failed to publish {} event {}: {}", kind, event.event_id, e);
                }
            }
            Err(e) => warn!("Failed to serialize {} event {}: {}", kind, event.event_id, e),
        }

        let delivered = self.broker.publish(event.video_id(), Arc::clone(&event));
        debug!("{} event {} reached {} live subscribers", kind, event.event_id, delivered);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commentrelay::eventlog::MemoryEventLog;
    use crate::commentrelay::store::InMemoryCommentStore;

    struct Fixture {
        service: CommentService,
        store: Arc<InMemoryCommentStore>,
        log: Arc<MemoryEventLog>,
        broker: Arc<CommentBroker>,
    }

    fn fixture_with_log(log: MemoryEventLog) -> Fixture {
        let store = Arc::new(InMemoryCommentStore::new());
        let log = Arc::new(log);
        let broker = Arc::new(CommentBroker::default());
        let service = CommentService::new(store.clone(), log.clone(), broker.clone(), LogTopics::default());
        Fixture {
            service,
            store,
            log,
            broker,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_log(MemoryEventLog::new())
    }

    fn comment_req(video: &str, author: &str, content: &str) -> CreateCommentRequest {
        CreateCommentRequest {
            video_id: video.to_string(),
            author_id: author.to_string(),
            content: content.to_string(),
        }
    }

    fn reply_req(author: &str, content: &str) -> CreateReplyRequest {
        CreateReplyRequest {
            author_id: author.to_string(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn blank_fields_are_invalid_payload() {
        let f = fixture();
        for req in [
            comment_req(" ", "alice", "hi"),
            comment_req("v1", "\t", "hi"),
            comment_req("v1", "alice", "  "),
        ] {
            let err = f.service.create_comment(req).await.unwrap_err();
            assert_eq!(err.code(), Some(ErrorCode::InvalidPayload));
        }
        assert!(f.store.is_empty());
        assert!(f.log.records().is_empty());
    }

    #[tokio::test]
    async fn comment_is_trimmed_stored_and_dispatched() {
        let f = fixture();
        let (mut endpoint, _handle) = f.broker.subscribe("v1");

        let comment = f.service.create_comment(comment_req("v1", " alice ", " hello ")).await.unwrap();
        assert_eq!(comment.author_id, "alice");
        assert_eq!(comment.content, "hello");

        let event = endpoint.try_recv().unwrap();
        assert_eq!(event.kind, EventKind::Comment);
        assert_eq!(event.event_id, comment.id.to_string());
        assert_eq!(event.payload.video_id, "v1");
        assert_eq!(event.payload.parent_id, None);

        let records = f.log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].topic, "comments.created");
        assert_eq!(records[0].key, comment.id.to_string());
        let logged: CommentEvent = serde_json::from_slice(&records[0].value).unwrap();
        assert_eq!(logged, *event);
    }

    #[tokio::test]
    async fn reply_is_delivered_under_parent_video() {
        let f = fixture();
        let parent = f.service.create_comment(comment_req("v1", "alice", "root")).await.unwrap();
        let (mut video, _video_handle) = f.broker.subscribe("v1");
        let (mut by_id, _id_handle) = f.broker.subscribe(&parent.id.to_string());

        let reply = f.service.create_reply(parent.id, reply_req("bob", "re")).await.unwrap();
        assert_eq!(reply.video_id, "v1");
        assert_eq!(reply.parent_id, Some(parent.id));

        let event = video.try_recv().unwrap();
        assert_eq!(event.kind, EventKind::Reply);
        assert_eq!(event.payload.parent_id, Some(parent.id.to_string()));
        assert_eq!(event.payload.video_id, "v1");
        assert!(by_id.try_recv().is_none());

        assert_eq!(f.log.records()[1].topic, "comments.replied");
    }

    #[tokio::test]
    async fn reply_to_reply_is_rejected_without_dispatch() {
        let f = fixture();
        let parent = f.service.create_comment(comment_req("v1", "alice", "root")).await.unwrap();
        let reply = f.service.create_reply(parent.id, reply_req("bob", "re")).await.unwrap();
        let (mut endpoint, _handle) = f.broker.subscribe("v1");
        let logged_before = f.log.records().len();

        let err = f.service.create_reply(reply.id, reply_req("carol", "re re")).await.unwrap_err();

        assert_eq!(err.code(), Some(ErrorCode::ParentNotTopLevel));
        assert!(endpoint.try_recv().is_none());
        assert_eq!(f.log.records().len(), logged_before);
        assert_eq!(f.store.len(), 2);
    }

    #[tokio::test]
    async fn reply_to_unknown_parent_is_not_found() {
        let f = fixture();
        let err = f.service.create_reply(Uuid::new_v4(), reply_req("bob", "re")).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ParentNotFound));
    }

    #[tokio::test]
    async fn reply_validation_runs_before_parent_lookup() {
        let f = fixture();
        let err = f.service.create_reply(Uuid::new_v4(), reply_req("", "re")).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidPayload));
    }

    #[tokio::test]
    async fn log_failure_does_not_fail_write_or_broker_delivery() {
        let f = fixture_with_log(MemoryEventLog::unavailable());
        let (mut endpoint, _handle) = f.broker.subscribe("v1");

        let comment = f.service.create_comment(comment_req("v1", "alice", "hi")).await.unwrap();

        assert_eq!(endpoint.try_recv().unwrap().event_id, comment.id.to_string());
        assert_eq!(f.store.len(), 1);
    }

    #[tokio::test]
    async fn listings_come_from_the_store() {
        let f = fixture();
        let parent = f.service.create_comment(comment_req("v1", "alice", "root")).await.unwrap();
        f.service.create_reply(parent.id, reply_req("bob", "re")).await.unwrap();

        assert_eq!(f.service.list_top_level("v1").await.unwrap().len(), 1);
        assert_eq!(f.service.list_replies(parent.id).await.unwrap().len(), 1);
        assert!(f.service.list_top_level("v2").await.unwrap().is_empty());
    }
}
