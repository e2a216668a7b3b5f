//! Event system infrastructure for the social network backend.
//!
//! This crate provides the event system that enables loose coupling between
//! the CRUD handlers (follows, groups, posts) and the real-time hub that pushes
//! notifications to connected clients.
//!
//! # Architecture
//!
//! - **DomainEvent**: Enum representing all business events that produce a live notification
//! - **EventHandler**: Trait for implementing event handlers
//! - **EventPublisher**: Publishes events to registered handlers
//!
//! This crate has no dependencies on internal crates, avoiding circular dependencies.
//! It also owns the id aliases shared by every other crate in the workspace.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Stable user identifier assigned at account creation.
pub type UserId = i64;

/// Group identifier assigned when a group is created.
pub type GroupId = i64;

/// Domain events that represent business-level changes in the system.
/// These events are emitted after the owning CRUD operation has been committed.
///
/// Every event names the single user that should be notified. The CRUD layer is
/// responsible for deciding who that is; handlers only route.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    /// Emitted when a user asks to follow a private profile.
    FollowRequested {
        /// User who sent the follow request.
        follower_id: UserId,
        /// Display name of the follower, rendered in the notification text.
        follower_name: String,
        /// Owner of the private profile, receives the notification.
        followee_id: UserId,
        /// Row id of the stored notification so clients can mark it as read.
        notification_id: i64,
    },
    /// Emitted when a pending follow request is accepted.
    FollowAccepted {
        /// User whose request was accepted, receives the notification.
        follower_id: UserId,
        followee_id: UserId,
        followee_name: String,
        notification_id: i64,
    },
    /// Emitted when a group member invites another user to join.
    GroupInvitation {
        group_id: GroupId,
        inviter_id: UserId,
        inviter_name: String,
        /// Invited user, receives the notification.
        invitee_id: UserId,
        notification_id: i64,
    },
    /// Emitted when someone comments on a post.
    PostCommented {
        post_id: i64,
        /// Post author, receives the notification.
        author_id: UserId,
        commenter_id: UserId,
        commenter_name: String,
        notification_id: i64,
    },
}

impl DomainEvent {
    /// The user that should receive a live notification for this event.
    pub fn recipient_id(&self) -> UserId {
        match self {
            DomainEvent::FollowRequested { followee_id, .. } => *followee_id,
            DomainEvent::FollowAccepted { follower_id, .. } => *follower_id,
            DomainEvent::GroupInvitation { invitee_id, .. } => *invitee_id,
            DomainEvent::PostCommented { author_id, .. } => *author_id,
        }
    }

    /// The user whose action produced this event.
    pub fn actor_id(&self) -> UserId {
        match self {
            DomainEvent::FollowRequested { follower_id, .. } => *follower_id,
            DomainEvent::FollowAccepted { followee_id, .. } => *followee_id,
            DomainEvent::GroupInvitation { inviter_id, .. } => *inviter_id,
            DomainEvent::PostCommented { commenter_id, .. } => *commenter_id,
        }
    }
}

/// Trait for handling domain events.
/// Implementations can perform side effects like pushing live notifications,
/// updating caches, logging, etc.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Publish an event to all registered handlers.
    /// Handlers are called sequentially and never report failures back to the publisher.
    pub async fn publish(&self, event: DomainEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    struct RecordingHandler {
        seen: Mutex<Vec<DomainEvent>>,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle(&self, event: &DomainEvent) {
            self.seen.lock().await.push(event.clone());
        }
    }

    fn follow_requested() -> DomainEvent {
        DomainEvent::FollowRequested {
            follower_id: 1,
            follower_name: "alice".to_string(),
            followee_id: 2,
            notification_id: 10,
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_every_handler_in_order() {
        let first = Arc::new(RecordingHandler {
            seen: Mutex::new(Vec::new()),
        });
        let second = Arc::new(RecordingHandler {
            seen: Mutex::new(Vec::new()),
        });

        let publisher = EventPublisher::new()
            .with_handler(first.clone())
            .with_handler(second.clone());

        publisher.publish(follow_requested()).await;

        assert_eq!(first.seen.lock().await.as_slice(), &[follow_requested()]);
        assert_eq!(second.seen.lock().await.as_slice(), &[follow_requested()]);
    }

    #[tokio::test]
    async fn test_publish_without_handlers_is_a_no_op() {
        EventPublisher::default().publish(follow_requested()).await;
    }

    #[test]
    fn test_recipient_and_actor_ids() {
        let event = DomainEvent::FollowAccepted {
            follower_id: 3,
            followee_id: 4,
            followee_name: "bob".to_string(),
            notification_id: 11,
        };
        assert_eq!(event.recipient_id(), 3);
        assert_eq!(event.actor_id(), 4);

        let event = DomainEvent::PostCommented {
            post_id: 9,
            author_id: 5,
            commenter_id: 6,
            commenter_name: "carol".to_string(),
            notification_id: 12,
        };
        assert_eq!(event.recipient_id(), 5);
        assert_eq!(event.actor_id(), 6);
    }

    #[test]
    fn test_serializes_with_event_tag() {
        let value = serde_json::to_value(follow_requested()).unwrap();
        assert_eq!(value["event"], "follow_requested");
        assert_eq!(value["followee_id"], 2);
    }
}
