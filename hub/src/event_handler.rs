use crate::message::OutboundMessage;
use crate::Manager;
use async_trait::async_trait;
use events::{DomainEvent, EventHandler};
use log::*;

/// Handles domain events by turning them into live notifications for the affected user.
///
/// The CRUD layer decides who gets notified and puts that user in the event.
/// This handler only renders the text and routes it through the hub.
pub struct HubEventHandler {
    manager: Manager,
}

impl HubEventHandler {
    pub fn new(manager: Manager) -> Self {
        Self { manager }
    }
}

/// Notification text plus the name of the user who caused it.
fn render(event: &DomainEvent) -> (&str, String) {
    match event {
        DomainEvent::FollowRequested { follower_name, .. } => (
            follower_name.as_str(),
            format!("{follower_name} requested to follow you"),
        ),
        DomainEvent::FollowAccepted { followee_name, .. } => (
            followee_name.as_str(),
            format!("{followee_name} accepted your follow request"),
        ),
        DomainEvent::GroupInvitation {
            inviter_name,
            group_id,
            ..
        } => (
            inviter_name.as_str(),
            format!("{inviter_name} invited you to join group {group_id}"),
        ),
        DomainEvent::PostCommented {
            commenter_name,
            post_id,
            ..
        } => (
            commenter_name.as_str(),
            format!("{commenter_name} commented on your post {post_id}"),
        ),
    }
}

#[async_trait]
impl EventHandler for HubEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        let recipient = event.recipient_id();
        let actor = event.actor_id();
        if recipient == actor {
            trace!("Skipping self-notification for user {recipient}");
            return;
        }

        let (actor_name, content) = render(event);
        let delivered = self
            .manager
            .send_message(OutboundMessage::notification(
                actor,
                actor_name,
                recipient,
                content,
            ))
            .await;

        debug!("Notification for user {recipient} reached {delivered} connection(s): {event:?}");
    }
}
