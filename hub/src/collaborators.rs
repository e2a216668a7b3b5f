//! Interfaces the hub consumes but does not own: token verification, group membership
//! and the group message store. Production wiring lives outside this crate; the hub
//! ships a JWT verifier and an in-memory store for development and tests.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use events::{GroupId, UserId};
use serde::Serialize;

use crate::error::Error;

pub mod jwt;
pub mod memory;

/// Identity resolved from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub display_name: String,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Resolves a bearer token to a user. Any failure means the token is unusable.
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, Error>;
}

#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// Whether `user_id` is an approved member of `group_id`.
    async fn is_group_member(&self, user_id: UserId, group_id: GroupId) -> Result<bool, Error>;
}

/// A group chat message about to be appended to history.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGroupMessage {
    pub group_id: GroupId,
    pub sender_id: UserId,
    pub sender: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A stored group chat message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMessage {
    pub id: i64,
    pub group_id: GroupId,
    pub sender_id: UserId,
    pub sender: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait GroupMessageStore: Send + Sync {
    /// Appends a message to the group's history.
    async fn persist_group_message(&self, message: NewGroupMessage) -> Result<GroupMessage, Error>;

    /// The newest `limit` messages of a group, newest first.
    async fn recent_group_messages(
        &self,
        group_id: GroupId,
        limit: usize,
    ) -> Result<Vec<GroupMessage>, Error>;
}
