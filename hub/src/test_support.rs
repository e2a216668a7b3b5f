//! Mock collaborators shared by the unit tests.
use async_trait::async_trait;
use events::{GroupId, UserId};
use std::collections::HashMap;
use std::time::Duration;

use crate::collaborators::memory::InMemoryGroupStore;
use crate::collaborators::{
    AuthenticatedUser, GroupDirectory, GroupMessage, GroupMessageStore, NewGroupMessage,
    TokenVerifier,
};
use crate::error::{AuthErrorKind, Error, HubErrorKind};

/// Accepts a fixed set of opaque tokens.
pub(crate) struct StaticVerifier {
    users: HashMap<String, AuthenticatedUser>,
}

impl StaticVerifier {
    pub(crate) fn with_users<'a>(users: impl IntoIterator<Item = (&'a str, UserId, &'a str)>) -> Self {
        Self {
            users: users
                .into_iter()
                .map(|(token, user_id, name)| {
                    (
                        token.to_string(),
                        AuthenticatedUser {
                            user_id,
                            display_name: name.to_string(),
                        },
                    )
                })
                .collect(),
        }
    }
}

#[async_trait]
impl TokenVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, Error> {
        self.users
            .get(token)
            .cloned()
            .ok_or_else(|| Error::auth(AuthErrorKind::InvalidToken))
    }
}

pub(crate) struct FailingDirectory;

#[async_trait]
impl GroupDirectory for FailingDirectory {
    async fn is_group_member(&self, _user_id: UserId, _group_id: GroupId) -> Result<bool, Error> {
        Err(Error::new(HubErrorKind::Unavailable))
    }
}

pub(crate) struct FailingStore;

#[async_trait]
impl GroupMessageStore for FailingStore {
    async fn persist_group_message(&self, _message: NewGroupMessage) -> Result<GroupMessage, Error> {
        Err(Error::with_source(HubErrorKind::Unavailable, "database is locked"))
    }

    async fn recent_group_messages(
        &self,
        _group_id: GroupId,
        _limit: usize,
    ) -> Result<Vec<GroupMessage>, Error> {
        Ok(Vec::new())
    }
}

/// In-memory store whose writes take `delay` to complete.
pub(crate) struct SlowStore {
    delay: Duration,
    inner: InMemoryGroupStore,
}

impl SlowStore {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: InMemoryGroupStore::new(),
        }
    }
}

#[async_trait]
impl GroupMessageStore for SlowStore {
    async fn persist_group_message(&self, message: NewGroupMessage) -> Result<GroupMessage, Error> {
        tokio::time::sleep(self.delay).await;
        self.inner.persist_group_message(message).await
    }

    async fn recent_group_messages(
        &self,
        group_id: GroupId,
        limit: usize,
    ) -> Result<Vec<GroupMessage>, Error> {
        self.inner.recent_group_messages(group_id, limit).await
    }
}
