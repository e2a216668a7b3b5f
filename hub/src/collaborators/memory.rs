use async_trait::async_trait;
use events::{GroupId, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{GroupDirectory, GroupMessage, GroupMessageStore, NewGroupMessage};
use crate::error::Error;

#[derive(Default)]
struct Tables {
    members: HashMap<GroupId, HashSet<UserId>>,
    messages: Vec<GroupMessage>,
}

/// Process-local group membership and message history.
///
/// Used by the development binary and by tests; production deployments back these
/// traits with the relational store.
#[derive(Default)]
pub struct InMemoryGroupStore {
    tables: Mutex<Tables>,
}

impl InMemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store whose groups already contain the given members.
    pub fn with_members<I, M>(groups: I) -> Self
    where
        I: IntoIterator<Item = (GroupId, M)>,
        M: IntoIterator<Item = UserId>,
    {
        let store = Self::new();
        for (group_id, members) in groups {
            for user_id in members {
                store.add_member(group_id, user_id);
            }
        }
        store
    }

    pub fn add_member(&self, group_id: GroupId, user_id: UserId) {
        self.tables()
            .members
            .entry(group_id)
            .or_default()
            .insert(user_id);
    }

    pub fn remove_member(&self, group_id: GroupId, user_id: UserId) {
        let mut tables = self.tables();
        if let Some(members) = tables.members.get_mut(&group_id) {
            members.remove(&user_id);
            if members.is_empty() {
                tables.members.remove(&group_id);
            }
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl GroupDirectory for InMemoryGroupStore {
    async fn is_group_member(&self, user_id: UserId, group_id: GroupId) -> Result<bool, Error> {
        Ok(self
            .tables()
            .members
            .get(&group_id)
            .is_some_and(|members| members.contains(&user_id)))
    }
}

#[async_trait]
impl GroupMessageStore for InMemoryGroupStore {
    async fn persist_group_message(&self, message: NewGroupMessage) -> Result<GroupMessage, Error> {
        let mut tables = self.tables();
        let stored = GroupMessage {
            id: tables.messages.len() as i64 + 1,
            group_id: message.group_id,
            sender_id: message.sender_id,
            sender: message.sender,
            text: message.text,
            created_at: message.created_at,
        };
        tables.messages.push(stored.clone());
        Ok(stored)
    }

    async fn recent_group_messages(
        &self,
        group_id: GroupId,
        limit: usize,
    ) -> Result<Vec<GroupMessage>, Error> {
        let tables = self.tables();
        let mut messages: Vec<GroupMessage> = tables
            .messages
            .iter()
            .filter(|m| m.group_id == group_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        messages.truncate(limit);
        Ok(messages)
    }
}
