//! Group chat pipeline: membership check, then persistence, then broadcast.
//!
//! A message is only ever broadcast after the store has accepted it, so anything a client
//! sees live can also be found through a later history fetch. When persistence fails the
//! message is dropped.

use chrono::Utc;
use events::GroupId;
use log::*;
use std::sync::Arc;

use crate::collaborators::{AuthenticatedUser, GroupDirectory, GroupMessageStore, NewGroupMessage};
use crate::dispatcher::Dispatcher;
use crate::error::{Error, GroupErrorKind, HubErrorKind, ProtocolErrorKind};
use crate::message::{GroupFrame, OutboundMessage};

#[derive(Clone)]
pub struct GroupChat {
    groups: Arc<dyn GroupDirectory>,
    store: Arc<dyn GroupMessageStore>,
    dispatcher: Dispatcher,
}

impl GroupChat {
    pub fn new(
        groups: Arc<dyn GroupDirectory>,
        store: Arc<dyn GroupMessageStore>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            groups,
            store,
            dispatcher,
        }
    }

    /// Runs one inbound frame from `sender`, whose socket is bound to `bound_group`.
    /// Returns the number of connections the message reached.
    pub async fn handle(
        &self,
        sender: &AuthenticatedUser,
        bound_group: GroupId,
        frame: GroupFrame,
    ) -> Result<usize, Error> {
        if frame.group_id != bound_group {
            return Err(Error::group(GroupErrorKind::WrongGroup {
                bound: bound_group,
                received: frame.group_id,
            }));
        }

        if frame.text.trim().is_empty() {
            return Err(Error::protocol(ProtocolErrorKind::EmptyContent));
        }

        // Membership can change while the socket is open.
        match self.groups.is_group_member(sender.user_id, bound_group).await {
            Ok(true) => {}
            Ok(false) => return Err(Error::group(GroupErrorKind::NotMember)),
            Err(e) => {
                return Err(Error::with_source(
                    HubErrorKind::Group(GroupErrorKind::MembershipUnavailable),
                    e,
                ))
            }
        }

        let stored = self
            .store
            .persist_group_message(NewGroupMessage {
                group_id: bound_group,
                sender_id: sender.user_id,
                sender: sender.display_name.clone(),
                text: frame.text,
                created_at: Utc::now(),
            })
            .await
            .map_err(|e| {
                error!(
                    "Failed to store message from user {} in group {bound_group}: {e}",
                    sender.user_id
                );
                Error::with_source(HubErrorKind::Persistence, e)
            })?;

        trace!("Stored group message {} in group {bound_group}", stored.id);

        let delivered = self
            .dispatcher
            .dispatch(OutboundMessage::group(
                stored.sender_id,
                stored.sender,
                stored.group_id,
                stored.text,
                stored.created_at,
            ))
            .await;

        Ok(delivered)
    }
}
