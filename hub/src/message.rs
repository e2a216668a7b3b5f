//! Wire frames and the hub's internal message type.
use chrono::{DateTime, SecondsFormat, Utc};
use events::{GroupId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ProtocolErrorKind};

/// Plaintext frame sent once a connection passes the Auth Gate.
pub const AUTHENTICATED: &str = "authenticated";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Kind {
    DirectMessage,
    Notification,
    GroupMessage,
}

/// Who an outbound message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipients {
    User(UserId),
    Group(GroupId),
}

/// A message ready for fan-out.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub kind: Kind,
    pub sender_id: UserId,
    pub sender_name: String,
    pub recipients: Recipients,
    pub content: String,
    /// Left empty by producers; the Dispatcher stamps it unless persistence already did.
    pub timestamp: Option<DateTime<Utc>>,
}

impl OutboundMessage {
    pub fn direct(
        sender_id: UserId,
        sender_name: impl Into<String>,
        receiver_id: UserId,
        content: impl Into<String>,
    ) -> Self {
        Self {
            kind: Kind::DirectMessage,
            sender_id,
            sender_name: sender_name.into(),
            recipients: Recipients::User(receiver_id),
            content: content.into(),
            timestamp: None,
        }
    }

    pub fn notification(
        sender_id: UserId,
        sender_name: impl Into<String>,
        receiver_id: UserId,
        content: impl Into<String>,
    ) -> Self {
        Self {
            kind: Kind::Notification,
            ..Self::direct(sender_id, sender_name, receiver_id, content)
        }
    }

    pub fn group(
        sender_id: UserId,
        sender_name: impl Into<String>,
        group_id: GroupId,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: Kind::GroupMessage,
            sender_id,
            sender_name: sender_name.into(),
            recipients: Recipients::Group(group_id),
            content: content.into(),
            timestamp: Some(created_at),
        }
    }

    /// Renders the JSON frame written to every recipient.
    pub fn to_frame(&self, timestamp: DateTime<Utc>) -> Result<String, Error> {
        let (receiver, group_id, text) = match self.recipients {
            Recipients::User(user_id) => (user_id.to_string(), None, None),
            Recipients::Group(group_id) => (
                group_id.to_string(),
                Some(group_id),
                Some(self.content.as_str()),
            ),
        };

        let frame = OutboundFrame {
            kind: self.kind,
            sender: &self.sender_name,
            sender_id: self.sender_id,
            receiver,
            content: &self.content,
            group_id,
            text,
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        };

        Ok(serde_json::to_string(&frame)?)
    }
}

#[derive(Serialize)]
struct OutboundFrame<'a> {
    #[serde(rename = "type")]
    kind: Kind,
    sender: &'a str,
    sender_id: UserId,
    receiver: String,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    group_id: Option<GroupId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    timestamp: String,
}

/// First frame on every socket.
#[derive(Debug, Deserialize)]
pub struct AuthFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub token: String,
}

/// Inbound frame on a user socket.
#[derive(Debug, Deserialize)]
pub struct DirectFrame {
    #[serde(rename = "type")]
    pub kind: String,
    pub receiver: ReceiverField,
    pub content: String,
}

/// Clients send user ids either as numbers or as strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ReceiverField {
    Id(UserId),
    Text(String),
}

impl ReceiverField {
    pub fn user_id(&self) -> Result<UserId, Error> {
        match self {
            ReceiverField::Id(id) => Ok(*id),
            ReceiverField::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| Error::protocol(ProtocolErrorKind::InvalidReceiver)),
        }
    }
}

impl DirectFrame {
    /// Validates a direct-message frame into an outbound message from `sender_id`.
    pub fn into_outbound(self, sender_id: UserId, sender_name: &str) -> Result<OutboundMessage, Error> {
        if self.kind != "direct-message" {
            return Err(Error::protocol(ProtocolErrorKind::UnsupportedType(self.kind)));
        }
        if self.content.trim().is_empty() {
            return Err(Error::protocol(ProtocolErrorKind::EmptyContent));
        }
        let receiver_id = self.receiver.user_id()?;
        Ok(OutboundMessage::direct(
            sender_id,
            sender_name,
            receiver_id,
            self.content,
        ))
    }
}

/// Inbound frame on a group chat socket.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GroupFrame {
    pub group_id: GroupId,
    pub text: String,
}

/// Reply sent on a user socket when an inbound frame cannot be used.
pub fn error_frame(content: &str) -> String {
    serde_json::json!({ "type": "error", "content": content }).to_string()
}
