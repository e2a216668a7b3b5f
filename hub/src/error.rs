//! Error types for the `hub` crate.
//!
//! Follows the same pattern as the other layers: a root `Error` struct holding a tree of
//! error kind enums plus an optional source for error chaining. None of these errors is
//! fatal to the process; the worst outcome is a dropped frame or a closed connection.

use events::GroupId;
use std::error::Error as StdError;
use std::fmt;

pub type Result<T> = core::result::Result<T, Error>;

/// Top-level error type for the hub.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: HubErrorKind,
}

/// Major categories of errors in the hub.
#[derive(Debug, PartialEq)]
pub enum HubErrorKind {
    /// The connection is rejected and closed by the Auth Gate.
    Auth(AuthErrorKind),
    /// A single inbound frame is dropped; the connection stays open.
    Protocol(ProtocolErrorKind),
    /// A group chat frame was refused before persistence.
    Group(GroupErrorKind),
    /// The external store failed to append a group message.
    Persistence,
    /// A write to a live connection failed; the connection is pruned.
    Delivery(DeliveryErrorKind),
    /// An external collaborator (store, directory) could not answer.
    Unavailable,
}

/// Reasons the Auth Gate refuses a connection.
#[derive(Debug, PartialEq)]
pub enum AuthErrorKind {
    MalformedFrame,
    MissingToken,
    InvalidToken,
    NotGroupMember,
    MembershipUnavailable,
    Timeout,
}

/// Errors decoding an inbound frame after admission.
#[derive(Debug, PartialEq)]
pub enum ProtocolErrorKind {
    MalformedFrame,
    UnsupportedType(String),
    InvalidReceiver,
    EmptyContent,
}

/// Errors from the group chat membership step.
#[derive(Debug, PartialEq)]
pub enum GroupErrorKind {
    WrongGroup { bound: GroupId, received: GroupId },
    NotMember,
    MembershipUnavailable,
}

/// Errors writing to a single connection.
#[derive(Debug, PartialEq)]
pub enum DeliveryErrorKind {
    Closed,
    TimedOut,
}

impl AuthErrorKind {
    /// Plaintext frame sent to the client right before its connection is closed.
    pub fn diagnostic(&self) -> &'static str {
        match self {
            AuthErrorKind::MalformedFrame => "Invalid auth message format",
            AuthErrorKind::MissingToken => "Missing authentication",
            AuthErrorKind::InvalidToken => "Invalid token",
            AuthErrorKind::NotGroupMember => "Not a member of this group",
            AuthErrorKind::MembershipUnavailable => "Failed to verify group membership",
            AuthErrorKind::Timeout => "Authentication timed out",
        }
    }
}

impl Error {
    pub fn new(error_kind: HubErrorKind) -> Self {
        Error {
            source: None,
            error_kind,
        }
    }

    pub fn with_source<E>(error_kind: HubErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Error {
            source: Some(source.into()),
            error_kind,
        }
    }

    pub fn auth(kind: AuthErrorKind) -> Self {
        Self::new(HubErrorKind::Auth(kind))
    }

    pub fn protocol(kind: ProtocolErrorKind) -> Self {
        Self::new(HubErrorKind::Protocol(kind))
    }

    pub fn group(kind: GroupErrorKind) -> Self {
        Self::new(HubErrorKind::Group(kind))
    }

    pub fn delivery(kind: DeliveryErrorKind) -> Self {
        Self::new(HubErrorKind::Delivery(kind))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            HubErrorKind::Auth(kind) => write!(f, "Auth error: {:?}", kind),
            HubErrorKind::Protocol(kind) => write!(f, "Protocol error: {:?}", kind),
            HubErrorKind::Group(kind) => write!(f, "Group chat error: {:?}", kind),
            HubErrorKind::Persistence => write!(f, "Persistence error"),
            HubErrorKind::Delivery(kind) => write!(f, "Delivery error: {:?}", kind),
            HubErrorKind::Unavailable => write!(f, "Collaborator unavailable"),
        }?;
        if let Some(source) = &self.source {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(
            HubErrorKind::Protocol(ProtocolErrorKind::MalformedFrame),
            err,
        )
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Error::with_source(HubErrorKind::Auth(AuthErrorKind::InvalidToken), err)
    }
}
