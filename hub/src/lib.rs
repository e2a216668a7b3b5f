//! Real-time connection hub for live messaging.
//!
//! This crate owns every long-lived client connection of the backend and pushes
//! direct messages, notifications and group chat messages to them over WebSockets.
//!
//! # Architecture
//!
//! - **Auth Gate**: the first frame on every socket carries a bearer token. Group chat
//!   sockets additionally require membership of the group named in the URL.
//! - **Registry**: the only shared mutable state. Maps an addressing identity (a user,
//!   or a group for group chat sockets) to its live connections. Two interchangeable
//!   implementations exist, a mutex-guarded map and a single-owner actor task.
//! - **Dispatcher**: snapshots a recipient set, serializes once and writes to every
//!   connection concurrently with a per-write timeout. A failed write prunes only that
//!   connection.
//! - **Group chat pipeline**: membership check, persistence, then broadcast. Nothing is
//!   broadcast that was not stored.
//! - **Ephemeral delivery**: offline users miss live frames. Group history and stored
//!   notifications are fetched through the regular API.
//!
//! # Message Flow
//!
//! 1. Client opens `/ws` or `/groups/chat/ws?group_id=<id>` and sends its auth frame
//! 2. [`session::serve`] admits it through the [`AuthGate`] and registers a [`Connection`]
//! 3. Inbound frames are validated; the sender identity always comes from the token
//! 4. The [`Dispatcher`] looks up the recipients and writes the JSON frame
//! 5. When the socket closes the connection is unregistered exactly once
//!
//! # Example: pushing a notification
//!
//! ```rust,ignore
//! use hub::message::OutboundMessage;
//!
//! app_state
//!     .hub
//!     .send_message(OutboundMessage::notification(follower_id, name, followee_id, text))
//!     .await;
//! ```
//!
//! # Modules
//!
//! - `auth`: first-frame authentication and group membership check
//! - `collaborators`: traits for token verification, membership and message storage
//! - `connection`: per-connection handle and addressing identities
//! - `dispatcher`: concurrent fan-out with write timeouts
//! - `group_chat`: persist-then-broadcast pipeline
//! - `manager`: the process-wide hub handle
//! - `registry`: identity to connection index
//! - `session`: lifecycle of a single connection

pub mod auth;
pub mod collaborators;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod event_handler;
pub mod group_chat;
pub mod manager;
pub mod message;
pub mod registry;
pub mod session;

#[cfg(test)]
mod test_support;

pub use auth::{AuthGate, Scope};
pub use connection::{Connection, ConnectionId, Frame, Identity};
pub use dispatcher::Dispatcher;
pub use error::Error;
pub use event_handler::HubEventHandler;
pub use manager::{Manager, Settings};
pub use registry::{Registry, RegistryMode};
