use events::{GroupId, UserId};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::SendTimeoutError};
use tokio_util::sync::CancellationToken;

use crate::error::{DeliveryErrorKind, Error};

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry key that connections are grouped under.
///
/// User sockets are keyed by the authenticated user. Group chat sockets are keyed
/// by the single group they were opened for, so a group broadcast is one lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Identity {
    User(UserId),
    Group(GroupId),
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Identity::User(id) => write!(f, "user:{id}"),
            Identity::Group(id) => write!(f, "group:{id}"),
        }
    }
}

/// Items written to a transport by a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    /// Keep-alive probe; transports without a native ping may ignore it.
    Ping,
}

/// Handle to one live, authenticated transport.
///
/// Cloning is cheap. The reader task that created the connection owns its lifetime;
/// clones held by the registry are only used to queue writes and to close it.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    user_id: UserId,
    display_name: String,
    group_id: Option<GroupId>,
    sender: mpsc::Sender<Frame>,
    closed: CancellationToken,
}

impl Connection {
    /// Creates a connection together with the receiving half of its outbound queue.
    pub fn channel(
        user_id: UserId,
        display_name: impl Into<String>,
        group_id: Option<GroupId>,
        buffer: usize,
    ) -> (Self, mpsc::Receiver<Frame>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let connection = Self {
            id: ConnectionId::new(),
            user_id,
            display_name: display_name.into(),
            group_id,
            sender,
            closed: CancellationToken::new(),
        };
        (connection, receiver)
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn group_id(&self) -> Option<GroupId> {
        self.group_id
    }

    /// The registry key this connection lives under. Fixed for the connection's lifetime.
    pub fn identity(&self) -> Identity {
        match self.group_id {
            Some(group_id) => Identity::Group(group_id),
            None => Identity::User(self.user_id),
        }
    }

    /// Queues a text frame, waiting at most `timeout` for room in the outbound queue.
    pub async fn send(&self, text: String, timeout: Duration) -> Result<(), Error> {
        if self.closed.is_cancelled() {
            return Err(Error::delivery(DeliveryErrorKind::Closed));
        }

        match self.sender.send_timeout(Frame::Text(text), timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Closed(_)) => Err(Error::delivery(DeliveryErrorKind::Closed)),
            Err(SendTimeoutError::Timeout(_)) => {
                Err(Error::delivery(DeliveryErrorKind::TimedOut))
            }
        }
    }

    /// Signals the reader and writer tasks to shut the transport down. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Completes once `close` has been called on any clone of this connection.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_follows_bound_group() {
        let (user_conn, _rx) = Connection::channel(1, "alice", None, 4);
        assert_eq!(user_conn.identity(), Identity::User(1));

        let (group_conn, _rx) = Connection::channel(1, "alice", Some(42), 4);
        assert_eq!(group_conn.identity(), Identity::Group(42));
    }

    #[tokio::test]
    async fn test_send_queues_text_frame() {
        let (conn, mut rx) = Connection::channel(1, "alice", None, 4);
        conn.send("hello".to_string(), Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(rx.recv().await, Some(Frame::Text("hello".to_string())));
    }

    #[tokio::test]
    async fn test_send_to_dropped_receiver_is_closed() {
        let (conn, rx) = Connection::channel(1, "alice", None, 4);
        drop(rx);
        let err = conn
            .send("hello".to_string(), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(
            err.error_kind,
            crate::error::HubErrorKind::Delivery(DeliveryErrorKind::Closed)
        );
    }

    #[tokio::test]
    async fn test_send_to_full_queue_times_out() {
        let (conn, _rx) = Connection::channel(1, "alice", None, 1);
        conn.send("first".to_string(), Duration::from_millis(10))
            .await
            .unwrap();
        let err = conn
            .send("second".to_string(), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert_eq!(
            err.error_kind,
            crate::error::HubErrorKind::Delivery(DeliveryErrorKind::TimedOut)
        );
    }

    #[tokio::test]
    async fn test_close_is_visible_to_every_clone() {
        let (conn, _rx) = Connection::channel(1, "alice", None, 4);
        let clone = conn.clone();
        clone.close();
        clone.close();
        assert!(conn.is_closed());
        conn.closed().await;
        assert!(conn
            .send("late".to_string(), Duration::from_millis(10))
            .await
            .is_err());
    }
}
