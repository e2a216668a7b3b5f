use chrono::Utc;
use futures::future::join_all;
use log::*;
use std::sync::Arc;
use std::time::Duration;

use crate::connection::Identity;
use crate::message::{OutboundMessage, Recipients};
use crate::registry::Registry;

/// Fans outbound messages out to every live connection registered for the recipients.
///
/// Delivery is best-effort: writes run concurrently, each bounded by `write_timeout`, and a
/// failed write unregisters and closes that connection without affecting the others.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<dyn Registry>,
    write_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<dyn Registry>, write_timeout: Duration) -> Self {
        Self {
            registry,
            write_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    /// Delivers `message` and returns how many connections accepted the frame.
    /// Zero recipients is not an error.
    pub async fn dispatch(&self, message: OutboundMessage) -> usize {
        let identity = match message.recipients {
            Recipients::User(user_id) => Identity::User(user_id),
            Recipients::Group(group_id) => Identity::Group(group_id),
        };

        let timestamp = message.timestamp.unwrap_or_else(Utc::now);
        let recipients = self.registry.lookup(identity).await;
        if recipients.is_empty() {
            trace!("No live connections for {identity}; dropping {:?}", message.kind);
            return 0;
        }

        let frame = match message.to_frame(timestamp) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to serialize outbound message: {e}");
                return 0;
            }
        };

        let writes = recipients.iter().map(|connection| {
            let frame = frame.clone();
            async move { (connection, connection.send(frame, self.write_timeout).await) }
        });

        let mut delivered = 0;
        for (connection, result) in join_all(writes).await {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        "Failed to deliver to connection {} of {identity}: {e}. Connection will be closed.",
                        connection.id()
                    );
                    self.registry.unregister(identity, connection.id()).await;
                    connection.close();
                }
            }
        }

        debug!(
            "Dispatched {:?} from user {} to {delivered}/{} connection(s) of {identity}",
            message.kind,
            message.sender_id,
            recipients.len()
        );
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Connection, Frame};
    use crate::registry::{self, RegistryMode};
    use serde_json::Value;
    use tokio::sync::mpsc;

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn dispatcher(mode: RegistryMode) -> Dispatcher {
        Dispatcher::new(registry::build(mode), TIMEOUT)
    }

    async fn connect(
        dispatcher: &Dispatcher,
        user_id: i64,
        group_id: Option<i64>,
        buffer: usize,
    ) -> (Connection, mpsc::Receiver<Frame>) {
        let (conn, rx) = Connection::channel(user_id, format!("user-{user_id}"), group_id, buffer);
        dispatcher.registry().register(conn.clone()).await;
        (conn, rx)
    }

    fn text(frame: Frame) -> Value {
        match frame {
            Frame::Text(text) => serde_json::from_str(&text).unwrap(),
            Frame::Ping => panic!("unexpected ping"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_to_absent_identity_is_a_no_op() {
        for mode in [RegistryMode::Lock, RegistryMode::Actor] {
            let dispatcher = dispatcher(mode);
            let delivered = dispatcher
                .dispatch(OutboundMessage::direct(1, "alice", 2, "anyone?"))
                .await;
            assert_eq!(delivered, 0);
        }
    }

    #[tokio::test]
    async fn test_direct_message_reaches_every_connection_of_receiver_only() {
        let dispatcher = dispatcher(RegistryMode::Actor);
        let (_b1, mut b1_rx) = connect(&dispatcher, 2, None, 4).await;
        let (_b2, mut b2_rx) = connect(&dispatcher, 2, None, 4).await;
        let (_c, mut c_rx) = connect(&dispatcher, 3, None, 4).await;

        let delivered = dispatcher
            .dispatch(OutboundMessage::direct(1, "alice", 2, "hello bob"))
            .await;

        assert_eq!(delivered, 2);
        assert_eq!(text(b1_rx.recv().await.unwrap())["content"], "hello bob");
        assert_eq!(text(b2_rx.recv().await.unwrap())["content"], "hello bob");
        assert!(c_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_stamps_timestamp() {
        let dispatcher = dispatcher(RegistryMode::Lock);
        let (_b, mut b_rx) = connect(&dispatcher, 2, None, 4).await;

        let before = Utc::now() - chrono::Duration::seconds(1);
        dispatcher
            .dispatch(OutboundMessage::notification(1, "alice", 2, "ping"))
            .await;

        let frame = text(b_rx.recv().await.unwrap());
        let stamped = chrono::DateTime::parse_from_rfc3339(frame["timestamp"].as_str().unwrap())
            .unwrap()
            .with_timezone(&Utc);
        assert!(stamped >= before);
        assert_eq!(frame["type"], "notification");
    }

    #[tokio::test]
    async fn test_group_message_uses_group_key() {
        let dispatcher = dispatcher(RegistryMode::Actor);
        let (_m1, mut m1_rx) = connect(&dispatcher, 1, Some(42), 4).await;
        let (_m2, mut m2_rx) = connect(&dispatcher, 2, Some(42), 4).await;
        let (_user_socket, mut user_rx) = connect(&dispatcher, 2, None, 4).await;
        let (_other_group, mut other_rx) = connect(&dispatcher, 3, Some(7), 4).await;

        let delivered = dispatcher
            .dispatch(OutboundMessage::group(1, "alice", 42, "hi", Utc::now()))
            .await;

        assert_eq!(delivered, 2);
        assert_eq!(text(m1_rx.recv().await.unwrap())["text"], "hi");
        assert_eq!(text(m2_rx.recv().await.unwrap())["text"], "hi");
        assert!(user_rx.try_recv().is_err());
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_write_prunes_only_that_connection() {
        for mode in [RegistryMode::Lock, RegistryMode::Actor] {
            let dispatcher = dispatcher(mode);
            let (_ok1, mut ok1_rx) = connect(&dispatcher, 1, Some(42), 4).await;
            let (dead, dead_rx) = connect(&dispatcher, 2, Some(42), 4).await;
            let (_ok2, mut ok2_rx) = connect(&dispatcher, 3, Some(42), 4).await;
            drop(dead_rx);

            let delivered = dispatcher
                .dispatch(OutboundMessage::group(1, "alice", 42, "hi", Utc::now()))
                .await;

            assert_eq!(delivered, 2);
            assert!(ok1_rx.recv().await.is_some());
            assert!(ok2_rx.recv().await.is_some());
            assert!(dead.is_closed());

            let remaining = dispatcher.registry().lookup(Identity::Group(42)).await;
            assert_eq!(remaining.len(), 2);
            assert!(!remaining.contains(&dead));
        }
    }

    #[tokio::test]
    async fn test_stalled_recipient_does_not_block_others() {
        let dispatcher = dispatcher(RegistryMode::Actor);
        let (stalled, _stalled_rx) = connect(&dispatcher, 1, Some(42), 1).await;
        let (_ok, mut ok_rx) = connect(&dispatcher, 2, Some(42), 8).await;

        // Fill the stalled connection's queue so the next write has to wait.
        stalled
            .send("backlog".to_string(), TIMEOUT)
            .await
            .unwrap();

        let started = std::time::Instant::now();
        let delivered = dispatcher
            .dispatch(OutboundMessage::group(2, "bob", 42, "hi", Utc::now()))
            .await;

        assert_eq!(delivered, 1);
        assert!(started.elapsed() < TIMEOUT * 5);
        assert!(ok_rx.recv().await.is_some());
        assert!(stalled.is_closed());
    }
}
