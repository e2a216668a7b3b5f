use log::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthGate;
use crate::collaborators::{GroupDirectory, GroupMessageStore, TokenVerifier};
use crate::dispatcher::Dispatcher;
use crate::group_chat::GroupChat;
use crate::message::OutboundMessage;
use crate::registry::Registry;

/// Tunables for connection handling.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Longest a single write to one connection may wait before that connection is dropped.
    pub write_timeout: Duration,
    /// How long a new connection has to send its auth frame.
    pub auth_timeout: Duration,
    /// Outbound frames queued per connection.
    pub outbound_buffer: usize,
    /// Keep-alive ping period; `None` disables pings.
    pub ping_interval: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_secs(2),
            auth_timeout: Duration::from_secs(10),
            outbound_buffer: 64,
            ping_interval: Some(Duration::from_secs(30)),
        }
    }
}

/// The process-wide hub: one registry shared by every connection handler and by the
/// group chat pipeline. Cheap to clone; construct once at start-up and pass it around.
#[derive(Clone)]
pub struct Manager {
    settings: Settings,
    registry: Arc<dyn Registry>,
    dispatcher: Dispatcher,
    gate: AuthGate,
    group_chat: GroupChat,
    stopping: CancellationToken,
}

impl Manager {
    pub fn new(
        settings: Settings,
        registry: Arc<dyn Registry>,
        verifier: Arc<dyn TokenVerifier>,
        groups: Arc<dyn GroupDirectory>,
        store: Arc<dyn GroupMessageStore>,
    ) -> Self {
        let dispatcher = Dispatcher::new(registry.clone(), settings.write_timeout);
        let gate = AuthGate::new(verifier, groups.clone());
        let group_chat = GroupChat::new(groups, store, dispatcher.clone());

        Self {
            settings,
            registry,
            dispatcher,
            gate,
            group_chat,
            stopping: CancellationToken::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    pub fn group_chat(&self) -> &GroupChat {
        &self.group_chat
    }

    /// Sends a message to its recipients' live connections.
    pub async fn send_message(&self, message: OutboundMessage) -> usize {
        self.dispatcher.dispatch(message).await
    }

    /// True once [`Manager::shutdown`] has started. New sessions must not be served.
    pub fn is_shutting_down(&self) -> bool {
        self.stopping.is_cancelled()
    }

    /// Closes every live connection and refuses new ones. In-flight dispatches are abandoned.
    pub async fn shutdown(&self) {
        self.stopping.cancel();
        info!(
            "Shutting down hub with {} live connection(s)",
            self.registry.connection_count().await
        );
        self.registry.close_all().await;
    }
}
