use async_trait::async_trait;
use log::*;
use tokio::sync::{mpsc, oneshot};

use super::{close_connections, ConnectionMap, Registry};
use crate::connection::{Connection, ConnectionId, Identity};

enum Command {
    Register {
        connection: Connection,
    },
    Unregister {
        identity: Identity,
        connection_id: ConnectionId,
    },
    Lookup {
        identity: Identity,
        reply: oneshot::Sender<Vec<Connection>>,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
    CloseAll {
        reply: oneshot::Sender<()>,
    },
}

/// Registry owned by a single task and reached only through its command queue.
///
/// Commands from one caller are applied in the order they were sent, so a lookup issued
/// after a register always observes it. The task exits once every handle is dropped.
pub struct ActorRegistry {
    commands: mpsc::UnboundedSender<Command>,
}

impl ActorRegistry {
    /// Spawns the owning task on the current tokio runtime.
    pub fn spawn() -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run(receiver));
        Self { commands }
    }

    fn submit(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("Connection registry task has stopped; command dropped");
        }
    }
}

async fn run(mut commands: mpsc::UnboundedReceiver<Command>) {
    let mut map = ConnectionMap::default();

    while let Some(command) = commands.recv().await {
        match command {
            Command::Register { connection } => map.register(connection),
            Command::Unregister {
                identity,
                connection_id,
            } => map.unregister(identity, &connection_id),
            Command::Lookup { identity, reply } => {
                let _ = reply.send(map.lookup(identity));
            }
            Command::Count { reply } => {
                let _ = reply.send(map.connection_count());
            }
            Command::CloseAll { reply } => {
                close_connections(map.drain());
                let _ = reply.send(());
            }
        }
    }

    debug!("Connection registry task stopped");
}

#[async_trait]
impl Registry for ActorRegistry {
    async fn register(&self, connection: Connection) {
        self.submit(Command::Register { connection });
    }

    async fn unregister(&self, identity: Identity, connection_id: &ConnectionId) {
        self.submit(Command::Unregister {
            identity,
            connection_id: connection_id.clone(),
        });
    }

    async fn lookup(&self, identity: Identity) -> Vec<Connection> {
        let (reply, response) = oneshot::channel();
        self.submit(Command::Lookup { identity, reply });
        response.await.unwrap_or_default()
    }

    async fn connection_count(&self) -> usize {
        let (reply, response) = oneshot::channel();
        self.submit(Command::Count { reply });
        response.await.unwrap_or_default()
    }

    async fn close_all(&self) {
        let (reply, response) = oneshot::channel();
        self.submit(Command::CloseAll { reply });
        let _ = response.await;
    }
}
