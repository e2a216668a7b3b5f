use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{close_connections, ConnectionMap, Registry};
use crate::connection::{Connection, ConnectionId, Identity};

/// Registry guarded by a single mutex. The guard is never held across an `.await`.
#[derive(Default)]
pub struct LockRegistry {
    map: Mutex<ConnectionMap>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, ConnectionMap> {
        // The map holds no invariant a panicking holder could leave half-applied.
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Registry for LockRegistry {
    async fn register(&self, connection: Connection) {
        self.map().register(connection);
    }

    async fn unregister(&self, identity: Identity, connection_id: &ConnectionId) {
        self.map().unregister(identity, connection_id);
    }

    async fn lookup(&self, identity: Identity) -> Vec<Connection> {
        self.map().lookup(identity)
    }

    async fn connection_count(&self) -> usize {
        self.map().connection_count()
    }

    async fn close_all(&self) {
        let connections = self.map().drain();
        close_connections(connections);
    }
}
