//! Connection registry: which live connections belong to which identity.
//!
//! Two implementations honour the same contract:
//!
//! - [`LockRegistry`]: one mutex over the whole map.
//! - [`ActorRegistry`]: a single task owns the map and is reached through a command queue,
//!   which also serialises registrations against in-flight dispatch snapshots.
//!
//! In both, lookups return snapshots so callers never write to a transport while the
//! registry is held.

use async_trait::async_trait;
use log::*;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::connection::{Connection, ConnectionId, Identity};

mod actor;
mod lock;

pub use actor::ActorRegistry;
pub use lock::LockRegistry;

#[async_trait]
pub trait Registry: Send + Sync {
    /// Adds `connection` under its own identity. Registering the same connection twice is a no-op.
    async fn register(&self, connection: Connection);

    /// Removes a connection and drops the identity once its last connection is gone.
    /// Unknown identities or connection ids are ignored, so repeated calls are safe.
    async fn unregister(&self, identity: Identity, connection_id: &ConnectionId);

    /// Snapshot of the connections currently registered under `identity`.
    async fn lookup(&self, identity: Identity) -> Vec<Connection>;

    /// Total number of live connections across all identities.
    async fn connection_count(&self) -> usize;

    /// Closes every registered connection and empties the registry.
    async fn close_all(&self);
}

/// Which registry implementation to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistryMode {
    Lock,
    Actor,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RegistryModeParseError;

impl FromStr for RegistryMode {
    type Err = RegistryModeParseError;
    fn from_str(mode: &str) -> Result<RegistryMode, Self::Err> {
        match mode.to_lowercase().as_str() {
            "lock" => Ok(RegistryMode::Lock),
            "actor" => Ok(RegistryMode::Actor),
            _ => Err(RegistryModeParseError),
        }
    }
}

impl fmt::Display for RegistryMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RegistryMode::Lock => write!(f, "lock"),
            RegistryMode::Actor => write!(f, "actor"),
        }
    }
}

/// Builds the registry selected by `mode`. The actor variant must be built inside a tokio runtime.
pub fn build(mode: RegistryMode) -> Arc<dyn Registry> {
    info!("Using {mode} connection registry");
    match mode {
        RegistryMode::Lock => Arc::new(LockRegistry::new()),
        RegistryMode::Actor => Arc::new(ActorRegistry::spawn()),
    }
}

/// The map both registry implementations guard.
/// Invariant: no identity maps to an empty set.
#[derive(Default)]
struct ConnectionMap {
    entries: HashMap<Identity, HashMap<ConnectionId, Connection>>,
}

impl ConnectionMap {
    fn register(&mut self, connection: Connection) {
        let identity = connection.identity();
        let connections = self.entries.entry(identity).or_default();
        if connections.contains_key(connection.id()) {
            trace!("Connection {} already registered under {identity}", connection.id());
            return;
        }
        debug!(
            "Registered connection {} under {identity} ({} total)",
            connection.id(),
            connections.len() + 1
        );
        connections.insert(connection.id().clone(), connection);
    }

    fn unregister(&mut self, identity: Identity, connection_id: &ConnectionId) {
        let Some(connections) = self.entries.get_mut(&identity) else {
            return;
        };

        if connections.remove(connection_id).is_some() {
            debug!("Unregistered connection {connection_id} from {identity}");
        }

        if connections.is_empty() {
            self.entries.remove(&identity);
        }
    }

    fn lookup(&self, identity: Identity) -> Vec<Connection> {
        self.entries
            .get(&identity)
            .map(|connections| connections.values().cloned().collect())
            .unwrap_or_default()
    }

    fn connection_count(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    fn drain(&mut self) -> Vec<Connection> {
        std::mem::take(&mut self.entries)
            .into_values()
            .flat_map(HashMap::into_values)
            .collect()
    }
}

fn close_connections(connections: Vec<Connection>) {
    info!("Closing {} live connection(s)", connections.len());
    for connection in connections {
        connection.close();
    }
}
