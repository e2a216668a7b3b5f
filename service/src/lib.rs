use config::Config;
use events::EventPublisher;
use hub::collaborators::jwt::JwtVerifier;
use hub::collaborators::memory::InMemoryGroupStore;
use hub::{registry, HubEventHandler, Manager};
use log::info;
use std::sync::Arc;

pub mod config;
pub mod logging;

/// Builds the process-wide hub from configuration.
///
/// Group membership and history live in the in-process store, seeded from
/// `group_seed`. Must be called from within the tokio runtime.
pub fn init_hub(config: &Config) -> Manager {
    let store = Arc::new(InMemoryGroupStore::new());
    if let Some(seed) = &config.group_seed {
        for (group_id, members) in &seed.0 {
            for user_id in members {
                store.add_member(*group_id, *user_id);
            }
        }
        info!("Seeded {} group(s) into the group store", seed.0.len());
    }

    Manager::new(
        config.hub_settings(),
        registry::build(config.registry_mode),
        Arc::new(JwtVerifier::new(config.jwt_secret())),
        store.clone(),
        store,
    )
}

// Service-level state containing only infrastructure concerns
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub hub: Manager,
    pub event_publisher: Arc<EventPublisher>,
}

impl AppState {
    pub fn new(app_config: Config, hub: Manager) -> Self {
        let event_publisher =
            EventPublisher::new().with_handler(Arc::new(HubEventHandler::new(hub.clone())));
        Self {
            config: app_config,
            hub,
            event_publisher: Arc::new(event_publisher),
        }
    }
}
