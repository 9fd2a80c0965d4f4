use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::engine::ids::RideIdAllocator;
use crate::hub::ClientHub;
use crate::models::events::ServerEvent;
use crate::observability::metrics::Metrics;
use crate::presence::PresenceRegistry;
use crate::rides::RideStore;
use crate::storage::Storage;

/// Process-wide dispatch state. Owned here and injected into every
/// connection handler as `Arc<AppState>`, never reached through globals.
pub struct AppState {
    pub presence: PresenceRegistry,
    pub rides: RideStore,
    pub hub: ClientHub,
    pub storage: Arc<dyn Storage>,
    pub ids: RideIdAllocator,
    pub metrics: Metrics,
    pub client_buffer_size: usize,
    pub stale_after: chrono::Duration,
    pub sweep_interval: Duration,
    pub ride_purge_delay: Duration,
}

impl AppState {
    pub fn new(config: &Config, storage: Arc<dyn Storage>) -> Self {
        Self {
            presence: PresenceRegistry::new(),
            rides: RideStore::new(),
            hub: ClientHub::new(),
            ids: RideIdAllocator::new(storage.clone()),
            storage,
            metrics: Metrics::new(),
            client_buffer_size: config.client_buffer_size,
            stale_after: chrono::Duration::seconds(config.stale_after_secs as i64),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
            ride_purge_delay: Duration::from_secs(config.ride_purge_delay_secs),
        }
    }

    /// Recompute the online-driver list and push it to every connection as
    /// a full replace. Returns the delivered count.
    pub fn broadcast_presence(&self) -> usize {
        let drivers = self.presence.list_online();
        self.metrics.drivers_online.set(drivers.len() as i64);
        self.metrics.broadcasts_total.inc();
        self.hub
            .broadcast(&ServerEvent::DriverLocationsUpdate { drivers })
    }
}
