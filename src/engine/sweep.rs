use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::state::AppState;

/// Periodic eviction of drivers that have been offline past the stale
/// threshold. Presence is re-broadcast only when something was removed.
pub async fn run_presence_sweep(state: Arc<AppState>) {
    info!(
        interval_secs = state.sweep_interval.as_secs(),
        stale_after_secs = state.stale_after.num_seconds(),
        "presence sweep started"
    );

    let mut ticker = tokio::time::interval(state.sweep_interval);
    // The first tick fires immediately; skip it so a fresh process does not
    // sweep an empty registry.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let removed = state.presence.evict_stale(Utc::now(), state.stale_after);
        debug!(
            drivers = state.presence.len(),
            rides = state.rides.len(),
            connections = state.hub.connection_count(),
            "sweep pass"
        );

        if removed > 0 {
            info!(removed, "evicted stale offline drivers");
            state.broadcast_presence();
        }
    }
}
