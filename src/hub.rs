use std::collections::HashSet;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::models::events::ServerEvent;

pub type ConnectionId = Uuid;

/// Group channel every registered driver joins.
pub const ALL_DRIVERS: &str = "allDrivers";

pub fn driver_channel(driver_id: &str) -> String {
    format!("driver_{driver_id}")
}

/// The connected-clients interface: unicast by connection id, multicast by
/// named channel (a user id or `driver_<id>`), broadcast to everyone.
/// Delivery is fire-and-forget over each connection's bounded outbox; a full
/// or closed outbox drops the event.
pub struct ClientHub {
    clients: DashMap<ConnectionId, mpsc::Sender<ServerEvent>>,
    channels: DashMap<String, HashSet<ConnectionId>>,
}

impl ClientHub {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
            channels: DashMap::new(),
        }
    }

    pub fn register(&self, connection_id: ConnectionId, outbox: mpsc::Sender<ServerEvent>) {
        self.clients.insert(connection_id, outbox);
    }

    /// Drop a connection and every channel membership it held.
    pub fn unregister(&self, connection_id: ConnectionId) {
        self.clients.remove(&connection_id);
        self.channels.retain(|_, members| {
            members.remove(&connection_id);
            !members.is_empty()
        });
    }

    pub fn join(&self, channel: &str, connection_id: ConnectionId) {
        self.channels
            .entry(channel.to_string())
            .or_default()
            .insert(connection_id);
    }

    /// Deliver to every connected client. Returns the delivered count.
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        let mut delivered = 0;
        for entry in self.clients.iter() {
            if entry.value().try_send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!(connection_id = %entry.key(), "dropped event for saturated connection");
            }
        }
        delivered
    }

    /// Deliver to every member of a channel. Returns the delivered count.
    pub fn publish(&self, channel: &str, event: &ServerEvent) -> usize {
        let Some(members) = self.channels.get(channel) else {
            return 0;
        };

        let mut delivered = 0;
        for connection_id in members.iter() {
            if let Some(outbox) = self.clients.get(connection_id) {
                if outbox.try_send(event.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Unicast reply to the connection that asked.
    pub fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        match self.clients.get(&connection_id) {
            Some(outbox) => outbox.try_send(event).is_ok(),
            None => false,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.clients.len()
    }
}

impl Default for ClientHub {
    fn default() -> Self {
        Self::new()
    }
}
