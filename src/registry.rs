//! Connection registry: the single owner of live client channels.
//!
//! Tracks every connected client, its subscription tags, and the sending
//! half of its outbound channel. Fan-out serializes an envelope once and
//! pushes it to each matching channel; the per-connection writer task does
//! the actual socket I/O, so one slow client never delays another. A
//! failed channel send means the client is gone and is treated as an
//! implicit disconnect, never surfaced to the broadcaster.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::model::Envelope;
use crate::traits::{SharedClock, SystemClock};

/// Sending half of a client's outbound channel, registered on connect.
pub type ClientSender = mpsc::UnboundedSender<String>;

struct Connection {
    tx: ClientSender,
    connected_at: DateTime<Utc>,
    subscriptions: HashSet<String>,
}

/// Introspection view of one connection, served by the stats route.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub client_id: String,
    pub connected_at: DateTime<Utc>,
    pub subscriptions: Vec<String>,
}

/// Registry of live connections keyed by client id.
///
/// Explicitly constructed and passed by reference (no process-wide
/// global), so tests get isolated instances.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, Connection>>,
    /// Tracked atomically so `count()` never takes the lock.
    active_count: AtomicUsize,
    clock: SharedClock,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Registry with an injected clock (fixed timestamps in tests).
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            active_count: AtomicUsize::new(0),
            clock,
        }
    }

    /// Accept a connection and return its client id.
    ///
    /// Generates a v4 UUID when the client did not supply an id. If the id
    /// is already registered the new connection replaces the old one (the
    /// stale channel is dropped, which ends its writer task). The new
    /// client immediately receives a connection-confirmation envelope.
    pub async fn register(&self, tx: ClientSender, client_id: Option<String>) -> String {
        let client_id = client_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let connection = Connection {
            tx,
            connected_at: self.clock.now(),
            subscriptions: HashSet::new(),
        };

        {
            let mut connections = self.connections.write().await;
            if connections.insert(client_id.clone(), connection).is_none() {
                self.active_count.fetch_add(1, Ordering::Relaxed);
            }
        }
        debug!(client_id = %client_id, "client connected");

        let confirmation = Envelope::new(
            "connection",
            json!({ "status": "connected", "client_id": &client_id }),
            self.clock.now(),
        );
        self.send_to(&client_id, &confirmation).await;

        client_id
    }

    /// Remove a connection. Idempotent; unknown ids are a no-op.
    pub async fn unregister(&self, client_id: &str) -> bool {
        let removed = {
            let mut connections = self.connections.write().await;
            connections.remove(client_id).is_some()
        };
        if removed {
            self.active_count.fetch_sub(1, Ordering::Relaxed);
            debug!(client_id = %client_id, "client disconnected");
        }
        removed
    }

    /// Send one envelope to one client.
    ///
    /// Returns `false` for unknown clients. A failed send removes the
    /// connection (implicit disconnect) and also returns `false`; the
    /// failure never propagates to the caller.
    pub async fn send_to(&self, client_id: &str, envelope: &Envelope) -> bool {
        let Some(payload) = serialize(envelope) else {
            return false;
        };

        let failed = {
            let connections = self.connections.read().await;
            match connections.get(client_id) {
                Some(connection) => connection.tx.send(payload).is_err(),
                None => return false,
            }
        };

        if failed {
            warn!(client_id = %client_id, "send failed, dropping connection");
            self.unregister(client_id).await;
            return false;
        }
        true
    }

    /// Send an envelope to every connection, optionally excluding one
    /// client. Returns the number of clients the envelope was queued for.
    pub async fn broadcast(&self, envelope: &Envelope, exclude_client: Option<&str>) -> usize {
        self.fan_out(envelope, |client_id, _| Some(client_id) != exclude_client)
            .await
    }

    /// Send an envelope only to connections subscribed to `category`.
    pub async fn broadcast_filtered(&self, envelope: &Envelope, category: &str) -> usize {
        self.fan_out(envelope, |_, connection| {
            connection.subscriptions.contains(category)
        })
        .await
    }

    /// Serialize once, queue to every matching connection, then drop any
    /// connection whose channel is closed. One dead client never aborts
    /// delivery to the rest.
    async fn fan_out(
        &self,
        envelope: &Envelope,
        include: impl Fn(&str, &Connection) -> bool,
    ) -> usize {
        let Some(payload) = serialize(envelope) else {
            return 0;
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        {
            let connections = self.connections.read().await;
            for (client_id, connection) in connections.iter() {
                if !include(client_id, connection) {
                    continue;
                }
                if connection.tx.send(payload.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(client_id.clone());
                }
            }
        }
        debug!(kind = %envelope.kind, delivered, "broadcast envelope");

        if !dead.is_empty() {
            let mut connections = self.connections.write().await;
            for client_id in &dead {
                if connections.remove(client_id).is_some() {
                    self.active_count.fetch_sub(1, Ordering::Relaxed);
                    warn!(client_id = %client_id, "send failed, dropping connection");
                }
            }
        }

        delivered
    }

    /// Add a subscription tag for a client. Idempotent. Returns `false`
    /// for unknown clients and for empty tags (the only tag validation).
    pub async fn add_subscription(&self, client_id: &str, category: &str) -> bool {
        if category.is_empty() {
            return false;
        }
        let mut connections = self.connections.write().await;
        match connections.get_mut(client_id) {
            Some(connection) => {
                connection.subscriptions.insert(category.to_string());
                true
            }
            None => false,
        }
    }

    /// Remove a subscription tag for a client. Idempotent; removing a tag
    /// that was never added is a no-op.
    pub async fn remove_subscription(&self, client_id: &str, category: &str) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get_mut(client_id) {
            Some(connection) => {
                connection.subscriptions.remove(category);
                true
            }
            None => false,
        }
    }

    /// Number of live connections.
    pub fn count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    /// Stable view of all connections for introspection, sorted by
    /// client id.
    pub async fn snapshot(&self) -> Vec<ConnectionInfo> {
        let connections = self.connections.read().await;
        let mut infos: Vec<ConnectionInfo> = connections
            .iter()
            .map(|(client_id, connection)| {
                let mut subscriptions: Vec<String> =
                    connection.subscriptions.iter().cloned().collect();
                subscriptions.sort();
                ConnectionInfo {
                    client_id: client_id.clone(),
                    connected_at: connection.connected_at,
                    subscriptions,
                }
            })
            .collect();
        infos.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        infos
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn serialize(envelope: &Envelope) -> Option<String> {
    match serde_json::to_string(envelope) {
        Ok(payload) => Some(payload),
        Err(error) => {
            warn!(kind = %envelope.kind, %error, "failed to serialize envelope");
            None
        }
    }
}
