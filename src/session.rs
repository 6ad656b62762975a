//! Per-connection session protocol.
//!
//! One [`EventSession`] runs for each connection's lifetime and interprets
//! the client's inbound control messages; many sessions run concurrently
//! and independently. The transport layer feeds raw text frames in and
//! calls [`EventSession::close`] when the channel ends.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::model::Envelope;
use crate::registry::ConnectionRegistry;
use crate::traits::{SharedClock, SharedVehicleLookup};

/// Session lifecycle. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Registered, no inbound traffic yet.
    Connected,
    /// At least one inbound message handled.
    Active,
    /// Unregistered; further input is ignored.
    Closed,
}

/// Inbound control messages, tagged by `type`.
///
/// Unknown types deserialize to `Unknown` and are ignored so newer clients
/// can speak to older servers.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Subscribe {
        #[serde(default)]
        events: Vec<String>,
    },
    Unsubscribe {
        #[serde(default)]
        events: Vec<String>,
    },
    Ping,
    RequestUpdate {
        update_type: String,
        #[serde(default)]
        vehicle_id: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// Protocol handler for one connection.
pub struct EventSession {
    client_id: String,
    registry: Arc<ConnectionRegistry>,
    lookup: SharedVehicleLookup,
    clock: SharedClock,
    state: SessionState,
}

impl EventSession {
    pub fn new(
        client_id: String,
        registry: Arc<ConnectionRegistry>,
        lookup: SharedVehicleLookup,
        clock: SharedClock,
    ) -> Self {
        Self {
            client_id,
            registry,
            lookup,
            clock,
            state: SessionState::Connected,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handle one raw inbound frame.
    ///
    /// Unparseable input gets an `error` envelope back and the connection
    /// stays open; unknown message types are ignored.
    pub async fn handle_text(&mut self, raw: &str) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Active;

        match serde_json::from_str::<ClientMessage>(raw) {
            Ok(message) => self.dispatch(message).await,
            Err(error) => {
                debug!(client_id = %self.client_id, %error, "malformed client message");
                self.reply(
                    "error",
                    json!({ "message": format!("invalid message: {error}") }),
                )
                .await;
            }
        }
    }

    async fn dispatch(&self, message: ClientMessage) {
        match message {
            ClientMessage::Subscribe { events } => {
                let mut accepted = Vec::new();
                for event in &events {
                    if self.registry.add_subscription(&self.client_id, event).await {
                        accepted.push(event.clone());
                    }
                }
                self.reply("subscription_confirmed", json!({ "events": accepted }))
                    .await;
            }
            ClientMessage::Unsubscribe { events } => {
                for event in &events {
                    self.registry
                        .remove_subscription(&self.client_id, event)
                        .await;
                }
            }
            ClientMessage::Ping => {
                self.reply("pong", json!({})).await;
            }
            ClientMessage::RequestUpdate {
                update_type,
                vehicle_id,
            } => {
                self.handle_update_request(&update_type, vehicle_id).await;
            }
            ClientMessage::Unknown => {
                // Forward-compatible: newer clients may send types this
                // server does not know yet.
            }
        }
    }

    async fn handle_update_request(&self, update_type: &str, vehicle_id: Option<String>) {
        if update_type != "vehicle_location" {
            debug!(client_id = %self.client_id, update_type, "unsupported update request");
            return;
        }
        let Some(vehicle_id) = vehicle_id else {
            self.reply(
                "error",
                json!({ "message": "request_update requires a vehicle_id" }),
            )
            .await;
            return;
        };

        match self.lookup.vehicle_fix(&vehicle_id) {
            Some(fix) => {
                let mut data = match serde_json::to_value(fix) {
                    Ok(Value::Object(map)) => map,
                    _ => return,
                };
                data.insert("vehicle_id".to_string(), Value::String(vehicle_id));
                self.reply("vehicle_location", Value::Object(data)).await;
            }
            None => {
                // Unknown vehicle: nothing to report, connection unaffected.
                debug!(client_id = %self.client_id, vehicle_id = %vehicle_id, "vehicle not found");
            }
        }
    }

    async fn reply(&self, kind: &str, data: Value) {
        let envelope = Envelope::new(kind, data, self.clock.now());
        self.registry.send_to(&self.client_id, &envelope).await;
    }

    /// Terminate the session and remove its registry entry.
    ///
    /// Idempotent, and safe to call after the registry already dropped the
    /// connection on a failed send; both paths converge on the same state.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        self.registry.unregister(&self.client_id).await;
    }
}
