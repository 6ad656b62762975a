//! Typed broadcast facade over the connection registry.
//!
//! One helper per event category. Each assembles the category's payload
//! into an [`Envelope`] with the current timestamp and hands it to the
//! registry; it holds no state of its own and makes no filtering
//! decisions. External collaborators call these after a persistence
//! mutation commits.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::model::{Envelope, IncidentStatus, TrafficReport};
use crate::registry::ConnectionRegistry;
use crate::traits::{SharedClock, SystemClock, VehicleFix};

/// Broadcast helpers for the five event categories.
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
    clock: SharedClock,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self::with_clock(registry, Arc::new(SystemClock))
    }

    pub fn with_clock(registry: Arc<ConnectionRegistry>, clock: SharedClock) -> Self {
        Self { registry, clock }
    }

    fn envelope(&self, kind: &str, data: Value) -> Envelope {
        Envelope::new(kind, data, self.clock.now())
    }

    /// Push a vehicle position update to all clients. Returns the number
    /// of clients reached.
    pub async fn vehicle_location(&self, vehicle_id: &str, fix: &VehicleFix) -> usize {
        let envelope = self.envelope(
            "vehicle_location",
            json!({
                "vehicle_id": vehicle_id,
                "location": fix.location,
                "heading": fix.heading,
                "speed": fix.speed,
            }),
        );
        self.registry.broadcast(&envelope, None).await
    }

    /// Push an incident status change, with optional extra payload fields
    /// merged alongside the id and status.
    pub async fn incident_status(
        &self,
        incident_id: &str,
        status: IncidentStatus,
        extra: Option<Map<String, Value>>,
    ) -> usize {
        let mut data = Map::new();
        data.insert("incident_id".to_string(), json!(incident_id));
        data.insert("status".to_string(), json!(status));
        if let Some(extra) = extra {
            data.extend(extra);
        }

        let envelope = self.envelope("incident_status", Value::Object(data));
        self.registry.broadcast(&envelope, None).await
    }

    /// Push a route-optimization update for one vehicle on one incident.
    /// `details` carries the computed payload (new ETA, waypoints, ...).
    pub async fn route_optimization(
        &self,
        incident_id: &str,
        vehicle_id: &str,
        details: Value,
    ) -> usize {
        let mut data = Map::new();
        data.insert("incident_id".to_string(), json!(incident_id));
        data.insert("vehicle_id".to_string(), json!(vehicle_id));
        match details {
            Value::Object(fields) => data.extend(fields),
            Value::Null => {}
            other => {
                data.insert("details".to_string(), other);
            }
        }

        let envelope = self.envelope("route_optimization", Value::Object(data));
        self.registry.broadcast(&envelope, None).await
    }

    /// Push a traffic condition report.
    pub async fn traffic_update(&self, report: &TrafficReport) -> usize {
        let envelope = self.envelope(
            "traffic_update",
            serde_json::to_value(report).unwrap_or(Value::Null),
        );
        self.registry.broadcast(&envelope, None).await
    }

    /// Push a generic system notification.
    pub async fn notification(&self, data: Value) -> usize {
        let envelope = self.envelope("new_notification", data);
        self.registry.broadcast(&envelope, None).await
    }
}
