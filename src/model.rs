//! Domain records and wire shapes for the dispatch coordination core.
//!
//! These mirror what the surrounding application persists; this crate only
//! reads them to compute estimates and to shape broadcast payloads. Wire
//! spellings (`"on-scene"`, `"fire"`, ...) are fixed by the dashboard
//! clients and must not drift.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geo::Coordinate;

/// Category of emergency an incident belongs to (and a vehicle serves).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmergencyKind {
    Fire,
    Medical,
    Police,
    Rescue,
    Hazmat,
    Traffic,
    Marine,
}

/// Incident priority. `Critical` bypasses vehicle-type filtering when
/// ranking nearest units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

/// Lifecycle status of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncidentStatus {
    Active,
    Dispatched,
    OnScene,
    Resolved,
    Cancelled,
}

/// Operational status of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VehicleStatus {
    Available,
    Dispatched,
    OnScene,
    Returning,
    Maintenance,
    Offline,
}

/// Congestion classification derived from the traffic factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficLevel {
    Light,
    Moderate,
    Heavy,
}

/// An incident as handed to this core by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EmergencyKind,
    pub priority: Priority,
    pub location: Coordinate,
    pub status: IncidentStatus,
}

/// A vehicle as handed to this core by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub call_sign: String,
    #[serde(rename = "type")]
    pub kind: EmergencyKind,
    pub status: VehicleStatus,
    pub location: Coordinate,
    /// Incident this vehicle is currently assigned to, if any.
    pub current_incident: Option<String>,
    /// Display ETA, refreshed on route recalculation.
    pub eta: Option<String>,
}

/// Partial vehicle update: every field optional, only present fields
/// applied. Replaces ad hoc patch objects with an explicit contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleStatusPatch {
    pub status: Option<VehicleStatus>,
    pub location: Option<Coordinate>,
    pub current_incident: Option<String>,
    pub eta: Option<String>,
}

impl VehicleStatusPatch {
    /// Apply the present fields to `vehicle`, leaving the rest untouched.
    pub fn apply(&self, vehicle: &mut Vehicle) {
        if let Some(status) = self.status {
            vehicle.status = status;
        }
        if let Some(location) = self.location {
            vehicle.location = location;
        }
        if let Some(incident) = &self.current_incident {
            vehicle.current_incident = Some(incident.clone());
        }
        if let Some(eta) = &self.eta {
            vehicle.eta = Some(eta.clone());
        }
    }
}

/// A comparative route option produced alongside the primary estimate.
///
/// Immutable once generated; a fresh set is produced per estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteAlternative {
    pub label: String,
    pub distance_meters: f64,
    pub duration_seconds: u32,
    pub traffic: TrafficLevel,
}

/// Estimated route for one vehicle to one incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEstimate {
    pub vehicle_id: String,
    /// Interpolated path from the vehicle's position (first point) to the
    /// incident's position (last point).
    pub waypoints: Vec<Coordinate>,
    pub distance_meters: f64,
    pub duration_seconds: u32,
    pub traffic: TrafficLevel,
    pub alternatives: Vec<RouteAlternative>,
}

/// One entry in an optimization result's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationEvent {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub vehicles_affected: u32,
    /// Simulated figure, not a measurement.
    pub estimated_seconds_saved: u32,
}

/// Routes for every vehicle responding to one incident, plus the
/// append-only history of optimization passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteOptimizationResult {
    pub incident_id: String,
    pub routes: BTreeMap<String, RouteEstimate>,
    pub history: Vec<OptimizationEvent>,
}

/// Simulated traffic condition report for an area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficReport {
    pub area: String,
    pub severity: TrafficLevel,
    pub description: String,
    pub estimated_delay_minutes: u32,
}

/// The canonical unit sent over a live connection, in either direction.
///
/// Serialized exactly once per fan-out; a send either delivers the whole
/// envelope or nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, data: Value, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: kind.into(),
            data,
            timestamp,
        }
    }
}
