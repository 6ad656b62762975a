//! Test fixtures for dispatch-relay.
//!
//! Provides:
//! - Constructors for vehicles and incidents with sensible defaults
//! - A fixed clock so traffic factors and timestamps are deterministic
//! - A static vehicle lookup for update-request tests
#![allow(dead_code)]

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use dispatch_relay::geo::Coordinate;
use dispatch_relay::model::{
    EmergencyKind, Incident, IncidentStatus, Priority, Vehicle, VehicleStatus,
};
use dispatch_relay::traits::{Clock, VehicleFix, VehicleLookup};

pub fn coord(lat: f64, lng: f64) -> Coordinate {
    Coordinate::new(lat, lng).unwrap()
}

/// A fire engine parked at Times Square, available, unassigned.
pub fn vehicle(id: &str) -> Vehicle {
    Vehicle {
        id: id.to_string(),
        call_sign: format!("Unit {id}"),
        kind: EmergencyKind::Fire,
        status: VehicleStatus::Available,
        location: coord(40.7589, -73.9851),
        current_incident: None,
        eta: None,
    }
}

/// A vehicle dispatched to the given incident.
pub fn responding_vehicle(id: &str, incident_id: &str) -> Vehicle {
    let mut v = vehicle(id);
    v.status = VehicleStatus::Dispatched;
    v.current_incident = Some(incident_id.to_string());
    v
}

/// An active high-priority fire at the Empire State Building.
pub fn incident(id: &str) -> Incident {
    Incident {
        id: id.to_string(),
        kind: EmergencyKind::Fire,
        priority: Priority::High,
        location: coord(40.7484, -73.9857),
        status: IncidentStatus::Active,
    }
}

/// Clock pinned to one instant and one local hour.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    pub hour: u32,
    pub instant: DateTime<Utc>,
}

impl FixedClock {
    pub fn at_hour(hour: u32) -> Self {
        let instant = DateTime::parse_from_rfc3339("2026-08-07T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        Self { hour, instant }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.instant
    }

    fn local_hour(&self) -> u32 {
        self.hour
    }
}

/// Lookup backed by a fixed map of vehicle fixes.
#[derive(Debug, Default)]
pub struct StaticLookup {
    fixes: HashMap<String, VehicleFix>,
}

impl StaticLookup {
    pub fn with_fix(mut self, vehicle_id: &str, fix: VehicleFix) -> Self {
        self.fixes.insert(vehicle_id.to_string(), fix);
        self
    }
}

impl VehicleLookup for StaticLookup {
    fn vehicle_fix(&self, vehicle_id: &str) -> Option<VehicleFix> {
        self.fixes.get(vehicle_id).copied()
    }
}

/// A canned fix used across session tests.
pub fn sample_fix() -> VehicleFix {
    VehicleFix {
        location: coord(40.7589, -73.9851),
        heading: 45.0,
        speed: 25.0,
    }
}
