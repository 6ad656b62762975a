//! Provider traits for the dispatch coordination core.
//!
//! These are intentionally minimal and side-effect-light. Concrete apps
//! (and tests) supply their own implementations; the core never reaches
//! for wall-clock time or external state directly.

use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// Provides timestamps for envelopes and the local hour for traffic
/// estimation.
///
/// Injected rather than read from the system so tests can pin the hour
/// (and with it the traffic factor) deterministically.
pub trait Clock {
    /// Current instant, used to stamp outbound envelopes.
    fn now(&self) -> DateTime<Utc>;

    /// Local hour of day in `[0, 23]`, used by the traffic model.
    fn local_hour(&self) -> u32;
}

/// System clock: UTC timestamps, local-timezone hour.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_hour(&self) -> u32 {
        chrono::Local::now().hour()
    }
}

/// Current position report for a vehicle, as served to clients that
/// request a live update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleFix {
    /// Last known position.
    pub location: Coordinate,
    /// Heading in degrees clockwise from north.
    pub heading: f64,
    /// Speed in miles per hour.
    pub speed: f64,
}

/// Resolves per-vehicle live state owned by an external collaborator
/// (the persistence layer in a full deployment).
pub trait VehicleLookup {
    /// Current fix for a vehicle, or `None` if the id is unknown.
    fn vehicle_fix(&self, vehicle_id: &str) -> Option<VehicleFix>;
}

/// Shared clock handle as stored by long-lived services.
pub type SharedClock = Arc<dyn Clock + Send + Sync>;

/// Shared lookup handle as stored by long-lived services.
pub type SharedVehicleLookup = Arc<dyn VehicleLookup + Send + Sync>;
