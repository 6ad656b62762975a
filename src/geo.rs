//! Geospatial estimation primitives.
//!
//! Great-circle distance plus a deterministic time-of-day traffic model.
//! Estimates are intentionally approximate (no road network): good enough
//! to rank units and drive live dashboards, not to navigate by.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::model::{EmergencyKind, RouteAlternative, TrafficLevel};

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Average emergency-vehicle speed in meters per second (~25 mph).
const BASE_SPEED_MPS: f64 = 11.18;

/// Maximum cosmetic perturbation applied to interpolated waypoints, in
/// degrees.
const WAYPOINT_JITTER_DEG: f64 = 0.001;

/// Invalid input to an estimator function. Always the caller's bug;
/// never retried.
#[derive(Debug, thiserror::Error)]
pub enum EstimateError {
    /// Latitude or longitude outside its valid range, or not finite.
    #[error("coordinate out of range: ({latitude}, {longitude})")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    /// Travel time requested for a negative or non-finite distance.
    #[error("distance must be a non-negative number, got {0}")]
    InvalidDistance(f64),

    /// A waypoint sequence needs at least origin and destination.
    #[error("waypoint count must be at least 2, got {0}")]
    WaypointCount(usize),
}

/// A validated (latitude, longitude) pair in degrees.
///
/// Construction is the only place validation happens; everything downstream
/// can assume the ranges hold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    /// Creates a coordinate, rejecting non-finite values and values outside
    /// latitude `[-90, 90]` / longitude `[-180, 180]`.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, EstimateError> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        if valid {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(EstimateError::InvalidCoordinate {
                latitude,
                longitude,
            })
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Haversine (great-circle) distance between two coordinates in meters.
///
/// Symmetric, and zero for identical points.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude().to_radians();
    let lat2 = b.latitude().to_radians();
    let delta_lat = (b.latitude() - a.latitude()).to_radians();
    let delta_lng = (b.longitude() - a.longitude()).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Congestion multiplier for a local hour of day.
///
/// Rush hours slow traffic the most, daytime less, late evening barely,
/// night not at all. The arms are checked in order, so no hour is counted
/// twice. Callers pass an hour in `[0, 23]` (anything else falls through to
/// the night factor).
pub fn traffic_factor(hour: u32) -> f64 {
    match hour {
        7..=9 | 17..=19 => 2.0,
        10..=16 => 1.5,
        6..=22 => 1.2,
        _ => 1.0,
    }
}

/// Travel time in whole seconds for a distance at a given traffic factor.
///
/// Effective speed is the base speed divided by the factor; the result is
/// floored to integer seconds.
pub fn travel_time_seconds(distance_meters: f64, factor: f64) -> Result<u32, EstimateError> {
    if !distance_meters.is_finite() || distance_meters < 0.0 {
        return Err(EstimateError::InvalidDistance(distance_meters));
    }
    let adjusted_speed = BASE_SPEED_MPS / factor;
    Ok((distance_meters / adjusted_speed).floor() as u32)
}

/// Classify a traffic factor into the level shown to operators.
pub fn classify_traffic(factor: f64) -> TrafficLevel {
    if factor >= 1.8 {
        TrafficLevel::Heavy
    } else if factor >= 1.3 {
        TrafficLevel::Moderate
    } else {
        TrafficLevel::Light
    }
}

/// Linearly interpolate `count` waypoints from `origin` to `destination`.
///
/// The first point is exactly `origin` and the last exactly `destination`.
/// Intermediate points get a small random perturbation (up to
/// ±0.001 degrees) to suggest road curvature on a map; the jitter is
/// cosmetic and never feeds distance or time calculations.
pub fn interpolate_waypoints(
    origin: Coordinate,
    destination: Coordinate,
    count: usize,
    rng: &mut impl Rng,
) -> Result<Vec<Coordinate>, EstimateError> {
    if count < 2 {
        return Err(EstimateError::WaypointCount(count));
    }

    let mut points = Vec::with_capacity(count);
    points.push(origin);

    for i in 1..count - 1 {
        let progress = i as f64 / (count - 1) as f64;
        let lat = origin.latitude()
            + (destination.latitude() - origin.latitude()) * progress
            + rng.random_range(-WAYPOINT_JITTER_DEG..=WAYPOINT_JITTER_DEG);
        let lng = origin.longitude()
            + (destination.longitude() - origin.longitude()) * progress
            + rng.random_range(-WAYPOINT_JITTER_DEG..=WAYPOINT_JITTER_DEG);
        // Jitter near a pole or the antimeridian could nudge a point out of
        // range; clamp so the point stays constructible.
        points.push(Coordinate::new(
            lat.clamp(-90.0, 90.0),
            lng.clamp(-180.0, 180.0),
        )?);
    }

    points.push(destination);
    Ok(points)
}

/// Produce comparative route options for a base estimate.
///
/// The highway and surface-street options are always present, in that
/// order. An emergency corridor is available with probability 0.5 per call
/// and, when present, is appended last.
pub fn generate_alternatives(
    base_distance_meters: f64,
    base_duration_seconds: u32,
    rng: &mut impl Rng,
) -> Vec<RouteAlternative> {
    let base_duration = base_duration_seconds as f64;
    let mut alternatives = vec![
        RouteAlternative {
            label: "Via Highway".to_string(),
            distance_meters: base_distance_meters * 1.2,
            duration_seconds: (base_duration * 0.8) as u32,
            traffic: TrafficLevel::Light,
        },
        RouteAlternative {
            label: "Via Surface Streets".to_string(),
            distance_meters: base_distance_meters * 0.9,
            duration_seconds: (base_duration * 1.3) as u32,
            traffic: TrafficLevel::Moderate,
        },
    ];

    if rng.random_bool(0.5) {
        alternatives.push(RouteAlternative {
            label: "Emergency Corridor".to_string(),
            distance_meters: base_distance_meters * 1.1,
            duration_seconds: (base_duration * 0.6) as u32,
            traffic: TrafficLevel::Light,
        });
    }

    alternatives
}

/// A unit considered by [`rank_nearest`].
#[derive(Debug, Clone)]
pub struct UnitCandidate<I> {
    pub id: I,
    pub position: Coordinate,
    pub kind: EmergencyKind,
}

/// Rank candidates by great-circle distance from `origin`, ascending.
///
/// A candidate is included only if its kind matches `kind` — unless
/// `priority_override` is set (critical incidents take any unit) — and it
/// lies within `max_distance_meters`. Callers truncate the result to
/// however many units they want to consider.
pub fn rank_nearest<I: Clone>(
    origin: Coordinate,
    candidates: &[UnitCandidate<I>],
    kind: EmergencyKind,
    priority_override: bool,
    max_distance_meters: f64,
) -> Vec<(I, f64)> {
    let mut ranked: Vec<(I, f64)> = candidates
        .iter()
        .filter(|candidate| priority_override || candidate.kind == kind)
        .map(|candidate| (candidate.id.clone(), distance_meters(candidate.position, origin)))
        .filter(|(_, distance)| *distance <= max_distance_meters)
        .collect();

    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    ranked
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    fn coord(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    #[test]
    fn test_coordinate_rejects_out_of_range() {
        assert!(Coordinate::new(90.1, 0.0).is_err());
        assert!(Coordinate::new(-90.1, 0.0).is_err());
        assert!(Coordinate::new(0.0, 180.5).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_err());
        assert!(Coordinate::new(90.0, -180.0).is_ok());
    }

    #[test]
    fn test_distance_same_point_is_zero() {
        let p = coord(40.7589, -73.9851);
        assert!(distance_meters(p, p).abs() < 1e-6);
    }

    #[test]
    fn test_distance_symmetric() {
        let a = coord(40.7589, -73.9851);
        let b = coord(40.6892, -74.0445);
        let ab = distance_meters(a, b);
        let ba = distance_meters(b, a);
        assert!((ab - ba).abs() < 1e-9, "expected symmetry, got {ab} vs {ba}");
    }

    #[test]
    fn test_distance_known_nyc_pair() {
        // Times Square to the Empire State Building, roughly 1.17 km.
        let times_square = coord(40.7589, -73.9851);
        let empire_state = coord(40.7484, -73.9857);
        let d = distance_meters(times_square, empire_state);
        assert!(
            (1150.0..1200.0).contains(&d),
            "expected ~1.17km, got {d}"
        );
    }

    #[test]
    fn test_traffic_factor_table() {
        // Rush hours.
        for hour in [7, 8, 9, 17, 18, 19] {
            assert_eq!(traffic_factor(hour), 2.0, "hour {hour}");
        }
        // Daytime.
        for hour in [10, 13, 16] {
            assert_eq!(traffic_factor(hour), 1.5, "hour {hour}");
        }
        // Early morning and evening.
        for hour in [6, 20, 21, 22] {
            assert_eq!(traffic_factor(hour), 1.2, "hour {hour}");
        }
        // Night.
        for hour in [23, 0, 3, 5] {
            assert_eq!(traffic_factor(hour), 1.0, "hour {hour}");
        }
    }

    #[test]
    fn test_travel_time_base_speed() {
        // 11180 m at 11.18 m/s with no congestion is exactly 1000 s.
        assert_eq!(travel_time_seconds(11_180.0, 1.0).unwrap(), 1000);
    }

    #[test]
    fn test_travel_time_scales_with_factor() {
        let clear = travel_time_seconds(11_180.0, 1.0).unwrap();
        let rush = travel_time_seconds(11_180.0, 2.0).unwrap();
        assert_eq!(rush, clear * 2);
    }

    #[test]
    fn test_travel_time_floors() {
        // 100 m at 11.18 m/s = 8.94... seconds.
        assert_eq!(travel_time_seconds(100.0, 1.0).unwrap(), 8);
    }

    #[test]
    fn test_travel_time_rejects_negative_distance() {
        assert!(travel_time_seconds(-1.0, 1.0).is_err());
        assert!(travel_time_seconds(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_classify_traffic_boundaries() {
        assert_eq!(classify_traffic(2.0), TrafficLevel::Heavy);
        assert_eq!(classify_traffic(1.8), TrafficLevel::Heavy);
        assert_eq!(classify_traffic(1.5), TrafficLevel::Moderate);
        assert_eq!(classify_traffic(1.3), TrafficLevel::Moderate);
        assert_eq!(classify_traffic(1.2), TrafficLevel::Light);
        assert_eq!(classify_traffic(1.0), TrafficLevel::Light);
    }

    #[test]
    fn test_interpolate_endpoints_exact() {
        let mut rng = SmallRng::seed_from_u64(7);
        let origin = coord(40.7589, -73.9851);
        let destination = coord(40.6892, -74.0445);
        let points = interpolate_waypoints(origin, destination, 5, &mut rng).unwrap();

        assert_eq!(points.len(), 5);
        assert_eq!(points[0], origin);
        assert_eq!(points[4], destination);
    }

    #[test]
    fn test_interpolate_jitter_bounded() {
        let mut rng = SmallRng::seed_from_u64(11);
        let origin = coord(40.0, -74.0);
        let destination = coord(41.0, -73.0);
        let points = interpolate_waypoints(origin, destination, 6, &mut rng).unwrap();

        for (i, p) in points.iter().enumerate().skip(1).take(4) {
            let progress = i as f64 / 5.0;
            let expected_lat = origin.latitude() + progress;
            let expected_lng = origin.longitude() + progress;
            assert!((p.latitude() - expected_lat).abs() <= WAYPOINT_JITTER_DEG + 1e-12);
            assert!((p.longitude() - expected_lng).abs() <= WAYPOINT_JITTER_DEG + 1e-12);
        }
    }

    #[test]
    fn test_interpolate_two_points_is_just_endpoints() {
        let mut rng = SmallRng::seed_from_u64(1);
        let origin = coord(40.0, -74.0);
        let destination = coord(41.0, -73.0);
        let points = interpolate_waypoints(origin, destination, 2, &mut rng).unwrap();
        assert_eq!(points, vec![origin, destination]);
    }

    #[test]
    fn test_interpolate_rejects_short_count() {
        let mut rng = SmallRng::seed_from_u64(1);
        let p = coord(40.0, -74.0);
        assert!(interpolate_waypoints(p, p, 1, &mut rng).is_err());
        assert!(interpolate_waypoints(p, p, 0, &mut rng).is_err());
    }

    #[test]
    fn test_alternatives_fixed_pair() {
        let mut rng = SmallRng::seed_from_u64(3);
        let alts = generate_alternatives(10_000.0, 1000, &mut rng);

        assert!(alts.len() == 2 || alts.len() == 3);
        assert_eq!(alts[0].label, "Via Highway");
        assert!((alts[0].distance_meters - 12_000.0).abs() < 1e-9);
        assert_eq!(alts[0].duration_seconds, 800);
        assert_eq!(alts[0].traffic, TrafficLevel::Light);

        assert_eq!(alts[1].label, "Via Surface Streets");
        assert!((alts[1].distance_meters - 9_000.0).abs() < 1e-9);
        assert_eq!(alts[1].duration_seconds, 1300);
        assert_eq!(alts[1].traffic, TrafficLevel::Moderate);

        if let Some(corridor) = alts.get(2) {
            assert_eq!(corridor.label, "Emergency Corridor");
            assert!((corridor.distance_meters - 11_000.0).abs() < 1e-9);
            assert_eq!(corridor.duration_seconds, 600);
            assert_eq!(corridor.traffic, TrafficLevel::Light);
        }
    }

    #[test]
    fn test_alternatives_corridor_is_probabilistic() {
        let mut saw_two = false;
        let mut saw_three = false;
        for seed in 0..64 {
            let mut rng = SmallRng::seed_from_u64(seed);
            match generate_alternatives(10_000.0, 1000, &mut rng).len() {
                2 => saw_two = true,
                3 => saw_three = true,
                n => panic!("unexpected alternative count {n}"),
            }
        }
        assert!(saw_two, "corridor should sometimes be unavailable");
        assert!(saw_three, "corridor should sometimes be available");
    }

    #[test]
    fn test_rank_nearest_sorted_and_bounded() {
        let origin = coord(40.75, -73.98);
        let candidates = vec![
            UnitCandidate {
                id: "far",
                position: coord(40.95, -73.98),
                kind: EmergencyKind::Fire,
            },
            UnitCandidate {
                id: "near",
                position: coord(40.751, -73.98),
                kind: EmergencyKind::Fire,
            },
            UnitCandidate {
                id: "mid",
                position: coord(40.78, -73.98),
                kind: EmergencyKind::Fire,
            },
        ];

        let ranked = rank_nearest(origin, &candidates, EmergencyKind::Fire, false, 10_000.0);
        let ids: Vec<&str> = ranked.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec!["near", "mid"], "far unit exceeds the radius");
        assert!(ranked[0].1 <= ranked[1].1);
        assert!(ranked.iter().all(|(_, d)| *d <= 10_000.0));
    }

    #[test]
    fn test_rank_nearest_filters_by_kind() {
        let origin = coord(40.75, -73.98);
        let candidates = vec![
            UnitCandidate {
                id: "medic",
                position: coord(40.751, -73.98),
                kind: EmergencyKind::Medical,
            },
            UnitCandidate {
                id: "engine",
                position: coord(40.76, -73.98),
                kind: EmergencyKind::Fire,
            },
        ];

        let ranked = rank_nearest(origin, &candidates, EmergencyKind::Fire, false, 50_000.0);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].0, "engine");

        // A priority override takes any unit, still sorted by distance.
        let ranked = rank_nearest(origin, &candidates, EmergencyKind::Fire, true, 50_000.0);
        let ids: Vec<&str> = ranked.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec!["medic", "engine"]);
    }
}
