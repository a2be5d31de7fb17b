//! # Geographic Utilities
//!
//! Great-circle distance and small polyline helpers used by the proximity
//! engine and route sessions.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_km`] | Great-circle distance between two coordinates, in kilometers |
//! | [`polyline_length_km`] | Total length of a coordinate sequence, in kilometers |
//! | [`compute_bounds`] | Bounding box of a coordinate sequence |
//!
//! ## Example
//!
//! ```rust
//! use roadwatch::{Coordinate, geo_utils};
//!
//! let route = vec![
//!     Coordinate::new(-0.1278, 51.5074),  // London
//!     Coordinate::new(-0.1290, 51.5080),
//!     Coordinate::new(-0.1300, 51.5090),
//! ];
//!
//! let length = geo_utils::polyline_length_km(&route);
//! println!("Route length: {:.2}km", length);
//!
//! let dist = geo_utils::haversine_km(&route[0], &route[2]);
//! println!("Start to end: {:.3}km", dist);
//! ```
//!
//! ## Algorithm Notes
//!
//! The haversine formula gives the great-circle distance on a sphere. The Earth
//! radius is fixed at 6371 km so distances agree with the values stored by
//! other clients of the incident database.
//!
//! Reference: [Haversine formula (Wikipedia)](https://en.wikipedia.org/wiki/Haversine_formula)

use crate::{Bounds, Coordinate};

/// Mean Earth radius used for every distance in this crate.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two coordinates, in kilometers.
///
/// Identical points give exactly `0.0`. The haversine term is clamped to
/// `[0, 1]`, so antipodal points yield `π·R` instead of `NaN`.
///
/// # Example
///
/// ```rust
/// use roadwatch::{Coordinate, geo_utils};
///
/// let london = Coordinate::new(-0.1278, 51.5074);
/// let paris = Coordinate::new(2.3522, 48.8566);
///
/// let distance = geo_utils::haversine_km(&london, &paris);
/// assert!((distance - 343.5).abs() < 1.0);
/// ```
#[inline]
pub fn haversine_km(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Total length of a coordinate sequence in kilometers.
///
/// Empty or single-point sequences return 0.0.
pub fn polyline_length_km(points: &[Coordinate]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_km(&w[0], &w[1]))
        .sum()
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Bounding box of the finite coordinates in `points`.
///
/// Returns `None` when no finite coordinate is present.
pub fn compute_bounds(points: &[Coordinate]) -> Option<Bounds> {
    let mut finite = points.iter().filter(|c| c.is_finite()).peekable();
    finite.peek()?;

    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lng = f64::MAX;
    let mut max_lng = f64::MIN;

    for c in finite {
        min_lat = min_lat.min(c.latitude);
        max_lat = max_lat.max(c.latitude);
        min_lng = min_lng.min(c.longitude);
        max_lng = max_lng.max(c.longitude);
    }

    Some(Bounds { min_lat, max_lat, min_lng, max_lng })
}

// =============================================================================
// Unit Tests
// =============================================================================
