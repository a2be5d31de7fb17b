//! # Roadwatch
//!
//! Route segmentation, incident proximity and crowd-sourced road reports for
//! mobile navigation.
//!
//! This library provides:
//! - Great-circle distance and proximity filtering of road incidents
//! - Segmentation of directions responses into congestion-tagged segments
//! - Incident reporting and confirmation over an injected document store
//! - Route sessions that keep the incidents along the highlighted route current
//! - GeoJSON output for the map layer
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel near-route filtering with rayon
//! - **`http`** - Enable Mapbox directions/geocoding and Firestore REST clients
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use roadwatch::{
//!     incidents_near_route, segment_routes, Coordinate, CongestionLevel,
//!     IncidentRecord, IncidentType, RouteCandidate, RouteOrigin, PRIMARY_ROUTE_ID,
//! };
//!
//! let main = RouteCandidate::new(
//!     RouteOrigin::Primary,
//!     vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
//!     vec![CongestionLevel::Low],
//! );
//!
//! let result = segment_routes(&[main]);
//! assert_eq!(result.segments.len(), 2);
//! assert!(!result.traffic_ahead);
//!
//! let incident = IncidentRecord::new(
//!     "a1",
//!     IncidentType::Accident,
//!     Coordinate::new(0.0, 0.003),
//! );
//! let route = result.route_coordinates(PRIMARY_ROUTE_ID);
//! let nearby = incidents_near_route(&route, &[incident], 0.5);
//! assert_eq!(nearby.len(), 1);
//! ```

use geo::Point;
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, RoadwatchError};

// Geographic utilities (distance, bounds)
pub mod geo_utils;

// Incident records, catalog and the confirmation transition
pub mod incident;
pub use incident::{
    user_or_anonymous, IncidentRecord, IncidentType, NewIncident, ANONYMOUS_USER,
    MAX_DESCRIPTION_CHARS,
};

// Proximity filtering
pub mod proximity;
#[cfg(feature = "parallel")]
pub use proximity::incidents_near_route_parallel;
pub use proximity::{
    incidents_near_point, incidents_near_route, min_distance_to_route, ProximityConfig,
    DEFAULT_POINT_RADIUS_KM, DEFAULT_ROUTE_RADIUS_KM,
};

// R-tree backed proximity queries over one snapshot
pub mod spatial;
pub use spatial::IncidentIndex;

// Route segmentation
pub mod segmentation;
pub use segmentation::{
    route_coordinates, segment_route, segment_routes, CongestionLevel, RouteCandidate,
    RouteOrigin, RouteSegment, SegmentationResult, PRIMARY_ROUTE_ID,
};

// Directions and geocoding collaborators
pub mod directions;
pub use directions::{
    decode_directions, decode_suggestions, DirectionsProvider, GeocodingProvider, PlaceSuggestion,
};

// Incident storage collaborator and the best-effort service boundary
pub mod store;
pub use store::{IncidentService, IncidentStore, MemoryIncidentStore};

// Firestore document codec
pub mod firestore;

// Navigation session state
pub mod session;
pub use session::RouteSession;

// GeoJSON output for the map layer
pub mod render;

// HTTP clients
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{FirestoreConfig, FirestoreIncidentStore, MapboxClient, MapboxConfig};

// FFI bindings
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("RoadwatchRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A WGS-84 coordinate, longitude first.
///
/// Serializes as the GeoJSON position `[longitude, latitude]`.
///
/// # Example
/// ```
/// use roadwatch::Coordinate;
/// let point = Coordinate::new(-0.1278, 51.5074); // London
/// assert_eq!(point.to_position(), [-0.1278, 51.5074]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Coordinate {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinate {
    /// Create a new coordinate. Longitude comes first.
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self { longitude, latitude }
    }

    /// Build a coordinate from a raw position such as `[lng, lat]` or
    /// `[lng, lat, alt]`.
    ///
    /// Returns `None` if the position has fewer than two entries or either of
    /// the first two is not finite.
    pub fn from_position(position: &[f64]) -> Option<Self> {
        match position {
            [lng, lat, ..] if lng.is_finite() && lat.is_finite() => Some(Self::new(*lng, *lat)),
            _ => None,
        }
    }

    /// The GeoJSON position `[longitude, latitude]`.
    pub fn to_position(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }

    /// Convert to a `geo` point (x = longitude, y = latitude).
    pub fn to_point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }

    /// Both components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.longitude.is_finite() && self.latitude.is_finite()
    }

    /// Finite and within WGS-84 ranges.
    pub fn is_valid(&self) -> bool {
        self.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Return the coordinate if valid, otherwise [`RoadwatchError::InvalidCoordinate`].
    pub fn validated(self) -> Result<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(RoadwatchError::InvalidCoordinate {
                longitude: self.longitude,
                latitude: self.latitude,
            })
        }
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from(position: [f64; 2]) -> Self {
        Self::new(position[0], position[1])
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(c: Coordinate) -> Self {
        c.to_position()
    }
}

impl From<Point<f64>> for Coordinate {
    fn from(p: Point<f64>) -> Self {
        Self::new(p.x(), p.y())
    }
}

impl From<Coordinate> for Point<f64> {
    fn from(c: Coordinate) -> Self {
        c.to_point()
    }
}

/// Bounding box, used to frame a route on the map.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Get the center point of the bounds.
    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.min_lng + self.max_lng) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
