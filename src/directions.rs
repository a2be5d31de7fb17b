//! Directions and geocoding collaborators.
//!
//! The traits are what route sessions depend on; [`decode_directions`] and
//! [`decode_suggestions`] turn the Mapbox wire payloads into validated types
//! and are shared by the HTTP client and tests.
//!
//! Directions decoding is tolerant of partially malformed geometry: positions
//! are kept raw and left for segmentation to skip. A response that is not a
//! directions payload at all is an error.

use std::future::Future;

use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{OptionExt, RoadwatchError, Result};
use crate::segmentation::{CongestionLevel, RouteCandidate, RouteOrigin};
use crate::Coordinate;

/// Response codes meaning "no route exists", which is a normal empty result.
const NO_ROUTE_CODES: [&str; 2] = ["NoRoute", "NoSegment"];

/// Source of candidate routes between two coordinates.
pub trait DirectionsProvider: Send + Sync {
    /// Candidate routes, primary first. An empty list means no route exists.
    fn directions(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> impl Future<Output = Result<Vec<RouteCandidate>>> + Send;
}

/// Free-text place search.
pub trait GeocodingProvider: Send + Sync {
    fn search(&self, query: &str) -> impl Future<Output = Result<Vec<PlaceSuggestion>>> + Send;
}

/// A geocoding match offered to the user as a destination.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct PlaceSuggestion {
    pub name: String,
    pub address: Option<String>,
    pub coordinate: Coordinate,
}

// ============================================================================
// Directions payload
// ============================================================================

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    code: Option<String>,
    message: Option<String>,
    routes: Option<Vec<ApiRoute>>,
}

#[derive(Debug, Deserialize)]
struct ApiRoute {
    geometry: Option<ApiLineGeometry>,
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    legs: Vec<ApiLeg>,
}

#[derive(Debug, Deserialize)]
struct ApiLineGeometry {
    #[serde(default)]
    coordinates: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ApiLeg {
    annotation: Option<ApiAnnotation>,
}

#[derive(Debug, Deserialize)]
struct ApiAnnotation {
    #[serde(default)]
    congestion: Vec<Value>,
}

/// Keep a position's numbers; non-numbers become NaN so segmentation skips
/// the position instead of shifting the geometry.
fn raw_position(value: &Value) -> Vec<f64> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_f64().unwrap_or(f64::NAN))
            .collect(),
        _ => Vec::new(),
    }
}

/// Decode a Mapbox directions response into route candidates.
///
/// The first route is the primary, the rest are alternates `0..n` in response
/// order. Congestion annotations of all legs are concatenated. `NoRoute` and
/// `NoSegment` responses decode to an empty list; any other non-`Ok` code or a
/// missing `routes` array is a [`RoadwatchError::MalformedPayload`].
pub fn decode_directions(body: &str) -> Result<Vec<RouteCandidate>> {
    let response: DirectionsResponse = serde_json::from_str(body)?;

    if let Some(code) = response.code.as_deref() {
        if NO_ROUTE_CODES.contains(&code) {
            debug!("[Directions] Upstream reported {}", code);
            return Ok(Vec::new());
        }
        if code != "Ok" {
            return Err(RoadwatchError::MalformedPayload(format!(
                "directions code {}: {}",
                code,
                response.message.unwrap_or_default()
            )));
        }
    }

    let routes = response.routes.ok_or_malformed("directions response has no routes")?;

    let candidates: Vec<RouteCandidate> = routes
        .into_iter()
        .enumerate()
        .map(|(i, route)| {
            let origin = if i == 0 {
                RouteOrigin::Primary
            } else {
                RouteOrigin::Alternate { index: (i - 1) as u32 }
            };

            let geometry: Vec<Vec<f64>> = route
                .geometry
                .map(|g| g.coordinates.iter().map(raw_position).collect())
                .unwrap_or_default();
            if geometry.is_empty() {
                warn!("[Directions] {} has no geometry", origin.route_id());
            }

            let congestion: Vec<CongestionLevel> = route
                .legs
                .iter()
                .filter_map(|leg| leg.annotation.as_ref())
                .flat_map(|a| a.congestion.iter())
                .map(|v| v.as_str().map(CongestionLevel::parse).unwrap_or_default())
                .collect();

            RouteCandidate {
                origin,
                geometry,
                congestion,
                distance_m: route.distance,
                duration_s: route.duration,
            }
        })
        .collect();

    debug!("[Directions] Decoded {} candidates", candidates.len());
    Ok(candidates)
}

// ============================================================================
// Geocoding payload
// ============================================================================

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    features: Option<Vec<ApiFeature>>,
}

#[derive(Debug, Deserialize)]
struct ApiFeature {
    properties: Option<ApiPlaceProperties>,
    geometry: Option<ApiPointGeometry>,
}

#[derive(Debug, Deserialize)]
struct ApiPlaceProperties {
    name_preferred: Option<String>,
    name: Option<String>,
    full_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPointGeometry {
    #[serde(default)]
    coordinates: Vec<Value>,
}

/// Decode a Mapbox forward-geocoding response into suggestions.
///
/// The display name prefers `name_preferred` over `name`. Features without a
/// name or a usable point are skipped. A payload without `features` is a
/// [`RoadwatchError::MalformedPayload`].
pub fn decode_suggestions(body: &str) -> Result<Vec<PlaceSuggestion>> {
    let response: GeocodingResponse = serde_json::from_str(body)?;
    let features = response.features.ok_or_malformed("geocoding response has no features")?;
    let total = features.len();

    let suggestions: Vec<PlaceSuggestion> = features
        .into_iter()
        .filter_map(|feature| {
            let position = raw_position(&Value::Array(feature.geometry?.coordinates));
            let coordinate = Coordinate::from_position(&position)?;
            let properties = feature.properties?;
            let name = properties.name_preferred.or(properties.name)?;
            Some(PlaceSuggestion {
                name,
                address: properties.full_address,
                coordinate,
            })
        })
        .collect();

    if suggestions.len() < total {
        debug!(
            "[Geocoding] Skipped {} unusable features",
            total - suggestions.len()
        );
    }

    Ok(suggestions)
}
