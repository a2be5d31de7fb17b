//! UniFFI exports for the mobile shell.
//!
//! Everything here is a thin, logging wrapper: no function returns an error
//! to the host. Failures are logged and come back as empty lists, `None` or
//! `false`, matching what the screens already handle.

use log::{debug, warn};

use crate::geo_utils::haversine_km;
use crate::incident::{user_or_anonymous, IncidentRecord, IncidentType};
use crate::proximity::{incidents_near_point, ProximityConfig};
use crate::render::{incidents_feature_collection, segments_feature_collection};
use crate::segmentation::{route_coordinates, segment_routes, RouteCandidate, RouteSegment, SegmentationResult};
use crate::{decode_directions, init_logging, Coordinate};

/// Catalog entry shown by the report picker.
#[derive(Debug, Clone, uniffi::Record)]
pub struct IncidentTypeInfo {
    pub incident_type: IncidentType,
    pub id: String,
    pub name: String,
    pub icon: String,
}

/// Result of applying a confirmation to a record held by the host.
#[derive(Debug, Clone, uniffi::Record)]
pub struct ConfirmOutcome {
    pub record: IncidentRecord,
    /// False when the user had already confirmed
    pub confirmed: bool,
}

#[uniffi::export]
pub fn incident_types() -> Vec<IncidentTypeInfo> {
    IncidentType::ALL
        .into_iter()
        .map(|t| IncidentTypeInfo {
            incident_type: t,
            id: t.id().to_string(),
            name: t.display_name().to_string(),
            icon: t.icon().to_string(),
        })
        .collect()
}

#[uniffi::export]
pub fn default_proximity_config() -> ProximityConfig {
    ProximityConfig::default()
}

#[uniffi::export]
pub fn ffi_haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    haversine_km(&a, &b)
}

#[uniffi::export]
pub fn ffi_incidents_near_point(
    center: Coordinate,
    incidents: Vec<IncidentRecord>,
    radius_km: f64,
) -> Vec<IncidentRecord> {
    init_logging();
    let hits = incidents_near_point(&center, &incidents, radius_km);
    debug!("[RoadwatchRust] near_point: {}/{} within {}km", hits.len(), incidents.len(), radius_km);
    hits
}

/// Near-route filter, parallel over incidents.
#[uniffi::export]
pub fn ffi_incidents_near_route(
    route: Vec<Coordinate>,
    incidents: Vec<IncidentRecord>,
    radius_km: f64,
) -> Vec<IncidentRecord> {
    init_logging();
    let start = std::time::Instant::now();

    #[cfg(feature = "parallel")]
    let hits = crate::proximity::incidents_near_route_parallel(&route, &incidents, radius_km);

    #[cfg(not(feature = "parallel"))]
    let hits = crate::proximity::incidents_near_route(&route, &incidents, radius_km);

    debug!(
        "[RoadwatchRust] near_route: {} of {} incidents along {} vertices in {:?}",
        hits.len(),
        incidents.len(),
        route.len(),
        start.elapsed()
    );
    hits
}

#[uniffi::export]
pub fn ffi_segment_routes(candidates: Vec<RouteCandidate>) -> SegmentationResult {
    init_logging();
    segment_routes(&candidates)
}

#[uniffi::export]
pub fn ffi_route_coordinates(segments: Vec<RouteSegment>, route_id: String) -> Vec<Coordinate> {
    route_coordinates(&segments, &route_id)
}

/// Decode a raw directions payload fetched by the host. Malformed payloads
/// give no routes.
#[uniffi::export]
pub fn ffi_decode_directions(body: String) -> Vec<RouteCandidate> {
    init_logging();
    decode_directions(&body).unwrap_or_else(|e| {
        warn!("[RoadwatchRust] Could not decode directions: {}", e);
        Vec::new()
    })
}

#[uniffi::export]
pub fn ffi_confirm_record(record: IncidentRecord, user_id: Option<String>) -> ConfirmOutcome {
    let mut record = record;
    let confirmed = record.confirm(&user_or_anonymous(user_id.as_deref()));
    ConfirmOutcome { record, confirmed }
}

#[uniffi::export]
pub fn ffi_segments_geojson(segments: Vec<RouteSegment>, highlighted_route: Option<String>) -> String {
    segments_feature_collection(&segments, highlighted_route.as_deref()).to_string()
}

#[uniffi::export]
pub fn ffi_incidents_geojson(incidents: Vec<IncidentRecord>) -> String {
    incidents_feature_collection(&incidents).to_string()
}

// ============================================================================
// Networked operations (blocking, one runtime per call)
// ============================================================================

#[cfg(feature = "http")]
mod net {
    use super::*;
    use log::info;

    use crate::directions::{GeocodingProvider, PlaceSuggestion};
    use crate::http::{block_on, FirestoreConfig, FirestoreIncidentStore, MapboxClient, MapboxConfig};
    use crate::session::RouteSession;
    use crate::store::IncidentService;
    use crate::Bounds;

    /// Snapshot of a planned route session.
    #[derive(Debug, Clone, uniffi::Record)]
    pub struct RoutePlan {
        pub segments: Vec<RouteSegment>,
        pub traffic_ahead: bool,
        pub has_alternates: bool,
        pub highlighted_route: Option<String>,
        pub nearby_incidents: Vec<IncidentRecord>,
        pub bounds: Option<Bounds>,
    }

    impl From<&RouteSession> for RoutePlan {
        fn from(session: &RouteSession) -> Self {
            Self {
                segments: session.segments().to_vec(),
                traffic_ahead: session.traffic_ahead(),
                has_alternates: session.has_alternates(),
                highlighted_route: session.highlighted_route().map(str::to_string),
                nearby_incidents: session.nearby_incidents().to_vec(),
                bounds: session.bounds(),
            }
        }
    }

    fn service(config: FirestoreConfig) -> Option<IncidentService<FirestoreIncidentStore>> {
        match FirestoreIncidentStore::new(config) {
            Ok(store) => Some(IncidentService::new(store)),
            Err(e) => {
                warn!("[RoadwatchRust] Firestore client unavailable: {}", e);
                None
            }
        }
    }

    /// Fetch routes and incidents and plan a session around the primary route.
    #[uniffi::export]
    pub fn fetch_route_plan(
        mapbox: MapboxConfig,
        firestore: FirestoreConfig,
        origin: Coordinate,
        destination: Coordinate,
        config: ProximityConfig,
    ) -> RoutePlan {
        init_logging();
        info!("[RoadwatchRust] fetch_route_plan {:?} -> {:?}", origin, destination);

        let planned = MapboxClient::new(mapbox).and_then(|directions| {
            let store = FirestoreIncidentStore::new(firestore)?;
            block_on(RouteSession::plan(&directions, &store, origin, destination, config.clone()))
        });

        match planned {
            Ok(session) => RoutePlan::from(&session),
            Err(e) => {
                warn!("[RoadwatchRust] Route planning failed: {}", e);
                let session = RouteSession::from_candidates(origin, destination, vec![], vec![], config);
                RoutePlan::from(&session)
            }
        }
    }

    #[uniffi::export]
    pub fn search_places(mapbox: MapboxConfig, query: String) -> Vec<PlaceSuggestion> {
        init_logging();
        let result = MapboxClient::new(mapbox).and_then(|client| block_on(client.search(&query))?);
        result.unwrap_or_else(|e| {
            warn!("[RoadwatchRust] Place search failed: {}", e);
            Vec::new()
        })
    }

    #[uniffi::export]
    pub fn report_incident(
        firestore: FirestoreConfig,
        incident_type: IncidentType,
        coordinate: Coordinate,
        description: String,
        reported_by: Option<String>,
    ) -> Option<String> {
        init_logging();
        let service = service(firestore)?;
        block_on(service.report_incident(incident_type, coordinate, &description, reported_by.as_deref()))
            .unwrap_or_else(|e| {
                warn!("[RoadwatchRust] report_incident: {}", e);
                None
            })
    }

    #[uniffi::export]
    pub fn confirm_incident(firestore: FirestoreConfig, incident_id: String, user_id: Option<String>) -> bool {
        init_logging();
        let Some(service) = service(firestore) else {
            return false;
        };
        block_on(service.confirm_incident(&incident_id, user_id.as_deref())).unwrap_or_else(|e| {
            warn!("[RoadwatchRust] confirm_incident: {}", e);
            false
        })
    }

    #[uniffi::export]
    pub fn fetch_incidents_near_point(
        firestore: FirestoreConfig,
        center: Coordinate,
        radius_km: Option<f64>,
    ) -> Vec<IncidentRecord> {
        init_logging();
        let Some(service) = service(firestore) else {
            return Vec::new();
        };
        block_on(service.incidents_near_point(&center, radius_km)).unwrap_or_else(|e| {
            warn!("[RoadwatchRust] fetch_incidents_near_point: {}", e);
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::{CongestionLevel, RouteOrigin};

    #[test]
    fn test_incident_types_cover_catalog() {
        let types = incident_types();
        assert_eq!(types.len(), 8);
        assert_eq!(types[0].id, "accident");
        assert_eq!(types[7].icon, "⚠️");
    }

    #[test]
    fn test_confirm_record_outcome() {
        let record = IncidentRecord::new("i1", IncidentType::Police, Coordinate::new(0.0, 0.0));
        let first = ffi_confirm_record(record, Some("u1".to_string()));
        assert!(first.confirmed);
        let second = ffi_confirm_record(first.record, Some("u1".to_string()));
        assert!(!second.confirmed);
        assert_eq!(second.record.upvotes, 1);
    }

    #[test]
    fn test_route_pipeline_through_exports() {
        let candidates = vec![RouteCandidate::new(
            RouteOrigin::Primary,
            vec![vec![0.0, 0.0], vec![0.0, 0.01]],
            vec![CongestionLevel::Heavy],
        )];
        let result = ffi_segment_routes(candidates);
        assert!(result.traffic_ahead);

        let route = ffi_route_coordinates(result.segments.clone(), "main".to_string());
        let incidents = vec![IncidentRecord::new("a", IncidentType::Hazard, Coordinate::new(0.0, 0.005))];
        assert_eq!(ffi_incidents_near_route(route, incidents, 0.6).len(), 1);

        let geojson = ffi_segments_geojson(result.segments, Some("main".to_string()));
        assert!(geojson.contains("\"congestion\":\"heavy\""));
        assert!(ffi_decode_directions("garbage".to_string()).is_empty());
    }
}
