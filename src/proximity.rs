//! Proximity filtering of incidents around a point or along a route.
//!
//! Both filters consider only active incidents, annotate each hit with its
//! distance in kilometers and return hits nearest first. The sort is stable,
//! so incidents at equal distance keep their input order.
//!
//! The route filter measures point-to-vertex distance: the minimum over the
//! route's coordinates, not the distance to the segments between them. Long
//! edges therefore under-report proximity near their midpoints.

use log::{debug, warn};

use crate::geo_utils::haversine_km;
use crate::{Coordinate, IncidentRecord};

/// Default search radius around a point, in kilometers.
pub const DEFAULT_POINT_RADIUS_KM: f64 = 5.0;

/// Default corridor around a route, in kilometers.
pub const DEFAULT_ROUTE_RADIUS_KM: f64 = 0.5;

/// Search radii used by the incident service and route sessions.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct ProximityConfig {
    /// Radius for incidents around a point.
    /// Default: 5.0 km
    pub point_radius_km: f64,

    /// Radius for incidents along a route. Intentionally tighter than the
    /// point radius since it applies to every route vertex.
    /// Default: 0.5 km
    pub route_radius_km: f64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            point_radius_km: DEFAULT_POINT_RADIUS_KM,
            route_radius_km: DEFAULT_ROUTE_RADIUS_KM,
        }
    }
}

#[inline]
pub(crate) fn is_valid_radius(radius_km: f64) -> bool {
    radius_km.is_finite() && radius_km >= 0.0
}

/// Active incidents within `radius_km` of `center`, nearest first.
///
/// An invalid radius (negative or non-finite) or a non-finite center yields an
/// empty result.
///
/// # Example
/// ```
/// use roadwatch::{incidents_near_point, Coordinate, IncidentRecord, IncidentType};
///
/// let incidents = vec![
///     IncidentRecord::new("near", IncidentType::Accident, Coordinate::new(0.0, 0.0)),
///     IncidentRecord::new("far", IncidentType::Accident, Coordinate::new(0.0, 10.0)),
/// ];
///
/// let hits = incidents_near_point(&Coordinate::new(0.0, 0.0), &incidents, 5.0);
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].id, "near");
/// assert_eq!(hits[0].distance_km, Some(0.0));
/// ```
pub fn incidents_near_point(
    center: &Coordinate,
    incidents: &[IncidentRecord],
    radius_km: f64,
) -> Vec<IncidentRecord> {
    if !center.is_finite() || !is_valid_radius(radius_km) {
        warn!(
            "[Proximity] Ignoring near-point query: center={:?} radius={}km",
            center, radius_km
        );
        return Vec::new();
    }

    let hits: Vec<(f64, &IncidentRecord)> = incidents
        .iter()
        .filter(|incident| incident.active)
        .filter_map(|incident| {
            let distance = haversine_km(&incident.coordinate, center);
            (distance <= radius_km).then_some((distance, incident))
        })
        .collect();

    debug!(
        "[Proximity] {} of {} incidents within {}km of point",
        hits.len(),
        incidents.len(),
        radius_km
    );

    sorted_by_distance(hits)
}

/// Minimum distance from `point` to any vertex of `route`, in kilometers.
///
/// Returns `None` for an empty route.
pub fn min_distance_to_route(point: &Coordinate, route: &[Coordinate]) -> Option<f64> {
    if route.is_empty() {
        return None;
    }

    Some(
        route
            .iter()
            .map(|vertex| haversine_km(point, vertex))
            .fold(f64::INFINITY, f64::min),
    )
}

/// Active incidents within `radius_km` of any vertex of `route`, nearest first.
///
/// Each hit carries its minimum vertex distance. An empty route is logged and
/// yields an empty result, as does an invalid radius.
///
/// # Example
/// ```
/// use roadwatch::{incidents_near_route, Coordinate, IncidentRecord, IncidentType};
///
/// let route = vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0)];
/// let incidents = vec![
///     IncidentRecord::new("i1", IncidentType::Hazard, Coordinate::new(0.0, 0.003)),
/// ];
///
/// let hits = incidents_near_route(&route, &incidents, 0.5);
/// assert_eq!(hits.len(), 1);
/// assert!((hits[0].distance_km.unwrap() - 0.33).abs() < 0.01);
/// ```
pub fn incidents_near_route(
    route: &[Coordinate],
    incidents: &[IncidentRecord],
    radius_km: f64,
) -> Vec<IncidentRecord> {
    if !check_route_query(route, radius_km) {
        return Vec::new();
    }

    let hits: Vec<(f64, &IncidentRecord)> = incidents
        .iter()
        .filter(|incident| incident.active)
        .filter_map(|incident| route_hit(incident, route, radius_km))
        .collect();

    debug!(
        "[Proximity] {} of {} incidents within {}km of a {}-point route",
        hits.len(),
        incidents.len(),
        radius_km,
        route.len()
    );

    sorted_by_distance(hits)
}

/// Parallel version of [`incidents_near_route`]. Returns the same sequence.
///
/// The per-incident vertex scan runs on the rayon pool; hits are collected in
/// input order before the stable sort, so tie order is unchanged.
#[cfg(feature = "parallel")]
pub fn incidents_near_route_parallel(
    route: &[Coordinate],
    incidents: &[IncidentRecord],
    radius_km: f64,
) -> Vec<IncidentRecord> {
    use rayon::prelude::*;

    if !check_route_query(route, radius_km) {
        return Vec::new();
    }

    let hits: Vec<(f64, &IncidentRecord)> = incidents
        .par_iter()
        .filter(|incident| incident.active)
        .filter_map(|incident| route_hit(incident, route, radius_km))
        .collect();

    sorted_by_distance(hits)
}

fn check_route_query(route: &[Coordinate], radius_km: f64) -> bool {
    if route.is_empty() {
        warn!("[Proximity] Near-route query with an empty route, returning no incidents");
        return false;
    }
    if !is_valid_radius(radius_km) {
        warn!("[Proximity] Ignoring near-route query: radius={}km", radius_km);
        return false;
    }
    true
}

#[inline]
fn route_hit<'a>(
    incident: &'a IncidentRecord,
    route: &[Coordinate],
    radius_km: f64,
) -> Option<(f64, &'a IncidentRecord)> {
    let distance = min_distance_to_route(&incident.coordinate, route)?;
    (distance <= radius_km).then_some((distance, incident))
}

fn sorted_by_distance(mut hits: Vec<(f64, &IncidentRecord)>) -> Vec<IncidentRecord> {
    // sort_by is stable: equal distances keep input order
    hits.sort_by(|a, b| a.0.total_cmp(&b.0));
    hits.into_iter()
        .map(|(distance, incident)| incident.with_distance(distance))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IncidentType;

    fn incident(id: &str, lng: f64, lat: f64) -> IncidentRecord {
        IncidentRecord::new(id, IncidentType::Accident, Coordinate::new(lng, lat))
    }

    fn inactive(id: &str, lng: f64, lat: f64) -> IncidentRecord {
        IncidentRecord {
            active: false,
            ..incident(id, lng, lat)
        }
    }

    fn ids(records: &[IncidentRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    /// Brute-force reference for the near-route filter.
    fn reference_near_route(
        route: &[Coordinate],
        incidents: &[IncidentRecord],
        radius_km: f64,
    ) -> Vec<(String, f64)> {
        let mut out = Vec::new();
        for incident in incidents.iter().filter(|i| i.active) {
            let mut best = f64::INFINITY;
            for vertex in route {
                best = best.min(haversine_km(&incident.coordinate, vertex));
            }
            if best <= radius_km {
                out.push((incident.id.clone(), best));
            }
        }
        out.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        out
    }

    fn grid_incidents() -> Vec<IncidentRecord> {
        let mut incidents = Vec::new();
        for i in 0..20 {
            for j in 0..20 {
                let id = format!("g{}-{}", i, j);
                let lng = -0.2 + i as f64 * 0.01;
                let lat = 51.45 + j as f64 * 0.01;
                if (i + j) % 7 == 0 {
                    incidents.push(inactive(&id, lng, lat));
                } else {
                    incidents.push(incident(&id, lng, lat));
                }
            }
        }
        incidents
    }

    #[test]
    fn test_near_point_example() {
        let incidents = vec![incident("a", 0.0, 0.0), incident("b", 0.0, 10.0)];
        let hits = incidents_near_point(&Coordinate::new(0.0, 0.0), &incidents, 5.0);
        assert_eq!(ids(&hits), vec!["a"]);
        assert!(hits[0].distance_km.unwrap() < 1e-9);
    }

    #[test]
    fn test_near_point_sorted_and_within_radius() {
        let center = Coordinate::new(-0.1, 51.55);
        let hits = incidents_near_point(&center, &grid_incidents(), 3.0);
        assert!(!hits.is_empty());

        for pair in hits.windows(2) {
            assert!(pair[0].distance_km.unwrap() <= pair[1].distance_km.unwrap());
        }
        for hit in &hits {
            let d = hit.distance_km.unwrap();
            assert!(d <= 3.0);
            assert!(hit.active);
            assert_eq!(d, haversine_km(&hit.coordinate, &center));
        }
    }

    #[test]
    fn test_near_point_excludes_inactive() {
        let incidents = vec![inactive("x", 0.0, 0.0), incident("y", 0.0, 0.01)];
        let hits = incidents_near_point(&Coordinate::new(0.0, 0.0), &incidents, 5.0);
        assert_eq!(ids(&hits), vec!["y"]);
    }

    #[test]
    fn test_near_point_ties_keep_input_order() {
        let incidents = vec![
            incident("second", 0.0, 0.01),
            incident("first", 0.0, 0.0),
            incident("third", 0.0, 0.01),
        ];
        let hits = incidents_near_point(&Coordinate::new(0.0, 0.0), &incidents, 5.0);
        assert_eq!(ids(&hits), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_near_point_invalid_input_is_empty() {
        let incidents = vec![incident("a", 0.0, 0.0)];
        let center = Coordinate::new(0.0, 0.0);
        assert!(incidents_near_point(&center, &incidents, -1.0).is_empty());
        assert!(incidents_near_point(&center, &incidents, f64::NAN).is_empty());
        assert!(incidents_near_point(&Coordinate::new(f64::NAN, 0.0), &incidents, 5.0).is_empty());
        assert!(incidents_near_point(&center, &[], 5.0).is_empty());
    }

    #[test]
    fn test_near_point_zero_radius_keeps_exact_matches() {
        let incidents = vec![incident("a", 0.0, 0.0), incident("b", 0.0, 0.001)];
        let hits = incidents_near_point(&Coordinate::new(0.0, 0.0), &incidents, 0.0);
        assert_eq!(ids(&hits), vec!["a"]);
    }

    #[test]
    fn test_near_route_example() {
        let route = vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0)];
        let hits = incidents_near_route(&route, &[incident("a", 0.0, 0.003)], 0.5);
        assert_eq!(hits.len(), 1);
        let d = hits[0].distance_km.unwrap();
        assert!((d - 0.3336).abs() < 0.001, "got {d}");
    }

    #[test]
    fn test_near_route_matches_brute_force() {
        let route: Vec<Coordinate> = (0..30)
            .map(|i| Coordinate::new(-0.19 + i as f64 * 0.006, 51.46 + i as f64 * 0.005))
            .collect();
        let incidents = grid_incidents();

        let hits = incidents_near_route(&route, &incidents, 0.5);
        let reference = reference_near_route(&route, &incidents, 0.5);

        assert_eq!(hits.len(), reference.len());
        for (hit, (id, d)) in hits.iter().zip(&reference) {
            assert_eq!(&hit.id, id);
            assert_eq!(hit.distance_km, Some(*d));
        }
    }

    #[test]
    fn test_near_route_is_point_to_vertex() {
        // Midpoint of a ~111km edge is ~55km from either vertex
        let route = vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0)];
        let hits = incidents_near_route(&route, &[incident("mid", 0.0, 0.5)], 0.5);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_near_route_empty_route() {
        assert!(incidents_near_route(&[], &[incident("a", 0.0, 0.0)], 0.5).is_empty());
        assert_eq!(min_distance_to_route(&Coordinate::new(0.0, 0.0), &[]), None);
    }

    #[test]
    fn test_near_route_single_vertex() {
        let route = vec![Coordinate::new(0.0, 0.0)];
        let hits = incidents_near_route(&route, &[incident("a", 0.0, 0.001)], 0.5);
        assert_eq!(hits.len(), 1);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential() {
        let route: Vec<Coordinate> = (0..30)
            .map(|i| Coordinate::new(-0.19 + i as f64 * 0.006, 51.46 + i as f64 * 0.005))
            .collect();
        let incidents = grid_incidents();

        let sequential = incidents_near_route(&route, &incidents, 0.8);
        let parallel = incidents_near_route_parallel(&route, &incidents, 0.8);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_proximity_config_defaults() {
        let config = ProximityConfig::default();
        assert_eq!(config.point_radius_km, 5.0);
        assert_eq!(config.route_radius_km, 0.5);
    }
}
