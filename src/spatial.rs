//! R-tree index over one incident snapshot.
//!
//! For repeated queries against the same snapshot (switching the highlighted
//! route, panning the map) the index narrows each query to incidents inside a
//! conservative lat/lng search box before running the exact haversine check.
//! Results are identical to [`crate::incidents_near_point`] and
//! [`crate::incidents_near_route`], tie order included.
//!
//! A search box is only used when it stays clear of the poles and the
//! antimeridian; otherwise that query checks every incident.

use std::collections::HashMap;

use log::debug;
use rstar::{RTree, RTreeObject, AABB};

use crate::geo_utils::{haversine_km, EARTH_RADIUS_KM};
use crate::proximity::is_valid_radius;
use crate::{Coordinate, IncidentRecord};

/// Relative slack added to search boxes to absorb rounding.
const BOX_SLACK: f64 = 1e-9;

/// Position of an incident in the index, stored as `[lng, lat]`.
#[derive(Debug, Clone, Copy)]
struct IndexedIncident {
    slot: usize,
    position: [f64; 2],
}

impl RTreeObject for IndexedIncident {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

/// Spatial index over the active incidents of a snapshot.
///
/// # Example
/// ```
/// use roadwatch::{Coordinate, IncidentIndex, IncidentRecord, IncidentType};
///
/// let index = IncidentIndex::new(vec![
///     IncidentRecord::new("a", IncidentType::Police, Coordinate::new(0.0, 0.0)),
///     IncidentRecord::new("b", IncidentType::Police, Coordinate::new(0.0, 10.0)),
/// ]);
///
/// let hits = index.near_point(&Coordinate::new(0.0, 0.0), 5.0);
/// assert_eq!(hits.len(), 1);
/// ```
pub struct IncidentIndex {
    incidents: Vec<IncidentRecord>,
    tree: RTree<IndexedIncident>,
    /// Finite positions outside WGS-84 ranges, checked on every query
    unindexed: Vec<usize>,
}

impl IncidentIndex {
    /// Build an index from a snapshot. Inactive incidents and incidents with
    /// non-finite coordinates are dropped; the rest keep their input order.
    pub fn new(snapshot: Vec<IncidentRecord>) -> Self {
        let incidents: Vec<IncidentRecord> = snapshot
            .into_iter()
            .filter(|i| i.active && i.coordinate.is_finite())
            .collect();

        let mut entries = Vec::with_capacity(incidents.len());
        let mut unindexed = Vec::new();
        for (slot, incident) in incidents.iter().enumerate() {
            if incident.coordinate.is_valid() {
                entries.push(IndexedIncident {
                    slot,
                    position: incident.coordinate.to_position(),
                });
            } else {
                unindexed.push(slot);
            }
        }

        debug!(
            "[IncidentIndex] Indexed {} incidents ({} outside WGS-84 ranges)",
            entries.len(),
            unindexed.len()
        );

        Self {
            incidents,
            tree: RTree::bulk_load(entries),
            unindexed,
        }
    }

    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }

    /// Incidents within `radius_km` of `center`, nearest first.
    pub fn near_point(&self, center: &Coordinate, radius_km: f64) -> Vec<IncidentRecord> {
        if !center.is_finite() || !is_valid_radius(radius_km) {
            return Vec::new();
        }

        let hits: Vec<(f64, usize)> = self
            .candidate_slots(center, radius_km)
            .into_iter()
            .filter_map(|slot| {
                let distance = haversine_km(&self.incidents[slot].coordinate, center);
                (distance <= radius_km).then_some((distance, slot))
            })
            .collect();

        self.finish(hits)
    }

    /// Incidents within `radius_km` of any vertex of `route`, nearest first.
    pub fn near_route(&self, route: &[Coordinate], radius_km: f64) -> Vec<IncidentRecord> {
        if route.is_empty() || !is_valid_radius(radius_km) {
            return Vec::new();
        }

        let mut best: HashMap<usize, f64> = HashMap::new();
        for vertex in route.iter().filter(|v| v.is_finite()) {
            for slot in self.candidate_slots(vertex, radius_km) {
                let distance = haversine_km(&self.incidents[slot].coordinate, vertex);
                best.entry(slot)
                    .and_modify(|d| *d = d.min(distance))
                    .or_insert(distance);
            }
        }

        let hits: Vec<(f64, usize)> = best
            .into_iter()
            .filter(|&(_, distance)| distance <= radius_km)
            .map(|(slot, distance)| (distance, slot))
            .collect();

        self.finish(hits)
    }

    fn candidate_slots(&self, center: &Coordinate, radius_km: f64) -> Vec<usize> {
        match search_envelope(center, radius_km) {
            Some(envelope) => self
                .tree
                .locate_in_envelope(&envelope)
                .map(|entry| entry.slot)
                .chain(self.unindexed.iter().copied())
                .collect(),
            None => (0..self.incidents.len()).collect(),
        }
    }

    fn finish(&self, mut hits: Vec<(f64, usize)>) -> Vec<IncidentRecord> {
        hits.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        hits.into_iter()
            .map(|(distance, slot)| self.incidents[slot].with_distance(distance))
            .collect()
    }
}

/// Lat/lng box containing every point within `radius_km` of `center`.
///
/// Returns `None` when the box would reach a pole or cross the antimeridian,
/// or when `center` is outside WGS-84 ranges.
fn search_envelope(center: &Coordinate, radius_km: f64) -> Option<AABB<[f64; 2]>> {
    if !center.is_valid() {
        return None;
    }

    let angular = radius_km / EARTH_RADIUS_KM * (1.0 + BOX_SLACK) + BOX_SLACK;
    let lat = center.latitude.to_radians();
    let lng = center.longitude.to_radians();

    let min_lat = lat - angular;
    let max_lat = lat + angular;
    if min_lat <= -std::f64::consts::FRAC_PI_2 || max_lat >= std::f64::consts::FRAC_PI_2 {
        return None;
    }

    // Widest longitude offset of the spherical cap, valid while no pole is inside
    let ratio = angular.sin() / lat.cos();
    if angular >= std::f64::consts::FRAC_PI_2 || ratio >= 1.0 {
        return None;
    }
    let d_lng = ratio.asin() * (1.0 + BOX_SLACK);

    let min_lng = lng - d_lng;
    let max_lng = lng + d_lng;
    if min_lng < -std::f64::consts::PI || max_lng > std::f64::consts::PI {
        return None;
    }

    Some(AABB::from_corners(
        [min_lng.to_degrees(), min_lat.to_degrees()],
        [max_lng.to_degrees(), max_lat.to_degrees()],
    ))
}
