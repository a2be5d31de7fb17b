//! Navigation session: the routes for one origin/destination pair, which of
//! them is highlighted, and the incidents along it.
//!
//! A session owns an incident snapshot and answers route switches from it
//! without touching the store. Callers refresh the snapshot after reporting
//! or confirming, and drop the session when the user plans a new trip.

use log::{debug, info, warn};

use crate::directions::DirectionsProvider;
use crate::geo_utils::compute_bounds;
use crate::proximity::ProximityConfig;
use crate::segmentation::{segment_routes, RouteCandidate, RouteSegment, SegmentationResult, PRIMARY_ROUTE_ID};
use crate::spatial::IncidentIndex;
use crate::store::IncidentStore;
use crate::{Bounds, Coordinate, IncidentRecord};

pub struct RouteSession {
    origin: Coordinate,
    destination: Coordinate,
    candidates: Vec<RouteCandidate>,
    segmentation: SegmentationResult,
    highlighted: Option<String>,
    index: IncidentIndex,
    nearby: Vec<IncidentRecord>,
    config: ProximityConfig,
}

impl RouteSession {
    /// Fetch routes and the incident snapshot concurrently and build a
    /// session around them.
    ///
    /// A directions failure or an empty response gives a session without
    /// routes; a store failure gives one without incidents. Both are logged.
    pub async fn plan<D, S>(
        directions: &D,
        store: &S,
        origin: Coordinate,
        destination: Coordinate,
        config: ProximityConfig,
    ) -> Self
    where
        D: DirectionsProvider,
        S: IncidentStore,
    {
        let (routes, snapshot) = futures::join!(
            directions.directions(origin, destination),
            store.active_incidents()
        );

        let candidates = routes.unwrap_or_else(|e| {
            warn!("[RouteSession] Directions failed: {}", e);
            Vec::new()
        });
        if candidates.is_empty() {
            info!("[RouteSession] No route between {:?} and {:?}", origin, destination);
        }

        let snapshot = snapshot.unwrap_or_else(|e| {
            warn!("[RouteSession] Incident snapshot failed: {}", e);
            Vec::new()
        });

        Self::from_candidates(origin, destination, candidates, snapshot, config)
    }

    /// Build a session from already fetched routes and incidents.
    pub fn from_candidates(
        origin: Coordinate,
        destination: Coordinate,
        candidates: Vec<RouteCandidate>,
        snapshot: Vec<IncidentRecord>,
        config: ProximityConfig,
    ) -> Self {
        let segmentation = segment_routes(&candidates);

        // Prefer the primary route; fall back to the first route with segments
        let highlighted = if segmentation.has_route(PRIMARY_ROUTE_ID) {
            Some(PRIMARY_ROUTE_ID.to_string())
        } else {
            segmentation.route_ids().into_iter().next()
        };

        let mut session = Self {
            origin,
            destination,
            candidates,
            segmentation,
            highlighted,
            index: IncidentIndex::new(snapshot),
            nearby: Vec::new(),
            config,
        };
        session.recompute_nearby();

        info!(
            "[RouteSession] {} routes, {} segments, {} incidents nearby (traffic ahead: {})",
            session.candidates.len(),
            session.segmentation.segments.len(),
            session.nearby.len(),
            session.segmentation.traffic_ahead
        );

        session
    }

    pub fn origin(&self) -> Coordinate {
        self.origin
    }

    pub fn destination(&self) -> Coordinate {
        self.destination
    }

    pub fn candidates(&self) -> &[RouteCandidate] {
        &self.candidates
    }

    pub fn segmentation(&self) -> &SegmentationResult {
        &self.segmentation
    }

    pub fn segments(&self) -> &[RouteSegment] {
        &self.segmentation.segments
    }

    pub fn has_routes(&self) -> bool {
        !self.segmentation.segments.is_empty()
    }

    pub fn traffic_ahead(&self) -> bool {
        self.segmentation.traffic_ahead
    }

    pub fn has_alternates(&self) -> bool {
        self.segmentation.has_alternates
    }

    pub fn highlighted_route(&self) -> Option<&str> {
        self.highlighted.as_deref()
    }

    /// Coordinates of the highlighted route, empty without one.
    pub fn highlighted_coordinates(&self) -> Vec<Coordinate> {
        match &self.highlighted {
            Some(id) => self.segmentation.route_coordinates(id),
            None => Vec::new(),
        }
    }

    /// Incidents along the highlighted route, nearest first.
    pub fn nearby_incidents(&self) -> &[IncidentRecord] {
        &self.nearby
    }

    /// Number of active incidents in the held snapshot.
    pub fn snapshot_len(&self) -> usize {
        self.index.len()
    }

    /// Highlight another route. Unknown ids leave the session unchanged and
    /// return `false`.
    pub fn select_route(&mut self, route_id: &str) -> bool {
        if !self.segmentation.has_route(route_id) {
            debug!("[RouteSession] Ignoring unknown route {}", route_id);
            return false;
        }
        if self.highlighted.as_deref() != Some(route_id) {
            self.highlighted = Some(route_id.to_string());
            self.recompute_nearby();
        }
        true
    }

    /// Re-read the incident snapshot. On failure the previous snapshot is
    /// kept and `false` returned.
    pub async fn refresh_incidents<S: IncidentStore>(&mut self, store: &S) -> bool {
        match store.active_incidents().await {
            Ok(snapshot) => {
                self.index = IncidentIndex::new(snapshot);
                self.recompute_nearby();
                true
            }
            Err(e) => {
                warn!("[RouteSession] Refresh failed, keeping previous incidents: {}", e);
                false
            }
        }
    }

    /// Incidents around a point (e.g. the map center), from the held snapshot.
    pub fn incidents_near(&self, center: &Coordinate) -> Vec<IncidentRecord> {
        self.index.near_point(center, self.config.point_radius_km)
    }

    /// Camera bounds: every route, or the trip endpoints without routes.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut points: Vec<Coordinate> = self
            .segmentation
            .segments
            .iter()
            .flat_map(|s| s.coordinates())
            .collect();
        if points.is_empty() {
            points = vec![self.origin, self.destination];
        }
        compute_bounds(&points)
    }

    fn recompute_nearby(&mut self) {
        let route = self.highlighted_coordinates();
        self.nearby = if route.is_empty() {
            Vec::new()
        } else {
            self.index.near_route(&route, self.config.route_radius_km)
        };
    }
}
