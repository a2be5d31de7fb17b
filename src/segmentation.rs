//! Route segmentation.
//!
//! Splits every candidate route into one two-point segment per edge, tagged
//! with the edge's congestion level and the route it came from. Segments keep
//! edge order within a route and routes keep input order, so the output is
//! deterministic for a given directions response.
//!
//! Upstream geometry is taken as raw positions. A pair where either position
//! is not at least two finite numbers is skipped without failing the route;
//! the congestion index still advances, so later edges stay aligned with their
//! annotations.

use geo::{Line, LineString};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::geo_utils::polyline_length_km;
use crate::Coordinate;

/// Route identifier of the primary route.
pub const PRIMARY_ROUTE_ID: &str = "main";

/// Traffic density on one route edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum CongestionLevel {
    Low,
    Moderate,
    Heavy,
    Severe,
    #[default]
    Unknown,
}

impl CongestionLevel {
    /// Parse an annotation; anything unrecognized is `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value {
            "low" => CongestionLevel::Low,
            "moderate" => CongestionLevel::Moderate,
            "heavy" => CongestionLevel::Heavy,
            "severe" => CongestionLevel::Severe,
            _ => CongestionLevel::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CongestionLevel::Low => "low",
            CongestionLevel::Moderate => "moderate",
            CongestionLevel::Heavy => "heavy",
            CongestionLevel::Severe => "severe",
            CongestionLevel::Unknown => "unknown",
        }
    }

    /// Heavy or severe traffic.
    pub fn is_congested(&self) -> bool {
        matches!(self, CongestionLevel::Heavy | CongestionLevel::Severe)
    }
}

/// Where a candidate sits in a directions response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum RouteOrigin {
    Primary,
    /// `index` counts alternates only, starting at 0
    Alternate { index: u32 },
}

impl RouteOrigin {
    /// `"main"` for the primary route, `"alt_{index}"` for alternates.
    pub fn route_id(&self) -> String {
        match self {
            RouteOrigin::Primary => PRIMARY_ROUTE_ID.to_string(),
            RouteOrigin::Alternate { index } => format!("alt_{}", index),
        }
    }

    pub fn is_alternate(&self) -> bool {
        matches!(self, RouteOrigin::Alternate { .. })
    }

    /// Inverse of [`RouteOrigin::route_id`].
    pub fn from_route_id(route_id: &str) -> Option<Self> {
        if route_id == PRIMARY_ROUTE_ID {
            return Some(RouteOrigin::Primary);
        }
        route_id
            .strip_prefix("alt_")
            .and_then(|index| index.parse().ok())
            .map(|index| RouteOrigin::Alternate { index })
    }
}

/// One path option returned by the directions collaborator.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RouteCandidate {
    pub origin: RouteOrigin,
    /// Raw positions as received; see [`Coordinate::from_position`]
    pub geometry: Vec<Vec<f64>>,
    /// One level per edge; missing entries read as `Unknown`
    pub congestion: Vec<CongestionLevel>,
    /// Route length reported upstream, in meters
    pub distance_m: f64,
    /// Travel time reported upstream, in seconds
    pub duration_s: f64,
}

impl RouteCandidate {
    pub fn new(origin: RouteOrigin, geometry: Vec<Vec<f64>>, congestion: Vec<CongestionLevel>) -> Self {
        Self {
            origin,
            geometry,
            congestion,
            distance_m: 0.0,
            duration_s: 0.0,
        }
    }

    pub fn route_id(&self) -> String {
        self.origin.route_id()
    }

    /// Number of edges implied by the geometry.
    pub fn edge_count(&self) -> usize {
        self.geometry.len().saturating_sub(1)
    }

    /// Congestion of edge `index`, `Unknown` when not annotated.
    pub fn congestion_at(&self, index: usize) -> CongestionLevel {
        self.congestion.get(index).copied().unwrap_or_default()
    }

    /// The well-formed positions of the geometry, in order.
    pub fn coordinates(&self) -> Vec<Coordinate> {
        self.geometry
            .iter()
            .filter_map(|p| Coordinate::from_position(p))
            .collect()
    }

    /// Length of the well-formed geometry, in kilometers.
    pub fn length_km(&self) -> f64 {
        polyline_length_km(&self.coordinates())
    }

    /// The well-formed geometry as a `geo` line string.
    pub fn to_line_string(&self) -> LineString<f64> {
        self.coordinates().into_iter().map(|c| c.to_point()).collect()
    }
}

/// One edge of a candidate route.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RouteSegment {
    pub start: Coordinate,
    pub end: Coordinate,
    pub congestion: CongestionLevel,
    pub route_id: String,
    pub is_alternate: bool,
}

impl RouteSegment {
    pub fn coordinates(&self) -> [Coordinate; 2] {
        [self.start, self.end]
    }

    pub fn to_line(&self) -> Line<f64> {
        Line::new(self.start.to_point(), self.end.to_point())
    }
}

/// Segments for every candidate plus the derived traffic flag.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct SegmentationResult {
    pub segments: Vec<RouteSegment>,
    /// True if any primary-route segment is heavy or severe
    pub traffic_ahead: bool,
    /// True if the response contained at least one alternate
    pub has_alternates: bool,
}

impl SegmentationResult {
    /// Distinct route ids in first-seen order.
    pub fn route_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for segment in &self.segments {
            if !ids.contains(&segment.route_id) {
                ids.push(segment.route_id.clone());
            }
        }
        ids
    }

    pub fn has_route(&self, route_id: &str) -> bool {
        self.segments.iter().any(|s| s.route_id == route_id)
    }

    pub fn segments_for<'a>(&'a self, route_id: &'a str) -> impl Iterator<Item = &'a RouteSegment> + 'a {
        self.segments.iter().filter(move |s| s.route_id == route_id)
    }

    /// Coordinates of one route; see [`route_coordinates`].
    pub fn route_coordinates(&self, route_id: &str) -> Vec<Coordinate> {
        route_coordinates(&self.segments, route_id)
    }
}

/// Split one candidate into its edge segments.
///
/// # Example
/// ```
/// use roadwatch::{segment_route, CongestionLevel, RouteCandidate, RouteOrigin};
///
/// let candidate = RouteCandidate::new(
///     RouteOrigin::Primary,
///     vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
///     vec![CongestionLevel::Low],
/// );
///
/// let segments = segment_route(&candidate);
/// assert_eq!(segments.len(), 2);
/// assert_eq!(segments[0].congestion, CongestionLevel::Low);
/// assert_eq!(segments[1].congestion, CongestionLevel::Unknown);
/// ```
pub fn segment_route(candidate: &RouteCandidate) -> Vec<RouteSegment> {
    let route_id = candidate.route_id();
    let is_alternate = candidate.origin.is_alternate();

    let segments: Vec<RouteSegment> = candidate
        .geometry
        .windows(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            let start = Coordinate::from_position(&pair[0])?;
            let end = Coordinate::from_position(&pair[1])?;
            Some(RouteSegment {
                start,
                end,
                congestion: candidate.congestion_at(i),
                route_id: route_id.clone(),
                is_alternate,
            })
        })
        .collect();

    let skipped = candidate.edge_count() - segments.len();
    if skipped > 0 {
        debug!("[Segmentation] {}: skipped {} malformed edges", route_id, skipped);
    }

    segments
}

/// Segment every candidate, in input order, and derive the traffic flag.
pub fn segment_routes(candidates: &[RouteCandidate]) -> SegmentationResult {
    let mut result = SegmentationResult::default();

    for candidate in candidates {
        let segments = segment_route(candidate);

        match candidate.origin {
            RouteOrigin::Primary => {
                result.traffic_ahead |= segments.iter().any(|s| s.congestion.is_congested());
            }
            RouteOrigin::Alternate { .. } => result.has_alternates = true,
        }

        result.segments.extend(segments);
    }

    debug!(
        "[Segmentation] {} candidates -> {} segments (traffic ahead: {})",
        candidates.len(),
        result.segments.len(),
        result.traffic_ahead
    );

    result
}

/// Flatten one route's segments back into coordinates.
///
/// Emits both endpoints of every segment, so interior vertices appear twice.
/// That does not change any point-to-vertex minimum.
pub fn route_coordinates(segments: &[RouteSegment], route_id: &str) -> Vec<Coordinate> {
    segments
        .iter()
        .filter(|s| s.route_id == route_id)
        .flat_map(|s| s.coordinates())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(points: &[(f64, f64)]) -> Vec<Vec<f64>> {
        points.iter().map(|&(lng, lat)| vec![lng, lat]).collect()
    }

    #[test]
    fn test_example_two_segments() {
        let candidate = RouteCandidate::new(
            RouteOrigin::Primary,
            positions(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)]),
            vec![CongestionLevel::Low],
        );
        let segments = segment_route(&candidate);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].congestion, CongestionLevel::Low);
        assert_eq!(segments[1].congestion, CongestionLevel::Unknown);
        assert_eq!(segments[0].route_id, "main");
        assert!(!segments[0].is_alternate);
    }

    #[test]
    fn test_segments_follow_geometry_order() {
        let points: Vec<(f64, f64)> = (0..10).map(|i| (i as f64 * 0.01, 51.0 + i as f64 * 0.02)).collect();
        let candidate = RouteCandidate::new(RouteOrigin::Primary, positions(&points), vec![]);
        let segments = segment_route(&candidate);

        assert_eq!(segments.len(), points.len() - 1);
        for (i, segment) in segments.iter().enumerate() {
            assert_eq!(segment.start, Coordinate::new(points[i].0, points[i].1));
            assert_eq!(segment.end, Coordinate::new(points[i + 1].0, points[i + 1].1));
        }
    }

    #[test]
    fn test_malformed_positions_are_skipped() {
        let candidate = RouteCandidate::new(
            RouteOrigin::Primary,
            vec![
                vec![0.0, 0.0],
                vec![0.0, 1.0],
                vec![5.0],
                vec![1.0, 1.0],
                vec![1.0, f64::NAN],
                vec![2.0, 2.0],
                vec![3.0, 3.0, 120.0],
            ],
            vec![
                CongestionLevel::Low,
                CongestionLevel::Moderate,
                CongestionLevel::Heavy,
                CongestionLevel::Severe,
                CongestionLevel::Low,
                CongestionLevel::Moderate,
            ],
        );
        let segments = segment_route(&candidate);

        // Edges 0 and 5 survive; 1-4 touch a malformed position
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].congestion, CongestionLevel::Low);
        assert_eq!(segments[1].congestion, CongestionLevel::Moderate);
        assert_eq!(segments[1].start, Coordinate::new(2.0, 2.0));
        assert_eq!(segments[1].end, Coordinate::new(3.0, 3.0));
    }

    #[test]
    fn test_degenerate_geometry() {
        let empty = RouteCandidate::new(RouteOrigin::Primary, vec![], vec![]);
        assert!(segment_route(&empty).is_empty());

        let single = RouteCandidate::new(RouteOrigin::Primary, positions(&[(0.0, 0.0)]), vec![]);
        assert!(segment_route(&single).is_empty());
    }

    #[test]
    fn test_traffic_ahead_only_counts_primary() {
        let main = RouteCandidate::new(
            RouteOrigin::Primary,
            positions(&[(0.0, 0.0), (0.0, 1.0)]),
            vec![CongestionLevel::Moderate],
        );
        let alt = RouteCandidate::new(
            RouteOrigin::Alternate { index: 0 },
            positions(&[(0.0, 0.0), (1.0, 1.0)]),
            vec![CongestionLevel::Severe],
        );

        let result = segment_routes(&[main.clone(), alt]);
        assert!(!result.traffic_ahead);
        assert!(result.has_alternates);

        let jammed = RouteCandidate {
            congestion: vec![CongestionLevel::Heavy],
            ..main
        };
        let result = segment_routes(&[jammed]);
        assert!(result.traffic_ahead);
        assert!(!result.has_alternates);
    }

    #[test]
    fn test_alternate_tags_and_order() {
        let main = RouteCandidate::new(RouteOrigin::Primary, positions(&[(0.0, 0.0), (0.0, 1.0)]), vec![]);
        let alt0 = RouteCandidate::new(
            RouteOrigin::Alternate { index: 0 },
            positions(&[(0.0, 0.0), (0.5, 0.5), (0.0, 1.0)]),
            vec![],
        );
        let alt1 = RouteCandidate::new(
            RouteOrigin::Alternate { index: 1 },
            positions(&[(0.0, 0.0), (-0.5, 0.5)]),
            vec![],
        );

        let result = segment_routes(&[main, alt0, alt1]);
        let tags: Vec<(&str, bool)> = result
            .segments
            .iter()
            .map(|s| (s.route_id.as_str(), s.is_alternate))
            .collect();
        assert_eq!(
            tags,
            vec![("main", false), ("alt_0", true), ("alt_0", true), ("alt_1", true)]
        );
        assert_eq!(result.route_ids(), vec!["main", "alt_0", "alt_1"]);
        assert_eq!(result.segments_for("alt_0").count(), 2);
        assert!(result.has_route("alt_1"));
        assert!(!result.has_route("alt_2"));
    }

    #[test]
    fn test_route_coordinates_flattens_endpoints() {
        let main = RouteCandidate::new(
            RouteOrigin::Primary,
            positions(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)]),
            vec![],
        );
        let alt = RouteCandidate::new(
            RouteOrigin::Alternate { index: 0 },
            positions(&[(5.0, 5.0), (6.0, 6.0)]),
            vec![],
        );
        let result = segment_routes(&[main, alt]);

        let coords = result.route_coordinates(PRIMARY_ROUTE_ID);
        assert_eq!(
            coords,
            vec![
                Coordinate::new(0.0, 0.0),
                Coordinate::new(0.0, 1.0),
                Coordinate::new(0.0, 1.0),
                Coordinate::new(1.0, 1.0),
            ]
        );
        assert!(result.route_coordinates("alt_7").is_empty());
    }

    #[test]
    fn test_route_id_round_trip() {
        for origin in [
            RouteOrigin::Primary,
            RouteOrigin::Alternate { index: 0 },
            RouteOrigin::Alternate { index: 12 },
        ] {
            assert_eq!(RouteOrigin::from_route_id(&origin.route_id()), Some(origin));
        }
        assert_eq!(RouteOrigin::from_route_id("alt_x"), None);
        assert_eq!(RouteOrigin::from_route_id("primary"), None);
    }

    #[test]
    fn test_congestion_parse() {
        assert_eq!(CongestionLevel::parse("severe"), CongestionLevel::Severe);
        assert_eq!(CongestionLevel::parse("gridlock"), CongestionLevel::Unknown);
        assert!(CongestionLevel::Heavy.is_congested());
        assert!(!CongestionLevel::Moderate.is_congested());
        assert_eq!(CongestionLevel::default(), CongestionLevel::Unknown);
    }

    #[test]
    fn test_candidate_helpers() {
        let candidate = RouteCandidate::new(
            RouteOrigin::Alternate { index: 2 },
            vec![vec![0.0, 0.0], vec![1.0], vec![0.0, 1.0]],
            vec![],
        );
        assert_eq!(candidate.route_id(), "alt_2");
        assert_eq!(candidate.edge_count(), 2);
        assert_eq!(candidate.coordinates().len(), 2);
        assert_eq!(candidate.to_line_string().0.len(), 2);
        assert!((candidate.length_km() - 111.195).abs() < 0.01);
    }
}
