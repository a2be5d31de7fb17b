//! GeoJSON output for the map layer.
//!
//! Route segments become one LineString feature each so the map can colour
//! every edge by congestion; incidents become Point features carrying what
//! the marker callout shows.

use serde_json::{json, Value};

use crate::segmentation::{CongestionLevel, RouteSegment};
use crate::IncidentRecord;

/// Line colour for routes other than the highlighted one.
pub const UNSELECTED_ROUTE_COLOR: &str = "#888888";

/// Hex line colour for a congestion level.
pub fn congestion_color(level: CongestionLevel) -> &'static str {
    match level {
        CongestionLevel::Low => "#2ecc71",
        CongestionLevel::Moderate => "#f1c40f",
        CongestionLevel::Heavy => "#e67e22",
        CongestionLevel::Severe => "#e74c3c",
        CongestionLevel::Unknown => "#95a5a6",
    }
}

/// Colour a segment is drawn with. Only the highlighted route shows
/// congestion; every other route is dimmed.
pub fn segment_color(segment: &RouteSegment, highlighted_route: Option<&str>) -> &'static str {
    if highlighted_route == Some(segment.route_id.as_str()) {
        congestion_color(segment.congestion)
    } else {
        UNSELECTED_ROUTE_COLOR
    }
}

/// `FeatureCollection` with one LineString per segment.
pub fn segments_feature_collection(segments: &[RouteSegment], highlighted_route: Option<&str>) -> Value {
    let features: Vec<Value> = segments
        .iter()
        .map(|segment| {
            let highlighted = highlighted_route == Some(segment.route_id.as_str());
            json!({
                "type": "Feature",
                "properties": {
                    "congestion": segment.congestion.as_str(),
                    "isAlternate": segment.is_alternate,
                    "routeId": segment.route_id,
                    "highlighted": highlighted,
                    "color": segment_color(segment, highlighted_route),
                },
                "geometry": {
                    "type": "LineString",
                    "coordinates": [segment.start.to_position(), segment.end.to_position()],
                }
            })
        })
        .collect();

    json!({ "type": "FeatureCollection", "features": features })
}

/// `FeatureCollection` with one Point per incident, ids `incident-{id}`.
pub fn incidents_feature_collection(incidents: &[IncidentRecord]) -> Value {
    let features: Vec<Value> = incidents
        .iter()
        .map(|incident| {
            let kind = incident.incident_type;
            json!({
                "type": "Feature",
                "id": format!("incident-{}", incident.id),
                "properties": {
                    "incidentId": incident.id,
                    "type": kind.id(),
                    "name": kind.display_name(),
                    "icon": kind.icon(),
                    "description": incident.description,
                    "upvotes": incident.upvotes,
                    "confirmations": incident.confirmed_by.len(),
                    "distanceKm": incident.distance_km,
                },
                "geometry": {
                    "type": "Point",
                    "coordinates": incident.coordinate.to_position(),
                }
            })
        })
        .collect();

    json!({ "type": "FeatureCollection", "features": features })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{segment_routes, Coordinate, IncidentType, RouteCandidate, RouteOrigin};

    #[test]
    fn test_segments_feature_collection() {
        let candidates = vec![
            RouteCandidate::new(
                RouteOrigin::Primary,
                vec![vec![0.0, 0.0], vec![0.0, 1.0]],
                vec![CongestionLevel::Heavy],
            ),
            RouteCandidate::new(
                RouteOrigin::Alternate { index: 0 },
                vec![vec![0.0, 0.0], vec![1.0, 1.0]],
                vec![CongestionLevel::Low],
            ),
        ];
        let result = segment_routes(&candidates);
        let collection = segments_feature_collection(&result.segments, Some("main"));

        assert_eq!(collection["type"], "FeatureCollection");
        let features = collection["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);

        assert_eq!(features[0]["properties"]["congestion"], "heavy");
        assert_eq!(features[0]["properties"]["routeId"], "main");
        assert_eq!(features[0]["properties"]["isAlternate"], false);
        assert_eq!(features[0]["properties"]["highlighted"], true);
        assert_eq!(features[0]["properties"]["color"], "#e67e22");
        assert_eq!(features[0]["geometry"]["coordinates"], json!([[0.0, 0.0], [0.0, 1.0]]));

        assert_eq!(features[1]["properties"]["routeId"], "alt_0");
        assert_eq!(features[1]["properties"]["highlighted"], false);
        assert_eq!(features[1]["properties"]["color"], UNSELECTED_ROUTE_COLOR);

        let collection = segments_feature_collection(&result.segments, Some("alt_0"));
        assert_eq!(collection["features"][0]["properties"]["color"], UNSELECTED_ROUTE_COLOR);
        assert_eq!(collection["features"][1]["properties"]["color"], "#2ecc71");
    }

    #[test]
    fn test_incidents_feature_collection() {
        let mut incident = IncidentRecord::new("abc", IncidentType::Flooding, Coordinate::new(2.0, 48.0));
        incident.confirm("u1");
        let incident = incident.with_distance(0.25);

        let collection = incidents_feature_collection(&[incident]);
        let feature = &collection["features"][0];

        assert_eq!(feature["id"], "incident-abc");
        assert_eq!(feature["properties"]["type"], "flooding");
        assert_eq!(feature["properties"]["name"], "Road Flooding");
        assert_eq!(feature["properties"]["icon"], "💧");
        assert_eq!(feature["properties"]["upvotes"], 1);
        assert_eq!(feature["properties"]["confirmations"], 1);
        assert_eq!(feature["properties"]["distanceKm"], 0.25);
        assert_eq!(feature["geometry"]["coordinates"], json!([2.0, 48.0]));
    }

    #[test]
    fn test_congestion_colors() {
        assert_eq!(congestion_color(CongestionLevel::Low), "#2ecc71");
        assert_eq!(congestion_color(CongestionLevel::Severe), "#e74c3c");
        assert_eq!(congestion_color(CongestionLevel::Unknown), "#95a5a6");
        assert!(segments_feature_collection(&[], None)["features"].as_array().unwrap().is_empty());
    }
}
