//! Plan a route, report incidents along it and confirm one.
//!
//! Runs offline against the in-memory store and a canned directions
//! response.
//!
//! Run with: cargo run --example route_incidents

use roadwatch::render::segments_feature_collection;
use roadwatch::{
    decode_directions, Coordinate, DirectionsProvider, IncidentService, IncidentType,
    MemoryIncidentStore, ProximityConfig, Result, RouteCandidate, RouteSession,
};

/// Directions for a short drive through central London, with one alternate.
const DIRECTIONS: &str = r#"{
    "code": "Ok",
    "routes": [
        {
            "geometry": {"type": "LineString", "coordinates": [
                [-0.1278, 51.5074], [-0.1290, 51.5080], [-0.1300, 51.5090],
                [-0.1310, 51.5100], [-0.1320, 51.5110]
            ]},
            "distance": 520.0,
            "duration": 140.0,
            "legs": [{"annotation": {"congestion": ["low", "moderate", "heavy", "low"]}}]
        },
        {
            "geometry": {"type": "LineString", "coordinates": [
                [-0.1278, 51.5074], [-0.1260, 51.5095], [-0.1320, 51.5110]
            ]},
            "distance": 610.0,
            "duration": 150.0,
            "legs": [{"annotation": {"congestion": ["low", "low"]}}]
        }
    ]
}"#;

struct CannedDirections;

impl DirectionsProvider for CannedDirections {
    async fn directions(&self, _origin: Coordinate, _destination: Coordinate) -> Result<Vec<RouteCandidate>> {
        decode_directions(DIRECTIONS)
    }
}

fn main() {
    futures::executor::block_on(run());
}

async fn run() {
    let origin = Coordinate::new(-0.1278, 51.5074);
    let destination = Coordinate::new(-0.1320, 51.5110);
    let service = IncidentService::new(MemoryIncidentStore::new());

    println!("Route Incidents Example\n");

    // Two reports near the primary route, one far away
    let reports = [
        (IncidentType::Accident, Coordinate::new(-0.1301, 51.5091), "two cars, left lane"),
        (IncidentType::Police, Coordinate::new(-0.1262, 51.5096), "checkpoint"),
        (IncidentType::Flooding, Coordinate::new(-0.2000, 51.4500), "underpass flooded"),
    ];
    let mut ids = Vec::new();
    for (kind, at, description) in reports {
        match service.report_incident(kind, at, description, Some("demo-driver")).await {
            Some(id) => {
                println!("Reported {} {} ({})", kind.icon(), kind.display_name(), id);
                ids.push(id);
            }
            None => println!("Report rejected: {}", kind.display_name()),
        }
    }

    let mut session = RouteSession::plan(
        &CannedDirections,
        service.store(),
        origin,
        destination,
        ProximityConfig::default(),
    )
    .await;

    println!("\nRoutes: {:?}", session.segmentation().route_ids());
    println!("Traffic ahead: {}", session.traffic_ahead());
    println!("Less congested alternative available: {}", session.has_alternates());

    print_nearby(&session);

    if let Some(first) = ids.first() {
        let confirmed = service.confirm_incident(first, Some("second-driver")).await;
        let again = service.confirm_incident(first, Some("second-driver")).await;
        println!("\nConfirm {}: {} (repeat: {})", first, confirmed, again);
        session.refresh_incidents(service.store()).await;
    }

    session.select_route("alt_0");
    print_nearby(&session);

    let geojson = segments_feature_collection(session.segments(), session.highlighted_route());
    println!("\nSegment features: {}", geojson["features"].as_array().map_or(0, Vec::len));
}

fn print_nearby(session: &RouteSession) {
    println!(
        "\nIncidents along {}:",
        session.highlighted_route().unwrap_or("(no route)")
    );
    if session.nearby_incidents().is_empty() {
        println!("   none");
    }
    for incident in session.nearby_incidents() {
        println!(
            "   {} {:<16} {:>6.0}m  {} upvotes",
            incident.incident_type.icon(),
            incident.incident_type.display_name(),
            incident.distance_km.unwrap_or_default() * 1000.0,
            incident.upvotes
        );
    }
}
