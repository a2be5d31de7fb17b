//! Codec between incident records and Firestore REST documents.
//!
//! Documents follow the layout the mobile app has always written:
//!
//! | field         | Firestore value                         |
//! |---------------|-----------------------------------------|
//! | `type`        | string, catalog id                      |
//! | `location`    | geo point (lat, lng)                    |
//! | `coordinates` | array `[lng, lat]`                      |
//! | `description` | string                                  |
//! | `reportedBy`  | string                                  |
//! | `reportedAt`  | timestamp                               |
//! | `active`      | boolean                                 |
//! | `upvotes`     | integer (a decimal string on the wire)  |
//! | `confirmedBy` | array of strings                        |
//!
//! Decoding is lenient about missing optional fields and strict about the
//! position: a document without a usable position is rejected, and query
//! decoding skips it with a warning.

use std::time::SystemTime;

use chrono::DateTime;
use log::{debug, warn};
use serde_json::{json, Map, Value};

use crate::error::{OptionExt, RoadwatchError, Result};
use crate::incident::{IncidentRecord, IncidentType, NewIncident, ANONYMOUS_USER};
use crate::Coordinate;

/// Default collection holding incident documents.
pub const INCIDENTS_COLLECTION: &str = "incidents";

/// Field paths written by a confirmation.
pub const CONFIRMATION_FIELDS: [&str; 2] = ["confirmedBy", "upvotes"];

/// Last path segment of a document resource name.
///
/// ```
/// use roadwatch::firestore::document_id;
/// let name = "projects/p/databases/(default)/documents/incidents/abc123";
/// assert_eq!(document_id(name), Some("abc123"));
/// ```
pub fn document_id(name: &str) -> Option<&str> {
    name.rsplit('/').next().filter(|id| !id.is_empty())
}

// ============================================================================
// Encoding
// ============================================================================

fn string_value(value: &str) -> Value {
    json!({ "stringValue": value })
}

fn string_array(values: &[String]) -> Value {
    let values: Vec<Value> = values.iter().map(|v| string_value(v)).collect();
    json!({ "arrayValue": { "values": values } })
}

/// Document body for a new report.
///
/// `reportedAt` is left out; the server's `createTime` stands in for it when
/// the document is read back.
pub fn encode_new_incident(incident: &NewIncident) -> Value {
    let Coordinate { longitude, latitude } = incident.coordinate;
    json!({
        "fields": {
            "type": string_value(incident.incident_type.id()),
            "location": { "geoPointValue": { "latitude": latitude, "longitude": longitude } },
            "coordinates": { "arrayValue": { "values": [
                { "doubleValue": longitude },
                { "doubleValue": latitude },
            ] } },
            "description": string_value(&incident.description),
            "reportedBy": string_value(&incident.reported_by),
            "active": { "booleanValue": true },
            "upvotes": { "integerValue": "0" },
            "confirmedBy": { "arrayValue": {} },
        }
    })
}

/// Document body for a confirmation update, paired with [`CONFIRMATION_FIELDS`]
/// as the update mask.
pub fn encode_confirmation(confirmed_by: &[String], upvotes: u32) -> Value {
    json!({
        "fields": {
            "confirmedBy": string_array(confirmed_by),
            "upvotes": { "integerValue": upvotes.to_string() },
        }
    })
}

/// `:runQuery` body selecting active incidents in `collection`.
pub fn active_incidents_query(collection: &str) -> Value {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": collection }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": "active" },
                    "op": "EQUAL",
                    "value": { "booleanValue": true },
                }
            }
        }
    })
}

// ============================================================================
// Decoding
// ============================================================================

fn field_str<'a>(fields: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    fields.get(name)?.get("stringValue")?.as_str()
}

fn as_number(value: &Value) -> Option<f64> {
    if let Some(v) = value.get("doubleValue") {
        return v.as_f64();
    }
    integer(value).map(|v| v as f64)
}

/// Integers arrive as decimal strings, but tolerate bare numbers too.
fn integer(value: &Value) -> Option<i64> {
    match value.get("integerValue")? {
        Value::String(s) => s.parse().ok(),
        v => v.as_i64(),
    }
}

fn array_values<'a>(value: &'a Value) -> Option<&'a [Value]> {
    let array = value.get("arrayValue")?;
    // Firestore omits `values` for empty arrays
    match array.get("values").and_then(Value::as_array) {
        Some(values) => Some(values.as_slice()),
        None => Some(&[]),
    }
}

fn timestamp(value: &str) -> Option<SystemTime> {
    DateTime::parse_from_rfc3339(value).ok().map(SystemTime::from)
}

fn decode_coordinate(fields: &Map<String, Value>) -> Option<Coordinate> {
    let from_array = fields.get("coordinates").and_then(array_values).and_then(|values| {
        let position: Option<Vec<f64>> = values.iter().map(as_number).collect();
        Coordinate::from_position(&position?)
    });

    from_array.or_else(|| {
        let point = fields.get("location")?.get("geoPointValue")?;
        // Firestore omits zero-valued members
        let latitude = point.get("latitude").map_or(Some(0.0), Value::as_f64)?;
        let longitude = point.get("longitude").map_or(Some(0.0), Value::as_f64)?;
        let coordinate = Coordinate::new(longitude, latitude);
        coordinate.is_finite().then_some(coordinate)
    })
}

/// Decode one document into a record.
///
/// Missing fields default to: `active = false`, `upvotes = 0`, no
/// confirmers, empty description, anonymous reporter and the hazard type.
/// Repeated confirmers are collapsed.
pub fn decode_document(document: &Value) -> Result<IncidentRecord> {
    let name = document
        .get("name")
        .and_then(Value::as_str)
        .ok_or_malformed("document has no name")?;
    let id = document_id(name).ok_or_malformed("document name has no id")?;

    let empty = Map::new();
    let fields = document.get("fields").and_then(Value::as_object).unwrap_or(&empty);

    let coordinate = decode_coordinate(fields)
        .ok_or_else(|| RoadwatchError::MalformedPayload(format!("document {} has no position", id)))?;

    let incident_type = match field_str(fields, "type") {
        Some(raw) => IncidentType::from_id(raw).unwrap_or_else(|| {
            debug!("[Firestore] {} has unknown type {:?}, using hazard", id, raw);
            IncidentType::Hazard
        }),
        None => IncidentType::Hazard,
    };

    let mut confirmed_by: Vec<String> = Vec::new();
    if let Some(values) = fields.get("confirmedBy").and_then(array_values) {
        for user in values.iter().filter_map(|v| v.get("stringValue")?.as_str()) {
            if !confirmed_by.iter().any(|u| u == user) {
                confirmed_by.push(user.to_string());
            }
        }
    }

    let upvotes = fields
        .get("upvotes")
        .and_then(integer)
        .map(|n| u32::try_from(n.max(0)).unwrap_or(u32::MAX))
        .unwrap_or(0);

    let reported_at = fields
        .get("reportedAt")
        .and_then(|v| v.get("timestampValue"))
        .or_else(|| document.get("createTime"))
        .and_then(Value::as_str)
        .and_then(timestamp);

    Ok(IncidentRecord {
        id: id.to_string(),
        incident_type,
        coordinate,
        description: field_str(fields, "description").unwrap_or_default().to_string(),
        reported_by: field_str(fields, "reportedBy").unwrap_or(ANONYMOUS_USER).to_string(),
        reported_at,
        active: fields
            .get("active")
            .and_then(|v| v.get("booleanValue"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
        upvotes,
        confirmed_by,
        distance_km: None,
    })
}

/// Decode a `:runQuery` response, skipping malformed documents.
pub fn decode_query_response(body: &str) -> Result<Vec<IncidentRecord>> {
    let entries: Vec<Value> = serde_json::from_str(body)?;

    let mut records = Vec::with_capacity(entries.len());
    for document in entries.iter().filter_map(|entry| entry.get("document")) {
        match decode_document(document) {
            Ok(record) => records.push(record),
            Err(e) => warn!("[Firestore] Skipping document: {}", e),
        }
    }

    debug!("[Firestore] Decoded {} incidents", records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn stored_document() -> Value {
        json!({
            "name": "projects/demo/databases/(default)/documents/incidents/abc123",
            "fields": {
                "type": { "stringValue": "heavy_traffic" },
                "location": { "geoPointValue": { "latitude": 51.5074, "longitude": -0.1278 } },
                "coordinates": { "arrayValue": { "values": [
                    { "doubleValue": -0.1278 },
                    { "doubleValue": 51.5074 }
                ] } },
                "description": { "stringValue": "queue to the junction" },
                "reportedBy": { "stringValue": "uid-1" },
                "reportedAt": { "timestampValue": "2024-03-01T12:00:00Z" },
                "active": { "booleanValue": true },
                "upvotes": { "integerValue": "2" },
                "confirmedBy": { "arrayValue": { "values": [
                    { "stringValue": "uid-2" },
                    { "stringValue": "uid-3" },
                    { "stringValue": "uid-2" }
                ] } }
            },
            "createTime": "2024-03-01T12:00:01.5Z",
            "updateTime": "2024-03-01T12:05:00Z"
        })
    }

    #[test]
    fn test_decode_full_document() {
        let record = decode_document(&stored_document()).unwrap();
        assert_eq!(record.id, "abc123");
        assert_eq!(record.incident_type, IncidentType::HeavyTraffic);
        assert_eq!(record.coordinate, Coordinate::new(-0.1278, 51.5074));
        assert_eq!(record.description, "queue to the junction");
        assert_eq!(record.reported_by, "uid-1");
        assert!(record.active);
        assert_eq!(record.upvotes, 2);
        assert_eq!(record.confirmed_by, vec!["uid-2", "uid-3"]);
        assert_eq!(
            record.reported_at,
            Some(UNIX_EPOCH + Duration::from_secs(1_709_294_400))
        );
    }

    #[test]
    fn test_decode_defaults_and_create_time() {
        let document = json!({
            "name": "projects/demo/databases/(default)/documents/incidents/min",
            "fields": {
                "type": { "stringValue": "meteor_strike" },
                "location": { "geoPointValue": { "latitude": 10.0 } },
                "upvotes": { "integerValue": "-4" }
            },
            "createTime": "2024-03-01T12:00:00Z"
        });
        let record = decode_document(&document).unwrap();

        assert_eq!(record.incident_type, IncidentType::Hazard);
        assert_eq!(record.coordinate, Coordinate::new(0.0, 10.0));
        assert!(!record.active);
        assert_eq!(record.upvotes, 0);
        assert!(record.confirmed_by.is_empty());
        assert_eq!(record.reported_by, ANONYMOUS_USER);
        assert_eq!(record.description, "");
        assert_eq!(
            record.reported_at,
            Some(UNIX_EPOCH + Duration::from_secs(1_709_294_400))
        );
    }

    #[test]
    fn test_decode_rejects_missing_position() {
        let document = json!({
            "name": "projects/demo/databases/(default)/documents/incidents/nowhere",
            "fields": { "type": { "stringValue": "police" } }
        });
        assert!(matches!(
            decode_document(&document),
            Err(RoadwatchError::MalformedPayload(msg)) if msg.contains("nowhere")
        ));
        assert!(decode_document(&json!({ "fields": {} })).is_err());
    }

    #[test]
    fn test_decode_query_response_skips_bad_documents() {
        let body = json!([
            { "document": stored_document(), "readTime": "2024-03-01T13:00:00Z" },
            { "document": { "name": "projects/demo/databases/(default)/documents/incidents/bad", "fields": {} } },
            { "readTime": "2024-03-01T13:00:00Z" }
        ])
        .to_string();

        let records = decode_query_response(&body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "abc123");

        assert!(decode_query_response(r#"[{"readTime": "2024-03-01T13:00:00Z"}]"#)
            .unwrap()
            .is_empty());
        assert!(decode_query_response(r#"{"error": {"code": 403}}"#).is_err());
    }

    #[test]
    fn test_encoded_report_decodes_back() {
        let draft = NewIncident::new(
            IncidentType::Flooding,
            Coordinate::new(2.3522, 48.8566),
            "river over the road",
            Some("uid-9"),
        )
        .unwrap();

        let mut document = encode_new_incident(&draft);
        document["name"] = json!("projects/demo/databases/(default)/documents/incidents/new1");

        let record = decode_document(&document).unwrap();
        assert_eq!(record.incident_type, IncidentType::Flooding);
        assert_eq!(record.coordinate, Coordinate::new(2.3522, 48.8566));
        assert_eq!(record.reported_by, "uid-9");
        assert!(record.active);
        assert_eq!(record.upvotes, 0);
        assert!(record.confirmed_by.is_empty());
        assert_eq!(record.reported_at, None);
    }

    #[test]
    fn test_encode_confirmation() {
        let body = encode_confirmation(&["a".to_string(), "b".to_string()], 2);
        assert_eq!(body["fields"]["upvotes"]["integerValue"], "2");
        assert_eq!(
            body["fields"]["confirmedBy"]["arrayValue"]["values"][1]["stringValue"],
            "b"
        );
        assert_eq!(CONFIRMATION_FIELDS.len(), body["fields"].as_object().unwrap().len());
    }

    #[test]
    fn test_active_query_shape() {
        let query = active_incidents_query(INCIDENTS_COLLECTION);
        let filter = &query["structuredQuery"]["where"]["fieldFilter"];
        assert_eq!(filter["field"]["fieldPath"], "active");
        assert_eq!(filter["op"], "EQUAL");
        assert_eq!(query["structuredQuery"]["from"][0]["collectionId"], "incidents");
    }

    #[test]
    fn test_document_id() {
        assert_eq!(document_id("a/b/incidents/x"), Some("x"));
        assert_eq!(document_id("trailing/"), None);
        assert_eq!(document_id("plain"), Some("plain"));
    }
}
