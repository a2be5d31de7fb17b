//! Incident records and the confirmation state transition.
//!
//! An incident is created by a report (active, no upvotes, no confirmers) and
//! afterwards only changes through [`IncidentRecord::confirm`]. The proximity
//! engine works on clones and only fills the transient `distance_km` field.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::{RoadwatchError, Result};
use crate::Coordinate;

/// Longest accepted incident description, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 150;

/// Identity recorded when no signed-in user is available.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Resolve an optional user identity, falling back to [`ANONYMOUS_USER`].
pub fn user_or_anonymous(user_id: Option<&str>) -> String {
    match user_id.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => ANONYMOUS_USER.to_string(),
    }
}

/// The fixed catalog of reportable road conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum IncidentType {
    Accident,
    DamagedRoad,
    BlockedRoad,
    Flooding,
    Police,
    Construction,
    HeavyTraffic,
    Hazard,
}

impl IncidentType {
    /// Every incident type, in the order the report picker lists them.
    pub const ALL: [IncidentType; 8] = [
        IncidentType::Accident,
        IncidentType::DamagedRoad,
        IncidentType::BlockedRoad,
        IncidentType::Flooding,
        IncidentType::Police,
        IncidentType::Construction,
        IncidentType::HeavyTraffic,
        IncidentType::Hazard,
    ];

    /// Wire identifier stored in the document database.
    pub fn id(&self) -> &'static str {
        match self {
            IncidentType::Accident => "accident",
            IncidentType::DamagedRoad => "damaged_road",
            IncidentType::BlockedRoad => "blocked_road",
            IncidentType::Flooding => "flooding",
            IncidentType::Police => "police",
            IncidentType::Construction => "construction",
            IncidentType::HeavyTraffic => "heavy_traffic",
            IncidentType::Hazard => "hazard",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            IncidentType::Accident => "Accident",
            IncidentType::DamagedRoad => "Damaged Road",
            IncidentType::BlockedRoad => "Road Blocked",
            IncidentType::Flooding => "Road Flooding",
            IncidentType::Police => "Police Activity",
            IncidentType::Construction => "Construction",
            IncidentType::HeavyTraffic => "Heavy Traffic",
            IncidentType::Hazard => "Road Hazard",
        }
    }

    /// Map marker glyph.
    pub fn icon(&self) -> &'static str {
        match self {
            IncidentType::Accident => "🚗",
            IncidentType::DamagedRoad => "🚧",
            IncidentType::BlockedRoad => "🚫",
            IncidentType::Flooding => "💧",
            IncidentType::Police => "👮",
            IncidentType::Construction => "🏗️",
            IncidentType::HeavyTraffic => "🚦",
            IncidentType::Hazard => "⚠️",
        }
    }

    /// Look up a type by its wire identifier.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.id() == id)
    }
}

/// A crowd-sourced road incident report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct IncidentRecord {
    /// Opaque id assigned by the store
    pub id: String,
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    pub coordinate: Coordinate,
    pub description: String,
    pub reported_by: String,
    /// Assigned by the store on insert
    pub reported_at: Option<SystemTime>,
    pub active: bool,
    pub upvotes: u32,
    /// Identities that corroborated the report, each at most once
    pub confirmed_by: Vec<String>,
    /// Distance from the last proximity query, never persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

impl IncidentRecord {
    /// A freshly reported, active incident with no description.
    pub fn new(id: &str, incident_type: IncidentType, coordinate: Coordinate) -> Self {
        Self {
            id: id.to_string(),
            incident_type,
            coordinate,
            description: String::new(),
            reported_by: ANONYMOUS_USER.to_string(),
            reported_at: None,
            active: true,
            upvotes: 0,
            confirmed_by: Vec::new(),
            distance_km: None,
        }
    }

    pub fn is_confirmed_by(&self, user_id: &str) -> bool {
        self.confirmed_by.iter().any(|u| u == user_id)
    }

    /// Record a confirmation from `user_id`.
    ///
    /// Adds the user and increments upvotes, returning `true`. A user who
    /// already confirmed leaves the record untouched and gets `false`.
    ///
    /// # Example
    /// ```
    /// use roadwatch::{Coordinate, IncidentRecord, IncidentType};
    ///
    /// let mut incident = IncidentRecord::new("i1", IncidentType::Police, Coordinate::new(0.0, 0.0));
    /// assert!(incident.confirm("driver-7"));
    /// assert!(!incident.confirm("driver-7"));
    /// assert_eq!(incident.upvotes, 1);
    /// ```
    pub fn confirm(&mut self, user_id: &str) -> bool {
        if self.is_confirmed_by(user_id) {
            return false;
        }
        self.confirmed_by.push(user_id.to_string());
        self.upvotes = self.upvotes.saturating_add(1);
        true
    }

    /// Clone annotated with a query distance.
    pub(crate) fn with_distance(&self, distance_km: f64) -> Self {
        Self {
            distance_km: Some(distance_km),
            ..self.clone()
        }
    }
}

/// A validated incident report, ready to be inserted by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIncident {
    pub incident_type: IncidentType,
    pub coordinate: Coordinate,
    pub description: String,
    pub reported_by: String,
}

impl NewIncident {
    /// Validate a report draft.
    ///
    /// The coordinate must be a valid WGS-84 position and the description at
    /// most [`MAX_DESCRIPTION_CHARS`] characters (surrounding whitespace is
    /// trimmed first). A missing reporter becomes [`ANONYMOUS_USER`].
    pub fn new(
        incident_type: IncidentType,
        coordinate: Coordinate,
        description: &str,
        reported_by: Option<&str>,
    ) -> Result<Self> {
        let coordinate = coordinate.validated()?;

        let description = description.trim();
        let length = description.chars().count();
        if length > MAX_DESCRIPTION_CHARS {
            return Err(RoadwatchError::DescriptionTooLong {
                length,
                limit: MAX_DESCRIPTION_CHARS,
            });
        }

        Ok(Self {
            incident_type,
            coordinate,
            description: description.to_string(),
            reported_by: user_or_anonymous(reported_by),
        })
    }

    /// Materialize the stored record once the store has assigned identity.
    pub fn into_record(self, id: String, reported_at: Option<SystemTime>) -> IncidentRecord {
        IncidentRecord {
            id,
            incident_type: self.incident_type,
            coordinate: self.coordinate,
            description: self.description,
            reported_by: self.reported_by,
            reported_at,
            active: true,
            upvotes: 0,
            confirmed_by: Vec::new(),
            distance_km: None,
        }
    }
}
