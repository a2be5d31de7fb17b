//! Unified error type for the collaborator boundaries.
//!
//! Pure algorithms never return errors; they produce empty results instead.
//! Stores, decoders and HTTP clients return [`Result`] so the service layer can
//! log the cause before downgrading it to an empty or `false` result.

use thiserror::Error;

/// Errors raised by storage, decoding and upstream clients.
#[derive(Debug, Error)]
pub enum RoadwatchError {
    /// A route query was issued with no coordinates.
    #[error("route has no coordinates")]
    EmptyRoute,

    /// A coordinate is non-finite or outside WGS-84 ranges.
    #[error("invalid coordinate ({longitude}, {latitude})")]
    InvalidCoordinate { longitude: f64, latitude: f64 },

    /// An incident description exceeds the allowed length.
    #[error("description has {length} characters, limit is {limit}")]
    DescriptionTooLong { length: usize, limit: usize },

    /// The incident store could not be reached or refused the operation.
    #[error("incident store unavailable: {0}")]
    StoreUnavailable(String),

    /// No incident exists with the given id.
    #[error("incident {0} not found")]
    NotFound(String),

    /// An upstream payload could not be interpreted.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// An upstream service answered with a non-success status.
    #[error("upstream returned HTTP {status}")]
    UpstreamStatus { status: u16 },

    /// A client was configured with an unusable value.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "http")]
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, RoadwatchError>;

/// Helpers for turning missing values into typed errors.
pub trait OptionExt<T> {
    /// Convert `None` into [`RoadwatchError::NotFound`].
    fn ok_or_not_found(self, id: &str) -> Result<T>;

    /// Convert `None` into [`RoadwatchError::MalformedPayload`].
    fn ok_or_malformed(self, what: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, id: &str) -> Result<T> {
        self.ok_or_else(|| RoadwatchError::NotFound(id.to_string()))
    }

    fn ok_or_malformed(self, what: &str) -> Result<T> {
        self.ok_or_else(|| RoadwatchError::MalformedPayload(what.to_string()))
    }
}
