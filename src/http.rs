//! HTTP clients for Mapbox directions/geocoding and the Firestore REST API.
//!
//! Both clients share one request path:
//! - Connection pooling via a single `reqwest::Client` per client
//! - A per-request timeout from config
//! - Bounded retry with exponential backoff on connect errors, timeouts,
//!   429 and 5xx responses (`max_retries = 0` sends each request once)

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};

use crate::directions::{decode_directions, decode_suggestions, DirectionsProvider, GeocodingProvider, PlaceSuggestion};
use crate::error::{RoadwatchError, Result};
use crate::firestore::{
    active_incidents_query, decode_document, decode_query_response, encode_confirmation,
    encode_new_incident, CONFIRMATION_FIELDS, INCIDENTS_COLLECTION,
};
use crate::incident::{IncidentRecord, NewIncident};
use crate::segmentation::RouteCandidate;
use crate::store::IncidentStore;
use crate::Coordinate;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 2;
const BACKOFF_BASE_MS: u64 = 250;

const DIRECTIONS_PROFILE: &str = "driving-traffic";
const DIRECTIONS_PARAMS: [(&str, &str); 6] = [
    ("alternatives", "true"),
    ("geometries", "geojson"),
    ("language", "en"),
    ("overview", "full"),
    ("steps", "true"),
    ("annotations", "congestion"),
];

// ============================================================================
// Configuration
// ============================================================================

/// Mapbox API access.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct MapboxConfig {
    /// Public access token
    pub access_token: String,

    /// API root.
    /// Default: https://api.mapbox.com
    pub base_url: String,

    /// Per-request timeout.
    /// Default: 30 seconds
    pub timeout_secs: u64,

    /// Extra attempts after a transient failure.
    /// Default: 2
    pub max_retries: u32,
}

impl Default for MapboxConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            base_url: "https://api.mapbox.com".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl MapboxConfig {
    pub fn new(access_token: &str) -> Self {
        Self {
            access_token: access_token.to_string(),
            ..Self::default()
        }
    }
}

/// Firestore REST access for the incident collection.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct FirestoreConfig {
    pub project_id: String,

    /// Default: (default)
    pub database_id: String,

    /// Default: incidents
    pub collection: String,

    /// Web API key, sent as the `key` query parameter
    pub api_key: Option<String>,

    /// ID token of the signed-in user, sent as a bearer token
    pub bearer_token: Option<String>,

    /// Default: https://firestore.googleapis.com/v1
    pub base_url: String,

    /// Default: 30 seconds
    pub timeout_secs: u64,

    /// Default: 2
    pub max_retries: u32,
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            database_id: "(default)".to_string(),
            collection: INCIDENTS_COLLECTION.to_string(),
            api_key: None,
            bearer_token: None,
            base_url: "https://firestore.googleapis.com/v1".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl FirestoreConfig {
    pub fn new(project_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            ..Self::default()
        }
    }
}

// ============================================================================
// Shared request path
// ============================================================================

fn build_client(timeout_secs: u64) -> Result<Client> {
    let client = Client::builder()
        .pool_idle_timeout(Duration::from_secs(60))
        .tcp_keepalive(Duration::from_secs(30))
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()?;
    Ok(client)
}

/// Delay before retry number `attempt` (1-based): 250ms, 500ms, 1s, 2s, 4s max.
fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(BACKOFF_BASE_MS << (attempt.max(1) - 1).min(4))
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}

/// Send the request built by `make`, retrying transient failures.
///
/// Returns the first non-retryable response, whatever its status.
async fn send_with_retry<F>(label: &str, max_retries: u32, make: F) -> Result<Response>
where
    F: Fn() -> RequestBuilder,
{
    let start = Instant::now();
    let mut attempt = 0;

    loop {
        match make().send().await {
            Ok(response) => {
                let status = response.status();
                if is_retryable_status(status) && attempt < max_retries {
                    attempt += 1;
                    let wait = backoff(attempt);
                    warn!("[{}] HTTP {}, retry {} after {:?}", label, status, attempt, wait);
                    tokio::time::sleep(wait).await;
                    continue;
                }
                debug!("[{}] HTTP {} after {:?}", label, status, start.elapsed());
                return Ok(response);
            }
            Err(e) if is_retryable_error(&e) && attempt < max_retries => {
                attempt += 1;
                let wait = backoff(attempt);
                warn!("[{}] Error: {}, retry {} after {:?}", label, e, attempt, wait);
                tokio::time::sleep(wait).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Body of a successful response, or the status as an error.
async fn success_body(response: Response) -> Result<String> {
    let status = response.status();
    if !status.is_success() {
        return Err(RoadwatchError::UpstreamStatus { status: status.as_u16() });
    }
    Ok(response.text().await?)
}

fn parse_base(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url).map_err(|e| RoadwatchError::Config(format!("{}: {}", base_url, e)))?;
    if url.cannot_be_a_base() {
        return Err(RoadwatchError::Config(format!("{} cannot be a base URL", base_url)));
    }
    Ok(url)
}

/// `base` with `segments` appended to its path, each percent-encoded.
fn join_segments<'a>(base: &Url, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| RoadwatchError::Config(format!("{} cannot be a base URL", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

// ============================================================================
// Mapbox
// ============================================================================

/// Directions and geocoding against the Mapbox REST API.
pub struct MapboxClient {
    client: Client,
    base: Url,
    config: MapboxConfig,
}

impl MapboxClient {
    pub fn new(config: MapboxConfig) -> Result<Self> {
        if config.access_token.trim().is_empty() {
            return Err(RoadwatchError::Config("Mapbox access token is empty".to_string()));
        }
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base: parse_base(&config.base_url)?,
            config,
        })
    }

    pub(crate) fn directions_url(&self, origin: Coordinate, destination: Coordinate) -> Result<Url> {
        let waypoints = format!(
            "{},{};{},{}",
            origin.longitude, origin.latitude, destination.longitude, destination.latitude
        );
        let mut url = join_segments(
            &self.base,
            ["directions", "v5", "mapbox", DIRECTIONS_PROFILE, waypoints.as_str()],
        )?;
        url.query_pairs_mut()
            .extend_pairs(DIRECTIONS_PARAMS)
            .append_pair("access_token", &self.config.access_token);
        Ok(url)
    }

    pub(crate) fn geocoding_url(&self, query: &str) -> Result<Url> {
        let mut url = join_segments(&self.base, ["search", "geocode", "v6", "forward"])?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("proximity", "ip")
            .append_pair("access_token", &self.config.access_token);
        Ok(url)
    }

    async fn get_body(&self, label: &str, url: &Url) -> Result<String> {
        let response = send_with_retry(label, self.config.max_retries, || self.client.get(url.clone())).await?;
        success_body(response).await
    }
}

impl DirectionsProvider for MapboxClient {
    async fn directions(&self, origin: Coordinate, destination: Coordinate) -> Result<Vec<RouteCandidate>> {
        origin.validated()?;
        destination.validated()?;

        let url = self.directions_url(origin, destination)?;
        let body = self.get_body("Mapbox", &url).await?;
        let candidates = decode_directions(&body)?;

        info!("[Mapbox] {} routes for {:?} -> {:?}", candidates.len(), origin, destination);
        Ok(candidates)
    }
}

impl GeocodingProvider for MapboxClient {
    async fn search(&self, query: &str) -> Result<Vec<PlaceSuggestion>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.geocoding_url(query)?;
        let body = self.get_body("Mapbox", &url).await?;
        let suggestions = decode_suggestions(&body)?;

        debug!("[Mapbox] {} suggestions for {:?}", suggestions.len(), query);
        Ok(suggestions)
    }
}

// ============================================================================
// Firestore
// ============================================================================

/// Incident store backed by a Firestore collection over REST.
pub struct FirestoreIncidentStore {
    client: Client,
    base: Url,
    config: FirestoreConfig,
}

impl FirestoreIncidentStore {
    pub fn new(config: FirestoreConfig) -> Result<Self> {
        if config.project_id.trim().is_empty() {
            return Err(RoadwatchError::Config("Firestore project id is empty".to_string()));
        }
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base: parse_base(&config.base_url)?,
            config,
        })
    }

    /// `.../databases/{db}/{tail...}` with the API key attached.
    fn database_url<'a>(&'a self, tail: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        let prefix = [
            "projects",
            self.config.project_id.as_str(),
            "databases",
            self.config.database_id.as_str(),
        ];
        let mut url = join_segments(&self.base, prefix.into_iter().chain(tail))?;
        if let Some(key) = &self.config.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }

    pub(crate) fn collection_url(&self) -> Result<Url> {
        self.database_url(["documents", self.config.collection.as_str()])
    }

    pub(crate) fn document_url(&self, id: &str) -> Result<Url> {
        self.database_url(["documents", self.config.collection.as_str(), id])
    }

    pub(crate) fn run_query_url(&self) -> Result<Url> {
        self.database_url(["documents:runQuery"])
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn check_id(id: &str) -> Result<()> {
        if id.is_empty() || id.contains('/') {
            return Err(RoadwatchError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

impl IncidentStore for FirestoreIncidentStore {
    async fn insert(&self, incident: NewIncident) -> Result<IncidentRecord> {
        let url = self.collection_url()?;
        let body = encode_new_incident(&incident);

        let response = send_with_retry("Firestore", self.config.max_retries, || {
            self.authorize(self.client.post(url.clone()).json(&body))
        })
        .await?;
        let text = success_body(response).await?;
        let record = decode_document(&serde_json::from_str(&text)?)?;

        info!("[Firestore] Created {}", record.id);
        Ok(record)
    }

    async fn active_incidents(&self) -> Result<Vec<IncidentRecord>> {
        let url = self.run_query_url()?;
        let body = active_incidents_query(&self.config.collection);

        let response = send_with_retry("Firestore", self.config.max_retries, || {
            self.authorize(self.client.post(url.clone()).json(&body))
        })
        .await?;
        decode_query_response(&success_body(response).await?)
    }

    async fn get(&self, id: &str) -> Result<Option<IncidentRecord>> {
        if Self::check_id(id).is_err() {
            return Ok(None);
        }
        let url = self.document_url(id)?;

        let response = send_with_retry("Firestore", self.config.max_retries, || {
            self.authorize(self.client.get(url.clone()))
        })
        .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let text = success_body(response).await?;
        Ok(Some(decode_document(&serde_json::from_str(&text)?)?))
    }

    async fn update_confirmations(&self, id: &str, confirmed_by: &[String], upvotes: u32) -> Result<()> {
        Self::check_id(id)?;
        let mut url = self.document_url(id)?;
        {
            let mut query = url.query_pairs_mut();
            for field in CONFIRMATION_FIELDS {
                query.append_pair("updateMask.fieldPaths", field);
            }
            query.append_pair("currentDocument.exists", "true");
        }
        let body = encode_confirmation(confirmed_by, upvotes);

        let response = send_with_retry("Firestore", self.config.max_retries, || {
            self.authorize(self.client.patch(url.clone()).json(&body))
        })
        .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RoadwatchError::NotFound(id.to_string()));
        }
        success_body(response).await?;

        debug!("[Firestore] {} now has {} upvotes", id, upvotes);
        Ok(())
    }
}

/// Run `future` to completion on a fresh runtime, for blocking FFI callers.
#[cfg(feature = "ffi")]
pub(crate) fn block_on<F: std::future::Future>(future: F) -> Result<F::Output> {
    use tokio::runtime::Builder;

    let runtime = Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(|e| RoadwatchError::Config(format!("failed to create tokio runtime: {}", e)))?;
    Ok(runtime.block_on(future))
}
