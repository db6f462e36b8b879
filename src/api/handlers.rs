//! API Handlers
//!
//! HTTP request handlers for reading and writing cache entries.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use tracing::{debug, error, info};

use crate::admission::{
    check_capacity, check_write_limits, validate_hostname, HostPolicy, Limits, Rejection,
};
use crate::error::{BucketError, Result};
use crate::models::{GetResponse, SetParams, SetResponse};
use crate::store::CachePort;

/// Response header carrying the TTL, in seconds, of a successful write.
pub const EXPIRES_HEADER: &str = "x-expires-in";

/// Application state shared across all handlers.
///
/// Holds the single long-lived store handle built at start-up.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CachePort>,
    pub host: HostPolicy,
    pub limits: Limits,
}

impl AppState {
    pub fn new(store: Arc<dyn CachePort>, host: HostPolicy, limits: Limits) -> Self {
        Self {
            store,
            host,
            limits,
        }
    }

    /// Creates a new AppState from configuration around an existing store.
    pub fn from_config(config: &crate::config::Config, store: Arc<dyn CachePort>) -> Self {
        Self::new(store, config.host_policy(), config.limits())
    }
}

/// Handler for `GET /<key>`
///
/// Returns the stored value with its remaining lifetime.
pub async fn get_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<GetResponse>> {
    check_host(&headers, &state.host)?;
    let key = normalize_key(&decoded_path(path)?);

    let stored = state
        .store
        .get(&key)
        .await
        .inspect_err(|err| error!(key = %key, error = %err, "Failed to get cache"))?
        .ok_or_else(|| BucketError::NotFound(key.clone()))?;

    debug!(key = %key, ttl = stored.ttl_seconds(), "Cache hit");
    let ttl = stored.ttl_seconds();
    Ok(Json(GetResponse::new(key, stored.value, ttl)))
}

/// Handler for `POST /<key>?value=<v>&expire=<n>`
///
/// Admits the write against the configured limits and store capacity, then
/// stores the value for `expire` seconds.
///
/// Path and query decoding errors are surfaced only after the host check,
/// so a foreign host always sees `invalid hostname`.
pub async fn set_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: std::result::Result<Path<String>, PathRejection>,
    query: std::result::Result<Query<SetParams>, QueryRejection>,
) -> Result<impl IntoResponse> {
    check_host(&headers, &state.host)?;
    let key = normalize_key(&decoded_path(path)?);
    let Query(params) = query.map_err(|rejection| {
        debug!(key = %key, reason = %rejection.body_text(), "Rejected query string");
        Rejection::MalformedRequest(rejection.body_text())
    })?;

    let ttl = check_write_limits(&key, &params.value, params.expire.as_deref(), &state.limits)
        .inspect_err(|rejection| debug!(key = %key, reason = %rejection, "Rejected write"))?;

    if state.limits.caps_elements() {
        let count = state.store.count().await.inspect_err(log_store_error)?;
        let exists = state.store.exists(&key).await.inspect_err(log_store_error)?;
        check_capacity(&state.limits, count, exists)
            .inspect_err(|_| info!(key = %key, count, "Max allowed elements reached"))?;
    }

    state
        .store
        .set(&key, &params.value, Duration::from_secs(ttl))
        .await
        .inspect_err(|err| error!(key = %key, error = %err, "Failed to set cache"))?;

    info!(key = %key, ttl, "Cache set");
    Ok((
        [(EXPIRES_HEADER, ttl.to_string())],
        Json(SetResponse::new(key, ttl)),
    ))
}

fn check_host(headers: &HeaderMap, policy: &HostPolicy) -> Result<()> {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok());
    validate_hostname(host, policy).map_err(|rejection| {
        debug!(host = ?host, "Rejected request for unexpected host");
        BucketError::from(rejection)
    })
}

fn decoded_path(path: std::result::Result<Path<String>, PathRejection>) -> Result<String> {
    let Path(raw) = path.map_err(|rejection| {
        debug!(reason = %rejection.body_text(), "Rejected request path");
        Rejection::MalformedRequest(rejection.body_text())
    })?;
    Ok(raw)
}

/// Keys are ASCII case-folded, as DNS names are, and lose one leading path
/// separator.
fn normalize_key(raw: &str) -> String {
    let key = raw.to_ascii_lowercase();
    match key.strip_prefix('/') {
        Some(stripped) => stripped.to_string(),
        None => key,
    }
}

fn log_store_error(err: &crate::error::StoreError) {
    error!(error = %err, "Failed to read store occupancy");
}
