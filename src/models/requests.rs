//! Request DTOs for the HTTP front-end

use serde::Deserialize;

/// Query string of `POST /<key>?value=<v>&expire=<n>`.
///
/// `expire` is kept raw; parsing it is part of write admission so the
/// integer and sign checks report their own reasons in order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetParams {
    /// The value to store, empty when omitted
    #[serde(default)]
    pub value: String,
    /// TTL in seconds as sent by the client
    #[serde(default)]
    pub expire: Option<String>,
}
