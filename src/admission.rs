//! Admission & Validation
//!
//! Hostname and domain gating plus the write limits shared by the DNS and
//! HTTP front-ends. Everything here is pure: callers fetch whatever store
//! state a check needs and pass it in.

use thiserror::Error;

// == Rejection ==
/// Why a request was refused before reaching the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("invalid hostname")]
    InvalidHostname,

    /// Path or query string could not be decoded.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("domain must be {suffix} or a subdomain")]
    OutsideDomain { suffix: String },

    #[error("key length exceeds maximum allowed ({0})")]
    KeyTooLong(usize),

    #[error("value length exceeds maximum allowed ({0})")]
    ValueTooLong(usize),

    #[error("expire parameter must be a valid integer")]
    ExpireNotInteger,

    #[error("expire parameter must be non-negative")]
    ExpireNegative,

    #[error("expire time exceeds maximum allowed ({0})")]
    ExpireTooLong(u64),

    /// Store is at `max_elements` and the key is new.
    #[error("max allowed elements reached")]
    OverCapacity,
}

// == Policies ==
/// Exact `Host` header an HTTP request must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPolicy {
    required_host: String,
}

impl HostPolicy {
    pub fn new(required_host: impl Into<String>) -> Self {
        Self {
            required_host: required_host.into(),
        }
    }

    pub fn required_host(&self) -> &str {
        &self.required_host
    }
}

/// Fully-qualified domain a DNS question must equal or sit beneath.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainPolicy {
    required_suffix: String,
}

impl DomainPolicy {
    /// Builds the policy, lower-casing `suffix` and adding the root dot when
    /// it is missing.
    pub fn new(suffix: &str) -> Self {
        Self {
            required_suffix: fqdn(suffix),
        }
    }

    pub fn required_suffix(&self) -> &str {
        &self.required_suffix
    }
}

/// Write limits; `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Limits {
    pub max_key_length: Option<usize>,
    pub max_value_length: Option<usize>,
    pub max_ttl_seconds: Option<u64>,
    pub max_elements: Option<usize>,
}

impl Limits {
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Whether the capacity stage needs the store's count and key presence.
    pub fn caps_elements(&self) -> bool {
        self.max_elements.is_some()
    }
}

// == Hostname ==
pub fn validate_hostname(host: Option<&str>, policy: &HostPolicy) -> Result<(), Rejection> {
    match host {
        Some(host) if host == policy.required_host => Ok(()),
        _ => Err(Rejection::InvalidHostname),
    }
}

// == Domain ==
/// Accepts `question_name` when it equals the policy suffix or is a
/// subdomain of it. Labels are compared case-insensitively on dot
/// boundaries, so `xobject.example.com.` does not match `object.example.com.`.
pub fn validate_domain(question_name: &str, policy: &DomainPolicy) -> Result<(), Rejection> {
    let name = fqdn(question_name);
    let suffix = policy.required_suffix.as_str();

    let inside = suffix == "."
        || name == suffix
        || name
            .strip_suffix(suffix)
            .is_some_and(|head| head.ends_with('.'));

    if inside {
        Ok(())
    } else {
        Err(Rejection::OutsideDomain {
            suffix: suffix.to_string(),
        })
    }
}

// == Write ==
/// Full write admission: limits first, then capacity.
///
/// Returns the accepted TTL in seconds. The first failing check decides the
/// rejection.
pub fn validate_write(
    key: &str,
    value: &str,
    ttl: Option<&str>,
    limits: &Limits,
    current_count: usize,
    key_exists: bool,
) -> Result<u64, Rejection> {
    let ttl = check_write_limits(key, value, ttl, limits)?;
    check_capacity(limits, current_count, key_exists)?;
    Ok(ttl)
}

/// Length and TTL stage of [`validate_write`]. Needs no store state.
pub fn check_write_limits(
    key: &str,
    value: &str,
    ttl: Option<&str>,
    limits: &Limits,
) -> Result<u64, Rejection> {
    if let Some(max) = limits.max_key_length {
        if key.len() > max {
            return Err(Rejection::KeyTooLong(max));
        }
    }

    if let Some(max) = limits.max_value_length {
        if value.len() > max {
            return Err(Rejection::ValueTooLong(max));
        }
    }

    let ttl: i64 = ttl
        .and_then(|raw| raw.parse().ok())
        .ok_or(Rejection::ExpireNotInteger)?;
    let ttl = u64::try_from(ttl).map_err(|_| Rejection::ExpireNegative)?;

    if let Some(max) = limits.max_ttl_seconds {
        if ttl > max {
            return Err(Rejection::ExpireTooLong(max));
        }
    }

    Ok(ttl)
}

/// Capacity stage of [`validate_write`]. Overwrites are always admitted.
pub fn check_capacity(
    limits: &Limits,
    current_count: usize,
    key_exists: bool,
) -> Result<(), Rejection> {
    match limits.max_elements {
        Some(max) if current_count >= max && !key_exists => Err(Rejection::OverCapacity),
        _ => Ok(()),
    }
}

fn fqdn(name: &str) -> String {
    let mut name = name.to_ascii_lowercase();
    if !name.ends_with('.') {
        name.push('.');
    }
    name
}
