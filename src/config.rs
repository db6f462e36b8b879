//! Configuration Module
//!
//! Loads server configuration from an optional TOML file overlaid with
//! `BUCKETD_<SECTION>__<FIELD>` environment variables.

use std::env;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use tracing::warn;

use crate::admission::{DomainPolicy, HostPolicy, Limits};
use crate::dns::StaticAnswer;
use crate::error::ConfigError;

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "BUCKETD_";

/// Which listeners to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    Http,
    Dns,
    #[default]
    Both,
}

impl Mode {
    pub fn serves_http(self) -> bool {
        matches!(self, Mode::Http | Mode::Both)
    }

    pub fn serves_dns(self) -> bool {
        matches!(self, Mode::Dns | Mode::Both)
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Mode::Http),
            "dns" => Ok(Mode::Dns),
            "both" => Ok(Mode::Both),
            _ => Err(ConfigError::InvalidMode(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Mode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Backing engine behind the Cache Port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Engine {
    /// External Redis server, configured under `[redis]`
    #[default]
    Redis,
    /// In-process map with its own expiry sweeper
    Memory,
}

impl FromStr for Engine {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(Engine::Redis),
            "memory" => Ok(Engine::Memory),
            _ => Err(ConfigError::InvalidEngine(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Engine {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Rules applied to every write, whichever listener receives it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    pub mode: Mode,
    /// Maximum key length in bytes, 0 = unlimited
    pub max_key_length: usize,
    /// Maximum value length in bytes, 0 = unlimited
    pub max_value_length: usize,
    /// Maximum TTL in seconds, 0 = unlimited
    pub max_ttl: u64,
    /// Maximum number of stored elements, 0 = unlimited
    pub max_elements: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub port: u16,
    /// `Host` header every request must carry
    pub hostname: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            hostname: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DnsConfig {
    pub port: u16,
    /// Domain the resolver answers for
    pub fqdn: String,
    /// Address returned for A queries
    pub a: Option<Ipv4Addr>,
    /// Address returned for AAAA queries
    pub aaaa: Option<Ipv6Addr>,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            port: 8053,
            fqdn: String::new(),
            a: None,
            aaaa: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub engine: Engine,
    /// Interval in seconds between sweeps of expired entries (memory engine)
    pub cleanup_interval: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            engine: Engine::default(),
            cleanup_interval: 1,
        }
    }
}

/// Connection parameters of the Redis engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RedisConfig {
    /// `host:port` of the server
    pub address: String,
    /// Empty for no authentication
    pub password: String,
    /// Database index selected after connecting
    pub database: i64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:6379".to_string(),
            password: String::new(),
            database: 0,
        }
    }
}

/// Server configuration parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub core: CoreConfig,
    pub http: HttpConfig,
    pub dns: DnsConfig,
    pub store: StoreConfig,
    pub redis: RedisConfig,
}

impl Config {
    /// Reads `path` if it exists, then applies environment overrides.
    ///
    /// The result is not validated; callers apply any CLI overrides first
    /// and then call [`Config::validate`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
            Self::parse(&content)?
        } else {
            warn!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };

        config.apply_env(env::vars())?;
        Ok(config)
    }

    /// Parses configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Applies `BUCKETD_<SECTION>__<FIELD>` overrides from `vars`.
    ///
    /// Unknown variables under the prefix are ignored; malformed values are
    /// errors.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (var, value) in vars {
            let Some(path) = var.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let path = path.to_ascii_lowercase().replace("__", ".");

            match path.as_str() {
                "core.mode" => self.core.mode = value.parse()?,
                "core.max_key_length" => self.core.max_key_length = parse_env(&var, &value)?,
                "core.max_value_length" => self.core.max_value_length = parse_env(&var, &value)?,
                "core.max_ttl" => self.core.max_ttl = parse_env(&var, &value)?,
                "core.max_elements" => self.core.max_elements = parse_env(&var, &value)?,
                "http.port" => self.http.port = parse_env(&var, &value)?,
                "http.hostname" => self.http.hostname = value,
                "dns.port" => self.dns.port = parse_env(&var, &value)?,
                "dns.fqdn" => self.dns.fqdn = value,
                "dns.a" => self.dns.a = Some(parse_env(&var, &value)?),
                "dns.aaaa" => self.dns.aaaa = Some(parse_env(&var, &value)?),
                "store.engine" => self.store.engine = value.parse()?,
                "store.cleanup_interval" => {
                    self.store.cleanup_interval = parse_env(&var, &value)?
                }
                "redis.address" => self.redis.address = value,
                "redis.password" => self.redis.password = value,
                "redis.database" => self.redis.database = parse_env(&var, &value)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Checks that every enabled listener has what it needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.core.mode.serves_http() && self.http.hostname.is_empty() {
            return Err(ConfigError::MissingHostname);
        }
        if self.core.mode.serves_dns() && self.dns.fqdn.is_empty() {
            return Err(ConfigError::MissingFqdn);
        }
        match self.store.engine {
            Engine::Memory if self.store.cleanup_interval == 0 => {
                Err(ConfigError::ZeroCleanupInterval)
            }
            Engine::Redis if self.redis.address.is_empty() => {
                Err(ConfigError::MissingRedisAddress)
            }
            _ => Ok(()),
        }
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_key_length: non_zero(self.core.max_key_length),
            max_value_length: non_zero(self.core.max_value_length),
            max_ttl_seconds: (self.core.max_ttl > 0).then_some(self.core.max_ttl),
            max_elements: non_zero(self.core.max_elements),
        }
    }

    pub fn host_policy(&self) -> HostPolicy {
        HostPolicy::new(self.http.hostname.clone())
    }

    pub fn domain_policy(&self) -> DomainPolicy {
        DomainPolicy::new(&self.dns.fqdn)
    }

    pub fn static_answer(&self) -> StaticAnswer {
        StaticAnswer {
            ipv4: self.dns.a,
            ipv6: self.dns.aaaa,
        }
    }
}

fn parse_env<T: FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}

fn non_zero(limit: usize) -> Option<usize> {
    (limit > 0).then_some(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.core.mode, Mode::Both);
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.dns.port, 8053);
        assert_eq!(config.store.engine, Engine::Redis);
        assert_eq!(config.store.cleanup_interval, 1);
        assert_eq!(config.redis.address, "127.0.0.1:6379");
        assert_eq!(config.redis.database, 0);
        assert_eq!(config.limits(), Limits::unlimited());
    }

    #[test]
    fn test_config_parse_toml() {
        let config = Config::parse(
            r#"
            [core]
            mode = "DNS"
            max_key_length = 64
            max_elements = 1000

            [dns]
            port = 5353
            fqdn = "object.example.com"
            a = "192.0.2.10"
            aaaa = "2001:db8::10"
            "#,
        )
        .unwrap();

        assert_eq!(config.core.mode, Mode::Dns);
        assert_eq!(config.dns.port, 5353);
        assert_eq!(config.dns.a, Some(Ipv4Addr::new(192, 0, 2, 10)));
        assert_eq!(config.domain_policy().required_suffix(), "object.example.com.");

        let limits = config.limits();
        assert_eq!(limits.max_key_length, Some(64));
        assert_eq!(limits.max_value_length, None);
        assert_eq!(limits.max_elements, Some(1000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_unknown_fields() {
        assert!(Config::parse("[http]\nhost = \"x\"\n").is_err());
        assert!(Config::parse("[core]\nmode = \"ftp\"\n").is_err());
    }

    #[test]
    fn test_env_overlay() {
        let mut config = Config::parse("[http]\nhostname = \"from-file\"\n").unwrap();
        config
            .apply_env(vars(&[
                ("BUCKETD_HTTP__HOSTNAME", "cache.example.com"),
                ("BUCKETD_CORE__MAX_TTL", "3600"),
                ("BUCKETD_DNS__AAAA", "::1"),
                ("BUCKETD_SOMETHING__ELSE", "ignored"),
                ("PATH", "/usr/bin"),
            ]))
            .unwrap();

        assert_eq!(config.http.hostname, "cache.example.com");
        assert_eq!(config.limits().max_ttl_seconds, Some(3600));
        assert_eq!(config.dns.aaaa, Some(Ipv6Addr::LOCALHOST));
    }

    #[test]
    fn test_env_overlay_rejects_malformed_values() {
        let mut config = Config::default();
        let err = config
            .apply_env(vars(&[("BUCKETD_HTTP__PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_validate_requires_listener_settings() {
        let mut config = Config::default();
        assert!(matches!(config.validate(), Err(ConfigError::MissingHostname)));

        config.core.mode = Mode::Dns;
        assert!(matches!(config.validate(), Err(ConfigError::MissingFqdn)));

        config.dns.fqdn = "object.example.com.".into();
        assert!(config.validate().is_ok());

        // the sweeper interval only matters to the memory engine
        config.store.cleanup_interval = 0;
        assert!(config.validate().is_ok());
        config.store.engine = Engine::Memory;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroCleanupInterval)));

        config.store.engine = Engine::Redis;
        config.redis.address.clear();
        assert!(matches!(config.validate(), Err(ConfigError::MissingRedisAddress)));
    }

    #[test]
    fn test_redis_section() {
        let mut config = Config::parse(
            r#"
            [store]
            engine = "redis"

            [redis]
            address = "redis.internal:6380"
            password = "from-file"
            "#,
        )
        .unwrap();
        config
            .apply_env(vars(&[
                ("BUCKETD_REDIS__PASSWORD", "s3cret"),
                ("BUCKETD_REDIS__DATABASE", "4"),
            ]))
            .unwrap();

        assert_eq!(config.store.engine, Engine::Redis);
        assert_eq!(config.redis.address, "redis.internal:6380");
        assert_eq!(config.redis.password, "s3cret");
        assert_eq!(config.redis.database, 4);
    }

    #[test]
    fn test_engine_selection() {
        let config = Config::parse("[store]\nengine = \"Memory\"\n").unwrap();
        assert_eq!(config.store.engine, Engine::Memory);
        assert!(Config::parse("[store]\nengine = \"sqlite\"\n").is_err());

        let mut config = Config::default();
        config
            .apply_env(vars(&[("BUCKETD_STORE__ENGINE", "memory")]))
            .unwrap();
        assert_eq!(config.store.engine, Engine::Memory);

        let err = config
            .apply_env(vars(&[("BUCKETD_STORE__ENGINE", "disk")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEngine(_)));
    }

    #[test]
    fn test_load_reads_file() {
        let path = env::temp_dir().join(format!("bucketd-config-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "[core]\nmode = \"http\"\n[http]\nhostname = \"cache.example.com\"\n",
        )
        .unwrap();

        let config = Config::load(&path);
        std::fs::remove_file(&path).unwrap();

        let config = config.unwrap();
        assert_eq!(config.core.mode, Mode::Http);
        assert_eq!(config.host_policy().required_host(), "cache.example.com");
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let path = env::temp_dir().join("bucketd-config-that-does-not-exist.toml");
        let config = Config::load(&path).unwrap();

        assert_eq!(config.http.port, 8080);
        // defaults carry no hostname, so validation refuses them
        assert!(matches!(config.validate(), Err(ConfigError::MissingHostname)));
    }
}
