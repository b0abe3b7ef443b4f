//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which blob store backend to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Volatile, in-process store
    Memory,
    /// Directory on the local filesystem
    #[default]
    Local,
    /// Amazon S3 or an S3-compatible service
    S3,
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "local" => Ok(Backend::Local),
            "s3" => Ok(Backend::S3),
            other => Err(ConfigError::Invalid(format!(
                "unknown storage backend '{}', expected memory, local or s3",
                other
            ))),
        }
    }
}

/// Blob storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: Backend,

    /// Directory for the local backend
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Bucket name (s3 backend)
    #[serde(default)]
    pub bucket: Option<String>,

    /// Region (s3 backend); falls back to AWS_REGION
    #[serde(default)]
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible services
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub allow_http: bool,

    /// Key prefix inside the bucket/directory
    #[serde(default)]
    pub prefix: String,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("logstore").to_string_lossy().to_string())
        .unwrap_or_else(|| "./logstore_data".to_string())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            data_dir: default_data_dir(),
            bucket: None,
            region: None,
            endpoint: None,
            allow_http: false,
            prefix: String::new(),
        }
    }
}

impl StorageConfig {
    /// In-memory storage, mostly for tests
    pub fn memory() -> Self {
        Self {
            backend: Backend::Memory,
            ..Default::default()
        }
    }

    /// Local directory storage
    pub fn local(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::Local,
            data_dir: data_dir.into().to_string_lossy().to_string(),
            ..Default::default()
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_body_size() -> usize {
    10 * 1024 * 1024 // 10 MB
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Ingestion configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Maximum concurrent writes per batch
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Honour caller-supplied batch IDs (idempotent retries). When false,
    /// every batch gets a server-generated ID.
    #[serde(default = "default_accept_batch_id")]
    pub accept_batch_id: bool,
}

fn default_concurrency() -> usize {
    16
}

fn default_max_batch_size() -> usize {
    10_000
}

fn default_accept_batch_id() -> bool {
    true
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_batch_size: default_max_batch_size(),
            accept_batch_id: default_accept_batch_id(),
        }
    }
}

/// Query configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Maximum concurrent fetches per query
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

/// Time index cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    /// Keep an in-memory copy of the key listing
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,

    /// This process is the only writer to the store. The cache answers
    /// lookups only when this is set; otherwise every lookup lists.
    #[serde(default)]
    pub single_writer: bool,

    /// How often the background task re-lists the store
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// The cache is bypassed once its last sync is older than this
    #[serde(default = "default_max_staleness")]
    pub max_staleness_secs: u64,

    /// Upper bound on cached keys; the oldest are evicted first
    #[serde(default = "default_max_cached_keys")]
    pub max_cached_keys: usize,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_refresh_interval() -> u64 {
    30
}

fn default_max_staleness() -> u64 {
    120
}

fn default_max_cached_keys() -> usize {
    1_000_000
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            cache_enabled: default_cache_enabled(),
            single_writer: false,
            refresh_interval_secs: default_refresh_interval(),
            max_staleness_secs: default_max_staleness(),
            max_cached_keys: default_max_cached_keys(),
        }
    }
}

impl IndexConfig {
    /// Whether the cache may answer lookups
    pub fn cache_active(&self) -> bool {
        self.cache_enabled && self.single_writer
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// pretty (for development) or json (for production)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Result<Self, ConfigError> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("logstore").join("config.toml")),
            Some(PathBuf::from("/etc/logstore/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                let config = Self::load_with_env(path)?;
                tracing::info!("Loaded config from {:?}", path);
                return Ok(config);
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // Storage overrides
        if let Ok(backend) = std::env::var("LOGSTORE_STORAGE_BACKEND") {
            self.storage.backend = backend.parse()?;
        }
        if let Ok(data_dir) = std::env::var("LOGSTORE_DATA_DIR") {
            self.storage.data_dir = data_dir;
        }
        if let Ok(bucket) = std::env::var("LOGSTORE_BUCKET") {
            self.storage.bucket = Some(bucket);
        }
        if let Ok(region) = std::env::var("LOGSTORE_REGION") {
            self.storage.region = Some(region);
        } else if self.storage.region.is_none() {
            self.storage.region = std::env::var("AWS_REGION").ok();
        }
        if let Ok(endpoint) = std::env::var("LOGSTORE_ENDPOINT") {
            self.storage.endpoint = Some(endpoint);
        }
        if let Ok(prefix) = std::env::var("LOGSTORE_PREFIX") {
            self.storage.prefix = prefix;
        }

        // API overrides
        if let Ok(host) = std::env::var("LOGSTORE_HOST") {
            self.api.host = host;
        }
        if let Ok(port) = std::env::var("LOGSTORE_PORT") {
            self.api.port = parse_env("LOGSTORE_PORT", &port)?;
        }

        // Concurrency overrides
        if let Ok(n) = std::env::var("LOGSTORE_INGEST_CONCURRENCY") {
            self.ingest.concurrency = parse_env("LOGSTORE_INGEST_CONCURRENCY", &n)?;
        }
        if let Ok(n) = std::env::var("LOGSTORE_QUERY_CONCURRENCY") {
            self.query.concurrency = parse_env("LOGSTORE_QUERY_CONCURRENCY", &n)?;
        }

        // Index overrides
        if let Ok(flag) = std::env::var("LOGSTORE_SINGLE_WRITER") {
            self.index.single_writer = parse_env("LOGSTORE_SINGLE_WRITER", &flag)?;
        }

        // Logging overrides
        if let Ok(level) = std::env::var("LOGSTORE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOGSTORE_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Reject settings the server cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.backend == Backend::S3 {
            match self.storage.bucket.as_deref() {
                Some(bucket) if !bucket.trim().is_empty() => {}
                _ => {
                    return Err(ConfigError::Invalid(
                        "storage.bucket is required for the s3 backend".to_string(),
                    ))
                }
            }
        }

        if self.storage.backend == Backend::Local && self.storage.data_dir.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "storage.data_dir is required for the local backend".to_string(),
            ));
        }

        if self.api.port == 0 {
            return Err(ConfigError::Invalid("api.port must be non-zero".to_string()));
        }

        if self.ingest.concurrency == 0 || self.query.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "ingest.concurrency and query.concurrency must be at least 1".to_string(),
            ));
        }

        if self.ingest.max_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "ingest.max_batch_size must be at least 1".to_string(),
            ));
        }

        if self.index.cache_enabled && self.index.refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "index.refresh_interval_secs must be at least 1".to_string(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::Invalid(format!(
                "logging.format must be pretty or json, got '{}'",
                self.logging.format
            )));
        }

        Ok(())
    }
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} has invalid value '{}'", name, value)))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Logstore Configuration
#
# Environment variables override these settings:
# - LOGSTORE_STORAGE_BACKEND, LOGSTORE_DATA_DIR, LOGSTORE_BUCKET,
#   LOGSTORE_REGION (or AWS_REGION), LOGSTORE_ENDPOINT, LOGSTORE_PREFIX
# - LOGSTORE_HOST, LOGSTORE_PORT
# - LOGSTORE_INGEST_CONCURRENCY, LOGSTORE_QUERY_CONCURRENCY
# - LOGSTORE_LOG_LEVEL, LOGSTORE_LOG_FORMAT
#
# S3 credentials are read from the standard AWS environment
# (AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, AWS_SESSION_TOKEN).

[storage]
# memory, local or s3
backend = "local"

# Directory for the local backend
data_dir = "~/.local/share/logstore"

# S3 bucket and region (s3 backend)
# bucket = "my-log-bucket"
# region = "ap-south-1"

# Custom endpoint for S3-compatible services
# endpoint = "http://localhost:9000"
# allow_http = true

# Key prefix inside the bucket
prefix = ""

[api]
host = "0.0.0.0"
port = 8080

# Request timeout in seconds
request_timeout_secs = 30

# Maximum request body size in bytes
max_body_size = 10485760

[ingest]
# Maximum concurrent writes per batch
concurrency = 16

# Maximum entries per batch
max_batch_size = 10000

# Honour ?batch_id= on POST /ingest so retries are idempotent
accept_batch_id = true

[query]
# Maximum concurrent fetches per query
concurrency = 16

[index]
# Keep an in-memory copy of the key listing
cache_enabled = true

# Serve lookups from the cache. Only set this when no other process
# writes to the same bucket or directory; otherwise every lookup lists.
single_writer = false

# Background re-listing interval (seconds)
refresh_interval_secs = 30

# Bypass the cache when its last sync is older than this (seconds)
max_staleness_secs = 120

# Upper bound on cached keys
max_cached_keys = 1000000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.storage.backend, Backend::Local);
        assert_eq!(config.ingest.concurrency, 16);
        assert_eq!(config.api.addr(), "0.0.0.0:8080");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.storage.backend, Backend::Local);
        assert_eq!(config.index.max_cached_keys, 1_000_000);
        assert!(config.ingest.accept_batch_id);
        assert!(!config.index.single_writer);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cache_needs_single_writer() {
        assert!(!IndexConfig::default().cache_active());

        let config = Config::parse(
            r#"
            [index]
            single_writer = true
        "#,
        )
        .unwrap();
        assert!(config.index.cache_active());

        let disabled = IndexConfig {
            cache_enabled: false,
            single_writer: true,
            ..IndexConfig::default()
        };
        assert!(!disabled.cache_active());
    }

    #[test]
    fn test_parse_s3_section() {
        let config = Config::parse(
            r#"
            [storage]
            backend = "s3"
            bucket = "mw-code-tester"
            region = "ap-south-1"
            prefix = "logs"

            [ingest]
            concurrency = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.backend, Backend::S3);
        assert_eq!(config.storage.bucket.as_deref(), Some("mw-code-tester"));
        assert_eq!(config.ingest.concurrency, 4);
        assert_eq!(config.query.concurrency, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_s3_requires_bucket() {
        let config = Config::parse("[storage]\nbackend = \"s3\"\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = Config::default();
        config.query.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("S3".parse::<Backend>().unwrap(), Backend::S3);
        assert_eq!("memory".parse::<Backend>().unwrap(), Backend::Memory);
        assert!("gcs".parse::<Backend>().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/logstore.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
