//! Configuration loading and types for itemvault.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Each subsection governs a different part of the
//! system: networking, the DynamoDB item table, the S3 image bucket, the
//! SNS notification topic, and the Cognito user pool.

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// AWS connection settings shared by all backend clients.
    #[serde(default)]
    pub aws: AwsConfig,

    /// DynamoDB item store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// S3 object storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// SNS notification settings.
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Cognito identity provider settings.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Image download bounds for the create path.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// AWS connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AwsConfig {
    /// AWS region for every backend client.
    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint (e.g. LocalStack).  Applies to all clients.
    #[serde(default)]
    pub endpoint_url: String,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint_url: String::new(),
        }
    }
}

/// DynamoDB item store configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StoreConfig {
    /// Item table name.
    #[serde(default)]
    pub table_name: String,
}

/// S3 object storage configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    /// Image bucket name.
    #[serde(default)]
    pub bucket_name: String,
}

/// SNS notification configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NotifyConfig {
    /// Topic ARN receiving mutation events.
    #[serde(default)]
    pub topic_arn: String,
}

/// Cognito identity provider configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct IdentityConfig {
    /// User pool ID (for the administrative confirm / get-user calls).
    #[serde(default)]
    pub user_pool_id: String,

    /// App client ID (for the password auth and signup exchanges).
    #[serde(default)]
    pub client_id: String,
}

/// Bounds on the create handler's image download.
///
/// The original flow fetched the image with no timeout or size limit;
/// both bounds are explicit here.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Download timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Maximum image size in bytes.
    #[serde(default = "default_fetch_max_bytes")]
    pub max_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            max_bytes: default_fetch_max_bytes(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
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
    /// Check that every value the handlers depend on is present.
    ///
    /// Reports all missing values at once rather than failing on the
    /// first, so a fresh deployment can be fixed in one pass.  The region
    /// is excluded: it has a default.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut missing = Vec::new();

        if self.store.table_name.is_empty() {
            missing.push("store.table_name");
        }
        if self.storage.bucket_name.is_empty() {
            missing.push("storage.bucket_name");
        }
        if self.notify.topic_arn.is_empty() {
            missing.push("notify.topic_arn");
        }
        if self.identity.user_pool_id.is_empty() {
            missing.push("identity.user_pool_id");
        }
        if self.identity.client_id.is_empty() {
            missing.push("identity.client_id");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Missing required configuration values: {}",
                missing.join(", ")
            )
        }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9040
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_fetch_max_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    Ok(config)
}
