//! Connection configuration and validation.
//!
//! A `ConnectionConfig` is what the user writes (every field optional). It is
//! turned into a `ValidatedConfig` exactly once, after which it is never mutated.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::error::{ClientError, Result};

pub const DEFAULT_TIMEOUT_SECS: i64 = 180;
pub const DEFAULT_MAX_RETRIES: u32 = 9;
pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 5000;
pub const DEFAULT_LOG_CATEGORY: &str = "LogAction";

/// User-supplied connection settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub customer_name: Option<String>,
    pub protocol: Option<String>,
    pub port: Option<i64>,
    /// Request timeout in seconds.
    pub timeout: Option<i64>,
    pub skip_ssl_cert_verification: Option<bool>,
    pub logging: Option<BTreeMap<String, bool>>,
    pub disable_reconnect: Option<bool>,
    pub max_retries: Option<u32>,
    /// Upper bound for a single backoff sleep, in milliseconds.
    pub retry_max_delay: Option<u64>,
    pub retries: Option<u32>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

/// How the client authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Password {
        username: String,
        password: String,
        customer_name: String,
    },
    Token(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Password {
                username,
                customer_name,
                ..
            } => f
                .debug_struct("Password")
                .field("username", username)
                .field("customer_name", customer_name)
                .finish_non_exhaustive(),
            Credentials::Token(_) => f.write_str("Token(..)"),
        }
    }
}

/// A configuration that passed validation, with all defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    pub host: String,
    pub protocol: Protocol,
    pub port: Option<u16>,
    /// `None` disables the request timeout (configured as 0).
    pub timeout: Option<Duration>,
    pub skip_ssl_cert_verification: bool,
    pub logging: BTreeMap<String, bool>,
    pub disable_reconnect: bool,
    pub max_retries: u32,
    pub retries: u32,
    pub retry_max_delay: Duration,
    pub credentials: Credentials,
}

impl ValidatedConfig {
    /// Base endpoint, e.g. `https://api.prismacloud.io:8443`.
    pub fn endpoint(&self) -> String {
        match self.port {
            Some(port) if port != 0 => {
                format!("{}://{}:{}", self.protocol.as_str(), self.host, port)
            }
            _ => format!("{}://{}", self.protocol.as_str(), self.host),
        }
    }

    /// Whether the given logging category is switched on.
    pub fn logs(&self, category: &str) -> bool {
        self.logging.get(category).copied().unwrap_or(false)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl ConnectionConfig {
    /// Validate and normalize into an immutable `ValidatedConfig`.
    ///
    /// Checks run in a fixed order and the first failure wins.
    pub fn validate(&self) -> Result<ValidatedConfig> {
        let credentials = match (
            non_empty(&self.username),
            non_empty(&self.password),
            non_empty(&self.customer_name),
            non_empty(&self.token),
        ) {
            (_, _, _, Some(token)) => Credentials::Token(token.to_string()),
            (Some(username), Some(password), Some(customer_name), None) => Credentials::Password {
                username: username.to_string(),
                password: password.to_string(),
                customer_name: customer_name.to_string(),
            },
            _ => return Err(ClientError::Configuration("missing credentials".to_string())),
        };

        let timeout_secs = self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs < 0 {
            return Err(ClientError::Configuration("invalid timeout".to_string()));
        }
        let timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs as u64));

        let port = match self.port {
            None => None,
            Some(p) if (0..=65535).contains(&p) => Some(p as u16),
            Some(_) => return Err(ClientError::Configuration("invalid port number".to_string())),
        };

        let protocol = match self.protocol.as_deref().unwrap_or("https") {
            "https" => Protocol::Https,
            "http" => Protocol::Http,
            _ => return Err(ClientError::Configuration("invalid protocol".to_string())),
        };

        let raw_url = self.url.as_deref().unwrap_or("");
        let lowered = raw_url.to_ascii_lowercase();
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            return Err(ClientError::Configuration(
                "protocol embedded in url".to_string(),
            ));
        }
        let host = raw_url.trim_end_matches('/');
        if host.is_empty() {
            return Err(ClientError::Configuration("empty url".to_string()));
        }

        let logging = match &self.logging {
            Some(map) if !map.is_empty() => map.clone(),
            _ => BTreeMap::from([(DEFAULT_LOG_CATEGORY.to_string(), true)]),
        };

        Ok(ValidatedConfig {
            host: host.to_string(),
            protocol,
            port,
            timeout,
            skip_ssl_cert_verification: self.skip_ssl_cert_verification.unwrap_or(false),
            logging,
            disable_reconnect: self.disable_reconnect.unwrap_or(false),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            retries: self.retries.unwrap_or(DEFAULT_RETRIES),
            retry_max_delay: Duration::from_millis(
                self.retry_max_delay.unwrap_or(DEFAULT_RETRY_MAX_DELAY_MS),
            ),
            credentials,
        })
    }

    /// Read a configuration from `PRISMACLOUD_*` environment variables.
    ///
    /// Unset variables stay `None`; validation decides what is required.
    pub fn from_env() -> anyhow::Result<Self> {
        fn var(key: &str) -> Option<String> {
            std::env::var(key).ok()
        }
        fn parsed<T: std::str::FromStr>(key: &str) -> anyhow::Result<Option<T>>
        where
            T::Err: std::error::Error + Send + Sync + 'static,
        {
            var(key)
                .map(|v| v.parse::<T>())
                .transpose()
                .with_context(|| format!("Invalid {}", key))
        }

        Ok(Self {
            url: var("PRISMACLOUD_URL"),
            username: var("PRISMACLOUD_USERNAME"),
            password: var("PRISMACLOUD_PASSWORD"),
            customer_name: var("PRISMACLOUD_CUSTOMER_NAME"),
            protocol: var("PRISMACLOUD_PROTOCOL"),
            port: parsed("PRISMACLOUD_PORT")?,
            timeout: parsed("PRISMACLOUD_TIMEOUT")?,
            skip_ssl_cert_verification: parsed("PRISMACLOUD_SKIP_SSL_CERT_VERIFICATION")?,
            logging: None,
            disable_reconnect: parsed("PRISMACLOUD_DISABLE_RECONNECT")?,
            max_retries: parsed("PRISMACLOUD_MAX_RETRIES")?,
            retry_max_delay: parsed("PRISMACLOUD_RETRY_MAX_DELAY")?,
            retries: parsed("PRISMACLOUD_RETRIES")?,
            token: var("PRISMACLOUD_TOKEN"),
        })
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read connection config {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse connection config {:?}", path))
    }
}
