//! Configuration types for the SOAP client.

use crate::error::{SoapError, SoapResult};
use crate::types::SecureString;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default `User-Agent`, `magento-soap/<version>`.
pub const DEFAULT_USER_AGENT: &str = concat!("magento-soap/", env!("CARGO_PKG_VERSION"));

/// Upper bound for `timeout_secs`.
pub const MAX_TIMEOUT_SECS: u64 = 3600;

/// Upper bound for `session_ttl_secs` (one year).
pub const MAX_SESSION_TTL_SECS: u64 = 365 * 24 * 3600;

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// SOAP endpoint URL (e.g. `https://shop.example.com/api/soap/`)
    pub endpoint: String,

    /// API user name
    pub api_user: String,

    /// API key
    pub api_key: SecureString,

    /// `User-Agent` header value
    pub user_agent: String,

    /// Per-call deadline in seconds
    pub timeout_secs: u64,

    /// Assumed session lifetime in seconds; the API does not report one
    pub session_ttl_secs: u64,

    /// Dump request and response bodies at trace level
    pub debug: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_user: String::new(),
            api_key: SecureString::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            session_ttl_secs: 3600,
            debug: false,
        }
    }
}

impl ClientConfig {
    /// Configuration for an endpoint and credentials, defaults elsewhere.
    pub fn new(
        endpoint: impl Into<String>,
        api_user: impl Into<String>,
        api_key: impl Into<SecureString>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_user: api_user.into(),
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn from_yaml_str(yaml: &str) -> SoapResult<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| SoapError::Config(format!("failed to parse config: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> SoapResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Check that the configuration can be used to build a client.
    pub fn validate(&self) -> SoapResult<()> {
        let url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| SoapError::Config(format!("invalid endpoint {:?}: {}", self.endpoint, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SoapError::Config(format!(
                "endpoint must use http or https, got {:?}",
                url.scheme()
            )));
        }
        if self.timeout_secs == 0 || self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(SoapError::Config(format!(
                "timeout_secs must be between 1 and {}, got {}",
                MAX_TIMEOUT_SECS, self.timeout_secs
            )));
        }
        if self.session_ttl_secs == 0 || self.session_ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(SoapError::Config(format!(
                "session_ttl_secs must be between 1 and {}, got {}",
                MAX_SESSION_TTL_SECS, self.session_ttl_secs
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}
