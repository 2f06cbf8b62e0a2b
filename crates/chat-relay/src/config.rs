use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use tokio::fs;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::llm::{AuthConfig, RelayConfig};

/// Environment variable overriding `azure_ai_foundry.endpoint`.
pub const ENV_ENDPOINT: &str = "AzureAIFoundry__Endpoint";
/// Environment variable overriding `azure_ai_foundry.api_key`.
pub const ENV_API_KEY: &str = "AzureAIFoundry__ApiKey";
/// Client id of a user-assigned managed identity.
pub const ENV_CLIENT_ID: &str = "AZURE_CLIENT_ID";

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub azure_ai_foundry: FoundryConfig,
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        Ok(serde_saphyr::from_str(&contents)?)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup. Empty values count as unset.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            self.azure_ai_foundry.endpoint = Some(endpoint);
        }
        if let Some(api_key) = lookup(ENV_API_KEY) {
            self.azure_ai_foundry.api_key = Some(api_key);
        }
        if let Some(client_id) = lookup(ENV_CLIENT_ID) {
            self.azure_ai_foundry.managed_identity_client_id = Some(client_id);
        }
    }

    /// Validate the whole file into a [`RelayConfig`], reporting every problem at once.
    ///
    /// The server timeout must outlast the relay timeout so a slow upstream
    /// surfaces as a relay failure rather than an empty 408.
    pub fn validate(&self) -> Result<RelayConfig, ConfigError> {
        let mut problems = Vec::new();

        let server_timeout = self.server.request_timeout_seconds;
        let relay_timeout = self.azure_ai_foundry.timeout_seconds;
        if server_timeout == 0 {
            problems.push("server.request_timeout_seconds must be greater than zero".to_string());
        } else if server_timeout <= relay_timeout {
            problems.push(format!(
                "server.request_timeout_seconds ({server_timeout}) must be greater than \
                 AzureAIFoundry:TimeoutSeconds ({relay_timeout})"
            ));
        }

        match self.azure_ai_foundry.validate() {
            Ok(relay) if problems.is_empty() => Ok(relay),
            Ok(_) => Err(ConfigError::ConfigurationMissing(problems)),
            Err(ConfigError::ConfigurationMissing(mut more)) => {
                problems.append(&mut more);
                Err(ConfigError::ConfigurationMissing(problems))
            }
            Err(other) => Err(other),
        }
    }
}

// ============================================================================
// ServerConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    60
}

// ============================================================================
// FoundryConfig
// ============================================================================

/// Raw settings for the inference endpoint, as read from file and environment.
#[derive(Deserialize)]
pub struct FoundryConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub managed_identity_client_id: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_relay_timeout")]
    pub timeout_seconds: u64,
}

impl Default for FoundryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            managed_identity_client_id: None,
            api_version: default_api_version(),
            timeout_seconds: default_relay_timeout(),
        }
    }
}

impl std::fmt::Debug for FoundryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FoundryConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field(
                "managed_identity_client_id",
                &self.managed_identity_client_id,
            )
            .field("api_version", &self.api_version)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl FoundryConfig {
    /// Validate into a [`RelayConfig`], reporting every problem at once.
    pub fn validate(&self) -> Result<RelayConfig, ConfigError> {
        let mut problems = Vec::new();

        let endpoint = match self.endpoint.as_deref().map(str::trim) {
            None | Some("") => {
                problems.push("AzureAIFoundry:Endpoint is not configured".to_string());
                None
            }
            Some(raw) => match Url::parse(raw) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url),
                Ok(url) => {
                    problems.push(format!(
                        "AzureAIFoundry:Endpoint must use http or https, got '{}'",
                        url.scheme()
                    ));
                    None
                }
                Err(e) => {
                    problems.push(format!("AzureAIFoundry:Endpoint is not a valid URL: {e}"));
                    None
                }
            },
        };

        if self.api_version.trim().is_empty() {
            problems.push("AzureAIFoundry:ApiVersion must not be empty".to_string());
        }
        if self.timeout_seconds == 0 {
            problems.push("AzureAIFoundry:TimeoutSeconds must be greater than zero".to_string());
        }

        let Some(endpoint) = endpoint else {
            return Err(ConfigError::ConfigurationMissing(problems));
        };
        if !problems.is_empty() {
            return Err(ConfigError::ConfigurationMissing(problems));
        }

        let auth = match non_empty(&self.api_key) {
            Some(key) => AuthConfig::ApiKey(key),
            None => AuthConfig::CredentialChain {
                managed_identity_client_id: non_empty(&self.managed_identity_client_id),
            },
        };

        Ok(RelayConfig {
            endpoint,
            auth,
            api_version: self.api_version.trim().to_string(),
            timeout: Duration::from_secs(self.timeout_seconds),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn default_api_version() -> String {
    crate::llm::DEFAULT_API_VERSION.to_string()
}

fn default_relay_timeout() -> u64 {
    crate::llm::DEFAULT_TIMEOUT.as_secs()
}

// ============================================================================
// ConfigError
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),

    #[error("relay configuration is incomplete: {}", .0.join("; "))]
    ConfigurationMissing(Vec<String>),
}

// ============================================================================
// Tests
// ============================================================================
