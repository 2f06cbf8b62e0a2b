//! Authorization for outbound inference calls.
//!
//! Two variants attach proof of authorization to a request:
//!
//! - [`ApiKeyAuthorizer`]: a pre-shared key from configuration.
//! - [`CredentialChain`]: a bearer token from the first [`TokenSource`] that
//!   can produce one. The default chain wraps the Azure identity SDK's
//!   managed identity credential, then its Azure CLI credential.

use std::sync::Arc;

use async_trait::async_trait;
use azure_core::credentials::TokenCredential;
use azure_identity::{
    AzureCliCredential, ManagedIdentityCredential, ManagedIdentityCredentialOptions,
    UserAssignedId,
};
use reqwest::RequestBuilder;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::error::RelayError;

/// Scope the access token is requested for.
pub const TOKEN_SCOPE: &str = "https://cognitiveservices.azure.com/.default";

// ============================================================================
// AuthConfig
// ============================================================================

/// Which authentication variant the relay uses.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthConfig {
    /// Static API key.
    ApiKey(String),
    /// Ambient credential discovery, optionally pinned to a user-assigned identity.
    CredentialChain {
        managed_identity_client_id: Option<String>,
    },
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthConfig::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            AuthConfig::CredentialChain {
                managed_identity_client_id,
            } => f
                .debug_struct("CredentialChain")
                .field("managed_identity_client_id", managed_identity_client_id)
                .finish(),
        }
    }
}

/// Build the authorizer for a configured variant.
pub fn authorizer_for(config: &AuthConfig) -> Result<Box<dyn Authorizer>, RelayError> {
    Ok(match config {
        AuthConfig::ApiKey(key) => Box::new(ApiKeyAuthorizer::new(key.clone())),
        AuthConfig::CredentialChain {
            managed_identity_client_id,
        } => Box::new(CredentialChain::default_chain(
            managed_identity_client_id.clone(),
        )?),
    })
}

// ============================================================================
// Authorizer
// ============================================================================

/// Attaches proof of authorization to an outbound request.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, RelayError>;
}

/// Static-key variant.
pub struct ApiKeyAuthorizer {
    key: String,
}

impl ApiKeyAuthorizer {
    #[must_use]
    pub fn new(key: String) -> Self {
        Self { key }
    }
}

#[async_trait]
impl Authorizer for ApiKeyAuthorizer {
    fn name(&self) -> &'static str {
        "api_key"
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, RelayError> {
        Ok(request.bearer_auth(&self.key))
    }
}

// ============================================================================
// Credential chain
// ============================================================================

/// Failure from a single credential source.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CredentialError(pub String);

/// Something that can produce a bearer token for a scope.
#[async_trait]
pub trait TokenSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn token(&self, scope: &str) -> Result<String, CredentialError>;
}

/// Adapts an Azure identity SDK credential. The SDK caches and refreshes
/// its own tokens.
pub struct SdkTokenSource {
    name: &'static str,
    credential: Arc<dyn TokenCredential>,
}

impl SdkTokenSource {
    #[must_use]
    pub fn new(name: &'static str, credential: Arc<dyn TokenCredential>) -> Self {
        Self { name, credential }
    }
}

#[async_trait]
impl TokenSource for SdkTokenSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn token(&self, scope: &str) -> Result<String, CredentialError> {
        let token = self
            .credential
            .get_token(&[scope], None)
            .await
            .map_err(|e| CredentialError(e.to_string()))?;
        Ok(token.token.secret().to_string())
    }
}

/// Credential-chain variant.
///
/// Sources are tried in order until one succeeds. That source is then used
/// exclusively, so later calls never wait on sources already known to fail.
pub struct CredentialChain {
    sources: Vec<Box<dyn TokenSource>>,
    scope: String,
    selected: Mutex<Option<usize>>,
}

impl CredentialChain {
    #[must_use]
    pub fn new(sources: Vec<Box<dyn TokenSource>>, scope: impl Into<String>) -> Self {
        Self {
            sources,
            scope: scope.into(),
            selected: Mutex::new(None),
        }
    }

    /// Managed identity first, then the Azure CLI.
    pub fn default_chain(managed_identity_client_id: Option<String>) -> Result<Self, RelayError> {
        let options = ManagedIdentityCredentialOptions {
            user_assigned_id: managed_identity_client_id.map(UserAssignedId::ClientId),
            ..Default::default()
        };
        let managed_identity = ManagedIdentityCredential::new(Some(options))
            .map_err(|e| credential_setup_error("managed identity", e))?;
        let azure_cli =
            AzureCliCredential::new(None).map_err(|e| credential_setup_error("Azure CLI", e))?;

        Ok(Self::new(
            vec![
                Box::new(SdkTokenSource::new("managed_identity", managed_identity)),
                Box::new(SdkTokenSource::new("azure_cli", azure_cli)),
            ],
            TOKEN_SCOPE,
        ))
    }

    /// Current bearer token from the selected source, selecting one first if needed.
    pub async fn token(&self) -> Result<String, RelayError> {
        let current = *self.selected.lock().await;
        if let Some(index) = current {
            return self.token_from(index).await;
        }

        // Held across selection so concurrent first calls don't each walk the chain.
        let mut selected = self.selected.lock().await;
        let raced = *selected;
        if let Some(index) = raced {
            drop(selected);
            return self.token_from(index).await;
        }

        let mut failures = Vec::with_capacity(self.sources.len());
        for (index, source) in self.sources.iter().enumerate() {
            match source.token(&self.scope).await {
                Ok(token) => {
                    info!(source = source.name(), "selected credential source");
                    *selected = Some(index);
                    return Ok(token);
                }
                Err(e) => {
                    debug!(source = source.name(), error = %e, "credential source failed");
                    failures.push(format!("{}: {e}", source.name()));
                }
            }
        }

        Err(RelayError::Unauthorized(format!(
            "no credential source produced a token ({})",
            failures.join("; ")
        )))
    }

    async fn token_from(&self, index: usize) -> Result<String, RelayError> {
        let source = &self.sources[index];
        source
            .token(&self.scope)
            .await
            .map_err(|e| RelayError::Unauthorized(format!("{} failed: {e}", source.name())))
    }
}

#[async_trait]
impl Authorizer for CredentialChain {
    fn name(&self) -> &'static str {
        "credential_chain"
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, RelayError> {
        let token = self.token().await?;
        Ok(request.bearer_auth(token))
    }
}

fn credential_setup_error(source: &str, err: azure_core::Error) -> RelayError {
    RelayError::ConfigurationMissing(vec![format!(
        "{source} credential could not be created: {err}"
    )])
}
