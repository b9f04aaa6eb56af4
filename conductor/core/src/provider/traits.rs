//! Provider Traits
//!
//! Trait definitions for text-generation providers. The pipeline only needs
//! one operation from a provider: send a prompt, get text back or a
//! classified failure.
//!
//! # Failure Taxonomy
//!
//! | Provider outcome            | Variant              |
//! |-----------------------------|----------------------|
//! | HTTP 400                    | `InvalidRequest`     |
//! | HTTP 429                    | `RateLimited`        |
//! | HTTP 403                    | `CredentialRejected` |
//! | other non-2xx               | `Service { status }` |
//! | 2xx without usable text     | `EmptyResult`        |
//! | no response at all          | `Connectivity`       |
//!
//! The `Display` text of each variant is shown to the end user verbatim.
//! Nothing here retries.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classified provider failure
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Provider rejected the request (HTTP 400)
    #[error("Invalid request to AI service. Please try a different prompt.")]
    InvalidRequest,

    /// Provider is throttling (HTTP 429)
    #[error("Rate limit reached. Please wait a moment and try again.")]
    RateLimited,

    /// Credential invalid or expired (HTTP 403)
    #[error("API key is invalid or expired. Please check your configuration.")]
    CredentialRejected,

    /// Any other non-success status
    #[error("AI service error ({status}). Please try again.")]
    Service {
        /// HTTP status code
        status: u16,
    },

    /// Success status but no generated text
    #[error("No content generated. Please try again.")]
    EmptyResult,

    /// The provider could not be reached
    #[error("Failed to connect to AI service. Please check your internet connection.")]
    Connectivity(String),
}

impl ProviderError {
    /// Classify a non-success HTTP status
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidRequest,
            403 => Self::CredentialRejected,
            429 => Self::RateLimited,
            status => Self::Service { status },
        }
    }

    /// HTTP status that caused this failure, if any
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::InvalidRequest => Some(400),
            Self::CredentialRejected => Some(403),
            Self::RateLimited => Some(429),
            Self::Service { status } => Some(*status),
            Self::EmptyResult | Self::Connectivity(_) => None,
        }
    }
}

/// Secret used to authenticate with the provider
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderCredential(String);

impl ProviderCredential {
    /// Wrap a secret; blank values are treated as absent
    pub fn new(secret: impl Into<String>) -> Option<Self> {
        let secret = secret.into();
        let trimmed = secret.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Read a credential from the first set, non-blank environment variable
    #[must_use]
    pub fn from_env(names: &[&str]) -> Option<Self> {
        names
            .iter()
            .find_map(|name| std::env::var(name).ok().and_then(Self::new))
    }

    /// The raw secret
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ProviderCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProviderCredential(<redacted>)")
    }
}

/// Provider connection settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API base URL
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Upper bound on generated tokens
    pub max_output_tokens: u32,
    /// Per-call timeout in seconds (unset = transport default)
    pub request_timeout_secs: Option<u64>,
    /// Environment variable holding the credential
    pub credential_env: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash-exp".to_string(),
            temperature: 0.7,
            max_output_tokens: 4000,
            request_timeout_secs: None,
            credential_env: "GEMINI_API_KEY".to_string(),
        }
    }
}

impl ProviderConfig {
    /// Legacy variable name used by earlier deployments
    pub const LEGACY_CREDENTIAL_ENV: &'static str = "OPENAI_API_KEY";

    /// Per-call timeout, if configured
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Resolve the credential from the configured variable, then the legacy one
    #[must_use]
    pub fn credential(&self) -> Option<ProviderCredential> {
        ProviderCredential::from_env(&[&self.credential_env, Self::LEGACY_CREDENTIAL_ENV])
    }
}

/// Text-generation provider
///
/// Implement this trait to add support for different providers.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Provider name (e.g., "Gemini")
    fn name(&self) -> &str;

    /// Perform exactly one generation call
    ///
    /// On success the returned text is guaranteed non-empty.
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ProviderError::from_status(400), ProviderError::InvalidRequest);
        assert_eq!(ProviderError::from_status(403), ProviderError::CredentialRejected);
        assert_eq!(ProviderError::from_status(429), ProviderError::RateLimited);
        assert_eq!(
            ProviderError::from_status(503),
            ProviderError::Service { status: 503 }
        );
        assert_eq!(ProviderError::from_status(401).status(), Some(401));
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            ProviderError::Service { status: 500 }.to_string(),
            "AI service error (500). Please try again."
        );
        assert_eq!(
            ProviderError::Connectivity("dns failure".to_string()).to_string(),
            "Failed to connect to AI service. Please check your internet connection."
        );
    }

    #[test]
    fn test_credential_redacted_and_trimmed() {
        let credential = ProviderCredential::new("  secret-key \n").unwrap();
        assert_eq!(credential.expose(), "secret-key");
        assert_eq!(format!("{credential:?}"), "ProviderCredential(<redacted>)");
        assert!(ProviderCredential::new("   ").is_none());
    }

    #[test]
    fn test_provider_config_default() {
        let config = ProviderConfig::default();
        assert_eq!(config.model, "gemini-2.0-flash-exp");
        assert_eq!(config.max_output_tokens, 4000);
        assert!(config.request_timeout().is_none());
    }
}
