//! Gemini Provider Implementation
//!
//! Text generation through the Google Generative Language REST API.
//!
//! # API
//!
//! - `POST /v1beta/models/{model}:generateContent?key={credential}`
//!
//! Request body:
//!
//! ```json
//! {"contents":[{"parts":[{"text":"..."}]}],
//!  "generationConfig":{"temperature":0.7,"maxOutputTokens":4000}}
//! ```
//!
//! The generated text lives at `candidates[0].content.parts[0].text`.

use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::traits::{ProviderConfig, ProviderCredential, ProviderError, TextProvider};

/// JSON pointer to the generated text in a response body
const TEXT_POINTER: &str = "/candidates/0/content/parts/0/text";

/// Gemini provider client
#[derive(Clone)]
pub struct GeminiProvider {
    /// Connection settings
    config: ProviderConfig,
    /// API key
    credential: ProviderCredential,
    /// HTTP client
    http_client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a new provider
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be initialised.
    pub fn new(config: ProviderConfig, credential: ProviderCredential) -> reqwest::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            config,
            credential,
            http_client: builder.build()?,
        })
    }

    /// Get generate endpoint URL (without the credential)
    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Build the request body for one prompt
    fn request_body(&self, prompt: &str) -> Value {
        serde_json::json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_output_tokens,
            }
        })
    }
}

/// Pull the generated text out of a response body
fn extract_text(body: &Value) -> Result<String, ProviderError> {
    body.pointer(TEXT_POINTER)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or(ProviderError::EmptyResult)
}

#[async_trait]
impl TextProvider for GeminiProvider {
    fn name(&self) -> &str {
        "Gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let start = Instant::now();
        let url = self.generate_url();

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.credential.expose())])
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                // The URL carries the credential as a query parameter
                let e = e.without_url();
                warn!(error = %e, url = %url, "Provider unreachable");
                ProviderError::Connectivity(e.to_string())
            })?;

        // Check for HTTP errors
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Provider returned error status");
            return Err(ProviderError::from_status(status.as_u16()));
        }

        let data: Value = response.json().await.map_err(|e| {
            let e = e.without_url();
            if e.is_decode() {
                warn!(error = %e, "Provider returned malformed body");
                ProviderError::EmptyResult
            } else {
                warn!(error = %e, "Provider connection dropped");
                ProviderError::Connectivity(e.to_string())
            }
        })?;

        let text = extract_text(&data)?;
        debug!(
            chars = text.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Provider call complete"
        );
        Ok(text)
    }
}
