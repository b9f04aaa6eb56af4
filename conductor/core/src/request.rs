//! Generation Requests
//!
//! The request a surface submits to the pipeline: a prompt, the content mode
//! that selects the stage sequence, and optional supporting context (for
//! example the text of an uploaded file).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which prompt template(s) and stage sequence to run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentMode {
    /// Conversational reply
    #[default]
    Chat,
    /// Three-stage blog pipeline: draft, polish, seo
    Draft,
    /// SEO rewrite of the supplied content
    Seo,
    /// Grammar, clarity and flow pass
    Polish,
    /// Bullet-point summary
    Summarize,
}

impl ContentMode {
    /// All modes, in display order
    pub const ALL: [ContentMode; 5] = [
        Self::Chat,
        Self::Draft,
        Self::Seo,
        Self::Polish,
        Self::Summarize,
    ];

    /// Wire name of the mode
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Draft => "draft",
            Self::Seo => "seo",
            Self::Polish => "polish",
            Self::Summarize => "summarize",
        }
    }

    /// Whether this mode chains several provider calls
    #[must_use]
    pub fn is_multi_stage(&self) -> bool {
        matches!(self, Self::Draft)
    }
}

impl fmt::Display for ContentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentMode {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RequestError::UnknownMode(s.to_string()))
    }
}

/// Size limits applied to incoming requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestLimits {
    /// Maximum prompt size in bytes
    pub max_prompt_bytes: usize,
    /// Maximum context size in bytes
    pub max_context_bytes: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_prompt_bytes: 32 * 1024,
            max_context_bytes: 256 * 1024,
        }
    }
}

/// Reasons a request is refused before any provider call
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    /// Prompt is empty or whitespace
    #[error("Prompt must not be empty")]
    EmptyPrompt,

    /// Prompt exceeds the configured limit
    #[error("Prompt is too long: {len} bytes (max: {max})")]
    PromptTooLong {
        /// Actual size
        len: usize,
        /// Configured limit
        max: usize,
    },

    /// Context exceeds the configured limit
    #[error("Context is too long: {len} bytes (max: {max})")]
    ContextTooLong {
        /// Actual size
        len: usize,
        /// Configured limit
        max: usize,
    },

    /// Mode string did not name a known mode
    #[error("Unknown mode '{0}' (expected one of: chat, draft, seo, polish, summarize)")]
    UnknownMode(String),
}

/// A single generation request
///
/// Immutable once submitted; each request is an independent pipeline run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The user's prompt
    pub prompt: String,
    /// Content mode
    pub mode: ContentMode,
    /// Optional supporting context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl GenerationRequest {
    /// Create a request without context
    pub fn new(prompt: impl Into<String>, mode: ContentMode) -> Self {
        Self {
            prompt: prompt.into(),
            mode,
            context: None,
        }
    }

    /// Attach supporting context
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Context, treating an empty string as absent
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref().filter(|c| !c.is_empty())
    }

    /// Check the request against size limits
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self, limits: &RequestLimits) -> Result<(), RequestError> {
        if self.prompt.trim().is_empty() {
            return Err(RequestError::EmptyPrompt);
        }
        if self.prompt.len() > limits.max_prompt_bytes {
            return Err(RequestError::PromptTooLong {
                len: self.prompt.len(),
                max: limits.max_prompt_bytes,
            });
        }
        if let Some(context) = &self.context {
            if context.len() > limits.max_context_bytes {
                return Err(RequestError::ContextTooLong {
                    len: context.len(),
                    max: limits.max_context_bytes,
                });
            }
        }
        Ok(())
    }
}
