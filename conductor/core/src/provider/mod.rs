//! Text-Generation Providers
//!
//! This module provides abstracted access to the external generation
//! service through a common trait interface.
//!
//! # Available Providers
//!
//! - **Gemini**: Google Generative Language API (default)
//!
//! # Usage
//!
//! ```ignore
//! use quill_core::provider::{GeminiProvider, ProviderConfig, TextProvider};
//!
//! let config = ProviderConfig::default();
//! let credential = config.credential().expect("credential");
//! let provider = GeminiProvider::new(config, credential)?;
//! let text = provider.generate("Hello!").await?;
//! ```

mod gemini;
mod traits;

pub use gemini::GeminiProvider;
pub use traits::{ProviderConfig, ProviderCredential, ProviderError, TextProvider};
