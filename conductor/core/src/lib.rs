//! Quill Core - Staged Content Generation for quill
//!
//! This crate provides the generation pipeline, the wire protocol it speaks
//! and the conversation state a client applies that protocol to. It has no
//! HTTP server and no terminal dependencies; the daemon and the client
//! crates are thin shells around it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐          ┌───────────────────────────┐
//! │          quill-daemon        │          │        quill-client       │
//! │  POST /api/generate-content  │  data:   │   SessionController       │
//! │            │                 │  frames  │            │              │
//! │            ▼                 │ ───────► │            ▼              │
//! │  Pipeline ─► ChannelSink     │          │  FrameDecoder ─► Conversation
//! │     │                        │          │                           │
//! │     ▼                        │          └───────────────────────────┘
//! │  TextProvider (Gemini)       │
//! └──────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`GenerationRequest`]: prompt, [`ContentMode`] and optional context
//! - [`Pipeline`]: runs a request's stages and emits [`StreamEvent`]s
//! - [`TextProvider`]: one generation call against an external service
//! - [`EventSink`]: where the pipeline writes events
//! - [`FrameDecoder`]: incremental `data:` frame parser
//! - [`Conversation`]: client-side message accumulator
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use quill_core::{
//!     ChannelSink, ContentMode, GeminiProvider, GenerationRequest, Pipeline, QuillConfig,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! let config = QuillConfig::default();
//! let provider = GeminiProvider::new(config.provider.clone(), config.credential()?)?;
//! let pipeline = Pipeline::new(Arc::new(provider)).with_pacer(config.pacing.pacer());
//!
//! let (mut sink, mut rx) = ChannelSink::channel(64);
//! let request = GenerationRequest::new("Rust async runtimes", ContentMode::Draft);
//! tokio::spawn(async move {
//!     pipeline.run(&request, &mut sink, &CancellationToken::new()).await
//! });
//! while let Some(event) = rx.recv().await {
//!     print!("{}", event.content());
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`request`]: Requests, content modes and size limits
//! - [`stages`]: Per-mode stage sequences and prompt templates
//! - [`events`]: Stream events and their wire shapes
//! - [`streaming`]: Frame codec and event sinks
//! - [`provider`]: Text-generation provider abstraction (Gemini)
//! - [`pacing`]: Injectable output pacing
//! - [`pipeline`]: The orchestrator
//! - [`conversation`]: Client-side conversation state
//! - [`config`]: TOML configuration loading

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod conversation;
pub mod events;
pub mod pacing;
pub mod pipeline;
pub mod provider;
pub mod request;
pub mod stages;
pub mod streaming;

// Re-exports for convenience
pub use config::{
    default_config_path, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, QuillConfig, ServerConfig,
};
pub use conversation::{Applied, Conversation, ConversationMessage, MessageId, Sender};
pub use events::{ChunkStep, ProgressStage, StreamEvent, WireFrame, WireStep, ERROR_MARKER};
pub use pacing::{FixedPacer, NoPacing, Pacer, PacingConfig, Pause};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use provider::{GeminiProvider, ProviderConfig, ProviderCredential, ProviderError, TextProvider};
pub use request::{ContentMode, GenerationRequest, RequestError, RequestLimits};
pub use stages::{combined_prompt, PipelineStage, StageInput};
pub use streaming::{
    encode, encode_payload, ChannelSink, CollectingSink, EventSink, FrameDecoder, FrameError,
    SinkClosed, MAX_FRAME_SIZE,
};
