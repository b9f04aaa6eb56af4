//! Quill Client - Stream Consumer for quill
//!
//! Submits generation requests to a quill daemon, decodes the response
//! frames as they arrive and accumulates them into a
//! [`Conversation`](quill_core::Conversation).
//!
//! # Key Types
//!
//! - [`SessionController`]: send / stop / clear, one active run at a time
//! - [`GenerationTransport`]: how a request becomes a byte stream
//! - [`HttpTransport`]: the reqwest-backed transport
//! - [`SessionUpdate`]: change notifications for a presentation layer
//!
//! # Example
//!
//! ```ignore
//! use quill_client::{HttpTransport, SessionController, SessionUpdate};
//! use quill_core::ContentMode;
//!
//! let (controller, mut updates) =
//!     SessionController::new(HttpTransport::new("http://127.0.0.1:3000"));
//! let run = controller.send("Write about Rust", ContentMode::Draft, None);
//!
//! while let Some(update) = updates.recv().await {
//!     if let SessionUpdate::MessageAppended { text, .. } = update {
//!         print!("{text}");
//!     }
//! }
//! let outcome = run.await?;
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod controller;
pub mod error;
pub mod transport;

pub use controller::{
    NoticeLevel, SessionController, SessionOutcome, SessionUpdate, FAILED_NOTICE, STOPPED_NOTICE,
};
pub use error::ClientError;
pub use transport::{ByteStream, GenerationTransport, HttpTransport};
