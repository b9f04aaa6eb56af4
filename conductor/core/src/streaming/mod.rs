//! Streaming Infrastructure
//!
//! Everything between the pipeline and the bytes on the wire:
//!
//! ```text
//!   Pipeline ──emit──► EventSink ──► (daemon) SSE body ──► network
//!                                                            │
//!   Conversation ◄──apply── FrameDecoder ◄──push── (client) bytes
//! ```
//!
//! - [`EventSink`]: explicit event-writer capability handed to the pipeline
//! - [`FrameDecoder`]: reassembles `data:` frames from arbitrary byte reads

pub mod frame;
mod sink;

pub use frame::{encode, encode_payload, FrameDecoder, FrameError, MAX_FRAME_SIZE};
pub use sink::{ChannelSink, CollectingSink, EventSink, SinkClosed};
