//! Event Sinks
//!
//! The pipeline writes events through an explicit sink instead of owning
//! the transport. The daemon hands it a channel whose receiver feeds the
//! HTTP response; tests hand it a collector.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::events::StreamEvent;

/// The consumer of a stream went away
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("event sink closed")]
pub struct SinkClosed;

/// Destination for pipeline events
#[async_trait]
pub trait EventSink: Send {
    /// Deliver one event, in order
    ///
    /// Returns `SinkClosed` once nobody is listening; the pipeline treats
    /// that as cancellation.
    async fn emit(&mut self, event: StreamEvent) -> Result<(), SinkClosed>;
}

/// Sink backed by a bounded tokio channel
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<StreamEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&mut self, event: StreamEvent) -> Result<(), SinkClosed> {
        self.tx.send(event).await.map_err(|_| SinkClosed)
    }
}

/// Sink that records events in memory
#[derive(Clone, Debug, Default)]
pub struct CollectingSink {
    events: Vec<StreamEvent>,
    close_after: Option<usize>,
}

impl CollectingSink {
    /// Create an empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `limit` events, then report the sink as closed
    #[must_use]
    pub fn closing_after(limit: usize) -> Self {
        Self {
            events: Vec::new(),
            close_after: Some(limit),
        }
    }

    /// Events received so far
    #[must_use]
    pub fn events(&self) -> &[StreamEvent] {
        &self.events
    }

    /// Consume the collector
    #[must_use]
    pub fn into_events(self) -> Vec<StreamEvent> {
        self.events
    }

    /// Concatenated content of all chunk events
    #[must_use]
    pub fn chunk_text(&self) -> String {
        self.events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::Chunk { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingSink {
    async fn emit(&mut self, event: StreamEvent) -> Result<(), SinkClosed> {
        if self.close_after.is_some_and(|limit| self.events.len() >= limit) {
            return Err(SinkClosed);
        }
        self.events.push(event);
        Ok(())
    }
}
