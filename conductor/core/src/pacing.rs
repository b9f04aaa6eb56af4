//! Output Pacing
//!
//! Delays between stages and between chunks make output appear to be
//! typed live. Event order does not depend on them. The pipeline takes them
//! through an injectable [`Pacer`]; tests use [`NoPacing`].
//!
//! This is the only module in the workspace allowed to sleep.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Kinds of pause the pipeline requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pause {
    /// After announcing a multi-stage run
    Intro,
    /// After a stage finishes, before its progress marker
    Stage,
    /// Between content chunks
    Chunk,
}

/// Pacing strategy
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Wait before the next event
    ///
    /// Callers race this against cancellation, so implementations need not
    /// observe cancellation themselves.
    async fn pause(&self, pause: Pause);
}

/// Fixed delay per pause kind
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedPacer {
    /// Delay after the intro marker
    pub intro: Duration,
    /// Delay after each stage
    pub stage: Duration,
    /// Delay between chunks
    pub chunk: Duration,
}

impl Default for FixedPacer {
    fn default() -> Self {
        Self {
            intro: Duration::from_millis(1000),
            stage: Duration::from_millis(800),
            chunk: Duration::from_millis(25),
        }
    }
}

impl FixedPacer {
    /// Delay for a given pause kind
    #[must_use]
    pub fn delay(&self, pause: Pause) -> Duration {
        match pause {
            Pause::Intro => self.intro,
            Pause::Stage => self.stage,
            Pause::Chunk => self.chunk,
        }
    }
}

#[async_trait]
impl Pacer for FixedPacer {
    async fn pause(&self, pause: Pause) {
        let delay = self.delay(pause);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Pacer that never waits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoPacing;

#[async_trait]
impl Pacer for NoPacing {
    async fn pause(&self, _pause: Pause) {}
}

/// Pacing settings as they appear in the config file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Whether to pace output at all
    pub enabled: bool,
    /// Delay after the intro marker, in milliseconds
    pub intro_ms: u64,
    /// Delay after each stage, in milliseconds
    pub stage_ms: u64,
    /// Delay between chunks, in milliseconds
    pub chunk_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            intro_ms: 1000,
            stage_ms: 800,
            chunk_ms: 25,
        }
    }
}

impl PacingConfig {
    /// Build the pacer these settings describe
    #[must_use]
    pub fn pacer(&self) -> Arc<dyn Pacer> {
        if self.enabled {
            Arc::new(FixedPacer {
                intro: Duration::from_millis(self.intro_ms),
                stage: Duration::from_millis(self.stage_ms),
                chunk: Duration::from_millis(self.chunk_ms),
            })
        } else {
            Arc::new(NoPacing)
        }
    }
}
