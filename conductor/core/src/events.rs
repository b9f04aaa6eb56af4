//! Stream Events
//!
//! The unit the pipeline emits and the client consumes. Each event maps to
//! exactly one wire frame; the JSON shapes are fixed by the service's
//! existing clients:
//!
//! ```text
//! {"step":"init","content":"<marker>"}                  Progress(Init)
//! {"step":"draft"|"polish"|"seo","content":"<marker>"}  Progress(stage)
//! {"step":"final","content":"<word+space>"}             Chunk(Final)
//! {"content":"<word+space>"}                            Chunk(None)
//! {"error":true,"content":"<message>"}                  Error
//! ```
//!
//! There is no "done" event: the stream ends when the connection closes.
//! Events of one run are totally ordered and must be applied in order.

use serde::{Deserialize, Serialize};

/// Marker prefixed to user-visible error messages
pub const ERROR_MARKER: &str = "❌ ";

/// Pipeline progress points announced to the client
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStage {
    /// Multi-stage pipeline started
    Init,
    /// Draft stage finished
    Draft,
    /// Polish stage finished
    Polish,
    /// SEO stage finished
    Seo,
}

impl ProgressStage {
    /// Human-readable marker text shown in the conversation
    #[must_use]
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Init => {
                "📊✍️ Crafting your SEO-optimized blog with powerful insights… ⏳ please wait! 🚀\n\n"
            }
            Self::Draft => "📝 **Draft Generated** ✅\n\n",
            Self::Polish => "✨ **Polished Content** ✅\n\n",
            Self::Seo => "🔍 **SEO Optimized** ✅\n\n---\n\n",
        }
    }
}

/// Tag carried by content chunks of multi-stage runs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStep {
    /// Output of the last stage
    Final,
}

/// An event in a generation stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// Informational progress marker
    Progress {
        /// Which point of the pipeline was reached
        stage: ProgressStage,
        /// Marker text
        marker: String,
    },

    /// Ordered fragment of generated content
    Chunk {
        /// `Some(Final)` for multi-stage runs, `None` otherwise
        step: Option<ChunkStep>,
        /// The fragment
        text: String,
    },

    /// Terminal failure; nothing follows
    Error {
        /// User-visible message
        message: String,
    },
}

impl StreamEvent {
    /// Progress event with the stage's standard marker
    #[must_use]
    pub fn progress(stage: ProgressStage) -> Self {
        Self::Progress {
            stage,
            marker: stage.marker().to_string(),
        }
    }

    /// Content chunk
    pub fn chunk(step: Option<ChunkStep>, text: impl Into<String>) -> Self {
        Self::Chunk {
            step,
            text: text.into(),
        }
    }

    /// Error event; the visible error marker is added if missing
    pub fn error(message: impl AsRef<str>) -> Self {
        let message = message.as_ref();
        let message = if message.starts_with(ERROR_MARKER) {
            message.to_string()
        } else {
            format!("{ERROR_MARKER}{message}")
        };
        Self::Error { message }
    }

    /// Whether no further events follow this one
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Text this event contributes to the reconstructed message
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::Progress { marker, .. } => marker,
            Self::Chunk { text, .. } => text,
            Self::Error { message } => message,
        }
    }

    /// Convert to the wire representation
    #[must_use]
    pub fn to_wire(&self) -> WireFrame {
        match self {
            Self::Progress { stage, marker } => WireFrame {
                error: false,
                step: Some(WireStep::from(*stage)),
                content: marker.clone(),
            },
            Self::Chunk { step, text } => WireFrame {
                error: false,
                step: step.map(|ChunkStep::Final| WireStep::Final),
                content: text.clone(),
            },
            Self::Error { message } => WireFrame {
                error: true,
                step: None,
                content: message.clone(),
            },
        }
    }

    /// Interpret a wire frame
    #[must_use]
    pub fn from_wire(frame: WireFrame) -> Self {
        if frame.error {
            return Self::Error {
                message: frame.content,
            };
        }
        match frame.step {
            Some(WireStep::Init) => Self::Progress {
                stage: ProgressStage::Init,
                marker: frame.content,
            },
            Some(WireStep::Draft) => Self::Progress {
                stage: ProgressStage::Draft,
                marker: frame.content,
            },
            Some(WireStep::Polish) => Self::Progress {
                stage: ProgressStage::Polish,
                marker: frame.content,
            },
            Some(WireStep::Seo) => Self::Progress {
                stage: ProgressStage::Seo,
                marker: frame.content,
            },
            Some(WireStep::Final) => Self::Chunk {
                step: Some(ChunkStep::Final),
                text: frame.content,
            },
            None => Self::Chunk {
                step: None,
                text: frame.content,
            },
        }
    }
}

/// Value of the `step` field on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireStep {
    /// Pipeline start marker
    Init,
    /// Draft complete marker
    Draft,
    /// Polish complete marker
    Polish,
    /// SEO complete marker
    Seo,
    /// Final content chunk
    Final,
}

impl From<ProgressStage> for WireStep {
    fn from(stage: ProgressStage) -> Self {
        match stage {
            ProgressStage::Init => Self::Init,
            ProgressStage::Draft => Self::Draft,
            ProgressStage::Polish => Self::Polish,
            ProgressStage::Seo => Self::Seo,
        }
    }
}

/// JSON payload of one `data:` frame
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFrame {
    /// Set only on error frames
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
    /// Stage tag, absent for single-stage content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<WireStep>,
    /// Marker, fragment or error message
    #[serde(default)]
    pub content: String,
}

impl Serialize for StreamEvent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StreamEvent {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        WireFrame::deserialize(deserializer).map(Self::from_wire)
    }
}
