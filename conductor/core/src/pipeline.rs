//! Pipeline - The Orchestration Core
//!
//! Turns one [`GenerationRequest`] into an ordered sequence of
//! [`StreamEvent`]s, ending either with a clean return (the caller closes
//! the stream) or with exactly one `Error` event.
//!
//! # Flow
//!
//! ```text
//! draft:   Progress(Init) ─ pause ─ [draft] ─ pause ─ Progress(Draft)
//!          ─ [polish] ─ pause ─ Progress(Polish) ─ [seo] ─ pause
//!          ─ Progress(Seo) ─ Chunk(Final) × words
//!
//! other:   [stage] ─ Chunk × words
//! ```
//!
//! Stages run strictly in sequence; stage N+1 receives stage N's full
//! output. The first provider failure aborts the run.
//!
//! # Cancellation
//!
//! The run observes a [`CancellationToken`] before every provider call and
//! every event, and races it against in-flight provider calls, pauses and
//! sink writes. A closed sink counts as cancellation. Cancellation never
//! produces an `Error` event.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{ChunkStep, ProgressStage, StreamEvent};
use crate::pacing::{FixedPacer, Pacer, Pause};
use crate::provider::{ProviderError, TextProvider};
use crate::request::GenerationRequest;
use crate::stages::{PipelineStage, StageInput};
use crate::streaming::{EventSink, SinkClosed};

/// How a pipeline run ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// All stages ran and every chunk was emitted
    Completed {
        /// Number of chunk events emitted
        chunks: usize,
    },
    /// A provider call failed; one error event was emitted
    Failed(ProviderError),
    /// The run was cancelled or the consumer went away
    Cancelled,
}

impl PipelineOutcome {
    /// Short label for logs
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Failed(_) => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Reason a run stopped early
enum Abort {
    Cancelled,
    Provider(ProviderError),
}

impl From<SinkClosed> for Abort {
    fn from(_: SinkClosed) -> Self {
        Self::Cancelled
    }
}

/// The generation pipeline
///
/// Stateless across runs: one `Pipeline` can serve any number of
/// concurrent requests.
pub struct Pipeline<P: TextProvider + ?Sized> {
    /// Text-generation provider
    provider: Arc<P>,
    /// Output pacing
    pacer: Arc<dyn Pacer>,
}

impl<P: TextProvider + ?Sized> Clone for Pipeline<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            pacer: Arc::clone(&self.pacer),
        }
    }
}

impl<P: TextProvider + ?Sized> Pipeline<P> {
    /// Create a pipeline with the default pacing
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            pacer: Arc::new(FixedPacer::default()),
        }
    }

    /// Replace the pacing strategy
    #[must_use]
    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    /// Run one request to completion, failure or cancellation
    pub async fn run<S: EventSink + ?Sized>(
        &self,
        request: &GenerationRequest,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> PipelineOutcome {
        let start = Instant::now();

        let outcome = match self.execute(request, sink, cancel).await {
            Ok(chunks) => PipelineOutcome::Completed { chunks },
            Err(Abort::Cancelled) => PipelineOutcome::Cancelled,
            Err(Abort::Provider(error)) => {
                warn!(mode = %request.mode, error = %error, "Pipeline stage failed");
                // Already-emitted events stand; the error is appended after them
                if !cancel.is_cancelled()
                    && sink.emit(StreamEvent::error(error.to_string())).await.is_err()
                {
                    debug!("Consumer left before the error event was delivered");
                }
                PipelineOutcome::Failed(error)
            }
        };

        info!(
            mode = %request.mode,
            outcome = outcome.as_str(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Pipeline run finished"
        );
        outcome
    }

    async fn execute<S: EventSink + ?Sized>(
        &self,
        request: &GenerationRequest,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<usize, Abort> {
        let multi_stage = request.mode.is_multi_stage();

        if multi_stage {
            self.emit(sink, cancel, StreamEvent::progress(ProgressStage::Init))
                .await?;
            self.pause(cancel, Pause::Intro).await?;
        }

        let mut output = String::new();
        for (index, stage) in request.mode.stages().iter().enumerate() {
            let input = if index == 0 {
                StageInput::Request(request)
            } else {
                StageInput::Previous(&output)
            };
            let prompt = stage.prompt(input);
            output = self.call(stage, &prompt, cancel).await?;

            if let Some(marker) = stage.completes {
                self.pause(cancel, Pause::Stage).await?;
                self.emit(sink, cancel, StreamEvent::progress(marker)).await?;
            }
        }

        let step = multi_stage.then_some(ChunkStep::Final);
        self.stream_words(&output, step, sink, cancel).await
    }

    /// One provider call, abandoned as soon as cancellation is observed
    async fn call(
        &self,
        stage: &PipelineStage,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, Abort> {
        if cancel.is_cancelled() {
            return Err(Abort::Cancelled);
        }

        debug!(stage = stage.name, prompt_chars = prompt.len(), "Calling provider");
        let start = Instant::now();

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Abort::Cancelled),
            result = self.provider.generate(prompt) => result,
        };

        let text = match result {
            Ok(text) if text.is_empty() => Err(ProviderError::EmptyResult),
            other => other,
        }
        .map_err(Abort::Provider)?;

        debug!(
            stage = stage.name,
            output_chars = text.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Stage complete"
        );
        Ok(text)
    }

    /// Re-emit text one space-delimited word at a time
    ///
    /// Each chunk is the word plus one trailing space, so concatenating the
    /// chunks yields the text followed by a single space.
    async fn stream_words<S: EventSink + ?Sized>(
        &self,
        text: &str,
        step: Option<ChunkStep>,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<usize, Abort> {
        let mut chunks = 0;
        for (index, word) in text.split(' ').enumerate() {
            if index > 0 {
                self.pause(cancel, Pause::Chunk).await?;
            }
            self.emit(sink, cancel, StreamEvent::chunk(step, format!("{word} ")))
                .await?;
            chunks += 1;
        }
        Ok(chunks)
    }

    async fn emit<S: EventSink + ?Sized>(
        &self,
        sink: &mut S,
        cancel: &CancellationToken,
        event: StreamEvent,
    ) -> Result<(), Abort> {
        if cancel.is_cancelled() {
            return Err(Abort::Cancelled);
        }
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Abort::Cancelled),
            result = sink.emit(event) => result.map_err(Abort::from),
        }
    }

    async fn pause(&self, cancel: &CancellationToken, pause: Pause) -> Result<(), Abort> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Abort::Cancelled),
            () = self.pacer.pause(pause) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacing::NoPacing;
    use crate::request::ContentMode;
    use crate::streaming::CollectingSink;
    use async_trait::async_trait;

    /// Provider that echoes a fixed reply
    struct EchoProvider(&'static str);

    #[async_trait]
    impl TextProvider for EchoProvider {
        fn name(&self) -> &str {
            "Echo"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
            Ok(self.0.to_string())
        }
    }

    fn pipeline(reply: &'static str) -> Pipeline<EchoProvider> {
        Pipeline::new(Arc::new(EchoProvider(reply))).with_pacer(Arc::new(NoPacing))
    }

    #[tokio::test]
    async fn test_single_stage_streams_words() {
        let mut sink = CollectingSink::new();
        let request = GenerationRequest::new("hi", ContentMode::Chat);

        let outcome = pipeline("Hello there\nfriend")
            .run(&request, &mut sink, &CancellationToken::new())
            .await;

        assert_eq!(outcome, PipelineOutcome::Completed { chunks: 2 });
        assert_eq!(
            sink.events(),
            &[
                StreamEvent::chunk(None, "Hello "),
                StreamEvent::chunk(None, "there\nfriend "),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_provider_text_is_a_failure() {
        let mut sink = CollectingSink::new();
        let request = GenerationRequest::new("hi", ContentMode::Polish);

        let outcome = pipeline("")
            .run(&request, &mut sink, &CancellationToken::new())
            .await;

        assert_eq!(outcome, PipelineOutcome::Failed(ProviderError::EmptyResult));
        assert_eq!(
            sink.events(),
            &[StreamEvent::error("No content generated. Please try again.")]
        );
    }

    #[tokio::test]
    async fn test_closed_sink_counts_as_cancellation() {
        let mut sink = CollectingSink::closing_after(1);
        let request = GenerationRequest::new("hi", ContentMode::Chat);

        let outcome = pipeline("one two three")
            .run(&request, &mut sink, &CancellationToken::new())
            .await;

        assert_eq!(outcome, PipelineOutcome::Cancelled);
        assert_eq!(sink.events().len(), 1);
    }
}
