//! Pipeline Stages
//!
//! Each content mode maps to a static sequence of stages. A stage turns its
//! input (the request for the first stage, the previous stage's full output
//! afterwards) into the prompt sent to the provider.
//!
//! ```text
//! draft:     request ─► [draft] ─► [polish] ─► [seo] ─► chunks
//! chat/seo/
//! polish/
//! summarize: request ─► [single stage with instruction prefix] ─► chunks
//! ```

use crate::events::ProgressStage;
use crate::request::{ContentMode, GenerationRequest};

/// Input handed to a stage's prompt template
#[derive(Clone, Copy, Debug)]
pub enum StageInput<'a> {
    /// First stage: the submitted request
    Request(&'a GenerationRequest),
    /// Later stages: the previous stage's full output
    Previous(&'a str),
}

impl<'a> StageInput<'a> {
    /// The text this input carries (prompt or previous output)
    #[must_use]
    pub fn text(&self) -> &'a str {
        match self {
            Self::Request(request) => &request.prompt,
            Self::Previous(output) => output,
        }
    }
}

/// One provider call within a pipeline run
#[derive(Clone, Copy)]
pub struct PipelineStage {
    /// Stage label used in logs
    pub name: &'static str,
    /// Progress marker emitted once the stage completes
    pub completes: Option<ProgressStage>,
    template: fn(StageInput<'_>) -> String,
}

impl std::fmt::Debug for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineStage")
            .field("name", &self.name)
            .field("completes", &self.completes)
            .finish_non_exhaustive()
    }
}

impl PipelineStage {
    /// Render the prompt for this stage
    #[must_use]
    pub fn prompt(&self, input: StageInput<'_>) -> String {
        (self.template)(input)
    }
}

const CHAT_INSTRUCTION: &str = "You are a helpful multilingual AI assistant that fluently supports English, Roman Sindhi, and Roman Urdu for an SEO content writing platform. Be warm and friendly. Use relevant emojis. Detect the language of the user's message and respond naturally in the same language.";

const SEO_INSTRUCTION: &str = "You are a multilingual SEO Blog Optimizer Agent that supports English, Roman Sindhi, and Roman Urdu. Take the provided content and optimize it for SEO. Insert relevant keywords naturally. Use proper Markdown formatting. Respond in the same language as the input.";

const POLISH_INSTRUCTION: &str = "You are a multilingual rewriting agent that supports English, Roman Sindhi, and Roman Urdu. Polish this content for grammar, clarity, flow, and engagement. Make it professional yet conversational. Maintain the same language as the input.";

const SUMMARIZE_INSTRUCTION: &str = "You are a multilingual summarization agent that supports English, Roman Sindhi, and Roman Urdu. Summarize the provided text comprehensively using bullet points, **bold text**, and *italics* for emphasis. Keep the same language as the input.";

fn draft_prompt(input: StageInput<'_>) -> String {
    format!(
        "You are a multilingual content drafting agent that supports English, Roman Sindhi, and Roman Urdu. Based on the topic \"{}\", create a comprehensive first draft blog post with a clear structure: introduction, main body sections, and conclusion. Use proper Markdown formatting with # for H1, ## for H2, ### for H3. Make it informative and well-organized. Include engaging hooks and smooth transitions. If the user writes in Roman Sindhi or Roman Urdu, respond in the same language naturally and fluently.",
        input.text()
    )
}

fn polish_prompt(input: StageInput<'_>) -> String {
    format!(
        "Polish this blog for grammar, clarity, flow, and engagement. Maintain the same language (English, Roman Sindhi, or Roman Urdu) as the original content:\n\n{}",
        input.text()
    )
}

fn seo_prompt(input: StageInput<'_>) -> String {
    format!(
        "Optimize this blog for SEO by inserting relevant keywords naturally. Use proper Markdown formatting. Keep the same language (English, Roman Sindhi, or Roman Urdu) as the original:\n\n{}",
        input.text()
    )
}

/// Combine instruction, optional context and prompt into one provider prompt
#[must_use]
pub fn combined_prompt(instruction: &str, prompt: &str, context: Option<&str>) -> String {
    match context {
        Some(context) => {
            format!("{instruction}\n\nContext:\n{context}\n\nUser Request:\n{prompt}")
        }
        None => format!("{instruction}\n\nUser Request:\n{prompt}"),
    }
}

fn single_stage_prompt(instruction: &str, input: StageInput<'_>) -> String {
    match input {
        StageInput::Request(request) => {
            combined_prompt(instruction, &request.prompt, request.context())
        }
        StageInput::Previous(text) => combined_prompt(instruction, text, None),
    }
}

fn chat_prompt(input: StageInput<'_>) -> String {
    single_stage_prompt(CHAT_INSTRUCTION, input)
}

fn seo_mode_prompt(input: StageInput<'_>) -> String {
    single_stage_prompt(SEO_INSTRUCTION, input)
}

fn polish_mode_prompt(input: StageInput<'_>) -> String {
    single_stage_prompt(POLISH_INSTRUCTION, input)
}

fn summarize_prompt(input: StageInput<'_>) -> String {
    single_stage_prompt(SUMMARIZE_INSTRUCTION, input)
}

static DRAFT_STAGES: [PipelineStage; 3] = [
    PipelineStage {
        name: "draft",
        completes: Some(ProgressStage::Draft),
        template: draft_prompt,
    },
    PipelineStage {
        name: "polish",
        completes: Some(ProgressStage::Polish),
        template: polish_prompt,
    },
    PipelineStage {
        name: "seo",
        completes: Some(ProgressStage::Seo),
        template: seo_prompt,
    },
];

static CHAT_STAGES: [PipelineStage; 1] = [PipelineStage {
    name: "chat",
    completes: None,
    template: chat_prompt,
}];

static SEO_STAGES: [PipelineStage; 1] = [PipelineStage {
    name: "seo",
    completes: None,
    template: seo_mode_prompt,
}];

static POLISH_STAGES: [PipelineStage; 1] = [PipelineStage {
    name: "polish",
    completes: None,
    template: polish_mode_prompt,
}];

static SUMMARIZE_STAGES: [PipelineStage; 1] = [PipelineStage {
    name: "summarize",
    completes: None,
    template: summarize_prompt,
}];

impl ContentMode {
    /// Instruction prefix for single-stage modes
    ///
    /// `Draft` is template-driven and has no single instruction.
    #[must_use]
    pub fn instruction(&self) -> Option<&'static str> {
        match self {
            Self::Chat => Some(CHAT_INSTRUCTION),
            Self::Seo => Some(SEO_INSTRUCTION),
            Self::Polish => Some(POLISH_INSTRUCTION),
            Self::Summarize => Some(SUMMARIZE_INSTRUCTION),
            Self::Draft => None,
        }
    }

    /// The ordered stages this mode runs
    #[must_use]
    pub fn stages(&self) -> &'static [PipelineStage] {
        match self {
            Self::Draft => &DRAFT_STAGES,
            Self::Chat => &CHAT_STAGES,
            Self::Seo => &SEO_STAGES,
            Self::Polish => &POLISH_STAGES,
            Self::Summarize => &SUMMARIZE_STAGES,
        }
    }
}
