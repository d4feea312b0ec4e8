//! Prompt DNA domain model (spec.md §3 "Prompt DNA (C)").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent_dna::AgentType;

/// Stylistic register of a rendered prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Professional,
    Friendly,
    Technical,
    Creative,
    Formal,
}

impl Tone {
    pub(crate) const ALL: [Self; 5] = [
        Self::Professional,
        Self::Friendly,
        Self::Technical,
        Self::Creative,
        Self::Formal,
    ];

    pub(crate) fn modifier(self) -> &'static str {
        match self {
            Self::Professional => "Respond in a professional, business-appropriate tone.",
            Self::Friendly => "Respond in a warm, approachable tone.",
            Self::Technical => "Respond with precise technical terminology.",
            Self::Creative => "Feel free to use creative, original phrasing.",
            Self::Formal => "Respond with formal, measured language.",
        }
    }
}

/// How much detail a rendered prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    Brief,
    Medium,
    Detailed,
    Comprehensive,
}

impl Verbosity {
    pub(crate) const ALL: [Self; 4] = [Self::Brief, Self::Medium, Self::Detailed, Self::Comprehensive];

    pub(crate) fn modifier(self) -> &'static str {
        match self {
            Self::Brief => "Keep the response brief and to the point.",
            Self::Medium => "Provide a moderate amount of detail.",
            Self::Detailed => "Provide a detailed, thorough response.",
            Self::Comprehensive => "Provide a comprehensive response covering edge cases.",
        }
    }
}

/// How much latitude a rendered prompt gives for novel solutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Creativity {
    Conservative,
    Balanced,
    Creative,
    Innovative,
}

impl Creativity {
    pub(crate) const ALL: [Self; 4] = [Self::Conservative, Self::Balanced, Self::Creative, Self::Innovative];
}

/// Heritable, structured prompt configuration (spec.md §3 `PromptGenes`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptGenes {
    /// The prompt's opening role statement.
    pub role_definition: String,
    /// The task instructions section.
    pub task_instructions: String,
    /// Description of the expected output format.
    pub output_format: String,
    /// Constraint sentences, each rendered as a bullet.
    pub constraints: Vec<String>,
    /// Stylistic register.
    pub tone: Tone,
    /// Requested level of detail.
    pub verbosity: Verbosity,
    /// Requested latitude for novel solutions.
    pub creativity: Creativity,
    /// Worked examples, rendered up to 3.
    pub examples: Vec<String>,
    /// Instructions for handling errors/edge cases.
    pub error_handling: String,
    /// Quality bar sentences, each rendered as a bullet.
    pub quality_criteria: Vec<String>,
    /// How strongly to weave prior context into the response, `[0, 1]`.
    pub context_awareness: f64,
    /// How strongly to adapt to the requesting user, `[0, 1]`.
    pub user_adaptation: f64,
    /// How strongly to specialize phrasing to the task type, `[0, 1]`.
    pub task_specialization: f64,
}

/// A single prompt DNA record (spec.md §3 `PromptDNA`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDna {
    /// Unique prompt identifier.
    pub prompt_id: Uuid,
    /// Agent type this prompt was built for.
    pub agent_type: AgentType,
    /// Lineage depth; strictly greater than every parent's generation.
    pub generation: u32,
    /// 0, 1, or 2 parent ids.
    pub parent_ids: Vec<Uuid>,
    /// When this prompt was created.
    pub birth_time: DateTime<Utc>,
    /// Heritable prompt configuration.
    pub genes: PromptGenes,
    /// Number of times this prompt has been used and scored.
    pub usage_count: u64,
    /// Running success rate in `[0, 1]`.
    pub success_rate: f64,
    /// Running average quality score in `[0, 1]`.
    pub avg_quality_score: f64,
    /// Running average execution time, in seconds.
    pub avg_execution_time: f64,
    /// Number of mutations applied to produce this prompt.
    pub mutations_count: u32,
    /// Number of crossovers applied to produce this prompt.
    pub crossover_count: u32,
}

/// One recorded use of a prompt (spec.md §3 `PromptPerformance`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptPerformance {
    /// Which prompt this record is about.
    pub prompt_id: Uuid,
    /// Task type the prompt was used for.
    pub task_type: String,
    /// Whether the task succeeded.
    pub success: bool,
    /// Quality score in `[0, 1]`.
    pub quality_score: f64,
    /// Execution time, in seconds.
    pub execution_time: f64,
    /// When this record was created.
    pub timestamp: DateTime<Utc>,
    /// Optional free-text user feedback.
    pub user_feedback: Option<String>,
    /// Optional error description, if the task failed.
    pub error_details: Option<String>,
    /// Optional length of the generated output, in characters.
    pub output_length: Option<usize>,
    /// Optional `[0, 1]` score of how relevant the output was to context.
    pub context_relevance: Option<f64>,
}
