//! Agent DNA domain model (spec.md §3 "Agent DNA (B)").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Closed set of agent specializations, replacing the source's free-form
/// `agent_type` strings (spec.md §9 redesign note on dynamic dict-based DNA).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    /// Code generation and modification tasks.
    Code,
    /// Web search and scraping tasks.
    Web,
    /// Data analysis and visualization tasks.
    Analysis,
    /// Document processing tasks.
    Document,
    /// Anything not covered by the above.
    General,
}

impl AgentType {
    /// Seed tools for a freshly spawned agent of this type (spec.md §4.B).
    #[must_use]
    pub fn seed_tools(self) -> &'static [&'static str] {
        match self {
            Self::Code => &["code_generator", "file_manager"],
            Self::Web => &["web_search", "web_scraping"],
            Self::Analysis => &["data_analysis", "visualization"],
            Self::Document => &["document_tool", "file_manager"],
            Self::General => &["general_tools"],
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Web => "web",
            Self::Analysis => "analysis",
            Self::Document => "document",
            Self::General => "general",
        }
    }

    #[must_use]
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "code" => Some(Self::Code),
            "web" => Some(Self::Web),
            "analysis" => Some(Self::Analysis),
            "document" => Some(Self::Document),
            "general" => Some(Self::General),
            _ => None,
        }
    }
}

/// Heritable gene values fully determining an agent's behaviour-shaping
/// configuration (spec.md §3 `AgentGenes`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentGenes {
    /// Specialization this agent's genes were seeded/evolved for.
    pub agent_type: AgentType,
    /// Free-form specialization tags (crossover takes the union).
    pub specialization: Vec<String>,
    /// Baseline success rate in `[0, 1]`.
    pub success_rate: f64,
    /// Execution speed multiplier in `[0.5, 2.0]`.
    pub speed_factor: f64,
    /// Output quality multiplier in `[0.5, 2.0]`.
    pub quality_factor: f64,
    /// At most 6 preferred tool names.
    pub preferred_tools: Vec<String>,
    /// Per-tool efficiency multiplier.
    pub tool_efficiency: HashMap<String, f64>,
    /// Learning rate in `[0.01, 0.5]`.
    pub learning_rate: f64,
    /// Resistance to mutation in `[0.5, 1.0]`; higher resists more.
    pub mutation_resistance: f64,
    /// Collaboration skill in `[0, 1]`.
    pub collaboration_skill: f64,
    /// Leadership tendency in `[0, 1]`.
    pub leadership_tendency: f64,
}

impl AgentGenes {
    /// Sample a fresh generation-0 gene set for `agent_type`, per the
    /// initial gene sampling ranges in spec.md §4.B.
    pub(crate) fn random(agent_type: AgentType, rng: &mut impl rand::Rng) -> Self {
        let mut tool_efficiency = HashMap::new();
        let preferred_tools: Vec<String> = agent_type
            .seed_tools()
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        for tool in &preferred_tools {
            tool_efficiency.insert(tool.clone(), rng.gen_range(0.8..=1.0));
        }

        Self {
            agent_type,
            specialization: Vec::new(),
            success_rate: rng.gen_range(0.3..=0.7),
            speed_factor: rng.gen_range(0.8..=1.2),
            quality_factor: rng.gen_range(0.8..=1.2),
            preferred_tools,
            tool_efficiency,
            learning_rate: rng.gen_range(0.05..=0.2),
            mutation_resistance: rng.gen_range(0.7..=0.9),
            collaboration_skill: rng.gen_range(0.5..=0.8),
            leadership_tendency: rng.gen_range(0.2..=0.5),
        }
    }
}

/// A single agent DNA record (spec.md §3 `AgentDNA`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDna {
    /// Unique agent identifier.
    pub agent_id: Uuid,
    /// Lineage depth; strictly greater than every parent's generation.
    pub generation: u32,
    /// 0, 1 (mutation), or 2 (crossover) parent ids.
    pub parent_ids: Vec<Uuid>,
    /// When this agent was created. Immutable.
    pub birth_time: DateTime<Utc>,
    /// Heritable configuration.
    pub genes: AgentGenes,
    /// Number of mutations in this agent's own ancestry step (not lineage total).
    pub mutations_count: u32,
    /// Number of crossovers in this agent's own ancestry step.
    pub crossover_count: u32,
    /// Tasks completed by this agent instance.
    pub tasks_completed: u64,
    /// Running average success rate observed across completed tasks.
    pub total_success_rate: f64,
    /// Whether this agent has been retired from the active population.
    pub retired: bool,
    /// When retired, if ever. Immutable once set.
    pub retired_at: Option<DateTime<Utc>>,
}

impl AgentDna {
    /// Life span in days: birth to retirement, or birth to `now` if still active.
    #[must_use]
    pub fn life_span_days(&self, now: DateTime<Utc>) -> f64 {
        let end = self.retired_at.unwrap_or(now);
        (end - self.birth_time).num_seconds() as f64 / 86_400.0
    }
}

/// Evolutionary history entry (spec.md §3 `EvolutionEvent`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionEvent {
    /// What kind of event this is.
    pub kind: EvolutionEventKind,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Agent the event is about.
    pub agent_id: Uuid,
    /// Parent ids involved, if any.
    pub parent_ids: Option<Vec<Uuid>>,
    /// Human-readable description of what mutated, if applicable.
    pub mutation_details: Option<String>,
    /// Why this agent was selected for the event, if applicable.
    pub selection_reason: Option<String>,
    /// Fitness before the event, if known.
    pub fitness_before: Option<f64>,
    /// Fitness after the event, if known.
    pub fitness_after: Option<f64>,
}

/// Tag for [`EvolutionEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionEventKind {
    Birth,
    Mutation,
    Crossover,
    Learning,
    Retirement,
    Replacement,
}

/// Clamp into an inclusive range, tolerating `lo > hi` by swapping.
pub(crate) fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    value.clamp(lo, hi)
}
