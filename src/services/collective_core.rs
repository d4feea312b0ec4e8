//! Facade implementing the orchestrator-facing contract (spec.md §6).
//!
//! `CollectiveCore` owns one instance of each of the three engines and
//! fans out `record`/`evolve`/`save`/`load` to them. It is the only type
//! in this crate an orchestrator needs to hold.

use std::path::Path;
use uuid::Uuid;

use crate::domain::error::PersistenceError;
use crate::domain::models::agent_dna::AgentType;
use crate::domain::models::prompt_dna::PromptDna;
use crate::services::agent_factory::{EvolutionaryAgentFactory, PopulationStats};
use crate::services::config::CoreConfig;
use crate::services::pheromone_memory::{PheromoneMemorySystem, PheromoneStats};
use crate::services::prompt_engine::PromptEvolutionEngine;

/// Result of [`CollectiveCore::recommend`].
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Recommendation {
    /// Best-known solution patterns for the task type, most promising first.
    pub patterns: Vec<String>,
    /// Best-known agent combination for the task type, if any.
    pub agent_combo: Option<String>,
    /// Best-known tools for the task type.
    pub tools: Vec<String>,
    /// Confidence in `[0, 1]`; 0 if the task type is unseen.
    pub confidence: f64,
}

/// The outcome of one completed task, reported back to the core by the
/// orchestrator via [`CollectiveCore::record`].
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// Task type, e.g. `"programming"`.
    pub task_type: String,
    /// Solution pattern used, e.g. `"python_script"`.
    pub solution_pattern: String,
    /// Agent combination used, e.g. `"CodeAgent"`.
    pub agent_combination: String,
    /// Tool names used.
    pub tools_used: Vec<String>,
    /// Agent that executed the task, if known to the factory.
    pub agent_id: Option<Uuid>,
    /// Prompt used for the task, if known to the prompt engine.
    pub prompt_id: Option<Uuid>,
    /// Whether the task succeeded.
    pub success: bool,
    /// Quality score in `[0, 1]`, used only when `prompt_id` is set.
    pub quality_score: f64,
    /// Execution duration in seconds.
    pub duration_secs: f64,
}

/// Summary of one [`CollectiveCore::evolve`] call.
#[derive(Debug, Clone)]
pub struct EvolveReport {
    /// Agent population diagnostics after evolving.
    pub population_stats: PopulationStats,
    /// Prompt population size after evolving.
    pub prompt_population_size: usize,
}

/// Aggregated diagnostics across all three engines.
#[derive(Debug, Clone)]
pub struct CoreStats {
    /// Pheromone memory diagnostics.
    pub pheromones: PheromoneStats,
    /// Agent population diagnostics.
    pub population: PopulationStats,
    /// Current prompt population size.
    pub prompt_population_size: usize,
}

/// Owns the pheromone memory, agent factory, and prompt engine, and
/// implements the single contract an orchestrator is expected to use.
pub struct CollectiveCore {
    pheromones: PheromoneMemorySystem,
    agents: EvolutionaryAgentFactory,
    prompts: PromptEvolutionEngine,
}

impl CollectiveCore {
    /// Construct a fresh core under `storage_dir`, with each engine owning
    /// its own subdirectory (spec.md §6's "one directory per component").
    #[must_use]
    pub fn new(config: CoreConfig, storage_dir: impl AsRef<Path>) -> Self {
        let dir = storage_dir.as_ref();
        Self {
            pheromones: PheromoneMemorySystem::new(config.pheromone, dir.join("pheromones")),
            agents: EvolutionaryAgentFactory::new(config.agents, dir.join("agents")),
            prompts: PromptEvolutionEngine::new(config.prompts, dir.join("prompts")),
        }
    }

    /// Best-known approach for `task_type`, derived from pheromone memory.
    #[must_use]
    pub fn recommend(&self, task_type: &str) -> Recommendation {
        let attempts = self.pheromones.task_total_attempts(task_type);
        if attempts == 0 {
            return Recommendation::default();
        }

        let patterns = self.pheromones.get_best_solution_patterns(task_type, 3);
        let agent_combo = self.pheromones.get_best_agent_combination(task_type);
        let tools = self.pheromones.get_best_tools(task_type, 5);
        let overall_success_rate = self.pheromones.task_success_rate(task_type).unwrap_or(0.0);
        let confidence = ((attempts as f64 / 10.0).min(1.0) + overall_success_rate) / 2.0;

        Recommendation { patterns, agent_combo, tools, confidence }
    }

    /// Spawn a new agent of `agent_type` (from the agent factory).
    pub fn spawn_agent(&self, agent_type: AgentType, specialization: Vec<String>) -> crate::domain::models::agent_dna::AgentDna {
        self.agents.spawn_agent(agent_type, specialization)
    }

    /// Fittest known prompt for `agent_type` (from the prompt engine).
    /// `task_type` is accepted for interface symmetry with spec.md §6 but
    /// the source's prompt fitness is not task-type-scoped.
    pub fn get_best_prompt(&self, agent_type: AgentType, task_type: Option<&str>) -> PromptDna {
        self.prompts.get_best_prompt(agent_type, task_type)
    }

    /// Deterministically render `dna` into prompt text.
    #[must_use]
    pub fn render_prompt(&self, dna: &PromptDna) -> String {
        self.prompts.render_prompt(dna)
    }

    /// Fan a completed task's outcome out to the pheromone memory, agent
    /// factory, and prompt engine (spec.md §6 `record`).
    pub fn record(&self, outcome: TaskOutcome) {
        self.pheromones.record_solution_success(
            &outcome.task_type,
            &outcome.solution_pattern,
            &outcome.agent_combination,
            &outcome.tools_used,
            outcome.success,
        );

        if let Some(agent_id) = outcome.agent_id {
            self.agents.update_agent_performance(agent_id, outcome.success, outcome.duration_secs);
        }

        if let Some(prompt_id) = outcome.prompt_id {
            self.prompts.record_prompt_performance(
                prompt_id,
                outcome.task_type,
                outcome.success,
                outcome.quality_score,
                outcome.duration_secs,
                None,
                None,
                None,
                None,
            );
        }
    }

    /// Run one generation step across all three engines (spec.md §6
    /// `evolve`): `evaporate_pheromones`, `evolve_population`, `evolve_prompts`.
    pub fn evolve(&self) -> EvolveReport {
        self.pheromones.evaporate_pheromones();
        self.agents.evolve_population(false);
        self.prompts.evolve_prompts(None);

        EvolveReport {
            population_stats: self.agents.get_population_stats(),
            prompt_population_size: self.prompts_population_size(),
        }
    }

    fn prompts_population_size(&self) -> usize {
        // get_population_stats has no prompt-engine equivalent in spec.md;
        // approximate via get_best_prompt's population by reusing evolve's
        // own bookkeeping would require exposing internal state, so the
        // prompt engine exposes a lightweight count instead.
        self.prompts.population_size()
    }

    /// Aggregated diagnostics across all three engines (spec.md §6 `stats`).
    #[must_use]
    pub fn stats(&self) -> CoreStats {
        CoreStats {
            pheromones: self.pheromones.get_statistics(),
            population: self.agents.get_population_stats(),
            prompt_population_size: self.prompts_population_size(),
        }
    }

    /// Persist all three engines (spec.md §6's file layout). `dir` must be
    /// the same directory this core was constructed or loaded with: each
    /// engine already owns its absolute subdirectory path, fixed at
    /// construction, rather than re-deriving it from this call.
    pub fn save(&self, _dir: &Path) -> Result<(), PersistenceError> {
        self.pheromones.save()?;
        self.agents.save()?;
        self.prompts.save()
    }

    /// Load a core previously saved under `dir`.
    #[must_use]
    pub fn load(dir: &Path, config: CoreConfig) -> Self {
        Self {
            pheromones: PheromoneMemorySystem::load(dir.join("pheromones"), config.pheromone),
            agents: EvolutionaryAgentFactory::load(dir.join("agents"), config.agents),
            prompts: PromptEvolutionEngine::load(dir.join("prompts"), config.prompts),
        }
    }
}
