//! Configuration for the three engines (spec.md §6 "Configuration").
//!
//! Per the redesign note on module-level singletons, the core owns no
//! global config loader, env binding, or CLI flags — the orchestrator
//! constructs these structs directly (or deserializes them from wherever it
//! keeps its own configuration) and passes them to the engine constructors.

use serde::{Deserialize, Serialize};

/// Tuning knobs for [`crate::services::pheromone_memory::PheromoneMemorySystem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PheromoneConfig {
    /// Fraction of strength lost per evaporation pass.
    pub evaporation_rate: f64,
    /// Multiplier applied to strength on success.
    pub reinforcement_factor: f64,
    /// Floor strength before a trail is deleted.
    pub min_strength: f64,
    /// Idle-deletion threshold, in days.
    pub expiry_days: i64,
}

impl Default for PheromoneConfig {
    fn default() -> Self {
        Self {
            evaporation_rate: 0.1,
            reinforcement_factor: 1.5,
            min_strength: 0.1,
            expiry_days: 7,
        }
    }
}

/// Tuning knobs for [`crate::services::agent_factory::EvolutionaryAgentFactory`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentFactoryConfig {
    /// Hard cap on the active population.
    pub max_population: usize,
    /// Refill floor for the active population.
    pub min_population: usize,
    /// Base mutation probability.
    pub mutation_rate: f64,
    /// Base crossover probability.
    pub crossover_rate: f64,
    /// Informational only; never enforced as a retirement trigger
    /// (spec.md §9 open question).
    pub retirement_age_days: i64,
    /// Seed for the engine's injected RNG. `None` uses OS entropy.
    pub rng_seed: Option<u64>,
}

impl Default for AgentFactoryConfig {
    fn default() -> Self {
        Self {
            max_population: 20,
            min_population: 5,
            mutation_rate: 0.1,
            crossover_rate: 0.3,
            retirement_age_days: 30,
            rng_seed: None,
        }
    }
}

/// Tuning knobs for [`crate::services::prompt_engine::PromptEvolutionEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptEngineConfig {
    /// Hard cap on the prompt population.
    pub max_population: usize,
    /// Refill floor for the prompt population.
    pub min_population: usize,
    /// Base mutation probability.
    pub mutation_rate: f64,
    /// Base crossover probability.
    pub crossover_rate: f64,
    /// Seed for the engine's injected RNG. `None` uses OS entropy.
    pub rng_seed: Option<u64>,
}

impl Default for PromptEngineConfig {
    fn default() -> Self {
        Self {
            max_population: 50,
            min_population: 10,
            mutation_rate: 0.15,
            crossover_rate: 0.25,
            rng_seed: None,
        }
    }
}

/// Aggregates all three engines' configuration for a single
/// [`crate::services::collective_core::CollectiveCore`] instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Pheromone memory settings.
    pub pheromone: PheromoneConfig,
    /// Agent factory settings.
    pub agents: AgentFactoryConfig,
    /// Prompt engine settings.
    pub prompts: PromptEngineConfig,
}
