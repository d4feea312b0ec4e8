//! KittyCore collective-intelligence core.
//!
//! Three tightly-coupled evolutionary subsystems that constitute the
//! self-improvement engine behind a multi-agent orchestrator:
//!
//! - [`services::pheromone_memory`] — ant-colony-style reinforcement memory.
//! - [`services::agent_factory`] — an evolving population of agent DNA.
//! - [`services::prompt_engine`] — an evolving population of prompt DNA.
//!
//! [`services::collective_core::CollectiveCore`] is the single facade an
//! orchestrator talks to; it fans every recorded task outcome out to all
//! three subsystems and answers recommendation queries from them. The core
//! never executes tasks, calls an LLM, or performs network I/O — it is a
//! pure decision-and-learning substrate that persists only its own
//! populations and history.

pub mod domain;
pub mod services;

pub use domain::error::PersistenceError;
pub use domain::models::agent_dna::{AgentDna, AgentGenes, AgentType, EvolutionEvent, EvolutionEventKind};
pub use domain::models::pheromone::{AgentPheromone, PheromoneTrail, TaskPheromones};
pub use domain::models::prompt_dna::{
    Creativity, PromptDna, PromptGenes, PromptPerformance, Tone, Verbosity,
};
pub use services::agent_factory::{AgentFactoryConfig, EvolutionaryAgentFactory, PopulationStats};
pub use services::collective_core::{CollectiveCore, CoreStats, EvolveReport, Recommendation, TaskOutcome};
pub use services::config::CoreConfig;
pub use services::pheromone_memory::{PheromoneConfig, PheromoneMemorySystem, PheromoneStats};
pub use services::prompt_engine::{PromptEngineConfig, PromptEvolutionEngine};
