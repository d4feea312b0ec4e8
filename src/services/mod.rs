//! Application services: the three evolutionary engines plus the facade
//! an orchestrator talks to.

pub mod agent_factory;
pub mod collective_core;
pub mod config;
pub mod pheromone_memory;
pub mod prompt_engine;
