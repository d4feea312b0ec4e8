//! Record types and closed enumerations shared by all three engines.

pub mod agent_dna;
pub mod pheromone;
pub mod prompt_dna;
