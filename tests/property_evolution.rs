//! Property tests for the genetic-algorithm invariants from spec.md §8.

use kittycore_core::{AgentFactoryConfig, AgentType, EvolutionaryAgentFactory, PromptEngineConfig, PromptEvolutionEngine};
use proptest::prelude::*;

fn agent_type_strategy() -> impl Strategy<Value = AgentType> {
    prop_oneof![
        Just(AgentType::Code),
        Just(AgentType::Web),
        Just(AgentType::Analysis),
        Just(AgentType::Document),
        Just(AgentType::General),
    ]
}

proptest! {
    /// Agent-DNA fitness is always clamped into `[0, 1]`, including for
    /// agents with extreme tenure or success history.
    #[test]
    fn agent_fitness_is_always_in_unit_range(
        agent_type in agent_type_strategy(),
        tasks_completed in 0u64..10_000,
        total_success_rate in -1.0f64..2.0,
        age_days in 0i64..5000,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let factory = EvolutionaryAgentFactory::new(AgentFactoryConfig::default(), dir.path());
        let base = factory.spawn_agent(agent_type, Vec::new());

        let mut agent = base;
        agent.tasks_completed = tasks_completed;
        agent.total_success_rate = total_success_rate;
        agent.birth_time = chrono::Utc::now() - chrono::Duration::days(age_days);

        let fitness = EvolutionaryAgentFactory::fitness(&agent);
        prop_assert!((0.0..=1.0).contains(&fitness), "fitness {} out of range", fitness);
    }

    /// Prompt-DNA fitness is always clamped into `[0, 1]`, including for
    /// prompts with extreme recorded performance.
    #[test]
    fn prompt_fitness_is_always_in_unit_range(
        agent_type in agent_type_strategy(),
        usage_count in 0u64..10_000,
        success_rate in -1.0f64..2.0,
        avg_quality_score in -1.0f64..2.0,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let engine = PromptEvolutionEngine::new(PromptEngineConfig::default(), dir.path());
        let mut prompt = engine.create_initial_prompt(agent_type);
        prompt.usage_count = usage_count;
        prompt.success_rate = success_rate;
        prompt.avg_quality_score = avg_quality_score;

        let fitness = PromptEvolutionEngine::prompt_fitness(&prompt);
        prop_assert!((0.0..=1.0).contains(&fitness), "fitness {} out of range", fitness);
    }

    /// A mutated or crossed-over agent's generation always strictly exceeds
    /// every parent's generation.
    #[test]
    fn agent_generation_strictly_increases(agent_type in agent_type_strategy(), strength in 0.0f64..2.0) {
        let dir = tempfile::tempdir().unwrap();
        let factory = EvolutionaryAgentFactory::new(AgentFactoryConfig::default(), dir.path());

        let parent = factory.spawn_agent(agent_type, Vec::new());
        let mutated = factory.mutate_agent(&parent, strength);
        prop_assert!(mutated.generation > parent.generation || mutated.agent_id == parent.agent_id);

        let other = factory.spawn_agent(agent_type, Vec::new());
        let child = factory.crossover_agents(&parent, &other);
        prop_assert!(child.generation > parent.generation.max(other.generation));
    }

    /// A mutated or crossed-over prompt's generation always strictly exceeds
    /// every parent's generation.
    #[test]
    fn prompt_generation_strictly_increases(agent_type in agent_type_strategy(), strength in 0.0f64..2.0) {
        let dir = tempfile::tempdir().unwrap();
        let engine = PromptEvolutionEngine::new(PromptEngineConfig::default(), dir.path());

        let parent = engine.create_initial_prompt(agent_type);
        let mutated = engine.mutate_prompt(&parent, strength);
        prop_assert!(mutated.generation > parent.generation || mutated.prompt_id == parent.prompt_id);

        let other = engine.create_initial_prompt(agent_type);
        let child = engine.crossover_prompts(&parent, &other);
        prop_assert!(child.generation > parent.generation.max(other.generation));
    }

    /// After any sequence of spawns, the active population stays within the
    /// configured [min_population, max_population] bounds.
    #[test]
    fn population_stays_within_configured_bounds(spawn_count in 1usize..40) {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentFactoryConfig { max_population: 10, min_population: 3, ..AgentFactoryConfig::default() };
        let factory = EvolutionaryAgentFactory::new(config, dir.path());

        for i in 0..spawn_count {
            let agent_type = match i % 5 {
                0 => AgentType::Code,
                1 => AgentType::Web,
                2 => AgentType::Analysis,
                3 => AgentType::Document,
                _ => AgentType::General,
            };
            factory.spawn_agent(agent_type, Vec::new());
        }

        let stats = factory.get_population_stats();
        prop_assert!(stats.active >= 3 && stats.active <= 10, "active population {} out of bounds", stats.active);
    }
}
