//! End-to-end scenarios from spec.md §8 ("Testable Properties").

use chrono::Utc;
use kittycore_core::{
    AgentDna, AgentFactoryConfig, AgentGenes, AgentType, CollectiveCore, CoreConfig, EvolutionaryAgentFactory, PromptEngineConfig,
    PromptEvolutionEngine, TaskOutcome,
};
use std::collections::HashMap;
use uuid::Uuid;

fn code_agent(success_rate: f64, tasks_completed: u64, total_success_rate: f64) -> AgentDna {
    AgentDna {
        agent_id: Uuid::new_v4(),
        generation: 0,
        parent_ids: Vec::new(),
        birth_time: Utc::now(),
        genes: AgentGenes {
            agent_type: AgentType::Code,
            specialization: Vec::new(),
            success_rate,
            speed_factor: 1.0,
            quality_factor: 1.0,
            preferred_tools: Vec::new(),
            tool_efficiency: HashMap::new(),
            learning_rate: 0.1,
            mutation_resistance: 0.8,
            collaboration_skill: 0.7,
            leadership_tendency: 0.3,
        },
        mutations_count: 0,
        crossover_count: 0,
        tasks_completed,
        total_success_rate,
        retired: false,
        retired_at: None,
    }
}

#[test]
fn cold_start_learning_recommends_the_reinforced_pattern() {
    let dir = tempfile::tempdir().unwrap();
    let core = CollectiveCore::new(CoreConfig::default(), dir.path());

    for _ in 0..5 {
        core.record(TaskOutcome {
            task_type: "programming".to_string(),
            solution_pattern: "python_script".to_string(),
            agent_combination: "CodeAgent".to_string(),
            tools_used: vec!["code_generator".to_string(), "file_manager".to_string()],
            agent_id: None,
            prompt_id: None,
            success: true,
            quality_score: 0.0,
            duration_secs: 0.0,
        });
    }

    let recommendation = core.recommend("programming");
    assert_eq!(recommendation.patterns.first().map(String::as_str), Some("python_script"));
    assert_eq!(recommendation.agent_combo.as_deref(), Some("CodeAgent"));
    assert!(recommendation.tools.contains(&"code_generator".to_string()));
    assert!(recommendation.tools.contains(&"file_manager".to_string()));
    assert!(recommendation.confidence >= 0.5);
}

#[test]
fn repeated_failures_decay_and_evict_the_trail() {
    let dir = tempfile::tempdir().unwrap();
    let core = CollectiveCore::new(CoreConfig::default(), dir.path());

    let outcome = |success: bool| TaskOutcome {
        task_type: "programming".to_string(),
        solution_pattern: "python_script".to_string(),
        agent_combination: "CodeAgent".to_string(),
        tools_used: vec!["code_generator".to_string(), "file_manager".to_string()],
        agent_id: None,
        prompt_id: None,
        success,
        quality_score: 0.0,
        duration_secs: 0.0,
    };

    for _ in 0..5 {
        core.record(outcome(true));
    }
    for _ in 0..20 {
        core.record(outcome(false));
    }

    for _ in 0..50 {
        if core.recommend("programming").patterns.is_empty() {
            break;
        }
        core.evolve();
    }

    assert!(core.recommend("programming").patterns.is_empty());
}

#[test]
fn crossover_child_inherits_from_both_parents() {
    let dir = tempfile::tempdir().unwrap();
    let factory = EvolutionaryAgentFactory::new(AgentFactoryConfig::default(), dir.path());

    let a = code_agent(0.8, 10, 1.0);
    let b = code_agent(0.3, 10, 0.0);

    let child = factory.crossover_agents(&a, &b);

    assert_eq!(child.generation, a.generation.max(b.generation) + 1);
    let mut parents = child.parent_ids.clone();
    parents.sort();
    let mut expected = vec![a.agent_id, b.agent_id];
    expected.sort();
    assert_eq!(parents, expected);

    let expected_success_rate = 0.3 * b.genes.success_rate + 0.7 * a.genes.success_rate;
    assert!((child.genes.success_rate - expected_success_rate).abs() < 1e-9);
}

#[test]
fn zero_mutation_rate_never_mutates() {
    let dir = tempfile::tempdir().unwrap();
    let config = AgentFactoryConfig { mutation_rate: 0.0, ..AgentFactoryConfig::default() };
    let factory = EvolutionaryAgentFactory::new(config, dir.path());

    let mut agent = code_agent(0.5, 0, 0.0);
    agent.genes.mutation_resistance = 1.0;

    for _ in 0..1000 {
        let child = factory.mutate_agent(&agent, 1.0);
        assert_eq!(child.agent_id, agent.agent_id);
        assert_eq!(child.generation, agent.generation);
        assert_eq!(child.mutations_count, agent.mutations_count);
    }
}

#[test]
fn fresh_prompt_has_boundary_fitness_then_rises_on_success() {
    let dir = tempfile::tempdir().unwrap();
    let engine = PromptEvolutionEngine::new(PromptEngineConfig::default(), dir.path());

    let prompt = engine.create_initial_prompt(AgentType::Code);
    assert!((PromptEvolutionEngine::prompt_fitness(&prompt) - 0.5).abs() < 1e-9);

    engine.record_prompt_performance(prompt.prompt_id, "programming", true, 1.0, 0.0, None, None, None, None);
    let updated = engine.get_best_prompt(AgentType::Code, None);
    assert_eq!(updated.prompt_id, prompt.prompt_id);
    assert!(PromptEvolutionEngine::prompt_fitness(&updated) >= 0.8);
}

#[test]
fn save_then_load_preserves_population_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let config = CoreConfig::default();
    let core = CollectiveCore::new(config.clone(), dir.path());

    let agent_types = [AgentType::Code, AgentType::Web, AgentType::Analysis];
    let mut agents = Vec::new();
    let mut prompts = Vec::new();
    for agent_type in agent_types {
        agents.push(core.spawn_agent(agent_type, Vec::new()));
        prompts.push(core.get_best_prompt(agent_type, None));
    }

    for (agent, prompt) in agents.iter().zip(prompts.iter()) {
        for _ in 0..5 {
            core.record(TaskOutcome {
                task_type: "programming".to_string(),
                solution_pattern: "python_script".to_string(),
                agent_combination: "CodeAgent".to_string(),
                tools_used: vec!["code_generator".to_string()],
                agent_id: Some(agent.agent_id),
                prompt_id: Some(prompt.prompt_id),
                success: true,
                quality_score: 0.8,
                duration_secs: 1.0,
            });
        }
    }

    core.save(dir.path()).expect("save should succeed");
    let before = core.stats();

    let core2 = CollectiveCore::load(dir.path(), config);
    let after = core2.stats();

    assert_eq!(before.population.total, after.population.total);
    assert_eq!(before.population.max_generation, after.population.max_generation);
    assert_eq!(before.population.total_mutations, after.population.total_mutations);
    assert_eq!(before.population.total_crossovers, after.population.total_crossovers);
}
