//! Evolutionary agent factory (spec.md §4.B).
//!
//! Maintains a population of agent DNAs whose average fitness increases
//! over time under the selection pressure of real task outcomes: the
//! fittest breed, the weakest are replaced, and the population size is
//! kept within configured bounds.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::error::PersistenceError;
use crate::domain::models::agent_dna::{clamp, AgentDna, AgentGenes, AgentType, EvolutionEvent, EvolutionEventKind};

pub use crate::services::config::AgentFactoryConfig;

/// Population-wide `60`-day "old age" cutoff used by [`population_health`],
/// deliberately unrelated to `retirement_age_days` (spec.md §9 open
/// question: the source never documents the relationship, so this crate
/// keeps them as two independent constants).
const HEALTH_OLD_AGE_DAYS: f64 = 60.0;

/// Maximum evolution events retained in memory (spec.md §5).
const MAX_EVENTS_IN_MEMORY: usize = 1000;
/// Maximum evolution events written to disk by `save` (spec.md §6).
const MAX_EVENTS_PERSISTED: usize = 100;

struct FactoryState {
    rng: StdRng,
    active: HashMap<Uuid, AgentDna>,
    retired: HashMap<Uuid, AgentDna>,
    events: VecDeque<EvolutionEvent>,
}

impl FactoryState {
    fn record_event(&mut self, event: EvolutionEvent) {
        self.events.push_back(event);
        while self.events.len() > MAX_EVENTS_IN_MEMORY {
            self.events.pop_front();
        }
    }

    fn retire(&mut self, agent_id: Uuid, now: DateTime<Utc>, reason: &str, fitness_before: f64) {
        if let Some(mut agent) = self.active.remove(&agent_id) {
            agent.retired = true;
            agent.retired_at = Some(now);
            self.retired.insert(agent_id, agent);
            self.record_event(EvolutionEvent {
                kind: EvolutionEventKind::Retirement,
                timestamp: now,
                agent_id,
                parent_ids: None,
                mutation_details: None,
                selection_reason: Some(reason.to_string()),
                fitness_before: Some(fitness_before),
                fitness_after: None,
            });
        }
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedPopulation {
    active_agents: HashMap<Uuid, AgentDna>,
    retired_agents: HashMap<Uuid, AgentDna>,
    settings: AgentFactoryConfig,
}

/// Population statistics returned by [`EvolutionaryAgentFactory::get_population_stats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationStats {
    /// Active + retired agent count.
    pub total: usize,
    /// Active agent count.
    pub active: usize,
    /// Retired agent count.
    pub retired: usize,
    /// Highest generation number among active agents.
    pub max_generation: u32,
    /// Average generation number among active agents.
    pub avg_generation: f64,
    /// Average gene-level success rate among active agents.
    pub avg_success_rate: f64,
    /// Highest gene-level success rate among active agents.
    pub best_success_rate: f64,
    /// Lowest gene-level success rate among active agents.
    pub worst_success_rate: f64,
    /// Number of distinct specialization tags among active agents.
    pub unique_specializations: usize,
    /// Average pairwise genetic distance among active agents, `[0, ~)`.
    pub genetic_diversity: f64,
    /// Total mutations across active and retired agents.
    pub total_mutations: u32,
    /// Total crossovers across active and retired agents.
    pub total_crossovers: u32,
    /// Composite `[0, 1]` population health score.
    pub population_health: f64,
}

/// Owns the active/retired agent-DNA population and its evolution history.
pub struct EvolutionaryAgentFactory {
    config: AgentFactoryConfig,
    state: Mutex<FactoryState>,
    storage_dir: std::path::PathBuf,
}

impl EvolutionaryAgentFactory {
    /// Construct an empty factory that persists under `storage_dir`.
    #[must_use]
    pub fn new(config: AgentFactoryConfig, storage_dir: impl Into<std::path::PathBuf>) -> Self {
        let rng = config.rng_seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self {
            config,
            state: Mutex::new(FactoryState {
                rng,
                active: HashMap::new(),
                retired: HashMap::new(),
                events: VecDeque::new(),
            }),
            storage_dir: storage_dir.into(),
        }
    }

    /// Fitness function from spec.md §4.B, clamped to `[0, 1]`.
    #[must_use]
    pub fn fitness(agent: &AgentDna) -> f64 {
        let now = Utc::now();
        let genes = &agent.genes;
        let genetic_base = 0.5 * genes.success_rate
            + 0.1 * (genes.speed_factor - 0.5)
            + 0.2 * (genes.quality_factor - 0.5)
            + 0.2 * genes.collaboration_skill;
        let performance = if agent.tasks_completed > 0 {
            agent.total_success_rate
        } else {
            genes.success_rate
        };
        let experience_bonus = (0.01 * agent.tasks_completed as f64).min(0.1);
        let age_penalty = (0.001 * agent.life_span_days(now)).min(0.05);

        (0.4 * genetic_base + 0.6 * performance + experience_bonus - age_penalty).clamp(0.0, 1.0)
    }

    /// Genetic distance between two agents' genes, used for the diversity metric.
    #[must_use]
    pub fn genetic_distance(a: &AgentDna, b: &AgentDna) -> f64 {
        let ga = &a.genes;
        let gb = &b.genes;
        let sa: HashSet<&String> = ga.specialization.iter().collect();
        let sb: HashSet<&String> = gb.specialization.iter().collect();
        let union_len = sa.union(&sb).count();
        let spec_term = if union_len == 0 {
            0.0
        } else {
            let sym_diff = sa.symmetric_difference(&sb).count();
            sym_diff as f64 / union_len as f64
        };

        (ga.success_rate - gb.success_rate).abs()
            + 0.5 * (ga.speed_factor - gb.speed_factor).abs()
            + 0.5 * (ga.quality_factor - gb.quality_factor).abs()
            + 0.3 * (ga.learning_rate - gb.learning_rate).abs()
            + 0.3 * spec_term
    }

    fn tool_pool() -> &'static [&'static str] {
        &[
            "code_generator",
            "file_manager",
            "web_search",
            "web_scraping",
            "data_analysis",
            "visualization",
            "document_tool",
            "general_tools",
        ]
    }

    fn new_random_agent(agent_type: AgentType, specialization: Vec<String>, rng: &mut StdRng, now: DateTime<Utc>) -> AgentDna {
        let mut genes = AgentGenes::random(agent_type, rng);
        genes.specialization = specialization;
        AgentDna {
            agent_id: Uuid::new_v4(),
            generation: 0,
            parent_ids: Vec::new(),
            birth_time: now,
            genes,
            mutations_count: 0,
            crossover_count: 0,
            tasks_completed: 0,
            total_success_rate: 0.0,
            retired: false,
            retired_at: None,
        }
    }

    fn mutate_internal(parent: &AgentDna, mutation_strength: f64, mutation_rate: f64, rng: &mut StdRng, now: DateTime<Utc>) -> AgentDna {
        // spec.md §4.B reads "fires only if U(0,1) > rate*strength/resistance", which
        // would make mutation_rate = 0.0 fire on almost every draw - the opposite of
        // Testable Property 4 ("mutation_rate = 0.0 ... unchanged every time"). Read as
        // a standard probability gate (fires if U < rate*strength/resistance) instead.
        let gate = (mutation_rate * mutation_strength / parent.genes.mutation_resistance).clamp(0.0, 1.0);
        if !rng.gen_bool(gate) {
            return parent.clone();
        }

        let mut genes = parent.genes.clone();
        let mut details = Vec::new();

        if rng.gen_bool(0.7) {
            let delta = if rng.gen_bool(0.5) { 0.1 } else { -0.1 };
            genes.success_rate = clamp(genes.success_rate + delta, 0.0, 1.0);
            details.push("success_rate".to_string());
        }
        if rng.gen_bool(0.5) {
            let delta = if rng.gen_bool(0.5) { 0.2 } else { -0.2 };
            genes.speed_factor = clamp(genes.speed_factor + delta, 0.5, 2.0);
            details.push("speed_factor".to_string());
        }
        if rng.gen_bool(0.5) {
            let delta = if rng.gen_bool(0.5) { 0.15 } else { -0.15 };
            genes.quality_factor = clamp(genes.quality_factor + delta, 0.5, 2.0);
            details.push("quality_factor".to_string());
        }
        if rng.gen_bool(0.3) {
            if genes.preferred_tools.len() < 5 {
                let candidate = Self::tool_pool().iter().find(|t| !genes.preferred_tools.iter().any(|p| p == *t));
                if let Some(tool) = candidate {
                    genes.preferred_tools.push((*tool).to_string());
                    genes.tool_efficiency.insert((*tool).to_string(), rng.gen_range(0.6..=1.0));
                    details.push(format!("added tool {tool}"));
                }
            } else if let Some(tool) = genes.preferred_tools.first().cloned() {
                let delta = rng.gen_range(-0.1..=0.2);
                let efficiency = genes.tool_efficiency.entry(tool.clone()).or_insert(0.8);
                *efficiency = clamp(*efficiency + delta, 0.0, 1.5);
                details.push(format!("adjusted tool {tool} efficiency"));
            }
        }
        if rng.gen_bool(0.4) {
            let delta = if rng.gen_bool(0.5) { 0.1 } else { -0.1 };
            genes.collaboration_skill = clamp(genes.collaboration_skill + delta, 0.0, 1.0);
            details.push("collaboration_skill".to_string());
        }

        AgentDna {
            agent_id: Uuid::new_v4(),
            generation: parent.generation + 1,
            parent_ids: vec![parent.agent_id],
            birth_time: now,
            genes,
            mutations_count: parent.mutations_count + 1,
            crossover_count: parent.crossover_count,
            tasks_completed: 0,
            total_success_rate: 0.0,
            retired: false,
            retired_at: None,
        }
    }

    /// Mutate `parent` directly, with no gating, producing a child. Used for
    /// testing property #4 with `mutation_rate = 0.0` (the gate clamps to
    /// `0.0` and the original is returned unchanged) and internally by
    /// `spawn_agent`/`evolve_population`.
    #[must_use]
    pub fn mutate_agent(&self, parent: &AgentDna, mutation_strength: f64) -> AgentDna {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Self::mutate_internal(parent, mutation_strength, self.config.mutation_rate, &mut state.rng, now)
    }

    fn crossover_internal(p1: &AgentDna, p2: &AgentDna, rng: &mut StdRng, now: DateTime<Utc>) -> AgentDna {
        let (better, worse) = if Self::fitness(p1) >= Self::fitness(p2) { (p1, p2) } else { (p2, p1) };

        let mut specialization: Vec<String> = better.genes.specialization.clone();
        for s in &worse.genes.specialization {
            if !specialization.contains(s) {
                specialization.push(s.clone());
            }
        }

        let mut tool_union: Vec<String> = better.genes.preferred_tools.clone();
        for t in &worse.genes.preferred_tools {
            if !tool_union.contains(t) {
                tool_union.push(t.clone());
            }
        }
        let preferred_tools = if tool_union.len() > 6 {
            let mut sampled = Vec::with_capacity(6);
            let mut pool = tool_union.clone();
            for _ in 0..6 {
                let idx = rng.gen_range(0..pool.len());
                sampled.push(pool.remove(idx));
            }
            sampled
        } else {
            tool_union.clone()
        };

        let mut tool_efficiency = HashMap::new();
        for tool in &tool_union {
            let a = better.genes.tool_efficiency.get(tool).copied().unwrap_or(0.0);
            let b = worse.genes.tool_efficiency.get(tool).copied().unwrap_or(0.0);
            tool_efficiency.insert(tool.clone(), a.max(b));
        }

        let genes = AgentGenes {
            agent_type: better.genes.agent_type,
            specialization,
            success_rate: 0.7 * better.genes.success_rate + 0.3 * worse.genes.success_rate,
            speed_factor: 0.6 * better.genes.speed_factor + 0.4 * worse.genes.speed_factor,
            quality_factor: 0.6 * better.genes.quality_factor + 0.4 * worse.genes.quality_factor,
            preferred_tools,
            tool_efficiency,
            learning_rate: (better.genes.learning_rate + worse.genes.learning_rate) / 2.0,
            mutation_resistance: (better.genes.mutation_resistance + worse.genes.mutation_resistance) / 2.0,
            collaboration_skill: better.genes.collaboration_skill.max(worse.genes.collaboration_skill),
            leadership_tendency: (better.genes.leadership_tendency + worse.genes.leadership_tendency) / 2.0,
        };

        AgentDna {
            agent_id: Uuid::new_v4(),
            generation: p1.generation.max(p2.generation) + 1,
            parent_ids: vec![p1.agent_id, p2.agent_id],
            birth_time: now,
            genes,
            mutations_count: 0,
            crossover_count: p1.crossover_count.max(p2.crossover_count) + 1,
            tasks_completed: 0,
            total_success_rate: 0.0,
            retired: false,
            retired_at: None,
        }
    }

    /// Produce a crossover child of `p1` and `p2` directly, per spec.md §4.B.
    #[must_use]
    pub fn crossover_agents(&self, p1: &AgentDna, p2: &AgentDna) -> AgentDna {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Self::crossover_internal(p1, p2, &mut state.rng, now)
    }

    /// Spawn a new agent of `agent_type`. If the population is empty, a
    /// fresh generation-0 agent is created. Otherwise breeds from up to 3
    /// fitness-ranked candidates of matching type (spec.md §4.B).
    pub fn spawn_agent(&self, agent_type: AgentType, specialization: Vec<String>) -> AgentDna {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let child = if state.active.is_empty() {
            Self::new_random_agent(agent_type, specialization, &mut state.rng, now)
        } else {
            let mut candidates: Vec<AgentDna> = state.active.values().filter(|a| a.genes.agent_type == agent_type).cloned().collect();
            candidates.sort_by(|a, b| Self::fitness(b).partial_cmp(&Self::fitness(a)).unwrap_or(std::cmp::Ordering::Equal));
            candidates.truncate(3);

            match candidates.len() {
                0 => Self::new_random_agent(agent_type, specialization, &mut state.rng, now),
                1 => {
                    let parent = candidates[0].clone();
                    Self::mutate_internal(&parent, 1.5, self.config.mutation_rate, &mut state.rng, now)
                }
                _ => {
                    let child = Self::crossover_internal(&candidates[0], &candidates[1], &mut state.rng, now);
                    if state.rng.gen_bool(0.3) {
                        Self::mutate_internal(&child, 1.0, self.config.mutation_rate, &mut state.rng, now)
                    } else {
                        child
                    }
                }
            }
        };

        state.active.insert(child.agent_id, child.clone());
        state.record_event(EvolutionEvent {
            kind: EvolutionEventKind::Birth,
            timestamp: now,
            agent_id: child.agent_id,
            parent_ids: if child.parent_ids.is_empty() { None } else { Some(child.parent_ids.clone()) },
            mutation_details: None,
            selection_reason: Some(format!("spawn_agent({})", agent_type.as_str())),
            fitness_before: None,
            fitness_after: Some(Self::fitness(&child)),
        });

        self.enforce_population_bounds(&mut state, now);
        tracing::info!(agent_id = %child.agent_id, agent_type = agent_type.as_str(), generation = child.generation, "spawned agent");
        child
    }

    fn enforce_population_bounds(&self, state: &mut FactoryState, now: DateTime<Utc>) {
        if state.active.len() > self.config.max_population {
            let surplus = state.active.len() - self.config.max_population;
            let mut ranked: Vec<(Uuid, f64)> = state.active.iter().map(|(id, a)| (*id, Self::fitness(a))).collect();
            ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
            for (id, fitness) in ranked.into_iter().take(surplus) {
                state.retire(id, now, "population_limit", fitness);
            }
        }

        while state.active.len() < self.config.min_population {
            let child = Self::new_random_agent(AgentType::General, Vec::new(), &mut state.rng, now);
            state.record_event(EvolutionEvent {
                kind: EvolutionEventKind::Birth,
                timestamp: now,
                agent_id: child.agent_id,
                parent_ids: None,
                mutation_details: None,
                selection_reason: Some("population_minimum".to_string()),
                fitness_before: None,
                fitness_after: Some(Self::fitness(&child)),
            });
            state.active.insert(child.agent_id, child);
        }
    }

    /// Record the outcome of a task executed by `agent_id` and apply
    /// within-lifetime learning to its `success_rate` gene (spec.md §4.B).
    /// Unknown `agent_id` is a no-op, logged at `warn`.
    pub fn update_agent_performance(&self, agent_id: Uuid, task_success: bool, task_duration_secs: f64) {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let Some(agent) = state.active.get_mut(&agent_id) else {
            tracing::warn!(%agent_id, "update_agent_performance: unknown agent id");
            return;
        };

        agent.tasks_completed += 1;
        let n = agent.tasks_completed as f64;
        let prior_total = agent.total_success_rate * (n - 1.0);
        let success_value = if task_success { 1.0 } else { 0.0 };
        agent.total_success_rate = (prior_total + success_value) / n;

        let before = agent.genes.success_rate;
        let learning_rate = agent.genes.learning_rate;
        agent.genes.success_rate = if task_success {
            clamp(before + learning_rate * 0.1, 0.0, 1.0)
        } else {
            clamp(before - learning_rate * 0.05, 0.0, 1.0)
        };
        let after = agent.genes.success_rate;

        tracing::debug!(%agent_id, task_success, task_duration_secs, "recorded agent task outcome");

        if (after - before).abs() > 0.01 {
            state.record_event(EvolutionEvent {
                kind: EvolutionEventKind::Learning,
                timestamp: now,
                agent_id,
                parent_ids: None,
                mutation_details: None,
                selection_reason: None,
                fitness_before: Some(before),
                fitness_after: Some(after),
            });
        }
    }

    /// Run one generation step: mutate struggling agents, cross over top
    /// performers, retire the replaced, and re-enforce population bounds
    /// (spec.md §4.B). `force` is accepted for API symmetry with
    /// `evolve_prompts`; the source runs this unconditionally whenever it
    /// fires, so `force` has no additional effect here.
    pub fn evolve_population(&self, _force: bool) {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut ranked: Vec<Uuid> = state.active.keys().copied().collect();
        ranked.sort_by(|a, b| {
            let fb = Self::fitness(&state.active[b]);
            let fa = Self::fitness(&state.active[a]);
            fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal)
        });
        let n = ranked.len();
        if n == 0 {
            self.enforce_population_bounds(&mut state, now);
            return;
        }

        let bottom_count = n / 3;
        let bottom_ids: Vec<Uuid> = ranked[n - bottom_count..].to_vec();
        let top_half_ids: Vec<Uuid> = ranked[..n.div_ceil(2)].to_vec();

        let mut replaced: HashSet<Uuid> = HashSet::new();
        for id in &bottom_ids {
            if state.rng.gen_bool(0.4) {
                let Some(parent) = state.active.get(id).cloned() else { continue };
                let child = Self::mutate_internal(&parent, 1.2, self.config.mutation_rate, &mut state.rng, now);
                if child.agent_id != parent.agent_id {
                    let fitness_before = Self::fitness(&parent);
                    state.retire(*id, now, "low_fitness_replacement", fitness_before);
                    state.record_event(EvolutionEvent {
                        kind: EvolutionEventKind::Mutation,
                        timestamp: now,
                        agent_id: child.agent_id,
                        parent_ids: Some(vec![parent.agent_id]),
                        mutation_details: Some("evolve_population bottom-third mutation".to_string()),
                        selection_reason: Some("low_fitness_replacement".to_string()),
                        fitness_before: Some(fitness_before),
                        fitness_after: Some(Self::fitness(&child)),
                    });
                    state.active.insert(child.agent_id, child);
                    replaced.insert(*id);
                }
            }
        }

        let mut targets: VecDeque<Uuid> = bottom_ids.into_iter().filter(|id| !replaced.contains(id)).collect();
        let mut i = 0;
        while i + 1 < top_half_ids.len() {
            let Some(target) = targets.pop_front() else { break };
            if state.rng.gen_bool(self.config.crossover_rate.clamp(0.0, 1.0)) {
                let Some(p1) = state.active.get(&top_half_ids[i]).cloned() else {
                    i += 2;
                    continue;
                };
                let Some(p2) = state.active.get(&top_half_ids[i + 1]).cloned() else {
                    i += 2;
                    continue;
                };
                let child = Self::crossover_internal(&p1, &p2, &mut state.rng, now);
                let fitness_before = state.active.get(&target).map(Self::fitness).unwrap_or(0.0);
                state.retire(target, now, "crossover_replacement", fitness_before);
                state.record_event(EvolutionEvent {
                    kind: EvolutionEventKind::Crossover,
                    timestamp: now,
                    agent_id: child.agent_id,
                    parent_ids: Some(vec![p1.agent_id, p2.agent_id]),
                    mutation_details: None,
                    selection_reason: Some("crossover_replacement".to_string()),
                    fitness_before: Some(fitness_before),
                    fitness_after: Some(Self::fitness(&child)),
                });
                state.active.insert(child.agent_id, child);
            }
            i += 2;
        }

        self.enforce_population_bounds(&mut state, now);
        tracing::info!(generation_size = state.active.len(), "evolved agent population");
    }

    /// Highest-fitness active agent, optionally filtered to `agent_type`.
    #[must_use]
    pub fn get_best_agent(&self, agent_type: Option<AgentType>) -> Option<AgentDna> {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state
            .active
            .values()
            .filter(|a| agent_type.is_none_or(|t| a.genes.agent_type == t))
            .max_by(|a, b| Self::fitness(a).partial_cmp(&Self::fitness(b)).unwrap_or(std::cmp::Ordering::Equal))
            .cloned()
    }

    /// Aggregate population diagnostics (spec.md §4.B).
    #[must_use]
    pub fn get_population_stats(&self) -> PopulationStats {
        let now = Utc::now();
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let active: Vec<&AgentDna> = state.active.values().collect();
        let total_mutations = state.active.values().chain(state.retired.values()).map(|a| a.mutations_count).sum();
        let total_crossovers = state.active.values().chain(state.retired.values()).map(|a| a.crossover_count).sum();

        if active.is_empty() {
            return PopulationStats {
                total: state.active.len() + state.retired.len(),
                active: 0,
                retired: state.retired.len(),
                max_generation: 0,
                avg_generation: 0.0,
                avg_success_rate: 0.0,
                best_success_rate: 0.0,
                worst_success_rate: 0.0,
                unique_specializations: 0,
                genetic_diversity: 0.0,
                total_mutations,
                total_crossovers,
                population_health: 0.0,
            };
        }

        let n = active.len() as f64;
        let max_generation = active.iter().map(|a| a.generation).max().unwrap_or(0);
        let avg_generation = active.iter().map(|a| f64::from(a.generation)).sum::<f64>() / n;
        let success_rates: Vec<f64> = active.iter().map(|a| a.genes.success_rate).collect();
        let avg_success_rate = success_rates.iter().sum::<f64>() / n;
        let best_success_rate = success_rates.iter().cloned().fold(f64::MIN, f64::max);
        let worst_success_rate = success_rates.iter().cloned().fold(f64::MAX, f64::min);

        let unique_specializations: HashSet<&String> = active.iter().flat_map(|a| a.genes.specialization.iter()).collect();

        let mut pair_count = 0usize;
        let mut distance_sum = 0.0;
        for i in 0..active.len() {
            for j in (i + 1)..active.len() {
                distance_sum += Self::genetic_distance(active[i], active[j]);
                pair_count += 1;
            }
        }
        let genetic_diversity = if pair_count == 0 { 0.0 } else { distance_sum / pair_count as f64 };

        let avg_fitness = active.iter().map(|a| Self::fitness(a)).sum::<f64>() / n;
        let avg_age_days = active.iter().map(|a| a.life_span_days(now)).sum::<f64>() / n;
        let population_health =
            (0.5 * avg_fitness + 0.3 * genetic_diversity + 0.2 * (1.0 - avg_age_days / HEALTH_OLD_AGE_DAYS).max(0.0)).clamp(0.0, 1.0);

        PopulationStats {
            total: state.active.len() + state.retired.len(),
            active: state.active.len(),
            retired: state.retired.len(),
            max_generation,
            avg_generation,
            avg_success_rate,
            best_success_rate,
            worst_success_rate,
            unique_specializations: unique_specializations.len(),
            genetic_diversity,
            total_mutations,
            total_crossovers,
            population_health,
        }
    }

    fn population_file(dir: &std::path::Path) -> std::path::PathBuf {
        dir.join("population.json")
    }

    fn history_file(dir: &std::path::Path) -> std::path::PathBuf {
        dir.join("evolution_history.json")
    }

    /// Persist the population and (at most the last 100) evolution events
    /// under this factory's storage directory (spec.md §6).
    pub fn save(&self) -> Result<(), PersistenceError> {
        std::fs::create_dir_all(&self.storage_dir).map_err(|source| PersistenceError::Io {
            path: self.storage_dir.display().to_string(),
            source,
        })?;
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let population = PersistedPopulation {
            active_agents: state.active.clone(),
            retired_agents: state.retired.clone(),
            settings: self.config.clone(),
        };
        let population_path = Self::population_file(&self.storage_dir);
        write_json(&population_path, &population)?;

        let tail_start = state.events.len().saturating_sub(MAX_EVENTS_PERSISTED);
        let history: Vec<&EvolutionEvent> = state.events.iter().skip(tail_start).collect();
        let history_path = Self::history_file(&self.storage_dir);
        write_json(&history_path, &history)
    }

    /// Load a factory from `storage_dir`, previously written by [`Self::save`].
    /// A missing or malformed file yields an empty population, per spec.md §7.
    #[must_use]
    pub fn load(storage_dir: impl Into<std::path::PathBuf>, config: AgentFactoryConfig) -> Self {
        let storage_dir = storage_dir.into();
        let population_path = Self::population_file(&storage_dir);
        let (active, retired) = read_json::<PersistedPopulation>(&population_path)
            .map(|p| (p.active_agents, p.retired_agents))
            .unwrap_or_default();

        let history_path = Self::history_file(&storage_dir);
        let events: VecDeque<EvolutionEvent> = read_json::<Vec<EvolutionEvent>>(&history_path).map(VecDeque::from).unwrap_or_default();

        let rng = config.rng_seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self {
            config,
            state: Mutex::new(FactoryState { rng, active, retired, events }),
            storage_dir,
        }
    }
}

impl Drop for EvolutionaryAgentFactory {
    fn drop(&mut self) {
        if let Err(err) = self.save() {
            tracing::error!(%err, "failed to save agent population on drop");
        }
    }
}

fn write_json<T: Serialize>(path: &std::path::Path, value: &T) -> Result<(), PersistenceError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| PersistenceError::Serde {
        path: path.display().to_string(),
        source,
    })?;
    std::fs::write(path, json).map_err(|source| PersistenceError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &std::path::Path) -> Option<T> {
    let contents = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::error!(%err, path = %path.display(), "malformed agent population data, starting empty");
            None
        }
    }
}
