//! Prompt evolution engine (spec.md §4.C).
//!
//! Maintains a population of structured prompt DNAs whose text and
//! numeric genes evolve under `(success, quality, execution_time)`
//! feedback, mirroring the agent factory's selection pressure but
//! operating on rendered prompt text instead of behaviour-shaping genes.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::IteratorRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::error::PersistenceError;
use crate::domain::models::agent_dna::AgentType;
use crate::domain::models::prompt_dna::{Creativity, PromptDna, PromptGenes, PromptPerformance, Tone, Verbosity};

pub use crate::services::config::PromptEngineConfig;

const MAX_PERFORMANCE_IN_MEMORY: usize = 500;
const MAX_PERFORMANCE_PERSISTED: usize = 500;
const MAX_EXAMPLES_RENDERED: usize = 3;
const MAX_EXAMPLES_AFTER_CROSSOVER: usize = 5;

struct EngineState {
    rng: StdRng,
    prompts: HashMap<Uuid, PromptDna>,
    performance: VecDeque<PromptPerformance>,
}

#[derive(Serialize, Deserialize)]
struct PersistedPerformance(Vec<PromptPerformance>);

fn seed_template(agent_type: AgentType) -> PromptGenes {
    let (role, instructions, output, error_handling, constraints, quality_criteria): (&str, &str, &str, &str, &[&str], &[&str]) =
        match agent_type {
            AgentType::Code => (
                "You are a skilled software engineer.",
                "Write correct, idiomatic code that solves the stated task.",
                "Return the code in a single fenced block, with no surrounding prose.",
                "If the task is ambiguous, state your assumptions before the code.",
                &["Do not invent APIs that do not exist.", "Prefer standard library solutions."],
                &["Code compiles without warnings.", "Code handles the stated edge cases."],
            ),
            AgentType::Web => (
                "You are a careful web research assistant.",
                "Find and summarize information relevant to the task from the web.",
                "Return a short summary followed by a list of sources.",
                "If a source cannot be retrieved, note it and continue with the rest.",
                &["Cite every factual claim with a source.", "Do not fabricate URLs."],
                &["Summary reflects the sources accurately.", "Sources are reachable."],
            ),
            AgentType::Analysis => (
                "You are a meticulous data analyst.",
                "Analyze the given data and extract the insight the task asks for.",
                "Return findings as a short narrative followed by key numbers.",
                "If the data is insufficient, state what additional data is needed.",
                &["State assumptions about the data explicitly.", "Do not extrapolate beyond the sample."],
                &["Numbers are internally consistent.", "Conclusions follow from the data shown."],
            ),
            AgentType::Document => (
                "You are a precise document-processing assistant.",
                "Extract or transform the requested content from the given document.",
                "Return the result in the format requested by the task.",
                "If the document is malformed, describe the problem instead of guessing.",
                &["Preserve the original meaning.", "Do not drop sections silently."],
                &["Output matches the requested format.", "No content is fabricated."],
            ),
            AgentType::General => (
                "You are a capable general-purpose assistant.",
                "Complete the stated task as directly as possible.",
                "Return a direct answer, with supporting detail only if useful.",
                "If you are unsure, say so rather than guessing.",
                &["Stay within the scope of the task."],
                &["Answer addresses exactly what was asked."],
            ),
        };

    PromptGenes {
        role_definition: role.to_string(),
        task_instructions: instructions.to_string(),
        output_format: output.to_string(),
        constraints: constraints.iter().map(|s| (*s).to_string()).collect(),
        tone: Tone::Professional,
        verbosity: Verbosity::Medium,
        creativity: Creativity::Balanced,
        examples: Vec::new(),
        error_handling: error_handling.to_string(),
        quality_criteria: quality_criteria.iter().map(|s| (*s).to_string()).collect(),
        context_awareness: 0.5,
        user_adaptation: 0.5,
        task_specialization: 0.5,
    }
}

fn constraint_pool(agent_type: AgentType) -> &'static [&'static str] {
    match agent_type {
        AgentType::Code => &[
            "Do not invent APIs that do not exist.",
            "Prefer standard library solutions.",
            "Keep functions small and single-purpose.",
            "Avoid unnecessary dependencies.",
        ],
        AgentType::Web => &[
            "Cite every factual claim with a source.",
            "Do not fabricate URLs.",
            "Prefer primary sources over aggregators.",
        ],
        AgentType::Analysis => &[
            "State assumptions about the data explicitly.",
            "Do not extrapolate beyond the sample.",
            "Flag outliers before drawing conclusions.",
        ],
        AgentType::Document => &[
            "Preserve the original meaning.",
            "Do not drop sections silently.",
            "Keep formatting consistent with the source.",
        ],
        AgentType::General => &["Stay within the scope of the task.", "Ask before making irreversible choices."],
    }
}

struct FieldMutation {
    insert_modifier: &'static str,
    synonym_pairs: &'static [(&'static str, &'static str)],
    append_clause: &'static str,
}

fn mutation_table(field: &str, agent_type: AgentType) -> FieldMutation {
    match (field, agent_type) {
        ("role", AgentType::Code) => FieldMutation {
            insert_modifier: "highly experienced",
            synonym_pairs: &[("skilled", "expert"), ("software engineer", "software developer")],
            append_clause: " You value correctness over cleverness.",
        },
        ("role", _) => FieldMutation {
            insert_modifier: "thorough",
            synonym_pairs: &[("careful", "diligent"), ("capable", "competent")],
            append_clause: " You double-check your work before answering.",
        },
        ("instructions", AgentType::Code) => FieldMutation {
            insert_modifier: "carefully",
            synonym_pairs: &[("write", "produce"), ("solves", "addresses")],
            append_clause: " Favor clarity over brevity.",
        },
        ("instructions", _) => FieldMutation {
            insert_modifier: "carefully",
            synonym_pairs: &[("find", "locate"), ("analyze", "examine"), ("extract", "retrieve"), ("complete", "accomplish")],
            append_clause: " Work through the task step by step.",
        },
        ("output_format", _) => FieldMutation {
            insert_modifier: "clearly",
            synonym_pairs: &[("return", "produce"), ("short", "concise")],
            append_clause: " Avoid unnecessary preamble.",
        },
        _ => FieldMutation {
            insert_modifier: "carefully",
            synonym_pairs: &[],
            append_clause: "",
        },
    }
}

/// Apply one of {insert modifier, replace synonym, append clause} to `text`,
/// chosen uniformly. Guaranteed to either change `text` or leave it
/// byte-for-byte identical (spec.md §9: "never produces ungrammatical
/// output by truncation").
fn mutate_text(text: &str, field: &str, agent_type: AgentType, rng: &mut StdRng) -> String {
    let table = mutation_table(field, agent_type);
    match rng.gen_range(0..3) {
        0 => {
            if let Some(rest) = text.strip_prefix("You are a ") {
                format!("You are a {} {rest}", table.insert_modifier)
            } else {
                text.to_string()
            }
        }
        1 => {
            for (from, to) in table.synonym_pairs {
                if text.contains(from) {
                    return text.replacen(from, to, 1);
                }
            }
            text.to_string()
        }
        _ => format!("{text}{}", table.append_clause),
    }
}

/// Owns the prompt-DNA population and its performance history.
pub struct PromptEvolutionEngine {
    config: PromptEngineConfig,
    state: Mutex<EngineState>,
    storage_dir: std::path::PathBuf,
}

impl PromptEvolutionEngine {
    /// Construct an empty engine that persists under `storage_dir`.
    #[must_use]
    pub fn new(config: PromptEngineConfig, storage_dir: impl Into<std::path::PathBuf>) -> Self {
        let rng = config.rng_seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self {
            config,
            state: Mutex::new(EngineState {
                rng,
                prompts: HashMap::new(),
                performance: VecDeque::new(),
            }),
            storage_dir: storage_dir.into(),
        }
    }

    fn new_initial(agent_type: AgentType, now: DateTime<Utc>, rng: &mut StdRng) -> PromptDna {
        let mut genes = seed_template(agent_type);
        genes.context_awareness = rng.gen_range(0.4..=0.6);
        genes.user_adaptation = rng.gen_range(0.4..=0.6);
        genes.task_specialization = rng.gen_range(0.4..=0.6);
        PromptDna {
            prompt_id: Uuid::new_v4(),
            agent_type,
            generation: 0,
            parent_ids: Vec::new(),
            birth_time: now,
            genes,
            usage_count: 0,
            success_rate: 0.0,
            avg_quality_score: 0.0,
            avg_execution_time: 0.0,
            mutations_count: 0,
            crossover_count: 0,
        }
    }

    /// Seed and register a fresh generation-0 prompt for `agent_type`.
    pub fn create_initial_prompt(&self, agent_type: AgentType) -> PromptDna {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let prompt = Self::new_initial(agent_type, now, &mut state.rng);
        state.prompts.insert(prompt.prompt_id, prompt.clone());
        tracing::info!(prompt_id = %prompt.prompt_id, agent_type = agent_type.as_str(), "seeded initial prompt");
        prompt
    }

    /// Current prompt population size.
    #[must_use]
    pub fn population_size(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.prompts.len()
    }

    /// Prompt-fitness function from spec.md §4.C, clamped to `[0, 1]`.
    #[must_use]
    pub fn prompt_fitness(prompt: &PromptDna) -> f64 {
        if prompt.usage_count == 0 {
            return 0.5;
        }
        let now = Utc::now();
        let age_days = (now - prompt.birth_time).num_seconds() as f64 / 86_400.0;
        let bonus = if age_days < 7.0 { 0.05 } else { 0.0 };
        let fitness = 0.5 * prompt.success_rate + 0.3 * prompt.avg_quality_score
            + (prompt.usage_count as f64 / 20.0).min(0.2)
            - (prompt.avg_execution_time / 120.0).min(0.1)
            + bonus;
        fitness.clamp(0.0, 1.0)
    }

    /// Highest-fitness prompt of `agent_type`; seeds and returns a fresh one
    /// if none exist yet.
    pub fn get_best_prompt(&self, agent_type: AgentType, _task_type: Option<&str>) -> PromptDna {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let best = state
            .prompts
            .values()
            .filter(|p| p.agent_type == agent_type)
            .max_by(|a, b| Self::prompt_fitness(a).partial_cmp(&Self::prompt_fitness(b)).unwrap_or(std::cmp::Ordering::Equal))
            .cloned();

        if let Some(prompt) = best {
            return prompt;
        }

        let prompt = Self::new_initial(agent_type, now, &mut state.rng);
        state.prompts.insert(prompt.prompt_id, prompt.clone());
        prompt
    }

    /// Record one use of `prompt_id` and update its running averages.
    /// Unknown `prompt_id` is a no-op, logged at `warn`.
    #[allow(clippy::too_many_arguments)]
    pub fn record_prompt_performance(
        &self,
        prompt_id: Uuid,
        task_type: impl Into<String>,
        success: bool,
        quality_score: f64,
        execution_time: f64,
        user_feedback: Option<String>,
        error_details: Option<String>,
        output_length: Option<usize>,
        context_relevance: Option<f64>,
    ) {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let Some(prompt) = state.prompts.get_mut(&prompt_id) else {
            tracing::warn!(%prompt_id, "record_prompt_performance: unknown prompt id");
            return;
        };

        prompt.usage_count += 1;
        let n = prompt.usage_count as f64;
        let prior_success_total = prompt.success_rate * (n - 1.0);
        let success_value = if success { 1.0 } else { 0.0 };
        prompt.success_rate = (prior_success_total + success_value) / n;
        let prior_quality_total = prompt.avg_quality_score * (n - 1.0);
        prompt.avg_quality_score = (prior_quality_total + quality_score.clamp(0.0, 1.0)) / n;
        let prior_time_total = prompt.avg_execution_time * (n - 1.0);
        prompt.avg_execution_time = (prior_time_total + execution_time) / n;

        state.performance.push_back(PromptPerformance {
            prompt_id,
            task_type: task_type.into(),
            success,
            quality_score: quality_score.clamp(0.0, 1.0),
            execution_time,
            timestamp: now,
            user_feedback,
            error_details,
            output_length,
            context_relevance,
        });
        while state.performance.len() > MAX_PERFORMANCE_IN_MEMORY {
            state.performance.pop_front();
        }

        tracing::debug!(%prompt_id, success, quality_score, "recorded prompt performance");
    }

    fn mutate_internal(dna: &PromptDna, mutation_strength: f64, config: &PromptEngineConfig, rng: &mut StdRng, now: DateTime<Utc>) -> PromptDna {
        let mut genes = dna.genes.clone();
        let p = (config.mutation_rate * mutation_strength).clamp(0.0, 1.0);

        if rng.gen_bool(p) {
            genes.role_definition = mutate_text(&genes.role_definition, "role", dna.agent_type, rng);
        }
        if rng.gen_bool(p) {
            genes.task_instructions = mutate_text(&genes.task_instructions, "instructions", dna.agent_type, rng);
        }
        if rng.gen_bool(p) {
            genes.output_format = mutate_text(&genes.output_format, "output_format", dna.agent_type, rng);
        }
        if rng.gen_bool(p) {
            genes.tone = *Tone::ALL.iter().filter(|t| **t != genes.tone).choose(rng).unwrap_or(&genes.tone);
        }
        if rng.gen_bool(p) {
            genes.verbosity = *Verbosity::ALL.iter().filter(|v| **v != genes.verbosity).choose(rng).unwrap_or(&genes.verbosity);
        }
        if rng.gen_bool(p) {
            genes.creativity = *Creativity::ALL.iter().filter(|c| **c != genes.creativity).choose(rng).unwrap_or(&genes.creativity);
        }
        if rng.gen_bool(p) {
            genes.context_awareness = (genes.context_awareness + rng.gen_range(-0.2..=0.2) * mutation_strength).clamp(0.0, 1.0);
        }
        if rng.gen_bool(p) {
            genes.user_adaptation = (genes.user_adaptation + rng.gen_range(-0.2..=0.2) * mutation_strength).clamp(0.0, 1.0);
        }
        if rng.gen_bool(p) {
            genes.task_specialization = (genes.task_specialization + rng.gen_range(-0.2..=0.2) * mutation_strength).clamp(0.0, 1.0);
        }

        if rng.gen_bool((0.5 * config.mutation_rate * mutation_strength).clamp(0.0, 1.0)) {
            if let Some(candidate) = constraint_pool(dna.agent_type).iter().find(|c| !genes.constraints.iter().any(|g| g == *c)) {
                genes.constraints.push((*candidate).to_string());
            }
        }
        if rng.gen_bool((0.3 * config.mutation_rate * mutation_strength).clamp(0.0, 1.0)) && genes.constraints.len() > 1 {
            let idx = rng.gen_range(0..genes.constraints.len());
            genes.constraints.remove(idx);
        }

        PromptDna {
            prompt_id: Uuid::new_v4(),
            agent_type: dna.agent_type,
            generation: dna.generation + 1,
            parent_ids: vec![dna.prompt_id],
            birth_time: now,
            genes,
            usage_count: 0,
            success_rate: 0.0,
            avg_quality_score: 0.0,
            avg_execution_time: 0.0,
            mutations_count: dna.mutations_count + 1,
            crossover_count: dna.crossover_count,
        }
    }

    /// Mutate `dna` directly, producing a child (spec.md §4.C).
    #[must_use]
    pub fn mutate_prompt(&self, dna: &PromptDna, mutation_strength: f64) -> PromptDna {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Self::mutate_internal(dna, mutation_strength, &self.config, &mut state.rng, now)
    }

    fn crossover_internal(p1: &PromptDna, p2: &PromptDna, rng: &mut StdRng, now: DateTime<Utc>) -> PromptDna {
        let (better, worse) = if p1.success_rate >= p2.success_rate { (p1, p2) } else { (p2, p1) };

        let output_format = if rng.gen_bool(0.5) { p1.genes.output_format.clone() } else { p2.genes.output_format.clone() };
        let tone = if rng.gen_bool(0.5) { p1.genes.tone } else { p2.genes.tone };
        let verbosity = if rng.gen_bool(0.5) { p1.genes.verbosity } else { p2.genes.verbosity };
        let creativity = if rng.gen_bool(0.5) { p1.genes.creativity } else { p2.genes.creativity };

        let mut constraints = better.genes.constraints.clone();
        for c in &worse.genes.constraints {
            if !constraints.contains(c) {
                constraints.push(c.clone());
            }
        }
        let mut quality_criteria = better.genes.quality_criteria.clone();
        for c in &worse.genes.quality_criteria {
            if !quality_criteria.contains(c) {
                quality_criteria.push(c.clone());
            }
        }
        let mut examples: Vec<String> = p1.genes.examples.clone();
        for e in &p2.genes.examples {
            if !examples.contains(e) {
                examples.push(e.clone());
            }
        }
        examples.truncate(MAX_EXAMPLES_AFTER_CROSSOVER);

        let perturb = |value: f64, rng: &mut StdRng| (value + rng.gen_range(-0.1..=0.1)).clamp(0.0, 1.0);
        let context_awareness = perturb((p1.genes.context_awareness + p2.genes.context_awareness) / 2.0, rng);
        let user_adaptation = perturb((p1.genes.user_adaptation + p2.genes.user_adaptation) / 2.0, rng);
        let task_specialization = perturb((p1.genes.task_specialization + p2.genes.task_specialization) / 2.0, rng);

        let genes = PromptGenes {
            role_definition: better.genes.role_definition.clone(),
            task_instructions: better.genes.task_instructions.clone(),
            output_format,
            constraints,
            tone,
            verbosity,
            creativity,
            examples,
            error_handling: better.genes.error_handling.clone(),
            quality_criteria,
            context_awareness,
            user_adaptation,
            task_specialization,
        };

        PromptDna {
            prompt_id: Uuid::new_v4(),
            agent_type: better.agent_type,
            generation: p1.generation.max(p2.generation) + 1,
            parent_ids: vec![p1.prompt_id, p2.prompt_id],
            birth_time: now,
            genes,
            usage_count: 0,
            success_rate: 0.0,
            avg_quality_score: 0.0,
            avg_execution_time: 0.0,
            mutations_count: 0,
            crossover_count: p1.crossover_count.max(p2.crossover_count) + 1,
        }
    }

    /// Produce a crossover child of `p1` and `p2` directly (spec.md §4.C).
    #[must_use]
    pub fn crossover_prompts(&self, p1: &PromptDna, p2: &PromptDna) -> PromptDna {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Self::crossover_internal(p1, p2, &mut state.rng, now)
    }

    fn enforce_population_bounds(&self, state: &mut EngineState, now: DateTime<Utc>) {
        if state.prompts.len() > self.config.max_population {
            let surplus = state.prompts.len() - self.config.max_population;
            let mut ranked: Vec<(Uuid, f64)> = state.prompts.iter().map(|(id, p)| (*id, Self::prompt_fitness(p))).collect();
            ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
            for (id, _) in ranked.into_iter().take(surplus) {
                state.prompts.remove(&id);
            }
        }

        while state.prompts.len() < self.config.min_population {
            let prompt = Self::new_initial(AgentType::General, now, &mut state.rng);
            state.prompts.insert(prompt.prompt_id, prompt);
        }
    }

    /// Run one generation step across prompts of `agent_type` (or all
    /// prompts if `None`): mutate struggling prompts, cross over top
    /// performers, then enforce `max_population` (spec.md §4.C).
    pub fn evolve_prompts(&self, agent_type: Option<AgentType>) {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut ranked: Vec<Uuid> = state
            .prompts
            .values()
            .filter(|p| agent_type.is_none_or(|t| p.agent_type == t))
            .map(|p| p.prompt_id)
            .collect();
        ranked.sort_by(|a, b| {
            let fb = Self::prompt_fitness(&state.prompts[b]);
            let fa = Self::prompt_fitness(&state.prompts[a]);
            fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal)
        });
        let n = ranked.len();
        if n == 0 {
            return;
        }

        let bottom_count = n / 3;
        let bottom_ids = &ranked[n - bottom_count..];
        for id in bottom_ids {
            if state.rng.gen_bool(0.4) {
                if let Some(parent) = state.prompts.get(id).cloned() {
                    let child = Self::mutate_internal(&parent, 1.2, &self.config, &mut state.rng, now);
                    state.prompts.remove(id);
                    state.prompts.insert(child.prompt_id, child);
                }
            }
        }

        let top_half_ids: Vec<Uuid> = ranked[..n.div_ceil(2)].to_vec();
        let mut i = 0;
        while i + 1 < top_half_ids.len() {
            if state.rng.gen_bool(self.config.crossover_rate.clamp(0.0, 1.0)) {
                if let (Some(p1), Some(p2)) = (state.prompts.get(&top_half_ids[i]).cloned(), state.prompts.get(&top_half_ids[i + 1]).cloned()) {
                    let child = Self::crossover_internal(&p1, &p2, &mut state.rng, now);
                    state.prompts.insert(child.prompt_id, child);
                }
            }
            i += 2;
        }

        self.enforce_population_bounds(&mut state, now);
        tracing::info!(population = state.prompts.len(), "evolved prompt population");
    }

    /// Deterministically assemble `dna` into the text sent to the model,
    /// per spec.md §4.C's rendering rules.
    #[must_use]
    pub fn render_prompt(&self, dna: &PromptDna) -> String {
        let genes = &dna.genes;
        let mut sections = Vec::new();

        if !genes.role_definition.is_empty() {
            sections.push(genes.role_definition.clone());
        }
        if !genes.task_instructions.is_empty() {
            let mut task = genes.task_instructions.clone();
            task.push(' ');
            task.push_str(genes.tone.modifier());
            task.push(' ');
            task.push_str(genes.verbosity.modifier());
            sections.push(task);
        }
        if !genes.output_format.is_empty() {
            sections.push(format!("Output format: {}", genes.output_format));
        }
        if !genes.constraints.is_empty() {
            let bullets: Vec<String> = genes.constraints.iter().map(|c| format!("- {c}")).collect();
            sections.push(format!("Constraints:\n{}", bullets.join("\n")));
        }
        if !genes.quality_criteria.is_empty() {
            let bullets: Vec<String> = genes.quality_criteria.iter().map(|c| format!("- {c}")).collect();
            sections.push(format!("Quality criteria:\n{}", bullets.join("\n")));
        }
        if !genes.examples.is_empty() {
            let bullets: Vec<String> = genes.examples.iter().take(MAX_EXAMPLES_RENDERED).map(|e| format!("- {e}")).collect();
            sections.push(format!("Examples:\n{}", bullets.join("\n")));
        }
        if !genes.error_handling.is_empty() {
            sections.push(format!("Error handling: {}", genes.error_handling));
        }

        let mut adaptive = Vec::new();
        if genes.context_awareness > 0.7 {
            adaptive.push("учитывай контекст");
        }
        if genes.user_adaptation > 0.7 {
            adaptive.push("адаптируй стиль под пользователя");
        }
        if genes.task_specialization > 0.7 {
            adaptive.push("специализируйся под задачу");
        }
        if !adaptive.is_empty() {
            sections.push(format!("Additional: {}", adaptive.join(", ")));
        }

        sections.join("\n\n")
    }

    fn population_file(dir: &std::path::Path) -> std::path::PathBuf {
        dir.join("prompt_population.json")
    }

    fn history_file(dir: &std::path::Path) -> std::path::PathBuf {
        dir.join("performance_history.json")
    }

    /// Persist the prompt population and (at most the last 500) performance
    /// records under this engine's storage directory (spec.md §6).
    pub fn save(&self) -> Result<(), PersistenceError> {
        std::fs::create_dir_all(&self.storage_dir).map_err(|source| PersistenceError::Io {
            path: self.storage_dir.display().to_string(),
            source,
        })?;
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let population_path = Self::population_file(&self.storage_dir);
        write_json(&population_path, &state.prompts)?;

        let tail_start = state.performance.len().saturating_sub(MAX_PERFORMANCE_PERSISTED);
        let history: Vec<&PromptPerformance> = state.performance.iter().skip(tail_start).collect();
        let history_path = Self::history_file(&self.storage_dir);
        write_json(&history_path, &history)
    }

    /// Load an engine from `storage_dir`, previously written by [`Self::save`].
    /// A missing or malformed file yields an empty population, per spec.md §7.
    #[must_use]
    pub fn load(storage_dir: impl Into<std::path::PathBuf>, config: PromptEngineConfig) -> Self {
        let storage_dir = storage_dir.into();
        let population_path = Self::population_file(&storage_dir);
        let prompts = read_json::<HashMap<Uuid, PromptDna>>(&population_path).unwrap_or_default();

        let history_path = Self::history_file(&storage_dir);
        let performance: VecDeque<PromptPerformance> = read_json::<Vec<PromptPerformance>>(&history_path).map(VecDeque::from).unwrap_or_default();

        let rng = config.rng_seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self {
            config,
            state: Mutex::new(EngineState { rng, prompts, performance }),
            storage_dir,
        }
    }
}

impl Drop for PromptEvolutionEngine {
    fn drop(&mut self) {
        if let Err(err) = self.save() {
            tracing::error!(%err, "failed to save prompt population on drop");
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
            tracing::error!(%err, path = %path.display(), "malformed prompt population data, starting empty");
            None
        }
    }
}
