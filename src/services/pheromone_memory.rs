//! Pheromone memory engine (spec.md §4.A).
//!
//! Accumulates evidence that a given solution pattern works for a given
//! task type, so later recommendations are informed by cumulative history
//! rather than a single run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::domain::error::PersistenceError;
use crate::domain::models::pheromone::{AgentPheromone, PheromoneTrail, TaskPheromones};

pub use crate::domain::models::pheromone::PheromoneStats;

pub use crate::services::config::PheromoneConfig;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Store {
    task_pheromones: HashMap<String, TaskPheromones>,
    agent_pheromones: HashMap<String, AgentPheromone>,
    tool_pheromones: HashMap<String, HashMap<String, f64>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStore {
    task_pheromones: HashMap<String, TaskPheromones>,
    agent_pheromones: HashMap<String, AgentPheromone>,
    tool_pheromones: HashMap<String, HashMap<String, f64>>,
    saved_at: DateTime<Utc>,
}

/// Ant-colony-style reinforcement memory for (task-type, solution-pattern),
/// agent-combination, and tool associations.
pub struct PheromoneMemorySystem {
    config: PheromoneConfig,
    store: Mutex<Store>,
    storage_dir: std::path::PathBuf,
}

impl PheromoneMemorySystem {
    /// Construct an empty pheromone memory that persists under `storage_dir`.
    #[must_use]
    pub fn new(config: PheromoneConfig, storage_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            config,
            store: Mutex::new(Store::default()),
            storage_dir: storage_dir.into(),
        }
    }

    fn reinforce(current: f64, success: bool, config: &PheromoneConfig) -> f64 {
        if success {
            (current * config.reinforcement_factor).min(1.0)
        } else {
            (current * (1.0 - config.evaporation_rate)).max(config.min_strength)
        }
    }

    /// Record the outcome of using `solution_pattern` (via `agent_combination`
    /// and `tools_used`) on a task of `task_type`. Creates trails on first
    /// use; reinforces on success, weakens on failure. All three updates
    /// (task, agent, tool) are applied atomically from an observer's
    /// perspective (spec.md §5).
    pub fn record_solution_success(
        &self,
        task_type: &str,
        solution_pattern: &str,
        agent_combination: &str,
        tools_used: &[String],
        success: bool,
    ) {
        let now = Utc::now();
        let mut store = self.store.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        self.update_task_pheromones(&mut store, task_type, solution_pattern, success, now);
        self.update_agent_pheromones(&mut store, agent_combination, task_type, success, now);
        self.update_tool_pheromones(&mut store, tools_used, task_type, success);

        tracing::info!(task_type, solution_pattern, success, "recorded pheromone trail");
    }

    fn update_task_pheromones(&self, store: &mut Store, task_type: &str, solution_pattern: &str, success: bool, now: DateTime<Utc>) {
        let entry = store.task_pheromones.entry(task_type.to_string()).or_insert_with(|| TaskPheromones {
            task_type: task_type.to_string(),
            trails: HashMap::new(),
            total_attempts: 0,
            successful_attempts: 0,
        });

        entry.total_attempts += 1;
        if success {
            entry.successful_attempts += 1;
        }

        match entry.trails.get_mut(solution_pattern) {
            Some(trail) => {
                trail.last_used = now;
                if success {
                    trail.success_count += 1;
                } else {
                    trail.failure_count += 1;
                }
                trail.strength = Self::reinforce(trail.strength, success, &self.config);
            }
            None => {
                let trail_id = format!("{}_{}_{}", task_type, solution_pattern, now.timestamp());
                entry.trails.insert(
                    solution_pattern.to_string(),
                    PheromoneTrail::new(trail_id, task_type.to_string(), solution_pattern.to_string(), success, now),
                );
            }
        }
    }

    fn update_agent_pheromones(&self, store: &mut Store, agent_combination: &str, task_type: &str, success: bool, now: DateTime<Utc>) {
        match store.agent_pheromones.get_mut(agent_combination) {
            Some(pheromone) => {
                pheromone.usage_count += 1;
                pheromone.last_used = now;
                if !pheromone.task_types.iter().any(|t| t == task_type) {
                    pheromone.task_types.push(task_type.to_string());
                }

                let n = pheromone.usage_count as f64;
                let prior_total = pheromone.success_rate * (n - 1.0);
                pheromone.success_rate = if success { prior_total + 1.0 } else { prior_total } / n;
                pheromone.strength = Self::reinforce(pheromone.strength, success, &self.config);
            }
            None => {
                store.agent_pheromones.insert(
                    agent_combination.to_string(),
                    AgentPheromone::new(agent_combination.to_string(), task_type.to_string(), success, now),
                );
            }
        }
    }

    fn update_tool_pheromones(&self, store: &mut Store, tools_used: &[String], task_type: &str, success: bool) {
        let tools = store.tool_pheromones.entry(task_type.to_string()).or_default();
        for tool in tools_used {
            let strength = tools.entry(tool.clone()).or_insert(0.5);
            *strength = Self::reinforce(*strength, success, &self.config);
        }
    }

    /// Best solution patterns for `task_type`, ranked by `strength *
    /// success_rate` descending. Empty if the task type is unseen.
    #[must_use]
    pub fn get_best_solution_patterns(&self, task_type: &str, limit: usize) -> Vec<String> {
        let store = self.store.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(task) = store.task_pheromones.get(task_type) else {
            tracing::debug!(task_type, "no pheromone data for task type");
            return Vec::new();
        };
        task.strongest_trails(limit)
            .into_iter()
            .map(|t| t.solution_pattern.clone())
            .collect()
    }

    /// Highest-ranked agent combination whose `task_types` contains
    /// `task_type`, or `None` if no combination has been used for it.
    #[must_use]
    pub fn get_best_agent_combination(&self, task_type: &str) -> Option<String> {
        let store = self.store.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        store
            .agent_pheromones
            .values()
            .filter(|p| p.task_types.iter().any(|t| t == task_type))
            .max_by(|a, b| a.rank().partial_cmp(&b.rank()).unwrap_or(std::cmp::Ordering::Equal))
            .map(|p| p.agent_combination.clone())
    }

    /// Best tools for `task_type`, ranked by raw strength descending.
    #[must_use]
    pub fn get_best_tools(&self, task_type: &str, limit: usize) -> Vec<String> {
        let store = self.store.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(tools) = store.tool_pheromones.get(task_type) else {
            return Vec::new();
        };
        let mut ranked: Vec<(&String, &f64)> = tools.iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.into_iter().take(limit).map(|(tool, _)| tool.clone()).collect()
    }

    /// Overall success rate recorded for `task_type`, or `None` if unseen.
    #[must_use]
    pub fn task_success_rate(&self, task_type: &str) -> Option<f64> {
        let store = self.store.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        store.task_pheromones.get(task_type).map(TaskPheromones::overall_success_rate)
    }

    /// Total attempts recorded for `task_type`, or 0 if unseen.
    #[must_use]
    pub fn task_total_attempts(&self, task_type: &str) -> u64 {
        let store = self.store.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        store.task_pheromones.get(task_type).map_or(0, |t| t.total_attempts)
    }

    /// Apply one evaporation pass to every trail, agent combination, and
    /// tool strength, deleting anything that falls below `min_strength` or
    /// (for task trails) has been idle longer than `expiry_days`.
    pub fn evaporate_pheromones(&self) {
        let now = Utc::now();
        let mut store = self.store.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut evaporated = 0usize;

        for task in store.task_pheromones.values_mut() {
            task.trails.retain(|_, trail| {
                trail.strength *= 1.0 - self.config.evaporation_rate;
                let keep = trail.strength >= self.config.min_strength && !trail.is_expired(now, self.config.expiry_days);
                if !keep {
                    evaporated += 1;
                }
                keep
            });
        }

        store.agent_pheromones.retain(|_, pheromone| {
            pheromone.strength *= 1.0 - self.config.evaporation_rate;
            let keep = pheromone.strength >= self.config.min_strength;
            if !keep {
                evaporated += 1;
            }
            keep
        });

        for tools in store.tool_pheromones.values_mut() {
            tools.retain(|_, strength| {
                *strength *= 1.0 - self.config.evaporation_rate;
                let keep = *strength >= self.config.min_strength;
                if !keep {
                    evaporated += 1;
                }
                keep
            });
        }

        if evaporated > 0 {
            tracing::info!(evaporated, "evaporated weak pheromone trails");
        }
    }

    /// Snapshot of the store's health and top performers.
    #[must_use]
    pub fn get_statistics(&self) -> PheromoneStats {
        let store = self.store.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let total_trails: usize = store.task_pheromones.values().map(|t| t.trails.len()).sum();

        let mut all_trails: Vec<&PheromoneTrail> = store.task_pheromones.values().flat_map(|t| t.trails.values()).collect();
        all_trails.sort_by(|a, b| b.rank().partial_cmp(&a.rank()).unwrap_or(std::cmp::Ordering::Equal));
        let strongest_trails = all_trails.into_iter().take(5).cloned().collect();

        let mut agents: Vec<&AgentPheromone> = store.agent_pheromones.values().collect();
        agents.sort_by(|a, b| b.rank().partial_cmp(&a.rank()).unwrap_or(std::cmp::Ordering::Equal));
        let best_agents = agents.into_iter().take(5).cloned().collect();

        let system_health = if total_trails == 0 {
            0.0
        } else {
            let avg_strength: f64 = store.task_pheromones.values().flat_map(|t| t.trails.values()).map(|t| t.strength).sum::<f64>() / total_trails as f64;
            (avg_strength * (total_trails as f64 / 10.0)).min(1.0)
        };

        PheromoneStats {
            task_types: store.task_pheromones.len(),
            agent_combinations: store.agent_pheromones.len(),
            total_trails,
            strongest_trails,
            best_agents,
            system_health,
        }
    }

    fn storage_file(dir: &Path) -> std::path::PathBuf {
        dir.join("pheromones.json")
    }

    /// Persist the whole store as one JSON file under this engine's
    /// storage directory.
    pub fn save(&self) -> Result<(), PersistenceError> {
        std::fs::create_dir_all(&self.storage_dir).map_err(|source| PersistenceError::Io {
            path: self.storage_dir.display().to_string(),
            source,
        })?;
        let store = self.store.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let persisted = PersistedStore {
            task_pheromones: store.task_pheromones.clone(),
            agent_pheromones: store.agent_pheromones.clone(),
            tool_pheromones: store.tool_pheromones.clone(),
            saved_at: Utc::now(),
        };
        let path = Self::storage_file(&self.storage_dir);
        let json = serde_json::to_string_pretty(&persisted).map_err(|source| PersistenceError::Serde {
            path: path.display().to_string(),
            source,
        })?;
        std::fs::write(&path, json).map_err(|source| PersistenceError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load a store from `storage_dir`, previously written by [`Self::save`].
    /// A missing or malformed file yields an empty store, per spec.md §7.
    #[must_use]
    pub fn load(storage_dir: impl Into<std::path::PathBuf>, config: PheromoneConfig) -> Self {
        let storage_dir = storage_dir.into();
        let path = Self::storage_file(&storage_dir);
        let store = std::fs::read_to_string(&path)
            .ok()
            .and_then(|contents| match serde_json::from_str::<PersistedStore>(&contents) {
                Ok(persisted) => Some(Store {
                    task_pheromones: persisted.task_pheromones,
                    agent_pheromones: persisted.agent_pheromones,
                    tool_pheromones: persisted.tool_pheromones,
                }),
                Err(err) => {
                    tracing::error!(%err, path = %path.display(), "malformed pheromone store, starting empty");
                    None
                }
            })
            .unwrap_or_default();

        Self {
            config,
            store: Mutex::new(store),
            storage_dir,
        }
    }
}

impl Drop for PheromoneMemorySystem {
    fn drop(&mut self) {
        // Best-effort safety net mirroring the original's `__del__` save,
        // in case a caller forgot to call `save` explicitly.
        if let Err(err) = self.save() {
            tracing::error!(%err, "failed to save pheromone store on drop");
        }
    }
}
