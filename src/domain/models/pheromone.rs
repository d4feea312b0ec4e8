//! Pheromone memory domain model.
//!
//! A [`PheromoneTrail`] is an association between a task-type and a
//! solution artefact, weighted by a strength that grows on success and
//! decays on failure or inactivity — the ant-colony metaphor spec.md builds
//! the whole component around.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single reinforced (task-type, solution-pattern) association.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PheromoneTrail {
    /// Stable identifier, `{task_type}_{solution_pattern}_{created_at unix}`.
    pub trail_id: String,
    /// Task type this trail belongs to.
    pub task_type: String,
    /// The solution pattern the trail reinforces.
    pub solution_pattern: String,
    /// Pheromone strength in `[min_strength, 1.0]`.
    pub strength: f64,
    /// Number of times this pattern succeeded.
    pub success_count: u64,
    /// Number of times this pattern failed.
    pub failure_count: u64,
    /// Last time this trail was reinforced or weakened.
    pub last_used: DateTime<Utc>,
    /// When the trail was first created. Immutable.
    pub created_at: DateTime<Utc>,
}

impl PheromoneTrail {
    pub(crate) fn new(trail_id: String, task_type: String, solution_pattern: String, success: bool, now: DateTime<Utc>) -> Self {
        Self {
            trail_id,
            task_type,
            solution_pattern,
            strength: 0.5,
            success_count: u64::from(success),
            failure_count: u64::from(!success),
            last_used: now,
            created_at: now,
        }
    }

    /// Fraction of recorded attempts that succeeded.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            0.0
        } else {
            self.success_count as f64 / total as f64
        }
    }

    /// `strength * success_rate`, the ranking key used throughout the
    /// component (spec.md §4.A "Algorithm — ranking").
    #[must_use]
    pub fn rank(&self) -> f64 {
        self.strength * self.success_rate()
    }

    /// Whether this trail has been idle longer than `expiry_days`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, expiry_days: i64) -> bool {
        (now - self.last_used).num_days() > expiry_days
    }
}

/// All trails recorded for a single task type, plus aggregate counters.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaskPheromones {
    /// Task type these trails belong to.
    pub task_type: String,
    /// Solution pattern -> trail.
    pub trails: HashMap<String, PheromoneTrail>,
    /// Total recorded attempts across all patterns.
    pub total_attempts: u64,
    /// Of `total_attempts`, how many succeeded.
    pub successful_attempts: u64,
}

impl TaskPheromones {
    /// Overall success rate across every pattern tried for this task type.
    #[must_use]
    pub fn overall_success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            self.successful_attempts as f64 / self.total_attempts as f64
        }
    }

    /// Trails ranked by `strength * success_rate` descending, ties broken by
    /// most-recent `last_used`.
    #[must_use]
    pub fn strongest_trails(&self, limit: usize) -> Vec<&PheromoneTrail> {
        let mut trails: Vec<&PheromoneTrail> = self.trails.values().collect();
        trails.sort_by(|a, b| {
            b.rank()
                .partial_cmp(&a.rank())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.last_used.cmp(&a.last_used))
        });
        trails.truncate(limit);
        trails
    }
}

/// Pheromone trail for a named combination of agents, e.g. `"CodeAgent"` or
/// `"CodeAgent+AnalysisAgent"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPheromone {
    /// The combination string this trail tracks.
    pub agent_combination: String,
    /// Task types this combination has been used for.
    pub task_types: Vec<String>,
    /// Pheromone strength in `[min_strength, 1.0]`.
    pub strength: f64,
    /// Number of times this combination has been used.
    pub usage_count: u64,
    /// Running success rate in `[0, 1]`.
    pub success_rate: f64,
    /// Last time this combination was used.
    pub last_used: DateTime<Utc>,
}

impl AgentPheromone {
    pub(crate) fn new(agent_combination: String, task_type: String, success: bool, now: DateTime<Utc>) -> Self {
        Self {
            agent_combination,
            task_types: vec![task_type],
            strength: 0.5,
            usage_count: 1,
            success_rate: if success { 1.0 } else { 0.0 },
            last_used: now,
        }
    }

    /// `strength * success_rate`, the ranking key for best-combination lookup.
    #[must_use]
    pub fn rank(&self) -> f64 {
        self.strength * self.success_rate
    }
}

/// Snapshot returned by `get_statistics`, summarising the pheromone store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PheromoneStats {
    /// Number of distinct task types with at least one trail.
    pub task_types: usize,
    /// Number of distinct agent combinations tracked.
    pub agent_combinations: usize,
    /// Total trails across all task types.
    pub total_trails: usize,
    /// Top 5 trails by rank, across all task types.
    pub strongest_trails: Vec<PheromoneTrail>,
    /// Top 5 agent combinations by rank.
    pub best_agents: Vec<AgentPheromone>,
    /// Composite `[0,1]` health score.
    pub system_health: f64,
}
