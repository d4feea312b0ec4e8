//! Property tests for the pheromone memory invariants from spec.md §8.

use kittycore_core::{PheromoneConfig, PheromoneMemorySystem};
use proptest::prelude::*;

fn trail_strength(system: &PheromoneMemorySystem, task_type: &str, pattern: &str) -> Option<f64> {
    system
        .get_statistics()
        .strongest_trails
        .into_iter()
        .find(|trail| trail.task_type == task_type && trail.solution_pattern == pattern)
        .map(|trail| trail.strength)
}

proptest! {
    /// A successful outcome never decreases a trail's strength, and strictly
    /// increases it unless the trail is already saturated at 1.0.
    #[test]
    fn success_never_decreases_strength(successes in 1usize..20) {
        let dir = tempfile::tempdir().unwrap();
        let system = PheromoneMemorySystem::new(PheromoneConfig::default(), dir.path());

        let mut previous = None;
        for _ in 0..successes {
            system.record_solution_success("task", "pattern", "combo", &["tool".to_string()], true);
            let current = trail_strength(&system, "task", "pattern").unwrap();
            if let Some(prev) = previous {
                prop_assert!(current >= prev - 1e-9);
                if prev < 1.0 - 1e-9 {
                    prop_assert!(current > prev - 1e-9);
                }
            }
            previous = Some(current);
        }
    }

    /// A failed outcome never increases a trail's strength, and strictly
    /// decreases it unless the trail is already at the configured floor.
    #[test]
    fn failure_never_increases_strength(failures in 1usize..20) {
        let dir = tempfile::tempdir().unwrap();
        let config = PheromoneConfig::default();
        let min_strength = config.min_strength;
        let system = PheromoneMemorySystem::new(config, dir.path());

        system.record_solution_success("task", "pattern", "combo", &["tool".to_string()], true);

        let mut previous = trail_strength(&system, "task", "pattern").unwrap();
        for _ in 0..failures {
            system.record_solution_success("task", "pattern", "combo", &["tool".to_string()], false);
            let current = trail_strength(&system, "task", "pattern").unwrap();
            prop_assert!(current <= previous + 1e-9);
            if previous > min_strength + 1e-9 {
                prop_assert!(current < previous + 1e-9);
            }
            prop_assert!(current >= min_strength - 1e-9);
            previous = current;
        }
    }

    /// Repeated evaporation passes with no intervening activity never push a
    /// surviving trail's strength below the configured floor.
    #[test]
    fn evaporation_respects_the_floor(rounds in 1usize..30) {
        let dir = tempfile::tempdir().unwrap();
        let config = PheromoneConfig::default();
        let min_strength = config.min_strength;
        let system = PheromoneMemorySystem::new(config, dir.path());

        system.record_solution_success("task", "pattern", "combo", &["tool".to_string()], true);

        for _ in 0..rounds {
            system.evaporate_pheromones();
            if let Some(strength) = trail_strength(&system, "task", "pattern") {
                prop_assert!(strength >= min_strength - 1e-9);
            }
        }
    }

    /// Repeated ranking queries with no intervening writes return the exact
    /// same ordering.
    #[test]
    fn ranking_is_deterministic_between_writes(n in 2usize..6) {
        let dir = tempfile::tempdir().unwrap();
        let system = PheromoneMemorySystem::new(PheromoneConfig::default(), dir.path());

        for i in 0..n {
            let pattern = format!("pattern_{i}");
            let success = i % 2 == 0;
            system.record_solution_success("task", &pattern, "combo", &["tool".to_string()], success);
        }

        let first = system.get_best_solution_patterns("task", 10);
        for _ in 0..5 {
            let again = system.get_best_solution_patterns("task", 10);
            prop_assert_eq!(&first, &again);
        }
    }
}
