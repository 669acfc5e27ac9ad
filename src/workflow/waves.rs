//! Dependency wave layering (Kahn's algorithm).
//!
//! A wave is every not-yet-scheduled step whose dependencies all sit in
//! earlier waves. If steps remain but no wave can be formed, the leftover
//! steps are in or behind a cycle. This is the one cycle check; validation
//! uses it too.

use std::collections::HashMap;

use super::definition::WorkflowStep;

/// Result of layering a dependency graph given by step indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layering {
    /// Waves of step indices, each in ascending (definition) order
    pub waves: Vec<Vec<usize>>,
    /// Steps that could not be scheduled
    pub stuck: Vec<usize>,
}

impl Layering {
    pub fn is_acyclic(&self) -> bool {
        self.stuck.is_empty()
    }
}

/// Layer a graph where `dependencies[i]` lists the indices step `i` waits on.
///
/// Out-of-range indices are ignored; repeated entries count once.
pub fn layer(dependencies: &[Vec<usize>]) -> Layering {
    let n = dependencies.len();
    let mut in_degree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (step, deps) in dependencies.iter().enumerate() {
        let mut seen = Vec::with_capacity(deps.len());
        for &dep in deps.iter().filter(|&&d| d < n) {
            if seen.contains(&dep) {
                continue;
            }
            seen.push(dep);
            in_degree[step] += 1;
            dependents[dep].push(step);
        }
    }

    let mut current: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut waves = Vec::new();
    let mut scheduled = 0;

    while !current.is_empty() {
        let mut next = Vec::new();
        for &step in &current {
            for &dependent in &dependents[step] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }
        next.sort_unstable();
        scheduled += current.len();
        waves.push(std::mem::replace(&mut current, next));
    }

    let stuck = if scheduled == n {
        Vec::new()
    } else {
        (0..n).filter(|&i| in_degree[i] > 0).collect()
    };
    Layering { waves, stuck }
}

/// Map each step's `depends_on` ids to indices, dropping unknown ids.
///
/// When ids repeat, references resolve to the first step with that id.
pub fn dependency_indices(steps: &[WorkflowStep]) -> Vec<Vec<usize>> {
    let mut by_id: HashMap<&str, usize> = HashMap::new();
    for (i, step) in steps.iter().enumerate() {
        by_id.entry(step.id.as_str()).or_insert(i);
    }
    steps
        .iter()
        .map(|step| step.depends_on.iter().filter_map(|d| by_id.get(d.as_str()).copied()).collect())
        .collect()
}

/// Compute execution waves as step ids.
///
/// Returns the ids of the unschedulable steps when the graph has a cycle.
pub fn compute_waves(steps: &[WorkflowStep]) -> Result<Vec<Vec<String>>, Vec<String>> {
    let layering = layer(&dependency_indices(steps));
    let ids = |indices: &[usize]| -> Vec<String> {
        indices.iter().map(|&i| steps[i].id.clone()).collect()
    };
    if layering.is_acyclic() {
        Ok(layering.waves.iter().map(|wave| ids(wave.as_slice())).collect())
    } else {
        Err(ids(&layering.stuck))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, deps: &[&str]) -> WorkflowStep {
        WorkflowStep::new(id, id, "").depends_on(deps.iter().copied())
    }

    #[test]
    fn test_diamond() {
        let steps = vec![
            step("a", &[]),
            step("b", &["a"]),
            step("c", &["a"]),
            step("d", &["b", "c"]),
        ];
        let waves = compute_waves(&steps).unwrap();
        assert_eq!(waves, vec![vec!["a"], vec!["b", "c"], vec!["d"]]);
    }

    #[test]
    fn test_independent_steps_share_first_wave() {
        let steps = vec![step("x", &[]), step("y", &[]), step("z", &["x"])];
        let waves = compute_waves(&steps).unwrap();
        assert_eq!(waves, vec![vec!["x", "y"], vec!["z"]]);
    }

    #[test]
    fn test_wave_invariants_hold() {
        let steps = vec![
            step("e", &["d", "a"]),
            step("d", &["c"]),
            step("c", &["a", "b"]),
            step("b", &[]),
            step("a", &[]),
        ];
        let layering = layer(&dependency_indices(&steps));
        assert!(layering.is_acyclic());

        let mut wave_of = vec![usize::MAX; steps.len()];
        for (w, wave) in layering.waves.iter().enumerate() {
            for &i in wave {
                assert_eq!(wave_of[i], usize::MAX, "step scheduled twice");
                wave_of[i] = w;
            }
        }
        assert!(wave_of.iter().all(|&w| w != usize::MAX));
        for (i, deps) in dependency_indices(&steps).iter().enumerate() {
            for &d in deps {
                assert!(wave_of[i] > wave_of[d]);
            }
        }
    }

    #[test]
    fn test_cycle_reports_stuck_steps() {
        let steps = vec![step("a", &[]), step("b", &["c"]), step("c", &["b"]), step("d", &["c"])];
        let stuck = compute_waves(&steps).unwrap_err();
        assert_eq!(stuck, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        assert_eq!(compute_waves(&[step("a", &["a"])]).unwrap_err(), vec!["a"]);
    }

    #[test]
    fn test_unknown_and_repeated_dependencies() {
        let steps = vec![step("a", &[]), step("b", &["a", "a", "ghost"])];
        assert_eq!(compute_waves(&steps).unwrap(), vec![vec!["a"], vec!["b"]]);
    }

    #[test]
    fn test_empty_graph() {
        assert_eq!(layer(&[]), Layering::default());
    }
}
