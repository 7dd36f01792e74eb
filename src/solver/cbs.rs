use std::collections::BTreeSet;
use std::time::Instant;

use anyhow::{ensure, Result};
use tracing::debug;

use super::Solver;
use crate::algorithm::validate_endpoints;
use crate::common::{Agent, HighLevelOpenNode, Solution};
use crate::environment::Environment;
use crate::point::Point;
use crate::stat::Stats;

/// Conflict-Based Search: best-first exploration of the constraint tree
/// by joint cost. The first conflict-free node dequeued is optimal in the
/// sum of path lengths.
pub struct CBS {
    agents: Vec<Agent>,
    env: Environment,
    stats: Stats,
}

impl CBS {
    pub fn new(starts: Vec<Point>, goals: Vec<Point>, env: &Environment) -> Result<Self> {
        ensure!(
            starts.len() == goals.len(),
            "lengths of start points and goal points are not the same: {} != {}",
            starts.len(),
            goals.len()
        );
        ensure!(!starts.is_empty(), "at least one agent is required");

        let mut agents = Vec::with_capacity(starts.len());
        for (id, (start, goal)) in starts.into_iter().zip(goals).enumerate() {
            validate_endpoints(env, start, goal)?;
            agents.push(Agent { id, start, goal });
        }

        Ok(CBS {
            agents,
            env: env.clone(),
            stats: Stats::default(),
        })
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }
}

impl Solver for CBS {
    fn solve(&mut self) -> Option<Solution> {
        let solve_start = Instant::now();
        let mut open = BTreeSet::new();

        let root = HighLevelOpenNode::new(&self.agents, &self.env, None, &mut self.stats)?;
        open.insert(root);

        while let Some(current) = open.pop_first() {
            let Some(conflict) = current.conflicts.first() else {
                self.stats.costs = current.cost;
                self.stats.time_us = solve_start.elapsed().as_micros() as usize;
                self.stats.report("cbs");
                return Some(Solution {
                    paths: current.paths,
                });
            };

            debug!("resolve conflict {conflict:?}");
            for resolve_first in [true, false] {
                if let Some(child) =
                    current.update_constraint(conflict, resolve_first, &self.env, None, &mut self.stats)
                {
                    open.insert(child);
                    self.stats.high_level_expand_nodes += 1;
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::common::{state_at, Path};
    use crate::environment::Obstacle;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .try_init();
    }

    fn open_env(limits: Vec<i32>) -> Environment {
        let dimension = limits.len();
        Environment::new(dimension, limits, Vec::new()).unwrap()
    }

    /// Padded pairwise conflict check, the property every joint solution
    /// must satisfy.
    fn assert_conflict_free(paths: &[Path]) {
        for i in 0..paths.len() {
            for j in (i + 1)..paths.len() {
                let max_length = paths[i].len().max(paths[j].len());
                for time in 0..max_length {
                    assert_ne!(
                        state_at(&paths[i], time),
                        state_at(&paths[j], time),
                        "vertex conflict between agents {i} and {j} at time {time}"
                    );
                }
                for time in 0..max_length.saturating_sub(1) {
                    assert!(
                        !(state_at(&paths[i], time) == state_at(&paths[j], time + 1)
                            && state_at(&paths[j], time) == state_at(&paths[i], time + 1)),
                        "edge conflict between agents {i} and {j} at times ({time}, {})",
                        time + 1
                    );
                }
            }
        }
    }

    fn assert_endpoints(paths: &[Path], starts: &[Point], goals: &[Point]) {
        for (agent, path) in paths.iter().enumerate() {
            assert_eq!(path[0], (starts[agent], 0));
            assert_eq!(*path.last().unwrap(), (goals[agent], path.len() - 1));
        }
    }

    #[test]
    fn test_single_agent_is_optimal() {
        init_tracing();
        let env = open_env(vec![5, 5]);
        let starts = vec![Point::new_2d(0, 0)];
        let goals = vec![Point::new_2d(4, 4)];
        let mut solver = CBS::new(starts.clone(), goals.clone(), &env).unwrap();

        let solution = solver.solve().unwrap();
        assert_endpoints(&solution.paths, &starts, &goals);
        assert_eq!(solution.paths[0].len(), 9);
        assert_eq!(solver.stats().costs, 9);
    }

    #[test]
    fn test_single_agent_already_at_goal() {
        init_tracing();
        let env = open_env(vec![5, 5]);
        let cell = Point::new_2d(0, 0);
        let mut solver = CBS::new(vec![cell], vec![cell], &env).unwrap();

        let solution = solver.solve().unwrap();
        assert_eq!(solution.paths[0], vec![(cell, 0)]);
    }

    #[test]
    fn test_head_on_agents_need_a_detour() {
        init_tracing();
        let env = open_env(vec![3, 3]);
        let starts = vec![Point::new_2d(0, 0), Point::new_2d(2, 0)];
        let goals = vec![Point::new_2d(2, 0), Point::new_2d(0, 0)];
        let mut solver = CBS::new(starts.clone(), goals.clone(), &env).unwrap();

        let solution = solver.solve().unwrap();
        assert_endpoints(&solution.paths, &starts, &goals);
        assert_conflict_free(&solution.paths);
        // Waiting cannot fix a swap; one agent goes around through y = 1.
        assert!(solution.paths.iter().any(|path| path.len() >= 4));
        assert_eq!(solver.stats().costs, 8);
    }

    #[test]
    fn test_parked_agent_forces_a_choice() {
        init_tracing();
        let env = open_env(vec![3, 2]);
        let starts = vec![Point::new_2d(0, 0), Point::new_2d(2, 0)];
        let goals = vec![Point::new_2d(1, 0), Point::new_2d(0, 0)];
        let mut solver = CBS::new(starts.clone(), goals.clone(), &env).unwrap();

        let solution = solver.solve().unwrap();
        assert_endpoints(&solution.paths, &starts, &goals);
        assert_conflict_free(&solution.paths);
        // Either the first agent arrives late over y = 1 or the second
        // swings around it; both cost 7 in total.
        assert_eq!(solver.stats().costs, 7);
    }

    #[test]
    fn test_independent_agents_keep_their_optima() {
        init_tracing();
        let env = open_env(vec![6, 6]);
        let starts = vec![Point::new_2d(0, 0), Point::new_2d(5, 5)];
        let goals = vec![Point::new_2d(2, 0), Point::new_2d(5, 2)];
        let mut solver = CBS::new(starts.clone(), goals.clone(), &env).unwrap();

        let solution = solver.solve().unwrap();
        assert_conflict_free(&solution.paths);
        assert_eq!(solver.stats().costs, 3 + 4);
    }

    #[test]
    fn test_three_dimensional_crossing() {
        init_tracing();
        let env = open_env(vec![2, 2, 2]);
        let starts = vec![Point::new_3d(0, 0, 0), Point::new_3d(1, 1, 1)];
        let goals = vec![Point::new_3d(1, 1, 1), Point::new_3d(0, 0, 0)];
        let mut solver = CBS::new(starts.clone(), goals.clone(), &env).unwrap();

        let solution = solver.solve().unwrap();
        assert_endpoints(&solution.paths, &starts, &goals);
        assert_conflict_free(&solution.paths);
    }

    #[test]
    fn test_root_failure_is_infeasible() {
        init_tracing();
        // The second agent's goal is walled off by static obstacles.
        let goal = Point::new_2d(4, 4);
        let obstacles = goal
            .neighbors()
            .into_iter()
            .map(|cell| Obstacle::Static { cell })
            .collect();
        let env = Environment::new(2, vec![5, 5], obstacles).unwrap();

        let mut solver = CBS::new(
            vec![Point::new_2d(0, 0), Point::new_2d(0, 4)],
            vec![Point::new_2d(0, 1), goal],
            &env,
        )
        .unwrap();
        assert!(solver.solve().is_none());
    }

    #[test]
    fn test_random_scenarios_stay_conflict_free() {
        init_tracing();
        let mut rng = StdRng::from_seed([3u8; 32]);

        for _ in 0..5 {
            let env = open_env(vec![5, 5]);
            let mut starts: Vec<Point> = Vec::new();
            let mut goals: Vec<Point> = Vec::new();
            while starts.len() < 3 {
                let start = Point::new_2d(rng.gen_range(0..5), rng.gen_range(0..5));
                let goal = Point::new_2d(rng.gen_range(0..5), rng.gen_range(0..5));
                if starts.contains(&start) || goals.contains(&goal) {
                    continue;
                }
                starts.push(start);
                goals.push(goal);
            }

            let mut solver = CBS::new(starts.clone(), goals.clone(), &env).unwrap();
            let solution = solver.solve().unwrap();
            assert_endpoints(&solution.paths, &starts, &goals);
            assert_conflict_free(&solution.paths);
        }
    }

    #[test]
    fn test_construction_validation() {
        let env = open_env(vec![4, 4]);
        assert!(CBS::new(
            vec![Point::new_2d(0, 0), Point::new_2d(1, 1)],
            vec![Point::new_2d(2, 2)],
            &env,
        )
        .is_err());
        assert!(CBS::new(Vec::new(), Vec::new(), &env).is_err());
        assert!(CBS::new(vec![Point::new_2d(0, 4)], vec![Point::new_2d(0, 0)], &env).is_err());
    }
}
