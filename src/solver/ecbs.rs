use std::collections::BTreeSet;
use std::time::Instant;

use anyhow::{ensure, Result};
use tracing::debug;

use super::Solver;
use crate::algorithm::validate_endpoints;
use crate::common::{Agent, EcbsOpenNode, HighLevelOpenNode, Solution};
use crate::environment::Environment;
use crate::point::Point;
use crate::stat::Stats;

/// Enhanced CBS: focal search at both levels. The high-level open set is
/// ordered by lower bound, its focal subset (`cost <= w * min_lower_bound`)
/// by conflict count, and every low-level replan runs the focal search
/// against the node's own joint solution. The returned cost is within a
/// factor `w` of the optimum.
pub struct ECBS {
    agents: Vec<Agent>,
    env: Environment,
    subopt_factor: f64,
    stats: Stats,
}

impl ECBS {
    pub fn new(
        starts: Vec<Point>,
        goals: Vec<Point>,
        env: &Environment,
        subopt_factor: f64,
    ) -> Result<Self> {
        ensure!(
            starts.len() == goals.len(),
            "lengths of start points and goal points are not the same: {} != {}",
            starts.len(),
            goals.len()
        );
        ensure!(!starts.is_empty(), "at least one agent is required");
        ensure!(
            subopt_factor >= 1.0,
            "suboptimality factor must be at least 1.0, got {subopt_factor}"
        );

        let mut agents = Vec::with_capacity(starts.len());
        for (id, (start, goal)) in starts.into_iter().zip(goals).enumerate() {
            validate_endpoints(env, start, goal)?;
            agents.push(Agent { id, start, goal });
        }

        Ok(ECBS {
            agents,
            env: env.clone(),
            subopt_factor,
            stats: Stats::default(),
        })
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// The joint solution together with the terminal `min_lower_bound`,
    /// against which the guarantee `cost <= w * min_lower_bound` holds.
    pub fn solve_with_bound(&mut self) -> Option<(Solution, usize)> {
        let solve_start = Instant::now();
        let mut open: BTreeSet<EcbsOpenNode> = BTreeSet::new();
        let mut focal = BTreeSet::new();

        let root = HighLevelOpenNode::new(
            &self.agents,
            &self.env,
            Some(self.subopt_factor),
            &mut self.stats,
        )?;
        let mut min_lower_bound = root.lower_bound();
        focal.insert(root.to_focal());
        open.insert(EcbsOpenNode(root));

        while !open.is_empty() {
            // Maintain the focal set before selecting: a risen lower
            // bound widens the cost band it admits.
            let new_min_lower_bound = open
                .first()
                .map(|node| node.0.lower_bound())
                .expect("open is not empty");
            if min_lower_bound < new_min_lower_bound {
                for EcbsOpenNode(node) in &open {
                    let cost = node.cost as f64;
                    if cost >= self.subopt_factor * min_lower_bound as f64
                        && cost <= self.subopt_factor * new_min_lower_bound as f64
                    {
                        focal.insert(node.to_focal());
                    }
                }
                min_lower_bound = new_min_lower_bound;
            }

            let current = focal
                .pop_first()
                .expect("every open node within the bound sits in focal")
                .node;
            assert!(open.remove(&EcbsOpenNode(current.clone())));

            if current.conflicts.is_empty() {
                self.stats.costs = current.cost;
                self.stats.time_us = solve_start.elapsed().as_micros() as usize;
                self.stats.report("ecbs");
                return Some((
                    Solution {
                        paths: current.paths,
                    },
                    min_lower_bound,
                ));
            }

            let conflict = current.conflicts[0].clone();
            debug!("resolve conflict {conflict:?}");
            for resolve_first in [true, false] {
                if let Some(child) = current.update_constraint(
                    &conflict,
                    resolve_first,
                    &self.env,
                    Some(self.subopt_factor),
                    &mut self.stats,
                ) {
                    self.stats.high_level_expand_nodes += 1;
                    if child.cost as f64 <= self.subopt_factor * min_lower_bound as f64 {
                        focal.insert(child.to_focal());
                    }
                    open.insert(EcbsOpenNode(child));
                }
            }
        }

        None
    }
}

impl Solver for ECBS {
    fn solve(&mut self) -> Option<Solution> {
        self.solve_with_bound().map(|(solution, _)| solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{state_at, Path};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .try_init();
    }

    fn open_env(limits: Vec<i32>) -> Environment {
        let dimension = limits.len();
        Environment::new(dimension, limits, Vec::new()).unwrap()
    }

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

    #[test]
    fn test_head_on_agents_within_bound() {
        init_tracing();
        let env = open_env(vec![3, 3]);
        let mut solver = ECBS::new(
            vec![Point::new_2d(0, 0), Point::new_2d(2, 0)],
            vec![Point::new_2d(2, 0), Point::new_2d(0, 0)],
            &env,
            1.5,
        )
        .unwrap();

        let (solution, bound) = solver.solve_with_bound().unwrap();
        assert_conflict_free(&solution.paths);
        let cost: usize = solution.paths.iter().map(Vec::len).sum();
        assert_eq!(cost, solver.stats().costs);
        assert!(cost as f64 <= 1.5 * bound as f64);
    }

    #[test]
    fn test_three_crossing_agents_within_bound() {
        init_tracing();
        let env = open_env(vec![4, 4]);
        let starts = vec![Point::new_2d(0, 1), Point::new_2d(3, 1), Point::new_2d(1, 0)];
        let goals = vec![Point::new_2d(3, 1), Point::new_2d(0, 1), Point::new_2d(1, 3)];
        let mut solver = ECBS::new(starts.clone(), goals.clone(), &env, 1.5).unwrap();

        let (solution, bound) = solver.solve_with_bound().unwrap();
        assert_conflict_free(&solution.paths);
        for (agent, path) in solution.paths.iter().enumerate() {
            assert_eq!(path[0], (starts[agent], 0));
            assert_eq!(*path.last().unwrap(), (goals[agent], path.len() - 1));
        }
        let cost: usize = solution.paths.iter().map(Vec::len).sum();
        assert!(cost as f64 <= 1.5 * bound as f64);
    }

    #[test]
    fn test_reduces_to_optimal_at_w_one() {
        init_tracing();
        let env = open_env(vec![3, 3]);
        let mut solver = ECBS::new(
            vec![Point::new_2d(0, 0), Point::new_2d(2, 0)],
            vec![Point::new_2d(2, 0), Point::new_2d(0, 0)],
            &env,
            1.0,
        )
        .unwrap();

        let (solution, bound) = solver.solve_with_bound().unwrap();
        assert_conflict_free(&solution.paths);
        let cost: usize = solution.paths.iter().map(Vec::len).sum();
        // At w = 1 the head-on pair costs what CBS would charge, and the
        // reported lower bound closes the gap completely.
        assert_eq!(cost, 8);
        assert_eq!(bound, 8);
    }

    #[test]
    fn test_cost_is_bounded_by_the_optimum() {
        init_tracing();
        let env = open_env(vec![3, 3]);
        let starts = vec![Point::new_2d(0, 0), Point::new_2d(2, 0)];
        let goals = vec![Point::new_2d(2, 0), Point::new_2d(0, 0)];

        let mut cbs = crate::solver::CBS::new(starts.clone(), goals.clone(), &env).unwrap();
        let optimum: usize = cbs
            .solve()
            .unwrap()
            .paths
            .iter()
            .map(Vec::len)
            .sum();

        let mut ecbs = ECBS::new(starts, goals, &env, 1.5).unwrap();
        let (solution, _) = ecbs.solve_with_bound().unwrap();
        let cost: usize = solution.paths.iter().map(Vec::len).sum();
        assert!(cost as f64 <= 1.5 * optimum as f64);
    }

    #[test]
    fn test_solver_trait_drops_the_bound() {
        init_tracing();
        let env = open_env(vec![5, 5]);
        let mut solver = ECBS::new(
            vec![Point::new_2d(0, 0)],
            vec![Point::new_2d(4, 4)],
            &env,
            2.0,
        )
        .unwrap();

        let solution = solver.solve().unwrap();
        assert_eq!(solution.paths[0].len(), 9);
    }

    #[test]
    fn test_construction_validation() {
        let env = open_env(vec![4, 4]);
        assert!(ECBS::new(
            vec![Point::new_2d(0, 0)],
            vec![Point::new_2d(1, 1)],
            &env,
            0.5,
        )
        .is_err());
        assert!(ECBS::new(
            vec![Point::new_2d(0, 0), Point::new_2d(1, 1)],
            vec![Point::new_2d(2, 2)],
            &env,
            1.5,
        )
        .is_err());
    }
}
