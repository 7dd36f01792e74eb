use std::collections::{BTreeSet, HashMap, HashSet};

use anyhow::{ensure, Result};
use tracing::{debug, instrument, trace};

use super::{
    construct_path, earliest_goal_time, heuristic_focal, search_horizon, successors,
    validate_endpoints, Trace,
};
use crate::common::{Agent, Constraint, FocalNode, OpenNode, Path};
use crate::environment::Environment;
use crate::point::Point;
use crate::stat::Stats;

/// Bounded-suboptimal Space-Time A*. The open set keeps the admissible
/// ordering; a focal subset (`f <= w * f_min`) is popped by d score, the
/// count of conflicts against the reservation table, so the search trades
/// at most a factor `w` of length for staying out of other agents' way.
pub struct SpaceTimeAstarEpsilon {
    env: Environment,
    agent: Agent,
    subopt_factor: f64,
    stats: Stats,
}

impl SpaceTimeAstarEpsilon {
    pub fn new(start: Point, goal: Point, env: &Environment, subopt_factor: f64) -> Result<Self> {
        validate_endpoints(env, start, goal)?;
        ensure!(
            subopt_factor >= 1.0,
            "suboptimality factor must be at least 1.0, got {subopt_factor}"
        );
        Ok(SpaceTimeAstarEpsilon {
            env: env.clone(),
            agent: Agent { id: 0, start, goal },
            subopt_factor,
            stats: Stats::default(),
        })
    }

    /// A path of length at most `w * f_min` together with `f_min`, the
    /// lower bound on any path length the constraints admit, or `None`
    /// when no path exists. `reservation` holds the committed paths of
    /// the other agents; empty slots are cleared reservations.
    pub fn plan(
        &mut self,
        constraints: &[Constraint],
        reservation: &[Path],
    ) -> Option<(Path, usize)> {
        let constraints: HashSet<Constraint> = constraints.iter().cloned().collect();
        focal_space_time_a_star(
            &self.env,
            &self.agent,
            self.subopt_factor,
            &constraints,
            reservation,
            &mut self.stats,
        )
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }
}

#[instrument(skip_all, name = "focal_space_time_a_star", fields(agent = agent.id, subopt_factor, start = %agent.start, goal = %agent.goal), level = "debug")]
pub(crate) fn focal_space_time_a_star(
    env: &Environment,
    agent: &Agent,
    subopt_factor: f64,
    constraints: &HashSet<Constraint>,
    reservation: &[Path],
    stats: &mut Stats,
) -> Option<(Path, usize)> {
    let horizon = search_horizon(env, constraints);
    let earliest_goal = earliest_goal_time(env, agent.goal, constraints)?;
    debug!("constraints: {constraints:?}, horizon: {horizon}, earliest goal time: {earliest_goal}");

    let mut open = BTreeSet::new();
    let mut focal = BTreeSet::new();
    let mut closed = HashSet::new();
    let mut trace: Trace = HashMap::new();
    // d scores of generated nodes, kept for later focal admissions.
    let mut d_scores: HashMap<(Point, usize), usize> = HashMap::new();

    let start_h = agent.start.manhattan_distance(&agent.goal);
    open.insert(OpenNode {
        cell: agent.start,
        time: 0,
        f_score: start_h,
    });
    focal.insert(FocalNode {
        cell: agent.start,
        time: 0,
        f_score: start_h,
        d_score: 0,
    });
    d_scores.insert((agent.start, 0), 0);

    let mut f_min = start_h;

    while let Some(current) = focal.pop_first() {
        trace!("expand node: {current:?}");
        stats.low_level_expand_focal_nodes += 1;

        // The node being selected is still in the open set here, so this
        // minimum is the lower bound the caller may rely on.
        f_min = f_min.max(open.first().expect("focal is a subset of open").f_score);
        assert!(open.remove(&current.open_key()));
        closed.insert((current.cell, current.time));

        if current.cell == agent.goal && current.time >= earliest_goal {
            debug!("found path with f min {f_min}");
            let path = construct_path(&trace, (current.cell, current.time));
            return Some((path, f_min + 1));
        }

        let next_time = current.time + 1;
        if next_time <= horizon {
            for next_cell in successors(current.cell) {
                if !env.is_valid_state(next_cell, next_time) {
                    continue;
                }
                if closed.contains(&(next_cell, next_time)) {
                    continue;
                }
                if constraints.iter().any(|constraint| {
                    constraint.forbids(current.cell, next_cell, current.time, next_time)
                }) {
                    continue;
                }

                let f_score = next_time + next_cell.manhattan_distance(&agent.goal);
                if open.insert(OpenNode {
                    cell: next_cell,
                    time: next_time,
                    f_score,
                }) {
                    let d_score = heuristic_focal(next_cell, current.cell, next_time, reservation);
                    d_scores.insert((next_cell, next_time), d_score);
                    trace.insert((next_cell, next_time), (current.cell, current.time));

                    if f_score as f64 <= f_min as f64 * subopt_factor {
                        focal.insert(FocalNode {
                            cell: next_cell,
                            time: next_time,
                            f_score,
                            d_score,
                        });
                    }
                }
            }
        }

        // The open minimum may have risen; admit the band of nodes that
        // just became focal-eligible. f_min itself is refreshed at the
        // next pop.
        if let Some(first) = open.first() {
            let new_f_min = first.f_score;
            if f_min < new_f_min {
                for node in &open {
                    if node.f_score as f64 > new_f_min as f64 * subopt_factor {
                        break;
                    }
                    if node.f_score as f64 > f_min as f64 * subopt_factor {
                        focal.insert(FocalNode {
                            cell: node.cell,
                            time: node.time,
                            f_score: node.f_score,
                            d_score: d_scores[&(node.cell, node.time)],
                        });
                    }
                }
            }
        }
    }

    debug!("cannot find path within horizon {horizon}");
    None
}
