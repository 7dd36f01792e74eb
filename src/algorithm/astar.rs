use std::collections::{BTreeSet, HashMap, HashSet};

use anyhow::Result;
use tracing::{debug, instrument, trace};

use super::{
    construct_path, earliest_goal_time, search_horizon, successors, validate_endpoints, Trace,
};
use crate::common::{Agent, Constraint, OpenNode, Path};
use crate::environment::Environment;
use crate::point::Point;
use crate::stat::Stats;

/// Single-agent Space-Time A*. Plans through `(cell, time)` states under
/// per-agent vertex and edge constraints; every returned path has minimum
/// length among those the constraints admit.
pub struct SpaceTimeAstar {
    env: Environment,
    agent: Agent,
    stats: Stats,
}

impl SpaceTimeAstar {
    pub fn new(start: Point, goal: Point, env: &Environment) -> Result<Self> {
        validate_endpoints(env, start, goal)?;
        Ok(SpaceTimeAstar {
            env: env.clone(),
            agent: Agent { id: 0, start, goal },
            stats: Stats::default(),
        })
    }

    /// A minimum-length path from `(start, 0)` to the goal, or `None`
    /// when the constraints leave no path within the completeness
    /// horizon.
    pub fn plan(&mut self, constraints: &[Constraint]) -> Option<Path> {
        let constraints: HashSet<Constraint> = constraints.iter().cloned().collect();
        space_time_a_star(&self.env, &self.agent, &constraints, &mut self.stats)
            .map(|(path, _)| path)
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }
}

#[instrument(skip_all, name = "space_time_a_star", fields(agent = agent.id, start = %agent.start, goal = %agent.goal), level = "debug")]
pub(crate) fn space_time_a_star(
    env: &Environment,
    agent: &Agent,
    constraints: &HashSet<Constraint>,
    stats: &mut Stats,
) -> Option<(Path, usize)> {
    let horizon = search_horizon(env, constraints);
    let earliest_goal = earliest_goal_time(env, agent.goal, constraints)?;
    debug!("constraints: {constraints:?}, horizon: {horizon}, earliest goal time: {earliest_goal}");

    let mut open = BTreeSet::new();
    let mut closed = HashSet::new();
    let mut trace: Trace = HashMap::new();

    open.insert(OpenNode {
        cell: agent.start,
        time: 0,
        f_score: agent.start.manhattan_distance(&agent.goal),
    });

    while let Some(current) = open.pop_first() {
        trace!("expand node: {current:?}");
        stats.low_level_expand_open_nodes += 1;

        if current.cell == agent.goal && current.time >= earliest_goal {
            let path = construct_path(&trace, (current.cell, current.time));
            // The path length is also the lower bound the high level
            // records: nothing shorter was admissible.
            return Some((path, current.time + 1));
        }

        closed.insert((current.cell, current.time));

        let next_time = current.time + 1;
        if next_time > horizon {
            continue;
        }

        for next_cell in successors(current.cell) {
            if !env.is_valid_state(next_cell, next_time) {
                continue;
            }
            if closed.contains(&(next_cell, next_time)) {
                continue;
            }
            if constraints
                .iter()
                .any(|constraint| constraint.forbids(current.cell, next_cell, current.time, next_time))
            {
                continue;
            }

            let f_score = next_time + next_cell.manhattan_distance(&agent.goal);
            // Re-generating a known (cell, time) state changes nothing:
            // g equals time, so the first parent is as good as any.
            if open.insert(OpenNode {
                cell: next_cell,
                time: next_time,
                f_score,
            }) {
                trace.insert((next_cell, next_time), (current.cell, current.time));
            }
        }
    }

    debug!("cannot find path within horizon {horizon}");
    None
}
