use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::debug;

use crate::algorithm::{focal_space_time_a_star, space_time_a_star};
use crate::common::{Agent, Path};
use crate::environment::Environment;
use crate::point::Point;
use crate::stat::Stats;

/// A per-agent prohibition. The owning agent is implied by the constraint
/// list the value lives in, so it is not repeated here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Constraint {
    /// The agent must not occupy `cell` at `time`.
    Vertex { cell: Point, time: usize },
    /// The agent must not move `from -> to` across `times = (t, t + 1)`.
    Edge {
        from: Point,
        to: Point,
        times: (usize, usize),
    },
}

impl Constraint {
    pub(crate) fn forbids(
        &self,
        prev_cell: Point,
        next_cell: Point,
        prev_time: usize,
        next_time: usize,
    ) -> bool {
        match self {
            Constraint::Vertex { cell, time } => next_cell == *cell && next_time == *time,
            Constraint::Edge { from, to, times } => {
                prev_cell == *from && next_cell == *to && (prev_time, next_time) == *times
            }
        }
    }

    pub(crate) fn latest_time(&self) -> usize {
        match self {
            Constraint::Vertex { time, .. } => *time,
            Constraint::Edge { times, .. } => times.1,
        }
    }
}

/// A violation between exactly two agents in a joint solution. `agents`
/// is ordered `(smaller, larger)`; for edge conflicts `moves` holds each
/// agent's own `(prev, next)` cells in the same order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Conflict {
    Vertex {
        agents: (usize, usize),
        cell: Point,
        time: usize,
    },
    Edge {
        agents: (usize, usize),
        moves: ((Point, Point), (Point, Point)),
        times: (usize, usize),
    },
}

impl Conflict {
    pub(crate) fn agents(&self) -> (usize, usize) {
        match self {
            Conflict::Vertex { agents, .. } | Conflict::Edge { agents, .. } => *agents,
        }
    }

    /// The constraint that forbids this conflict for its first
    /// (`resolve_first`) or second agent.
    pub(crate) fn constraint_for(&self, resolve_first: bool) -> Constraint {
        match self {
            Conflict::Vertex { cell, time, .. } => Constraint::Vertex {
                cell: *cell,
                time: *time,
            },
            Conflict::Edge { moves, times, .. } => {
                let (from, to) = if resolve_first { moves.0 } else { moves.1 };
                Constraint::Edge {
                    from,
                    to,
                    times: *times,
                }
            }
        }
    }
}

/// Where an agent stands at `time`, with finished agents waiting at their
/// last cell forever.
pub(crate) fn state_at(path: &Path, time: usize) -> Point {
    path.get(time)
        .unwrap_or_else(|| path.last().expect("paths are never empty"))
        .0
}

/// A constraint-tree node: per-agent constraint sets, one path per agent,
/// and the bookkeeping both high-level searches need. Children own deep
/// copies of `constraints` and `paths`, so appending a constraint in one
/// child is invisible to its sibling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HighLevelOpenNode {
    pub(crate) agents: Vec<Agent>,
    pub(crate) constraints: Vec<HashSet<Constraint>>,
    pub(crate) conflicts: Vec<Conflict>,
    pub(crate) paths: Vec<Path>,
    pub(crate) cost: usize,
    pub(crate) f_mins: Vec<usize>,
}

impl Ord for HighLevelOpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost
            .cmp(&other.cost)
            .then_with(|| self.conflicts.cmp(&other.conflicts))
            // Paths still matter: two nodes with equal cost and conflicts
            // are only interchangeable if their solutions agree.
            .then_with(|| self.paths.cmp(&other.paths))
    }
}

impl PartialOrd for HighLevelOpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl HighLevelOpenNode {
    /// Root construction. `subopt = None` plans every agent with optimal
    /// space-time A*; `Some(w)` plans them in order with the focal search,
    /// each finished path committed so later agents see it in their
    /// d score. Returns `None` when any agent has no path at all.
    pub(crate) fn new(
        agents: &[Agent],
        env: &Environment,
        subopt: Option<f64>,
        stats: &mut Stats,
    ) -> Option<Self> {
        let mut paths: Vec<Path> = Vec::new();
        let mut f_mins = Vec::new();
        let mut total_cost = 0;

        for agent in agents {
            let (path, f_min) = match subopt {
                None => space_time_a_star(env, agent, &HashSet::new(), stats),
                Some(w) => focal_space_time_a_star(env, agent, w, &HashSet::new(), &paths, stats),
            }?;

            total_cost += path.len();
            paths.push(path);
            f_mins.push(f_min);
        }

        let mut root = HighLevelOpenNode {
            agents: agents.to_vec(),
            constraints: vec![HashSet::new(); agents.len()],
            conflicts: Vec::new(),
            paths,
            cost: total_cost,
            f_mins,
        };
        root.detect_conflicts();

        debug!("high level root node {root:?}");
        Some(root)
    }

    /// Scan the joint solution in the canonical order: every vertex
    /// conflict (agent pairs in lexicographic order, time ascending from
    /// 0, shorter paths padded at their last cell), then every edge
    /// conflict. The first element is the conflict the search branches
    /// on; the list length is the ECBS focal heuristic.
    pub(crate) fn detect_conflicts(&mut self) {
        let mut conflicts = Vec::new();

        for i in 0..self.agents.len() {
            for j in (i + 1)..self.agents.len() {
                let path_i = &self.paths[i];
                let path_j = &self.paths[j];
                let max_length = path_i.len().max(path_j.len());

                for time in 0..max_length {
                    let cell_i = state_at(path_i, time);
                    let cell_j = state_at(path_j, time);
                    if cell_i == cell_j {
                        conflicts.push(Conflict::Vertex {
                            agents: (i, j),
                            cell: cell_i,
                            time,
                        });
                    }
                }
            }
        }

        for i in 0..self.agents.len() {
            for j in (i + 1)..self.agents.len() {
                let path_i = &self.paths[i];
                let path_j = &self.paths[j];
                let max_length = path_i.len().max(path_j.len());

                for time in 0..max_length.saturating_sub(1) {
                    let prev_i = state_at(path_i, time);
                    let next_i = state_at(path_i, time + 1);
                    let prev_j = state_at(path_j, time);
                    let next_j = state_at(path_j, time + 1);

                    if prev_i == next_j && prev_j == next_i {
                        conflicts.push(Conflict::Edge {
                            agents: (i, j),
                            moves: ((prev_i, next_i), (prev_j, next_j)),
                            times: (time, time + 1),
                        });
                    }
                }
            }
        }

        debug!("detect conflicts: {conflicts:?}");
        self.conflicts = conflicts;
    }

    /// Build the child that resolves `conflict` against one of its agents.
    /// The chosen agent gets the conflict's constraint appended and is
    /// replanned under its accumulated constraints; everything else is a
    /// deep copy. Returns `None` when the constraint is already active
    /// (the child could only repeat this node) or when the replan fails.
    pub(crate) fn update_constraint(
        &self,
        conflict: &Conflict,
        resolve_first: bool,
        env: &Environment,
        subopt: Option<f64>,
        stats: &mut Stats,
    ) -> Option<Self> {
        let (first, second) = conflict.agents();
        let agent_id = if resolve_first { first } else { second };
        let constraint = conflict.constraint_for(resolve_first);

        let mut new_constraints = self.constraints.clone();
        if !new_constraints[agent_id].insert(constraint) {
            debug!("skip child for agent {agent_id}: constraint already active");
            return None;
        }

        let (new_path, new_f_min) = match subopt {
            None => space_time_a_star(
                env,
                &self.agents[agent_id],
                &new_constraints[agent_id],
                stats,
            ),
            Some(w) => {
                // Reservation discipline: the replanned agent's slot is
                // cleared so its d score reflects the rest of this node's
                // joint solution.
                let mut reservation = self.paths.clone();
                reservation[agent_id] = Vec::new();
                focal_space_time_a_star(
                    env,
                    &self.agents[agent_id],
                    w,
                    &new_constraints[agent_id],
                    &reservation,
                    stats,
                )
            }
        }?;

        debug!(
            "update agent {agent_id} with path {new_path:?} for conflict {conflict:?}, new f min {new_f_min}"
        );

        let mut new_paths = self.paths.clone();
        let new_cost = self.cost - new_paths[agent_id].len() + new_path.len();
        new_paths[agent_id] = new_path;

        let mut new_f_mins = self.f_mins.clone();
        new_f_mins[agent_id] = new_f_min;

        let mut child = HighLevelOpenNode {
            agents: self.agents.clone(),
            constraints: new_constraints,
            conflicts: Vec::new(),
            paths: new_paths,
            cost: new_cost,
            f_mins: new_f_mins,
        };
        child.detect_conflicts();

        Some(child)
    }

    pub(crate) fn lower_bound(&self) -> usize {
        self.f_mins.iter().sum()
    }

    pub(crate) fn to_focal(&self) -> HighLevelFocalNode {
        HighLevelFocalNode {
            focal: self.conflicts.len(),
            node: self.clone(),
        }
    }
}

/// Focal-set wrapper: fewest conflicts first, then cheapest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HighLevelFocalNode {
    pub(crate) focal: usize,
    pub(crate) node: HighLevelOpenNode,
}

impl Ord for HighLevelFocalNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.focal
            .cmp(&other.focal)
            .then_with(|| self.node.cmp(&other.node))
    }
}

impl PartialOrd for HighLevelFocalNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// ECBS open-set wrapper: smallest lower bound first, so the set's first
/// element carries the `min_lower_bound` of the whole frontier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EcbsOpenNode(pub(crate) HighLevelOpenNode);

impl Ord for EcbsOpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .lower_bound()
            .cmp(&other.0.lower_bound())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for EcbsOpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
