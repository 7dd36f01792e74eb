mod astar;
mod astarfocal;

pub use astar::SpaceTimeAstar;
pub use astarfocal::SpaceTimeAstarEpsilon;
pub(crate) use astar::space_time_a_star;
pub(crate) use astarfocal::focal_space_time_a_star;

use std::collections::{HashMap, HashSet};

use anyhow::{ensure, Result};

use crate::common::{state_at, Constraint, Path};
use crate::environment::{Environment, Obstacle};
use crate::point::Point;

type Trace = HashMap<(Point, usize), (Point, usize)>;

fn construct_path(trace: &Trace, goal_state: (Point, usize)) -> Path {
    let mut current = goal_state;
    let mut path = vec![current];
    while let Some(&previous) = trace.get(&current) {
        path.push(previous);
        current = previous;
    }
    path.reverse();
    path
}

/// Successor cells of one search state: unit moves first, wait last.
fn successors(cell: Point) -> Vec<Point> {
    let mut moves = cell.neighbors();
    moves.push(cell);
    moves
}

/// Upper time bound that preserves completeness: once past every finite
/// prohibition, revisiting any of the `|V|` cells can only close a cycle,
/// so no solution needs more steps than this.
fn search_horizon(env: &Environment, constraints: &HashSet<Constraint>) -> usize {
    let latest_constraint = constraints
        .iter()
        .map(Constraint::latest_time)
        .max()
        .unwrap_or(0);
    env.cell_count() + latest_constraint.max(env.latest_finite_obstacle_end()) + 1
}

/// Conflicts a freshly generated `(cell, time)` state introduces against
/// the reservation table. An empty slot is a cleared reservation. Vertex:
/// a committed path (agents stay parked at their goal once finished)
/// stands on this cell now. Edge: a committed path crosses the edge from
/// the parent the opposite way.
fn heuristic_focal(cell: Point, prev_cell: Point, time: usize, reservation: &[Path]) -> usize {
    debug_assert_ne!(time, 0);

    let mut conflict_count = 0;
    for path in reservation {
        if path.is_empty() {
            continue;
        }

        if state_at(path, time) == cell {
            conflict_count += 1;
        }

        if path.len() <= time {
            continue;
        }
        if path[time - 1].0 == cell && path[time].0 == prev_cell {
            conflict_count += 1;
        }
    }

    conflict_count
}

/// Earliest time at which the agent may come to rest on its goal. A path
/// ends with the agent parked on the goal cell forever (the padding rule
/// the conflict detector applies), so arrival must postdate every vertex
/// prohibition and every finite obstacle window on that cell. `None`
/// means the goal can never be held: some obstacle blocks it forever.
fn earliest_goal_time(
    env: &Environment,
    goal: Point,
    constraints: &HashSet<Constraint>,
) -> Option<usize> {
    let mut earliest = 0;

    for constraint in constraints {
        if let Constraint::Vertex { cell, time } = constraint {
            if *cell == goal {
                earliest = earliest.max(time + 1);
            }
        }
    }

    for obstacle in env.obstacles() {
        if obstacle.cell() != goal {
            continue;
        }
        match obstacle {
            Obstacle::Static { .. } => return None,
            Obstacle::Dynamic { window, .. } => match window.end {
                Some(end) => earliest = earliest.max(end + 1),
                None => return None,
            },
        }
    }

    Some(earliest)
}

/// Construction-time endpoint checks shared by every planner: matching
/// dimension, in bounds, and obstacle-free at time 0.
pub(crate) fn validate_endpoints(env: &Environment, start: Point, goal: Point) -> Result<()> {
    for (name, cell) in [("start", start), ("goal", goal)] {
        ensure!(
            cell.dimension() == env.dimension(),
            "dimension {} does not match the {name} point {cell}",
            env.dimension()
        );
        ensure!(
            env.in_bounds(cell),
            "{name} point {cell} is outside the space limit {:?}",
            env.space_limit()
        );
        ensure!(
            env.is_valid_state(cell, 0),
            "{name} point {cell} is blocked by an obstacle"
        );
    }
    Ok(())
}
