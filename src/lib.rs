//! Multi-agent path finding on bounded 2-D and 3-D grids: single-agent
//! Space-Time A* (optimal and focal), Conflict-Based Search, and its
//! bounded-suboptimal ECBS variant.

mod algorithm;
mod common;
mod config;
mod environment;
mod point;
mod solver;
mod stat;

pub use algorithm::{SpaceTimeAstar, SpaceTimeAstarEpsilon};
pub use common::{Agent, Conflict, Constraint, Path, Solution};
pub use config::{DynamicObstacleConfig, ScenarioConfig};
pub use environment::{Environment, Obstacle, TimeWindow};
pub use point::Point;
pub use solver::{Solver, CBS, ECBS};
pub use stat::Stats;
