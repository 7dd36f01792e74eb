mod highlevel;
mod lowlevel;

pub use highlevel::{Conflict, Constraint};
pub(crate) use highlevel::{state_at, EcbsOpenNode, HighLevelFocalNode, HighLevelOpenNode};
pub(crate) use lowlevel::{FocalNode, OpenNode};

use anyhow::Result;
use serde::Serialize;

use crate::point::Point;

/// One planned entity with a start and a goal cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    pub id: usize,
    pub start: Point,
    pub goal: Point,
}

/// A dense time-indexed path: `[(cell, 0), (cell, 1), ..., (goal, T)]`,
/// successive cells one unit step apart or equal (wait).
pub type Path = Vec<(Point, usize)>;

/// The joint result of a high-level solve, one path per agent.
#[derive(Debug, Clone, Serialize)]
pub struct Solution {
    pub paths: Vec<Path>,
}

impl Solution {
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.paths)?)
    }
}
