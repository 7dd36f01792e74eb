use anyhow::{ensure, Result};

use crate::point::Point;

/// Inclusive activity interval of a dynamic obstacle. `end == None` means
/// the obstacle never expires (the configuration's `t_end = -1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: usize,
    pub end: Option<usize>,
}

impl TimeWindow {
    pub fn new(start: usize, end: Option<usize>) -> Self {
        TimeWindow { start, end }
    }

    pub fn contains(&self, time: usize) -> bool {
        self.start <= time && self.end.is_none_or(|end| time <= end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Obstacle {
    Static { cell: Point },
    Dynamic { cell: Point, window: TimeWindow },
}

impl Obstacle {
    pub fn cell(&self) -> Point {
        match self {
            Obstacle::Static { cell } | Obstacle::Dynamic { cell, .. } => *cell,
        }
    }

    pub fn blocks(&self, cell: Point, time: usize) -> bool {
        match self {
            Obstacle::Static { cell: own } => *own == cell,
            Obstacle::Dynamic { cell: own, window } => *own == cell && window.contains(time),
        }
    }
}

/// The shared world every planner runs against: an axis-aligned box
/// `[0, L_i)` per dimension plus the obstacle list. Read-only after
/// construction.
#[derive(Debug, Clone)]
pub struct Environment {
    dimension: usize,
    space_limit: Vec<i32>,
    obstacles: Vec<Obstacle>,
}

impl Environment {
    pub fn new(dimension: usize, space_limit: Vec<i32>, obstacles: Vec<Obstacle>) -> Result<Self> {
        ensure!(
            dimension == 2 || dimension == 3,
            "dimension must be 2 or 3, got {dimension}"
        );
        ensure!(
            space_limit.len() == dimension,
            "dimension {dimension} does not match the length of space limit {space_limit:?}"
        );
        ensure!(
            space_limit.iter().all(|limit| *limit > 0),
            "space limits must be positive, got {space_limit:?}"
        );
        for obstacle in &obstacles {
            ensure!(
                obstacle.cell().dimension() == dimension,
                "dimension {dimension} does not match obstacle cell {}",
                obstacle.cell()
            );
        }

        Ok(Environment {
            dimension,
            space_limit,
            obstacles,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn space_limit(&self) -> &[i32] {
        &self.space_limit
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn in_bounds(&self, cell: Point) -> bool {
        let (raw, dimension) = cell.components();
        dimension == self.dimension
            && raw
                .iter()
                .zip(self.space_limit.iter())
                .all(|(coordinate, limit)| 0 <= *coordinate && coordinate < limit)
    }

    /// A (cell, time) state is valid iff the cell is in bounds and no
    /// obstacle blocks it at that time.
    pub fn is_valid_state(&self, cell: Point, time: usize) -> bool {
        self.in_bounds(cell)
            && !self
                .obstacles
                .iter()
                .any(|obstacle| obstacle.blocks(cell, time))
    }

    /// Number of in-bounds cells, the `|V|` of the search horizon bound.
    pub fn cell_count(&self) -> usize {
        self.space_limit
            .iter()
            .map(|limit| *limit as usize)
            .product()
    }

    /// Latest finite end of any dynamic obstacle window; persistent
    /// obstacles do not extend the horizon because waiting them out never
    /// helps.
    pub(crate) fn latest_finite_obstacle_end(&self) -> usize {
        self.obstacles
            .iter()
            .filter_map(|obstacle| match obstacle {
                Obstacle::Dynamic { window, .. } => window.end,
                Obstacle::Static { .. } => None,
            })
            .max()
            .unwrap_or(0)
    }
}
