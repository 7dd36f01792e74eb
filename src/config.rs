use anyhow::{bail, ensure, Context, Result};
use serde::Deserialize;

use crate::environment::{Environment, Obstacle, TimeWindow};
use crate::point::Point;
use crate::solver::{CBS, ECBS};

/// One dynamic obstacle as configured: a cell and an inclusive
/// `[t_start, t_end]` window, `t_end = -1` meaning it never expires.
#[derive(Debug, Clone, Deserialize)]
pub struct DynamicObstacleConfig {
    pub cell: Point,
    pub window: (i64, i64),
}

/// The boundary record a scenario is loaded from. Single-agent scenarios
/// use the singular `start_point` / `goal_point` forms; multi-agent
/// scenarios the plural lists. `w` is only consulted by the
/// bounded-suboptimal planners.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioConfig {
    pub dimension: usize,
    pub space_limits: Vec<i32>,
    #[serde(default)]
    pub static_obstacles: Vec<Point>,
    #[serde(default)]
    pub dynamic_obstacles: Vec<DynamicObstacleConfig>,
    #[serde(default)]
    pub start_points: Vec<Point>,
    #[serde(default)]
    pub goal_points: Vec<Point>,
    #[serde(default)]
    pub start_point: Option<Point>,
    #[serde(default)]
    pub goal_point: Option<Point>,
    #[serde(default)]
    pub w: Option<f64>,
}

impl ScenarioConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("failed to parse scenario configuration")
    }

    pub fn environment(&self) -> Result<Environment> {
        let mut obstacles: Vec<Obstacle> = self
            .static_obstacles
            .iter()
            .map(|cell| Obstacle::Static { cell: *cell })
            .collect();

        for dynamic in &self.dynamic_obstacles {
            let (start, end) = dynamic.window;
            ensure!(
                start >= 0,
                "dynamic obstacle at {} starts at negative time {start}",
                dynamic.cell
            );
            let end = match end {
                -1 => None,
                end if end >= start => Some(end as usize),
                end => bail!(
                    "dynamic obstacle at {} has invalid window end {end}",
                    dynamic.cell
                ),
            };
            obstacles.push(Obstacle::Dynamic {
                cell: dynamic.cell,
                window: TimeWindow::new(start as usize, end),
            });
        }

        Environment::new(self.dimension, self.space_limits.clone(), obstacles)
    }

    /// Per-agent start and goal lists, whichever form the record used.
    pub fn endpoints(&self) -> Result<(Vec<Point>, Vec<Point>)> {
        let starts = match (&self.start_point, self.start_points.is_empty()) {
            (Some(point), true) => vec![*point],
            (None, false) => self.start_points.clone(),
            (Some(_), false) => bail!("give either start_point or start_points, not both"),
            (None, true) => bail!("no start points configured"),
        };
        let goals = match (&self.goal_point, self.goal_points.is_empty()) {
            (Some(point), true) => vec![*point],
            (None, false) => self.goal_points.clone(),
            (Some(_), false) => bail!("give either goal_point or goal_points, not both"),
            (None, true) => bail!("no goal points configured"),
        };
        ensure!(
            starts.len() == goals.len(),
            "lengths of start points and goal points are not the same: {} != {}",
            starts.len(),
            goals.len()
        );
        Ok((starts, goals))
    }

    pub fn suboptimality(&self) -> Result<f64> {
        let w = self
            .w
            .context("suboptimality factor w is required for bounded-suboptimal search")?;
        ensure!(
            w >= 1.0,
            "suboptimality factor must be at least 1.0, got {w}"
        );
        Ok(w)
    }

    pub fn build_cbs(&self) -> Result<CBS> {
        let env = self.environment()?;
        let (starts, goals) = self.endpoints()?;
        CBS::new(starts, goals, &env)
    }

    pub fn build_ecbs(&self) -> Result<ECBS> {
        let env = self.environment()?;
        let (starts, goals) = self.endpoints()?;
        ECBS::new(starts, goals, &env, self.suboptimality()?)
    }
}
