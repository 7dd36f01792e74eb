use tracing::info;

/// Search-effort counters. The low-level searches bump the expansion
/// counts through a mutable borrow; the solvers fill in cost and elapsed
/// time when a solution is found.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub costs: usize,
    pub time_us: usize,
    pub low_level_expand_open_nodes: usize,
    pub low_level_expand_focal_nodes: usize,
    pub high_level_expand_nodes: usize,
}

impl Stats {
    pub(crate) fn report(&self, solver: &str) {
        info!(
            solver,
            costs = self.costs,
            time_us = self.time_us,
            high_level_expand_nodes = self.high_level_expand_nodes,
            low_level_expand_open_nodes = self.low_level_expand_open_nodes,
            low_level_expand_focal_nodes = self.low_level_expand_focal_nodes,
            "solved"
        );
    }
}
