use std::cmp::min;
use std::ops::Range;

use crate::cache::DetailCache;
use crate::config::LoaderConfig;
use crate::graph::CommitGraph;
use crate::model::{Batch, Node};

/// Picks the rows to preload around a requested one.
///
/// The window is asymmetric, `[row - up, row + down)`, since users scroll down more than up.
#[derive(Clone, Copy, Debug)]
pub struct PreloadPlanner {
  up: usize,
  down: usize,
}

impl PreloadPlanner {
  pub fn new(up: usize, down: usize) -> Self {
    PreloadPlanner { up, down }
  }

  pub fn from_config(config: &LoaderConfig) -> Self {
    Self::new(config.preload_up, config.preload_down)
  }

  /// Rows around `row`, clamped to the graph. Empty when `row` lies past the end.
  pub fn window(&self, row: usize, row_count: usize) -> Range<usize> {
    let end = min(row_count, row.saturating_add(self.down));
    let start = min(row.saturating_sub(self.up), end);
    start..end
  }

  /// The commit rows of the window, in row order.
  pub fn window_nodes(&self, row: usize, graph: &dyn CommitGraph) -> Vec<Node> {
    self.window(row, graph.row_count()).filter_map(|r| graph.node_at(r)).collect()
  }

  /// Seeds a placeholder for every commit of the window not cached yet, and returns those
  /// commits as the batch to load. Commits already cached, in any state, are left out.
  pub fn plan<T>(&self, node: &Node, graph: &dyn CommitGraph, cache: &DetailCache<T>) -> Batch {
    let nodes: Vec<Node> = self
      .window_nodes(node.row, graph)
      .into_iter()
      .filter(|n| cache.mark_pending(n.id))
      .collect();

    tracing::trace!(row = node.row, planned = nodes.len(), "planned preload window");
    Batch::new(nodes)
  }
}

impl Default for PreloadPlanner {
  fn default() -> Self {
    Self::from_config(&LoaderConfig::default())
  }
}
