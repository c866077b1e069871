use crate::model::{CommitId, Node, RootId};

/// Row-indexed view of the commit graph, supplied by whoever lays the graph out.
pub trait CommitGraph: Send + Sync {
  fn row_count(&self) -> usize;

  /// The commit at `row`, or `None` for rows that are not commits.
  fn node_at(&self, row: usize) -> Option<Node>;
}

/// A graph that is already laid out into rows.
#[derive(Clone, Debug, Default)]
pub struct GraphRows {
  rows: Vec<Option<Node>>,
}

impl GraphRows {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builds a single-root graph where every row is a commit, in the given order.
  pub fn from_commits(root: &RootId, commits: impl IntoIterator<Item = (CommitId, Vec<CommitId>)>) -> Self {
    let mut rows = GraphRows::new();
    for (id, parents) in commits {
      rows.push_commit(id, root.clone(), parents);
    }
    rows
  }

  pub fn push_commit(&mut self, id: CommitId, root: RootId, parents: Vec<CommitId>) -> usize {
    let row = self.rows.len();
    self.rows.push(Some(Node { id, row, root, parents }));
    row
  }

  /// Appends a row with no commit behind it.
  pub fn push_gap(&mut self) -> usize {
    self.rows.push(None);
    self.rows.len() - 1
  }
}

impl CommitGraph for GraphRows {
  fn row_count(&self) -> usize {
    self.rows.len()
  }

  fn node_at(&self, row: usize) -> Option<Node> {
    self.rows.get(row).cloned().flatten()
  }
}
