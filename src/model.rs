use std::fmt;
use std::path::Path;
use std::sync::Arc;

use gix::hash::Kind;

pub type CommitId = gix::ObjectId;

/// Parses a full 40 character hex sha into a [`CommitId`].
pub fn parse_commit_id(sha_hex: &str) -> anyhow::Result<CommitId> {
  let mut id = CommitId::null(Kind::Sha1);
  hex::decode_to_slice(sha_hex.trim(), id.as_mut_slice())?;
  Ok(id)
}

/// Identifies the repository a commit lives in. Cheap to clone and compare.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RootId(Arc<Path>);

impl RootId {
  pub fn new(path: impl AsRef<Path>) -> Self {
    RootId(Arc::from(path.as_ref()))
  }

  pub fn path(&self) -> &Path {
    &self.0
  }
}

impl fmt::Display for RootId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.display())
  }
}

/// A row of the commit graph. Owned by the graph; never mutated here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
  pub id: CommitId,
  pub row: usize,
  pub root: RootId,
  pub parents: Vec<CommitId>,
}

/// A unit of work for the loader. Immutable once built.
#[derive(Clone, Debug, Default)]
pub struct Batch {
  nodes: Vec<Node>,
}

impl Batch {
  pub fn new(nodes: Vec<Node>) -> Self {
    Batch { nodes }
  }

  pub fn nodes(&self) -> &[Node] {
    &self.nodes
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }
}

pub trait HasCommitId {
  fn id(&self) -> CommitId;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
  pub name: String,
  pub email: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitDetail {
  pub id: CommitId,
  pub root: RootId,
  pub parents: Vec<CommitId>,
  pub author: Signature,
  pub committer: Signature,
  /// Seconds since the unix epoch.
  pub author_time: i64,
  pub commit_time: i64,
  pub subject: String,
  pub message: String,
}

impl HasCommitId for CommitDetail {
  fn id(&self) -> CommitId {
    self.id
  }
}

/// What the cache holds for a commit, and what callers get back.
///
/// `Loading` means a fetch was scheduled and has not completed, `Failed` means the last fetch
/// for it failed. Both carry only the id.
#[derive(Debug)]
pub enum CommitData<T> {
  Loaded(Arc<T>),
  Loading(CommitId),
  Failed(CommitId),
}

impl<T> CommitData<T> {
  pub fn loaded(detail: T) -> Self {
    CommitData::Loaded(Arc::new(detail))
  }

  pub fn is_loaded(&self) -> bool {
    matches!(self, CommitData::Loaded(_))
  }

  pub fn is_loading(&self) -> bool {
    matches!(self, CommitData::Loading(_))
  }

  pub fn is_failed(&self) -> bool {
    matches!(self, CommitData::Failed(_))
  }

  pub fn detail(&self) -> Option<&Arc<T>> {
    match self {
      CommitData::Loaded(detail) => Some(detail),
      _ => None,
    }
  }
}

impl<T> Clone for CommitData<T> {
  fn clone(&self) -> Self {
    match self {
      CommitData::Loaded(detail) => CommitData::Loaded(detail.clone()),
      CommitData::Loading(id) => CommitData::Loading(*id),
      CommitData::Failed(id) => CommitData::Failed(*id),
    }
  }
}

impl<T: HasCommitId> HasCommitId for CommitData<T> {
  fn id(&self) -> CommitId {
    match self {
      CommitData::Loaded(detail) => detail.id(),
      CommitData::Loading(id) | CommitData::Failed(id) => *id,
    }
  }
}
