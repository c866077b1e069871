use std::collections::HashMap;

use anyhow::Context;
use gix::bstr::ByteSlice;
use rayon::prelude::*;

use crate::model::{CommitDetail, CommitId, RootId, Signature};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
  #[error("{missing} of {requested} commits in {root} could not be found")]
  Incomplete {
    root: RootId,
    requested: usize,
    missing: usize,
  },
  #[error(transparent)]
  Backend(#[from] anyhow::Error),
}

/// Loads full commit details for one repository root.
///
/// Called from the loader's worker thread, once per root of a batch, with every id of that
/// root. Blocking is expected.
pub trait DetailsProvider<T>: Send + Sync {
  fn fetch_details(&self, root: &RootId, ids: &[CommitId]) -> Result<Vec<T>, FetchError>;
}

/// Reads commit details straight from the object database of each root.
pub struct GitDetailsProvider {
  repos: HashMap<RootId, gix::ThreadSafeRepository>,
}

impl GitDetailsProvider {
  pub fn open(roots: impl IntoIterator<Item = RootId>) -> anyhow::Result<Self> {
    let mut repos = HashMap::new();
    for root in roots {
      let mut repo = gix::open(root.path()).with_context(|| format!("opening repository {root}"))?;
      repo.object_cache_size(Some(16 * 1024 * 1024));
      repos.insert(root, repo.into_sync());
    }
    Ok(GitDetailsProvider { repos })
  }

  pub fn roots(&self) -> impl Iterator<Item = &RootId> {
    self.repos.keys()
  }
}

impl DetailsProvider<CommitDetail> for GitDetailsProvider {
  fn fetch_details(&self, root: &RootId, ids: &[CommitId]) -> Result<Vec<CommitDetail>, FetchError> {
    let Some(repo) = self.repos.get(root) else {
      panic!("no repository was opened for root {root}");
    };

    let details = ids
      .par_iter()
      .map_init(|| repo.to_thread_local(), |repo, id| read_commit(repo, root, *id))
      .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(details)
  }
}

fn read_commit(repo: &gix::Repository, root: &RootId, id: CommitId) -> anyhow::Result<CommitDetail> {
  let commit = repo.find_commit(id).with_context(|| format!("reading commit {id} in {root}"))?;
  let author = commit.author()?;
  let committer = commit.committer()?;
  let message = commit.message_raw()?.to_str_lossy().into_owned();
  let subject = message.lines().next().unwrap_or_default().trim().to_owned();

  Ok(CommitDetail {
    id,
    root: root.clone(),
    parents: commit.parent_ids().map(|p| p.detach()).collect(),
    author: Signature {
      name: author.name.to_str_lossy().into_owned(),
      email: author.email.to_str_lossy().into_owned(),
    },
    committer: Signature {
      name: committer.name.to_str_lossy().into_owned(),
      email: committer.email.to_str_lossy().into_owned(),
    },
    author_time: author.time.seconds,
    commit_time: commit.time()?.seconds,
    subject,
    message,
  })
}
