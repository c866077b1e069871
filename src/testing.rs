//! Fixtures shared by the in-crate tests.

use std::collections::HashSet;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use crate::graph::GraphRows;
use crate::model::{CommitDetail, CommitId, RootId, Signature};
use crate::provider::{DetailsProvider, FetchError};

pub(crate) fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

pub(crate) fn id(n: u32) -> CommitId {
  let mut bytes = [0u8; 20];
  bytes[..4].copy_from_slice(&n.to_be_bytes());
  bytes[19] = 1;
  CommitId::from(bytes)
}

pub(crate) fn detail(n: u32) -> CommitDetail {
  detail_in(&RootId::new("/repo"), id(n), n)
}

fn detail_in(root: &RootId, commit: CommitId, n: u32) -> CommitDetail {
  let who = Signature {
    name: "Test User".into(),
    email: "test@example.com".into(),
  };
  CommitDetail {
    id: commit,
    root: root.clone(),
    parents: vec![],
    author: who.clone(),
    committer: who,
    author_time: 1_700_000_000 + n as i64,
    commit_time: 1_700_000_000 + n as i64,
    subject: format!("commit {n}"),
    message: format!("commit {n}\n"),
  }
}

/// A linear graph of `len` commits where row `n` holds `id(n)`.
pub(crate) fn linear_graph(root: &RootId, len: u32) -> GraphRows {
  GraphRows::from_commits(root, (0..len).map(|n| (id(n), if n + 1 < len { vec![id(n + 1)] } else { vec![] })))
}

pub(crate) struct FetchCall {
  pub(crate) root: RootId,
  pub(crate) ids: Vec<CommitId>,
}

/// Records every fetch and answers from a synthetic detail table. Optionally holds each call
/// until the test releases it, and can be told to fail for some roots or omit some ids.
#[derive(Default)]
pub(crate) struct FakeProvider {
  calls: Mutex<Vec<FetchCall>>,
  gate: Mutex<Option<Gate>>,
  failing_roots: Mutex<HashSet<RootId>>,
  omitted: Mutex<HashSet<CommitId>>,
}

struct Gate {
  started: mpsc::Sender<()>,
  release: mpsc::Receiver<()>,
}

/// Test side of a gated provider.
pub(crate) struct GateHandle {
  pub(crate) started: mpsc::Receiver<()>,
  pub(crate) release: mpsc::Sender<()>,
}

impl FakeProvider {
  pub(crate) fn new() -> Arc<Self> {
    Arc::new(FakeProvider::default())
  }

  pub(crate) fn gated() -> (Arc<Self>, GateHandle) {
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let provider = FakeProvider::default();
    *provider.gate.lock().unwrap() = Some(Gate {
      started: started_tx,
      release: release_rx,
    });
    (
      Arc::new(provider),
      GateHandle {
        started: started_rx,
        release: release_tx,
      },
    )
  }

  pub(crate) fn fail_root(&self, root: &RootId) {
    self.failing_roots.lock().unwrap().insert(root.clone());
  }

  pub(crate) fn omit(&self, commit: CommitId) {
    self.omitted.lock().unwrap().insert(commit);
  }

  pub(crate) fn call_count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }

  pub(crate) fn requested_ids(&self) -> Vec<CommitId> {
    self.calls.lock().unwrap().iter().flat_map(|c| c.ids.iter().copied()).collect()
  }

  pub(crate) fn roots_called(&self) -> Vec<RootId> {
    self.calls.lock().unwrap().iter().map(|c| c.root.clone()).collect()
  }
}

impl DetailsProvider<CommitDetail> for FakeProvider {
  fn fetch_details(&self, root: &RootId, ids: &[CommitId]) -> Result<Vec<CommitDetail>, FetchError> {
    self.calls.lock().unwrap().push(FetchCall {
      root: root.clone(),
      ids: ids.to_vec(),
    });

    if let Some(gate) = self.gate.lock().unwrap().as_ref() {
      let _ = gate.started.send(());
      let _ = gate.release.recv();
    }

    if self.failing_roots.lock().unwrap().contains(root) {
      return Err(anyhow::anyhow!("backend unavailable for {root}").into());
    }

    let omitted = self.omitted.lock().unwrap();
    Ok(
      ids
        .iter()
        .filter(|commit| !omitted.contains(*commit))
        .map(|commit| {
          let mut n = [0u8; 4];
          n.copy_from_slice(&commit.as_slice()[..4]);
          detail_in(root, *commit, u32::from_be_bytes(n))
        })
        .collect(),
    )
  }
}
