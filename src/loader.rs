use std::collections::{BTreeMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;

use serde::Serialize;

use crate::cache::DetailCache;
use crate::config::{FailurePolicy, LoaderConfig};
use crate::model::{Batch, CommitData, CommitId, HasCommitId, RootId};
use crate::notifier::CompletionNotifier;
use crate::provider::{DetailsProvider, FetchError};
use crate::queue::{Next, TaskQueue};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoaderStats {
  pub submitted: u64,
  pub executed: u64,
  /// Batches trimmed from the backlog or dropped on dispose, never fetched.
  pub discarded: u64,
  pub failed_roots: u64,
}

#[derive(Default)]
struct Counters {
  submitted: AtomicU64,
  executed: AtomicU64,
  discarded: AtomicU64,
  failed_roots: AtomicU64,
}

struct State {
  queue: TaskQueue<Batch>,
  disposed: bool,
}

struct Shared<T> {
  state: Mutex<State>,
  wake: Condvar,
  cache: Arc<DetailCache<T>>,
  provider: Arc<dyn DetailsProvider<T>>,
  notifier: Arc<CompletionNotifier>,
  failure_policy: FailurePolicy,
  counters: Counters,
}

/// Loads submitted batches on a single background thread, newest first.
///
/// Each batch is split by repository root and every root is fetched with one provider call.
/// Results go into the cache and listeners are notified once the whole batch is done.
pub struct BatchLoader<T> {
  shared: Arc<Shared<T>>,
  worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T: HasCommitId + Send + Sync + 'static> BatchLoader<T> {
  pub fn start(
    config: &LoaderConfig,
    cache: Arc<DetailCache<T>>,
    provider: Arc<dyn DetailsProvider<T>>,
    notifier: Arc<CompletionNotifier>,
  ) -> anyhow::Result<Self> {
    let shared = Arc::new(Shared {
      state: Mutex::new(State {
        queue: TaskQueue::new(config.max_loadings),
        disposed: false,
      }),
      wake: Condvar::new(),
      cache,
      provider,
      notifier,
      failure_policy: config.failure_policy,
      counters: Counters::default(),
    });

    let worker_shared = shared.clone();
    let worker = std::thread::Builder::new()
      .name(config.worker_name.clone())
      .spawn(move || worker_shared.run())?;

    Ok(BatchLoader {
      shared,
      worker: Mutex::new(Some(worker)),
    })
  }
}

impl<T> BatchLoader<T> {
  /// Queues `batch` ahead of everything already waiting. Returns false once disposed.
  pub fn submit(&self, batch: Batch) -> bool {
    if batch.is_empty() {
      return true;
    }
    let mut state = self.shared.state.lock().unwrap();
    if state.disposed {
      return false;
    }
    tracing::debug!(commits = batch.len(), queued = state.queue.len(), "queueing preload batch");
    state.queue.push(batch);
    self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
    self.shared.wake.notify_one();
    true
  }

  pub fn is_disposed(&self) -> bool {
    self.shared.state.lock().unwrap().disposed
  }

  /// Stops the worker after its current batch, whose results are thrown away, and drops
  /// the backlog. Idempotent.
  pub fn dispose(&self) {
    {
      let mut state = self.shared.state.lock().unwrap();
      if state.disposed {
        return;
      }
      state.disposed = true;
      let dropped = state.queue.clear();
      self.shared.counters.discarded.fetch_add(dropped as u64, Ordering::Relaxed);
      tracing::debug!(dropped, "disposing commit details loader");
    }
    self.shared.notifier.cancel();
    self.shared.wake.notify_all();
  }

  /// Disposes and joins the worker thread.
  ///
  /// Blocks until an in-flight fetch returns. Must not be called from the dispatcher's
  /// owning thread while the worker may be waiting on it.
  pub fn wait_for_shutdown(&self) {
    self.dispose();
    if let Some(worker) = self.worker.lock().unwrap().take() {
      if worker.join().is_err() {
        tracing::warn!("commit details worker panicked");
      }
    }
  }

  pub fn stats(&self) -> LoaderStats {
    let c = &self.shared.counters;
    LoaderStats {
      submitted: c.submitted.load(Ordering::Relaxed),
      executed: c.executed.load(Ordering::Relaxed),
      discarded: c.discarded.load(Ordering::Relaxed),
      failed_roots: c.failed_roots.load(Ordering::Relaxed),
    }
  }
}

impl<T> Drop for BatchLoader<T> {
  fn drop(&mut self) {
    self.dispose();
  }
}

impl<T: HasCommitId> Shared<T> {
  fn run(self: Arc<Self>) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.drain())) {
      tracing::error!("commit details worker panicked, shutting the loader down");
      self.shut_down();
      panic::resume_unwind(payload);
    }
    tracing::debug!("commit details worker stopped");
  }

  fn drain(&self) {
    while let Some(Next { task, dropped }) = self.next_task() {
      if !dropped.is_empty() {
        self.counters.discarded.fetch_add(dropped.len() as u64, Ordering::Relaxed);
        tracing::debug!(dropped = dropped.len(), "discarding stale preload batches");
        // never fetched, so the next request covering these rows plans them again
        for node in dropped.iter().flat_map(|batch| batch.nodes()) {
          self.cache.forget_pending(&node.id);
        }
      }

      self.execute(&task);
      self.counters.executed.fetch_add(1, Ordering::Relaxed);

      if self.is_disposed() {
        break;
      }
      self.notifier.fire_all();
    }
  }

  /// Same as dispose, from the worker side after it died.
  fn shut_down(&self) {
    {
      let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
      state.disposed = true;
      let dropped = state.queue.clear();
      self.counters.discarded.fetch_add(dropped as u64, Ordering::Relaxed);
    }
    self.notifier.cancel();
  }

  /// Blocks until there is work. `None` once disposed.
  fn next_task(&self) -> Option<Next<Batch>> {
    let mut state = self.state.lock().unwrap();
    loop {
      if state.disposed {
        return None;
      }
      if let Some(next) = state.queue.next() {
        return Some(next);
      }
      state = self.wake.wait(state).unwrap();
    }
  }

  fn is_disposed(&self) -> bool {
    self.state.lock().unwrap().disposed
  }

  fn execute(&self, batch: &Batch) {
    let mut by_root: BTreeMap<&RootId, Vec<CommitId>> = BTreeMap::new();
    for node in batch.nodes() {
      by_root.entry(&node.root).or_default().push(node.id);
    }

    for (root, ids) in by_root {
      let span = tracing::debug_span!("fetch_details", %root, commits = ids.len());
      let _enter = span.enter();

      match self.provider.fetch_details(root, &ids) {
        Ok(details) => self.publish(root, &ids, details),
        Err(err) => {
          self.counters.failed_roots.fetch_add(1, Ordering::Relaxed);
          tracing::warn!(error = %err, "failed to load commit details");
          self.mark_unresolved(&ids);
        }
      }
    }
  }

  fn publish(&self, root: &RootId, requested: &[CommitId], details: Vec<T>) {
    // held so that dispose cannot slip in between the check and the writes
    let state = self.state.lock().unwrap();
    if state.disposed {
      return;
    }

    let mut resolved = HashSet::with_capacity(details.len());
    for detail in details {
      resolved.insert(detail.id());
      self.cache.put_detail(detail);
    }

    let missing: Vec<CommitId> = requested.iter().copied().filter(|id| !resolved.contains(id)).collect();
    drop(state);

    if !missing.is_empty() {
      let err = FetchError::Incomplete {
        root: root.clone(),
        requested: requested.len(),
        missing: missing.len(),
      };
      tracing::warn!(error = %err, "provider skipped commits");
      self.mark_unresolved(&missing);
    }
  }

  fn mark_unresolved(&self, ids: &[CommitId]) {
    if self.failure_policy == FailurePolicy::LeavePending {
      return;
    }
    let state = self.state.lock().unwrap();
    if state.disposed {
      return;
    }
    for id in ids {
      self.cache.put(*id, CommitData::Failed(*id));
    }
  }
}
