use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::model::{CommitData, CommitId, HasCommitId};

/// Concurrent map from commit id to its detail or placeholder.
///
/// Once a commit is `Loaded` it stays loaded: placeholder writes for that id are ignored.
pub struct DetailCache<T> {
  entries: DashMap<CommitId, CommitData<T>>,
}

impl<T> Default for DetailCache<T> {
  fn default() -> Self {
    DetailCache {
      entries: DashMap::new(),
    }
  }
}

impl<T> DetailCache<T> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, id: &CommitId) -> Option<CommitData<T>> {
    self.entries.get(id).map(|entry| entry.value().clone())
  }

  pub fn put(&self, id: CommitId, data: CommitData<T>) {
    match self.entries.entry(id) {
      Entry::Occupied(mut e) => {
        if e.get().is_loaded() && !data.is_loaded() {
          tracing::trace!(%id, "ignoring placeholder for loaded commit");
          return;
        }
        e.insert(data);
      }
      Entry::Vacant(e) => {
        e.insert(data);
      }
    }
  }

  /// Seeds a `Loading` placeholder if nothing is stored for `id` yet.
  /// Returns whether the placeholder was written.
  pub fn mark_pending(&self, id: CommitId) -> bool {
    match self.entries.entry(id) {
      Entry::Occupied(_) => false,
      Entry::Vacant(e) => {
        e.insert(CommitData::Loading(id));
        true
      }
    }
  }

  /// True for anything that was ever requested: loaded, loading or failed.
  pub fn is_key_cached(&self, id: &CommitId) -> bool {
    self.entries.contains_key(id)
  }

  /// Removes the placeholder for `id` if it is still `Loading`. Returns whether it was removed.
  pub fn forget_pending(&self, id: &CommitId) -> bool {
    self.entries.remove_if(id, |_, data| data.is_loading()).is_some()
  }

  /// Drops every `Failed` entry so those commits get planned again. Returns how many were dropped.
  pub fn clear_failed(&self) -> usize {
    let before = self.entries.len();
    self.entries.retain(|_, data| !data.is_failed());
    before.saturating_sub(self.entries.len())
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

impl<T: HasCommitId> DetailCache<T> {
  pub fn put_detail(&self, detail: T) {
    self.put(detail.id(), CommitData::loaded(detail));
  }
}
