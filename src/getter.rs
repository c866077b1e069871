use std::sync::{Arc, RwLock};

use crate::cache::DetailCache;
use crate::config::LoaderConfig;
use crate::graph::CommitGraph;
use crate::loader::{BatchLoader, LoaderStats};
use crate::model::{CommitData, HasCommitId, Node};
use crate::notifier::{CompletionNotifier, Dispatcher, ListenerId};
use crate::planner::PreloadPlanner;
use crate::provider::DetailsProvider;

/// Hands out commit details for rows of the log without ever blocking.
///
/// A miss returns a `Loading` placeholder right away and schedules the rows around the
/// requested one for loading. Listeners hear about it once the details arrive, and should
/// ask again then.
pub struct CommitDetailsGetter<T> {
  cache: Arc<DetailCache<T>>,
  graph: RwLock<Arc<dyn CommitGraph>>,
  planner: PreloadPlanner,
  notifier: Arc<CompletionNotifier>,
  loader: BatchLoader<T>,
}

impl<T: HasCommitId + Send + Sync + 'static> CommitDetailsGetter<T> {
  pub fn new(
    graph: Arc<dyn CommitGraph>,
    provider: Arc<dyn DetailsProvider<T>>,
    dispatcher: Arc<dyn Dispatcher>,
    config: LoaderConfig,
  ) -> anyhow::Result<Self> {
    let cache = Arc::new(DetailCache::new());
    let notifier = Arc::new(CompletionNotifier::new(dispatcher));
    let loader = BatchLoader::start(&config, cache.clone(), provider, notifier.clone())?;

    Ok(CommitDetailsGetter {
      cache,
      graph: RwLock::new(graph),
      planner: PreloadPlanner::from_config(&config),
      notifier,
      loader,
    })
  }
}

impl<T> CommitDetailsGetter<T> {
  pub fn commit_data(&self, node: &Node) -> CommitData<T> {
    match self.cache.get(&node.id) {
      Some(data @ CommitData::Loaded(_)) => return data,
      Some(data @ CommitData::Failed(_)) => return data,
      _ => {}
    }

    if !self.loader.is_disposed() {
      let graph = self.graph.read().unwrap().clone();
      let batch = self.planner.plan(node, graph.as_ref(), &self.cache);
      self.loader.submit(batch);
    }
    CommitData::Loading(node.id)
  }

  pub fn add_details_loaded_listener(&self, listener: impl Fn() + Send + Sync + 'static) -> ListenerId {
    self.notifier.add_listener(listener)
  }

  pub fn remove_details_loaded_listener(&self, id: ListenerId) -> bool {
    self.notifier.remove_listener(id)
  }

  /// Switches to a newer layout of the graph. Cached details stay valid.
  pub fn set_graph(&self, graph: Arc<dyn CommitGraph>) {
    *self.graph.write().unwrap() = graph;
  }

  /// Forgets failed commits so they are loaded again the next time they are requested.
  pub fn retry_failed(&self) -> usize {
    let cleared = self.cache.clear_failed();
    if cleared > 0 {
      tracing::debug!(cleared, "retrying failed commits on next request");
    }
    cleared
  }

  pub fn cache(&self) -> &DetailCache<T> {
    &self.cache
  }

  pub fn stats(&self) -> LoaderStats {
    self.loader.stats()
  }

  pub fn dispose(&self) {
    self.loader.dispose();
  }

  pub fn wait_for_shutdown(&self) {
    self.loader.wait_for_shutdown();
  }
}
