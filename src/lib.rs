//! Lazy loading of commit details for a log view over a large commit graph.
//!
//! [`CommitDetailsGetter`] answers every request immediately, from the cache or with a
//! placeholder, and loads the rows around a missed one on a background worker.

mod cache;
mod config;
mod getter;
mod graph;
mod loader;
mod model;
mod notifier;
mod planner;
mod provider;
mod queue;

#[cfg(test)]
mod testing;

pub use cache::DetailCache;
pub use config::{FailurePolicy, LoaderConfig};
pub use getter::CommitDetailsGetter;
pub use graph::{CommitGraph, GraphRows};
pub use loader::{BatchLoader, LoaderStats};
pub use model::{parse_commit_id, Batch, CommitData, CommitDetail, CommitId, HasCommitId, Node, RootId, Signature};
pub use notifier::{dispatch_channel, ChannelDispatcher, CompletionNotifier, DispatchQueue, Dispatcher, InlineDispatcher, Job, ListenerId};
pub use planner::PreloadPlanner;
pub use provider::{DetailsProvider, FetchError, GitDetailsProvider};
