use serde::Deserialize;

/// What happens to commits whose fetch failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
  /// Store `CommitData::Failed` so callers can show it. Cleared by `retry_failed`.
  MarkFailed,
  /// Keep the `Loading` placeholder.
  LeavePending,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
  /// Rows preloaded above the requested one.
  pub preload_up: usize,
  /// Rows preloaded from the requested one downwards, itself included.
  pub preload_down: usize,
  /// Queued batches kept behind the one being started; older ones are dropped.
  pub max_loadings: usize,
  pub failure_policy: FailurePolicy,
  pub worker_name: String,
}

impl Default for LoaderConfig {
  fn default() -> Self {
    LoaderConfig {
      preload_up: 20,
      preload_down: 40,
      max_loadings: 10,
      failure_policy: FailurePolicy::MarkFailed,
      worker_name: "commit-details-loader".into(),
    }
  }
}
