use std::collections::VecDeque;

/// The worker's backlog: newest task first, trimmed whenever a task is started.
pub(crate) struct TaskQueue<B> {
  tasks: VecDeque<B>,
  max_loadings: usize,
}

/// The task to run now plus the stale ones trimmed away to make room.
pub(crate) struct Next<B> {
  pub(crate) task: B,
  pub(crate) dropped: Vec<B>,
}

impl<B> TaskQueue<B> {
  pub(crate) fn new(max_loadings: usize) -> Self {
    TaskQueue {
      tasks: VecDeque::new(),
      max_loadings,
    }
  }

  pub(crate) fn push(&mut self, task: B) {
    self.tasks.push_front(task);
  }

  /// Takes the newest task and drops everything older than the `max_loadings` tasks
  /// queued behind it.
  pub(crate) fn next(&mut self) -> Option<Next<B>> {
    let task = self.tasks.pop_front()?;
    let dropped = if self.tasks.len() > self.max_loadings {
      self.tasks.drain(self.max_loadings..).collect()
    } else {
      Vec::new()
    };
    Some(Next { task, dropped })
  }

  pub(crate) fn clear(&mut self) -> usize {
    let len = self.tasks.len();
    self.tasks.clear();
    len
  }

  pub(crate) fn len(&self) -> usize {
    self.tasks.len()
  }
}
