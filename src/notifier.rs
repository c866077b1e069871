use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};

pub type Job = Box<dyn FnOnce() + Send>;

/// Runs work on the thread that owns UI state.
pub trait Dispatcher: Send + Sync {
  /// Runs `job` on the owning thread and returns once it has finished, or once the owner is
  /// gone and it never will.
  fn invoke_and_wait(&self, job: Job);
}

/// Runs jobs right away on the calling thread. For hosts without a UI thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
  fn invoke_and_wait(&self, job: Job) {
    job();
  }
}

struct Dispatch {
  job: Job,
  done: oneshot::Sender<()>,
}

/// Hands jobs to a [`DispatchQueue`] drained by the owning thread.
#[derive(Clone)]
pub struct ChannelDispatcher {
  tx: mpsc::UnboundedSender<Dispatch>,
}

/// The owning thread's end of a [`ChannelDispatcher`].
pub struct DispatchQueue {
  rx: mpsc::UnboundedReceiver<Dispatch>,
}

pub fn dispatch_channel() -> (ChannelDispatcher, DispatchQueue) {
  let (tx, rx) = mpsc::unbounded_channel();
  (ChannelDispatcher { tx }, DispatchQueue { rx })
}

impl Dispatcher for ChannelDispatcher {
  fn invoke_and_wait(&self, job: Job) {
    let (done, finished) = oneshot::channel();
    if self.tx.send(Dispatch { job, done }).is_err() {
      tracing::debug!("dispatch queue is gone, dropping job");
      return;
    }
    // must not be called from within an async context
    let _ = finished.blocking_recv();
  }
}

impl DispatchQueue {
  /// Waits for the next job and runs it. Returns false once every dispatcher is dropped.
  pub async fn run_next(&mut self) -> bool {
    match self.rx.recv().await {
      Some(dispatch) => {
        (dispatch.job)();
        let _ = dispatch.done.send(());
        true
      }
      None => false,
    }
  }

  /// Runs the jobs already queued without waiting for more.
  pub fn run_pending(&mut self) -> usize {
    let mut ran = 0;
    while let Ok(dispatch) = self.rx.try_recv() {
      (dispatch.job)();
      let _ = dispatch.done.send(());
      ran += 1;
    }
    ran
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn() + Send + Sync>;

/// Tells listeners that a batch of details landed in the cache.
///
/// Listeners run on the dispatcher's thread, once per finished batch.
pub struct CompletionNotifier {
  listeners: Mutex<Vec<(ListenerId, Listener)>>,
  next_id: AtomicU64,
  dispatcher: Arc<dyn Dispatcher>,
  cancelled: AtomicBool,
}

impl CompletionNotifier {
  pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
    CompletionNotifier {
      listeners: Mutex::new(Vec::new()),
      next_id: AtomicU64::new(0),
      dispatcher,
      cancelled: AtomicBool::new(false),
    }
  }

  pub fn add_listener(&self, listener: impl Fn() + Send + Sync + 'static) -> ListenerId {
    let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
    self.listeners.lock().unwrap().push((id, Arc::new(listener)));
    id
  }

  pub fn remove_listener(&self, id: ListenerId) -> bool {
    let mut listeners = self.listeners.lock().unwrap();
    let before = listeners.len();
    listeners.retain(|(l, _)| *l != id);
    listeners.len() != before
  }

  /// Runs every listener on the dispatcher's thread and waits for them.
  pub fn fire_all(self: &Arc<Self>) {
    if self.is_cancelled() {
      return;
    }
    let notifier = self.clone();
    self.dispatcher.invoke_and_wait(Box::new(move || notifier.deliver()));
  }

  fn deliver(&self) {
    // checked again on the owning thread, a cancel may have happened while queued
    if self.is_cancelled() {
      return;
    }
    let listeners: Vec<Listener> = self.listeners.lock().unwrap().iter().map(|(_, l)| l.clone()).collect();
    tracing::trace!(listeners = listeners.len(), "delivering details loaded");
    for listener in listeners {
      listener();
    }
  }

  /// Drops all listeners; queued and future notifications become no-ops.
  pub fn cancel(&self) {
    self.cancelled.store(true, Ordering::SeqCst);
    self.listeners.lock().unwrap().clear();
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancelled.load(Ordering::SeqCst)
  }
}

#[cfg(test)]
mod test {
  use std::sync::atomic::AtomicUsize;

  use super::*;

  fn counter(notifier: &CompletionNotifier) -> (ListenerId, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    let id = notifier.add_listener(move || {
      c.fetch_add(1, Ordering::SeqCst);
    });
    (id, count)
  }

  #[test]
  fn every_listener_fires_once_per_call() {
    let notifier = Arc::new(CompletionNotifier::new(Arc::new(InlineDispatcher)));
    let (_, a) = counter(&notifier);
    let (b_id, b) = counter(&notifier);

    notifier.fire_all();
    assert_eq!((a.load(Ordering::SeqCst), b.load(Ordering::SeqCst)), (1, 1));

    assert!(notifier.remove_listener(b_id));
    assert!(!notifier.remove_listener(b_id));
    notifier.fire_all();
    assert_eq!((a.load(Ordering::SeqCst), b.load(Ordering::SeqCst)), (2, 1));
  }

  #[test]
  fn cancelled_notifier_stays_silent() {
    let notifier = Arc::new(CompletionNotifier::new(Arc::new(InlineDispatcher)));
    let (_, count) = counter(&notifier);
    notifier.cancel();
    notifier.fire_all();
    assert_eq!(count.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn channel_dispatcher_runs_on_the_owner_and_waits() {
    let (dispatcher, mut queue) = dispatch_channel();
    let notifier = Arc::new(CompletionNotifier::new(Arc::new(dispatcher)));

    let owner = std::thread::current().id();
    let (ran_on_tx, ran_on) = std::sync::mpsc::channel();
    notifier.add_listener(move || {
      let _ = ran_on_tx.send(std::thread::current().id());
    });

    let worker = {
      let notifier = notifier.clone();
      tokio::task::spawn_blocking(move || notifier.fire_all())
    };

    assert!(queue.run_next().await);
    worker.await.unwrap();
    assert_eq!(ran_on.recv().unwrap(), owner);
  }

  #[test]
  fn dropped_queue_does_not_block_the_caller() {
    let (dispatcher, queue) = dispatch_channel();
    drop(queue);
    let notifier = Arc::new(CompletionNotifier::new(Arc::new(dispatcher)));
    let (_, count) = counter(&notifier);
    notifier.fire_all();
    assert_eq!(count.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn run_pending_drains_without_waiting() {
    let (dispatcher, mut queue) = dispatch_channel();
    assert_eq!(queue.run_pending(), 0);

    let handle = std::thread::spawn(move || dispatcher.invoke_and_wait(Box::new(|| {})));
    while queue.run_pending() == 0 {
      std::thread::yield_now();
    }
    handle.join().unwrap();
  }
}
