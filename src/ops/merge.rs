use std::{
  collections::VecDeque,
  sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
  },
};

use parking_lot::Mutex;

use crate::{
  context::Context,
  error::FlowError,
  hooks,
  observable::Observable,
  observer::Observer,
  subscription::{request_add, request_produced, BoxedSubscription, DeferredSubscription, Subscription},
};

/// Combine two observables into one by merging their emissions.
///
/// Both sources receive every request made downstream; values arriving
/// beyond the downstream demand are queued. The first error from either
/// source cancels the other. Completes once both sources have completed.
///
/// ```
/// use rxflow::prelude::*;
///
/// let (tx, rx) = std::sync::mpsc::channel();
/// observable::from_iter(vec![1, 3])
///   .merge_with(observable::from_iter(vec![2, 4]))
///   .subscribe(move |v| tx.send(v).unwrap());
///
/// let mut values = rx.try_iter().collect::<Vec<_>>();
/// values.sort();
/// assert_eq!(values, vec![1, 2, 3, 4]);
/// ```
#[derive(Clone)]
pub struct Merge<S1, S2> {
  source1: S1,
  source2: S2,
}

impl<S1, S2> Merge<S1, S2> {
  pub fn new(source1: S1, source2: S2) -> Self { Self { source1, source2 } }
}

impl<S1, S2> Observable for Merge<S1, S2>
where
  S1: Observable,
  S2: Observable<Item = S1::Item>,
{
  type Item = S1::Item;

  fn actual_subscribe<O: Observer<S1::Item>>(self, mut observer: O) {
    let shared = Arc::new(MergeShared {
      sink: Mutex::new(None),
      queue: Mutex::new(VecDeque::new()),
      failure: Mutex::new(None),
      upstreams: [DeferredSubscription::new(), DeferredSubscription::new()],
      requested: AtomicU64::new(0),
      active: AtomicUsize::new(2),
      wip: AtomicUsize::new(0),
      cancelled: AtomicBool::new(false),
      context: observer.context(),
    });
    observer.on_subscribe(shared.clone());
    *shared.sink.lock() = Some(observer);

    self
      .source1
      .actual_subscribe(MergeObserver { shared: shared.clone(), index: 0 });
    self
      .source2
      .actual_subscribe(MergeObserver { shared, index: 1 });
  }
}

struct MergeShared<T, O> {
  /// Only touched by the thread owning `wip`.
  sink: Mutex<Option<O>>,
  queue: Mutex<VecDeque<T>>,
  failure: Mutex<Option<FlowError>>,
  upstreams: [DeferredSubscription; 2],
  requested: AtomicU64,
  active: AtomicUsize,
  wip: AtomicUsize,
  cancelled: AtomicBool,
  context: Context,
}

impl<T, O> MergeShared<T, O>
where
  T: Send + 'static,
  O: Observer<T>,
{
  fn drain(&self) {
    if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
      return;
    }
    let mut missed = 1;
    loop {
      self.emit();
      let prev = self.wip.fetch_sub(missed, Ordering::AcqRel);
      missed = prev - missed;
      if missed == 0 {
        break;
      }
    }
  }

  fn emit(&self) {
    let mut sink = self.sink.lock();
    loop {
      if sink.is_none() {
        return;
      }
      if self.cancelled.load(Ordering::Acquire) {
        *sink = None;
        self.queue.lock().clear();
        return;
      }
      let failure = self.failure.lock().take();
      if let Some(err) = failure {
        self.queue.lock().clear();
        if let Some(mut observer) = sink.take() {
          observer.error(err);
        }
        return;
      }

      let value = if self.requested.load(Ordering::Acquire) > 0 {
        self.queue.lock().pop_front()
      } else {
        None
      };
      match (value, sink.as_mut()) {
        (Some(value), Some(observer)) => {
          request_produced(&self.requested, 1);
          observer.next(value);
        }
        _ => {
          if self.active.load(Ordering::Acquire) == 0 && self.queue.lock().is_empty() {
            if let Some(mut observer) = sink.take() {
              observer.complete();
            }
          }
          return;
        }
      }
    }
  }

  fn cancel_upstreams(&self) {
    for upstream in &self.upstreams {
      upstream.cancel();
    }
  }
}

impl<T, O> Subscription for MergeShared<T, O>
where
  T: Send + 'static,
  O: Observer<T>,
{
  fn request(&self, n: u64) {
    if n == 0 {
      hooks::on_bad_request(n, &self.context);
      return;
    }
    request_add(&self.requested, n);
    for upstream in &self.upstreams {
      upstream.request(n);
    }
    self.drain();
  }

  fn cancel(&self) {
    if !self.cancelled.swap(true, Ordering::AcqRel) {
      self.cancel_upstreams();
      self.drain();
    }
  }
}

struct MergeObserver<T, O> {
  shared: Arc<MergeShared<T, O>>,
  index: usize,
}

impl<T, O> Observer<T> for MergeObserver<T, O>
where
  T: Send + 'static,
  O: Observer<T>,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.shared.upstreams[self.index].set(subscription);
  }

  fn next(&mut self, value: T) {
    self.shared.queue.lock().push_back(value);
    self.shared.drain();
  }

  fn error(&mut self, err: FlowError) {
    {
      let mut failure = self.shared.failure.lock();
      if failure.is_some() || self.shared.active.load(Ordering::Acquire) == 0 {
        drop(failure);
        hooks::on_error_dropped(&err, &self.shared.context);
        return;
      }
      *failure = Some(err);
    }
    self.shared.cancel_upstreams();
    self.shared.drain();
  }

  fn complete(&mut self) {
    self.shared.active.fetch_sub(1, Ordering::AcqRel);
    self.shared.drain();
  }

  fn context(&self) -> Context { self.shared.context.clone() }
}

#[cfg(test)]
mod tests {
  use crate::{
    prelude::*,
    testing::{TestObserver, TestPublisher},
  };

  #[test]
  fn waits_for_both_sources() {
    let left = TestPublisher::new();
    let right = TestPublisher::new();
    let observer = TestObserver::unbounded();
    left
      .clone()
      .merge_with(right.clone())
      .actual_subscribe(observer.clone());

    left.next(1);
    right.next(2);
    left.complete();
    assert_eq!(observer.completions(), 0);
    right.next(3);
    right.complete();

    assert_eq!(observer.values(), vec![1, 2, 3]);
    assert_eq!(observer.completions(), 1);
  }

  #[test]
  fn queues_beyond_demand() {
    let observer = TestObserver::new(2);
    observable::from_iter(vec!["a", "b"])
      .merge_with(observable::from_iter(vec!["c", "d"]))
      .actual_subscribe(observer.clone());

    assert_eq!(observer.values(), vec!["a", "b"]);
    observer.request(5);
    assert_eq!(observer.values(), vec!["a", "b", "c", "d"]);
    assert_eq!(observer.completions(), 1);
  }

  #[test]
  fn error_cancels_the_other_source() {
    let left = TestPublisher::<i32>::new();
    let right = TestPublisher::new();
    let observer = TestObserver::unbounded();
    left
      .clone()
      .merge_with(right.clone())
      .actual_subscribe(observer.clone());

    left.error(FlowError::message("left failed"));
    assert!(right.is_cancelled());
    assert!(observer.failed_with(|e| e.to_string() == "left failed"));
    assert_eq!(right.requests(), vec![u64::MAX]);
  }
}
