use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc,
};

use parking_lot::Mutex;

use crate::{
  context::Context,
  error::FlowError,
  hooks,
  observable::Observable,
  observer::{BoxedDeliver, ConditionalObserver, Fused, Observer, Plain},
  subscription::{EmptySubscription, Subscription},
};

/// Requests and cancellation received from the subscriber.
#[derive(Default)]
struct DemandLog {
  requests: Mutex<Vec<u64>>,
  cancelled: AtomicBool,
}

impl Subscription for DemandLog {
  fn request(&self, n: u64) { self.requests.lock().push(n); }

  fn cancel(&self) { self.cancelled.store(true, Ordering::Release); }
}

struct Inner<T> {
  sink: Mutex<Option<BoxedDeliver<T>>>,
  demand_log: Arc<DemandLog>,
  subscribed: AtomicBool,
  context: Mutex<Context>,
  conditional: bool,
}

/// A hand-driven single-subscriber source.
///
/// Signals are pushed with [`next`](Self::next), [`error`](Self::error) and
/// [`complete`](Self::complete). Demand and cancellation are recorded, not
/// enforced: values are delivered even when none were requested, so tests can
/// check how operators cope with misbehaving sources. Signals pushed after a
/// terminal one, or before anyone subscribed, go nowhere.
///
/// Emission must not be re-entered from inside the subscriber.
pub struct TestPublisher<T> {
  inner: Arc<Inner<T>>,
}

impl<T> Clone for TestPublisher<T> {
  fn clone(&self) -> Self { Self { inner: self.inner.clone() } }
}

impl<T: Send + 'static> Default for TestPublisher<T> {
  fn default() -> Self { Self::new() }
}

impl<T: Send + 'static> TestPublisher<T> {
  /// A publisher delivering through plain `next` only.
  pub fn new() -> Self { Self::build(false) }

  /// A publisher that uses `try_next` when its subscriber offers it.
  pub fn conditional() -> Self { Self::build(true) }

  fn build(conditional: bool) -> Self {
    Self {
      inner: Arc::new(Inner {
        sink: Mutex::new(None),
        demand_log: Arc::new(DemandLog::default()),
        subscribed: AtomicBool::new(false),
        context: Mutex::new(Context::empty()),
        conditional,
      }),
    }
  }

  /// Push a value. Values offered to a conditional subscriber may be
  /// rejected; use [`try_next`](Self::try_next) to see the outcome.
  pub fn next(&self, value: T) { self.try_next(value); }

  /// Push a value, returning whether the subscriber accepted it.
  pub fn try_next(&self, value: T) -> bool {
    let mut sink = self.inner.sink.lock();
    match sink.as_mut() {
      Some(sink) => sink.deliver(value),
      None => false,
    }
  }

  /// Push each value of `values` in turn.
  pub fn emit(&self, values: impl IntoIterator<Item = T>) {
    for v in values {
      self.next(v);
    }
  }

  pub fn error(&self, err: FlowError) {
    let sink = self.inner.sink.lock().take();
    match sink {
      Some(mut sink) => sink.error(err),
      None => hooks::on_error_dropped(&err, &self.subscriber_context()),
    }
  }

  pub fn complete(&self) {
    let sink = self.inner.sink.lock().take();
    if let Some(mut sink) = sink {
      sink.complete();
    }
  }

  /// Every `request` amount received, in order.
  pub fn requests(&self) -> Vec<u64> { self.inner.demand_log.requests.lock().clone() }

  /// Sum of all requests, saturating at `u64::MAX`.
  pub fn requested(&self) -> u64 {
    self.requests().into_iter().fold(0, u64::saturating_add)
  }

  pub fn is_cancelled(&self) -> bool { self.inner.demand_log.cancelled.load(Ordering::Acquire) }

  pub fn is_subscribed(&self) -> bool { self.inner.subscribed.load(Ordering::Acquire) }

  /// The context the subscriber exposes right now, or the last one seen if
  /// the subscriber has been released.
  pub fn subscriber_context(&self) -> Context {
    let sink = self.inner.sink.lock();
    match sink.as_ref() {
      Some(sink) => sink.context(),
      None => self.inner.context.lock().clone(),
    }
  }

  fn attach(&self, mut sink: BoxedDeliver<T>) {
    if self.inner.subscribed.swap(true, Ordering::AcqRel) {
      sink.on_subscribe(EmptySubscription::boxed());
      sink.error(FlowError::MultipleSubscribers { operator: "TestPublisher" });
      return;
    }
    *self.inner.context.lock() = sink.context();
    sink.on_subscribe(self.inner.demand_log.clone());
    *self.inner.sink.lock() = Some(sink);
  }
}

impl<T: Send + 'static> Observable for TestPublisher<T> {
  type Item = T;

  fn actual_subscribe<O: Observer<T>>(self, observer: O) { self.attach(Box::new(Plain(observer))) }

  fn actual_subscribe_conditional<O: ConditionalObserver<T>>(self, observer: O) {
    if self.inner.conditional {
      self.attach(Box::new(Fused(observer)))
    } else {
      self.attach(Box::new(Plain(observer)))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::TestObserver;

  #[test]
  fn records_requests_and_cancel() {
    let publisher = TestPublisher::<i32>::new();
    let observer = TestObserver::new(3);
    publisher.clone().actual_subscribe(observer.clone());

    observer.request(2);
    publisher.next(1);
    observer.cancel();

    assert_eq!(publisher.requests(), vec![3, 2]);
    assert_eq!(publisher.requested(), 5);
    assert!(publisher.is_cancelled());
    assert_eq!(observer.values(), vec![1]);
  }

  #[test]
  fn conditional_reports_rejection() {
    let publisher = TestPublisher::conditional();
    let observer = TestObserver::new(5).with_predicate(|v: &i32| *v > 0);
    publisher.clone().actual_subscribe_conditional(observer.clone());

    assert!(!publisher.try_next(-1));
    assert!(publisher.try_next(1));
    assert_eq!(observer.values(), vec![1]);
  }

  #[test]
  fn second_subscriber_is_refused() {
    let publisher = TestPublisher::<i32>::new();
    publisher.clone().actual_subscribe(TestObserver::new(1));
    let late = TestObserver::new(1);
    publisher.actual_subscribe(late.clone());
    assert!(late.failed_with(FlowError::is_multiple_subscribers));
  }

  #[test]
  fn signals_after_terminal_go_nowhere() {
    let publisher = TestPublisher::new();
    let observer = TestObserver::unbounded();
    publisher.clone().actual_subscribe(observer.clone());
    publisher.complete();
    publisher.next(1);
    publisher.complete();
    assert!(observer.values().is_empty());
    assert_eq!(observer.completions(), 1);
  }
}
