use crate::{
  context::Context,
  error::FlowError,
  observable::Observable,
  observer::{ConditionalObserver, Deliver, Fused, Observer, Plain},
  subscription::{BoxedSubscription, Subscription},
};

/// Emit only those values that pass a predicate test.
///
/// The filter always presents itself to its source as a
/// [`ConditionalObserver`]: a fused source learns about a rejected value
/// from `try_next` and moves on without a request. A source that only knows
/// plain `next` gets a `request(1)` back for every rejection instead.
///
/// ```
/// use rxflow::prelude::*;
///
/// let (tx, rx) = std::sync::mpsc::channel();
/// observable::from_iter(0..10)
///   .filter(|v| *v % 2 == 0)
///   .subscribe(move |v| tx.send(v).unwrap());
///
/// assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![0, 2, 4, 6, 8]);
/// ```
#[derive(Clone)]
pub struct Filter<S, F> {
  source: S,
  predicate: F,
}

impl<S, F> Filter<S, F> {
  pub fn new(source: S, predicate: F) -> Self { Self { source, predicate } }
}

impl<S, F> Observable for Filter<S, F>
where
  S: Observable,
  F: FnMut(&S::Item) -> bool + Send + 'static,
{
  type Item = S::Item;

  fn actual_subscribe<O: Observer<S::Item>>(self, observer: O) {
    self
      .source
      .actual_subscribe_conditional(FilterObserver::new(Plain(observer), self.predicate))
  }

  fn actual_subscribe_conditional<O: ConditionalObserver<S::Item>>(self, observer: O) {
    self
      .source
      .actual_subscribe_conditional(FilterObserver::new(Fused(observer), self.predicate))
  }
}

pub struct FilterObserver<D, F> {
  downstream: D,
  predicate: F,
  upstream: Option<BoxedSubscription>,
}

impl<D, F> FilterObserver<D, F> {
  fn new(downstream: D, predicate: F) -> Self { Self { downstream, predicate, upstream: None } }
}

impl<Item, D, F> Observer<Item> for FilterObserver<D, F>
where
  D: Deliver<Item>,
  F: FnMut(&Item) -> bool + Send + 'static,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.upstream = Some(subscription.clone());
    self.downstream.on_subscribe(subscription);
  }

  fn next(&mut self, value: Item) {
    if !self.try_next(value) {
      if let Some(upstream) = &self.upstream {
        upstream.request(1);
      }
    }
  }

  fn error(&mut self, err: FlowError) {
    self.upstream = None;
    self.downstream.error(err)
  }

  fn complete(&mut self) {
    self.upstream = None;
    self.downstream.complete()
  }

  fn context(&self) -> Context { self.downstream.context() }
}

impl<Item, D, F> ConditionalObserver<Item> for FilterObserver<D, F>
where
  D: Deliver<Item>,
  F: FnMut(&Item) -> bool + Send + 'static,
{
  fn try_next(&mut self, value: Item) -> bool {
    (self.predicate)(&value) && self.downstream.deliver(value)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use parking_lot::Mutex;

  use crate::{
    prelude::*,
    testing::{TestObserver, TestPublisher},
  };

  #[test]
  fn fused_source_needs_no_replacement_requests() {
    let requests = Arc::new(Mutex::new(vec![]));
    let log = requests.clone();
    let observer = TestObserver::new(3);
    observable::from_iter(0..20)
      .on_request(move |n| log.lock().push(n))
      .filter(|v| v % 5 == 0)
      .actual_subscribe(observer.clone());

    assert_eq!(observer.values(), vec![0, 5, 10]);
    assert_eq!(*requests.lock(), vec![3]);
  }

  #[test]
  fn plain_source_gets_one_request_per_rejection() {
    let publisher = TestPublisher::new();
    let observer = TestObserver::new(1);
    publisher
      .clone()
      .filter(|v: &i32| *v > 2)
      .actual_subscribe(observer.clone());

    publisher.emit([1, 2, 3]);
    assert_eq!(observer.values(), vec![3]);
    assert_eq!(publisher.requests(), vec![1, 1, 1]);
  }

  #[test]
  fn chained_filters_stay_fused() {
    let observer = TestObserver::new(2).with_predicate(|v: &i32| *v != 4);
    observable::from_iter(1..=10)
      .filter(|v| v % 2 == 0)
      .actual_subscribe_conditional(observer.clone());
    assert_eq!(observer.values(), vec![2, 6]);
  }
}
