use crate::{
  context::Context,
  error::FlowError,
  observable::Observable,
  observer::{ConditionalObserver, Observer},
  subscription::BoxedSubscription,
};

/// Rewrites the [`Context`] that everything upstream of it observes.
///
/// The function receives the context of the downstream observer and returns
/// the one exposed to the source.
///
/// ```
/// use rxflow::{context::Context, prelude::*, testing::{TestObserver, TestPublisher}};
///
/// let publisher = TestPublisher::<i32>::new();
/// publisher
///   .clone()
///   .context_write(|ctx| ctx.put("user", "alice"))
///   .actual_subscribe(TestObserver::new(0));
///
/// assert_eq!(publisher.subscriber_context().get::<&str>("user"), Some(&"alice"));
/// ```
#[derive(Clone)]
pub struct ContextWrite<S, F> {
  source: S,
  func: F,
}

impl<S, F> ContextWrite<S, F> {
  pub fn new(source: S, func: F) -> Self { Self { source, func } }
}

impl<S, F> Observable for ContextWrite<S, F>
where
  S: Observable,
  F: Fn(&Context) -> Context + Send + Sync + 'static,
{
  type Item = S::Item;

  fn actual_subscribe<O: Observer<S::Item>>(self, observer: O) {
    self
      .source
      .actual_subscribe(ContextWriteObserver { observer, func: self.func })
  }

  fn actual_subscribe_conditional<O: ConditionalObserver<S::Item>>(self, observer: O) {
    self
      .source
      .actual_subscribe_conditional(ContextWriteObserver { observer, func: self.func })
  }
}

pub struct ContextWriteObserver<O, F> {
  observer: O,
  func: F,
}

impl<Item, O, F> Observer<Item> for ContextWriteObserver<O, F>
where
  O: Observer<Item>,
  F: Fn(&Context) -> Context + Send + Sync + 'static,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.observer.on_subscribe(subscription)
  }

  #[inline]
  fn next(&mut self, value: Item) { self.observer.next(value) }

  #[inline]
  fn error(&mut self, err: FlowError) { self.observer.error(err) }

  #[inline]
  fn complete(&mut self) { self.observer.complete() }

  fn context(&self) -> Context { (self.func)(&self.observer.context()) }
}

impl<Item, O, F> ConditionalObserver<Item> for ContextWriteObserver<O, F>
where
  O: ConditionalObserver<Item>,
  F: Fn(&Context) -> Context + Send + Sync + 'static,
{
  #[inline]
  fn try_next(&mut self, value: Item) -> bool { self.observer.try_next(value) }
}
