use crate::{
  context::Context,
  error::FlowError,
  observable::Observable,
  observer::{ConditionalObserver, Observer},
  subscription::BoxedSubscription,
};

/// Applies a function to each value. Created by
/// [`ObservableExt::map`](crate::observable::ObservableExt::map).
#[derive(Clone)]
pub struct Map<S, F> {
  source: S,
  func: F,
}

impl<S, F> Map<S, F> {
  pub fn new(source: S, func: F) -> Self { Self { source, func } }
}

impl<S, F, B> Observable for Map<S, F>
where
  S: Observable,
  F: FnMut(S::Item) -> B + Send + 'static,
  B: Send + 'static,
{
  type Item = B;

  fn actual_subscribe<O: Observer<B>>(self, observer: O) {
    self
      .source
      .actual_subscribe(MapObserver { observer, func: self.func })
  }

  fn actual_subscribe_conditional<O: ConditionalObserver<B>>(self, observer: O) {
    self
      .source
      .actual_subscribe_conditional(MapObserver { observer, func: self.func })
  }
}

pub struct MapObserver<O, F> {
  observer: O,
  func: F,
}

impl<Item, B, O, F> Observer<Item> for MapObserver<O, F>
where
  O: Observer<B>,
  F: FnMut(Item) -> B + Send + 'static,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.observer.on_subscribe(subscription)
  }

  #[inline]
  fn next(&mut self, value: Item) { self.observer.next((self.func)(value)) }

  #[inline]
  fn error(&mut self, err: FlowError) { self.observer.error(err) }

  #[inline]
  fn complete(&mut self) { self.observer.complete() }

  #[inline]
  fn context(&self) -> Context { self.observer.context() }
}

impl<Item, B, O, F> ConditionalObserver<Item> for MapObserver<O, F>
where
  O: ConditionalObserver<B>,
  F: FnMut(Item) -> B + Send + 'static,
{
  #[inline]
  fn try_next(&mut self, value: Item) -> bool { self.observer.try_next((self.func)(value)) }
}
