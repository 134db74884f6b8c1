//! Type-erased observables
//!
//! `Observable` has generic methods and so is not object safe.
//! [`DynObservable`] mirrors it with boxed observers, and [`BoxedObservable`]
//! turns that back into an `Observable`. Useful when a transformer returns
//! different observable types from different branches.

use crate::{
  observable::Observable,
  observer::{BoxedConditionalObserver, BoxedObserver, ConditionalObserver, Observer},
};

/// Object-safe mirror of [`Observable`].
pub trait DynObservable<Item>: Send + 'static {
  fn dyn_subscribe(self: Box<Self>, observer: BoxedObserver<Item>);
  fn dyn_subscribe_conditional(self: Box<Self>, observer: BoxedConditionalObserver<Item>);
}

impl<S: Observable> DynObservable<S::Item> for S {
  #[inline]
  fn dyn_subscribe(self: Box<Self>, observer: BoxedObserver<S::Item>) {
    (*self).actual_subscribe(observer)
  }

  #[inline]
  fn dyn_subscribe_conditional(self: Box<Self>, observer: BoxedConditionalObserver<S::Item>) {
    (*self).actual_subscribe_conditional(observer)
  }
}

/// An observable whose concrete type has been erased.
///
/// Keeps the conditional capability of the boxed observable.
pub struct BoxedObservable<Item>(Box<dyn DynObservable<Item>>);

impl<Item: Send + 'static> BoxedObservable<Item> {
  pub fn new(observable: impl Observable<Item = Item>) -> Self { Self(Box::new(observable)) }
}

impl<Item: Send + 'static> Observable for BoxedObservable<Item> {
  type Item = Item;

  fn actual_subscribe<O: Observer<Item>>(self, observer: O) { self.0.dyn_subscribe(Box::new(observer)) }

  fn actual_subscribe_conditional<O: ConditionalObserver<Item>>(self, observer: O) {
    self.0.dyn_subscribe_conditional(Box::new(observer))
  }
}

#[cfg(test)]
mod tests {
  use crate::{prelude::*, testing::TestObserver};

  #[test]
  fn branches_share_one_type() {
    let pick = |even: bool| -> BoxedObservable<i32> {
      if even { observable::from_iter(vec![2, 4]).box_it() } else { observable::of(1).box_it() }
    };

    let observer = TestObserver::unbounded();
    pick(true).actual_subscribe(observer.clone());
    assert_eq!(observer.values(), vec![2, 4]);

    let observer = TestObserver::unbounded();
    pick(false).actual_subscribe(observer.clone());
    assert_eq!(observer.values(), vec![1]);
  }

  #[test]
  fn boxing_keeps_fused_delivery() {
    let observer = TestObserver::new(1).with_predicate(|v: &i32| *v > 3);
    let requests = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let log = requests.clone();
    observable::from_iter(1..=5)
      .on_request(move |n| log.lock().push(n))
      .box_it()
      .actual_subscribe_conditional(observer.clone());

    assert_eq!(observer.values(), vec![4]);
    assert_eq!(*requests.lock(), vec![1]);
  }
}
