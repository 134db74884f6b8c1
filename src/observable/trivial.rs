use std::marker::PhantomData;

use crate::{
  error::FlowError,
  observable::Observable,
  observer::Observer,
  subscription::EmptySubscription,
};

/// Creates an observable that produces no values and completes immediately.
///
/// ```
/// use rxflow::prelude::*;
///
/// let (tx, rx) = std::sync::mpsc::channel();
/// observable::empty::<i32>().subscribe_all(|_| {}, |_| {}, move || tx.send(()).unwrap());
/// assert!(rx.try_recv().is_ok());
/// ```
pub fn empty<Item>() -> Empty<Item> { Empty(PhantomData) }

/// Creates an observable that never emits and never terminates.
pub fn never<Item>() -> Never<Item> { Never(PhantomData) }

/// Creates an observable that emits no values and fails with `err`.
pub fn throw_err<Item>(err: FlowError) -> ThrowErr<Item> { ThrowErr(err, PhantomData) }

pub struct Empty<Item>(PhantomData<fn() -> Item>);

pub struct Never<Item>(PhantomData<fn() -> Item>);

pub struct ThrowErr<Item>(FlowError, PhantomData<fn() -> Item>);

impl<Item: Send + 'static> Observable for Empty<Item> {
  type Item = Item;

  fn actual_subscribe<O: Observer<Item>>(self, mut observer: O) {
    observer.on_subscribe(EmptySubscription::boxed());
    observer.complete();
  }
}

impl<Item: Send + 'static> Observable for Never<Item> {
  type Item = Item;

  fn actual_subscribe<O: Observer<Item>>(self, mut observer: O) {
    observer.on_subscribe(EmptySubscription::boxed());
  }
}

impl<Item: Send + 'static> Observable for ThrowErr<Item> {
  type Item = Item;

  fn actual_subscribe<O: Observer<Item>>(self, mut observer: O) {
    observer.on_subscribe(EmptySubscription::boxed());
    observer.error(self.0);
  }
}

#[cfg(test)]
mod tests {
  use crate::{prelude::*, testing::TestObserver};

  #[test]
  fn terminal_only_sources() {
    let completed = TestObserver::<u8>::new(0);
    empty().actual_subscribe(completed.clone());
    assert_eq!(completed.completions(), 1);

    let failed = TestObserver::<u8>::new(0);
    throw_err(FlowError::message("nope")).actual_subscribe(failed.clone());
    assert_eq!(failed.errors().len(), 1);
    assert_eq!(failed.errors()[0].to_string(), "nope");

    let silent = TestObserver::<u8>::new(1);
    never().actual_subscribe(silent.clone());
    assert!(silent.is_subscribed());
    assert!(!silent.is_terminated());
  }
}
