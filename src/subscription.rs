//! Subscription handles: the backwards channel from an observer to its
//! producer.
//!
//! A producer hands a [`BoxedSubscription`] to its observer through
//! [`Observer::on_subscribe`](crate::observer::Observer::on_subscribe). The
//! observer pulls values with [`Subscription::request`] and stops the stream
//! with [`Subscription::cancel`]. Both may be called from any thread, at any
//! time, including from inside the observer's own `next`.

use std::sync::Arc;

mod deferred;
mod demand;

pub use deferred::DeferredSubscription;
pub use demand::{request_add, request_produced, UNBOUNDED};

/// Demand and cancellation handle for one subscription.
pub trait Subscription: Send + Sync {
  /// Allow the producer to deliver `n` more values. `u64::MAX` means
  /// unbounded.
  fn request(&self, n: u64);

  /// Stop the producer. Idempotent.
  fn cancel(&self);
}

/// Shared, type-erased subscription handle.
pub type BoxedSubscription = Arc<dyn Subscription>;

impl<T: Subscription + ?Sized> Subscription for Arc<T> {
  #[inline]
  fn request(&self, n: u64) { (**self).request(n) }

  #[inline]
  fn cancel(&self) { (**self).cancel() }
}

/// A subscription that ignores every call.
///
/// Handed out when a producer terminates an observer immediately, for example
/// when refusing a second subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptySubscription;

impl EmptySubscription {
  #[inline]
  pub fn boxed() -> BoxedSubscription { Arc::new(EmptySubscription) }
}

impl Subscription for EmptySubscription {
  #[inline]
  fn request(&self, _n: u64) {}

  #[inline]
  fn cancel(&self) {}
}
