use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use once_cell::sync::OnceCell;

use super::{demand::request_add, BoxedSubscription, Subscription, UNBOUNDED};

/// A subscription whose upstream arrives later.
///
/// Requests made before [`set`](Self::set) are accumulated and flushed in one
/// call when the upstream attaches; requests made afterwards pass straight
/// through. A `cancel` before `set` is remembered and applied to the upstream
/// as soon as it arrives.
///
/// A request racing `set` is never lost nor forwarded twice: both sides drain
/// the pending counter with an atomic swap, and whichever swap observes a
/// non-zero value forwards it.
#[derive(Default)]
pub struct DeferredSubscription {
  upstream: OnceCell<BoxedSubscription>,
  pending: AtomicU64,
  cancelled: AtomicBool,
}

impl DeferredSubscription {
  pub fn new() -> Self { Self::default() }

  /// Attach the upstream subscription.
  ///
  /// Returns `false` if an upstream was already attached; the rejected one is
  /// cancelled.
  pub fn set(&self, upstream: BoxedSubscription) -> bool {
    if let Err(rejected) = self.upstream.set(upstream) {
      rejected.cancel();
      return false;
    }
    let Some(upstream) = self.upstream.get() else { return false };
    if self.cancelled.load(Ordering::Acquire) {
      upstream.cancel();
      return true;
    }
    let pending = self.pending.swap(0, Ordering::AcqRel);
    if pending > 0 {
      upstream.request(pending);
    }
    true
  }

  /// Remove one unit from demand that has not been forwarded yet. Has no
  /// effect on unbounded or empty demand, or once the upstream is attached.
  pub fn discount_one(&self) {
    let mut current = self.pending.load(Ordering::Acquire);
    while current != 0 && current != UNBOUNDED {
      match self
        .pending
        .compare_exchange_weak(current, current - 1, Ordering::AcqRel, Ordering::Acquire)
      {
        Ok(_) => return,
        Err(actual) => current = actual,
      }
    }
  }

  /// Demand accumulated and not yet forwarded.
  #[inline]
  pub fn pending(&self) -> u64 { self.pending.load(Ordering::Acquire) }

  #[inline]
  pub fn is_attached(&self) -> bool { self.upstream.get().is_some() }

  #[inline]
  pub fn is_cancelled(&self) -> bool { self.cancelled.load(Ordering::Acquire) }
}

impl Subscription for DeferredSubscription {
  fn request(&self, n: u64) {
    if n == 0 {
      return;
    }
    if let Some(upstream) = self.upstream.get() {
      upstream.request(n);
      return;
    }
    request_add(&self.pending, n);
    if let Some(upstream) = self.upstream.get() {
      let pending = self.pending.swap(0, Ordering::AcqRel);
      if pending > 0 {
        upstream.request(pending);
      }
    }
  }

  fn cancel(&self) {
    if self.cancelled.swap(true, Ordering::AcqRel) {
      return;
    }
    if let Some(upstream) = self.upstream.get() {
      upstream.cancel();
    }
  }
}

impl std::fmt::Debug for DeferredSubscription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DeferredSubscription")
      .field("attached", &self.is_attached())
      .field("pending", &self.pending())
      .field("cancelled", &self.is_cancelled())
      .finish()
  }
}
