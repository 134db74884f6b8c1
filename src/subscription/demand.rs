use std::sync::atomic::{AtomicU64, Ordering};

/// Demand value meaning "no limit". Once reached it never decreases.
pub const UNBOUNDED: u64 = u64::MAX;

/// Add `n` to the demand counter, saturating at [`UNBOUNDED`].
///
/// Returns the previous value.
pub fn request_add(requested: &AtomicU64, n: u64) -> u64 {
  let mut current = requested.load(Ordering::Acquire);
  loop {
    if current == UNBOUNDED {
      return UNBOUNDED;
    }
    let next = current.saturating_add(n);
    match requested.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
      Ok(prev) => return prev,
      Err(actual) => current = actual,
    }
  }
}

/// Account for `n` delivered values.
///
/// Returns `false`, leaving the counter untouched, when fewer than `n` values
/// were requested. An unbounded counter always succeeds.
pub fn request_produced(requested: &AtomicU64, n: u64) -> bool {
  let mut current = requested.load(Ordering::Acquire);
  loop {
    if current == UNBOUNDED {
      return true;
    }
    if current < n {
      return false;
    }
    match requested.compare_exchange_weak(current, current - n, Ordering::AcqRel, Ordering::Acquire)
    {
      Ok(_) => return true,
      Err(actual) => current = actual,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn add_saturates_and_sticks() {
    let r = AtomicU64::new(0);
    assert_eq!(request_add(&r, 5), 0);
    assert_eq!(request_add(&r, UNBOUNDED - 2), 5);
    assert_eq!(r.load(Ordering::Relaxed), UNBOUNDED);
    assert_eq!(request_add(&r, 1), UNBOUNDED);
    assert!(request_produced(&r, 1_000));
    assert_eq!(r.load(Ordering::Relaxed), UNBOUNDED);
  }

  #[test]
  fn produced_refuses_to_underflow() {
    let r = AtomicU64::new(2);
    assert!(request_produced(&r, 1));
    assert!(!request_produced(&r, 2));
    assert!(request_produced(&r, 1));
    assert!(!request_produced(&r, 1));
    assert_eq!(r.load(Ordering::Relaxed), 0);
  }
}
