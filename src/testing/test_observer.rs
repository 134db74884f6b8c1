use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
  context::Context,
  error::FlowError,
  observer::{ConditionalObserver, Observer},
  subscription::{BoxedSubscription, DeferredSubscription, Subscription, UNBOUNDED},
};

type Predicate<T> = Box<dyn FnMut(&T) -> bool + Send>;

struct Recorded<T> {
  values: Vec<T>,
  errors: Vec<FlowError>,
  completions: usize,
  subscriptions: usize,
  predicate: Option<Predicate<T>>,
  request_on_next: u64,
  cancel_after: Option<usize>,
  context: Context,
}

/// A recording observer.
///
/// Clones share their state, so a test keeps one clone and subscribes the
/// other. It requests `initial` values on subscribe; [`request`](Self::request)
/// and [`cancel`](Self::cancel) may be called before or after that.
///
/// Every signal is recorded as received, including signals arriving after a
/// terminal one, so tests can assert that none did.
pub struct TestObserver<T> {
  recorded: Arc<Mutex<Recorded<T>>>,
  subscription: Arc<DeferredSubscription>,
  initial: u64,
}

impl<T> Clone for TestObserver<T> {
  fn clone(&self) -> Self {
    Self {
      recorded: self.recorded.clone(),
      subscription: self.subscription.clone(),
      initial: self.initial,
    }
  }
}

impl<T> TestObserver<T> {
  pub fn new(initial: u64) -> Self {
    Self {
      recorded: Arc::new(Mutex::new(Recorded {
        values: vec![],
        errors: vec![],
        completions: 0,
        subscriptions: 0,
        predicate: None,
        request_on_next: 0,
        cancel_after: None,
        context: Context::empty(),
      })),
      subscription: Arc::new(DeferredSubscription::new()),
      initial,
    }
  }

  /// An observer requesting an unbounded amount on subscribe.
  pub fn unbounded() -> Self { Self::new(UNBOUNDED) }

  /// Accept only values matching `predicate`.
  ///
  /// Through `try_next` rejections are reported to the producer. Through
  /// plain `next` every rejection is replaced by a `request(1)`.
  pub fn with_predicate(self, predicate: impl FnMut(&T) -> bool + Send + 'static) -> Self {
    self.recorded.lock().predicate = Some(Box::new(predicate));
    self
  }

  /// Request `n` more after each accepted value.
  pub fn request_on_next(self, n: u64) -> Self {
    self.recorded.lock().request_on_next = n;
    self
  }

  /// Cancel from inside `next` once `count` values have been accepted.
  pub fn cancel_after(self, count: usize) -> Self {
    self.recorded.lock().cancel_after = Some(count);
    self
  }

  /// Expose `context` to the producers.
  pub fn with_context(self, context: Context) -> Self {
    self.recorded.lock().context = context;
    self
  }

  pub fn request(&self, n: u64) { self.subscription.request(n) }

  pub fn cancel(&self) { self.subscription.cancel() }

  pub fn errors(&self) -> Vec<FlowError> { self.recorded.lock().errors.clone() }

  pub fn completions(&self) -> usize { self.recorded.lock().completions }

  pub fn is_subscribed(&self) -> bool { self.recorded.lock().subscriptions > 0 }

  /// How many times `on_subscribe` was called.
  pub fn subscriptions(&self) -> usize { self.recorded.lock().subscriptions }

  pub fn is_terminated(&self) -> bool {
    let recorded = self.recorded.lock();
    recorded.completions > 0 || !recorded.errors.is_empty()
  }

  /// Whether the only terminal signal received was an error matching `f`.
  pub fn failed_with(&self, f: impl FnOnce(&FlowError) -> bool) -> bool {
    let recorded = self.recorded.lock();
    recorded.completions == 0 && recorded.errors.len() == 1 && f(&recorded.errors[0])
  }

  /// Record `value` if accepted. Returns whether it was, and the follow-up
  /// action to take once the lock is released.
  fn offer(&self, value: T) -> (bool, Option<FollowUp>) {
    let mut recorded = self.recorded.lock();
    let accepted = match recorded.predicate.as_mut() {
      Some(predicate) => predicate(&value),
      None => true,
    };
    if !accepted {
      return (false, None);
    }
    recorded.values.push(value);
    let follow_up = if recorded.cancel_after == Some(recorded.values.len()) {
      Some(FollowUp::Cancel)
    } else if recorded.request_on_next > 0 {
      Some(FollowUp::Request(recorded.request_on_next))
    } else {
      None
    };
    (true, follow_up)
  }

  fn follow_up(&self, action: Option<FollowUp>) {
    match action {
      Some(FollowUp::Cancel) => self.subscription.cancel(),
      Some(FollowUp::Request(n)) => self.subscription.request(n),
      None => {}
    }
  }
}

impl<T: Clone> TestObserver<T> {
  pub fn values(&self) -> Vec<T> { self.recorded.lock().values.clone() }
}

enum FollowUp {
  Request(u64),
  Cancel,
}

impl<T: Send + 'static> Observer<T> for TestObserver<T> {
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    self.recorded.lock().subscriptions += 1;
    if self.subscription.set(subscription) && self.initial > 0 {
      self.subscription.request(self.initial);
    }
  }

  fn next(&mut self, value: T) {
    match self.offer(value) {
      (true, action) => self.follow_up(action),
      (false, _) => self.subscription.request(1),
    }
  }

  fn error(&mut self, err: FlowError) { self.recorded.lock().errors.push(err); }

  fn complete(&mut self) { self.recorded.lock().completions += 1; }

  fn context(&self) -> Context { self.recorded.lock().context.clone() }
}

impl<T: Send + 'static> ConditionalObserver<T> for TestObserver<T> {
  fn try_next(&mut self, value: T) -> bool {
    let (accepted, action) = self.offer(value);
    self.follow_up(action);
    accepted
  }
}
