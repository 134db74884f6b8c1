//! SwitchOnFirst Operator
//!
//! Looks at the first signal of a source (a value, an error, or a
//! completion) and lets a transformer decide, from that signal, which
//! observable serves the rest of the subscription.
//!
//! The transformer receives the first [`Signal`] and a [`Continuation`], a
//! single-subscriber view of the source *after* the first signal. The
//! observable it returns (the derived observable) is subscribed in place of
//! the source, and its signals are relayed downstream.
//!
//! # Demand
//!
//! The source is asked for exactly one value up front. Downstream demand
//! received before the derived observable is subscribed is held back and
//! forwarded when it attaches, minus the one value spent on the first
//! signal. Later demand passes straight through. Unbounded demand stays
//! unbounded.
//!
//! # Cancellation
//!
//! Cancelling downstream cancels the derived observable and the source. An
//! error from the derived observable always cancels the source; a normal
//! completion cancels it only when `cancel_source_on_complete` is set (the
//! default for [`switch_on_first`](crate::observable::ObservableExt::switch_on_first)).
//! Once the source has been cancelled the continuation is inert: observers
//! attached to it receive nothing further, and later subscribers fail with
//! [`FlowError::Cancelled`].
//!
//! # Example
//!
//! ```
//! use rxflow::prelude::*;
//!
//! let (tx, rx) = std::sync::mpsc::channel();
//! observable::from_iter(vec![3, 4, 5, 6, 7, 8, 9])
//!   .switch_on_first(|first, rest| {
//!     let step = first.into_value().unwrap_or(1);
//!     Ok(rest.filter(move |v| v % step == 0))
//!   })
//!   .subscribe(move |v| tx.send(v).unwrap());
//!
//! assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![6, 9]);
//! ```

use std::{
  mem,
  panic::{catch_unwind, AssertUnwindSafe},
  sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Weak,
  },
};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::{
  context::Context,
  error::{FlowError, Result},
  hooks,
  observable::Observable,
  observer::{BoxedDeliver, ConditionalObserver, Deliver, Fused, Observer, Plain},
  signal::Signal,
  subscription::{
    request_add, request_produced, BoxedSubscription, DeferredSubscription, EmptySubscription,
    Subscription,
  },
};

const OPERATOR: &str = "switch_on_first";

// ============================================================================
// SwitchOnFirst - the observable
// ============================================================================

/// Created by [`ObservableExt::switch_on_first`](crate::observable::ObservableExt::switch_on_first)
/// and [`ObservableExt::switch_on_first_with`](crate::observable::ObservableExt::switch_on_first_with).
pub struct SwitchOnFirst<S, F> {
  source: S,
  transform: F,
  cancel_source_on_complete: bool,
}

impl<S, F> SwitchOnFirst<S, F> {
  pub fn new(source: S, transform: F, cancel_source_on_complete: bool) -> Self {
    Self { source, transform, cancel_source_on_complete }
  }

  fn subscribe_with<P, D>(self, mut downstream: D)
  where
    S: Observable,
    F: FnOnce(Signal<S::Item>, Continuation<S::Item>) -> Result<P> + Send + 'static,
    P: Observable,
    D: Deliver<P::Item>,
  {
    let shared = Arc::new(SwitchShared::new(downstream.context(), self.cancel_source_on_complete));
    downstream.on_subscribe(Arc::new(SwitchSubscription { shared: shared.clone() }));

    self.source.actual_subscribe_conditional(SwitchMain {
      shared,
      transform: Some(self.transform),
      downstream: Some(downstream),
      first_seen: false,
      done: false,
      inbound: None,
    });
  }
}

impl<S, F, P> Observable for SwitchOnFirst<S, F>
where
  S: Observable,
  F: FnOnce(Signal<S::Item>, Continuation<S::Item>) -> Result<P> + Send + 'static,
  P: Observable,
{
  type Item = P::Item;

  fn actual_subscribe<O: Observer<P::Item>>(self, observer: O) {
    self.subscribe_with::<P, _>(Plain(observer))
  }

  fn actual_subscribe_conditional<O: ConditionalObserver<P::Item>>(self, observer: O) {
    self.subscribe_with::<P, _>(Fused(observer))
  }
}

// ============================================================================
// Shared state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SwitchState {
  /// Subscribed to the source, waiting for its first signal.
  AwaitingFirst,
  /// Running the transformer and subscribing what it returned.
  Dispatching,
  /// The derived observable is attached.
  Subscribed,
  Cancelled,
  Done,
}

impl SwitchState {
  fn is_terminal(self) -> bool { matches!(self, SwitchState::Cancelled | SwitchState::Done) }
}

/// Where the continuation's observer is, as seen by the source side.
enum Handoff<T> {
  Vacant,
  Attached(BoxedDeliver<T>),
  /// Owned by the source observer, which delivers to it without locking.
  Taken,
  /// The source terminated before anyone attached; `None` is a completion.
  Terminated(Option<FlowError>),
  /// The source was cancelled.
  Closed,
}

/// Continuation side: the observer reading the rest of the source.
struct Inbound<T> {
  claimed: AtomicBool,
  detached: AtomicBool,
  slot: Mutex<Handoff<T>>,
  /// Outstanding demand of the continuation's observer.
  requested: AtomicU64,
  /// Demand of the continuation's observer, forwarded to the source once
  /// the observer is in the slot.
  demand: DeferredSubscription,
  context: OnceCell<Context>,
}

impl<T> Inbound<T> {
  fn is_detached(&self) -> bool { self.detached.load(Ordering::Acquire) }

  /// Take the attached observer out of the slot to deliver a value. With
  /// no observer attached yet, nobody asked for the value: the slot records
  /// the overflow for whoever attaches later.
  fn take_for_value(&self) -> Option<BoxedDeliver<T>> {
    let mut slot = self.slot.lock();
    match mem::replace(&mut *slot, Handoff::Taken) {
      Handoff::Attached(observer) => Some(observer),
      Handoff::Vacant => {
        *slot = Handoff::Terminated(Some(FlowError::MissingRequests));
        None
      }
      other => {
        *slot = other;
        None
      }
    }
  }

  /// Take the attached observer to hand it a terminal signal, or park the
  /// signal for an observer yet to come.
  fn take_for_terminal(&self, terminal: &Option<FlowError>) -> Option<BoxedDeliver<T>> {
    let mut slot = self.slot.lock();
    match mem::replace(&mut *slot, Handoff::Taken) {
      Handoff::Attached(observer) => Some(observer),
      Handoff::Vacant => {
        *slot = Handoff::Terminated(terminal.clone());
        None
      }
      other => {
        *slot = other;
        None
      }
    }
  }
}

struct SwitchShared<T> {
  state: Mutex<SwitchState>,
  /// Demand passed on to the derived observable and not yet used, for
  /// overflow checks.
  granted: Arc<AtomicU64>,
  /// Subscription to the derived observable.
  derived: DeferredSubscription,
  source: Arc<DeferredSubscription>,
  source_done: AtomicBool,
  cancel_source_on_complete: bool,
  context: Context,
  inbound: Inbound<T>,
}

impl<T: Send + 'static> SwitchShared<T> {
  fn new(context: Context, cancel_source_on_complete: bool) -> Self {
    Self {
      state: Mutex::new(SwitchState::AwaitingFirst),
      granted: Arc::new(AtomicU64::new(0)),
      derived: DeferredSubscription::new(),
      source: Arc::new(DeferredSubscription::new()),
      source_done: AtomicBool::new(false),
      cancel_source_on_complete,
      context,
      inbound: Inbound {
        claimed: AtomicBool::new(false),
        detached: AtomicBool::new(false),
        slot: Mutex::new(Handoff::Vacant),
        requested: AtomicU64::new(0),
        demand: DeferredSubscription::new(),
        context: OnceCell::new(),
      },
    }
  }

  fn begin_dispatch(&self) -> bool {
    let mut state = self.state.lock();
    if *state != SwitchState::AwaitingFirst {
      return false;
    }
    *state = SwitchState::Dispatching;
    true
  }

  fn mark_subscribed(&self) {
    let mut state = self.state.lock();
    if *state == SwitchState::Dispatching {
      *state = SwitchState::Subscribed;
    }
  }

  fn is_live(&self) -> bool {
    matches!(*self.state.lock(), SwitchState::Dispatching | SwitchState::Subscribed)
  }

  /// Move to `Done`. Returns `false` if a terminal state was already reached.
  fn finish(&self) -> bool {
    let mut state = self.state.lock();
    if state.is_terminal() {
      return false;
    }
    *state = SwitchState::Done;
    true
  }

  /// Downstream cancellation.
  fn cancel(&self) {
    {
      let mut state = self.state.lock();
      if state.is_terminal() {
        return;
      }
      *state = SwitchState::Cancelled;
    }
    tracing::trace!(operator = OPERATOR, "cancelled by downstream");
    self.derived.cancel();
    self.cancel_source();
  }

  /// Cancel the source unless it already terminated, and detach the
  /// continuation for good.
  fn cancel_source(&self) {
    if self.inbound.detached.swap(true, Ordering::AcqRel) {
      return;
    }
    if !self.source_done.load(Ordering::Acquire) {
      self.source.cancel();
    }
    let released = mem::replace(&mut *self.inbound.slot.lock(), Handoff::Closed);
    drop(released);
  }

  /// Stop a source that broke its demand contract. The continuation is
  /// told by whoever detected the overflow.
  fn abort_source(&self) {
    self.source_done.store(true, Ordering::Release);
    self.source.cancel();
  }

  fn drop_signal(&self, signal: Signal<T>) {
    match signal {
      Signal::Next { value, .. } => hooks::on_next_dropped(value, &self.context),
      Signal::Error { error, .. } => hooks::on_error_dropped(&error, &self.context),
      Signal::Complete { .. } => {}
    }
  }
}

/// Downstream's handle on the operator.
struct SwitchSubscription<T> {
  shared: Arc<SwitchShared<T>>,
}

impl<T: Send + 'static> Subscription for SwitchSubscription<T> {
  fn request(&self, n: u64) {
    if n == 0 {
      hooks::on_bad_request(n, &self.shared.context);
      return;
    }
    self.shared.derived.request(n);
  }

  fn cancel(&self) { self.shared.cancel() }
}

/// Subscription to the derived observable that books every request it
/// forwards, so the relay can tell when the derived observable overflows.
struct GrantedSubscription {
  upstream: BoxedSubscription,
  granted: Arc<AtomicU64>,
}

impl Subscription for GrantedSubscription {
  fn request(&self, n: u64) {
    request_add(&self.granted, n);
    self.upstream.request(n);
  }

  fn cancel(&self) { self.upstream.cancel() }
}

// ============================================================================
// SwitchMain - observer of the source
// ============================================================================

struct SwitchMain<T, F, D> {
  shared: Arc<SwitchShared<T>>,
  transform: Option<F>,
  downstream: Option<D>,
  first_seen: bool,
  done: bool,
  /// The continuation's observer, once taken out of the slot.
  inbound: Option<BoxedDeliver<T>>,
}

impl<T, F, P, D> SwitchMain<T, F, D>
where
  T: Send + 'static,
  F: FnOnce(Signal<T>, Continuation<T>) -> Result<P> + Send + 'static,
  P: Observable,
  D: Deliver<P::Item>,
{
  fn dispatch(&mut self, signal: Signal<T>) {
    let shared = self.shared.clone();
    if !shared.begin_dispatch() {
      self.transform = None;
      self.downstream = None;
      shared.drop_signal(signal);
      return;
    }
    if signal.is_terminal() {
      shared.source_done.store(true, Ordering::Release);
      shared.inbound.take_for_terminal(&signal.error_ref().cloned());
    }
    let (Some(transform), Some(downstream)) = (self.transform.take(), self.downstream.take()) else {
      return;
    };

    tracing::trace!(operator = OPERATOR, value = signal.is_next(), "dispatching first signal");
    let first_error = signal.error_ref().cloned();
    let discount = signal.is_next();
    let continuation = Continuation { shared: shared.clone() };
    let derived = catch_unwind(AssertUnwindSafe(move || transform(signal, continuation)))
      .unwrap_or_else(|payload| Err(FlowError::from_panic(payload)));

    match derived {
      Ok(publisher) => {
        let fused = downstream.is_fused();
        let relay = SwitchRelay { shared, downstream: Some(downstream), discount };
        if fused {
          publisher.actual_subscribe_conditional(relay)
        } else {
          publisher.actual_subscribe(relay)
        }
      }
      Err(err) => Self::fail(&shared, err, first_error, downstream),
    }
  }

  fn fail(shared: &SwitchShared<T>, err: FlowError, first_error: Option<FlowError>, mut downstream: D) {
    if !shared.finish() {
      hooks::on_error_dropped(&err, &shared.context);
      return;
    }
    tracing::debug!(operator = OPERATOR, error = %err, "transformer failed");
    shared.cancel_source();
    if let Some(first) = first_error {
      hooks::on_error_dropped(&first, &shared.context);
    }
    downstream.error(err);
  }

  /// Returns `false` if the value was rejected without consuming demand.
  fn on_value(&mut self, value: T) -> bool {
    if self.done {
      hooks::on_next_dropped(value, &self.shared.context);
      return true;
    }
    if !self.first_seen {
      self.first_seen = true;
      let context = self.shared.context.clone();
      self.dispatch(Signal::next(value, context));
      return true;
    }

    let shared = &self.shared;
    if shared.inbound.is_detached() {
      self.inbound = None;
      hooks::on_next_dropped(value, &shared.context);
      return true;
    }
    if self.inbound.is_none() {
      self.inbound = shared.inbound.take_for_value();
    }
    let Some(observer) = self.inbound.as_mut() else {
      tracing::warn!(operator = OPERATOR, "source emitted before the continuation was subscribed");
      self.done = true;
      shared.abort_source();
      hooks::on_next_dropped(value, &shared.context);
      return true;
    };

    if !request_produced(&shared.inbound.requested, 1) {
      tracing::warn!(operator = OPERATOR, "source emitted beyond the continuation's demand");
      self.done = true;
      shared.abort_source();
      hooks::on_next_dropped(value, &shared.context);
      if let Some(mut observer) = self.inbound.take() {
        observer.error(FlowError::MissingRequests);
      }
      return true;
    }
    if observer.deliver(value) {
      true
    } else {
      request_add(&shared.inbound.requested, 1);
      false
    }
  }

  fn on_terminal(&mut self, terminal: Option<FlowError>) {
    if self.done {
      if let Some(err) = &terminal {
        hooks::on_error_dropped(err, &self.shared.context);
      }
      return;
    }
    self.done = true;
    if !self.first_seen {
      self.first_seen = true;
      let context = self.shared.context.clone();
      let signal = match terminal {
        Some(error) => Signal::error(error, context),
        None => Signal::complete(context),
      };
      self.dispatch(signal);
      return;
    }

    self.shared.source_done.store(true, Ordering::Release);
    if self.shared.inbound.is_detached() {
      self.inbound = None;
      if let Some(err) = &terminal {
        hooks::on_error_dropped(err, &self.shared.context);
      }
      return;
    }
    let observer = match self.inbound.take() {
      Some(observer) => Some(observer),
      None => self.shared.inbound.take_for_terminal(&terminal),
    };
    if let Some(mut observer) = observer {
      match terminal {
        Some(err) => observer.error(err),
        None => observer.complete(),
      }
    }
  }
}

impl<T, F, P, D> Observer<T> for SwitchMain<T, F, D>
where
  T: Send + 'static,
  F: FnOnce(Signal<T>, Continuation<T>) -> Result<P> + Send + 'static,
  P: Observable,
  D: Deliver<P::Item>,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    let source = &self.shared.source;
    if source.set(subscription) && !source.is_cancelled() {
      source.request(1);
    }
  }

  fn next(&mut self, value: T) {
    if !self.on_value(value) {
      self.shared.source.request(1);
    }
  }

  fn error(&mut self, err: FlowError) { self.on_terminal(Some(err)) }

  fn complete(&mut self) { self.on_terminal(None) }

  fn context(&self) -> Context {
    match self.shared.inbound.context.get() {
      Some(inbound) => self.shared.context.put_all(inbound),
      None => self.shared.context.clone(),
    }
  }
}

impl<T, F, P, D> ConditionalObserver<T> for SwitchMain<T, F, D>
where
  T: Send + 'static,
  F: FnOnce(Signal<T>, Continuation<T>) -> Result<P> + Send + 'static,
  P: Observable,
  D: Deliver<P::Item>,
{
  fn try_next(&mut self, value: T) -> bool { self.on_value(value) }
}

// ============================================================================
// SwitchRelay - observer of the derived observable
// ============================================================================

struct SwitchRelay<T, D> {
  shared: Arc<SwitchShared<T>>,
  downstream: Option<D>,
  /// Whether the first signal was a value, spending one unit of demand.
  discount: bool,
}

impl<T: Send + 'static, D> SwitchRelay<T, D> {
  /// Returns `false` if downstream rejected the value. The unit it used
  /// stays spent; whoever replaces the value requests it again.
  fn relay<R>(&mut self, value: R) -> bool
  where
    R: Send + 'static,
    D: Deliver<R>,
  {
    if self.downstream.is_none() || !self.shared.is_live() {
      self.downstream = None;
      hooks::on_next_dropped(value, &self.shared.context);
      return true;
    }
    if !request_produced(&self.shared.granted, 1) {
      hooks::on_next_dropped(value, &self.shared.context);
      if !self.shared.finish() {
        return true;
      }
      tracing::warn!(operator = OPERATOR, "derived observable emitted beyond its demand");
      self.shared.derived.cancel();
      self.shared.cancel_source();
      if let Some(mut downstream) = self.downstream.take() {
        downstream.error(FlowError::MissingRequests);
      }
      return true;
    }
    let Some(downstream) = self.downstream.as_mut() else { return true };
    downstream.deliver(value)
  }
}

impl<T, R, D> Observer<R> for SwitchRelay<T, D>
where
  T: Send + 'static,
  R: Send + 'static,
  D: Deliver<R>,
{
  fn on_subscribe(&mut self, subscription: BoxedSubscription) {
    if self.discount {
      self.shared.derived.discount_one();
    }
    self.shared.mark_subscribed();
    let granted = self.shared.granted.clone();
    self.shared.derived.set(Arc::new(GrantedSubscription { upstream: subscription, granted }));
  }

  fn next(&mut self, value: R) {
    if !self.relay(value) {
      self.shared.derived.request(1);
    }
  }

  fn error(&mut self, err: FlowError) {
    if !self.shared.finish() {
      self.downstream = None;
      hooks::on_error_dropped(&err, &self.shared.context);
      return;
    }
    self.shared.cancel_source();
    if let Some(mut downstream) = self.downstream.take() {
      downstream.error(err);
    }
  }

  fn complete(&mut self) {
    if !self.shared.finish() {
      self.downstream = None;
      return;
    }
    if self.shared.cancel_source_on_complete {
      self.shared.cancel_source();
    }
    if let Some(mut downstream) = self.downstream.take() {
      downstream.complete();
    }
  }

  fn context(&self) -> Context { self.shared.context.clone() }
}

impl<T, R, D> ConditionalObserver<R> for SwitchRelay<T, D>
where
  T: Send + 'static,
  R: Send + 'static,
  D: Deliver<R>,
{
  fn try_next(&mut self, value: R) -> bool {
    let accepted = self.relay(value);
    if !accepted {
      // The producer replaces the value without a new request.
      request_add(&self.shared.granted, 1);
    }
    accepted
  }
}

// ============================================================================
// Continuation - the rest of the source
// ============================================================================

/// The source of a `switch_on_first`, minus its first signal.
///
/// Handed to the transformer alongside the first [`Signal`]. It may be
/// cloned freely, but only one observer can ever subscribe: every other
/// attempt fails with [`FlowError::MultipleSubscribers`] without affecting the
/// first. If the first signal was terminal, a subscriber receives it right
/// away. Subscribing after the source has been cancelled fails with
/// [`FlowError::Cancelled`].
pub struct Continuation<T> {
  shared: Arc<SwitchShared<T>>,
}

impl<T> Clone for Continuation<T> {
  fn clone(&self) -> Self { Self { shared: self.shared.clone() } }
}

impl<T: Send + 'static> Continuation<T> {
  /// Whether an observer has already claimed this continuation.
  pub fn is_claimed(&self) -> bool { self.shared.inbound.claimed.load(Ordering::Acquire) }

  fn attach(self, mut observer: BoxedDeliver<T>) {
    let inbound = &self.shared.inbound;
    if inbound.claimed.swap(true, Ordering::AcqRel) {
      observer.on_subscribe(EmptySubscription::boxed());
      observer.error(FlowError::MultipleSubscribers { operator: OPERATOR });
      return;
    }
    if inbound.is_detached() {
      observer.on_subscribe(EmptySubscription::boxed());
      observer.error(FlowError::Cancelled { operator: OPERATOR });
      return;
    }

    let _ = inbound.context.set(observer.context());
    observer.on_subscribe(Arc::new(ContinuationSubscription { shared: Arc::downgrade(&self.shared) }));

    let mut slot = inbound.slot.lock();
    match mem::replace(&mut *slot, Handoff::Taken) {
      Handoff::Vacant => {
        *slot = Handoff::Attached(observer);
        drop(slot);
        let source: BoxedSubscription = self.shared.source.clone();
        inbound.demand.set(source);
      }
      Handoff::Terminated(terminal) => {
        drop(slot);
        match terminal {
          Some(err) => observer.error(err),
          None => observer.complete(),
        }
      }
      other => {
        *slot = other;
        drop(slot);
        observer.error(FlowError::Cancelled { operator: OPERATOR });
      }
    }
  }
}

impl<T: Send + 'static> Observable for Continuation<T> {
  type Item = T;

  fn actual_subscribe<O: Observer<T>>(self, observer: O) { self.attach(Box::new(Plain(observer))) }

  fn actual_subscribe_conditional<O: ConditionalObserver<T>>(self, observer: O) {
    self.attach(Box::new(Fused(observer)))
  }
}

/// The continuation observer's handle. Weak, so that the shared state the
/// observer lives in does not keep itself alive.
struct ContinuationSubscription<T> {
  shared: Weak<SwitchShared<T>>,
}

impl<T: Send + 'static> Subscription for ContinuationSubscription<T> {
  fn request(&self, n: u64) {
    let Some(shared) = self.shared.upgrade() else { return };
    if n == 0 {
      hooks::on_bad_request(n, &shared.context);
      return;
    }
    request_add(&shared.inbound.requested, n);
    shared.inbound.demand.request(n);
  }

  fn cancel(&self) {
    if let Some(shared) = self.shared.upgrade() {
      shared.inbound.demand.cancel();
      shared.cancel_source();
    }
  }
}

// ============================================================================
// Tests
// ============================================================================
