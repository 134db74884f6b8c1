use std::{
  iter::Peekable,
  sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
  },
};

use parking_lot::Mutex;

use crate::{
  context::Context,
  hooks,
  observable::Observable,
  observer::{ConditionalObserver, Deliver, Fused, Observer, Plain},
  subscription::{request_add, request_produced, Subscription},
};

/// Creates an observable that produces values from an iterator.
///
/// Values are emitted only as they are requested. Completes as soon as the
/// last element has been delivered, without waiting for further demand; an
/// empty iterator completes right after `on_subscribe`.
///
/// Conditional observers are fed through `try_next`, so values they reject
/// are replaced from the iterator without another request.
///
/// ```
/// use rxflow::prelude::*;
///
/// let (tx, rx) = std::sync::mpsc::channel();
/// observable::from_iter(vec![0, 1, 2, 3]).subscribe(move |v| tx.send(v).unwrap());
/// assert_eq!(rx.try_iter().count(), 4);
/// ```
pub fn from_iter<Iter>(iter: Iter) -> FromIter<Iter>
where
  Iter: IntoIterator,
{
  FromIter(iter)
}

/// Creates an observable that emits `value` once and completes.
pub fn of<T>(value: T) -> FromIter<std::iter::Once<T>> { FromIter(std::iter::once(value)) }

#[derive(Clone)]
pub struct FromIter<Iter>(Iter);

impl<Iter> Observable for FromIter<Iter>
where
  Iter: IntoIterator + Send + 'static,
  Iter::IntoIter: Send + 'static,
  Iter::Item: Send + 'static,
{
  type Item = Iter::Item;

  fn actual_subscribe<O>(self, observer: O)
  where
    O: Observer<Self::Item>,
  {
    IterProducer::start(self.0.into_iter(), Plain(observer));
  }

  fn actual_subscribe_conditional<O>(self, observer: O)
  where
    O: ConditionalObserver<Self::Item>,
  {
    IterProducer::start(self.0.into_iter(), Fused(observer));
  }
}

struct Emission<It: Iterator, D> {
  iter: Peekable<It>,
  sink: Option<D>,
}

/// Shared state between the iterator and its subscription handle.
///
/// `wip` elects a single thread to run the emission loop; requests and
/// cancellations arriving meanwhile (including re-entrant ones from inside
/// `deliver`) only bump `wip` and are picked up by the running loop.
struct IterProducer<It: Iterator, D> {
  emission: Mutex<Emission<It, D>>,
  requested: AtomicU64,
  wip: AtomicUsize,
  cancelled: AtomicBool,
  context: Context,
}

impl<It, D> IterProducer<It, D>
where
  It: Iterator + Send + 'static,
  It::Item: Send + 'static,
  D: Deliver<It::Item>,
{
  fn start(iter: It, mut sink: D) {
    let producer = Arc::new(IterProducer {
      emission: Mutex::new(Emission { iter: iter.peekable(), sink: None }),
      requested: AtomicU64::new(0),
      wip: AtomicUsize::new(0),
      cancelled: AtomicBool::new(false),
      context: sink.context(),
    });
    sink.on_subscribe(producer.clone());
    producer.emission.lock().sink = Some(sink);
    producer.drain();
  }

  fn drain(&self) {
    if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
      return;
    }
    let mut missed = 1;
    loop {
      self.emit();
      let prev = self.wip.fetch_sub(missed, Ordering::AcqRel);
      missed = prev - missed;
      if missed == 0 {
        break;
      }
    }
  }

  fn emit(&self) {
    let mut emission = self.emission.lock();
    let Emission { iter, sink } = &mut *emission;
    loop {
      if sink.is_none() {
        return;
      }
      if self.cancelled.load(Ordering::Acquire) {
        *sink = None;
        return;
      }
      if iter.peek().is_none() {
        if let Some(mut done) = sink.take() {
          done.complete();
        }
        return;
      }
      if self.requested.load(Ordering::Acquire) == 0 {
        return;
      }
      let (Some(value), Some(d)) = (iter.next(), sink.as_mut()) else { return };
      if d.deliver(value) {
        request_produced(&self.requested, 1);
      }
    }
  }
}

impl<It, D> Subscription for IterProducer<It, D>
where
  It: Iterator + Send + 'static,
  It::Item: Send + 'static,
  D: Deliver<It::Item>,
{
  fn request(&self, n: u64) {
    if n == 0 {
      hooks::on_bad_request(n, &self.context);
      return;
    }
    request_add(&self.requested, n);
    self.drain();
  }

  fn cancel(&self) {
    if !self.cancelled.swap(true, Ordering::AcqRel) {
      self.drain();
    }
  }
}
