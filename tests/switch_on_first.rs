//! Integration tests for switch_on_first
//!
//! Tests end-to-end operator chains, demand accounting, and threading
//! behavior.

use std::{
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Barrier, Mutex,
  },
  thread,
};

use futures::StreamExt;
use rxflow::{
  prelude::*,
  testing::{TestObserver, TestPublisher},
};

fn request_log() -> (Arc<Mutex<Vec<u64>>>, impl Fn(u64) + Send + Sync + 'static) {
  let log = Arc::new(Mutex::new(Vec::new()));
  let sink = log.clone();
  (log, move |n| sink.lock().unwrap().push(n))
}

#[test]
fn test_first_value_selects_the_filter() {
  let result = Arc::new(Mutex::new(Vec::new()));
  let completed = Arc::new(Mutex::new(false));
  let (r, c) = (result.clone(), completed.clone());

  from_iter(3..=10)
    .switch_on_first(|first, rest| {
      let step = first.into_value().unwrap_or(1);
      Ok(rest.filter(move |v| v % step == 0))
    })
    .subscribe_all(
      move |v| r.lock().unwrap().push(v),
      |_| {},
      move || *c.lock().unwrap() = true,
    );

  assert_eq!(*result.lock().unwrap(), vec![6, 9]);
  assert!(*completed.lock().unwrap());
}

#[test]
fn test_empty_source_with_merged_fallback() {
  let observer = TestObserver::unbounded();

  empty::<&'static str>()
    .switch_on_first(|first, rest| {
      assert!(first.is_complete());
      Ok(rest.merge_with(from_iter(vec!["1", "2", "3"])))
    })
    .actual_subscribe(observer.clone());

  assert_eq!(observer.values(), vec!["1", "2", "3"]);
  assert_eq!(observer.completions(), 1);
  assert!(observer.errors().is_empty());
}

#[test]
fn test_transformer_error_is_the_downstream_error() {
  let seen = Arc::new(Mutex::new(None));
  let captured = seen.clone();
  let observer = TestObserver::<i32>::unbounded();

  from_iter(vec![7, 8, 9])
    .switch_on_first(move |first, _| -> rxflow::error::Result<observable::Empty<i32>> {
      *captured.lock().unwrap() = Some(first);
      Err(FlowError::message("unsupported header"))
    })
    .actual_subscribe(observer.clone());

  assert!(observer.failed_with(|e| e.to_string() == "unsupported header"));
  assert!(observer.values().is_empty());
  let first = seen.lock().unwrap().take();
  assert_eq!(first.as_ref().and_then(Signal::value), Some(&7));
}

#[test]
fn test_single_value_identity_request_sequence() {
  let (log, tap) = request_log();
  let observer = TestObserver::<i32>::new(2);

  of(1)
    .on_request(tap)
    .switch_on_first(|_, rest| Ok(rest))
    .actual_subscribe(observer.clone());

  assert!(observer.values().is_empty());
  assert_eq!(observer.completions(), 1);
  assert_eq!(*log.lock().unwrap(), vec![1, 1]);
}

#[test]
fn test_unbounded_request_sequence() {
  let (log, tap) = request_log();
  let result = Arc::new(Mutex::new(Vec::new()));
  let r = result.clone();

  from_iter(1..=4)
    .on_request(tap)
    .switch_on_first(|_, rest| Ok(rest))
    .subscribe(move |v| r.lock().unwrap().push(v));

  assert_eq!(*result.lock().unwrap(), vec![2, 3, 4]);
  assert_eq!(*log.lock().unwrap(), vec![1, u64::MAX]);
}

#[test]
fn test_bounded_demand_minus_one() {
  let source = TestPublisher::<i32>::new();
  let derived = TestPublisher::<i32>::new();
  let d = derived.clone();
  let observer = TestObserver::new(4);

  source
    .clone()
    .switch_on_first(move |_, _| Ok(d))
    .actual_subscribe(observer.clone());

  observer.request(2);
  assert!(!derived.is_subscribed());
  source.next(0);

  // 4 + 2 accumulated, one spent on the first value
  assert_eq!(derived.requests(), vec![5]);
  observer.request(1);
  assert_eq!(derived.requests(), vec![5, 1]);
}

#[test]
fn test_fused_filter_saves_request_round_trips() {
  let (fused_log, fused_tap) = request_log();
  let fused = TestObserver::new(3);
  from_iter(1..=10)
    .on_request(fused_tap)
    .switch_on_first(|_, rest| Ok(rest))
    .filter(|v| v % 2 == 0)
    .actual_subscribe(fused.clone());

  // merge only delivers through plain `next`, hiding the filter's `try_next`
  let (plain_log, plain_tap) = request_log();
  let plain = TestObserver::new(3);
  from_iter(1..=10)
    .on_request(plain_tap)
    .switch_on_first(|_, rest| Ok(rest.merge_with(never())))
    .filter(|v| v % 2 == 0)
    .actual_subscribe(plain.clone());

  assert_eq!(fused.values(), vec![2, 4]);
  assert_eq!(plain.values(), vec![2, 4]);
  assert_eq!(*fused_log.lock().unwrap(), vec![1, 2]);
  assert_eq!(*plain_log.lock().unwrap(), vec![1, 2, 1]);
}

#[test]
fn test_cancel_before_first_signal() {
  let calls = Arc::new(AtomicUsize::new(0));
  let counted = calls.clone();
  let source = TestPublisher::<i32>::new();

  let handle = source
    .clone()
    .switch_on_first(move |_, rest| {
      counted.fetch_add(1, Ordering::SeqCst);
      Ok(rest)
    })
    .subscribe(|_| {});

  handle.cancel();
  assert!(source.is_cancelled());
  source.next(1);
  source.complete();
  assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_source_policy_on_derived_completion() {
  for cancel_source_on_complete in [true, false] {
    let source = TestPublisher::<i32>::new();
    let side = TestObserver::unbounded();
    let s = side.clone();
    let observer = TestObserver::<i32>::unbounded();

    source
      .clone()
      .switch_on_first_with(
        move |_, rest| {
          rest.actual_subscribe(s);
          Ok(empty())
        },
        cancel_source_on_complete,
      )
      .actual_subscribe(observer.clone());

    source.next(1);
    source.next(2);
    assert_eq!(observer.completions(), 1);
    assert_eq!(source.is_cancelled(), cancel_source_on_complete);
    let expected: Vec<i32> = if cancel_source_on_complete { vec![] } else { vec![2] };
    assert_eq!(side.values(), expected);
  }
}

#[test]
fn test_derived_overflow() {
  let source = TestPublisher::<i32>::new();
  let derived = TestPublisher::<&str>::new();
  let d = derived.clone();
  let observer = TestObserver::new(2);

  source
    .clone()
    .switch_on_first(move |_, _| Ok(d))
    .actual_subscribe(observer.clone());

  source.next(1);
  assert_eq!(derived.requests(), vec![1]);
  derived.emit(["a", "b"]);
  assert_eq!(observer.values(), vec!["a"]);
  assert!(observer.failed_with(FlowError::is_missing_requests));
  assert_eq!(
    observer.errors()[0].to_string(),
    "Can't deliver value due to lack of requests"
  );
  assert!(derived.is_cancelled());
  assert!(source.is_cancelled());
}

#[test]
fn test_branches_unify_with_box_it() {
  let pick = |header: &'static str| {
    let observer = TestObserver::unbounded();
    from_iter(vec![header, "x", "y"])
      .switch_on_first(|first, rest| {
        Ok(match first.into_value() {
          Some("upper") => rest.map(|v| v.to_uppercase()).box_it(),
          Some("drop") => from_iter(Vec::<String>::new()).box_it(),
          _ => rest.map(str::to_string).box_it(),
        })
      })
      .actual_subscribe(observer.clone());
    observer.values()
  };

  assert_eq!(pick("upper"), vec!["X".to_string(), "Y".to_string()]);
  assert_eq!(pick("raw"), vec!["x".to_string(), "y".to_string()]);
  assert!(pick("drop").is_empty());
}

#[test]
fn test_concurrent_continuation_attach() {
  const THREADS: usize = 8;

  let source = TestPublisher::<i32>::new();
  let parked = Arc::new(Mutex::new(None));
  let holder = parked.clone();
  source
    .clone()
    .switch_on_first_with(
      move |_, rest| {
        *holder.lock().unwrap() = Some(rest);
        Ok(never::<i32>())
      },
      false,
    )
    .actual_subscribe(TestObserver::unbounded());
  source.next(0);

  let rest = parked.lock().unwrap().take().expect("transformer ran");
  let barrier = Arc::new(Barrier::new(THREADS));
  let observers: Vec<TestObserver<i32>> = (0..THREADS).map(|_| TestObserver::unbounded()).collect();
  let handles: Vec<_> = observers
    .iter()
    .map(|observer| {
      let (rest, observer, barrier) = (rest.clone(), observer.clone(), barrier.clone());
      thread::spawn(move || {
        barrier.wait();
        rest.actual_subscribe(observer);
      })
    })
    .collect();
  for handle in handles {
    handle.join().unwrap();
  }

  let losers = observers
    .iter()
    .filter(|o| o.failed_with(FlowError::is_multiple_subscribers))
    .count();
  assert_eq!(losers, THREADS - 1);
  let winner = observers
    .iter()
    .find(|o| o.errors().is_empty())
    .expect("one observer attached");

  source.emit([1, 2]);
  source.complete();
  assert_eq!(winner.values(), vec![1, 2]);
  assert_eq!(winner.completions(), 1);
}

#[test]
fn test_request_racing_the_switch_is_not_lost() {
  for _ in 0..50 {
    let source = TestPublisher::<i32>::new();
    let derived = TestPublisher::<i32>::new();
    let d = derived.clone();
    let observer = TestObserver::<i32>::new(0);
    source
      .clone()
      .switch_on_first(move |_, _| Ok(d))
      .actual_subscribe(observer.clone());

    let barrier = Arc::new(Barrier::new(2));
    let requester = {
      let (observer, barrier) = (observer.clone(), barrier.clone());
      thread::spawn(move || {
        barrier.wait();
        observer.request(5);
      })
    };
    barrier.wait();
    source.next(1);
    requester.join().unwrap();

    // the first value's unit is only taken from demand that arrived before the switch
    assert!(matches!(derived.requested(), 4 | 5), "{:?}", derived.requests());
  }
}

#[test]
fn test_values_from_another_thread() {
  let source = TestPublisher::new();
  let observer = TestObserver::unbounded();
  source
    .clone()
    .switch_on_first(|first, rest| {
      let offset = first.into_value().unwrap_or(0);
      Ok(rest.map(move |v| v + offset))
    })
    .actual_subscribe(observer.clone());

  let producer = source.clone();
  thread::spawn(move || {
    producer.emit(0..=100);
    producer.complete();
  })
  .join()
  .unwrap();

  // first value 0 is the offset
  assert_eq!(observer.values(), (1..=100).collect::<Vec<_>>());
  assert_eq!(observer.completions(), 1);
}

#[tokio::test]
async fn test_switch_as_async_stream() {
  let stream = from_iter(vec!["csv", "a", "b", "c"])
    .switch_on_first(|header, rest| {
      let kind = header.into_value().unwrap_or("raw");
      Ok(rest.map(move |v| format!("{kind}:{v}")))
    })
    .into_stream_with_prefetch(2);

  let values: Vec<String> = stream.map(|v| v.unwrap()).collect().await;
  assert_eq!(values, vec!["csv:a", "csv:b", "csv:c"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stream_fed_from_a_blocking_task() {
  let source = TestPublisher::new();
  let mut stream = source
    .clone()
    .switch_on_first(|_, rest| Ok(rest.map(|v: u32| v * 2)))
    .into_stream();

  let producer = source.clone();
  tokio::task::spawn_blocking(move || {
    producer.emit([1, 2, 3]);
    producer.error(FlowError::message("link dropped"));
  })
  .await
  .unwrap();

  assert_eq!(stream.next().await.map(|v| v.ok()), Some(Some(4)));
  assert_eq!(stream.next().await.map(|v| v.ok()), Some(Some(6)));
  assert!(matches!(stream.next().await, Some(Err(FlowError::Message(_)))));
  assert!(stream.next().await.is_none());
}
