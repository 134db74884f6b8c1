//! Test doubles for driving operators by hand.
//!
//! [`TestPublisher`] is a source whose signals are pushed by the test, and
//! which records the requests and cancellation it receives.
//! [`TestObserver`] is a consumer recording everything it is sent, with a
//! configurable demand.
//!
//! ```
//! use rxflow::{prelude::*, testing::{TestObserver, TestPublisher}};
//!
//! let publisher = TestPublisher::new();
//! let observer = TestObserver::new(2);
//! publisher.clone().map(|v: i32| v + 1).actual_subscribe(observer.clone());
//!
//! publisher.next(1);
//! publisher.next(2);
//! publisher.complete();
//!
//! assert_eq!(observer.values(), vec![2, 3]);
//! assert_eq!(publisher.requests(), vec![2]);
//! ```

mod test_observer;
mod test_publisher;

pub use test_observer::TestObserver;
pub use test_publisher::TestPublisher;
