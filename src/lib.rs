//! # rxflow: backpressured reactive streams
//!
//! Demand-driven observables in the Reactive Streams mould, built around
//! [`switch_on_first`](ops::switch_on_first): an operator that inspects the
//! first signal of a stream and lets it decide how the rest is processed.
//!
//! ## Quick Start
//!
//! ```rust
//! use rxflow::prelude::*;
//!
//! let (tx, rx) = std::sync::mpsc::channel();
//! observable::from_iter(vec!["json", "{a}", "{b}"])
//!   .switch_on_first(|header, rest| {
//!     let tag = header.into_value().unwrap_or("raw");
//!     Ok(rest.map(move |body| format!("{tag}:{body}")))
//!   })
//!   .subscribe(move |v| tx.send(v).unwrap());
//!
//! assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec!["json:{a}", "json:{b}"]);
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Observable`] | A source of values, subscribed with an observer |
//! | [`Observer`] | Consumes `next`, `error`, and `complete` events |
//! | [`Subscription`] | Requests values and cancels the stream |
//! | [`Context`] | Immutable key/value data flowing from observer to source |
//!
//! Nothing flows until it is requested: an observer receives at most as many
//! values as it asked for through its [`Subscription`]. Observers that can
//! reject values synchronously implement
//! [`ConditionalObserver`](observer::ConditionalObserver), which saves a
//! request round-trip per rejected value when the producer supports it.
//!
//! [`Observable`]: observable::Observable
//! [`Observer`]: observer::Observer
//! [`Subscription`]: subscription::Subscription
//! [`Context`]: context::Context

pub mod context;
pub mod error;
pub mod hooks;
pub mod observable;
pub mod observer;
pub mod ops;
pub mod prelude;
pub mod signal;
pub mod subscription;
pub mod testing;

// Re-export the prelude module
pub use prelude::*;

// Bring README.md into Cargo-driven doctests. This module is only compiled
// for rustdoc doctest builds.
#[cfg(doctest)]
mod __markdown_doctests {
  mod readme {
    #![doc = include_str!("../README.md")]
  }
}
