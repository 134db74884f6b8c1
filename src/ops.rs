//! Operators
//!
//! Each operator lives in its own module and is reached through
//! [`ObservableExt`](crate::observable::ObservableExt). Operators that can
//! forward fused delivery (`map`, `filter`, the lifecycle taps) override
//! `actual_subscribe_conditional`, so a `try_next`-capable observer stays
//! visible to the producer through them.

pub mod context_write;
pub mod filter;
pub mod into_stream;
pub mod lifecycle;
pub mod map;
pub mod merge;
pub mod switch_on_first;
