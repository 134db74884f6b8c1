//! Immutable key/value context carried alongside a subscription.
//!
//! Every [`Observer`](crate::observer::Observer) can expose a [`Context`].
//! Operators read it to find per-subscription settings (for instance the
//! dropped-signal hooks in [`hooks`](crate::hooks)), and sources can read it
//! to learn about their consumers. A context is never mutated in place:
//! [`Context::put`] and [`Context::put_all`] return a new value and leave the
//! receiver untouched, so a snapshot taken by a [`Signal`](crate::signal::Signal)
//! stays valid for the rest of the subscription.
//!
//! ```
//! use rxflow::context::Context;
//!
//! let base = Context::of("tenant", "acme").put("retries", 3_u32);
//! let over = Context::of("tenant", "globex");
//!
//! let merged = base.put_all(&over);
//! assert_eq!(merged.get::<&str>("tenant"), Some(&"globex"));
//! assert_eq!(merged.get::<u32>("retries"), Some(&3));
//! assert_eq!(base.get::<&str>("tenant"), Some(&"acme"));
//! ```

use std::{
  any::Any,
  borrow::Cow,
  fmt::{Debug, Formatter},
  sync::Arc,
};

use smallvec::SmallVec;

type Key = Cow<'static, str>;
type Value = Arc<dyn Any + Send + Sync>;

/// Most contexts hold a handful of keys; keep them inline.
type Entries = SmallVec<[(Key, Value); 4]>;

/// An immutable, cheaply cloneable key/value map.
#[derive(Clone, Default)]
pub struct Context {
  entries: Arc<Entries>,
}

impl Context {
  /// The empty context.
  #[inline]
  pub fn empty() -> Self { Self::default() }

  /// A context holding a single entry.
  pub fn of<V>(key: impl Into<Key>, value: V) -> Self
  where
    V: Any + Send + Sync,
  {
    Self::empty().put(key, value)
  }

  /// Return a copy of this context with `key` bound to `value`, replacing any
  /// previous binding of `key`.
  pub fn put<V>(&self, key: impl Into<Key>, value: V) -> Self
  where
    V: Any + Send + Sync,
  {
    let mut entries = (*self.entries).clone();
    insert(&mut entries, key.into(), Arc::new(value));
    Self { entries: Arc::new(entries) }
  }

  /// Merge `other` into a copy of this context. Keys present in both take the
  /// value from `other`.
  pub fn put_all(&self, other: &Context) -> Self {
    if other.is_empty() {
      return self.clone();
    }
    if self.is_empty() {
      return other.clone();
    }
    let mut entries = (*self.entries).clone();
    for (key, value) in other.entries.iter() {
      insert(&mut entries, key.clone(), value.clone());
    }
    Self { entries: Arc::new(entries) }
  }

  /// Return a copy of this context without `key`.
  pub fn delete(&self, key: &str) -> Self {
    if !self.contains_key(key) {
      return self.clone();
    }
    let entries = self
      .entries
      .iter()
      .filter(|(k, _)| k != key)
      .cloned()
      .collect();
    Self { entries: Arc::new(entries) }
  }

  /// Look up `key` and downcast its value to `V`.
  ///
  /// Returns `None` when the key is absent or bound to another type.
  pub fn get<V: Any>(&self, key: &str) -> Option<&V> {
    self
      .entries
      .iter()
      .find(|(k, _)| k == key)
      .and_then(|(_, v)| v.downcast_ref::<V>())
  }

  #[inline]
  pub fn contains_key(&self, key: &str) -> bool { self.entries.iter().any(|(k, _)| k == key) }

  #[inline]
  pub fn len(&self) -> usize { self.entries.len() }

  #[inline]
  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  /// Iterate over the keys in insertion order.
  pub fn keys(&self) -> impl Iterator<Item = &str> { self.entries.iter().map(|(k, _)| k.as_ref()) }
}

fn insert(entries: &mut Entries, key: Key, value: Value) {
  match entries.iter_mut().find(|(k, _)| *k == key) {
    Some(slot) => slot.1 = value,
    None => entries.push((key, value)),
  }
}

impl Debug for Context {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_set().entries(self.keys()).finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn put_does_not_touch_the_original() {
    let a = Context::of("k", 1_i32);
    let b = a.put("k", 2_i32);
    assert_eq!(a.get::<i32>("k"), Some(&1));
    assert_eq!(b.get::<i32>("k"), Some(&2));
    assert_eq!(b.len(), 1);
  }

  #[test]
  fn put_all_prefers_the_argument() {
    let downstream = Context::of("a", "down").put("b", "down");
    let written = Context::of("b", "written").put("c", "written");
    let merged = downstream.put_all(&written);

    assert_eq!(merged.get::<&str>("a"), Some(&"down"));
    assert_eq!(merged.get::<&str>("b"), Some(&"written"));
    assert_eq!(merged.get::<&str>("c"), Some(&"written"));
    assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
  }

  #[test]
  fn typed_lookup_and_delete() {
    let ctx = Context::of("n", 5_u64).put("s", String::from("x"));
    assert_eq!(ctx.get::<u32>("n"), None);
    assert_eq!(ctx.get::<String>("s").map(String::as_str), Some("x"));

    let ctx = ctx.delete("n");
    assert!(!ctx.contains_key("n"));
    assert_eq!(ctx.len(), 1);
    assert!(Context::empty().delete("n").is_empty());
  }

  #[test]
  fn grows_past_inline_capacity() {
    let ctx = (0..10).fold(Context::empty(), |ctx, i| ctx.put(format!("k{i}"), i));
    assert_eq!(ctx.len(), 10);
    assert_eq!(ctx.get::<i32>("k9"), Some(&9));
    assert_eq!(format!("{ctx:?}").matches('k').count(), 10);
  }
}
