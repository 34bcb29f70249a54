// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Per-build property store
//!
//! A [`BuildContext`] holds the key/value state shared by the steps of one
//! build. Values are either stored directly or computed lazily from other
//! properties by a typed closure; a computed value is resolved on first read
//! and cached for the rest of the build.
//!
//! Properties are ordered by their first write. A computed property only sees
//! properties written before it was registered, so forward references fail
//! with [`MobciError::UndefinedProperty`] instead of recursing.

pub mod properties;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::{MobciError, MobciResult};

/// A property value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl PropertyValue {
    /// Borrow the value as a string, if it is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as an integer, parsing strings if needed
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Str(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }

    /// Truthiness used by guards: empty strings, zero and `false` are false
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Str(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(n) => write!(f, "{}", n),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<&std::path::Path> for PropertyValue {
    fn from(p: &std::path::Path) -> Self {
        Self::Str(p.to_string_lossy().into_owned())
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<u64> for PropertyValue {
    fn from(n: u64) -> Self {
        Self::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

type ComputeFn = dyn Fn(&PropertyView<'_>) -> MobciResult<PropertyValue> + Send + Sync;

#[derive(Clone)]
enum Slot {
    Value(PropertyValue),
    Computed {
        compute: Arc<ComputeFn>,
        cache: OnceCell<PropertyValue>,
    },
}

#[derive(Clone)]
struct Entry {
    /// Position of the first write of this property
    position: u64,
    slot: Slot,
}

/// Key/value state for one build
#[derive(Clone, Default)]
pub struct BuildContext {
    entries: BTreeMap<String, Entry>,
    next_position: u64,
}

impl BuildContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing any previous value of the same name
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.insert(name.into(), Slot::Value(value.into()));
    }

    /// Register a property computed from earlier properties on first read
    pub fn set_computed<F>(&mut self, name: impl Into<String>, compute: F)
    where
        F: Fn(&PropertyView<'_>) -> MobciResult<PropertyValue> + Send + Sync + 'static,
    {
        self.insert(
            name.into(),
            Slot::Computed {
                compute: Arc::new(compute),
                cache: OnceCell::new(),
            },
        );
    }

    /// Read a property
    pub fn get(&self, name: &str) -> MobciResult<PropertyValue> {
        self.resolve(name, u64::MAX)
    }

    /// Read a property rendered as a string
    pub fn get_string(&self, name: &str) -> MobciResult<String> {
        Ok(self.get(name)?.to_string())
    }

    /// Whether a property has been written
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Names of all written properties, in name order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, name: String, slot: Slot) {
        let position = match self.entries.get(&name) {
            Some(existing) => existing.position,
            None => {
                let position = self.next_position;
                self.next_position += 1;
                position
            }
        };
        self.entries.insert(name, Entry { position, slot });
    }

    fn resolve(&self, name: &str, limit: u64) -> MobciResult<PropertyValue> {
        let entry = self
            .entries
            .get(name)
            .filter(|e| e.position < limit)
            .ok_or_else(|| MobciError::UndefinedProperty {
                name: name.to_string(),
            })?;

        match &entry.slot {
            Slot::Value(value) => Ok(value.clone()),
            Slot::Computed { compute, cache } => cache
                .get_or_try_init(|| {
                    let view = PropertyView {
                        context: self,
                        limit: entry.position,
                    };
                    compute(&view)
                })
                .cloned(),
        }
    }
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, entry) in &self.entries {
            match &entry.slot {
                Slot::Value(v) => map.entry(name, v),
                Slot::Computed { cache, .. } => match cache.get() {
                    Some(v) => map.entry(name, v),
                    None => map.entry(name, &"<computed>"),
                },
            };
        }
        map.finish()
    }
}

/// Read access handed to computed properties
///
/// Only properties first written before the computed property are visible.
pub struct PropertyView<'a> {
    context: &'a BuildContext,
    limit: u64,
}

impl PropertyView<'_> {
    pub fn get(&self, name: &str) -> MobciResult<PropertyValue> {
        self.context.resolve(name, self.limit)
    }

    pub fn get_string(&self, name: &str) -> MobciResult<String> {
        Ok(self.get(name)?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_get_undefined_property_fails() {
        let ctx = BuildContext::new();
        match ctx.get("platform") {
            Err(MobciError::UndefinedProperty { name }) => assert_eq!(name, "platform"),
            other => panic!("expected UndefinedProperty, got {:?}", other),
        }
    }

    #[test]
    fn test_set_and_overwrite() {
        let mut ctx = BuildContext::new();
        ctx.set("platform", "android");
        ctx.set("timeout", 1800i64);
        assert_eq!(ctx.get_string("platform").unwrap(), "android");
        assert_eq!(ctx.get("timeout").unwrap().as_int(), Some(1800));

        ctx.set("platform", "ios");
        assert_eq!(ctx.get_string("platform").unwrap(), "ios");
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn test_computed_property_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut ctx = BuildContext::new();
        ctx.set("builder", "android");
        ctx.set_computed("label", move |p| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{}-label", p.get_string("builder")?).into())
        });

        assert_eq!(ctx.get_string("label").unwrap(), "android-label");
        assert_eq!(ctx.get_string("label").unwrap(), "android-label");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_computed_property_rejects_forward_reference() {
        let mut ctx = BuildContext::new();
        ctx.set_computed("early", |p| p.get("late"));
        ctx.set("late", "value");

        assert!(matches!(
            ctx.get("early"),
            Err(MobciError::UndefinedProperty { .. })
        ));
    }

    #[test]
    fn test_self_reference_does_not_recurse() {
        let mut ctx = BuildContext::new();
        ctx.set_computed("loop", |p| p.get("loop"));
        assert!(ctx.get("loop").is_err());
    }

    #[test]
    fn test_overwrite_keeps_original_position() {
        let mut ctx = BuildContext::new();
        ctx.set("summary", "a.json");
        ctx.set_computed("summary_copy", |p| p.get("summary"));
        ctx.set("summary", "b.json");

        assert_eq!(ctx.get_string("summary_copy").unwrap(), "b.json");
    }

    #[test]
    fn test_truthiness() {
        assert!(PropertyValue::from("x").is_truthy());
        assert!(!PropertyValue::from("").is_truthy());
        assert!(!PropertyValue::from(0i64).is_truthy());
        assert!(PropertyValue::from(true).is_truthy());
    }
}
