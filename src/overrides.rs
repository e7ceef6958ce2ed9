//! Override instances
//!
//! An override is a caller-supplied object used to satisfy dependencies
//! during a single resolution call, without registering it. Overrides are a
//! property of the call: the same container can be resolved with different
//! override sets concurrently.

use crate::error::{DiError, Result};
use crate::key::{Key, Object};
use crate::schema::{Injectable, Schema};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A caller-supplied instance offered to one resolution call.
///
/// Matching is by assignability: the override satisfies a dependency key
/// when its concrete type's schema lists that key. The registry always
/// takes precedence - an override is only consulted for key types the
/// container has no binding for.
///
/// # Examples
///
/// ```rust
/// use keywire::{injectable, Override};
///
/// struct Stamp(u64);
///
/// injectable!(Stamp {});
///
/// let from_value = Override::new(Stamp(1));
/// let from_arc = Override::from_arc(std::sync::Arc::new(Stamp(2)));
/// assert_eq!(from_value.concrete(), from_arc.concrete());
/// ```
#[derive(Clone)]
pub struct Override {
    value: Arc<dyn Any + Send + Sync>,
    schema: &'static Schema,
    concrete: Key,
}

impl Override {
    /// Wrap an owned instance.
    #[inline]
    pub fn new<T: Injectable>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wrap an already shared instance.
    #[inline]
    pub fn from_arc<T: Injectable>(value: Arc<T>) -> Self {
        Self {
            value: value as Arc<dyn Any + Send + Sync>,
            schema: T::schema(),
            concrete: Key::of::<T>(),
        }
    }

    /// Key token of the wrapped instance's concrete runtime type.
    #[inline]
    pub fn concrete(&self) -> Key {
        self.concrete
    }

    /// Schema of the wrapped instance's concrete runtime type.
    #[inline]
    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    /// Whether this instance's runtime type satisfies `key`.
    #[inline]
    pub(crate) fn satisfies(&self, key: Key) -> bool {
        self.schema.satisfies(key)
    }

    /// Seal the instance for `key`, when its runtime type satisfies it.
    pub(crate) fn to_object(&self, key: Key) -> Option<Object> {
        let caster = self.schema.caster(key)?;
        caster(Arc::clone(&self.value))
    }
}

impl fmt::Debug for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Override")
            .field("type", &self.concrete)
            .finish()
    }
}

/// A validated override set for one resolution call.
///
/// Invariant: at most one entry per concrete runtime type. Validation runs
/// before any lock is taken or any construction starts.
#[derive(Debug)]
pub(crate) struct OverrideSet<'a> {
    entries: &'a [Override],
}

impl<'a> OverrideSet<'a> {
    /// Validate the caller's override list.
    pub(crate) fn new(entries: &'a [Override]) -> Result<Self> {
        for (index, entry) in entries.iter().enumerate() {
            if entries[..index]
                .iter()
                .any(|earlier| earlier.concrete() == entry.concrete())
            {
                return Err(DiError::duplicate_override(entry.concrete()));
            }
        }
        Ok(Self { entries })
    }

    /// Whether any entry's runtime type satisfies `key`.
    pub(crate) fn satisfies(&self, key: Key) -> bool {
        self.unique_match(key).is_some()
    }

    /// Seal the single matching entry for `key`.
    ///
    /// Returns `None` when no entry matches, and also when more than one
    /// distinct runtime type is assignable - an ambiguous match does not
    /// satisfy the dependency.
    pub(crate) fn select(&self, key: Key) -> Option<Object> {
        self.unique_match(key).and_then(|entry| entry.to_object(key))
    }

    fn unique_match(&self, key: Key) -> Option<&Override> {
        let mut found = None;
        for entry in self.entries {
            if entry.satisfies(key) {
                if found.is_some() {
                    return None;
                }
                found = Some(entry);
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injectable;

    trait Marker: Send + Sync {}

    struct First;
    struct Second;
    struct Third;

    impl Marker for First {}
    impl Marker for Second {}

    injectable!(First {
        keys: [dyn Marker];
    });
    injectable!(Second {
        keys: [dyn Marker];
    });
    injectable!(Third {});

    #[test]
    fn test_duplicate_runtime_types_rejected() {
        let entries = [Override::new(First), Override::new(First)];
        let err = OverrideSet::new(&entries).unwrap_err();
        assert!(matches!(err, DiError::DuplicateOverride { .. }));
    }

    #[test]
    fn test_distinct_types_accepted() {
        let entries = [Override::new(First), Override::new(Second)];
        assert!(OverrideSet::new(&entries).is_ok());
    }

    #[test]
    fn test_select_by_concrete_type() {
        let entries = [Override::new(Third)];
        let set = OverrideSet::new(&entries).unwrap();

        let object = set.select(Key::of::<Third>()).unwrap();
        assert_eq!(object.key(), Key::of::<Third>());
        assert!(set.select(Key::of::<dyn Marker>()).is_none());
    }

    #[test]
    fn test_select_by_assignable_key() {
        let entries = [Override::new(First), Override::new(Third)];
        let set = OverrideSet::new(&entries).unwrap();

        let object = set.select(Key::of::<dyn Marker>()).unwrap();
        assert_eq!(object.key(), Key::of::<dyn Marker>());
    }

    #[test]
    fn test_ambiguous_match_satisfies_nothing() {
        // Two distinct runtime types, both assignable to the same key.
        let entries = [Override::new(First), Override::new(Second)];
        let set = OverrideSet::new(&entries).unwrap();

        assert!(!set.satisfies(Key::of::<dyn Marker>()));
        assert!(set.select(Key::of::<dyn Marker>()).is_none());
        // Each is still selectable by its own concrete type.
        assert!(set.select(Key::of::<First>()).is_some());
    }
}
