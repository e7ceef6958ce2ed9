//! Key tokens and type-erased instances
//!
//! The registry stores values of caller-determined shapes, looked up by a
//! stable type-identity token. [`Key`] is that token and [`Object`] is the
//! erased payload, which always carries the token it was sealed under so
//! that the downcast at the point of use is checked against the same
//! identity that stored it.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identity token for a key type.
///
/// Any `'static` type can serve as a key, including trait-object types such
/// as `dyn Greeter`. Two keys are equal exactly when they identify the same
/// Rust type; the captured name is only used in diagnostics.
///
/// # Examples
///
/// ```rust
/// use keywire::Key;
///
/// trait Greeter: Send + Sync {}
///
/// let by_trait = Key::of::<dyn Greeter>();
/// let by_type = Key::of::<String>();
/// assert_ne!(by_trait, by_type);
/// assert_eq!(by_trait, Key::of::<dyn Greeter>());
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Key {
    id: TypeId,
    name: &'static str,
}

impl Key {
    /// Create the key token for type `K`.
    #[inline]
    pub fn of<K: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<K>(),
            name: std::any::type_name::<K>(),
        }
    }

    /// The underlying type identity.
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Human-readable type name for diagnostics.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for Key {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Key {}

impl Hash for Key {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A type-erased, shared instance sealed for a particular key type.
///
/// Internally this is an `Arc<dyn Any>` whose payload is the key-typed
/// handle `Arc<K>`; [`Object::downcast`] recovers the handle when asked for
/// the same key type the object was sealed under. Equality compares the
/// identity of the underlying allocation, so two objects sealed from the
/// same instance under different key types still compare equal.
#[derive(Clone)]
pub struct Object {
    handle: Arc<dyn Any + Send + Sync>,
    key: Key,
    ident: usize,
}

impl Object {
    /// Seal a key-typed handle into an erased object.
    #[inline]
    pub fn from_handle<K: ?Sized + Send + Sync + 'static>(handle: Arc<K>) -> Self {
        let ident = Arc::as_ptr(&handle) as *const () as usize;
        Self {
            handle: Arc::new(handle) as Arc<dyn Any + Send + Sync>,
            key: Key::of::<K>(),
            ident,
        }
    }

    /// The key type this object was sealed for.
    #[inline]
    pub fn key(&self) -> Key {
        self.key
    }

    /// Recover the key-typed handle, checked against the seal token.
    ///
    /// Returns `None` when `K` is not the key type this object was sealed
    /// for.
    #[inline]
    pub fn downcast<K: ?Sized + 'static>(&self) -> Option<Arc<K>> {
        self.handle.downcast_ref::<Arc<K>>().cloned()
    }

    /// Recover the key-typed handle on a path already validated by key.
    ///
    /// # Panics
    ///
    /// Panics when `K` does not match the seal token. Constructor and
    /// property specs only call this with the key the argument was resolved
    /// under, so a mismatch indicates a hand-written schema whose specs and
    /// keys disagree.
    #[inline]
    pub fn handle<K: ?Sized + 'static>(&self) -> Arc<K> {
        self.downcast::<K>().unwrap_or_else(|| {
            panic!(
                "object sealed for '{}' was requested as '{}'",
                self.key,
                Key::of::<K>()
            )
        })
    }

    /// Identity of the underlying allocation, for de-duplication.
    #[inline]
    pub(crate) fn ident(&self) -> usize {
        self.ident
    }
}

impl PartialEq for Object {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.ident == other.ident
    }
}

impl Eq for Object {}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object").field("key", &self.key).finish()
    }
}
