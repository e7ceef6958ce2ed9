//! Injection schemas
//!
//! There is no runtime reflection to discover which constructors and
//! properties are marked for injection, so every injectable type carries an
//! explicit [`Schema`]: the keys it satisfies, its marked constructors, its
//! marked writable properties and an optional zero-argument fallback. The
//! [`injectable!`](crate::injectable) macro generates schemas for the common
//! cases; hand-written impls are possible for unusual ones.

use crate::key::{Key, Object};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Upcasts an erased concrete instance into an [`Object`] sealed for one of
/// the keys its type satisfies.
///
/// The input `Arc`'s payload must be the concrete type the caster was
/// generated for; `None` means it was not.
pub type Caster = fn(Arc<dyn Any + Send + Sync>) -> Option<Object>;

/// A constructor marked for injection.
pub struct ConstructorSpec {
    /// Key types of the constructor parameters, in order.
    pub params: Vec<Key>,
    /// Instantiate from resolved arguments. Receives exactly one [`Object`]
    /// per entry in `params`, each sealed for the matching key.
    pub build: fn(&[Object]) -> Box<dyn Any + Send + Sync>,
}

/// A writable property marked for injection.
pub struct PropertySpec {
    /// Property name, for diagnostics.
    pub name: &'static str,
    /// Key type the property is resolved under.
    pub key: Key,
    /// Assign the resolved value. The target is the not-yet-shared concrete
    /// instance; the value is sealed for `key`.
    pub set: fn(&mut dyn Any, Object),
}

/// Injection metadata for one concrete type.
///
/// This is the capability query the resolver and property injector run
/// against: "which constructors and properties carry the inject marker, and
/// which key types does this type satisfy".
pub struct Schema {
    /// Concrete type name, used in error messages.
    pub name: &'static str,
    /// Key token of the concrete type itself.
    pub key: Key,
    /// Keys this type satisfies, each with its upcasting caster. Always
    /// includes the concrete type's own key.
    pub keys: Vec<(Key, Caster)>,
    /// Constructors carrying the inject marker.
    pub constructors: Vec<ConstructorSpec>,
    /// Writable properties carrying the inject marker, in declaration order.
    pub properties: Vec<PropertySpec>,
    /// Zero-argument constructor, used when no constructor is marked.
    pub fallback: Option<fn() -> Box<dyn Any + Send + Sync>>,
}

impl Schema {
    /// Caster for `key`, if this type satisfies it.
    #[inline]
    pub fn caster(&self, key: Key) -> Option<Caster> {
        self.keys
            .iter()
            .find(|(candidate, _)| *candidate == key)
            .map(|(_, caster)| *caster)
    }

    /// Whether this type satisfies `key`.
    #[inline]
    pub fn satisfies(&self, key: Key) -> bool {
        self.caster(key).is_some()
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("keys", &self.keys.len())
            .field("constructors", &self.constructors.len())
            .field("properties", &self.properties.len())
            .finish()
    }
}

/// A type the container can construct and inject.
///
/// Implemented by the [`injectable!`](crate::injectable) macro; the schema
/// is a per-type static built on first use.
pub trait Injectable: Send + Sync + 'static {
    /// The injection schema for this type.
    fn schema() -> &'static Schema
    where
        Self: Sized;
}

/// Declares that `Self` satisfies key type `K`.
///
/// This is the compile-time face of assignability: the generic registration
/// methods bound their implementation parameter by `Implements<K>`, and the
/// casters in a type's [`Schema`] route through [`Implements::upcast`], so
/// the trait impl and the schema entry always describe the same
/// relationship. Every type trivially implements its own key.
pub trait Implements<K: ?Sized + 'static>: Injectable {
    /// Convert a concrete handle into a key-typed one.
    fn upcast(this: Arc<Self>) -> Arc<K>;
}

impl<T: Injectable> Implements<T> for T {
    #[inline]
    fn upcast(this: Arc<Self>) -> Arc<T> {
        this
    }
}

/// A freshly constructed instance that has not yet been property-injected
/// or sealed into a shared handle.
///
/// Factory bindings produce these; the container injects marked properties
/// through the carried schema and then seals the value for the binding's
/// key type.
pub struct Fresh {
    pub(crate) value: Box<dyn Any + Send + Sync>,
    pub(crate) schema: &'static Schema,
}

impl Fresh {
    /// Wrap a just-created instance together with its schema.
    #[inline]
    pub fn new<T: Injectable>(value: T) -> Self {
        Self {
            value: Box::new(value),
            schema: T::schema(),
        }
    }

    /// Schema of the concrete instance.
    #[inline]
    pub fn schema(&self) -> &'static Schema {
        self.schema
    }
}

impl fmt::Debug for Fresh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fresh")
            .field("type", &self.schema.name)
            .finish()
    }
}
