//! Binding data model
//!
//! A binding describes how the container produces an instance for a key
//! type: either by constructing a concrete type through its schema, or by
//! invoking a stored factory function. Bindings are immutable once
//! registered - a key must be removed before it can be bound again.

use crate::container::Resolver;
use crate::schema::{Caster, Fresh, Schema};
use std::fmt;
use std::sync::Arc;

/// Lifetime of objects produced for a key type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifetime {
    /// A new instance is produced on every resolution.
    #[default]
    PerCall,

    /// The first produced instance is cached and reused until it is
    /// removed or the container is cleared.
    PerContainer,
}

/// Factory function stored by a factory binding. Receives the read-only
/// resolution view of the container that invokes it.
pub type FactoryFn = dyn Fn(&dyn Resolver) -> Fresh + Send + Sync;

/// How to produce an instance for a key.
#[derive(Clone)]
pub(crate) enum Strategy {
    /// Construct the concrete type through its schema.
    Construct { schema: &'static Schema },
    /// Invoke the stored factory function.
    Produce { make: Arc<FactoryFn> },
}

/// A registered binding: production strategy plus lifetime.
///
/// `seal` upcasts the produced concrete instance into the binding's key
/// type. It is resolved at registration time whenever the product type is
/// known then; dynamic factory bindings leave it empty and seal against the
/// product's own schema at resolution time.
#[derive(Clone)]
pub(crate) struct Binding {
    pub(crate) strategy: Strategy,
    pub(crate) lifetime: Lifetime,
    pub(crate) seal: Option<Caster>,
}

impl Binding {
    /// Binding that constructs `schema`'s type with the given seal.
    #[inline]
    pub(crate) fn construct(schema: &'static Schema, lifetime: Lifetime, seal: Caster) -> Self {
        Self {
            strategy: Strategy::Construct { schema },
            lifetime,
            seal: Some(seal),
        }
    }

    /// Binding that invokes a factory; sealed per product when `seal` is
    /// not supplied.
    #[inline]
    pub(crate) fn produce(make: Arc<FactoryFn>, lifetime: Lifetime, seal: Option<Caster>) -> Self {
        Self {
            strategy: Strategy::Produce { make },
            lifetime,
            seal,
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strategy = match &self.strategy {
            Strategy::Construct { schema } => schema.name,
            Strategy::Produce { .. } => "<factory>",
        };
        f.debug_struct("Binding")
            .field("strategy", &strategy)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}
