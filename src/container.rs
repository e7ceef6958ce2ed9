//! The dependency-resolution container
//!
//! [`Container`] owns the binding table and the instance cache, serializes
//! every operation under one re-entrant lock, and exposes the public
//! registration/resolution/removal API through two views: [`Resolver`]
//! (read-only resolution, the view factory functions receive) and
//! [`Registrar`] (full management). The container registers itself under
//! both view keys at construction and after every full clear; those two
//! keys are permanently protected from removal.

use crate::binding::{Binding, FactoryFn, Lifetime, Strategy};
use crate::construct::construct;
use crate::error::{DiError, Result};
use crate::inject::inject;
use crate::key::{Key, Object};
use crate::overrides::{Override, OverrideSet};
use crate::schema::{Caster, Fresh, Implements, Injectable, Schema};
use ahash::RandomState;
use once_cell::sync::Lazy;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

// =============================================================================
// Views
// =============================================================================

/// Read-only resolution view of a container.
///
/// This is the view handed to factory functions, and the key type the
/// container registers itself under for resolution-only consumers. All
/// methods take runtime [`Key`] tokens; the typed convenience methods live
/// on [`ResolverExt`].
pub trait Resolver: Send + Sync {
    /// Resolve an instance for `key`.
    ///
    /// Fails when `key` has no binding. A cached instance is returned as-is
    /// with no construction and no re-injection; otherwise the binding
    /// produces a new instance, its marked properties are injected, and the
    /// result is cached when the binding's lifetime is
    /// [`Lifetime::PerContainer`].
    ///
    /// Circular dependency graphs are not detected: a binding whose
    /// construction requires its own key recurses until the call stack is
    /// exhausted.
    fn get_key(&self, key: Key, overrides: &[Override]) -> Result<Object>;

    /// Build one instance of `schema`'s type with injection, independent of
    /// any registration for that type. Never reads or populates the
    /// instance cache.
    fn create_key(&self, schema: &'static Schema, overrides: &[Override]) -> Result<Object>;

    /// Whether a binding exists for `key`.
    fn contains_key(&self, key: Key) -> bool;

    /// Whether a cached instance exists for `key`.
    ///
    /// Fails when `key` has no binding at all, distinguishing "never
    /// registered" from "registered but not yet instantiated".
    fn contains_instance_key(&self, key: Key) -> Result<bool>;

    /// Snapshot of all currently bound key types.
    fn keys(&self) -> Vec<Key>;

    /// Snapshot of all distinct cached instances.
    fn instances(&self) -> Vec<Object>;

    /// Acquire the container-wide lock.
    ///
    /// The lock is re-entrant on the owning thread, so container operations
    /// performed while the guard is held still succeed. Use it to serialize
    /// composed multi-step sequences against other threads.
    fn lock(&self) -> ContainerLock<'_>;
}

/// Full management view of a container: registration and removal on top of
/// [`Resolver`].
pub trait Registrar: Resolver {
    /// Bind `key` to a type binding constructing `schema`'s type.
    ///
    /// Fails when the schema's type does not satisfy `key`, or when `key`
    /// is already bound.
    fn register_implementation_key(
        &self,
        key: Key,
        schema: &'static Schema,
        lifetime: Lifetime,
    ) -> Result<()>;

    /// Bind `key` to a factory binding.
    ///
    /// The factory receives the read-only resolution view of the invoking
    /// container. Its product is property-injected and sealed against the
    /// product's own schema, so a product that does not satisfy `key` fails
    /// at resolution time.
    fn register_factory_key(
        &self,
        key: Key,
        factory: Box<FactoryFn>,
        lifetime: Lifetime,
    ) -> Result<()>;

    /// Bind `key` to an existing instance.
    ///
    /// Equivalent to a [`Lifetime::PerContainer`] type binding for the
    /// instance's concrete type whose cache entry is seeded immediately, so
    /// no construction step ever runs for it. Fails when the instance's
    /// runtime type does not satisfy `key`, or when `key` is already bound.
    fn register_instance_key(&self, key: Key, instance: Override) -> Result<()>;

    /// Delete the binding for `key` and any cached instance.
    ///
    /// Fails for the container's own protected view keys and for unbound
    /// keys.
    fn remove_key(&self, key: Key) -> Result<()>;

    /// Delete only the cached instance for `key`; the binding remains and a
    /// later resolution rebuilds it.
    ///
    /// Fails for the protected view keys, for unbound keys, and when no
    /// cached instance exists.
    fn remove_instance_key(&self, key: Key) -> Result<()>;

    /// Empty the binding table and the instance cache, then re-register the
    /// container under its two view keys.
    fn clear_all(&self);

    /// Empty only the instance cache, then re-seed the two self-instances.
    /// All bindings remain.
    fn clear_all_instances(&self);

    /// Terminal teardown: empty both maps without re-registering the
    /// container.
    ///
    /// A disposed container reports no bindings and no instances; calling
    /// further registration or resolution on it is not a designed path.
    /// Disposal also breaks the self-referential cycle created by the
    /// container holding itself in its own instance cache, which is what
    /// lets the underlying storage be dropped.
    fn dispose(&self);
}

/// Guard for the container-wide re-entrant lock.
///
/// Dropping the guard releases the lock. Only the thread holding the guard
/// can operate on the container; other threads block until it is released.
pub struct ContainerLock<'a> {
    _guard: ReentrantMutexGuard<'a, RefCell<State>>,
}

// =============================================================================
// Typed convenience layer
// =============================================================================

/// Typed resolution methods for any [`Resolver`].
pub trait ResolverExt: Resolver {
    /// Resolve the instance bound to key type `K`.
    #[inline]
    fn get<K: ?Sized + 'static>(&self) -> Result<Arc<K>> {
        self.get_with::<K>(&[])
    }

    /// Resolve the instance bound to key type `K`, with override instances
    /// available for this call's dependency satisfaction.
    fn get_with<K: ?Sized + 'static>(&self, overrides: &[Override]) -> Result<Arc<K>> {
        let key = Key::of::<K>();
        let object = self.get_key(key, overrides)?;
        object.downcast::<K>().ok_or_else(|| {
            DiError::Internal(format!(
                "object bound for '{key}' does not carry the expected handle"
            ))
        })
    }

    /// Build one injected instance of `T` without touching the registry's
    /// binding or cache for `T`.
    #[inline]
    fn create_instance<T: Injectable>(&self) -> Result<Arc<T>> {
        self.create_instance_with::<T>(&[])
    }

    /// [`ResolverExt::create_instance`] with override instances.
    fn create_instance_with<T: Injectable>(&self, overrides: &[Override]) -> Result<Arc<T>> {
        let schema = T::schema();
        let object = self.create_key(schema, overrides)?;
        object.downcast::<T>().ok_or_else(|| {
            DiError::Internal(format!(
                "created instance of '{}' does not carry the expected handle",
                schema.name
            ))
        })
    }

    /// Whether key type `K` is bound.
    #[inline]
    fn contains<K: ?Sized + 'static>(&self) -> bool {
        self.contains_key(Key::of::<K>())
    }

    /// Whether a cached instance exists for key type `K`; fails when `K`
    /// is not bound.
    #[inline]
    fn contains_instance<K: ?Sized + 'static>(&self) -> Result<bool> {
        self.contains_instance_key(Key::of::<K>())
    }
}

impl<R: Resolver + ?Sized> ResolverExt for R {}

/// Typed registration methods for any [`Registrar`].
pub trait RegistrarExt: Registrar {
    /// Register implementation type `I` for key type `K`.
    #[inline]
    fn register_implementation<K, I>(&self, lifetime: Lifetime) -> Result<()>
    where
        K: ?Sized + 'static,
        I: Implements<K>,
    {
        self.register_implementation_key(Key::of::<K>(), I::schema(), lifetime)
    }

    /// Register a factory producing `C` for key type `K`.
    #[inline]
    fn register_factory<K, C, F>(&self, factory: F, lifetime: Lifetime) -> Result<()>
    where
        K: ?Sized + 'static,
        C: Implements<K>,
        F: Fn(&dyn Resolver) -> C + Send + Sync + 'static,
    {
        self.register_factory_key(
            Key::of::<K>(),
            Box::new(move |resolver| Fresh::new(factory(resolver))),
            lifetime,
        )
    }

    /// Register an existing instance of `I` for key type `K`.
    #[inline]
    fn register_instance<K, I>(&self, instance: Arc<I>) -> Result<()>
    where
        K: ?Sized + 'static,
        I: Implements<K>,
    {
        self.register_instance_key(Key::of::<K>(), Override::from_arc(instance))
    }

    /// Delete the binding for key type `K`.
    #[inline]
    fn remove<K: ?Sized + 'static>(&self) -> Result<()> {
        self.remove_key(Key::of::<K>())
    }

    /// Delete the cached instance for key type `K`.
    #[inline]
    fn remove_instance<K: ?Sized + 'static>(&self) -> Result<()> {
        self.remove_instance_key(Key::of::<K>())
    }
}

impl<R: Registrar + ?Sized> RegistrarExt for R {}

// =============================================================================
// Container
// =============================================================================

/// A process-local registry mapping key types to construction strategies,
/// with controllable lifetimes and marker-driven injection.
///
/// Cloning a `Container` clones a handle; all clones operate on the same
/// registry. Every operation runs under one re-entrant lock, so recursive
/// dependency resolution on the owning thread proceeds while other threads
/// block.
///
/// The container holds itself in its own instance cache (under the
/// `dyn Resolver` and `dyn Registrar` keys), which keeps the underlying
/// storage alive until [`Registrar::dispose`] empties it.
///
/// # Examples
///
/// ```rust
/// use keywire::prelude::*;
/// use keywire::injectable;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct PlainGreeter;
///
/// impl Greeter for PlainGreeter {
///     fn greet(&self) -> String {
///         "hello".to_string()
///     }
/// }
///
/// injectable!(PlainGreeter {
///     keys: [dyn Greeter];
///     fallback => PlainGreeter;
/// });
///
/// let container = Container::new();
/// container.register_implementation::<dyn Greeter, PlainGreeter>(Lifetime::PerContainer)?;
///
/// let greeter = container.get::<dyn Greeter>()?;
/// assert_eq!(greeter.greet(), "hello");
/// # Ok::<(), keywire::DiError>(())
/// ```
#[derive(Clone)]
pub struct Container {
    shared: Arc<Shared>,
}

impl Container {
    /// Create a new container with only its two self-bindings.
    pub fn new() -> Self {
        let shared = Arc::new_cyclic(|weak| Shared {
            state: ReentrantMutex::new(RefCell::new(State::default())),
            this: Weak::clone(weak),
        });

        {
            let guard = shared.state.lock();
            shared.bootstrap(&mut guard.borrow_mut());
        }

        #[cfg(feature = "logging")]
        debug!(target: "keywire", "Created container with self-bindings seeded");

        Self { shared }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.shared.state.lock();
        let state = guard.borrow();
        f.debug_struct("Container")
            .field("bindings", &state.bindings.len())
            .field("instances", &state.instances.len())
            .finish()
    }
}

// =============================================================================
// Shared state
// =============================================================================

/// Binding table and instance cache, guarded by the one container lock.
struct State {
    bindings: HashMap<Key, Binding, RandomState>,
    instances: HashMap<Key, Object, RandomState>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            bindings: HashMap::default(),
            instances: HashMap::default(),
        }
    }
}

/// Shared core of a container. All handles alias one `Shared`, and the two
/// self-instances are sealed from this same allocation, which is what makes
/// `instances()` report the container once.
struct Shared {
    state: ReentrantMutex<RefCell<State>>,
    this: Weak<Shared>,
}

/// Keys the container reserves for itself.
fn is_protected(key: Key) -> bool {
    key == Key::of::<dyn Resolver>() || key == Key::of::<dyn Registrar>()
}

impl Shared {
    /// Seed the two self-bindings and self-instances. Seeding goes straight
    /// into the cache; the construction path never runs for these keys.
    fn bootstrap(&self, state: &mut State) {
        let schema = Shared::schema();
        for key in [Key::of::<dyn Resolver>(), Key::of::<dyn Registrar>()] {
            let seal = schema
                .caster(key)
                .expect("container schema lists its own view keys");
            state
                .bindings
                .insert(key, Binding::construct(schema, Lifetime::PerContainer, seal));
        }
        self.seed_self_instances(state);
    }

    fn seed_self_instances(&self, state: &mut State) {
        let this = self
            .this
            .upgrade()
            .expect("container storage alive while seeding");
        state.instances.insert(
            Key::of::<dyn Resolver>(),
            Object::from_handle::<dyn Resolver>(Arc::clone(&this) as Arc<dyn Resolver>),
        );
        state.instances.insert(
            Key::of::<dyn Registrar>(),
            Object::from_handle::<dyn Registrar>(this as Arc<dyn Registrar>),
        );
    }
}

/// Upcast the produced instance into the binding's key type.
fn seal(binding: &Binding, fresh: Fresh, key: Key) -> Result<Object> {
    let schema = fresh.schema;
    let caster = binding
        .seal
        .or_else(|| schema.caster(key))
        .ok_or(DiError::NotAssignable {
            implementation: schema.name,
            key,
        })?;

    let erased: Arc<dyn Any + Send + Sync> = Arc::from(fresh.value);
    caster(erased).ok_or_else(|| {
        DiError::Internal(format!(
            "sealing an instance of '{}' for key '{key}' failed",
            schema.name
        ))
    })
}

impl Resolver for Shared {
    fn get_key(&self, key: Key, overrides: &[Override]) -> Result<Object> {
        let overrides = OverrideSet::new(overrides)?;
        let guard = self.state.lock();

        let binding = {
            let state = guard.borrow();
            let binding = state
                .bindings
                .get(&key)
                .cloned()
                .ok_or(DiError::NotBound { key })?;

            if let Some(object) = state.instances.get(&key) {
                #[cfg(feature = "logging")]
                trace!(target: "keywire", key = %key, "Resolved from instance cache");
                return Ok(object.clone());
            }
            binding
        };

        // The cell borrow is released here; recursive resolution below
        // re-enters the lock on this thread and borrows again.
        let mut fresh = match &binding.strategy {
            Strategy::Construct { schema } => {
                let schema: &'static Schema = *schema;
                let value = construct(self, schema, &overrides)?;
                Fresh { value, schema }
            }
            Strategy::Produce { make } => {
                #[cfg(feature = "logging")]
                trace!(target: "keywire", key = %key, "Invoking factory binding");
                (make.as_ref())(self)
            }
        };

        inject(self, &mut fresh, &overrides)?;
        let object = seal(&binding, fresh, key)?;

        if binding.lifetime == Lifetime::PerContainer {
            guard.borrow_mut().instances.insert(key, object.clone());

            #[cfg(feature = "logging")]
            trace!(target: "keywire", key = %key, "Cached per-container instance");
        }

        Ok(object)
    }

    fn create_key(&self, schema: &'static Schema, overrides: &[Override]) -> Result<Object> {
        let overrides = OverrideSet::new(overrides)?;
        let _guard = self.state.lock();

        let value = construct(self, schema, &overrides)?;
        let mut fresh = Fresh { value, schema };
        inject(self, &mut fresh, &overrides)?;

        let caster = schema.caster(schema.key).ok_or_else(|| {
            DiError::Internal(format!(
                "schema for '{}' does not list its own key",
                schema.name
            ))
        })?;
        let erased: Arc<dyn Any + Send + Sync> = Arc::from(fresh.value);
        caster(erased).ok_or_else(|| {
            DiError::Internal(format!("sealing a new instance of '{}' failed", schema.name))
        })
    }

    fn contains_key(&self, key: Key) -> bool {
        self.state.lock().borrow().bindings.contains_key(&key)
    }

    fn contains_instance_key(&self, key: Key) -> Result<bool> {
        let guard = self.state.lock();
        let state = guard.borrow();
        if !state.bindings.contains_key(&key) {
            return Err(DiError::NotBound { key });
        }
        Ok(state.instances.contains_key(&key))
    }

    fn keys(&self) -> Vec<Key> {
        self.state.lock().borrow().bindings.keys().copied().collect()
    }

    fn instances(&self) -> Vec<Object> {
        let guard = self.state.lock();
        let state = guard.borrow();

        let mut seen = HashSet::new();
        let mut snapshot = Vec::with_capacity(state.instances.len());
        for object in state.instances.values() {
            if seen.insert(object.ident()) {
                snapshot.push(object.clone());
            }
        }
        snapshot
    }

    fn lock(&self) -> ContainerLock<'_> {
        ContainerLock {
            _guard: self.state.lock(),
        }
    }
}

impl Registrar for Shared {
    fn register_implementation_key(
        &self,
        key: Key,
        schema: &'static Schema,
        lifetime: Lifetime,
    ) -> Result<()> {
        let seal = schema.caster(key).ok_or(DiError::NotAssignable {
            implementation: schema.name,
            key,
        })?;

        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if state.bindings.contains_key(&key) {
            return Err(DiError::AlreadyBound { key });
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "keywire",
            key = %key,
            implementation = schema.name,
            lifetime = ?lifetime,
            "Registered implementation binding"
        );

        state
            .bindings
            .insert(key, Binding::construct(schema, lifetime, seal));
        Ok(())
    }

    fn register_factory_key(
        &self,
        key: Key,
        factory: Box<FactoryFn>,
        lifetime: Lifetime,
    ) -> Result<()> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if state.bindings.contains_key(&key) {
            return Err(DiError::AlreadyBound { key });
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "keywire",
            key = %key,
            lifetime = ?lifetime,
            "Registered factory binding"
        );

        state
            .bindings
            .insert(key, Binding::produce(Arc::from(factory), lifetime, None));
        Ok(())
    }

    fn register_instance_key(&self, key: Key, instance: Override) -> Result<()> {
        let schema = instance.schema();
        let seal = schema.caster(key).ok_or(DiError::NotAssignable {
            implementation: schema.name,
            key,
        })?;
        let object = instance.to_object(key).ok_or(DiError::NotAssignable {
            implementation: schema.name,
            key,
        })?;

        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if state.bindings.contains_key(&key) {
            return Err(DiError::AlreadyBound { key });
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "keywire",
            key = %key,
            implementation = schema.name,
            "Registered instance binding"
        );

        state
            .bindings
            .insert(key, Binding::construct(schema, Lifetime::PerContainer, seal));
        state.instances.insert(key, object);
        Ok(())
    }

    fn remove_key(&self, key: Key) -> Result<()> {
        if is_protected(key) {
            return Err(DiError::ProtectedKey { key });
        }

        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if !state.bindings.contains_key(&key) {
            return Err(DiError::NotBound { key });
        }

        state.instances.remove(&key);
        state.bindings.remove(&key);

        #[cfg(feature = "logging")]
        debug!(target: "keywire", key = %key, "Removed binding");

        Ok(())
    }

    fn remove_instance_key(&self, key: Key) -> Result<()> {
        if is_protected(key) {
            return Err(DiError::ProtectedKey { key });
        }

        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if !state.bindings.contains_key(&key) {
            return Err(DiError::NotBound { key });
        }
        if !state.instances.contains_key(&key) {
            return Err(DiError::NoInstance { key });
        }

        state.instances.remove(&key);

        #[cfg(feature = "logging")]
        debug!(target: "keywire", key = %key, "Removed cached instance");

        Ok(())
    }

    fn clear_all(&self) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.bindings.clear();
        state.instances.clear();
        self.bootstrap(&mut state);

        #[cfg(feature = "logging")]
        debug!(target: "keywire", "Cleared all bindings and instances");
    }

    fn clear_all_instances(&self) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.instances.clear();
        self.seed_self_instances(&mut state);

        #[cfg(feature = "logging")]
        debug!(target: "keywire", "Cleared all cached instances");
    }

    fn dispose(&self) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.bindings.clear();
        state.instances.clear();

        #[cfg(feature = "logging")]
        debug!(target: "keywire", "Disposed container");
    }
}

/// The container's own injection schema: no marked constructors or
/// properties, satisfying the two view keys. Resolution of the view keys is
/// always served from the seeded cache; the schema exists so the self-keys
/// have ordinary bindings behind them.
impl Injectable for Shared {
    fn schema() -> &'static Schema {
        static SCHEMA: Lazy<Schema> = Lazy::new(|| Schema {
            name: "keywire::Container",
            key: Key::of::<Shared>(),
            keys: vec![
                (Key::of::<Shared>(), cast_to_self as Caster),
                (Key::of::<dyn Resolver>(), cast_to_resolver as Caster),
                (Key::of::<dyn Registrar>(), cast_to_registrar as Caster),
            ],
            constructors: Vec::new(),
            properties: Vec::new(),
            fallback: None,
        });
        &SCHEMA
    }
}

fn cast_to_self(value: Arc<dyn Any + Send + Sync>) -> Option<Object> {
    let shared = value.downcast::<Shared>().ok()?;
    Some(Object::from_handle::<Shared>(shared))
}

fn cast_to_resolver(value: Arc<dyn Any + Send + Sync>) -> Option<Object> {
    let shared = value.downcast::<Shared>().ok()?;
    Some(Object::from_handle::<dyn Resolver>(
        shared as Arc<dyn Resolver>,
    ))
}

fn cast_to_registrar(value: Arc<dyn Any + Send + Sync>) -> Option<Object> {
    let shared = value.downcast::<Shared>().ok()?;
    Some(Object::from_handle::<dyn Registrar>(
        shared as Arc<dyn Registrar>,
    ))
}

// =============================================================================
// View delegation
// =============================================================================

impl Resolver for Container {
    #[inline]
    fn get_key(&self, key: Key, overrides: &[Override]) -> Result<Object> {
        self.shared.get_key(key, overrides)
    }

    #[inline]
    fn create_key(&self, schema: &'static Schema, overrides: &[Override]) -> Result<Object> {
        self.shared.create_key(schema, overrides)
    }

    #[inline]
    fn contains_key(&self, key: Key) -> bool {
        self.shared.contains_key(key)
    }

    #[inline]
    fn contains_instance_key(&self, key: Key) -> Result<bool> {
        self.shared.contains_instance_key(key)
    }

    #[inline]
    fn keys(&self) -> Vec<Key> {
        self.shared.keys()
    }

    #[inline]
    fn instances(&self) -> Vec<Object> {
        self.shared.instances()
    }

    #[inline]
    fn lock(&self) -> ContainerLock<'_> {
        Resolver::lock(self.shared.as_ref())
    }
}

impl Registrar for Container {
    #[inline]
    fn register_implementation_key(
        &self,
        key: Key,
        schema: &'static Schema,
        lifetime: Lifetime,
    ) -> Result<()> {
        self.shared.register_implementation_key(key, schema, lifetime)
    }

    #[inline]
    fn register_factory_key(
        &self,
        key: Key,
        factory: Box<FactoryFn>,
        lifetime: Lifetime,
    ) -> Result<()> {
        self.shared.register_factory_key(key, factory, lifetime)
    }

    #[inline]
    fn register_instance_key(&self, key: Key, instance: Override) -> Result<()> {
        self.shared.register_instance_key(key, instance)
    }

    #[inline]
    fn remove_key(&self, key: Key) -> Result<()> {
        self.shared.remove_key(key)
    }

    #[inline]
    fn remove_instance_key(&self, key: Key) -> Result<()> {
        self.shared.remove_instance_key(key)
    }

    #[inline]
    fn clear_all(&self) {
        self.shared.clear_all()
    }

    #[inline]
    fn clear_all_instances(&self) {
        self.shared.clear_all_instances()
    }

    #[inline]
    fn dispose(&self) {
        self.shared.dispose()
    }
}
