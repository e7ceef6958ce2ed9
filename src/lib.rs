//! # keywire - runtime dependency resolution for Rust
//!
//! A process-local registry mapping abstract *key types* to concrete
//! construction strategies, with controllable object lifetime and automatic
//! injection of dependencies into newly created objects. Wiring code
//! registers implementations once at startup; the rest of the application
//! requests fully constructed, dependency-satisfied instances on demand.
//!
//! ## Features
//!
//! - 🔑 **Key-type bindings** - bind trait-object or concrete key types to
//!   implementation types, factory functions or existing instances
//! - ♻️ **Lifetimes** - `PerCall` produces a fresh instance on every
//!   resolution, `PerContainer` caches the first one
//! - 🪡 **Marker-driven injection** - constructors and writable properties
//!   declared through the [`injectable!`] macro are satisfied automatically
//!   from the registry or from per-call override instances
//! - 🔒 **One re-entrant lock** - every operation is serialized under a
//!   single container-wide lock that same-thread recursive resolution can
//!   re-acquire
//! - 🪞 **Self-registered** - the container resolves itself under its
//!   read-only ([`Resolver`]) and management ([`Registrar`]) view keys
//! - 📊 **Observable** - optional tracing integration with JSON or pretty
//!   output
//!
//! ## Quick Start
//!
//! ```rust
//! use keywire::prelude::*;
//! use keywire::injectable;
//!
//! trait Fetcher: Send + Sync {
//!     fn fetch(&self) -> String;
//! }
//!
//! struct HttpFetcher {
//!     base: String,
//! }
//!
//! impl Fetcher for HttpFetcher {
//!     fn fetch(&self) -> String {
//!         format!("GET {}", self.base)
//!     }
//! }
//!
//! injectable!(HttpFetcher {
//!     keys: [dyn Fetcher];
//!     fallback => HttpFetcher { base: "https://example.org".to_string() };
//! });
//!
//! let container = Container::new();
//!
//! // Register once at startup...
//! container.register_implementation::<dyn Fetcher, HttpFetcher>(Lifetime::PerContainer)?;
//!
//! // ...resolve anywhere.
//! let fetcher = container.get::<dyn Fetcher>()?;
//! assert_eq!(fetcher.fetch(), "GET https://example.org");
//!
//! // PerContainer bindings cache the first instance.
//! let again = container.get::<dyn Fetcher>()?;
//! assert!(Arc::ptr_eq(&fetcher, &again));
//! # Ok::<(), keywire::DiError>(())
//! ```
//!
//! ## Injection
//!
//! A type declares at most one injected constructor and any number of
//! injected properties. Dependencies are resolved from the registry first;
//! caller-supplied [`Override`] instances fill the gaps for a single call.
//!
//! ```rust
//! use keywire::prelude::*;
//! use keywire::injectable;
//!
//! trait Store: Send + Sync {
//!     fn name(&self) -> &'static str;
//! }
//!
//! struct MemoryStore;
//!
//! impl Store for MemoryStore {
//!     fn name(&self) -> &'static str {
//!         "memory"
//!     }
//! }
//!
//! injectable!(MemoryStore {
//!     keys: [dyn Store];
//!     fallback => MemoryStore;
//! });
//!
//! struct Indexer {
//!     store: Arc<dyn Store>,
//! }
//!
//! injectable!(Indexer {
//!     constructor(store: dyn Store) => Indexer { store };
//! });
//!
//! let container = Container::new();
//! container.register_implementation::<dyn Store, MemoryStore>(Lifetime::PerCall)?;
//!
//! // Build an ad hoc instance without registering Indexer itself.
//! let indexer = container.create_instance::<Indexer>()?;
//! assert_eq!(indexer.store.name(), "memory");
//! # Ok::<(), keywire::DiError>(())
//! ```
//!
//! ## Concurrency
//!
//! The container is `Send + Sync` and clones are cheap handles onto the
//! same registry. All public operations hold the container lock for their
//! full duration, including recursive dependency resolution, so composed
//! sequences can be serialized with [`Resolver::lock`]. There is no cycle
//! detection: a dependency graph in which a key transitively requires
//! itself recurses until the stack is exhausted.

mod binding;
mod construct;
mod container;
mod error;
mod inject;
mod key;
#[cfg(feature = "logging")]
pub mod logging;
mod macros;
mod overrides;
mod schema;

pub use binding::{FactoryFn, Lifetime};
pub use container::{Container, ContainerLock, Registrar, RegistrarExt, Resolver, ResolverExt};
pub use error::{DiError, Result};
pub use key::{Key, Object};
pub use overrides::Override;
pub use schema::{Caster, ConstructorSpec, Fresh, Implements, Injectable, PropertySpec, Schema};

// Re-export tracing macros for convenience when the logging feature is on
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Container, DiError, Implements, Injectable, Key, Lifetime, Object, Override, Registrar,
        RegistrarExt, Resolver, ResolverExt, Result,
    };
    pub use std::sync::Arc;
}

#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::Lazy;
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use crate::injectable;

    trait Parser: Send + Sync {
        fn kind(&self) -> &'static str;
    }

    struct TomlParser;

    impl Parser for TomlParser {
        fn kind(&self) -> &'static str {
            "toml"
        }
    }

    injectable!(TomlParser {
        keys: [dyn Parser];
        fallback => TomlParser;
    });

    trait Cache: Send + Sync {
        fn capacity(&self) -> usize;
    }

    struct LruCache {
        capacity: usize,
    }

    impl Cache for LruCache {
        fn capacity(&self) -> usize {
            self.capacity
        }
    }

    injectable!(LruCache {
        keys: [dyn Cache];
        fallback => LruCache { capacity: 16 };
    });

    struct Loader {
        parser: Arc<dyn Parser>,
        cache: Option<Arc<dyn Cache>>,
    }

    injectable!(Loader {
        constructor(parser: dyn Parser) => Loader { parser, cache: None };
        property cache: dyn Cache => |loader, cache| loader.cache = Some(cache);
    });

    #[test]
    fn test_registration_and_retrieval() {
        let container = Container::new();

        container
            .register_implementation::<dyn Parser, TomlParser>(Lifetime::PerCall)
            .unwrap();
        let parser = container.get::<dyn Parser>().unwrap();
        assert_eq!(parser.kind(), "toml");

        // PerContainer keeps handing back the first instance.
        container
            .register_implementation::<dyn Cache, LruCache>(Lifetime::PerContainer)
            .unwrap();
        let first = container.get::<dyn Cache>().unwrap();
        let second = container.get::<dyn Cache>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // Registered instances come back untouched.
        let parser_instance = Arc::new(TomlParser);
        let other = Container::new();
        other
            .register_instance::<dyn Parser, TomlParser>(Arc::clone(&parser_instance))
            .unwrap();
        let resolved = other.get::<dyn Parser>().unwrap();
        assert!(Arc::ptr_eq(&(parser_instance as Arc<dyn Parser>), &resolved));
    }

    #[test]
    fn test_injection_end_to_end() {
        let container = Container::new();

        // A PerContainer implementation and a pre-built instance...
        container
            .register_implementation::<dyn Parser, TomlParser>(Lifetime::PerContainer)
            .unwrap();
        let cache = Arc::new(LruCache { capacity: 64 });
        container
            .register_instance::<dyn Cache, LruCache>(Arc::clone(&cache))
            .unwrap();

        // ...flow into an ad hoc instance through its marked constructor
        // and marked property.
        let loader = container.create_instance::<Loader>().unwrap();

        let shared_parser = container.get::<dyn Parser>().unwrap();
        let shared_parser_again = container.get::<dyn Parser>().unwrap();
        assert!(Arc::ptr_eq(&shared_parser, &shared_parser_again));
        assert!(Arc::ptr_eq(&loader.parser, &shared_parser));

        let injected_cache = loader.cache.as_ref().expect("property injected");
        assert!(Arc::ptr_eq(injected_cache, &(cache as Arc<dyn Cache>)));

        // Registering the consumer itself works the same way through get.
        container
            .register_implementation::<Loader, Loader>(Lifetime::PerCall)
            .unwrap();
        let resolved = container.get::<Loader>().unwrap();
        assert!(Arc::ptr_eq(&resolved.parser, &shared_parser));
    }

    #[test]
    fn test_override_instances_fill_registry_gaps() {
        let container = Container::new();
        let cache = Arc::new(LruCache { capacity: 4 });

        let loader = container
            .create_instance_with::<Loader>(&[
                Override::new(TomlParser),
                Override::from_arc(Arc::clone(&cache)),
            ])
            .unwrap();

        assert_eq!(loader.parser.kind(), "toml");
        assert_eq!(loader.cache.as_ref().unwrap().capacity(), 4);
    }
}
