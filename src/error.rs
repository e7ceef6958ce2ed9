//! Error types for container operations

use crate::key::Key;
use thiserror::Error;

/// Errors raised by registration, resolution and removal operations.
///
/// Every failure is reported synchronously at the point of violation and
/// leaves the registry untouched. These are configuration errors, not
/// transient conditions - there is nothing to retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiError {
    /// The override set passed to a resolution call contains two entries
    /// of the same runtime type
    #[error("override instances contain more than one entry of type '{type_name}'")]
    DuplicateOverride { type_name: &'static str },

    /// A binding already exists for the key type
    #[error("container already contains '{key}' as a key type")]
    AlreadyBound { key: Key },

    /// No binding exists for the key type
    #[error("container does not contain '{key}' as a key type")]
    NotBound { key: Key },

    /// The key type is bound but holds no cached instance
    #[error("container does not hold an instance for key type '{key}'")]
    NoInstance { key: Key },

    /// The implementation type does not satisfy the key type
    #[error("type '{implementation}' does not satisfy key type '{key}'")]
    NotAssignable {
        implementation: &'static str,
        key: Key,
    },

    /// More than one constructor on the target type is marked for injection
    #[error("type '{type_name}' marks more than one constructor for injection; only one is allowed")]
    AmbiguousConstructor { type_name: &'static str },

    /// The target type has neither a marked constructor nor a zero-argument one
    #[error("type '{type_name}' has neither a zero-argument constructor nor a constructor marked for injection")]
    NoUsableConstructor { type_name: &'static str },

    /// Constructor parameter types that are neither registered nor overridden
    #[error("the types ({missing}) which are parameters of the constructor of '{type_name}' are not registered in the container and were not passed as overrides")]
    UnsatisfiedParameters {
        type_name: &'static str,
        missing: String,
    },

    /// Property types that are neither registered nor overridden
    #[error("the property types ({missing}) of '{type_name}' are not registered in the container and were not passed as overrides")]
    UnsatisfiedProperties {
        type_name: &'static str,
        missing: String,
    },

    /// The key type is one of the container's own reserved keys
    #[error("key type '{key}' is reserved by the container and cannot be removed")]
    ProtectedKey { key: Key },

    /// Internal invariant violation
    #[error("internal container error: {0}")]
    Internal(String),
}

impl DiError {
    /// Create a DuplicateOverride error for a concrete runtime type
    #[inline]
    pub(crate) fn duplicate_override(key: Key) -> Self {
        Self::DuplicateOverride {
            type_name: key.name(),
        }
    }

    /// Create an UnsatisfiedParameters error from the missing key types
    pub(crate) fn unsatisfied_parameters(type_name: &'static str, missing: &[Key]) -> Self {
        Self::UnsatisfiedParameters {
            type_name,
            missing: join_names(missing),
        }
    }

    /// Create an UnsatisfiedProperties error from the missing key types
    pub(crate) fn unsatisfied_properties(type_name: &'static str, missing: &[Key]) -> Self {
        Self::UnsatisfiedProperties {
            type_name,
            missing: join_names(missing),
        }
    }
}

fn join_names(keys: &[Key]) -> String {
    keys.iter().map(Key::name).collect::<Vec<_>>().join(", ")
}

/// Result type alias for container operations
pub type Result<T> = std::result::Result<T, DiError>;
