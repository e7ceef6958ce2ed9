//! Instance construction
//!
//! Selects a constructor from the target type's schema and satisfies each
//! parameter from the registry or the caller's override set. Registry
//! resolution takes precedence over override instances when a parameter is
//! satisfiable by both.

use crate::container::Resolver;
use crate::error::{DiError, Result};
use crate::key::{Key, Object};
use crate::overrides::OverrideSet;
use crate::schema::{ConstructorSpec, Schema};
use std::any::Any;

#[cfg(feature = "logging")]
use tracing::trace;

/// Construct an instance of `schema`'s type.
///
/// Exactly one marked constructor: resolve and invoke it. No marked
/// constructor: fall back to the zero-argument one. More than one marked
/// constructor is ambiguous and fails without constructing anything.
///
/// Registered dependencies are resolved through `resolver` recursively;
/// overrides are not propagated into those recursive resolutions.
pub(crate) fn construct(
    resolver: &dyn Resolver,
    schema: &'static Schema,
    overrides: &OverrideSet<'_>,
) -> Result<Box<dyn Any + Send + Sync>> {
    match schema.constructors.as_slice() {
        [] => match schema.fallback {
            Some(make) => {
                #[cfg(feature = "logging")]
                trace!(
                    target: "keywire",
                    service = schema.name,
                    "Constructing through zero-argument constructor"
                );
                Ok(make())
            }
            None => Err(DiError::NoUsableConstructor {
                type_name: schema.name,
            }),
        },
        [constructor] => invoke(resolver, schema, constructor, overrides),
        _ => Err(DiError::AmbiguousConstructor {
            type_name: schema.name,
        }),
    }
}

fn invoke(
    resolver: &dyn Resolver,
    schema: &'static Schema,
    constructor: &ConstructorSpec,
    overrides: &OverrideSet<'_>,
) -> Result<Box<dyn Any + Send + Sync>> {
    let missing: Vec<Key> = constructor
        .params
        .iter()
        .copied()
        .filter(|key| !resolver.contains_key(*key) && !overrides.satisfies(*key))
        .collect();

    if !missing.is_empty() {
        return Err(DiError::unsatisfied_parameters(schema.name, &missing));
    }

    #[cfg(feature = "logging")]
    trace!(
        target: "keywire",
        service = schema.name,
        parameters = constructor.params.len(),
        "Constructing through marked constructor"
    );

    let arguments: Vec<Object> = constructor
        .params
        .iter()
        .map(|key| {
            if resolver.contains_key(*key) {
                resolver.get_key(*key, &[])
            } else {
                overrides.select(*key).ok_or_else(|| {
                    // Validated above; a miss here means the registry changed
                    // mid-call, which the container lock rules out.
                    DiError::Internal(format!("override for '{key}' vanished during resolution"))
                })
            }
        })
        .collect::<Result<_>>()?;

    Ok((constructor.build)(&arguments))
}
