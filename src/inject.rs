//! Property injection
//!
//! After an instance is constructed (or produced by a factory), every
//! writable property marked in its schema is assigned from the registry or
//! the caller's override set, with the same registry-precedence rule as
//! constructor parameters. Assignment happens in schema declaration order,
//! before the instance is sealed into a shared handle.

use crate::container::Resolver;
use crate::error::{DiError, Result};
use crate::key::Key;
use crate::overrides::OverrideSet;
use crate::schema::Fresh;

#[cfg(feature = "logging")]
use tracing::trace;

/// Inject all marked properties of `fresh`.
///
/// Every property's key type is validated first; when any are satisfied by
/// neither the registry nor the overrides, the call fails listing all of
/// them and the instance is left untouched.
pub(crate) fn inject(
    resolver: &dyn Resolver,
    fresh: &mut Fresh,
    overrides: &OverrideSet<'_>,
) -> Result<()> {
    let schema = fresh.schema;
    if schema.properties.is_empty() {
        return Ok(());
    }

    let missing: Vec<Key> = schema
        .properties
        .iter()
        .map(|property| property.key)
        .filter(|key| !resolver.contains_key(*key) && !overrides.satisfies(*key))
        .collect();

    if !missing.is_empty() {
        return Err(DiError::unsatisfied_properties(schema.name, &missing));
    }

    for property in &schema.properties {
        let value = if resolver.contains_key(property.key) {
            resolver.get_key(property.key, &[])?
        } else {
            overrides.select(property.key).ok_or_else(|| {
                DiError::Internal(format!(
                    "override for property '{}' vanished during resolution",
                    property.name
                ))
            })?
        };

        #[cfg(feature = "logging")]
        trace!(
            target: "keywire",
            service = schema.name,
            property = property.name,
            "Injecting marked property"
        );

        (property.set)(fresh.value.as_mut(), value);
    }

    Ok(())
}
