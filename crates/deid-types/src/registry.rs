//! Registry of semantic types.
//!
//! The registry is constructed once and shared by reference (or behind an
//! `Arc`) with the validator and the transformer. Construction checks that
//! every definition is complete and fails fast otherwise.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::builtin::builtin_types;
use crate::error::{RegistryError, Result, TypeError};
use crate::semantic::SemanticType;

#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    /// Registration order, for listing.
    types: Vec<Arc<SemanticType>>,
    /// Normalized name or alias -> index into `types`.
    index: BTreeMap<String, usize>,
}

impl TypeRegistry {
    /// Build a registry from complete type definitions.
    ///
    /// # Errors
    ///
    /// Returns an error for a definition without a name, primitive types,
    /// actions or fallback value, and for names or aliases used twice.
    pub fn new<I>(types: I) -> std::result::Result<Self, RegistryError>
    where
        I: IntoIterator<Item = SemanticType>,
    {
        let mut registry = Self::default();
        for ty in types {
            registry.register(ty)?;
        }
        Ok(registry)
    }

    /// Registry holding the builtin catalogue.
    pub fn builtin() -> std::result::Result<Self, RegistryError> {
        Self::new(builtin_types())
    }

    fn register(&mut self, ty: SemanticType) -> std::result::Result<(), RegistryError> {
        check_complete(&ty)?;
        let position = self.types.len();
        let keys: Vec<String> = std::iter::once(ty.name())
            .chain(ty.aliases().iter().map(String::as_str))
            .map(normalize_name)
            .collect();
        for key in &keys {
            if self.index.contains_key(key) {
                return Err(RegistryError::Duplicate { name: key.clone() });
            }
        }
        for key in keys {
            self.index.insert(key, position);
        }
        self.types.push(Arc::new(ty));
        Ok(())
    }

    /// Look up a type by name or alias, ignoring case, `_` and `-`.
    pub fn get(&self, name: &str) -> Option<&Arc<SemanticType>> {
        self.index
            .get(&normalize_name(name))
            .and_then(|&position| self.types.get(position))
    }

    pub fn resolve(&self, name: &str) -> Result<&Arc<SemanticType>> {
        self.get(name).ok_or_else(|| TypeError::UnknownSemanticType {
            name: name.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &SemanticType> {
        self.types.iter().map(AsRef::as_ref)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

fn check_complete(ty: &SemanticType) -> std::result::Result<(), RegistryError> {
    if ty.name().trim().is_empty() {
        return Err(RegistryError::EmptyName);
    }
    let name = ty.name().to_string();
    if ty.accepted_primitive_types().is_empty() {
        return Err(RegistryError::NoPrimitiveTypes { name });
    }
    if ty.accepted_actions().is_empty() {
        return Err(RegistryError::NoActions { name });
    }
    if ty.fallback_value().is_empty() {
        return Err(RegistryError::EmptyFallback { name });
    }
    Ok(())
}

/// Lowercase, treat `_` and `-` as spaces and collapse whitespace.
fn normalize_name(name: &str) -> String {
    name.replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use deid_model::{ActionKind, PrimitiveType};

    #[test]
    fn builtin_catalogue_registers() {
        let registry = TypeRegistry::builtin().expect("builtin registry");
        assert_eq!(registry.len(), 14);
        for name in [
            "Name",
            "Address",
            "Age",
            "Date",
            "Birth Date",
            "Email",
            "SSN",
            "Zip Code",
            "Free Text",
            "Number",
            "Boolean",
            "IP Address",
        ] {
            assert!(registry.get(name).is_some(), "missing builtin type {name}");
        }
    }

    #[test]
    fn lookup_ignores_case_and_separators() {
        let registry = TypeRegistry::builtin().unwrap();
        assert_eq!(registry.get("zip_code").unwrap().name(), "Zip Code");
        assert_eq!(registry.get("BIRTH-DATE").unwrap().name(), "Birth Date");
        assert_eq!(registry.get("dob").unwrap().name(), "Birth Date");
        assert_eq!(registry.get("ip").unwrap().name(), "IP Address");
        assert!(matches!(
            registry.resolve("Blood Type"),
            Err(TypeError::UnknownSemanticType { .. })
        ));
    }

    #[test]
    fn incomplete_definitions_fail_fast() {
        let no_primitives = SemanticType::builder("Broken")
            .action(ActionKind::Omit)
            .fallback("x")
            .finish();
        assert_eq!(
            TypeRegistry::new([no_primitives]).unwrap_err(),
            RegistryError::NoPrimitiveTypes {
                name: "Broken".into()
            }
        );

        let no_actions = SemanticType::builder("Broken")
            .primitives([PrimitiveType::String])
            .fallback("x")
            .finish();
        assert!(matches!(
            TypeRegistry::new([no_actions]),
            Err(RegistryError::NoActions { .. })
        ));

        let no_fallback = SemanticType::builder("Broken")
            .primitives([PrimitiveType::String])
            .action(ActionKind::Omit)
            .finish();
        assert!(matches!(
            TypeRegistry::new([no_fallback]),
            Err(RegistryError::EmptyFallback { .. })
        ));

        let unnamed = SemanticType::builder(" ")
            .primitives([PrimitiveType::String])
            .action(ActionKind::Omit)
            .fallback("x")
            .finish();
        assert_eq!(
            TypeRegistry::new([unnamed]).unwrap_err(),
            RegistryError::EmptyName
        );
    }

    #[test]
    fn duplicate_aliases_are_rejected() {
        let make = |name: &str| {
            SemanticType::builder(name)
                .alias("shared")
                .primitives([PrimitiveType::String])
                .action(ActionKind::Omit)
                .fallback("x")
                .finish()
        };
        assert_eq!(
            TypeRegistry::new([make("One"), make("Two")]).unwrap_err(),
            RegistryError::Duplicate {
                name: "shared".into()
            }
        );
    }
}
