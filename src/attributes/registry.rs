//! Process-wide catalog of attribute kinds

use std::collections::BTreeMap;
use std::sync::RwLock;

use super::{builtin, AttributeKind, TypedColumn};
use crate::error::RecorderError;
use crate::RecorderResult;

/// Catalog of attribute kinds keyed by name.
///
/// Built-in kinds are registered at construction; afterwards the catalog
/// only grows through [`AttributeRegistry::define`].
#[derive(Debug)]
pub struct AttributeRegistry {
    kinds: RwLock<BTreeMap<String, AttributeKind>>,
}

impl Default for AttributeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeRegistry {
    /// Registry holding every built-in kind
    pub fn new() -> Self {
        let kinds = builtin::builtin_kinds()
            .into_iter()
            .map(|k| (k.name().to_string(), k))
            .collect::<BTreeMap<_, _>>();
        log::debug!("Attribute registry initialized with {} kinds", kinds.len());
        Self {
            kinds: RwLock::new(kinds),
        }
    }

    /// Registry without any kind
    pub fn empty() -> Self {
        Self {
            kinds: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a new kind; names are unique
    pub fn define(&self, kind: AttributeKind) -> RecorderResult<()> {
        let mut kinds = self.kinds.write().unwrap_or_else(|e| e.into_inner());
        if kinds.contains_key(kind.name()) {
            return Err(RecorderError::AttributeAlreadyDefined(kind.name().to_string()));
        }
        kinds.insert(kind.name().to_string(), kind);
        Ok(())
    }

    /// Definition of a kind
    pub fn kind(&self, name: &str) -> RecorderResult<AttributeKind> {
        let kinds = self.kinds.read().unwrap_or_else(|e| e.into_inner());
        kinds
            .get(name)
            .cloned()
            .ok_or_else(|| RecorderError::UnknownAttribute {
                name: name.to_string(),
                known: kinds.keys().cloned().collect::<Vec<_>>().join(", "),
            })
    }

    /// Fresh column bound to the named kind
    pub fn get(&self, name: &str) -> RecorderResult<TypedColumn> {
        Ok(self.kind(name)?.new_column())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kinds
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    /// All registered names, sorted
    pub fn list_names(&self) -> Vec<String> {
        self.kinds
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// `name (tag)` lines for introspection
    pub fn describe(&self) -> String {
        self.kinds
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(|k| format!("{} ({})", k.name(), k.value_type().tag()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.kinds.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeType;

    #[test]
    fn test_builtin_kinds_present() {
        let registry = AttributeRegistry::new();
        for name in [
            "TotalEnergyDeposit",
            "GlobalTime",
            "PostPosition",
            "EventID",
            "TrackCreatorProcess",
            "PreStepUniqueVolumeID",
        ] {
            assert!(registry.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_get_returns_independent_columns() {
        let registry = AttributeRegistry::new();
        let mut a = registry.get("TotalEnergyDeposit").unwrap();
        let b = registry.get("TotalEnergyDeposit").unwrap();
        a.push_double(1.0).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 0);
    }

    #[test]
    fn test_unknown_name_lists_known_names() {
        let registry = AttributeRegistry::new();
        match registry.get("NoSuchAttribute") {
            Err(RecorderError::UnknownAttribute { name, known }) => {
                assert_eq!(name, "NoSuchAttribute");
                assert!(known.contains("TotalEnergyDeposit"));
            }
            other => panic!("unexpected result {:?}", other.map(|c| c.name().to_string())),
        }
    }

    #[test]
    fn test_define_rejects_duplicates() {
        let registry = AttributeRegistry::empty();
        registry
            .define(AttributeKind::manual("Theta", AttributeType::Double))
            .unwrap();
        let again = registry.define(AttributeKind::manual("Theta", AttributeType::Double));
        assert!(matches!(again, Err(RecorderError::AttributeAlreadyDefined(_))));
        assert_eq!(registry.list_names(), vec!["Theta".to_string()]);
    }
}
