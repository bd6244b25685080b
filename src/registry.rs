//! Registry of shared object types referenced by more than one field.

use indexmap::IndexMap;
use serde::Serialize;

use crate::property::PropertyId;

/// Maps a reused-type name to the canonical property that defines it.
///
/// The first registration for a name wins; later registrations are no-ops that
/// return the original. Iteration follows registration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ReusedTypeRegistry {
    types: IndexMap<String, PropertyId>,
}

impl ReusedTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `property` under `type_name`, returning the canonical property.
    pub fn register(&mut self, type_name: &str, property: PropertyId) -> PropertyId {
        if let Some(&existing) = self.types.get(type_name) {
            return existing;
        }
        tracing::debug!(type_name, "registered reused type");
        self.types.insert(type_name.to_string(), property);
        property
    }

    pub fn get(&self, type_name: &str) -> Option<PropertyId> {
        self.types.get(type_name).copied()
    }

    /// Each distinct shared type exactly once, in registration order.
    pub fn enumerate(&self) -> impl Iterator<Item = (&str, PropertyId)> + '_ {
        self.types.iter().map(|(name, &id)| (name.as_str(), id))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_registration_wins() {
        let mut reg = ReusedTypeRegistry::new();
        let a = PropertyId::new(3);
        let b = PropertyId::new(9);

        assert_eq!(reg.register("DiskConfig", a), a);
        assert_eq!(reg.register("DiskConfig", b), a);
        assert_eq!(reg.get("DiskConfig"), Some(a));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn enumerate_in_registration_order() {
        let mut reg = ReusedTypeRegistry::new();
        reg.register("B", PropertyId::new(1));
        reg.register("A", PropertyId::new(2));
        reg.register("B", PropertyId::new(5));

        let names: Vec<&str> = reg.enumerate().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn get_unknown_is_none() {
        assert!(ReusedTypeRegistry::new().get("Nope").is_none());
    }
}
