//! Static registry of agent types.
//!
//! Each type registers its descriptor and a factory once. Queries such as
//! "which types consume file pointers" read the registry instead of
//! inspecting agent instances.

use std::collections::BTreeMap;

use eventnet_store::Payload;

use super::{Agent, AgentCapability, AgentDescriptor};
use crate::domain::{ConfigurationError, EventnetError, Result};

/// Builds an agent from its options object.
pub type AgentFactory = fn(&Payload) -> std::result::Result<Box<dyn Agent>, Vec<ConfigurationError>>;

#[derive(Clone, Copy)]
struct Registration {
    descriptor: &'static AgentDescriptor,
    factory: AgentFactory,
}

#[derive(Clone, Default)]
pub struct AgentTypeRegistry {
    types: BTreeMap<&'static str, Registration>,
}

impl std::fmt::Debug for AgentTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.types.keys()).finish()
    }
}

impl AgentTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in agent type.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (descriptor, factory) in crate::agents::builtins() {
            registry.insert(descriptor, factory);
        }
        registry
    }

    fn insert(&mut self, descriptor: &'static AgentDescriptor, factory: AgentFactory) {
        self.types.insert(
            descriptor.type_name,
            Registration {
                descriptor,
                factory,
            },
        );
    }

    /// Register a type. Fails on a duplicate name or inconsistent
    /// capabilities.
    pub fn register(
        &mut self,
        descriptor: &'static AgentDescriptor,
        factory: AgentFactory,
    ) -> Result<()> {
        if self.types.contains_key(descriptor.type_name) {
            return Err(EventnetError::Registry(format!(
                "agent type {} is already registered",
                descriptor.type_name
            )));
        }
        let issues = descriptor.inconsistencies();
        if !issues.is_empty() {
            return Err(EventnetError::Registry(format!(
                "agent type {}: {}",
                descriptor.type_name,
                issues.join("; ")
            )));
        }
        self.insert(descriptor, factory);
        Ok(())
    }

    pub fn descriptor(&self, type_name: &str) -> Option<&'static AgentDescriptor> {
        self.types.get(type_name).map(|r| r.descriptor)
    }

    /// All descriptors, ordered by type name.
    pub fn descriptors(&self) -> impl Iterator<Item = &'static AgentDescriptor> + '_ {
        self.types.values().map(|r| r.descriptor)
    }

    /// Names of the types declaring `capability`, ordered by name.
    pub fn types_with(&self, capability: AgentCapability) -> Vec<&'static str> {
        self.descriptors()
            .filter(|d| d.has(capability))
            .map(|d| d.type_name)
            .collect()
    }

    /// Human-readable list of the types declaring `capability`,
    /// e.g. `"local_file and read_file"`.
    pub fn summary(&self, capability: AgentCapability) -> String {
        let names = self.types_with(capability);
        match names.as_slice() {
            [] => String::from("none"),
            [only] => only.to_string(),
            [init @ .., last] => format!("{} and {}", init.join(", "), last),
        }
    }

    /// Instantiate `type_name` with `options`.
    pub fn build(
        &self,
        type_name: &str,
        options: &Payload,
    ) -> std::result::Result<Box<dyn Agent>, Vec<ConfigurationError>> {
        let registration = self
            .types
            .get(type_name)
            .ok_or_else(|| vec![ConfigurationError::UnknownAgentType(type_name.to_string())])?;
        (registration.factory)(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    static NOOP: AgentDescriptor = AgentDescriptor {
        type_name: "noop",
        description: "does nothing",
        capabilities: &[AgentCapability::CanBeScheduled],
    };

    static BROKEN: AgentDescriptor = AgentDescriptor {
        type_name: "broken",
        description: "orders events it cannot create",
        capabilities: &[AgentCapability::OrdersCreatedEvents],
    };

    impl Agent for Noop {
        fn descriptor(&self) -> &'static AgentDescriptor {
            &NOOP
        }
    }

    fn build_noop(_: &Payload) -> std::result::Result<Box<dyn Agent>, Vec<ConfigurationError>> {
        Ok(Box::new(Noop))
    }

    #[test]
    fn builtins_are_consistent() {
        let registry = AgentTypeRegistry::with_builtins();
        assert!(registry.descriptors().count() >= 4);
        for descriptor in registry.descriptors() {
            assert!(
                descriptor.inconsistencies().is_empty(),
                "{}",
                descriptor.type_name
            );
        }
    }

    #[test]
    fn file_pointer_summaries_name_the_builtins() {
        let registry = AgentTypeRegistry::with_builtins();
        assert_eq!(
            registry.types_with(AgentCapability::EmitsFilePointer),
            vec!["local_file"]
        );
        assert_eq!(
            registry.summary(AgentCapability::ConsumesFilePointer),
            "read_file"
        );
    }

    #[test]
    fn register_rejects_duplicates_and_bad_descriptors() {
        let mut registry = AgentTypeRegistry::new();
        registry.register(&NOOP, build_noop).unwrap();
        assert!(registry.register(&NOOP, build_noop).is_err());
        assert!(registry.register(&BROKEN, build_noop).is_err());
        assert_eq!(registry.summary(AgentCapability::CanBeScheduled), "noop");
        assert_eq!(registry.summary(AgentCapability::EmitsFilePointer), "none");
    }

    #[test]
    fn build_unknown_type_is_a_configuration_error() {
        let registry = AgentTypeRegistry::new();
        let errors = registry.build("nope", &Payload::new()).err().unwrap();
        assert_eq!(
            errors,
            vec![ConfigurationError::UnknownAgentType("nope".into())]
        );
    }
}
