//! Agent capabilities and static type descriptors.

use serde::{Deserialize, Serialize};

/// Something an agent type can do.
///
/// Capabilities are fixed per type; the network checks them when agents are
/// added, linked and run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentCapability {
    CanBeScheduled,
    ReceivesEvents,
    CreatesEvents,
    EmitsFilePointer,
    ConsumesFilePointer,
    OrdersCreatedEvents,
}

impl AgentCapability {
    pub const ALL: [AgentCapability; 6] = [
        AgentCapability::CanBeScheduled,
        AgentCapability::ReceivesEvents,
        AgentCapability::CreatesEvents,
        AgentCapability::EmitsFilePointer,
        AgentCapability::ConsumesFilePointer,
        AgentCapability::OrdersCreatedEvents,
    ];
}

impl std::fmt::Display for AgentCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentCapability::CanBeScheduled => write!(f, "can_be_scheduled"),
            AgentCapability::ReceivesEvents => write!(f, "receives_events"),
            AgentCapability::CreatesEvents => write!(f, "creates_events"),
            AgentCapability::EmitsFilePointer => write!(f, "emits_file_pointer"),
            AgentCapability::ConsumesFilePointer => write!(f, "consumes_file_pointer"),
            AgentCapability::OrdersCreatedEvents => write!(f, "orders_created_events"),
        }
    }
}

/// Immutable description of an agent type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentDescriptor {
    pub type_name: &'static str,
    pub description: &'static str,
    pub capabilities: &'static [AgentCapability],
}

impl AgentDescriptor {
    pub fn has(&self, capability: AgentCapability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Capability combinations that make no sense, e.g. emitting file
    /// pointers without creating events.
    pub fn inconsistencies(&self) -> Vec<String> {
        use AgentCapability::*;
        let requirements = [
            (OrdersCreatedEvents, CreatesEvents),
            (EmitsFilePointer, CreatesEvents),
            (ConsumesFilePointer, ReceivesEvents),
        ];
        requirements
            .into_iter()
            .filter(|(cap, needs)| self.has(*cap) && !self.has(*needs))
            .map(|(cap, needs)| format!("{cap} requires {needs}"))
            .collect()
    }
}
