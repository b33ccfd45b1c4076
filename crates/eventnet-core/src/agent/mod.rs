//! Agent trait, capabilities and the agent type registry.

pub mod capability;
pub mod context;
pub mod registry;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use eventnet_store::Event;

pub use capability::{AgentCapability, AgentDescriptor};
pub use context::{AgentContext, EventSink};
pub use registry::{AgentFactory, AgentTypeRegistry};

use crate::domain::AgentResult;
use crate::file_pointer::ContentSource;

/// An agent instance.
///
/// Entry points only see an [`AgentContext`]; whether created events are
/// buffered and sorted is decided outside the agent.
#[async_trait]
pub trait Agent: Send {
    fn descriptor(&self) -> &'static AgentDescriptor;

    /// Scheduled run.
    async fn check(&mut self, _ctx: &mut AgentContext<'_>) -> AgentResult<()> {
        Ok(())
    }

    /// Handle inbound events, in delivery order.
    async fn receive(&mut self, _ctx: &mut AgentContext<'_>, _events: &[Event]) -> AgentResult<()> {
        Ok(())
    }

    /// Opens the files this agent's pointers refer to.
    fn content_source(&self) -> Option<Arc<dyn ContentSource>> {
        None
    }

    /// Memory to persist between runs. `Null` means nothing to save.
    fn memory(&self) -> Value {
        Value::Null
    }

    fn restore_memory(&mut self, _memory: Value) -> AgentResult<()> {
        Ok(())
    }
}
