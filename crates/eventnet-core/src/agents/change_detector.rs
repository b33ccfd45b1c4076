//! `change_detector`: re-emit an event when its rendered property differs from
//! the previous one.

use async_trait::async_trait;
use serde_json::{json, Value};

use eventnet_store::{Event, NewEvent, Payload};

use crate::agent::{Agent, AgentCapability, AgentContext, AgentDescriptor};
use crate::domain::{AgentResult, ConfigurationError};

pub static DESCRIPTOR: AgentDescriptor = AgentDescriptor {
    type_name: "change_detector",
    description: "Passes on an event when its property changed since the last event",
    capabilities: &[AgentCapability::ReceivesEvents, AgentCapability::CreatesEvents],
};

/// Variable holding the previously seen property while `property` renders.
pub const LAST_PROPERTY_VAR: &str = "last_property";

#[derive(Debug)]
pub struct ChangeDetectorAgent {
    property: String,
    last_property: Option<String>,
}

impl ChangeDetectorAgent {
    pub fn from_options(options: &Payload) -> Result<Self, Vec<ConfigurationError>> {
        match options.get("property") {
            Some(Value::String(property)) if !property.trim().is_empty() => Ok(Self {
                property: property.clone(),
                last_property: None,
            }),
            _ => Err(vec![ConfigurationError::InvalidOption {
                key: "property".into(),
                reason: "must be a non-empty template".into(),
            }]),
        }
    }

    pub fn build(options: &Payload) -> Result<Box<dyn Agent>, Vec<ConfigurationError>> {
        Ok(Box::new(Self::from_options(options)?))
    }

    pub fn last_property(&self) -> Option<&str> {
        self.last_property.as_deref()
    }
}

#[async_trait]
impl Agent for ChangeDetectorAgent {
    fn descriptor(&self) -> &'static AgentDescriptor {
        &DESCRIPTOR
    }

    async fn receive(&mut self, ctx: &mut AgentContext<'_>, events: &[Event]) -> AgentResult<()> {
        for event in events {
            let mut context = event.payload.clone();
            context.insert(
                LAST_PROPERTY_VAR.to_string(),
                self.last_property.clone().map_or(Value::Null, Value::String),
            );
            let property = ctx.render(&self.property, &context);
            if self.last_property.as_deref() == Some(property.as_str()) {
                tracing::debug!(agent_id = %ctx.agent_id(), %property, "property unchanged");
                continue;
            }
            ctx.create_event(NewEvent::new(event.payload.clone()))?;
            self.last_property = Some(property);
        }
        Ok(())
    }

    fn memory(&self) -> Value {
        match &self.last_property {
            Some(last) => {
                let mut memory = Payload::new();
                memory.insert(LAST_PROPERTY_VAR.to_string(), json!(last));
                Value::Object(memory)
            }
            None => Value::Null,
        }
    }

    fn restore_memory(&mut self, memory: Value) -> AgentResult<()> {
        self.last_property = memory
            .get(LAST_PROPERTY_VAR)
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_is_required() {
        assert!(ChangeDetectorAgent::from_options(&Payload::new()).is_err());
        let options = json!({"property": "  "}).as_object().cloned().unwrap();
        assert!(ChangeDetectorAgent::from_options(&options).is_err());
    }

    #[test]
    fn memory_round_trips() {
        let options = json!({"property": "{{ price }}"}).as_object().cloned().unwrap();
        let mut agent = ChangeDetectorAgent::from_options(&options).unwrap();
        assert_eq!(agent.memory(), Value::Null);
        agent.restore_memory(json!({"last_property": "10"})).unwrap();
        assert_eq!(agent.last_property(), Some("10"));
        assert_eq!(agent.memory(), json!({"last_property": "10"}));
    }
}
