//! `de_duplication`: re-emit events whose discriminator was not seen within
//! the last `lookback` accepted events.

use async_trait::async_trait;
use serde_json::{json, Value};

use eventnet_store::{Event, NewEvent, Payload};

use crate::agent::{Agent, AgentCapability, AgentContext, AgentDescriptor};
use crate::dedup::UniquenessWindow;
use crate::domain::{string_option, usize_option, AgentResult, ConfigurationError};
use crate::metrics::METRICS;
use crate::obs;

pub static DESCRIPTOR: AgentDescriptor = AgentDescriptor {
    type_name: "de_duplication",
    description: "Passes on events whose property was not seen in the last `lookback` events",
    capabilities: &[
        AgentCapability::ReceivesEvents,
        AgentCapability::CreatesEvents,
        AgentCapability::OrdersCreatedEvents,
    ],
};

const DEFAULT_PROPERTY: &str = "{{ value }}";
const DEFAULT_LOOKBACK: usize = 100;

#[derive(Debug)]
pub struct DeDuplicationAgent {
    /// Template; empty means the whole payload.
    property: String,
    /// 0 keeps every value.
    lookback: usize,
    window: UniquenessWindow,
}

impl DeDuplicationAgent {
    pub fn from_options(options: &Payload) -> Result<Self, Vec<ConfigurationError>> {
        let property = string_option(options, "property", DEFAULT_PROPERTY);
        let lookback = usize_option(options, "lookback", DEFAULT_LOOKBACK);
        match (property, lookback) {
            (Ok(property), Ok(lookback)) => Ok(Self {
                property,
                lookback,
                window: UniquenessWindow::new(),
            }),
            (property, lookback) => Err(property
                .err()
                .into_iter()
                .chain(lookback.err())
                .collect()),
        }
    }

    pub fn build(options: &Payload) -> Result<Box<dyn Agent>, Vec<ConfigurationError>> {
        Ok(Box::new(Self::from_options(options)?))
    }

    pub fn window(&self) -> &UniquenessWindow {
        &self.window
    }

    /// A template that fails to render discriminates by its literal text.
    fn discriminator(&self, ctx: &AgentContext<'_>, payload: &Payload) -> String {
        if self.property.trim().is_empty() {
            return Value::Object(payload.clone()).to_string();
        }
        ctx.render(&self.property, payload)
    }
}

#[async_trait]
impl Agent for DeDuplicationAgent {
    fn descriptor(&self) -> &'static AgentDescriptor {
        &DESCRIPTOR
    }

    async fn receive(&mut self, ctx: &mut AgentContext<'_>, events: &[Event]) -> AgentResult<()> {
        for event in events {
            let discriminator = self.discriminator(ctx, &event.payload);
            if self.window.observe(&discriminator, self.lookback) {
                ctx.create_event(NewEvent::new(event.payload.clone()))?;
            } else {
                obs::emit_duplicate(ctx.agent_id(), event.id);
                METRICS.inc_duplicates_dropped();
            }
        }
        Ok(())
    }

    fn memory(&self) -> Value {
        json!({ "properties": self.window })
    }

    fn restore_memory(&mut self, memory: Value) -> AgentResult<()> {
        if let Some(properties) = memory.get("properties") {
            self.window = serde_json::from_value(properties.clone())?;
        }
        Ok(())
    }
}
