//! `read_file`: turn inbound file pointers into events carrying the file
//! content.

use std::io::Read;

use async_trait::async_trait;
use serde_json::Value;

use eventnet_store::{Event, Payload};

use crate::agent::{Agent, AgentCapability, AgentContext, AgentDescriptor};
use crate::domain::{string_option, AgentError, AgentResult, ConfigurationError};
use crate::file_pointer::has_file_pointer;

pub static DESCRIPTOR: AgentDescriptor = AgentDescriptor {
    type_name: "read_file",
    description: "Reads the files behind inbound file pointers",
    capabilities: &[
        AgentCapability::ReceivesEvents,
        AgentCapability::CreatesEvents,
        AgentCapability::ConsumesFilePointer,
        AgentCapability::OrdersCreatedEvents,
    ],
};

#[derive(Debug)]
pub struct ReadFileAgent {
    data_key: String,
}

impl ReadFileAgent {
    pub fn from_options(options: &Payload) -> Result<Self, Vec<ConfigurationError>> {
        let data_key = string_option(options, "data_key", "data").map_err(|e| vec![e])?;
        if data_key.is_empty() {
            return Err(vec![ConfigurationError::InvalidOption {
                key: "data_key".into(),
                reason: "must not be empty".into(),
            }]);
        }
        Ok(Self { data_key })
    }

    pub fn build(options: &Payload) -> Result<Box<dyn Agent>, Vec<ConfigurationError>> {
        Ok(Box::new(Self::from_options(options)?))
    }
}

async fn read_to_end(mut stream: Box<dyn Read + Send>) -> AgentResult<Vec<u8>> {
    tokio::task::spawn_blocking(move || {
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).map(|_| buf)
    })
    .await
    .map_err(|e| AgentError::Failed(format!("read task failed: {e}")))?
    .map_err(AgentError::from)
}

#[async_trait]
impl Agent for ReadFileAgent {
    fn descriptor(&self) -> &'static AgentDescriptor {
        &DESCRIPTOR
    }

    async fn receive(&mut self, ctx: &mut AgentContext<'_>, events: &[Event]) -> AgentResult<()> {
        for event in events {
            if !has_file_pointer(&event.payload) {
                continue;
            }
            let Some(stream) = ctx.open_file_pointer(&event.payload) else {
                continue;
            };
            let bytes = read_to_end(stream).await?;
            let mut payload = Payload::new();
            payload.insert(
                self.data_key.clone(),
                Value::String(String::from_utf8_lossy(&bytes).into_owned()),
            );
            ctx.create_event(payload)?;
        }
        Ok(())
    }
}
