//! File pointers: content passed between agents by reference.
//!
//! A producer puts `{"file": ..., "agent_id": ...}` under [`FILE_POINTER_KEY`]
//! instead of the content itself. A consumer hands the payload to
//! [`FilePointerResolver::resolve_stream`], which asks the producing agent's
//! [`ContentSource`] for a reader.

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use eventnet_store::{AgentId, Payload, UserId};

/// Reserved payload key holding a [`FilePointer`].
pub const FILE_POINTER_KEY: &str = "file_pointer";

/// Reference to a file owned by a producing agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePointer {
    pub file: String,
    pub agent_id: AgentId,
}

impl FilePointer {
    pub fn new(file: impl Into<String>, agent_id: AgentId) -> Self {
        Self {
            file: file.into(),
            agent_id,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({ "file": self.file, "agent_id": self.agent_id })
    }

    /// A payload holding only this pointer.
    pub fn to_payload(&self) -> Payload {
        let mut payload = Payload::new();
        payload.insert(FILE_POINTER_KEY.to_string(), self.to_value());
        payload
    }

    /// Extract the pointer from `payload`, if it is well formed.
    pub fn from_payload(payload: &Payload) -> Option<Self> {
        let pointer = payload.get(FILE_POINTER_KEY)?.as_object()?;
        let file = pointer.get("file")?.as_str()?.to_string();
        let agent_id = match pointer.get("agent_id")? {
            Value::Number(n) => n.as_u64()?,
            Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        Some(Self {
            file,
            agent_id: AgentId(agent_id),
        })
    }
}

/// Whether `payload` carries a file pointer with both fields set.
pub fn has_file_pointer(payload: &Payload) -> bool {
    payload
        .get(FILE_POINTER_KEY)
        .and_then(Value::as_object)
        .is_some_and(|pointer| {
            ["file", "agent_id"]
                .iter()
                .all(|field| pointer.get(*field).is_some_and(|v| !v.is_null()))
        })
}

/// Opens files on behalf of a producing agent.
pub trait ContentSource: Send + Sync {
    fn open(&self, file: &str) -> std::io::Result<Box<dyn Read + Send>>;
}

#[derive(Debug, thiserror::Error)]
pub enum DereferenceError {
    #[error("payload has no usable file pointer")]
    NoPointer,

    #[error("agent {0} does not exist")]
    UnknownAgent(AgentId),

    #[error("agent {agent_id} belongs to another user")]
    CrossTenant { agent_id: AgentId },

    #[error("agent {0} does not emit file pointers")]
    NotAProducer(AgentId),

    #[error("cannot open {file:?}: {source}")]
    Stream {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

struct Producer {
    owner: UserId,
    source: Option<Arc<dyn ContentSource>>,
}

/// Maps agent ids to their owner and content source.
#[derive(Default)]
pub struct FilePointerResolver {
    producers: HashMap<AgentId, Producer>,
}

impl std::fmt::Debug for FilePointerResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.producers.keys().collect();
        ids.sort();
        f.debug_struct("FilePointerResolver")
            .field("agents", &ids)
            .finish()
    }
}

impl FilePointerResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent. `source` is `None` for agents that do not emit
    /// file pointers.
    pub fn register(
        &mut self,
        agent_id: AgentId,
        owner: UserId,
        source: Option<Arc<dyn ContentSource>>,
    ) {
        self.producers.insert(agent_id, Producer { owner, source });
    }

    /// Open the content `payload` points at, on behalf of `consumer`.
    pub fn resolve_stream(
        &self,
        consumer: UserId,
        payload: &Payload,
    ) -> Result<Box<dyn Read + Send>, DereferenceError> {
        let pointer = FilePointer::from_payload(payload).ok_or(DereferenceError::NoPointer)?;
        let producer = self
            .producers
            .get(&pointer.agent_id)
            .ok_or(DereferenceError::UnknownAgent(pointer.agent_id))?;
        if producer.owner != consumer {
            return Err(DereferenceError::CrossTenant {
                agent_id: pointer.agent_id,
            });
        }
        let source = producer
            .source
            .as_ref()
            .ok_or(DereferenceError::NotAProducer(pointer.agent_id))?;
        source
            .open(&pointer.file)
            .map_err(|source| DereferenceError::Stream {
                file: pointer.file.clone(),
                source,
            })
    }
}
