//! Error taxonomy for eventnet.
//!
//! - [`ConfigurationError`]: fatal at configuration time, blocks activation.
//! - [`AgentError`]: raised by an agent's own domain logic during a cycle.
//! - [`EventnetError`]: network-level failures wrapping the two above.
//!
//! Render, key-parse and dereference failures are recoverable and only ever
//! logged by the sorting and file-pointer code; their types live next to
//! that code ([`RenderError`], [`crate::ordering::KeyParseError`],
//! [`DereferenceError`]).

use eventnet_store::{AgentId, StorageError};

use crate::agent::AgentCapability;
use crate::file_pointer::DereferenceError;
use crate::ordering::{OrderSpecError, RenderError};

/// A problem with an agent's configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("events_order: {0}")]
    EventsOrder(#[from] OrderSpecError),

    #[error("option `{key}` must be a boolean value, got {found}")]
    NotBoolean { key: String, found: String },

    #[error("option `{key}` {reason}")]
    InvalidOption { key: String, reason: String },

    #[error("option `{key}` is not supported by agent type {agent_type}")]
    UnsupportedOption { key: String, agent_type: String },

    #[error("unknown agent type: {0}")]
    UnknownAgentType(String),

    #[error("options must be a JSON object")]
    OptionsNotObject,
}

/// Errors raised by agent domain logic.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("file pointer error: {0}")]
    Dereference(#[from] DereferenceError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Failed(String),
}

/// Result type for agent entry points.
pub type AgentResult<T> = std::result::Result<T, AgentError>;

/// Network-level errors.
#[derive(Debug, thiserror::Error)]
pub enum EventnetError {
    #[error("invalid configuration for agent `{agent}`: {}", join_issues(.errors))]
    Configuration {
        agent: String,
        errors: Vec<ConfigurationError>,
    },

    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    #[error("agent already exists: {0}")]
    DuplicateAgent(AgentId),

    #[error("invalid link {producer} -> {consumer}: {reason}")]
    InvalidLink {
        producer: AgentId,
        consumer: AgentId,
        reason: String,
    },

    #[error("agent {agent_id} lacks capability {capability}")]
    MissingCapability {
        agent_id: AgentId,
        capability: AgentCapability,
    },

    #[error("agent {agent_id} failed: {error}")]
    Agent {
        agent_id: AgentId,
        #[source]
        error: AgentError,
    },

    #[error("registry error: {0}")]
    Registry(String),

    #[error("config file error: {0}")]
    ConfigFile(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_issues(errors: &[ConfigurationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for network operations.
pub type Result<T> = std::result::Result<T, EventnetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_lists_every_issue() {
        let err = EventnetError::Configuration {
            agent: "reader".into(),
            errors: vec![
                ConfigurationError::UnknownAgentType("nope".into()),
                ConfigurationError::NotBoolean {
                    key: "include_sort_info".into(),
                    found: "\"maybe\"".into(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("`reader`"));
        assert!(msg.contains("unknown agent type: nope"));
        assert!(msg.contains("include_sort_info"));
    }

    #[test]
    fn agent_error_keeps_source() {
        let err = EventnetError::Agent {
            agent_id: AgentId(4),
            error: AgentError::Failed("boom".into()),
        };
        assert_eq!(err.to_string(), "agent 4 failed: boom");
        assert!(std::error::Error::source(&err).is_some());
    }
}
