//! Storage trait definitions for eventnet
//!
//! These traits define the core storage abstractions:
//! - `EventStore`: append-only log of committed events
//! - `AgentStateStore`: per-agent memory that survives between invocations
//!
//! Both traits are synchronous. Commits happen from inside a sorting cycle's
//! finalizer, which may run during unwinding, so they cannot await.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Event payload: a JSON object that keeps the producer's key order.
pub type Payload = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Monotonic identifier assigned to an event when it is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

/// Identifier of an agent instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u64);

/// Identifier of the user (tenant) owning an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// An event built by agent logic but not yet committed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub payload: Payload,
}

impl NewEvent {
    pub fn new(payload: Payload) -> Self {
        Self { payload }
    }

    /// Explicitly merge `value` under `key`, replacing any previous value.
    pub fn merge(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.payload.insert(key.into(), value);
    }
}

impl From<Payload> for NewEvent {
    fn from(payload: Payload) -> Self {
        Self { payload }
    }
}

/// A committed event. Immutable once returned by [`EventStore::commit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic id, unique across the store
    pub id: EventId,
    /// Agent that created the event
    pub agent_id: AgentId,
    /// Event payload
    pub payload: Payload,
    /// Commit timestamp
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// EventStore
// ---------------------------------------------------------------------------

/// Append-only event log.
///
/// Guarantees:
/// - `commit` assigns strictly increasing ids in call order.
/// - Committed events are never modified.
/// - `events_from` returns events ordered by ascending id.
pub trait EventStore: Send + Sync {
    /// Commit a new event on behalf of `agent_id`.
    fn commit(&self, agent_id: AgentId, event: NewEvent) -> StorageResult<Event>;

    /// Retrieve an event by id. Returns `StorageError::EventNotFound` if absent.
    fn get(&self, id: EventId) -> StorageResult<Event>;

    /// Events created by `agent_id` with an id greater than `after`.
    fn events_from(&self, agent_id: AgentId, after: Option<EventId>) -> StorageResult<Vec<Event>>;

    /// Total number of committed events.
    fn len(&self) -> StorageResult<usize>;

    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }
}

// ---------------------------------------------------------------------------
// AgentStateStore
// ---------------------------------------------------------------------------

/// Per-agent memory persistence.
///
/// Memory is owned by exactly one agent instance; the store never merges
/// writes, the last `save` wins.
pub trait AgentStateStore: Send + Sync {
    /// Load the memory saved for `agent_id`, if any.
    fn load(&self, agent_id: AgentId) -> StorageResult<Option<serde_json::Value>>;

    /// Replace the memory of `agent_id`.
    fn save(&self, agent_id: AgentId, memory: &serde_json::Value) -> StorageResult<()>;
}
