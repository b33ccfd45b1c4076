//! In-memory implementations of the storage traits
//!
//! Provides `MemoryEventStore` and `MemoryAgentStateStore`, which satisfy the
//! trait contracts without touching the filesystem.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::error::StorageError;
use crate::storage_traits::*;

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> StorageResult<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| StorageError::LockPoisoned(what.to_string()))
}

// ---------------------------------------------------------------------------
// MemoryEventStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct EventLog {
    last_id: u64,
    events: Vec<Event>,
}

/// In-memory event log. Ids start at 1.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    log: Mutex<EventLog>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every committed event, in commit order.
    pub fn all(&self) -> StorageResult<Vec<Event>> {
        Ok(lock(&self.log, "event log")?.events.clone())
    }
}

impl EventStore for MemoryEventStore {
    fn commit(&self, agent_id: AgentId, event: NewEvent) -> StorageResult<Event> {
        let mut log = lock(&self.log, "event log")?;
        log.last_id += 1;
        let committed = Event {
            id: EventId(log.last_id),
            agent_id,
            payload: event.payload,
            created_at: Utc::now(),
        };
        log.events.push(committed.clone());
        Ok(committed)
    }

    fn get(&self, id: EventId) -> StorageResult<Event> {
        let log = lock(&self.log, "event log")?;
        // Ids are dense and start at 1, so the id doubles as an index.
        id.0.checked_sub(1)
            .and_then(|idx| log.events.get(idx as usize))
            .cloned()
            .ok_or(StorageError::EventNotFound { id: id.0 })
    }

    fn events_from(&self, agent_id: AgentId, after: Option<EventId>) -> StorageResult<Vec<Event>> {
        let log = lock(&self.log, "event log")?;
        Ok(log
            .events
            .iter()
            .filter(|e| e.agent_id == agent_id)
            .filter(|e| after.map(|a| e.id > a).unwrap_or(true))
            .cloned()
            .collect())
    }

    fn len(&self) -> StorageResult<usize> {
        Ok(lock(&self.log, "event log")?.events.len())
    }
}

// ---------------------------------------------------------------------------
// MemoryAgentStateStore
// ---------------------------------------------------------------------------

/// In-memory agent memory backed by a `HashMap<AgentId, Value>`.
#[derive(Debug, Default)]
pub struct MemoryAgentStateStore {
    memories: Mutex<HashMap<AgentId, serde_json::Value>>,
}

impl MemoryAgentStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AgentStateStore for MemoryAgentStateStore {
    fn load(&self, agent_id: AgentId) -> StorageResult<Option<serde_json::Value>> {
        Ok(lock(&self.memories, "agent memory")?.get(&agent_id).cloned())
    }

    fn save(&self, agent_id: AgentId, memory: &serde_json::Value) -> StorageResult<()> {
        lock(&self.memories, "agent memory")?.insert(agent_id, memory.clone());
        Ok(())
    }
}
