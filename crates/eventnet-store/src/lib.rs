//! eventnet-store: persistence layer for the eventnet agent network.
//!
//! ## Key Components
//!
//! - `EventStore`: append-only event log; assigns ids and timestamps at commit
//! - `AgentStateStore`: per-agent JSON memory (dedup windows, last values, ...)
//! - `fakes`: in-memory implementations used by tests and one-shot runs
//! - `FsAgentStateStore`: agent memory persisted as one JSON file per agent

mod error;
pub mod fakes;
pub mod fs_state;
pub mod storage_traits;

pub use error::StorageError;
pub use fakes::{MemoryAgentStateStore, MemoryEventStore};
pub use fs_state::FsAgentStateStore;
pub use storage_traits::{
    AgentId, AgentStateStore, Event, EventId, EventStore, NewEvent, Payload, StorageResult,
    UserId,
};
