//! eventnet Core Library
//!
//! Shared infrastructure for networks of cooperating agents: ordering of
//! created events, de-duplication windows, file pointers and the network
//! that links agents together.

pub mod agent;
pub mod agents;
pub mod config;
pub mod dedup;
pub mod domain;
pub mod file_pointer;
pub mod metrics;
pub mod network;
pub mod obs;
pub mod ordering;
pub mod telemetry;

pub use agent::{
    Agent, AgentCapability, AgentContext, AgentDescriptor, AgentFactory, AgentTypeRegistry,
    EventSink,
};

pub use agents::{
    ChangeDetectorAgent, DeDuplicationAgent, LocalFileAgent, LocalFileSource, ReadFileAgent,
};

pub use config::{AgentConfig, LinkConfig, NetworkConfig};

pub use dedup::UniquenessWindow;

pub use domain::{AgentError, AgentResult, ConfigurationError, EventnetError, Result};

pub use file_pointer::{
    has_file_pointer, ContentSource, DereferenceError, FilePointer, FilePointerResolver,
    FILE_POINTER_KEY,
};

pub use network::{AgentSlot, Network};

pub use telemetry::init_tracing;

pub use ordering::{
    parse_key, prepare_batch, sort_tuples, CyclePhase, CycleReport, ExpressionRenderer,
    KeyParseError, OrderKey, OrderSpec, OrderSpecError, RenderError, SortTuple, SortingCycle,
    SortingDecorator, SortingOptions, TeraRenderer, TypedValue, ValueType, INDEX_VAR,
    SORT_INFO_KEY,
};

pub use eventnet_store::{
    AgentId, AgentStateStore, Event, EventId, EventStore, MemoryAgentStateStore,
    MemoryEventStore, NewEvent, Payload, UserId,
};

/// eventnet version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
