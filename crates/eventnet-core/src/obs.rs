//! Structured observability hooks for agent cycles.
//!
//! This module provides:
//! - Cycle-scoped tracing spans via [`cycle_span`]
//! - Emission functions for cycle lifecycle events and recoverable failures
//!
//! Lifecycle events are emitted at `info!`; recoverable per-key and per-event
//! failures at `warn!`. Use `RUST_LOG` to filter, `--json` for JSON lines.

use tracing::{info, warn};

use eventnet_store::{AgentId, EventId};

use crate::file_pointer::DereferenceError;
use crate::ordering::{KeyParseError, RenderError};

/// Span for one cycle, tagged with a fresh cycle id.
///
/// `mode` is `"check"` or `"receive"`.
pub fn cycle_span(agent_id: AgentId, mode: &'static str) -> tracing::Span {
    let cycle_id = uuid::Uuid::new_v4();
    tracing::info_span!("eventnet.cycle", %agent_id, mode, %cycle_id)
}

/// Emit event: cycle started.
pub fn emit_cycle_started(agent_id: AgentId, mode: &str, buffering: bool) {
    info!(event = "cycle.started", %agent_id, mode, buffering);
}

/// Emit event: cycle finished and its events are committed.
pub fn emit_cycle_committed(agent_id: AgentId, committed: usize, failed: bool) {
    info!(event = "cycle.committed", %agent_id, committed, failed);
}

/// Emit event: a buffering cycle was dropped before it finished.
pub fn emit_cycle_abandoned(agent_id: AgentId, buffered: usize) {
    warn!(event = "cycle.abandoned", %agent_id, buffered, "flushing buffered events");
}

/// Emit event: one event of a batch could not be committed.
pub fn emit_commit_failed(agent_id: AgentId, error: &dyn std::fmt::Display) {
    warn!(event = "cycle.commit_failed", %agent_id, error = %error);
}

/// Emit event: an expression could not be rendered.
pub fn emit_render_fallback(template: &str, error: &RenderError) {
    warn!(event = "sort.render_fallback", template, reason = %error.reason);
}

/// Emit event: a rendered key did not parse as its declared type.
pub fn emit_key_fallback(error: &KeyParseError) {
    warn!(
        event = "sort.key_fallback",
        raw = %error.raw,
        expected = %error.expected,
        "comparing as string"
    );
}

/// Emit event: a file pointer could not be resolved; the event is skipped.
pub fn emit_file_pointer_skipped(agent_id: AgentId, error: &DereferenceError) {
    warn!(event = "file_pointer.skipped", %agent_id, error = %error);
}

/// Emit event: an inbound event was a duplicate and was dropped.
pub fn emit_duplicate(agent_id: AgentId, event_id: EventId) {
    info!(event = "dedup.duplicate", %agent_id, %event_id);
}

/// Emit event: events delivered along a link.
pub fn emit_delivered(source: AgentId, receiver: AgentId, count: usize) {
    info!(event = "network.delivered", %source, %receiver, count);
}

/// Emit event: an agent entry point failed.
pub fn emit_agent_failed(agent_id: AgentId, error: &dyn std::fmt::Display) {
    warn!(event = "agent.failed", %agent_id, error = %error);
}
