use std::io::Read;

use eventnet_store::{AgentId, NewEvent, Payload, StorageResult, UserId};

use crate::domain::AgentResult;
use crate::file_pointer::FilePointerResolver;
use crate::metrics::METRICS;
use crate::obs;
use crate::ordering::{render_or_fallback, ExpressionRenderer};

/// Receives the events an agent creates during one cycle.
pub trait EventSink: Send {
    fn create_event(&mut self, event: NewEvent) -> StorageResult<()>;
}

/// Everything an agent may touch while it runs.
pub struct AgentContext<'a> {
    agent_id: AgentId,
    user_id: UserId,
    sink: &'a mut dyn EventSink,
    renderer: &'a dyn ExpressionRenderer,
    files: &'a FilePointerResolver,
}

impl<'a> AgentContext<'a> {
    pub fn new(
        agent_id: AgentId,
        user_id: UserId,
        sink: &'a mut dyn EventSink,
        renderer: &'a dyn ExpressionRenderer,
        files: &'a FilePointerResolver,
    ) -> Self {
        Self {
            agent_id,
            user_id,
            sink,
            renderer,
            files,
        }
    }

    pub fn agent_id(&self) -> AgentId {
        self.agent_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Create an event. Whether it commits now or at the end of the cycle
    /// depends on the agent's sorting options.
    pub fn create_event(&mut self, event: impl Into<NewEvent>) -> AgentResult<()> {
        self.sink.create_event(event.into())?;
        Ok(())
    }

    pub fn renderer(&self) -> &dyn ExpressionRenderer {
        self.renderer
    }

    /// Render `template` against `context`, or return it verbatim on failure.
    pub fn render(&self, template: &str, context: &Payload) -> String {
        render_or_fallback(self.renderer, template, context)
    }

    /// Open the content a file-pointer payload refers to.
    ///
    /// Returns `None` (after logging) when the pointer cannot be resolved;
    /// callers skip the event.
    pub fn open_file_pointer(&self, payload: &Payload) -> Option<Box<dyn Read + Send>> {
        match self.files.resolve_stream(self.user_id, payload) {
            Ok(stream) => Some(stream),
            Err(err) => {
                obs::emit_file_pointer_skipped(self.agent_id, &err);
                METRICS.inc_dereference_failures();
                None
            }
        }
    }
}
