//! Buffer, sort and commit the events an agent creates during one cycle.
//!
//! A cycle is one `check` call, or the handling of one inbound event. When
//! the agent has an `events_order` or `include_sort_info`, every event it
//! creates goes into the cycle's buffer. The buffer is sorted and committed
//! when the cycle ends. If the cycle is abandoned (the agent panics or the
//! future is dropped mid-await), [`SortingCycle`]'s `Drop` commits whatever
//! was buffered.
//!
//! Otherwise the cycle is a pass-through and events commit immediately.

use serde_json::json;
use tracing::Instrument;

use eventnet_store::{AgentId, Event, EventStore, NewEvent, Payload, StorageResult, UserId};

use super::expression::ExpressionRenderer;
use super::order_spec::OrderSpec;
use crate::agent::{Agent, AgentContext, EventSink};
use crate::domain::{bool_option, AgentError, ConfigurationError};
use crate::file_pointer::FilePointerResolver;
use crate::metrics::METRICS;
use crate::obs;

pub const EVENTS_ORDER_KEY: &str = "events_order";
pub const INCLUDE_SORT_INFO_KEY: &str = "include_sort_info";
pub const SORT_INFO_KEY: &str = "sort_info";

/// Validated sorting configuration of one agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortingOptions {
    pub events_order: OrderSpec,
    pub include_sort_info: bool,
}

impl SortingOptions {
    /// Read `events_order` and `include_sort_info` from an options object.
    ///
    /// Every problem is reported, not just the first.
    pub fn from_options(
        options: &Payload,
        renderer: &dyn ExpressionRenderer,
    ) -> Result<Self, Vec<ConfigurationError>> {
        let mut errors = Vec::new();

        let events_order = OrderSpec::validate(options.get(EVENTS_ORDER_KEY), renderer)
            .unwrap_or_else(|spec_errors| {
                errors.extend(spec_errors.into_iter().map(ConfigurationError::from));
                OrderSpec::default()
            });

        let include_sort_info = bool_option(options, INCLUDE_SORT_INFO_KEY)
            .unwrap_or_else(|e| {
                errors.push(e);
                None
            })
            .unwrap_or(false);

        if errors.is_empty() {
            Ok(Self {
                events_order,
                include_sort_info,
            })
        } else {
            Err(errors)
        }
    }

    /// Whether created events must be buffered.
    pub fn is_active(&self) -> bool {
        !self.events_order.is_empty() || self.include_sort_info
    }

    /// True when `options` sets either sorting key to a non-null value.
    pub fn requested(options: &Payload) -> Vec<&'static str> {
        [EVENTS_ORDER_KEY, INCLUDE_SORT_INFO_KEY]
            .into_iter()
            .filter(|key| options.get(*key).is_some_and(|v| !v.is_null()))
            .collect()
    }
}

/// Sort a buffered batch and annotate it with `sort_info` if enabled.
pub fn prepare_batch(
    options: &SortingOptions,
    renderer: &dyn ExpressionRenderer,
    events: Vec<NewEvent>,
) -> Vec<NewEvent> {
    let mut batch = options.events_order.sort_events(renderer, events);
    if options.include_sort_info {
        let count = batch.len();
        for (i, event) in batch.iter_mut().enumerate() {
            event.merge(SORT_INFO_KEY, json!({ "position": i + 1, "count": count }));
        }
    }
    batch
}

/// Where a cycle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    /// Pass-through, or the buffer has been flushed.
    Idle,
    Buffering,
    Committing,
}

/// Event sink for one cycle. Flushes its buffer exactly once, on
/// [`finish`](Self::finish) or on drop.
pub struct SortingCycle<'a> {
    store: &'a dyn EventStore,
    agent_id: AgentId,
    options: &'a SortingOptions,
    renderer: &'a dyn ExpressionRenderer,
    phase: CyclePhase,
    buffer: Vec<NewEvent>,
    committed: Vec<Event>,
}

impl<'a> SortingCycle<'a> {
    pub fn begin(
        store: &'a dyn EventStore,
        agent_id: AgentId,
        options: &'a SortingOptions,
        renderer: &'a dyn ExpressionRenderer,
    ) -> Self {
        let phase = if options.is_active() {
            CyclePhase::Buffering
        } else {
            CyclePhase::Idle
        };
        Self {
            store,
            agent_id,
            options,
            renderer,
            phase,
            buffer: Vec::new(),
            committed: Vec::new(),
        }
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Flush the buffer and return every event committed during the cycle.
    pub fn finish(mut self) -> Vec<Event> {
        self.flush();
        std::mem::take(&mut self.committed)
    }

    fn commit(&mut self, event: NewEvent) -> StorageResult<()> {
        let event = self.store.commit(self.agent_id, event)?;
        METRICS.inc_events_committed();
        self.committed.push(event);
        Ok(())
    }

    fn flush(&mut self) {
        if self.phase != CyclePhase::Buffering {
            return;
        }
        self.phase = CyclePhase::Committing;
        let batch = prepare_batch(self.options, self.renderer, std::mem::take(&mut self.buffer));
        for event in batch {
            // One failed commit must not cost the rest of the batch.
            if let Err(err) = self.commit(event) {
                obs::emit_commit_failed(self.agent_id, &err);
            }
        }
        self.phase = CyclePhase::Idle;
    }
}

impl EventSink for SortingCycle<'_> {
    fn create_event(&mut self, event: NewEvent) -> StorageResult<()> {
        match self.phase {
            CyclePhase::Buffering => {
                self.buffer.push(event);
                Ok(())
            }
            CyclePhase::Idle | CyclePhase::Committing => self.commit(event),
        }
    }
}

impl Drop for SortingCycle<'_> {
    fn drop(&mut self) {
        if self.phase == CyclePhase::Buffering {
            obs::emit_cycle_abandoned(self.agent_id, self.buffer.len());
            self.flush();
        }
    }
}

/// Outcome of running an agent through the decorator.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Events committed, in commit order.
    pub committed: Vec<Event>,
    /// Domain error raised by the agent, after its events were flushed.
    pub error: Option<AgentError>,
}

impl CycleReport {
    pub fn into_result(self) -> Result<Vec<Event>, AgentError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.committed),
        }
    }
}

/// Runs an agent's entry points inside sorting cycles.
pub struct SortingDecorator<'a> {
    pub options: &'a SortingOptions,
    pub store: &'a dyn EventStore,
    pub renderer: &'a dyn ExpressionRenderer,
    pub files: &'a FilePointerResolver,
    pub agent_id: AgentId,
    pub user_id: UserId,
}

impl<'a> SortingDecorator<'a> {
    fn begin(&self) -> SortingCycle<'a> {
        SortingCycle::begin(self.store, self.agent_id, self.options, self.renderer)
    }

    fn context<'c>(&self, sink: &'c mut dyn EventSink) -> AgentContext<'c>
    where
        'a: 'c,
    {
        AgentContext::new(self.agent_id, self.user_id, sink, self.renderer, self.files)
    }

    /// Scheduled mode: the whole `check` is one cycle.
    pub async fn check(&self, agent: &mut dyn Agent) -> CycleReport {
        let span = obs::cycle_span(self.agent_id, "check");
        async {
            let mut cycle = self.begin();
            obs::emit_cycle_started(self.agent_id, "check", cycle.phase() == CyclePhase::Buffering);
            let result = {
                let mut ctx = self.context(&mut cycle);
                agent.check(&mut ctx).await
            };
            let committed = cycle.finish();
            obs::emit_cycle_committed(self.agent_id, committed.len(), result.is_err());
            CycleReport {
                committed,
                error: result.err(),
            }
        }
        .instrument(span)
        .await
    }

    /// Reactive mode: each inbound event is its own cycle.
    ///
    /// Stops at the first inbound event whose handling fails; the events
    /// created up to that point stay committed.
    pub async fn receive(&self, agent: &mut dyn Agent, events: &[Event]) -> CycleReport {
        let mut report = CycleReport::default();
        for event in events {
            let span = obs::cycle_span(self.agent_id, "receive");
            let (committed, result) = async {
                let mut cycle = self.begin();
                obs::emit_cycle_started(
                    self.agent_id,
                    "receive",
                    cycle.phase() == CyclePhase::Buffering,
                );
                let result = {
                    let mut ctx = self.context(&mut cycle);
                    agent.receive(&mut ctx, std::slice::from_ref(event)).await
                };
                let committed = cycle.finish();
                obs::emit_cycle_committed(self.agent_id, committed.len(), result.is_err());
                (committed, result)
            }
            .instrument(span)
            .await;

            report.committed.extend(committed);
            if let Err(err) = result {
                report.error = Some(err);
                break;
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordering::TeraRenderer;
    use eventnet_store::MemoryEventStore;

    fn payload(value: serde_json::Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    fn options(value: serde_json::Value) -> SortingOptions {
        SortingOptions::from_options(&payload(value), &TeraRenderer).unwrap()
    }

    #[test]
    fn inactive_without_order_or_sort_info() {
        assert!(!options(serde_json::json!({})).is_active());
        assert!(!options(serde_json::json!({"include_sort_info": "false"})).is_active());
        assert!(options(serde_json::json!({"include_sort_info": true})).is_active());
        assert!(options(serde_json::json!({"events_order": ["{{a}}"]})).is_active());
    }

    #[test]
    fn option_errors_are_collected() {
        let errors = SortingOptions::from_options(
            &payload(serde_json::json!({
                "events_order": [5, ["{{a}}", "bogus"]],
                "include_sort_info": "sometimes"
            })),
            &TeraRenderer,
        )
        .unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[2], ConfigurationError::NotBoolean { .. }));
    }

    #[test]
    fn requested_ignores_nulls() {
        let opts = payload(serde_json::json!({"events_order": null, "include_sort_info": false}));
        assert_eq!(SortingOptions::requested(&opts), vec![INCLUDE_SORT_INFO_KEY]);
    }

    #[test]
    fn sort_info_without_order_keeps_creation_order() {
        let opts = options(serde_json::json!({"include_sort_info": true}));
        let batch = prepare_batch(
            &opts,
            &TeraRenderer,
            (0..3).map(|i| NewEvent::new(payload(serde_json::json!({ "i": i })))).collect(),
        );
        for (i, event) in batch.iter().enumerate() {
            assert_eq!(event.payload["i"], serde_json::json!(i));
            assert_eq!(
                event.payload[SORT_INFO_KEY],
                serde_json::json!({"position": i + 1, "count": 3})
            );
        }
    }

    #[test]
    fn pass_through_cycle_commits_immediately() {
        let store = MemoryEventStore::new();
        let opts = SortingOptions::default();
        let mut cycle = SortingCycle::begin(&store, AgentId(1), &opts, &TeraRenderer);
        assert_eq!(cycle.phase(), CyclePhase::Idle);
        cycle.create_event(NewEvent::default()).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(cycle.finish().len(), 1);
    }

    #[test]
    fn buffering_cycle_commits_sorted_on_finish() {
        let store = MemoryEventStore::new();
        let opts = options(serde_json::json!({"events_order": [["{{n}}", "number", true]]}));
        let mut cycle = SortingCycle::begin(&store, AgentId(1), &opts, &TeraRenderer);
        for n in [1, 3, 2] {
            cycle
                .create_event(NewEvent::new(payload(serde_json::json!({ "n": n }))))
                .unwrap();
        }
        assert_eq!(cycle.buffered(), 3);
        assert!(store.is_empty().unwrap());

        let committed = cycle.finish();
        let ns: Vec<_> = committed.iter().map(|e| e.payload["n"].clone()).collect();
        assert_eq!(ns, vec![serde_json::json!(3), serde_json::json!(2), serde_json::json!(1)]);
        assert_eq!(store.len().unwrap(), 3);
    }

    #[test]
    fn dropped_cycle_still_flushes_once() {
        let store = MemoryEventStore::new();
        let opts = options(serde_json::json!({"include_sort_info": true}));
        {
            let mut cycle = SortingCycle::begin(&store, AgentId(1), &opts, &TeraRenderer);
            cycle.create_event(NewEvent::default()).unwrap();
            cycle.create_event(NewEvent::default()).unwrap();
        }
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn report_into_result_prefers_error() {
        let report = CycleReport {
            committed: vec![],
            error: Some(AgentError::Failed("x".into())),
        };
        assert!(report.into_result().is_err());
    }
}
