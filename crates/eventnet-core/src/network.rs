//! The agent network: agents, links and event propagation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use eventnet_store::{
    AgentId, AgentStateStore, Event, EventId, EventStore, FsAgentStateStore,
    MemoryAgentStateStore, MemoryEventStore, UserId,
};

use crate::agent::{Agent, AgentCapability, AgentTypeRegistry};
use crate::config::{AgentConfig, NetworkConfig};
use crate::domain::{ConfigurationError, EventnetError, Result};
use crate::file_pointer::FilePointerResolver;
use crate::obs;
use crate::ordering::{CycleReport, ExpressionRenderer, SortingDecorator, SortingOptions, TeraRenderer};

/// An agent instance with its identity and validated sorting options.
pub struct AgentSlot {
    pub id: AgentId,
    pub user_id: UserId,
    pub name: String,
    pub type_name: &'static str,
    pub sorting: SortingOptions,
    agent: Box<dyn Agent>,
}

impl AgentSlot {
    pub fn agent(&self) -> &dyn Agent {
        self.agent.as_ref()
    }

    pub fn has(&self, capability: AgentCapability) -> bool {
        self.agent.descriptor().has(capability)
    }
}

impl std::fmt::Debug for AgentSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSlot")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("sorting", &self.sorting)
            .finish()
    }
}

pub struct Network {
    registry: AgentTypeRegistry,
    store: Arc<dyn EventStore>,
    state: Arc<dyn AgentStateStore>,
    renderer: Arc<dyn ExpressionRenderer>,
    files: FilePointerResolver,
    agents: BTreeMap<AgentId, AgentSlot>,
    links: Vec<(AgentId, AgentId)>,
    cursors: HashMap<(AgentId, AgentId), EventId>,
}

fn persist_memory(state: &dyn AgentStateStore, slot: &AgentSlot) -> Result<()> {
    let memory = slot.agent.memory();
    if !memory.is_null() {
        state.save(slot.id, &memory)?;
    }
    Ok(())
}

fn agent_failure(agent_id: AgentId, report: CycleReport) -> Result<Vec<Event>> {
    report.into_result().map_err(|error| {
        obs::emit_agent_failed(agent_id, &error);
        EventnetError::Agent { agent_id, error }
    })
}

impl Network {
    pub fn new(
        registry: AgentTypeRegistry,
        store: Arc<dyn EventStore>,
        state: Arc<dyn AgentStateStore>,
    ) -> Self {
        Self {
            registry,
            store,
            state,
            renderer: Arc::new(TeraRenderer::new()),
            files: FilePointerResolver::new(),
            agents: BTreeMap::new(),
            links: Vec::new(),
            cursors: HashMap::new(),
        }
    }

    /// Network with the built-in agent types and in-memory stores.
    pub fn in_memory() -> Self {
        Self::new(
            AgentTypeRegistry::with_builtins(),
            Arc::new(MemoryEventStore::new()),
            Arc::new(MemoryAgentStateStore::new()),
        )
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn ExpressionRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Build a network from `config`, failing on the first invalid agent or
    /// link.
    pub fn from_config(config: &NetworkConfig, registry: AgentTypeRegistry) -> Result<Self> {
        let (network, mut problems) = Self::load(config, registry)?;
        if problems.is_empty() {
            Ok(network)
        } else {
            Err(problems.remove(0))
        }
    }

    /// Build a network from `config`, skipping invalid agents and links.
    ///
    /// Returns the network together with every problem found.
    pub fn load(
        config: &NetworkConfig,
        registry: AgentTypeRegistry,
    ) -> Result<(Self, Vec<EventnetError>)> {
        let state: Arc<dyn AgentStateStore> = match &config.state_dir {
            Some(dir) => Arc::new(FsAgentStateStore::new(dir)?),
            None => Arc::new(MemoryAgentStateStore::new()),
        };
        let mut network = Self::new(registry, Arc::new(MemoryEventStore::new()), state);

        let mut problems = Vec::new();
        for agent in &config.agents {
            if let Err(e) = network.add_agent(agent.clone()) {
                problems.push(e);
            }
        }
        for link in &config.links {
            if let Err(e) = network.link(link.source, link.receiver) {
                problems.push(e);
            }
        }
        Ok((network, problems))
    }

    pub fn registry(&self) -> &AgentTypeRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    pub fn agent(&self, id: AgentId) -> Option<&AgentSlot> {
        self.agents.get(&id)
    }

    /// Agents ordered by id.
    pub fn agents(&self) -> impl Iterator<Item = &AgentSlot> {
        self.agents.values()
    }

    pub fn links(&self) -> &[(AgentId, AgentId)] {
        &self.links
    }

    /// Human-readable list of agent types declaring `capability`.
    pub fn capability_summary(&self, capability: AgentCapability) -> String {
        self.registry.summary(capability)
    }

    /// Validate `config` and add the agent, restoring its persisted memory.
    ///
    /// Every configuration problem of the agent is reported at once.
    pub fn add_agent(&mut self, config: AgentConfig) -> Result<AgentId> {
        if self.agents.contains_key(&config.id) {
            return Err(EventnetError::DuplicateAgent(config.id));
        }
        let invalid = |errors| EventnetError::Configuration {
            agent: config.name.clone(),
            errors,
        };
        let descriptor = self.registry.descriptor(&config.agent_type).ok_or_else(|| {
            invalid(vec![ConfigurationError::UnknownAgentType(
                config.agent_type.clone(),
            )])
        })?;

        let mut errors = Vec::new();
        let sorting = SortingOptions::from_options(&config.options, self.renderer.as_ref())
            .unwrap_or_else(|e| {
                errors.extend(e);
                SortingOptions::default()
            });
        if !descriptor.has(AgentCapability::OrdersCreatedEvents) {
            errors.extend(SortingOptions::requested(&config.options).into_iter().map(|key| {
                ConfigurationError::UnsupportedOption {
                    key: key.to_string(),
                    agent_type: descriptor.type_name.to_string(),
                }
            }));
        }
        let agent = self
            .registry
            .build(descriptor.type_name, &config.options)
            .map_err(|e| errors.extend(e))
            .ok();

        let mut agent = match agent {
            Some(agent) if errors.is_empty() => agent,
            _ => return Err(invalid(errors)),
        };

        if let Some(memory) = self.state.load(config.id)? {
            agent
                .restore_memory(memory)
                .map_err(|error| EventnetError::Agent {
                    agent_id: config.id,
                    error,
                })?;
        }

        let source = if descriptor.has(AgentCapability::EmitsFilePointer) {
            agent.content_source()
        } else {
            None
        };
        self.files.register(config.id, config.user_id, source);

        tracing::info!(
            agent_id = %config.id,
            name = %config.name,
            agent_type = descriptor.type_name,
            sorting = sorting.is_active(),
            "agent added"
        );
        self.agents.insert(
            config.id,
            AgentSlot {
                id: config.id,
                user_id: config.user_id,
                name: config.name,
                type_name: descriptor.type_name,
                sorting,
                agent,
            },
        );
        Ok(config.id)
    }

    /// Link `source` to `receiver`. Only events committed after the link was
    /// made are delivered.
    pub fn link(&mut self, source: AgentId, receiver: AgentId) -> Result<()> {
        let invalid = |reason: &str| EventnetError::InvalidLink {
            producer: source,
            consumer: receiver,
            reason: reason.to_string(),
        };
        let from = self
            .agents
            .get(&source)
            .ok_or(EventnetError::AgentNotFound(source))?;
        let to = self
            .agents
            .get(&receiver)
            .ok_or(EventnetError::AgentNotFound(receiver))?;

        if from.user_id != to.user_id {
            return Err(invalid("agents belong to different users"));
        }
        if !from.has(AgentCapability::CreatesEvents) {
            return Err(invalid("source does not create events"));
        }
        if !to.has(AgentCapability::ReceivesEvents) {
            return Err(invalid("receiver does not receive events"));
        }
        if self.links.contains(&(source, receiver)) {
            return Err(invalid("link already exists"));
        }

        if let Some(last) = self.store.events_from(source, None)?.last() {
            self.cursors.insert((source, receiver), last.id);
        }
        self.links.push((source, receiver));
        Ok(())
    }

    /// Run one scheduled check of `id`. Returns the events it committed.
    ///
    /// Events created before a failure are still committed, and memory is
    /// saved either way.
    pub async fn run_check(&mut self, id: AgentId) -> Result<Vec<Event>> {
        let slot = self
            .agents
            .get_mut(&id)
            .ok_or(EventnetError::AgentNotFound(id))?;
        if !slot.has(AgentCapability::CanBeScheduled) {
            return Err(EventnetError::MissingCapability {
                agent_id: id,
                capability: AgentCapability::CanBeScheduled,
            });
        }

        let decorator = SortingDecorator {
            options: &slot.sorting,
            store: self.store.as_ref(),
            renderer: self.renderer.as_ref(),
            files: &self.files,
            agent_id: slot.id,
            user_id: slot.user_id,
        };
        let report = decorator.check(slot.agent.as_mut()).await;
        persist_memory(self.state.as_ref(), slot)?;
        agent_failure(id, report)
    }

    /// Deliver every event committed by a source since the last delivery to
    /// each of its receivers. Returns the number of events delivered.
    ///
    /// A failing receiver is logged and skipped; storage errors abort.
    pub async fn propagate(&mut self) -> Result<usize> {
        let mut delivered = 0;
        for (source, receiver) in self.links.clone() {
            let after = self.cursors.get(&(source, receiver)).copied();
            let events = self.store.events_from(source, after)?;
            let Some(last) = events.last() else {
                continue;
            };
            self.cursors.insert((source, receiver), last.id);
            delivered += events.len();
            obs::emit_delivered(source, receiver, events.len());

            let Some(slot) = self.agents.get_mut(&receiver) else {
                continue;
            };
            let decorator = SortingDecorator {
                options: &slot.sorting,
                store: self.store.as_ref(),
                renderer: self.renderer.as_ref(),
                files: &self.files,
                agent_id: slot.id,
                user_id: slot.user_id,
            };
            let report = decorator.receive(slot.agent.as_mut(), &events).await;
            persist_memory(self.state.as_ref(), slot)?;
            // Already logged by agent_failure.
            let _ = agent_failure(receiver, report);
        }
        Ok(delivered)
    }

    /// Propagate until nothing is delivered or `max_rounds` is reached.
    /// Returns the total number of deliveries.
    pub async fn run_until_idle(&mut self, max_rounds: usize) -> Result<usize> {
        let mut total = 0;
        for round in 0..max_rounds {
            let delivered = self.propagate().await?;
            if delivered == 0 {
                tracing::debug!(round, "network idle");
                break;
            }
            total += delivered;
        }
        Ok(total)
    }

    /// Every committed event, ordered by id.
    pub fn committed_events(&self) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        for id in self.agents.keys() {
            events.extend(self.store.events_from(*id, None)?);
        }
        events.sort_by_key(|e| e.id);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_type_is_a_configuration_error() {
        let mut network = Network::in_memory();
        let err = network
            .add_agent(AgentConfig::new(1, "x", "teleporter"))
            .unwrap_err();
        assert!(matches!(err, EventnetError::Configuration { ref errors, .. }
            if errors == &vec![ConfigurationError::UnknownAgentType("teleporter".into())]));
    }

    #[test]
    fn sorting_options_rejected_on_types_without_ordering() {
        let mut network = Network::in_memory();
        let err = network
            .add_agent(
                AgentConfig::new(1, "changes", "change_detector")
                    .option("property", json!("{{ v }}"))
                    .option("include_sort_info", json!(true)),
            )
            .unwrap_err();
        match err {
            EventnetError::Configuration { errors, .. } => assert_eq!(
                errors,
                vec![ConfigurationError::UnsupportedOption {
                    key: "include_sort_info".into(),
                    agent_type: "change_detector".into(),
                }]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn all_problems_of_an_agent_are_reported_together() {
        let mut network = Network::in_memory();
        let err = network
            .add_agent(
                AgentConfig::new(1, "reader", "read_file")
                    .option("events_order", json!([["{{ a }}", "colour"]]))
                    .option("include_sort_info", json!("perhaps"))
                    .option("data_key", json!("")),
            )
            .unwrap_err();
        match err {
            EventnetError::Configuration { agent, errors } => {
                assert_eq!(agent, "reader");
                assert_eq!(errors.len(), 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut network = Network::in_memory();
        network
            .add_agent(AgentConfig::new(1, "a", "read_file"))
            .unwrap();
        assert!(matches!(
            network.add_agent(AgentConfig::new(1, "b", "read_file")),
            Err(EventnetError::DuplicateAgent(AgentId(1)))
        ));
    }

    #[test]
    fn links_are_checked() {
        let mut network = Network::in_memory();
        network
            .add_agent(AgentConfig::new(1, "dedup", "de_duplication"))
            .unwrap();
        network
            .add_agent(AgentConfig::new(2, "reader", "read_file"))
            .unwrap();
        network
            .add_agent(AgentConfig::new(3, "other", "read_file").user(2))
            .unwrap();

        network.link(AgentId(1), AgentId(2)).unwrap();
        assert!(network.link(AgentId(1), AgentId(2)).is_err());
        assert!(network.link(AgentId(1), AgentId(3)).is_err());
        assert!(matches!(
            network.link(AgentId(1), AgentId(9)),
            Err(EventnetError::AgentNotFound(AgentId(9)))
        ));
        assert_eq!(network.links(), &[(AgentId(1), AgentId(2))]);
    }

    #[tokio::test]
    async fn run_check_requires_scheduling_capability() {
        let mut network = Network::in_memory();
        network
            .add_agent(AgentConfig::new(1, "reader", "read_file"))
            .unwrap();
        assert!(matches!(
            network.run_check(AgentId(1)).await,
            Err(EventnetError::MissingCapability { .. })
        ));
    }

    #[test]
    fn capability_summary_lists_file_pointer_agents() {
        let network = Network::in_memory();
        assert_eq!(
            network.capability_summary(AgentCapability::EmitsFilePointer),
            "local_file"
        );
    }
}
