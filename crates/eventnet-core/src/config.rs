//! Network configuration file.
//!
//! ```toml
//! state_dir = "/var/lib/eventnet"
//!
//! [[agents]]
//! id = 1
//! user_id = 1
//! name = "inbox"
//! type = "local_file"
//! options = { mode = "read", path = "/srv/inbox", events_order = [["{{ file_pointer.file }}"]] }
//!
//! [[agents]]
//! id = 2
//! name = "reader"
//! type = "read_file"
//!
//! [[links]]
//! source = 1
//! receiver = 2
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use eventnet_store::{AgentId, Payload, UserId};

use crate::domain::{EventnetError, Result};

fn default_user() -> UserId {
    UserId(1)
}

/// One agent instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: AgentId,
    #[serde(default = "default_user")]
    pub user_id: UserId,
    pub name: String,
    #[serde(rename = "type")]
    pub agent_type: String,
    #[serde(default)]
    pub options: Payload,
}

impl AgentConfig {
    pub fn new(id: u64, name: impl Into<String>, agent_type: impl Into<String>) -> Self {
        Self {
            id: AgentId(id),
            user_id: default_user(),
            name: name.into(),
            agent_type: agent_type.into(),
            options: Payload::new(),
        }
    }

    pub fn user(mut self, user_id: u64) -> Self {
        self.user_id = UserId(user_id);
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }
}

/// A directed link from a producing agent to a receiving agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub source: AgentId,
    pub receiver: AgentId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Directory for persisted agent memory. In-memory when absent.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
    #[serde(default)]
    pub links: Vec<LinkConfig>,
}

impl NetworkConfig {
    pub fn from_toml(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| EventnetError::ConfigFile(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EventnetError::ConfigFile(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_agents_links_and_inline_options() {
        let config = NetworkConfig::from_toml(
            r#"
            [[agents]]
            id = 1
            name = "files"
            type = "local_file"
            options = { mode = "read", path = "/tmp", events_order = [["{{ n }}", "number", true]] }

            [[agents]]
            id = 2
            user_id = 7
            name = "reader"
            type = "read_file"

            [[links]]
            source = 1
            receiver = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.state_dir, None);
        assert_eq!(config.agents.len(), 2);
        assert_eq!(config.agents[0].user_id, UserId(1));
        assert_eq!(config.agents[1].user_id, UserId(7));
        assert_eq!(config.agents[0].agent_type, "local_file");
        assert_eq!(
            config.agents[0].options["events_order"],
            json!([["{{ n }}", "number", true]])
        );
        assert!(config.agents[1].options.is_empty());
        assert_eq!(
            config.links,
            vec![LinkConfig {
                source: AgentId(1),
                receiver: AgentId(2)
            }]
        );
    }

    #[test]
    fn malformed_toml_is_a_config_file_error() {
        let err = NetworkConfig::from_toml("[[agents]]\nid = \"x\"").unwrap_err();
        assert!(matches!(err, EventnetError::ConfigFile(_)));
    }

    #[test]
    fn missing_file_is_reported_with_path() {
        let err = NetworkConfig::from_path("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
