use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::StorageError;
use crate::storage_traits::{AgentId, AgentStateStore, StorageResult};

/// Filesystem-backed agent memory.
///
/// Layout: `<root>/agents/<agent id>.json`
pub struct FsAgentStateStore {
    agents_dir: PathBuf,
}

impl FsAgentStateStore {
    /// Create a store rooted at `root`. Creates `root/agents/` if needed.
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let agents_dir = root.as_ref().join("agents");
        fs::create_dir_all(&agents_dir)?;
        Ok(Self { agents_dir })
    }

    fn memory_path(&self, agent_id: AgentId) -> PathBuf {
        self.agents_dir.join(format!("{agent_id}.json"))
    }
}

impl AgentStateStore for FsAgentStateStore {
    fn load(&self, agent_id: AgentId) -> StorageResult<Option<serde_json::Value>> {
        let path = self.memory_path(agent_id);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn save(&self, agent_id: AgentId, memory: &serde_json::Value) -> StorageResult<()> {
        let path = self.memory_path(agent_id);
        let bytes = serde_json::to_vec_pretty(memory)?;

        // Atomic write: temp file in the same directory, then rename.
        let mut tmp = NamedTempFile::new_in(&self.agents_dir)?;
        tmp.write_all(&bytes)?;
        tmp.persist(&path).map_err(|e| e.error)?;

        tracing::debug!(agent_id = %agent_id, path = %path.display(), "agent memory saved");
        Ok(())
    }
}
