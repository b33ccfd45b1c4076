//! `local_file`: emit file pointers for local files, or write event data to
//! local files.
//!
//! In `read` mode a scheduled check emits one pointer per regular file: the
//! configured path itself, or every file directly inside it, in name order.
//! In `write` mode each inbound event renders `path` and `data`, writes (or
//! appends) the file and emits a pointer to it.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use eventnet_store::{Event, Payload};

use crate::agent::{Agent, AgentCapability, AgentContext, AgentDescriptor};
use crate::domain::{bool_option, string_option, AgentResult, ConfigurationError};
use crate::file_pointer::{ContentSource, FilePointer};

pub static DESCRIPTOR: AgentDescriptor = AgentDescriptor {
    type_name: "local_file",
    description: "Reads or writes files on the local filesystem",
    capabilities: &[
        AgentCapability::CanBeScheduled,
        AgentCapability::ReceivesEvents,
        AgentCapability::CreatesEvents,
        AgentCapability::EmitsFilePointer,
        AgentCapability::OrdersCreatedEvents,
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
}

/// Serves files beneath `root` only.
#[derive(Debug, Clone)]
pub struct LocalFileSource {
    root: PathBuf,
}

impl LocalFileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root for a path option that may contain template markup: the
    /// directory holding everything before the first `{{`.
    pub fn for_template(path: &str) -> Self {
        match path.find("{{") {
            None => Self::new(path),
            Some(at) => {
                let prefix = &path[..at];
                let root = if prefix.ends_with(std::path::MAIN_SEPARATOR) || prefix.ends_with('/') {
                    PathBuf::from(prefix)
                } else {
                    Path::new(prefix)
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_default()
                };
                Self::new(root)
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ContentSource for LocalFileSource {
    fn open(&self, file: &str) -> std::io::Result<Box<dyn Read + Send>> {
        let root = if self.root.as_os_str().is_empty() {
            std::env::current_dir()?
        } else {
            self.root.canonicalize()?
        };
        let path = Path::new(file).canonicalize()?;
        if !path.starts_with(&root) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("{} is outside {}", path.display(), root.display()),
            ));
        }
        Ok(Box::new(std::fs::File::open(path)?))
    }
}

#[derive(Debug)]
pub struct LocalFileAgent {
    mode: Mode,
    path: String,
    append: bool,
    data: String,
    source: Arc<LocalFileSource>,
}

impl LocalFileAgent {
    pub fn from_options(options: &Payload) -> Result<Self, Vec<ConfigurationError>> {
        let mut errors = Vec::new();

        let mode = match string_option(options, "mode", "read").as_deref() {
            Ok("read") => Some(Mode::Read),
            Ok("write") => Some(Mode::Write),
            Ok(other) => {
                errors.push(ConfigurationError::InvalidOption {
                    key: "mode".into(),
                    reason: format!("must be read or write, got {other:?}"),
                });
                None
            }
            Err(e) => {
                errors.push(e.clone());
                None
            }
        };

        let path = match string_option(options, "path", "") {
            Ok(path) if path.trim().is_empty() => {
                errors.push(ConfigurationError::InvalidOption {
                    key: "path".into(),
                    reason: "is required".into(),
                });
                None
            }
            Ok(path) => Some(path),
            Err(e) => {
                errors.push(e);
                None
            }
        };

        let append = bool_option(options, "append")
            .unwrap_or_else(|e| {
                errors.push(e);
                None
            })
            .unwrap_or(false);

        let data = string_option(options, "data", "{{ data }}").unwrap_or_else(|e| {
            errors.push(e);
            String::new()
        });

        match (mode, path) {
            (Some(mode), Some(path)) if errors.is_empty() => {
                let source = match mode {
                    Mode::Read => LocalFileSource::new(&path),
                    Mode::Write => LocalFileSource::for_template(&path),
                };
                Ok(Self {
                    mode,
                    path,
                    append,
                    data,
                    source: Arc::new(source),
                })
            }
            _ => Err(errors),
        }
    }

    pub fn build(options: &Payload) -> Result<Box<dyn Agent>, Vec<ConfigurationError>> {
        Ok(Box::new(Self::from_options(options)?))
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    async fn files(&self) -> std::io::Result<Vec<PathBuf>> {
        let path = Path::new(&self.path);
        if tokio::fs::metadata(path).await?.is_file() {
            return Ok(vec![path.to_path_buf()]);
        }
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(path).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    async fn write(&self, path: &str, data: &str) -> std::io::Result<()> {
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        if self.append {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(data.as_bytes()).await?;
            file.flush().await
        } else {
            tokio::fs::write(path, data).await
        }
    }
}

#[async_trait]
impl Agent for LocalFileAgent {
    fn descriptor(&self) -> &'static AgentDescriptor {
        &DESCRIPTOR
    }

    async fn check(&mut self, ctx: &mut AgentContext<'_>) -> AgentResult<()> {
        if self.mode != Mode::Read {
            return Ok(());
        }
        for file in self.files().await? {
            let pointer = FilePointer::new(file.to_string_lossy(), ctx.agent_id());
            ctx.create_event(pointer.to_payload())?;
        }
        Ok(())
    }

    async fn receive(&mut self, ctx: &mut AgentContext<'_>, events: &[Event]) -> AgentResult<()> {
        if self.mode != Mode::Write {
            return Ok(());
        }
        for event in events {
            let path = ctx.render(&self.path, &event.payload);
            let data = ctx.render(&self.data, &event.payload);
            self.write(&path, &data).await?;
            tracing::debug!(agent_id = %ctx.agent_id(), %path, bytes = data.len(), "file written");
            ctx.create_event(FilePointer::new(path, ctx.agent_id()).to_payload())?;
        }
        Ok(())
    }

    fn content_source(&self) -> Option<Arc<dyn ContentSource>> {
        Some(self.source.clone())
    }
}
