//! Built-in agent types.

pub mod change_detector;
pub mod de_duplication;
pub mod local_file;
pub mod read_file;

pub use change_detector::ChangeDetectorAgent;
pub use de_duplication::DeDuplicationAgent;
pub use local_file::{LocalFileAgent, LocalFileSource};
pub use read_file::ReadFileAgent;

use crate::agent::{AgentDescriptor, AgentFactory};

/// Descriptor and factory of every built-in type.
pub fn builtins() -> [(&'static AgentDescriptor, AgentFactory); 4] {
    [
        (&change_detector::DESCRIPTOR, ChangeDetectorAgent::build as AgentFactory),
        (&de_duplication::DESCRIPTOR, DeDuplicationAgent::build as AgentFactory),
        (&local_file::DESCRIPTOR, LocalFileAgent::build as AgentFactory),
        (&read_file::DESCRIPTOR, ReadFileAgent::build as AgentFactory),
    ]
}
