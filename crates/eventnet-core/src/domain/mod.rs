//! Domain errors and option helpers shared by every agent.

pub mod error;
pub mod options;

pub use error::{AgentError, AgentResult, ConfigurationError, EventnetError, Result};
pub use options::{bool_option, boolify, string_option, usize_option};
