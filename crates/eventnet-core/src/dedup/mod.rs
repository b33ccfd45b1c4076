//! De-duplication and on-change detection support.

pub mod window;

pub use window::{normalize, UniquenessWindow, HASH_THRESHOLD};
