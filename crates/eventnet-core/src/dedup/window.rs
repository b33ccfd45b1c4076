//! Last-N uniqueness window.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Discriminators longer than this many characters are stored as a checksum.
pub const HASH_THRESHOLD: usize = 10;

/// Reduce a discriminator to its stored form.
///
/// Long values become their CRC-32 as a decimal string. Used on both the
/// write and the read path.
pub fn normalize(discriminator: &str) -> String {
    if discriminator.chars().count() > HASH_THRESHOLD {
        crc32fast::hash(discriminator.as_bytes()).to_string()
    } else {
        discriminator.to_string()
    }
}

/// Ordered record of recently seen discriminators, oldest first.
///
/// Serializes as a plain JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniquenessWindow {
    seen: VecDeque<String>,
}

impl UniquenessWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Stored discriminators, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.seen.iter().map(String::as_str)
    }

    /// Whether `discriminator` is absent from the window.
    pub fn is_new(&self, discriminator: &str) -> bool {
        let key = normalize(discriminator);
        !self.seen.contains(&key)
    }

    /// Append `discriminator`, evicting the oldest entries so that the window
    /// holds at most `lookback` values. `lookback == 0` never evicts.
    pub fn record(&mut self, discriminator: &str, lookback: usize) {
        if lookback > 0 {
            while self.seen.len() >= lookback {
                self.seen.pop_front();
            }
        }
        self.seen.push_back(normalize(discriminator));
    }

    /// Record `discriminator` if it is new. Returns whether it was.
    pub fn observe(&mut self, discriminator: &str, lookback: usize) -> bool {
        let new = self.is_new(discriminator);
        if new {
            self.record(discriminator, lookback);
        }
        new
    }
}
