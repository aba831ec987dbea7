//! Selection strategies, chosen by name at startup

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::AtomicUsize;

use super::registry::RegistryError;
use super::round_robin;

/// Closed set of supported selection strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    RoundRobin,
}

impl Strategy {
    /// Map the registry cursor to the index of the next backend
    pub fn next_index(&self, cursor: &AtomicUsize, len: usize) -> usize {
        match self {
            Strategy::RoundRobin => round_robin::next_index(cursor, len),
        }
    }

    /// Return the strategy name (for logging)
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::RoundRobin => "RoundRobin",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = RegistryError;

    /// Case-insensitive; `_`, `-` and spaces are ignored ("RoundRobin", "round_robin").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "roundrobin" => Ok(Strategy::RoundRobin),
            _ => Err(RegistryError::UnsupportedStrategy(s.to_string())),
        }
    }
}
