//! Type-safe user identifier

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric user identifier in the upstream system
///
/// Serialized transparently as a JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mid(u64);

impl Mid {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying number
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Mid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Mid {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl std::str::FromStr for Mid {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}
