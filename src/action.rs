//! Actions - configured build commands

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single configured command, e.g. `composer install`.
///
/// Identity is the trimmed command text: two actions with the same text
/// are the same action, whichever stage they were configured in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(String);

impl Action {
    /// Create an action from a command, trimming surrounding whitespace
    pub fn new(command: impl AsRef<str>) -> Self {
        Self(command.as_ref().trim().to_string())
    }

    /// The empty action, current before any command has been seen
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Action {
    fn from(command: &str) -> Self {
        Self::new(command)
    }
}

impl From<String> for Action {
    fn from(command: String) -> Self {
        Self::new(command)
    }
}
