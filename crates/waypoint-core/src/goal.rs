//! Validated goal text.

use std::fmt;

use thiserror::Error;

/// Longest goal accepted, in characters.
pub const MAX_GOAL_CHARS: usize = 500;

/// Substrings rejected anywhere in a goal (compared case-insensitively).
const DISALLOWED_PATTERNS: &[&str] = &["<script", "javascript:", "eval(", "exec("];

/// Input errors for a goal. These never reach the generator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GoalError {
    #[error("goal must not be empty")]
    Empty,

    #[error("goal is {len} characters long (maximum is {MAX_GOAL_CHARS})")]
    TooLong { len: usize },

    #[error("goal contains disallowed content: {0:?}")]
    Disallowed(&'static str),
}

/// A trimmed, length-bounded goal string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Goal(String);

impl Goal {
    /// Trim and validate raw user input.
    pub fn parse(raw: &str) -> Result<Self, GoalError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(GoalError::Empty);
        }

        let len = trimmed.chars().count();
        if len > MAX_GOAL_CHARS {
            return Err(GoalError::TooLong { len });
        }

        let lowered = trimmed.to_lowercase();
        if let Some(pattern) = DISALLOWED_PATTERNS.iter().find(|p| lowered.contains(*p)) {
            return Err(GoalError::Disallowed(*pattern));
        }

        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Goal {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
