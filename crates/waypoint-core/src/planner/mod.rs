//! Plan generation: prompt, reply validation, fallback and total duration.

pub mod duration;
pub mod fallback;
pub mod generate;
pub mod parser;
pub mod prompt;

pub use duration::total_duration;
pub use fallback::fallback_steps;
pub use generate::{GeneratedSteps, Planner};
pub use parser::{ResponseParseError, parse_steps};
