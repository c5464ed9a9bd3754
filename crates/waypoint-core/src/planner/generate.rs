//! Goal-to-steps generation with one repair attempt and an offline fallback.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};
use waypoint_db::models::{AiProvider, PlanStep};

use super::fallback::fallback_steps;
use super::parser::{ResponseParseError, parse_steps};
use super::prompt::{build_repair_request, build_request};
use crate::goal::Goal;
use crate::llm::{LlmClient, LlmError};

/// Why the LLM path was abandoned. Logged, never returned to callers.
#[derive(Debug, Error)]
enum GenerateError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("unusable response after repair attempt: {0}")]
    Parse(#[from] ResponseParseError),
}

/// Steps produced for a goal, tagged with the generator that made them.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSteps {
    /// Numbered `1..=N`, `N >= 1`, with no enrichment yet.
    pub steps: Vec<PlanStep>,
    pub provider: AiProvider,
}

/// Turns goals into steps. Infallible: every failure ends in the fallback
/// generator.
#[derive(Clone)]
pub struct Planner {
    llm: Option<Arc<dyn LlmClient>>,
}

impl Planner {
    pub fn new(llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { llm }
    }

    /// A planner that always uses the deterministic generator.
    pub fn offline() -> Self {
        Self { llm: None }
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    pub async fn generate(&self, goal: &Goal) -> GeneratedSteps {
        let Some(llm) = &self.llm else {
            debug!("no LLM configured, using fallback generator");
            return Self::fallback(goal);
        };

        match try_llm(llm.as_ref(), goal).await {
            Ok(steps) => {
                info!(provider = llm.name(), steps = steps.len(), "plan generated by LLM");
                GeneratedSteps {
                    steps,
                    provider: AiProvider::Openai,
                }
            }
            Err(e) => {
                warn!(provider = llm.name(), error = %e, "LLM generation failed, using fallback generator");
                Self::fallback(goal)
            }
        }
    }

    fn fallback(goal: &Goal) -> GeneratedSteps {
        GeneratedSteps {
            steps: fallback_steps(goal.as_str()),
            provider: AiProvider::Fallback,
        }
    }
}

/// Call the LLM, and on an unusable reply retry once with a stricter prompt.
///
/// Transport, auth and quota failures are not retried.
async fn try_llm(llm: &dyn LlmClient, goal: &Goal) -> Result<Vec<PlanStep>, GenerateError> {
    let reply = llm.complete(&build_request(goal.as_str())).await?;

    let problem = match parse_steps(&reply) {
        Ok(steps) => return Ok(steps),
        Err(e) => e,
    };
    warn!(provider = llm.name(), error = %problem, "LLM reply rejected, sending repair request");

    let repaired = llm
        .complete(&build_repair_request(goal.as_str(), &problem.to_string()))
        .await?;
    Ok(parse_steps(&repaired)?)
}
