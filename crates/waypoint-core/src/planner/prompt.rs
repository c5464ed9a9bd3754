//! Prompt text for plan generation.
//!
//! Prompts are plain strings assembled from constant sections so that the
//! same goal always yields byte-identical requests.

use crate::llm::ChatRequest;

/// Upper bound on completion length.
pub const MAX_TOKENS: u32 = 1500;

/// Sampling temperature for the first attempt.
pub const TEMPERATURE: f32 = 0.7;

/// Sampling temperature for the repair attempt.
pub const REPAIR_TEMPERATURE: f32 = 0.2;

const SYSTEM_PROMPT: &str = "\
You are an expert task planning assistant. You break goals down into clear, \
actionable, ordered steps. Always respond with valid JSON.";

const REPAIR_SYSTEM_PROMPT: &str = "\
You are a task planning assistant that outputs machine-readable JSON. \
Return ONLY valid JSON: no markdown fences, no commentary, no trailing text.";

const SCHEMA_SECTION: &str = r#"
Respond with a single JSON object of exactly this shape:

{
  "goal": "<the goal, echoed back>",
  "steps": [
    {
      "step_number": 1,
      "title": "<brief title>",
      "description": "<detailed description>",
      "estimated_duration": "<time estimate, e.g. \"2 hours\">",
      "requires_research": true,
      "research_topics": ["<web search query>", "..."]
    }
  ]
}

Rules:
- Number steps sequentially starting at 1.
- Use between 3 and 10 steps; never more than 20.
- Each step must be specific and actionable.
- Consider dependencies between steps and order them accordingly.
- Set "requires_research" to true only when external information would help,
  and list concrete search queries in "research_topics".
- Mention the destination city by name in research topics for travel goals.
"#;

/// Build the first-attempt request for `goal`.
pub fn build_request(goal: &str) -> ChatRequest {
    let mut user = String::with_capacity(SCHEMA_SECTION.len() + goal.len() + 64);
    user.push_str("Break the following goal down into a step-by-step plan.\n\n");
    user.push_str("Goal: ");
    user.push_str(goal);
    user.push('\n');
    user.push_str(SCHEMA_SECTION);

    ChatRequest {
        system: SYSTEM_PROMPT.to_owned(),
        user,
        max_tokens: MAX_TOKENS,
        temperature: TEMPERATURE,
    }
}

/// Build the single repair request sent after an unparsable reply.
///
/// `problem` is the parse error from the first attempt, included so the
/// model can correct it.
pub fn build_repair_request(goal: &str, problem: &str) -> ChatRequest {
    let mut user = String::with_capacity(SCHEMA_SECTION.len() + goal.len() + 256);
    user.push_str("Your previous answer could not be used: ");
    user.push_str(problem);
    user.push_str("\n\nTry again. Return ONLY valid JSON, nothing else.\n\n");
    user.push_str("Goal: ");
    user.push_str(goal);
    user.push('\n');
    user.push_str(SCHEMA_SECTION);

    ChatRequest {
        system: REPAIR_SYSTEM_PROMPT.to_owned(),
        user,
        max_tokens: MAX_TOKENS,
        temperature: REPAIR_TEMPERATURE,
    }
}
