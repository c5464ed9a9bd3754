//! Deterministic offline plan generator.
//!
//! Used whenever the LLM is unavailable or its reply cannot be validated.
//! The same goal always produces the same four steps.

use waypoint_db::models::PlanStep;

fn step(
    n: i64,
    title: &str,
    description: String,
    duration: &str,
    topics: Option<Vec<String>>,
) -> PlanStep {
    PlanStep {
        step_number: n,
        title: title.to_owned(),
        description,
        estimated_duration: duration.to_owned(),
        requires_research: topics.is_some(),
        research_topics: topics.unwrap_or_default(),
        web_research: None,
        weather_info: None,
        detected_location: None,
    }
}

/// Research, plan, execute, review.
pub fn fallback_steps(goal: &str) -> Vec<PlanStep> {
    vec![
        step(
            1,
            "Research",
            format!("Gather background information and requirements for: {goal}"),
            "2 hours",
            Some(vec![goal.to_owned()]),
        ),
        step(
            2,
            "Plan",
            format!("Outline the approach, resources and timeline needed to {goal}"),
            "1 hour",
            Some(vec![format!("how to {goal}")]),
        ),
        step(
            3,
            "Execute",
            format!("Carry out the planned actions for: {goal}"),
            "3 hours",
            None,
        ),
        step(
            4,
            "Review",
            "Check the results against the goal and note what to adjust next time".to_owned(),
            "30 minutes",
            None,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_four_steps() {
        let a = fallback_steps("Learn to juggle");
        let b = fallback_steps("Learn to juggle");
        assert_eq!(a, b);

        let titles: Vec<&str> = a.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Research", "Plan", "Execute", "Review"]);
        let numbers: Vec<i64> = a.iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn research_steps_carry_topics() {
        let steps = fallback_steps("Learn to juggle");
        assert!(steps[0].requires_research);
        assert_eq!(steps[0].research_topics, vec!["Learn to juggle"]);
        assert_eq!(steps[1].research_topics, vec!["how to Learn to juggle"]);
        assert!(!steps[2].requires_research);
        assert!(steps[3].research_topics.is_empty());
    }
}
