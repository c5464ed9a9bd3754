//! Rendering stored plans as JSON, CSV or Markdown.
//!
//! Everything here is a pure function of its inputs.

use std::fmt::{self, Write as _};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use waypoint_db::models::Plan;

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Markdown,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv; charset=utf-8",
            Self::Markdown => "text/markdown; charset=utf-8",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Markdown => "md",
        }
    }

    /// Download filename, e.g. `plan_20250301_120000.md` for one plan or
    /// `plans_3_20250301_120000.csv` for several.
    pub fn filename(self, plan_count: usize, at: DateTime<Utc>) -> String {
        let stamp = at.format("%Y%m%d_%H%M%S");
        if plan_count == 1 {
            format!("plan_{stamp}.{}", self.extension())
        } else {
            format!("plans_{plan_count}_{stamp}.{}", self.extension())
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Markdown => "markdown",
        };
        f.write_str(s)
    }
}

/// Error returned for an unknown format name.
#[derive(Debug, Clone, Error)]
#[error("unsupported export format {0:?} (expected json, csv, or markdown)")]
pub struct ExportFormatParseError(pub String);

impl FromStr for ExportFormat {
    type Err = ExportFormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "markdown" | "md" => Ok(Self::Markdown),
            _ => Err(ExportFormatParseError(s.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Single plan
// ---------------------------------------------------------------------------

/// Render one plan.
///
/// JSON is the canonical stored shape and parses back into a [`Plan`].
pub fn render_plan(plan: &Plan, format: ExportFormat) -> Result<String, serde_json::Error> {
    Ok(match format {
        ExportFormat::Json => serde_json::to_string_pretty(plan)?,
        ExportFormat::Csv => render_csv(std::slice::from_ref(plan)),
        ExportFormat::Markdown => {
            let mut out = String::new();
            write_plan_markdown(&mut out, plan, "#");
            out
        }
    })
}

// ---------------------------------------------------------------------------
// Several plans
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ExportInfo {
    timestamp: DateTime<Utc>,
    format: &'static str,
    total_plans: usize,
}

#[derive(Serialize)]
struct MultiExport<'a> {
    export_info: ExportInfo,
    plans: &'a [Plan],
}

/// Render a batch of plans with an export header.
pub fn render_plans(
    plans: &[Plan],
    format: ExportFormat,
    exported_at: DateTime<Utc>,
) -> Result<String, serde_json::Error> {
    Ok(match format {
        ExportFormat::Json => serde_json::to_string_pretty(&MultiExport {
            export_info: ExportInfo {
                timestamp: exported_at,
                format: "json",
                total_plans: plans.len(),
            },
            plans,
        })?,
        ExportFormat::Csv => render_csv(plans),
        ExportFormat::Markdown => {
            let mut out = String::new();
            let _ = writeln!(out, "# Exported Plans\n");
            let _ = writeln!(
                out,
                "**Export Date:** {}  ",
                exported_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            let _ = writeln!(out, "**Total Plans:** {}\n", plans.len());
            for (i, plan) in plans.iter().enumerate() {
                let _ = writeln!(out, "---\n");
                let _ = writeln!(out, "## Plan {}\n", i + 1);
                write_plan_markdown(&mut out, plan, "###");
            }
            out
        }
    })
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

const CSV_HEADER: &str = "plan_id,goal,created_at,step_number,title,description,\
estimated_duration,requires_research,research_topics,research_results,weather_location";

/// One row per step across all plans.
fn render_csv(plans: &[Plan]) -> String {
    let mut out = String::with_capacity(256);
    out.push_str(CSV_HEADER);
    out.push_str("\r\n");

    for plan in plans {
        let id = plan.id.to_string();
        let created = plan.created_at.to_rfc3339();
        for step in &plan.steps {
            let results = step.web_research.as_ref().map_or(0, Vec::len).to_string();
            let weather = step
                .weather_info
                .as_ref()
                .map(|w| w.location.as_str())
                .unwrap_or_default();
            let fields: [&str; 11] = [
                id.as_str(),
                plan.goal.as_str(),
                created.as_str(),
                &step.step_number.to_string(),
                step.title.as_str(),
                step.description.as_str(),
                step.estimated_duration.as_str(),
                if step.requires_research { "true" } else { "false" },
                &step.research_topics.join("; "),
                results.as_str(),
                weather,
            ];
            let row: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
            out.push_str(&row.join(","));
            out.push_str("\r\n");
        }
    }
    out
}

/// Quote a field when it contains a delimiter, quote, or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}

// ---------------------------------------------------------------------------
// Markdown
// ---------------------------------------------------------------------------

fn yes_no(b: bool) -> &'static str {
    if b { "Yes" } else { "No" }
}

/// Write one plan. `heading` is the marker for the plan title; steps go one
/// level deeper.
fn write_plan_markdown(out: &mut String, plan: &Plan, heading: &str) {
    // Writing into a String cannot fail.
    let _ = writeln!(out, "{heading} {}\n", plan.goal);
    let _ = writeln!(out, "- **ID:** {}", plan.id);
    let _ = writeln!(
        out,
        "- **Created:** {}",
        plan.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "- **Total Steps:** {}", plan.total_steps);
    let _ = writeln!(
        out,
        "- **Estimated Duration:** {}",
        plan.estimated_total_duration
    );
    let _ = writeln!(
        out,
        "- **Has Weather Info:** {}",
        yes_no(plan.metadata.has_weather_info)
    );
    let _ = writeln!(
        out,
        "- **Has Web Research:** {}",
        yes_no(plan.metadata.has_web_research)
    );
    if !plan.metadata.research_topics.is_empty() {
        let _ = writeln!(
            out,
            "- **Research Topics:** {}",
            plan.metadata.research_topics.join(", ")
        );
    }
    let _ = writeln!(out, "- **Generated By:** {}", plan.metadata.ai_provider);
    out.push('\n');

    for step in &plan.steps {
        let _ = writeln!(out, "{heading}# Step {}: {}\n", step.step_number, step.title);
        let _ = writeln!(out, "{}\n", step.description);
        let _ = writeln!(out, "**Estimated Duration:** {}\n", step.estimated_duration);

        if let Some(research) = step.web_research.as_ref().filter(|r| !r.is_empty()) {
            let _ = writeln!(out, "**Research Results:**\n");
            for r in research {
                let _ = writeln!(out, "- [{}]({}): {}", r.title, r.url, r.snippet);
            }
            out.push('\n');
        }

        if let Some(weather) = &step.weather_info {
            let _ = writeln!(out, "**Weather for {}:** {}\n", weather.location, weather.advice);
            for day in &weather.daily_forecasts {
                let _ = writeln!(
                    out,
                    "- {}: {}, {:.1}-{:.1}°C",
                    day.date, day.description, day.min_temp, day.max_temp
                );
            }
            out.push('\n');
        }
    }
}
