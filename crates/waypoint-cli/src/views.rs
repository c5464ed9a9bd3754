//! Server-rendered HTML for the browser views.
//!
//! Every value that came from a user or an upstream provider goes through
//! [`escape`] before it is written into markup.

use std::fmt::Write as _;

use waypoint_db::models::{Plan, PlanPage, PlanStep, PlanSummary};

const STYLE: &str = "body{font-family:system-ui,sans-serif;max-width:56rem;margin:2rem auto;padding:0 1rem;color:#222}\
table{border-collapse:collapse;width:100%}td,th{border-bottom:1px solid #ddd;padding:.4rem;text-align:left}\
.step{border:1px solid #ddd;border-radius:6px;padding:.75rem 1rem;margin:.75rem 0}\
.muted{color:#666;font-size:.9em}.error{color:#b00020}textarea{width:100%}";

/// Escape text for use in element content and quoted attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\
<html><head><meta charset=\"utf-8\"><title>{title} | waypoint</title><style>{STYLE}</style></head><body>\
<nav><a href=\"/\">waypoint</a> | <a href=\"/plans\">All plans</a> | <a href=\"/api/stats\">Stats</a></nav>\
{body}</body></html>",
        title = escape(title),
    )
}

fn summary_rows(plans: &[PlanSummary]) -> String {
    if plans.is_empty() {
        return "<tr><td colspan=\"4\">No plans found.</td></tr>".to_string();
    }
    plans
        .iter()
        .map(|p| {
            format!(
                "<tr><td><a href=\"/plans/{id}\">{goal}</a></td><td>{steps}</td><td>{duration}</td><td>{created}</td></tr>",
                id = p.id,
                goal = escape(&p.goal),
                steps = p.total_steps,
                duration = escape(&p.estimated_total_duration),
                created = p.created_at.format("%Y-%m-%d %H:%M"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn summary_table(plans: &[PlanSummary]) -> String {
    format!(
        "<table><tr><th>Goal</th><th>Steps</th><th>Duration</th><th>Created</th></tr>{}</table>",
        summary_rows(plans)
    )
}

/// Home page: goal form plus the most recent plans.
pub fn home_page(recent: &[PlanSummary], error: Option<&str>, goal: &str) -> String {
    let mut body = String::from("<h1>Plan a goal</h1>");
    if let Some(error) = error {
        let _ = write!(body, "<p class=\"error\">{}</p>", escape(error));
    }
    let _ = write!(
        body,
        "<form method=\"post\" action=\"/plans\">\
<textarea name=\"goal\" rows=\"3\" maxlength=\"500\" placeholder=\"Plan a 3-day trip to Tokyo\">{}</textarea>\
<p><button type=\"submit\">Create plan</button></p></form>",
        escape(goal)
    );
    let _ = write!(body, "<h2>Recent plans</h2>{}", summary_table(recent));
    layout("Home", &body)
}

fn list_href(search: Option<&str>, page: i64, page_size: i64) -> String {
    let mut href = format!("/plans?page={page}&amp;page_size={page_size}");
    if let Some(search) = search {
        let _ = write!(href, "&amp;search={}", urlencoding::encode(search));
    }
    href
}

/// Searchable, paginated list of stored plans.
pub fn plan_list_page(page: &PlanPage, search: Option<&str>) -> String {
    let mut body = String::from("<h1>Plans</h1>");
    let _ = write!(
        body,
        "<form method=\"get\" action=\"/plans\">\
<input type=\"search\" name=\"search\" value=\"{}\" placeholder=\"Search goals\">\
<input type=\"hidden\" name=\"page_size\" value=\"{}\"> <button type=\"submit\">Search</button></form>",
        escape(search.unwrap_or_default()),
        page.page_size,
    );
    let _ = write!(
        body,
        "<p class=\"muted\">{} plan(s){}</p>",
        page.total_count,
        search
            .map(|s| format!(" matching \"{}\"", escape(s)))
            .unwrap_or_default()
    );
    body.push_str(&summary_table(&page.items));

    let total_pages = (page.total_count + page.page_size - 1) / page.page_size;
    if total_pages > 1 {
        body.push_str("<p>");
        if page.page > 1 {
            let _ = write!(
                body,
                "<a href=\"{}\">&laquo; Previous</a> ",
                list_href(search, page.page - 1, page.page_size)
            );
        }
        let _ = write!(body, "Page {} of {}", page.page, total_pages);
        if page.page < total_pages {
            let _ = write!(
                body,
                " <a href=\"{}\">Next &raquo;</a>",
                list_href(search, page.page + 1, page.page_size)
            );
        }
        body.push_str("</p>");
    }
    layout("Plans", &body)
}

fn write_step(out: &mut String, step: &PlanStep) {
    let _ = write!(
        out,
        "<div class=\"step\"><h3>{}. {}</h3><p>{}</p><p class=\"muted\">Estimated: {}</p>",
        step.step_number,
        escape(&step.title),
        escape(&step.description),
        escape(&step.estimated_duration),
    );
    if !step.research_topics.is_empty() {
        let topics: Vec<String> = step.research_topics.iter().map(|t| escape(t)).collect();
        let _ = write!(out, "<p class=\"muted\">Topics: {}</p>", topics.join(", "));
    }
    if let Some(results) = &step.web_research {
        out.push_str("<h4>Research</h4><ul>");
        for r in results {
            let _ = write!(
                out,
                "<li><a href=\"{url}\" rel=\"noopener\">{title}</a> <span class=\"muted\">[{source}]</span><br>{snippet}</li>",
                url = escape(&r.url),
                title = escape(&r.title),
                source = r.source,
                snippet = escape(&r.snippet),
            );
        }
        out.push_str("</ul>");
    }
    if let Some(weather) = &step.weather_info {
        let _ = write!(
            out,
            "<h4>Weather in {}, {} <span class=\"muted\">[{}]</span></h4><p>{}</p>\
<table><tr><th>Date</th><th>High</th><th>Low</th><th>Conditions</th></tr>",
            escape(&weather.location),
            escape(&weather.country),
            weather.source,
            escape(&weather.advice),
        );
        for day in &weather.daily_forecasts {
            let _ = write!(
                out,
                "<tr><td>{}</td><td>{:.1}&deg;C</td><td>{:.1}&deg;C</td><td>{}</td></tr>",
                day.date,
                day.max_temp,
                day.min_temp,
                escape(&day.description),
            );
        }
        out.push_str("</table>");
    }
    out.push_str("</div>");
}

/// Full view of one plan with its enrichment data.
pub fn plan_page(plan: &Plan) -> String {
    let mut body = format!("<h1>{}</h1>", escape(&plan.goal));
    let _ = write!(
        body,
        "<p class=\"muted\">{} steps, about {} | created {} | generated by {}</p>",
        plan.total_steps,
        escape(&plan.estimated_total_duration),
        plan.created_at.format("%Y-%m-%d %H:%M UTC"),
        plan.metadata.ai_provider,
    );
    let _ = write!(
        body,
        "<p>Export: <a href=\"/api/plans/{id}/export/json\">JSON</a> | \
<a href=\"/api/plans/{id}/export/csv\">CSV</a> | \
<a href=\"/api/plans/{id}/export/markdown\">Markdown</a></p>",
        id = plan.id
    );
    for step in &plan.steps {
        write_step(&mut body, step);
    }
    layout(&plan.goal, &body)
}

/// Minimal page for HTML routes that fail.
pub fn error_page(status: u16, message: &str) -> String {
    let body = format!(
        "<h1>Error {status}</h1><p class=\"error\">{}</p><p><a href=\"/\">Back home</a></p>",
        escape(message)
    );
    layout("Error", &body)
}
