//! Report rendering seam
//!
//! The real report template lives outside this crate. [`BasicReportRenderer`]
//! is a minimal stand-in: it embeds the results as JSON and links the
//! session's other runs.

use std::fmt::Write as _;

use serde_json::Value;

use crate::experiment::{RelatedRuns, RunSummary};
use crate::Result;

/// Context tag marking reports served by an experiment host.
pub const DEFAULT_REPORT_CONTEXT: &str = "perf-x";

/// Turns one run's results into an HTML page.
pub trait ReportRenderer: Send + Sync {
    /// Render `results`, linking `related` runs. Must be a pure function of
    /// its inputs.
    ///
    /// # Errors
    ///
    /// Returns error if the results cannot be rendered
    fn render(&self, results: &Value, related: &RelatedRuns, context_tag: &str) -> Result<String>;
}

/// Minimal HTML report.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicReportRenderer;

impl ReportRenderer for BasicReportRenderer {
    fn render(&self, results: &Value, related: &RelatedRuns, context_tag: &str) -> Result<String> {
        let url = results.get("url").and_then(Value::as_str).unwrap_or_default();
        let generated = results
            .get("generatedTime")
            .and_then(Value::as_str)
            .unwrap_or_default();
        // `</` would close the script element early
        let payload = serde_json::to_string(results)?.replace("</", "<\\/");

        let mut html = String::with_capacity(payload.len() + 1024);
        html.push_str("<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
        let _ = writeln!(html, "<title>Performance report: {}</title>", escape_html(url));
        html.push_str("</head>\n");
        let _ = writeln!(
            html,
            "<body class=\"report-body\" data-report-context=\"{}\">",
            escape_html(context_tag)
        );
        let _ = writeln!(
            html,
            "<header><h1>{}</h1><p>Generated {}</p></header>",
            escape_html(url),
            escape_html(generated)
        );
        push_run_list(&mut html, "previous-reports", "Previous reports", &related.earlier);
        push_run_list(&mut html, "following-reports", "Following reports", &related.later);
        let _ = writeln!(
            html,
            "<script id=\"report-results\" type=\"application/json\">{payload}</script>"
        );
        html.push_str("</body>\n</html>\n");
        Ok(html)
    }
}

fn push_run_list(html: &mut String, class: &str, title: &str, runs: &[RunSummary]) {
    if runs.is_empty() {
        return;
    }
    let _ = writeln!(html, "<nav class=\"{class}\"><h2>{title}</h2><ul>");
    for run in runs {
        let _ = writeln!(
            html,
            "<li><a href=\"{}\">{}</a> <span>{}</span></li>",
            escape_html(&run.report_url),
            escape_html(&run.generated_time),
            escape_html(&run.url)
        );
    }
    html.push_str("</ul></nav>\n");
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
