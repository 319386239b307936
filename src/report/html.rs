//! HTML rendering of domain item summaries.

use std::fmt::Write;

use crate::report::compare::ColumnComparison;
use crate::report::summary::{ColumnDetails, Description, Distribution, ItemSummary, format_number};

/// How distributions are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartMode {
    /// Tables only
    None,
    /// Bar charts embedded as inline SVG
    #[default]
    InlineSvg,
}

/// Where a chart's y-axis maximum comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxisScale {
    /// Each chart scales to its own largest bar
    #[default]
    PerScope,
    /// Charts of the same column share the largest bar across scopes
    Global,
}

/// Whether items carry significance tests between surveys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComparisonMode {
    None,
    /// Chi-square or t-test for every pair of surveys
    #[default]
    Pairwise,
}

/// Presentation options of the report
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub title: String,
    pub chart_mode: ChartMode,
    pub axis_scale: AxisScale,
    pub comparisons: ComparisonMode,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            title: "Domain Report".to_string(),
            chart_mode: ChartMode::default(),
            axis_scale: AxisScale::default(),
            comparisons: ComparisonMode::default(),
        }
    }
}

const STYLE: &str = "\
body { font-family: Arial, sans-serif; margin: 20px; }
.domain { margin-bottom: 40px; }
.item { margin-bottom: 20px; }
table { width: 100%; border-collapse: collapse; margin-top: 10px; }
th, td { border: 1px solid #dddddd; text-align: left; padding: 8px; vertical-align: top; }
th { background-color: #f2f2f2; }
.cohort-tabs { display: flex; margin-bottom: 10px; }
.cohort-tab { padding: 10px; cursor: pointer; border: 1px solid #ccc; background-color: #f1f1f1; }
.cohort-tab.active { background-color: #ccc; }
.cohort-content { display: none; }
.cohort-content.active { display: block; }
";

const SCRIPT: &str = "\
function showCohort(item, id, element) {
  document.querySelectorAll('[data-item=\"' + item + '\"].cohort-content').forEach(function (c) { c.classList.remove('active'); });
  document.querySelectorAll('[data-item=\"' + item + '\"].cohort-tab').forEach(function (t) { t.classList.remove('active'); });
  document.getElementById(id).classList.add('active');
  element.classList.add('active');
}
";

const CHART_WIDTH: usize = 480;
const CHART_HEIGHT: usize = 200;
const LABEL_HEIGHT: usize = 40;

/// Escape text for HTML content and attribute values
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render the whole report as one HTML document
#[must_use]
pub fn render_report(summaries: &[ItemSummary], options: &ReportOptions) -> String {
    let mut html = String::new();
    let title = escape_html(&options.title);

    let _ = writeln!(html, "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">");
    let _ = writeln!(html, "<title>{title}</title>");
    let _ = writeln!(html, "<style>\n{STYLE}</style>\n<script>\n{SCRIPT}</script>\n</head>\n<body>");
    let _ = writeln!(html, "<h1>{title}</h1>");

    let mut current_domain: Option<&str> = None;
    for (index, summary) in summaries.iter().enumerate() {
        if current_domain != Some(summary.domain.as_str()) {
            if current_domain.is_some() {
                html.push_str("</div>\n");
            }
            let _ = writeln!(
                html,
                "<div class=\"domain\">\n<h2>Domain: {}</h2>",
                escape_html(&summary.domain)
            );
            current_domain = Some(summary.domain.as_str());
        }
        render_item(&mut html, index + 1, summary, options);
    }
    if current_domain.is_some() {
        html.push_str("</div>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn render_item(html: &mut String, index: usize, summary: &ItemSummary, options: &ReportOptions) {
    let _ = writeln!(
        html,
        "<div class=\"item\">\n<h3>Item: {}</h3>\n<div class=\"cohort-tabs\">",
        escape_html(&summary.item)
    );
    for (position, (scope, _)) in summary.scopes.iter().enumerate() {
        let active = if position == 0 { " active" } else { "" };
        let _ = writeln!(
            html,
            "<div class=\"cohort-tab{active}\" data-item=\"{index}\" onclick=\"showCohort('{index}', 'item-{index}-scope-{position}', this)\">{}</div>",
            escape_html(scope)
        );
    }
    html.push_str("</div>\n");

    let global_max: Vec<usize> = (0..summary.columns.len())
        .map(|column| {
            summary
                .scopes
                .iter()
                .filter_map(|(_, distributions)| distributions.get(column))
                .map(Distribution::max_count)
                .max()
                .unwrap_or(0)
        })
        .collect();

    for (position, (scope, distributions)) in summary.scopes.iter().enumerate() {
        let active = if position == 0 { " active" } else { "" };
        let _ = writeln!(
            html,
            "<div id=\"item-{index}-scope-{position}\" class=\"cohort-content{active}\" data-item=\"{index}\">\n<h4>{}</h4>",
            escape_html(scope)
        );
        html.push_str("<table>\n<tr><th>Column Name</th><th>Label</th><th>Type</th><th>Value Labels</th><th>Distribution Summary</th></tr>\n");

        for (column, (details, distribution)) in summary.columns.iter().zip(distributions).enumerate() {
            let y_max = match options.axis_scale {
                AxisScale::PerScope => distribution.max_count(),
                AxisScale::Global => global_max[column],
            };
            render_row(html, details, distribution, options.chart_mode, y_max);
        }
        html.push_str("</table>\n</div>\n");
    }

    if !summary.comparisons.is_empty() {
        render_comparisons(html, &summary.comparisons);
    }
    html.push_str("</div>\n");
}

fn render_comparisons(html: &mut String, comparisons: &[ColumnComparison]) {
    html.push_str("<h4>Pairwise Comparisons</h4>\n<table class=\"comparisons\">\n<tr><th>Column Name</th>");
    for (pair, _) in comparisons.first().map_or(&[][..], |c| c.results.as_slice()) {
        let _ = write!(html, "<th>{}</th>", escape_html(pair));
    }
    html.push_str("</tr>\n");

    for comparison in comparisons {
        let _ = write!(html, "<tr><td>{}</td>", escape_html(&comparison.column));
        for (_, result) in &comparison.results {
            match result {
                Some(test) => {
                    let _ = write!(html, "<td>{test}</td>");
                }
                None => html.push_str("<td>n/a</td>"),
            }
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n");
}

fn render_row(
    html: &mut String,
    details: &ColumnDetails,
    distribution: &Distribution,
    chart_mode: ChartMode,
    y_max: usize,
) {
    let _ = write!(
        html,
        "<tr><td>{}</td><td>{}</td><td>{}</td><td>",
        escape_html(&details.column),
        escape_html(&details.label),
        escape_html(&details.field_type)
    );
    if !details.value_labels.is_empty() {
        html.push_str("<ul>");
        for (code, label) in &details.value_labels {
            let _ = write!(html, "<li>{}: {}</li>", escape_html(code), escape_html(label));
        }
        html.push_str("</ul>");
    }
    html.push_str("</td><td>");

    match distribution {
        Distribution::Empty => html.push_str("No data"),
        Distribution::Counts(counts) => {
            render_counts(html, counts);
            if chart_mode == ChartMode::InlineSvg {
                html.push_str(&bar_chart_svg(counts, y_max));
            }
        }
        Distribution::Numeric {
            description,
            histogram,
        } => {
            render_description(html, description);
            if chart_mode == ChartMode::InlineSvg {
                html.push_str(&bar_chart_svg(histogram, y_max));
            }
        }
    }
    html.push_str("</td></tr>\n");
}

fn render_counts(html: &mut String, counts: &[(String, usize)]) {
    html.push_str("<ul>");
    for (label, count) in counts {
        let _ = write!(html, "<li>{}: {count}</li>", escape_html(label));
    }
    html.push_str("</ul>");
}

fn render_description(html: &mut String, description: &Description) {
    let std = description.std.map_or_else(|| "-".to_string(), format_number);
    let rows = [
        ("count", description.count.to_string()),
        ("mean", format_number(description.mean)),
        ("std", std),
        ("min", format_number(description.min)),
        ("25%", format_number(description.q1)),
        ("50%", format_number(description.median)),
        ("75%", format_number(description.q3)),
        ("max", format_number(description.max)),
    ];
    html.push_str("<ul>");
    for (name, value) in rows {
        let _ = write!(html, "<li>{name}: {value}</li>");
    }
    html.push_str("</ul>");
}

/// Vertical bar chart as an inline SVG element
#[must_use]
pub fn bar_chart_svg(bars: &[(String, usize)], y_max: usize) -> String {
    if bars.is_empty() {
        return String::new();
    }
    let y_max = y_max.max(bars.iter().map(|(_, count)| *count).max().unwrap_or(0)).max(1);
    let slot = CHART_WIDTH / bars.len().max(1);
    let bar_width = (slot * 4 / 5).max(1);

    let mut svg = String::new();
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{CHART_WIDTH}\" height=\"{}\" role=\"img\">",
        CHART_HEIGHT + LABEL_HEIGHT
    );
    for (i, (label, count)) in bars.iter().enumerate() {
        let height = count * CHART_HEIGHT / y_max;
        let x = i * slot + (slot - bar_width) / 2;
        let y = CHART_HEIGHT - height;
        let label = escape_html(label);
        let _ = write!(
            svg,
            "<rect x=\"{x}\" y=\"{y}\" width=\"{bar_width}\" height=\"{height}\" fill=\"skyblue\"><title>{label}: {count}</title></rect>"
        );
        let _ = write!(
            svg,
            "<text x=\"{}\" y=\"{}\" font-size=\"10\" text-anchor=\"middle\">{}</text>",
            x + bar_width / 2,
            CHART_HEIGHT + 14,
            i + 1
        );
    }
    svg.push_str("</svg>");
    svg
}
