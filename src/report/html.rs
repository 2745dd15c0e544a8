//! Single-page HTML report for one fund's history.

use crate::diff::{Comparison, DiffEntry, latest_diff};
use crate::error::Result;
use crate::metrics::{self, PortfolioSummary, TurnoverSeries};
use crate::options::SummaryOptions;
use crate::snapshot::Snapshot;
use quick_xml::escape::escape;
use std::fs;
use std::path::Path;

/// Number of issuers listed in the weights table.
const WEIGHTS_LIMIT: usize = 20;

const STYLE: &str = "body{font-family:sans-serif;margin:2em}\
table{border-collapse:collapse;margin-bottom:2em}\
th,td{border:1px solid #ccc;padding:4px 8px}\
td.num{text-align:right}\
th{background:#f0f0f0}";

/// Renders the report for a chronological history of one fund.
///
/// Sections that need two filings say so instead of failing when the history
/// is shorter.
///
/// # Errors
///
/// Returns `Form13fError::HistoryOutOfOrder` for an unsorted history.
pub fn render_html(history: &[Snapshot], options: &SummaryOptions) -> Result<String> {
    let turnover = metrics::turnover(history)?;

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");

    let Some(overview) = metrics::overview(history) else {
        html.push_str("<title>13F holdings report</title>\n</head>\n<body>\n");
        html.push_str("<p>No filings.</p>\n</body>\n</html>\n");
        return Ok(html);
    };

    html.push_str(&format!(
        "<title>13F holdings report for CIK {}</title>\n<style>{}</style>\n</head>\n<body>\n",
        overview.fund, STYLE
    ));
    html.push_str(&format!("<h1>13F holdings of CIK {}</h1>\n", overview.fund));

    html.push_str("<h2>Summary</h2>\n<ul>\n");
    html.push_str(&format!(
        "<li>Filings: {} ({} to {})</li>\n",
        overview.filings, overview.first_date, overview.last_date
    ));
    html.push_str(&format!(
        "<li>Latest total value: ${}</li>\n",
        group_digits(overview.latest_value_usd)
    ));
    html.push_str(&format!("<li>Unique issuers: {}</li>\n", overview.unique_issuers));
    html.push_str(&format!(
        "<li>Average position: ${}</li>\n",
        group_digits(overview.average_position_usd.round() as u64)
    ));
    html.push_str(&format!(
        "<li>Top {} concentration: {:.2}%</li>\n</ul>\n",
        options.concentration_top, overview.concentration_pct
    ));

    let summary = match latest_diff(history) {
        Comparison::Ready(diff) => history
            .last()
            .map(|current| metrics::summarize_with(current, &diff, options)),
        Comparison::InsufficientHistory => None,
    };

    match &summary {
        Some(summary) => push_changes(&mut html, summary),
        None => html.push_str(
            "<h2>Position changes</h2>\n<p>Only one filing; nothing to compare against.</p>\n",
        ),
    }

    if let Some(latest) = history.last() {
        push_top_holdings(&mut html, latest, options.top_n);
    }
    push_evolution(&mut html, history);
    push_turnover(&mut html, &turnover);
    if let Some(latest) = history.last() {
        push_weights(&mut html, latest);
    }
    if let Some(summary) = &summary {
        push_movers(&mut html, "Biggest increases", &summary.biggest_increases);
        push_movers(&mut html, "Biggest decreases", &summary.biggest_decreases);
    }

    html.push_str("</body>\n</html>\n");
    Ok(html)
}

pub fn write_html(path: &Path, history: &[Snapshot], options: &SummaryOptions) -> Result<()> {
    fs::write(path, render_html(history, options)?)?;
    Ok(())
}

fn push_changes(html: &mut String, summary: &PortfolioSummary) {
    let counts = &summary.counts;
    html.push_str(&format!(
        "<h2>Position changes since {}</h2>\n<ul>\n",
        summary.previous_date
    ));
    for (label, count) in [
        ("Positions held", counts.total),
        ("New", counts.new),
        ("Closed", counts.closed),
        ("Changed", counts.changed),
        ("Unchanged", counts.unchanged),
        ("Increased", counts.increased),
        ("Decreased", counts.decreased),
    ] {
        html.push_str(&format!("<li>{}: {}</li>\n", label, count));
    }
    html.push_str("</ul>\n");
}

fn push_top_holdings(html: &mut String, latest: &Snapshot, top_n: usize) {
    let total = latest.total_value();
    let mut ranked: Vec<_> = latest.holdings().collect();
    ranked.sort_by_key(|h| std::cmp::Reverse(h.value_thousands));

    html.push_str(&format!("<h2>Top {} holdings ({})</h2>\n", top_n, latest.filing_date()));
    html.push_str(
        "<table>\n<tr><th>Issuer</th><th>Class</th><th>CUSIP</th><th>Value (x$1000)</th><th>Shares</th><th>Weight</th></tr>\n",
    );
    for holding in ranked.into_iter().take(top_n) {
        let weight = if total == 0 {
            0.0
        } else {
            holding.value_thousands as f64 / total as f64 * 100.0
        };
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{:.2}%</td></tr>\n",
            escape(holding.issuer_name.as_str()),
            escape(holding.security_class.as_str()),
            escape(holding.cusip.as_str()),
            group_digits(holding.value_thousands),
            group_digits(holding.shares),
            weight
        ));
    }
    html.push_str("</table>\n");
}

fn push_evolution(html: &mut String, history: &[Snapshot]) {
    html.push_str("<h2>Portfolio evolution</h2>\n<table>\n<tr><th>Filing date</th><th>Total value (x$1000)</th></tr>\n");
    for (date, value) in metrics::value_series(history) {
        html.push_str(&format!(
            "<tr><td>{}</td><td class=\"num\">{}</td></tr>\n",
            date,
            group_digits(value)
        ));
    }
    html.push_str("</table>\n");
}

fn push_turnover(html: &mut String, turnover: &Comparison<TurnoverSeries>) {
    html.push_str("<h2>Turnover</h2>\n");
    let Comparison::Ready(series) = turnover else {
        html.push_str("<p>At least two filings are needed.</p>\n");
        return;
    };
    html.push_str("<table>\n<tr><th>Filing date</th><th>Turnover</th></tr>\n");
    for point in &series.points {
        html.push_str(&format!(
            "<tr><td>{}</td><td class=\"num\">{:.2}%</td></tr>\n",
            point.filing_date, point.turnover_pct
        ));
    }
    html.push_str(&format!(
        "</table>\n<p>Average turnover: {:.2}%</p>\n",
        series.average()
    ));
}

fn push_weights(html: &mut String, latest: &Snapshot) {
    html.push_str(&format!(
        "<h2>Top {} issuers by weight</h2>\n<table>\n<tr><th>Issuer</th><th>Value (x$1000)</th><th>Weight</th></tr>\n",
        WEIGHTS_LIMIT
    ));
    for weight in metrics::weights(latest, WEIGHTS_LIMIT) {
        html.push_str(&format!(
            "<tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{:.2}%</td></tr>\n",
            escape(weight.issuer_name.as_str()),
            group_digits(weight.value),
            weight.pct
        ));
    }
    html.push_str("</table>\n");
}

fn push_movers(html: &mut String, title: &str, entries: &[DiffEntry]) {
    html.push_str(&format!(
        "<h2>{}</h2>\n<table>\n<tr><th>Issuer</th><th>Status</th><th>Value change (x$1000)</th><th>Change</th></tr>\n",
        title
    ));
    for entry in entries {
        let pct = entry
            .value_change_pct
            .map(|pct| format!("{:.2}%", pct))
            .unwrap_or_else(|| "n/a".to_string());
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>\n",
            escape(entry.issuer_name.as_str()),
            entry.status,
            entry.value_change,
            pct
        ));
    }
    html.push_str("</table>\n");
}

/// `1234567` as `1,234,567`.
fn group_digits(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
