use std::fmt::Write as _;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use crate::severity::Severity;
use crate::summary::{excerpt, IdCount, NamedCount, ReportSummary, HTML_EXCERPT_CHARS};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme { #[default] Light, Dark }

const TIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

const BASE_CSS: &str = "body{margin:0;background:var(--bg);color:var(--fg);font-family:Segoe UI,system-ui,-apple-system,Arial,sans-serif} .container{max-width:1200px;margin:0 auto;padding:24px} .header{margin-bottom:16px;padding:20px;border-radius:10px;background:var(--card);border:1px solid var(--border)} .title{font-size:22px;font-weight:600} .sub{color:var(--muted);font-size:13px;margin-top:4px} .grid{display:grid;grid-template-columns:repeat(5,minmax(0,1fr));gap:12px} .card{background:var(--card);border:1px solid var(--border);border-radius:10px;padding:14px} .metric .label{color:var(--muted);font-size:12px} .metric .value{font-size:22px;font-weight:700} .section{margin-top:18px} .section h3{margin:0 0 10px 0;font-size:16px;font-weight:600} .table{width:100%;border-collapse:separate;border-spacing:0;background:var(--card);border:1px solid var(--border);border-radius:10px;overflow:hidden} .table th{text-align:left;font-weight:600;padding:10px;border-bottom:1px solid var(--border);background:var(--head)} .table td{padding:10px;border-bottom:1px solid var(--border);vertical-align:top} .sev-item{display:flex;align-items:center;gap:12px;margin:8px 0;padding-left:10px;border-left:4px solid} .sev-label{width:120px;font-weight:600} .sev-bar{flex:1;background:var(--chip);border-radius:6px;overflow:hidden;height:22px} .sev-fill{height:22px;color:#ffffff;font-size:12px;line-height:22px;padding-left:6px;white-space:nowrap} .sev-count{width:110px;text-align:right;color:var(--muted)} .event-card{background:var(--card);border:1px solid var(--border);border-left:5px solid var(--err);border-radius:10px;padding:14px;margin-bottom:12px} .event-card.critical{border-left-color:#dc3545} .event-card.error{border-left-color:#fd7e14} .event-head{display:flex;justify-content:space-between;align-items:center} .event-id{font-size:18px;font-weight:700} .badge{display:inline-block;padding:4px 10px;border-radius:12px;font-size:12px;font-weight:700;color:#ffffff} .info{display:grid;grid-template-columns:repeat(4,minmax(0,1fr));gap:10px;margin:12px 0} .info .label{color:var(--muted);font-size:12px} .code{font-family:Consolas,Monaco,monospace;background:var(--chip);border:1px solid var(--border);border-radius:8px;padding:10px;margin-top:8px;white-space:pre-wrap} details summary{cursor:pointer;color:var(--accent)} .recs{border-radius:10px;padding:16px;background:var(--alert-bg);border:1px solid var(--alert-border)} .recs.success{background:var(--ok-bg);border-color:var(--ok-border)} .footer{margin-top:22px;color:var(--muted);font-size:12px} @media (max-width:900px){.grid{grid-template-columns:repeat(2,minmax(0,1fr))}.info{grid-template-columns:repeat(2,minmax(0,1fr))}} @media print{body{background:#ffffff}}";

fn palette(theme: Theme) -> &'static str {
    match theme {
        Theme::Light => ":root{--bg:#f7fafc;--fg:#111827;--muted:#6b7280;--card:#ffffff;--border:#e5e7eb;--head:#f3f4f6;--accent:#2563eb;--err:#dc2626;--chip:#eef2f7;--alert-bg:#fff7ed;--alert-border:#fed7aa;--ok-bg:#f0fdf4;--ok-border:#bbf7d0}",
        Theme::Dark => ":root{--bg:#0a0e13;--fg:#ffffff;--muted:#c0c4cc;--card:#0d131a;--border:#243041;--head:#0c1118;--accent:#3b82f6;--err:#ef4444;--chip:#0f172a;--alert-bg:#2a1608;--alert-border:#7c2d12;--ok-bg:#0b2415;--ok-border:#166534}",
    }
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;").replace('\'', "&#39;")
}

fn id_table(s: &mut String, rows: &[IdCount], count_header: &str) {
    let _ = write!(s, "<table class=\"table\"><thead><tr><th>Event ID</th><th>{}</th><th>Description</th></tr></thead><tbody>", count_header);
    for r in rows {
        let _ = write!(s, "<tr><td><strong>{}</strong></td><td>{}</td><td>{}</td></tr>", r.event_id, r.count, html_escape(r.description));
    }
    s.push_str("</tbody></table>");
}

fn named_table(s: &mut String, title: &str, first_header: &str, rows: &[NamedCount]) {
    let _ = write!(s, "<div class=\"card\"><h3>{}</h3><table class=\"table\"><thead><tr><th>{}</th><th>Count</th></tr></thead><tbody>", title, first_header);
    for r in rows { let _ = write!(s, "<tr><td>{}</td><td>{}</td></tr>", html_escape(&r.name), r.count); }
    s.push_str("</tbody></table></div>");
}

fn head(s: &mut String, theme: Theme) {
    s.push_str("<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\"><meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"><title>Windows Event Log Analysis Report</title><style>");
    s.push_str(palette(theme));
    s.push(' ');
    s.push_str(BASE_CSS);
    s.push_str("</style></head><body><div class=\"container\">");
}

fn header(s: &mut String, rep: &ReportSummary) {
    s.push_str("<div class=\"header\"><div class=\"title\">Windows Event Log Analysis Report</div>");
    let _ = write!(s, "<div class=\"sub\">Generated: {}</div>", rep.context.generated_at.format(TIME_FMT));
    let _ = write!(s, "<div class=\"sub\">Period: last {} hours</div>", rep.context.hours_back);
    let _ = write!(s, "<div class=\"sub\">Logs analyzed: {}</div></div>", html_escape(&rep.context.log_sources.join(", ")));
}

fn footer(s: &mut String) { s.push_str("<div class=\"footer\">Generated by EventTriage</div></div></body></html>"); }

/// Self-contained HTML report; no external assets.
pub fn render_html(rep: &ReportSummary, theme: Theme) -> String {
    let mut s = String::new();
    head(&mut s, theme);
    header(&mut s, rep);
    if rep.is_empty() {
        s.push_str("<div class=\"section\"><div class=\"card\"><h3>No events found to analyze.</h3></div></div>");
        footer(&mut s);
        return s;
    }

    s.push_str("<div class=\"section\"><h3>Statistics Summary</h3><div class=\"grid\">");
    let _ = write!(s, "<div class=\"card metric\"><div class=\"value\">{}</div><div class=\"label\">Total events</div></div>", rep.total);
    for c in &rep.severity_histogram {
        let _ = write!(s, "<div class=\"card metric\"><div class=\"value\" style=\"color:{}\">{}</div><div class=\"label\">{}</div></div>", c.severity.html_color(), c.count, c.severity.name());
    }
    s.push_str("</div><div class=\"card\" style=\"margin-top:12px\"><h3>By severity</h3>");
    for c in &rep.severity_histogram {
        let color = c.severity.html_color();
        let _ = write!(s, "<div class=\"sev-item {}\" style=\"border-left-color:{}\"><div class=\"sev-label\">{}</div><div class=\"sev-bar\"><div class=\"sev-fill\" style=\"width:{:.1}%;background-color:{}\">{:.1}%</div></div><div class=\"sev-count\">{} events</div></div>",
            c.severity.css_class(), color, c.severity.name(), c.percentage, color, c.percentage, c.count);
    }
    s.push_str("</div></div>");

    s.push_str("<div class=\"section\"><h3>Top 10 Most Frequent Events</h3>");
    id_table(&mut s, &rep.top_event_ids, "Occurrences");
    s.push_str("</div>");

    s.push_str("<div class=\"section\" style=\"display:grid;grid-template-columns:repeat(2,minmax(0,1fr));gap:12px\">");
    named_table(&mut s, "Top Sources", "Source", &rep.by_source);
    named_table(&mut s, "Events by Log", "Log", &rep.by_log);
    s.push_str("</div>");

    if !rep.incident_groups.is_empty() {
        let _ = write!(s, "<div class=\"section\"><h3>Detailed Analysis - Critical Events and Errors ({})</h3>", rep.critical_error_count);
        for g in &rep.incident_groups {
            let class = if g.severity == Severity::Critical { "critical" } else { "error" };
            let _ = write!(s, "<div class=\"event-card {}\"><div class=\"event-head\"><div class=\"event-id\">Event ID: {}</div><div class=\"badge\" style=\"background-color:{}\">{}</div></div>", class, g.event_id, g.severity.html_color(), g.severity.name());
            s.push_str("<div class=\"info\">");
            let _ = write!(s, "<div><div class=\"label\">Occurrences</div><div>{}</div></div>", g.count);
            let _ = write!(s, "<div><div class=\"label\">Source</div><div>{}</div></div>", html_escape(&g.source));
            let _ = write!(s, "<div><div class=\"label\">Log</div><div>{}</div></div>", html_escape(&g.log_name));
            let _ = write!(s, "<div><div class=\"label\">Last seen</div><div>{}</div></div>", g.last_seen.format(TIME_FMT));
            s.push_str("</div>");
            let _ = write!(s, "<div><strong>Problem description:</strong><br>{}</div>", html_escape(&g.knowledge.description));
            s.push_str("<div style=\"margin-top:10px\"><strong>Recommended solutions:</strong><ol>");
            for step in &g.knowledge.remediation_steps { let _ = write!(s, "<li>{}</li>", html_escape(step)); }
            s.push_str("</ol></div>");
            let _ = write!(s, "<details><summary>Sample event message</summary><div class=\"code\">{}</div></details></div>", html_escape(&excerpt(&g.sample_message, HTML_EXCERPT_CHARS)));
        }
        s.push_str("</div>");
    }

    if rep.warning_count > 0 {
        let _ = write!(s, "<div class=\"section\"><h3>Warnings Summary ({})</h3>", rep.warning_count);
        id_table(&mut s, &rep.top_warnings, "Occurrences");
        s.push_str("</div>");
    }

    let class = if rep.has_alerts() { "recs" } else { "recs success" };
    let _ = write!(s, "<div class=\"section\"><div class=\"{}\"><h3>Final Recommendations</h3><ul>", class);
    for r in &rep.recommendations { let _ = write!(s, "<li>{}</li>", html_escape(&r.message())); }
    s.push_str("</ul><h4>General maintenance advice:</h4><ul>");
    for tip in &rep.general_advice { let _ = write!(s, "<li>{}</li>", html_escape(tip)); }
    s.push_str("</ul></div></div>");
    footer(&mut s);
    s
}
