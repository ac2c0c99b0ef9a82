use std::fmt::Write as _;
use crate::summary::{excerpt, IdCount, ReportSummary, TEXT_EXCERPT_CHARS};

const WIDTH: usize = 80;
pub const TITLE: &str = "WINDOWS EVENT LOG ANALYSIS REPORT";
pub const NO_EVENTS: &str = "No events found to analyze.";
const TIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

fn banner(out: &mut String, ch: char, title: &str) {
    let rule: String = std::iter::repeat_n(ch, WIDTH).collect();
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}", rule);
}

fn id_lines(out: &mut String, rows: &[IdCount], indent: &str, counts_as_times: bool) {
    for r in rows {
        if counts_as_times {
            let _ = writeln!(out, "{}Event ID {:5} ({:3}x) : {}", indent, r.event_id, r.count, r.description);
        } else {
            let _ = writeln!(out, "{}Event ID {:5} : {:4} occurrences - {}", indent, r.event_id, r.count, r.description);
        }
    }
}

/// Plain-text report. Deterministic for a given summary.
pub fn render_text(rep: &ReportSummary) -> String {
    let mut s = String::new();
    banner(&mut s, '=', TITLE);
    let _ = writeln!(s, "Generated: {}", rep.context.generated_at.format(TIME_FMT));
    let _ = writeln!(s, "Period: last {} hours", rep.context.hours_back);
    let _ = writeln!(s, "Logs analyzed: {}", rep.context.log_sources.join(", "));
    s.push('\n');
    if rep.is_empty() {
        let _ = writeln!(s, "{}", NO_EVENTS);
        s.push('\n');
        banner(&mut s, '=', "END OF REPORT");
        return s;
    }

    banner(&mut s, '-', "STATISTICS SUMMARY");
    let _ = writeln!(s, "Total events: {}", rep.total);
    s.push('\n');
    let _ = writeln!(s, "By severity:");
    for c in &rep.severity_histogram {
        let _ = writeln!(s, "  {:15} : {:6} ({:5.1}%)", c.severity.name(), c.count, c.percentage);
    }
    s.push('\n');

    banner(&mut s, '-', "TOP 10 MOST FREQUENT EVENTS (Event ID)");
    id_lines(&mut s, &rep.top_event_ids, "", false);
    s.push('\n');

    banner(&mut s, '-', "EVENTS BY SOURCE");
    for c in &rep.by_source { let _ = writeln!(s, "  {:40} : {:6}", c.name, c.count); }
    s.push('\n');
    let _ = writeln!(s, "By log:");
    for c in &rep.by_log { let _ = writeln!(s, "  {:40} : {:6}", c.name, c.count); }
    s.push('\n');

    if !rep.incident_groups.is_empty() {
        banner(&mut s, '-', &format!("DETAILED ANALYSIS - CRITICAL EVENTS AND ERRORS ({})", rep.critical_error_count));
        s.push('\n');
        for g in &rep.incident_groups {
            let _ = writeln!(s, "{}", "=".repeat(WIDTH));
            let _ = writeln!(s, "Event ID: {}", g.event_id);
            let _ = writeln!(s, "Severity: {}", g.severity.name());
            let _ = writeln!(s, "Occurrences: {}", g.count);
            let _ = writeln!(s, "Source: {}", g.source);
            let _ = writeln!(s, "Log: {}", g.log_name);
            let _ = writeln!(s, "Last seen: {}", g.last_seen.format(TIME_FMT));
            s.push('\n');
            let _ = writeln!(s, "Problem description:");
            let _ = writeln!(s, "  {}", g.knowledge.description);
            s.push('\n');
            let _ = writeln!(s, "Recommended solutions:");
            for (i, step) in g.knowledge.remediation_steps.iter().enumerate() {
                let _ = writeln!(s, "  {}. {}", i + 1, step);
            }
            s.push('\n');
            let _ = writeln!(s, "Sample event message:");
            let _ = writeln!(s, "  {}", excerpt(&g.sample_message, TEXT_EXCERPT_CHARS));
            s.push('\n');
        }
    }

    if rep.warning_count > 0 {
        banner(&mut s, '-', &format!("WARNINGS SUMMARY ({})", rep.warning_count));
        id_lines(&mut s, &rep.top_warnings, "  ", true);
        s.push('\n');
    }

    banner(&mut s, '-', "FINAL RECOMMENDATIONS");
    for r in &rep.recommendations {
        let mark = if r.is_alert() { "[!]" } else { "[OK]" };
        let _ = writeln!(s, "  {} {}", mark, r.message());
        s.push('\n');
    }
    let _ = writeln!(s, "General maintenance advice:");
    for (i, tip) in rep.general_advice.iter().enumerate() {
        let _ = writeln!(s, "  {}. {}", i + 1, tip);
    }
    s.push('\n');
    banner(&mut s, '=', "END OF REPORT");
    s
}
