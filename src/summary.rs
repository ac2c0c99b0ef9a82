use std::collections::HashMap;
use std::hash::Hash;
use chrono::{DateTime, Local};
use serde::Serialize;
use crate::knowledge::{self, KnowledgeEntry, DISK_IO_ERROR, DISK_WARNING, FAILED_LOGON, UNEXPECTED_SHUTDOWN};
use crate::reader::Event;
use crate::severity::Severity;

pub const TOP_EVENT_IDS: usize = 10;
pub const TOP_WARNINGS: usize = 15;
pub const TOP_SOURCES: usize = 10;
pub const HIGH_ERROR_THRESHOLD: usize = 10;
pub const FAILED_LOGON_THRESHOLD: usize = 5;
pub const TEXT_EXCERPT_CHARS: usize = 300;
pub const HTML_EXCERPT_CHARS: usize = 500;

pub const GENERAL_ADVICE: [&str; 5] = [
    "Keep Windows Update current",
    "Keep device drivers up to date",
    "Back up your data regularly",
    "Monitor component temperatures",
    "Clean up temporary files (Disk Cleanup)",
];

/// Run metadata shown in report headers.
#[derive(Clone, Debug, Serialize)]
pub struct ReportContext {
    pub generated_at: DateTime<Local>,
    pub hours_back: u32,
    pub log_sources: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SeverityCount {
    pub severity: Severity,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IdCount {
    pub event_id: u32,
    pub count: usize,
    pub description: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NamedCount {
    pub name: String,
    pub count: usize,
}

/// Critical and error events sharing one identifier.
#[derive(Clone, Debug, Serialize)]
pub struct IncidentGroup {
    pub event_id: u32,
    /// Severity, source and log of the first event in encounter order.
    pub severity: Severity,
    pub count: usize,
    pub source: String,
    pub log_name: String,
    /// Latest timestamp in the group.
    pub last_seen: DateTime<Local>,
    pub knowledge: KnowledgeEntry,
    pub sample_message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recommendation {
    CriticalEvents { count: usize },
    HighErrorVolume { count: usize },
    UnexpectedShutdown,
    DiskFailure,
    FailedLogons { count: usize },
    Stable,
}

impl Recommendation {
    pub fn message(&self) -> String {
        match self {
            Recommendation::CriticalEvents { count } => format!("URGENT: {} critical events detected! Review and resolve these problems immediately.", count),
            Recommendation::HighErrorVolume { count } => format!("High number of errors ({}). System maintenance is recommended.", count),
            Recommendation::UnexpectedShutdown => "Unexpected system shutdowns detected. Check power stability and component temperatures.".to_string(),
            Recommendation::DiskFailure => "WARNING: Disk problems detected! Back up your data NOW and check the drive's health!".to_string(),
            Recommendation::FailedLogons { count } => format!("{} failed logon attempts detected. Review the Security log for possible intrusion attempts.", count),
            Recommendation::Stable => "The system is stable. No serious problems requiring immediate attention were found.".to_string(),
        }
    }

    pub fn is_alert(&self) -> bool { !matches!(self, Recommendation::Stable) }
}

/// Every aggregate both renderers show, computed once.
#[derive(Clone, Debug, Serialize)]
pub struct ReportSummary {
    pub context: ReportContext,
    pub total: usize,
    /// Only severities that occur, most severe first.
    pub severity_histogram: Vec<SeverityCount>,
    pub top_event_ids: Vec<IdCount>,
    pub critical_error_count: usize,
    pub incident_groups: Vec<IncidentGroup>,
    pub warning_count: usize,
    pub top_warnings: Vec<IdCount>,
    pub by_source: Vec<NamedCount>,
    pub by_log: Vec<NamedCount>,
    pub recommendations: Vec<Recommendation>,
    pub general_advice: Vec<&'static str>,
}

/// Counts keys, ordered by count descending; ties keep first-encounter order.
fn ranked<K, I>(keys: I) -> Vec<(K, usize)>
where K: Eq + Hash + Clone, I: IntoIterator<Item = K> {
    let mut order: Vec<(K, usize)> = Vec::new();
    let mut index: HashMap<K, usize> = HashMap::new();
    for k in keys {
        match index.get(&k) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(k.clone(), order.len());
                order.push((k, 1));
            }
        }
    }
    order.sort_by(|a, b| b.1.cmp(&a.1));
    order
}

fn id_counts(ranked: Vec<(u32, usize)>, cap: usize) -> Vec<IdCount> {
    ranked.into_iter().take(cap).map(|(event_id, count)| IdCount { event_id, count, description: knowledge::description(event_id) }).collect()
}

fn incident_groups(events: &[Event]) -> Vec<IncidentGroup> {
    let mut groups: Vec<(u32, Vec<&Event>)> = Vec::new();
    let mut index: HashMap<u32, usize> = HashMap::new();
    for e in events.iter().filter(|e| e.severity.is_at_least(Severity::Error)) {
        match index.get(&e.event_id) {
            Some(&i) => groups[i].1.push(e),
            None => {
                index.insert(e.event_id, groups.len());
                groups.push((e.event_id, vec![e]));
            }
        }
    }
    groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    groups.into_iter().map(|(event_id, members)| {
        let first = members[0];
        IncidentGroup {
            event_id,
            severity: first.severity,
            count: members.len(),
            source: first.source.clone(),
            log_name: first.log_name.clone(),
            last_seen: members.iter().map(|e| e.time).max().unwrap_or(first.time),
            knowledge: knowledge::get(event_id),
            sample_message: first.message.clone(),
        }
    }).collect()
}

pub fn recommendations(severity_counts: &HashMap<Severity, usize>, id_counts: &HashMap<u32, usize>) -> Vec<Recommendation> {
    let mut out = Vec::new();
    let critical = severity_counts.get(&Severity::Critical).copied().unwrap_or(0);
    let errors = severity_counts.get(&Severity::Error).copied().unwrap_or(0);
    let failed_logons = id_counts.get(&FAILED_LOGON).copied().unwrap_or(0);
    if critical > 0 { out.push(Recommendation::CriticalEvents { count: critical }); }
    if errors > HIGH_ERROR_THRESHOLD { out.push(Recommendation::HighErrorVolume { count: errors }); }
    if id_counts.contains_key(&UNEXPECTED_SHUTDOWN) { out.push(Recommendation::UnexpectedShutdown); }
    if id_counts.contains_key(&DISK_IO_ERROR) || id_counts.contains_key(&DISK_WARNING) { out.push(Recommendation::DiskFailure); }
    if failed_logons > FAILED_LOGON_THRESHOLD { out.push(Recommendation::FailedLogons { count: failed_logons }); }
    if out.is_empty() { out.push(Recommendation::Stable); }
    out
}

impl ReportSummary {
    /// `events` should already be in analyzer order; groups and ranks are
    /// stable with respect to it.
    pub fn build(events: &[Event], context: ReportContext) -> ReportSummary {
        let total = events.len();
        let by_severity: HashMap<Severity, usize> = ranked(events.iter().map(|e| e.severity)).into_iter().collect();
        let severity_histogram = Severity::ALL.iter()
            .filter_map(|s| by_severity.get(s).map(|&count| SeverityCount { severity: *s, count, percentage: count as f64 * 100.0 / total as f64 }))
            .collect();
        let by_id = ranked(events.iter().map(|e| e.event_id));
        let id_map: HashMap<u32, usize> = by_id.iter().copied().collect();
        let warnings = ranked(events.iter().filter(|e| e.severity == Severity::Warning).map(|e| e.event_id));
        let recommendations = recommendations(&by_severity, &id_map);
        ReportSummary {
            total,
            severity_histogram,
            top_event_ids: id_counts(by_id, TOP_EVENT_IDS),
            critical_error_count: events.iter().filter(|e| e.severity.is_at_least(Severity::Error)).count(),
            incident_groups: incident_groups(events),
            warning_count: by_severity.get(&Severity::Warning).copied().unwrap_or(0),
            top_warnings: id_counts(warnings, TOP_WARNINGS),
            by_source: ranked(events.iter().map(|e| e.source.clone())).into_iter().take(TOP_SOURCES).map(|(name, count)| NamedCount { name, count }).collect(),
            by_log: ranked(events.iter().map(|e| e.log_name.clone())).into_iter().map(|(name, count)| NamedCount { name, count }).collect(),
            recommendations,
            general_advice: GENERAL_ADVICE.to_vec(),
            context,
        }
    }

    pub fn is_empty(&self) -> bool { self.total == 0 }

    /// Incident groups whose event ID has no curated knowledge entry.
    pub fn uncurated_groups(&self) -> usize {
        self.incident_groups.iter().filter(|g| !knowledge::is_known(g.event_id)).count()
    }

    pub fn has_alerts(&self) -> bool { self.recommendations.iter().any(Recommendation::is_alert) }

    pub fn count_of(&self, severity: Severity) -> usize {
        self.severity_histogram.iter().find(|c| c.severity == severity).map(|c| c.count).unwrap_or(0)
    }
}

/// First `n` characters, with `...` only when something was cut.
pub fn excerpt(s: &str, n: usize) -> String {
    let mut out: String = s.chars().take(n).collect();
    if s.chars().nth(n).is_some() { out.push_str("..."); }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn at(h: u32, m: u32) -> DateTime<Local> { Local.with_ymd_and_hms(2025, 11, 30, h, m, 0).unwrap() }

    pub(crate) fn ev(id: u32, severity: Severity, time: DateTime<Local>) -> Event {
        Event { log_name: "System".to_string(), event_id: id, source: "Test".to_string(), time, severity, message: format!("message for {}", id), category: 0 }
    }

    pub(crate) fn ctx() -> ReportContext {
        ReportContext { generated_at: at(12, 0), hours_back: 24, log_sources: vec!["System".to_string(), "Application".to_string()] }
    }

    #[test]
    fn unexpected_shutdown_fires_two_advisories() {
        let s = ReportSummary::build(&[ev(UNEXPECTED_SHUTDOWN, Severity::Critical, at(11, 0))], ctx());
        assert!(s.recommendations.contains(&Recommendation::UnexpectedShutdown));
        assert!(s.recommendations.contains(&Recommendation::CriticalEvents { count: 1 }));
        assert!(!s.recommendations.contains(&Recommendation::Stable));
        assert!(s.has_alerts());
    }

    #[test]
    fn failed_logon_boundary_is_more_than_five() {
        let six: Vec<Event> = (0..6).map(|i| ev(FAILED_LOGON, Severity::Warning, at(11, i))).collect();
        let s = ReportSummary::build(&six, ctx());
        assert!(s.recommendations.contains(&Recommendation::FailedLogons { count: 6 }));
        assert!(s.recommendations[0].message().contains('6'));
        let s = ReportSummary::build(&six[..5], ctx());
        assert!(!s.recommendations.iter().any(|r| matches!(r, Recommendation::FailedLogons { .. })));
        assert_eq!(s.recommendations, vec![Recommendation::Stable]);
    }

    #[test]
    fn equal_groups_keep_encounter_order() {
        let s = ReportSummary::build(&[ev(7000, Severity::Error, at(11, 0)), ev(1000, Severity::Error, at(10, 0))], ctx());
        let ids: Vec<u32> = s.incident_groups.iter().map(|g| g.event_id).collect();
        assert_eq!(ids, vec![7000, 1000]);
    }

    #[test]
    fn groups_sorted_by_size_and_use_latest_time() {
        let events = vec![
            ev(6008, Severity::Critical, at(9, 0)),
            ev(7000, Severity::Error, at(11, 0)),
            ev(7000, Severity::Error, at(10, 0)),
            ev(6008, Severity::Error, at(11, 30)),
            ev(6008, Severity::Error, at(8, 0)),
            ev(51, Severity::Warning, at(11, 0)),
        ];
        let s = ReportSummary::build(&events, ctx());
        assert_eq!(s.critical_error_count, 5);
        let g = &s.incident_groups[0];
        assert_eq!((g.event_id, g.count, g.severity), (6008, 3, Severity::Critical));
        assert_eq!(g.last_seen, at(11, 30));
        assert!(g.knowledge.known);
        assert_eq!(s.incident_groups[1].event_id, 7000);
        assert_eq!(s.incident_groups.len(), 2);
    }

    #[test]
    fn histogram_percentages_sum_to_100() {
        let events = vec![
            ev(1, Severity::Critical, at(11, 0)),
            ev(2, Severity::Error, at(11, 0)),
            ev(3, Severity::Warning, at(11, 0)),
            ev(4, Severity::Warning, at(11, 0)),
            ev(5, Severity::Information, at(11, 0)),
            ev(6, Severity::Information, at(11, 0)),
        ];
        let s = ReportSummary::build(&events, ctx());
        let sum: f64 = s.severity_histogram.iter().map(|c| c.percentage).sum();
        assert!((sum - 100.0).abs() < 1e-6);
        let order: Vec<Severity> = s.severity_histogram.iter().map(|c| c.severity).collect();
        assert_eq!(order, Severity::ALL.to_vec());
    }

    #[test]
    fn counts_groups_without_curated_entry() {
        let events = vec![ev(6008, Severity::Critical, at(11, 0)), ev(9999, Severity::Error, at(10, 0)), ev(9999, Severity::Error, at(9, 0))];
        let s = ReportSummary::build(&events, ctx());
        assert_eq!(s.incident_groups.len(), 2);
        assert_eq!(s.uncurated_groups(), 1);
        assert!(!s.incident_groups[0].knowledge.known);
    }

    #[test]
    fn ranked_lists_are_capped_and_stable() {
        let mut events = Vec::new();
        for id in 100..130u32 { events.push(ev(id, Severity::Warning, at(11, 0))); }
        events.push(ev(129, Severity::Warning, at(10, 0)));
        let s = ReportSummary::build(&events, ctx());
        assert_eq!(s.top_event_ids.len(), TOP_EVENT_IDS);
        assert_eq!(s.top_warnings.len(), TOP_WARNINGS);
        assert_eq!(s.top_event_ids[0].event_id, 129);
        let rest: Vec<u32> = s.top_warnings[1..].iter().map(|c| c.event_id).collect();
        assert_eq!(rest, (100..114).collect::<Vec<u32>>());
        for w in s.top_warnings.windows(2) { assert!(w[0].count >= w[1].count); }
    }

    #[test]
    fn disk_and_error_volume_advisories() {
        let mut events: Vec<Event> = (0..11).map(|i| ev(1000, Severity::Error, at(11, i))).collect();
        events.push(ev(DISK_WARNING, Severity::Warning, at(10, 0)));
        let s = ReportSummary::build(&events, ctx());
        assert_eq!(s.recommendations, vec![Recommendation::HighErrorVolume { count: 11 }, Recommendation::DiskFailure]);
        let s = ReportSummary::build(&events[..10], ctx());
        assert_eq!(s.recommendations, vec![Recommendation::Stable]);
        assert!(!s.has_alerts());
    }

    #[test]
    fn empty_input_builds() {
        let s = ReportSummary::build(&[], ctx());
        assert!(s.is_empty());
        assert!(s.severity_histogram.is_empty());
        assert_eq!(s.recommendations, vec![Recommendation::Stable]);
        assert_eq!(s.general_advice.len(), 5);
    }

    #[test]
    fn excerpt_marks_truncation_only() {
        assert_eq!(excerpt("short", 300), "short");
        assert_eq!(excerpt("abcdef", 3), "abc...");
        assert_eq!(excerpt("abc", 3), "abc");
    }

    #[test]
    fn source_and_log_counts() {
        let mut a = ev(1, Severity::Error, at(11, 0));
        a.log_name = "Application".to_string();
        a.source = "App".to_string();
        let s = ReportSummary::build(&[ev(2, Severity::Error, at(11, 0)), a.clone(), a], ctx());
        assert_eq!(s.by_source[0], NamedCount { name: "App".to_string(), count: 2 });
        assert_eq!(s.by_log[0].name, "Application");
        assert_eq!(s.by_log[1], NamedCount { name: "System".to_string(), count: 1 });
    }
}
