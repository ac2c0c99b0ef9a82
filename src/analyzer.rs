use std::sync::Arc;
use std::time::Duration as StdDuration;
use chrono::{DateTime, Duration, Local, Utc};
use crate::reader::{read_log_bounded, Event};
use crate::source::{EventLogSource, SourceError};

pub const DEFAULT_HOURS_BACK: u32 = 24;
pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 120;

pub fn default_log_sources() -> Vec<String> { vec!["System".to_string(), "Application".to_string(), "Security".to_string()] }

#[derive(Clone, Debug)]
pub struct AnalyzerConfig {
    pub hours_back: u32,
    pub log_sources: Vec<String>,
    /// `None` reads without a wall-clock bound.
    pub source_timeout: Option<StdDuration>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self { hours_back: DEFAULT_HOURS_BACK, log_sources: default_log_sources(), source_timeout: Some(StdDuration::from_secs(DEFAULT_SOURCE_TIMEOUT_SECS)) }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.hours_back == 0 { anyhow::bail!("hours_back must be at least 1"); }
        if self.log_sources.is_empty() { anyhow::bail!("at least one log source is required"); }
        Ok(())
    }

    pub fn window(&self) -> Duration { Duration::hours(i64::from(self.hours_back)) }

    /// Start of the window ending at `now`. Windows reaching past chrono's
    /// range start at the Unix epoch.
    pub fn not_before(&self, now: DateTime<Local>) -> DateTime<Local> {
        now.checked_sub_signed(self.window())
            .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH.with_timezone(&Local))
    }
}

/// Result of one pass. `failures` names the sources that could not be read.
#[derive(Debug)]
pub struct Analysis {
    pub events: Vec<Event>,
    pub failures: Vec<SourceError>,
    pub not_before: DateTime<Local>,
    pub completed_at: DateTime<Local>,
}

pub enum SourceProgress<'a> {
    Started,
    Finished { count: usize },
    Failed { error: &'a SourceError },
}

pub struct Analyzer {
    config: AnalyzerConfig,
    source: Arc<dyn EventLogSource>,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig, source: Arc<dyn EventLogSource>) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self { config, source })
    }

    pub fn config(&self) -> &AnalyzerConfig { &self.config }

    pub fn analyze(&self) -> Analysis { self.analyze_at(Local::now()) }

    pub fn analyze_at(&self, now: DateTime<Local>) -> Analysis { self.analyze_with(now, |_, _| {}) }

    /// Reads every configured log in order, then sorts most severe first and
    /// newest first within a severity.
    pub fn analyze_with<F>(&self, now: DateTime<Local>, mut observer: F) -> Analysis
    where F: FnMut(&str, SourceProgress<'_>) {
        let not_before = self.config.not_before(now);
        let mut events: Vec<Event> = Vec::new();
        let mut failures = Vec::new();
        for log_name in &self.config.log_sources {
            observer(log_name, SourceProgress::Started);
            let out = read_log_bounded(Arc::clone(&self.source), log_name, not_before, now, self.config.source_timeout);
            let count = out.events.len();
            events.extend(out.events);
            match out.error {
                Some(e) => {
                    observer(log_name, SourceProgress::Failed { error: &e });
                    failures.push(e);
                }
                None => observer(log_name, SourceProgress::Finished { count }),
            }
        }
        sort_events(&mut events);
        log::info!("Collected {} events from {} logs ({} unreadable)", events.len(), self.config.log_sources.len(), failures.len());
        Analysis { events, failures, not_before, completed_at: Local::now() }
    }
}

/// Severity ascending, then time descending. Stable.
pub fn sort_events(events: &mut [Event]) {
    events.sort_by(|a, b| a.severity.cmp(&b.severity).then_with(|| b.time.cmp(&a.time)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::severity::{EVENTLOG_AUDIT_FAILURE, EVENTLOG_ERROR_TYPE, EVENTLOG_INFORMATION_TYPE, EVENTLOG_WARNING_TYPE};
    use crate::source::{MemorySource, RawRecord};

    fn at(h: u32, m: u32) -> DateTime<Local> { Local.with_ymd_and_hms(2025, 11, 30, h, m, 0).unwrap() }

    fn raw(t: DateTime<Local>, id: u32, ty: u16) -> RawRecord {
        RawRecord { time_generated: t.format("%Y-%m-%d %H:%M:%S").to_string(), event_type: ty, event_id: id, source: Some("Test".to_string()), message: Some("m".to_string()), category: 0 }
    }

    fn config(logs: &[&str]) -> AnalyzerConfig {
        AnalyzerConfig { hours_back: 24, log_sources: logs.iter().map(|s| s.to_string()).collect(), source_timeout: None }
    }

    #[test]
    fn failing_source_does_not_abort_pass() {
        let src = MemorySource::new()
            .with_failing("Security")
            .with_log("System", vec![raw(at(11, 0), 1, EVENTLOG_ERROR_TYPE), raw(at(10, 0), 2, EVENTLOG_WARNING_TYPE), raw(at(9, 0), 3, EVENTLOG_INFORMATION_TYPE)]);
        let a = Analyzer::new(config(&["Security", "System"]), Arc::new(src)).unwrap();
        let out = a.analyze_at(at(12, 0));
        assert_eq!(out.events.len(), 3);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].log_name(), "Security");
    }

    #[test]
    fn result_is_sorted_by_severity_then_newest() {
        let src = MemorySource::new()
            .with_log("System", vec![raw(at(11, 50), 10, EVENTLOG_INFORMATION_TYPE), raw(at(11, 0), 11, EVENTLOG_ERROR_TYPE), raw(at(10, 0), 12, EVENTLOG_ERROR_TYPE)])
            .with_log("Security", vec![raw(at(11, 30), 4625, EVENTLOG_AUDIT_FAILURE), raw(at(11, 20), 13, EVENTLOG_WARNING_TYPE)])
            .with_log("Application", vec![raw(at(11, 40), 14, EVENTLOG_ERROR_TYPE)]);
        let a = Analyzer::new(config(&["System", "Application", "Security"]), Arc::new(src)).unwrap();
        let ev = a.analyze_at(at(12, 0)).events;
        for w in ev.windows(2) {
            assert!(w[0].severity <= w[1].severity);
            if w[0].severity == w[1].severity { assert!(w[0].time >= w[1].time); }
        }
        let ids: Vec<u32> = ev.iter().map(|e| e.event_id).collect();
        assert_eq!(ids, vec![4625, 14, 11, 12, 13, 10]);
    }

    #[test]
    fn window_is_hours_back_from_now() {
        let src = MemorySource::new().with_log("System", vec![raw(at(11, 0), 1, EVENTLOG_ERROR_TYPE), raw(at(9, 59), 2, EVENTLOG_ERROR_TYPE)]);
        let mut cfg = config(&["System"]);
        cfg.hours_back = 2;
        let out = Analyzer::new(cfg, Arc::new(src)).unwrap().analyze_at(at(12, 0));
        assert_eq!(out.not_before, at(10, 0));
        assert_eq!(out.events.len(), 1);
    }

    #[test]
    fn observer_sees_each_source() {
        let src = MemorySource::new().with_log("System", vec![raw(at(11, 0), 1, EVENTLOG_ERROR_TYPE)]);
        let a = Analyzer::new(config(&["System", "Missing"]), Arc::new(src)).unwrap();
        let mut seen = Vec::new();
        a.analyze_with(at(12, 0), |name, p| seen.push(match p {
            SourceProgress::Started => format!("{} started", name),
            SourceProgress::Finished { count } => format!("{} {}", name, count),
            SourceProgress::Failed { .. } => format!("{} failed", name),
        }));
        assert_eq!(seen, vec!["System started", "System 1", "Missing started", "Missing failed"]);
    }

    #[test]
    fn validate_rejects_bad_config() {
        assert!(AnalyzerConfig::default().validate().is_ok());
        assert!(AnalyzerConfig { hours_back: 0, ..Default::default() }.validate().is_err());
        assert!(AnalyzerConfig { log_sources: vec![], ..Default::default() }.validate().is_err());
    }

    #[test]
    fn huge_window_starts_at_epoch() {
        let src = MemorySource::new().with_log("System", vec![raw(at(11, 0), 1, EVENTLOG_ERROR_TYPE)]);
        let mut cfg = config(&["System"]);
        cfg.hours_back = u32::MAX;
        let out = Analyzer::new(cfg, Arc::new(src)).unwrap().analyze_at(at(12, 0));
        assert_eq!(out.not_before, DateTime::<Utc>::UNIX_EPOCH.with_timezone(&Local));
        assert_eq!(out.events.len(), 1);
    }

    #[test]
    fn defaults() {
        let c = AnalyzerConfig::default();
        assert_eq!(c.hours_back, 24);
        assert_eq!(c.log_sources, vec!["System", "Application", "Security"]);
        assert_eq!(c.source_timeout, Some(StdDuration::from_secs(120)));
    }
}
