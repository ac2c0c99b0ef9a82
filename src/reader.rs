use std::sync::Arc;
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::time::Duration as StdDuration;
use chrono::{DateTime, Local, TimeZone, Timelike};
use serde::Serialize;
use crate::severity::Severity;
use crate::source::{EventLogSource, RawRecord, SourceError};

pub const MAX_MESSAGE_CHARS: usize = 500;
pub const NO_DESCRIPTION: &str = "No description available";
pub const UNKNOWN_SOURCE: &str = "Unknown";

/// A normalized, severity-classified record. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Event {
    pub log_name: String,
    /// Low 16 bits of the raw identifier.
    pub event_id: u32,
    pub source: String,
    pub time: DateTime<Local>,
    pub severity: Severity,
    pub message: String,
    pub category: u16,
}

#[derive(Debug, Default)]
pub struct ReadOutcome {
    /// Most recent first.
    pub events: Vec<Event>,
    /// Set when the log could not be opened or the read stopped early on a failure.
    pub error: Option<SourceError>,
}

/// RFC 3339, or `YYYY-MM-DD HH:MM:SS[.f]` in local time.
pub fn parse_system_time(s: &str) -> Option<DateTime<Local>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) { return Some(dt.with_timezone(&Local)); }
    let alt = s.replace(' ', "T");
    if let Ok(dt) = DateTime::parse_from_rfc3339(&alt) { return Some(dt.with_timezone(&Local)); }
    let naive = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()?;
    Local.from_local_datetime(&naive).earliest()
}

pub fn truncate_chars(s: &str, n: usize) -> String { s.chars().take(n).collect() }

fn normalize(log_name: &str, raw: RawRecord, time: DateTime<Local>) -> Event {
    let message = match raw.message {
        Some(m) => truncate_chars(&m, MAX_MESSAGE_CHARS),
        None => NO_DESCRIPTION.to_string(),
    };
    Event {
        log_name: log_name.to_string(),
        event_id: raw.event_id & 0xFFFF,
        source: raw.source.filter(|s| !s.trim().is_empty()).unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
        time: time.with_nanosecond(0).unwrap_or(time),
        severity: Severity::from_event_type(raw.event_type),
        message,
        category: raw.category,
    }
}

/// Reads `log_name` backward and stops at the first record strictly older
/// than `not_before`. Records with an unparseable time are stamped `now`.
pub fn read_log(source: &dyn EventLogSource, log_name: &str, not_before: DateTime<Local>, now: DateTime<Local>) -> ReadOutcome {
    let mut cursor = match source.open(log_name) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("{}", e);
            return ReadOutcome { events: Vec::new(), error: Some(e) };
        }
    };
    log::debug!("Reading {} from {} since {}", log_name, source.describe(), not_before.format("%Y-%m-%d %H:%M:%S"));
    let mut events = Vec::new();
    loop {
        let batch = match cursor.read_batch() {
            Ok(Some(b)) => b,
            Ok(None) => break,
            Err(e) => {
                log::warn!("{} (keeping {} events read so far)", e, events.len());
                return ReadOutcome { events, error: Some(e) };
            }
        };
        for raw in batch {
            let time = match parse_system_time(&raw.time_generated) {
                Some(t) => t,
                None => {
                    log::trace!("{}: unparseable time {:?}, using now", log_name, raw.time_generated);
                    now
                }
            };
            if time < not_before {
                log::debug!("{}: {} events in window", log_name, events.len());
                return ReadOutcome { events, error: None };
            }
            if raw.message.is_none() { log::trace!("{}: event {} has no formatted message", log_name, raw.event_id & 0xFFFF); }
            events.push(normalize(log_name, raw, time));
        }
    }
    log::debug!("{}: {} events in window (end of log)", log_name, events.len());
    ReadOutcome { events, error: None }
}

/// `read_log` on a worker thread. A read exceeding `timeout` yields no
/// events and `SourceError::TimedOut`; the worker is left to finish alone.
pub fn read_log_bounded(source: Arc<dyn EventLogSource>, log_name: &str, not_before: DateTime<Local>, now: DateTime<Local>, timeout: Option<StdDuration>) -> ReadOutcome {
    let Some(timeout) = timeout else { return read_log(source.as_ref(), log_name, not_before, now); };
    let (tx, rx) = channel::<ReadOutcome>();
    let name = log_name.to_string();
    let spawned = std::thread::Builder::new()
        .name(format!("read-{}", log_name))
        .spawn(move || { let _ = tx.send(read_log(source.as_ref(), &name, not_before, now)); });
    if let Err(e) = spawned {
        let err = SourceError::Read { log_name: log_name.to_string(), reason: e.to_string() };
        log::warn!("{}", err);
        return ReadOutcome { events: Vec::new(), error: Some(err) };
    }
    match rx.recv_timeout(timeout) {
        Ok(out) => out,
        Err(RecvTimeoutError::Timeout) => {
            let err = SourceError::TimedOut { log_name: log_name.to_string(), timeout };
            log::warn!("{}", err);
            ReadOutcome { events: Vec::new(), error: Some(err) }
        }
        Err(RecvTimeoutError::Disconnected) => {
            let err = SourceError::Read { log_name: log_name.to_string(), reason: "reader thread terminated".to_string() };
            log::warn!("{}", err);
            ReadOutcome { events: Vec::new(), error: Some(err) }
        }
    }
}
