#[cfg(test)]
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// One record as delivered by a log source, before normalization.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawRecord {
    /// Textual generation time as the source reports it.
    pub time_generated: String,
    /// Legacy event-type code (see `severity::from_event_type`).
    pub event_type: u16,
    /// May carry facility/qualifier bits above the low 16.
    pub event_id: u32,
    pub source: Option<String>,
    /// `None` when the message could not be formatted.
    pub message: Option<String>,
    pub category: u16,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("log {log_name} is unavailable: {reason}")]
    Unavailable { log_name: String, reason: String },
    #[error("access to log {log_name} denied (run as Administrator)")]
    AccessDenied { log_name: String },
    #[error("reading log {log_name} failed: {reason}")]
    Read { log_name: String, reason: String },
    #[error("reading log {log_name} timed out after {timeout:?}")]
    TimedOut { log_name: String, timeout: std::time::Duration },
}

impl SourceError {
    pub fn log_name(&self) -> &str {
        match self {
            SourceError::Unavailable { log_name, .. }
            | SourceError::AccessDenied { log_name }
            | SourceError::Read { log_name, .. }
            | SourceError::TimedOut { log_name, .. } => log_name,
        }
    }
}

/// An open log. Batches come most-recent first; `Ok(None)` is end-of-data.
/// Dropping the cursor closes the underlying handle.
pub trait RecordCursor: Send {
    fn read_batch(&mut self) -> Result<Option<Vec<RawRecord>>, SourceError>;
}

pub trait EventLogSource: Send + Sync {
    fn open(&self, log_name: &str) -> Result<Box<dyn RecordCursor>, SourceError>;
    fn describe(&self) -> String;
}

pub const BATCH_SIZE: usize = 64;

/// Cursor over records already held in memory, newest first.
pub struct VecCursor {
    records: std::vec::IntoIter<RawRecord>,
    batch: usize,
}

impl VecCursor {
    pub fn new(records: Vec<RawRecord>, batch: usize) -> Self { Self { records: records.into_iter(), batch: batch.max(1) } }
}

impl RecordCursor for VecCursor {
    fn read_batch(&mut self) -> Result<Option<Vec<RawRecord>>, SourceError> {
        let chunk: Vec<RawRecord> = self.records.by_ref().take(self.batch).collect();
        if chunk.is_empty() { Ok(None) } else { Ok(Some(chunk)) }
    }
}

/// In-process source. Records per log must already be newest first.
#[cfg(test)]
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    logs: HashMap<String, Vec<RawRecord>>,
    failing: HashSet<String>,
}

#[cfg(test)]
impl MemorySource {
    pub fn new() -> Self { Self::default() }

    pub fn with_log(mut self, log_name: &str, records: Vec<RawRecord>) -> Self {
        self.logs.insert(log_name.to_string(), records);
        self
    }

    pub fn with_failing(mut self, log_name: &str) -> Self {
        self.failing.insert(log_name.to_string());
        self
    }
}

#[cfg(test)]
impl EventLogSource for MemorySource {
    fn open(&self, log_name: &str) -> Result<Box<dyn RecordCursor>, SourceError> {
        if self.failing.contains(log_name) {
            return Err(SourceError::AccessDenied { log_name: log_name.to_string() });
        }
        match self.logs.get(log_name) {
            Some(r) => Ok(Box::new(VecCursor::new(r.clone(), BATCH_SIZE))),
            None => Err(SourceError::Unavailable { log_name: log_name.to_string(), reason: "no such log".to_string() }),
        }
    }

    fn describe(&self) -> String { format!("in-memory ({} logs)", self.logs.len()) }
}
