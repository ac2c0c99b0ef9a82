use serde::{Deserialize, Serialize};
use std::fmt;

pub const EVENTLOG_SUCCESS: u16 = 0x0000;
pub const EVENTLOG_ERROR_TYPE: u16 = 0x0001;
pub const EVENTLOG_WARNING_TYPE: u16 = 0x0002;
pub const EVENTLOG_INFORMATION_TYPE: u16 = 0x0004;
pub const EVENTLOG_AUDIT_SUCCESS: u16 = 0x0008;
pub const EVENTLOG_AUDIT_FAILURE: u16 = 0x0010;

const KEYWORD_AUDIT_FAILURE: u64 = 0x0010_0000_0000_0000;
const KEYWORD_AUDIT_SUCCESS: u64 = 0x0020_0000_0000_0000;

/// Urgency of an event. Lower discriminant means more severe, and the derived
/// ordering follows it: `Critical < Error < Warning < Information`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Severity {
    Critical = 1,
    Error = 2,
    Warning = 3,
    Information = 4,
}

impl Severity {
    /// Most severe first.
    pub const ALL: [Severity; 4] = [Severity::Critical, Severity::Error, Severity::Warning, Severity::Information];

    /// Translates a legacy event-type code. Unknown codes are informational.
    pub fn from_event_type(code: u16) -> Severity {
        match code {
            EVENTLOG_ERROR_TYPE => Severity::Error,
            EVENTLOG_WARNING_TYPE => Severity::Warning,
            EVENTLOG_INFORMATION_TYPE => Severity::Information,
            EVENTLOG_AUDIT_SUCCESS => Severity::Information,
            EVENTLOG_AUDIT_FAILURE => Severity::Critical,
            _ => Severity::Information,
        }
    }

    /// True when `self` is as severe as `threshold` or more, e.g.
    /// `s.is_at_least(Severity::Error)` selects CRITICAL and ERROR.
    pub fn is_at_least(self, threshold: Severity) -> bool { self <= threshold }

    pub fn name(self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Information => "INFORMATION",
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Information => "information",
        }
    }

    pub fn html_color(self) -> &'static str {
        match self {
            Severity::Critical => "#dc3545",
            Severity::Error => "#fd7e14",
            Severity::Warning => "#ffc107",
            Severity::Information => "#28a745",
        }
    }

    /// ANSI SGR code used when painting console lines.
    pub fn ansi_code(self) -> &'static str {
        match self { Severity::Critical => "1;31", Severity::Error => "31", Severity::Warning => "33", Severity::Information => "34" }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

/// XML-rendered records carry `Level` and `Keywords` rather than a legacy
/// event type. Audit keywords win over the level.
pub fn event_type_from_level(level: u8, keywords: u64) -> u16 {
    if keywords & KEYWORD_AUDIT_FAILURE != 0 { return EVENTLOG_AUDIT_FAILURE; }
    if keywords & KEYWORD_AUDIT_SUCCESS != 0 { return EVENTLOG_AUDIT_SUCCESS; }
    match level {
        0 => EVENTLOG_SUCCESS,
        1 | 2 => EVENTLOG_ERROR_TYPE,
        3 => EVENTLOG_WARNING_TYPE,
        _ => EVENTLOG_INFORMATION_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_table() {
        assert_eq!(Severity::from_event_type(EVENTLOG_ERROR_TYPE), Severity::Error);
        assert_eq!(Severity::from_event_type(EVENTLOG_WARNING_TYPE), Severity::Warning);
        assert_eq!(Severity::from_event_type(EVENTLOG_INFORMATION_TYPE), Severity::Information);
        assert_eq!(Severity::from_event_type(EVENTLOG_AUDIT_SUCCESS), Severity::Information);
        assert_eq!(Severity::from_event_type(EVENTLOG_AUDIT_FAILURE), Severity::Critical);
    }

    #[test]
    fn unmapped_codes_are_information() {
        for code in [EVENTLOG_SUCCESS, 0x0003, 0x0020, 0x00ff, u16::MAX] {
            assert_eq!(Severity::from_event_type(code), Severity::Information);
        }
    }

    #[test]
    fn lower_value_is_more_severe() {
        assert!(Severity::Critical < Severity::Error);
        assert!(Severity::Error < Severity::Warning);
        assert!(Severity::Warning < Severity::Information);
        assert_eq!(Severity::Critical as u8, 1);
        assert_eq!(Severity::Information as u8, 4);
        let mut v = vec![Severity::Information, Severity::Critical, Severity::Warning, Severity::Error];
        v.sort();
        assert_eq!(v, Severity::ALL.to_vec());
    }

    #[test]
    fn at_least_error_selects_critical_and_error() {
        let picked: Vec<Severity> = Severity::ALL.into_iter().filter(|s| s.is_at_least(Severity::Error)).collect();
        assert_eq!(picked, vec![Severity::Critical, Severity::Error]);
    }

    #[test]
    fn level_and_keywords_map_to_legacy_type() {
        assert_eq!(event_type_from_level(1, 0), EVENTLOG_ERROR_TYPE);
        assert_eq!(event_type_from_level(2, 0), EVENTLOG_ERROR_TYPE);
        assert_eq!(event_type_from_level(3, 0), EVENTLOG_WARNING_TYPE);
        assert_eq!(event_type_from_level(0, 0), EVENTLOG_SUCCESS);
        assert_eq!(event_type_from_level(4, 0), EVENTLOG_INFORMATION_TYPE);
        assert_eq!(event_type_from_level(4, 0x8010_0000_0000_0000), EVENTLOG_AUDIT_FAILURE);
        assert_eq!(event_type_from_level(0, 0x8020_0000_0000_0000), EVENTLOG_AUDIT_SUCCESS);
    }

    #[test]
    fn serializes_as_name() {
        assert_eq!(serde_json::to_string(&Severity::Warning).unwrap(), "\"WARNING\"");
    }
}
