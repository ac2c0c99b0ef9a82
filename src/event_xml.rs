use std::collections::BTreeMap;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event as XmlEvent};

/// Fields of the `<System>` block of a rendered event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SystemFields {
    pub time_created: String,
    pub level: u8,
    pub keywords: u64,
    pub provider: String,
    /// Qualifiers in the high word, identifier in the low word.
    pub event_id: u32,
    pub task: u16,
}

fn attr(e: &BytesStart<'_>, key: &str) -> Option<String> {
    for a in e.attributes().flatten() {
        if a.key.as_ref() == key.as_bytes() && let Ok(v) = a.unescape_value() {
            return Some(v.to_string());
        }
    }
    None
}

fn parse_u64_maybe_hex(s: &str) -> Option<u64> {
    let t = s.trim();
    if let Some(h) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) { u64::from_str_radix(h, 16).ok() } else { t.parse().ok() }
}

pub fn parse_system(xml: &str) -> Option<SystemFields> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut out = SystemFields::default();
    let mut qualifiers: u32 = 0;
    let mut saw_event_id = false;
    let mut cur = String::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(XmlEvent::Start(e)) | Ok(XmlEvent::Empty(e)) => {
                cur = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match cur.as_str() {
                    "TimeCreated" => { if let Some(v) = attr(&e, "SystemTime") { out.time_created = v; } }
                    "Provider" => {
                        if let Some(v) = attr(&e, "EventSourceName").or_else(|| attr(&e, "Name")) { out.provider = v; }
                    }
                    "EventID" => {
                        if let Some(q) = attr(&e, "Qualifiers").and_then(|q| q.trim().parse::<u32>().ok()) { qualifiers = q; }
                    }
                    _ => {}
                }
            }
            Ok(XmlEvent::Text(t)) => {
                let v = String::from_utf8_lossy(t.as_ref()).into_owned();
                match cur.as_str() {
                    "Level" => { if let Ok(n) = v.trim().parse::<u8>() { out.level = n; } }
                    "EventID" => { if let Ok(n) = v.trim().parse::<u32>() { out.event_id = n; saw_event_id = true; } }
                    "Keywords" => { if let Some(k) = parse_u64_maybe_hex(&v) { out.keywords = k; } }
                    "Task" => { if let Ok(n) = v.trim().parse::<u16>() { out.task = n; } }
                    _ => {}
                }
            }
            Ok(XmlEvent::End(_)) => cur.clear(),
            Ok(XmlEvent::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
    if !saw_event_id { return None; }
    out.event_id = (qualifiers << 16) | (out.event_id & 0xFFFF);
    Some(out)
}

/// `Data` values inside `EventData`, keyed by their `Name` attribute.
/// Unnamed and empty values are dropped.
pub fn event_data_pairs(xml: &str) -> BTreeMap<String, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut out = BTreeMap::new();
    let mut in_section = false;
    let mut field: Option<String> = None;
    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(e)) => match e.local_name().as_ref() {
                b"EventData" => in_section = true,
                b"Data" if in_section => field = attr(&e, "Name"),
                _ => {}
            },
            Ok(XmlEvent::End(e)) => match e.local_name().as_ref() {
                b"EventData" => in_section = false,
                b"Data" => field = None,
                _ => {}
            },
            Ok(XmlEvent::Text(t)) => {
                if let Some(name) = field.as_ref() {
                    let value = t.unescape().map(|v| v.into_owned()).unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                    let value = value.trim();
                    if !value.is_empty() { out.insert(name.clone(), value.to_string()); }
                }
            }
            Ok(XmlEvent::Eof) | Err(_) => break,
            _ => {}
        }
    }
    out
}

/// Plain-text scan for `<Data Name="..">..</Data>` anywhere in the record,
/// for events whose values live under `UserData` or in malformed XML.
pub fn event_data_pairs_fallback(xml: &str) -> BTreeMap<String, String> {
    xml.split("<Data ").skip(1).filter_map(|chunk| {
        let (_, after) = chunk.split_once("Name=\"")?;
        let (name, rest) = after.split_once('"')?;
        let (head, body) = rest.split_once('>')?;
        if head.ends_with('/') { return None; }
        let (value, _) = body.split_once("</Data>")?;
        if value.contains('<') { return None; }
        Some((name.to_string(), value.to_string()))
    }).collect()
}

pub fn event_data_pairs_or_fallback(xml: &str) -> BTreeMap<String, String> {
    let m = event_data_pairs(xml);
    if m.is_empty() { event_data_pairs_fallback(xml) } else { m }
}

/// `Name=Value` lines, sorted by name. `None` when the event has no data.
pub fn event_data_text(xml: &str) -> Option<String> {
    let m = event_data_pairs_or_fallback(xml);
    if m.is_empty() { return None; }
    Some(m.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>().join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCM: &str = "<Event xmlns=\"http://schemas.microsoft.com/win/2004/08/events/event\"><System><Provider Name=\"Service Control Manager\" Guid=\"{555908d1}\" EventSourceName=\"Service Control Manager\"/><EventID Qualifiers=\"49152\">7000</EventID><Level>2</Level><Task>0</Task><Keywords>0x8080000000000000</Keywords><TimeCreated SystemTime=\"2025-11-30T12:00:00.1234567Z\"/><Channel>System</Channel></System><EventData><Data Name=\"param1\">Spooler</Data><Data Name=\"param2\">%%1053</Data></EventData></Event>";

    #[test]
    fn parses_system_block_with_empty_elements() {
        let s = parse_system(SCM).unwrap();
        assert_eq!(s.provider, "Service Control Manager");
        assert_eq!(s.event_id, (49152 << 16) | 7000);
        assert_eq!(s.event_id & 0xFFFF, 7000);
        assert_eq!(s.level, 2);
        assert_eq!(s.keywords, 0x8080_0000_0000_0000);
        assert_eq!(s.time_created, "2025-11-30T12:00:00.1234567Z");
    }

    #[test]
    fn missing_event_id_is_rejected() {
        assert!(parse_system("<Event><System><Level>2</Level></System></Event>").is_none());
    }

    const DISK_BAD_BLOCK: &str = "<Event><System><Provider Name=\"disk\"/><EventID Qualifiers=\"49156\">7</EventID><Level>2</Level><TimeCreated SystemTime=\"2025-11-30T08:15:00Z\"/></System><EventData><Data Name=\"DeviceName\">\\Device\\Harddisk0\\DR0</Data><Data Name=\"Comment\">R&amp;D spare</Data><Data Name=\"Empty\"></Data><Data>unnamed</Data></EventData></Event>";

    #[test]
    fn reads_named_values_from_event_data() {
        let m = event_data_pairs(DISK_BAD_BLOCK);
        assert_eq!(m.get("DeviceName").map(String::as_str), Some("\\Device\\Harddisk0\\DR0"));
        assert_eq!(m.get("Comment").map(String::as_str), Some("R&D spare"));
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn user_data_values_come_from_the_text_scan() {
        let xml = "<Event><System><EventID>1102</EventID></System><UserData><LogFileCleared><Data Name=\"SubjectUserName\">admin</Data><Data Name=\"Skipped\"/></LogFileCleared></UserData></Event>";
        assert!(event_data_pairs(xml).is_empty());
        let m = event_data_pairs_or_fallback(xml);
        assert_eq!(m.get("SubjectUserName").map(String::as_str), Some("admin"));
        assert!(!m.contains_key("Skipped"));
    }

    #[test]
    fn event_data_text_joins_sorted_pairs() {
        assert_eq!(event_data_text(SCM).unwrap(), "param1=Spooler\nparam2=%%1053");
        assert!(event_data_text("<Event><EventData></EventData></Event>").is_none());
    }
}
