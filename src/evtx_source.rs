use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use evtx::EvtxParser;
use crate::source::{BATCH_SIZE, EventLogSource, RawRecord, RecordCursor, SourceError, VecCursor};

/// Exported `.evtx` files addressed by log name (the file stem).
#[derive(Clone, Debug, Default)]
pub struct EvtxFileSource {
    files: BTreeMap<String, PathBuf>,
}

impl EvtxFileSource {
    /// `path` may be one `.evtx` file or a directory of them.
    pub fn discover(path: &Path, glob: Option<&str>, recursive: bool) -> anyhow::Result<Self> {
        let mut files = BTreeMap::new();
        if path.is_file() {
            files.insert(log_name_of(path), path.to_path_buf());
            return Ok(Self { files });
        }
        if !path.is_dir() { anyhow::bail!("EVTX path is neither file nor directory: {}", path.to_string_lossy()); }
        let set = match glob {
            Some(g) => {
                let mut gb = globset::GlobSetBuilder::new();
                gb.add(globset::GlobBuilder::new(g).case_insensitive(true).build()?);
                Some(gb.build()?)
            }
            None => None,
        };
        let wd = if recursive { walkdir::WalkDir::new(path) } else { walkdir::WalkDir::new(path).max_depth(1) };
        for de in wd.into_iter().filter_map(Result::ok) {
            let fp = de.path();
            if !fp.is_file() { continue; }
            if !fp.extension().and_then(|e| e.to_str()).map(|s| s.eq_ignore_ascii_case("evtx")).unwrap_or(false) { continue; }
            if let Some(set) = &set && !set.is_match(fp) && !fp.file_name().map(|n| set.is_match(n)).unwrap_or(false) { continue; }
            files.entry(log_name_of(fp)).or_insert_with(|| fp.to_path_buf());
        }
        log::debug!("Discovered {} EVTX files under {}", files.len(), path.to_string_lossy());
        Ok(Self { files })
    }

    pub fn log_names(&self) -> Vec<String> { self.files.keys().cloned().collect() }

    fn path_for(&self, log_name: &str) -> Option<&PathBuf> {
        self.files.get(log_name).or_else(|| self.files.iter().find(|(k, _)| k.eq_ignore_ascii_case(log_name)).map(|(_, v)| v))
    }
}

fn log_name_of(p: &Path) -> String { p.file_stem().and_then(|s| s.to_str()).unwrap_or("").to_string() }

/// Converts one rendered event. `None` when the XML has no usable System block.
pub fn raw_record_from_xml(xml: &str) -> Option<RawRecord> {
    let sys = crate::event_xml::parse_system(xml)?;
    let message = crate::decoder::decode_event(&sys.provider, sys.event_id & 0xFFFF, xml)
        .or_else(|| crate::event_xml::event_data_text(xml));
    Some(RawRecord {
        time_generated: sys.time_created,
        event_type: crate::severity::event_type_from_level(sys.level, sys.keywords),
        event_id: sys.event_id,
        source: if sys.provider.is_empty() { None } else { Some(sys.provider) },
        message,
        category: sys.task,
    })
}

/// Files are stored oldest first; the cursor must yield newest first.
fn newest_first(mut records: Vec<RawRecord>) -> Vec<RawRecord> {
    records.sort_by_cached_key(|r| std::cmp::Reverse(crate::reader::parse_system_time(&r.time_generated)
        .map(|t| t.timestamp())
        .unwrap_or(i64::MAX)));
    records
}

impl EventLogSource for EvtxFileSource {
    fn open(&self, log_name: &str) -> Result<Box<dyn RecordCursor>, SourceError> {
        let path = self.path_for(log_name).ok_or_else(|| SourceError::Unavailable { log_name: log_name.to_string(), reason: "no matching .evtx file".to_string() })?;
        if let Err(e) = std::fs::File::open(path) {
            return Err(match e.kind() {
                std::io::ErrorKind::PermissionDenied => SourceError::AccessDenied { log_name: log_name.to_string() },
                _ => SourceError::Unavailable { log_name: log_name.to_string(), reason: format!("{}: {}", path.to_string_lossy(), e) },
            });
        }
        let mut parser = EvtxParser::from_path(path).map_err(|e| SourceError::Unavailable { log_name: log_name.to_string(), reason: e.to_string() })?;
        let mut records = Vec::new();
        let mut skipped = 0usize;
        for r in parser.records() {
            match r {
                Ok(r) => match raw_record_from_xml(&r.data) {
                    Some(rec) => records.push(rec),
                    None => skipped += 1,
                },
                Err(e) => { skipped += 1; log::trace!("Skipping unreadable record in {}: {}", log_name, e); }
            }
        }
        if skipped > 0 { log::debug!("{}: skipped {} unreadable records", log_name, skipped); }
        Ok(Box::new(VecCursor::new(newest_first(records), BATCH_SIZE)))
    }

    fn describe(&self) -> String { format!("EVTX files ({})", self.log_names().join(", ")) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(t: &str) -> RawRecord { RawRecord { time_generated: t.to_string(), ..Default::default() } }

    #[test]
    fn converts_rendered_xml() {
        let xml = "<Event><System><Provider Name=\"Disk\"/><EventID Qualifiers=\"49156\">7</EventID><Level>2</Level><Task>0</Task><Keywords>0x80000000000000</Keywords><TimeCreated SystemTime=\"2025-11-30T12:00:00Z\"/><Channel>System</Channel></System><EventData><Data Name=\"DeviceName\">\\Device\\Harddisk0\\DR0</Data></EventData></Event>";
        let r = raw_record_from_xml(xml).unwrap();
        assert_eq!(r.event_id & 0xFFFF, 7);
        assert!(r.event_id > 0xFFFF);
        assert_eq!(r.event_type, crate::severity::EVENTLOG_ERROR_TYPE);
        assert_eq!(r.source.as_deref(), Some("Disk"));
        assert!(r.message.unwrap().contains("bad block"));
    }

    #[test]
    fn event_without_data_has_no_message() {
        let xml = "<Event><System><Provider Name=\"Foo\"/><EventID>42</EventID><Level>4</Level><TimeCreated SystemTime=\"2025-11-30T12:00:00Z\"/></System></Event>";
        let r = raw_record_from_xml(xml).unwrap();
        assert!(r.message.is_none());
        assert_eq!(r.event_type, crate::severity::EVENTLOG_INFORMATION_TYPE);
    }

    #[test]
    fn orders_newest_first_with_unparseable_on_top() {
        let out = newest_first(vec![rec("2025-11-30T10:00:00Z"), rec("garbage"), rec("2025-11-30T12:00:00Z")]);
        let times: Vec<&str> = out.iter().map(|r| r.time_generated.as_str()).collect();
        assert_eq!(times, vec!["garbage", "2025-11-30T12:00:00Z", "2025-11-30T10:00:00Z"]);
    }

    #[test]
    fn discover_filters_by_extension_and_glob() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("System.evtx"), b"").unwrap();
        std::fs::write(dir.path().join("Application.evtx"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        let all = EvtxFileSource::discover(dir.path(), None, false).unwrap();
        assert_eq!(all.log_names(), vec!["Application".to_string(), "System".to_string()]);
        let only = EvtxFileSource::discover(dir.path(), Some("sys*"), false).unwrap();
        assert_eq!(only.log_names(), vec!["System".to_string()]);
    }

    #[test]
    fn missing_log_is_unavailable() {
        let s = EvtxFileSource::default();
        assert!(matches!(s.open("System").err().unwrap(), SourceError::Unavailable { .. }));
    }

    #[test]
    fn corrupt_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("Broken.evtx");
        std::fs::write(&p, b"not an evtx file").unwrap();
        let s = EvtxFileSource::discover(&p, None, false).unwrap();
        assert!(s.open("broken").is_err());
    }
}
