use std::collections::HashMap;
use std::ptr;
use windows_sys::Win32::Foundation::GetLastError;
use windows_sys::Win32::System::EventLog::*;
use crate::source::{BATCH_SIZE, EventLogSource, RawRecord, RecordCursor, SourceError};

const ERROR_ACCESS_DENIED: u32 = 5;
const ERROR_NO_MORE_ITEMS: u32 = 259;
const ERROR_EVT_CHANNEL_NOT_FOUND: u32 = 15007;
const INFINITE: u32 = u32::MAX;

struct Handle(EVT_HANDLE);
impl Drop for Handle { fn drop(&mut self) { unsafe { EvtClose(self.0); } } }
// Event log handles are not tied to the opening thread.
unsafe impl Send for Handle {}

fn w(s: &str) -> Vec<u16> { let mut v = s.encode_utf16().collect::<Vec<u16>>(); v.push(0); v }

/// The local machine's event log service.
#[derive(Clone, Copy, Debug, Default)]
pub struct WindowsLiveSource;

impl WindowsLiveSource {
    pub fn new() -> Self { Self }
}

impl EventLogSource for WindowsLiveSource {
    fn open(&self, log_name: &str) -> Result<Box<dyn RecordCursor>, SourceError> {
        let path = w(log_name);
        let h = unsafe { EvtQuery(0, path.as_ptr(), w("*").as_ptr(), EvtQueryChannelPath as u32 | EvtQueryReverseDirection as u32) };
        if h == 0 {
            let code = unsafe { GetLastError() };
            return Err(match code {
                ERROR_ACCESS_DENIED => SourceError::AccessDenied { log_name: log_name.to_string() },
                ERROR_EVT_CHANNEL_NOT_FOUND => SourceError::Unavailable { log_name: log_name.to_string(), reason: "channel not found".to_string() },
                c => SourceError::Unavailable { log_name: log_name.to_string(), reason: format!("EvtQuery failed with error {}", c) },
            });
        }
        Ok(Box::new(LiveCursor { query: Handle(h), log_name: log_name.to_string(), publishers: HashMap::new(), done: false }))
    }

    fn describe(&self) -> String { "Windows Event Log".to_string() }
}

struct LiveCursor {
    query: Handle,
    log_name: String,
    /// `None` caches a provider whose metadata could not be opened.
    publishers: HashMap<String, Option<Handle>>,
    done: bool,
}

impl LiveCursor {
    fn publisher(&mut self, provider: &str) -> Option<EVT_HANDLE> {
        let entry = self.publishers.entry(provider.to_string()).or_insert_with(|| {
            let h = unsafe { EvtOpenPublisherMetadata(0, w(provider).as_ptr(), ptr::null(), 0, 0) };
            if h == 0 { log::trace!("No publisher metadata for {}", provider); None } else { Some(Handle(h)) }
        });
        entry.as_ref().map(|h| h.0)
    }

    fn convert(&mut self, ev: EVT_HANDLE) -> Option<RawRecord> {
        let xml = unsafe { render_xml(ev) }?;
        let mut rec = crate::evtx_source::raw_record_from_xml(&xml)?;
        if let Some(provider) = rec.source.clone()
            && let Some(meta) = self.publisher(&provider)
            && let Some(msg) = unsafe { format_message(meta, ev) } {
            rec.message = Some(msg);
        }
        Some(rec)
    }
}

impl RecordCursor for LiveCursor {
    fn read_batch(&mut self) -> Result<Option<Vec<RawRecord>>, SourceError> {
        if self.done { return Ok(None); }
        let mut arr: [EVT_HANDLE; BATCH_SIZE] = [0; BATCH_SIZE];
        let mut returned: u32 = 0;
        let ok = unsafe { EvtNext(self.query.0, arr.len() as u32, arr.as_mut_ptr(), INFINITE, 0, &mut returned) };
        if ok == 0 {
            let code = unsafe { GetLastError() };
            self.done = true;
            if code == ERROR_NO_MORE_ITEMS || code == 0 { return Ok(None); }
            return Err(SourceError::Read { log_name: self.log_name.clone(), reason: format!("EvtNext failed with error {}", code) });
        }
        if returned == 0 { self.done = true; return Ok(None); }
        let mut out = Vec::with_capacity(returned as usize);
        for &ev in arr.iter().take(returned as usize) {
            let ev = Handle(ev);
            match self.convert(ev.0) {
                Some(rec) => out.push(rec),
                None => log::trace!("{}: could not render a record", self.log_name),
            }
        }
        Ok(Some(out))
    }
}

unsafe fn render_xml(ev: EVT_HANDLE) -> Option<String> {
    let mut used: u32 = 0;
    let mut count: u32 = 0;
    let ok = unsafe { EvtRender(0, ev, EvtRenderEventXml, 0, ptr::null_mut(), &mut used, &mut count) };
    let need = if ok == 0 { used } else { 0 };
    if need == 0 { return None; }
    let mut buf: Vec<u16> = vec![0u16; (need as usize).div_ceil(2)];
    if unsafe { EvtRender(0, ev, EvtRenderEventXml, need, buf.as_mut_ptr() as *mut _, &mut used, &mut count) } != 0 {
        let s = String::from_utf16_lossy(&buf);
        Some(s.trim_matches(char::from(0)).to_string())
    } else { None }
}

/// The publisher's localized message for `ev`, or `None` when it has no
/// message resources.
unsafe fn format_message(publisher: EVT_HANDLE, ev: EVT_HANDLE) -> Option<String> {
    let mut used: u32 = 0;
    unsafe { EvtFormatMessage(publisher, ev, 0, 0, ptr::null(), EvtFormatMessageEvent as u32, 0, ptr::null_mut(), &mut used) };
    if used == 0 { return None; }
    let mut buf: Vec<u16> = vec![0u16; used as usize];
    if unsafe { EvtFormatMessage(publisher, ev, 0, 0, ptr::null(), EvtFormatMessageEvent as u32, used, buf.as_mut_ptr(), &mut used) } == 0 {
        return None;
    }
    let s = String::from_utf16_lossy(&buf);
    let s = s.trim_matches(char::from(0)).trim();
    if s.is_empty() { None } else { Some(s.to_string()) }
}
