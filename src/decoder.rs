use std::collections::BTreeMap;

fn first<'a>(m: &'a BTreeMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| m.get(*k).map(|v| v.as_str()).filter(|v| !v.is_empty()))
}

/// Best-effort message for records read without the publisher's message
/// tables (offline `.evtx` files). `event_id` is the low 16 bits.
pub fn decode_event(provider: &str, event_id: u32, xml: &str) -> Option<String> {
    let m = crate::event_xml::event_data_pairs_or_fallback(xml);
    match (provider, event_id) {
        ("EventLog", 6008) => {
            let when = [first(&m, &["param1"]), first(&m, &["param2"])].into_iter().flatten().collect::<Vec<_>>().join(" ");
            if when.is_empty() { Some("The previous system shutdown was unexpected.".to_string()) }
            else { Some(format!("The previous system shutdown at {} was unexpected.", when)) }
        }
        ("EventLog", 6005) => Some("The Event log service was started.".to_string()),
        ("Service Control Manager", 7000) => {
            let svc = first(&m, &["param1", "ServiceName"]).unwrap_or("(unknown)");
            Some(format!("The {} service failed to start.", svc))
        }
        ("Service Control Manager", 7001) => {
            let svc = first(&m, &["param1", "ServiceName"]).unwrap_or("(unknown)");
            let dep = first(&m, &["param2"]).unwrap_or("(unknown)");
            Some(format!("The {} service depends on the {} service which failed to start.", svc, dep))
        }
        ("Service Control Manager", 7040) => {
            let svc = first(&m, &["param1"]).unwrap_or("(unknown)");
            let from = first(&m, &["param2"]).unwrap_or("?");
            let to = first(&m, &["param3"]).unwrap_or("?");
            Some(format!("The start type of the {} service was changed from {} to {}.", svc, from, to))
        }
        ("Disk", 7) => {
            let dev = first(&m, &["DeviceName", "param1"]).unwrap_or("(unknown device)");
            Some(format!("The device, {}, has a bad block.", dev))
        }
        ("Disk", 51) => {
            let dev = first(&m, &["DeviceName", "param1"]).unwrap_or("(unknown device)");
            Some(format!("An error was detected on device {} during a paging operation.", dev))
        }
        ("Microsoft-Windows-DNS-Client", 1014) => match first(&m, &["QueryName"]) {
            Some(q) => Some(format!("Name resolution for the name {} timed out.", q)),
            None => Some("Name resolution timed out.".to_string()),
        },
        ("Microsoft-Windows-Security-Auditing", 4625) => {
            let user = first(&m, &["TargetUserName"]).unwrap_or("-");
            let ip = first(&m, &["IpAddress"]).unwrap_or("-");
            let kind = first(&m, &["LogonType"]).unwrap_or("?");
            Some(format!("An account failed to log on. Account: {} Source address: {} Logon type: {}", user, ip, kind))
        }
        ("Microsoft-Windows-Security-Auditing", 4624) => {
            let user = first(&m, &["TargetUserName"]).unwrap_or("-");
            let kind = first(&m, &["LogonType"]).unwrap_or("?");
            Some(format!("An account was successfully logged on. Account: {} Logon type: {}", user, kind))
        }
        ("NETLOGON", 5719) | ("Netlogon", 5719) => {
            let domain = first(&m, &["param1"]).unwrap_or("(unknown)");
            Some(format!("This computer was not able to set up a secure session with a domain controller in domain {}.", domain))
        }
        ("Application Error", 1000) => {
            let app = first(&m, &["FaultingApplicationName", "param1"]).unwrap_or("(unknown)");
            let module = first(&m, &["FaultingModuleName", "param4"]).unwrap_or("(unknown)");
            Some(format!("Faulting application name: {}, faulting module name: {}", app, module))
        }
        ("Application Hang", 1002) => {
            let app = first(&m, &["param1"]).unwrap_or("(unknown)");
            Some(format!("The program {} stopped interacting with Windows and was closed.", app))
        }
        ("DistributedCOM", 10016) | ("DistributedCOM", 10010) => {
            let clsid = first(&m, &["param4", "CLSID"]).unwrap_or_default();
            let appid = first(&m, &["param5", "APPID"]).unwrap_or_default();
            if clsid.is_empty() && appid.is_empty() { return None; }
            Some(format!("DCOM CLSID={} APPID={}", clsid, appid))
        }
        ("User32", 1074) => {
            let process = first(&m, &["param1"]).unwrap_or("(unknown)");
            let reason = first(&m, &["param3"]).unwrap_or("(no reason)");
            Some(format!("The process {} initiated a shutdown or restart: {}", process, reason))
        }
        ("Microsoft-Windows-WER-SystemErrorReporting", 1001) => {
            let bug = first(&m, &["param1", "BugcheckCode"])?;
            Some(format!("The computer has rebooted from a bugcheck. The bugcheck was: {}", bug))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scm_7000_names_service() {
        let xml = "<Event><EventData><Data Name=\"param1\">Spooler</Data></EventData></Event>";
        assert_eq!(decode_event("Service Control Manager", 7000, xml).unwrap(), "The Spooler service failed to start.");
    }

    #[test]
    fn eventlog_6008_without_data() {
        let xml = "<Event><EventData></EventData></Event>";
        assert!(decode_event("EventLog", 6008, xml).unwrap().contains("unexpected"));
    }

    #[test]
    fn failed_logon_includes_account_and_address() {
        let xml = "<Event><EventData><Data Name=\"TargetUserName\">admin</Data><Data Name=\"IpAddress\">10.0.0.7</Data><Data Name=\"LogonType\">3</Data></EventData></Event>";
        let msg = decode_event("Microsoft-Windows-Security-Auditing", 4625, xml).unwrap();
        assert!(msg.contains("admin"));
        assert!(msg.contains("10.0.0.7"));
    }

    #[test]
    fn dcom_without_ids_is_undecoded() {
        assert!(decode_event("DistributedCOM", 10016, "<Event/>").is_none());
    }

    #[test]
    fn unknown_pairs_are_undecoded() {
        assert!(decode_event("Whatever", 1, "<Event/>").is_none());
    }
}
