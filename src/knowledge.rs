use crate::severity::Severity;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::OnceLock;

pub const EVENTLOG_STARTED: u32 = 1;
pub const DISK_IO_ERROR: u32 = 7;
pub const DISK_WARNING: u32 = 51;
pub const FAILED_LOGON: u32 = 4625;
pub const UNEXPECTED_SHUTDOWN: u32 = 6008;

/// Description and remediation guidance for one event identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KnowledgeEntry {
    pub event_id: u32,
    pub description: Cow<'static, str>,
    /// Informational only; never overrides the severity observed on an event.
    pub default_severity: Severity,
    pub remediation_steps: Vec<Cow<'static, str>>,
    pub known: bool,
}

struct Curated {
    id: u32,
    description: &'static str,
    severity: Severity,
    steps: &'static [&'static str],
}

static CURATED: &[Curated] = &[
    // system stability
    Curated { id: UNEXPECTED_SHUTDOWN, description: "Unexpected system shutdown", severity: Severity::Critical, steps: &[
        "Check power stability (UPS, wall outlet)",
        "Verify CPU and GPU temperatures",
        "Look for BSOD records in Reliability Monitor",
        "Update drivers, especially chipset and GPU",
    ] },
    Curated { id: 1001, description: "BugCheck - critical system error (BSOD)", severity: Severity::Critical, steps: &[
        "Run: sfc /scannow in an elevated command prompt",
        "Test RAM with Windows Memory Diagnostic",
        "Update all drivers",
        "Look up the specific STOP code in the event details",
    ] },
    Curated { id: 10016, description: "DCOM permission error", severity: Severity::Warning, steps: &[
        "Usually safe to ignore - a known Windows issue",
        "To fix: Component Services -> DCOM Config -> grant the permission",
        "Alternatively run PowerShell as Administrator: Get-CimInstance Win32_DCOMApplicationSetting",
    ] },
    Curated { id: 7000, description: "Service failed to start", severity: Severity::Error, steps: &[
        "Check the service dependencies in services.msc",
        "Verify the service startup type",
        "Check the permissions of the service account",
        "Review the detailed application logs",
    ] },
    Curated { id: 7001, description: "Service depends on another service that failed to start", severity: Severity::Error, steps: &[
        "Identify the dependency named in the event description",
        "Start the dependency manually in services.msc",
        "Check the service startup order",
    ] },
    Curated { id: FAILED_LOGON, description: "Failed logon attempt", severity: Severity::Warning, steps: &[
        "Check whether this is an intrusion attempt (many attempts)",
        "Verify that passwords are correct",
        "Review security policies (secpol.msc)",
        "Consider enabling two-factor authentication",
    ] },
    Curated { id: 4624, description: "Successful logon", severity: Severity::Information, steps: &[
        "Monitor for unusual logons",
        "Verify logons at unusual hours",
        "Check remote logons (Type 10)",
    ] },
    Curated { id: 1000, description: "Application crash", severity: Severity::Error, steps: &[
        "Update the application to the latest version",
        "Reinstall the application",
        "Check compatibility with Windows 11",
        "Run the application as Administrator",
        "Check for missing dependencies (.NET, Visual C++ Redistributables)",
    ] },
    Curated { id: 1002, description: "Application stopped responding", severity: Severity::Warning, steps: &[
        "Increase system resources (RAM, CPU)",
        "Close other applications",
        "Check Task Manager for processes consuming resources",
        "Update the application",
    ] },
    // storage
    Curated { id: DISK_IO_ERROR, description: "Disk read/write error", severity: Severity::Critical, steps: &[
        "URGENT: back up your data!",
        "Run: chkdsk /f /r in an elevated command prompt",
        "Check disk status: wmic diskdrive get status",
        "Use CrystalDiskInfo to check SMART",
        "Consider replacing the disk",
    ] },
    Curated { id: DISK_WARNING, description: "Disk error warning", severity: Severity::Critical, steps: &[
        "URGENT: back up immediately!",
        "The disk may fail soon",
        "Check SMART disk health",
        "Plan a disk replacement",
    ] },
    // network
    Curated { id: 5719, description: "Cannot establish a connection to the domain controller", severity: Severity::Error, steps: &[
        "Check the network connection",
        "Verify DNS settings",
        "Make sure the domain controller is reachable",
        "Check the firewall",
    ] },
    Curated { id: 1014, description: "DNS name resolution failure", severity: Severity::Warning, steps: &[
        "Check the DNS settings of the network adapter",
        "Try public DNS servers (8.8.8.8, 1.1.1.1)",
        "Flush the DNS cache: ipconfig /flushdns",
        "Restart the DNS Client service",
    ] },
    // application configuration and system components
    Curated { id: 78, description: "SideBySide - application configuration error", severity: Severity::Warning, steps: &[
        "The application has conflicting component versions (manifests)",
        "Reinstall the application",
        "Install the latest Visual C++ Redistributables",
        "Check whether the application is compatible with Windows 11",
    ] },
    Curated { id: 13, description: "VSS - Volume Shadow Copy service error", severity: Severity::Warning, steps: &[
        "Often logged during shutdown - can be ignored",
        "Check that the Volume Shadow Copy service runs: services.msc",
        "Run: vssadmin list writers to check writer status",
        "If the problem repeats, restart the VSS service",
    ] },
    Curated { id: 8193, description: "VSS - error calling CoCreateInstance", severity: Severity::Warning, steps: &[
        "Related to system shutdown - usually harmless",
        "Make sure the VSS service is running",
        "Check that you have sufficient permissions",
        "Restart the Volume Shadow Copy service",
    ] },
    Curated { id: 1023, description: "Perflib - cannot load performance counter DLL", severity: Severity::Warning, steps: &[
        "The sysmain.dll library may be locked or damaged",
        "Run: lodctr /R to rebuild performance counters",
        "Check file integrity: sfc /scannow",
        "May be caused by problems with the SysMain service",
    ] },
    Curated { id: 153, description: "Graphics driver error (NVIDIA)", severity: Severity::Warning, steps: &[
        "Update NVIDIA drivers to the latest version",
        "Use DDU (Display Driver Uninstaller) and reinstall the drivers",
        "Check GPU temperatures",
        "Verify the graphics card power supply",
        "Check whether the card is overclocked",
    ] },
    Curated { id: 10010, description: "DCOM - server did not register within the required timeout", severity: Severity::Warning, steps: &[
        "Usually harmless - a common Windows issue",
        "May be related to RuntimeBroker or ShellHWDetection",
        "To fix: Component Services -> DCOM Config",
        "In most cases it can be safely ignored",
    ] },
    Curated { id: 1801, description: "TPM/Secure Boot - certificate update required", severity: Severity::Warning, steps: &[
        "Windows Update should update the certificates automatically",
        "Check for available Windows Update updates",
        "May be related to UEFI/BIOS - check for firmware updates",
        "Informational - the system works normally",
    ] },
    // security audit
    Curated { id: 4672, description: "Special privileges assigned to new logon", severity: Severity::Information, steps: &[
        "A normal security audit event",
        "Appears when a user with administrator rights logs on",
        "Monitor only unusual patterns",
        "No action - informational event",
    ] },
    Curated { id: 4798, description: "A user's local group membership was enumerated", severity: Severity::Information, steps: &[
        "A normal audit event",
        "Records queries for group membership",
        "No action - audit information only",
        "Can be disabled in Advanced Audit Policy if not needed",
    ] },
    Curated { id: 4799, description: "A security-enabled local group membership was enumerated", severity: Severity::Information, steps: &[
        "A normal security audit event",
        "Occurs while permissions are being checked",
        "No action - monitoring only",
        "Useful for access auditing",
    ] },
    Curated { id: 4907, description: "Auditing settings on object were changed", severity: Severity::Information, steps: &[
        "Records changes to file/folder audit settings",
        "Normal during NTFS permission changes",
        "No action - informational event",
        "Useful for tracking security policy changes",
    ] },
    Curated { id: 5058, description: "Key file operation", severity: Severity::Information, steps: &[
        "A normal encryption-related event",
        "Occurs during certificate operations",
        "No action - part of cryptography auditing",
        "May be related to Windows Hello, BitLocker or certificates",
    ] },
    Curated { id: 5061, description: "Cryptographic operation", severity: Severity::Information, steps: &[
        "A standard cryptography audit event",
        "Records use of cryptographic functions",
        "No action - informational event",
        "Often related to CNG (Cryptography Next Generation)",
    ] },
    Curated { id: 5379, description: "Credential Manager credentials were read", severity: Severity::Information, steps: &[
        "Normal during logon or when saved passwords are used",
        "Records access to stored credentials",
        "No action - standard auditing",
        "Monitor only unusual access patterns",
    ] },
    // system lifecycle
    Curated { id: EVENTLOG_STARTED, description: "Event Log service was started", severity: Severity::Information, steps: &[
        "A normal event during system startup",
        "Means the event logging system works correctly",
        "No action - informational event",
        "This is the first event written after startup",
    ] },
    Curated { id: 1072, description: "User initiated a system restart or shutdown", severity: Severity::Information, steps: &[
        "A normal event - planned shutdown/restart",
        "Records who shut down the system and when",
        "No action - information only",
        "Useful for tracking user activity",
    ] },
    Curated { id: 1074, description: "System was shut down by a user or an application", severity: Severity::Information, steps: &[
        "A normal system shutdown",
        "Check the reason in the event details",
        "No action - informational event",
        "Differs from Event ID 6008 (unexpected shutdown)",
    ] },
    Curated { id: 7040, description: "Service start type was changed", severity: Severity::Information, steps: &[
        "Records changes to service configuration",
        "Check whether the change was intended",
        "No action if the change was planned",
        "Monitor changes to critical services",
    ] },
];

pub const UNKNOWN_DESCRIPTION: &str = "Unknown problem";

const FALLBACK_STEPS: [&str; 3] = [
    "Check the details in Event Viewer",
    "Review the Microsoft documentation",
    "Consider opening a thread on the Microsoft Community forum",
];

static INDEX: OnceLock<HashMap<u32, usize>> = OnceLock::new();

fn index() -> &'static HashMap<u32, usize> {
    INDEX.get_or_init(|| CURATED.iter().enumerate().map(|(i, c)| (c.id, i)).collect())
}

/// Never fails: identifiers outside the curated table get the fallback entry.
pub fn get(event_id: u32) -> KnowledgeEntry {
    match index().get(&event_id) {
        Some(&i) => {
            let c = &CURATED[i];
            KnowledgeEntry {
                event_id,
                description: Cow::Borrowed(c.description),
                default_severity: c.severity,
                remediation_steps: c.steps.iter().map(|s| Cow::Borrowed(*s)).collect(),
                known: true,
            }
        }
        None => fallback(event_id),
    }
}

pub fn description(event_id: u32) -> &'static str {
    index().get(&event_id).map(|&i| CURATED[i].description).unwrap_or(UNKNOWN_DESCRIPTION)
}

pub fn is_known(event_id: u32) -> bool { index().contains_key(&event_id) }

pub fn known_ids() -> impl Iterator<Item = u32> { CURATED.iter().map(|c| c.id) }

fn fallback(event_id: u32) -> KnowledgeEntry {
    let mut steps: Vec<Cow<'static, str>> = Vec::with_capacity(1 + FALLBACK_STEPS.len());
    steps.push(Cow::Owned(web_search_hint(event_id)));
    steps.extend(FALLBACK_STEPS.iter().map(|s| Cow::Borrowed(*s)));
    KnowledgeEntry {
        event_id,
        description: Cow::Borrowed(UNKNOWN_DESCRIPTION),
        default_severity: Severity::Warning,
        remediation_steps: steps,
        known: false,
    }
}

fn web_search_hint(event_id: u32) -> String {
    format!("Search the web for \"Windows Event ID {}\"", event_id)
}
