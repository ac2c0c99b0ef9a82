use anyhow::Context;
use clap::{ArgAction, ColorChoice, Parser, ValueEnum};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};
use crate::analyzer::{DEFAULT_HOURS_BACK, DEFAULT_SOURCE_TIMEOUT_SECS};
use crate::html::Theme;

pub const DEFAULT_CONFIG_FILE: &str = "EventTriage.toml";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFmt { #[default] Text, Html, Json }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel { Error, Warn, Info, Debug, Trace }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat { Text, Json }

impl LogLevel {
    pub fn filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "EventTriage",
    about = "Windows event log triage and report generator",
    long_about = "Reads the System, Application and Security event logs over a trailing window, classifies events by severity, matches known event IDs against a curated knowledge base and writes text or HTML reports with remediation steps.",
    after_long_help = "Examples:\n  EventTriage --hours 48\n  EventTriage --channels System,Application --html report.html\n  EventTriage --evtx-path D:\\exported --evtx-glob *.evtx --text report.txt\n  EventTriage --output json --csv-path events.csv",
    color = ColorChoice::Auto
)]
pub struct Args {
    /// Lookback window in hours
    #[arg(long, short = 'H', default_value_t = DEFAULT_HOURS_BACK, value_parser = clap::value_parser!(u32).range(1..))]
    pub hours: u32,
    /// Logs to read, in order (default System,Application,Security)
    #[arg(long, num_args = 0.., value_delimiter = ',')]
    pub channels: Vec<String>,
    /// Read exported .evtx files (a file or a directory) instead of the live logs
    #[arg(long, short = 'e')]
    pub evtx_path: Option<String>,
    #[arg(long)]
    pub evtx_glob: Option<String>,
    #[arg(long, default_value_t = false)]
    pub evtx_recursive: bool,
    /// Per-log read timeout in seconds; 0 disables it
    #[arg(long, default_value_t = DEFAULT_SOURCE_TIMEOUT_SECS)]
    pub source_timeout: u64,
    /// Report printed to stdout
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    pub output: OutputFmt,
    /// Write the plain-text report to this path
    #[arg(long)]
    pub text: Option<String>,
    /// Write the HTML report to this path
    #[arg(long)]
    pub html: Option<String>,
    #[arg(long, short = 'j')]
    pub json_path: Option<String>,
    #[arg(long)]
    pub csv_path: Option<String>,
    #[arg(long)]
    pub ndjson_path: Option<String>,
    #[arg(long, value_enum, default_value = "light")]
    pub theme: Theme,
    #[arg(long, default_value_t = false)]
    pub no_open: bool,
    #[arg(long, default_value_t = false)]
    pub progress: bool,
    #[arg(long, short = 'C', default_value_t = false)]
    pub no_color: bool,
    #[arg(long, default_value_t = false)]
    pub force_color: bool,
    #[arg(long)]
    pub log_level: Option<LogLevel>,
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,
    #[arg(long)]
    pub log_path: Option<String>,
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,
    #[arg(short = 'q', long, default_value_t = false)]
    pub quiet: bool,
    /// Exit with status 1 when any critical, error or warning event is found
    #[arg(long, default_value_t = false)]
    pub warnings_as_errors: bool,
    #[arg(long, value_enum)]
    pub completions: Option<Shell>,
    #[arg(long)]
    pub completions_out: Option<String>,
    #[arg(long)]
    pub config: Option<String>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            hours: DEFAULT_HOURS_BACK,
            channels: vec![],
            evtx_path: None,
            evtx_glob: None,
            evtx_recursive: false,
            source_timeout: DEFAULT_SOURCE_TIMEOUT_SECS,
            output: OutputFmt::Text,
            text: None,
            html: None,
            json_path: None,
            csv_path: None,
            ndjson_path: None,
            theme: Theme::Light,
            no_open: false,
            progress: false,
            no_color: false,
            force_color: false,
            log_level: None,
            log_format: None,
            log_path: None,
            verbose: 0,
            quiet: false,
            warnings_as_errors: false,
            completions: None,
            completions_out: None,
            config: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub hours: Option<u32>,
    pub channels: Option<Vec<String>>,
    pub evtx_path: Option<String>,
    pub evtx_glob: Option<String>,
    pub evtx_recursive: Option<bool>,
    pub source_timeout: Option<u64>,
    pub output: Option<OutputFmt>,
    pub text: Option<String>,
    pub html: Option<String>,
    pub json_path: Option<String>,
    pub csv_path: Option<String>,
    pub ndjson_path: Option<String>,
    pub theme: Option<Theme>,
    pub no_open: Option<bool>,
    pub progress: Option<bool>,
    pub force_color: Option<bool>,
    pub log_level: Option<LogLevel>,
    pub log_format: Option<LogFormat>,
    pub log_path: Option<String>,
    pub warnings_as_errors: Option<bool>,
}

/// `explicit` must exist; the default file is optional.
pub fn load_config(explicit: Option<&str>) -> anyhow::Result<Option<AppConfig>> {
    let path = match explicit {
        Some(p) => p,
        None if std::path::Path::new(DEFAULT_CONFIG_FILE).is_file() => DEFAULT_CONFIG_FILE,
        None => return Ok(None),
    };
    let s = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path))?;
    let cfg = toml::from_str::<AppConfig>(&s).with_context(|| format!("parsing config {}", path))?;
    Ok(Some(cfg))
}

/// Fills only the options still at their command-line defaults.
pub fn apply_config(args: &mut Args, cfg: AppConfig) {
    if args.hours == DEFAULT_HOURS_BACK && let Some(v) = cfg.hours && v >= 1 { args.hours = v; }
    if args.channels.is_empty() && let Some(v) = cfg.channels { args.channels = v; }
    if args.evtx_path.is_none() && let Some(v) = cfg.evtx_path { args.evtx_path = Some(v); }
    if args.evtx_glob.is_none() && let Some(v) = cfg.evtx_glob { args.evtx_glob = Some(v); }
    if !args.evtx_recursive && let Some(v) = cfg.evtx_recursive { args.evtx_recursive = v; }
    if args.source_timeout == DEFAULT_SOURCE_TIMEOUT_SECS && let Some(v) = cfg.source_timeout { args.source_timeout = v; }
    if args.output == OutputFmt::Text && let Some(v) = cfg.output { args.output = v; }
    if args.text.is_none() && let Some(v) = cfg.text { args.text = Some(v); }
    if args.html.is_none() && let Some(v) = cfg.html { args.html = Some(v); }
    if args.json_path.is_none() && let Some(v) = cfg.json_path { args.json_path = Some(v); }
    if args.csv_path.is_none() && let Some(v) = cfg.csv_path { args.csv_path = Some(v); }
    if args.ndjson_path.is_none() && let Some(v) = cfg.ndjson_path { args.ndjson_path = Some(v); }
    if args.theme == Theme::Light && let Some(v) = cfg.theme { args.theme = v; }
    if !args.no_open && let Some(v) = cfg.no_open { args.no_open = v; }
    if !args.progress && let Some(v) = cfg.progress { args.progress = v; }
    if !args.force_color && let Some(v) = cfg.force_color { args.force_color = v; }
    if args.log_level.is_none() && let Some(v) = cfg.log_level { args.log_level = Some(v); }
    if args.log_format.is_none() && let Some(v) = cfg.log_format { args.log_format = Some(v); }
    if args.log_path.is_none() && let Some(v) = cfg.log_path { args.log_path = Some(v); }
    if !args.warnings_as_errors && let Some(v) = cfg.warnings_as_errors { args.warnings_as_errors = v; }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_fills_defaults_only() {
        let mut args = Args { hours: 6, ..Default::default() };
        let cfg: AppConfig = toml::from_str("hours = 48\nchannels = [\"System\"]\ntheme = \"dark\"\noutput = \"html\"\nsource_timeout = 0\n").unwrap();
        apply_config(&mut args, cfg);
        assert_eq!(args.hours, 6);
        assert_eq!(args.channels, vec!["System"]);
        assert_eq!(args.theme, Theme::Dark);
        assert_eq!(args.output, OutputFmt::Html);
        assert_eq!(args.source_timeout, 0);
    }

    #[test]
    fn zero_hours_in_config_is_ignored() {
        let mut args = Args::default();
        apply_config(&mut args, AppConfig { hours: Some(0), ..Default::default() });
        assert_eq!(args.hours, DEFAULT_HOURS_BACK);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<AppConfig>("colour = true").is_err());
    }

    #[test]
    fn load_config_reads_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("cfg.toml");
        std::fs::write(&p, "hours = 12\nlog_level = \"debug\"\n").unwrap();
        let cfg = load_config(Some(p.to_str().unwrap())).unwrap().unwrap();
        assert_eq!(cfg.hours, Some(12));
        assert!(matches!(cfg.log_level, Some(LogLevel::Debug)));
        assert!(load_config(Some(dir.path().join("missing.toml").to_str().unwrap())).is_err());
    }

    #[test]
    fn cli_parses_core_flags() {
        let a = Args::try_parse_from(["EventTriage", "-H", "48", "--channels", "System,Application", "--theme", "dark", "--source-timeout", "0"]).unwrap();
        assert_eq!(a.hours, 48);
        assert_eq!(a.channels, vec!["System", "Application"]);
        assert_eq!(a.theme, Theme::Dark);
        assert_eq!(a.source_timeout, 0);
        assert!(Args::try_parse_from(["EventTriage", "--hours", "0"]).is_err());
    }

    #[test]
    fn cli_defaults_match_default_impl() {
        let a = Args::try_parse_from(["EventTriage"]).unwrap();
        let d = Args::default();
        assert_eq!(a.hours, d.hours);
        assert_eq!(a.source_timeout, d.source_timeout);
        assert_eq!(a.output, d.output);
        assert_eq!(a.theme, d.theme);
    }
}
