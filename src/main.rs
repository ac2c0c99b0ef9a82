use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration as StdDuration;
use chrono::Local;
use clap::{CommandFactory, Parser};
use is_terminal::IsTerminal;
mod severity;
mod knowledge;
mod source;
mod event_xml;
mod decoder;
mod evtx_source;
#[cfg(windows)]
mod windows_live;
mod reader;
mod analyzer;
mod summary;
mod text;
mod html;
mod export;
mod config;

use analyzer::{Analyzer, AnalyzerConfig, SourceProgress};
use config::{Args, LogFormat, OutputFmt};
use severity::Severity;
use source::EventLogSource;
use summary::{ReportContext, ReportSummary};

static ENABLE_COLOR: OnceLock<bool> = OnceLock::new();

const EXIT_FINDINGS: i32 = 1;
const EXIT_ERROR: i32 = 2;

fn main() {
    let mut args = Args::parse();
    if let Some(sh) = args.completions {
        let mut cmd = Args::command();
        if let Some(path) = args.completions_out.as_ref() {
            if let Ok(mut f) = std::fs::File::create(path) { clap_complete::generate(sh, &mut cmd, "EventTriage", &mut f); } else { clap_complete::generate(sh, &mut cmd, "EventTriage", &mut std::io::stdout()); }
        } else {
            clap_complete::generate(sh, &mut cmd, "EventTriage", &mut std::io::stdout());
        }
        return;
    }
    match config::load_config(args.config.as_deref()) {
        Ok(Some(cfg)) => config::apply_config(&mut args, cfg),
        Ok(None) => {}
        Err(e) => { eprintln!("Config error: {:#}", e); std::process::exit(EXIT_ERROR); }
    }
    init_logging(&args);
    log::debug!("Knowledge base holds {} curated event IDs", knowledge::known_ids().count());
    let term = std::env::var("TERM").unwrap_or_default();
    let no_color_env = std::env::var_os("NO_COLOR").is_some();
    let color_default = std::io::stdout().is_terminal() && !no_color_env && term != "dumb";
    let enable_color = if args.force_color { true } else { color_default && !args.no_color };
    let _ = ENABLE_COLOR.set(enable_color);

    let (source, discovered) = match build_source(&args) {
        Ok(x) => x,
        Err(e) => { log::error!("{:#}", e); eprintln!("{}", paint(&format!("Error: {:#}", e), "1;31")); std::process::exit(EXIT_ERROR); }
    };
    let log_sources = if !args.channels.is_empty() { args.channels.clone() } else { discovered.unwrap_or_else(analyzer::default_log_sources) };
    let cfg = AnalyzerConfig {
        hours_back: args.hours,
        log_sources,
        source_timeout: if args.source_timeout == 0 { None } else { Some(StdDuration::from_secs(args.source_timeout)) },
    };
    let analyzer = match Analyzer::new(cfg, source) {
        Ok(a) => a,
        Err(e) => { eprintln!("{}", paint(&format!("Error: {:#}", e), "1;31")); std::process::exit(EXIT_ERROR); }
    };

    let pb = if args.progress && !args.quiet {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.enable_steady_tick(StdDuration::from_millis(120));
        Some(pb)
    } else { None };
    let analysis = match pb {
        Some(pb) => {
            let analysis = analyzer.analyze_with(Local::now(), |log_name, p| match p {
                SourceProgress::Started => pb.set_message(format!("Reading {}", log_name)),
                SourceProgress::Finished { count } => pb.println(format!("{}: {} events", log_name, count)),
                SourceProgress::Failed { error } => pb.println(format!("{}: {}", log_name, error)),
            });
            pb.finish_and_clear();
            analysis
        }
        None => analyzer.analyze(),
    };
    log::info!("Window {} .. {}: {} events", analysis.not_before.format("%Y-%m-%d %H:%M:%S"), analysis.completed_at.format("%Y-%m-%d %H:%M:%S"), analysis.events.len());
    if !args.quiet {
        for f in &analysis.failures {
            log::warn!("{} skipped", f.log_name());
            eprintln!("{}", paint(&format!("Advisory: {}", f), "33"));
        }
    }

    let context = ReportContext { generated_at: Local::now(), hours_back: args.hours, log_sources: analyzer.config().log_sources.clone() };
    let summary = ReportSummary::build(&analysis.events, context);
    log::debug!("Summary: {} events, {} incident groups ({} without curated guidance), {} recommendations", summary.total, summary.incident_groups.len(), summary.uncurated_groups(), summary.recommendations.len());

    let mut write_failed = false;
    match args.output {
        OutputFmt::Text => println!("{}", text::render_text(&summary)),
        OutputFmt::Html => println!("{}", html::render_html(&summary, args.theme)),
        OutputFmt::Json => match export::summary_json(&summary) {
            Ok(s) => println!("{}", s),
            Err(e) => { log::error!("{:#}", e); write_failed = true; }
        },
    }
    if let Some(p) = args.text.as_ref() {
        match std::fs::write(p, text::render_text(&summary)) {
            Ok(_) => { if !args.quiet { println!("{}", paint(&format!("Text report written: {}", p), "1;36")); } }
            Err(e) => { log::error!("Text report write failed for {}: {}", p, e); write_failed = true; }
        }
    }
    if let Some(p) = args.html.as_ref() {
        match std::fs::write(p, html::render_html(&summary, args.theme)) {
            Ok(_) => {
                if !args.no_open { open_file_default(PathBuf::from(p)); }
                if !args.quiet { println!("{}", paint(&format!("HTML generated: {}", p), "1;36")); }
            }
            Err(e) => { log::error!("HTML write failed for {}: {}", p, e); write_failed = true; }
        }
    }
    if let Some(p) = args.json_path.as_ref() {
        if let Err(e) = export::write_json(&PathBuf::from(p), &summary) { log::error!("JSON write failed: {:#}", e); write_failed = true; } else if !args.quiet { println!("{}", paint(&format!("JSON written: {}", p), "1;36")); }
    }
    if let Some(p) = args.csv_path.as_ref() {
        if let Err(e) = export::write_csv(&PathBuf::from(p), &analysis.events) { log::error!("CSV write failed: {:#}", e); write_failed = true; } else if !args.quiet { println!("{}", paint(&format!("CSV written: {}", p), "1;36")); }
    }
    if let Some(p) = args.ndjson_path.as_ref() {
        if let Err(e) = export::write_ndjson(&PathBuf::from(p), &analysis.events) { log::error!("NDJSON write failed: {:#}", e); write_failed = true; } else if !args.quiet { println!("{}", paint(&format!("NDJSON written: {}", p), "1;36")); }
    }
    if !args.quiet && args.output != OutputFmt::Text { eprintln!("{}", tally_line(&summary)); }
    if write_failed { std::process::exit(EXIT_ERROR); }
    if args.warnings_as_errors && has_findings(&summary) { std::process::exit(EXIT_FINDINGS); }
}

fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
    if args.quiet {
        builder.filter_level(log::LevelFilter::Error);
    } else if let Some(lvl) = args.log_level {
        builder.filter_level(lvl.filter());
    } else if args.verbose > 0 {
        let f = if args.verbose >= 3 { log::LevelFilter::Trace } else if args.verbose == 2 { log::LevelFilter::Debug } else { log::LevelFilter::Info };
        builder.filter_level(f);
    }
    if let Some(fmt) = args.log_format {
        match fmt {
            LogFormat::Json => {
                builder.format(|buf, record| {
                    use std::io::Write;
                    let obj = serde_json::json!({
                        "ts": Local::now().to_rfc3339(),
                        "level": record.level().to_string(),
                        "target": record.target(),
                        "msg": record.args().to_string(),
                    });
                    writeln!(buf, "{}", obj)
                });
            }
            LogFormat::Text => {
                builder.format(|buf, record| {
                    use std::io::Write;
                    writeln!(buf, "[{:<5} {}] {}", record.level(), Local::now().format("%H:%M:%S"), record.args())
                });
            }
        }
    }
    if let Some(path) = args.log_path.as_ref() {
        match std::fs::File::create(path) {
            Ok(f) => { builder.target(env_logger::Target::Pipe(Box::new(f))); }
            Err(e) => { eprintln!("Failed to open log file {}: {}", path, e); }
        }
    }
    builder.init();
}

/// The event source plus, for `.evtx` directories, the log names found there.
fn build_source(args: &Args) -> anyhow::Result<(Arc<dyn EventLogSource>, Option<Vec<String>>)> {
    if let Some(p) = args.evtx_path.as_ref() {
        let src = evtx_source::EvtxFileSource::discover(&PathBuf::from(p), args.evtx_glob.as_deref(), args.evtx_recursive)?;
        let names = src.log_names();
        if names.is_empty() { anyhow::bail!("no .evtx files found under {}", p); }
        log::info!("Using {}", src.describe());
        return Ok((Arc::new(src), Some(names)));
    }
    live_source()
}

#[cfg(windows)]
fn live_source() -> anyhow::Result<(Arc<dyn EventLogSource>, Option<Vec<String>>)> {
    Ok((Arc::new(windows_live::WindowsLiveSource::new()), None))
}

#[cfg(not(windows))]
fn live_source() -> anyhow::Result<(Arc<dyn EventLogSource>, Option<Vec<String>>)> {
    anyhow::bail!("live event logs are only available on Windows; pass --evtx-path with exported .evtx files")
}

fn has_findings(rep: &ReportSummary) -> bool {
    [Severity::Critical, Severity::Error, Severity::Warning].into_iter().any(|s| rep.count_of(s) > 0)
}

fn tally_line(rep: &ReportSummary) -> String {
    let parts: Vec<String> = rep.severity_histogram.iter()
        .map(|c| paint(&format!("{}: {}", c.severity, c.count), c.severity.ansi_code()))
        .collect();
    if parts.is_empty() { "No events in window".to_string() } else { parts.join("  ") }
}

fn paint(s: &str, code: &str) -> String {
    if *ENABLE_COLOR.get().unwrap_or(&true) { format!("\x1b[{}m{}\x1b[0m", code, s) } else { s.to_string() }
}

#[cfg(target_os = "windows")]
fn open_file_default(p: PathBuf) {
    let mut s = p.to_string_lossy().into_owned();
    if s.starts_with("\\\\?\\") { s = s.trim_start_matches("\\\\?\\").to_string(); }
    let _ = std::process::Command::new("explorer").arg(&s).spawn()
        .or_else(|_| std::process::Command::new("cmd").args(["/C", "start", "", &s]).spawn())
        .map_err(|e| log::error!("Failed to open file {}: {}", s, e));
}

#[cfg(not(target_os = "windows"))]
fn open_file_default(p: PathBuf) {
    let s = p.to_string_lossy().into_owned();
    let _ = std::process::Command::new("xdg-open").arg(&s).spawn().map_err(|e| log::error!("Failed to open file {}: {}", s, e));
}
