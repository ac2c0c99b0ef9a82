use std::io::Write;
use std::path::Path;
use anyhow::Context;
use crate::reader::Event;
use crate::summary::ReportSummary;

const TIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub fn summary_json(rep: &ReportSummary) -> anyhow::Result<String> {
    serde_json::to_string_pretty(rep).context("serializing report summary")
}

pub fn write_json(path: &Path, rep: &ReportSummary) -> anyhow::Result<()> {
    std::fs::write(path, summary_json(rep)?).with_context(|| format!("writing {}", path.to_string_lossy()))
}

/// One row per event, analyzer order.
pub fn write_csv(path: &Path, events: &[Event]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.to_string_lossy()))?;
    wtr.write_record(["time", "severity", "log", "source", "event_id", "category", "message"])?;
    for e in events {
        wtr.write_record([
            e.time.format(TIME_FMT).to_string(),
            e.severity.name().to_string(),
            e.log_name.clone(),
            e.source.clone(),
            e.event_id.to_string(),
            e.category.to_string(),
            e.message.replace('\n', " "),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_ndjson(path: &Path, events: &[Event]) -> anyhow::Result<()> {
    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.to_string_lossy()))?;
    let mut out = std::io::BufWriter::new(file);
    for e in events {
        let obj = serde_json::json!({
            "time": e.time.format(TIME_FMT).to_string(),
            "severity": e.severity,
            "log": e.log_name,
            "source": e.source,
            "event_id": e.event_id,
            "category": e.category,
            "message": e.message,
        });
        writeln!(out, "{}", obj)?;
    }
    out.flush()?;
    Ok(())
}
