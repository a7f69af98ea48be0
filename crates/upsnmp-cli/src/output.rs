use std::fmt::Write as _;

use anyhow::Result;
use upsnmp_core::{DeviceStatus, DialectState, Provenance, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
    Ndjson,
}

pub fn print_status(status: &DeviceStatus, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(status)?),
        OutputFormat::Ndjson => println!("{}", serde_json::to_string(status)?),
        OutputFormat::Human => print!("{}", render_human(status)),
    }
    Ok(())
}

pub fn render_human(status: &DeviceStatus) -> String {
    let mut out = String::new();
    match status {
        DeviceStatus::Pending => {
            let _ = writeln!(out, "=== UPS: waiting for first poll ===");
        }
        DeviceStatus::Unavailable { reason, since } => {
            let _ = writeln!(out, "=== UPS unavailable ===");
            let _ = writeln!(out, "Since:      {}", since.to_rfc3339());
            let _ = writeln!(out, "Reason:     {reason}");
        }
        DeviceStatus::Available(snapshot) => render_snapshot(&mut out, snapshot),
    }
    out
}

fn render_snapshot(out: &mut String, snapshot: &Snapshot) {
    let device = &snapshot.device;
    let _ = writeln!(out, "=== UPS Snapshot: {} ===", device.name);
    let _ = writeln!(out, "Time:       {}", snapshot.ts.to_rfc3339());
    let _ = writeln!(out, "Host:       {}:{} (entry {})", device.host, device.port, snapshot.entry_id);

    let dialect = match &snapshot.dialect {
        DialectState::Confirmed { dialect, .. } => dialect.to_string(),
        DialectState::Probing => "probing".to_string(),
        DialectState::Unknown => "unknown".to_string(),
    };
    let _ = writeln!(out, "Dialect:    {dialect}");

    let meta = &device.metadata;
    let ident = [&meta.manufacturer, &meta.model, &meta.serial_number, &meta.firmware]
        .into_iter()
        .flatten()
        .cloned()
        .collect::<Vec<_>>();
    if !ident.is_empty() {
        let _ = writeln!(out, "Identity:   {}", ident.join(" / "));
    }

    let quality = &snapshot.quality;
    let _ = writeln!(
        out,
        "Quality:    cadence={} poll_ms={} lock_wait_ms={} ok={} err={} failures={}",
        quality.cadence,
        quality.poll_ms,
        quality.lock_wait_ms,
        quality.polls_ok,
        quality.polls_err,
        quality.consecutive_failures
    );

    let _ = writeln!(out, "Metrics:");
    for (metric, reading) in &snapshot.metrics {
        let tag = match reading.provenance {
            Provenance::Fast => "fast",
            Provenance::Slow => "slow",
            Provenance::Derived => "derived",
        };
        let _ = writeln!(
            out,
            "  {:<20} {:<16} [{tag} @ {}]",
            metric.as_str(),
            reading.value.to_string(),
            reading.updated_at.format("%H:%M:%S")
        );
    }
}
