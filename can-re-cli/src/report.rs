//! Report generation
//!
//! Renders an `AnalysisReport` as a plain-text summary for the terminal, or as JSON
//! for other tools.

use anyhow::{Context, Result};
use can_re_engine::{AnalysisReport, SignalId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

const RULE: &str = "═══════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────";

/// JSON document written by `--json-out`
#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    engine_version: &'a str,
    #[serde(flatten)]
    report: &'a AnalysisReport,
}

fn signal_name(report: &AnalysisReport, id: &SignalId) -> String {
    report
        .database
        .get_signal(id)
        .map_or_else(|| id.to_string(), |signal| signal.name.clone())
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n{}\n{}", title, THIN_RULE);
}

/// Render the text report
pub fn render_text(report: &AnalysisReport, include_statistics: bool) -> String {
    let mut out = String::new();
    let stats = report.database.stats();

    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "  CAN Reverse Engineering Report");
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "  Frames:   {}", report.total_frames);
    let _ = writeln!(out, "  IDs:      {}", report.statistics.len());
    let _ = writeln!(out, "  Messages: {}", stats.num_messages);
    let _ = writeln!(out, "  Signals:  {}", stats.num_signals);

    if include_statistics {
        section(&mut out, "📊 Message Statistics");
        let _ = writeln!(
            out,
            "{:<12} {:>7} {:>4} {:>10} {:>10} {:>10}  Cyclic",
            "ID", "Count", "DLC", "Freq (Hz)", "Cycle (ms)", "Jitter (ms)"
        );
        for s in &report.statistics {
            let _ = writeln!(
                out,
                "{:<12} {:>7} {:>4} {:>10.2} {:>10} {:>10.3}  {}",
                format!("0x{:X}", s.arbitration_id),
                s.count,
                s.dlc,
                s.frequency,
                s.estimated_cycle_time_ms,
                s.jitter * 1000.0,
                if s.is_cyclic { "yes" } else { "no" }
            );
        }
    }

    let j1979: Vec<_> = report
        .statistics
        .iter()
        .filter(|s| s.is_j1979_standard)
        .collect();
    if !j1979.is_empty() {
        section(&mut out, "🔧 J1979 (OBD-II) IDs");
        for s in j1979 {
            match (&s.j1979_parameter, &s.j1979_description) {
                (Some(name), Some(description)) => {
                    let _ = writeln!(out, "  0x{:X}  {} ({})", s.arbitration_id, name, description);
                }
                _ => {
                    let _ = writeln!(out, "  0x{:X}  diagnostic request/response", s.arbitration_id);
                }
            }
        }
    }

    section(&mut out, "📡 Detected Signals");
    if report.database.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for message in report.database.messages() {
        let _ = writeln!(
            out,
            "{} (0x{:X}, {} bytes, {} frames)",
            message.name, message.arbitration_id, message.dlc, message.frame_count
        );
        for signal in &message.signals {
            let role = report
                .classifications
                .get(&signal.id())
                .map_or_else(|| "Unknown".to_string(), ToString::to_string);
            let _ = writeln!(
                out,
                "  {:<24} bits {:>2}..{:<2} {:<8} [{} .. {}] {:<6} {}",
                signal.name,
                signal.start_bit,
                signal.bit_range().end(),
                signal.signal_type.to_string(),
                signal.min_physical,
                signal.max_physical,
                signal.unit,
                role
            );
        }
    }

    section(&mut out, "🔗 Significant Correlations");
    let mut any = false;
    for result in report.significant_correlations() {
        any = true;
        let _ = writeln!(
            out,
            "  {} ↔ {}  r={:+.3} lag={} p={:.4}  {}",
            signal_name(report, &result.signal_a),
            signal_name(report, &result.signal_b),
            result.correlation,
            result.lag,
            result.p_value,
            result.relationship
        );
    }
    if !any {
        let _ = writeln!(out, "  (none)");
    }

    if !report.causal_relationships.is_empty() {
        section(&mut out, "➡️  Causal Relationships");
        for result in &report.causal_relationships {
            let _ = writeln!(out, "  {} (r={:+.3})", result.relationship, result.correlation);
        }
    }

    section(&mut out, "🧩 Clusters");
    if report.clusters.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for cluster in &report.clusters {
        let members: Vec<String> = cluster
            .members
            .iter()
            .map(|id| signal_name(report, id))
            .collect();
        let _ = writeln!(
            out,
            "  Cluster {} ({}, {} signals): {}",
            cluster.id,
            cluster.dominant_type,
            members.len(),
            members.join(", ")
        );
    }
    if let Some(threshold) = report.cluster_threshold {
        let _ = writeln!(out, "  cut threshold: {:.4}", threshold);
    }

    out
}

/// Serialize the report with a generation timestamp
pub fn render_json(report: &AnalysisReport, generated_at: DateTime<Utc>) -> Result<String> {
    let document = JsonReport {
        generated_at: generated_at.to_rfc3339(),
        engine_version: can_re_engine::VERSION,
        report,
    };
    serde_json::to_string_pretty(&document).context("Failed to serialize report")
}

/// Write the JSON report to `path`
pub fn write_json(path: &Path, report: &AnalysisReport) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create JSON report: {:?}", path))?;
    let document = JsonReport {
        generated_at: Utc::now().to_rfc3339(),
        engine_version: can_re_engine::VERSION,
        report,
    };
    serde_json::to_writer_pretty(BufWriter::new(file), &document)
        .with_context(|| format!("Failed to write JSON report: {:?}", path))?;
    log::info!("Wrote JSON report to {:?}", path);
    Ok(())
}
