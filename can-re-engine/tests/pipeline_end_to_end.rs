//! End-to-end run over a synthetic capture written as CSV

use can_re_engine::{
    render_dbc, AnalysisConfig, Analyzer, CancelToken, DetectionPolicy, SignalId, SignalType,
};
use std::collections::BTreeSet;
use std::io::Write;
use tempfile::NamedTempFile;

const MESSAGE_ID: u32 = 0x1A0;
const FRAMES: usize = 100;

/// Byte 0: flag toggling 0x00/0xFF every five frames
/// Byte 1: mirror of byte 2
/// Bytes 2-3: little-endian counter 200, 203, 206, ...
fn payload(i: usize) -> [u8; 4] {
    let counter = 200 + 3 * i as u16;
    let [low, high] = counter.to_le_bytes();
    let flag = if (i / 5) % 2 == 0 { 0x00 } else { 0xFF };
    [flag, 0xFF - low, low, high]
}

fn capture() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "timestamp,id,dlc,data").unwrap();
    for i in 0..FRAMES {
        let bytes: Vec<String> = payload(i).iter().map(|b| format!("{:02X}", b)).collect();
        writeln!(
            file,
            "{:.3},{:X},4,{}",
            i as f64 * 0.01,
            MESSAGE_ID,
            bytes.join(" ")
        )
        .unwrap();
    }
    // A lone frame on another id never yields candidates
    writeln!(file, "0.500,7DF,2,02 01").unwrap();
    file.flush().unwrap();
    file
}

fn id(start_bit: u16, length: u16) -> SignalId {
    SignalId {
        arbitration_id: MESSAGE_ID,
        start_bit,
        length,
    }
}

fn analyzer() -> Analyzer {
    let _ = env_logger::builder().is_test(true).try_init();
    let file = capture();
    let mut analyzer = Analyzer::new();
    assert_eq!(analyzer.load_csv(file.path()).unwrap(), FRAMES + 1);
    analyzer
}

#[test]
fn test_statistics() {
    let analyzer = analyzer();
    let stats = analyzer.statistics();

    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].arbitration_id, MESSAGE_ID);
    assert_eq!(stats[0].count, FRAMES);
    assert_eq!(stats[0].dlc, 4);
    assert!(stats[0].is_cyclic);
    assert_eq!(stats[0].estimated_cycle_time_ms, 10);
    assert_eq!(stats[1].arbitration_id, 0x7DF);
    assert_eq!(stats[1].count, 1);
    assert!(!stats[1].is_cyclic);
}

#[test]
fn test_quick_scan_pipeline() {
    let analyzer = analyzer();
    let report = analyzer
        .run(&AnalysisConfig::new(), &CancelToken::new())
        .unwrap();

    // The counter's high byte only takes 0 and 1; every window overlaps an accepted byte
    let message = report.database.get_message(MESSAGE_ID).unwrap();
    let ids: Vec<SignalId> = message.signals.iter().map(|s| s.id()).collect();
    assert_eq!(ids, vec![id(0, 8), id(8, 8), id(16, 8)]);
    assert!(report.database.get_message(0x7DF).is_none());

    let flag = report.database.get_signal(&id(0, 8)).unwrap();
    assert_eq!(flag.signal_type, SignalType::Boolean);
    assert_eq!(flag.distinct_values, 2);
    let counter = report.database.get_signal(&id(16, 8)).unwrap();
    assert_eq!(counter.signal_type, SignalType::Integer);
    assert_eq!(counter.raw_values.len(), FRAMES);
    assert_eq!(counter.raw_values[0], 200);

    // Mirror and counter are perfectly anti-correlated
    let mirror = report
        .correlations
        .iter()
        .find(|r| r.signal_a == id(8, 8) && r.signal_b == id(16, 8))
        .unwrap();
    assert!(mirror.correlation < -0.99);
    assert!(mirror.is_significant);
    assert!(mirror.p_value < 0.05);
    assert!(mirror.relationship.starts_with("Strong negative"));

    for pair in report.correlations.windows(2) {
        assert!(pair[0].correlation.abs() >= pair[1].correlation.abs());
    }

    // Every signal lands in exactly one cluster
    let mut seen = BTreeSet::new();
    for cluster in &report.clusters {
        for member in &cluster.members {
            assert!(seen.insert(*member));
        }
    }
    assert_eq!(seen, ids.iter().copied().collect());
    assert_eq!(report.dendrogram.len(), ids.len() - 1);
    assert_eq!(report.classifications.len(), ids.len());
}

#[test]
fn test_pipeline_is_deterministic() {
    let analyzer = analyzer();
    let config = AnalysisConfig::new();
    let first = analyzer.run(&config, &CancelToken::new()).unwrap();
    let second = analyzer.run(&config, &CancelToken::new()).unwrap();

    assert_eq!(first.database, second.database);
    assert_eq!(first.correlations, second.correlations);
    assert_eq!(first.clusters, second.clusters);
    assert_eq!(first.dendrogram, second.dendrogram);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_full_series_policy() {
    let analyzer = analyzer();
    let config = AnalysisConfig::new().with_policy(DetectionPolicy::FullSeries);
    let db = analyzer.detect(&config, &CancelToken::new()).unwrap();

    let message = db.get_message(MESSAGE_ID).unwrap();
    // Range 1 on the high byte is below the full-series byte threshold too
    assert!(message.signals.iter().all(|s| s.start_bit != 24));
    for pair in message.signals.windows(2) {
        assert!(pair[0].start_bit < pair[1].start_bit);
        assert!(!pair[0].overlaps(&pair[1]));
    }
}

#[test]
fn test_report_exports() {
    let analyzer = analyzer();
    let report = analyzer
        .run(&AnalysisConfig::new(), &CancelToken::new())
        .unwrap();

    let dbc = render_dbc(&report.database, "RE");
    assert!(dbc.contains("BO_ 416 ID_1A0: 4 RE"));
    assert!(dbc.contains(" SG_ ID_1A0_Byte0 : 0|8@1+"));
    assert!(dbc.contains(" SG_ ID_1A0_Byte2 : 16|8@1+"));

    let json: serde_json::Value = serde_json::to_value(&report).unwrap();
    assert_eq!(json["total_frames"], 101);
    assert!(json["classifications"].get("0x1A0:16|8").is_some());
}
