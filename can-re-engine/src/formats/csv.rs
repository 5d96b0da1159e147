//! CSV capture reader
//!
//! Reads captures exported as CSV with a header row. Columns are found by name,
//! case-insensitively:
//!
//! | Column | Aliases | Format |
//! |--------|---------|--------|
//! | `timestamp` | `time` | seconds, decimal |
//! | `id` | `arbitration_id`, `can_id` | hex, with or without `0x` |
//! | `data` | `payload` | whitespace-separated hex bytes |
//! | `dlc` (optional) | `length` | decimal |
//! | `channel` (optional) | | decimal |

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::formats::LogFileParser;
use crate::types::{Frame, InferenceError, Result};

const TIMESTAMP_COLUMNS: &[&str] = &["timestamp", "time"];
const ID_COLUMNS: &[&str] = &["id", "arbitration_id", "can_id"];
const DATA_COLUMNS: &[&str] = &["data", "payload"];
const DLC_COLUMNS: &[&str] = &["dlc", "length"];
const CHANNEL_COLUMNS: &[&str] = &["channel"];

/// Column positions resolved from the header row
#[derive(Debug, Clone, Copy)]
struct Columns {
    timestamp: usize,
    id: usize,
    data: usize,
    dlc: Option<usize>,
    channel: Option<usize>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> Result<Self> {
        let find = |aliases: &[&str]| {
            headers.iter().position(|header| {
                aliases
                    .iter()
                    .any(|alias| header.trim().eq_ignore_ascii_case(alias))
            })
        };
        let required = |aliases: &[&str]| {
            find(aliases).ok_or_else(|| {
                InferenceError::LogParseError(format!("CSV header is missing a '{}' column", aliases[0]))
            })
        };

        Ok(Self {
            timestamp: required(TIMESTAMP_COLUMNS)?,
            id: required(ID_COLUMNS)?,
            data: required(DATA_COLUMNS)?,
            dlc: find(DLC_COLUMNS),
            channel: find(CHANNEL_COLUMNS),
        })
    }

    fn frame(&self, record: &csv::StringRecord) -> Result<Frame> {
        let line = record.position().map_or(0, |p| p.line());
        let field = |index: usize, name: &str| {
            record.get(index).ok_or_else(|| {
                InferenceError::LogParseError(format!("line {}: missing {} field", line, name))
            })
        };
        let invalid = |name: &str, value: &str| {
            InferenceError::LogParseError(format!("line {}: invalid {} {:?}", line, name, value))
        };

        let timestamp_text = field(self.timestamp, "timestamp")?;
        let timestamp: f64 = timestamp_text
            .parse()
            .map_err(|_| invalid("timestamp", timestamp_text))?;

        let id_text = field(self.id, "id")?;
        let arbitration_id = parse_hex_id(id_text).ok_or_else(|| invalid("id", id_text))?;

        let data_text = field(self.data, "data")?;
        let data = parse_hex_bytes(data_text).ok_or_else(|| invalid("data", data_text))?;

        let mut frame = Frame::new(timestamp, arbitration_id, data);
        if let Some(index) = self.dlc {
            let text = field(index, "dlc")?;
            if !text.is_empty() {
                let dlc = text.parse().map_err(|_| invalid("dlc", text))?;
                frame = frame.with_dlc(dlc);
            }
        }
        if let Some(index) = self.channel {
            let text = field(index, "channel")?;
            if !text.is_empty() {
                let channel = text.parse().map_err(|_| invalid("channel", text))?;
                frame = frame.with_channel(channel);
            }
        }
        Ok(frame)
    }
}

fn parse_hex_id(text: &str) -> Option<u32> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u32::from_str_radix(digits, 16).ok()
}

fn parse_hex_bytes(text: &str) -> Option<Vec<u8>> {
    text.split_whitespace()
        .map(|byte| u8::from_str_radix(byte, 16).ok())
        .collect()
}

/// Iterator over the frames of a CSV capture
pub struct CsvFrameReader<R: Read = File> {
    records: csv::StringRecordsIntoIter<R>,
    columns: Columns,
}

impl<R: Read> CsvFrameReader<R> {
    /// Read frames from any CSV source with a header row
    pub fn from_reader(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        let headers = reader
            .headers()
            .map_err(|e| InferenceError::LogParseError(format!("Failed to read CSV header: {}", e)))?;
        let columns = Columns::resolve(headers)?;

        Ok(Self {
            records: reader.into_records(),
            columns,
        })
    }
}

impl LogFileParser for CsvFrameReader<File> {
    fn parse(path: &Path) -> Result<Self> {
        log::info!("Parsing CSV file: {:?}", path);
        let file = File::open(path)?;
        Self::from_reader(file)
    }
}

impl<R: Read> Iterator for CsvFrameReader<R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(
            record
                .map_err(|e| InferenceError::LogParseError(format!("Failed to read CSV record: {}", e)))
                .and_then(|record| self.columns.frame(&record)),
        )
    }
}
