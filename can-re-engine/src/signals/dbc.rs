//! DBC file writer
//!
//! Renders a detected signal database as a Vector DBC file. Messages come out in
//! ascending id order and signals in start-bit order. Big-endian signals use the
//! Motorola start-bit convention (the bit number of their most significant bit).

use std::fmt::Write as _;
use std::path::Path;

use crate::signals::candidate::SignalCandidate;
use crate::signals::database::{DetectedMessage, SignalDatabase};
use crate::types::{ByteOrder, Result, ValueType};

/// Receiver used for every signal
const DEFAULT_RECEIVER: &str = "Vector__XXX";

/// Bit 31 of a DBC message id marks the extended frame format
const EXTENDED_FRAME_FLAG: u32 = 0x8000_0000;

/// Render `db` as DBC text, with `node` as the transmitter of every message
pub fn render_dbc(db: &SignalDatabase, node: &str) -> String {
    let node = dbc_identifier(node);
    let mut out = String::new();

    out.push_str("VERSION \"\"\n\n");
    out.push_str("NS_ :\n\n");
    out.push_str("BS_:\n\n");
    let _ = writeln!(out, "BU_: {}\n", node);

    for message in db.messages() {
        let _ = writeln!(
            out,
            "BO_ {} {}: {} {}",
            dbc_message_id(message),
            dbc_identifier(&message.name),
            message.dlc,
            node
        );
        for signal in &message.signals {
            let _ = writeln!(out, "{}", signal_line(signal));
        }
        out.push('\n');
    }

    for message in db.messages() {
        for signal in &message.signals {
            if let Some(table) = &signal.value_table {
                let _ = write!(
                    out,
                    "VAL_ {} {}",
                    dbc_message_id(message),
                    dbc_identifier(&signal.name)
                );
                for (raw, label) in table {
                    let _ = write!(out, " {} \"{}\"", raw, escape(label));
                }
                out.push_str(" ;\n");
            }
        }
    }

    out
}

/// Write `db` to a DBC file
pub fn write_dbc(path: &Path, db: &SignalDatabase, node: &str) -> Result<()> {
    log::info!("Writing DBC file: {:?}", path);
    std::fs::write(path, render_dbc(db, node))?;
    let stats = db.stats();
    log::info!(
        "Wrote {} messages / {} signals to {:?}",
        stats.num_messages,
        stats.num_signals,
        path
    );
    Ok(())
}

/// Message id as written to the file, with the extended flag when needed
fn dbc_message_id(message: &DetectedMessage) -> u32 {
    if message.is_extended || message.arbitration_id > 0x7FF {
        message.arbitration_id | EXTENDED_FRAME_FLAG
    } else {
        message.arbitration_id
    }
}

fn signal_line(signal: &SignalCandidate) -> String {
    let (start_bit, order_flag) = match signal.byte_order {
        ByteOrder::LittleEndian => (u32::from(signal.start_bit), 1),
        ByteOrder::BigEndian => (motorola_start_bit(signal.start_bit), 0),
    };
    let sign = match signal.value_type {
        ValueType::Unsigned => '+',
        ValueType::Signed => '-',
    };

    format!(
        " SG_ {} : {}|{}@{}{} ({},{}) [{}|{}] \"{}\" {}",
        dbc_identifier(&signal.name),
        start_bit,
        signal.length,
        order_flag,
        sign,
        signal.factor,
        signal.offset,
        signal.min_physical,
        signal.max_physical,
        escape(&signal.unit),
        DEFAULT_RECEIVER
    )
}

/// Motorola start bit of a range whose most significant bit sits at byte-major
/// position `start_bit`
fn motorola_start_bit(start_bit: u16) -> u32 {
    let start = u32::from(start_bit);
    (start / 8) * 8 + (7 - start % 8)
}

/// Map a name onto the DBC identifier alphabet
fn dbc_identifier(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.chars().next().map_or(true, |c| c.is_ascii_digit()) {
        ident.insert_str(0, "S_");
    }
    ident
}

fn escape(text: &str) -> String {
    text.replace('"', "'")
}
