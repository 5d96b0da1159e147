//! Value extraction
//!
//! Reads a candidate's bit range out of a frame payload. Bit positions are byte-major:
//! position `p` lives in byte `p / 8`. Little-endian ranges read bit `p % 8` of that
//! byte and accumulate least-significant first. Big-endian ranges read bit
//! `7 - p % 8` and accumulate most-significant first, so a byte-aligned big-endian
//! range covers the same bytes as its little-endian twin.
//!
//! Bits beyond the payload read as zero.

use crate::signals::candidate::SignalCandidate;
use crate::types::{ByteOrder, Frame, ValueType};

/// Longest bit range a single extraction can return
pub const MAX_SIGNAL_BITS: usize = 64;

/// Extract a raw value from `data`
///
/// `length` is clamped to 64 bits. Signed values are sign-extended from `length` bits.
pub fn extract_raw(
    data: &[u8],
    start_bit: usize,
    length: usize,
    byte_order: ByteOrder,
    value_type: ValueType,
) -> i64 {
    let length = length.min(MAX_SIGNAL_BITS);
    if length == 0 {
        return 0;
    }

    let raw = match byte_order {
        ByteOrder::LittleEndian => extract_little_endian(data, start_bit, length),
        ByteOrder::BigEndian => extract_big_endian(data, start_bit, length),
    };

    match value_type {
        ValueType::Unsigned => raw as i64,
        ValueType::Signed => sign_extend(raw, length),
    }
}

/// Raw value of `candidate` in one frame
pub fn extract_candidate(frame: &Frame, candidate: &SignalCandidate) -> i64 {
    // Only the declared bytes count; anything past the DLC is padding
    let declared = &frame.data[..frame.data.len().min(frame.dlc)];
    extract_raw(
        declared,
        usize::from(candidate.start_bit),
        usize::from(candidate.length),
        candidate.byte_order,
        candidate.value_type,
    )
}

/// Raw and physical series of `candidate` over at most `limit` leading frames
pub fn extract_series(
    frames: &[Frame],
    candidate: &SignalCandidate,
    limit: usize,
) -> (Vec<i64>, Vec<f64>) {
    let raw: Vec<i64> = frames
        .iter()
        .take(limit)
        .map(|frame| extract_candidate(frame, candidate))
        .collect();
    let physical = raw.iter().map(|&r| candidate.physical(r as f64)).collect();
    (raw, physical)
}

/// Read `length` bits LSB-first starting at `start_bit`
fn extract_little_endian(data: &[u8], start_bit: usize, length: usize) -> u64 {
    let mut result: u64 = 0;

    for i in 0..length {
        let bit_pos = start_bit + i;
        let byte_idx = bit_pos / 8;
        let bit_in_byte = bit_pos % 8;

        if byte_idx < data.len() {
            let bit_value = (data[byte_idx] >> bit_in_byte) & 0x01;
            result |= (bit_value as u64) << i;
        }
    }

    result
}

/// Read `length` bits MSB-first, walking each byte from bit 7 down to bit 0
fn extract_big_endian(data: &[u8], start_bit: usize, length: usize) -> u64 {
    let mut result: u64 = 0;

    for i in 0..length {
        let bit_pos = start_bit + i;
        let byte_idx = bit_pos / 8;
        let bit_in_byte = 7 - (bit_pos % 8);

        if byte_idx < data.len() {
            let bit_value = (data[byte_idx] >> bit_in_byte) & 0x01;
            result |= (bit_value as u64) << (length - 1 - i);
        }
    }

    result
}

/// Sign-extend a value from N bits to 64 bits
fn sign_extend(value: u64, bit_length: usize) -> i64 {
    if bit_length == 0 || bit_length >= 64 {
        return value as i64;
    }

    let sign_bit = 1u64 << (bit_length - 1);
    if (value & sign_bit) != 0 {
        let mask = !0u64 << bit_length;
        (value | mask) as i64
    } else {
        value as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::candidate::tests::candidate;

    #[test]
    fn test_extract_little_endian_simple() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        assert_eq!(extract_little_endian(&data, 0, 8), 0xAB);
    }

    #[test]
    fn test_extract_little_endian_cross_byte() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        assert_eq!(extract_little_endian(&data, 0, 16), 0xCDAB);
        assert_eq!(extract_little_endian(&data, 4, 8), 0xDA);
    }

    #[test]
    fn test_extract_big_endian_byte_aligned() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        assert_eq!(extract_big_endian(&data, 0, 8), 0xAB);
        assert_eq!(extract_big_endian(&data, 0, 16), 0xABCD);
        assert_eq!(extract_big_endian(&data, 16, 16), 0xEF12);
    }

    #[test]
    fn test_bits_past_payload_read_zero() {
        let data = vec![0xFF];
        assert_eq!(extract_little_endian(&data, 0, 16), 0x00FF);
        assert_eq!(extract_big_endian(&data, 0, 16), 0xFF00);
        assert_eq!(extract_little_endian(&data, 40, 8), 0);
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0x7F, 8), 127);
        assert_eq!(sign_extend(0xFF, 8), -1);
        assert_eq!(sign_extend(0x8000, 16), -32768);
        assert_eq!(sign_extend(u64::MAX, 64), -1);
    }

    #[test]
    fn test_extract_raw_signed() {
        let data = vec![0xFE, 0xFF];
        let value = extract_raw(&data, 0, 16, ByteOrder::LittleEndian, ValueType::Signed);
        assert_eq!(value, -2);
        let value = extract_raw(&data, 0, 16, ByteOrder::LittleEndian, ValueType::Unsigned);
        assert_eq!(value, 0xFFFE);
    }

    #[test]
    fn test_extract_candidate_ignores_bytes_past_dlc() {
        let frame = Frame::new(0.0, 0x100, vec![0x01, 0x02]).with_dlc(1);
        let signal = candidate(0x100, 0, 16);
        assert_eq!(extract_candidate(&frame, &signal), 0x01);
    }

    #[test]
    fn test_extract_series_applies_scaling_and_limit() {
        let frames: Vec<Frame> = (0..150u8)
            .map(|i| Frame::new(i as f64, 0x100, vec![i]))
            .collect();
        let signal = candidate(0x100, 0, 8).with_scaling(0.5, 10.0);

        let (raw, physical) = extract_series(&frames, &signal, 100);
        assert_eq!(raw.len(), 100);
        assert_eq!(physical.len(), 100);
        assert_eq!(raw[4], 4);
        assert_eq!(physical[4], 12.0);
    }
}
