use crate::error::SyncError;

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Encode/decode applied independently to each `delim`-separated segment.
///
/// Diffs from an obfuscated remote carry encoded paths, so every segment is
/// decoded before it touches the mirror.
pub trait PathCodec {
    fn encode(&self, text: &str, delim: &str) -> String;
    fn decode(&self, text: &str, delim: &str) -> Result<String, SyncError>;
}

/// Base-62 positional numeral encoding of each segment's bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base62Codec;

/// Identity codec for remotes that store plain paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainCodec;

impl PathCodec for Base62Codec {
    fn encode(&self, text: &str, delim: &str) -> String {
        text.split(delim)
            .map(|segment| encode_bytes(segment.as_bytes()))
            .collect::<Vec<_>>()
            .join(delim)
    }

    fn decode(&self, text: &str, delim: &str) -> Result<String, SyncError> {
        let segments = text
            .split(delim)
            .map(decode_segment)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(segments.join(delim))
    }
}

impl PathCodec for PlainCodec {
    fn encode(&self, text: &str, _delim: &str) -> String {
        text.to_string()
    }

    fn decode(&self, text: &str, _delim: &str) -> Result<String, SyncError> {
        Ok(text.to_string())
    }
}

fn encode_bytes(input: &[u8]) -> String {
    // Leading zero bytes carry no numeric weight, so they are kept as '0's.
    let zeros = input.iter().take_while(|&&b| b == 0).count();

    // Little-endian base-62 digits.
    let mut digits: Vec<u8> = Vec::with_capacity(input.len() * 2);
    for &byte in &input[zeros..] {
        let mut carry = u32::from(byte);
        for digit in digits.iter_mut() {
            carry += u32::from(*digit) << 8;
            *digit = (carry % 62) as u8;
            carry /= 62;
        }
        while carry > 0 {
            digits.push((carry % 62) as u8);
            carry /= 62;
        }
    }

    let mut out = String::with_capacity(zeros + digits.len());
    out.extend(std::iter::repeat('0').take(zeros));
    out.extend(digits.iter().rev().map(|&d| ALPHABET[d as usize] as char));
    out
}

fn digit_value(symbol: u8) -> Option<u32> {
    match symbol {
        b'0'..=b'9' => Some(u32::from(symbol - b'0')),
        b'A'..=b'Z' => Some(u32::from(symbol - b'A') + 10),
        b'a'..=b'z' => Some(u32::from(symbol - b'a') + 36),
        _ => None,
    }
}

fn decode_segment(segment: &str) -> Result<String, SyncError> {
    let zeros = segment.bytes().take_while(|&c| c == b'0').count();

    // Little-endian base-256 bytes.
    let mut bytes: Vec<u8> = Vec::with_capacity(segment.len());
    for symbol in segment.bytes().skip(zeros) {
        let mut carry = digit_value(symbol).ok_or_else(|| SyncError::PathDecode {
            segment: segment.to_string(),
            reason: format!("'{}' is not a base-62 symbol", symbol as char),
        })?;
        for byte in bytes.iter_mut() {
            carry += u32::from(*byte) * 62;
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }

    let mut out = vec![0u8; zeros];
    out.extend(bytes.iter().rev());
    String::from_utf8(out).map_err(|e| SyncError::PathDecode {
        segment: segment.to_string(),
        reason: e.to_string(),
    })
}
