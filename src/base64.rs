//! Purpose: Base64 transport encoding for byte buffers and binary streams.
//! Exports: `encode`, `encode_into`, `decode`.
//! Role: Self-contained codec; the standard alphabet with `=` padding.
//! Invariants: `encode_into` emits no padding for inputs that are a multiple of three bytes.
//! Invariants: Decoding ignores ASCII whitespace and rejects any other non-alphabet character.

use std::fmt;
use std::fmt::Write as _;

use crate::error::{Error, ErrorKind};

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    // Writing to a String cannot fail.
    let _ = encode_into(&mut out, bytes);
    out
}

pub fn encode_into(out: &mut dyn fmt::Write, bytes: &[u8]) -> fmt::Result {
    let mut chunks = bytes.chunks_exact(3);
    for chunk in &mut chunks {
        let group = (chunk[0] as u32) << 16 | (chunk[1] as u32) << 8 | chunk[2] as u32;
        out.write_char(ALPHABET[(group >> 18) as usize & 63] as char)?;
        out.write_char(ALPHABET[(group >> 12) as usize & 63] as char)?;
        out.write_char(ALPHABET[(group >> 6) as usize & 63] as char)?;
        out.write_char(ALPHABET[group as usize & 63] as char)?;
    }
    match chunks.remainder() {
        [] => {}
        [a] => {
            let group = (*a as u32) << 16;
            out.write_char(ALPHABET[(group >> 18) as usize & 63] as char)?;
            out.write_char(ALPHABET[(group >> 12) as usize & 63] as char)?;
            out.write_str("==")?;
        }
        [a, b] => {
            let group = (*a as u32) << 16 | (*b as u32) << 8;
            out.write_char(ALPHABET[(group >> 18) as usize & 63] as char)?;
            out.write_char(ALPHABET[(group >> 12) as usize & 63] as char)?;
            out.write_char(ALPHABET[(group >> 6) as usize & 63] as char)?;
            out.write_char('=')?;
        }
        _ => unreachable!("chunks_exact(3) remainder is at most two bytes"),
    }
    Ok(())
}

pub fn decode(text: &str) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(text.len() / 4 * 3);
    let mut group: u32 = 0;
    let mut filled = 0u8;
    let mut padding = 0u8;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            continue;
        }
        if c == '=' {
            padding += 1;
            if padding > 2 {
                return Err(invalid("too much padding"));
            }
            continue;
        }
        if padding > 0 {
            return Err(invalid("data after padding"));
        }
        let value = match c {
            'A'..='Z' => c as u32 - 'A' as u32,
            'a'..='z' => c as u32 - 'a' as u32 + 26,
            '0'..='9' => c as u32 - '0' as u32 + 52,
            '+' => 62,
            '/' => 63,
            _ => return Err(invalid(format!("invalid character '{c}'"))),
        };
        group = group << 6 | value;
        filled += 1;
        if filled == 4 {
            out.push((group >> 16) as u8);
            out.push((group >> 8) as u8);
            out.push(group as u8);
            group = 0;
            filled = 0;
        }
    }
    match (filled, padding) {
        (0, 0) => Ok(out),
        (3, _) => {
            out.push((group >> 10) as u8);
            out.push((group >> 2) as u8);
            Ok(out)
        }
        (2, _) => {
            out.push((group >> 4) as u8);
            Ok(out)
        }
        _ => Err(invalid("truncated input")),
    }
}

fn invalid(detail: impl Into<String>) -> Error {
    Error::new(ErrorKind::Conversion)
        .with_message(format!("invalid base64: {}", detail.into()))
}
