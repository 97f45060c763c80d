//! Canonical CBOR encoding for deterministic serialization.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats
//!
//! Signatures cover encoded bytes, so every structure that is signed or
//! hashed (protected headers, certificate bodies, `Sig_structure`) goes
//! through [`to_canonical_bytes`]. Decoding accepts any well-formed CBOR and
//! keeps the original bytes wherever they are later re-verified.

use ciborium::value::{Integer, Value};

use crate::error::{CoreError, Result};

/// Encode a CBOR value to canonical bytes.
pub fn to_canonical_bytes(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value)?;
    Ok(buf)
}

/// Decode a single CBOR data item.
pub fn from_bytes(bytes: &[u8]) -> Result<Value> {
    if bytes.is_empty() {
        return Err(CoreError::malformed("empty input"));
    }
    let cursor = std::io::Cursor::new(bytes);
    ciborium::from_reader(cursor).map_err(|e| CoreError::malformed(format!("invalid CBOR: {}", e)))
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => encode_array(buf, arr)?,
        Value::Map(entries) => encode_map_canonical(buf, entries)?,
        Value::Tag(tag, inner) => {
            encode_uint(buf, 6, *tag);
            encode_value_to(buf, inner)?;
        }
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(_) => {
            return Err(CoreError::EncodingError(
                "floats not supported in canonical encoding".into(),
            ))
        }
        _ => return Err(CoreError::EncodingError("unsupported CBOR value type".into())),
    }
    Ok(())
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: Integer) {
    let n = i128::from(i);

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

fn encode_array(buf: &mut Vec<u8>, arr: &[Value]) -> Result<()> {
    encode_uint(buf, 4, arr.len() as u64);
    for item in arr {
        encode_value_to(buf, item)?;
    }
    Ok(())
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<()> {
    let mut key_value_pairs = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_buf = Vec::new();
        encode_value_to(&mut key_buf, k)?;
        key_value_pairs.push((key_buf, v));
    }

    key_value_pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, key_value_pairs.len() as u64);
    for (key_bytes, value) in key_value_pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}

// ─── Value helpers ───────────────────────────────────────────────

/// Integer-keyed map entry key.
pub fn int(n: i64) -> Value {
    Value::Integer(n.into())
}

/// Text-keyed map entry key.
pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

/// Look up a map entry by key.
pub fn map_get<'a>(map: &'a [(Value, Value)], key: &Value) -> Option<&'a Value> {
    map.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

pub fn as_map<'a>(value: &'a Value, what: &str) -> Result<&'a [(Value, Value)]> {
    match value {
        Value::Map(m) => Ok(m),
        _ => Err(CoreError::malformed(format!("{}: expected map", what))),
    }
}

pub fn as_array<'a>(value: &'a Value, what: &str) -> Result<&'a [Value]> {
    match value {
        Value::Array(a) => Ok(a),
        _ => Err(CoreError::malformed(format!("{}: expected array", what))),
    }
}

pub fn as_bytes<'a>(value: &'a Value, what: &str) -> Result<&'a [u8]> {
    match value {
        Value::Bytes(b) => Ok(b),
        _ => Err(CoreError::malformed(format!("{}: expected byte string", what))),
    }
}

pub fn as_text<'a>(value: &'a Value, what: &str) -> Result<&'a str> {
    match value {
        Value::Text(s) => Ok(s),
        _ => Err(CoreError::malformed(format!("{}: expected text string", what))),
    }
}

pub fn as_int(value: &Value, what: &str) -> Result<i128> {
    match value {
        Value::Integer(i) => Ok(i128::from(*i)),
        _ => Err(CoreError::malformed(format!("{}: expected integer", what))),
    }
}

pub fn as_bool(value: &Value, what: &str) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        _ => Err(CoreError::malformed(format!("{}: expected bool", what))),
    }
}

/// Required map entry.
pub fn require<'a>(map: &'a [(Value, Value)], key: &Value, what: &str) -> Result<&'a Value> {
    map_get(map, key).ok_or_else(|| CoreError::malformed(format!("missing {}", what)))
}
