//! Tnetstring wire codec.
//!
//! Every publish payload is serialized as a tnetstring before it reaches the
//! socket. The format is length-prefixed and self-delimiting:
//!
//! ```text
//! <len>:<payload><tag>
//!
//! 5:hello,          byte string
//! 2:42#             integer
//! 3:1.5^            float
//! 4:true!           boolean
//! 0:~               null
//! 8:1:a,1:b,]       list
//! 11:2:id,3:abc,}   dict (key, value, key, value, ...)
//! ```
//!
//! Encoding is canonical: dictionaries are written in sorted key order and
//! lengths never carry leading zeros, so equal values always encode to equal
//! bytes.
//!
//! Decoding is zero-copy for byte strings: returned `Value::Bytes` slices
//! share the input buffer.

use bytes::{BufMut, Bytes, BytesMut};
use std::collections::BTreeMap;
use thiserror::Error;

/// Longest accepted length prefix (in digits).
const MAX_LENGTH_DIGITS: usize = 9;

/// Deepest accepted nesting of lists and dicts.
const MAX_DEPTH: usize = 64;

/// Tnetstring codec errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TnetstringError {
    #[error("Invalid length prefix")]
    InvalidLength,

    #[error("Truncated input: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Unknown type tag {0:#04x}")]
    UnknownTag(u8),

    #[error("Invalid payload for type tag '{tag}'")]
    InvalidPayload { tag: char },

    #[error("Dictionary keys must be UTF-8 byte strings")]
    InvalidKey,

    #[error("Trailing data after value: {0} bytes")]
    TrailingData(usize),

    #[error("Float is not finite")]
    NonFiniteFloat,

    #[error("Nesting too deep")]
    TooDeep,
}

/// Result type alias for tnetstring operations
pub type Result<T> = std::result::Result<T, TnetstringError>;

/// Dictionary type. Ordered so encoding is deterministic.
pub type Dict = BTreeMap<String, Value>;

/// A tnetstring value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Bytes(Bytes),
    List(Vec<Value>),
    Dict(Dict),
}

impl Value {
    /// Byte string contents, if this is a byte string
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Byte string contents as UTF-8 text
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Self::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Bytes(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Bytes(Bytes::from(s))
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Self::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Self::Bytes(Bytes::copy_from_slice(b))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Self::List(l)
    }
}

impl From<Dict> for Value {
    fn from(d: Dict) -> Self {
        Self::Dict(d)
    }
}

/// Encode a value to its canonical tnetstring form
pub fn encode(value: &Value) -> Result<Bytes> {
    let mut out = BytesMut::new();
    encode_into(value, &mut out)?;
    Ok(out.freeze())
}

/// Encode a dictionary; shorthand for `encode(&Value::Dict(..))` without the
/// clone.
pub fn encode_dict(dict: &Dict) -> Result<Bytes> {
    let mut out = BytesMut::new();
    encode_dict_into(dict, &mut out)?;
    Ok(out.freeze())
}

fn encode_into(value: &Value, out: &mut BytesMut) -> Result<()> {
    match value {
        Value::Null => write_frame(out, b"", b'~'),
        Value::Bool(true) => write_frame(out, b"true", b'!'),
        Value::Bool(false) => write_frame(out, b"false", b'!'),
        Value::Int(i) => write_frame(out, i.to_string().as_bytes(), b'#'),
        Value::Float(f) => {
            if !f.is_finite() {
                return Err(TnetstringError::NonFiniteFloat);
            }
            // Debug formatting always keeps a fractional part ("1.0", not "1")
            write_frame(out, format!("{f:?}").as_bytes(), b'^');
        }
        Value::Bytes(b) => write_frame(out, b, b','),
        Value::List(items) => {
            let mut payload = BytesMut::new();
            for item in items {
                encode_into(item, &mut payload)?;
            }
            write_frame(out, &payload, b']');
        }
        Value::Dict(dict) => encode_dict_into(dict, out)?,
    }
    Ok(())
}

fn encode_dict_into(dict: &Dict, out: &mut BytesMut) -> Result<()> {
    let mut payload = BytesMut::new();
    for (key, value) in dict {
        write_frame(&mut payload, key.as_bytes(), b',');
        encode_into(value, &mut payload)?;
    }
    write_frame(out, &payload, b'}');
    Ok(())
}

#[inline]
fn write_frame(out: &mut BytesMut, payload: &[u8], tag: u8) {
    out.extend_from_slice(payload.len().to_string().as_bytes());
    out.put_u8(b':');
    out.extend_from_slice(payload);
    out.put_u8(tag);
}

/// Decode exactly one value; trailing bytes are an error.
pub fn decode(data: &Bytes) -> Result<Value> {
    let (value, rest) = decode_prefix(data)?;
    if !rest.is_empty() {
        return Err(TnetstringError::TrailingData(rest.len()));
    }
    Ok(value)
}

/// Decode one value from the front of `data`, returning it and the
/// remaining bytes.
pub fn decode_prefix(data: &Bytes) -> Result<(Value, Bytes)> {
    parse(data, 0)
}

fn parse(data: &Bytes, depth: usize) -> Result<(Value, Bytes)> {
    if depth > MAX_DEPTH {
        return Err(TnetstringError::TooDeep);
    }

    // === Length prefix ===
    let colon = data
        .iter()
        .take(MAX_LENGTH_DIGITS + 1)
        .position(|&b| b == b':')
        .ok_or(TnetstringError::InvalidLength)?;
    let digits = &data[..colon];
    if digits.is_empty()
        || !digits.iter().all(u8::is_ascii_digit)
        || (digits.len() > 1 && digits[0] == b'0')
    {
        return Err(TnetstringError::InvalidLength);
    }
    let len: usize = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(TnetstringError::InvalidLength)?;

    // === Payload + tag ===
    let start = colon + 1;
    let end = start + len;
    if data.len() < end + 1 {
        return Err(TnetstringError::Truncated {
            needed: end + 1,
            available: data.len(),
        });
    }
    let payload = data.slice(start..end);
    let tag = data[end];
    let rest = data.slice(end + 1..);

    let invalid = || TnetstringError::InvalidPayload { tag: tag as char };
    let value = match tag {
        b',' => Value::Bytes(payload),
        b'#' => std::str::from_utf8(&payload)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::Int)
            .ok_or_else(invalid)?,
        b'^' => std::str::from_utf8(&payload)
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|f| f.is_finite())
            .map(Value::Float)
            .ok_or_else(invalid)?,
        b'!' => match payload.as_ref() {
            b"true" => Value::Bool(true),
            b"false" => Value::Bool(false),
            _ => return Err(invalid()),
        },
        b'~' => {
            if !payload.is_empty() {
                return Err(invalid());
            }
            Value::Null
        }
        b']' => {
            let mut items = Vec::new();
            let mut remaining = payload;
            while !remaining.is_empty() {
                let (item, next) = parse(&remaining, depth + 1)?;
                items.push(item);
                remaining = next;
            }
            Value::List(items)
        }
        b'}' => {
            let mut dict = Dict::new();
            let mut remaining = payload;
            while !remaining.is_empty() {
                let (key, next) = parse(&remaining, depth + 1)?;
                let key = match key {
                    Value::Bytes(k) => String::from_utf8(k.to_vec())
                        .map_err(|_| TnetstringError::InvalidKey)?,
                    _ => return Err(TnetstringError::InvalidKey),
                };
                if next.is_empty() {
                    return Err(invalid());
                }
                let (value, next) = parse(&next, depth + 1)?;
                dict.insert(key, value);
                remaining = next;
            }
            Value::Dict(dict)
        }
        other => return Err(TnetstringError::UnknownTag(other)),
    };

    Ok((value, rest))
}
