// value.rs — Typed registry values and their on-disk encodings.
//
// A registry value is a kind code plus a byte payload. The policy file keeps
// the raw (kind, bytes) pair so unknown kinds survive a load/save cycle; the
// engine works with the decoded `TypedValue`.

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Registry value kind codes as stored in the policy file.
pub mod kind {
    pub const NONE: u32 = 0;
    pub const STRING: u32 = 1;
    pub const EXPAND_STRING: u32 = 2;
    pub const BINARY: u32 = 3;
    pub const DWORD: u32 = 4;
    pub const MULTI_STRING: u32 = 7;
    pub const QWORD: u32 = 11;
}

/// A decoded registry value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TypedValue {
    String(String),
    ExpandString(String),
    U32(u32),
    U64(u64),
    MultiString(Vec<String>),
    Bytes(Vec<u8>),
}

impl TypedValue {
    /// The kind code this value is written with.
    pub fn kind(&self) -> u32 {
        match self {
            TypedValue::String(_) => kind::STRING,
            TypedValue::ExpandString(_) => kind::EXPAND_STRING,
            TypedValue::U32(_) => kind::DWORD,
            TypedValue::U64(_) => kind::QWORD,
            TypedValue::MultiString(_) => kind::MULTI_STRING,
            TypedValue::Bytes(_) => kind::BINARY,
        }
    }

    /// Numeric payload of a DWORD value.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            TypedValue::U32(v) => Some(*v),
            _ => None,
        }
    }

    /// Text payload of a String or ExpandString value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(s) | TypedValue::ExpandString(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_multi(&self) -> Option<&[String]> {
        match self {
            TypedValue::MultiString(v) => Some(v),
            _ => None,
        }
    }

    /// Encode the payload bytes for this value.
    pub fn encode(&self) -> Result<Vec<u8>, RegistryError> {
        Ok(match self {
            TypedValue::String(s) | TypedValue::ExpandString(s) => encode_sz(s),
            TypedValue::U32(v) => v.to_le_bytes().to_vec(),
            TypedValue::U64(v) => v.to_le_bytes().to_vec(),
            TypedValue::MultiString(items) => {
                if let Some(bad) = items.iter().find(|s| s.contains('\0')) {
                    return Err(RegistryError::Encode {
                        reason: format!("multi-string entry {bad:?} contains NUL"),
                    });
                }
                encode_multi_sz(items)
            }
            TypedValue::Bytes(b) => b.clone(),
        })
    }

    /// Decode a payload for the given kind code. Unknown kinds, and DWORD or
    /// QWORD payloads of the wrong width, come back as `Bytes`.
    pub fn decode(kind_code: u32, data: &[u8]) -> TypedValue {
        match kind_code {
            kind::STRING => TypedValue::String(decode_sz(data)),
            kind::EXPAND_STRING => TypedValue::ExpandString(decode_sz(data)),
            kind::DWORD if data.len() == 4 => {
                TypedValue::U32(u32::from_le_bytes([data[0], data[1], data[2], data[3]]))
            }
            kind::QWORD if data.len() == 8 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(data);
                TypedValue::U64(u64::from_le_bytes(raw))
            }
            kind::MULTI_STRING => TypedValue::MultiString(decode_multi_sz(data)),
            _ => TypedValue::Bytes(data.to_vec()),
        }
    }
}

/// UTF-16LE code units of `s`, without terminator.
pub(crate) fn utf16_units(s: &str) -> impl Iterator<Item = u8> + '_ {
    s.encode_utf16().flat_map(|u| u.to_le_bytes())
}

fn encode_sz(s: &str) -> Vec<u8> {
    let mut out: Vec<u8> = utf16_units(s).collect();
    out.extend_from_slice(&[0, 0]);
    out
}

fn encode_multi_sz(items: &[String]) -> Vec<u8> {
    let mut out = Vec::new();
    for item in items {
        out.extend(utf16_units(item));
        out.extend_from_slice(&[0, 0]);
    }
    out.extend_from_slice(&[0, 0]);
    out
}

fn units(data: &[u8]) -> Vec<u16> {
    data.chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect()
}

/// Decode a null-terminated UTF-16LE string; reading stops at the first NUL.
fn decode_sz(data: &[u8]) -> String {
    let units = units(data);
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    String::from_utf16_lossy(&units[..end])
}

/// Decode a sequence of null-terminated strings; the first empty string ends it.
fn decode_multi_sz(data: &[u8]) -> Vec<String> {
    units(data)
        .split(|&u| u == 0)
        .take_while(|s| !s.is_empty())
        .map(String::from_utf16_lossy)
        .collect()
}
