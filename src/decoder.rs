//! Attribute value decoding
//!
//! Converts raw directory attribute values into display strings. Decoding is
//! total: every structural parse failure degrades to a fixed fallback and is
//! never reported to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::attribute_value::{HighLowPair, RawValue};
use crate::ldap_helpers::attrs;
use crate::ldap_utils::{filetime_to_datetime, guid_to_string, sid_to_string, to_hex_upper};
use crate::sddl::sddl_from_bytes;

pub const NULL_SENTINEL: &str = "<null>";
pub const OPAQUE_OBJECT_SENTINEL: &str = "<OpaqueObject>";
pub const SECURITY_DESCRIPTOR_SENTINEL: &str = "<SecurityDescriptor>";

/// `dd/MM/yyyy h:mm:ss tt`
const DISPLAY_TIME_FORMAT: &str = "%d/%m/%Y %-I:%M:%S %p";

/// Attributes whose 16-byte values are security identifiers, never GUIDs
const SID_ATTRIBUTES: &[&str] = &[
    attrs::OBJECT_SID,
    attrs::SID_HISTORY,
    attrs::TOKEN_GROUPS,
    attrs::SECURITY_IDENTIFIER,
    attrs::CREATOR_SID,
];

/// Decoded attribute value
///
/// Text mode renders `Multi` as `[a, b]`; structured mode keeps it an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DecodedValue {
    Single(String),
    Multi(Vec<String>),
}

impl DecodedValue {
    /// Text-mode form
    pub fn to_text(&self) -> String {
        match self {
            DecodedValue::Single(s) => s.clone(),
            DecodedValue::Multi(values) => join_bracketed(values),
        }
    }
}

impl std::fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Format a UTC instant as `DD/MM/YYYY h:mm:ss AM|PM`
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format(DISPLAY_TIME_FORMAT).to_string()
}

/// Decode a single raw value for the given attribute
pub fn decode_scalar(attribute_name: &str, value: &RawValue) -> String {
    match value {
        RawValue::Null => NULL_SENTINEL.to_string(),
        RawValue::HighLowPair(pair) => decode_high_low(attribute_name, pair),
        RawValue::Binary(bytes) => decode_binary(attribute_name, bytes),
        RawValue::DateTime(dt) => format_timestamp(dt),
        RawValue::Text(s) => s.clone(),
        RawValue::Integer(i) => i.to_string(),
        RawValue::Multi(values) => decode_multi(attribute_name, values),
    }
}

/// Decode every element and join as `[a, b, c]`; empty input gives `[]`
pub fn decode_multi(attribute_name: &str, values: &[RawValue]) -> String {
    join_bracketed(&decode_elements(attribute_name, values))
}

/// Decode for display, collapsing single-valued lists the way a directory
/// property with one value reads
pub fn decode_value(attribute_name: &str, value: &RawValue) -> DecodedValue {
    match value {
        RawValue::Multi(values) => match values.as_slice() {
            [] => DecodedValue::Single(NULL_SENTINEL.to_string()),
            [single] => DecodedValue::Single(decode_scalar(attribute_name, single)),
            many => DecodedValue::Multi(decode_elements(attribute_name, many)),
        },
        other => DecodedValue::Single(decode_scalar(attribute_name, other)),
    }
}

/// Decode for structured output: multi-valued attributes stay arrays
pub fn decode_structured(attribute_name: &str, value: &RawValue) -> DecodedValue {
    match value {
        RawValue::Multi(values) => DecodedValue::Multi(decode_elements(attribute_name, values)),
        other => DecodedValue::Single(decode_scalar(attribute_name, other)),
    }
}

fn decode_elements(attribute_name: &str, values: &[RawValue]) -> Vec<String> {
    values
        .iter()
        .map(|v| decode_scalar(attribute_name, v))
        .collect()
}

fn join_bracketed(values: &[String]) -> String {
    format!("[{}]", values.join(", "))
}

fn decode_high_low(attribute_name: &str, pair: &HighLowPair) -> String {
    let ticks = pair.composed();
    if ticks == 0 {
        return NULL_SENTINEL.to_string();
    }

    match filetime_to_datetime(ticks) {
        Ok(dt) => format_timestamp(&dt),
        Err(e) => {
            trace!("{}: large integer not a timestamp: {}", attribute_name, e);
            OPAQUE_OBJECT_SENTINEL.to_string()
        }
    }
}

fn decode_binary(attribute_name: &str, bytes: &[u8]) -> String {
    if attribute_name == attrs::NT_SECURITY_DESCRIPTOR {
        return sddl_from_bytes(bytes).unwrap_or_else(|e| {
            trace!("{}: security descriptor not parsed: {}", attribute_name, e);
            SECURITY_DESCRIPTOR_SENTINEL.to_string()
        });
    }

    if bytes.len() == 16 && !is_sid_attribute(attribute_name) {
        if let Ok(guid) = guid_to_string(bytes) {
            return guid;
        }
    }

    sid_to_string(bytes).unwrap_or_else(|_| to_hex_upper(bytes))
}

fn is_sid_attribute(attribute_name: &str) -> bool {
    SID_ATTRIBUTES
        .iter()
        .any(|name| name.eq_ignore_ascii_case(attribute_name))
}
