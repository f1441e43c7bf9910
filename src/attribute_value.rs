//! Directory attribute data model
//!
//! Raw attribute values arrive from the directory client already classified
//! into a tagged [`RawValue`]. Records keep attribute names in the order the
//! directory client produced them; that order is the render order.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SearchError};

/// A single raw attribute value as handed over by the directory client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RawValue {
    /// Absent value
    Null,
    Text(String),
    Integer(i64),
    DateTime(DateTime<Utc>),
    /// Octet string, hex encoded in record dumps
    Binary(#[serde(with = "hex_bytes")] Vec<u8>),
    /// Large integer split into two 32-bit halves (interval timestamps)
    HighLowPair(HighLowPair),
    /// Multi-valued attribute, order as stored in the directory
    Multi(Vec<RawValue>),
}

impl RawValue {
    pub fn text(value: impl Into<String>) -> Self {
        RawValue::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Integer(value)
    }
}

impl From<Vec<u8>> for RawValue {
    fn from(value: Vec<u8>) -> Self {
        RawValue::Binary(value)
    }
}

impl From<DateTime<Utc>> for RawValue {
    fn from(value: DateTime<Utc>) -> Self {
        RawValue::DateTime(value)
    }
}

/// 64-bit large integer as two 32-bit halves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighLowPair {
    pub high: i32,
    pub low: i32,
}

impl HighLowPair {
    pub fn new(high: i32, low: i32) -> Self {
        Self { high, low }
    }

    /// Split a 64-bit value into its halves
    pub fn from_i64(value: i64) -> Self {
        Self {
            high: (value >> 32) as i32,
            low: value as u32 as i32,
        }
    }

    /// Compose `high << 32 | low`, with the low half taken as unsigned
    pub fn composed(&self) -> i64 {
        (i64::from(self.high) << 32) | i64::from(self.low as u32)
    }
}

/// Ordered attribute map for one directory object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeRecord {
    attributes: IndexMap<String, RawValue>,
}

impl AttributeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an attribute. Re-inserting a name replaces the value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<RawValue>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Builder form of [`AttributeRecord::insert`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.attributes.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl<K: Into<String>, V: Into<RawValue>> FromIterator<(K, V)> for AttributeRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = AttributeRecord::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

/// Read access to a directory object's attributes.
///
/// Reading a value may fail for sources backed by a live directory object;
/// the renderer reports such failures per attribute and keeps going.
pub trait AttributeSource {
    /// Attribute names in render order
    fn attribute_names(&self) -> Vec<String>;

    /// Value of a single attribute
    fn attribute_value(&self, name: &str) -> Result<Cow<'_, RawValue>>;
}

impl AttributeSource for AttributeRecord {
    fn attribute_names(&self) -> Vec<String> {
        self.attributes.keys().cloned().collect()
    }

    fn attribute_value(&self, name: &str) -> Result<Cow<'_, RawValue>> {
        self.attributes
            .get(name)
            .map(Cow::Borrowed)
            .ok_or_else(|| SearchError::AttributeAccess(format!("attribute {} not present", name)))
    }
}

/// Captured directory query output: one record or an array of records
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordDump {
    Many(Vec<AttributeRecord>),
    One(AttributeRecord),
}

/// Parse a JSON record dump produced by the directory client
pub fn parse_record_dump(json: &str) -> Result<Vec<AttributeRecord>> {
    let dump: RecordDump = serde_json::from_str(json)
        .map_err(|e| SearchError::InvalidInput(format!("record dump: {}", e)))?;
    Ok(match dump {
        RecordDump::Many(records) => records,
        RecordDump::One(record) => vec![record],
    })
}

mod hex_bytes {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim()).map_err(D::Error::custom)
    }
}
