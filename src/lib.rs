//! Active Directory attribute decoding and result rendering.
//!
//! Raw attribute values from a directory query are decoded into display
//! strings (SIDs, GUIDs, SDDL, FILETIME timestamps) and rendered either as
//! severity-tagged text rows or as a structured JSON document.

pub mod attribute_value;
pub mod config;
pub mod decoder;
pub mod errors;
pub mod ldap_helpers;
pub mod ldap_utils;
pub mod logger;
pub mod parallel_executor;
pub mod renderer;
pub mod sddl;

pub use attribute_value::{parse_record_dump, AttributeRecord, AttributeSource, HighLowPair, RawValue};
pub use config::OutputConfig;
pub use decoder::{decode_multi, decode_scalar, decode_value, DecodedValue};
pub use errors::{Result, SearchError};
pub use logger::{LineSink, MemorySink, RenderedLine, Severity, WriterSink};
pub use renderer::{DecodedRecord, RecordRenderer, RenderSummary};
