//! Record rendering
//!
//! Text mode writes one severity-tagged row per attribute between two
//! borders. Structured mode serializes decoded records to an indented JSON
//! document written as one block.

use std::time::Instant;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::attribute_value::{AttributeSource, RawValue};
use crate::config::OutputConfig;
use crate::decoder::{decode_structured, decode_value, DecodedValue};
use crate::errors::Result;
use crate::ldap_helpers::attrs;
use crate::logger::{LineSink, MemorySink, RenderedLine, Severity};
use crate::parallel_executor::{ExecutionStats, ParallelExecutor};

pub const NAME_COLUMN_WIDTH: usize = 30;
pub const BORDER_WIDTH: usize = 100;
pub const NO_NAME: &str = "<no cn>";
const ROW_PREFIX: &str = "     |-> ";

/// Counts for one rendered record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSummary {
    pub attributes: usize,
    pub errors: usize,
}

/// Decoded attributes of one record, in render order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecodedRecord {
    pub attributes: IndexMap<String, DecodedValue>,
}

impl DecodedRecord {
    pub fn get(&self, name: &str) -> Option<&DecodedValue> {
        self.attributes.get(name)
    }
}

pub fn border() -> String {
    "-".repeat(BORDER_WIDTH)
}

/// `     |-> <name padded to 30> | <value>`
pub fn format_row(name: &str, value: &str) -> String {
    format!(
        "{}{:<width$} | {}",
        ROW_PREFIX,
        name,
        value,
        width = NAME_COLUMN_WIDTH
    )
}

/// First usable value of `cn`, `ou`, `name`, else `<no cn>`
pub fn display_name<S: AttributeSource + ?Sized>(source: &S) -> String {
    let names = source.attribute_names();
    for candidate in [attrs::CN, attrs::OU, attrs::NAME] {
        if !names.iter().any(|n| n == candidate) {
            continue;
        }
        match source.attribute_value(candidate) {
            Ok(value) if has_content(&value) => {
                return decode_value(candidate, &value).to_text();
            }
            Ok(_) => {}
            Err(e) => debug!("Skipping {} for display name: {}", candidate, e),
        }
    }
    NO_NAME.to_string()
}

fn has_content(value: &RawValue) -> bool {
    match value {
        RawValue::Null => false,
        RawValue::Multi(values) => !values.is_empty(),
        _ => true,
    }
}

pub struct RecordRenderer {
    config: OutputConfig,
}

impl RecordRenderer {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    fn selected_names<S: AttributeSource + ?Sized>(&self, source: &S) -> Vec<String> {
        source
            .attribute_names()
            .into_iter()
            .filter(|name| self.config.selects(name))
            .collect()
    }

    /// Render one record in the configured mode
    pub fn render<S, L>(&self, source: &S, sink: &mut L) -> Result<RenderSummary>
    where
        S: AttributeSource + ?Sized,
        L: LineSink + ?Sized,
    {
        if self.config.json {
            let (record, summary) = self.decode_with_summary(source);
            write_structured(&record, sink)?;
            Ok(summary)
        } else {
            self.render_text(source, sink)
        }
    }

    /// Header, one row per attribute, closing border.
    ///
    /// A failure reading one attribute becomes an ERROR row; the remaining
    /// attributes are still rendered.
    pub fn render_text<S, L>(&self, source: &S, sink: &mut L) -> Result<RenderSummary>
    where
        S: AttributeSource + ?Sized,
        L: LineSink + ?Sized,
    {
        let mut summary = RenderSummary::default();
        let name = display_name(source);

        sink.emit(verbose(format_row(&format!("NAME ({})", name), "VALUE")))?;
        sink.emit(verbose(border()))?;

        for attribute in self.selected_names(source) {
            match source.attribute_value(&attribute) {
                Ok(value) => {
                    let decoded = decode_value(&attribute, &value);
                    sink.emit(success(format_row(&attribute, &decoded.to_text())))?;
                    summary.attributes += 1;
                }
                Err(e) => {
                    warn!("Failed to read attribute {} of {}: {}", attribute, name, e);
                    sink.emit(error(format_row(&attribute, &format!("<error: {}>", e))))?;
                    summary.errors += 1;
                }
            }
        }

        sink.emit(verbose(border()))?;
        Ok(summary)
    }

    /// Decode a record for structured output; read failures become
    /// `<error: ...>` values
    pub fn decode_record<S: AttributeSource + ?Sized>(&self, source: &S) -> DecodedRecord {
        self.decode_with_summary(source).0
    }

    /// [`RecordRenderer::decode_record`] plus counts of decoded values and
    /// read failures
    pub fn decode_with_summary<S: AttributeSource + ?Sized>(
        &self,
        source: &S,
    ) -> (DecodedRecord, RenderSummary) {
        let mut attributes = IndexMap::new();
        let mut summary = RenderSummary::default();
        for attribute in self.selected_names(source) {
            let decoded = match source.attribute_value(&attribute) {
                Ok(value) => {
                    summary.attributes += 1;
                    decode_structured(&attribute, &value)
                }
                Err(e) => {
                    warn!("Failed to read attribute {}: {}", attribute, e);
                    summary.errors += 1;
                    DecodedValue::Single(format!("<error: {}>", e))
                }
            };
            attributes.insert(attribute, decoded);
        }
        (DecodedRecord { attributes }, summary)
    }

    /// Render many records. Decoding may run in parallel; output is
    /// flushed record by record in input order.
    pub fn render_batch<S, L>(&self, sources: &[S], sink: &mut L) -> Result<ExecutionStats>
    where
        S: AttributeSource + Sync,
        L: LineSink + ?Sized,
    {
        let start = Instant::now();
        let executor = ParallelExecutor::new(self.config.parallel.clone());
        let mut stats = ExecutionStats {
            total_records: sources.len(),
            workers: executor.workers_for(sources.len()),
            ..ExecutionStats::default()
        };

        if self.config.json {
            let decoded = executor.map_ordered(sources, |s| self.decode_with_summary(s));
            let mut records = Vec::with_capacity(decoded.len());
            for (record, summary) in decoded {
                stats.failed_attributes += summary.errors;
                records.push(record);
            }
            write_structured(&records, sink)?;
        } else {
            let buffers = executor.map_ordered(sources, |s| {
                let mut buffer = MemorySink::new();
                let summary = self.render_text(s, &mut buffer);
                (buffer, summary)
            });
            for (buffer, summary) in buffers {
                stats.failed_attributes += summary?.errors;
                buffer.flush_into(sink)?;
            }
        }

        stats.total_duration_ms = start.elapsed().as_millis() as u64;
        debug!("Rendered {} records", stats.total_records);
        Ok(stats)
    }
}

/// Serialize any result object as one indented JSON block
pub fn write_structured<T, L>(document: &T, sink: &mut L) -> Result<()>
where
    T: Serialize + ?Sized,
    L: LineSink + ?Sized,
{
    let json = serde_json::to_string_pretty(document)?;
    sink.write_block(&json)?;
    Ok(())
}

fn verbose(text: String) -> RenderedLine {
    RenderedLine::new(Severity::Verbose, 0, text)
}

fn success(text: String) -> RenderedLine {
    RenderedLine::new(Severity::Success, 0, text)
}

fn error(text: String) -> RenderedLine {
    RenderedLine::new(Severity::Error, 0, text)
}
