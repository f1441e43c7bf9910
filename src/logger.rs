//! Operator output logger
//!
//! Severity-tagged lines of the form `[+] text`, optionally indented with
//! tabs. Output goes through a [`LineSink`] so tests can capture lines
//! instead of reading stdout.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

/// Line severity with its fixed marker character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Success,
    Verbose,
    Error,
}

impl Severity {
    pub fn marker(&self) -> char {
        match self {
            Severity::Success => '+',
            Severity::Verbose => '*',
            Severity::Error => '!',
        }
    }
}

/// One emitted line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedLine {
    pub severity: Severity,
    pub indentation: usize,
    pub text: String,
}

impl RenderedLine {
    pub fn new(severity: Severity, indentation: usize, text: impl Into<String>) -> Self {
        Self {
            severity,
            indentation,
            text: text.into(),
        }
    }
}

impl std::fmt::Display for RenderedLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for _ in 0..self.indentation {
            f.write_str("\t")?;
        }
        write!(f, "[{}] {}", self.severity.marker(), self.text)
    }
}

/// Destination for rendered lines and structured documents
pub trait LineSink {
    fn emit(&mut self, line: RenderedLine) -> io::Result<()>;

    /// Write a pre-formatted block verbatim (structured mode)
    fn write_block(&mut self, block: &str) -> io::Result<()>;

    fn success(&mut self, text: impl Into<String>) -> io::Result<()>
    where
        Self: Sized,
    {
        self.emit(RenderedLine::new(Severity::Success, 0, text))
    }

    fn verbose(&mut self, text: impl Into<String>) -> io::Result<()>
    where
        Self: Sized,
    {
        self.emit(RenderedLine::new(Severity::Verbose, 0, text))
    }

    fn error(&mut self, text: impl Into<String>) -> io::Result<()>
    where
        Self: Sized,
    {
        self.emit(RenderedLine::new(Severity::Error, 0, text))
    }
}

impl<S: LineSink + ?Sized> LineSink for &mut S {
    fn emit(&mut self, line: RenderedLine) -> io::Result<()> {
        (**self).emit(line)
    }

    fn write_block(&mut self, block: &str) -> io::Result<()> {
        (**self).write_block(block)
    }
}

impl<S: LineSink + ?Sized> LineSink for Box<S> {
    fn emit(&mut self, line: RenderedLine) -> io::Result<()> {
        (**self).emit(line)
    }

    fn write_block(&mut self, block: &str) -> io::Result<()> {
        (**self).write_block(block)
    }
}

/// Unbuffered writer-backed sink (stdout or a file)
pub struct WriterSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl WriterSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> LineSink for WriterSink<W> {
    fn emit(&mut self, line: RenderedLine) -> io::Result<()> {
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()
    }

    fn write_block(&mut self, block: &str) -> io::Result<()> {
        writeln!(self.writer, "{}", block)?;
        self.writer.flush()
    }
}

/// In-memory sink; also the per-record buffer for ordered parallel output
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Vec<RenderedLine>,
    blocks: Vec<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[RenderedLine] {
        &self.lines
    }

    pub fn blocks(&self) -> &[String] {
        &self.blocks
    }

    pub fn lines_with(&self, severity: Severity) -> impl Iterator<Item = &RenderedLine> {
        self.lines.iter().filter(move |l| l.severity == severity)
    }

    /// Replay captured output into another sink, in capture order
    pub fn flush_into<S: LineSink + ?Sized>(self, sink: &mut S) -> io::Result<()> {
        for line in self.lines {
            sink.emit(line)?;
        }
        for block in &self.blocks {
            sink.write_block(block)?;
        }
        Ok(())
    }
}

impl LineSink for MemorySink {
    fn emit(&mut self, line: RenderedLine) -> io::Result<()> {
        self.lines.push(line);
        Ok(())
    }

    fn write_block(&mut self, block: &str) -> io::Result<()> {
        self.blocks.push(block.to_string());
        Ok(())
    }
}
