use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::prelude::*;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::ArchiveError;
use crate::example::Example;

/// Sequential access to keyed examples, in the order of the source.
pub trait ExampleReader {
    /// True once every example has been consumed.
    fn done(&self) -> bool;
    /// Move to the next example.
    fn next(&mut self) -> Result<(), ArchiveError>;
    fn key(&self) -> Result<&str, ArchiveError>;
    fn value(&self) -> Result<&Example, ArchiveError>;
}

/// Sink for keyed examples.
pub trait ExampleWriter {
    fn write(&mut self, key: &str, eg: &Example) -> Result<(), ArchiveError>;
    /// Flush everything written so far.
    fn close(&mut self) -> Result<(), ArchiveError>;
}

#[derive(Serialize)]
struct RecordRef<'a> {
    key: &'a str,
    value: &'a Example,
}

#[derive(Deserialize)]
struct Record {
    key: String,
    value: Example,
}

/// Reads one `{"key": ..., "value": ...}` object per line. Blank lines
/// are skipped.
pub struct JsonLinesReader {
    name: String,
    lines: std::io::Lines<Box<dyn BufRead>>,
    line_no: usize,
    current: Option<Record>,
}

impl JsonLinesReader {
    /// Open a file, or standard input for `-`.
    pub fn open(spec: &str) -> Result<Self, ArchiveError> {
        let input: Box<dyn BufRead> = if spec == "-" {
            Box::new(BufReader::new(std::io::stdin()))
        } else {
            let fh = File::open(Path::new(spec))
                .map_err(|e| ArchiveError::io(format!("opening {}", spec), e))?;
            Box::new(BufReader::new(fh))
        };
        Self::from_reader(spec, input)
    }

    pub fn from_reader(name: &str, input: Box<dyn BufRead>) -> Result<Self, ArchiveError> {
        let mut reader = Self {
            name: name.to_string(),
            lines: input.lines(),
            line_no: 0,
            current: None,
        };
        reader.read_record()?;
        Ok(reader)
    }

    fn read_record(&mut self) -> Result<(), ArchiveError> {
        self.current = None;
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = line
                .map_err(|e| ArchiveError::io(format!("reading {}", self.name), e))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: Record = serde_json::from_str(&line).map_err(|e| {
                ArchiveError::format(format!("{}:{}", self.name, self.line_no), e)
            })?;
            self.current = Some(record);
            break;
        }
        Ok(())
    }
}

impl ExampleReader for JsonLinesReader {
    fn done(&self) -> bool {
        self.current.is_none()
    }

    fn next(&mut self) -> Result<(), ArchiveError> {
        if self.done() {
            return Err(ArchiveError::Exhausted);
        }
        self.read_record()
    }

    fn key(&self) -> Result<&str, ArchiveError> {
        self.current
            .as_ref()
            .map(|record| record.key.as_str())
            .ok_or(ArchiveError::Exhausted)
    }

    fn value(&self) -> Result<&Example, ArchiveError> {
        self.current
            .as_ref()
            .map(|record| &record.value)
            .ok_or(ArchiveError::Exhausted)
    }
}

/// Writes one `{"key": ..., "value": ...}` object per line.
pub struct JsonLinesWriter {
    name: String,
    output: BufWriter<Box<dyn Write>>,
}

impl JsonLinesWriter {
    /// Create a file, or write to standard output for `-`.
    pub fn create(spec: &str) -> Result<Self, ArchiveError> {
        let output: Box<dyn Write> = if spec == "-" {
            Box::new(std::io::stdout())
        } else {
            let fh = File::create(Path::new(spec))
                .map_err(|e| ArchiveError::io(format!("creating {}", spec), e))?;
            Box::new(fh)
        };
        Ok(Self::from_writer(spec, output))
    }

    pub fn from_writer(name: &str, output: Box<dyn Write>) -> Self {
        Self {
            name: name.to_string(),
            output: BufWriter::new(output),
        }
    }
}

impl ExampleWriter for JsonLinesWriter {
    fn write(&mut self, key: &str, eg: &Example) -> Result<(), ArchiveError> {
        serde_json::to_writer(&mut self.output, &RecordRef { key, value: eg })
            .map_err(|e| ArchiveError::format(format!("{} key {}", self.name, key), e))?;
        self.output
            .write_all(b"\n")
            .map_err(|e| ArchiveError::io(format!("writing {}", self.name), e))
    }

    fn close(&mut self) -> Result<(), ArchiveError> {
        self.output
            .flush()
            .map_err(|e| ArchiveError::io(format!("flushing {}", self.name), e))
    }
}

/// Reader over examples held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    records: Vec<(String, Example)>,
    pos: usize,
}

impl MemoryReader {
    pub fn new(records: Vec<(String, Example)>) -> Self {
        Self { records, pos: 0 }
    }

    fn current(&self) -> Result<&(String, Example), ArchiveError> {
        self.records.get(self.pos).ok_or(ArchiveError::Exhausted)
    }
}

impl ExampleReader for MemoryReader {
    fn done(&self) -> bool {
        self.pos >= self.records.len()
    }

    fn next(&mut self) -> Result<(), ArchiveError> {
        if self.done() {
            return Err(ArchiveError::Exhausted);
        }
        self.pos += 1;
        Ok(())
    }

    fn key(&self) -> Result<&str, ArchiveError> {
        self.current().map(|(key, _)| key.as_str())
    }

    fn value(&self) -> Result<&Example, ArchiveError> {
        self.current().map(|(_, eg)| eg)
    }
}

/// Writer collecting examples in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter {
    records: Vec<(String, Example)>,
    closed: bool,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[(String, Example)] {
        &self.records
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl ExampleWriter for MemoryWriter {
    fn write(&mut self, key: &str, eg: &Example) -> Result<(), ArchiveError> {
        self.records.push((key.to_string(), eg.clone()));
        Ok(())
    }

    fn close(&mut self) -> Result<(), ArchiveError> {
        self.closed = true;
        Ok(())
    }
}
