//! Reader and utilities for decoding tokenized log output.
//!
//! The firmware prints each record as hexadecimal words, `0x`-prefixed and
//! separated by whitespace: one header word followed by the parameter words
//! the header announces. This module turns that text back into
//! [`LogRecord`] values and renders them with a [`FileTable`].

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, BufRead};
use std::iter::Enumerate;
use std::str::Lines;

use log::debug;

use crate::file_table::FileTable;
use crate::header_codec::LogHeader;

/// How records are delimited in the token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// One record per line: the first token is the header, the rest of the
    /// line holds its parameters. This is what the firmware's UART hook prints.
    #[default]
    Line,
    /// A flat token stream: a header is followed by exactly as many tokens as
    /// it declares, regardless of line breaks.
    Stream,
}

/// A problem detected while decoding a record. The record is still returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anomaly {
    /// The number of parameter tokens differs from the header's count.
    ParamCountMismatch { expected: u8, actual: usize },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::ParamCountMismatch { expected, actual } => {
                write!(f, "WARNING: Expected {} params, got {}", expected, actual)
            }
        }
    }
}

/// A single decoded record.
///
/// # Examples
///
/// ```
/// use fileid_log::file_table::FileTable;
/// use fileid_log::log_reader::decode_line;
///
/// let mut table = FileTable::new(Vec::new());
/// table.insert(51, "src/drivers/spi.c", Some("drivers"));
///
/// let record = decode_line("0x03302A04 0x0000002A").unwrap();
/// assert_eq!(record.params, vec![42]);
/// assert_eq!(
///     record.format(&table),
///     "[ERR][drivers] 51:42 (src/drivers/spi.c) - Params: [0x0000002A (42)]"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub header: LogHeader,

    /// The header word as read from the stream.
    pub raw_header: u32,

    /// Parameter words in emission order.
    pub params: Vec<u32>,

    /// Set when the stream did not match what the header declared.
    pub anomaly: Option<Anomaly>,

    /// 1-based input line holding the header token.
    pub source_line: usize,
}

impl LogRecord {
    fn new(raw_header: u32, params: Vec<u32>, source_line: usize) -> Self {
        let header = LogHeader::unpack(raw_header);
        let anomaly = if params.len() != usize::from(header.param_count) {
            Some(Anomaly::ParamCountMismatch {
                expected: header.param_count,
                actual: params.len(),
            })
        } else {
            None
        };
        Self {
            header,
            raw_header,
            params,
            anomaly,
            source_line,
        }
    }

    pub fn is_flagged(&self) -> bool {
        self.anomaly.is_some()
    }

    /// Renders the record as one human-readable line.
    ///
    /// Format: `[LEVEL][module] id:line (file) - Params: [0xXXXXXXXX (n), ...]`,
    /// followed by ` [WARNING: ...]` when the record carries an anomaly.
    /// Unknown identities are shown with placeholder names.
    pub fn format(&self, table: &FileTable) -> String {
        let id = self.header.identity;
        let mut output = format!(
            "[{}][{}] {}:{} ({})",
            self.header.level,
            table.module_name(id),
            id,
            self.header.line,
            table.file_name(id)
        );

        if !self.params.is_empty() {
            let params = self
                .params
                .iter()
                .map(|p| format!("0x{:08X} ({})", p, p))
                .collect::<Vec<_>>()
                .join(", ");
            output.push_str(&format!(" - Params: [{}]", params));
        }

        if let Some(anomaly) = &self.anomaly {
            output.push_str(&format!(" [{}]", anomaly));
        }
        output
    }

    /// Returns a multiline breakdown of the record for debugging.
    pub fn to_detailed_string(&self, table: &FileTable) -> String {
        let mut result = String::new();
        result.push_str(&format!(
            "Header: 0x{:08X} (input line {})\n",
            self.raw_header, self.source_line
        ));
        result.push_str(&format!(
            "  File: {} ({}, module {})\n",
            self.header.identity,
            table.file_name(self.header.identity),
            table.module_name(self.header.identity)
        ));
        result.push_str(&format!("  Line: {}\n", self.header.line));
        result.push_str(&format!("  Level: {}\n", self.header.level));
        result.push_str(&format!("  Params ({} declared):\n", self.header.param_count));
        for (i, param) in self.params.iter().enumerate() {
            result.push_str(&format!("    {}: 0x{:08X} ({})\n", i + 1, param, param));
        }
        if let Some(anomaly) = &self.anomaly {
            result.push_str(&format!("  {}\n", anomaly));
        }
        result
    }
}

/// Extracts the hex tokens from one line of input.
///
/// A token is `0x` or `0X` followed by hex digits, not preceded by a letter
/// or digit, so timestamps and other prefixes on the line are ignored.
/// Comment lines (first non-blank character `#`) yield nothing. Tokens too
/// large for 32 bits are dropped.
pub fn parse_tokens(line: &str) -> Vec<u32> {
    let mut tokens = Vec::new();
    if line.trim_start().starts_with('#') {
        return tokens;
    }

    let bytes = line.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        let is_prefix = bytes[i] == b'0'
            && (bytes[i + 1] == b'x' || bytes[i + 1] == b'X')
            && (i == 0 || !bytes[i - 1].is_ascii_alphanumeric());
        if !is_prefix {
            i += 1;
            continue;
        }

        let digits_start = i + 2;
        let mut end = digits_start;
        while end < bytes.len() && bytes[end].is_ascii_hexdigit() {
            end += 1;
        }
        if end > digits_start {
            let digits = &line[digits_start..end];
            match u32::from_str_radix(digits, 16) {
                Ok(value) => tokens.push(value),
                Err(_) => debug!("Skipping token 0x{} that does not fit in 32 bits", digits),
            }
        }
        i = end.max(i + 2);
    }
    tokens
}

/// Decodes a single line in [`Framing::Line`] mode.
///
/// Returns `None` for comments and lines without any hex token.
pub fn decode_line(line: &str) -> Option<LogRecord> {
    decode_numbered_line(line, 0)
}

fn decode_numbered_line(line: &str, source_line: usize) -> Option<LogRecord> {
    let mut tokens = parse_tokens(line).into_iter();
    let header = tokens.next()?;
    Some(LogRecord::new(header, tokens.collect(), source_line))
}

/// Lazy decoder over a block of token text.
///
/// The reader is an [`Iterator`] of [`LogRecord`]. Each record's span is
/// determined by its own header, so decoding needs no state beyond the
/// position in the text and can be restarted with [`LogReader::rewind`].
///
/// # Examples
///
/// ```
/// use fileid_log::log_reader::{Framing, LogReader};
///
/// let text = "# boot log\n0x0330080C 0x1\n0x03300900\n";
/// let records: Vec<_> = LogReader::new(text, Framing::Line).collect();
///
/// assert_eq!(records.len(), 2);
/// assert!(records[0].is_flagged()); // declared 3 params, got 1
/// assert!(!records[1].is_flagged());
/// ```
#[derive(Debug, Clone)]
pub struct LogReader<'a> {
    text: &'a str,
    framing: Framing,
    lines: Enumerate<Lines<'a>>,
    pending: VecDeque<(usize, u32)>,
}

impl<'a> LogReader<'a> {
    /// Creates a reader over `text`.
    ///
    /// # Arguments
    ///
    /// * `text` - Token text, typically the whole contents of a capture file
    /// * `framing` - How records are delimited
    pub fn new(text: &'a str, framing: Framing) -> Self {
        Self {
            text,
            framing,
            lines: text.lines().enumerate(),
            pending: VecDeque::new(),
        }
    }

    /// Restarts decoding from the beginning of the text.
    pub fn rewind(&mut self) {
        self.lines = self.text.lines().enumerate();
        self.pending.clear();
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Pulls the tokens of the next non-empty line into `pending`.
    ///
    /// # Returns
    /// false once the text is exhausted
    fn fill(&mut self) -> bool {
        for (index, line) in self.lines.by_ref() {
            let tokens = parse_tokens(line);
            if !tokens.is_empty() {
                self.pending.extend(tokens.into_iter().map(|t| (index + 1, t)));
                return true;
            }
        }
        false
    }

    fn next_line_record(&mut self) -> Option<LogRecord> {
        for (index, line) in self.lines.by_ref() {
            if let Some(record) = decode_numbered_line(line, index + 1) {
                return Some(record);
            }
        }
        None
    }

    fn next_stream_record(&mut self) -> Option<LogRecord> {
        if self.pending.is_empty() && !self.fill() {
            return None;
        }
        let (source_line, raw_header) = self.pending.pop_front()?;
        let wanted = usize::from(LogHeader::unpack(raw_header).param_count);
        while self.pending.len() < wanted && self.fill() {}

        let take = wanted.min(self.pending.len());
        let params = self.pending.drain(..take).map(|(_, t)| t).collect();
        Some(LogRecord::new(raw_header, params, source_line))
    }
}

impl<'a> Iterator for LogReader<'a> {
    type Item = LogRecord;

    fn next(&mut self) -> Option<LogRecord> {
        match self.framing {
            Framing::Line => self.next_line_record(),
            Framing::Stream => self.next_stream_record(),
        }
    }
}

/// Incremental decoder over a live byte source such as stdin or a serial port.
///
/// Lines are read only when a record needs them, so each record is yielded
/// as soon as its parameters have arrived. Bytes that are not valid UTF-8
/// are replaced rather than rejected; a stray byte on a capture line costs
/// at most the tokens it touches.
pub struct StreamDecoder<R> {
    reader: R,
    framing: Framing,
    line_no: usize,
    buf: Vec<u8>,
    pending: VecDeque<(usize, u32)>,
}

impl<R: BufRead> StreamDecoder<R> {
    pub fn new(reader: R, framing: Framing) -> Self {
        Self {
            reader,
            framing,
            line_no: 0,
            buf: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    /// Reads the next line, returning `None` at end of input.
    fn read_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }

    fn fill(&mut self) -> io::Result<bool> {
        while let Some(line) = self.read_line()? {
            let tokens = parse_tokens(&line);
            if !tokens.is_empty() {
                let line_no = self.line_no;
                self.pending.extend(tokens.into_iter().map(|t| (line_no, t)));
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn next_line_record(&mut self) -> io::Result<Option<LogRecord>> {
        while let Some(line) = self.read_line()? {
            if let Some(record) = decode_numbered_line(&line, self.line_no) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    fn next_stream_record(&mut self) -> io::Result<Option<LogRecord>> {
        if self.pending.is_empty() && !self.fill()? {
            return Ok(None);
        }
        let Some((source_line, raw_header)) = self.pending.pop_front() else {
            return Ok(None);
        };
        let wanted = usize::from(LogHeader::unpack(raw_header).param_count);
        while self.pending.len() < wanted && self.fill()? {}

        let take = wanted.min(self.pending.len());
        let params = self.pending.drain(..take).map(|(_, t)| t).collect();
        Ok(Some(LogRecord::new(raw_header, params, source_line)))
    }
}

impl<R: BufRead> Iterator for StreamDecoder<R> {
    type Item = io::Result<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.framing {
            Framing::Line => self.next_line_record(),
            Framing::Stream => self.next_stream_record(),
        };
        record.transpose()
    }
}

/// Running totals printed after a decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeSummary {
    pub records: usize,
    pub flagged: usize,
}

impl DecodeSummary {
    pub fn record(&mut self, record: &LogRecord) {
        self.records += 1;
        if record.is_flagged() {
            self.flagged += 1;
        }
    }
}

impl fmt::Display for DecodeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decoded {} records ({} with warnings)", self.records, self.flagged)
    }
}
