//! Row model and its self-describing byte encoding.
//!
//! Encoding: `len SP key SP (len SP column SP len SP bytes SP)*`. Every
//! field is prefixed by its decimal byte length and read by length, so keys,
//! column names and values may all contain spaces and newlines.
//!
//! A row stream is a sequence of encoded rows each followed by `\n`, closed by
//! one extra `\n`. Records always start with a length digit, so a `\n` where a
//! record or a column would start is unambiguous.

use crate::error::{KvsError, KvsResult};

use std::collections::BTreeMap;

/// A row: immutable key plus a column → bytes map.
///
/// Columns are kept sorted so that iteration order (and anything derived
/// from it, such as fan-out counters) is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    key: String,
    columns: BTreeMap<String, Vec<u8>>,
}

impl Row {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            columns: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn put(&mut self, column: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.columns.insert(column.into(), value.into());
    }

    /// Column value as text (lossy for non-UTF-8 bytes).
    pub fn get(&self, column: &str) -> Option<String> {
        self.columns
            .get(column)
            .map(|v| String::from_utf8_lossy(v).into_owned())
    }

    pub fn get_bytes(&self, column: &str) -> Option<&[u8]> {
        self.columns.get(column).map(|v| v.as_slice())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|c| c.as_str())
    }

    /// `(column, value)` pairs in column order, values as text.
    pub fn values(&self) -> impl Iterator<Item = (&str, String)> {
        self.columns
            .iter()
            .map(|(c, v)| (c.as_str(), String::from_utf8_lossy(v).into_owned()))
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let size: usize = self
            .columns
            .iter()
            .map(|(c, v)| c.len() + v.len() + 44)
            .sum();
        let mut out = Vec::with_capacity(self.key.len() + 22 + size);
        self.encode_into(&mut out);
        out
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        write_field(out, self.key.as_bytes());
        for (column, value) in &self.columns {
            write_field(out, column.as_bytes());
            write_field(out, value);
        }
    }

    /// Decodes a single encoded row; trailing bytes are an error.
    pub fn from_bytes(bytes: &[u8]) -> KvsResult<Row> {
        let mut decoder = RowDecoder::new(bytes);
        let row = decoder
            .next_row()?
            .ok_or_else(|| KvsError::Codec("empty row payload".to_string()))?;
        if decoder.pos < bytes.len() && bytes[decoder.pos..].iter().any(|b| *b != b'\n') {
            return Err(KvsError::Codec("trailing bytes after row".to_string()));
        }
        Ok(row)
    }
}

fn write_field(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(bytes.len().to_string().as_bytes());
    out.push(b' ');
    out.extend_from_slice(bytes);
    out.push(b' ');
}

/// Appends `row` plus the record separator to a stream buffer.
pub fn write_stream_record(row: &Row, out: &mut Vec<u8>) {
    row.encode_into(out);
    out.push(b'\n');
}

/// Pull decoder over a buffer holding one row, a row stream, or a table log.
pub struct RowDecoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> RowDecoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Next row, or `None` at end of input or at the blank terminator line.
    pub fn next_row(&mut self) -> KvsResult<Option<Row>> {
        if self.pos >= self.buf.len() || self.buf[self.pos] == b'\n' {
            return Ok(None);
        }

        let key = self.text("row key")?;
        let mut row = Row::new(key);

        loop {
            if self.pos >= self.buf.len() {
                break;
            }
            if self.buf[self.pos] == b'\n' {
                self.pos += 1;
                break;
            }

            let column = self.text("column name")?;
            let value = self.field(&column)?.to_vec();
            row.put(column, value);
        }

        Ok(Some(row))
    }

    fn text(&mut self, what: &str) -> KvsResult<String> {
        let bytes = self.field(what)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| KvsError::Codec(format!("{} is not UTF-8: {}", what, e)))
    }

    /// Reads `len SP bytes SP` and returns `bytes`.
    fn field(&mut self, what: &str) -> KvsResult<&'a [u8]> {
        let buf: &'a [u8] = self.buf;
        let rest = &buf[self.pos..];
        let digits = rest
            .iter()
            .position(|b| *b == b' ')
            .ok_or_else(|| KvsError::Codec(format!("unterminated length of {}", what)))?;
        let len: usize = std::str::from_utf8(&rest[..digits])
            .ok()
            .and_then(|d| d.parse().ok())
            .ok_or_else(|| KvsError::Codec(format!("bad length for {}", what)))?;

        let start = self.pos + digits + 1;
        let end = start
            .checked_add(len)
            .filter(|end| *end < buf.len() && buf[*end] == b' ')
            .ok_or_else(|| KvsError::Codec(format!("truncated {}", what)))?;

        self.pos = end + 1;
        Ok(&buf[start..end])
    }
}

/// Decodes a complete row stream (rows until the blank line or end of input).
pub fn decode_stream(buf: &[u8]) -> KvsResult<Vec<Row>> {
    let mut decoder = RowDecoder::new(buf);
    let mut rows = Vec::new();
    while let Some(row) = decoder.next_row()? {
        rows.push(row);
    }
    Ok(rows)
}
