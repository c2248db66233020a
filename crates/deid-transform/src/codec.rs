//! CSV reading and writing for transformation runs.
//!
//! The reader never treats the first row specially; the transformer reads
//! the header itself. The writer mirrors the input's quoting and line
//! endings, so an untouched table comes back byte for byte.
//!
//! The CSV reader skips blank lines. [`LineTracker`] sits underneath it and
//! notes where they were, so the transformer can write them back.

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Read, Write};

use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};

/// Layout details sniffed from the start of the input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableFormat {
    /// Every field of the input is double-quoted.
    pub quote_all: bool,
    /// Lines end in `\r\n`.
    pub crlf: bool,
}

impl TableFormat {
    /// Inspect the first buffered line.
    pub fn sniff(head: &[u8]) -> Self {
        let line_end = head.iter().position(|&b| b == b'\n');
        Self {
            quote_all: head.first() == Some(&b'"'),
            crlf: line_end.is_some_and(|end| end > 0 && head[end - 1] == b'\r'),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    RecordStart,
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Pass-through reader that follows record boundaries the way the CSV
/// parser does and remembers every blank line it sees.
#[derive(Debug)]
pub struct LineTracker<R> {
    inner: R,
    state: ScanState,
    after_cr: bool,
    /// Records terminated so far, header included.
    records: u64,
    /// For each blank line not yet taken, the number of records before it.
    blank_lines: VecDeque<u64>,
}

impl<R> LineTracker<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            state: ScanState::RecordStart,
            after_cr: false,
            records: 0,
            blank_lines: VecDeque::new(),
        }
    }

    /// Take the blank lines that come before record `index` (0 is the
    /// header) and return how many there were.
    pub fn take_blank_lines_before(&mut self, index: u64) -> u64 {
        let mut taken = 0;
        while self.blank_lines.front().is_some_and(|&before| before <= index) {
            self.blank_lines.pop_front();
            taken += 1;
        }
        taken
    }

    /// Take every remaining blank line.
    pub fn take_remaining_blank_lines(&mut self) -> u64 {
        let taken = self.blank_lines.len() as u64;
        self.blank_lines.clear();
        taken
    }

    fn scan(&mut self, byte: u8) {
        let after_cr = std::mem::replace(&mut self.after_cr, byte == b'\r');
        let terminator = byte == b'\n' || byte == b'\r';
        self.state = match (self.state, byte) {
            (ScanState::Quoted, b'"') => ScanState::QuoteInQuoted,
            (ScanState::Quoted, _) => ScanState::Quoted,
            (ScanState::RecordStart, _) if terminator => {
                // `\r\n` is one line ending
                if !(byte == b'\n' && after_cr) {
                    self.blank_lines.push_back(self.records);
                }
                ScanState::RecordStart
            }
            (_, _) if terminator => {
                self.records += 1;
                ScanState::RecordStart
            }
            (ScanState::RecordStart | ScanState::FieldStart, b'"') => ScanState::Quoted,
            (ScanState::QuoteInQuoted, b'"') => ScanState::Quoted,
            (_, b',') => ScanState::FieldStart,
            _ => ScanState::Unquoted,
        };
    }
}

impl<R: Read> Read for LineTracker<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        for &byte in &buf[..read] {
            self.scan(byte);
        }
        Ok(read)
    }
}

/// Open a CSV reader over `input` and report the input's format.
///
/// # Errors
///
/// Returns any I/O error raised while filling the first buffer.
pub fn open_reader<R: Read>(
    input: R,
) -> io::Result<(TableFormat, csv::Reader<LineTracker<BufReader<R>>>)> {
    let mut buffered = BufReader::new(input);
    let format = TableFormat::sniff(buffered.fill_buf()?);
    let reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(false)
        .from_reader(LineTracker::new(buffered));
    Ok((format, reader))
}

/// Open a CSV writer over `output` matching `format`.
///
/// The writer is flexible so that a blank line can be written as a bare
/// terminator; field counts are checked on the reading side.
pub fn open_writer<W: Write>(output: W, format: TableFormat) -> csv::Writer<W> {
    let quote_style = if format.quote_all {
        QuoteStyle::Always
    } else {
        QuoteStyle::Necessary
    };
    let terminator = if format.crlf {
        Terminator::CRLF
    } else {
        Terminator::Any(b'\n')
    };
    WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quote_style(quote_style)
        .terminator(terminator)
        .from_writer(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_quoting_and_line_endings() {
        assert_eq!(TableFormat::sniff(b"a,b\n1,2\n"), TableFormat::default());
        assert_eq!(
            TableFormat::sniff(b"\"a\",\"b\"\r\n"),
            TableFormat {
                quote_all: true,
                crlf: true
            }
        );
        assert_eq!(TableFormat::sniff(b""), TableFormat::default());
    }

    fn blank_lines_of(input: &str) -> (Vec<Vec<String>>, Vec<u64>) {
        let (_, mut reader) = open_reader(input.as_bytes()).unwrap();
        let mut rows = Vec::new();
        let mut blanks = Vec::new();
        let mut record = csv::StringRecord::new();
        let mut index = 0;
        while reader.read_record(&mut record).unwrap() {
            blanks.push(reader.get_mut().take_blank_lines_before(index));
            rows.push(record.iter().map(str::to_string).collect());
            index += 1;
        }
        blanks.push(reader.get_mut().take_remaining_blank_lines());
        (rows, blanks)
    }

    #[test]
    fn tracker_counts_skipped_blank_lines() {
        let (rows, blanks) = blank_lines_of("a\n1\n\n3\n\n");
        assert_eq!(rows, vec![vec!["a"], vec!["1"], vec!["3"]]);
        assert_eq!(blanks, vec![0, 0, 1, 1]);

        let (_, blanks) = blank_lines_of("\r\na\r\n\r\n1\r\n");
        assert_eq!(blanks, vec![1, 1, 0]);
    }

    #[test]
    fn tracker_ignores_newlines_inside_quotes() {
        let (rows, blanks) = blank_lines_of("a\n\"x\n\ny\"\n\"q\"\"\n\"\n");
        assert_eq!(rows, vec![vec!["a"], vec!["x\n\ny"], vec!["q\"\n"]]);
        assert_eq!(blanks, vec![0, 0, 0, 0]);
    }

    #[test]
    fn writer_follows_format() {
        let mut quoted = open_writer(Vec::new(), TableFormat {
            quote_all: true,
            crlf: false,
        });
        quoted.write_record(["a", ""]).unwrap();
        assert_eq!(quoted.into_inner().unwrap(), b"\"a\",\"\"\n");

        let mut plain = open_writer(Vec::new(), TableFormat::default());
        plain.write_record(["a b", "c,d"]).unwrap();
        plain.write_record(std::iter::empty::<&str>()).unwrap();
        assert_eq!(plain.into_inner().unwrap(), b"a b,\"c,d\"\n\n");
    }
}
