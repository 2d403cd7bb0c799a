//! Readers and writers for headerless delimited tables.
//!
//! Every loopsim input is a plain text table: loop files (6 columns),
//! chromosome region files (3 columns), interval files (3 columns) and
//! ratio distributions (1 column). The delimiter is detected from the first
//! data line unless the caller fixes it.

use crate::config::{Delimiter, OutputConfig};
use crate::error::{LoopError, Result};
use crate::interval::{Interval, LoopRecord};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Buffer size for table writers.
const WRITE_BUF_SIZE: usize = 1024 * 1024;

/// Placeholder written in the annotation column when a loop overlaps nothing.
pub const NO_OVERLAP: &str = ".";

/// One parsed data line.
#[derive(Debug)]
pub struct Row<'a> {
    pub line: usize,
    pub fields: Vec<&'a str>,
}

impl<'a> Row<'a> {
    /// Fail unless the row has at least `n` fields.
    pub fn require(&self, n: usize, what: &str) -> Result<()> {
        if self.fields.len() < n {
            return Err(LoopError::Parse {
                line: self.line,
                message: format!(
                    "{} requires {} columns, got {}",
                    what,
                    n,
                    self.fields.len()
                ),
            });
        }
        Ok(())
    }

    /// Non-empty text field.
    pub fn text(&self, idx: usize, name: &str) -> Result<&'a str> {
        match self.fields.get(idx).copied() {
            Some(s) if !s.is_empty() => Ok(s),
            _ => Err(LoopError::Parse {
                line: self.line,
                message: format!("Missing {}", name),
            }),
        }
    }

    /// Integer coordinate field.
    pub fn position(&self, idx: usize, name: &str) -> Result<u64> {
        let raw = self.text(idx, name)?;
        raw.parse().map_err(|_| LoopError::Parse {
            line: self.line,
            message: format!("Invalid {} position: '{}'", name, raw),
        })
    }

    /// Finite floating point field.
    pub fn float(&self, idx: usize, name: &str) -> Result<f64> {
        let raw = self.text(idx, name)?;
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(LoopError::Parse {
                line: self.line,
                message: format!("Invalid {}: '{}'", name, raw),
            }),
        }
    }
}

/// A line-oriented reader for delimited tables.
///
/// Blank lines and lines starting with `#` are skipped.
pub struct TableReader<R: Read> {
    reader: BufReader<R>,
    line_number: usize,
    buffer: String,
    delimiter: Option<Delimiter>,
}

impl TableReader<File> {
    /// Open a table from a path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(file))
    }
}

impl<R: Read> TableReader<R> {
    /// Create a reader that detects its delimiter from the first data line.
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line_number: 0,
            buffer: String::with_capacity(256),
            delimiter: None,
        }
    }

    /// Fix the delimiter instead of detecting it.
    pub fn with_delimiter(mut self, delimiter: Delimiter) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Read the next data row.
    pub fn read_row(&mut self) -> Result<Option<Row<'_>>> {
        loop {
            self.buffer.clear();
            if self.reader.read_line(&mut self.buffer)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let line = self.buffer.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            break;
        }

        let line = self.buffer.trim();
        let delimiter = match self.delimiter {
            Some(d) => d,
            None => {
                // Single-column tables have nothing to detect
                let d = Delimiter::detect(line).unwrap_or_default();
                self.delimiter = Some(d);
                d
            }
        };

        Ok(Some(Row {
            line: self.line_number,
            fields: delimiter.split(line),
        }))
    }
}

/// Open a table file, fixing its delimiter when one is given.
pub fn open_table<P: AsRef<Path>>(
    path: P,
    delimiter: Option<Delimiter>,
) -> Result<TableReader<File>> {
    let reader = TableReader::from_path(path)?;
    Ok(match delimiter {
        Some(d) => reader.with_delimiter(d),
        None => reader,
    })
}

/// Parse a loop row: `chrom1 start1 end1 chrom2 start2 end2`.
pub fn parse_loop_row(row: &Row<'_>) -> Result<LoopRecord> {
    row.require(6, "Loop file")?;
    Ok(LoopRecord::new(
        row.text(0, "chrom1")?,
        row.position(1, "start1")?,
        row.position(2, "end1")?,
        row.text(3, "chrom2")?,
        row.position(4, "start2")?,
        row.position(5, "end2")?,
    ))
}

/// Parse an interval row: `chrom start end`.
pub fn parse_interval_row(row: &Row<'_>) -> Result<Interval> {
    row.require(3, "Interval file")?;
    let chrom = row.text(0, "chrom")?;
    let start = row.position(1, "start")?;
    let end = row.position(2, "end")?;

    if start > end {
        return Err(LoopError::Parse {
            line: row.line,
            message: format!("Start ({}) > end ({})", start, end),
        });
    }

    Ok(Interval::new(chrom, start, end))
}

/// Read all loops from a reader.
pub fn read_loops_from<R: Read>(reader: TableReader<R>) -> Result<Vec<LoopRecord>> {
    collect_rows(reader, parse_loop_row)
}

/// Read all loops from a file.
pub fn read_loops<P: AsRef<Path>>(path: P) -> Result<Vec<LoopRecord>> {
    read_loops_from(TableReader::from_path(path)?)
}

/// Parse loops from a string (useful for testing).
pub fn parse_loops(content: &str) -> Result<Vec<LoopRecord>> {
    read_loops_from(TableReader::new(content.as_bytes()))
}

/// Read all intervals of interest from a reader.
pub fn read_intervals_from<R: Read>(reader: TableReader<R>) -> Result<Vec<Interval>> {
    collect_rows(reader, parse_interval_row)
}

/// Read all intervals of interest from a file.
pub fn read_intervals<P: AsRef<Path>>(path: P) -> Result<Vec<Interval>> {
    read_intervals_from(TableReader::from_path(path)?)
}

/// Parse intervals from a string.
pub fn parse_intervals(content: &str) -> Result<Vec<Interval>> {
    collect_rows(TableReader::new(content.as_bytes()), parse_interval_row)
}

/// Read a ratio distribution (first column of each line).
pub fn read_ratios<P: AsRef<Path>>(path: P) -> Result<Vec<f64>> {
    collect_rows(TableReader::from_path(path)?, |row| row.float(0, "ratio"))
}

/// Parse a ratio distribution from a string.
pub fn parse_ratios(content: &str) -> Result<Vec<f64>> {
    collect_rows(TableReader::new(content.as_bytes()), |row| {
        row.float(0, "ratio")
    })
}

fn collect_rows<R, T, F>(mut reader: TableReader<R>, parse: F) -> Result<Vec<T>>
where
    R: Read,
    F: Fn(&Row<'_>) -> Result<T>,
{
    let mut out = Vec::new();
    while let Some(row) = reader.read_row()? {
        out.push(parse(&row)?);
    }
    Ok(out)
}

/// Buffered table writer.
///
/// Uses itoa for coordinates and ryu for ratios.
pub struct TableWriter<W: Write> {
    writer: BufWriter<W>,
    delimiter: u8,
    itoa_buf: itoa::Buffer,
    ryu_buf: ryu::Buffer,
}

impl TableWriter<File> {
    /// Create (or truncate) a file for writing.
    pub fn create<P: AsRef<Path>>(path: P, config: OutputConfig) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(file, config))
    }
}

impl<W: Write> TableWriter<W> {
    pub fn new(output: W, config: OutputConfig) -> Self {
        Self {
            writer: BufWriter::with_capacity(WRITE_BUF_SIZE, output),
            delimiter: config.delimiter.as_byte(),
            itoa_buf: itoa::Buffer::new(),
            ryu_buf: ryu::Buffer::new(),
        }
    }

    #[inline]
    fn write_anchor(&mut self, anchor: &Interval) -> Result<()> {
        self.writer.write_all(anchor.chrom.as_bytes())?;
        self.writer.write_all(&[self.delimiter])?;
        self.writer
            .write_all(self.itoa_buf.format(anchor.start).as_bytes())?;
        self.writer.write_all(&[self.delimiter])?;
        self.writer
            .write_all(self.itoa_buf.format(anchor.end).as_bytes())?;
        Ok(())
    }

    #[inline]
    fn write_loop_fields(&mut self, lp: &LoopRecord) -> Result<()> {
        self.write_anchor(&lp.anchor1)?;
        self.writer.write_all(&[self.delimiter])?;
        self.write_anchor(&lp.anchor2)
    }

    /// Write one loop as a 6-column line.
    pub fn write_loop(&mut self, lp: &LoopRecord) -> Result<()> {
        self.write_loop_fields(lp)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Write one loop followed by its overlapping interval indices.
    ///
    /// Indices are comma-joined (semicolon-joined when the table itself is
    /// comma-delimited); [`NO_OVERLAP`] marks a loop with none.
    pub fn write_annotated(&mut self, lp: &LoopRecord, overlaps: &[usize]) -> Result<()> {
        self.write_loop_fields(lp)?;
        self.writer.write_all(&[self.delimiter])?;
        if overlaps.is_empty() {
            self.writer.write_all(NO_OVERLAP.as_bytes())?;
        } else {
            let joiner = if self.delimiter == b',' { b';' } else { b',' };
            for (i, idx) in overlaps.iter().enumerate() {
                if i > 0 {
                    self.writer.write_all(&[joiner])?;
                }
                self.writer.write_all(self.itoa_buf.format(*idx).as_bytes())?;
            }
        }
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Write one ratio per line.
    pub fn write_ratio(&mut self, ratio: f64) -> Result<()> {
        self.writer.write_all(self.ryu_buf.format(ratio).as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Flush buffered output.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Write a loop set to a file.
pub fn write_loops<P: AsRef<Path>>(
    path: P,
    loops: &[LoopRecord],
    config: OutputConfig,
) -> Result<()> {
    let mut writer = TableWriter::create(path, config)?;
    for lp in loops {
        writer.write_loop(lp)?;
    }
    writer.flush()
}

/// Write a ratio distribution to a file.
pub fn write_ratios<P: AsRef<Path>>(path: P, ratios: &[f64]) -> Result<()> {
    let mut writer = TableWriter::create(path, OutputConfig::default())?;
    for &ratio in ratios {
        writer.write_ratio(ratio)?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_loops_tab() {
        let content = "chr1\t100\t200\tchr1\t300\t400\nchr2\t10\t20\tchr2\t50\t60\n";
        let loops = parse_loops(content).unwrap();

        assert_eq!(loops.len(), 2);
        assert_eq!(loops[0], LoopRecord::intra("chr1", 100, 200, 300, 400));
        assert_eq!(loops[1].chrom1(), "chr2");
    }

    #[test]
    fn test_parse_loops_detects_space() {
        let content = "chr1 100 200 chr1 300 400\n";
        let loops = parse_loops(content).unwrap();
        assert_eq!(loops[0].end2(), 400);
    }

    #[test]
    fn test_parse_loops_skips_comments_and_blanks() {
        let content = "# header comment\n\nchr1\t100\t200\tchr1\t300\t400\n";
        assert_eq!(parse_loops(content).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_loops_too_few_columns() {
        let err = parse_loops("chr1\t100\t200\tchr1\t300\n").unwrap_err();
        match err {
            LoopError::Parse { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_loops_bad_coordinate() {
        let err = parse_loops("chr1\t100\t200\tchr1\t3x0\t400\n").unwrap_err();
        assert!(err.to_string().contains("start2"));
    }

    #[test]
    fn test_fixed_delimiter() {
        let reader =
            TableReader::new("chr1,1,2,chr1,5,6\n".as_bytes()).with_delimiter(Delimiter::Comma);
        let loops = read_loops_from(reader).unwrap();
        assert_eq!(loops[0].start2(), 5);
    }

    #[test]
    fn test_parse_intervals_rejects_inverted() {
        assert!(parse_intervals("chr1\t200\t100\n").is_err());
        let ok = parse_intervals("chr1\t100\t200\n").unwrap();
        assert_eq!(ok[0], Interval::new("chr1", 100, 200));
    }

    #[test]
    fn test_parse_ratios() {
        let ratios = parse_ratios("0.1\n0.25\n\n0.5\n").unwrap();
        assert_eq!(ratios, vec![0.1, 0.25, 0.5]);
        assert!(parse_ratios("0.1\nnan\n").is_err());
    }

    #[test]
    fn test_write_loop_and_annotation() {
        let lp = LoopRecord::intra("chr1", 100, 200, 300, 400);
        let mut out = Vec::new();
        {
            let mut writer = TableWriter::new(&mut out, OutputConfig::new(Delimiter::Comma));
            writer.write_loop(&lp).unwrap();
            writer.write_annotated(&lp, &[0, 3]).unwrap();
            writer.write_annotated(&lp, &[]).unwrap();
            writer.flush().unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "chr1,100,200,chr1,300,400");
        assert_eq!(lines[1], "chr1,100,200,chr1,300,400,0;3");
        assert_eq!(lines[2], "chr1,100,200,chr1,300,400,.");
    }

    #[test]
    fn test_write_ratio_round_trips_through_parser() {
        let mut out = Vec::new();
        {
            let mut writer = TableWriter::new(&mut out, OutputConfig::default());
            writer.write_ratio(0.034299968818210166).unwrap();
            writer.flush().unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        assert_eq!(parse_ratios(&text).unwrap(), vec![0.034299968818210166]);
    }
}
