//! Runtime configuration for loopsim I/O.
//!
//! Nothing here is global: readers and writers receive a [`Delimiter`] or an
//! [`OutputConfig`] explicitly, so the simulation and statistics code never
//! depend on process-wide state.

use std::fmt;
use std::str::FromStr;

use memchr::memchr_iter;

/// Field delimiter for headerless tabular files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Delimiter {
    #[default]
    Tab,
    /// Runs of spaces or tabs.
    Whitespace,
    Comma,
    Semicolon,
    Pipe,
    /// Any other single ASCII byte.
    Other(u8),
}

/// Candidates considered by [`Delimiter::detect`], in tie-break order.
const CANDIDATES: [(u8, Delimiter); 5] = [
    (b'\t', Delimiter::Tab),
    (b',', Delimiter::Comma),
    (b';', Delimiter::Semicolon),
    (b'|', Delimiter::Pipe),
    (b' ', Delimiter::Whitespace),
];

impl Delimiter {
    /// The byte written between output fields.
    #[inline]
    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Tab => b'\t',
            Self::Whitespace => b' ',
            Self::Comma => b',',
            Self::Semicolon => b';',
            Self::Pipe => b'|',
            Self::Other(b) => *b,
        }
    }

    /// Guess the delimiter of a file from one of its lines.
    ///
    /// The most frequent candidate wins. Returns `None` for single-column lines.
    pub fn detect(line: &str) -> Option<Self> {
        let bytes = line.trim_end_matches(|c: char| c == '\n' || c == '\r').as_bytes();
        let mut best: Option<(usize, Delimiter)> = None;

        for (byte, delim) in CANDIDATES {
            let count = memchr_iter(byte, bytes).count();
            if count == 0 {
                continue;
            }
            match best {
                Some((n, _)) if n >= count => {}
                _ => best = Some((count, delim)),
            }
        }

        best.map(|(_, d)| d)
    }

    /// Split a line into trimmed fields.
    pub fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        if *self == Self::Whitespace {
            return line.split_whitespace().collect();
        }

        let bytes = line.as_bytes();
        let mut fields = Vec::with_capacity(8);
        let mut from = 0;
        for pos in memchr_iter(self.as_byte(), bytes) {
            fields.push(line[from..pos].trim());
            from = pos + 1;
        }
        fields.push(line[from..].trim());
        fields
    }
}

impl FromStr for Delimiter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "\t" | "\\t" | "tab" => Ok(Self::Tab),
            " " | "space" | "whitespace" => Ok(Self::Whitespace),
            "," | "comma" => Ok(Self::Comma),
            ";" | "semicolon" => Ok(Self::Semicolon),
            "|" | "pipe" => Ok(Self::Pipe),
            other => {
                let bytes = other.as_bytes();
                if bytes.len() == 1 && bytes[0].is_ascii() && !bytes[0].is_ascii_alphanumeric() {
                    Ok(Self::Other(bytes[0]))
                } else {
                    Err(format!(
                        "Invalid delimiter '{}'. Use a single punctuation character or: tab, space, comma, semicolon, pipe",
                        other
                    ))
                }
            }
        }
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tab => write!(f, "tab"),
            Self::Whitespace => write!(f, "space"),
            Self::Comma => write!(f, "comma"),
            Self::Semicolon => write!(f, "semicolon"),
            Self::Pipe => write!(f, "pipe"),
            Self::Other(b) => write!(f, "'{}'", *b as char),
        }
    }
}

/// Settings applied to every file loopsim writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputConfig {
    pub delimiter: Delimiter,
}

impl OutputConfig {
    pub fn new(delimiter: Delimiter) -> Self {
        Self { delimiter }
    }
}
