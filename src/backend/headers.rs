use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use tracing::info;

use super::loader::{ByteSource, FirstLineReader, MmapSource, ReaderSource};
use super::parser::CsvParser;
use super::settings::Settings;
use super::sniffer::{Delimiter, sniff};

/// Column names of a file's first line, in source order.
/// Duplicates and empty names are kept as found.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectedHeaders {
    pub delimiter: Delimiter,
    pub headers: Vec<String>,
}

impl DetectedHeaders {
    pub fn from_line(line: &str) -> Self {
        let delimiter = sniff(line);
        Self {
            delimiter,
            headers: CsvParser::parse_line(line, delimiter),
        }
    }

    /// False when the line held nothing but empty names.
    pub fn has_columns(&self) -> bool {
        self.headers.iter().any(|h| !h.is_empty())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    /// Index of the first column with this name.
    pub fn position(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

pub fn extract_headers<S: ByteSource + ?Sized>(
    source: &mut S,
    encoding: &str,
    chunk_size: usize,
) -> io::Result<DetectedHeaders> {
    let line = FirstLineReader::with_label(encoding, chunk_size).read(source)?;
    Ok(DetectedHeaders::from_line(&line))
}

pub fn extract_headers_from_path(path: &Path, settings: &Settings) -> io::Result<DetectedHeaders> {
    let detected = if settings.use_mmap {
        let mut source = MmapSource::open(path)?;
        extract_headers(&mut source, &settings.encoding, settings.chunk_size)?
    } else {
        let mut source = ReaderSource::open(path)?;
        extract_headers(&mut source, &settings.encoding, settings.chunk_size)?
    };

    info!(
        "Detected {} columns in {:?} ({} separated)",
        detected.len(),
        path,
        detected.delimiter.name()
    );
    Ok(detected)
}
