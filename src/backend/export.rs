use encoding_rs::{Encoding, UTF_8};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use super::error::{ImportError, ImportResult};
use super::headers::DetectedHeaders;
use super::mapping::NormalizedMapping;
use super::submit::{SubmitReceipt, Submitter};

#[derive(Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Participant {
    #[serde(rename_all = "camelCase")]
    Full { name: String, ticket_number: String },
    #[serde(rename_all = "camelCase")]
    Split {
        first_name: String,
        last_name: String,
        ticket_number: String,
    },
}

/// Column indices resolved against the detected headers.
enum Projection {
    Full { name: usize, ticket: usize },
    Split { first: usize, last: usize, ticket: usize },
}

impl Projection {
    fn resolve(mapping: &NormalizedMapping, headers: &DetectedHeaders) -> ImportResult<Self> {
        let index = |column: &str| {
            headers
                .position(column)
                .ok_or_else(|| ImportError::MissingColumn(column.to_string()))
        };

        Ok(match mapping {
            NormalizedMapping::Full {
                name_column,
                ticket_number_column,
            } => Projection::Full {
                name: index(name_column.as_str())?,
                ticket: index(ticket_number_column.as_str())?,
            },
            NormalizedMapping::Split {
                first_name_column,
                last_name_column,
                ticket_number_column,
            } => Projection::Split {
                first: index(first_name_column.as_str())?,
                last: index(last_name_column.as_str())?,
                ticket: index(ticket_number_column.as_str())?,
            },
        })
    }

    fn project(&self, record: &csv::ByteRecord, encoding: &'static Encoding) -> Option<Participant> {
        let cell = |i: usize| {
            record
                .get(i)
                .map(|f| encoding.decode_without_bom_handling(f).0.trim().to_string())
                .unwrap_or_default()
        };

        let participant = match *self {
            Projection::Full { name, ticket } => Participant::Full {
                name: cell(name),
                ticket_number: cell(ticket),
            },
            Projection::Split { first, last, ticket } => Participant::Split {
                first_name: cell(first),
                last_name: cell(last),
                ticket_number: cell(ticket),
            },
        };

        let blank = match &participant {
            Participant::Full {
                name,
                ticket_number,
            } => name.is_empty() && ticket_number.is_empty(),
            Participant::Split {
                first_name,
                last_name,
                ticket_number,
            } => first_name.is_empty() && last_name.is_empty() && ticket_number.is_empty(),
        };
        (!blank).then_some(participant)
    }
}

/// Writes the mapped columns of every data row as a JSON array of participants.
///
/// Cells are decoded with the same encoding the headers were read with. The
/// output file is only replaced once the whole array has been written.
pub struct ParticipantExporter {
    headers: DetectedHeaders,
    encoding: &'static Encoding,
    output: PathBuf,
}

impl ParticipantExporter {
    pub fn new(headers: DetectedHeaders, output: impl Into<PathBuf>) -> Self {
        Self {
            headers,
            encoding: UTF_8,
            output: output.into(),
        }
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn export<W: Write>(
        &self,
        input: &Path,
        mapping: &NormalizedMapping,
        writer: W,
    ) -> ImportResult<usize> {
        let projection = Projection::resolve(mapping, &self.headers)?;

        let file = File::open(input)?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.headers.delimiter.as_byte())
            .has_headers(true)
            .flexible(true)
            .from_reader(BufReader::new(file));

        let mut writer = BufWriter::new(writer);
        writer.write_all(b"[")?;

        let mut count = 0;
        let mut record = csv::ByteRecord::new();
        while reader.read_byte_record(&mut record)? {
            let Some(participant) = projection.project(&record, self.encoding) else {
                debug!("Skipping blank row at {:?}", record.position());
                continue;
            };
            if count > 0 {
                writer.write_all(b",")?;
            }
            serde_json::to_writer(&mut writer, &participant)?;
            count += 1;
        }

        writer.write_all(b"]")?;
        writer.flush()?;
        Ok(count)
    }
}

impl Submitter for ParticipantExporter {
    fn submit(&mut self, file: &Path, mapping: &NormalizedMapping) -> ImportResult<SubmitReceipt> {
        let dir = match self.output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(dir).map_err(|e| {
            ImportError::Submission(format!("cannot create a file in {:?}: {}", dir, e))
        })?;

        let records = self.export(file, mapping, staged.as_file_mut())?;

        staged.persist(&self.output).map_err(|e| {
            ImportError::Submission(format!("cannot write {:?}: {}", self.output, e.error))
        })?;
        Ok(SubmitReceipt { records })
    }
}
