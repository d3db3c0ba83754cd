use anyhow::{Context, Result};
use clap::Args;
use encoding_rs::Encoding;
use serde_json::json;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::backend::error::ImportResult;
use crate::backend::export::ParticipantExporter;
use crate::backend::headers::{DetectedHeaders, extract_headers_from_path};
use crate::backend::loader::resolve_encoding;
use crate::backend::mapping::{
    ImportSession, MappingEvent, MappingIssue, Mode, NormalizedMapping, SessionEvent, Slot,
};
use crate::backend::parser::CsvParser;
use crate::backend::settings::Settings;
use crate::backend::sniffer::Delimiter;
use crate::backend::submit::{SaveOutcome, SubmitReceipt, Submitter};

#[derive(Args, Debug)]
pub struct HeadersArgs {
    /// Path to the CSV file
    pub file: PathBuf,
    /// Text encoding of the file (defaults to the configured one)
    #[arg(short, long)]
    pub encoding: Option<String>,
    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct MapArgs {
    /// Path to the CSV file
    pub file: PathBuf,
    /// Column holding the full name
    #[arg(long, conflicts_with_all = ["first", "last"])]
    pub name: Option<String>,
    /// Column holding the first name
    #[arg(long)]
    pub first: Option<String>,
    /// Column holding the last name
    #[arg(long)]
    pub last: Option<String>,
    /// Column holding the ticket number
    #[arg(long)]
    pub ticket: Option<String>,
    /// Write the mapped participants as JSON to this path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Text encoding of the file (defaults to the configured one)
    #[arg(short, long)]
    pub encoding: Option<String>,
}

impl MapArgs {
    fn mode(&self, default: Mode) -> Mode {
        if self.first.is_some() || self.last.is_some() {
            Mode::Split
        } else if self.name.is_some() {
            Mode::Full
        } else {
            default
        }
    }

    fn events(&self, default: Mode) -> Vec<SessionEvent> {
        let mut events = vec![SessionEvent::Mapping(MappingEvent::SetMode(self.mode(default)))];
        let assignments = [
            (Slot::Name, &self.name),
            (Slot::FirstName, &self.first),
            (Slot::LastName, &self.last),
            (Slot::TicketNumber, &self.ticket),
        ];
        for (slot, column) in assignments {
            if let Some(column) = column {
                events.push(SessionEvent::Mapping(MappingEvent::Assign(slot, column.clone())));
            }
        }
        events
    }
}

/// Prints the upload payload instead of sending it anywhere.
struct PrintSubmitter<W: Write> {
    out: W,
}

impl<W: Write> Submitter for PrintSubmitter<W> {
    fn submit(&mut self, file: &Path, mapping: &NormalizedMapping) -> ImportResult<SubmitReceipt> {
        let payload = json!({ "file": file, "mapping": mapping });
        serde_json::to_writer_pretty(&mut self.out, &payload)?;
        writeln!(self.out)?;
        Ok(SubmitReceipt { records: 0 })
    }
}

/// Reads the headers of `file`, honouring an `--encoding` override for this
/// run only. Returns the encoding that was used so rows decode the same way.
fn load_headers(
    file: &Path,
    settings: &mut Settings,
    encoding: Option<&str>,
) -> Result<(DetectedHeaders, &'static Encoding)> {
    let effective = match encoding {
        Some(encoding) => Settings {
            encoding: encoding.to_string(),
            ..settings.clone()
        },
        None => settings.clone(),
    };
    let detected = extract_headers_from_path(file, &effective)
        .with_context(|| format!("Failed to read headers from {:?}", file))?;
    settings.add_recent_file(&file.to_string_lossy());
    Ok((detected, resolve_encoding(&effective.encoding)))
}

pub fn headers(args: &HeadersArgs, settings: &mut Settings) -> Result<bool> {
    let (detected, _) = load_headers(&args.file, settings, args.encoding.as_deref())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&detected)?);
    } else if detected.has_columns() {
        println!("Delimiter: {}", detected.delimiter.name());
        for (i, header) in detected.headers.iter().enumerate() {
            println!("{:>3}  {}", i + 1, header);
        }
    }

    if !detected.has_columns() {
        eprintln!("No columns detected in {:?}", args.file);
        return Ok(false);
    }
    Ok(true)
}

pub fn map(args: &MapArgs, settings: &mut Settings) -> Result<bool> {
    let (detected, encoding) = load_headers(&args.file, settings, args.encoding.as_deref())?;
    if !detected.has_columns() {
        eprintln!("No columns detected in {:?}", args.file);
        return Ok(false);
    }

    let session = args.events(settings.default_mode).into_iter().fold(
        ImportSession::new(settings.default_mode).apply(SessionEvent::SelectFile {
            path: args.file.clone(),
            headers: detected,
        }),
        ImportSession::apply,
    );

    print_summary(&session);

    let outcome = match &args.output {
        Some(output) => {
            let mut exporter =
                ParticipantExporter::new(session.headers.clone(), output).with_encoding(encoding);
            session.save(&mut exporter)
        }
        None => session.save(&mut PrintSubmitter { out: io::stdout().lock() }),
    }
    .context("Save failed, nothing was imported; fix the problem and try again")?;

    match outcome {
        SaveOutcome::Submitted(receipt) => {
            if let Some(output) = &args.output {
                println!("Saved {} participants to {:?}", receipt.records, output);
            }
            Ok(true)
        }
        SaveOutcome::Rejected(issues) => {
            print_issues(&issues);
            Ok(false)
        }
    }
}

fn print_summary(session: &ImportSession) {
    if let Some(file) = &session.file {
        println!("File: {}", file.display());
    }
    let columns: Vec<String> = session
        .headers
        .headers
        .iter()
        .map(|h| CsvParser::quote_field(h, Delimiter::Comma))
        .collect();
    println!("Detected columns: {}", columns.join(", "));
    println!("Name mapping mode: {}", session.mapping.mode().name());
    println!();
    println!("Mapping summary");
    for (slot, column) in session.mapping.slots() {
        if column.is_empty() {
            let available: Vec<&str> = session
                .headers
                .headers
                .iter()
                .map(String::as_str)
                .filter(|h| !h.is_empty() && session.mapping.is_available(h, slot))
                .collect();
            println!("  - {} -> not set (available: {})", slot.label(), available.join(", "));
        } else {
            println!("  - {} -> {}", slot.label(), column);
        }
    }
    println!();
}

fn print_issues(issues: &[MappingIssue]) {
    for issue in issues {
        eprintln!("  ! {}", issue);
    }
    eprintln!("Select distinct columns to enable saving.");
}
