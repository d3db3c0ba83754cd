use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use super::headers::DetectedHeaders;

/// How participant names are laid out in the file.
#[derive(PartialEq, Eq, Clone, Copy, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One column with the full name.
    #[default]
    Full,
    /// Separate first and last name columns.
    Split,
}

impl Mode {
    pub fn slots(&self) -> &'static [Slot] {
        match self {
            Mode::Full => &[Slot::Name, Slot::TicketNumber],
            Mode::Split => &[Slot::FirstName, Slot::LastName, Slot::TicketNumber],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mode::Full => "Single Name column",
            Mode::Split => "First & Last columns",
        }
    }
}

/// An import field a header can be assigned to.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum Slot {
    Name,
    FirstName,
    LastName,
    TicketNumber,
}

impl Slot {
    pub fn label(&self) -> &'static str {
        match self {
            Slot::Name => "Name",
            Slot::FirstName => "First Name",
            Slot::LastName => "Last Name",
            Slot::TicketNumber => "Ticket Number",
        }
    }
}

/// Draft assignment of header columns to import fields.
/// An empty string means the slot is not set yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mapping {
    Full {
        name: String,
        ticket_number: String,
    },
    Split {
        first_name: String,
        last_name: String,
        ticket_number: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MappingEvent {
    SetMode(Mode),
    Assign(Slot, String),
    Clear(Slot),
}

impl Mapping {
    pub fn empty(mode: Mode) -> Self {
        match mode {
            Mode::Full => Mapping::Full {
                name: String::new(),
                ticket_number: String::new(),
            },
            Mode::Split => Mapping::Split {
                first_name: String::new(),
                last_name: String::new(),
                ticket_number: String::new(),
            },
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Mapping::Full { .. } => Mode::Full,
            Mapping::Split { .. } => Mode::Split,
        }
    }

    /// Value of a slot, `None` if the slot does not belong to the active mode.
    pub fn get(&self, slot: Slot) -> Option<&str> {
        match (self, slot) {
            (Mapping::Full { name, .. }, Slot::Name) => Some(name.as_str()),
            (Mapping::Split { first_name, .. }, Slot::FirstName) => Some(first_name.as_str()),
            (Mapping::Split { last_name, .. }, Slot::LastName) => Some(last_name.as_str()),
            (Mapping::Full { ticket_number, .. }, Slot::TicketNumber)
            | (Mapping::Split { ticket_number, .. }, Slot::TicketNumber) => {
                Some(ticket_number.as_str())
            }
            _ => None,
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> Option<&mut String> {
        match (self, slot) {
            (Mapping::Full { name, .. }, Slot::Name) => Some(name),
            (Mapping::Split { first_name, .. }, Slot::FirstName) => Some(first_name),
            (Mapping::Split { last_name, .. }, Slot::LastName) => Some(last_name),
            (Mapping::Full { ticket_number, .. }, Slot::TicketNumber)
            | (Mapping::Split { ticket_number, .. }, Slot::TicketNumber) => Some(ticket_number),
            _ => None,
        }
    }

    /// Active slots with their values, in display order.
    pub fn slots(&self) -> Vec<(Slot, &str)> {
        self.mode()
            .slots()
            .iter()
            .filter_map(|&slot| self.get(slot).map(|value| (slot, value)))
            .collect()
    }

    pub fn transition(self, event: MappingEvent) -> Self {
        match event {
            MappingEvent::SetMode(mode) if mode == self.mode() => self,
            MappingEvent::SetMode(Mode::Full) => {
                let ticket_number = self.into_ticket_number();
                Mapping::Full {
                    name: String::new(),
                    ticket_number,
                }
            }
            MappingEvent::SetMode(Mode::Split) => {
                let ticket_number = self.into_ticket_number();
                Mapping::Split {
                    first_name: String::new(),
                    last_name: String::new(),
                    ticket_number,
                }
            }
            MappingEvent::Assign(slot, column) => self.with_slot(slot, column),
            MappingEvent::Clear(slot) => self.with_slot(slot, String::new()),
        }
    }

    fn with_slot(mut self, slot: Slot, value: String) -> Self {
        if let Some(current) = self.slot_mut(slot) {
            *current = value;
        }
        self
    }

    fn into_ticket_number(self) -> String {
        match self {
            Mapping::Full { ticket_number, .. } | Mapping::Split { ticket_number, .. } => {
                ticket_number
            }
        }
    }

    /// Columns already assigned to some slot.
    pub fn taken(&self) -> HashSet<&str> {
        self.slots()
            .into_iter()
            .map(|(_, value)| value)
            .filter(|value| !value.is_empty())
            .collect()
    }

    /// Whether `column` can be offered for `slot`: it is free, or already this slot's value.
    pub fn is_available(&self, column: &str, slot: Slot) -> bool {
        self.get(slot) == Some(column) || !self.taken().contains(column)
    }

    /// Everything preventing this mapping from being saved against `headers`.
    pub fn issues(&self, headers: &DetectedHeaders) -> Vec<MappingIssue> {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();

        for (slot, value) in self.slots() {
            if value.is_empty() {
                issues.push(MappingIssue::Unset(slot));
                continue;
            }
            if !headers.contains(value) {
                issues.push(MappingIssue::UnknownColumn(slot, value.to_string()));
            }
            if !seen.insert(value) {
                let duplicate = MappingIssue::Duplicate(value.to_string());
                if !issues.contains(&duplicate) {
                    issues.push(duplicate);
                }
            }
        }
        issues
    }

    pub fn is_valid(&self, headers: &DetectedHeaders) -> bool {
        self.issues(headers).is_empty()
    }

    /// Freezes a valid mapping; `None` while any issue remains.
    pub fn normalize(&self, headers: &DetectedHeaders) -> Option<NormalizedMapping> {
        if !self.is_valid(headers) {
            return None;
        }
        Some(match self {
            Mapping::Full {
                name,
                ticket_number,
            } => NormalizedMapping::Full {
                name_column: name.clone(),
                ticket_number_column: ticket_number.clone(),
            },
            Mapping::Split {
                first_name,
                last_name,
                ticket_number,
            } => NormalizedMapping::Split {
                first_name_column: first_name.clone(),
                last_name_column: last_name.clone(),
                ticket_number_column: ticket_number.clone(),
            },
        })
    }
}

/// A complete, validated mapping, ready to hand to a submitter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NormalizedMapping {
    #[serde(rename_all = "camelCase")]
    Full {
        name_column: String,
        ticket_number_column: String,
    },
    #[serde(rename_all = "camelCase")]
    Split {
        first_name_column: String,
        last_name_column: String,
        ticket_number_column: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MappingIssue {
    Unset(Slot),
    UnknownColumn(Slot, String),
    Duplicate(String),
}

impl fmt::Display for MappingIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingIssue::Unset(slot) => write!(f, "{} is not set", slot.label()),
            MappingIssue::UnknownColumn(slot, column) => {
                write!(f, "{} uses unknown column {:?}", slot.label(), column)
            }
            MappingIssue::Duplicate(column) => write!(
                f,
                "Column {:?} is used more than once; each field must use a different column",
                column
            ),
        }
    }
}

/// Snapshot of an import in progress: the chosen file, its headers and the draft mapping.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportSession {
    pub file: Option<PathBuf>,
    pub headers: DetectedHeaders,
    pub mapping: Mapping,
    default_mode: Mode,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    SelectFile {
        path: PathBuf,
        headers: DetectedHeaders,
    },
    Reset,
    Mapping(MappingEvent),
}

impl ImportSession {
    pub fn new(default_mode: Mode) -> Self {
        Self {
            file: None,
            headers: DetectedHeaders::default(),
            mapping: Mapping::empty(default_mode),
            default_mode,
        }
    }

    pub fn apply(self, event: SessionEvent) -> Self {
        match event {
            SessionEvent::SelectFile { path, headers } => Self {
                file: Some(path),
                headers,
                mapping: Mapping::empty(self.mapping.mode()),
                default_mode: self.default_mode,
            },
            SessionEvent::Reset => Self::new(self.default_mode),
            SessionEvent::Mapping(event) => Self {
                mapping: self.mapping.transition(event),
                ..self
            },
        }
    }

    pub fn issues(&self) -> Vec<MappingIssue> {
        self.mapping.issues(&self.headers)
    }

    pub fn can_save(&self) -> bool {
        self.file.is_some() && self.headers.has_columns() && self.mapping.is_valid(&self.headers)
    }
}
