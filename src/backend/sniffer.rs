use serde::{Deserialize, Serialize};

/// Field separators recognised in a header line.
#[derive(PartialEq, Eq, Clone, Copy, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    #[default]
    Comma,
    Tab,
    Semicolon,
    Pipe,
}

impl Delimiter {
    pub fn all() -> &'static [Delimiter] {
        &[
            Delimiter::Comma,
            Delimiter::Tab,
            Delimiter::Semicolon,
            Delimiter::Pipe,
        ]
    }

    pub fn as_char(&self) -> char {
        match self {
            Delimiter::Comma => ',',
            Delimiter::Tab => '\t',
            Delimiter::Semicolon => ';',
            Delimiter::Pipe => '|',
        }
    }

    pub fn as_byte(&self) -> u8 {
        self.as_char() as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Delimiter::Comma => "comma",
            Delimiter::Tab => "tab",
            Delimiter::Semicolon => "semicolon",
            Delimiter::Pipe => "pipe",
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c {
            ',' => Some(Delimiter::Comma),
            '\t' => Some(Delimiter::Tab),
            ';' => Some(Delimiter::Semicolon),
            '|' => Some(Delimiter::Pipe),
            _ => None,
        }
    }

    fn index(&self) -> usize {
        match self {
            Delimiter::Comma => 0,
            Delimiter::Tab => 1,
            Delimiter::Semicolon => 2,
            Delimiter::Pipe => 3,
        }
    }
}

/// Guesses the delimiter of a line by counting candidates outside quotes.
///
/// Candidates are tried in order and the current best is only replaced by a
/// strictly higher count, so ties go to the earlier candidate and a line
/// without any candidate keeps the comma.
pub fn sniff(line: &str) -> Delimiter {
    let mut counts = [0usize; 4];
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '"' {
            if in_quotes && chars.peek() == Some(&'"') {
                chars.next();
            } else {
                in_quotes = !in_quotes;
            }
        } else if !in_quotes {
            if let Some(d) = Delimiter::from_char(c) {
                counts[d.index()] += 1;
            }
        }
    }

    let mut best = Delimiter::Comma;
    let mut best_count = 0;
    for &candidate in Delimiter::all() {
        let n = counts[candidate.index()];
        if n > best_count {
            best = candidate;
            best_count = n;
        }
    }
    best
}
