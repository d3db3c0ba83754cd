use std::path::Path;
use tracing::info;

use super::error::ImportResult;
use super::mapping::{ImportSession, MappingIssue, NormalizedMapping};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub records: usize,
}

/// Receives the original file together with its validated mapping.
pub trait Submitter {
    fn submit(&mut self, file: &Path, mapping: &NormalizedMapping) -> ImportResult<SubmitReceipt>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing was submitted.
    Rejected(Vec<MappingIssue>),
    Submitted(SubmitReceipt),
}

impl ImportSession {
    /// Hands the file and its frozen mapping to `submitter`, once.
    /// An unsaveable session never reaches the submitter.
    pub fn save<S: Submitter + ?Sized>(&self, submitter: &mut S) -> ImportResult<SaveOutcome> {
        let (Some(file), true) = (self.file.as_deref(), self.can_save()) else {
            return Ok(SaveOutcome::Rejected(self.issues()));
        };
        let Some(mapping) = self.mapping.normalize(&self.headers) else {
            return Ok(SaveOutcome::Rejected(self.issues()));
        };

        let receipt = submitter.submit(file, &mapping)?;
        info!("Submitted {} records from {:?}", receipt.records, file);
        Ok(SaveOutcome::Submitted(receipt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::error::ImportError;
    use crate::backend::headers::DetectedHeaders;
    use crate::backend::mapping::{MappingEvent, Mode, SessionEvent, Slot};
    use std::path::PathBuf;

    #[derive(Default)]
    struct RecordingSubmitter {
        calls: Vec<(PathBuf, NormalizedMapping)>,
        fail: bool,
    }

    impl Submitter for RecordingSubmitter {
        fn submit(&mut self, file: &Path, mapping: &NormalizedMapping) -> ImportResult<SubmitReceipt> {
            self.calls.push((file.to_path_buf(), mapping.clone()));
            if self.fail {
                return Err(ImportError::Submission("server returned 503".to_string()));
            }
            Ok(SubmitReceipt { records: 3 })
        }
    }

    fn session() -> ImportSession {
        ImportSession::new(Mode::Full).apply(SessionEvent::SelectFile {
            path: PathBuf::from("participants.csv"),
            headers: DetectedHeaders::from_line("First,Last,Ticket"),
        })
    }

    fn assign(slot: Slot, column: &str) -> SessionEvent {
        SessionEvent::Mapping(MappingEvent::Assign(slot, column.to_string()))
    }

    #[test]
    fn test_invalid_session_never_submits() -> anyhow::Result<()> {
        let mut submitter = RecordingSubmitter::default();
        let outcome = session().apply(assign(Slot::Name, "First")).save(&mut submitter)?;

        assert_eq!(
            outcome,
            SaveOutcome::Rejected(vec![MappingIssue::Unset(Slot::TicketNumber)])
        );
        assert!(submitter.calls.is_empty());
        Ok(())
    }

    #[test]
    fn test_valid_session_submits_once() -> anyhow::Result<()> {
        let mut submitter = RecordingSubmitter::default();
        let session = session()
            .apply(SessionEvent::Mapping(MappingEvent::SetMode(Mode::Split)))
            .apply(assign(Slot::FirstName, "First"))
            .apply(assign(Slot::LastName, "Last"))
            .apply(assign(Slot::TicketNumber, "Ticket"));

        let outcome = session.save(&mut submitter)?;
        assert_eq!(outcome, SaveOutcome::Submitted(SubmitReceipt { records: 3 }));
        assert_eq!(
            submitter.calls,
            vec![(
                PathBuf::from("participants.csv"),
                NormalizedMapping::Split {
                    first_name_column: "First".to_string(),
                    last_name_column: "Last".to_string(),
                    ticket_number_column: "Ticket".to_string(),
                }
            )]
        );
        Ok(())
    }

    #[test]
    fn test_submission_failure_is_returned() {
        let mut submitter = RecordingSubmitter {
            fail: true,
            ..Default::default()
        };
        let session = session()
            .apply(assign(Slot::Name, "First"))
            .apply(assign(Slot::TicketNumber, "Ticket"));

        let result = session.save(&mut submitter);
        assert!(matches!(result, Err(ImportError::Submission(_))));
        assert_eq!(submitter.calls.len(), 1);
    }

    #[test]
    fn test_without_file_nothing_is_submitted() -> anyhow::Result<()> {
        let mut submitter = RecordingSubmitter::default();
        let session = ImportSession::new(Mode::Full)
            .apply(assign(Slot::Name, "First"))
            .apply(assign(Slot::TicketNumber, "Ticket"));

        assert!(matches!(session.save(&mut submitter)?, SaveOutcome::Rejected(_)));
        assert!(submitter.calls.is_empty());
        Ok(())
    }
}
