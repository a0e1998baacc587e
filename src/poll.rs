use log::{debug, info, warn};

use majority_judgment::*;
use snafu::{prelude::*, Snafu};

use std::fmt::Display;
use std::fs;

use text_diff::print_diff;

pub mod config_reader;
pub mod io_csv;
pub mod prompt;
pub mod registry;
pub mod router;
pub mod session;
pub mod store;
pub mod summary;

pub use crate::poll::config_reader::{StoreSettings, TabulationSettings};
pub use crate::poll::io_csv::{
    CsvOptions, ExportSummary, GradeSheet, OutOfScaleValue, ParsedGrades, ValuesType,
};
pub use crate::poll::prompt::{Control, Prompt};
pub use crate::poll::registry::{split_choices, Poll, PollRegistry, PollToken};
pub use crate::poll::router::{ActionKind, ActionToken, CallbackEvent, Dispatch};
pub use crate::poll::session::{ParticipantSession, Progress, SessionState};
pub use crate::poll::store::{Opened, ResponseFilter, SessionStore};

/// Errors reported to the moderator or to the user of the command line.
#[derive(Debug, Snafu)]
pub enum PollError {
    #[snafu(display("a poll is already open: {question}"))]
    AlreadyOpen { question: String },
    #[snafu(display("choice {choice:?} is given more than once"))]
    DuplicateChoices { choice: String },
    #[snafu(display("a poll needs at least one choice"))]
    EmptyChoices {},
    #[snafu(display("no poll is currently open"))]
    NotOpen {},
    #[snafu(display("poll {token} is not the open poll"))]
    UnknownPoll { token: String },

    #[snafu(display("tabulation failed: {source}"))]
    Judgment { source: JudgmentErrors },

    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading CSV line: {source}"))]
    CsvLineParse { source: csv::Error },
    #[snafu(display("Error writing CSV: {source}"))]
    CsvWrite { source: csv::Error },
    #[snafu(display("Error flushing CSV output: {source}"))]
    CsvFlush { source: std::io::Error },
    #[snafu(display("the CSV input has no header row"))]
    CsvMissingHeader {},
    #[snafu(display("column {column:?} appears twice in the CSV header"))]
    CsvDuplicateColumn { column: String },

    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON: {source}"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },

    #[snafu(display("unknown value {value:?} for option {option}"))]
    UnknownOption { option: String, value: String },
    #[snafu(display("no input file: use --input or csvPath in the configuration"))]
    MissingInput {},
    #[snafu(display("the summary differs from the reference summary"))]
    ReferenceMismatch {},
}

pub type PollResult<T> = Result<T, PollError>;

/// Protocol noise coming from callback events.
///
/// These errors never reach the participant: the router logs them and drops the event.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum ActionError {
    #[snafu(display("action refers to a poll that is no longer open"))]
    StaleAction {},
    #[snafu(display("malformed action token {token:?}"))]
    MalformedToken { token: String },
    #[snafu(display("rejected transition: {reason}"))]
    InvalidTransition { reason: Rejection },
}

/// Why a participant event does not apply to the current state of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NotJoined,
    WrongChoice {
        expected: Option<String>,
        found: String,
    },
    UnknownChoice(String),
    UnknownGrade(String),
    Incomplete,
    AlreadyValidated,
}

impl Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::NotJoined => write!(f, "participant has not joined the poll"),
            Rejection::WrongChoice {
                expected: Some(expected),
                found,
            } => write!(f, "grade for {:?} while grading {:?}", found, expected),
            Rejection::WrongChoice {
                expected: None,
                found,
            } => write!(f, "grade for {:?} after grading every choice", found),
            Rejection::UnknownChoice(c) => write!(f, "unknown choice {:?}", c),
            Rejection::UnknownGrade(g) => write!(f, "unknown grade {:?}", g),
            Rejection::Incomplete => write!(f, "some choices are not graded yet"),
            Rejection::AlreadyValidated => write!(f, "grades are already validated"),
        }
    }
}

pub(crate) fn rejected<T>(reason: Rejection) -> Result<T, ActionError> {
    InvalidTransitionSnafu { reason }.fail()
}

/// The opaque identity of a participant, as given by the transport.
#[derive(Eq, PartialEq, Debug, Clone, Hash, PartialOrd, Ord)]
pub struct ParticipantId(pub String);

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        ParticipantId(s.to_string())
    }
}

impl From<u64> for ParticipantId {
    fn from(id: u64) -> Self {
        ParticipantId(id.to_string())
    }
}

impl Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reads a grade CSV, runs majority judgment and writes the summary.
///
/// When a reference summary is configured, the computed summary must match it.
pub fn run_tabulation(settings: &TabulationSettings) -> PollResult<()> {
    info!("run_tabulation: settings: {:?}", settings);

    let parsed = io_csv::read_grades_csv_path(&settings.input, &settings.scale, &settings.csv)?;
    if !parsed.warnings.is_empty() {
        warn!(
            "run_tabulation: {} values are not in the grade scale {:?}",
            parsed.warnings.len(),
            settings.scale.labels()
        );
    }
    debug!("run_tabulation: tallies: {:?}", parsed.tallies);

    let result = run_judgment_stats(&parsed.tallies, &settings.scale, &settings.rules)
        .context(JudgmentSnafu {})?;

    let summary_js = summary::build_summary_js(&settings.title, &result, &parsed.warnings);
    let pretty_js_stats = serde_json::to_string_pretty(&summary_js).context(ParsingJsonSnafu {})?;

    match settings.output.as_deref() {
        None | Some("stdout") => println!("{}", pretty_js_stats),
        Some(path) => {
            fs::write(path, &pretty_js_stats).context(WritingOutputSnafu { path })?;
            info!("run_tabulation: summary written to {}", path);
        }
    }

    // The reference summary, if provided for comparison
    if let Some(reference_path) = &settings.reference {
        let summary_ref = summary::read_summary(reference_path)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("run_tabulation: found differences with the reference summary");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            return ReferenceMismatchSnafu {}.fail();
        }
        info!("run_tabulation: summary matches {}", reference_path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_messages() {
        let e = ActionError::InvalidTransition {
            reason: Rejection::WrongChoice {
                expected: Some("A".to_string()),
                found: "B".to_string(),
            },
        };
        assert_eq!(
            e.to_string(),
            "rejected transition: grade for \"B\" while grading \"A\""
        );
        assert_eq!(
            ActionError::StaleAction {}.to_string(),
            "action refers to a poll that is no longer open"
        );
        assert_eq!(
            Rejection::Incomplete.to_string(),
            "some choices are not graded yet"
        );
    }

    #[test]
    fn participant_ids() {
        assert_eq!(ParticipantId::from(42u64), ParticipantId::from("42"));
        assert_eq!(ParticipantId::from("ann").to_string(), "ann");
    }
}
