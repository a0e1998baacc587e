//! The process-wide registry of the open poll.
//!
//! At most one poll is open at a time. Opening a poll generates a fresh token, so any
//! control issued for an earlier poll no longer resolves once that poll is closed.

use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;

use log::{debug, info};
use majority_judgment::GradeScale;
use parking_lot::RwLock;
use snafu::prelude::*;
use uuid::Uuid;

use crate::poll::session::SessionTable;
use crate::poll::{
    ActionError, AlreadyOpenSnafu, DuplicateChoicesSnafu, EmptyChoicesSnafu, NotOpenSnafu,
    PollResult, StaleActionSnafu,
};

/// Opaque identity of one opened poll.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub struct PollToken(Uuid);

impl PollToken {
    pub fn generate() -> PollToken {
        PollToken(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<PollToken> {
        Uuid::parse_str(s).ok().map(PollToken)
    }
}

impl Display for PollToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Poll {
    pub token: PollToken,
    pub question: String,
    /// Distinct labels, in the order participants grade them.
    pub choices: Vec<String>,
    pub grades: GradeScale,
}

impl Poll {
    pub fn choice_index(&self, label: &str) -> Option<usize> {
        self.choices.iter().position(|c| c == label)
    }
}

/// An open poll and the sessions of its participants.
#[derive(Debug)]
pub(crate) struct LivePoll {
    pub poll: Arc<Poll>,
    pub sessions: SessionTable,
}

/// Splits the choices typed by a moderator, separated by `;`.
///
/// Entries are trimmed and blank entries are dropped.
pub fn split_choices(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn checked_choices(choices: &[String]) -> PollResult<Vec<String>> {
    let trimmed: Vec<String> = choices
        .iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    ensure!(!trimmed.is_empty(), EmptyChoicesSnafu {});
    let mut seen: HashSet<&str> = HashSet::new();
    for choice in trimmed.iter() {
        ensure!(
            seen.insert(choice.as_str()),
            DuplicateChoicesSnafu {
                choice: choice.clone()
            }
        );
    }
    Ok(trimmed)
}

/// Guards the single open poll.
///
/// Opening and closing take the write lock. Callback events only take the read lock
/// long enough to resolve the token, then work on their own handle of the poll.
#[derive(Debug, Default)]
pub struct PollRegistry {
    current: RwLock<Option<Arc<LivePoll>>>,
}

impl PollRegistry {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// Opens a new poll, if none is open.
    pub fn open(
        &self,
        question: &str,
        choices: &[String],
        grades: &GradeScale,
    ) -> PollResult<Arc<Poll>> {
        let mut current = self.current.write();
        if let Some(live) = current.as_ref() {
            return AlreadyOpenSnafu {
                question: live.poll.question.clone(),
            }
            .fail();
        }
        let choices = checked_choices(choices)?;
        let poll = Poll {
            token: PollToken::generate(),
            question: question.trim().to_string(),
            choices,
            grades: grades.clone(),
        };
        info!(
            "open: poll {} {:?} with choices {:?}",
            poll.token, poll.question, poll.choices
        );
        let poll = Arc::new(poll);
        *current = Some(Arc::new(LivePoll {
            poll: poll.clone(),
            sessions: SessionTable::new(),
        }));
        Ok(poll)
    }

    /// Closes the open poll and drops all its sessions.
    ///
    /// Returns the question and the number of choices of the closed poll.
    pub fn close(&self) -> PollResult<(String, usize)> {
        let mut current = self.current.write();
        let live = current.take().context(NotOpenSnafu {})?;
        // Events still holding the poll see an empty table from now on.
        live.sessions.clear();
        info!("close: poll {} {:?}", live.poll.token, live.poll.question);
        Ok((live.poll.question.clone(), live.poll.choices.len()))
    }

    /// A snapshot of the open poll, `None` once it is closed.
    pub fn status(&self) -> Option<Poll> {
        self.current.read().as_ref().map(|live| (*live.poll).clone())
    }

    pub(crate) fn live(&self) -> Option<Arc<LivePoll>> {
        self.current.read().clone()
    }

    /// Resolves the poll an action token refers to.
    pub(crate) fn live_for(&self, token: &PollToken) -> Result<Arc<LivePoll>, ActionError> {
        let current = self.current.read();
        match current.as_ref() {
            Some(live) if live.poll.token == *token => Ok(live.clone()),
            _ => {
                debug!("live_for: token {} does not match the open poll", token);
                StaleActionSnafu {}.fail()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::PollError;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    fn scale() -> GradeScale {
        GradeScale::likert_english()
    }

    #[test]
    fn second_open_is_rejected() {
        let registry = PollRegistry::new();
        let token = registry
            .open("Lunch?", &s(&["Pizza", "Sushi"]), &scale())
            .unwrap()
            .token;
        let res = registry.open("Dinner?", &s(&["Soup"]), &scale());
        assert!(matches!(res, Err(PollError::AlreadyOpen { question }) if question == "Lunch?"));
        let status = registry.status().unwrap();
        assert_eq!(status.token, token);
        assert_eq!(status.question, "Lunch?");
        assert_eq!(status.choices, s(&["Pizza", "Sushi"]));
    }

    #[test]
    fn malformed_choices() {
        let registry = PollRegistry::new();
        let res = registry.open("Q", &s(&["A", " A "]), &scale());
        assert!(matches!(res, Err(PollError::DuplicateChoices { choice }) if choice == "A"));
        let res = registry.open("Q", &s(&[]), &scale());
        assert!(matches!(res, Err(PollError::EmptyChoices {})));
        let res = registry.open("Q", &s(&["  ", ""]), &scale());
        assert!(matches!(res, Err(PollError::EmptyChoices {})));
        assert!(registry.status().is_none());
    }

    #[test]
    fn close_clears_the_poll() {
        let registry = PollRegistry::new();
        let token = registry.open("Q", &s(&["A", "B", "C"]), &scale()).unwrap().token;
        assert_eq!(registry.close().unwrap(), ("Q".to_string(), 3));
        assert!(registry.status().is_none());
        assert!(matches!(registry.close(), Err(PollError::NotOpen {})));
        assert_eq!(
            registry.live_for(&token).err(),
            Some(ActionError::StaleAction {})
        );
    }

    #[test]
    fn reopen_generates_a_new_token() {
        let registry = PollRegistry::new();
        let first = registry.open("Q", &s(&["A"]), &scale()).unwrap().token;
        registry.close().unwrap();
        let second = registry.open("Q", &s(&["A"]), &scale()).unwrap().token;
        assert_ne!(first, second);
        assert!(registry.live_for(&first).is_err());
        assert!(registry.live_for(&second).is_ok());
    }

    #[test]
    fn split_moderator_choices() {
        assert_eq!(split_choices("A; B ;C;"), s(&["A", "B", "C"]));
        assert_eq!(split_choices(" ; "), Vec::<String>::new());
    }

    #[test]
    fn token_display_round_trip() {
        let token = PollToken::generate();
        assert_eq!(PollToken::parse(&token.to_string()), Some(token));
        assert_eq!(PollToken::parse("not-a-token"), None);
    }
}
