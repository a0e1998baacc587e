//! Participant sessions.
//!
//! A session is created when a participant joins the open poll. Grades are given in the
//! order of the poll choices: the choice being graded is always the first one without a
//! grade, so replaying a grade event for an already graded choice has no effect.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, info};

use crate::poll::registry::{Poll, PollToken};
use crate::poll::{rejected, ActionError, ParticipantId, Rejection};

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SessionState {
    /// Grading the choice at this index.
    Grading(usize),
    AllGraded,
    Validated,
}

/// What follows an accepted grade.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Progress {
    Next(String),
    Completed,
}

#[derive(Debug, Clone)]
pub struct ParticipantSession {
    participant: ParticipantId,
    poll: Arc<Poll>,
    // One slot per choice, in poll order. A slot holds the 1-based rank of the grade.
    grades: Vec<Option<usize>>,
    validated: bool,
    joined_seq: u64,
}

impl ParticipantSession {
    /// A fresh session with no grade, grading the first choice.
    pub fn join(participant: &ParticipantId, poll: Arc<Poll>) -> ParticipantSession {
        let grades = vec![None; poll.choices.len()];
        ParticipantSession {
            participant: participant.clone(),
            poll,
            grades,
            validated: false,
            joined_seq: 0,
        }
    }

    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }

    pub fn poll(&self) -> &Poll {
        &self.poll
    }

    pub fn token(&self) -> PollToken {
        self.poll.token
    }

    pub fn state(&self) -> SessionState {
        if self.validated {
            return SessionState::Validated;
        }
        match self.current_index() {
            Some(idx) => SessionState::Grading(idx),
            None => SessionState::AllGraded,
        }
    }

    fn current_index(&self) -> Option<usize> {
        self.grades.iter().position(|g| g.is_none())
    }

    /// The choice waiting for a grade, if any.
    pub fn current_choice(&self) -> Option<&str> {
        if self.validated {
            return None;
        }
        self.current_index()
            .map(|idx| self.poll.choices[idx].as_str())
    }

    pub fn is_complete(&self) -> bool {
        self.grades.iter().all(|g| g.is_some())
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    /// The ranks of all the choices, when every choice is graded.
    pub fn ballot(&self) -> Option<Vec<usize>> {
        self.grades.iter().cloned().collect()
    }

    /// Every choice with the label of its grade, if graded.
    pub fn grade_labels(&self) -> Vec<(String, Option<String>)> {
        self.poll
            .choices
            .iter()
            .zip(self.grades.iter())
            .map(|(choice, rank)| {
                let label = rank
                    .and_then(|r| self.poll.grades.label(r))
                    .map(|l| l.to_string());
                (choice.clone(), label)
            })
            .collect()
    }

    /// Records the grade of the current choice.
    ///
    /// Rejected when `choice` is not the current choice, when `grade` is not in the scale
    /// or when the session is not grading anymore. A rejected event changes nothing.
    pub fn grade(&mut self, choice: &str, grade: &str) -> Result<Progress, ActionError> {
        if self.validated {
            return rejected(Rejection::AlreadyValidated);
        }
        let current = match self.current_index() {
            Some(idx) => idx,
            None => {
                return rejected(Rejection::WrongChoice {
                    expected: None,
                    found: choice.to_string(),
                })
            }
        };
        if self.poll.choices[current] != choice {
            if self.poll.choice_index(choice).is_none() {
                return rejected(Rejection::UnknownChoice(choice.to_string()));
            }
            return rejected(Rejection::WrongChoice {
                expected: Some(self.poll.choices[current].clone()),
                found: choice.to_string(),
            });
        }
        let rank = match self.poll.grades.rank_of(grade) {
            Some(rank) => rank,
            None => return rejected(Rejection::UnknownGrade(grade.to_string())),
        };
        self.grades[current] = Some(rank);
        info!(
            "grade: {} graded {:?} as {:?}",
            self.participant, choice, grade
        );
        match self.current_index() {
            Some(next) => Ok(Progress::Next(self.poll.choices[next].clone())),
            None => {
                info!("grade: {} has graded every choice", self.participant);
                Ok(Progress::Completed)
            }
        }
    }

    /// Freezes the grades. Only possible once every choice is graded.
    pub fn validate(&mut self) -> Result<(), ActionError> {
        match self.state() {
            SessionState::AllGraded => {
                self.validated = true;
                info!("validate: {} validated their grades", self.participant);
                Ok(())
            }
            SessionState::Validated => rejected(Rejection::AlreadyValidated),
            SessionState::Grading(_) => rejected(Rejection::Incomplete),
        }
    }
}

/// The sessions of one poll, keyed by participant.
///
/// Every operation on a participant holds the lock of that participant's entry for its
/// whole duration, so events of one participant are applied one at a time.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: DashMap<ParticipantId, ParticipantSession>,
    next_seq: AtomicU64,
}

impl SessionTable {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Creates the session of a participant, or leaves an existing one untouched.
    ///
    /// Returns `true` when the session was created. `render` sees the session in both
    /// cases, under the participant lock.
    pub fn join<T>(
        &self,
        participant: &ParticipantId,
        poll: &Arc<Poll>,
        render: impl FnOnce(&ParticipantSession) -> T,
    ) -> (bool, T) {
        match self.sessions.entry(participant.clone()) {
            Entry::Occupied(e) => {
                debug!("join: {} already joined", participant);
                (false, render(e.get()))
            }
            Entry::Vacant(e) => {
                let mut session = ParticipantSession::join(participant, poll.clone());
                session.joined_seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
                info!("join: {} joined poll {}", participant, poll.token);
                let session = e.insert(session);
                (true, render(&session))
            }
        }
    }

    /// Applies `action` to the session of a participant.
    pub fn with_session<T>(
        &self,
        participant: &ParticipantId,
        action: impl FnOnce(&mut ParticipantSession) -> Result<T, ActionError>,
    ) -> Result<T, ActionError> {
        match self.sessions.get_mut(participant) {
            Some(mut session) => action(&mut session),
            None => rejected(Rejection::NotJoined),
        }
    }

    /// Deletes the session of a participant.
    ///
    /// Returns `false` when the participant had no session. Validated grades are final:
    /// resetting them is rejected.
    pub fn reset(&self, participant: &ParticipantId) -> Result<bool, ActionError> {
        match self.sessions.entry(participant.clone()) {
            Entry::Occupied(e) if e.get().is_validated() => rejected(Rejection::AlreadyValidated),
            Entry::Occupied(e) => {
                e.remove();
                info!("reset: {} cleared their grades", participant);
                Ok(true)
            }
            Entry::Vacant(_) => {
                debug!("reset: {} has no session", participant);
                Ok(false)
            }
        }
    }

    /// Starts over: the grades of a participant are dropped and a fresh session takes
    /// their place, in one step.
    pub fn restart<T>(
        &self,
        participant: &ParticipantId,
        poll: &Arc<Poll>,
        render: impl FnOnce(&ParticipantSession) -> T,
    ) -> Result<T, ActionError> {
        match self.sessions.entry(participant.clone()) {
            Entry::Occupied(e) if e.get().is_validated() => rejected(Rejection::AlreadyValidated),
            Entry::Occupied(mut e) => {
                let mut session = ParticipantSession::join(participant, poll.clone());
                session.joined_seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
                e.insert(session);
                info!("restart: {} starts over", participant);
                Ok(render(e.get()))
            }
            Entry::Vacant(_) => rejected(Rejection::NotJoined),
        }
    }

    pub fn get(&self, participant: &ParticipantId) -> Option<ParticipantSession> {
        self.sessions.get(participant).map(|s| s.value().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn clear(&self) {
        self.sessions.clear();
    }

    /// A copy of all the sessions, in the order participants joined.
    pub fn snapshot(&self) -> Vec<ParticipantSession> {
        let mut res: Vec<ParticipantSession> =
            self.sessions.iter().map(|s| s.value().clone()).collect();
        res.sort_by_key(|s| s.joined_seq);
        res
    }
}
