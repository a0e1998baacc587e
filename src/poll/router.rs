//! Routing of callback events.
//!
//! Every control carries an action token made of the poll token and a typed action:
//!
//! ```text
//! mj:<poll token>:join
//! mj:<poll token>:reset
//! mj:<poll token>:validate
//! mj:<poll token>:grade:<choice index>:<grade rank>
//! ```
//!
//! The participant is never part of the token: the transport tells who clicked.

use std::fmt::Display;
use std::str::FromStr;

use log::{debug, warn};

use crate::poll::prompt::{current_prompt, validated_prompt, Prompt};
use crate::poll::registry::{PollRegistry, PollToken};
use crate::poll::{rejected, ActionError, ParticipantId, Rejection};

const TOKEN_PREFIX: &str = "mj";

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum ActionKind {
    Join,
    Reset,
    /// The 0-based index of the choice and the 1-based rank of the grade.
    Grade {
        choice: usize,
        rank: usize,
    },
    Validate,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub struct ActionToken {
    pub poll: PollToken,
    pub kind: ActionKind,
}

impl ActionToken {
    pub fn new(poll: PollToken, kind: ActionKind) -> ActionToken {
        ActionToken { poll, kind }
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub fn decode(s: &str) -> Result<ActionToken, ActionError> {
        let malformed = || ActionError::MalformedToken {
            token: s.to_string(),
        };
        let parts: Vec<&str> = s.split(':').collect();
        let (prefix, poll, rest) = match parts.as_slice() {
            [prefix, poll, rest @ ..] => (*prefix, *poll, rest),
            _ => return Err(malformed()),
        };
        if prefix != TOKEN_PREFIX {
            return Err(malformed());
        }
        let poll = PollToken::parse(poll).ok_or_else(malformed)?;
        let kind = match rest {
            ["join"] => ActionKind::Join,
            ["reset"] => ActionKind::Reset,
            ["validate"] => ActionKind::Validate,
            ["grade", choice, rank] => ActionKind::Grade {
                choice: choice.parse::<usize>().map_err(|_| malformed())?,
                rank: rank.parse::<usize>().map_err(|_| malformed())?,
            },
            _ => return Err(malformed()),
        };
        Ok(ActionToken { poll, kind })
    }
}

impl Display for ActionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ActionKind::Join => write!(f, "{}:{}:join", TOKEN_PREFIX, self.poll),
            ActionKind::Reset => write!(f, "{}:{}:reset", TOKEN_PREFIX, self.poll),
            ActionKind::Validate => write!(f, "{}:{}:validate", TOKEN_PREFIX, self.poll),
            ActionKind::Grade { choice, rank } => {
                write!(f, "{}:{}:grade:{}:{}", TOKEN_PREFIX, self.poll, choice, rank)
            }
        }
    }
}

impl FromStr for ActionToken {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionToken::decode(s)
    }
}

/// One click, as delivered by the transport.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CallbackEvent {
    pub action_token: String,
    pub participant: ParticipantId,
}

impl CallbackEvent {
    pub fn new(action_token: &str, participant: &ParticipantId) -> CallbackEvent {
        CallbackEvent {
            action_token: action_token.to_string(),
            participant: participant.clone(),
        }
    }
}

/// The outcome of a callback event.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Dispatch {
    /// The prompt to send back.
    Reply(Prompt),
    /// The event was dropped. Nothing is sent to the participant.
    Ignored(ActionError),
}

impl Dispatch {
    pub fn prompt(&self) -> Option<&Prompt> {
        match self {
            Dispatch::Reply(p) => Some(p),
            Dispatch::Ignored(_) => None,
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Dispatch::Ignored(_))
    }
}

/// Resolves an event against the open poll and applies it to the session of the
/// participant who sent it.
pub fn dispatch(registry: &PollRegistry, event: &CallbackEvent) -> Dispatch {
    match route(registry, event) {
        Ok(prompt) => Dispatch::Reply(prompt),
        Err(e) => {
            match &e {
                ActionError::StaleAction {} => {
                    debug!(
                        "dispatch: dropping {:?} from {}: {}",
                        event.action_token, event.participant, e
                    )
                }
                _ => warn!(
                    "dispatch: dropping {:?} from {}: {}",
                    event.action_token, event.participant, e
                ),
            }
            Dispatch::Ignored(e)
        }
    }
}

fn route(registry: &PollRegistry, event: &CallbackEvent) -> Result<Prompt, ActionError> {
    let token = ActionToken::decode(&event.action_token)?;
    let live = registry.live_for(&token.poll)?;
    let participant = &event.participant;
    debug!("route: {} -> {:?}", participant, token.kind);

    match token.kind {
        ActionKind::Join => {
            let (_, prompt) = live.sessions.join(participant, &live.poll, current_prompt);
            Ok(prompt)
        }
        ActionKind::Reset => live
            .sessions
            .restart(participant, &live.poll, current_prompt),
        ActionKind::Grade { choice, rank } => {
            let choice_label = match live.poll.choices.get(choice) {
                Some(label) => label,
                None => return rejected(Rejection::UnknownChoice(choice.to_string())),
            };
            let grade_label = match live.poll.grades.label(rank) {
                Some(label) => label,
                None => return rejected(Rejection::UnknownGrade(rank.to_string())),
            };
            live.sessions.with_session(participant, |session| {
                session.grade(choice_label, grade_label)?;
                Ok(current_prompt(session))
            })
        }
        ActionKind::Validate => {
            live.sessions
                .with_session(participant, |session| session.validate())?;
            Ok(validated_prompt(participant, &live.poll))
        }
    }
}
