//! Outbound prompts, rendered by the transport as a message with buttons.

use serde::Serialize;

use crate::poll::registry::Poll;
use crate::poll::router::{ActionKind, ActionToken};
use crate::poll::session::{ParticipantSession, SessionState};
use crate::poll::ParticipantId;

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct Control {
    pub label: String,
    #[serde(rename = "actionToken")]
    pub action_token: String,
}

impl Control {
    fn new(label: &str, poll: &Poll, kind: ActionKind) -> Control {
        Control {
            label: label.to_string(),
            action_token: ActionToken::new(poll.token, kind).encode(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct Prompt {
    pub text: String,
    /// The choice the participant is asked to grade, if any.
    #[serde(rename = "nextChoice")]
    pub next_choice: Option<String>,
    pub controls: Vec<Control>,
    /// Only shown to the acting participant.
    pub ephemeral: bool,
}

impl Prompt {
    pub fn control(&self, label: &str) -> Option<&Control> {
        self.controls.iter().find(|c| c.label == label)
    }
}

const START_OVER: &str = "Start over";
const VALIDATE: &str = "Validate";

/// The public message announcing a new poll.
pub fn announcement_prompt(poll: &Poll) -> Prompt {
    Prompt {
        text: format!(
            "A new majority judgment is open: **{}**\nClick the button below to take part!",
            poll.question
        ),
        next_choice: None,
        controls: vec![
            Control::new(&poll.question, poll, ActionKind::Join),
            Control::new(START_OVER, poll, ActionKind::Reset),
        ],
        ephemeral: false,
    }
}

/// The prompt matching the state of a session. Rendering it changes nothing.
pub fn current_prompt(session: &ParticipantSession) -> Prompt {
    let poll = session.poll();
    match session.state() {
        SessionState::Grading(idx) => grading_prompt(poll, idx),
        SessionState::AllGraded => completion_prompt(session),
        SessionState::Validated => Prompt {
            text: format!("Your grades for **{}** are validated.", poll.question),
            next_choice: None,
            controls: Vec::new(),
            ephemeral: true,
        },
    }
}

fn grading_prompt(poll: &Poll, choice_idx: usize) -> Prompt {
    let choice = &poll.choices[choice_idx];
    let controls = poll
        .grades
        .labels()
        .iter()
        .enumerate()
        .map(|(idx, label)| {
            Control::new(
                label,
                poll,
                ActionKind::Grade {
                    choice: choice_idx,
                    rank: idx + 1,
                },
            )
        })
        .collect();
    Prompt {
        text: format!("What do you think of **{}**?", choice),
        next_choice: Some(choice.clone()),
        controls,
        ephemeral: true,
    }
}

fn completion_prompt(session: &ParticipantSession) -> Prompt {
    let poll = session.poll();
    let summary: Vec<String> = session
        .grade_labels()
        .into_iter()
        .map(|(choice, grade)| format!("{}: {}", choice, grade.unwrap_or_default()))
        .collect();
    Prompt {
        text: format!(
            "You have graded every choice, thank you for taking part!\n\nYour grades:\n{}\n\nDo you want to validate your grades or start over?",
            summary.join("\n")
        ),
        next_choice: None,
        controls: vec![
            Control::new(VALIDATE, poll, ActionKind::Validate),
            Control::new(START_OVER, poll, ActionKind::Reset),
        ],
        ephemeral: true,
    }
}

/// The public message sent when a participant validates.
pub fn validated_prompt(participant: &ParticipantId, poll: &Poll) -> Prompt {
    Prompt {
        text: format!(
            "{} validated their grades for **{}**.",
            participant, poll.question
        ),
        next_choice: None,
        controls: Vec::new(),
        ephemeral: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::registry::PollToken;
    use majority_judgment::GradeScale;
    use std::sync::Arc;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    fn poll() -> Arc<Poll> {
        Arc::new(Poll {
            token: PollToken::generate(),
            question: "Lunch?".to_string(),
            choices: s(&["Pizza", "Sushi"]),
            grades: GradeScale::new(&s(&["Bad", "Fair", "Good"])).unwrap(),
        })
    }

    #[test]
    fn grading_prompt_has_one_control_per_grade() {
        let poll = poll();
        let session = ParticipantSession::join(&"ann".into(), poll.clone());
        let prompt = current_prompt(&session);
        assert_eq!(prompt.next_choice.as_deref(), Some("Pizza"));
        let labels: Vec<&str> = prompt.controls.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Bad", "Fair", "Good"]);
        let token = ActionToken::decode(&prompt.control("Good").unwrap().action_token).unwrap();
        assert_eq!(token.poll, poll.token);
        assert_eq!(token.kind, ActionKind::Grade { choice: 0, rank: 3 });
        assert!(prompt.ephemeral);
    }

    #[test]
    fn completion_prompt_summarises_grades() {
        let mut session = ParticipantSession::join(&"ann".into(), poll());
        session.grade("Pizza", "Good").unwrap();
        session.grade("Sushi", "Bad").unwrap();
        let prompt = current_prompt(&session);
        assert_eq!(prompt.next_choice, None);
        assert!(prompt.text.contains("Pizza: Good\nSushi: Bad"));
        assert!(prompt.control(VALIDATE).is_some());
        assert!(prompt.control(START_OVER).is_some());
    }

    #[test]
    fn announcement_is_public() {
        let poll = poll();
        let prompt = announcement_prompt(&poll);
        assert!(!prompt.ephemeral);
        let join = prompt.control("Lunch?").unwrap();
        assert_eq!(
            ActionToken::decode(&join.action_token).unwrap().kind,
            ActionKind::Join
        );
    }
}
