//! The entry point of a transport.
//!
//! A [`SessionStore`] is shared by all the tasks of a transport. Moderator commands
//! (open, close, export, report) and participant clicks can arrive at the same time.
//!
//! ```
//! use mj_poll::poll::{ActionKind, ActionToken, CallbackEvent, SessionStore, StoreSettings};
//!
//! let store = SessionStore::new(StoreSettings::default());
//! let opened = store.open_with_choice_list("Lunch?", "Pizza; Sushi").unwrap();
//! let join = opened.announcement.controls[0].action_token.clone();
//! let reply = store.handle(&CallbackEvent::new(&join, &"ann".into()));
//! let prompt = reply.prompt().unwrap();
//! assert_eq!(prompt.next_choice.as_deref(), Some("Pizza"));
//!
//! let top = prompt.control("Top").unwrap().action_token.parse::<ActionToken>().unwrap();
//! assert_eq!(top.kind, ActionKind::Grade { choice: 0, rank: 5 });
//! ```

use std::io::Write;
use std::sync::Arc;

use log::{debug, info, warn};
use majority_judgment::{run_judgment_stats, ChoiceTally, JudgmentResult};
use serde_json::Value as JSValue;
use snafu::prelude::*;

use crate::poll::config_reader::StoreSettings;
use crate::poll::io_csv::{write_grades_csv, CsvOptions, ExportSummary, GradeSheet, ValuesType};
use crate::poll::prompt::{announcement_prompt, current_prompt, Prompt};
use crate::poll::registry::{split_choices, LivePoll, Poll, PollRegistry, PollToken};
use crate::poll::router::{dispatch, CallbackEvent, Dispatch};
use crate::poll::session::ParticipantSession;
use crate::poll::summary::build_summary_js;
use crate::poll::{JudgmentSnafu, NotOpenSnafu, ParticipantId, PollResult, UnknownPollSnafu};

/// The sessions that count in a report.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ResponseFilter {
    /// Every session with a grade for every choice.
    Complete,
    /// Only the sessions whose grades were validated.
    ValidatedOnly,
}

impl ResponseFilter {
    pub fn accepts(&self, session: &ParticipantSession) -> bool {
        match self {
            ResponseFilter::Complete => session.is_complete(),
            ResponseFilter::ValidatedOnly => session.is_validated(),
        }
    }
}

/// A freshly opened poll and the message announcing it.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Opened {
    pub token: PollToken,
    pub announcement: Prompt,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    settings: StoreSettings,
    registry: PollRegistry,
}

impl SessionStore {
    pub fn new(settings: StoreSettings) -> Self {
        SessionStore {
            settings,
            registry: PollRegistry::new(),
        }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn open(&self, question: &str, choices: &[String]) -> PollResult<Opened> {
        let poll = self
            .registry
            .open(question, choices, &self.settings.scale)?;
        Ok(Opened {
            token: poll.token,
            announcement: announcement_prompt(&poll),
        })
    }

    /// Opens a poll from choices typed as one `;`-separated string.
    pub fn open_with_choice_list(&self, question: &str, choices: &str) -> PollResult<Opened> {
        self.open(question, &split_choices(choices))
    }

    pub fn close(&self) -> PollResult<(String, usize)> {
        self.registry.close()
    }

    pub fn status(&self) -> Option<Poll> {
        self.registry.status()
    }

    /// Applies one participant event. Never fails: dropped events are logged.
    pub fn handle(&self, event: &CallbackEvent) -> Dispatch {
        dispatch(&self.registry, event)
    }

    /// The prompt a participant currently sees, if they joined the open poll.
    pub fn prompt_for(&self, participant: &ParticipantId) -> Option<Prompt> {
        let live = self.registry.live()?;
        live.sessions.get(participant).map(|s| current_prompt(&s))
    }

    /// Deletes the session of a participant, who may join again later.
    ///
    /// Returns `false` when nothing was deleted: no session, or validated grades.
    pub fn reset(&self, participant: &ParticipantId) -> bool {
        let live = match self.registry.live() {
            Some(live) => live,
            None => return false,
        };
        match live.sessions.reset(participant) {
            Ok(removed) => removed,
            Err(e) => {
                warn!("reset: {}: {}", participant, e);
                false
            }
        }
    }

    pub fn session(&self, participant: &ParticipantId) -> Option<ParticipantSession> {
        self.registry.live()?.sessions.get(participant)
    }

    fn live(&self) -> PollResult<Arc<LivePoll>> {
        self.registry.live().context(NotOpenSnafu {})
    }

    fn sheet_of(
        live: &LivePoll,
        accepts: impl Fn(&ParticipantSession) -> bool,
    ) -> GradeSheet {
        let rows: Vec<Vec<usize>> = live
            .sessions
            .snapshot()
            .iter()
            .filter(|s| accepts(*s))
            .filter_map(|s| s.ballot())
            .collect();
        GradeSheet {
            choices: live.poll.choices.clone(),
            rows,
        }
    }

    /// The grades of every participant who graded all the choices, in join order.
    pub fn grade_sheet(&self) -> PollResult<GradeSheet> {
        let live = self.live()?;
        Ok(SessionStore::sheet_of(&live, |s| s.is_complete()))
    }

    /// Writes the grades of the open poll as CSV.
    pub fn export_csv<W: Write>(
        &self,
        writer: W,
        values_type: ValuesType,
    ) -> PollResult<ExportSummary> {
        let sheet = self.grade_sheet()?;
        info!(
            "export_csv: {} complete responses for {} choices",
            sheet.rows.len(),
            sheet.choices.len()
        );
        let options = CsvOptions {
            values_type,
            ..CsvOptions::default()
        };
        write_grades_csv(writer, &sheet, &self.settings.scale, &options)
    }

    fn live_for(&self, token: &PollToken) -> PollResult<Arc<LivePoll>> {
        let live = self.live()?;
        ensure!(
            live.poll.token == *token,
            UnknownPollSnafu {
                token: token.to_string()
            }
        );
        Ok(live)
    }

    /// The grade counts of the responses that count in reports.
    pub fn tallies(&self, token: &PollToken) -> PollResult<Vec<ChoiceTally>> {
        let live = self.live_for(token)?;
        let filter = self.settings.responses;
        let sheet = SessionStore::sheet_of(&live, |s| filter.accepts(s));
        debug!(
            "tallies: {} responses accepted by {:?}",
            sheet.rows.len(),
            filter
        );
        sheet.tallies(&live.poll.grades)
    }

    /// Runs majority judgment on the responses of the open poll.
    pub fn report(&self, token: &PollToken) -> PollResult<JudgmentResult> {
        let live = self.live_for(token)?;
        let tallies = self.tallies(token)?;
        run_judgment_stats(&tallies, &live.poll.grades, &self.settings.rules)
            .context(JudgmentSnafu {})
    }

    /// The report in the JSON form of the command line.
    pub fn report_js(&self, token: &PollToken) -> PollResult<JSValue> {
        let result = self.report(token)?;
        let question = self.live_for(token)?.poll.question.clone();
        Ok(build_summary_js(&question, &result, &[]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::io_csv::read_grades_csv;
    use crate::poll::router::{ActionKind, ActionToken};
    use crate::poll::{ActionError, PollError, Rejection, SessionState};
    use majority_judgment::GradeScale;
    use std::thread;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn store(responses: ResponseFilter) -> SessionStore {
        SessionStore::new(StoreSettings {
            scale: GradeScale::new(&["Bad", "Fair", "Good"].map(|s| s.to_string())).unwrap(),
            responses,
            ..StoreSettings::default()
        })
    }

    fn click(store: &SessionStore, who: &str, token: PollToken, kind: ActionKind) -> Dispatch {
        let token = ActionToken::new(token, kind).encode();
        store.handle(&CallbackEvent::new(&token, &who.into()))
    }

    fn grade(choice: usize, rank: usize) -> ActionKind {
        ActionKind::Grade { choice, rank }
    }

    /// Joins and grades every choice.
    fn vote(store: &SessionStore, who: &str, token: PollToken, ranks: &[usize]) {
        click(store, who, token, ActionKind::Join);
        for (choice, rank) in ranks.iter().enumerate() {
            assert!(!click(store, who, token, grade(choice, *rank)).is_ignored());
        }
    }

    fn counts(tallies: &[ChoiceTally]) -> Vec<Vec<u64>> {
        tallies.iter().map(|t| t.counts.clone()).collect()
    }

    #[test]
    fn open_announces_the_poll() {
        init();
        let store = SessionStore::default();
        let opened = store.open_with_choice_list("Lunch?", "Pizza; Sushi ;").unwrap();
        assert_eq!(opened.announcement.controls.len(), 2);
        assert_eq!(store.status().unwrap().choices, vec!["Pizza", "Sushi"]);
        assert!(matches!(
            store.open_with_choice_list("Dinner?", "Soup"),
            Err(PollError::AlreadyOpen { .. })
        ));
        assert!(matches!(
            store.open_with_choice_list("Dinner?", " ; "),
            Err(PollError::AlreadyOpen { .. })
        ));
        store.close().unwrap();
        assert!(matches!(
            store.open_with_choice_list("Dinner?", " ; "),
            Err(PollError::EmptyChoices {})
        ));
    }

    #[test]
    fn report_on_complete_responses() {
        init();
        let store = store(ResponseFilter::Complete);
        let token = store
            .open("Lunch?", &["Pizza", "Sushi"].map(|s| s.to_string()))
            .unwrap()
            .token;
        vote(&store, "ann", token, &[3, 1]);
        vote(&store, "bob", token, &[2, 2]);
        vote(&store, "eve", token, &[3, 1]);
        // Only half way through.
        click(&store, "joe", token, ActionKind::Join);
        click(&store, "joe", token, grade(0, 1));

        let result = store.report(&token).unwrap();
        assert_eq!(result.winner(), Some("Pizza"));
        assert_eq!(result.get("Pizza").unwrap().counts, vec![0, 1, 2]);
        assert_eq!(result.get("Sushi").unwrap().counts, vec![2, 1, 0]);

        let js = store.report_js(&token).unwrap();
        assert_eq!(js["config"]["title"], serde_json::json!("Lunch?"));

        store.close().unwrap();
        assert!(matches!(store.report(&token), Err(PollError::NotOpen {})));
        let other = store.open("Again?", &["A".to_string()]).unwrap().token;
        assert!(matches!(
            store.report(&token),
            Err(PollError::UnknownPoll { .. })
        ));
        // No response yet: the choice is reported without a rank.
        let result = store.report(&other).unwrap();
        assert_eq!(result.results[0].rank, None);
    }

    #[test]
    fn validated_only_reports() {
        init();
        let store = store(ResponseFilter::ValidatedOnly);
        let token = store
            .open("Lunch?", &["Pizza", "Sushi"].map(|s| s.to_string()))
            .unwrap()
            .token;
        vote(&store, "ann", token, &[3, 1]);
        vote(&store, "bob", token, &[1, 3]);
        assert!(!click(&store, "bob", token, ActionKind::Validate).is_ignored());
        let tallies = store.tallies(&token).unwrap();
        assert_eq!(counts(&tallies), vec![vec![1, 0, 0], vec![0, 0, 1]]);
        // The export holds every complete response.
        assert_eq!(store.grade_sheet().unwrap().rows.len(), 2);
    }

    #[test]
    fn start_over_then_validate_is_dropped() {
        init();
        let store = store(ResponseFilter::Complete);
        let token = store
            .open("Lunch?", &["Pizza", "Sushi"].map(|s| s.to_string()))
            .unwrap()
            .token;
        vote(&store, "ann", token, &[3, 1]);
        let reply = click(&store, "ann", token, ActionKind::Reset);
        assert_eq!(reply.prompt().unwrap().next_choice.as_deref(), Some("Pizza"));
        assert_eq!(
            click(&store, "ann", token, ActionKind::Validate),
            Dispatch::Ignored(ActionError::InvalidTransition {
                reason: Rejection::Incomplete
            })
        );
        let session = store.session(&"ann".into()).unwrap();
        assert_eq!(session.state(), SessionState::Grading(0));
        assert_eq!(session.ballot(), None);
        // Starting over twice is harmless.
        assert!(!click(&store, "ann", token, ActionKind::Reset).is_ignored());
        assert!(store.grade_sheet().unwrap().rows.is_empty());
    }

    #[test]
    fn reset_deletes_the_session() {
        init();
        let store = store(ResponseFilter::Complete);
        let ann: ParticipantId = "ann".into();
        assert!(!store.reset(&ann));
        let token = store
            .open("Lunch?", &["Pizza".to_string()])
            .unwrap()
            .token;
        assert!(!store.reset(&ann));
        assert!(!store.reset(&ann));
        vote(&store, "ann", token, &[2]);
        assert!(store.reset(&ann));
        assert!(store.session(&ann).is_none());
        // Validated grades stay.
        vote(&store, "ann", token, &[2]);
        click(&store, "ann", token, ActionKind::Validate);
        assert!(!store.reset(&ann));
        assert!(store.session(&ann).unwrap().is_validated());
    }

    #[test]
    fn prompt_re_render_does_not_change_state() {
        init();
        let store = store(ResponseFilter::Complete);
        let token = store
            .open("Lunch?", &["Pizza", "Sushi"].map(|s| s.to_string()))
            .unwrap()
            .token;
        let ann: ParticipantId = "ann".into();
        assert_eq!(store.prompt_for(&ann), None);
        click(&store, "ann", token, ActionKind::Join);
        click(&store, "ann", token, grade(0, 2));
        let first = store.prompt_for(&ann).unwrap();
        let second = store.prompt_for(&ann).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.next_choice.as_deref(), Some("Sushi"));
        let rejoin = click(&store, "ann", token, ActionKind::Join);
        assert_eq!(rejoin.prompt(), Some(&first));
    }

    #[test]
    fn export_then_aggregate() {
        init();
        let store = store(ResponseFilter::Complete);
        let token = store
            .open("Lunch?", &["Pizza", "Sushi", "Salad"].map(|s| s.to_string()))
            .unwrap()
            .token;
        vote(&store, "ann", token, &[3, 1, 2]);
        vote(&store, "bob", token, &[2, 2, 2]);
        vote(&store, "eve", token, &[1, 3, 3]);
        click(&store, "joe", token, ActionKind::Join);

        for values_type in [ValuesType::Str, ValuesType::Int] {
            let mut out: Vec<u8> = Vec::new();
            let summary = store.export_csv(&mut out, values_type).unwrap();
            assert_eq!(summary.rows, 3);
            assert!(summary.warnings.is_empty());
            let options = CsvOptions {
                values_type,
                ..CsvOptions::default()
            };
            let parsed = read_grades_csv(out.as_slice(), &store.settings().scale, &options).unwrap();
            assert_eq!(
                counts(&parsed.tallies),
                counts(&store.tallies(&token).unwrap())
            );
        }
    }

    #[test]
    fn concurrent_participants() {
        init();
        let store = store(ResponseFilter::Complete);
        let choices: Vec<String> = (0..4).map(|i| format!("Choice {}", i)).collect();
        let token = store.open("Many?", &choices).unwrap().token;
        thread::scope(|scope| {
            for p in 0..16 {
                let store = &store;
                scope.spawn(move || {
                    let who = format!("p{}", p);
                    let ranks: Vec<usize> = (0..4).map(|c| (p + c) % 3 + 1).collect();
                    vote(store, &who, token, &ranks);
                    click(store, &who, token, ActionKind::Validate);
                });
            }
        });
        let tallies = store.tallies(&token).unwrap();
        for tally in tallies.iter() {
            assert_eq!(tally.total(), 16);
        }
        assert_eq!(store.grade_sheet().unwrap().rows.len(), 16);
    }

    #[test]
    fn concurrent_events_of_one_participant() {
        init();
        let store = store(ResponseFilter::Complete);
        let choices: Vec<String> = (0..5).map(|i| format!("Choice {}", i)).collect();
        let token = store.open("Same?", &choices).unwrap().token;
        click(&store, "ann", token, ActionKind::Join);
        thread::scope(|scope| {
            for t in 0..8 {
                let store = &store;
                scope.spawn(move || {
                    for choice in 0..5 {
                        click(store, "ann", token, grade(choice, t % 3 + 1));
                    }
                });
            }
        });
        let session = store.session(&"ann".into()).unwrap();
        let ballot = session.ballot().unwrap();
        assert_eq!(ballot.len(), 5);
        assert!(ballot.iter().all(|r| (1..=3).contains(r)));
        assert_eq!(store.tallies(&token).unwrap()[0].total(), 1);
    }

    #[test]
    fn close_drops_sessions_and_stale_events() {
        init();
        let store = store(ResponseFilter::Complete);
        let token = store
            .open("Lunch?", &["Pizza".to_string()])
            .unwrap()
            .token;
        vote(&store, "ann", token, &[3]);
        assert_eq!(store.close().unwrap(), ("Lunch?".to_string(), 1));
        assert_eq!(
            click(&store, "ann", token, ActionKind::Validate),
            Dispatch::Ignored(ActionError::StaleAction {})
        );
        assert!(store.session(&"ann".into()).is_none());
        assert!(matches!(store.grade_sheet(), Err(PollError::NotOpen {})));
        assert!(matches!(store.close(), Err(PollError::NotOpen {})));
    }
}
