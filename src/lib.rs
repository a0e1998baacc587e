//! Majority judgment polls run through button prompts.
//!
//! The [`poll`] module holds everything a chat transport needs to run one poll at a
//! time: the registry of the open poll, the participant sessions, the routing of
//! button clicks and the CSV export. The majority judgment itself is computed by the
//! `majority_judgment` crate.

pub mod poll;
