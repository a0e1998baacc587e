// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// The ordered list of grade labels shared by every choice of a poll.
///
/// Labels go from the worst grade to the best one. Internally a grade is a rank
/// between `1` and `len()`, so that a higher rank is always a better grade.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct GradeScale {
    labels: Vec<String>,
}

impl GradeScale {
    pub fn new(labels: &[String]) -> Result<GradeScale, JudgmentErrors> {
        if labels.is_empty() {
            return Err(JudgmentErrors::EmptyScale);
        }
        for (idx, label) in labels.iter().enumerate() {
            if labels[..idx].contains(label) {
                return Err(JudgmentErrors::DuplicateGrade(label.clone()));
            }
        }
        Ok(GradeScale {
            labels: labels.to_vec(),
        })
    }

    /// The five-level Likert scale in English.
    pub fn likert_english() -> GradeScale {
        GradeScale::from_static(&[
            "Strongly disagree",
            "Disagree",
            "Neither agree nor disagree",
            "Agree",
            "Strongly agree",
        ])
    }

    /// The five-level Likert scale in French.
    pub fn likert_french() -> GradeScale {
        GradeScale::from_static(&[
            "Fort désaccord",
            "Désaccord",
            "Ni accord ni désaccord",
            "D'accord",
            "Fortement d'accord",
        ])
    }

    /// Five short informal grades: `Nul`, `Bof`, `Okay`, `Bien`, `Top`.
    pub fn informal() -> GradeScale {
        GradeScale::from_static(&["Nul", "Bof", "Okay", "Bien", "Top"])
    }

    fn from_static(labels: &[&str]) -> GradeScale {
        GradeScale {
            labels: labels.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The label of a 1-based rank.
    pub fn label(&self, rank: usize) -> Option<&str> {
        if rank == 0 {
            return None;
        }
        self.labels.get(rank - 1).map(|s| s.as_str())
    }

    /// The 1-based rank of a label.
    pub fn rank_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label).map(|idx| idx + 1)
    }

    pub fn contains_rank(&self, rank: usize) -> bool {
        rank >= 1 && rank <= self.labels.len()
    }
}

/// One complete set of grades, one rank per choice, in choice order.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Ballot {
    pub grades: Vec<usize>,
    pub count: u64,
}

/// The number of ballots that gave each grade to a choice.
///
/// `counts[r - 1]` is the number of ballots that gave the rank `r`.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ChoiceTally {
    pub name: String,
    pub counts: Vec<u64>,
}

impl ChoiceTally {
    pub fn empty(name: &str, scale: &GradeScale) -> ChoiceTally {
        ChoiceTally {
            name: name.to_string(),
            counts: vec![0; scale.len()],
        }
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

// ******** Output data structures *********

/// The statistics of a choice that received at least one grade.
#[derive(PartialEq, Debug, Clone)]
pub struct GradeStats {
    /// The 1-based rank of the majority grade.
    pub majority_grade: usize,
    pub median: f64,
    pub mean: f64,
    /// The successive majority grades obtained by removing one instance of the
    /// majority grade at a time. Used for breaking ties.
    pub majority_value: Vec<usize>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ChoiceResult {
    pub name: String,
    pub counts: Vec<u64>,
    pub total: u64,
    /// Position in the ranking, starting at 1. Choices with equal standing share a
    /// position. `None` when the choice has no data.
    pub rank: Option<u32>,
    pub stats: Result<GradeStats, JudgmentErrors>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct JudgmentResult {
    pub scale: GradeScale,
    /// All the choices, best first. Choices without data come last, in input order.
    pub results: Vec<ChoiceResult>,
}

impl JudgmentResult {
    /// The name of the best ranked choice, if any choice could be ranked.
    pub fn winner(&self) -> Option<&str> {
        self.results
            .iter()
            .find(|r| r.rank == Some(1))
            .map(|r| r.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&ChoiceResult> {
        self.results.iter().find(|r| r.name == name)
    }
}

/// Errors that prevent the algorithm from completing successfully.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum JudgmentErrors {
    EmptyScale,
    DuplicateGrade(String),
    NoChoices,
    DuplicateChoice(String),
    ScaleMismatch {
        choice: String,
        expected: usize,
        found: usize,
    },
    /// No ballot graded this choice, the majority grade is undefined.
    InsufficientData,
    UnknownGrade(String),
    OutOfScale(usize),
    IncompleteBallot {
        expected: usize,
        found: usize,
    },
}

impl Error for JudgmentErrors {}

impl Display for JudgmentErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JudgmentErrors::EmptyScale => write!(f, "the grade scale is empty"),
            JudgmentErrors::DuplicateGrade(g) => write!(f, "grade {:?} appears twice", g),
            JudgmentErrors::NoChoices => write!(f, "no choice to judge"),
            JudgmentErrors::DuplicateChoice(c) => write!(f, "choice {:?} appears twice", c),
            JudgmentErrors::ScaleMismatch {
                choice,
                expected,
                found,
            } => write!(
                f,
                "choice {:?} has {} grade counts, expected {}",
                choice, found, expected
            ),
            JudgmentErrors::InsufficientData => write!(f, "no grade recorded"),
            JudgmentErrors::UnknownGrade(g) => write!(f, "unknown grade {:?}", g),
            JudgmentErrors::OutOfScale(r) => write!(f, "rank {} is outside the grade scale", r),
            JudgmentErrors::IncompleteBallot { expected, found } => write!(
                f,
                "ballot has {} grades, expected one per choice ({})",
                found, expected
            ),
        }
    }
}

// ********* Configuration **********

/// How to order two choices that have the same majority grade.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum TieBreakMode {
    /// Compare the majority values: remove one instance of the common majority grade
    /// from both choices and compare again, until they differ.
    MajorityJudgment,
    /// Keep the order in which the choices were given.
    UseChoiceOrder,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct JudgmentRules {
    pub tiebreak_mode: TieBreakMode,
}

impl JudgmentRules {
    pub const DEFAULT_RULES: JudgmentRules = JudgmentRules {
        tiebreak_mode: TieBreakMode::MajorityJudgment,
    };
}

impl Default for JudgmentRules {
    fn default() -> Self {
        JudgmentRules::DEFAULT_RULES
    }
}
