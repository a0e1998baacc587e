pub use crate::config::*;

/// A builder for adding ballots.
///
/// ```
/// pub use majority_judgment::builder::Builder;
/// pub use majority_judgment::{GradeScale, JudgmentRules};
/// # use majority_judgment::JudgmentErrors;
///
/// let scale = GradeScale::new(&["Bad".to_string(), "Fair".to_string(), "Good".to_string()])?;
/// let mut builder = Builder::new(&JudgmentRules::DEFAULT_RULES, &scale)?
///     .choices(&["Pizza".to_string(), "Sushi".to_string()])?;
///
/// builder.add_ballot_simple(&["Good".to_string(), "Fair".to_string()])?;
/// builder.add_ballot_simple(&["Fair".to_string(), "Bad".to_string()])?;
///
/// let result = builder.tabulate()?;
/// assert_eq!(result.winner(), Some("Pizza"));
///
/// # Ok::<(), JudgmentErrors>(())
/// ```
pub struct Builder {
    pub(crate) _rules: JudgmentRules,
    pub(crate) _scale: GradeScale,
    pub(crate) _choices: Vec<String>,
    pub(crate) _ballots: Vec<Ballot>,
}

impl Builder {
    pub fn new(rules: &JudgmentRules, scale: &GradeScale) -> Result<Builder, JudgmentErrors> {
        if scale.is_empty() {
            return Err(JudgmentErrors::EmptyScale);
        }
        Ok(Builder {
            _rules: rules.clone(),
            _scale: scale.clone(),
            _choices: Vec::new(),
            _ballots: Vec::new(),
        })
    }

    /// Sets the choices, in the order used by the ballots. Previous ballots are dropped.
    pub fn choices(self, names: &[String]) -> Result<Builder, JudgmentErrors> {
        if names.is_empty() {
            return Err(JudgmentErrors::NoChoices);
        }
        for (idx, name) in names.iter().enumerate() {
            if names[..idx].contains(name) {
                return Err(JudgmentErrors::DuplicateChoice(name.clone()));
            }
        }
        Ok(Builder {
            _rules: self._rules,
            _scale: self._scale,
            _choices: names.to_vec(),
            _ballots: Vec::new(),
        })
    }

    /// Adds a ballot given as grade labels, one per choice.
    pub fn add_ballot_simple(&mut self, grades: &[String]) -> Result<(), JudgmentErrors> {
        let mut ranks: Vec<usize> = Vec::with_capacity(grades.len());
        for label in grades {
            let rank = self
                ._scale
                .rank_of(label)
                .ok_or_else(|| JudgmentErrors::UnknownGrade(label.clone()))?;
            ranks.push(rank);
        }
        self.add_ballot(&ranks, 1)
    }

    /// Adds a ballot given as 1-based ranks, with a weight attached to it.
    pub fn add_ballot(&mut self, ranks: &[usize], count: u64) -> Result<(), JudgmentErrors> {
        self.add_ballot_2(&Ballot {
            grades: ranks.to_vec(),
            count,
        })
    }

    pub fn add_ballot_2(&mut self, ballot: &Ballot) -> Result<(), JudgmentErrors> {
        if ballot.grades.len() != self._choices.len() {
            return Err(JudgmentErrors::IncompleteBallot {
                expected: self._choices.len(),
                found: ballot.grades.len(),
            });
        }
        if let Some(rank) = ballot
            .grades
            .iter()
            .find(|r| !self._scale.contains_rank(**r))
        {
            return Err(JudgmentErrors::OutOfScale(*rank));
        }
        self._ballots.push(ballot.clone());
        Ok(())
    }

    pub fn tallies(&self) -> Result<Vec<ChoiceTally>, JudgmentErrors> {
        crate::tally_ballots(&self._choices, &self._ballots, &self._scale)
    }

    pub fn tabulate(&self) -> Result<JudgmentResult, JudgmentErrors> {
        crate::run_judgment_stats(&self.tallies()?, &self._scale, &self._rules)
    }
}
