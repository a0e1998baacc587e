mod config;
use log::{debug, info};

use std::{
    cmp::Ordering,
    collections::HashSet,
    ops::{Add, AddAssign},
};

pub use crate::config::*;

pub mod builder;
pub mod manual;

// **** Private structures ****

#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
struct GradeCount(u64);

impl GradeCount {
    const EMPTY: GradeCount = GradeCount(0);
}

impl std::iter::Sum for GradeCount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        GradeCount(iter.map(|gc| gc.0).sum())
    }
}

impl AddAssign for GradeCount {
    fn add_assign(&mut self, rhs: GradeCount) {
        self.0 += rhs.0;
    }
}

impl Add for GradeCount {
    type Output = GradeCount;
    fn add(self: GradeCount, rhs: GradeCount) -> GradeCount {
        GradeCount(self.0 + rhs.0)
    }
}

// cumulative[r - 1] is the number of ballots that gave a rank lower or equal to r.
fn cumulative_counts(counts: &[u64]) -> Vec<GradeCount> {
    let mut res: Vec<GradeCount> = Vec::with_capacity(counts.len());
    let mut acc = GradeCount::EMPTY;
    for c in counts.iter() {
        acc += GradeCount(*c);
        res.push(acc);
    }
    res
}

/// The majority grade of a choice, as a 1-based rank.
///
/// It is the lowest rank whose cumulative count reaches half of the ballots. Returns
/// `None` when no ballot graded the choice.
///
/// ```
/// // N = 8, cumulative counts [1, 4, 6, 7, 8]: 4 is the first to reach 8 / 2
/// assert_eq!(majority_judgment::majority_grade(&[1, 3, 2, 1, 1]), Some(2));
/// assert_eq!(majority_judgment::majority_grade(&[0, 0, 0]), None);
/// ```
pub fn majority_grade(counts: &[u64]) -> Option<usize> {
    let cumulative = cumulative_counts(counts);
    let total = *cumulative.last()?;
    if total == GradeCount::EMPTY {
        return None;
    }
    cumulative
        .iter()
        .position(|c| c.0 * 2 >= total.0)
        .map(|idx| idx + 1)
}

/// The statistical median of all the ranks given to a choice.
pub fn median_value(counts: &[u64]) -> Option<f64> {
    let cumulative = cumulative_counts(counts);
    let total = cumulative.last()?.0;
    if total == 0 {
        return None;
    }
    // The rank found at a 0-based position of the sorted list of all the ranks.
    let rank_at = |pos: u64| -> usize {
        cumulative
            .iter()
            .position(|c| c.0 > pos)
            .map(|idx| idx + 1)
            .unwrap_or(counts.len())
    };
    let low = rank_at((total - 1) / 2);
    let high = rank_at(total / 2);
    Some((low + high) as f64 / 2.0)
}

pub fn mean_value(counts: &[u64]) -> Option<f64> {
    let total: GradeCount = counts.iter().map(|c| GradeCount(*c)).sum();
    if total == GradeCount::EMPTY {
        return None;
    }
    let weighted: u64 = counts
        .iter()
        .enumerate()
        .map(|(idx, c)| (idx as u64 + 1) * c)
        .sum();
    Some(weighted as f64 / total.0 as f64)
}

/// The sequence of majority grades obtained by removing one instance of the current
/// majority grade at a time, until no ballot is left.
///
/// Comparing these sequences step by step is the tie-break of majority judgment.
pub fn majority_value(counts: &[u64]) -> Vec<usize> {
    let mut remaining = counts.to_vec();
    let mut res: Vec<usize> = Vec::new();
    while let Some(grade) = majority_grade(&remaining) {
        res.push(grade);
        remaining[grade - 1] -= 1;
    }
    res
}

fn choice_stats(counts: &[u64]) -> Result<GradeStats, JudgmentErrors> {
    let majority_grade = majority_grade(counts).ok_or(JudgmentErrors::InsufficientData)?;
    let median = median_value(counts).ok_or(JudgmentErrors::InsufficientData)?;
    let mean = mean_value(counts).ok_or(JudgmentErrors::InsufficientData)?;
    Ok(GradeStats {
        majority_grade,
        median,
        mean,
        majority_value: majority_value(counts),
    })
}

// Greater means that the first choice stands above the second one. Majority values are
// compared over their first `steps` grades only.
fn compare_standing(
    a: &GradeStats,
    b: &GradeStats,
    tiebreak: TieBreakMode,
    steps: usize,
) -> Ordering {
    let by_grade = a.majority_grade.cmp(&b.majority_grade);
    match tiebreak {
        TieBreakMode::UseChoiceOrder => by_grade,
        TieBreakMode::MajorityJudgment => by_grade.then_with(|| {
            let a_steps = &a.majority_value[..steps.min(a.majority_value.len())];
            let b_steps = &b.majority_value[..steps.min(b.majority_value.len())];
            a_steps.cmp(b_steps)
        }),
    }
}

/// Counts the grades of complete ballots, choice by choice.
///
/// Every ballot must hold exactly one rank per choice, in the order of `choices`.
pub fn tally_ballots(
    choices: &[String],
    ballots: &[Ballot],
    scale: &GradeScale,
) -> Result<Vec<ChoiceTally>, JudgmentErrors> {
    let mut tallies: Vec<ChoiceTally> = choices
        .iter()
        .map(|name| ChoiceTally::empty(name, scale))
        .collect();
    for ballot in ballots.iter() {
        if ballot.grades.len() != choices.len() {
            return Err(JudgmentErrors::IncompleteBallot {
                expected: choices.len(),
                found: ballot.grades.len(),
            });
        }
        for (tally, rank) in tallies.iter_mut().zip(ballot.grades.iter()) {
            if !scale.contains_rank(*rank) {
                return Err(JudgmentErrors::OutOfScale(*rank));
            }
            tally.counts[rank - 1] += ballot.count;
        }
    }
    debug!("tally_ballots: {} ballots: {:?}", ballots.len(), tallies);
    Ok(tallies)
}

/// Runs majority judgment on the given tallies.
///
/// Arguments:
/// * `tallies` the grade counts of every choice, in the order of the poll
/// * `scale` the grade scale shared by all the choices
/// * `rules` the rules that govern the ranking
///
/// A choice without any grade does not stop the computation: its result carries
/// [`JudgmentErrors::InsufficientData`] and it is listed after the ranked choices.
pub fn run_judgment_stats(
    tallies: &[ChoiceTally],
    scale: &GradeScale,
    rules: &JudgmentRules,
) -> Result<JudgmentResult, JudgmentErrors> {
    info!(
        "run_judgment_stats: processing {} choices on a scale of {} grades, rules: {:?}",
        tallies.len(),
        scale.len(),
        rules
    );
    checks(tallies, scale)?;

    let mut ranked: Vec<(&ChoiceTally, GradeStats)> = Vec::new();
    let mut unranked: Vec<ChoiceResult> = Vec::new();
    for tally in tallies.iter() {
        match choice_stats(&tally.counts) {
            Ok(stats) => {
                debug!(
                    "run_judgment_stats: {}: majority grade {} median {} mean {}",
                    tally.name, stats.majority_grade, stats.median, stats.mean
                );
                ranked.push((tally, stats));
            }
            Err(e) => {
                info!("run_judgment_stats: {}: {}", tally.name, e);
                unranked.push(ChoiceResult {
                    name: tally.name.clone(),
                    counts: tally.counts.clone(),
                    total: tally.total(),
                    rank: None,
                    stats: Err(e),
                });
            }
        }
    }

    // Choices graded by fewer participants have shorter majority values.
    let steps = ranked
        .iter()
        .map(|(_, stats)| stats.majority_value.len())
        .min()
        .unwrap_or(0);
    debug!("run_judgment_stats: tie-break over {} steps", steps);

    // The sort is stable: equal standings keep the input order.
    ranked.sort_by(|(_, a), (_, b)| compare_standing(b, a, rules.tiebreak_mode, steps));

    let mut results: Vec<ChoiceResult> = Vec::with_capacity(tallies.len());
    let mut previous: Option<(u32, GradeStats)> = None;
    for (idx, (tally, stats)) in ranked.into_iter().enumerate() {
        let rank = match &previous {
            Some((prev_rank, prev_stats))
                if compare_standing(prev_stats, &stats, rules.tiebreak_mode, steps)
                    == Ordering::Equal =>
            {
                *prev_rank
            }
            _ => idx as u32 + 1,
        };
        info!(
            "run_judgment_stats: #{} {} ({})",
            rank,
            tally.name,
            scale.label(stats.majority_grade).unwrap_or("?")
        );
        previous = Some((rank, stats.clone()));
        results.push(ChoiceResult {
            name: tally.name.clone(),
            counts: tally.counts.clone(),
            total: tally.total(),
            rank: Some(rank),
            stats: Ok(stats),
        });
    }
    results.extend(unranked);

    Ok(JudgmentResult {
        scale: scale.clone(),
        results,
    })
}

fn checks(tallies: &[ChoiceTally], scale: &GradeScale) -> Result<(), JudgmentErrors> {
    if scale.is_empty() {
        return Err(JudgmentErrors::EmptyScale);
    }
    if tallies.is_empty() {
        return Err(JudgmentErrors::NoChoices);
    }
    let mut seen: HashSet<&str> = HashSet::new();
    for tally in tallies.iter() {
        if !seen.insert(tally.name.as_str()) {
            return Err(JudgmentErrors::DuplicateChoice(tally.name.clone()));
        }
        if tally.counts.len() != scale.len() {
            return Err(JudgmentErrors::ScaleMismatch {
                choice: tally.name.clone(),
                expected: scale.len(),
                found: tally.counts.len(),
            });
        }
    }
    Ok(())
}
