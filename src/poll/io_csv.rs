// Reading and writing grade sheets in CSV form.
//
// The header holds the choice labels. Every other row holds the grades of one
// participant, as grade labels (`str`) or as 1-based ranks (`int`).

use std::collections::HashSet;
use std::io::{Read, Write};

use csv::Reader;
use log::{debug, info, warn};
use majority_judgment::{tally_ballots, Ballot, ChoiceTally, GradeScale};
use snafu::prelude::*;

use crate::poll::{
    CsvDuplicateColumnSnafu, CsvFlushSnafu, CsvLineParseSnafu, CsvMissingHeaderSnafu,
    CsvOpenSnafu, CsvWriteSnafu, JudgmentSnafu, PollResult, UnknownOptionSnafu,
};

/// How grades are written in the cells.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ValuesType {
    /// Grade labels, as in the scale.
    Str,
    /// 1-based ranks, 1 being the worst grade.
    Int,
}

impl ValuesType {
    pub fn parse(s: &str) -> PollResult<ValuesType> {
        match s {
            "str" => Ok(ValuesType::Str),
            "int" => Ok(ValuesType::Int),
            x => UnknownOptionSnafu {
                option: "valuesType",
                value: x,
            }
            .fail(),
        }
    }

    fn read_cell(&self, cell: &str, scale: &GradeScale) -> Option<usize> {
        match self {
            ValuesType::Str => scale.rank_of(cell).or_else(|| scale.rank_of(cell.trim())),
            ValuesType::Int => cell
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|r| scale.contains_rank(*r)),
        }
    }

    fn write_cell(&self, rank: usize, scale: &GradeScale) -> Option<String> {
        match self {
            ValuesType::Str => scale.label(rank).map(|l| l.to_string()),
            ValuesType::Int if scale.contains_rank(rank) => Some(rank.to_string()),
            ValuesType::Int => None,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct CsvOptions {
    pub values_type: ValuesType,
    /// Drops the first column, typically a participant name or a timestamp.
    pub ignore_first_column: bool,
    /// Drops the rows holding a value outside the scale, instead of only the value.
    pub skip_rows_out_of_scale: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions {
            values_type: ValuesType::Str,
            ignore_first_column: false,
            skip_rows_out_of_scale: false,
        }
    }
}

/// The complete responses of a poll: one row of ranks per participant, in choice order.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct GradeSheet {
    pub choices: Vec<String>,
    pub rows: Vec<Vec<usize>>,
}

impl GradeSheet {
    pub fn tallies(&self, scale: &GradeScale) -> PollResult<Vec<ChoiceTally>> {
        let ballots: Vec<Ballot> = self
            .rows
            .iter()
            .map(|row| Ballot {
                grades: row.clone(),
                count: 1,
            })
            .collect();
        tally_ballots(&self.choices, &ballots, scale).context(JudgmentSnafu {})
    }
}

/// A cell that does not hold a grade of the scale.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct OutOfScaleValue {
    /// The line in the file, the header being line 1.
    pub lineno: usize,
    pub column: String,
    pub value: String,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ParsedGrades {
    pub tallies: Vec<ChoiceTally>,
    /// The number of rows counted.
    pub rows: usize,
    pub skipped_rows: usize,
    pub warnings: Vec<OutOfScaleValue>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ExportSummary {
    pub rows: usize,
    pub warnings: Vec<OutOfScaleValue>,
}

/// Writes the header and one row per participant.
///
/// A rank outside the scale is written as an empty cell and reported.
pub fn write_grades_csv<W: Write>(
    writer: W,
    sheet: &GradeSheet,
    scale: &GradeScale,
    options: &CsvOptions,
) -> PollResult<ExportSummary> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&sheet.choices).context(CsvWriteSnafu {})?;

    let mut rows = 0;
    let mut warnings: Vec<OutOfScaleValue> = Vec::new();
    for (idx, row) in sheet.rows.iter().enumerate() {
        let lineno = idx + 2;
        let mut record: Vec<String> = Vec::with_capacity(row.len());
        let mut row_warnings: Vec<OutOfScaleValue> = Vec::new();
        for (choice, rank) in sheet.choices.iter().zip(row.iter()) {
            match options.values_type.write_cell(*rank, scale) {
                Some(cell) => record.push(cell),
                None => {
                    row_warnings.push(OutOfScaleValue {
                        lineno,
                        column: choice.clone(),
                        value: rank.to_string(),
                    });
                    record.push(String::new());
                }
            }
        }
        let skip = options.skip_rows_out_of_scale && !row_warnings.is_empty();
        warnings.append(&mut row_warnings);
        if skip {
            continue;
        }
        wtr.write_record(&record).context(CsvWriteSnafu {})?;
        rows += 1;
    }
    wtr.flush().context(CsvFlushSnafu {})?;

    for w in warnings.iter() {
        warn!(
            "write_grades_csv: line {} column {:?}: rank {} is outside the scale",
            w.lineno, w.column, w.value
        );
    }
    info!("write_grades_csv: wrote {} rows", rows);
    Ok(ExportSummary { rows, warnings })
}

/// Reads a grade sheet and counts the grades of every column.
///
/// Values outside the scale, blank cells included, are reported and not counted.
pub fn read_grades_csv<R: Read>(
    reader: R,
    scale: &GradeScale,
    options: &CsvOptions,
) -> PollResult<ParsedGrades> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    read_records(rdr, scale, options)
}

pub fn read_grades_csv_path(
    path: &str,
    scale: &GradeScale,
    options: &CsvOptions,
) -> PollResult<ParsedGrades> {
    info!("read_grades_csv_path: reading {:?}", path);
    let rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    read_records(rdr, scale, options)
}

fn read_records<R: Read>(
    mut rdr: Reader<R>,
    scale: &GradeScale,
    options: &CsvOptions,
) -> PollResult<ParsedGrades> {
    let first_col = usize::from(options.ignore_first_column);
    let choices: Vec<String> = rdr
        .headers()
        .context(CsvLineParseSnafu {})?
        .iter()
        .skip(first_col)
        .map(|s| s.trim().to_string())
        .collect();
    ensure!(!choices.is_empty(), CsvMissingHeaderSnafu {});
    let mut seen: HashSet<&str> = HashSet::new();
    for choice in choices.iter() {
        ensure!(
            seen.insert(choice.as_str()),
            CsvDuplicateColumnSnafu {
                column: choice.clone()
            }
        );
    }
    debug!("read_records: choices: {:?}", choices);

    let mut tallies: Vec<ChoiceTally> = choices
        .iter()
        .map(|c| ChoiceTally::empty(c, scale))
        .collect();
    let mut rows = 0;
    let mut skipped_rows = 0;
    let mut warnings: Vec<OutOfScaleValue> = Vec::new();

    for (idx, line_r) in rdr.records().enumerate() {
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu {})?;
        let mut ranks: Vec<Option<usize>> = Vec::with_capacity(choices.len());
        let mut row_warnings: Vec<OutOfScaleValue> = Vec::new();
        for (col, choice) in choices.iter().enumerate() {
            let cell = line.get(col + first_col).unwrap_or("");
            let rank = options.values_type.read_cell(cell, scale);
            if rank.is_none() {
                row_warnings.push(OutOfScaleValue {
                    lineno,
                    column: choice.clone(),
                    value: cell.to_string(),
                });
            }
            ranks.push(rank);
        }
        let skip = options.skip_rows_out_of_scale && !row_warnings.is_empty();
        warnings.append(&mut row_warnings);
        if skip {
            debug!("read_records: line {} skipped", lineno);
            skipped_rows += 1;
            continue;
        }
        for (tally, rank) in tallies.iter_mut().zip(ranks.iter()) {
            if let Some(r) = rank {
                tally.counts[r - 1] += 1;
            }
        }
        rows += 1;
    }

    for w in warnings.iter() {
        warn!(
            "read_records: line {} column {:?}: {:?} is not a grade of {:?}",
            w.lineno,
            w.column,
            w.value,
            scale.labels()
        );
    }
    info!(
        "read_records: {} rows counted, {} skipped, {} values outside the scale",
        rows,
        skipped_rows,
        warnings.len()
    );
    Ok(ParsedGrades {
        tallies,
        rows,
        skipped_rows,
        warnings,
    })
}
