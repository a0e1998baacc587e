use std::fs;
use std::path::Path;

use log::{debug, info};
use majority_judgment::{GradeScale, JudgmentRules, TieBreakMode};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::poll::io_csv::{CsvOptions, ValuesType};
use crate::poll::store::ResponseFilter;
use crate::poll::{
    JudgmentSnafu, MissingInputSnafu, OpeningJsonSnafu, ParsingJsonSnafu, PollResult,
    UnknownOptionSnafu,
};

/// The JSON configuration file. Every key is optional.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct MjConfig {
    pub title: Option<String>,
    /// The grade labels, worst first.
    pub grades: Option<Vec<String>>,
    /// Selects a built-in scale when no grade is given.
    pub lang: Option<String>,
    #[serde(rename = "valuesType")]
    pub values_type: Option<String>,
    #[serde(rename = "ignoreFirstColumn")]
    pub ignore_first_column: Option<bool>,
    #[serde(rename = "skipRowsOutOfScale")]
    pub skip_rows_out_of_scale: Option<bool>,
    #[serde(rename = "tiebreakMode")]
    pub tiebreak_mode: Option<String>,
    pub responses: Option<String>,
    #[serde(rename = "csvPath")]
    pub csv_path: Option<String>,
    #[serde(rename = "outputPath")]
    pub output_path: Option<String>,
}

/// Reads a configuration file. A relative `csvPath` is relative to the file.
pub fn read_config(path: &str) -> PollResult<MjConfig> {
    let config_str = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let mut config: MjConfig = serde_json::from_str(&config_str).context(ParsingJsonSnafu {})?;
    if let (Some(csv_path), Some(root_p)) = (config.csv_path.clone(), Path::new(path).parent()) {
        if Path::new(&csv_path).is_relative() {
            config.csv_path = Some(root_p.join(&csv_path).display().to_string());
        }
    }
    info!("read_config: {:?}", config);
    Ok(config)
}

pub fn validate_scale(grades: &Option<Vec<String>>, lang: &Option<String>) -> PollResult<GradeScale> {
    if let Some(labels) = grades {
        return GradeScale::new(labels).context(JudgmentSnafu {});
    }
    match lang.as_deref() {
        None | Some("en") => Ok(GradeScale::likert_english()),
        Some("fr") => Ok(GradeScale::likert_french()),
        Some(x) => UnknownOptionSnafu {
            option: "lang",
            value: x,
        }
        .fail(),
    }
}

pub fn validate_rules(tiebreak_mode: &Option<String>) -> PollResult<JudgmentRules> {
    let tiebreak_mode = match tiebreak_mode.as_deref() {
        None | Some("majorityJudgment") => TieBreakMode::MajorityJudgment,
        Some("useChoiceOrder") => TieBreakMode::UseChoiceOrder,
        Some(x) => {
            return UnknownOptionSnafu {
                option: "tiebreakMode",
                value: x,
            }
            .fail()
        }
    };
    Ok(JudgmentRules { tiebreak_mode })
}

pub fn validate_values_type(values_type: &Option<String>) -> PollResult<ValuesType> {
    match values_type {
        None => Ok(ValuesType::Int),
        Some(x) => ValuesType::parse(x),
    }
}

pub fn validate_response_filter(responses: &Option<String>) -> PollResult<ResponseFilter> {
    match responses.as_deref() {
        None | Some("complete") => Ok(ResponseFilter::Complete),
        Some("validatedOnly") => Ok(ResponseFilter::ValidatedOnly),
        Some(x) => UnknownOptionSnafu {
            option: "responses",
            value: x,
        }
        .fail(),
    }
}

/// Everything the aggregation command needs.
#[derive(PartialEq, Debug, Clone)]
pub struct TabulationSettings {
    pub title: String,
    pub scale: GradeScale,
    pub rules: JudgmentRules,
    pub csv: CsvOptions,
    pub input: String,
    /// A file path, `stdout` or nothing for the standard output.
    pub output: Option<String>,
    pub reference: Option<String>,
}

impl TabulationSettings {
    pub fn from_config(config: &MjConfig, reference: Option<String>) -> PollResult<TabulationSettings> {
        let input = config.csv_path.clone().context(MissingInputSnafu {})?;
        let settings = TabulationSettings {
            title: config
                .title
                .clone()
                .unwrap_or_else(|| "Majority judgment".to_string()),
            scale: validate_scale(&config.grades, &config.lang)?,
            rules: validate_rules(&config.tiebreak_mode)?,
            csv: CsvOptions {
                values_type: validate_values_type(&config.values_type)?,
                ignore_first_column: config.ignore_first_column.unwrap_or(false),
                skip_rows_out_of_scale: config.skip_rows_out_of_scale.unwrap_or(false),
            },
            input,
            output: config.output_path.clone(),
            reference,
        };
        debug!("from_config: {:?}", settings);
        Ok(settings)
    }
}

/// The configuration of a live [`crate::poll::SessionStore`].
#[derive(PartialEq, Debug, Clone)]
pub struct StoreSettings {
    /// The grades offered to the participants of every poll.
    pub scale: GradeScale,
    /// The sessions that count in reports.
    pub responses: ResponseFilter,
    pub rules: JudgmentRules,
}

impl StoreSettings {
    pub fn from_config(config: &MjConfig) -> PollResult<StoreSettings> {
        let scale = if config.grades.is_none() && config.lang.is_none() {
            GradeScale::informal()
        } else {
            validate_scale(&config.grades, &config.lang)?
        };
        Ok(StoreSettings {
            scale,
            responses: validate_response_filter(&config.responses)?,
            rules: validate_rules(&config.tiebreak_mode)?,
        })
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            scale: GradeScale::informal(),
            responses: ResponseFilter::Complete,
            rules: JudgmentRules::DEFAULT_RULES,
        }
    }
}
