use clap::Parser;

/// This is a majority judgment tabulation program.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON file describing the poll and its input. Any other option
    /// overrides the corresponding entry of this file.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) A CSV file with one column per choice and one row per participant.
    /// Overrides the csvPath entry of the configuration.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the poll will be written in
    /// JSON format to the given location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference file containing the summary of the poll in JSON format. If
    /// provided, mjpoll will check that the tabulated output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (str or int, default int) Whether the cells hold grade labels or grade ranks starting
    /// at 1 for the worst grade.
    #[clap(long, value_parser)]
    pub values_type: Option<String>,

    /// (repeated, worst first) The labels of the grades. Defaults to a five-level Likert
    /// scale.
    #[clap(long, value_parser)]
    pub grades: Option<Vec<String>>,

    /// (en or fr) The language of the default Likert scale.
    #[clap(long, value_parser)]
    pub lang: Option<String>,

    /// The title of the poll, copied into the summary.
    #[clap(long, value_parser)]
    pub title: Option<String>,

    /// Drops the first column of the input, for example a participant name.
    #[clap(long, takes_value = false)]
    pub ignore_first_column: bool,

    /// Drops a whole row when one of its values is outside the scale, instead of only that
    /// value.
    #[clap(long, takes_value = false)]
    pub skip_rows_out_of_scale: bool,

    /// (majorityJudgment or useChoiceOrder) How choices with the same majority grade are
    /// ordered.
    #[clap(long, value_parser)]
    pub tiebreak: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
