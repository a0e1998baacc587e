use clap::Parser;
use log::{info, warn};

use mj_poll::poll::config_reader::{read_config, MjConfig};
use mj_poll::poll::{run_tabulation, PollResult, TabulationSettings};

mod args;

use crate::args::Args;

/// Applies the command line over the configuration file.
fn merge_args(args: &Args, config: MjConfig) -> MjConfig {
    MjConfig {
        title: args.title.clone().or(config.title),
        grades: args.grades.clone().or(config.grades),
        lang: args.lang.clone().or(config.lang),
        values_type: args.values_type.clone().or(config.values_type),
        ignore_first_column: if args.ignore_first_column {
            Some(true)
        } else {
            config.ignore_first_column
        },
        skip_rows_out_of_scale: if args.skip_rows_out_of_scale {
            Some(true)
        } else {
            config.skip_rows_out_of_scale
        },
        tiebreak_mode: args.tiebreak.clone().or(config.tiebreak_mode),
        csv_path: args.input.clone().or(config.csv_path),
        output_path: args.out.clone().or(config.output_path),
        ..config
    }
}

fn run(args: &Args) -> PollResult<()> {
    let config = match &args.config {
        Some(path) => read_config(path)?,
        None => MjConfig::default(),
    };
    let config = merge_args(args, config);
    let settings = TabulationSettings::from_config(&config, args.reference.clone())?;
    run_tabulation(&settings)
}

fn main() {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }
    info!("main: args: {:?}", args);

    if let Err(e) = run(&args) {
        warn!("main: error: {:?}", e);
        eprintln!("An error occured: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_the_configuration() {
        let args = Args::parse_from([
            "mjpoll",
            "--input",
            "flags.csv",
            "--grades",
            "Bad",
            "--grades",
            "Good",
            "--ignore-first-column",
        ]);
        let config = MjConfig {
            title: Some("From file".to_string()),
            csv_path: Some("file.csv".to_string()),
            values_type: Some("int".to_string()),
            ..MjConfig::default()
        };
        let merged = merge_args(&args, config);
        assert_eq!(merged.csv_path.as_deref(), Some("flags.csv"));
        assert_eq!(merged.title.as_deref(), Some("From file"));
        assert_eq!(merged.values_type.as_deref(), Some("int"));
        assert_eq!(
            merged.grades,
            Some(vec!["Bad".to_string(), "Good".to_string()])
        );
        assert_eq!(merged.ignore_first_column, Some(true));
        assert_eq!(merged.skip_rows_out_of_scale, None);
    }

    #[test]
    fn skip_rows_flag() {
        let args = Args::parse_from(["mjpoll", "--skip-rows-out-of-scale"]);
        let merged = merge_args(&args, MjConfig::default());
        assert_eq!(merged.skip_rows_out_of_scale, Some(true));

        let args = Args::parse_from(["mjpoll"]);
        let config = MjConfig {
            skip_rows_out_of_scale: Some(false),
            ..MjConfig::default()
        };
        assert_eq!(merge_args(&args, config).skip_rows_out_of_scale, Some(false));
    }
}
