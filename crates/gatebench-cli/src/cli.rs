use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "The gatebench developers",
    version,
    about = "gatebench CLI - build Monte Carlo transport scenes and validate their outputs against references.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v INFO, -vv DEBUG, -vvv TRACE); GATEBENCH_LOG directives take precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Also write logs, with per-phase timings, to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a scene file and run it through the stub transport engine.
    Simulate(SimulateArgs),
    /// Compare one output artifact against its reference.
    Compare(CompareArgs),
    /// Run every comparison listed in a validation plan.
    Check(CheckArgs),
}

/// Arguments for the `simulate` subcommand.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Path to the scene description in TOML format.
    #[arg(value_name = "SCENE")]
    pub scene: PathBuf,

    /// Override the output directory of the scene.
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Override the random seed.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Override the number of worker threads.
    #[arg(short = 'j', long, value_name = "NUM")]
    pub threads: Option<usize>,

    /// Check the geometry for overlaps before running.
    #[arg(long)]
    pub check_overlaps: bool,

    /// Compare the run statistics against this reference stats file afterwards.
    #[arg(long, value_name = "PATH")]
    pub reference_stats: Option<PathBuf>,

    /// Relative tolerance used with `--reference-stats`.
    #[arg(long, value_name = "FLOAT", requires = "reference_stats")]
    pub stats_tolerance: Option<f64>,
}

/// Arguments for the `compare` subcommand.
#[derive(Args, Debug)]
pub struct CompareArgs {
    #[command(subcommand)]
    pub command: CompareCommands,
}

#[derive(Subcommand, Debug)]
pub enum CompareCommands {
    /// Compare two stats files counter by counter.
    Stats(CompareStatsArgs),
    /// Compare two hit tables key by key.
    Hits(CompareHitsArgs),
    /// Compare two MetaImages voxel by voxel or along one axis.
    Image(CompareImageArgs),
}

/// Arguments for `compare stats`.
#[derive(Args, Debug)]
pub struct CompareStatsArgs {
    #[arg(value_name = "ACTUAL")]
    pub actual: PathBuf,

    #[arg(value_name = "REFERENCE")]
    pub reference: PathBuf,

    /// Relative tolerance applied to every counter.
    #[arg(short, long, value_name = "FLOAT")]
    pub tolerance: Option<f64>,

    /// Counter to leave out of the comparison. Can be used multiple times.
    #[arg(short = 'x', long = "exclude", value_name = "KEY")]
    pub exclude: Vec<String>,

    /// Leave out counters that depend on the run setup, such as the step count.
    #[arg(long)]
    pub exclude_run_dependent: bool,
}

/// Arguments for `compare hits`.
#[derive(Args, Debug)]
pub struct CompareHitsArgs {
    #[arg(value_name = "ACTUAL")]
    pub actual: PathBuf,

    #[arg(value_name = "REFERENCE")]
    pub reference: PathBuf,

    /// Compared key as 'NAME:TOLERANCE' or 'NAME:TOLERANCE:SCALE'. Can be used multiple times.
    /// Example: -k KineticEnergy:0.03 -k GlobalTime:0.04:1e-9
    #[arg(short, long = "key", value_name = "SPEC", required = true)]
    pub keys: Vec<String>,

    /// Interpret key tolerances in the unit of the quantity instead of relative to the reference.
    #[arg(long)]
    pub absolute: bool,

    /// Allowed row-count difference, either a number of rows ('10') or a percentage ('5%').
    #[arg(long, value_name = "ROWS_OR_PERCENT")]
    pub hit_count_tolerance: Option<String>,

    /// Write both histograms, binned per key, to this CSV file.
    #[arg(long, value_name = "PATH")]
    pub artifact: Option<PathBuf>,
}

/// Arguments for `compare image`.
#[derive(Args, Debug)]
pub struct CompareImageArgs {
    #[arg(value_name = "ACTUAL")]
    pub actual: PathBuf,

    #[arg(value_name = "REFERENCE")]
    pub reference: PathBuf,

    /// Limit of the normalized sum of absolute differences, in percent.
    #[arg(short, long, value_name = "PERCENT")]
    pub tolerance: Option<f64>,

    /// Exclude voxels whose reference value equals this value.
    #[arg(long, value_name = "FLOAT", allow_negative_numbers = true)]
    pub ignore_value: Option<f64>,

    /// Compare 1-D profiles along this axis (x, y or z).
    #[arg(long, value_name = "AXIS")]
    pub axis: Option<String>,

    /// Also compare the masked sums, with this limit in percent.
    #[arg(long, value_name = "PERCENT")]
    pub sum_tolerance: Option<f64>,

    /// Write the profile CSV or the difference image here.
    #[arg(long, value_name = "PATH")]
    pub artifact: Option<PathBuf>,
}

/// Arguments for the `check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to the validation plan in TOML format.
    #[arg(value_name = "PLAN")]
    pub plan: PathBuf,

    /// Set a specific plan value, overriding the plan file.
    /// Can be used multiple times. Example: -S stats.tolerance=0.05
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,

    /// Keep going after the first failed comparison.
    #[arg(long)]
    pub keep_going: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn compare_hits_collects_repeated_keys() {
        let cli = Cli::try_parse_from([
            "gatebench",
            "-vv",
            "compare",
            "hits",
            "a.csv",
            "b.csv",
            "-k",
            "KineticEnergy:0.03",
            "--key",
            "GlobalTime:0.04:1e-9",
            "--hit-count-tolerance",
            "5%",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Compare(CompareArgs {
            command: CompareCommands::Hits(args),
        }) = cli.command
        else {
            panic!("expected compare hits");
        };
        assert_eq!(args.keys, ["KineticEnergy:0.03", "GlobalTime:0.04:1e-9"]);
        assert_eq!(args.hit_count_tolerance.as_deref(), Some("5%"));
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["gatebench", "-q", "-v", "check", "plan.toml"]);
        assert!(result.is_err());
    }

    #[test]
    fn image_ignore_value_accepts_negative_numbers() {
        let cli = Cli::try_parse_from([
            "gatebench",
            "compare",
            "image",
            "a.mhd",
            "b.mhd",
            "--ignore-value",
            "-1",
            "--axis",
            "x",
        ])
        .unwrap();
        let Commands::Compare(CompareArgs {
            command: CompareCommands::Image(args),
        }) = cli.command
        else {
            panic!("expected compare image");
        };
        assert_eq!(args.ignore_value, Some(-1.0));
    }
}
