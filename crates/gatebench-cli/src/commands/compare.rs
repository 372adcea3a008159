use crate::cli::{CompareArgs, CompareCommands, CompareHitsArgs, CompareImageArgs, CompareStatsArgs};
use crate::commands::report;
use crate::config::{DEFAULT_HIT_COUNT_TOLERANCE, DEFAULT_IMAGE_TOLERANCE, DEFAULT_STATS_TOLERANCE};
use crate::error::{CliError, Result};
use crate::utils::parser;
use gatebench::core::io::stats_file::StatsFile;
use gatebench::core::io::traits::ArtifactFile;
use gatebench::core::models::stats::RunStatistics;
use gatebench::validation::histogram::compare_histogram_files;
use gatebench::validation::image::{Axis, ImageComparison, compare_images};
use gatebench::validation::stats::{StatsPolicy, compare_stats};
use gatebench::validation::tolerance::{ToleranceMode, ToleranceSpec};
use gatebench::validation::verdict::Verdict;
use std::path::Path;
use tracing::info;

pub fn run(args: CompareArgs) -> Result<()> {
    let verdict = match args.command {
        CompareCommands::Stats(args) => {
            info!("Dispatching to 'compare stats'.");
            stats(&args)?
        }
        CompareCommands::Hits(args) => {
            info!("Dispatching to 'compare hits'.");
            hits(&args)?
        }
        CompareCommands::Image(args) => {
            info!("Dispatching to 'compare image'.");
            image(args)?
        }
    };
    report(&[verdict])
}

pub fn read_stats(path: &Path) -> Result<RunStatistics> {
    StatsFile::read_from_path(path).map_err(|source| CliError::Stats {
        path: path.to_path_buf(),
        source,
    })
}

pub fn compare_stats_files(actual: &Path, reference: &Path, policy: &StatsPolicy) -> Result<Verdict> {
    let mut verdict = compare_stats(&read_stats(actual)?, &read_stats(reference)?, policy);
    verdict.subject = format!("{} vs {}", actual.display(), reference.display());
    Ok(verdict)
}

fn stats(args: &CompareStatsArgs) -> Result<Verdict> {
    let mut policy = StatsPolicy::new(args.tolerance.unwrap_or(DEFAULT_STATS_TOLERANCE));
    for key in &args.exclude {
        policy = policy.exclude(key);
    }
    if args.exclude_run_dependent {
        policy = policy.excluding_run_dependent();
    }
    compare_stats_files(&args.actual, &args.reference, &policy)
}

fn hits(args: &CompareHitsArgs) -> Result<Verdict> {
    let mode = if args.absolute {
        ToleranceMode::Absolute
    } else {
        ToleranceMode::Relative
    };
    let entries = args
        .keys
        .iter()
        .map(|k| parser::parse_key_spec(k, mode))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let hit_count = args
        .hit_count_tolerance
        .as_deref()
        .map(parser::parse_hit_count_tolerance)
        .transpose()?
        .unwrap_or(DEFAULT_HIT_COUNT_TOLERANCE);
    Ok(compare_histogram_files(
        &args.actual,
        &args.reference,
        &ToleranceSpec::new(entries),
        hit_count,
        args.artifact.as_deref(),
    )?)
}

fn image(args: CompareImageArgs) -> Result<Verdict> {
    let mut options = ImageComparison::new(args.tolerance.unwrap_or(DEFAULT_IMAGE_TOLERANCE));
    if let Some(value) = args.ignore_value {
        options = options.ignoring(value);
    }
    if let Some(axis) = args.axis.as_deref() {
        options = options.along(axis.parse::<Axis>()?);
    }
    if let Some(tolerance) = args.sum_tolerance {
        options = options.with_sum_tolerance(tolerance);
    }
    if let Some(path) = args.artifact {
        options = options.with_artifact(path);
    }
    Ok(compare_images(&args.actual, &args.reference, &options)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatebench::core::io::table::{HitTable, HitTableFile};
    use std::path::PathBuf;

    fn write_stats(dir: &Path, name: &str, steps: u64) -> PathBuf {
        let path = dir.join(name);
        StatsFile::write_to_path(&RunStatistics::new(1, 1000, 5000, steps), &path).unwrap();
        path
    }

    #[test]
    fn stats_comparison_honours_exclusions() {
        let dir = tempfile::tempdir().unwrap();
        let actual = write_stats(dir.path(), "a.txt", 100);
        let reference = write_stats(dir.path(), "b.txt", 999);

        let mut args = CompareStatsArgs {
            actual,
            reference,
            tolerance: Some(0.01),
            exclude: Vec::new(),
            exclude_run_dependent: false,
        };
        assert!(!stats(&args).unwrap().ok());
        args.exclude = vec!["steps".to_string()];
        assert!(stats(&args).unwrap().ok());

        let result = run(CompareArgs {
            command: CompareCommands::Stats(CompareStatsArgs {
                exclude: Vec::new(),
                ..args
            }),
        });
        assert!(matches!(result, Err(CliError::ChecksFailed { failed: 1, total: 1 })));
    }

    #[test]
    fn missing_stats_file_names_the_path() {
        let err = read_stats(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.txt"));
    }

    #[test]
    fn hits_comparison_parses_keys_and_hit_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hits.csv");
        let mut table = HitTable::new(["KineticEnergy", "GlobalTime"]);
        for i in 0..20 {
            table.push_row(&[1.0 + i as f64 * 0.1, 1e9 * i as f64]).unwrap();
        }
        HitTableFile::write_to_path(&table, &path).unwrap();

        let args = CompareHitsArgs {
            actual: path.clone(),
            reference: path,
            keys: vec!["KineticEnergy:0.01".to_string(), "GlobalTime:0.04:1e-9".to_string()],
            absolute: true,
            hit_count_tolerance: Some("0".to_string()),
            artifact: None,
        };
        let verdict = hits(&args).unwrap();
        assert!(verdict.ok());
        assert_eq!(verdict.checks.len(), 3);

        let bad = CompareHitsArgs {
            keys: vec!["KineticEnergy".to_string()],
            ..args
        };
        assert!(matches!(hits(&bad), Err(CliError::Argument(_))));
    }

    #[test]
    fn bad_axis_is_a_validation_error() {
        let args = CompareImageArgs {
            actual: PathBuf::from("a.mhd"),
            reference: PathBuf::from("b.mhd"),
            tolerance: None,
            ignore_value: None,
            axis: Some("w".to_string()),
            sum_tolerance: None,
            artifact: None,
        };
        assert!(matches!(image(args), Err(CliError::Validation(_))));
    }
}
