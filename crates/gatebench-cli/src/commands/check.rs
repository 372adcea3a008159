use crate::cli::CheckArgs;
use crate::commands::{compare::compare_stats_files, report};
use crate::config::{HitsJob, ImageJob, PartialValidationPlan, StatsJob, ValidationPlan};
use crate::error::Result;
use gatebench::validation::histogram::compare_histogram_files;
use gatebench::validation::image::compare_images;
use gatebench::validation::verdict::{Check, Verdict};
use tracing::{error, info, warn};

pub fn run(args: CheckArgs) -> Result<()> {
    let partial = PartialValidationPlan::from_file(&args.plan)?;
    info!("Merging validation plan with CLI overrides...");
    let plan = partial.merge_with_cli(&args.set_values)?;
    if plan.is_empty() {
        warn!(plan = %args.plan.display(), "Validation plan lists no comparisons.");
        return Ok(());
    }
    let verdicts = execute(&plan, args.keep_going)?;
    report(&verdicts)
}

enum Job<'a> {
    Stats(&'a StatsJob),
    Hits(&'a HitsJob),
    Image(&'a ImageJob),
}

impl Job<'_> {
    fn name(&self) -> &str {
        match self {
            Job::Stats(_) => "stats",
            Job::Hits(job) => &job.name,
            Job::Image(job) => &job.name,
        }
    }

    fn run(&self) -> Result<Verdict> {
        match self {
            Job::Stats(job) => compare_stats_files(&job.actual, &job.reference, &job.policy),
            Job::Hits(job) => Ok(compare_histogram_files(
                &job.actual,
                &job.reference,
                &job.spec,
                job.hit_count,
                job.artifact.as_deref(),
            )?),
            Job::Image(job) => Ok(compare_images(&job.actual, &job.reference, &job.options)?),
        }
    }
}

/// Runs every comparison of the plan in order: stats, hits, images.
///
/// With `keep_going`, a comparison that cannot run (unreadable file, geometry mismatch)
/// is logged and counted as a failed verdict instead of aborting the plan.
pub fn execute(plan: &ValidationPlan, keep_going: bool) -> Result<Vec<Verdict>> {
    let jobs = plan
        .stats
        .iter()
        .map(Job::Stats)
        .chain(plan.hits.iter().map(Job::Hits))
        .chain(plan.images.iter().map(Job::Image));

    let mut verdicts = Vec::with_capacity(plan.len());
    for job in jobs {
        let name = job.name();
        info!(comparison = name, "Running comparison.");
        match job.run() {
            Ok(mut verdict) => {
                verdict.subject = format!("{name}: {}", verdict.subject);
                verdicts.push(verdict);
            }
            Err(e) if keep_going => {
                error!(comparison = name, error = %e, "Comparison could not run.");
                let mut verdict = Verdict::new(format!("{name}: {e}"));
                verdict.push(Check::unavailable(name, 0.0, "comparison could not run"));
                verdicts.push(verdict);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(verdicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use gatebench::core::io::stats_file::StatsFile;
    use gatebench::core::io::traits::ArtifactFile;
    use gatebench::core::models::stats::RunStatistics;
    use std::fs;
    use std::path::Path;

    fn setup(dir: &Path) -> std::path::PathBuf {
        fs::create_dir_all(dir.join("out")).unwrap();
        fs::create_dir_all(dir.join("ref")).unwrap();
        StatsFile::write_to_path(&RunStatistics::new(1, 1000, 5000, 100), dir.join("out/stats.txt")).unwrap();
        StatsFile::write_to_path(&RunStatistics::new(1, 1010, 5000, 999), dir.join("ref/stats.txt")).unwrap();
        let plan = dir.join("plan.toml");
        fs::write(
            &plan,
            r#"
            [stats]
            actual = "out/stats.txt"
            reference = "ref/stats.txt"
            tolerance = 0.02
            exclude = ["steps"]
            "#,
        )
        .unwrap();
        plan
    }

    #[test]
    fn plan_passes_and_overrides_can_make_it_fail() {
        let dir = tempfile::tempdir().unwrap();
        let plan = setup(dir.path());

        run(CheckArgs {
            plan: plan.clone(),
            set_values: Vec::new(),
            keep_going: false,
        })
        .unwrap();

        let result = run(CheckArgs {
            plan,
            set_values: vec!["stats.tolerance=0.001".to_string()],
            keep_going: false,
        });
        assert!(matches!(result, Err(CliError::ChecksFailed { failed: 1, total: 1 })));
    }

    #[test]
    fn missing_artifacts_abort_unless_keep_going() {
        let dir = tempfile::tempdir().unwrap();
        let plan_path = setup(dir.path());
        fs::write(
            &plan_path,
            r#"
            [stats]
            actual = "out/stats.txt"
            reference = "ref/stats.txt"
            tolerance = 0.02
            exclude = ["steps"]

            [[images]]
            name = "dose"
            actual = "out/dose.mhd"
            reference = "ref/dose.mhd"
            "#,
        )
        .unwrap();
        let plan = PartialValidationPlan::from_file(&plan_path)
            .unwrap()
            .merge_with_cli(&[])
            .unwrap();

        assert!(matches!(execute(&plan, false), Err(CliError::Validation(_))));

        let verdicts = execute(&plan, true).unwrap();
        assert_eq!(verdicts.len(), 2);
        assert!(verdicts[0].ok());
        assert!(!verdicts[1].ok());
        assert!(verdicts[1].subject.starts_with("dose: "));
    }
}
