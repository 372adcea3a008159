use crate::cli::SimulateArgs;
use crate::commands::report;
use crate::config::DEFAULT_STATS_TOLERANCE;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use gatebench::core::io::stats_file::StatsFile;
use gatebench::core::io::traits::ArtifactFile;
use gatebench::engine::progress::ProgressReporter;
use gatebench::engine::scene::Scene;
use gatebench::engine::transport::StubEngine;
use gatebench::validation::stats::{StatsPolicy, compare_stats};
use tracing::info;

pub fn run(args: SimulateArgs, quiet: bool) -> Result<()> {
    info!(scene = %args.scene.display(), "Loading scene.");
    let scene = Scene::from_path(&args.scene)?;
    let mut simulation = scene.build()?;

    let config = simulation.config_mut();
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    if args.check_overlaps {
        config.check_overlaps = true;
    }
    info!(
        seed = config.seed,
        threads = config.threads,
        output_dir = %config.output_dir.display(),
        "Run settings merged."
    );

    let progress_handler = if quiet {
        CliProgressHandler::hidden()
    } else {
        CliProgressHandler::new()
    };
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Starting simulation of {}...", args.scene.display());
    let stats = simulation.run(&StubEngine::new(), &reporter)?;
    println!(
        "✓ Simulated {} event(s): {} track(s), {} step(s).",
        stats.events(),
        stats.tracks(),
        stats.steps()
    );

    let Some(reference_path) = args.reference_stats else {
        return Ok(());
    };
    let reference = StatsFile::read_from_path(&reference_path).map_err(|source| CliError::Stats {
        path: reference_path.clone(),
        source,
    })?;
    let policy = StatsPolicy::new(args.stats_tolerance.unwrap_or(DEFAULT_STATS_TOLERANCE));
    let mut verdict = compare_stats(&stats, &reference, &policy);
    verdict.subject = format!("run vs {}", reference_path.display());
    report(&[verdict])
}
