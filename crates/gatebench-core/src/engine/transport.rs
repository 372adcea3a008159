use super::attachments::{Bound, BoundTarget};
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use super::simulation::SimulationContract;
use crate::core::io::metaimage::{ElementType, write_metaimage};
use crate::core::io::stats_file::StatsFile;
use crate::core::io::table::{HitTable, HitTableFile};
use crate::core::io::traits::ArtifactFile;
use crate::core::models::attachment::{
    ActorConfig, Direction, Emission, EnergySpectrum, PositionShape, SourceConfig,
};
use crate::core::models::image::Image;
use crate::core::models::stats::{EVENTS, RunStatistics, STEPS, TRACKS};
use nalgebra::{Point3, Vector3};
use rand::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// The seam to a particle-transport engine.
///
/// An engine consumes a fully resolved [`SimulationContract`], runs it to completion and
/// writes the outputs its actors declare. The call blocks until the run is over.
pub trait TransportEngine {
    fn run(
        &self,
        contract: &SimulationContract,
        reporter: &ProgressReporter,
    ) -> Result<RunStatistics, EngineError>;
}

const PROGRESS_CHUNK: u64 = 1000;
const MAX_SECONDARIES: u64 = 4;
const MAX_STEPS_PER_TRACK: u64 = 30;
/// Growth of the projection blur (mm of sigma per mm of source-detector distance).
const COLLIMATOR_BLUR_SLOPE: f64 = 0.02;

/// A deterministic stand-in for a transport engine.
///
/// Event counts equal the requested primaries; track and step counts come from an RNG
/// seeded with the configured seed, so two runs of the same contract agree exactly. Hit
/// and phase-space rows are emitted once per primary at the actor's first target, and a
/// projection actor accumulates primaries on a detector plane with a distance-dependent
/// blur.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubEngine;

impl StubEngine {
    pub fn new() -> Self {
        Self
    }
}

/// One emitted primary, in world coordinates.
struct Primary {
    event: u64,
    particle: String,
    energy: f64,
    position: Point3<f64>,
    direction: Vector3<f64>,
}

impl TransportEngine for StubEngine {
    #[instrument(skip_all, name = "stub_engine_run")]
    fn run(
        &self,
        contract: &SimulationContract,
        reporter: &ProgressReporter,
    ) -> Result<RunStatistics, EngineError> {
        let started = Instant::now();
        let config = &contract.config;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let total_events: u64 = contract
            .attachments
            .sources
            .iter()
            .map(|s| primaries_of(&s.config, config.run_duration))
            .sum();
        info!(events = total_events, seed = config.seed, "Starting stub run.");
        reporter.report(Progress::RunStart { total_events });

        let track_types = contract.attachments.actors.iter().any(|a| {
            matches!(
                a.config,
                ActorConfig::Statistics {
                    track_types: true,
                    ..
                }
            )
        });

        let mut stats = RunStatistics::new(1, 0, 0, 0);
        stats.threads = config.threads;
        let (mut tracks, mut steps) = (0u64, 0u64);
        let mut recorders: Vec<Recorder> = contract
            .attachments
            .actors
            .iter()
            .filter_map(Recorder::for_actor)
            .collect();

        let mut event = 0u64;
        let mut pending = 0u64;
        for source in &contract.attachments.sources {
            let count = primaries_of(&source.config, config.run_duration);
            debug!(source = %source.name, primaries = count, "Emitting primaries.");
            for _ in 0..count {
                let primary = emit(source, event, &mut rng);
                let secondaries = rng.gen_range(0..=MAX_SECONDARIES);
                tracks += 1 + secondaries;
                steps += (0..=secondaries)
                    .map(|_| rng.gen_range(1..=MAX_STEPS_PER_TRACK))
                    .sum::<u64>();
                if track_types {
                    stats.add_track_type(&primary.particle, 1);
                    for _ in 0..secondaries {
                        let particle = if rng.gen_bool(0.5) { "gamma" } else { "e-" };
                        stats.add_track_type(particle, 1);
                    }
                }
                for recorder in &mut recorders {
                    recorder.record(&primary, &mut rng)?;
                }

                event += 1;
                pending += 1;
                if pending == PROGRESS_CHUNK {
                    reporter.report(Progress::EventsProcessed(pending));
                    pending = 0;
                }
            }
        }
        if pending > 0 {
            reporter.report(Progress::EventsProcessed(pending));
        }
        reporter.report(Progress::RunFinish);
        stats.set(EVENTS, event);
        stats.set(TRACKS, tracks);
        stats.set(STEPS, steps);
        stats.elapsed = started.elapsed();

        for recorder in recorders {
            recorder.finish(contract)?;
        }
        for actor in &contract.attachments.actors {
            if let ActorConfig::Statistics {
                output: Some(path), ..
            } = &actor.config
            {
                let path = prepare_output(contract, path)?;
                StatsFile::write_to_path(&stats, &path)?;
                info!(actor = %actor.name, path = %path.display(), "Wrote statistics.");
            }
        }

        info!(
            events = stats.events(),
            tracks = stats.tracks(),
            steps = stats.steps(),
            "Stub run finished."
        );
        Ok(stats)
    }
}

/// Primary count of a source for a run of `duration` seconds.
pub fn primaries_of(source: &SourceConfig, duration: f64) -> u64 {
    match source.emission() {
        Emission::Primaries(n) => n,
        Emission::Activity(a) => (a * duration).round().max(0.0) as u64,
    }
}

fn emit(source: &Bound<SourceConfig>, event: u64, rng: &mut StdRng) -> Primary {
    let frame = source.targets.first();
    let to_world = |p: Point3<f64>| frame.map_or(p, |t| t.world * p);
    match &source.config {
        SourceConfig::Generic(g) => {
            let local = Point3::from(g.translation + sample_offset(&g.position, rng));
            let direction = match &g.direction {
                Direction::Iso => isotropic(rng),
                Direction::Momentum(v) => v.try_normalize(0.0).unwrap_or_else(Vector3::z),
                Direction::Focused(p) => (p - local.coords)
                    .try_normalize(0.0)
                    .unwrap_or_else(Vector3::z),
            };
            Primary {
                event,
                particle: g.particle.clone(),
                energy: sample_energy(&g.energy, rng),
                position: to_world(local),
                direction: frame.map_or(direction, |t| t.world * direction),
            }
        }
        SourceConfig::Voxelized {
            particle, energy, ..
        } => Primary {
            event,
            particle: particle.clone(),
            energy: sample_energy(energy, rng),
            position: to_world(Point3::origin()),
            direction: isotropic(rng),
        },
    }
}

fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

fn sample_energy(spectrum: &EnergySpectrum, rng: &mut StdRng) -> f64 {
    match *spectrum {
        EnergySpectrum::Mono(e) => e,
        EnergySpectrum::Gauss { mean, sigma } => (mean + sigma * gaussian(rng)).max(0.0),
        EnergySpectrum::Range { min, max } => rng.gen_range(min..max),
    }
}

fn isotropic(rng: &mut StdRng) -> Vector3<f64> {
    let cos_theta: f64 = rng.gen_range(-1.0..=1.0);
    let phi: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
    let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
    Vector3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}

fn sample_offset(shape: &PositionShape, rng: &mut StdRng) -> Vector3<f64> {
    match shape {
        PositionShape::Point => Vector3::zeros(),
        PositionShape::Disc { radius } => {
            let r = radius * rng.gen_range(0.0..=1.0f64).sqrt();
            let phi: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
            Vector3::new(r * phi.cos(), r * phi.sin(), 0.0)
        }
        PositionShape::Box { size } => Vector3::new(
            size.x * rng.gen_range(-0.5..=0.5f64),
            size.y * rng.gen_range(-0.5..=0.5f64),
            size.z * rng.gen_range(-0.5..=0.5f64),
        ),
        PositionShape::Sphere { radius } => {
            let r = radius * rng.gen_range(0.0..=1.0f64).cbrt();
            isotropic(rng) * r
        }
    }
}

fn pdg_code(particle: &str) -> f64 {
    match particle {
        "gamma" => 22.0,
        "e-" => 11.0,
        "e+" => -11.0,
        "proton" => 2212.0,
        "neutron" => 2112.0,
        "alpha" => 1_000_020_040.0,
        _ => 0.0,
    }
}

/// Vector attributes are written as `_X`, `_Y` and `_Z` columns.
fn is_vector_attribute(name: &str) -> bool {
    name.contains("Position") || name.contains("Direction")
}

/// Attributes with string values have no numeric column in a hit table.
fn is_textual_attribute(name: &str) -> bool {
    matches!(
        name,
        "ParticleName"
            | "TrackCreatorProcess"
            | "ProcessDefinedStep"
            | "PreStepUniqueVolumeID"
            | "PostStepUniqueVolumeID"
    )
}

/// Column names for an attribute list, in attribute order.
pub fn table_columns(attributes: &[String]) -> Vec<String> {
    attributes
        .iter()
        .filter(|a| !is_textual_attribute(a))
        .flat_map(|a| {
            if is_vector_attribute(a) {
                vec![format!("{a}_X"), format!("{a}_Y"), format!("{a}_Z")]
            } else {
                vec![a.clone()]
            }
        })
        .collect()
}

enum Recorder {
    Table {
        actor: String,
        attributes: Vec<String>,
        target: Option<BoundTarget>,
        output: PathBuf,
        table: HitTable,
        row: Vec<f64>,
    },
    Projection {
        actor: String,
        target: Option<BoundTarget>,
        distance: f64,
        output: PathBuf,
        image: Image,
    },
}

impl Recorder {
    fn for_actor(actor: &Bound<ActorConfig>) -> Option<Self> {
        let target = actor.targets.first().cloned();
        match &actor.config {
            ActorConfig::PhaseSpace { attributes, output }
            | ActorConfig::Hits { attributes, output } => {
                let skipped: Vec<&str> = attributes
                    .iter()
                    .map(String::as_str)
                    .filter(|a| is_textual_attribute(a))
                    .collect();
                if !skipped.is_empty() {
                    warn!(actor = %actor.name, attributes = ?skipped, "Textual attributes are not recorded.");
                }
                let attributes: Vec<String> = attributes
                    .iter()
                    .filter(|a| !is_textual_attribute(a))
                    .cloned()
                    .collect();
                Some(Recorder::Table {
                    actor: actor.name.clone(),
                    table: HitTable::new(table_columns(&attributes)),
                    attributes,
                    target,
                    output: output.clone(),
                    row: Vec::new(),
                })
            }
            ActorConfig::Projection {
                size,
                spacing,
                output,
                detector_distance,
            } => {
                let origin = (0..2)
                    .map(|i| -0.5 * (size[i] as f64 - 1.0) * spacing[i])
                    .collect();
                Some(Recorder::Projection {
                    actor: actor.name.clone(),
                    target,
                    distance: *detector_distance,
                    output: output.clone(),
                    image: Image::new(size.to_vec(), spacing.to_vec(), origin, 1),
                })
            }
            ActorConfig::Statistics { .. } | ActorConfig::Kill => None,
        }
    }

    fn record(&mut self, primary: &Primary, rng: &mut StdRng) -> Result<(), EngineError> {
        match self {
            Recorder::Table {
                attributes,
                target,
                table,
                row,
                ..
            } => {
                let local_position = target.as_ref().map_or(primary.position, |t| {
                    t.world.inverse_transform_point(&primary.position)
                });
                let local_direction = target.as_ref().map_or(primary.direction, |t| {
                    t.world.inverse_transform_vector(&primary.direction)
                });
                let deposit = primary.energy * rng.gen_range(0.0..=1.0);
                row.clear();
                for attribute in attributes.iter() {
                    match attribute.as_str() {
                        "PrePosition" | "PostPosition" | "EventPosition"
                        | "TrackVertexPosition" => row.extend(primary.position.coords.iter()),
                        "PrePositionLocal" | "PostPositionLocal" => {
                            row.extend(local_position.coords.iter())
                        }
                        "PreDirection" | "PostDirection" | "EventDirection" => {
                            row.extend(primary.direction.iter())
                        }
                        "PreDirectionLocal" | "PostDirectionLocal" => {
                            row.extend(local_direction.iter())
                        }
                        "KineticEnergy" | "EventKineticEnergy" | "TrackVertexKineticEnergy" => {
                            row.push(primary.energy)
                        }
                        "TotalEnergyDeposit" => row.push(deposit),
                        "Weight" => row.push(1.0),
                        "PDGCode" => row.push(pdg_code(&primary.particle)),
                        "EventID" => row.push(primary.event as f64),
                        "TrackID" => row.push(1.0),
                        _ => row.push(0.0),
                    }
                }
                table.push_row(row)?;
            }
            Recorder::Projection {
                target,
                distance,
                image,
                ..
            } => {
                let local_position = target.as_ref().map_or(primary.position, |t| {
                    t.world.inverse_transform_point(&primary.position)
                });
                let depth = (*distance - local_position.z).abs();
                let sigma = 0.5 * image.spacing[0] + COLLIMATOR_BLUR_SLOPE * depth;
                let u = local_position.x + sigma * gaussian(rng);
                let v = local_position.y + sigma * gaussian(rng);
                let index = |value: f64, axis: usize| {
                    let i = ((value - image.origin[axis]) / image.spacing[axis]).round();
                    (i >= 0.0 && (i as usize) < image.size[axis]).then_some(i as usize)
                };
                if let (Some(i), Some(j)) = (index(u, 0), index(v, 1)) {
                    let current = image.get(&[i, j], 0).unwrap_or(0.0);
                    image.set(&[i, j], 0, current + 1.0);
                }
            }
        }
        Ok(())
    }

    fn finish(self, contract: &SimulationContract) -> Result<(), EngineError> {
        match self {
            Recorder::Table {
                actor,
                output,
                table,
                ..
            } => {
                let path = prepare_output(contract, &output)?;
                HitTableFile::write_to_path(&table, &path)?;
                info!(actor = %actor, rows = table.len(), path = %path.display(), "Wrote hit table.");
            }
            Recorder::Projection {
                actor,
                output,
                image,
                distance,
                ..
            } => {
                let path = prepare_output(contract, &output)?;
                write_metaimage(&image, &path, ElementType::Float)?;
                info!(actor = %actor, distance, counts = image.sum(), path = %path.display(), "Wrote projection.");
            }
        }
        Ok(())
    }
}

fn prepare_output(contract: &SimulationContract, path: &Path) -> Result<PathBuf, EngineError> {
    let path = contract.config.output_path(path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| EngineError::OutputDir {
            path: parent.display().to_string(),
            source,
        })?;
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::metaimage::read_metaimage;
    use crate::core::models::attachment::GenericSource;
    use crate::core::models::volume::{Shape, ShapeKind};
    use crate::core::units::{CM, MEV};
    use crate::engine::config::SimulationConfigBuilder;
    use crate::engine::simulation::Simulation;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn box_scene(dir: &Path) -> Simulation {
        let config = SimulationConfigBuilder::new()
            .output_dir(dir.to_path_buf())
            .build()
            .unwrap();
        let mut sim = Simulation::new(config);
        sim.add_volume(ShapeKind::Box, "Box")
            .unwrap()
            .set_shape(Shape::cuboid([1.0 * CM, 1.0 * CM, 1.0 * CM]))
            .set_material("G4_WATER")
            .set_translation([0.0, 0.0, -5.0 * CM]);
        sim
    }

    #[test]
    fn events_equal_requested_primaries() {
        let dir = tempfile::tempdir().unwrap();
        let mut sim = box_scene(dir.path());
        sim.add_source(
            SourceConfig::Generic(
                GenericSource::new("gamma")
                    .with_energy(EnergySpectrum::Mono(0.14 * MEV))
                    .with_primaries(2000),
            ),
            "source",
            "Box",
        )
        .unwrap();
        sim.add_actor(
            ActorConfig::Statistics {
                track_types: true,
                output: Some(PathBuf::from("stats/stats.txt")),
            },
            "stats",
            "world",
        )
        .unwrap();

        let processed = AtomicU64::new(0);
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::EventsProcessed(n) = event {
                processed.fetch_add(n, Ordering::Relaxed);
            }
        }));
        let stats = sim.run(&StubEngine::new(), &reporter).unwrap();
        drop(reporter);

        assert_eq!(stats.events(), 2000);
        assert_eq!(processed.into_inner(), 2000);
        assert!(stats.tracks() >= 2000);
        assert!(stats.steps() >= stats.tracks());
        let types: u64 = stats.track_types().map(|(_, n)| n).sum();
        assert_eq!(types, stats.tracks());

        let written = StatsFile::read_from_path(dir.path().join("stats/stats.txt")).unwrap();
        assert_eq!(written.events(), 2000);
        assert_eq!(written.tracks(), stats.tracks());
    }

    #[test]
    fn runs_with_the_same_seed_agree() {
        let dir = tempfile::tempdir().unwrap();
        let mut sim = box_scene(dir.path());
        sim.add_source(
            SourceConfig::Generic(GenericSource::new("e-").with_activity(250.0)),
            "source",
            "world",
        )
        .unwrap();
        let first = sim.run(&StubEngine, &ProgressReporter::new()).unwrap();
        let second = sim.run(&StubEngine, &ProgressReporter::new()).unwrap();
        assert_eq!(first.events(), 250);
        assert_eq!(first.counters, second.counters);

        sim.config_mut().seed += 1;
        let third = sim.run(&StubEngine, &ProgressReporter::new()).unwrap();
        assert_eq!(third.events(), 250);
    }

    #[test]
    fn phase_space_rows_follow_the_attribute_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut sim = box_scene(dir.path());
        sim.add_source(
            SourceConfig::Generic(
                GenericSource::new("e-")
                    .with_energy(EnergySpectrum::Gauss {
                        mean: 6.7,
                        sigma: 0.077,
                    })
                    .with_primaries(50),
            ),
            "beam",
            "world",
        )
        .unwrap();
        sim.add_actor(
            ActorConfig::PhaseSpace {
                attributes: vec![
                    "KineticEnergy".into(),
                    "PrePositionLocal".into(),
                    "PDGCode".into(),
                    "ParticleName".into(),
                ],
                output: PathBuf::from("phsp.csv"),
            },
            "phsp",
            "Box",
        )
        .unwrap();
        sim.run(&StubEngine, &ProgressReporter::new()).unwrap();

        let table = HitTableFile::read_from_path(dir.path().join("phsp.csv")).unwrap();
        assert_eq!(table.len(), 50);
        assert_eq!(
            table.column_names(),
            [
                "KineticEnergy",
                "PrePositionLocal_X",
                "PrePositionLocal_Y",
                "PrePositionLocal_Z",
                "PDGCode"
            ]
        );
        let z = table.column("PrePositionLocal_Z").unwrap();
        assert!(z.iter().all(|&v| (v - 50.0).abs() < 1e-9));
        assert!(table.column("PDGCode").unwrap().iter().all(|&c| c == 11.0));
    }

    #[test]
    fn projection_counts_every_primary_on_the_detector() {
        let dir = tempfile::tempdir().unwrap();
        let mut sim = box_scene(dir.path());
        sim.add_source(
            SourceConfig::Generic(GenericSource::new("gamma").with_primaries(300)),
            "point",
            "world",
        )
        .unwrap();
        sim.add_actor(
            ActorConfig::Projection {
                size: [32, 32],
                spacing: [4.0, 4.0],
                output: PathBuf::from("proj/projection.mhd"),
                detector_distance: 100.0,
            },
            "projection",
            "world",
        )
        .unwrap();
        sim.run(&StubEngine, &ProgressReporter::new()).unwrap();

        let image = read_metaimage(&dir.path().join("proj/projection.mhd")).unwrap();
        assert_eq!(image.size, vec![32, 32]);
        assert!((image.sum() - 300.0).abs() < 1e-9);
    }

    #[test]
    fn table_columns_expand_vectors_and_drop_text() {
        let columns = table_columns(&[
            "EventID".to_string(),
            "PostDirection".to_string(),
            "TrackCreatorProcess".to_string(),
        ]);
        assert_eq!(
            columns,
            ["EventID", "PostDirection_X", "PostDirection_Y", "PostDirection_Z"]
        );
    }
}
