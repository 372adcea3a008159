//! TOML scene descriptions.
//!
//! A scene lists run settings, the world, extra materials, volumes and attachments. Every
//! physical quantity may be written as a bare number in canonical units or as a string
//! with a unit, such as `"-5 cm"` or `"6.7 MeV"`.
//!
//! ```toml
//! material-database = "materials.toml"
//!
//! [simulation]
//! seed = 42
//! output-dir = "output"
//!
//! [world]
//! size = ["1 m", "1 m", "1 m"]
//!
//! [[volume]]
//! name = "Box"
//! material = "G4_WATER"
//! translation = [0, 0, "-5 cm"]
//! shape = { type = "box", size = ["1 cm", "1 cm", "1 cm"] }
//!
//! [[source]]
//! name = "source"
//! type = "generic"
//! particle = "gamma"
//! energy = { type = "mono", energy = "140 keV" }
//! n = 1000
//!
//! [[actor]]
//! name = "stats"
//! type = "statistics"
//! output = "stats.txt"
//! ```
//!
//! Relative input paths (the material database, voxelized source images and the output
//! directory) are resolved against the directory holding the scene file.

use super::config::{ConfigError, SimulationConfig};
use super::simulation::Simulation;
use crate::core::error::ModelError;
use crate::core::geometry::transform::{TransformError, euler_rotation};
use crate::core::materials::registry::MaterialDatabaseError;
use crate::core::models::attachment::{
    ActorConfig, Direction, EnergySpectrum, GenericSource, PositionShape, RegionConfig,
    SourceConfig, Targets,
};
use crate::core::models::volume::{ConsParams, Shape, SphereParams, TubsParams, WORLD};
use crate::core::units::{Dimension, QuantityValue, UnitError};
use nalgebra::Vector3;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Failed to read scene file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse scene file '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid quantity in {context}: {source}")]
    Unit { context: String, source: UnitError },
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("Invalid simulation settings: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid rotation of volume '{volume}': {source}")]
    Transform {
        volume: String,
        source: TransformError,
    },
    #[error("Failed to load material database: {0}")]
    Database(#[from] MaterialDatabaseError),
    #[error("Invalid {context}: {reason}")]
    Invalid { context: String, reason: String },
}

/// A parsed scene file, ready to be applied onto a [`Simulation`].
#[derive(Debug, Clone)]
pub struct Scene {
    description: SceneDescription,
    base_dir: PathBuf,
}

impl Scene {
    /// Reads and parses a scene file.
    pub fn from_path(path: &Path) -> Result<Self, SceneError> {
        let content = std::fs::read_to_string(path).map_err(|e| SceneError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::parse(&content, &base_dir).map_err(|e| match e {
            SceneError::Toml { source, .. } => SceneError::Toml {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    /// Parses scene text; relative paths resolve against `base_dir`.
    pub fn parse(content: &str, base_dir: &Path) -> Result<Self, SceneError> {
        let description = toml::from_str(content).map_err(|e| SceneError::Toml {
            path: "<inline>".to_string(),
            source: e,
        })?;
        Ok(Self {
            description,
            base_dir: base_dir.to_path_buf(),
        })
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Run settings of the scene, with defaults for everything left out.
    pub fn config(&self) -> Result<SimulationConfig, SceneError> {
        let spec = &self.description.simulation;
        let defaults = SimulationConfig::default();
        let config = SimulationConfig {
            threads: spec.threads.unwrap_or(defaults.threads),
            seed: spec.seed.unwrap_or(defaults.seed),
            check_overlaps: spec.check_overlaps.unwrap_or(defaults.check_overlaps),
            overlap_tolerance: optional_quantity(
                spec.overlap_tolerance.as_ref(),
                Dimension::Length,
                "simulation.overlap-tolerance",
            )?
            .unwrap_or(defaults.overlap_tolerance),
            output_dir: spec
                .output_dir
                .as_deref()
                .map_or_else(|| self.base_dir.clone(), |p| self.resolve_path(p)),
            run_duration: optional_quantity(
                spec.run_duration.as_ref(),
                Dimension::Time,
                "simulation.run-duration",
            )?
            .unwrap_or(defaults.run_duration),
        };
        config.validate()?;
        Ok(config)
    }

    /// Builds a fresh simulation from this scene.
    pub fn build(&self) -> Result<Simulation, SceneError> {
        let mut simulation = Simulation::new(self.config()?);
        self.apply(&mut simulation)?;
        Ok(simulation)
    }

    /// Adds the scene's materials, volumes and attachments to `simulation`.
    ///
    /// Run settings are left alone; use [`Scene::config`] for those.
    #[instrument(skip_all, name = "scene_apply")]
    pub fn apply(&self, simulation: &mut Simulation) -> Result<(), SceneError> {
        let d = &self.description;

        if let Some(database) = &d.material_database {
            let path = self.resolve_path(database);
            let added = simulation.materials_mut().load_database(&path)?;
            debug!(path = %path.display(), added, "Loaded material database.");
        }
        for material in &d.material {
            self.apply_material(simulation, material)?;
        }
        if let Some(world) = &d.world {
            apply_world(simulation, world)?;
        }
        for volume in &d.volume {
            apply_volume(simulation, volume)?;
        }
        for source in &d.source {
            self.apply_source(simulation, source)?;
        }
        for actor in &d.actor {
            apply_actor(simulation, actor)?;
        }
        for region in &d.region {
            apply_region(simulation, region)?;
        }

        info!(
            volumes = d.volume.len(),
            materials = d.material.len(),
            sources = d.source.len(),
            actors = d.actor.len(),
            regions = d.region.len(),
            "Scene applied."
        );
        Ok(())
    }

    fn apply_material(
        &self,
        simulation: &mut Simulation,
        spec: &MaterialSpec,
    ) -> Result<(), SceneError> {
        let context = format!("material '{}'", spec.name);
        let density = quantity(&spec.density, Dimension::Density, &context)?;
        let symbols: Vec<&str> = spec.elements.iter().map(String::as_str).collect();
        match (&spec.counts, &spec.fractions) {
            (Some(counts), None) => {
                simulation.add_material_by_atom_count(&spec.name, &symbols, counts, density)?;
            }
            (None, Some(fractions)) => {
                simulation.add_material_by_mass_fraction(
                    &spec.name, &symbols, fractions, density,
                )?;
            }
            _ => {
                return Err(SceneError::Invalid {
                    context,
                    reason: "exactly one of 'counts' or 'fractions' must be given".to_string(),
                });
            }
        }
        Ok(())
    }

    fn apply_source(&self, simulation: &mut Simulation, spec: &SourceSpec) -> Result<(), SceneError> {
        let context = format!("source '{}'", spec.name);
        let config = match &spec.kind {
            SourceKindSpec::Generic {
                particle,
                energy,
                position,
                translation,
                direction,
                n,
                activity,
            } => {
                let mut source = GenericSource::new(particle).with_energy(energy.resolve(&context)?);
                let shape = match position {
                    Some(p) => p.resolve(&context)?,
                    None => PositionShape::Point,
                };
                let centre = match translation {
                    Some(t) => vector(t, Dimension::Length, &context)?,
                    None => [0.0; 3],
                };
                source = source.with_position(shape, centre);
                if let Some(direction) = direction {
                    source = source.with_direction(direction.resolve(&context)?);
                }
                source = match (n, activity) {
                    (Some(n), None) => source.with_primaries(*n),
                    (None, Some(a)) => {
                        source.with_activity(quantity(a, Dimension::Activity, &context)?)
                    }
                    _ => {
                        return Err(SceneError::Invalid {
                            context,
                            reason: "exactly one of 'n' or 'activity' must be given".to_string(),
                        });
                    }
                };
                SourceConfig::Generic(source)
            }
            SourceKindSpec::Voxelized {
                image,
                particle,
                energy,
                activity,
            } => SourceConfig::Voxelized {
                image: self.resolve_path(image),
                particle: particle.clone(),
                energy: energy.resolve(&context)?,
                activity: quantity(activity, Dimension::Activity, &context)?,
            },
        };
        simulation.add_source(config, &spec.name, Targets(spec.targets.clone()))?;
        Ok(())
    }
}

fn quantity(value: &QuantityValue, dimension: Dimension, context: &str) -> Result<f64, SceneError> {
    value.resolve(dimension).map_err(|source| SceneError::Unit {
        context: context.to_string(),
        source,
    })
}

fn optional_quantity(
    value: Option<&QuantityValue>,
    dimension: Dimension,
    context: &str,
) -> Result<Option<f64>, SceneError> {
    value.map(|v| quantity(v, dimension, context)).transpose()
}

fn vector(
    values: &[QuantityValue; 3],
    dimension: Dimension,
    context: &str,
) -> Result<[f64; 3], SceneError> {
    Ok([
        quantity(&values[0], dimension, context)?,
        quantity(&values[1], dimension, context)?,
        quantity(&values[2], dimension, context)?,
    ])
}

fn apply_world(simulation: &mut Simulation, spec: &WorldSpec) -> Result<(), SceneError> {
    let size = spec
        .size
        .as_ref()
        .map(|s| vector(s, Dimension::Length, "world size"))
        .transpose()?;
    let world = simulation.world_mut();
    if let Some(size) = size {
        world.set_shape(Shape::cuboid(size));
    }
    if let Some(material) = &spec.material {
        world.set_material(material.as_str());
    }
    Ok(())
}

fn apply_volume(simulation: &mut Simulation, spec: &VolumeSpec) -> Result<(), SceneError> {
    let context = format!("volume '{}'", spec.name);
    let shape = spec.shape.resolve(&context)?;
    let translation = spec
        .translation
        .as_ref()
        .map(|t| vector(t, Dimension::Length, &context))
        .transpose()?;
    let rotation = match &spec.rotation {
        Some(r) => {
            let angles = r
                .angles
                .iter()
                .map(|a| quantity(a, Dimension::Angle, &context))
                .collect::<Result<Vec<_>, _>>()?;
            Some(
                euler_rotation(&r.sequence, &angles).map_err(|source| SceneError::Transform {
                    volume: spec.name.clone(),
                    source,
                })?,
            )
        }
        None => None,
    };

    let volume = simulation.add_volume(shape.kind(), &spec.name)?;
    volume.set_shape(shape);
    volume.set_mother(spec.mother.as_deref().unwrap_or(WORLD));
    if let Some(material) = &spec.material {
        volume.set_material(material.as_str());
    }
    if let Some(t) = translation {
        volume.set_translation(t);
    }
    if let Some(r) = rotation {
        volume.set_rotation(r);
    }
    if let Some(color) = spec.color {
        volume.set_color(color);
    }
    Ok(())
}

fn apply_actor(simulation: &mut Simulation, spec: &ActorSpec) -> Result<(), SceneError> {
    let context = format!("actor '{}'", spec.name);
    let config = match &spec.kind {
        ActorKindSpec::Statistics {
            track_types,
            output,
        } => ActorConfig::Statistics {
            track_types: *track_types,
            output: output.clone(),
        },
        ActorKindSpec::PhaseSpace { attributes, output } => ActorConfig::PhaseSpace {
            attributes: attributes.clone(),
            output: output.clone(),
        },
        ActorKindSpec::Hits { attributes, output } => ActorConfig::Hits {
            attributes: attributes.clone(),
            output: output.clone(),
        },
        ActorKindSpec::Kill => ActorConfig::Kill,
        ActorKindSpec::Projection {
            size,
            spacing,
            output,
            detector_distance,
        } => ActorConfig::Projection {
            size: *size,
            spacing: [
                quantity(&spacing[0], Dimension::Length, &context)?,
                quantity(&spacing[1], Dimension::Length, &context)?,
            ],
            output: output.clone(),
            detector_distance: quantity(detector_distance, Dimension::Length, &context)?,
        },
    };
    simulation.add_actor(config, &spec.name, Targets(spec.targets.clone()))?;
    Ok(())
}

fn apply_region(simulation: &mut Simulation, spec: &RegionSpec) -> Result<(), SceneError> {
    let context = format!("region '{}'", spec.name);
    let config = RegionConfig {
        production_cut: optional_quantity(
            spec.production_cut.as_ref(),
            Dimension::Length,
            &context,
        )?,
        brem_splitting: spec.brem_splitting,
    };
    simulation.add_region(config, &spec.name, Targets(spec.targets.clone()))?;
    Ok(())
}

fn world_targets() -> Vec<String> {
    vec![WORLD.to_string()]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct SceneDescription {
    material_database: Option<PathBuf>,
    #[serde(default)]
    simulation: SimulationSpec,
    world: Option<WorldSpec>,
    #[serde(default)]
    material: Vec<MaterialSpec>,
    #[serde(default)]
    volume: Vec<VolumeSpec>,
    #[serde(default)]
    source: Vec<SourceSpec>,
    #[serde(default)]
    actor: Vec<ActorSpec>,
    #[serde(default)]
    region: Vec<RegionSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct SimulationSpec {
    threads: Option<usize>,
    seed: Option<u64>,
    check_overlaps: Option<bool>,
    overlap_tolerance: Option<QuantityValue>,
    output_dir: Option<PathBuf>,
    run_duration: Option<QuantityValue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct WorldSpec {
    size: Option<[QuantityValue; 3]>,
    material: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct MaterialSpec {
    name: String,
    density: QuantityValue,
    elements: Vec<String>,
    counts: Option<Vec<u32>>,
    fractions: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct VolumeSpec {
    name: String,
    mother: Option<String>,
    material: Option<String>,
    translation: Option<[QuantityValue; 3]>,
    rotation: Option<RotationSpec>,
    color: Option<[f64; 4]>,
    shape: ShapeSpec,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RotationSpec {
    sequence: String,
    angles: Vec<QuantityValue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum ShapeSpec {
    Box {
        size: [QuantityValue; 3],
    },
    #[serde(alias = "tube")]
    Tubs {
        rmin: Option<QuantityValue>,
        rmax: QuantityValue,
        dz: QuantityValue,
        sphi: Option<QuantityValue>,
        dphi: Option<QuantityValue>,
    },
    #[serde(alias = "cone")]
    Cons {
        rmin1: Option<QuantityValue>,
        rmax1: QuantityValue,
        rmin2: Option<QuantityValue>,
        rmax2: QuantityValue,
        dz: QuantityValue,
        sphi: Option<QuantityValue>,
        dphi: Option<QuantityValue>,
    },
    Sphere {
        rmin: Option<QuantityValue>,
        rmax: QuantityValue,
    },
}

impl ShapeSpec {
    fn resolve(&self, context: &str) -> Result<Shape, SceneError> {
        let length = |v: &QuantityValue| quantity(v, Dimension::Length, context);
        let opt_length = |v: &Option<QuantityValue>| optional_quantity(v.as_ref(), Dimension::Length, context);
        let opt_angle = |v: &Option<QuantityValue>| optional_quantity(v.as_ref(), Dimension::Angle, context);
        Ok(match self {
            ShapeSpec::Box { size } => Shape::cuboid(vector(size, Dimension::Length, context)?),
            ShapeSpec::Tubs {
                rmin,
                rmax,
                dz,
                sphi,
                dphi,
            } => {
                let defaults = TubsParams::default();
                Shape::Tubs(TubsParams {
                    rmin: opt_length(rmin)?.unwrap_or(defaults.rmin),
                    rmax: Some(length(rmax)?),
                    dz: Some(length(dz)?),
                    sphi: opt_angle(sphi)?.unwrap_or(defaults.sphi),
                    dphi: opt_angle(dphi)?.unwrap_or(defaults.dphi),
                })
            }
            ShapeSpec::Cons {
                rmin1,
                rmax1,
                rmin2,
                rmax2,
                dz,
                sphi,
                dphi,
            } => {
                let defaults = ConsParams::default();
                Shape::Cons(ConsParams {
                    rmin1: opt_length(rmin1)?.unwrap_or(defaults.rmin1),
                    rmax1: Some(length(rmax1)?),
                    rmin2: opt_length(rmin2)?.unwrap_or(defaults.rmin2),
                    rmax2: Some(length(rmax2)?),
                    dz: Some(length(dz)?),
                    sphi: opt_angle(sphi)?.unwrap_or(defaults.sphi),
                    dphi: opt_angle(dphi)?.unwrap_or(defaults.dphi),
                })
            }
            ShapeSpec::Sphere { rmin, rmax } => Shape::Sphere(SphereParams {
                rmin: opt_length(rmin)?.unwrap_or(0.0),
                rmax: Some(length(rmax)?),
            }),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SourceSpec {
    name: String,
    #[serde(default = "world_targets")]
    targets: Vec<String>,
    #[serde(flatten)]
    kind: SourceKindSpec,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "kebab-case")]
enum SourceKindSpec {
    Generic {
        particle: String,
        energy: EnergySpec,
        position: Option<PositionSpec>,
        translation: Option<[QuantityValue; 3]>,
        direction: Option<DirectionSpec>,
        n: Option<u64>,
        activity: Option<QuantityValue>,
    },
    Voxelized {
        image: PathBuf,
        particle: String,
        energy: EnergySpec,
        activity: QuantityValue,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum EnergySpec {
    Mono {
        energy: QuantityValue,
    },
    Gauss {
        mean: QuantityValue,
        sigma: QuantityValue,
    },
    Range {
        min: QuantityValue,
        max: QuantityValue,
    },
}

impl EnergySpec {
    fn resolve(&self, context: &str) -> Result<EnergySpectrum, SceneError> {
        let energy = |v: &QuantityValue| quantity(v, Dimension::Energy, context);
        Ok(match self {
            EnergySpec::Mono { energy: e } => EnergySpectrum::Mono(energy(e)?),
            EnergySpec::Gauss { mean, sigma } => EnergySpectrum::Gauss {
                mean: energy(mean)?,
                sigma: energy(sigma)?,
            },
            EnergySpec::Range { min, max } => EnergySpectrum::Range {
                min: energy(min)?,
                max: energy(max)?,
            },
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum PositionSpec {
    Point,
    Disc { radius: QuantityValue },
    Box { size: [QuantityValue; 3] },
    Sphere { radius: QuantityValue },
}

impl PositionSpec {
    fn resolve(&self, context: &str) -> Result<PositionShape, SceneError> {
        Ok(match self {
            PositionSpec::Point => PositionShape::Point,
            PositionSpec::Disc { radius } => PositionShape::Disc {
                radius: quantity(radius, Dimension::Length, context)?,
            },
            PositionSpec::Box { size } => PositionShape::Box {
                size: Vector3::from(vector(size, Dimension::Length, context)?),
            },
            PositionSpec::Sphere { radius } => PositionShape::Sphere {
                radius: quantity(radius, Dimension::Length, context)?,
            },
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum DirectionSpec {
    Iso,
    Momentum { vector: [f64; 3] },
    Focused { point: [QuantityValue; 3] },
}

impl DirectionSpec {
    fn resolve(&self, context: &str) -> Result<Direction, SceneError> {
        Ok(match self {
            DirectionSpec::Iso => Direction::Iso,
            DirectionSpec::Momentum { vector } => Direction::Momentum(Vector3::from(*vector)),
            DirectionSpec::Focused { point } => {
                Direction::Focused(Vector3::from(vector(point, Dimension::Length, context)?))
            }
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ActorSpec {
    name: String,
    #[serde(default = "world_targets")]
    targets: Vec<String>,
    #[serde(flatten)]
    kind: ActorKindSpec,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "kebab-case")]
enum ActorKindSpec {
    Statistics {
        #[serde(default)]
        track_types: bool,
        output: Option<PathBuf>,
    },
    PhaseSpace {
        attributes: Vec<String>,
        output: PathBuf,
    },
    Hits {
        attributes: Vec<String>,
        output: PathBuf,
    },
    Kill,
    Projection {
        size: [usize; 2],
        spacing: [QuantityValue; 2],
        output: PathBuf,
        detector_distance: QuantityValue,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RegionSpec {
    name: String,
    #[serde(default = "world_targets")]
    targets: Vec<String>,
    production_cut: Option<QuantityValue>,
    brem_splitting: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::volume::Solid;
    use crate::engine::progress::ProgressReporter;
    use crate::engine::transport::StubEngine;
    use std::fs;

    const BOX_SCENE: &str = r#"
        [simulation]
        seed = 7
        output-dir = "out"

        [world]
        size = ["1 m", "1 m", "1 m"]

        [[volume]]
        name = "Box"
        material = "G4_WATER"
        translation = [0, 0, "-5 cm"]
        shape = { type = "box", size = ["1 cm", "1 cm", "1 cm"] }

        [[source]]
        name = "source"
        type = "generic"
        particle = "gamma"
        energy = { type = "mono", energy = "140 keV" }
        n = 1200

        [[actor]]
        name = "stats"
        type = "statistics"
        track-types = true
        output = "stats.txt"
    "#;

    #[test]
    fn box_scene_runs_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let scene = Scene::parse(BOX_SCENE, dir.path()).unwrap();
        let config = scene.config().unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.output_dir, dir.path().join("out"));

        let simulation = scene.build().unwrap();
        let contract = simulation.initialize().unwrap();
        let b = contract.geometry.find("Box").unwrap();
        assert!((b.world.translation.vector.z + 50.0).abs() < 1e-9);
        assert_eq!(b.solid.half_extents(), Vector3::new(5.0, 5.0, 5.0));
        assert_eq!(contract.attachments.sources[0].targets[0].name, WORLD);

        let stats = simulation
            .run(&StubEngine, &ProgressReporter::new())
            .unwrap();
        assert_eq!(stats.events(), 1200);
        assert!(dir.path().join("out/stats.txt").exists());
    }

    #[test]
    fn shapes_rotations_and_regions_are_converted() {
        let scene = Scene::parse(
            r#"
            [[volume]]
            name = "filter"
            material = "G4_Cu"
            rotation = { sequence = "x", angles = ["90 deg"] }
            shape = { type = "cone", rmax1 = "3 mm", rmax2 = "1 cm", dz = "2 mm" }

            [[region]]
            name = "target"
            targets = ["filter"]
            production-cut = "0.1 mm"
            brem-splitting = 40
            "#,
            Path::new("."),
        )
        .unwrap();
        let simulation = scene.build().unwrap();
        let filter = simulation.geometry().volume("filter").unwrap();
        assert!((filter.rotation[(2, 1)] - 1.0).abs() < 1e-9);

        let contract = simulation.initialize().unwrap();
        match &contract.geometry.find("filter").unwrap().solid {
            Solid::Cons { rmax2, .. } => assert!((rmax2 - 10.0).abs() < 1e-9),
            other => panic!("unexpected solid {other:?}"),
        }
        let region = &contract.attachments.regions[0].config;
        assert_eq!(region.brem_splitting, Some(40));
        assert!((region.production_cut.unwrap() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn wrong_dimension_is_reported_with_context() {
        let scene = Scene::parse(
            r#"
            [[volume]]
            name = "slab"
            material = "G4_Pb"
            shape = { type = "box", size = ["1 cm", "1 MeV", "1 cm"] }
            "#,
            Path::new("."),
        )
        .unwrap();
        match scene.build().unwrap_err() {
            SceneError::Unit { context, .. } => assert_eq!(context, "volume 'slab'"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn source_needs_exactly_one_emission_setting() {
        let scene = Scene::parse(
            r#"
            [[source]]
            name = "src"
            type = "generic"
            particle = "e-"
            energy = { type = "gauss", mean = "6.7 MeV", sigma = "0.077 MeV" }
            "#,
            Path::new("."),
        )
        .unwrap();
        assert!(matches!(scene.build(), Err(SceneError::Invalid { .. })));
    }

    #[test]
    fn material_database_is_resolved_against_the_scene_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("materials.toml"),
            "[[material]]\nname = \"Alloy\"\ndensity = \"18 g/cm3\"\nelements = [\"W\", \"Ni\"]\nfractions = [0.9, 0.1]\n",
        )
        .unwrap();
        let scene_path = dir.path().join("scene.toml");
        fs::write(
            &scene_path,
            "material-database = \"materials.toml\"\n\n[[material]]\nname = \"Target\"\ndensity = 19.3\nelements = [\"W\"]\ncounts = [1]\n",
        )
        .unwrap();
        let simulation = Scene::from_path(&scene_path).unwrap().build().unwrap();
        assert!(simulation.materials().contains("Alloy"));
        assert!(simulation.materials().contains("Target"));
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[[volume]]\nname = \n").unwrap();
        match Scene::from_path(&path).unwrap_err() {
            SceneError::Toml { path: p, .. } => assert!(p.ends_with("broken.toml")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
