use super::attachments::{AttachmentSet, BoundAttachments};
use super::config::SimulationConfig;
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use super::transport::TransportEngine;
use crate::core::error::ModelError;
use crate::core::geometry::tree::{GeometryTree, ResolvedTree};
use crate::core::materials::registry::MaterialRegistry;
use crate::core::models::attachment::{
    Actor, ActorConfig, Region, RegionConfig, Source, SourceConfig, Targets,
};
use crate::core::models::material::Material;
use crate::core::models::stats::RunStatistics;
use crate::core::models::volume::{ShapeKind, Volume};
use tracing::{info, instrument};

/// One simulation build: configuration, geometry, materials and attachments.
///
/// Independent `Simulation` values share nothing, so several descriptions can be built and
/// run side by side.
#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimulationConfig,
    geometry: GeometryTree,
    materials: MaterialRegistry,
    attachments: AttachmentSet,
}

/// Everything a transport engine needs to run a simulation.
#[derive(Debug, Clone)]
pub struct SimulationContract {
    pub config: SimulationConfig,
    pub geometry: ResolvedTree,
    pub attachments: BoundAttachments,
    pub materials: MaterialRegistry,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

impl Simulation {
    /// Creates a simulation with a world volume and the NIST material table.
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            geometry: GeometryTree::new(),
            materials: MaterialRegistry::with_nist(),
            attachments: AttachmentSet::new(),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SimulationConfig {
        &mut self.config
    }

    pub fn geometry(&self) -> &GeometryTree {
        &self.geometry
    }

    pub fn geometry_mut(&mut self) -> &mut GeometryTree {
        &mut self.geometry
    }

    pub fn materials(&self) -> &MaterialRegistry {
        &self.materials
    }

    pub fn materials_mut(&mut self) -> &mut MaterialRegistry {
        &mut self.materials
    }

    pub fn attachments(&self) -> &AttachmentSet {
        &self.attachments
    }

    pub fn attachments_mut(&mut self) -> &mut AttachmentSet {
        &mut self.attachments
    }

    pub fn add_volume(&mut self, kind: ShapeKind, name: &str) -> Result<&mut Volume, ModelError> {
        self.geometry.add_volume(kind, name)
    }

    pub fn volume_mut(&mut self, name: &str) -> Result<&mut Volume, ModelError> {
        self.geometry.volume_mut(name)
    }

    pub fn world_mut(&mut self) -> &mut Volume {
        self.geometry.world_mut()
    }

    pub fn add_material_by_atom_count(
        &mut self,
        name: &str,
        symbols: &[&str],
        counts: &[u32],
        density: f64,
    ) -> Result<&Material, ModelError> {
        self.materials
            .add_material_by_atom_count(name, symbols, counts, density)
    }

    pub fn add_material_by_mass_fraction(
        &mut self,
        name: &str,
        symbols: &[&str],
        fractions: &[f64],
        density: f64,
    ) -> Result<&Material, ModelError> {
        self.materials
            .add_material_by_mass_fraction(name, symbols, fractions, density)
    }

    pub fn add_source(
        &mut self,
        config: SourceConfig,
        name: &str,
        targets: impl Into<Targets>,
    ) -> Result<&mut Source, ModelError> {
        self.attachments.add_source(config, name, targets)
    }

    pub fn add_actor(
        &mut self,
        config: ActorConfig,
        name: &str,
        targets: impl Into<Targets>,
    ) -> Result<&mut Actor, ModelError> {
        self.attachments.add_actor(config, name, targets)
    }

    pub fn add_region(
        &mut self,
        config: RegionConfig,
        name: &str,
        targets: impl Into<Targets>,
    ) -> Result<&mut Region, ModelError> {
        self.attachments.add_region(config, name, targets)
    }

    /// Validates the configuration, finalizes the geometry and binds every attachment.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] for invalid run settings and [`EngineError::Model`]
    /// for any construction defect found while finalizing or resolving.
    #[instrument(skip_all, name = "simulation_initialize")]
    pub fn initialize(&self) -> Result<SimulationContract, EngineError> {
        self.config.validate()?;
        let geometry = self
            .geometry
            .finalize(&self.materials, &self.config.finalize_options())?;
        let attachments = self.attachments.resolve(&geometry)?;
        info!(
            volumes = geometry.len(),
            overlaps = geometry.overlaps().len(),
            "Simulation initialized."
        );
        Ok(SimulationContract {
            config: self.config.clone(),
            geometry,
            attachments,
            materials: self.materials.clone(),
        })
    }

    /// Initializes the simulation and runs it to completion on `engine`.
    pub fn run<E: TransportEngine>(
        &self,
        engine: &E,
        reporter: &ProgressReporter,
    ) -> Result<RunStatistics, EngineError> {
        reporter.report(Progress::PhaseStart {
            name: "Initialization",
        });
        let contract = self.initialize()?;
        reporter.report(Progress::PhaseFinish);
        engine.run(&contract, reporter)
    }
}
