use nalgebra::Vector3;
use phf::{Set, phf_set};
use std::path::PathBuf;

/// Per-step attributes that phase-space and hits actors can record.
#[rustfmt::skip]
pub static ACTOR_ATTRIBUTES: Set<&'static str> = phf_set! {
    "KineticEnergy", "TotalEnergyDeposit", "Weight",
    "PrePosition", "PrePositionLocal", "PostPosition", "PostPositionLocal",
    "PreDirection", "PreDirectionLocal", "PostDirection", "PostDirectionLocal",
    "GlobalTime", "LocalTime",
    "PDGCode", "ParticleName", "TrackID", "ParentID", "EventID", "RunID", "ThreadID",
    "TrackCreatorProcess", "ProcessDefinedStep",
    "PreStepUniqueVolumeID", "PostStepUniqueVolumeID",
    "EventPosition", "EventDirection", "EventKineticEnergy",
    "TrackVertexKineticEnergy", "TrackVertexPosition",
};

pub fn is_known_attribute(name: &str) -> bool {
    ACTOR_ATTRIBUTES.contains(name)
}

/// One or more volume names an attachment is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Targets(pub Vec<String>);

impl Targets {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Targets {
    fn from(name: &str) -> Self {
        Targets(vec![name.to_string()])
    }
}

impl From<String> for Targets {
    fn from(name: String) -> Self {
        Targets(vec![name])
    }
}

impl From<Vec<String>> for Targets {
    fn from(names: Vec<String>) -> Self {
        Targets(names)
    }
}

impl<const N: usize> From<[&str; N]> for Targets {
    fn from(names: [&str; N]) -> Self {
        Targets(names.iter().map(|s| s.to_string()).collect())
    }
}

/// A named configuration bound to one or more volumes.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment<C> {
    pub name: String,
    pub targets: Targets,
    pub config: C,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnergySpectrum {
    Mono(f64),
    Gauss { mean: f64, sigma: f64 },
    Range { min: f64, max: f64 },
}

impl EnergySpectrum {
    pub fn mean(&self) -> f64 {
        match *self {
            EnergySpectrum::Mono(e) => e,
            EnergySpectrum::Gauss { mean, .. } => mean,
            EnergySpectrum::Range { min, max } => 0.5 * (min + max),
        }
    }
}

/// Emission region of a generic source, centred on its translation.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionShape {
    Point,
    Disc { radius: f64 },
    Box { size: Vector3<f64> },
    Sphere { radius: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Direction {
    Iso,
    Momentum(Vector3<f64>),
    Focused(Vector3<f64>),
}

/// Number of primaries a source emits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Emission {
    /// Fixed primary count.
    Primaries(u64),
    /// Activity in Bq; the primary count follows from the run duration.
    Activity(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenericSource {
    pub particle: String,
    pub energy: EnergySpectrum,
    pub position: PositionShape,
    pub translation: Vector3<f64>,
    pub direction: Direction,
    pub emission: Emission,
}

impl GenericSource {
    pub fn new(particle: &str) -> Self {
        Self {
            particle: particle.to_string(),
            energy: EnergySpectrum::Mono(1.0),
            position: PositionShape::Point,
            translation: Vector3::zeros(),
            direction: Direction::Iso,
            emission: Emission::Primaries(0),
        }
    }

    pub fn with_energy(mut self, energy: EnergySpectrum) -> Self {
        self.energy = energy;
        self
    }

    pub fn with_position(mut self, position: PositionShape, translation: [f64; 3]) -> Self {
        self.position = position;
        self.translation = Vector3::from(translation);
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_primaries(mut self, n: u64) -> Self {
        self.emission = Emission::Primaries(n);
        self
    }

    pub fn with_activity(mut self, activity: f64) -> Self {
        self.emission = Emission::Activity(activity);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceConfig {
    Generic(GenericSource),
    /// Activity distribution read from an image aligned with the target volume.
    Voxelized {
        image: PathBuf,
        particle: String,
        energy: EnergySpectrum,
        activity: f64,
    },
}

impl SourceConfig {
    pub fn particle(&self) -> &str {
        match self {
            SourceConfig::Generic(g) => &g.particle,
            SourceConfig::Voxelized { particle, .. } => particle,
        }
    }

    pub fn emission(&self) -> Emission {
        match self {
            SourceConfig::Generic(g) => g.emission,
            SourceConfig::Voxelized { activity, .. } => Emission::Activity(*activity),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActorConfig {
    Statistics {
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
    /// Kills every particle entering the target volumes.
    Kill,
    Projection {
        size: [usize; 2],
        spacing: [f64; 2],
        output: PathBuf,
        detector_distance: f64,
    },
}

impl ActorConfig {
    pub fn statistics() -> Self {
        ActorConfig::Statistics {
            track_types: false,
            output: None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ActorConfig::Statistics { .. } => "Statistics",
            ActorConfig::PhaseSpace { .. } => "PhaseSpace",
            ActorConfig::Hits { .. } => "Hits",
            ActorConfig::Kill => "Kill",
            ActorConfig::Projection { .. } => "Projection",
        }
    }

    pub fn attributes(&self) -> &[String] {
        match self {
            ActorConfig::PhaseSpace { attributes, .. } | ActorConfig::Hits { attributes, .. } => {
                attributes
            }
            _ => &[],
        }
    }

    pub fn output(&self) -> Option<&PathBuf> {
        match self {
            ActorConfig::Statistics { output, .. } => output.as_ref(),
            ActorConfig::PhaseSpace { output, .. }
            | ActorConfig::Hits { output, .. }
            | ActorConfig::Projection { output, .. } => Some(output),
            ActorConfig::Kill => None,
        }
    }
}

/// Per-region physics policy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionConfig {
    /// Production cut in mm applied to all particles.
    pub production_cut: Option<f64>,
    /// Bremsstrahlung splitting factor; 1 means no splitting.
    pub brem_splitting: Option<u32>,
}

pub type Source = Attachment<SourceConfig>;
pub type Actor = Attachment<ActorConfig>;
pub type Region = Attachment<RegionConfig>;
