use crate::core::geometry::tree::FinalizeOptions;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidParameter {
        parameter: &'static str,
        reason: String,
    },
}

pub const DEFAULT_SEED: u64 = 123_456_789;
pub const DEFAULT_OVERLAP_TOLERANCE: f64 = 1e-9;

/// Run settings of one simulation build.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub threads: usize,
    pub seed: u64,
    pub check_overlaps: bool,
    /// Overlap depth in mm below which contact is tolerated.
    pub overlap_tolerance: f64,
    /// Directory that relative actor outputs are written to.
    pub output_dir: PathBuf,
    /// Duration in seconds used to turn source activities into primary counts.
    pub run_duration: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            seed: DEFAULT_SEED,
            check_overlaps: false,
            overlap_tolerance: DEFAULT_OVERLAP_TOLERANCE,
            output_dir: PathBuf::from("."),
            run_duration: 1.0,
        }
    }
}

impl SimulationConfig {
    pub fn finalize_options(&self) -> FinalizeOptions {
        FinalizeOptions {
            check_overlaps: self.check_overlaps,
            overlap_tolerance: self.overlap_tolerance,
        }
    }

    /// Resolves an actor output path against [`Self::output_dir`].
    pub fn output_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.output_dir.join(path)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "threads",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.overlap_tolerance >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                parameter: "overlap_tolerance",
                reason: format!("must be non-negative, got {}", self.overlap_tolerance),
            });
        }
        if !(self.run_duration > 0.0) {
            return Err(ConfigError::InvalidParameter {
                parameter: "run_duration",
                reason: format!("must be positive, got {}", self.run_duration),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct SimulationConfigBuilder {
    threads: Option<usize>,
    seed: Option<u64>,
    check_overlaps: Option<bool>,
    overlap_tolerance: Option<f64>,
    output_dir: Option<PathBuf>,
    run_duration: Option<f64>,
}

impl SimulationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn check_overlaps(mut self, enabled: bool) -> Self {
        self.check_overlaps = Some(enabled);
        self
    }
    pub fn overlap_tolerance(mut self, tolerance: f64) -> Self {
        self.overlap_tolerance = Some(tolerance);
        self
    }
    pub fn output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = Some(dir);
        self
    }
    pub fn run_duration(mut self, seconds: f64) -> Self {
        self.run_duration = Some(seconds);
        self
    }

    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        let defaults = SimulationConfig::default();
        let config = SimulationConfig {
            threads: self.threads.unwrap_or(defaults.threads),
            seed: self.seed.unwrap_or(defaults.seed),
            check_overlaps: self.check_overlaps.unwrap_or(defaults.check_overlaps),
            overlap_tolerance: self.overlap_tolerance.unwrap_or(defaults.overlap_tolerance),
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
            run_duration: self.run_duration.unwrap_or(defaults.run_duration),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_defaults() {
        let config = SimulationConfigBuilder::new().seed(7).build().unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.threads, 1);
        assert!(!config.check_overlaps);
    }

    #[test]
    fn builder_rejects_invalid_values() {
        let err = SimulationConfigBuilder::new().threads(0).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { parameter: "threads", .. }));

        let err = SimulationConfigBuilder::new()
            .overlap_tolerance(-1.0)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidParameter {
                parameter: "overlap_tolerance",
                ..
            }
        ));

        let err = SimulationConfigBuilder::new().run_duration(0.0).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { parameter: "run_duration", .. }));
    }

    #[test]
    fn relative_outputs_land_in_output_dir() {
        let config = SimulationConfigBuilder::new()
            .output_dir(PathBuf::from("/tmp/run"))
            .build()
            .unwrap();
        assert_eq!(config.output_path(Path::new("stats.txt")), PathBuf::from("/tmp/run/stats.txt"));
        assert_eq!(config.output_path(Path::new("/abs/x.mhd")), PathBuf::from("/abs/x.mhd"));
    }
}
