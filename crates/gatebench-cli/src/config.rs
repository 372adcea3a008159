use crate::error::{CliError, Result};
use crate::utils::parser;
use gatebench::validation::image::{Axis, ImageComparison};
use gatebench::validation::stats::StatsPolicy;
use gatebench::validation::tolerance::{HitCountTolerance, ToleranceSpec};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_STATS_TOLERANCE: f64 = 0.05;
pub const DEFAULT_HIT_COUNT_TOLERANCE: HitCountTolerance = HitCountTolerance::Percent(5.0);
pub const DEFAULT_IMAGE_TOLERANCE: f64 = 10.0;

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct PartialStatsConfig {
    actual: PathBuf,
    reference: PathBuf,
    tolerance: Option<f64>,
    exclude: Option<Vec<String>>,
    #[serde(rename = "exclude-run-dependent")]
    exclude_run_dependent: Option<bool>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum HitCountValue {
    Rows(u64),
    Text(String),
}

impl HitCountValue {
    fn parse(&self) -> Result<HitCountTolerance> {
        match self {
            HitCountValue::Rows(n) => Ok(HitCountTolerance::Absolute(*n)),
            HitCountValue::Text(s) => Ok(parser::parse_hit_count_tolerance(s)?),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct PartialHitsConfig {
    name: Option<String>,
    actual: PathBuf,
    reference: PathBuf,
    #[serde(rename = "hit-count-tolerance")]
    hit_count_tolerance: Option<HitCountValue>,
    keys: ToleranceSpec,
    artifact: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct PartialImageConfig {
    name: Option<String>,
    actual: PathBuf,
    reference: PathBuf,
    tolerance: Option<f64>,
    #[serde(rename = "ignore-value")]
    ignore_value: Option<f64>,
    axis: Option<Axis>,
    #[serde(rename = "sum-tolerance")]
    sum_tolerance: Option<f64>,
    artifact: Option<PathBuf>,
}

/// A validation plan as written in its TOML file.
///
/// ```toml
/// [stats]
/// actual = "output/stats.txt"
/// reference = "reference/stats.txt"
/// tolerance = 0.05
/// exclude = ["steps"]
///
/// [[hits]]
/// actual = "output/hits.csv"
/// reference = "reference/hits.csv"
/// hit-count-tolerance = "5%"
/// keys = [{ key = "KineticEnergy", tolerance = 0.03, mode = "absolute" }]
///
/// [[images]]
/// actual = "output/edep.mhd"
/// reference = "reference/edep.mhd"
/// ignore-value = 0.0
/// axis = "x"
/// ```
///
/// Relative paths are resolved against the plan file's directory.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialValidationPlan {
    stats: Option<PartialStatsConfig>,
    #[serde(default)]
    hits: Vec<PartialHitsConfig>,
    #[serde(default)]
    images: Vec<PartialImageConfig>,
    #[serde(skip)]
    base_dir: PathBuf,
}

/// Values set with `-S`, applied to every entry of their section.
#[derive(Debug, Default, PartialEq)]
struct Overrides {
    stats_tolerance: Option<f64>,
    stats_exclude: Option<Vec<String>>,
    hit_count_tolerance: Option<HitCountTolerance>,
    image_tolerance: Option<f64>,
    ignore_value: Option<f64>,
    axis: Option<Axis>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsJob {
    pub actual: PathBuf,
    pub reference: PathBuf,
    pub policy: StatsPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HitsJob {
    pub name: String,
    pub actual: PathBuf,
    pub reference: PathBuf,
    pub spec: ToleranceSpec,
    pub hit_count: HitCountTolerance,
    pub artifact: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageJob {
    pub name: String,
    pub actual: PathBuf,
    pub reference: PathBuf,
    pub options: ImageComparison,
}

/// A fully merged validation plan.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationPlan {
    pub stats: Option<StatsJob>,
    pub hits: Vec<HitsJob>,
    pub images: Vec<ImageJob>,
}

impl ValidationPlan {
    pub fn len(&self) -> usize {
        usize::from(self.stats.is_some()) + self.hits.len() + self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn invalid_value(key: &str, value: &str, expected: &str) -> CliError {
    CliError::Config(format!("Invalid {expected} value for {key}: {value}"))
}

impl PartialValidationPlan {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Loading validation plan.");
        let content = std::fs::read_to_string(path)?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_str_in(&content, base_dir).map_err(|e| match e {
            CliError::Config(reason) => CliError::FileParsing {
                path: path.to_path_buf(),
                source: anyhow::anyhow!(reason),
            },
            other => other,
        })
    }

    fn from_str_in(content: &str, base_dir: PathBuf) -> Result<Self> {
        let mut plan: Self = toml::from_str(content).map_err(|e| CliError::Config(e.to_string()))?;
        plan.base_dir = base_dir;
        Ok(plan)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Merges `-S` overrides, the plan file and the defaults, in that order of precedence.
    pub fn merge_with_cli(self, set_values: &[String]) -> Result<ValidationPlan> {
        let overrides = Self::parse_set_values(set_values)?;

        let stats = self.stats.as_ref().map(|s| {
            let tolerance = overrides
                .stats_tolerance
                .or(s.tolerance)
                .unwrap_or(DEFAULT_STATS_TOLERANCE);
            let mut policy = StatsPolicy::new(tolerance);
            let excluded = overrides.stats_exclude.as_ref().or(s.exclude.as_ref());
            for key in excluded.into_iter().flatten() {
                policy = policy.exclude(key);
            }
            if s.exclude_run_dependent.unwrap_or(false) {
                policy = policy.excluding_run_dependent();
            }
            StatsJob {
                actual: self.resolve(&s.actual),
                reference: self.resolve(&s.reference),
                policy,
            }
        });

        let hits = self
            .hits
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let file_value = h.hit_count_tolerance.as_ref().map(HitCountValue::parse).transpose()?;
                Ok(HitsJob {
                    name: h.name.clone().unwrap_or_else(|| format!("hits[{i}]")),
                    actual: self.resolve(&h.actual),
                    reference: self.resolve(&h.reference),
                    spec: h.keys.clone(),
                    hit_count: overrides
                        .hit_count_tolerance
                        .or(file_value)
                        .unwrap_or(DEFAULT_HIT_COUNT_TOLERANCE),
                    artifact: h.artifact.as_deref().map(|p| self.resolve(p)),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let images = self
            .images
            .iter()
            .enumerate()
            .map(|(i, img)| {
                let tolerance = overrides
                    .image_tolerance
                    .or(img.tolerance)
                    .unwrap_or(DEFAULT_IMAGE_TOLERANCE);
                let options = ImageComparison {
                    tolerance,
                    ignore_value: overrides.ignore_value.or(img.ignore_value),
                    axis: overrides.axis.or(img.axis),
                    sum_tolerance: img.sum_tolerance,
                    artifact: img.artifact.as_deref().map(|p| self.resolve(p)),
                };
                ImageJob {
                    name: img.name.clone().unwrap_or_else(|| format!("images[{i}]")),
                    actual: self.resolve(&img.actual),
                    reference: self.resolve(&img.reference),
                    options,
                }
            })
            .collect();

        Ok(ValidationPlan { stats, hits, images })
    }

    fn parse_set_values(set_values: &[String]) -> Result<Overrides> {
        let mut overrides = Overrides::default();
        for kv in set_values {
            let (key, value) = parser::parse_override(kv)?;
            debug!(key, value, "Applying plan override.");
            match key {
                "stats.tolerance" => {
                    overrides.stats_tolerance =
                        Some(value.parse().map_err(|_| invalid_value(key, value, "float"))?);
                }
                "stats.exclude" => {
                    overrides.stats_exclude = Some(
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(str::to_string)
                            .collect(),
                    );
                }
                "hits.hit-count-tolerance" => {
                    overrides.hit_count_tolerance = Some(parser::parse_hit_count_tolerance(value)?);
                }
                "images.tolerance" => {
                    overrides.image_tolerance =
                        Some(value.parse().map_err(|_| invalid_value(key, value, "float"))?);
                }
                "images.ignore-value" => {
                    overrides.ignore_value =
                        Some(value.parse().map_err(|_| invalid_value(key, value, "float"))?);
                }
                "images.axis" => {
                    overrides.axis = Some(
                        value
                            .parse()
                            .map_err(|_| invalid_value(key, value, "axis (x, y or z)"))?,
                    );
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{key}'"
                    )));
                }
            }
        }
        Ok(overrides)
    }
}
