use super::error::ValidationError;
use super::tolerance::EPSILON;
use super::verdict::{Check, Verdict};
use crate::core::io::metaimage::{ElementType, MetaImageError, read_metaimage, write_metaimage};
use crate::core::models::image::Image;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl FromStr for Axis {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" => Ok(Axis::X),
            "y" => Ok(Axis::Y),
            "z" => Ok(Axis::Z),
            _ => Err(ValidationError::InvalidOption {
                option: "axis",
                reason: format!("expected one of x, y, z, got '{s}'"),
            }),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        })
    }
}

/// Settings of one image comparison. Tolerances are in percent.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageComparison {
    /// Limit of the normalized sum of absolute differences.
    pub tolerance: f64,
    /// Reference value marking voxels excluded from every metric.
    pub ignore_value: Option<f64>,
    /// Compare 1-D profiles along this axis instead of voxels.
    pub axis: Option<Axis>,
    /// Limit of the relative difference of the masked sums.
    pub sum_tolerance: Option<f64>,
    /// Where to write the profile CSV or the difference image.
    pub artifact: Option<PathBuf>,
}

impl ImageComparison {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            ignore_value: None,
            axis: None,
            sum_tolerance: None,
            artifact: None,
        }
    }

    pub fn ignoring(mut self, value: f64) -> Self {
        self.ignore_value = Some(value);
        self
    }

    pub fn along(mut self, axis: Axis) -> Self {
        self.axis = Some(axis);
        self
    }

    pub fn with_sum_tolerance(mut self, tolerance: f64) -> Self {
        self.sum_tolerance = Some(tolerance);
        self
    }

    pub fn with_artifact(mut self, path: PathBuf) -> Self {
        self.artifact = Some(path);
        self
    }
}

/// Per-sample mask: `true` where the reference value is not `ignore_value`.
pub fn reference_mask(reference: &Image, ignore_value: Option<f64>) -> Vec<bool> {
    match ignore_value {
        Some(ignore) => reference.data.iter().map(|&v| v != ignore).collect(),
        None => vec![true; reference.data.len()],
    }
}

/// Sums the unmasked samples of all other axes and channels into one bin per voxel
/// along `axis`.
pub fn axis_profile(image: &Image, mask: &[bool], axis: Axis) -> Result<Vec<f64>, ValidationError> {
    let a = axis.index();
    if a >= image.dims() {
        return Err(ValidationError::InvalidOption {
            option: "axis",
            reason: format!("axis {axis} does not exist in a {}-D image", image.dims()),
        });
    }
    let mut profile = vec![0.0; image.size[a]];
    for (i, (&v, &keep)) in image.data.iter().zip(mask).enumerate() {
        if keep {
            profile[image.coordinate(i / image.channels, a)] += v;
        }
    }
    Ok(profile)
}

fn normalized_difference(actual: &[f64], reference: &[f64]) -> f64 {
    let sad: f64 = actual.iter().zip(reference).map(|(a, r)| (a - r).abs()).sum();
    let norm: f64 = reference.iter().map(|r| r.abs()).sum();
    100.0 * sad / norm.max(EPSILON)
}

/// Compares two in-memory images.
///
/// # Errors
///
/// Returns [`ValidationError::GeometryMismatch`] when size, spacing, origin or channel
/// count differ, and [`ValidationError::InvalidOption`] for an axis the images lack.
#[instrument(skip_all, name = "compare_images")]
pub fn compare_image_data(
    actual: &Image,
    reference: &Image,
    options: &ImageComparison,
) -> Result<Verdict, ValidationError> {
    if !actual.is_consistent() || !reference.is_consistent() {
        return Err(MetaImageError::InconsistentImage.into());
    }
    if !actual.same_geometry(reference) {
        return Err(ValidationError::GeometryMismatch {
            actual: actual.geometry(),
            reference: reference.geometry(),
        });
    }

    let mask = reference_mask(reference, options.ignore_value);
    let kept = mask.iter().filter(|&&k| k).count();
    debug!(samples = mask.len(), kept, "Applied reference mask.");

    let mut verdict = Verdict::new("image");
    let (key, metric_actual, metric_reference) = match options.axis {
        Some(axis) => (
            format!("profile {axis}"),
            axis_profile(actual, &mask, axis)?,
            axis_profile(reference, &mask, axis)?,
        ),
        None => {
            let pick = |image: &Image| -> Vec<f64> {
                image
                    .data
                    .iter()
                    .zip(&mask)
                    .filter_map(|(&v, &keep)| keep.then_some(v))
                    .collect()
            };
            ("voxels".to_string(), pick(actual), pick(reference))
        }
    };
    let deviation = normalized_difference(&metric_actual, &metric_reference);
    let check = Check::measured(
        &key,
        metric_actual.iter().sum(),
        metric_reference.iter().sum(),
        deviation,
        options.tolerance,
    )
    .with_note(format!("{} bin(s), {kept} sample(s) kept", metric_actual.len()));
    if !check.passed {
        warn!(key = %key, deviation, tolerance = options.tolerance, "Image difference out of tolerance.");
    }
    verdict.push(check);

    if let Some(limit) = options.sum_tolerance {
        let masked_sum = |image: &Image| -> f64 {
            image
                .data
                .iter()
                .zip(&mask)
                .filter_map(|(&v, &keep)| keep.then_some(v))
                .sum()
        };
        let (sa, sr) = (masked_sum(actual), masked_sum(reference));
        let deviation = 100.0 * (sa - sr).abs() / sr.abs().max(EPSILON);
        verdict.push(Check::measured("sum", sa, sr, deviation, limit));
    }

    if let Some(path) = &options.artifact {
        match options.axis {
            Some(axis) => write_profiles(path, axis, &metric_actual, &metric_reference)?,
            None => write_difference(path, actual, reference, &mask)?,
        }
        verdict.artifact = Some(path.clone());
    }

    info!(ok = verdict.ok(), deviation, "Images compared.");
    Ok(verdict)
}

/// Reads two MetaImages and compares them.
pub fn compare_images(
    actual_path: &Path,
    reference_path: &Path,
    options: &ImageComparison,
) -> Result<Verdict, ValidationError> {
    let actual = read_metaimage(actual_path)?;
    let reference = read_metaimage(reference_path)?;
    let mut verdict = compare_image_data(&actual, &reference, options)?;
    verdict.subject = format!("{} vs {}", actual_path.display(), reference_path.display());
    Ok(verdict)
}

fn write_profiles(
    path: &Path,
    axis: Axis,
    actual: &[f64],
    reference: &[f64],
) -> Result<(), ValidationError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([axis.to_string(), "actual".into(), "reference".into(), "difference".into()])?;
    for (i, (a, r)) in actual.iter().zip(reference).enumerate() {
        writer.write_record([i.to_string(), a.to_string(), r.to_string(), (a - r).to_string()])?;
    }
    writer.flush().map_err(|source| ValidationError::Artifact {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}

fn write_difference(
    path: &Path,
    actual: &Image,
    reference: &Image,
    mask: &[bool],
) -> Result<(), ValidationError> {
    let mut difference = actual.clone();
    for ((d, &r), &keep) in difference.data.iter_mut().zip(&reference.data).zip(mask) {
        *d = if keep { *d - r } else { 0.0 };
    }
    write_metaimage(&difference, path, ElementType::Float)?;
    Ok(())
}
