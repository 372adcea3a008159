use serde::Deserialize;
use std::fmt;

/// Floor of the reference magnitude in relative deviations.
pub const EPSILON: f64 = 1e-12;

/// `|actual - reference| / max(|reference|, EPSILON)`.
pub fn relative_deviation(actual: f64, reference: f64) -> f64 {
    (actual - reference).abs() / reference.abs().max(EPSILON)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToleranceMode {
    /// Tolerance is a fraction of the reference magnitude.
    #[default]
    Relative,
    /// Tolerance is in the unit of the quantity.
    Absolute,
}

impl ToleranceMode {
    pub fn deviation(self, actual: f64, reference: f64) -> f64 {
        match self {
            ToleranceMode::Relative => relative_deviation(actual, reference),
            ToleranceMode::Absolute => (actual - reference).abs(),
        }
    }
}

/// Tolerance of one compared key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ToleranceEntry {
    pub key: String,
    /// Name of the key on the reference side when it differs.
    #[serde(default)]
    pub reference_key: Option<String>,
    pub tolerance: f64,
    /// Factor applied to the actual values before comparison.
    #[serde(default)]
    pub scale: Option<f64>,
    /// Factor applied to the reference values; defaults to `scale`.
    #[serde(default)]
    pub reference_scale: Option<f64>,
    #[serde(default)]
    pub mode: ToleranceMode,
}

impl ToleranceEntry {
    pub fn relative(key: &str, tolerance: f64) -> Self {
        Self {
            key: key.to_string(),
            reference_key: None,
            tolerance,
            scale: None,
            reference_scale: None,
            mode: ToleranceMode::Relative,
        }
    }

    pub fn absolute(key: &str, tolerance: f64) -> Self {
        Self {
            mode: ToleranceMode::Absolute,
            ..Self::relative(key, tolerance)
        }
    }

    pub fn scaled(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn against(mut self, reference_key: &str) -> Self {
        self.reference_key = Some(reference_key.to_string());
        self
    }

    pub fn reference_key(&self) -> &str {
        self.reference_key.as_deref().unwrap_or(&self.key)
    }

    pub fn actual_scale(&self) -> f64 {
        self.scale.unwrap_or(1.0)
    }

    pub fn reference_scale(&self) -> f64 {
        self.reference_scale.or(self.scale).unwrap_or(1.0)
    }
}

/// Ordered tolerance entries, compared in order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ToleranceSpec {
    pub entries: Vec<ToleranceEntry>,
}

impl ToleranceSpec {
    pub fn new(entries: Vec<ToleranceEntry>) -> Self {
        Self { entries }
    }

    /// Builds entries from parallel key, tolerance and scale lists.
    ///
    /// Missing scales default to 1.
    pub fn from_lists(keys: &[&str], tolerances: &[f64], scales: &[f64], mode: ToleranceMode) -> Self {
        let entries = keys
            .iter()
            .zip(tolerances)
            .enumerate()
            .map(|(i, (key, &tolerance))| ToleranceEntry {
                scale: scales.get(i).copied(),
                mode,
                ..ToleranceEntry::relative(key, tolerance)
            })
            .collect();
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToleranceEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Allowed difference between the row counts of two hit tables.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HitCountTolerance {
    /// Maximum difference in rows.
    Absolute(u64),
    /// Maximum difference in percent of the reference row count.
    Percent(f64),
}

impl HitCountTolerance {
    /// Deviation of `actual` from `reference` in this tolerance's unit.
    pub fn deviation(self, actual: usize, reference: usize) -> f64 {
        let diff = (actual as f64 - reference as f64).abs();
        match self {
            HitCountTolerance::Absolute(_) => diff,
            HitCountTolerance::Percent(_) => 100.0 * diff / (reference as f64).max(EPSILON),
        }
    }

    pub fn limit(self) -> f64 {
        match self {
            HitCountTolerance::Absolute(n) => n as f64,
            HitCountTolerance::Percent(p) => p,
        }
    }
}

impl fmt::Display for HitCountTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HitCountTolerance::Absolute(n) => write!(f, "{n} rows"),
            HitCountTolerance::Percent(p) => write!(f, "{p}%"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_deviation_floors_the_reference() {
        assert!((relative_deviation(1010.0, 1000.0) - 0.01).abs() < 1e-12);
        assert_eq!(relative_deviation(0.0, 0.0), 0.0);
        assert!(relative_deviation(1.0, 0.0) > 1e9);
    }

    #[test]
    fn entries_from_lists_keep_order_and_scales() {
        let spec = ToleranceSpec::from_lists(
            &["GlobalTime", "PostPosition_X"],
            &[0.04, 7.0],
            &[1e-9],
            ToleranceMode::Absolute,
        );
        let keys: Vec<_> = spec.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, ["GlobalTime", "PostPosition_X"]);
        assert_eq!(spec.entries[0].actual_scale(), 1e-9);
        assert_eq!(spec.entries[1].actual_scale(), 1.0);
        assert_eq!(spec.entries[1].mode, ToleranceMode::Absolute);
    }

    #[test]
    fn reference_side_falls_back_to_actual_side() {
        let entry = ToleranceEntry::absolute("E", 0.1).scaled(2.0);
        assert_eq!(entry.reference_key(), "E");
        assert_eq!(entry.reference_scale(), 2.0);
        let entry = entry.against("Ekine");
        assert_eq!(entry.reference_key(), "Ekine");
    }

    #[test]
    fn hit_count_tolerance_units() {
        assert_eq!(HitCountTolerance::Absolute(5).deviation(95, 100), 5.0);
        assert!((HitCountTolerance::Percent(7.0).deviation(93, 100) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn entries_deserialize_with_defaults() {
        #[derive(Deserialize)]
        struct Plan {
            keys: ToleranceSpec,
        }
        let plan: Plan = toml::from_str(
            r#"
            keys = [
                { key = "KineticEnergy", tolerance = 0.03, mode = "absolute" },
                { key = "GlobalTime", tolerance = 0.04, scale = 1e-9 },
            ]
            "#,
        )
        .unwrap();
        assert_eq!(plan.keys.entries[0].mode, ToleranceMode::Absolute);
        assert_eq!(plan.keys.entries[1].mode, ToleranceMode::Relative);
        assert_eq!(plan.keys.entries[1].scale, Some(1e-9));
    }
}
