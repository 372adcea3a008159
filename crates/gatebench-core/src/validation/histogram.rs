use super::error::ValidationError;
use super::tolerance::{HitCountTolerance, ToleranceEntry, ToleranceSpec};
use super::verdict::{Check, Verdict};
use crate::core::io::table::{HitTable, HitTableFile};
use crate::core::io::traits::ArtifactFile;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Key of the row-count check in a histogram verdict.
pub const HIT_COUNT_KEY: &str = "hit count";
pub const DEFAULT_BINS: usize = 100;

fn mean_and_std(values: &[f64], scale: f64) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().map(|v| v * scale).sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|v| (v * scale - mean).powi(2))
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}

fn compare_key(actual: &HitTable, reference: &HitTable, entry: &ToleranceEntry) -> Check {
    let key = entry.key.as_str();
    let (Some(a), Some(r)) = (actual.column(key), reference.column(entry.reference_key())) else {
        let side = if actual.column(key).is_none() { "actual" } else { "reference" };
        return Check::unavailable(key, entry.tolerance, format!("column missing in {side} table"));
    };
    if a.is_empty() || r.is_empty() {
        return Check::unavailable(key, entry.tolerance, "no rows to compare");
    }
    let (mean_a, std_a) = mean_and_std(a, entry.actual_scale());
    let (mean_r, std_r) = mean_and_std(r, entry.reference_scale());
    let deviation = entry.mode.deviation(mean_a, mean_r);
    Check::measured(key, mean_a, mean_r, deviation, entry.tolerance)
        .with_note(format!("std {std_a:.6} vs {std_r:.6}"))
}

/// Compares two hit tables column by column.
///
/// The row-count check is reported under [`HIT_COUNT_KEY`], separately from the per-key
/// checks. Each key compares the means of its scaled columns; missing and empty columns
/// are failed checks.
#[instrument(skip_all, name = "compare_histograms")]
pub fn compare_histograms(
    actual: &HitTable,
    reference: &HitTable,
    spec: &ToleranceSpec,
    hit_count: HitCountTolerance,
) -> Verdict {
    let mut verdict = Verdict::new("hit table");

    let rows = Check::measured(
        HIT_COUNT_KEY,
        actual.len() as f64,
        reference.len() as f64,
        hit_count.deviation(actual.len(), reference.len()),
        hit_count.limit(),
    )
    .with_note(format!("tolerance {hit_count}"));
    if !rows.passed {
        warn!(actual = actual.len(), reference = reference.len(), tolerance = %hit_count, "Hit count out of tolerance.");
    }
    verdict.push(rows);

    for entry in spec.iter() {
        let check = compare_key(actual, reference, entry);
        if check.passed {
            debug!(key = %entry.key, deviation = ?check.deviation, "Key within tolerance.");
        } else {
            warn!(key = %entry.key, deviation = ?check.deviation, tolerance = entry.tolerance, note = ?check.note, "Key out of tolerance.");
        }
        verdict.push(check);
    }
    info!(keys = spec.len(), ok = verdict.ok(), "Hit tables compared.");
    verdict
}

/// Reads two hit-table files and compares them, optionally writing a binned comparison
/// CSV to `artifact`.
pub fn compare_histogram_files(
    actual_path: &Path,
    reference_path: &Path,
    spec: &ToleranceSpec,
    hit_count: HitCountTolerance,
    artifact: Option<&Path>,
) -> Result<Verdict, ValidationError> {
    let actual = HitTableFile::read_from_path(actual_path)?;
    let reference = HitTableFile::read_from_path(reference_path)?;
    let mut verdict = compare_histograms(&actual, &reference, spec, hit_count);
    verdict.subject = format!("{} vs {}", actual_path.display(), reference_path.display());
    if let Some(path) = artifact {
        write_binned_histograms(&actual, &reference, spec, DEFAULT_BINS, path)?;
        verdict.artifact = Some(path.to_path_buf());
    }
    Ok(verdict)
}

/// Counts of `values * scale` in `bins` equal bins over `[lo, hi]`.
fn histogram(values: &[f64], scale: f64, lo: f64, width: f64, bins: usize) -> Vec<u64> {
    let mut counts = vec![0; bins];
    for v in values {
        let index = (((v * scale) - lo) / width).floor();
        let index = (index.max(0.0) as usize).min(bins - 1);
        counts[index] += 1;
    }
    counts
}

/// Writes both tables' scaled columns, binned over a common range per key, as CSV rows
/// `key,bin_low,bin_high,actual,reference`. Keys missing on either side are skipped.
pub fn write_binned_histograms(
    actual: &HitTable,
    reference: &HitTable,
    spec: &ToleranceSpec,
    bins: usize,
    path: &Path,
) -> Result<(), ValidationError> {
    if bins == 0 {
        return Err(ValidationError::InvalidOption {
            option: "bins",
            reason: "at least one bin is needed".to_string(),
        });
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["key", "bin_low", "bin_high", "actual", "reference"])?;
    for entry in spec.iter() {
        let (Some(a), Some(r)) = (actual.column(&entry.key), reference.column(entry.reference_key()))
        else {
            continue;
        };
        let scaled = a
            .iter()
            .map(|v| v * entry.actual_scale())
            .chain(r.iter().map(|v| v * entry.reference_scale()));
        let (mut lo, mut hi) = scaled.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        if !lo.is_finite() {
            continue;
        }
        if hi <= lo {
            lo -= 0.5;
            hi += 0.5;
        }
        let width = (hi - lo) / bins as f64;
        let counts_a = histogram(a, entry.actual_scale(), lo, width, bins);
        let counts_r = histogram(r, entry.reference_scale(), lo, width, bins);
        for i in 0..bins {
            let low = lo + i as f64 * width;
            writer.write_record([
                entry.key.clone(),
                low.to_string(),
                (low + width).to_string(),
                counts_a[i].to_string(),
                counts_r[i].to_string(),
            ])?;
        }
    }
    writer.flush().map_err(|source| ValidationError::Artifact {
        path: path.display().to_string(),
        source,
    })?;
    debug!(path = %path.display(), "Wrote binned histograms.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::tolerance::ToleranceMode;

    fn table(columns: &[&str], rows: &[Vec<f64>]) -> HitTable {
        let mut table = HitTable::new(columns.iter().copied());
        for row in rows {
            table.push_row(row).unwrap();
        }
        table
    }

    fn energies(n: usize, offset: f64) -> HitTable {
        let rows: Vec<Vec<f64>> = (0..n)
            .map(|i| vec![1.0 + offset + 0.01 * (i % 10) as f64, 1e9 * (i as f64)])
            .collect();
        table(&["KineticEnergy", "GlobalTime"], &rows)
    }

    #[test]
    fn identical_tables_pass() {
        let t = energies(100, 0.0);
        let spec = ToleranceSpec::new(vec![ToleranceEntry::absolute("KineticEnergy", 0.0)]);
        let verdict = compare_histograms(&t, &t, &spec, HitCountTolerance::Absolute(0));
        assert!(verdict.ok());
        assert_eq!(verdict.checks.len(), 2);
    }

    #[test]
    fn hit_count_failure_is_reported_separately() {
        let actual = energies(90, 0.0);
        let reference = energies(100, 0.0);
        let spec = ToleranceSpec::new(vec![ToleranceEntry::absolute("KineticEnergy", 0.03)]);
        let verdict = compare_histograms(&actual, &reference, &spec, HitCountTolerance::Percent(5.0));
        assert!(!verdict.ok());
        let rows = verdict.check(HIT_COUNT_KEY).unwrap();
        assert!(!rows.passed);
        assert!((rows.deviation.unwrap() - 10.0).abs() < 1e-9);
        assert!(verdict.check("KineticEnergy").unwrap().passed);

        let verdict = compare_histograms(&actual, &reference, &spec, HitCountTolerance::Percent(10.0));
        assert!(verdict.ok());
    }

    #[test]
    fn shifted_means_fail_only_their_key() {
        let actual = energies(100, 0.1);
        let reference = energies(100, 0.0);
        let spec = ToleranceSpec::from_lists(
            &["KineticEnergy", "GlobalTime"],
            &[0.03, 0.04],
            &[1.0, 1e-9],
            ToleranceMode::Absolute,
        );
        let verdict = compare_histograms(&actual, &reference, &spec, HitCountTolerance::Absolute(0));
        let failed: Vec<_> = verdict.failures().map(|c| c.key.as_str()).collect();
        assert_eq!(failed, ["KineticEnergy"]);
        let check = verdict.check("KineticEnergy").unwrap();
        assert!((check.deviation.unwrap() - 0.1).abs() < 1e-9);
        let time = verdict.check("GlobalTime").unwrap();
        assert!((time.actual.unwrap() - 49.5).abs() < 1e-9);
    }

    #[test]
    fn missing_and_empty_columns_fail_without_panicking() {
        let actual = energies(10, 0.0);
        let reference = table(&["KineticEnergy", "Weight"], &[]);
        let spec = ToleranceSpec::new(vec![
            ToleranceEntry::relative("KineticEnergy", 0.1),
            ToleranceEntry::relative("Weight", 0.1),
        ]);
        let verdict = compare_histograms(&actual, &reference, &spec, HitCountTolerance::Percent(100.0));
        let energy = verdict.check("KineticEnergy").unwrap();
        assert!(!energy.passed);
        assert_eq!(energy.note.as_deref(), Some("no rows to compare"));
        let weight = verdict.check("Weight").unwrap();
        assert_eq!(weight.note.as_deref(), Some("column missing in actual table"));
    }

    #[test]
    fn reference_key_can_differ() {
        let actual = table(&["Ekine"], &[vec![2.0], vec![4.0]]);
        let reference = table(&["KineticEnergy"], &[vec![3.0]]);
        let spec = ToleranceSpec::new(vec![ToleranceEntry::relative("Ekine", 0.01).against("KineticEnergy")]);
        let verdict = compare_histograms(&actual, &reference, &spec, HitCountTolerance::Absolute(1));
        assert!(verdict.ok());
    }

    #[test]
    fn files_are_compared_and_binned() {
        let dir = tempfile::tempdir().unwrap();
        let actual_path = dir.path().join("actual.csv");
        let reference_path = dir.path().join("reference.csv");
        HitTableFile::write_to_path(&energies(50, 0.0), &actual_path).unwrap();
        HitTableFile::write_to_path(&energies(50, 0.0), &reference_path).unwrap();

        let artifact = dir.path().join("histograms.csv");
        let spec = ToleranceSpec::new(vec![ToleranceEntry::absolute("KineticEnergy", 0.01)]);
        let verdict = compare_histogram_files(
            &actual_path,
            &reference_path,
            &spec,
            HitCountTolerance::Percent(1.0),
            Some(&artifact),
        )
        .unwrap();
        assert!(verdict.ok());
        assert_eq!(verdict.artifact.as_deref(), Some(artifact.as_path()));

        let mut reader = csv::Reader::from_path(&artifact).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), DEFAULT_BINS);
        let total: u64 = rows.iter().map(|r| r[3].parse::<u64>().unwrap()).sum();
        assert_eq!(total, 50);
    }
}
