use std::fmt;
use std::path::PathBuf;

/// One compared quantity.
///
/// `actual` or `reference` is `None` when the quantity is missing on that side; such a
/// check never passes.
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub key: String,
    pub actual: Option<f64>,
    pub reference: Option<f64>,
    pub deviation: Option<f64>,
    pub tolerance: f64,
    pub passed: bool,
    pub note: Option<String>,
}

impl Check {
    /// A check that passes when `deviation <= tolerance`.
    pub fn measured(key: &str, actual: f64, reference: f64, deviation: f64, tolerance: f64) -> Self {
        Self {
            key: key.to_string(),
            actual: Some(actual),
            reference: Some(reference),
            deviation: Some(deviation),
            tolerance,
            passed: deviation <= tolerance,
            note: None,
        }
    }

    /// A failed check for a quantity that could not be measured.
    pub fn unavailable(key: &str, tolerance: f64, reason: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            actual: None,
            reference: None,
            deviation: None,
            tolerance,
            passed: false,
            note: Some(reason.into()),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

fn value(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{v:.6}"))
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:<24} actual {:>14}  reference {:>14}  deviation {:>12}  tolerance {}",
            if self.passed { " ok " } else { "FAIL" },
            self.key,
            value(self.actual),
            value(self.reference),
            value(self.deviation),
            self.tolerance,
        )?;
        if let Some(note) = &self.note {
            write!(f, "  ({note})")?;
        }
        Ok(())
    }
}

/// The outcome of one comparison: passed when every check passed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Verdict {
    pub subject: String,
    pub checks: Vec<Check>,
    /// Comparison artifact written for human inspection, if any.
    pub artifact: Option<PathBuf>,
}

impl Verdict {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            checks: Vec::new(),
            artifact: None,
        }
    }

    pub fn push(&mut self, check: Check) {
        self.checks.push(check);
    }

    /// `true` when no check failed.
    pub fn ok(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| !c.passed)
    }

    pub fn check(&self, key: &str) -> Option<&Check> {
        self.checks.iter().find(|c| c.key == key)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed = self.failures().count();
        writeln!(
            f,
            "{}: {} ({} check(s), {} failed)",
            self.subject,
            if self.ok() { "PASSED" } else { "FAILED" },
            self.checks.len(),
            failed
        )?;
        for check in &self.checks {
            writeln!(f, "  {check}")?;
        }
        if let Some(artifact) = &self.artifact {
            writeln!(f, "  artifact: {}", artifact.display())?;
        }
        Ok(())
    }
}
