use super::traits::ArtifactFile;
use crate::core::models::stats::{EVENTS, RUNS, RunStatistics, STEPS, TRACKS};
use std::io::{self, BufRead, Write};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsFileError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid value for '{key}' on line {line}: '{value}'")]
    InvalidValue {
        line: usize,
        key: String,
        value: String,
    },
    #[error("Stats file has no counters")]
    Empty,
}

/// Plain-text run statistics, one `# Key = value` line per entry.
///
/// ```text
/// # NumberOfRun    = 1
/// # NumberOfEvents = 5000
/// # NumberOfTracks = 42318
/// # NumberOfSteps  = 251944
/// # ElapsedTime    = 3.21
/// # Threads        = 1
/// # TrackTypes     = {'e-': 30211, 'gamma': 12107}
/// ```
///
/// Lines with other keys are ignored.
pub struct StatsFile;

const COUNTER_KEYS: &[(&str, &str)] = &[
    ("NumberOfRun", RUNS),
    ("NumberOfEvents", EVENTS),
    ("NumberOfTracks", TRACKS),
    ("NumberOfSteps", STEPS),
];

impl ArtifactFile for StatsFile {
    type Artifact = RunStatistics;
    type Error = StatsFileError;

    fn read_from(reader: &mut impl BufRead) -> Result<RunStatistics, StatsFileError> {
        let mut stats = RunStatistics::default();
        let mut seen_counter = false;

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let Some(body) = line.trim().strip_prefix('#') else {
                continue;
            };
            let Some((key, value)) = body.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            let invalid = || StatsFileError::InvalidValue {
                line: index + 1,
                key: key.to_string(),
                value: value.to_string(),
            };

            if let Some((_, counter)) = COUNTER_KEYS.iter().find(|(k, _)| *k == key) {
                stats.set(counter, parse_count(value).ok_or_else(invalid)?);
                seen_counter = true;
                continue;
            }
            match key {
                "ElapsedTime" => {
                    let secs: f64 = value.parse().map_err(|_| invalid())?;
                    stats.elapsed = Duration::try_from_secs_f64(secs).map_err(|_| invalid())?;
                }
                "Threads" => {
                    stats.threads = value.parse().map_err(|_| invalid())?;
                }
                "TrackTypes" => {
                    for (particle, count) in parse_track_types(value).ok_or_else(invalid)? {
                        stats.add_track_type(&particle, count);
                    }
                }
                _ => {}
            }
        }

        if seen_counter {
            Ok(stats)
        } else {
            Err(StatsFileError::Empty)
        }
    }

    fn write_to(stats: &RunStatistics, writer: &mut impl Write) -> Result<(), StatsFileError> {
        for (file_key, counter) in COUNTER_KEYS {
            if let Some(v) = stats.get(counter) {
                writeln!(writer, "# {:<15}= {}", file_key, v)?;
            }
        }
        writeln!(writer, "# {:<15}= {}", "ElapsedTime", stats.elapsed.as_secs_f64())?;
        writeln!(writer, "# {:<15}= {}", "Threads", stats.threads)?;

        let types: Vec<String> = stats
            .track_types()
            .map(|(p, n)| format!("'{}': {}", p, n))
            .collect();
        if !types.is_empty() {
            writeln!(writer, "# {:<15}= {{{}}}", "TrackTypes", types.join(", "))?;
        }
        Ok(())
    }
}

/// Accepts plain integers and integral floats such as `5000.0`.
fn parse_count(value: &str) -> Option<u64> {
    value.parse::<u64>().ok().or_else(|| {
        let f: f64 = value.parse().ok()?;
        (f >= 0.0 && f.fract() == 0.0).then_some(f as u64)
    })
}

/// Parses `{'gamma': 12, 'e-': 3}`; an empty `{}` yields no entries.
fn parse_track_types(value: &str) -> Option<Vec<(String, u64)>> {
    let inner = value.trim().strip_prefix('{')?.strip_suffix('}')?.trim();
    if inner.is_empty() {
        return Some(Vec::new());
    }
    inner
        .split(',')
        .map(|entry| {
            let (name, count) = entry.split_once(':')?;
            let name = name.trim().trim_matches(|c| c == '\'' || c == '"');
            Some((name.to_string(), parse_count(count.trim())?))
        })
        .collect()
}
