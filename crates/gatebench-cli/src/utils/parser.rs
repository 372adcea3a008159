use gatebench::validation::tolerance::{HitCountTolerance, ToleranceEntry, ToleranceMode};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid hit-count tolerance '{0}'. Expected a row count ('10') or a percentage ('5%').")]
    InvalidHitCountTolerance(String),

    #[error(
        "Invalid key specification '{0}'. Expected 'NAME:TOLERANCE' or 'NAME:TOLERANCE:SCALE' (e.g., 'GlobalTime:0.04:1e-9')."
    )]
    InvalidKeySpec(String),

    #[error("Invalid override '{0}'. Expected 'KEY=VALUE'.")]
    InvalidOverride(String),

    #[error("Component '{component}' cannot be empty in '{input}'.")]
    EmptyComponent {
        component: &'static str,
        input: String,
    },
}

/// Parses `"10"` as an absolute row count and `"5%"` as a percentage.
pub fn parse_hit_count_tolerance(input: &str) -> Result<HitCountTolerance, ParseError> {
    let trimmed = input.trim();
    let invalid = || ParseError::InvalidHitCountTolerance(input.to_string());
    match trimmed.strip_suffix('%') {
        Some(percent) => {
            let value: f64 = percent.trim().parse().map_err(|_| invalid())?;
            if !value.is_finite() || value < 0.0 {
                return Err(invalid());
            }
            Ok(HitCountTolerance::Percent(value))
        }
        None => trimmed
            .parse()
            .map(HitCountTolerance::Absolute)
            .map_err(|_| invalid()),
    }
}

/// Parses `NAME:TOLERANCE[:SCALE]` into a tolerance entry of the given mode.
pub fn parse_key_spec(input: &str, mode: ToleranceMode) -> Result<ToleranceEntry, ParseError> {
    let invalid = || ParseError::InvalidKeySpec(input.to_string());
    let mut parts = input.split(':').map(str::trim);
    let (Some(name), Some(tolerance)) = (parts.next(), parts.next()) else {
        return Err(invalid());
    };
    if name.is_empty() {
        return Err(ParseError::EmptyComponent {
            component: "name",
            input: input.to_string(),
        });
    }
    let tolerance: f64 = tolerance.parse().map_err(|_| invalid())?;
    let scale = parts
        .next()
        .map(|s| s.parse::<f64>().map_err(|_| invalid()))
        .transpose()?;
    if parts.next().is_some() {
        return Err(invalid());
    }

    let mut entry = match mode {
        ToleranceMode::Relative => ToleranceEntry::relative(name, tolerance),
        ToleranceMode::Absolute => ToleranceEntry::absolute(name, tolerance),
    };
    if let Some(scale) = scale {
        entry = entry.scaled(scale);
    }
    Ok(entry)
}

/// Splits a `-S KEY=VALUE` override.
pub fn parse_override(input: &str) -> Result<(&str, &str), ParseError> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| ParseError::InvalidOverride(input.to_string()))?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() {
        return Err(ParseError::EmptyComponent {
            component: "key",
            input: input.to_string(),
        });
    }
    Ok((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_count_tolerance_accepts_rows_and_percentages() {
        assert_eq!(parse_hit_count_tolerance("10"), Ok(HitCountTolerance::Absolute(10)));
        assert_eq!(parse_hit_count_tolerance(" 5% "), Ok(HitCountTolerance::Percent(5.0)));
        assert_eq!(parse_hit_count_tolerance("2.5 %"), Ok(HitCountTolerance::Percent(2.5)));
    }

    #[test]
    fn hit_count_tolerance_rejects_garbage() {
        for input in ["", "-3", "ten", "-1%", "%"] {
            assert_eq!(
                parse_hit_count_tolerance(input),
                Err(ParseError::InvalidHitCountTolerance(input.to_string())),
                "{input}"
            );
        }
    }

    #[test]
    fn key_spec_with_and_without_scale() {
        let entry = parse_key_spec("KineticEnergy:0.03", ToleranceMode::Absolute).unwrap();
        assert_eq!(entry, ToleranceEntry::absolute("KineticEnergy", 0.03));

        let entry = parse_key_spec("GlobalTime:0.04:1e-9", ToleranceMode::Relative).unwrap();
        assert_eq!(entry.key, "GlobalTime");
        assert_eq!(entry.actual_scale(), 1e-9);
        assert_eq!(entry.mode, ToleranceMode::Relative);
    }

    #[test]
    fn malformed_key_specs_are_rejected() {
        assert!(matches!(
            parse_key_spec("KineticEnergy", ToleranceMode::Relative),
            Err(ParseError::InvalidKeySpec(_))
        ));
        assert!(matches!(
            parse_key_spec("E:0.1:2:3", ToleranceMode::Relative),
            Err(ParseError::InvalidKeySpec(_))
        ));
        assert!(matches!(
            parse_key_spec(":0.1", ToleranceMode::Relative),
            Err(ParseError::EmptyComponent { component: "name", .. })
        ));
    }

    #[test]
    fn overrides_split_on_the_first_equals_sign() {
        assert_eq!(parse_override("stats.tolerance = 0.05"), Ok(("stats.tolerance", "0.05")));
        assert_eq!(parse_override("a=b=c"), Ok(("a", "b=c")));
        assert!(parse_override("stats.tolerance").is_err());
        assert!(parse_override("=1").is_err());
    }
}
