//! Symbolic physical units resolved to the canonical numeric scale.
//!
//! Canonical units: length in millimetres, angle in radians, energy in MeV, time in
//! seconds, activity in becquerels and density in g/cm³. Every numeric quantity stored in
//! a simulation description is expressed in these units.

use phf::{Map, phf_map};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const NM: f64 = 1e-6;
pub const UM: f64 = 1e-3;
pub const MM: f64 = 1.0;
pub const CM: f64 = 10.0;
pub const M: f64 = 1000.0;

pub const RAD: f64 = 1.0;
pub const MRAD: f64 = 1e-3;
pub const DEG: f64 = std::f64::consts::PI / 180.0;

pub const EV: f64 = 1e-6;
pub const KEV: f64 = 1e-3;
pub const MEV: f64 = 1.0;
pub const GEV: f64 = 1e3;

pub const NS: f64 = 1e-9;
pub const US: f64 = 1e-6;
pub const MS: f64 = 1e-3;
pub const S: f64 = 1.0;

pub const BQ: f64 = 1.0;
pub const KBQ: f64 = 1e3;
pub const MBQ: f64 = 1e6;

pub const G_CM3: f64 = 1.0;
pub const MG_CM3: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Length,
    Angle,
    Energy,
    Time,
    Activity,
    Density,
    Dimensionless,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dimension::Length => "length",
            Dimension::Angle => "angle",
            Dimension::Energy => "energy",
            Dimension::Time => "time",
            Dimension::Activity => "activity",
            Dimension::Density => "density",
            Dimension::Dimensionless => "dimensionless",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unit {
    pub dimension: Dimension,
    pub scale: f64,
}

const fn unit_of(dimension: Dimension, scale: f64) -> Unit {
    Unit { dimension, scale }
}

#[rustfmt::skip]
static UNITS: Map<&'static str, Unit> = phf_map! {
    // --- Length ---
    "nm" => unit_of(Dimension::Length, NM),
    "um" => unit_of(Dimension::Length, UM),
    "mm" => unit_of(Dimension::Length, MM),
    "cm" => unit_of(Dimension::Length, CM),
    "m"  => unit_of(Dimension::Length, M),
    "km" => unit_of(Dimension::Length, 1e6),

    // --- Angle ---
    "rad"  => unit_of(Dimension::Angle, RAD),
    "mrad" => unit_of(Dimension::Angle, MRAD),
    "deg"  => unit_of(Dimension::Angle, DEG),

    // --- Energy ---
    "eV"  => unit_of(Dimension::Energy, EV),
    "keV" => unit_of(Dimension::Energy, KEV),
    "MeV" => unit_of(Dimension::Energy, MEV),
    "GeV" => unit_of(Dimension::Energy, GEV),

    // --- Time ---
    "ns"  => unit_of(Dimension::Time, NS),
    "us"  => unit_of(Dimension::Time, US),
    "ms"  => unit_of(Dimension::Time, MS),
    "s"   => unit_of(Dimension::Time, S),
    "min" => unit_of(Dimension::Time, 60.0),
    "h"   => unit_of(Dimension::Time, 3600.0),

    // --- Activity ---
    "Bq"  => unit_of(Dimension::Activity, BQ),
    "kBq" => unit_of(Dimension::Activity, KBQ),
    "MBq" => unit_of(Dimension::Activity, MBQ),
    "GBq" => unit_of(Dimension::Activity, 1e9),
    "mCi" => unit_of(Dimension::Activity, 3.7e7),

    // --- Density ---
    "g/cm3"  => unit_of(Dimension::Density, G_CM3),
    "mg/cm3" => unit_of(Dimension::Density, MG_CM3),
    "kg/m3"  => unit_of(Dimension::Density, 1e-3),
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum UnitError {
    #[error("Unknown unit symbol '{0}'")]
    UnknownUnit(String),
    #[error("Invalid quantity '{0}': expected '<number> <unit>'")]
    InvalidQuantity(String),
    #[error("Quantity '{quantity}' has dimension {found}, expected {expected}")]
    WrongDimension {
        quantity: String,
        expected: Dimension,
        found: Dimension,
    },
}

/// Looks up a unit symbol.
pub fn unit(symbol: &str) -> Result<Unit, UnitError> {
    UNITS
        .get(symbol.trim())
        .copied()
        .ok_or_else(|| UnitError::UnknownUnit(symbol.trim().to_string()))
}

/// A numeric value already converted to the canonical scale, tagged with its dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    pub value: f64,
    pub dimension: Dimension,
}

impl Quantity {
    pub fn dimensionless(value: f64) -> Self {
        Self {
            value,
            dimension: Dimension::Dimensionless,
        }
    }

    /// Returns the canonical value if the quantity has the expected dimension.
    ///
    /// A bare number (dimensionless) is accepted for any dimension and taken to be
    /// already expressed in canonical units.
    pub fn in_dimension(&self, expected: Dimension) -> Result<f64, UnitError> {
        if self.dimension == expected || self.dimension == Dimension::Dimensionless {
            Ok(self.value)
        } else {
            Err(UnitError::WrongDimension {
                quantity: format!("{} ({})", self.value, self.dimension),
                expected,
                found: self.dimension,
            })
        }
    }
}

/// Parses strings such as `"6.7 MeV"`, `"-5 cm"`, `"1e-3*mm"` or a bare `"12.5"`.
pub fn parse_quantity(text: &str) -> Result<Quantity, UnitError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(UnitError::InvalidQuantity(text.to_string()));
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        return Ok(Quantity::dimensionless(value));
    }

    let (number, symbol) = match trimmed.split_once('*') {
        Some((number, symbol)) => (number.trim(), symbol.trim()),
        None => {
            let split_at = trimmed
                .find(|c: char| c.is_whitespace())
                .ok_or_else(|| UnitError::InvalidQuantity(text.to_string()))?;
            let (number, symbol) = trimmed.split_at(split_at);
            (number.trim(), symbol.trim())
        }
    };

    let value: f64 = number
        .parse()
        .map_err(|_| UnitError::InvalidQuantity(text.to_string()))?;
    let unit = unit(symbol)?;
    Ok(Quantity {
        value: value * unit.scale,
        dimension: unit.dimension,
    })
}

impl FromStr for Quantity {
    type Err = UnitError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_quantity(s)
    }
}

/// A quantity as written in a configuration file: a bare number or a `"<number> <unit>"`
/// string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum QuantityValue {
    Number(f64),
    Text(String),
}

impl QuantityValue {
    pub fn resolve(&self, expected: Dimension) -> Result<f64, UnitError> {
        match self {
            QuantityValue::Number(v) => Ok(*v),
            QuantityValue::Text(s) => parse_quantity(s)?.in_dimension(expected),
        }
    }
}

impl From<f64> for QuantityValue {
    fn from(v: f64) -> Self {
        QuantityValue::Number(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_lookup_returns_canonical_scale() {
        assert_eq!(unit("cm").unwrap().scale, 10.0);
        assert_eq!(unit("MeV").unwrap().dimension, Dimension::Energy);
        assert!((unit("deg").unwrap().scale * 180.0 - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn unknown_unit_is_an_error() {
        assert_eq!(unit("furlong"), Err(UnitError::UnknownUnit("furlong".into())));
    }

    #[test]
    fn parse_quantity_handles_spaced_and_multiplied_forms() {
        let q = parse_quantity("-5 cm").unwrap();
        assert_eq!(q.value, -50.0);
        assert_eq!(q.dimension, Dimension::Length);

        let q = parse_quantity("6.7*MeV").unwrap();
        assert!((q.value - 6.7).abs() < 1e-12);

        let q = parse_quantity("140 keV").unwrap();
        assert!((q.value - 0.14).abs() < 1e-12);

        let q = parse_quantity("19.4 g/cm3").unwrap();
        assert_eq!(q.dimension, Dimension::Density);
    }

    #[test]
    fn bare_numbers_are_dimensionless_and_accepted_everywhere() {
        let q = parse_quantity("12.5").unwrap();
        assert_eq!(q.in_dimension(Dimension::Length).unwrap(), 12.5);
        assert_eq!(q.in_dimension(Dimension::Energy).unwrap(), 12.5);
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let q = parse_quantity("1 MeV").unwrap();
        assert!(matches!(
            q.in_dimension(Dimension::Length),
            Err(UnitError::WrongDimension {
                expected: Dimension::Length,
                found: Dimension::Energy,
                ..
            })
        ));
    }

    #[test]
    fn malformed_quantities_are_rejected() {
        assert!(matches!(parse_quantity(""), Err(UnitError::InvalidQuantity(_))));
        assert!(matches!(parse_quantity("abc mm"), Err(UnitError::InvalidQuantity(_))));
        assert!(matches!(parse_quantity("1 parsec"), Err(UnitError::UnknownUnit(_))));
    }

    #[test]
    fn quantity_values_deserialize_from_numbers_and_strings() {
        #[derive(Deserialize)]
        struct Doc {
            a: QuantityValue,
            b: QuantityValue,
            c: QuantityValue,
        }
        let doc: Doc = toml::from_str("a = 3\nb = 2.5\nc = \"1 cm\"").unwrap();
        assert_eq!(doc.a.resolve(Dimension::Length).unwrap(), 3.0);
        assert_eq!(doc.b.resolve(Dimension::Length).unwrap(), 2.5);
        assert_eq!(doc.c.resolve(Dimension::Length).unwrap(), 10.0);
        assert!(doc.c.resolve(Dimension::Energy).is_err());
    }
}
