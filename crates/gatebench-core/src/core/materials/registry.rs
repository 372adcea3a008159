use super::elements::element;
use crate::core::error::{EntityKind, ModelError};
use crate::core::models::material::{Composition, Material};
use crate::core::units::{Dimension, QuantityValue, UnitError};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Allowed deviation of a mass-fraction sum from one.
pub const MASS_FRACTION_SUM_TOLERANCE: f64 = 1e-3;

#[rustfmt::skip]
const NIST_BY_FRACTION: &[(&str, f64, &[(&str, f64)])] = &[
    ("G4_AIR", 0.00120479, &[("C", 0.000124), ("N", 0.755268), ("O", 0.231781), ("Ar", 0.012827)]),
    ("G4_Galactic", 1e-25, &[("H", 1.0)]),
    ("G4_LUNG_ICRP", 1.05, &[
        ("H", 0.105), ("C", 0.083), ("N", 0.023), ("O", 0.779), ("Na", 0.002),
        ("P", 0.001), ("S", 0.002), ("Cl", 0.003), ("K", 0.002),
    ]),
    ("G4_STAINLESS-STEEL", 8.0, &[("Fe", 0.7462), ("Cr", 0.1690), ("Ni", 0.0848)]),
];

#[rustfmt::skip]
const NIST_BY_COUNT: &[(&str, f64, &[(&str, u32)])] = &[
    ("G4_WATER", 1.0, &[("H", 2), ("O", 1)]),
    ("G4_Al", 2.699, &[("Al", 1)]),
    ("G4_Cu", 8.96, &[("Cu", 1)]),
    ("G4_Fe", 7.874, &[("Fe", 1)]),
    ("G4_W", 19.3, &[("W", 1)]),
    ("G4_Pb", 11.35, &[("Pb", 1)]),
    ("G4_C", 2.0, &[("C", 1)]),
    ("G4_MYLAR", 1.4, &[("H", 8), ("C", 10), ("O", 4)]),
    ("G4_SODIUM_IODIDE", 3.667, &[("Na", 1), ("I", 1)]),
    ("G4_PLASTIC_SC_VINYLTOLUENE", 1.032, &[("H", 10), ("C", 9)]),
];

/// Materials known to one simulation build, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MaterialRegistry {
    materials: HashMap<String, Material>,
}

impl MaterialRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-seeded with a small set of NIST materials
    /// (`G4_AIR`, `G4_WATER`, `G4_Galactic`, `G4_W`, `G4_Pb`, ...).
    pub fn with_nist() -> Self {
        let mut registry = Self::new();
        for (name, density, parts) in NIST_BY_FRACTION {
            let symbols: Vec<&str> = parts.iter().map(|(s, _)| *s).collect();
            let fractions: Vec<f64> = parts.iter().map(|(_, f)| *f).collect();
            if let Err(e) = registry.add_material_by_mass_fraction(name, &symbols, &fractions, *density) {
                warn!(material = *name, error = %e, "Skipped built-in material.");
            }
        }
        for (name, density, parts) in NIST_BY_COUNT {
            let symbols: Vec<&str> = parts.iter().map(|(s, _)| *s).collect();
            let counts: Vec<u32> = parts.iter().map(|(_, n)| *n).collect();
            if let Err(e) = registry.add_material_by_atom_count(name, &symbols, &counts, *density) {
                warn!(material = *name, error = %e, "Skipped built-in material.");
            }
        }
        registry
    }

    /// Registers a material from element symbols and atoms per formula unit.
    ///
    /// # Arguments
    ///
    /// * `name` - Unique material name.
    /// * `symbols` - Element symbols, e.g. `["W", "Re"]`.
    /// * `counts` - Atoms of each element; every count must be positive.
    /// * `density` - Density in g/cm³; must be positive.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DuplicateName`] if the name is taken and
    /// [`ModelError::InvalidComposition`] for a malformed composition.
    pub fn add_material_by_atom_count(
        &mut self,
        name: &str,
        symbols: &[&str],
        counts: &[u32],
        density: f64,
    ) -> Result<&Material, ModelError> {
        self.check_new(name, symbols, counts.len(), density)?;
        if let Some(i) = counts.iter().position(|&c| c == 0) {
            return Err(invalid(name, format!("atom count of '{}' is zero", symbols[i])));
        }

        let masses: Vec<f64> = symbols
            .iter()
            .zip(counts)
            .map(|(s, &c)| molar_mass(name, s).map(|m| m * c as f64))
            .collect::<Result<_, _>>()?;
        let total: f64 = masses.iter().sum();
        let mass_fractions = symbols
            .iter()
            .zip(&masses)
            .map(|(s, m)| (s.to_string(), m / total))
            .collect();

        let composition = Composition::AtomCounts(
            symbols
                .iter()
                .zip(counts)
                .map(|(s, &c)| (s.to_string(), c))
                .collect(),
        );
        Ok(self.insert(name, composition, density, mass_fractions))
    }

    /// Registers a material from element symbols and mass fractions.
    ///
    /// Fractions must be non-negative and sum to one within
    /// [`MASS_FRACTION_SUM_TOLERANCE`].
    pub fn add_material_by_mass_fraction(
        &mut self,
        name: &str,
        symbols: &[&str],
        fractions: &[f64],
        density: f64,
    ) -> Result<&Material, ModelError> {
        self.check_new(name, symbols, fractions.len(), density)?;
        for s in symbols {
            molar_mass(name, s)?;
        }
        if let Some(i) = fractions.iter().position(|f| !(*f >= 0.0)) {
            return Err(invalid(
                name,
                format!("mass fraction of '{}' is {}", symbols[i], fractions[i]),
            ));
        }
        let sum: f64 = fractions.iter().sum();
        if (sum - 1.0).abs() > MASS_FRACTION_SUM_TOLERANCE {
            return Err(invalid(
                name,
                format!(
                    "mass fractions sum to {:.6}, expected 1 within {}",
                    sum, MASS_FRACTION_SUM_TOLERANCE
                ),
            ));
        }

        let pairs: Vec<(String, f64)> = symbols
            .iter()
            .zip(fractions)
            .map(|(s, &f)| (s.to_string(), f))
            .collect();
        let mass_fractions = pairs.clone();
        Ok(self.insert(name, Composition::MassFractions(pairs), density, mass_fractions))
    }

    /// Looks up a material by name.
    pub fn resolve(&self, name: &str) -> Result<&Material, ModelError> {
        self.materials.get(name).ok_or_else(|| ModelError::NotFound {
            kind: EntityKind::Material,
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.materials.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Material names in lexicographic order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.materials.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Bulk-loads a TOML material database into this registry.
    ///
    /// ```toml
    /// [[material]]
    /// name = "Tungsten"
    /// density = "19.3 g/cm3"
    /// elements = ["W", "Re"]
    /// counts = [9, 1]
    /// ```
    ///
    /// Each entry carries either `counts` or `fractions`. Returns the number of
    /// materials added; loading stops at the first invalid entry.
    pub fn load_database(&mut self, path: &Path) -> Result<usize, MaterialDatabaseError> {
        let content = std::fs::read_to_string(path).map_err(|e| MaterialDatabaseError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        self.load_database_str(&content)
            .map_err(|e| e.with_path(path))
    }

    pub fn load_database_str(&mut self, content: &str) -> Result<usize, MaterialDatabaseError> {
        let database: MaterialDatabase =
            toml::from_str(content).map_err(|e| MaterialDatabaseError::Toml {
                path: String::new(),
                source: e,
            })?;

        let count = database.material.len();
        for entry in database.material {
            let density = entry.density.resolve(Dimension::Density).map_err(|e| {
                MaterialDatabaseError::Unit {
                    material: entry.name.clone(),
                    source: e,
                }
            })?;
            let symbols: Vec<&str> = entry.elements.iter().map(String::as_str).collect();
            match (&entry.counts, &entry.fractions) {
                (Some(counts), None) => {
                    self.add_material_by_atom_count(&entry.name, &symbols, counts, density)?;
                }
                (None, Some(fractions)) => {
                    self.add_material_by_mass_fraction(&entry.name, &symbols, fractions, density)?;
                }
                _ => {
                    return Err(invalid(
                        &entry.name,
                        "exactly one of 'counts' or 'fractions' must be given".to_string(),
                    )
                    .into());
                }
            }
        }
        Ok(count)
    }

    fn check_new(
        &self,
        name: &str,
        symbols: &[&str],
        amounts: usize,
        density: f64,
    ) -> Result<(), ModelError> {
        if self.materials.contains_key(name) {
            return Err(ModelError::DuplicateName {
                kind: EntityKind::Material,
                name: name.to_string(),
            });
        }
        if symbols.is_empty() {
            return Err(invalid(name, "no elements given".to_string()));
        }
        if symbols.len() != amounts {
            return Err(invalid(
                name,
                format!("{} elements but {} amounts", symbols.len(), amounts),
            ));
        }
        if !(density > 0.0) {
            return Err(invalid(name, format!("density must be positive, got {}", density)));
        }
        Ok(())
    }

    fn insert(
        &mut self,
        name: &str,
        composition: Composition,
        density: f64,
        mass_fractions: Vec<(String, f64)>,
    ) -> &Material {
        debug!(material = name, density, "Registered material.");
        self.materials.entry(name.to_string()).or_insert(Material {
            name: name.to_string(),
            composition,
            density,
            mass_fractions,
        })
    }
}

fn invalid(material: &str, reason: String) -> ModelError {
    ModelError::InvalidComposition {
        material: material.to_string(),
        reason,
    }
}

fn molar_mass(material: &str, symbol: &str) -> Result<f64, ModelError> {
    element(symbol)
        .map(|e| e.molar_mass)
        .ok_or_else(|| invalid(material, format!("unknown element '{}'", symbol)))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MaterialDatabase {
    #[serde(default)]
    material: Vec<MaterialEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MaterialEntry {
    name: String,
    density: QuantityValue,
    elements: Vec<String>,
    counts: Option<Vec<u32>>,
    fractions: Option<Vec<f64>>,
}

#[derive(Debug, Error)]
pub enum MaterialDatabaseError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid density for material '{material}': {source}")]
    Unit { material: String, source: UnitError },
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl MaterialDatabaseError {
    fn with_path(self, path: &Path) -> Self {
        match self {
            MaterialDatabaseError::Toml { source, .. } => MaterialDatabaseError::Toml {
                path: path.to_string_lossy().to_string(),
                source,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn atom_counts_derive_mass_fractions() {
        let mut reg = MaterialRegistry::new();
        let water = reg
            .add_material_by_atom_count("Water", &["H", "O"], &[2, 1], 1.0)
            .unwrap();
        assert!((water.mass_fraction_of("H") - 0.1119).abs() < 1e-3);
        let sum: f64 = water.mass_fractions.iter().map(|(_, f)| f).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn fractions_within_tolerance_are_accepted() {
        let mut reg = MaterialRegistry::new();
        assert!(
            reg.add_material_by_mass_fraction("A", &["C", "O"], &[0.5, 0.5004], 1.0)
                .is_ok()
        );
        assert!(
            reg.add_material_by_mass_fraction("B", &["C", "O"], &[0.5, 0.4996], 1.0)
                .is_ok()
        );
    }

    #[test]
    fn fractions_summing_to_point_nine_are_rejected() {
        let mut reg = MaterialRegistry::new();
        let err = reg
            .add_material_by_mass_fraction("Bad", &["C", "O"], &[0.4, 0.5], 1.0)
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidComposition { .. }));
        assert!(!reg.contains("Bad"));
    }

    #[test]
    fn malformed_compositions_are_rejected() {
        let mut reg = MaterialRegistry::new();
        let cases = [
            reg.add_material_by_atom_count("a", &["H", "O"], &[2], 1.0).map(|_| ()),
            reg.add_material_by_atom_count("b", &["H"], &[1], 0.0).map(|_| ()),
            reg.add_material_by_atom_count("c", &["Qq"], &[1], 1.0).map(|_| ()),
            reg.add_material_by_atom_count("d", &["H"], &[0], 1.0).map(|_| ()),
            reg.add_material_by_mass_fraction("e", &["H", "O"], &[-0.1, 1.1], 1.0).map(|_| ()),
        ];
        for result in cases {
            assert!(matches!(result, Err(ModelError::InvalidComposition { .. })));
        }
        assert!(reg.is_empty());
    }

    #[test]
    fn re_registration_is_a_duplicate() {
        let mut reg = MaterialRegistry::with_nist();
        let err = reg
            .add_material_by_atom_count("G4_WATER", &["H", "O"], &[2, 1], 1.0)
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateName { kind: EntityKind::Material, .. }));
    }

    #[test]
    fn nist_seed_contains_common_materials() {
        let reg = MaterialRegistry::with_nist();
        for name in ["G4_AIR", "G4_WATER", "G4_Galactic", "G4_W", "G4_Pb", "G4_LUNG_ICRP"] {
            assert!(reg.resolve(name).is_ok(), "{name} missing");
        }
        assert!(matches!(
            reg.resolve("Unobtainium"),
            Err(ModelError::NotFound { kind: EntityKind::Material, .. })
        ));
    }

    #[test]
    fn every_built_in_material_is_seeded() {
        let reg = MaterialRegistry::with_nist();
        let names = NIST_BY_FRACTION
            .iter()
            .map(|(name, ..)| *name)
            .chain(NIST_BY_COUNT.iter().map(|(name, ..)| *name));
        for name in names {
            assert!(reg.resolve(name).is_ok(), "{name} was not seeded");
        }
        assert_eq!(reg.len(), NIST_BY_FRACTION.len() + NIST_BY_COUNT.len());
    }

    #[test]
    fn database_file_loads_both_composition_forms() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[[material]]
name = "W_Re"
density = "19.4 g/cm3"
elements = ["W", "Re"]
counts = [9, 1]

[[material]]
name = "Steel"
density = 8.03
elements = ["Fe", "Cr", "Ni"]
fractions = [0.7, 0.2, 0.1]
"#
        )
        .unwrap();

        let mut reg = MaterialRegistry::new();
        assert_eq!(reg.load_database(file.path()).unwrap(), 2);
        assert!((reg.resolve("W_Re").unwrap().density - 19.4).abs() < 1e-9);
        assert_eq!(reg.names(), vec!["Steel", "W_Re"]);
    }

    #[test]
    fn database_entry_needs_exactly_one_amount_list() {
        let mut reg = MaterialRegistry::new();
        let err = reg
            .load_database_str("[[material]]\nname = \"X\"\ndensity = 1\nelements = [\"H\"]\n")
            .unwrap_err();
        assert!(matches!(
            err,
            MaterialDatabaseError::Model(ModelError::InvalidComposition { .. })
        ));
    }
}
