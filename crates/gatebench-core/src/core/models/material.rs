/// How a material's composition was declared.
#[derive(Debug, Clone, PartialEq)]
pub enum Composition {
    /// Element symbols with the number of atoms of each per formula unit.
    AtomCounts(Vec<(String, u32)>),
    /// Element symbols with their mass fraction; fractions sum to one.
    MassFractions(Vec<(String, f64)>),
}

/// A registered material.
///
/// `mass_fractions` is always populated, derived from the element molar masses when the
/// material was declared by atom count.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub composition: Composition,
    /// Density in g/cm³.
    pub density: f64,
    pub mass_fractions: Vec<(String, f64)>,
}

impl Material {
    pub fn element_symbols(&self) -> impl Iterator<Item = &str> {
        self.mass_fractions.iter().map(|(s, _)| s.as_str())
    }

    /// Mass fraction of the given element, zero if absent.
    pub fn mass_fraction_of(&self, symbol: &str) -> f64 {
        self.mass_fractions
            .iter()
            .filter(|(s, _)| s == symbol)
            .map(|(_, f)| *f)
            .sum()
    }
}
