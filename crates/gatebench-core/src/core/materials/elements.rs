use phf::{Map, phf_map};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    pub z: u32,
    /// Molar mass in g/mol.
    pub molar_mass: f64,
}

const fn el(z: u32, molar_mass: f64) -> Element {
    Element { z, molar_mass }
}

#[rustfmt::skip]
static ELEMENTS: Map<&'static str, Element> = phf_map! {
    "H"  => el(1, 1.008),    "He" => el(2, 4.0026),   "Li" => el(3, 6.94),
    "Be" => el(4, 9.0122),   "B"  => el(5, 10.81),    "C"  => el(6, 12.011),
    "N"  => el(7, 14.007),   "O"  => el(8, 15.999),   "F"  => el(9, 18.998),
    "Ne" => el(10, 20.180),  "Na" => el(11, 22.990),  "Mg" => el(12, 24.305),
    "Al" => el(13, 26.982),  "Si" => el(14, 28.085),  "P"  => el(15, 30.974),
    "S"  => el(16, 32.06),   "Cl" => el(17, 35.45),   "Ar" => el(18, 39.948),
    "K"  => el(19, 39.098),  "Ca" => el(20, 40.078),  "Ti" => el(22, 47.867),
    "Cr" => el(24, 51.996),  "Mn" => el(25, 54.938),  "Fe" => el(26, 55.845),
    "Co" => el(27, 58.933),  "Ni" => el(28, 58.693),  "Cu" => el(29, 63.546),
    "Zn" => el(30, 65.38),   "Ge" => el(32, 72.630),  "Br" => el(35, 79.904),
    "Sr" => el(38, 87.62),   "Zr" => el(40, 91.224),  "Mo" => el(42, 95.95),
    "Ag" => el(47, 107.87),  "Cd" => el(48, 112.41),  "Sn" => el(50, 118.71),
    "Sb" => el(51, 121.76),  "Te" => el(52, 127.60),  "I"  => el(53, 126.90),
    "Cs" => el(55, 132.91),  "Ba" => el(56, 137.33),  "Gd" => el(64, 157.25),
    "Lu" => el(71, 174.97),  "Ta" => el(73, 180.95),  "W"  => el(74, 183.84),
    "Re" => el(75, 186.21),  "Pt" => el(78, 195.08),  "Au" => el(79, 196.97),
    "Pb" => el(82, 207.2),   "Bi" => el(83, 208.98),  "U"  => el(92, 238.03),
    "Y"  => el(39, 88.906),
};

/// Looks up an element by its chemical symbol (case-sensitive, e.g. `"Cu"`).
pub fn element(symbol: &str) -> Option<Element> {
    ELEMENTS.get(symbol).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_sensitive() {
        assert_eq!(element("W").map(|e| e.z), Some(74));
        assert!(element("w").is_none());
        assert!(element("Xx").is_none());
    }
}
