use crate::core::error::ModelError;
use nalgebra::{IsometryMatrix3, Matrix3, Rotation3, Translation3, Vector3};
use std::f64::consts::TAU;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name of the root volume every simulation build starts with.
pub const WORLD: &str = "world";

const ORTHONORMALITY_TOLERANCE: f64 = 1e-6;

/// Rigid placement of a volume in its mother's frame: `p_mother = R * p_local + t`.
pub type Placement = IsometryMatrix3<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Box,
    Tubs,
    Cons,
    Sphere,
}

#[derive(Debug, Error)]
#[error("Invalid shape kind '{0}'")]
pub struct ParseShapeKindError(String);

impl FromStr for ShapeKind {
    type Err = ParseShapeKindError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "box" => Ok(ShapeKind::Box),
            "tubs" | "tube" => Ok(ShapeKind::Tubs),
            "cons" | "cone" => Ok(ShapeKind::Cons),
            "sphere" => Ok(ShapeKind::Sphere),
            _ => Err(ParseShapeKindError(s.to_string())),
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShapeKind::Box => "Box",
            ShapeKind::Tubs => "Tubs",
            ShapeKind::Cons => "Cons",
            ShapeKind::Sphere => "Sphere",
        })
    }
}

/// Box with full edge lengths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoxParams {
    pub size: Option<[f64; 3]>,
}

/// Tube segment; `dz` is the half length along z.
#[derive(Debug, Clone, PartialEq)]
pub struct TubsParams {
    pub rmin: f64,
    pub rmax: Option<f64>,
    pub dz: Option<f64>,
    pub sphi: f64,
    pub dphi: f64,
}

impl Default for TubsParams {
    fn default() -> Self {
        Self {
            rmin: 0.0,
            rmax: None,
            dz: None,
            sphi: 0.0,
            dphi: TAU,
        }
    }
}

/// Cone segment; radii at `-dz` carry index 1, radii at `+dz` carry index 2.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsParams {
    pub rmin1: f64,
    pub rmax1: Option<f64>,
    pub rmin2: f64,
    pub rmax2: Option<f64>,
    pub dz: Option<f64>,
    pub sphi: f64,
    pub dphi: f64,
}

impl Default for ConsParams {
    fn default() -> Self {
        Self {
            rmin1: 0.0,
            rmax1: None,
            rmin2: 0.0,
            rmax2: None,
            dz: None,
            sphi: 0.0,
            dphi: TAU,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SphereParams {
    pub rmin: f64,
    pub rmax: Option<f64>,
}

/// Shape parameters as the caller populates them; required values stay `None` until set.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Box(BoxParams),
    Tubs(TubsParams),
    Cons(ConsParams),
    Sphere(SphereParams),
}

impl Shape {
    pub fn empty(kind: ShapeKind) -> Self {
        match kind {
            ShapeKind::Box => Shape::Box(BoxParams::default()),
            ShapeKind::Tubs => Shape::Tubs(TubsParams::default()),
            ShapeKind::Cons => Shape::Cons(ConsParams::default()),
            ShapeKind::Sphere => Shape::Sphere(SphereParams::default()),
        }
    }

    pub fn cuboid(size: [f64; 3]) -> Self {
        Shape::Box(BoxParams { size: Some(size) })
    }

    pub fn tube(rmin: f64, rmax: f64, dz: f64) -> Self {
        Shape::Tubs(TubsParams {
            rmin,
            rmax: Some(rmax),
            dz: Some(dz),
            ..TubsParams::default()
        })
    }

    pub fn cone(rmin1: f64, rmax1: f64, rmin2: f64, rmax2: f64, dz: f64) -> Self {
        Shape::Cons(ConsParams {
            rmin1,
            rmax1: Some(rmax1),
            rmin2,
            rmax2: Some(rmax2),
            dz: Some(dz),
            ..ConsParams::default()
        })
    }

    pub fn sphere(rmin: f64, rmax: f64) -> Self {
        Shape::Sphere(SphereParams {
            rmin,
            rmax: Some(rmax),
        })
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Box(_) => ShapeKind::Box,
            Shape::Tubs(_) => ShapeKind::Tubs,
            Shape::Cons(_) => ShapeKind::Cons,
            Shape::Sphere(_) => ShapeKind::Sphere,
        }
    }

    /// Checks that every required parameter is populated and geometrically valid.
    pub fn resolve(&self, volume: &str) -> Result<Solid, ModelError> {
        let invalid = |field: &'static str, reason: String| ModelError::Resolution {
            name: volume.to_string(),
            field,
            reason,
        };

        match self {
            Shape::Box(p) => {
                let size = p.size.ok_or_else(|| ModelError::unset(volume, "size"))?;
                if size.iter().any(|&s| !(s > 0.0)) {
                    return Err(invalid("size", format!("edges must be positive, got {:?}", size)));
                }
                Ok(Solid::Box {
                    half_size: Vector3::from(size) / 2.0,
                })
            }
            Shape::Tubs(p) => {
                let rmax = p.rmax.ok_or_else(|| ModelError::unset(volume, "rmax"))?;
                let dz = p.dz.ok_or_else(|| ModelError::unset(volume, "dz"))?;
                if !(p.rmin >= 0.0 && p.rmin < rmax) {
                    return Err(invalid(
                        "rmin",
                        format!("expected 0 <= rmin < rmax, got rmin={} rmax={}", p.rmin, rmax),
                    ));
                }
                check_half_length(dz).map_err(|r| invalid("dz", r))?;
                check_phi_span(p.dphi).map_err(|r| invalid("dphi", r))?;
                Ok(Solid::Tubs {
                    rmin: p.rmin,
                    rmax,
                    dz,
                    sphi: p.sphi,
                    dphi: p.dphi,
                })
            }
            Shape::Cons(p) => {
                let rmax1 = p.rmax1.ok_or_else(|| ModelError::unset(volume, "rmax1"))?;
                let rmax2 = p.rmax2.ok_or_else(|| ModelError::unset(volume, "rmax2"))?;
                let dz = p.dz.ok_or_else(|| ModelError::unset(volume, "dz"))?;
                if !(p.rmin1 >= 0.0 && p.rmin1 <= rmax1) {
                    return Err(invalid(
                        "rmin1",
                        format!("expected 0 <= rmin1 <= rmax1, got {} / {}", p.rmin1, rmax1),
                    ));
                }
                if !(p.rmin2 >= 0.0 && p.rmin2 <= rmax2) {
                    return Err(invalid(
                        "rmin2",
                        format!("expected 0 <= rmin2 <= rmax2, got {} / {}", p.rmin2, rmax2),
                    ));
                }
                if !(rmax1.max(rmax2) > 0.0) {
                    return Err(invalid("rmax1", "cone has no radial extent".to_string()));
                }
                check_half_length(dz).map_err(|r| invalid("dz", r))?;
                check_phi_span(p.dphi).map_err(|r| invalid("dphi", r))?;
                Ok(Solid::Cons {
                    rmin1: p.rmin1,
                    rmax1,
                    rmin2: p.rmin2,
                    rmax2,
                    dz,
                    sphi: p.sphi,
                    dphi: p.dphi,
                })
            }
            Shape::Sphere(p) => {
                let rmax = p.rmax.ok_or_else(|| ModelError::unset(volume, "rmax"))?;
                if !(p.rmin >= 0.0 && p.rmin < rmax) {
                    return Err(invalid(
                        "rmin",
                        format!("expected 0 <= rmin < rmax, got rmin={} rmax={}", p.rmin, rmax),
                    ));
                }
                Ok(Solid::Sphere { rmin: p.rmin, rmax })
            }
        }
    }
}

fn check_half_length(dz: f64) -> Result<(), String> {
    if dz > 0.0 {
        Ok(())
    } else {
        Err(format!("half length must be positive, got {}", dz))
    }
}

fn check_phi_span(dphi: f64) -> Result<(), String> {
    if dphi > 0.0 && dphi <= TAU + 1e-12 {
        Ok(())
    } else {
        Err(format!("phi span must lie in (0, 2pi], got {}", dphi))
    }
}

/// A fully populated, validated shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Solid {
    Box {
        half_size: Vector3<f64>,
    },
    Tubs {
        rmin: f64,
        rmax: f64,
        dz: f64,
        sphi: f64,
        dphi: f64,
    },
    Cons {
        rmin1: f64,
        rmax1: f64,
        rmin2: f64,
        rmax2: f64,
        dz: f64,
        sphi: f64,
        dphi: f64,
    },
    Sphere {
        rmin: f64,
        rmax: f64,
    },
}

/// Radial and axial extent of a solid of revolution around its local z axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevolutionEnvelope {
    pub rmin: f64,
    pub rmax: f64,
    pub half_z: f64,
}

impl Solid {
    /// Half extents of the local axis-aligned bounding box centred on the origin.
    pub fn half_extents(&self) -> Vector3<f64> {
        match *self {
            Solid::Box { half_size } => half_size,
            Solid::Tubs { rmax, dz, .. } => Vector3::new(rmax, rmax, dz),
            Solid::Cons {
                rmax1, rmax2, dz, ..
            } => {
                let r = rmax1.max(rmax2);
                Vector3::new(r, r, dz)
            }
            Solid::Sphere { rmax, .. } => Vector3::new(rmax, rmax, rmax),
        }
    }

    /// Envelope for full-turn tubes and cones; `None` for other solids.
    ///
    /// For cones the envelope takes the innermost hole and the outermost radius of
    /// both ends, so it always contains the cone.
    pub fn revolution_envelope(&self) -> Option<RevolutionEnvelope> {
        match *self {
            Solid::Tubs {
                rmin, rmax, dz, dphi, ..
            } if dphi >= TAU - 1e-12 => Some(RevolutionEnvelope {
                rmin,
                rmax,
                half_z: dz,
            }),
            Solid::Cons {
                rmin1,
                rmax1,
                rmin2,
                rmax2,
                dz,
                dphi,
                ..
            } if dphi >= TAU - 1e-12 => Some(RevolutionEnvelope {
                rmin: rmin1.min(rmin2),
                rmax: rmax1.max(rmax2),
                half_z: dz,
            }),
            _ => None,
        }
    }
}

/// A node of the geometry tree.
///
/// Attributes may be reassigned freely before finalization; the last assignment wins.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    name: String,
    /// Mother volume name; `None` only for the root.
    pub mother: Option<String>,
    pub material: Option<String>,
    pub shape: Shape,
    pub translation: Vector3<f64>,
    pub rotation: Matrix3<f64>,
    pub color: [f64; 4],
    pub visible: bool,
}

impl Volume {
    pub(crate) fn new(name: &str, kind: ShapeKind, mother: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            mother: mother.map(str::to_string),
            material: None,
            shape: Shape::empty(kind),
            translation: Vector3::zeros(),
            rotation: Matrix3::identity(),
            color: [1.0, 1.0, 1.0, 1.0],
            visible: true,
        }
    }

    /// Fixed at insertion; the tree indexes volumes by it.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ShapeKind {
        self.shape.kind()
    }

    pub fn set_mother(&mut self, mother: impl Into<String>) -> &mut Self {
        self.mother = Some(mother.into());
        self
    }

    pub fn set_material(&mut self, material: impl Into<String>) -> &mut Self {
        self.material = Some(material.into());
        self
    }

    pub fn set_shape(&mut self, shape: Shape) -> &mut Self {
        self.shape = shape;
        self
    }

    pub fn set_translation(&mut self, translation: [f64; 3]) -> &mut Self {
        self.translation = Vector3::from(translation);
        self
    }

    pub fn set_rotation(&mut self, rotation: Matrix3<f64>) -> &mut Self {
        self.rotation = rotation;
        self
    }

    pub fn set_color(&mut self, rgba: [f64; 4]) -> &mut Self {
        self.color = rgba;
        self.visible = rgba[3] > 0.0;
        self
    }

    pub fn box_mut(&mut self) -> Option<&mut BoxParams> {
        match &mut self.shape {
            Shape::Box(p) => Some(p),
            _ => None,
        }
    }

    pub fn tubs_mut(&mut self) -> Option<&mut TubsParams> {
        match &mut self.shape {
            Shape::Tubs(p) => Some(p),
            _ => None,
        }
    }

    pub fn cons_mut(&mut self) -> Option<&mut ConsParams> {
        match &mut self.shape {
            Shape::Cons(p) => Some(p),
            _ => None,
        }
    }

    pub fn sphere_mut(&mut self) -> Option<&mut SphereParams> {
        match &mut self.shape {
            Shape::Sphere(p) => Some(p),
            _ => None,
        }
    }

    /// Builds the local placement, rejecting rotations that are not proper orthonormal.
    pub fn local_placement(&self) -> Result<Placement, ModelError> {
        let r = self.rotation;
        let orthonormality_error = (r.transpose() * r - Matrix3::identity()).norm();
        if !(orthonormality_error < ORTHONORMALITY_TOLERANCE) || r.determinant() <= 0.0 {
            return Err(ModelError::Resolution {
                name: self.name.clone(),
                field: "rotation",
                reason: format!(
                    "matrix is not a proper rotation (|R^T R - I| = {:.3e}, det = {:.6})",
                    orthonormality_error,
                    r.determinant()
                ),
            });
        }
        Ok(Placement::from_parts(
            Translation3::from(self.translation),
            Rotation3::from_matrix_unchecked(r),
        ))
    }
}
