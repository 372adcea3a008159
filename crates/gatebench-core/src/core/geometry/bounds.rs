use crate::core::models::volume::{Placement, Solid};
use nalgebra::{Point3, Vector3};
use std::f64::consts::TAU;

const RIM_SAMPLES: usize = 16;

/// Largest projection of the solid onto a unit direction given in the solid's own frame.
///
/// Holes and phi segments are ignored, so this is the support function of the solid's
/// convex hull.
pub fn support(solid: &Solid, d: &Vector3<f64>) -> f64 {
    match *solid {
        Solid::Box { half_size } => {
            half_size.x * d.x.abs() + half_size.y * d.y.abs() + half_size.z * d.z.abs()
        }
        Solid::Tubs { rmax, dz, .. } => dz * d.z.abs() + rmax * d.xy().norm(),
        Solid::Cons {
            rmax1, rmax2, dz, ..
        } => {
            let radial = d.xy().norm();
            (-dz * d.z + rmax1 * radial).max(dz * d.z + rmax2 * radial)
        }
        Solid::Sphere { rmax, .. } => rmax * d.norm(),
    }
}

/// Interval covered by a placed solid along a unit axis of the parent frame.
pub fn project(solid: &Solid, placement: &Placement, axis: &Vector3<f64>) -> (f64, f64) {
    let local = placement.inverse_transform_vector(axis);
    let centre = placement.translation.vector.dot(axis);
    (centre - support(solid, &-local), centre + support(solid, &local))
}

/// Axis-aligned box in some parent frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vector3<f64>,
    pub max: Vector3<f64>,
}

impl Aabb {
    /// Tight box around a solid placed in its parent frame.
    pub fn of(solid: &Solid, placement: &Placement) -> Self {
        let mut min = Vector3::zeros();
        let mut max = Vector3::zeros();
        for i in 0..3 {
            let (lo, hi) = project(solid, placement, &Vector3::ith(i, 1.0));
            min[i] = lo;
            max[i] = hi;
        }
        Self { min, max }
    }

    /// Smallest per-axis overlap length; zero or negative when the boxes are apart.
    pub fn penetration(&self, other: &Aabb) -> f64 {
        (0..3)
            .map(|i| self.max[i].min(other.max[i]) - self.min[i].max(other.min[i]))
            .fold(f64::INFINITY, f64::min)
    }
}

/// Inner and outer radius of a tube or cone at local height `z`; `None` outside its
/// axial range or for solids that are not bodies of revolution about z.
pub fn radii_at(solid: &Solid, z: f64) -> Option<(f64, f64)> {
    match *solid {
        Solid::Tubs { rmin, rmax, dz, .. } if z.abs() <= dz => Some((rmin, rmax)),
        Solid::Cons {
            rmin1,
            rmax1,
            rmin2,
            rmax2,
            dz,
            ..
        } if z.abs() <= dz => {
            let t = (z + dz) / (2.0 * dz);
            Some((rmin1 + t * (rmin2 - rmin1), rmax1 + t * (rmax2 - rmax1)))
        }
        _ => None,
    }
}

/// Distance by which a point (solid frame) lies outside the solid; zero or negative inside.
///
/// Exact for boxes; for the curved solids it is the largest violated constraint, which is
/// a lower bound of the Euclidean distance.
pub fn outside_distance(solid: &Solid, p: &Point3<f64>) -> f64 {
    match *solid {
        Solid::Box { half_size } => (p.coords.abs() - half_size).max(),
        Solid::Tubs { rmin, rmax, dz, .. } => {
            let r = p.coords.xy().norm();
            (r - rmax).max(rmin - r).max(p.z.abs() - dz)
        }
        Solid::Cons { dz, .. } => {
            let r = p.coords.xy().norm();
            let (rmin, rmax) = radii_at(solid, p.z.clamp(-dz, dz)).unwrap_or((0.0, 0.0));
            (r - rmax).max(rmin - r).max(p.z.abs() - dz)
        }
        Solid::Sphere { rmin, rmax } => {
            let r = p.coords.norm();
            (r - rmax).max(rmin - r)
        }
    }
}

/// Points on the outer surface of the solid (solid frame) used for containment checks.
pub fn surface_samples(solid: &Solid) -> Vec<Point3<f64>> {
    match *solid {
        Solid::Box { half_size: h } => {
            let mut corners = Vec::with_capacity(8);
            for sx in [-1.0, 1.0] {
                for sy in [-1.0, 1.0] {
                    for sz in [-1.0, 1.0] {
                        corners.push(Point3::new(sx * h.x, sy * h.y, sz * h.z));
                    }
                }
            }
            corners
        }
        Solid::Tubs { rmax, dz, .. } => rim_points(&[(-dz, rmax), (dz, rmax)]),
        Solid::Cons {
            rmax1, rmax2, dz, ..
        } => rim_points(&[(-dz, rmax1), (dz, rmax2)]),
        Solid::Sphere { rmax, .. } => {
            let mut points = Vec::with_capacity(14);
            for i in 0..3 {
                for s in [-1.0, 1.0] {
                    points.push(Point3::from(Vector3::ith(i, s * rmax)));
                }
            }
            let d = rmax / 3f64.sqrt();
            for sx in [-1.0, 1.0] {
                for sy in [-1.0, 1.0] {
                    for sz in [-1.0, 1.0] {
                        points.push(Point3::new(sx * d, sy * d, sz * d));
                    }
                }
            }
            points
        }
    }
}

fn rim_points(rims: &[(f64, f64)]) -> Vec<Point3<f64>> {
    rims.iter()
        .flat_map(|&(z, r)| {
            (0..RIM_SAMPLES).map(move |k| {
                let phi = TAU * k as f64 / RIM_SAMPLES as f64;
                Point3::new(r * phi.cos(), r * phi.sin(), z)
            })
        })
        .collect()
}
