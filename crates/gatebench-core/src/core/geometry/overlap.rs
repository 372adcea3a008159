use super::bounds::{Aabb, outside_distance, project, radii_at, surface_samples};
use super::tree::{ResolvedTree, ResolvedVolume};
use crate::core::models::volume::{Placement, Solid};
use itertools::Itertools;
use nalgebra::Vector3;
use std::f64::consts::{PI, TAU};
use std::fmt;
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const AXIS_EPS: f64 = 1e-9;
const OFFSET_EPS: f64 = 1e-6;
const PROFILE_SAMPLES: usize = 9;
const BORE_DIRECTIONS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapKind {
    /// Two daughters of the same mother intersect.
    Siblings,
    /// A daughter protrudes from its mother.
    Extrusion,
}

/// One detected overlap with its estimated penetration depth in mm.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlap {
    pub kind: OverlapKind,
    pub mother: String,
    pub first: String,
    pub second: String,
    pub depth: f64,
}

impl fmt::Display for Overlap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OverlapKind::Siblings => write!(
                f,
                "'{}' overlaps '{}' inside '{}' by {:.4} mm",
                self.first, self.second, self.mother, self.depth
            ),
            OverlapKind::Extrusion => write!(
                f,
                "'{}' protrudes from its mother '{}' by {:.4} mm",
                self.first, self.mother, self.depth
            ),
        }
    }
}

enum Candidate<'a> {
    Siblings {
        mother: &'a ResolvedVolume,
        a: &'a ResolvedVolume,
        b: &'a ResolvedVolume,
    },
    Extrusion {
        mother: &'a ResolvedVolume,
        child: &'a ResolvedVolume,
    },
}

impl Candidate<'_> {
    fn evaluate(&self, tolerance: f64) -> Option<Overlap> {
        let (kind, mother, first, second, depth) = match *self {
            Candidate::Siblings { mother, a, b } => {
                (OverlapKind::Siblings, mother, a, b, sibling_depth(a, b))
            }
            Candidate::Extrusion { mother, child } => (
                OverlapKind::Extrusion,
                mother,
                child,
                mother,
                extrusion_depth(&mother.solid, child),
            ),
        };
        (depth > tolerance).then(|| Overlap {
            kind,
            mother: mother.name.clone(),
            first: first.name.clone(),
            second: second.name.clone(),
            depth,
        })
    }
}

/// Reports sibling overlaps and mother extrusions deeper than `tolerance`.
///
/// Siblings are paired only when their bounding boxes in the mother frame intersect.
/// Coaxial tubes and cones are then compared by their axial and radial extents, and a
/// solid held inside the hole of a tube or cone is cleared by its radial reach; all other
/// pairs fall back to a separating-axis test on the solids' convex hulls.
#[instrument(skip_all, name = "overlap_check")]
pub fn detect_overlaps(tree: &ResolvedTree, tolerance: f64) -> Vec<Overlap> {
    let mut candidates = Vec::new();
    for mother in tree.iter() {
        let children: Vec<&ResolvedVolume> = tree
            .children(mother.id)
            .iter()
            .filter_map(|&id| tree.get(id))
            .collect();

        for &child in &children {
            candidates.push(Candidate::Extrusion { mother, child });
        }
        for pair in children.iter().combinations(2) {
            let (a, b) = (*pair[0], *pair[1]);
            let broad = Aabb::of(&a.solid, &a.local).penetration(&Aabb::of(&b.solid, &b.local));
            if broad > tolerance {
                candidates.push(Candidate::Siblings { mother, a, b });
            }
        }
    }

    #[cfg(not(feature = "parallel"))]
    let iterator = candidates.iter();

    #[cfg(feature = "parallel")]
    let iterator = candidates.par_iter();

    let overlaps: Vec<Overlap> = iterator.filter_map(|c| c.evaluate(tolerance)).collect();

    for overlap in &overlaps {
        warn!(
            kind = ?overlap.kind,
            depth = overlap.depth,
            "Overlap: {}",
            overlap
        );
    }
    info!(
        candidates = candidates.len(),
        overlaps = overlaps.len(),
        "Overlap check finished."
    );
    overlaps
}

/// Shared axis offset and orientation sign when `b`'s z axis lies on `a`'s z axis.
fn coaxial(a: &Placement, b: &Placement) -> Option<(f64, f64)> {
    let za = a.rotation * Vector3::z();
    let zb = b.rotation * Vector3::z();
    let cos = za.dot(&zb);
    if cos.abs() < 1.0 - AXIS_EPS {
        return None;
    }
    let offset = b.translation.vector - a.translation.vector;
    let along = offset.dot(&za);
    if (offset - za * along).norm() > OFFSET_EPS {
        return None;
    }
    Some((along, cos.signum()))
}

fn linspace(lo: f64, hi: f64) -> impl Iterator<Item = f64> {
    (0..PROFILE_SAMPLES).map(move |k| lo + (hi - lo) * k as f64 / (PROFILE_SAMPLES - 1) as f64)
}

fn clamped_radii(solid: &Solid, z: f64, half_z: f64) -> (f64, f64) {
    radii_at(solid, z.clamp(-half_z, half_z)).unwrap_or((0.0, 0.0))
}

fn sibling_depth(a: &ResolvedVolume, b: &ResolvedVolume) -> f64 {
    if let (Some(ea), Some(eb)) = (a.solid.revolution_envelope(), b.solid.revolution_envelope()) {
        if let Some((along, sign)) = coaxial(&a.local, &b.local) {
            let lo = (-ea.half_z).max(along - eb.half_z);
            let hi = ea.half_z.min(along + eb.half_z);
            let axial = hi - lo;
            if axial <= 0.0 {
                return axial;
            }
            let radial = linspace(lo, hi)
                .map(|s| {
                    let (rmin_a, rmax_a) = clamped_radii(&a.solid, s, ea.half_z);
                    let (rmin_b, rmax_b) = clamped_radii(&b.solid, sign * (s - along), eb.half_z);
                    rmax_a.min(rmax_b) - rmin_a.max(rmin_b)
                })
                .fold(f64::NEG_INFINITY, f64::max);
            return axial.min(radial);
        }
    }

    for (ring, other) in [(a, b), (b, a)] {
        if let Some(clearance) = bore_clearance(ring, other) {
            if clearance <= 0.0 {
                return clearance;
            }
        }
    }

    if let (Solid::Sphere { rmin: ia, rmax: ra }, Solid::Sphere { rmin: ib, rmax: rb }) =
        (&a.solid, &b.solid)
    {
        let d = (b.local.translation.vector - a.local.translation.vector).norm();
        // One sphere sitting entirely inside the other's hole.
        if d + rb <= *ia {
            return d + rb - ia;
        }
        if d + ra <= *ib {
            return d + ra - ib;
        }
        return ra + rb - d;
    }

    separating_axis_depth(a, b)
}

/// Largest distance of `other` from the axis of `ring` minus the ring's inner radius.
///
/// `None` unless `ring` is a full tube or cone with a hole. The reach is taken from the
/// support function along sampled radial directions and scaled up by the worst-case
/// sampling loss, so a negative value always means `other` stays inside the hole.
fn bore_clearance(ring: &ResolvedVolume, other: &ResolvedVolume) -> Option<f64> {
    let envelope = ring.solid.revolution_envelope()?;
    if envelope.rmin <= 0.0 {
        return None;
    }
    let relative = ring.local.inverse() * other.local;
    let reach = (0..BORE_DIRECTIONS)
        .map(|k| {
            let phi = TAU * k as f64 / BORE_DIRECTIONS as f64;
            let axis = Vector3::new(phi.cos(), phi.sin(), 0.0);
            project(&other.solid, &relative, &axis).1
        })
        .fold(f64::NEG_INFINITY, f64::max);
    Some(reach / (PI / BORE_DIRECTIONS as f64).cos() - envelope.rmin)
}

fn separating_axis_depth(a: &ResolvedVolume, b: &ResolvedVolume) -> f64 {
    let ra = a.local.rotation.matrix();
    let rb = b.local.rotation.matrix();

    let mut axes: Vec<Vector3<f64>> = (0..3)
        .map(|i| ra.column(i).into_owned())
        .chain((0..3).map(|i| rb.column(i).into_owned()))
        .collect();
    for i in 0..3 {
        for j in 0..3 {
            let cross = ra.column(i).cross(&rb.column(j));
            let norm = cross.norm();
            if norm > AXIS_EPS {
                axes.push(cross / norm);
            }
        }
    }

    axes.iter()
        .map(|axis| {
            let (lo_a, hi_a) = project(&a.solid, &a.local, axis);
            let (lo_b, hi_b) = project(&b.solid, &b.local, axis);
            hi_a.min(hi_b) - lo_a.max(lo_b)
        })
        .fold(f64::INFINITY, f64::min)
}

fn extrusion_depth(mother: &Solid, child: &ResolvedVolume) -> f64 {
    if let Solid::Box { half_size } = mother {
        return (0..3)
            .map(|i| {
                let (lo, hi) = project(&child.solid, &child.local, &Vector3::ith(i, 1.0));
                (hi - half_size[i]).max(-half_size[i] - lo)
            })
            .fold(f64::NEG_INFINITY, f64::max);
    }

    if let (Some(em), Some(ec)) = (mother.revolution_envelope(), child.solid.revolution_envelope())
    {
        if let Some((along, sign)) = coaxial(&Placement::identity(), &child.local) {
            let lo = along - ec.half_z;
            let hi = along + ec.half_z;
            let axial = (hi - em.half_z).max(-em.half_z - lo);
            let radial = linspace(lo, hi)
                .map(|s| {
                    let (rmin_c, rmax_c) = clamped_radii(&child.solid, sign * (s - along), ec.half_z);
                    let (rmin_m, rmax_m) = clamped_radii(mother, s, em.half_z);
                    (rmax_c - rmax_m).max(rmin_m - rmin_c)
                })
                .fold(f64::NEG_INFINITY, f64::max);
            return axial.max(radial);
        }
    }

    surface_samples(&child.solid)
        .iter()
        .map(|p| outside_distance(mother, &child.local.transform_point(p)))
        .fold(f64::NEG_INFINITY, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::tree::{FinalizeOptions, GeometryTree};
    use crate::core::materials::registry::MaterialRegistry;
    use crate::core::models::volume::{Shape, ShapeKind};

    fn finalize(tree: &GeometryTree, tolerance: f64) -> Vec<Overlap> {
        let options = FinalizeOptions {
            check_overlaps: true,
            overlap_tolerance: tolerance,
        };
        tree.finalize(&MaterialRegistry::with_nist(), &options)
            .unwrap()
            .overlaps()
            .to_vec()
    }

    fn add_box(tree: &mut GeometryTree, name: &str, size: f64, at: [f64; 3]) {
        tree.add_volume(ShapeKind::Box, name)
            .unwrap()
            .set_shape(Shape::cuboid([size; 3]))
            .set_material("G4_WATER")
            .set_translation(at);
    }

    #[test]
    fn separated_boxes_do_not_overlap() {
        let mut tree = GeometryTree::new();
        add_box(&mut tree, "a", 10.0, [-20.0, 0.0, 0.0]);
        add_box(&mut tree, "b", 10.0, [20.0, 0.0, 0.0]);
        assert!(finalize(&tree, 0.0).is_empty());
    }

    #[test]
    fn intersecting_boxes_report_penetration_depth() {
        let mut tree = GeometryTree::new();
        add_box(&mut tree, "a", 10.0, [0.0, 0.0, 0.0]);
        add_box(&mut tree, "b", 10.0, [8.0, 0.0, 0.0]);
        let overlaps = finalize(&tree, 0.0);
        assert_eq!(overlaps.len(), 1);
        assert_eq!(overlaps[0].kind, OverlapKind::Siblings);
        assert_eq!((overlaps[0].first.as_str(), overlaps[0].second.as_str()), ("a", "b"));
        assert!((overlaps[0].depth - 2.0).abs() < 1e-9);
    }

    #[test]
    fn touching_volumes_are_within_tolerance() {
        let mut tree = GeometryTree::new();
        add_box(&mut tree, "a", 10.0, [0.0, 0.0, 0.0]);
        add_box(&mut tree, "b", 10.0, [10.0 - 1e-4, 0.0, 0.0]);
        assert!(finalize(&tree, 1e-3).is_empty());
        assert_eq!(finalize(&tree, 0.0).len(), 1);
    }

    #[test]
    fn daughter_sticking_out_of_world_is_an_extrusion() {
        let mut tree = GeometryTree::new();
        tree.world_mut().set_shape(Shape::cuboid([100.0; 3]));
        add_box(&mut tree, "a", 10.0, [48.0, 0.0, 0.0]);
        let overlaps = finalize(&tree, 0.0);
        assert_eq!(overlaps.len(), 1);
        assert_eq!(overlaps[0].kind, OverlapKind::Extrusion);
        assert_eq!(overlaps[0].mother, "world");
        assert!((overlaps[0].depth - 3.0).abs() < 1e-9);
    }

    #[test]
    fn nested_coaxial_tubes_do_not_overlap() {
        let mut tree = GeometryTree::new();
        tree.add_volume(ShapeKind::Tubs, "outer")
            .unwrap()
            .set_shape(Shape::tube(10.0, 20.0, 5.0))
            .set_material("G4_Cu");
        tree.add_volume(ShapeKind::Tubs, "inner")
            .unwrap()
            .set_shape(Shape::tube(0.0, 10.0, 5.0))
            .set_material("G4_W");
        tree.add_volume(ShapeKind::Tubs, "shell")
            .unwrap()
            .set_shape(Shape::tube(0.0, 5.0, 2.0))
            .set_mother("outer")
            .set_material("G4_W");
        let overlaps = finalize(&tree, 1e-9);
        // "shell" fills the hole of "outer", so it protrudes; the siblings only touch.
        assert_eq!(overlaps.len(), 1);
        assert_eq!(overlaps[0].first, "shell");
        assert!((overlaps[0].depth - 10.0).abs() < 1e-9);
    }

    #[test]
    fn stacked_cones_that_share_a_face_are_clean() {
        let mut tree = GeometryTree::new();
        tree.add_volume(ShapeKind::Cons, "c1")
            .unwrap()
            .set_shape(Shape::cone(0.0, 5.0, 0.0, 10.0, 2.0))
            .set_material("G4_Cu");
        tree.add_volume(ShapeKind::Cons, "c2")
            .unwrap()
            .set_shape(Shape::cone(0.0, 10.0, 0.0, 12.0, 2.0))
            .set_translation([0.0, 0.0, 4.0])
            .set_material("G4_Cu");
        assert!(finalize(&tree, 1e-9).is_empty());
    }

    fn add_ring(tree: &mut GeometryTree, name: &str, rmin: f64, rmax: f64, dz: f64) {
        tree.add_volume(ShapeKind::Tubs, name)
            .unwrap()
            .set_shape(Shape::tube(rmin, rmax, dz))
            .set_material("G4_W");
    }

    #[test]
    fn box_inside_a_tube_bore_is_clean() {
        let mut tree = GeometryTree::new();
        add_ring(&mut tree, "ring", 50.0, 60.0, 10.0);
        add_box(&mut tree, "core", 10.0, [0.0, 0.0, 0.0]);
        assert!(finalize(&tree, 0.0).is_empty());

        // Off-axis and tilted, still well clear of the inner wall.
        tree.volume_mut("core")
            .unwrap()
            .set_translation([20.0, -10.0, 3.0])
            .set_rotation(
                nalgebra::Rotation3::from_axis_angle(&Vector3::x_axis(), std::f64::consts::FRAC_PI_4)
                    .into_inner(),
            );
        assert!(finalize(&tree, 0.0).is_empty());
    }

    #[test]
    fn box_reaching_into_a_tube_wall_is_reported() {
        let mut tree = GeometryTree::new();
        add_ring(&mut tree, "ring", 50.0, 60.0, 10.0);
        add_box(&mut tree, "core", 10.0, [52.0, 0.0, 0.0]);
        let overlaps = finalize(&tree, 0.0);
        assert_eq!(overlaps.len(), 1);
        assert_eq!(overlaps[0].kind, OverlapKind::Siblings);
        assert!(overlaps[0].depth > 0.0);
    }

    #[test]
    fn rotated_box_corner_hits_neighbour() {
        let mut tree = GeometryTree::new();
        add_box(&mut tree, "a", 10.0, [0.0, 0.0, 0.0]);
        tree.add_volume(ShapeKind::Box, "b")
            .unwrap()
            .set_shape(Shape::cuboid([10.0; 3]))
            .set_material("G4_WATER")
            .set_translation([12.0, 0.0, 0.0])
            .set_rotation(
                nalgebra::Rotation3::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_4)
                    .into_inner(),
            );
        let overlaps = finalize(&tree, 0.0);
        assert_eq!(overlaps.len(), 1);
        let expected = 5.0 + 5.0 * 2f64.sqrt() - 12.0;
        assert!((overlaps[0].depth - expected).abs() < 1e-9);
    }
}
