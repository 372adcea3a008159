//! Elekta Synergy linac head.
//!
//! The head is a 25 × 25 × 60 cm air box holding the target assembly, the primary
//! collimator, the flattening filter, the ionizing chamber, the back-scatter plate and
//! the mirror. Beam direction is local `-z`; the target sits near `z = 0` and the
//! phase-space plane at the bottom of the box.

use crate::core::error::ModelError;
use crate::core::geometry::transform::axis_rotation;
use crate::core::models::attachment::{
    Actor, ActorConfig, Direction, EnergySpectrum, GenericSource, PositionShape, Region,
    RegionConfig, Source, SourceConfig,
};
use crate::core::models::volume::{Shape, ShapeKind};
use crate::core::units::{DEG, G_CM3, M, MEV, MM, NM};
use crate::engine::simulation::Simulation;
use nalgebra::{Matrix3, Rotation3, Vector3};
use std::path::PathBuf;
use tracing::info;

const RED: [f64; 4] = [1.0, 0.7, 0.7, 0.8];
const BLUE: [f64; 4] = [0.5, 0.5, 1.0, 0.8];
const WHITE: [f64; 4] = [1.0, 1.0, 1.0, 0.8];
const YELLOW: [f64; 4] = [0.0, 0.7, 0.7, 0.8];
const INVISIBLE: [f64; 4] = [0.0; 4];

/// Attributes recorded by [`add_phase_space`].
pub const PHASE_SPACE_ATTRIBUTES: &[&str] = &[
    "KineticEnergy",
    "Weight",
    "PrePosition",
    "PrePositionLocal",
    "PreDirection",
    "PreDirectionLocal",
    "PDGCode",
];

/// Flattening-filter cones, top to bottom: `[rmax2, rmax1, height, z]` in mm.
const FILTER_CONES: [[f64; 4]; 6] = [
    [0.001, 5.45, 3.40, 10.35],
    [5.45, 9.0, 2.7, 7.3],
    [9.0, 14.5, 4.9, 3.5],
    [14.5, 22.5, 5.5, -1.7],
    [22.5, 32.5, 5.6, -7.25],
    [38.5, 38.5, 2.0, -11.05],
];

/// Ionizing-chamber layer pairs: `[mylar z, carbon z]` in mm.
const CHAMBER_LAYERS: [[f64; 2]; 6] = [
    [-2.634, -2.627925],
    [-0.434, -0.427925],
    [0.566, 0.572075],
    [1.566, 1.572075],
    [2.566, 2.572075],
    [3.566, 3.572075],
];

fn add_materials(sim: &mut Simulation, name: &str) -> Result<(), ModelError> {
    sim.add_material_by_atom_count(
        &format!("{name}_target_tungsten"),
        &["W", "Re"],
        &[9, 1],
        19.4 * G_CM3,
    )?;
    sim.add_material_by_mass_fraction(&format!("{name}_target_copper"), &["Cu"], &[1.0], 8.93 * G_CM3)?;
    sim.add_material_by_mass_fraction(
        &format!("{name}_colli"),
        &["W", "Ni", "Fe"],
        &[0.95, 0.0375, 0.0125],
        18.0 * G_CM3,
    )?;
    sim.add_material_by_mass_fraction(
        &format!("{name}_flat_filter"),
        &["Cr", "Fe", "Ni"],
        &[0.17, 0.75, 0.08],
        7.9 * G_CM3,
    )?;
    sim.add_material_by_mass_fraction(
        &format!("{name}_mylar"),
        &["H", "C", "O"],
        &[0.04196, 0.625016, 0.333024],
        1.38 * G_CM3,
    )?;
    sim.add_material_by_mass_fraction(&format!("{name}_carbon"), &["C"], &[1.0], 2.27 * G_CM3)?;
    sim.add_material_by_mass_fraction(&format!("{name}_aluminium"), &["Al"], &[1.0], 2.7 * G_CM3)?;
    Ok(())
}

/// Adds a full tube `name` inside `mother`.
fn add_tube(
    sim: &mut Simulation,
    name: &str,
    mother: &str,
    material: &str,
    (rmin, rmax, dz): (f64, f64, f64),
    z: f64,
) -> Result<(), ModelError> {
    sim.add_volume(ShapeKind::Tubs, name)?
        .set_mother(mother)
        .set_material(material)
        .set_shape(Shape::tube(rmin, rmax, dz))
        .set_translation([0.0, 0.0, z]);
    Ok(())
}

/// Builds the head as volume `name` inside the world, with its materials and the kill
/// volumes around the target.
///
/// Returns the name of the target volume, which [`add_electron_source`] emits from.
pub fn elekta_synergy(sim: &mut Simulation, name: &str) -> Result<String, ModelError> {
    add_materials(sim, name)?;
    sim.config_mut().check_overlaps = true;

    sim.add_volume(ShapeKind::Box, name)?
        .set_material("G4_AIR")
        .set_shape(Shape::cuboid([0.25 * M, 0.25 * M, 0.6 * M]))
        .set_color(WHITE);

    let (support, target) = add_target(sim, name)?;

    sim.add_volume(ShapeKind::Cons, &format!("{name}_primary_collimator"))?
        .set_mother(name)
        .set_material(format!("{name}_colli"))
        .set_shape(Shape::cone(31.45 * MM, 82.0 * MM, 6.45 * MM, 82.0 * MM, 101.0 * MM / 2.0))
        .set_translation([0.0, 0.0, -65.5 * MM])
        .set_color(BLUE);

    add_flattening_filter(sim, name)?;
    add_ionizing_chamber(sim, name)?;

    sim.add_volume(ShapeKind::Box, &format!("{name}_back_scatter_plate"))?
        .set_mother(name)
        .set_material(format!("{name}_aluminium"))
        .set_shape(Shape::cuboid([116.0 * MM, 84.0 * MM, 3.0 * MM]))
        .set_translation([0.0, 0.0, -183.0 * MM])
        .set_color(RED);

    add_mirror(sim, name)?;
    kill_around_target(sim, name, &support)?;

    info!(linac = name, volumes = sim.geometry().len(), "Built Elekta Synergy head.");
    Ok(target)
}

/// Target, its support and the copper around it. Returns `(support, target)` names.
fn add_target(sim: &mut Simulation, name: &str) -> Result<(String, String), ModelError> {
    let support = format!("{name}_target_support");
    let target = format!("{name}_target");
    let copper = format!("{name}_target_copper");

    add_tube(sim, &support, name, "G4_AIR", (0.0, 15.0 * MM, 11.0 * MM / 2.0), -5.0 * MM)?;
    sim.volume_mut(&support)?.set_color([0.0, 1.0, 0.0, 1.0]);

    add_tube(
        sim,
        &target,
        &support,
        &format!("{name}_target_tungsten"),
        (0.0, 2.7 * MM, 1.0 * MM / 2.0),
        5.0 * MM,
    )?;
    sim.volume_mut(&target)?.set_color([1.0, 0.2, 0.2, 0.8]);

    add_tube(
        sim,
        &format!("{name}_target_support_top"),
        &support,
        &copper,
        (2.7 * MM, 15.0 * MM, 1.0 * MM / 2.0),
        5.0 * MM,
    )?;
    add_tube(
        sim,
        &format!("{name}_target_support_bottom"),
        &support,
        &copper,
        (0.0, 15.0 * MM, 10.0 * MM / 2.0),
        -0.5 * MM,
    )?;
    Ok((support, target))
}

/// Two air tubes above and around the target, both covered by one kill actor.
fn kill_around_target(sim: &mut Simulation, name: &str, support: &str) -> Result<(), ModelError> {
    let above = format!("{support}_kill_volume1");
    let around = format!("{support}_kill_volume2");
    // The electron source sits 0.6 mm above the target centre.
    add_tube(sim, &above, name, "G4_AIR", (0.0, 15.0 * MM, 0.001 * MM), 0.7 * MM)?;
    add_tube(sim, &around, name, "G4_AIR", (18.0 * MM, 25.0 * MM, 10.0 * MM), 0.0)?;
    for volume in [&above, &around] {
        sim.volume_mut(volume)?.set_color([1.0, 0.0, 0.0, 1.0]);
    }
    sim.add_actor(
        ActorConfig::Kill,
        &format!("{support}_kill"),
        vec![above, around],
    )?;
    Ok(())
}

fn add_flattening_filter(sim: &mut Simulation, name: &str) -> Result<(), ModelError> {
    let filter = format!("{name}_flattening_filter");
    add_tube(sim, &filter, name, "G4_AIR", (0.0, 40.0 * MM, 24.1 * MM / 2.0), -146.05 * MM)?;
    sim.volume_mut(&filter)?.set_color(INVISIBLE);

    for (i, [rmax2, rmax1, height, z]) in FILTER_CONES.iter().enumerate() {
        sim.add_volume(ShapeKind::Cons, &format!("{filter}_cone_{i}"))?
            .set_mother(filter.as_str())
            .set_material(format!("{name}_flat_filter"))
            .set_shape(Shape::cone(0.0, rmax1 * MM, 0.0, rmax2 * MM, height * MM / 2.0))
            .set_translation([0.0, 0.0, z * MM])
            .set_color(YELLOW);
    }
    Ok(())
}

fn add_ionizing_chamber(sim: &mut Simulation, name: &str) -> Result<(), ModelError> {
    let chamber = format!("{name}_ionizing_chamber");
    add_tube(sim, &chamber, name, "G4_AIR", (0.0, 45.0 * MM, 9.28 * MM / 2.0), -169.0 * MM)?;
    sim.volume_mut(&chamber)?.set_color(INVISIBLE);

    for (i, [mylar_z, carbon_z]) in CHAMBER_LAYERS.iter().enumerate() {
        let layer = i + 1;
        add_tube(
            sim,
            &format!("{chamber}_mylar_layer_{layer}"),
            &chamber,
            &format!("{name}_mylar"),
            (0.0, 45.0 * MM, 0.012 * MM / 2.0),
            mylar_z * MM,
        )?;
        add_tube(
            sim,
            &format!("{chamber}_carbon_layer_{layer}"),
            &chamber,
            &format!("{name}_carbon"),
            (0.0, 45.0 * MM, 0.000150 * MM / 2.0),
            carbon_z * MM,
        )?;
    }
    Ok(())
}

fn add_mirror(sim: &mut Simulation, name: &str) -> Result<(), ModelError> {
    let mirror = format!("{name}_mirror");
    let tilt = axis_rotation('x', 37.5 * DEG)
        .map(Rotation3::into_inner)
        .unwrap_or_else(Matrix3::identity);
    sim.add_volume(ShapeKind::Box, &mirror)?
        .set_mother(name)
        .set_material("G4_AIR")
        .set_shape(Shape::cuboid([137.0 * MM, 137.0 * MM, 1.5 * MM]))
        .set_translation([0.0, 0.0, -225.0 * MM])
        .set_rotation(tilt);

    let blue = [0.0, 0.0, 1.0, 0.8];
    sim.add_volume(ShapeKind::Box, &format!("{mirror}_mylar_layer"))?
        .set_mother(mirror.as_str())
        .set_material(format!("{name}_mylar"))
        .set_shape(Shape::cuboid([110.0 * MM, 110.0 * MM, 0.0012 * MM]))
        .set_translation([0.0, 0.0, 0.15 * MM])
        .set_color(blue);
    sim.add_volume(ShapeKind::Box, &format!("{mirror}_alu_layer"))?
        .set_mother(mirror.as_str())
        .set_material(format!("{name}_aluminium"))
        .set_shape(Shape::cuboid([110.0 * MM, 110.0 * MM, 0.0003 * MM]))
        .set_translation([0.0, 0.0, -0.6 * MM])
        .set_color(blue);
    Ok(())
}

/// Attaches a bremsstrahlung-splitting region to the whole head.
pub fn enable_brem_splitting<'a>(
    sim: &'a mut Simulation,
    name: &str,
    splitting_factor: u32,
) -> Result<&'a mut Region, ModelError> {
    sim.add_region(
        RegionConfig {
            production_cut: None,
            brem_splitting: Some(splitting_factor),
        },
        &format!("{name}_region"),
        name,
    )
}

/// Adds the 6.7 MeV electron beam hitting the target.
///
/// `rotation` is the head's rotation in the world; the beam momentum is the head's `-z`
/// axis expressed in world coordinates.
pub fn add_electron_source<'a>(
    sim: &'a mut Simulation,
    name: &str,
    rotation: &Matrix3<f64>,
    primaries: u64,
) -> Result<&'a mut Source, ModelError> {
    let momentum: Vector3<f64> = rotation * Vector3::new(0.0, 0.0, -1.0);
    let source = GenericSource::new("e-")
        .with_energy(EnergySpectrum::Gauss {
            mean: 6.7 * MEV,
            sigma: 0.077 * MEV,
        })
        .with_position(PositionShape::Disc { radius: 2.0 * MM }, [0.0, 0.0, 0.6 * MM])
        .with_direction(Direction::Momentum(momentum))
        .with_primaries(primaries);
    sim.add_source(
        SourceConfig::Generic(source),
        &format!("{name}_e-_source"),
        format!("{name}_target"),
    )
}

/// Adds a 1 nm thick air disc at the bottom of the head and returns its name.
pub fn add_phase_space_plane(sim: &mut Simulation, name: &str) -> Result<String, ModelError> {
    let plane = format!("{name}_phsp_plane");
    add_tube(sim, &plane, name, "G4_AIR", (0.0, 70.0 * MM, 1.0 * NM), -299.99 * MM)?;
    sim.volume_mut(&plane)?.set_color([1.0, 0.0, 0.0, 1.0]);
    Ok(plane)
}

/// Records [`PHASE_SPACE_ATTRIBUTES`] of every particle crossing `plane`.
pub fn add_phase_space<'a>(
    sim: &'a mut Simulation,
    plane: &str,
    output: PathBuf,
) -> Result<&'a mut Actor, ModelError> {
    sim.add_actor(
        ActorConfig::PhaseSpace {
            attributes: PHASE_SPACE_ATTRIBUTES.iter().map(|a| a.to_string()).collect(),
            output,
        },
        &format!("{plane}_phsp"),
        plane,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::transform::euler_rotation;
    use crate::core::models::volume::Solid;
    use crate::engine::progress::ProgressReporter;
    use crate::engine::transport::StubEngine;

    fn full_head(sim: &mut Simulation) {
        elekta_synergy(sim, "linac").unwrap();
        enable_brem_splitting(sim, "linac", 10).unwrap();
        add_electron_source(sim, "linac", &Matrix3::identity(), 200).unwrap();
        let plane = add_phase_space_plane(sim, "linac").unwrap();
        add_phase_space(sim, &plane, PathBuf::from("phsp.csv")).unwrap();
    }

    #[test]
    fn head_finalizes_without_overlaps() {
        let mut sim = Simulation::default();
        full_head(&mut sim);
        assert!(sim.config().check_overlaps);

        let contract = sim.initialize().unwrap();
        assert!(contract.geometry.overlaps().is_empty(), "{:?}", contract.geometry.overlaps());
        // world, head, 4 target parts, collimator, filter + 6 cones, chamber + 12 layers,
        // plate, mirror + 2 layers, 2 kill volumes, phase-space plane
        assert_eq!(contract.geometry.len(), 34);
        assert_eq!(
            contract.geometry.path_to("linac_target").unwrap(),
            ["world", "linac", "linac_target_support", "linac_target"]
        );
    }

    #[test]
    fn kill_actor_spans_both_kill_volumes() {
        let mut sim = Simulation::default();
        full_head(&mut sim);
        let contract = sim.initialize().unwrap();
        let kill = contract
            .attachments
            .actors
            .iter()
            .find(|a| a.config == ActorConfig::Kill)
            .unwrap();
        let names: Vec<_> = kill.targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            ["linac_target_support_kill_volume1", "linac_target_support_kill_volume2"]
        );
    }

    #[test]
    fn mirror_is_tilted_about_x() {
        let mut sim = Simulation::default();
        full_head(&mut sim);
        let contract = sim.initialize().unwrap();
        let mirror = contract.geometry.find("linac_mirror").unwrap();
        let r = mirror.world.rotation.matrix();
        assert!((r[(1, 1)] - (37.5 * DEG).cos()).abs() < 1e-12);
        assert!((r[(2, 1)] - (37.5 * DEG).sin()).abs() < 1e-12);
        assert!(matches!(mirror.solid, Solid::Box { .. }));
    }

    #[test]
    fn electron_momentum_follows_the_head_rotation() {
        let mut sim = Simulation::default();
        elekta_synergy(&mut sim, "linac").unwrap();
        let rotation = euler_rotation("ZY", &[38.0 * DEG, 29.0 * DEG]).unwrap();
        sim.volume_mut("linac").unwrap().set_rotation(rotation);
        let source = add_electron_source(&mut sim, "linac", &rotation, 10).unwrap();
        let SourceConfig::Generic(g) = &source.config else {
            panic!("expected a generic source");
        };
        let Direction::Momentum(m) = &g.direction else {
            panic!("expected a momentum direction");
        };
        let expected = rotation * Vector3::new(0.0, 0.0, -1.0);
        assert!((*m - expected).norm() < 1e-12);
        assert!((g.energy.mean() - 6.7).abs() < 1e-12);
    }

    #[test]
    fn linac_materials_are_registered() {
        let mut sim = Simulation::default();
        elekta_synergy(&mut sim, "linac").unwrap();
        let tungsten = sim.materials().resolve("linac_target_tungsten").unwrap();
        assert!((tungsten.density - 19.4).abs() < 1e-12);
        assert!(tungsten.mass_fraction_of("W") > 0.89);
        assert!(sim.materials().contains("linac_mylar"));
        assert!(matches!(
            elekta_synergy(&mut sim, "linac"),
            Err(ModelError::DuplicateName { .. })
        ));
    }

    #[test]
    fn phase_space_is_written_by_the_stub_engine() {
        let dir = tempfile::tempdir().unwrap();
        let mut sim = Simulation::default();
        sim.config_mut().output_dir = dir.path().to_path_buf();
        full_head(&mut sim);
        let stats = sim.run(&StubEngine, &ProgressReporter::new()).unwrap();
        assert_eq!(stats.events(), 200);
        assert!(dir.path().join("phsp.csv").exists());
    }
}
