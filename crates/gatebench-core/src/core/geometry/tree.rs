use super::overlap::{Overlap, detect_overlaps};
use crate::core::error::{EntityKind, ModelError};
use crate::core::materials::registry::MaterialRegistry;
use crate::core::models::ids::VolumeId;
use crate::core::models::volume::{Placement, Shape, ShapeKind, Solid, Volume, WORLD};
use crate::core::units::M;
use slotmap::{SecondaryMap, SlotMap};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info, instrument};

const DEFAULT_WORLD_SIZE: f64 = 3.0 * M;
const DEFAULT_WORLD_MATERIAL: &str = "G4_AIR";

/// Options of the finalization pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizeOptions {
    pub check_overlaps: bool,
    /// Penetration depth in mm below which touching volumes are not reported.
    pub overlap_tolerance: f64,
}

impl Default for FinalizeOptions {
    fn default() -> Self {
        Self {
            check_overlaps: false,
            overlap_tolerance: 1e-9,
        }
    }
}

/// The mutable volume hierarchy of one simulation build.
///
/// Volumes live in an arena and are addressed by name. The tree always contains the root
/// volume [`WORLD`]; every other volume's mother defaults to it.
#[derive(Debug, Clone)]
pub struct GeometryTree {
    volumes: SlotMap<VolumeId, Volume>,
    name_index: HashMap<String, VolumeId>,
    /// Insertion order, used to keep finalization deterministic.
    order: Vec<VolumeId>,
    world: VolumeId,
}

impl Default for GeometryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl GeometryTree {
    /// Creates a tree holding only the world volume (a 3 m air box).
    pub fn new() -> Self {
        let mut volumes = SlotMap::with_key();
        let mut world = Volume::new(WORLD, ShapeKind::Box, None);
        world
            .set_shape(Shape::cuboid([DEFAULT_WORLD_SIZE; 3]))
            .set_material(DEFAULT_WORLD_MATERIAL);
        let world_id = volumes.insert(world);
        Self {
            volumes,
            name_index: HashMap::from([(WORLD.to_string(), world_id)]),
            order: vec![world_id],
            world: world_id,
        }
    }

    /// Adds a new volume whose mother is the world until reassigned.
    ///
    /// # Arguments
    ///
    /// * `kind` - The shape family; its parameters start unset.
    /// * `name` - Name unique within this tree.
    ///
    /// # Return
    ///
    /// A mutable handle to configure the new volume.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DuplicateName`] if the name exists; the tree is left unchanged.
    pub fn add_volume(&mut self, kind: ShapeKind, name: &str) -> Result<&mut Volume, ModelError> {
        if self.name_index.contains_key(name) {
            return Err(ModelError::DuplicateName {
                kind: EntityKind::Volume,
                name: name.to_string(),
            });
        }
        let id = self.volumes.insert(Volume::new(name, kind, Some(WORLD)));
        self.name_index.insert(name.to_string(), id);
        self.order.push(id);
        debug!(volume = name, kind = %kind, "Added volume.");
        Ok(&mut self.volumes[id])
    }

    pub fn volume(&self, name: &str) -> Result<&Volume, ModelError> {
        self.name_index
            .get(name)
            .and_then(|&id| self.volumes.get(id))
            .ok_or_else(|| not_found(name))
    }

    pub fn volume_mut(&mut self, name: &str) -> Result<&mut Volume, ModelError> {
        self.name_index
            .get(name)
            .and_then(|&id| self.volumes.get_mut(id))
            .ok_or_else(|| not_found(name))
    }

    pub fn world(&self) -> &Volume {
        &self.volumes[self.world]
    }

    pub fn world_mut(&mut self) -> &mut Volume {
        &mut self.volumes[self.world]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.name_index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Volumes in insertion order, world first.
    pub fn iter(&self) -> impl Iterator<Item = &Volume> {
        self.order.iter().filter_map(|&id| self.volumes.get(id))
    }

    /// Validates the tree and computes every volume's world placement.
    ///
    /// The pass checks, in order: mother references, acyclicity, materials, shapes and
    /// rotations. It then orders volumes parents-first and composes
    /// `W(v) = W(mother) * L(v)` with the root at identity. Overlaps are only searched
    /// for when `options.check_overlaps` is set, and are reported, never corrected.
    #[instrument(skip_all, name = "geometry_finalize")]
    pub fn finalize(
        &self,
        materials: &MaterialRegistry,
        options: &FinalizeOptions,
    ) -> Result<ResolvedTree, ModelError> {
        info!(volumes = self.volumes.len(), "Finalizing geometry.");

        let mothers = self.resolve_mothers()?;
        self.check_acyclic(&mothers)?;

        let mut children: SecondaryMap<VolumeId, Vec<VolumeId>> = SecondaryMap::new();
        for &id in &self.order {
            children.insert(id, Vec::new());
        }
        for &id in &self.order {
            if let Some(&mother) = mothers.get(id) {
                if let Some(list) = children.get_mut(mother) {
                    list.push(id);
                }
            }
        }

        let mut parts: SecondaryMap<VolumeId, (String, Solid, Placement)> = SecondaryMap::new();
        for &id in &self.order {
            let volume = &self.volumes[id];
            let material = volume
                .material
                .as_deref()
                .ok_or_else(|| ModelError::unset(volume.name(), "material"))?;
            materials.resolve(material)?;
            let solid = volume.shape.resolve(volume.name())?;
            let local = if id == self.world {
                Placement::identity()
            } else {
                volume.local_placement()?
            };
            parts.insert(id, (material.to_string(), solid, local));
        }

        let mut resolved: SecondaryMap<VolumeId, ResolvedVolume> = SecondaryMap::new();
        let mut topo_order = Vec::with_capacity(self.order.len());
        let mut queue = VecDeque::from([(self.world, 0usize)]);
        while let Some((id, depth)) = queue.pop_front() {
            let volume = &self.volumes[id];
            let Some((material, solid, local)) = parts.remove(id) else {
                continue;
            };
            let mother = mothers.get(id).copied();
            let world = match mother.and_then(|m| resolved.get(m)) {
                Some(parent) => parent.world * local,
                None => local,
            };
            resolved.insert(
                id,
                ResolvedVolume {
                    id,
                    name: volume.name().to_string(),
                    mother,
                    material,
                    solid,
                    local,
                    world,
                    depth,
                    color: volume.color,
                    visible: volume.visible,
                },
            );
            topo_order.push(id);
            if let Some(kids) = children.get(id) {
                queue.extend(kids.iter().map(|&k| (k, depth + 1)));
            }
        }

        let name_index = topo_order
            .iter()
            .map(|&id| (self.volumes[id].name().to_string(), id))
            .collect();

        let mut tree = ResolvedTree {
            volumes: resolved,
            order: topo_order,
            name_index,
            children,
            root: self.world,
            overlaps: Vec::new(),
        };
        if options.check_overlaps {
            tree.overlaps = detect_overlaps(&tree, options.overlap_tolerance);
        }
        info!(
            volumes = tree.len(),
            overlaps = tree.overlaps.len(),
            "Geometry finalized."
        );
        Ok(tree)
    }

    fn resolve_mothers(&self) -> Result<SecondaryMap<VolumeId, VolumeId>, ModelError> {
        let mut mothers = SecondaryMap::new();
        for &id in &self.order {
            let volume = &self.volumes[id];
            match (&volume.mother, id == self.world) {
                (None, true) => {}
                (Some(_), true) => {
                    return Err(ModelError::Resolution {
                        name: volume.name().to_string(),
                        field: "mother",
                        reason: "the world volume cannot have a mother".to_string(),
                    });
                }
                (None, false) => {
                    return Err(ModelError::Resolution {
                        name: volume.name().to_string(),
                        field: "mother",
                        reason: "only the world volume may be a root".to_string(),
                    });
                }
                (Some(mother), false) => {
                    let mother_id = *self.name_index.get(mother).ok_or_else(|| not_found(mother))?;
                    mothers.insert(id, mother_id);
                }
            }
        }
        Ok(mothers)
    }

    fn check_acyclic(&self, mothers: &SecondaryMap<VolumeId, VolumeId>) -> Result<(), ModelError> {
        for &start in &self.order {
            let mut visited = HashSet::from([start]);
            let mut chain = vec![self.volumes[start].name().to_string()];
            let mut current = start;
            // A chain longer than the arena must revisit a node; the visited set catches it first.
            for _ in 0..self.volumes.len() {
                let Some(&mother) = mothers.get(current) else {
                    break;
                };
                chain.push(self.volumes[mother].name().to_string());
                if !visited.insert(mother) {
                    return Err(ModelError::CyclicHierarchy {
                        volume: self.volumes[start].name().to_string(),
                        chain,
                    });
                }
                current = mother;
            }
        }
        Ok(())
    }
}

fn not_found(name: &str) -> ModelError {
    ModelError::NotFound {
        kind: EntityKind::Volume,
        name: name.to_string(),
    }
}

/// A finalized volume with its resolved material, solid and placements.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVolume {
    pub id: VolumeId,
    pub name: String,
    pub mother: Option<VolumeId>,
    pub material: String,
    pub solid: Solid,
    /// Placement in the mother frame.
    pub local: Placement,
    /// Placement in the world frame.
    pub world: Placement,
    /// Distance from the root; the root has depth 0.
    pub depth: usize,
    pub color: [f64; 4],
    pub visible: bool,
}

/// The frozen result of [`GeometryTree::finalize`].
#[derive(Debug, Clone)]
pub struct ResolvedTree {
    volumes: SecondaryMap<VolumeId, ResolvedVolume>,
    /// Parents-before-children order.
    order: Vec<VolumeId>,
    name_index: HashMap<String, VolumeId>,
    children: SecondaryMap<VolumeId, Vec<VolumeId>>,
    root: VolumeId,
    overlaps: Vec<Overlap>,
}

impl ResolvedTree {
    pub fn root(&self) -> &ResolvedVolume {
        &self.volumes[self.root]
    }

    pub fn get(&self, id: VolumeId) -> Option<&ResolvedVolume> {
        self.volumes.get(id)
    }

    pub fn find(&self, name: &str) -> Option<&ResolvedVolume> {
        self.name_index.get(name).and_then(|&id| self.volumes.get(id))
    }

    pub fn id_of(&self, name: &str) -> Option<VolumeId> {
        self.name_index.get(name).copied()
    }

    pub fn children(&self, id: VolumeId) -> &[VolumeId] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Volumes in parents-before-children order.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedVolume> {
        self.order.iter().filter_map(|&id| self.volumes.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn overlaps(&self) -> &[Overlap] {
        &self.overlaps
    }

    /// Names of the volumes from the root down to `name`, inclusive.
    pub fn path_to(&self, name: &str) -> Option<Vec<&str>> {
        let mut current = self.find(name)?;
        let mut path = vec![current.name.as_str()];
        while let Some(mother) = current.mother.and_then(|m| self.volumes.get(m)) {
            path.push(mother.name.as_str());
            current = mother;
        }
        path.reverse();
        Some(path)
    }
}
