use crate::core::error::{EntityKind, ModelError};
use crate::core::geometry::tree::ResolvedTree;
use crate::core::models::attachment::{
    Actor, ActorConfig, Attachment, Emission, EnergySpectrum, Region, RegionConfig, Source,
    SourceConfig, Targets, is_known_attribute,
};
use crate::core::models::ids::VolumeId;
use crate::core::models::volume::Placement;
use tracing::{debug, info, instrument};

/// Sources, actors and region policies of one simulation build, each kind with its own
/// namespace.
#[derive(Debug, Clone, Default)]
pub struct AttachmentSet {
    sources: Vec<Source>,
    actors: Vec<Actor>,
    regions: Vec<Region>,
}

fn insert<'a, C>(
    list: &'a mut Vec<Attachment<C>>,
    kind: EntityKind,
    name: &str,
    targets: Targets,
    config: C,
) -> Result<&'a mut Attachment<C>, ModelError> {
    if list.iter().any(|a| a.name == name) {
        return Err(ModelError::DuplicateName {
            kind,
            name: name.to_string(),
        });
    }
    debug!(%kind, name, targets = ?targets.0, "Added attachment.");
    list.push(Attachment {
        name: name.to_string(),
        targets,
        config,
    });
    let last = list.len() - 1;
    Ok(&mut list[last])
}

impl AttachmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(
        &mut self,
        config: SourceConfig,
        name: &str,
        targets: impl Into<Targets>,
    ) -> Result<&mut Source, ModelError> {
        insert(&mut self.sources, EntityKind::Source, name, targets.into(), config)
    }

    pub fn add_actor(
        &mut self,
        config: ActorConfig,
        name: &str,
        targets: impl Into<Targets>,
    ) -> Result<&mut Actor, ModelError> {
        insert(&mut self.actors, EntityKind::Actor, name, targets.into(), config)
    }

    pub fn add_region(
        &mut self,
        config: RegionConfig,
        name: &str,
        targets: impl Into<Targets>,
    ) -> Result<&mut Region, ModelError> {
        insert(&mut self.regions, EntityKind::Region, name, targets.into(), config)
    }

    pub fn source_mut(&mut self, name: &str) -> Result<&mut Source, ModelError> {
        find_mut(&mut self.sources, EntityKind::Source, name)
    }

    pub fn actor_mut(&mut self, name: &str) -> Result<&mut Actor, ModelError> {
        find_mut(&mut self.actors, EntityKind::Actor, name)
    }

    pub fn region_mut(&mut self, name: &str) -> Result<&mut Region, ModelError> {
        find_mut(&mut self.regions, EntityKind::Region, name)
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Binds every attachment to the volumes of a finalized tree.
    ///
    /// Fails with [`ModelError::DanglingReference`] for a target missing from the tree
    /// and with [`ModelError::Resolution`] for an invalid attachment configuration.
    #[instrument(skip_all, name = "attachment_resolve")]
    pub fn resolve(&self, tree: &ResolvedTree) -> Result<BoundAttachments, ModelError> {
        for source in &self.sources {
            check_source(source)?;
        }
        for actor in &self.actors {
            check_actor(actor)?;
        }
        for region in &self.regions {
            check_region(region)?;
        }

        let bound = BoundAttachments {
            sources: bind_all(&self.sources, EntityKind::Source, tree)?,
            actors: bind_all(&self.actors, EntityKind::Actor, tree)?,
            regions: bind_all(&self.regions, EntityKind::Region, tree)?,
        };
        info!(
            sources = bound.sources.len(),
            actors = bound.actors.len(),
            regions = bound.regions.len(),
            "Attachments resolved."
        );
        Ok(bound)
    }
}

fn find_mut<'a, C>(
    list: &'a mut [Attachment<C>],
    kind: EntityKind,
    name: &str,
) -> Result<&'a mut Attachment<C>, ModelError> {
    list.iter_mut()
        .find(|a| a.name == name)
        .ok_or_else(|| ModelError::NotFound {
            kind,
            name: name.to_string(),
        })
}

fn bind_all<C: Clone>(
    list: &[Attachment<C>],
    kind: EntityKind,
    tree: &ResolvedTree,
) -> Result<Vec<Bound<C>>, ModelError> {
    list.iter()
        .map(|attachment| {
            if attachment.targets.is_empty() {
                return Err(ModelError::Resolution {
                    name: attachment.name.clone(),
                    field: "targets",
                    reason: "no target volume given".to_string(),
                });
            }
            let targets = attachment
                .targets
                .iter()
                .map(|volume| {
                    let resolved = tree.find(volume).ok_or_else(|| ModelError::DanglingReference {
                        kind,
                        attachment: attachment.name.clone(),
                        volume: volume.to_string(),
                    })?;
                    Ok(BoundTarget {
                        volume: resolved.id,
                        name: resolved.name.clone(),
                        world: resolved.world,
                    })
                })
                .collect::<Result<Vec<_>, ModelError>>()?;
            Ok(Bound {
                name: attachment.name.clone(),
                config: attachment.config.clone(),
                targets,
            })
        })
        .collect()
}

fn invalid(name: &str, field: &'static str, reason: String) -> ModelError {
    ModelError::Resolution {
        name: name.to_string(),
        field,
        reason,
    }
}

fn check_spectrum(name: &str, spectrum: &EnergySpectrum) -> Result<(), ModelError> {
    match *spectrum {
        EnergySpectrum::Mono(e) if !(e > 0.0) => {
            Err(invalid(name, "energy", format!("energy must be positive, got {e}")))
        }
        EnergySpectrum::Gauss { mean, sigma } if !(mean > 0.0 && sigma >= 0.0) => Err(invalid(
            name,
            "energy",
            format!("expected positive mean and non-negative sigma, got {mean} / {sigma}"),
        )),
        EnergySpectrum::Range { min, max } if !(min >= 0.0 && min < max) => Err(invalid(
            name,
            "energy",
            format!("expected 0 <= min < max, got {min} / {max}"),
        )),
        _ => Ok(()),
    }
}

fn check_source(source: &Source) -> Result<(), ModelError> {
    let spectrum = match &source.config {
        SourceConfig::Generic(g) => &g.energy,
        SourceConfig::Voxelized { energy, .. } => energy,
    };
    check_spectrum(&source.name, spectrum)?;
    if let Emission::Activity(a) = source.config.emission() {
        if !(a >= 0.0) {
            return Err(invalid(
                &source.name,
                "activity",
                format!("activity must be non-negative, got {a}"),
            ));
        }
    }
    if source.config.particle().trim().is_empty() {
        return Err(invalid(&source.name, "particle", "particle is not set".to_string()));
    }
    Ok(())
}

fn check_actor(actor: &Actor) -> Result<(), ModelError> {
    match &actor.config {
        ActorConfig::PhaseSpace { attributes, .. } | ActorConfig::Hits { attributes, .. } => {
            if attributes.is_empty() {
                return Err(invalid(
                    &actor.name,
                    "attributes",
                    "at least one attribute must be recorded".to_string(),
                ));
            }
            if let Some(unknown) = attributes.iter().find(|a| !is_known_attribute(a)) {
                return Err(invalid(
                    &actor.name,
                    "attributes",
                    format!("unknown attribute '{unknown}'"),
                ));
            }
        }
        ActorConfig::Projection { size, spacing, .. } => {
            if size.contains(&0) || spacing.iter().any(|s| !(*s > 0.0)) {
                return Err(invalid(
                    &actor.name,
                    "size",
                    format!("projection needs non-empty size and positive spacing, got {size:?} / {spacing:?}"),
                ));
            }
        }
        ActorConfig::Statistics { .. } | ActorConfig::Kill => {}
    }
    Ok(())
}

fn check_region(region: &Region) -> Result<(), ModelError> {
    if let Some(cut) = region.config.production_cut {
        if !(cut > 0.0) {
            return Err(invalid(
                &region.name,
                "production_cut",
                format!("cut must be positive, got {cut}"),
            ));
        }
    }
    if region.config.brem_splitting == Some(0) {
        return Err(invalid(
            &region.name,
            "brem_splitting",
            "splitting factor must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// A target volume resolved to its arena key and world placement.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundTarget {
    pub volume: VolumeId,
    pub name: String,
    pub world: Placement,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bound<C> {
    pub name: String,
    pub config: C,
    pub targets: Vec<BoundTarget>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundAttachments {
    pub sources: Vec<Bound<SourceConfig>>,
    pub actors: Vec<Bound<ActorConfig>>,
    pub regions: Vec<Bound<RegionConfig>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::tree::{FinalizeOptions, GeometryTree};
    use crate::core::materials::registry::MaterialRegistry;
    use crate::core::models::attachment::GenericSource;
    use crate::core::models::volume::{Shape, ShapeKind};
    use nalgebra::Vector3;
    use std::path::PathBuf;

    fn tree() -> ResolvedTree {
        let mut tree = GeometryTree::new();
        tree.add_volume(ShapeKind::Box, "detector")
            .unwrap()
            .set_shape(Shape::cuboid([10.0; 3]))
            .set_material("G4_WATER")
            .set_translation([0.0, 0.0, 100.0]);
        tree.finalize(&MaterialRegistry::with_nist(), &FinalizeOptions::default())
            .unwrap()
    }

    fn gamma() -> SourceConfig {
        SourceConfig::Generic(GenericSource::new("gamma").with_primaries(10))
    }

    #[test]
    fn names_are_unique_per_kind_only() {
        let mut set = AttachmentSet::new();
        set.add_source(gamma(), "x", "world").unwrap();
        set.add_actor(ActorConfig::statistics(), "x", "world").unwrap();
        let err = set.add_source(gamma(), "x", "detector").unwrap_err();
        assert_eq!(
            err,
            ModelError::DuplicateName {
                kind: EntityKind::Source,
                name: "x".into()
            }
        );
        assert_eq!(set.sources().len(), 1);
        assert_eq!(set.sources()[0].targets, Targets::from("world"));
    }

    #[test]
    fn resolution_binds_targets_with_world_placement() {
        let tree = tree();
        let mut set = AttachmentSet::new();
        set.add_actor(ActorConfig::Kill, "kill", ["world", "detector"]).unwrap();
        let bound = set.resolve(&tree).unwrap();
        let targets = &bound.actors[0].targets;
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[1].volume, tree.id_of("detector").unwrap());
        assert_eq!(targets[1].world.translation.vector, Vector3::new(0.0, 0.0, 100.0));
    }

    #[test]
    fn missing_target_is_a_dangling_reference() {
        let mut set = AttachmentSet::new();
        set.add_actor(ActorConfig::statistics(), "stats", ["world", "crystal"])
            .unwrap();
        let err = set.resolve(&tree()).unwrap_err();
        assert_eq!(
            err,
            ModelError::DanglingReference {
                kind: EntityKind::Actor,
                attachment: "stats".into(),
                volume: "crystal".into()
            }
        );
    }

    #[test]
    fn unknown_actor_attribute_is_rejected() {
        let mut set = AttachmentSet::new();
        set.add_actor(
            ActorConfig::PhaseSpace {
                attributes: vec!["KineticEnergy".into(), "Mood".into()],
                output: PathBuf::from("phsp.csv"),
            },
            "phsp",
            "detector",
        )
        .unwrap();
        let err = set.resolve(&tree()).unwrap_err();
        assert!(matches!(err, ModelError::Resolution { field: "attributes", .. }));
    }

    #[test]
    fn invalid_source_and_region_settings_are_rejected() {
        let mut set = AttachmentSet::new();
        set.add_source(
            SourceConfig::Generic(
                GenericSource::new("e-").with_energy(EnergySpectrum::Range { min: 2.0, max: 1.0 }),
            ),
            "beam",
            "world",
        )
        .unwrap();
        assert!(matches!(
            set.resolve(&tree()),
            Err(ModelError::Resolution { field: "energy", .. })
        ));

        let mut set = AttachmentSet::new();
        set.add_region(
            RegionConfig {
                production_cut: None,
                brem_splitting: Some(0),
            },
            "target",
            "detector",
        )
        .unwrap();
        assert!(matches!(
            set.resolve(&tree()),
            Err(ModelError::Resolution { field: "brem_splitting", .. })
        ));
    }

    #[test]
    fn attachments_can_be_edited_after_insertion() {
        let mut set = AttachmentSet::new();
        set.add_source(gamma(), "src", "world").unwrap();
        set.source_mut("src").unwrap().targets = Targets::from("detector");
        let bound = set.resolve(&tree()).unwrap();
        assert_eq!(bound.sources[0].targets[0].name, "detector");
        assert!(matches!(set.actor_mut("src"), Err(ModelError::NotFound { .. })));
    }
}
