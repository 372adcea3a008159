use std::fmt;
use thiserror::Error;

/// The kind of named entity a construction error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Volume,
    Material,
    Element,
    Source,
    Actor,
    Region,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Volume => "volume",
            EntityKind::Material => "material",
            EntityKind::Element => "element",
            EntityKind::Source => "source",
            EntityKind::Actor => "actor",
            EntityKind::Region => "region",
        })
    }
}

/// Construction-time failures of a simulation description.
///
/// These indicate configuration defects and are fatal to the run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("A {kind} named '{name}' already exists")]
    DuplicateName { kind: EntityKind, name: String },

    #[error("No {kind} named '{name}'")]
    NotFound { kind: EntityKind, name: String },

    #[error("Mother chain of volume '{volume}' is cyclic: {}", .chain.join(" -> "))]
    CyclicHierarchy { volume: String, chain: Vec<String> },

    #[error("Invalid composition for material '{material}': {reason}")]
    InvalidComposition { material: String, reason: String },

    #[error("{kind} '{attachment}' targets volume '{volume}', which is not in the geometry")]
    DanglingReference {
        kind: EntityKind,
        attachment: String,
        volume: String,
    },

    #[error("Cannot resolve field '{field}' of '{name}': {reason}")]
    Resolution {
        name: String,
        field: &'static str,
        reason: String,
    },
}

impl ModelError {
    pub(crate) fn unset(name: &str, field: &'static str) -> Self {
        ModelError::Resolution {
            name: name.to_string(),
            field,
            reason: "required field is not set".to_string(),
        }
    }
}
