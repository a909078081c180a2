use crate::actor::{ComponentCreationMethod, ComponentProvenance};

/// Decides whether a component already present on an actor was placed by
/// the dynamic component system, and is therefore subject to request
/// refcounting, or was hand-authored outside it.
pub trait ComponentOriginPolicy: Send + Sync {
    fn is_dynamically_placed(&self, provenance: &ComponentProvenance) -> bool;
}

/// Default heuristic: authored components are never the framework's
/// responsibility. Runtime-added components are attributed to the dynamic
/// component system when their originating archetype is a class-default
/// placeholder. When the archetype cannot be inspected, assume dynamic.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchetypeOriginPolicy;

impl ComponentOriginPolicy for ArchetypeOriginPolicy {
    fn is_dynamically_placed(&self, provenance: &ComponentProvenance) -> bool {
        match provenance.creation_method {
            ComponentCreationMethod::Authored => false,
            ComponentCreationMethod::Native => {
                provenance.archetype_is_class_default.unwrap_or(true)
            },
        }
    }
}
