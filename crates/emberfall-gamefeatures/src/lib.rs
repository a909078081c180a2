//! Game-feature actions that grant abilities and attribute sets to actors
//! as they enter and leave the modular-gameplay extension scope, and
//! reverse every grant when the feature deactivates.

pub mod action;
pub mod add_abilities;
pub mod bundles;
pub mod config;
pub mod discover;
pub mod feature;
mod grants;
mod provision;
pub mod validation;

pub use action::GameFeatureAction;
pub use add_abilities::AddAbilitiesAction;
pub use config::{AbilitiesEntry, AbilityMapping, AttributeSetMapping};
pub use discover::{
    DiscoveredFeature, FEATURE_DEFINITION_FILE_NAME, GameFeatureDefinition, discover_features,
    read_definition,
};
pub use feature::{GameFeature, GameFeatureState};
pub use grants::ExtensionRecordSummary;
pub use validation::validate_entries;
