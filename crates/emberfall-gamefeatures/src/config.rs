use emberfall_gameframework::{ActorClassName, AssetPath};
use serde::{Deserialize, Serialize};

/// One ability to grant, with an optional input action to bind it to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbilityMapping {
    #[serde(default)]
    pub ability_type: Option<AssetPath>,
    #[serde(default)]
    pub input_action: Option<AssetPath>,
}

impl AbilityMapping {
    pub fn new(ability_type: impl Into<AssetPath>) -> Self {
        Self {
            ability_type: Some(ability_type.into()),
            input_action: None,
        }
    }

    pub fn with_input_action(mut self, input_action: impl Into<AssetPath>) -> Self {
        self.input_action = Some(input_action.into());
        self
    }
}

/// One attribute set to attach, with optional initialization data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeSetMapping {
    #[serde(default)]
    pub attribute_set_type: Option<AssetPath>,
    #[serde(default)]
    pub init_table: Option<AssetPath>,
}

impl AttributeSetMapping {
    pub fn new(attribute_set_type: impl Into<AssetPath>) -> Self {
        Self {
            attribute_set_type: Some(attribute_set_type.into()),
            init_table: None,
        }
    }

    pub fn with_init_table(mut self, init_table: impl Into<AssetPath>) -> Self {
        self.init_table = Some(init_table.into());
        self
    }
}

/// Everything one actor class receives while the feature is active.
/// Entries are position-indexed; the index routes extension events back to
/// their originating entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbilitiesEntry {
    #[serde(default)]
    pub actor_class: Option<ActorClassName>,
    #[serde(default)]
    pub abilities: Vec<AbilityMapping>,
    #[serde(default)]
    pub attributes: Vec<AttributeSetMapping>,
}

impl AbilitiesEntry {
    pub fn for_actor_class(actor_class: impl Into<ActorClassName>) -> Self {
        Self {
            actor_class: Some(actor_class.into()),
            abilities: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn with_ability(mut self, mapping: AbilityMapping) -> Self {
        self.abilities.push(mapping);
        self
    }

    pub fn with_attribute_set(mut self, mapping: AttributeSetMapping) -> Self {
        self.attributes.push(mapping);
        self
    }
}
