use std::fmt;

use emberfall_gameframework::GameEngine;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::action::GameFeatureAction;
use crate::add_abilities::AddAbilitiesAction;
use crate::discover::GameFeatureDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameFeatureState {
    Registered,
    Active,
}

impl GameFeatureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Active => "active",
        }
    }
}

impl fmt::Display for GameFeatureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named feature and its actions. Activation runs every action's
/// activating hook in order; deactivation runs the deactivating hooks in
/// reverse order. A feature can be activated again after deactivation.
pub struct GameFeature {
    name: String,
    actions: Vec<Box<dyn GameFeatureAction>>,
    state: GameFeatureState,
}

impl GameFeature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
            state: GameFeatureState::Registered,
        }
    }

    /// Build a feature from a declarative definition. An add-abilities
    /// action is attached when the definition carries ability entries.
    pub fn from_definition(definition: GameFeatureDefinition) -> Self {
        let mut feature = Self::new(definition.name);
        if !definition.abilities.is_empty() {
            feature.push_action(Box::new(AddAbilitiesAction::new(definition.abilities)));
        }
        feature
    }

    pub fn push_action(&mut self, action: Box<dyn GameFeatureAction>) {
        self.actions.push(action);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> GameFeatureState {
        self.state
    }

    pub fn activate(&mut self, engine: &GameEngine) -> bool {
        if self.state == GameFeatureState::Active {
            warn!(
                target: "emberfall_gamefeatures::feature",
                feature = %self.name,
                "feature already active; activation ignored"
            );
            return false;
        }
        for action in &self.actions {
            action.on_activating(engine);
        }
        self.state = GameFeatureState::Active;
        info!(
            target: "emberfall_gamefeatures::feature",
            feature = %self.name,
            actions = self.actions.len(),
            "game feature activated"
        );
        true
    }

    pub fn deactivate(&mut self, engine: &GameEngine) -> bool {
        if self.state != GameFeatureState::Active {
            warn!(
                target: "emberfall_gamefeatures::feature",
                feature = %self.name,
                "feature not active; deactivation ignored"
            );
            return false;
        }
        for action in self.actions.iter().rev() {
            action.on_deactivating(engine);
        }
        self.state = GameFeatureState::Registered;
        info!(
            target: "emberfall_gamefeatures::feature",
            feature = %self.name,
            "game feature deactivated"
        );
        true
    }
}
