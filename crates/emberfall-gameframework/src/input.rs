use std::collections::HashMap;

use tracing::debug;

use crate::abilities::AbilityHandle;
use crate::actor::{ComponentTypeId, FrameworkComponent};
use crate::assets::AssetPath;

/// Binds input actions to granted abilities for one actor.
#[derive(Debug, Default)]
pub struct AbilityInputBindingComponent {
    bindings: HashMap<AbilityHandle, AssetPath>,
}

impl FrameworkComponent for AbilityInputBindingComponent {
    const TYPE_ID: ComponentTypeId = ComponentTypeId("ability_input_binding");
}

impl AbilityInputBindingComponent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn setup_input_binding(&mut self, action: AssetPath, handle: AbilityHandle) {
        debug!(
            target: "emberfall_gameframework::input",
            grant = %handle,
            action = %action,
            "input binding set up"
        );
        if self.bindings.insert(handle, action).is_some() {
            debug!(
                target: "emberfall_gameframework::input",
                grant = %handle,
                "previous binding replaced"
            );
        }
    }

    pub fn clear_input_binding(&mut self, handle: AbilityHandle) -> bool {
        self.bindings.remove(&handle).is_some()
    }

    pub fn bound_action(&self, handle: AbilityHandle) -> Option<&AssetPath> {
        self.bindings.get(&handle)
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }
}
