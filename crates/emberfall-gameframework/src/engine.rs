use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::abilities::AbilitySystemComponent;
use crate::assets::AssetCatalog;
use crate::component_manager::GameFrameworkComponentManager;
use crate::input::AbilityInputBindingComponent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldKind {
    Game,
    Editor,
    Preview,
}

impl WorldKind {
    pub fn is_game_world(self) -> bool {
        matches!(self, Self::Game)
    }
}

/// One running world with its component manager and asset catalog.
pub struct GameInstance {
    world_kind: WorldKind,
    component_manager: GameFrameworkComponentManager,
    assets: AssetCatalog,
}

impl GameInstance {
    pub fn new(world_kind: WorldKind) -> Arc<Self> {
        let component_manager = GameFrameworkComponentManager::new();
        component_manager.register_component_factory(AbilitySystemComponent::new);
        component_manager.register_component_factory(AbilityInputBindingComponent::new);
        Arc::new(Self {
            world_kind,
            component_manager,
            assets: AssetCatalog::new(),
        })
    }

    pub fn world_kind(&self) -> WorldKind {
        self.world_kind
    }

    pub fn component_manager(&self) -> &GameFrameworkComponentManager {
        &self.component_manager
    }

    pub fn assets(&self) -> &AssetCatalog {
        &self.assets
    }
}

type InstanceStartedCallback = Arc<dyn Fn(&Arc<GameInstance>) + Send + Sync>;

#[derive(Default)]
struct EngineState {
    instances: Vec<Arc<GameInstance>>,
    subscribers: HashMap<u64, InstanceStartedCallback>,
}

#[derive(Default)]
struct EngineShared {
    next_subscription: AtomicU64,
    state: Mutex<EngineState>,
}

/// Registry of running game instances plus instance-started notifications.
#[derive(Clone, Default)]
pub struct GameEngine {
    shared: Arc<EngineShared>,
}

impl GameEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_instance(&self, world_kind: WorldKind) -> Arc<GameInstance> {
        let instance = GameInstance::new(world_kind);
        let subscribers = {
            let Ok(mut state) = self.shared.state.lock() else {
                return instance;
            };
            state.instances.push(Arc::clone(&instance));
            let mut subscribers: Vec<(u64, InstanceStartedCallback)> = state
                .subscribers
                .iter()
                .map(|(id, callback)| (*id, Arc::clone(callback)))
                .collect();
            subscribers.sort_by_key(|(id, _)| *id);
            subscribers
        };
        debug!(
            target: "emberfall_gameframework::engine",
            world_kind = ?world_kind,
            subscribers = subscribers.len(),
            "game instance started"
        );
        for (_, callback) in subscribers {
            callback(&instance);
        }
        instance
    }

    pub fn instances(&self) -> Vec<Arc<GameInstance>> {
        self.shared
            .state
            .lock()
            .map(|state| state.instances.clone())
            .unwrap_or_default()
    }

    /// Subscribe to instance-started notifications. The subscription ends
    /// when the returned handle drops.
    pub fn subscribe_instance_started(
        &self,
        callback: impl Fn(&Arc<GameInstance>) + Send + Sync + 'static,
    ) -> InstanceStartedSubscription {
        let id = self.shared.next_subscription.fetch_add(1, Ordering::Relaxed) + 1;
        if let Ok(mut state) = self.shared.state.lock() {
            state.subscribers.insert(id, Arc::new(callback));
        }
        InstanceStartedSubscription {
            shared: Arc::clone(&self.shared),
            id,
        }
    }
}

/// Live instance-started subscription. Dropping it unsubscribes.
pub struct InstanceStartedSubscription {
    shared: Arc<EngineShared>,
    id: u64,
}

impl Drop for InstanceStartedSubscription {
    fn drop(&mut self) {
        if let Ok(mut state) = self.shared.state.lock() {
            state.subscribers.remove(&self.id);
        }
    }
}
