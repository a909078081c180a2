use std::sync::Arc;

use emberfall_gameframework::{GameEngine, GameInstance, InstanceStartedSubscription};

/// One activatable unit of feature behavior. The host calls the two entry
/// points exactly once each per activation cycle, activate before
/// deactivate; re-activation after deactivation must work.
pub trait GameFeatureAction: Send + Sync {
    fn on_activating(&self, engine: &GameEngine);
    fn on_deactivating(&self, engine: &GameEngine);
}

/// Run `attach` for every already-running instance and subscribe it for
/// instances started later. Attachment ends when the returned subscription
/// drops. Filtering (e.g. skipping editor worlds) is the attach closure's
/// responsibility.
pub(crate) fn attach_world_action(
    engine: &GameEngine,
    attach: Arc<dyn Fn(&Arc<GameInstance>) + Send + Sync>,
) -> InstanceStartedSubscription {
    let subscription = engine.subscribe_instance_started({
        let attach = Arc::clone(&attach);
        move |instance| attach(instance)
    });
    for instance in engine.instances() {
        attach(&instance);
    }
    subscription
}
