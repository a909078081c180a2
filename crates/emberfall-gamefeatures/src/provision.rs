use std::sync::{Arc, Mutex};

use emberfall_gameframework::{
    ActorId, ComponentOriginPolicy, ComponentRequestHandle, FrameworkComponent, GameInstance,
};
use tracing::{debug, error, warn};

use crate::config::AbilitiesEntry;

/// Typed find-or-request against one actor. Existing components are only
/// re-requested when the origin policy attributes them to the dynamic
/// component system; authored components are not this system's to
/// refcount. Every issued request handle is retained here and released in
/// bulk at reset.
pub(crate) struct ComponentProvisioner {
    policy: Arc<dyn ComponentOriginPolicy>,
    requests: Vec<ComponentRequestHandle>,
}

impl ComponentProvisioner {
    pub(crate) fn new(policy: Arc<dyn ComponentOriginPolicy>) -> Self {
        Self {
            policy,
            requests: Vec::new(),
        }
    }

    pub(crate) fn outstanding_requests(&self) -> usize {
        self.requests.len()
    }

    /// Release every retained request handle. A no-op when none are held.
    pub(crate) fn release_all(&mut self) {
        if !self.requests.is_empty() {
            debug!(
                target: "emberfall_gamefeatures::provision",
                released = self.requests.len(),
                "releasing component presence requests"
            );
        }
        self.requests.clear();
    }

    pub(crate) fn find_or_request<T: FrameworkComponent>(
        &mut self,
        instance: &Arc<GameInstance>,
        actor: ActorId,
        entry: &AbilitiesEntry,
    ) -> Option<Arc<Mutex<T>>> {
        let manager = instance.component_manager();
        if !manager.contains_actor(actor) {
            warn!(
                target: "emberfall_gamefeatures::provision",
                actor = %actor,
                component = %T::TYPE_ID,
                "actor has no reachable instance context; cannot provision"
            );
            return None;
        }

        let existing = manager.find_component::<T>(actor);
        let make_request = match &existing {
            None => true,
            Some(_) => manager
                .component_provenance(actor, T::TYPE_ID)
                .map(|provenance| self.policy.is_dynamically_placed(&provenance))
                .unwrap_or(true),
        };
        if !make_request {
            return existing;
        }

        let actor_class = match entry.actor_class.clone() {
            Some(class) => class,
            None => manager.actor_class(actor)?,
        };
        match manager.add_component_request(actor_class, T::TYPE_ID) {
            Ok(handle) => self.requests.push(handle),
            Err(error) => {
                error!(
                    target: "emberfall_gamefeatures::provision",
                    actor = %actor,
                    component = %T::TYPE_ID,
                    "component presence request failed: {error}"
                );
            },
        }

        let resolved = manager.find_component::<T>(actor);
        if resolved.is_none() {
            // The manager satisfies requests synchronously, so this means
            // the configuration is broken, not that the component is late.
            error!(
                target: "emberfall_gamefeatures::provision",
                actor = %actor,
                component = %T::TYPE_ID,
                "component still absent after a presence request"
            );
        }
        resolved
    }
}
