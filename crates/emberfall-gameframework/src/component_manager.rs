use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::actor::{
    Actor, ActorClassName, ActorId, ComponentProvenance, ComponentSlot, ComponentTypeId,
    FrameworkComponent,
};
use crate::error::{Error, Result};

/// Notification delivered to extension handlers as actors move through the
/// dynamic extension scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionEventKind {
    /// An actor registered as an extension receiver.
    ReceiverAdded,
    /// A handler observed an actor already inside the extension scope.
    ExtensionAdded,
    /// Game code signalled that an actor is leaving the extension scope.
    ExtensionRemoved,
    /// An actor unregistered as an extension receiver.
    ReceiverRemoved,
    /// Game code signalled that an actor is fully initialized.
    ActorReady,
}

impl ExtensionEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReceiverAdded => "receiver_added",
            Self::ExtensionAdded => "extension_added",
            Self::ExtensionRemoved => "extension_removed",
            Self::ReceiverRemoved => "receiver_removed",
            Self::ActorReady => "actor_ready",
        }
    }
}

impl fmt::Display for ExtensionEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type ExtensionHandler = Arc<dyn Fn(ActorId, ExtensionEventKind) + Send + Sync>;

type ComponentFactory = Arc<dyn Fn() -> Arc<dyn Any + Send + Sync> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct HandlerId(u64);

struct HandlerEntry {
    actor_class: ActorClassName,
    handler: ExtensionHandler,
}

type RequestKey = (ActorClassName, ComponentTypeId);

#[derive(Default)]
struct ManagerState {
    actors: HashMap<ActorId, Actor>,
    handlers: HashMap<HandlerId, HandlerEntry>,
    factories: HashMap<ComponentTypeId, ComponentFactory>,
    request_counts: HashMap<RequestKey, usize>,
}

impl ManagerState {
    fn handlers_for_class(&self, class: &ActorClassName) -> Vec<ExtensionHandler> {
        let mut matching: Vec<(HandlerId, ExtensionHandler)> = self
            .handlers
            .iter()
            .filter(|(_, entry)| &entry.actor_class == class)
            .map(|(id, entry)| (*id, Arc::clone(&entry.handler)))
            .collect();
        // Registration order, so delivery is deterministic.
        matching.sort_by_key(|(id, _)| *id);
        matching.into_iter().map(|(_, handler)| handler).collect()
    }

    fn receiver_ids_of_class(&self, class: &ActorClassName) -> Vec<ActorId> {
        let mut ids: Vec<ActorId> = self
            .actors
            .iter()
            .filter(|(_, actor)| actor.is_receiver && &actor.class == class)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    /// Create the requested component on every receiver of the class that
    /// does not already carry one. Missing factories were rejected when
    /// the request was made.
    fn apply_request_to_receivers(&mut self, key: &RequestKey) {
        let Some(factory) = self.factories.get(&key.1).map(Arc::clone) else {
            return;
        };
        for actor in self.actors.values_mut() {
            if !actor.is_receiver || actor.class != key.0 {
                continue;
            }
            if actor.components.contains_key(&key.1) {
                continue;
            }
            actor.components.insert(
                key.1,
                ComponentSlot {
                    type_id: key.1,
                    provenance: ComponentProvenance::runtime_added(),
                    from_request: true,
                    instance: factory(),
                },
            );
        }
    }

    /// Create components for every outstanding request matching this
    /// actor's class. Used when an actor becomes a receiver.
    fn apply_outstanding_requests(&mut self, actor_id: ActorId) {
        let keys: Vec<RequestKey> = self
            .request_counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(key, _)| key.clone())
            .collect();
        for key in keys {
            let Some(actor) = self.actors.get(&actor_id) else {
                return;
            };
            if actor.class != key.0 {
                continue;
            }
            self.apply_request_to_receivers(&key);
        }
    }
}

#[derive(Default)]
struct ManagerShared {
    next_actor_id: AtomicU64,
    next_handler_id: AtomicU64,
    state: Mutex<ManagerState>,
}

/// Keeps requested components present on extension-receiver actors and
/// delivers extension events to class-scoped handlers.
///
/// Dispatch is synchronous: handlers run on the caller's thread and the
/// manager's lock is released before any handler is invoked, so handlers
/// may call back into the manager.
#[derive(Clone, Default)]
pub struct GameFrameworkComponentManager {
    shared: Arc<ManagerShared>,
}

impl GameFrameworkComponentManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_component_factory<T, F>(&self, build: F)
    where
        T: FrameworkComponent,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let factory: ComponentFactory =
            Arc::new(move || Arc::new(Mutex::new(build())) as Arc<dyn Any + Send + Sync>);
        if let Ok(mut state) = self.shared.state.lock() {
            state.factories.insert(T::TYPE_ID, factory);
        }
    }

    pub fn unregister_component_factory(&self, type_id: ComponentTypeId) {
        if let Ok(mut state) = self.shared.state.lock() {
            state.factories.remove(&type_id);
        }
    }

    pub fn spawn_actor(&self, class: ActorClassName) -> ActorId {
        let id = ActorId(self.shared.next_actor_id.fetch_add(1, Ordering::Relaxed) + 1);
        if let Ok(mut state) = self.shared.state.lock() {
            state.actors.insert(
                id,
                Actor {
                    class: class.clone(),
                    is_receiver: false,
                    components: HashMap::new(),
                },
            );
        }
        debug!(
            target: "emberfall_gameframework::component_manager",
            actor = %id,
            class = %class,
            "actor spawned"
        );
        id
    }

    /// Place a component on an actor as if it were authored on the actor's
    /// archetype.
    pub fn add_authored_component<T: FrameworkComponent>(
        &self,
        actor: ActorId,
        component: T,
    ) -> Result<()> {
        self.add_component_with_provenance(actor, component, ComponentProvenance::authored())
    }

    pub fn add_component_with_provenance<T: FrameworkComponent>(
        &self,
        actor: ActorId,
        component: T,
        provenance: ComponentProvenance,
    ) -> Result<()> {
        let Ok(mut state) = self.shared.state.lock() else {
            return Ok(());
        };
        let Some(entry) = state.actors.get_mut(&actor) else {
            return Err(Error::UnknownActor { actor });
        };
        entry.components.insert(
            T::TYPE_ID,
            ComponentSlot {
                type_id: T::TYPE_ID,
                provenance,
                from_request: false,
                instance: Arc::new(Mutex::new(component)),
            },
        );
        Ok(())
    }

    /// Register an actor as an extension receiver: outstanding component
    /// requests for its class are applied and matching handlers are told
    /// via `ReceiverAdded`.
    pub fn add_receiver(&self, actor: ActorId) -> Result<()> {
        let (class, handlers) = {
            let Ok(mut state) = self.shared.state.lock() else {
                return Ok(());
            };
            let Some(entry) = state.actors.get_mut(&actor) else {
                return Err(Error::UnknownActor { actor });
            };
            if entry.is_receiver {
                return Ok(());
            }
            entry.is_receiver = true;
            let class = entry.class.clone();
            state.apply_outstanding_requests(actor);
            let handlers = state.handlers_for_class(&class);
            (class, handlers)
        };
        debug!(
            target: "emberfall_gameframework::component_manager",
            actor = %actor,
            class = %class,
            "extension receiver added"
        );
        for handler in handlers {
            handler(actor, ExtensionEventKind::ReceiverAdded);
        }
        Ok(())
    }

    /// Unregister a receiver. Handlers observe `ReceiverRemoved` while the
    /// actor's components are still present; request-created components
    /// are removed afterwards.
    pub fn remove_receiver(&self, actor: ActorId) -> Result<()> {
        let handlers = {
            let Ok(mut state) = self.shared.state.lock() else {
                return Ok(());
            };
            let Some(entry) = state.actors.get_mut(&actor) else {
                return Err(Error::UnknownActor { actor });
            };
            if !entry.is_receiver {
                return Ok(());
            }
            entry.is_receiver = false;
            let class = entry.class.clone();
            state.handlers_for_class(&class)
        };
        for handler in handlers {
            handler(actor, ExtensionEventKind::ReceiverRemoved);
        }
        if let Ok(mut state) = self.shared.state.lock() {
            if let Some(entry) = state.actors.get_mut(&actor) {
                entry.components.retain(|_, slot| !slot.from_request);
            }
        }
        debug!(
            target: "emberfall_gameframework::component_manager",
            actor = %actor,
            "extension receiver removed"
        );
        Ok(())
    }

    /// Deliver an extension event for an actor to every matching handler.
    pub fn send_extension_event(&self, actor: ActorId, kind: ExtensionEventKind) -> Result<()> {
        let handlers = {
            let Ok(state) = self.shared.state.lock() else {
                return Ok(());
            };
            let Some(entry) = state.actors.get(&actor) else {
                return Err(Error::UnknownActor { actor });
            };
            state.handlers_for_class(&entry.class)
        };
        for handler in handlers {
            handler(actor, kind);
        }
        Ok(())
    }

    pub fn notify_actor_ready(&self, actor: ActorId) -> Result<()> {
        self.send_extension_event(actor, ExtensionEventKind::ActorReady)
    }

    pub fn despawn_actor(&self, actor: ActorId) -> Result<()> {
        self.remove_receiver(actor)?;
        if let Ok(mut state) = self.shared.state.lock() {
            state.actors.remove(&actor);
        }
        debug!(
            target: "emberfall_gameframework::component_manager",
            actor = %actor,
            "actor despawned"
        );
        Ok(())
    }

    /// Register a handler for extension events on actors of a class. The
    /// handler immediately observes `ExtensionAdded` for every actor
    /// already inside the extension scope. Registration ends when the
    /// returned handle drops.
    pub fn add_extension_handler(
        &self,
        actor_class: ActorClassName,
        handler: ExtensionHandler,
    ) -> ExtensionHandlerHandle {
        let id = HandlerId(self.shared.next_handler_id.fetch_add(1, Ordering::Relaxed) + 1);
        let existing = {
            let Ok(mut state) = self.shared.state.lock() else {
                return ExtensionHandlerHandle {
                    shared: Arc::clone(&self.shared),
                    id,
                };
            };
            state.handlers.insert(
                id,
                HandlerEntry {
                    actor_class: actor_class.clone(),
                    handler: Arc::clone(&handler),
                },
            );
            state.receiver_ids_of_class(&actor_class)
        };
        debug!(
            target: "emberfall_gameframework::component_manager",
            class = %actor_class,
            existing_receivers = existing.len(),
            "extension handler added"
        );
        for actor in existing {
            handler(actor, ExtensionEventKind::ExtensionAdded);
        }
        ExtensionHandlerHandle {
            shared: Arc::clone(&self.shared),
            id,
        }
    }

    /// Request that a component type be kept present on receivers of a
    /// class. Requests are reference-counted per `(class, type)` key; the
    /// obligation ends when the last handle for the key drops.
    pub fn add_component_request(
        &self,
        actor_class: ActorClassName,
        type_id: ComponentTypeId,
    ) -> Result<ComponentRequestHandle> {
        let key: RequestKey = (actor_class, type_id);
        {
            let Ok(mut state) = self.shared.state.lock() else {
                return Err(Error::MissingComponentFactory { type_id });
            };
            if !state.factories.contains_key(&type_id) {
                return Err(Error::MissingComponentFactory { type_id });
            }
            let count = state.request_counts.entry(key.clone()).or_insert(0);
            *count += 1;
            let count = *count;
            state.apply_request_to_receivers(&key);
            debug!(
                target: "emberfall_gameframework::component_manager",
                class = %key.0,
                component = %key.1,
                refcount = count,
                "component presence requested"
            );
        }
        Ok(ComponentRequestHandle {
            shared: Arc::clone(&self.shared),
            key,
        })
    }

    pub fn find_component<T: FrameworkComponent>(&self, actor: ActorId) -> Option<Arc<Mutex<T>>> {
        let state = self.shared.state.lock().ok()?;
        state
            .actors
            .get(&actor)?
            .components
            .get(&T::TYPE_ID)?
            .instance_as::<T>()
    }

    pub fn component_provenance(
        &self,
        actor: ActorId,
        type_id: ComponentTypeId,
    ) -> Option<ComponentProvenance> {
        let state = self.shared.state.lock().ok()?;
        state
            .actors
            .get(&actor)?
            .components
            .get(&type_id)
            .map(|slot| slot.provenance)
    }

    pub fn contains_actor(&self, actor: ActorId) -> bool {
        self.shared
            .state
            .lock()
            .map(|state| state.actors.contains_key(&actor))
            .unwrap_or(false)
    }

    pub fn actor_class(&self, actor: ActorId) -> Option<ActorClassName> {
        let state = self.shared.state.lock().ok()?;
        state.actors.get(&actor).map(|entry| entry.class.clone())
    }

    pub fn is_receiver(&self, actor: ActorId) -> bool {
        self.shared
            .state
            .lock()
            .map(|state| {
                state
                    .actors
                    .get(&actor)
                    .map(|entry| entry.is_receiver)
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    pub fn request_refcount(&self, actor_class: &ActorClassName, type_id: ComponentTypeId) -> usize {
        self.shared
            .state
            .lock()
            .map(|state| {
                state
                    .request_counts
                    .get(&(actor_class.clone(), type_id))
                    .copied()
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    pub fn extension_handler_count(&self) -> usize {
        self.shared
            .state
            .lock()
            .map(|state| state.handlers.len())
            .unwrap_or(0)
    }
}

/// Live extension-handler registration. Dropping it releases the handler.
pub struct ExtensionHandlerHandle {
    shared: Arc<ManagerShared>,
    id: HandlerId,
}

impl Drop for ExtensionHandlerHandle {
    fn drop(&mut self) {
        if let Ok(mut state) = self.shared.state.lock() {
            state.handlers.remove(&self.id);
        }
    }
}

/// One reference-counted claim that a component type stays present on
/// receivers of a class. Dropping the last handle for a key removes the
/// framework-created instances.
pub struct ComponentRequestHandle {
    shared: Arc<ManagerShared>,
    key: RequestKey,
}

impl Drop for ComponentRequestHandle {
    fn drop(&mut self) {
        let Ok(mut state) = self.shared.state.lock() else {
            return;
        };
        let remaining = match state.request_counts.get_mut(&self.key) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            },
            None => return,
        };
        if remaining > 0 {
            return;
        }
        state.request_counts.remove(&self.key);
        let mut removed = 0usize;
        for actor in state.actors.values_mut() {
            if actor.class != self.key.0 {
                continue;
            }
            let had = actor.components.len();
            actor
                .components
                .retain(|_, slot| !(slot.from_request && slot.type_id == self.key.1));
            removed += had - actor.components.len();
        }
        if removed > 0 {
            debug!(
                target: "emberfall_gameframework::component_manager",
                class = %self.key.0,
                component = %self.key.1,
                removed,
                "last component request released; framework-created instances removed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::abilities::AbilitySystemComponent;

    fn manager_with_factory() -> GameFrameworkComponentManager {
        let manager = GameFrameworkComponentManager::new();
        manager.register_component_factory(AbilitySystemComponent::new);
        manager
    }

    fn event_log(
        manager: &GameFrameworkComponentManager,
        class: &str,
    ) -> (
        Arc<Mutex<Vec<(ActorId, ExtensionEventKind)>>>,
        ExtensionHandlerHandle,
    ) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let handle = manager.add_extension_handler(
            ActorClassName::from(class),
            Arc::new(move |actor, kind| {
                if let Ok(mut log) = sink.lock() {
                    log.push((actor, kind));
                }
            }),
        );
        (events, handle)
    }

    #[test]
    fn component_requests_are_refcounted_per_key() {
        let manager = manager_with_factory();
        let pawn = ActorClassName::from("Pawn");
        let actor = manager.spawn_actor(pawn.clone());
        manager.add_receiver(actor).expect("receiver");

        let first = manager
            .add_component_request(pawn.clone(), AbilitySystemComponent::TYPE_ID)
            .expect("first request");
        let second = manager
            .add_component_request(pawn.clone(), AbilitySystemComponent::TYPE_ID)
            .expect("second request");
        let third = manager
            .add_component_request(pawn.clone(), AbilitySystemComponent::TYPE_ID)
            .expect("third request");
        assert_eq!(
            manager.request_refcount(&pawn, AbilitySystemComponent::TYPE_ID),
            3
        );
        assert!(manager.find_component::<AbilitySystemComponent>(actor).is_some());

        drop(first);
        drop(second);
        assert_eq!(
            manager.request_refcount(&pawn, AbilitySystemComponent::TYPE_ID),
            1
        );
        assert!(
            manager.find_component::<AbilitySystemComponent>(actor).is_some(),
            "requirement stays until the last release"
        );

        drop(third);
        assert_eq!(
            manager.request_refcount(&pawn, AbilitySystemComponent::TYPE_ID),
            0
        );
        assert!(manager.find_component::<AbilitySystemComponent>(actor).is_none());
    }

    #[test]
    fn authored_components_survive_request_release() {
        let manager = manager_with_factory();
        let pawn = ActorClassName::from("Pawn");
        let actor = manager.spawn_actor(pawn.clone());
        manager
            .add_authored_component(actor, AbilitySystemComponent::new())
            .expect("authored component");
        manager.add_receiver(actor).expect("receiver");

        let request = manager
            .add_component_request(pawn.clone(), AbilitySystemComponent::TYPE_ID)
            .expect("request");
        drop(request);

        assert!(
            manager.find_component::<AbilitySystemComponent>(actor).is_some(),
            "authored component is not the framework's to remove"
        );
    }

    #[test]
    fn receivers_added_later_get_requested_components() {
        let manager = manager_with_factory();
        let pawn = ActorClassName::from("Pawn");
        let _request = manager
            .add_component_request(pawn.clone(), AbilitySystemComponent::TYPE_ID)
            .expect("request");

        let actor = manager.spawn_actor(pawn);
        assert!(
            manager.find_component::<AbilitySystemComponent>(actor).is_none(),
            "plain actors are outside the extension scope"
        );

        manager.add_receiver(actor).expect("receiver");
        assert!(manager.find_component::<AbilitySystemComponent>(actor).is_some());
    }

    #[test]
    fn handler_observes_existing_receivers_and_later_events() {
        let manager = manager_with_factory();
        let pawn = ActorClassName::from("Pawn");
        let existing = manager.spawn_actor(pawn.clone());
        manager.add_receiver(existing).expect("receiver");

        let (events, _handle) = event_log(&manager, "Pawn");
        let later = manager.spawn_actor(pawn);
        manager.add_receiver(later).expect("receiver");
        manager.notify_actor_ready(later).expect("ready");
        manager.remove_receiver(later).expect("removed");

        let log = events.lock().expect("event log");
        assert_eq!(
            log.as_slice(),
            &[
                (existing, ExtensionEventKind::ExtensionAdded),
                (later, ExtensionEventKind::ReceiverAdded),
                (later, ExtensionEventKind::ActorReady),
                (later, ExtensionEventKind::ReceiverRemoved),
            ]
        );
    }

    #[test]
    fn dropped_handler_stops_receiving_events() {
        let manager = manager_with_factory();
        let pawn = ActorClassName::from("Pawn");
        let (events, handle) = event_log(&manager, "Pawn");
        drop(handle);

        let actor = manager.spawn_actor(pawn);
        manager.add_receiver(actor).expect("receiver");
        assert!(events.lock().expect("event log").is_empty());
        assert_eq!(manager.extension_handler_count(), 0);
    }

    #[test]
    fn receiver_removed_is_observed_before_components_disappear() {
        let manager = manager_with_factory();
        let pawn = ActorClassName::from("Pawn");
        let actor = manager.spawn_actor(pawn.clone());
        manager.add_receiver(actor).expect("receiver");
        let _request = manager
            .add_component_request(pawn.clone(), AbilitySystemComponent::TYPE_ID)
            .expect("request");

        let saw_component = Arc::new(Mutex::new(false));
        let probe = Arc::clone(&saw_component);
        let inner = manager.clone();
        let _handle = manager.add_extension_handler(
            pawn,
            Arc::new(move |actor, kind| {
                if kind == ExtensionEventKind::ReceiverRemoved {
                    if let Ok(mut seen) = probe.lock() {
                        *seen = inner.find_component::<AbilitySystemComponent>(actor).is_some();
                    }
                }
            }),
        );

        manager.remove_receiver(actor).expect("removed");
        assert!(*saw_component.lock().expect("probe"));
        assert!(
            manager.find_component::<AbilitySystemComponent>(actor).is_none(),
            "request-created component is gone once the receiver left"
        );
    }

    #[test]
    fn requesting_without_a_factory_is_an_error() {
        let manager = GameFrameworkComponentManager::new();
        let result =
            manager.add_component_request(ActorClassName::from("Pawn"), AbilitySystemComponent::TYPE_ID);
        assert!(matches!(
            result,
            Err(Error::MissingComponentFactory { .. })
        ));
    }

    #[test]
    fn events_for_unknown_actors_are_errors() {
        let manager = manager_with_factory();
        let result = manager.notify_actor_ready(ActorId(999));
        assert!(matches!(result, Err(Error::UnknownActor { .. })));
    }
}
