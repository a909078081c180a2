use std::sync::{Arc, Mutex, Weak};

use emberfall_gameframework::{
    ActorId, ArchetypeOriginPolicy, AssetBundleData, ComponentOriginPolicy, ExtensionEventKind,
    ExtensionHandlerHandle, GameEngine, GameInstance, InstanceStartedSubscription,
};
use tracing::{debug, error, info, warn};

use crate::action::{GameFeatureAction, attach_world_action};
use crate::bundles::add_entries_bundle_data;
use crate::config::AbilitiesEntry;
use crate::grants::{
    ExtensionLedger, ExtensionRecordSummary, apply_entry_grants, revoke_actor_grants,
};
use crate::provision::ComponentProvisioner;
use crate::validation::validate_entries;

/// Grants configured abilities and attribute sets to matching actors while
/// the owning feature is active, and reverses every grant on actor removal
/// or feature deactivation.
///
/// One extension handler is registered per configured entry, keyed by the
/// entry's position index. Every entry point runs to completion on the
/// host's single event-dispatch thread; one actor's failure never aborts
/// processing of siblings.
pub struct AddAbilitiesAction {
    entries: Arc<[AbilitiesEntry]>,
    state: Arc<Mutex<ActionState>>,
}

struct ActionState {
    ledger: ExtensionLedger,
    provisioner: ComponentProvisioner,
    handler_handles: Vec<ExtensionHandlerHandle>,
    attachment: Option<InstanceStartedSubscription>,
}

impl AddAbilitiesAction {
    pub fn new(entries: Vec<AbilitiesEntry>) -> Self {
        Self::with_origin_policy(entries, Arc::new(ArchetypeOriginPolicy))
    }

    pub fn with_origin_policy(
        entries: Vec<AbilitiesEntry>,
        policy: Arc<dyn ComponentOriginPolicy>,
    ) -> Self {
        Self {
            entries: entries.into(),
            state: Arc::new(Mutex::new(ActionState {
                ledger: ExtensionLedger::default(),
                provisioner: ComponentProvisioner::new(policy),
                handler_handles: Vec::new(),
                attachment: None,
            })),
        }
    }

    pub fn entries(&self) -> &[AbilitiesEntry] {
        &self.entries
    }

    pub fn validate(&self) -> Vec<String> {
        validate_entries(&self.entries)
    }

    pub fn add_asset_bundle_data(&self, bundle: &mut AssetBundleData) {
        add_entries_bundle_data(&self.entries, bundle);
    }

    pub fn active_actor_count(&self) -> usize {
        self.state.lock().map(|state| state.ledger.len()).unwrap_or(0)
    }

    pub fn outstanding_request_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.provisioner.outstanding_requests())
            .unwrap_or(0)
    }

    pub fn active_extensions(&self, actor: ActorId) -> Option<ExtensionRecordSummary> {
        let state = self.state.lock().ok()?;
        state.ledger.summary(actor)
    }
}

impl GameFeatureAction for AddAbilitiesAction {
    fn on_activating(&self, engine: &GameEngine) {
        {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            let residual = !state.ledger.is_empty()
                || state.provisioner.outstanding_requests() > 0
                || !state.handler_handles.is_empty()
                || state.attachment.is_some();
            if residual {
                error!(
                    target: "emberfall_gamefeatures::add_abilities",
                    active_actors = state.ledger.len(),
                    outstanding_requests = state.provisioner.outstanding_requests(),
                    "activating with residual grant state; forcing a reset first"
                );
                state.attachment = None;
                state.handler_handles.clear();
                reset_state(&mut state);
            }
        }

        let entries = Arc::clone(&self.entries);
        let state = Arc::downgrade(&self.state);
        let subscription = attach_world_action(
            engine,
            Arc::new(move |instance| {
                let Some(state) = state.upgrade() else {
                    return;
                };
                add_to_instance(&entries, &state, instance);
            }),
        );

        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.attachment = Some(subscription);
        info!(
            target: "emberfall_gamefeatures::add_abilities",
            entries = self.entries.len(),
            "add abilities action activated"
        );
    }

    fn on_deactivating(&self, _engine: &GameEngine) {
        let (attachment, handler_handles) = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            (
                state.attachment.take(),
                std::mem::take(&mut state.handler_handles),
            )
        };
        // Releasing registrations takes the manager's lock; keep that
        // outside ours.
        drop(attachment);
        drop(handler_handles);

        let Ok(mut state) = self.state.lock() else {
            return;
        };
        reset_state(&mut state);
        info!(
            target: "emberfall_gamefeatures::add_abilities",
            "add abilities action deactivated"
        );
    }
}

/// Register one extension handler per entry on the instance's component
/// manager. Handler registration synchronously replays `ExtensionAdded`
/// for actors already in scope, so the action's state must not be locked
/// here.
fn add_to_instance(
    entries: &Arc<[AbilitiesEntry]>,
    state: &Arc<Mutex<ActionState>>,
    instance: &Arc<GameInstance>,
) {
    if !instance.world_kind().is_game_world() {
        return;
    }
    let manager = instance.component_manager();
    let mut handles = Vec::with_capacity(entries.len());
    for (entry_index, entry) in entries.iter().enumerate() {
        let Some(actor_class) = entry.actor_class.clone() else {
            warn!(
                target: "emberfall_gamefeatures::add_abilities",
                entry_index,
                "entry has no actor class; no extension handler registered"
            );
            continue;
        };
        let entries = Arc::clone(entries);
        let state = Arc::downgrade(state);
        let instance_ref = Arc::downgrade(instance);
        handles.push(manager.add_extension_handler(
            actor_class,
            Arc::new(move |actor, kind| {
                handle_actor_extension(&entries, &state, &instance_ref, actor, kind, entry_index);
            }),
        ));
    }

    let Ok(mut state) = state.lock() else {
        return;
    };
    state.handler_handles.extend(handles);
}

fn handle_actor_extension(
    entries: &Arc<[AbilitiesEntry]>,
    state: &Weak<Mutex<ActionState>>,
    instance: &Weak<GameInstance>,
    actor: ActorId,
    kind: ExtensionEventKind,
    entry_index: usize,
) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let Some(instance) = instance.upgrade() else {
        return;
    };
    let Ok(mut state) = state.lock() else {
        return;
    };
    debug!(
        target: "emberfall_gamefeatures::add_abilities",
        actor = %actor,
        event = %kind,
        entry_index,
        "actor extension event"
    );
    match kind {
        ExtensionEventKind::ExtensionRemoved | ExtensionEventKind::ReceiverRemoved => {
            remove_actor_extensions(&mut state, actor);
        },
        ExtensionEventKind::ExtensionAdded | ExtensionEventKind::ActorReady => {
            let Some(entry) = entries.get(entry_index) else {
                warn!(
                    target: "emberfall_gamefeatures::add_abilities",
                    actor = %actor,
                    entry_index,
                    "extension event references an entry outside the configured list"
                );
                return;
            };
            add_actor_extensions(&mut state, &instance, actor, entry);
        },
        other => {
            debug!(
                target: "emberfall_gamefeatures::add_abilities",
                actor = %actor,
                event = %other,
                "extension event ignored"
            );
        },
    }
}

fn add_actor_extensions(
    state: &mut ActionState,
    instance: &Arc<GameInstance>,
    actor: ActorId,
    entry: &AbilitiesEntry,
) {
    let Some(record) = apply_entry_grants(instance, actor, entry, &mut state.provisioner) else {
        return;
    };
    if state.ledger.insert(actor, record).is_some() {
        // Insertion is last write wins; the add/remove alternation the
        // framework promises makes this unreachable in practice.
        warn!(
            target: "emberfall_gamefeatures::add_abilities",
            actor = %actor,
            "replaced an existing extension record"
        );
    }
}

fn remove_actor_extensions(state: &mut ActionState, actor: ActorId) {
    let Some(record) = state.ledger.take(actor) else {
        debug!(
            target: "emberfall_gamefeatures::add_abilities",
            actor = %actor,
            "no active extensions to revoke"
        );
        return;
    };
    revoke_actor_grants(actor, record);
}

/// Drain every active record through the revoke path, then release all
/// provisioning requests. Idempotent: with nothing active this does
/// nothing.
fn reset_state(state: &mut ActionState) {
    let drained = state.ledger.len();
    while let Some(actor) = state.ledger.next_actor() {
        remove_actor_extensions(state, actor);
    }
    state.provisioner.release_all();
    if drained > 0 {
        info!(
            target: "emberfall_gamefeatures::add_abilities",
            drained_actors = drained,
            "active extension state reset"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Weak;

    use emberfall_gameframework::{GameEngine, WorldKind};

    use super::*;
    use crate::config::AbilityMapping;

    #[test]
    fn out_of_range_entry_index_is_ignored() {
        let engine = GameEngine::new();
        let instance = engine.create_instance(WorldKind::Game);
        let entries: Vec<AbilitiesEntry> = vec![
            AbilitiesEntry::for_actor_class("Pawn")
                .with_ability(AbilityMapping::new("/Game/Abilities/GA_Jump")),
        ];
        let action = AddAbilitiesAction::new(entries);

        let manager = instance.component_manager();
        let actor = manager.spawn_actor("Pawn".into());
        manager.add_receiver(actor).expect("receiver");

        handle_actor_extension(
            &Arc::clone(&action.entries),
            &Arc::downgrade(&action.state),
            &Arc::downgrade(&instance),
            actor,
            ExtensionEventKind::ActorReady,
            7,
        );
        assert_eq!(action.active_actor_count(), 0);
    }

    #[test]
    fn events_after_state_is_gone_are_no_ops() {
        let engine = GameEngine::new();
        let instance = engine.create_instance(WorldKind::Game);
        let manager = instance.component_manager();
        let actor = manager.spawn_actor("Pawn".into());
        manager.add_receiver(actor).expect("receiver");

        let entries: Arc<[AbilitiesEntry]> =
            vec![AbilitiesEntry::for_actor_class("Pawn")].into();
        let state: Weak<Mutex<ActionState>> = Weak::new();
        handle_actor_extension(
            &entries,
            &state,
            &Arc::downgrade(&instance),
            actor,
            ExtensionEventKind::ActorReady,
            0,
        );
    }
}
