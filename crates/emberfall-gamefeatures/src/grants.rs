use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use emberfall_gameframework::{
    AbilityHandle, AbilityInputBindingComponent, AbilitySystemComponent, ActorId, AttributeSet,
    GameInstance,
};
use tracing::{debug, error, info, warn};

use crate::config::AbilitiesEntry;
use crate::provision::ComponentProvisioner;

/// Exactly what one entry granted to one actor: the ability handles and
/// attribute-set instances to reverse later, plus a back-reference to the
/// instance the actor lives in.
pub(crate) struct ActorExtensions {
    instance: Weak<GameInstance>,
    ability_handles: Vec<AbilityHandle>,
    attribute_sets: Vec<Arc<Mutex<AttributeSet>>>,
}

/// Introspection view of one actor's active extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionRecordSummary {
    pub ability_handles: Vec<AbilityHandle>,
    pub attribute_set_count: usize,
}

/// Per-actor bookkeeping of active extension records. At most one record
/// per actor; fully drained at teardown.
#[derive(Default)]
pub(crate) struct ExtensionLedger {
    records: HashMap<ActorId, ActorExtensions>,
}

impl ExtensionLedger {
    pub(crate) fn insert(&mut self, actor: ActorId, record: ActorExtensions) -> Option<ActorExtensions> {
        self.records.insert(actor, record)
    }

    pub(crate) fn take(&mut self, actor: ActorId) -> Option<ActorExtensions> {
        self.records.remove(&actor)
    }

    pub(crate) fn summary(&self, actor: ActorId) -> Option<ExtensionRecordSummary> {
        self.records.get(&actor).map(|record| ExtensionRecordSummary {
            ability_handles: record.ability_handles.clone(),
            attribute_set_count: record.attribute_sets.len(),
        })
    }

    /// An arbitrary actor that still holds a record. Drain loops take the
    /// key first and mutate afterwards, so there is never a live iterator
    /// across a removal.
    pub(crate) fn next_actor(&self) -> Option<ActorId> {
        self.records.keys().next().copied()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

/// Apply one entry's grants to an actor. Returns the record of what was
/// actually granted, or `None` when no capability host could be obtained.
/// Individual mapping failures are logged and skipped; they never abort
/// the remaining mappings.
pub(crate) fn apply_entry_grants(
    instance: &Arc<GameInstance>,
    actor: ActorId,
    entry: &AbilitiesEntry,
    provisioner: &mut ComponentProvisioner,
) -> Option<ActorExtensions> {
    let Some(host) = provisioner.find_or_request::<AbilitySystemComponent>(instance, actor, entry)
    else {
        error!(
            target: "emberfall_gamefeatures::grants",
            actor = %actor,
            "failed to find or request an ability system component"
        );
        return None;
    };

    let mut ability_handles = Vec::with_capacity(entry.abilities.len());
    let mut attribute_sets = Vec::with_capacity(entry.attributes.len());

    for mapping in &entry.abilities {
        let Some(ability_type) = &mapping.ability_type else {
            debug!(
                target: "emberfall_gamefeatures::grants",
                actor = %actor,
                "skipping ability mapping with unset ability type"
            );
            continue;
        };
        let Some(class) = instance.assets().resolve_ability_class(ability_type) else {
            warn!(
                target: "emberfall_gamefeatures::grants",
                actor = %actor,
                ability = %ability_type,
                "ability type did not resolve; grant skipped"
            );
            continue;
        };
        let handle = {
            let Ok(mut host) = host.lock() else {
                continue;
            };
            host.grant_ability(class)
        };
        if let Some(input_action) = &mapping.input_action {
            match provisioner.find_or_request::<AbilityInputBindingComponent>(instance, actor, entry)
            {
                Some(input) => {
                    if let Ok(mut input) = input.lock() {
                        input.setup_input_binding(input_action.clone(), handle);
                    }
                },
                // Best effort: the grant itself stands without a binding.
                None => error!(
                    target: "emberfall_gamefeatures::grants",
                    actor = %actor,
                    action = %input_action,
                    "failed to find or request an ability input binding component"
                ),
            }
        }
        ability_handles.push(handle);
    }

    for mapping in &entry.attributes {
        let Some(set_type) = &mapping.attribute_set_type else {
            debug!(
                target: "emberfall_gamefeatures::grants",
                actor = %actor,
                "skipping attribute mapping with unset set type"
            );
            continue;
        };
        let Some(class) = instance.assets().resolve_attribute_set_class(set_type) else {
            warn!(
                target: "emberfall_gamefeatures::grants",
                actor = %actor,
                attribute_set = %set_type,
                "attribute set type did not resolve; attachment skipped"
            );
            continue;
        };
        let mut set = AttributeSet::new(class, actor);
        if let Some(table_path) = &mapping.init_table {
            if let Some(table) = instance.assets().resolve_data_table(table_path) {
                set.init_from_table(&table);
            }
        }
        let set = Arc::new(Mutex::new(set));
        attribute_sets.push(Arc::clone(&set));
        if let Ok(mut host) = host.lock() {
            host.add_attribute_set(set);
        }
    }

    info!(
        target: "emberfall_gamefeatures::grants",
        actor = %actor,
        abilities = ability_handles.len(),
        attribute_sets = attribute_sets.len(),
        "actor extensions granted"
    );
    Some(ActorExtensions {
        instance: Arc::downgrade(instance),
        ability_handles,
        attribute_sets,
    })
}

/// Reverse a record's grants. The record is consumed: by the time this is
/// called it has already left the ledger, so erasure is unconditional.
/// When the host (or the whole instance) is already gone, the grants are
/// gone with it and only the record is discarded.
pub(crate) fn revoke_actor_grants(actor: ActorId, record: ActorExtensions) {
    let Some(instance) = record.instance.upgrade() else {
        debug!(
            target: "emberfall_gamefeatures::grants",
            actor = %actor,
            "owning instance already gone; dropping extension record"
        );
        return;
    };
    let manager = instance.component_manager();
    let Some(host) = manager.find_component::<AbilitySystemComponent>(actor) else {
        debug!(
            target: "emberfall_gamefeatures::grants",
            actor = %actor,
            "ability system component no longer present; dropping extension record"
        );
        return;
    };
    let input = manager.find_component::<AbilityInputBindingComponent>(actor);

    let Ok(mut host) = host.lock() else {
        return;
    };
    for set in &record.attribute_sets {
        host.remove_spawned_attribute(set);
    }
    for handle in &record.ability_handles {
        if let Some(input) = &input {
            if let Ok(mut input) = input.lock() {
                input.clear_input_binding(*handle);
            }
        }
        host.set_remove_ability_on_end(*handle);
    }

    info!(
        target: "emberfall_gamefeatures::grants",
        actor = %actor,
        abilities = record.ability_handles.len(),
        attribute_sets = record.attribute_sets.len(),
        "actor extensions revoked"
    );
}
