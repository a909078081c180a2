use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actor::{ActorId, ComponentTypeId, FrameworkComponent};
use crate::assets::DataTable;

/// Opaque identifier of one ability granted to an ability system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AbilityHandle(pub u64);

impl fmt::Display for AbilityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "grant#{}", self.0)
    }
}

/// Loaded ability definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityClass {
    pub name: String,
}

impl AbilityClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Loaded attribute-set definition: the attribute names instances own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSetClass {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<String>,
}

impl AttributeSetClass {
    pub fn new(name: impl Into<String>, attributes: Vec<String>) -> Self {
        Self {
            name: name.into(),
            attributes,
        }
    }
}

/// Per-actor attribute-set instance, owned by the actor it was spawned for.
#[derive(Debug)]
pub struct AttributeSet {
    class: Arc<AttributeSetClass>,
    owner: ActorId,
    values: HashMap<String, f64>,
}

impl AttributeSet {
    pub fn new(class: Arc<AttributeSetClass>, owner: ActorId) -> Self {
        let values = class
            .attributes
            .iter()
            .map(|name| (name.clone(), 0.0))
            .collect();
        Self {
            class,
            owner,
            values,
        }
    }

    pub fn class(&self) -> &Arc<AttributeSetClass> {
        &self.class
    }

    pub fn owner(&self) -> ActorId {
        self.owner
    }

    /// Apply base values from a table. Rows for attributes this set does
    /// not declare are ignored.
    pub fn init_from_table(&mut self, table: &DataTable) {
        let mut applied = 0usize;
        for name in &self.class.attributes {
            if let Some(row) = table.rows.get(name) {
                self.values.insert(name.clone(), row.clamped_base());
                applied += 1;
            }
        }
        debug!(
            target: "emberfall_gameframework::abilities",
            set = %self.class.name,
            table = %table.name,
            applied,
            "attribute set initialized from table"
        );
    }

    pub fn value(&self, attribute: &str) -> Option<f64> {
        self.values.get(attribute).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbilityGrantState {
    Active,
    /// Removal requested; reclaimed by the next maintenance sweep once the
    /// ability is no longer executing.
    PendingRemoval,
}

#[derive(Debug, Clone)]
pub struct GrantedAbility {
    pub class: Arc<AbilityClass>,
    pub state: AbilityGrantState,
    pub executing: bool,
}

/// Capability host: owns granted abilities and attached attribute sets for
/// one actor.
#[derive(Debug, Default)]
pub struct AbilitySystemComponent {
    next_handle: u64,
    grants: BTreeMap<AbilityHandle, GrantedAbility>,
    attribute_sets: Vec<Arc<Mutex<AttributeSet>>>,
}

impl FrameworkComponent for AbilitySystemComponent {
    const TYPE_ID: ComponentTypeId = ComponentTypeId("ability_system");
}

impl AbilitySystemComponent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant_ability(&mut self, class: Arc<AbilityClass>) -> AbilityHandle {
        self.next_handle += 1;
        let handle = AbilityHandle(self.next_handle);
        debug!(
            target: "emberfall_gameframework::abilities",
            grant = %handle,
            ability = %class.name,
            "ability granted"
        );
        self.grants.insert(
            handle,
            GrantedAbility {
                class,
                state: AbilityGrantState::Active,
                executing: false,
            },
        );
        handle
    }

    /// Request deferred removal of a grant. An executing ability finishes
    /// before the grant is actually reclaimed. Returns false when the
    /// grant is unknown or removal was already requested.
    pub fn set_remove_ability_on_end(&mut self, handle: AbilityHandle) -> bool {
        let Some(grant) = self.grants.get_mut(&handle) else {
            return false;
        };
        if grant.state == AbilityGrantState::PendingRemoval {
            return false;
        }
        grant.state = AbilityGrantState::PendingRemoval;
        debug!(
            target: "emberfall_gameframework::abilities",
            grant = %handle,
            ability = %grant.class.name,
            "ability removal requested"
        );
        true
    }

    pub fn set_ability_executing(&mut self, handle: AbilityHandle, executing: bool) -> bool {
        let Some(grant) = self.grants.get_mut(&handle) else {
            return false;
        };
        grant.executing = executing;
        true
    }

    /// Maintenance sweep: reclaim grants whose removal was requested and
    /// which are no longer executing. Returns the number reclaimed.
    pub fn reclaim_ended_grants(&mut self) -> usize {
        let before = self.grants.len();
        self.grants
            .retain(|_, grant| grant.state != AbilityGrantState::PendingRemoval || grant.executing);
        before - self.grants.len()
    }

    pub fn grant(&self, handle: AbilityHandle) -> Option<&GrantedAbility> {
        self.grants.get(&handle)
    }

    pub fn has_grant(&self, handle: AbilityHandle) -> bool {
        self.grants.contains_key(&handle)
    }

    pub fn granted_handles(&self) -> Vec<AbilityHandle> {
        self.grants.keys().copied().collect()
    }

    pub fn grant_count(&self) -> usize {
        self.grants.len()
    }

    pub fn add_attribute_set(&mut self, set: Arc<Mutex<AttributeSet>>) {
        self.attribute_sets.push(set);
    }

    /// Detach a spawned attribute-set instance. Matching is by instance
    /// identity, not by class.
    pub fn remove_spawned_attribute(&mut self, set: &Arc<Mutex<AttributeSet>>) -> bool {
        let before = self.attribute_sets.len();
        self.attribute_sets.retain(|other| !Arc::ptr_eq(other, set));
        before != self.attribute_sets.len()
    }

    pub fn attribute_sets(&self) -> &[Arc<Mutex<AttributeSet>>] {
        &self.attribute_sets
    }
}
