use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Opaque identity of a spawned actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

/// Class name an actor was spawned as. Extension handlers and component
/// requests are keyed by exact class name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorClassName(String);

impl ActorClassName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorClassName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for ActorClassName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Stable identifier of a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub &'static str);

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Concrete component types the framework can keep on actors.
pub trait FrameworkComponent: Any + Send + Sync {
    const TYPE_ID: ComponentTypeId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentCreationMethod {
    /// Placed on the actor archetype by hand.
    Authored,
    /// Added to the live actor at runtime.
    Native,
}

/// Placement metadata an origin policy classifies against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentProvenance {
    pub creation_method: ComponentCreationMethod,
    /// Whether the instance's originating archetype is a class-default
    /// placeholder. `None` when the framework cannot tell.
    pub archetype_is_class_default: Option<bool>,
}

impl ComponentProvenance {
    pub fn authored() -> Self {
        Self {
            creation_method: ComponentCreationMethod::Authored,
            archetype_is_class_default: Some(false),
        }
    }

    pub fn runtime_added() -> Self {
        Self {
            creation_method: ComponentCreationMethod::Native,
            archetype_is_class_default: Some(true),
        }
    }
}

pub(crate) struct ComponentSlot {
    pub(crate) type_id: ComponentTypeId,
    pub(crate) provenance: ComponentProvenance,
    /// Created to satisfy a component presence request; removed when the
    /// last request for its key is released.
    pub(crate) from_request: bool,
    pub(crate) instance: Arc<dyn Any + Send + Sync>,
}

impl ComponentSlot {
    pub(crate) fn instance_as<T: FrameworkComponent>(&self) -> Option<Arc<Mutex<T>>> {
        Arc::clone(&self.instance).downcast::<Mutex<T>>().ok()
    }
}

pub(crate) struct Actor {
    pub(crate) class: ActorClassName,
    pub(crate) is_receiver: bool,
    pub(crate) components: HashMap<ComponentTypeId, ComponentSlot>,
}
