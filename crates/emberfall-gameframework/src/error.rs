use thiserror::Error;

use crate::actor::{ActorId, ComponentTypeId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown actor {actor}")]
    UnknownActor { actor: ActorId },
    #[error("no component factory registered for `{type_id}`")]
    MissingComponentFactory { type_id: ComponentTypeId },
}
