//! In-memory modular gameplay component framework.
//!
//! Actors opt into a dynamic extension scope managed by a per-world
//! component manager; gameplay code keeps components present on them via
//! reference-counted requests and reacts to extension events as actors
//! enter and leave that scope.

pub mod abilities;
pub mod actor;
pub mod assets;
pub mod component_manager;
pub mod engine;
pub mod error;
pub mod input;
pub mod origin;

pub use abilities::*;
pub use actor::*;
pub use assets::*;
pub use component_manager::*;
pub use engine::*;
pub use error::{Error, Result};
pub use input::*;
pub use origin::*;
