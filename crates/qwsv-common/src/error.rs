// error.rs -- fatal collision errors
//
// Every variant means the loaded world data or the entity table is
// inconsistent; the operation that raised it must be abandoned.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollisionError {
    /// A clip node id outside the hull's valid range was followed.
    #[error("bad node number {num} (hull range {first}..={last})")]
    BadNodeNumber { num: i32, first: i32, last: i32 },

    /// An entity id outside the entity table was passed in.
    #[error("bad entity number {ent}")]
    BadEntity { ent: usize },

    /// A brush-solid entity is moved by something other than push.
    #[error("entity {ent}: SOLID_BSP without MOVETYPE_PUSH")]
    BspWithoutPush { ent: usize },

    /// A brush-solid entity has no usable brush model for the hull requested.
    #[error("entity {ent}: SOLID_BSP with a non-bsp model (model {model})")]
    NonBspModel { ent: usize, model: usize },

    /// A trigger showed up in a solid-class area query.
    #[error("trigger {ent} in clipping list")]
    TriggerInClipList { ent: usize },

    /// World load was attempted without a world brush model.
    #[error("world model missing")]
    MissingWorldModel,
}
