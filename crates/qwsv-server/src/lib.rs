#![allow(clippy::too_many_arguments, clippy::float_cmp, clippy::needless_range_loop)]

// Server world: entity records, area tree, linking and move traces.

pub mod config;
pub mod edict;
pub mod sv_world;
