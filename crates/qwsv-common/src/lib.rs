#![allow(clippy::needless_range_loop, clippy::too_many_arguments, clippy::float_cmp)]

pub mod q_shared;
pub mod error;
pub mod cmodel;
