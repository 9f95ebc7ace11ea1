// config.rs -- world tuning knobs

use qwsv_common::cmodel::SweepTuning;
use qwsv_common::q_shared::{MAX_EDICTS, MAX_ENT_LEAFS};

pub const AREA_DEPTH: usize = 4;

/// Tunables for the area tree, entity linking and move traces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldConfig {
    /// Depth of the area tree; terminal nodes sit at this depth.
    pub area_depth: usize,
    /// Pad added to every axis of a linked entity's absolute box.
    /// Movement is clipped an epsilon away from edges, so boxes that don't
    /// quite touch must still be checked.
    pub link_epsilon: f32,
    /// Horizontal pad for items, to make pickup easier. Items get no
    /// vertical pad.
    pub item_pad: f32,
    /// Pad on the swept region of a move trace.
    pub move_epsilon: f32,
    /// Half extent of the box missiles use against monsters.
    pub missile_extent: f32,
    /// Visibility leafs recorded per entity before collection stops.
    pub max_ent_leafs: usize,
    /// Cap on entities returned by one area query.
    pub max_area_edicts: usize,
    pub sweep: SweepTuning,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            area_depth: AREA_DEPTH,
            link_epsilon: 1.0,
            item_pad: 15.0,
            move_epsilon: 1.0,
            missile_extent: 15.0,
            max_ent_leafs: MAX_ENT_LEAFS,
            max_area_edicts: MAX_EDICTS,
            sweep: SweepTuning::default(),
        }
    }
}

impl WorldConfig {
    /// Number of nodes in a full area tree of `area_depth`.
    pub fn area_nodes(&self) -> usize {
        (1 << (self.area_depth + 1)) - 1
    }
}
