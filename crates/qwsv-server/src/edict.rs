// edict.rs -- the slice of an entity record the world module reads and writes
//
// Entities are owned by the game layer; the world only touches bounds,
// classification tags and the area/visibility bookkeeping below.

use qwsv_common::q_shared::Vec3;

// edict->solid values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum Solid {
    /// No interaction with other objects.
    #[default]
    Not = 0,
    /// Touch on edge, but not blocking.
    Trigger,
    /// Touch on edge, block.
    Bbox,
    /// Touch on edge, but not an onground.
    SlideBox,
    /// BSP clip, touch on edge, block.
    Bsp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum MoveType {
    #[default]
    None = 0,
    Walk,
    Step,
    Fly,
    Toss,
    /// No clip to world, push and crush.
    Push,
    NoClip,
    FlyMissile,
    Bounce,
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct EntityFlags: i32 {
        const FLY           = 0x00000001;
        const SWIM          = 0x00000002;
        const CLIENT        = 0x00000008;
        const INWATER       = 0x00000010;
        const MONSTER       = 0x00000020;
        const GODMODE       = 0x00000040;
        const NOTARGET      = 0x00000080;
        const ITEM          = 0x00000100;
        const ONGROUND      = 0x00000200;
        const PARTIALGROUND = 0x00000400;
        const WATERJUMP     = 0x00000800;
    }
}

/// Which membership list of an area node an entity sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AreaList {
    #[default]
    Solid,
    Triggers,
}

/// Area link (doubly-linked list node for spatial partitioning).
/// Links are edict indices, so removal stays O(1) without pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AreaLink {
    /// Area node holding the entity, None when unlinked.
    pub node: Option<usize>,
    pub list: AreaList,
    pub prev: Option<usize>,
    pub next: Option<usize>,
}

impl AreaLink {
    #[inline]
    pub fn is_linked(&self) -> bool {
        self.node.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Edict {
    pub inuse: bool,

    pub origin: Vec3,
    pub mins: Vec3,
    pub maxs: Vec3,
    pub size: Vec3,
    /// Derived by linking: origin + mins/maxs plus the link pad.
    pub absmin: Vec3,
    pub absmax: Vec3,

    pub solid: Solid,
    pub movetype: MoveType,
    pub flags: EntityFlags,
    pub modelindex: usize,

    /// Weak reference used only to exclude owner/owned pairs from clipping.
    pub owner: Option<usize>,
    /// Touch hook handle; the game layer decides what it means.
    pub touch: Option<usize>,

    pub area: AreaLink,
    /// Visibility leafs touched by the absolute box, solid leaf excluded.
    pub leafnums: Vec<usize>,
}

impl Edict {
    /// A fresh in-use entity with every other field cleared.
    pub fn spawned() -> Self {
        Self {
            inuse: true,
            ..Self::default()
        }
    }

    #[inline]
    pub fn is_monster(&self) -> bool {
        self.flags.contains(EntityFlags::MONSTER)
    }

    #[inline]
    pub fn is_item(&self) -> bool {
        self.flags.contains(EntityFlags::ITEM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_edict_is_unlinked_and_free() {
        let e = Edict::default();
        assert!(!e.inuse);
        assert_eq!(e.solid, Solid::Not);
        assert!(!e.area.is_linked());
        assert!(e.leafnums.is_empty());
    }

    #[test]
    fn spawned_edict_is_in_use() {
        let e = Edict::spawned();
        assert!(e.inuse);
        assert_eq!(e.movetype, MoveType::None);
    }

    #[test]
    fn flag_helpers() {
        let mut e = Edict::spawned();
        assert!(!e.is_monster());
        e.flags |= EntityFlags::MONSTER | EntityFlags::FLY;
        assert!(e.is_monster());
        assert!(!e.is_item());
        e.flags.insert(EntityFlags::ITEM);
        assert!(e.is_item());
    }
}
