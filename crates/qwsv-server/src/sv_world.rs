// sv_world.rs -- world query functions
//
// Entity area checking: spatial partitioning via area nodes,
// linking/unlinking entities, box queries, point contents, and tracing.

use std::borrow::Cow;

use log::{debug, warn};
use qwsv_common::cmodel::{BrushModel, Hull, VisTree};
use qwsv_common::error::CollisionError;
use qwsv_common::q_shared::*;

use crate::config::WorldConfig;
use crate::edict::{AreaLink, AreaList, Edict, MoveType, Solid};

// ===============================================================================
// ENTITY AREA CHECKING
// ===============================================================================

/// Receives the on-touch notifications raised while linking an entity.
///
/// Handlers get the whole world back and may link, unlink or trace; the
/// candidate list was snapshotted before the first call, so later calls can
/// see positions that are already stale.
pub trait TouchDispatch {
    fn on_touch(
        &mut self,
        world: &mut SvWorldContext,
        toucher: usize,
        touched: usize,
    ) -> Result<(), CollisionError>;
}

// ============================================================
// Area node (spatial partitioning BSP for entities)
// ============================================================

#[derive(Debug, Clone)]
pub struct AreaNode {
    pub axis: i32, // -1 = leaf node
    pub dist: f32,
    pub children: [usize; 2], // indices into SvWorldContext::areanodes
    pub trigger_edicts: Option<usize>, // list heads, edict indices
    pub solid_edicts: Option<usize>,
}

impl Default for AreaNode {
    fn default() -> Self {
        Self {
            axis: -1,
            dist: 0.0,
            children: [usize::MAX; 2],
            trigger_edicts: None,
            solid_edicts: None,
        }
    }
}

impl AreaNode {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.axis == -1
    }

    #[inline]
    fn head(&self, list: AreaList) -> Option<usize> {
        match list {
            AreaList::Solid => self.solid_edicts,
            AreaList::Triggers => self.trigger_edicts,
        }
    }

    #[inline]
    fn head_mut(&mut self, list: AreaList) -> &mut Option<usize> {
        match list {
            AreaList::Solid => &mut self.solid_edicts,
            AreaList::Triggers => &mut self.trigger_edicts,
        }
    }
}

/// Walks one membership list front to back.
pub struct AreaLinks<'a> {
    edicts: &'a [Edict],
    next: Option<usize>,
}

impl Iterator for AreaLinks<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let cur = self.next?;
        self.next = self.edicts.get(cur).and_then(|e| e.area.next);
        Some(cur)
    }
}

// ============================================================
// MoveClip -- internal trace structure
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraceKind {
    #[default]
    Normal,
    /// Only brush entities are clipped against.
    NoMonsters,
    /// Monsters are hit with an enlarged box.
    Missile,
}

struct MoveClip {
    boxmins: Vec3, // enclose the test object along entire move
    boxmaxs: Vec3,
    mins: Vec3, // size of the moving object
    maxs: Vec3,
    mins2: Vec3, // size when clipping against monsters
    maxs2: Vec3,
    start: Vec3,
    end: Vec3,
    trace: Trace,
    kind: TraceKind,
    passedict: Option<usize>,
}

// ============================================================
// SvWorldContext -- the area tree plus the entity table it indexes
// ============================================================

pub struct SvWorldContext {
    pub config: WorldConfig,
    pub areanodes: Vec<AreaNode>,
    /// Slot 0 is the world entity.
    pub edicts: Vec<Edict>,
    /// Brush models by model index; index 1 is the world.
    pub models: Vec<Option<BrushModel>>,
    pub vis: VisTree,
}

impl SvWorldContext {
    /// Loads a world. `models[1]` must be the world brush model; its bounds
    /// size the area tree.
    pub fn new(
        config: WorldConfig,
        models: Vec<Option<BrushModel>>,
        vis: VisTree,
    ) -> Result<Self, CollisionError> {
        let world = models
            .get(1)
            .and_then(Option::as_ref)
            .ok_or(CollisionError::MissingWorldModel)?;

        let world_edict = Edict {
            solid: Solid::Bsp,
            movetype: MoveType::Push,
            modelindex: 1,
            mins: world.mins,
            maxs: world.maxs,
            ..Edict::spawned()
        };

        let mut ctx = Self {
            config,
            areanodes: Vec::with_capacity(config.area_nodes()),
            edicts: vec![world_edict],
            models,
            vis,
        };
        ctx.clear_world()?;
        Ok(ctx)
    }

    fn edict(&self, ent: usize) -> Result<&Edict, CollisionError> {
        self.edicts.get(ent).ok_or(CollisionError::BadEntity { ent })
    }

    fn world_model(&self) -> Result<&BrushModel, CollisionError> {
        self.models
            .get(1)
            .and_then(Option::as_ref)
            .ok_or(CollisionError::MissingWorldModel)
    }

    // ================================================================
    // SV_CreateAreaNode
    //
    // Builds a uniformly subdivided tree for the given world size.
    // Returns the index of the created node.
    // ================================================================
    fn create_area_node(&mut self, depth: usize, mins: &Vec3, maxs: &Vec3) -> usize {
        let anode_idx = self.areanodes.len();
        self.areanodes.push(AreaNode::default());

        if depth == self.config.area_depth {
            return anode_idx;
        }

        let size = vector_subtract(maxs, mins);
        let axis = if size[0] > size[1] { 0 } else { 1 };
        let dist = 0.5 * (maxs[axis] + mins[axis]);

        let mut maxs1 = *maxs;
        let mut mins2 = *mins;
        maxs1[axis] = dist;
        mins2[axis] = dist;

        // children[0] is the upper half
        let child0 = self.create_area_node(depth + 1, &mins2, maxs);
        let child1 = self.create_area_node(depth + 1, mins, &maxs1);

        let node = &mut self.areanodes[anode_idx];
        node.axis = axis as i32;
        node.dist = dist;
        node.children = [child0, child1];

        anode_idx
    }

    // ================================================================
    // SV_ClearWorld
    // ================================================================
    pub fn clear_world(&mut self) -> Result<(), CollisionError> {
        let world = self.world_model()?;
        let (mins, maxs) = (world.mins, world.maxs);

        self.areanodes.clear();
        self.create_area_node(0, &mins, &maxs);

        for e in self.edicts.iter_mut() {
            e.area = AreaLink::default();
        }
        Ok(())
    }

    // ================================================================
    // Entity slots
    // ================================================================

    /// Claims the first free slot after the world, growing the table if
    /// needed. None when the table is full.
    pub fn spawn_edict(&mut self) -> Option<usize> {
        if let Some(i) = self.edicts.iter().skip(1).position(|e| !e.inuse) {
            let idx = i + 1;
            self.edicts[idx] = Edict::spawned();
            return Some(idx);
        }
        if self.edicts.len() >= MAX_EDICTS {
            debug!("spawn_edict: no free edicts");
            return None;
        }
        self.edicts.push(Edict::spawned());
        Some(self.edicts.len() - 1)
    }

    /// Unlinks and clears a slot. The world and unknown ids are left alone.
    pub fn free_edict(&mut self, ent: usize) {
        if ent == 0 || ent >= self.edicts.len() {
            return;
        }
        self.unlink_edict(ent);
        self.edicts[ent] = Edict::default();
    }

    // ================================================================
    // Membership lists
    // ================================================================

    /// Members of one list of an area node, most recently linked first.
    pub fn area_links(&self, node: usize, list: AreaList) -> AreaLinks<'_> {
        AreaLinks {
            edicts: &self.edicts,
            next: self.areanodes.get(node).and_then(|n| n.head(list)),
        }
    }

    fn insert_link(&mut self, node: usize, list: AreaList, ent: usize) {
        let head = self.areanodes[node].head_mut(list);
        let old = head.replace(ent);

        self.edicts[ent].area = AreaLink {
            node: Some(node),
            list,
            prev: None,
            next: old,
        };
        if let Some(n) = old {
            self.edicts[n].area.prev = Some(ent);
        }
    }

    fn remove_link(&mut self, ent: usize) {
        let link = self.edicts[ent].area;
        let Some(node) = link.node else {
            return;
        };

        match link.prev {
            Some(p) => self.edicts[p].area.next = link.next,
            None => *self.areanodes[node].head_mut(link.list) = link.next,
        }
        if let Some(n) = link.next {
            self.edicts[n].area.prev = link.prev;
        }
        self.edicts[ent].area = AreaLink::default();
    }

    // ================================================================
    // SV_UnlinkEdict
    // ================================================================
    pub fn unlink_edict(&mut self, ent: usize) {
        let Some(e) = self.edicts.get(ent) else {
            return;
        };
        if !e.area.is_linked() {
            return; // not linked in anywhere
        }
        self.remove_link(ent);
    }

    // ================================================================
    // SV_LinkEdict
    //
    // Needs to be called any time an entity changes origin, mins, maxs,
    // or solid. Sets ent.absmin and ent.absmax. With a dispatcher, calls
    // the touch hook of every trigger the entity now overlaps.
    // ================================================================
    pub fn link_edict(
        &mut self,
        ent: usize,
        touch_triggers: Option<&mut dyn TouchDispatch>,
    ) -> Result<(), CollisionError> {
        self.edict(ent)?;
        self.unlink_edict(ent); // unlink from old position

        if ent == 0 {
            return Ok(()); // don't add the world
        }
        if !self.edicts[ent].inuse {
            return Ok(());
        }

        let config = self.config;
        let e = &mut self.edicts[ent];

        // set the abs box
        e.size = vector_subtract(&e.maxs, &e.mins);
        e.absmin = vector_add(&e.origin, &e.mins);
        e.absmax = vector_add(&e.origin, &e.maxs);

        if e.is_item() {
            // to make items easier to pick up and allow them to be grabbed
            // off of shelves, the abs sizes are expanded
            for i in 0..2 {
                e.absmin[i] -= config.item_pad;
                e.absmax[i] += config.item_pad;
            }
        } else {
            // because movement is clipped an epsilon away from an actual edge,
            // we must fully check even when bounding boxes don't quite touch
            for i in 0..3 {
                e.absmin[i] -= config.link_epsilon;
                e.absmax[i] += config.link_epsilon;
            }
        }

        let absmin = e.absmin;
        let absmax = e.absmax;
        let solid = e.solid;

        // link to PVS leafs
        e.leafnums.clear();
        if e.modelindex != 0 {
            self.vis
                .box_leafnums(&absmin, &absmax, &mut e.leafnums, config.max_ent_leafs);
            if e.leafnums.len() >= config.max_ent_leafs {
                debug!("link_edict: entity {} reached the leaf cap", ent);
            }
        }

        if solid == Solid::Not {
            return Ok(());
        }

        // find the first node that the ent's box crosses
        let mut node_idx = 0;
        loop {
            let node = &self.areanodes[node_idx];
            if node.is_terminal() {
                break;
            }
            let axis = node.axis as usize;
            if absmin[axis] > node.dist {
                node_idx = node.children[0];
            } else if absmax[axis] < node.dist {
                node_idx = node.children[1];
            } else {
                break; // crosses the node
            }
        }

        // link it in
        let list = if solid == Solid::Trigger {
            AreaList::Triggers
        } else {
            AreaList::Solid
        };
        self.insert_link(node_idx, list, ent);
        debug!("link_edict: entity {} in area node {} ({:?})", ent, node_idx, list);

        // if touch_triggers, touch all entities at this node and descend for more
        if let Some(dispatch) = touch_triggers {
            self.touch_links(ent, dispatch)?;
        }
        Ok(())
    }

    // ================================================================
    // SV_TouchLinks
    // ================================================================
    fn touch_links(
        &mut self,
        ent: usize,
        dispatch: &mut dyn TouchDispatch,
    ) -> Result<(), CollisionError> {
        let (absmin, absmax) = (self.edicts[ent].absmin, self.edicts[ent].absmax);

        // hooks may relink anything, so work from a copy of the list
        let touchlist = self.area_edicts(
            &absmin,
            &absmax,
            AreaList::Triggers,
            self.config.max_area_edicts,
        );

        for touch_idx in touchlist {
            if touch_idx == ent {
                continue;
            }
            let touch = &self.edicts[touch_idx];
            if !touch.inuse || touch.touch.is_none() || touch.solid != Solid::Trigger {
                continue;
            }
            dispatch.on_touch(self, ent, touch_idx)?;
        }
        Ok(())
    }

    // ================================================================
    // SV_AreaEdicts
    //
    // Fills a list of entities of the given class whose absolute boxes
    // overlap mins/maxs, stopping at maxcount.
    // ================================================================
    pub fn area_edicts(
        &self,
        mins: &Vec3,
        maxs: &Vec3,
        list: AreaList,
        maxcount: usize,
    ) -> Vec<usize> {
        let mut found = Vec::new();
        if self.areanodes.is_empty() {
            return found;
        }

        // one deferred branch per level at most
        let mut stack = Vec::with_capacity(self.config.area_depth + 1);
        stack.push(0usize);

        while let Some(mut node_idx) = stack.pop() {
            loop {
                let node = &self.areanodes[node_idx];

                // touch linked edicts
                for check_idx in self.area_links(node_idx, list) {
                    let check = &self.edicts[check_idx];
                    if check.solid == Solid::Not {
                        continue; // deactivated
                    }
                    if !boxes_overlap(&check.absmin, &check.absmax, mins, maxs) {
                        continue; // not touching
                    }
                    if found.len() == maxcount {
                        debug!("area_edicts: maxcount {}", maxcount);
                        return found;
                    }
                    found.push(check_idx);
                }

                if node.is_terminal() {
                    break; // terminal node
                }

                // recurse down both sides
                let axis = node.axis as usize;
                let front = maxs[axis] > node.dist;
                let back = mins[axis] < node.dist;
                node_idx = match (front, back) {
                    (true, true) => {
                        stack.push(node.children[1]);
                        node.children[0]
                    }
                    (true, false) => node.children[0],
                    (false, true) => node.children[1],
                    (false, false) => break,
                };
            }
        }

        found
    }

    // ================================================================
    // SV_HullForEntity
    //
    // Returns a hull that can be used for testing or clipping an object of
    // mins/maxs size, and the offset to move the probe by before testing.
    // ================================================================
    pub fn hull_for_entity(
        &self,
        ent: usize,
        mins: &Vec3,
        maxs: &Vec3,
    ) -> Result<(Cow<'_, Hull>, Vec3), CollisionError> {
        let e = self.edict(ent)?;

        // decide which clipping hull to use, based on the size
        if e.solid == Solid::Bsp {
            // explicit hulls in the BSP model
            if e.movetype != MoveType::Push {
                return Err(CollisionError::BspWithoutPush { ent });
            }
            let non_bsp = CollisionError::NonBspModel {
                ent,
                model: e.modelindex,
            };
            let model = self
                .models
                .get(e.modelindex)
                .and_then(Option::as_ref)
                .ok_or_else(|| non_bsp.clone())?;

            let size = vector_subtract(maxs, mins);
            let hull = model.hull_for_size(&size).ok_or(non_bsp)?;

            // calculate an offset value to center the origin
            let offset = vector_add(&vector_subtract(&hull.clip_mins, mins), &e.origin);
            return Ok((Cow::Borrowed(hull), offset));
        }

        // create a temp hull from bounding box sizes
        let hullmins = vector_subtract(&e.mins, maxs);
        let hullmaxs = vector_subtract(&e.maxs, mins);
        Ok((Cow::Owned(Hull::for_box(&hullmins, &hullmaxs)), e.origin))
    }

    // ================================================================
    // SV_ClipMoveToEntity
    //
    // Handles selection or creation of a clipping hull, and offsetting
    // (and eventually rotation) of the end points.
    // ================================================================
    pub fn clip_move_to_entity(
        &self,
        ent: usize,
        start: &Vec3,
        mins: &Vec3,
        maxs: &Vec3,
        end: &Vec3,
    ) -> Result<Trace, CollisionError> {
        // fill in a default trace
        let mut trace = Trace {
            fraction: 1.0,
            allsolid: true,
            endpos: *end,
            ..Trace::default()
        };

        // get the clipping hull
        let (hull, offset) = self.hull_for_entity(ent, mins, maxs)?;

        let start_l = vector_subtract(start, &offset);
        let end_l = vector_subtract(end, &offset);

        // trace a line through the appropriate clipping hull
        let _ = hull.recursive_hull_check(
            hull.headnode,
            0.0,
            1.0,
            &start_l,
            &end_l,
            &mut trace,
            &self.config.sweep,
        )?;

        // fix trace up by the offset
        if trace.fraction != 1.0 {
            trace.endpos = vector_add(&trace.endpos, &offset);
        }

        // did we clip the move?
        if trace.fraction < 1.0 || trace.startsolid {
            trace.ent = Some(ent);
        }

        Ok(trace)
    }

    // ================================================================
    // SV_ClipToLinks
    // ================================================================
    fn clip_to_links(&self, clip: &mut MoveClip) -> Result<(), CollisionError> {
        let touchlist = self.area_edicts(
            &clip.boxmins,
            &clip.boxmaxs,
            AreaList::Solid,
            self.config.max_area_edicts,
        );

        for touch_idx in touchlist {
            let touch = &self.edicts[touch_idx];

            if touch.solid == Solid::Not {
                continue;
            }
            if Some(touch_idx) == clip.passedict {
                continue;
            }
            if touch.solid == Solid::Trigger {
                warn!("trigger {} in clipping list", touch_idx);
                return Err(CollisionError::TriggerInClipList { ent: touch_idx });
            }

            if clip.kind == TraceKind::NoMonsters && touch.solid != Solid::Bsp {
                continue;
            }

            let passedict = clip.passedict.map(|p| &self.edicts[p]);

            if let Some(pass) = passedict {
                if pass.size[0] == 0.0 && touch.size[0] == 0.0 {
                    continue; // points never interact
                }
            }

            // might intersect, so do an exact clip
            if clip.trace.allsolid {
                return Ok(());
            }

            if let (Some(pass), Some(pass_idx)) = (passedict, clip.passedict) {
                if touch.owner == Some(pass_idx) {
                    continue; // don't clip against own missiles
                }
                if pass.owner == Some(touch_idx) {
                    continue; // don't clip against owner
                }
            }

            let (mins, maxs) = if touch.is_monster() {
                (&clip.mins2, &clip.maxs2)
            } else {
                (&clip.mins, &clip.maxs)
            };
            let trace = self.clip_move_to_entity(touch_idx, &clip.start, mins, maxs, &clip.end)?;

            if trace.allsolid || trace.startsolid || trace.fraction < clip.trace.fraction {
                // once embedded, a farther hit never clears it
                let startsolid = clip.trace.startsolid || trace.startsolid;
                clip.trace = Trace {
                    ent: Some(touch_idx),
                    startsolid,
                    ..trace
                };
            }
        }

        Ok(())
    }

    // ================================================================
    // SV_MoveBounds
    // ================================================================
    fn move_bounds(&self, start: &Vec3, mins: &Vec3, maxs: &Vec3, end: &Vec3) -> (Vec3, Vec3) {
        let pad = self.config.move_epsilon;
        let mut boxmins = [0.0; 3];
        let mut boxmaxs = [0.0; 3];
        for i in 0..3 {
            if end[i] > start[i] {
                boxmins[i] = start[i] + mins[i] - pad;
                boxmaxs[i] = end[i] + maxs[i] + pad;
            } else {
                boxmins[i] = end[i] + mins[i] - pad;
                boxmaxs[i] = start[i] + maxs[i] + pad;
            }
        }
        (boxmins, boxmaxs)
    }

    // ================================================================
    // SV_Move
    //
    // Moves the given mins/maxs volume through the world from start to end.
    // Passedict and edicts owned by passedict are explicitly not checked.
    // A trace blocked only by world geometry carries no entity.
    // ================================================================
    pub fn trace(
        &self,
        start: &Vec3,
        mins: &Vec3,
        maxs: &Vec3,
        end: &Vec3,
        kind: TraceKind,
        passedict: Option<usize>,
    ) -> Result<Trace, CollisionError> {
        if let Some(pass) = passedict {
            self.edict(pass)?;
        }

        // clip to world
        let mut world_trace = self.clip_move_to_entity(0, start, mins, maxs, end)?;
        world_trace.ent = None;

        let (mins2, maxs2) = if kind == TraceKind::Missile {
            let ext = self.config.missile_extent;
            ([-ext; 3], [ext; 3])
        } else {
            (*mins, *maxs)
        };

        // create the bounding box of the entire move
        let (boxmins, boxmaxs) = self.move_bounds(start, &mins2, &maxs2, end);

        let mut clip = MoveClip {
            boxmins,
            boxmaxs,
            mins: *mins,
            maxs: *maxs,
            mins2,
            maxs2,
            start: *start,
            end: *end,
            trace: world_trace,
            kind,
            passedict,
        };

        // clip to entities
        self.clip_to_links(&mut clip)?;

        Ok(clip.trace)
    }

    // ================================================================
    // SV_PointContents
    // ================================================================
    pub fn point_contents(&self, p: &Vec3) -> Result<i32, CollisionError> {
        let world = self.world_model()?;
        let hull = world
            .hulls
            .first()
            .ok_or(CollisionError::NonBspModel { ent: 0, model: 1 })?;
        hull.point_contents(hull.headnode, p)
    }

    // ================================================================
    // SV_TestEntityPosition
    //
    // Returns the world entity if the entity's current position is
    // embedded in something solid.
    // ================================================================
    pub fn test_entity_position(&self, ent: usize) -> Result<Option<usize>, CollisionError> {
        let e = self.edict(ent)?;
        let kind = match e.solid {
            Solid::Trigger | Solid::Not => TraceKind::NoMonsters,
            _ => TraceKind::Normal,
        };
        let trace = self.trace(&e.origin, &e.mins, &e.maxs, &e.origin, kind, Some(ent))?;
        Ok(trace.startsolid.then_some(0))
    }
}
