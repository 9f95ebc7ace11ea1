// cmodel.rs -- clipping hulls, point classification and line tracing
//
// A hull is a tree of clip nodes over a plane array. Internal children are
// node ids, terminal children are negative content codes. Brush models carry
// one precomputed hull per standard box size, plus the ladder that decides
// which one a probe of a given size uses.

use log::debug;

use crate::error::CollisionError;
use crate::q_shared::{
    box_on_plane_side, contents_is_liquid, vector_lerp, Plane, Trace, Vec3, CONTENTS_EMPTY,
    CONTENTS_SOLID,
};

// ============================================================
// Constants
// ============================================================

/// 1/32 epsilon to keep floating point happy
pub const DIST_EPSILON: f32 = 0.03125;

/// How far the impact fraction is pulled back per retry when the computed
/// impact point still classifies as solid.
pub const BACKOFF_STEP: f32 = 0.1;

/// Numeric knobs for the segment sweep.
///
/// Built through [`SweepTuning::new`], which only accepts a finite, positive
/// backoff step, so the backoff loop always runs out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepTuning {
    dist_epsilon: f32,
    backoff_step: f32,
}

impl SweepTuning {
    /// None unless `dist_epsilon` is finite and non-negative and
    /// `backoff_step` is finite and > 0.
    pub fn new(dist_epsilon: f32, backoff_step: f32) -> Option<Self> {
        let epsilon_ok = dist_epsilon.is_finite() && dist_epsilon >= 0.0;
        let step_ok = backoff_step.is_finite() && backoff_step > 0.0;
        (epsilon_ok && step_ok).then_some(Self {
            dist_epsilon,
            backoff_step,
        })
    }

    /// Distance the crossing point is pushed toward the negative side.
    #[inline]
    pub fn dist_epsilon(&self) -> f32 {
        self.dist_epsilon
    }

    /// Fraction decrement of the "still in solid" backoff loop.
    #[inline]
    pub fn backoff_step(&self) -> f32 {
        self.backoff_step
    }

    /// Retries after which the backoff gives up, even if float rounding
    /// keeps the fraction from dropping below zero.
    fn max_backoffs(&self) -> u32 {
        (1.0 / self.backoff_step).ceil() as u32
    }
}

impl Default for SweepTuning {
    fn default() -> Self {
        Self {
            dist_epsilon: DIST_EPSILON,
            backoff_step: BACKOFF_STEP,
        }
    }
}

// ============================================================
// Clip nodes and hulls
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClipNode {
    pub planenum: usize,
    /// Front, back. Negative numbers are contents.
    pub children: [i32; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hull {
    pub clipnodes: Vec<ClipNode>,
    pub planes: Vec<Plane>,
    /// Root of the tree; a content code when the hull has no nodes.
    pub headnode: i32,
    pub firstclipnode: i32,
    pub lastclipnode: i32,
    pub clip_mins: Vec3,
    pub clip_maxs: Vec3,
}

/// Outcome of one step of the segment sweep.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HullCheck {
    /// Nothing solid on this part of the segment, keep going.
    Continue,
    /// The impact has been written into the trace; unwind without touching it.
    Blocked,
}

impl Hull {
    /// A hull that is a single terminal leaf of the given contents.
    pub fn uniform(contents: i32, clip_mins: Vec3, clip_maxs: Vec3) -> Self {
        Self {
            clipnodes: Vec::new(),
            planes: Vec::new(),
            headnode: contents,
            firstclipnode: 0,
            lastclipnode: -1,
            clip_mins,
            clip_maxs,
        }
    }

    pub fn empty(clip_mins: Vec3, clip_maxs: Vec3) -> Self {
        Self::uniform(CONTENTS_EMPTY, clip_mins, clip_maxs)
    }

    /// Builds a hull from loaded clip nodes; the root is the first node.
    pub fn from_clipnodes(
        clipnodes: Vec<ClipNode>,
        planes: Vec<Plane>,
        clip_mins: Vec3,
        clip_maxs: Vec3,
    ) -> Self {
        let lastclipnode = clipnodes.len() as i32 - 1;
        Self {
            clipnodes,
            planes,
            headnode: 0,
            firstclipnode: 0,
            lastclipnode,
            clip_mins,
            clip_maxs,
        }
    }

    /// Synthesizes a six-node hull that is solid inside `mins`..`maxs` and
    /// empty everywhere else, for clipping against non-brush entities.
    pub fn for_box(mins: &Vec3, maxs: &Vec3) -> Self {
        let mut clipnodes = Vec::with_capacity(6);
        let mut planes = Vec::with_capacity(6);

        for i in 0..6 {
            let side = i & 1;
            let axis = i >> 1;

            let mut children = [0i32; 2];
            children[side] = CONTENTS_EMPTY;
            children[side ^ 1] = if i != 5 { i as i32 + 1 } else { CONTENTS_SOLID };
            clipnodes.push(ClipNode {
                planenum: i,
                children,
            });

            let dist = if side == 0 { maxs[axis] } else { mins[axis] };
            planes.push(Plane::axial(axis, dist));
        }

        Self::from_clipnodes(clipnodes, planes, *mins, *maxs)
    }

    fn node(&self, num: i32) -> Result<(&ClipNode, &Plane), CollisionError> {
        let bad = || CollisionError::BadNodeNumber {
            num,
            first: self.firstclipnode,
            last: self.lastclipnode,
        };
        if num < self.firstclipnode || num > self.lastclipnode {
            return Err(bad());
        }
        let node = self.clipnodes.get(num as usize).ok_or_else(bad)?;
        let plane = self.planes.get(node.planenum).ok_or_else(bad)?;
        Ok((node, plane))
    }

    // ============================================================
    // Point testing
    // ============================================================

    /// Content code of the leaf holding `p`, walking down from node `num`.
    pub fn point_contents(&self, mut num: i32, p: &Vec3) -> Result<i32, CollisionError> {
        while num >= 0 {
            let (node, plane) = self.node(num)?;
            num = if plane.diff(p) < 0.0 {
                node.children[1]
            } else {
                node.children[0]
            };
        }
        Ok(num)
    }

    // ============================================================
    // Line testing
    // ============================================================

    /// Walks the segment `p1`..`p2` (fractions `p1f`..`p2f` of the whole
    /// move) through the tree below `num`, recording the first entry into
    /// solid in `trace`.
    ///
    /// `trace` should arrive with `allsolid` set; reaching any non-solid leaf
    /// clears it. Once `Blocked` comes back the impact fields are final and
    /// the caller must return immediately.
    #[allow(clippy::too_many_arguments)]
    pub fn recursive_hull_check(
        &self,
        num: i32,
        p1f: f32,
        p2f: f32,
        p1: &Vec3,
        p2: &Vec3,
        trace: &mut Trace,
        tuning: &SweepTuning,
    ) -> Result<HullCheck, CollisionError> {
        // check for empty
        if num < 0 {
            if num != CONTENTS_SOLID {
                trace.allsolid = false;
                if num == CONTENTS_EMPTY {
                    trace.inopen = true;
                } else if contents_is_liquid(num) {
                    trace.inwater = true;
                }
            } else {
                trace.startsolid = true;
            }
            return Ok(HullCheck::Continue);
        }

        // find the point distances
        let (node, plane) = self.node(num)?;
        let t1 = plane.diff(p1);
        let t2 = plane.diff(p2);

        if t1 >= 0.0 && t2 >= 0.0 {
            return self.recursive_hull_check(node.children[0], p1f, p2f, p1, p2, trace, tuning);
        }
        if t1 < 0.0 && t2 < 0.0 {
            return self.recursive_hull_check(node.children[1], p1f, p2f, p1, p2, trace, tuning);
        }

        // put the crosspoint dist_epsilon units on the near side
        let mut frac = if t1 < 0.0 {
            (t1 + tuning.dist_epsilon) / (t1 - t2)
        } else {
            (t1 - tuning.dist_epsilon) / (t1 - t2)
        };
        frac = frac.clamp(0.0, 1.0);

        let mut midf = p1f + (p2f - p1f) * frac;
        let mut mid = vector_lerp(p1, frac, p2);

        let side = (t1 < 0.0) as usize;

        // move up to the node
        if self.recursive_hull_check(node.children[side], p1f, midf, p1, &mid, trace, tuning)?
            == HullCheck::Blocked
        {
            return Ok(HullCheck::Blocked);
        }

        if self.point_contents(node.children[side ^ 1], &mid)? != CONTENTS_SOLID {
            // go past the node
            return self.recursive_hull_check(
                node.children[side ^ 1],
                midf,
                p2f,
                &mid,
                p2,
                trace,
                tuning,
            );
        }

        if trace.allsolid {
            return Ok(HullCheck::Blocked); // never got out of the solid area
        }

        // the other side of the node is solid, this is the impact point
        trace.plane = if side == 0 { *plane } else { plane.negated() };

        let mut backoffs = 0;
        while self.point_contents(self.headnode, &mid)? == CONTENTS_SOLID {
            // shouldn't really happen, but does occasionally
            frac -= tuning.backoff_step;
            backoffs += 1;
            if frac < 0.0 || backoffs > tuning.max_backoffs() {
                trace.fraction = midf;
                trace.endpos = mid;
                debug!("backup past 0");
                return Ok(HullCheck::Blocked);
            }
            midf = p1f + (p2f - p1f) * frac;
            mid = vector_lerp(p1, frac, p2);
        }

        trace.fraction = midf;
        trace.endpos = mid;

        Ok(HullCheck::Blocked)
    }
}

// ============================================================
// Hull size ladder
// ============================================================

/// Which of a brush model's precomputed hulls serves a probe of a given
/// size. The thresholds are fixed by the map compiler that built the hulls,
/// so they travel with the geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HullLadder {
    /// Probes narrower than this use the point hull.
    pub point_width: f32,
    /// Probes up to this width use a narrow hull, wider ones the wide hull.
    pub narrow_width: f32,
    /// When set, narrow probes shorter than this use the short hull.
    pub short_height: Option<f32>,
    pub point_hull: usize,
    pub narrow_hull: usize,
    pub short_hull: usize,
    pub wide_hull: usize,
}

impl HullLadder {
    /// 0x0x0, 32x32x56, 64x64x88.
    pub const QUAKE: HullLadder = HullLadder {
        point_width: 3.0,
        narrow_width: 32.0,
        short_height: None,
        point_hull: 0,
        narrow_hull: 1,
        short_hull: 1,
        wide_hull: 2,
    };

    /// 0x0x0, 32x32x72, 64x64x64, 32x32x36.
    pub const HALF_LIFE: HullLadder = HullLadder {
        point_width: 3.0,
        narrow_width: 32.0,
        short_height: Some(54.0),
        point_hull: 0,
        narrow_hull: 1,
        short_hull: 3,
        wide_hull: 2,
    };

    pub fn select(&self, size: &Vec3) -> usize {
        if size[0] < self.point_width {
            self.point_hull
        } else if size[0] <= self.narrow_width {
            match self.short_height {
                // pick the nearest of short or tall
                Some(h) if size[2] < h => self.short_hull,
                _ => self.narrow_hull,
            }
        } else {
            self.wide_hull
        }
    }
}

impl Default for HullLadder {
    fn default() -> Self {
        Self::QUAKE
    }
}

// ============================================================
// Brush models
// ============================================================

#[derive(Debug, Clone, PartialEq)]
pub struct BrushModel {
    pub mins: Vec3,
    pub maxs: Vec3,
    pub hulls: Vec<Hull>,
    pub ladder: HullLadder,
}

impl BrushModel {
    /// The hull a probe of `size` clips against, if the model carries it.
    pub fn hull_for_size(&self, size: &Vec3) -> Option<&Hull> {
        self.hulls.get(self.ladder.select(size))
    }
}

// ============================================================
// Render visibility tree
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisNode {
    pub plane: Plane,
    /// Negative numbers are leafs: -1 - leafnum.
    pub children: [i32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisLeaf {
    pub contents: i32,
}

/// The render BSP used for visibility. Leaf 0 is the shared solid leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct VisTree {
    pub nodes: Vec<VisNode>,
    pub leafs: Vec<VisLeaf>,
    pub headnode: i32,
}

impl VisTree {
    /// A tree with the solid leaf and one open leaf covering everything.
    pub fn single_leaf() -> Self {
        Self {
            nodes: Vec::new(),
            leafs: vec![
                VisLeaf {
                    contents: CONTENTS_SOLID,
                },
                VisLeaf {
                    contents: CONTENTS_EMPTY,
                },
            ],
            headnode: -2,
        }
    }

    /// Collects the visible leafs touched by the box into `list`, at most
    /// `max` of them. Leaf numbers exclude the solid leaf (leaf n is stored
    /// as n - 1). Collection silently stops at the cap.
    pub fn box_leafnums(&self, mins: &Vec3, maxs: &Vec3, list: &mut Vec<usize>, max: usize) {
        self.box_leafnums_r(self.headnode, mins, maxs, list, max);
    }

    fn box_leafnums_r(
        &self,
        mut nodenum: i32,
        mins: &Vec3,
        maxs: &Vec3,
        list: &mut Vec<usize>,
        max: usize,
    ) {
        loop {
            if nodenum < 0 {
                let leafnum = (-1 - nodenum) as usize;
                let Some(leaf) = self.leafs.get(leafnum) else {
                    return;
                };
                if leaf.contents == CONTENTS_SOLID || leafnum == 0 || list.len() >= max {
                    return;
                }
                list.push(leafnum - 1);
                return;
            }

            let Some(node) = self.nodes.get(nodenum as usize) else {
                return;
            };
            let sides = box_on_plane_side(mins, maxs, &node.plane);

            // recurse down the contacted sides
            if sides == 1 {
                nodenum = node.children[0];
            } else if sides == 2 {
                nodenum = node.children[1];
            } else {
                self.box_leafnums_r(node.children[0], mins, maxs, list, max);
                nodenum = node.children[1];
            }
        }
    }
}

impl Default for VisTree {
    fn default() -> Self {
        Self::single_leaf()
    }
}

// ============================================================
// Tests
// ============================================================
