// q_shared.rs -- foundational types and functions shared by all modules
//
// Vector math, planes, content codes and the trace result produced by
// every collision query.

// ============================================================
// Basic types
// ============================================================

pub type Vec3 = [f32; 3];

/// Maximum number of entity slots in a world.
pub const MAX_EDICTS: usize = 1024;

/// Maximum number of visibility leafs recorded per entity.
pub const MAX_ENT_LEAFS: usize = 16;

// ============================================================
// Content codes
//
// Terminal children of a clip node are negative content codes.
// ============================================================

pub const CONTENTS_EMPTY: i32 = -1;
pub const CONTENTS_SOLID: i32 = -2;
pub const CONTENTS_WATER: i32 = -3;
pub const CONTENTS_SLIME: i32 = -4;
pub const CONTENTS_LAVA: i32 = -5;

/// True for content codes a mover can be submerged in.
#[inline]
pub fn contents_is_liquid(contents: i32) -> bool {
    contents == CONTENTS_WATER || contents == CONTENTS_SLIME || contents == CONTENTS_LAVA
}

// ============================================================
// Plane
// ============================================================

// 0-2 are axial planes
pub const PLANE_X: u8 = 0;
pub const PLANE_Y: u8 = 1;
pub const PLANE_Z: u8 = 2;
// 3 needs alternate calc
pub const PLANE_ANYZ: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub dist: f32,
    pub plane_type: u8,
    pub signbits: u8,
}

impl Default for Plane {
    fn default() -> Self {
        Self {
            normal: [0.0; 3],
            dist: 0.0,
            plane_type: PLANE_ANYZ,
            signbits: 0,
        }
    }
}

impl Plane {
    /// Builds a plane and derives its axis tag and sign bits from the normal.
    pub fn new(normal: Vec3, dist: f32) -> Self {
        let plane_type = if normal[0] == 1.0 {
            PLANE_X
        } else if normal[1] == 1.0 {
            PLANE_Y
        } else if normal[2] == 1.0 {
            PLANE_Z
        } else {
            PLANE_ANYZ
        };
        Self {
            normal,
            dist,
            plane_type,
            signbits: signbits_for_plane(&normal),
        }
    }

    /// Axial plane facing +axis.
    pub fn axial(axis: usize, dist: f32) -> Self {
        let mut normal = [0.0; 3];
        normal[axis] = 1.0;
        Self::new(normal, dist)
    }

    /// Signed distance of `p` from the plane, using the axial fast path.
    #[inline]
    pub fn diff(&self, p: &Vec3) -> f32 {
        if self.plane_type < PLANE_ANYZ {
            p[self.plane_type as usize] - self.dist
        } else {
            dot_product(&self.normal, p) - self.dist
        }
    }

    /// The same plane seen from its back side.
    pub fn negated(&self) -> Self {
        let mut normal = [0.0; 3];
        vector_negate_to(&self.normal, &mut normal);
        Self::new(normal, -self.dist)
    }
}

/// For fast box on planeside test.
pub fn signbits_for_plane(normal: &Vec3) -> u8 {
    let mut bits = 0;
    for j in 0..3 {
        if normal[j] < 0.0 {
            bits |= 1 << j;
        }
    }
    bits
}

// ============================================================
// Trace
// ============================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    /// The whole sweep stayed inside solid content.
    pub allsolid: bool,
    /// The sweep started embedded in solid content.
    pub startsolid: bool,
    pub inopen: bool,
    pub inwater: bool,
    /// Fraction of the move completed, 1.0 = didn't hit anything.
    pub fraction: f32,
    /// Final position.
    pub endpos: Vec3,
    /// Surface normal at impact.
    pub plane: Plane,
    /// Entity the surface is on, None when only world geometry blocked.
    pub ent: Option<usize>,
}

impl Default for Trace {
    fn default() -> Self {
        Self {
            allsolid: false,
            startsolid: false,
            inopen: false,
            inwater: false,
            fraction: 1.0,
            endpos: [0.0; 3],
            plane: Plane::default(),
            ent: None,
        }
    }
}

// ============================================================
// MATHLIB -- Vector operations
// ============================================================

#[inline]
pub fn dot_product(a: &Vec3, b: &Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn vector_subtract(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn vector_add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn vector_negate_to(src: &Vec3, dst: &mut Vec3) {
    dst[0] = -src[0];
    dst[1] = -src[1];
    dst[2] = -src[2];
}

/// Point at `frac` of the way from `p1` to `p2`.
#[inline]
pub fn vector_lerp(p1: &Vec3, frac: f32, p2: &Vec3) -> Vec3 {
    [
        p1[0] + frac * (p2[0] - p1[0]),
        p1[1] + frac * (p2[1] - p1[1]),
        p1[2] + frac * (p2[2] - p1[2]),
    ]
}

/// Axis-aligned overlap test, touching faces count as overlapping.
#[inline]
pub fn boxes_overlap(mins1: &Vec3, maxs1: &Vec3, mins2: &Vec3, maxs2: &Vec3) -> bool {
    !(mins1[0] > maxs2[0]
        || mins1[1] > maxs2[1]
        || mins1[2] > maxs2[2]
        || maxs1[0] < mins2[0]
        || maxs1[1] < mins2[1]
        || maxs1[2] < mins2[2])
}

/// Returns 1 (front), 2 (back), or 3 (crossing) for a box vs. plane test.
pub fn box_on_plane_side(emins: &Vec3, emaxs: &Vec3, p: &Plane) -> i32 {
    // fast axial cases
    if p.plane_type < PLANE_ANYZ {
        let t = p.plane_type as usize;
        if p.dist <= emins[t] {
            return 1;
        }
        if p.dist >= emaxs[t] {
            return 2;
        }
        return 3;
    }

    // general case: pick the corners nearest and farthest along the normal
    let mut near = [0.0f32; 3];
    let mut far = [0.0f32; 3];
    for i in 0..3 {
        if p.signbits & (1 << i) != 0 {
            far[i] = emins[i];
            near[i] = emaxs[i];
        } else {
            far[i] = emaxs[i];
            near[i] = emins[i];
        }
    }
    let dist1 = dot_product(&p.normal, &far);
    let dist2 = dot_product(&p.normal, &near);

    let mut sides = 0;
    if dist1 >= p.dist {
        sides = 1;
    }
    if dist2 < p.dist {
        sides |= 2;
    }
    sides
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_new_tags_axial_normals() {
        assert_eq!(Plane::new([1.0, 0.0, 0.0], 4.0).plane_type, PLANE_X);
        assert_eq!(Plane::new([0.0, 1.0, 0.0], 4.0).plane_type, PLANE_Y);
        assert_eq!(Plane::new([0.0, 0.0, 1.0], 4.0).plane_type, PLANE_Z);
        assert_eq!(Plane::new([-1.0, 0.0, 0.0], 4.0).plane_type, PLANE_ANYZ);
        assert_eq!(Plane::new([0.6, 0.8, 0.0], 4.0).plane_type, PLANE_ANYZ);
    }

    #[test]
    fn plane_diff_axial_matches_dot() {
        let axial = Plane::axial(1, 10.0);
        let general = Plane {
            plane_type: PLANE_ANYZ,
            ..axial
        };
        let p = [3.0, 25.0, -7.0];
        assert_eq!(axial.diff(&p), 15.0);
        assert_eq!(general.diff(&p), 15.0);
    }

    #[test]
    fn plane_negated_flips_side() {
        let plane = Plane::new([0.0, 0.0, 1.0], 8.0);
        let back = plane.negated();
        assert_eq!(back.normal, [0.0, 0.0, -1.0]);
        assert_eq!(back.dist, -8.0);
        let p = [0.0, 0.0, 2.0];
        assert_eq!(plane.diff(&p), -back.diff(&p));
    }

    #[test]
    fn trace_default_is_unobstructed() {
        let t = Trace::default();
        assert_eq!(t.fraction, 1.0);
        assert!(!t.allsolid);
        assert!(!t.startsolid);
        assert!(t.ent.is_none());
    }

    #[test]
    fn boxes_overlap_touching_faces() {
        let a0 = [0.0, 0.0, 0.0];
        let a1 = [10.0, 10.0, 10.0];
        assert!(boxes_overlap(&a0, &a1, &[10.0, 0.0, 0.0], &[20.0, 5.0, 5.0]));
        assert!(!boxes_overlap(&a0, &a1, &[10.5, 0.0, 0.0], &[20.0, 5.0, 5.0]));
        assert!(boxes_overlap(&a0, &a1, &[5.0, 5.0, 5.0], &[5.0, 5.0, 5.0]));
    }

    #[test]
    fn box_on_plane_side_axial() {
        let plane = Plane::axial(0, 0.0);
        assert_eq!(box_on_plane_side(&[1.0; 3], &[2.0; 3], &plane), 1);
        assert_eq!(box_on_plane_side(&[-2.0; 3], &[-1.0; 3], &plane), 2);
        assert_eq!(box_on_plane_side(&[-1.0; 3], &[1.0; 3], &plane), 3);
    }

    #[test]
    fn box_on_plane_side_general() {
        let n = 1.0 / 2.0f32.sqrt();
        let plane = Plane::new([n, n, 0.0], 0.0);
        assert_eq!(box_on_plane_side(&[1.0; 3], &[2.0; 3], &plane), 1);
        assert_eq!(box_on_plane_side(&[-2.0; 3], &[-1.0; 3], &plane), 2);
        assert_eq!(box_on_plane_side(&[-1.0; 3], &[1.0; 3], &plane), 3);

        let flipped = plane.negated();
        assert_eq!(box_on_plane_side(&[1.0; 3], &[2.0; 3], &flipped), 2);
    }

    #[test]
    fn lerp_endpoints() {
        let a = [0.0, 10.0, -4.0];
        let b = [8.0, 10.0, 4.0];
        assert_eq!(vector_lerp(&a, 0.0, &b), a);
        assert_eq!(vector_lerp(&a, 1.0, &b), b);
        assert_eq!(vector_lerp(&a, 0.5, &b), [4.0, 10.0, 0.0]);
    }

    #[test]
    fn liquid_contents() {
        assert!(contents_is_liquid(CONTENTS_WATER));
        assert!(contents_is_liquid(CONTENTS_LAVA));
        assert!(!contents_is_liquid(CONTENTS_EMPTY));
        assert!(!contents_is_liquid(CONTENTS_SOLID));
    }
}
