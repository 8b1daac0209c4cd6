//! Line-of-sight queries against world geometry

use crate::rasterizer::{ray_triangle_intersect, Vec4};

use super::scene::World;

/// Hits closer than this to the origin are ignored (self-intersection).
const MIN_HIT_DISTANCE: f32 = 0.05;
/// Hits in the last 1% of the segment count as reaching the target.
const TARGET_SLACK: f32 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    /// Index of the blocking mesh in the world
    pub mesh: usize,
    /// World-space hit point
    pub point: Vec4,
    /// Distance from the origin to the hit
    pub distance: f32,
    /// Hit position along the segment, in [0, 1]
    pub t: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineOfSight {
    Clear { distance: f32 },
    Blocked(RaycastHit),
    /// Target is farther than the allowed range; nothing was tested.
    OutOfRange { distance: f32 },
}

impl LineOfSight {
    pub fn is_clear(&self) -> bool {
        matches!(self, LineOfSight::Clear { .. })
    }
}

/// Test the segment `from -> to` against every triangle in the world and
/// report the nearest blocker.
pub fn line_of_sight(world: &World, from: Vec4, to: Vec4, max_range: f32) -> LineOfSight {
    let delta = Vec4::direction(to.x - from.x, to.y - from.y, to.z - from.z);
    let full_distance = delta.length();

    if full_distance > max_range {
        return LineOfSight::OutOfRange { distance: full_distance };
    }
    let Some(dir) = delta.try_normalize().filter(|_| full_distance >= 0.001) else {
        return LineOfSight::Clear { distance: full_distance };
    };

    let mut closest: Option<RaycastHit> = None;

    for (mesh_idx, mesh) in world.meshes().iter().enumerate() {
        let model = mesh.model_matrix();

        for tri in mesh.triangles() {
            let v0 = tri.a.transform_affine(&model);
            let v1 = tri.b.transform_affine(&model);
            let v2 = tri.c.transform_affine(&model);

            let Some(t) = ray_triangle_intersect(from, dir, v0, v1, v2) else {
                continue;
            };

            let nearer = closest.map_or(true, |hit| t < hit.distance);
            if t > MIN_HIT_DISTANCE && t < full_distance * TARGET_SLACK && nearer {
                closest = Some(RaycastHit {
                    mesh: mesh_idx,
                    point: from + dir.scale(t),
                    distance: t,
                    t: t / full_distance,
                });
            }
        }
    }

    match closest {
        Some(hit) => LineOfSight::Blocked(hit),
        None => LineOfSight::Clear { distance: full_distance },
    }
}
