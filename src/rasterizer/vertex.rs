//! Vertex stage: model space to screen space
//!
//! Each triangle is transformed by the combined model-view-projection matrix,
//! clipped against the near plane (`w >= z_near`) and projected to integer
//! screen coordinates. The result is a `VertexExport` holding up to two screen
//! triangles plus the world-space data the pixel stage needs for culling and
//! lighting.
//!
//! Attributes that must interpolate linearly in screen space are stored divided
//! by `w`: `inv_z = 1/w`, `u * inv_z` and `v * inv_z`.

use super::camera::Camera;
use super::math::{Matrix4, Vec4};
use super::types::UvCoord;
use crate::world::Triangle;

/// Screen coordinates are clamped to this magnitude. Coordinate differences
/// then fit in 30 bits, so the i64 edge products in `signed_area` cannot
/// overflow. Anything closer keeps its true position and edge slopes.
pub const SCREEN_LIMIT: f64 = (1 << 29) as f64;

/// Triangles a single near-plane clip can produce (quad fan).
pub const MAX_CLIPPED_TRIANGLES: usize = 2;

/// A projected triangle ready for scan conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenTriangle {
    pub x: [i32; 3],
    pub y: [i32; 3],
    pub inv_z: [f32; 3],
    pub u_inv_z: [f32; 3],
    pub v_inv_z: [f32; 3],
}

impl ScreenTriangle {
    /// Empty slot marker. A negative `inv_z` can never pass the depth test.
    pub const INVALID: ScreenTriangle = ScreenTriangle {
        x: [0; 3],
        y: [0; 3],
        inv_z: [-1.0; 3],
        u_inv_z: [0.0; 3],
        v_inv_z: [0.0; 3],
    };

    pub fn is_valid(&self) -> bool {
        self.inv_z.iter().all(|&iz| iz > 0.0)
    }

    pub fn vertex(&self, i: usize) -> (i32, i32) {
        (self.x[i], self.y[i])
    }
}

impl Default for ScreenTriangle {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Per-triangle output of the vertex stage, consumed by every pixel stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexExport {
    pub triangles: [ScreenTriangle; MAX_CLIPPED_TRIANGLES],
    /// World-space unit normal, `(b - a) x (c - a)`
    pub normal: Vec4,
    /// World-space unit vector from vertex `a` towards the camera
    pub to_camera: Vec4,
}

impl Default for VertexExport {
    fn default() -> Self {
        Self {
            triangles: [ScreenTriangle::INVALID; MAX_CLIPPED_TRIANGLES],
            normal: Vec4::ZERO,
            to_camera: Vec4::ZERO,
        }
    }
}

impl VertexExport {
    /// False when the whole triangle was rejected by the near plane.
    pub fn is_visible(&self) -> bool {
        self.triangles[0].is_valid()
    }

    pub fn visible_triangles(&self) -> impl Iterator<Item = &ScreenTriangle> {
        self.triangles.iter().filter(|t| t.is_valid())
    }
}

/// Clip-space vertex with its texture coordinate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipVertex {
    pub pos: Vec4,
    pub uv: UvCoord,
}

/// Up to four vertices left after clipping a triangle against one plane.
#[derive(Debug, Clone, Copy)]
pub struct ClippedPolygon {
    verts: [ClipVertex; 4],
    len: usize,
}

impl ClippedPolygon {
    fn new() -> Self {
        let empty = ClipVertex { pos: Vec4::ZERO, uv: UvCoord::ZERO };
        Self { verts: [empty; 4], len: 0 }
    }

    fn push(&mut self, v: ClipVertex) {
        // A triangle clipped by one plane gains at most one vertex
        debug_assert!(self.len < 4);
        if self.len < 4 {
            self.verts[self.len] = v;
            self.len += 1;
        }
    }

    pub fn vertices(&self) -> &[ClipVertex] {
        &self.verts[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Sutherland-Hodgman against the plane `w = z_near`. A vertex is inside when
/// `w >= z_near`; crossing edges gain a vertex interpolated at
/// `t = (z_near - w_cur) / (w_next - w_cur)`.
pub fn clip_near(input: &[ClipVertex; 3], z_near: f32) -> ClippedPolygon {
    let mut out = ClippedPolygon::new();

    for i in 0..3 {
        let cur = input[i];
        let next = input[(i + 1) % 3];
        let cur_in = cur.pos.w >= z_near;
        let next_in = next.pos.w >= z_near;

        if cur_in {
            out.push(cur);
        }
        if cur_in != next_in {
            let t = (z_near - cur.pos.w) / (next.pos.w - cur.pos.w);
            out.push(ClipVertex {
                pos: cur.pos.lerp(next.pos, t),
                uv: cur.uv.lerp(next.uv, t),
            });
        }
    }

    out
}

/// Map a clip-space vertex to the screen. NDC `[-1, 1]` spans the full width,
/// and +Y points up in NDC but down on screen.
///
/// The divide and screen mapping run in f64 so vertices far outside the frame
/// keep their exact integer position.
pub fn project(v: &ClipVertex, res_x: f32, res_y: f32) -> (i32, i32, f32, f32, f32) {
    let inv_z = 1.0 / v.pos.w;
    let w = v.pos.w as f64;
    let ndc_x = v.pos.x as f64 / w;
    let ndc_y = v.pos.y as f64 / w;

    let sx = ((ndc_x + 1.0) * 0.5 * res_x as f64).floor().clamp(-SCREEN_LIMIT, SCREEN_LIMIT);
    let sy = ((1.0 - ndc_y) * 0.5 * res_y as f64).floor().clamp(-SCREEN_LIMIT, SCREEN_LIMIT);

    (sx as i32, sy as i32, inv_z, v.uv.u * inv_z, v.uv.v * inv_z)
}

fn screen_triangle(verts: [&ClipVertex; 3], res_x: f32, res_y: f32) -> ScreenTriangle {
    let mut tri = ScreenTriangle::INVALID;
    for (i, v) in verts.into_iter().enumerate() {
        let (x, y, iz, uiz, viz) = project(v, res_x, res_y);
        tri.x[i] = x;
        tri.y[i] = y;
        tri.inv_z[i] = iz;
        tri.u_inv_z[i] = uiz;
        tri.v_inv_z[i] = viz;
    }
    tri
}

/// Fan-triangulate `poly` around its first vertex into `slots`, marking unused
/// slots invalid. Returns how many fan triangles did not fit.
pub fn emit_fan(poly: &ClippedPolygon, slots: &mut [ScreenTriangle], res_x: f32, res_y: f32) -> usize {
    let verts = poly.vertices();
    let fan = verts.len().saturating_sub(2);
    let mut dropped = 0;

    for i in 0..fan {
        match slots.get_mut(i) {
            Some(slot) => *slot = screen_triangle([&verts[0], &verts[i + 1], &verts[i + 2]], res_x, res_y),
            None => dropped += 1,
        }
    }
    for slot in slots.iter_mut().skip(fan) {
        *slot = ScreenTriangle::INVALID;
    }

    dropped
}

/// Per-worker vertex transform state.
///
/// Loaded with camera data once per frame and with a model matrix once per
/// mesh, so the per-triangle path is a single matrix multiply per vertex.
#[derive(Debug, Clone)]
pub struct VertexStage {
    view_projection: Matrix4,
    mvp: Matrix4,
    model: Matrix4,
    camera_position: Vec4,
    z_near: f32,
    res_x: f32,
    res_y: f32,
}

impl Default for VertexStage {
    fn default() -> Self {
        Self::new()
    }
}

impl VertexStage {
    pub fn new() -> Self {
        Self {
            view_projection: Matrix4::IDENTITY,
            mvp: Matrix4::IDENTITY,
            model: Matrix4::IDENTITY,
            camera_position: Vec4::ORIGIN,
            z_near: super::camera::DEFAULT_Z_NEAR,
            res_x: 1.0,
            res_y: 1.0,
        }
    }

    pub fn load_camera(&mut self, camera: &Camera) {
        let (res_x, res_y) = camera.resolution();
        self.view_projection = camera.view_projection_matrix();
        self.camera_position = camera.position();
        self.z_near = camera.z_near();
        self.res_x = res_x as f32;
        self.res_y = res_y as f32;
        self.mvp = self.view_projection * self.model;
    }

    pub fn load_model(&mut self, model: &Matrix4) {
        self.model = *model;
        self.mvp = self.view_projection * self.model;
    }

    /// Transform, clip and project one triangle into `out`.
    pub fn process(&self, tri: &Triangle, out: &mut VertexExport) {
        let world_a = tri.a.transform_affine(&self.model);
        let world_b = tri.b.transform_affine(&self.model);
        let world_c = tri.c.transform_affine(&self.model);

        out.normal = (world_b - world_a).cross(world_c - world_a).normalize();
        let to_camera = self.camera_position - world_a;
        out.to_camera = Vec4::direction(to_camera.x, to_camera.y, to_camera.z).normalize();

        let clip = [
            ClipVertex { pos: tri.a.transform(&self.mvp), uv: tri.a_uv },
            ClipVertex { pos: tri.b.transform(&self.mvp), uv: tri.b_uv },
            ClipVertex { pos: tri.c.transform(&self.mvp), uv: tri.c_uv },
        ];

        let in_front = clip.iter().filter(|v| v.pos.w >= self.z_near).count();
        match in_front {
            3 => {
                out.triangles[0] = screen_triangle([&clip[0], &clip[1], &clip[2]], self.res_x, self.res_y);
                out.triangles[1] = ScreenTriangle::INVALID;
            }
            0 => out.triangles = [ScreenTriangle::INVALID; MAX_CLIPPED_TRIANGLES],
            _ => {
                let poly = clip_near(&clip, self.z_near);
                let dropped = emit_fan(&poly, &mut out.triangles, self.res_x, self.res_y);
                if dropped > 0 {
                    log::trace!("near clip produced {} triangles too many", dropped);
                }
            }
        }
    }
}
