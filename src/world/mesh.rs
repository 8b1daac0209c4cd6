//! Triangle meshes with a cached model transform

use std::cell::Cell;
use std::sync::Arc;

use crate::rasterizer::{Color, Matrix4, Quaternion, Texture, TextureSampler, UvCoord, Vec4};

/// One textured triangle in model space. Counter-clockwise winding, seen from
/// the outside, marks the front face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: Vec4,
    pub b: Vec4,
    pub c: Vec4,
    pub a_uv: UvCoord,
    pub b_uv: UvCoord,
    pub c_uv: UvCoord,
}

impl Triangle {
    /// Untextured triangle (all UVs zero)
    pub fn new(a: Vec4, b: Vec4, c: Vec4) -> Self {
        Self::with_uvs(a, UvCoord::ZERO, b, UvCoord::ZERO, c, UvCoord::ZERO)
    }

    pub fn with_uvs(a: Vec4, a_uv: UvCoord, b: Vec4, b_uv: UvCoord, c: Vec4, c_uv: UvCoord) -> Self {
        Self {
            a: Vec4::point(a.x, a.y, a.z),
            b: Vec4::point(b.x, b.y, b.z),
            c: Vec4::point(c.x, c.y, c.z),
            a_uv,
            b_uv,
            c_uv,
        }
    }
}

/// Immutable triangle list plus a mutable pose.
///
/// The model matrix `translation(position) * rotation(rotation)` is cached and
/// recomposed from scratch on the first read after any pose change.
#[derive(Clone)]
pub struct Mesh {
    triangles: Arc<[Triangle]>,
    position: Vec4,
    rotation: Quaternion,
    texture: Arc<dyn TextureSampler>,
    pub backface_culling: bool,
    model: Cell<Matrix4>,
    dirty: Cell<bool>,
}

impl Mesh {
    /// Mesh at the origin, untransformed, with a plain white texture.
    pub fn new(triangles: Vec<Triangle>) -> Self {
        Self::with_texture(triangles, Arc::new(Texture::solid(1, 1, Color::WHITE)))
    }

    pub fn with_texture(triangles: Vec<Triangle>, texture: Arc<dyn TextureSampler>) -> Self {
        Self {
            triangles: triangles.into(),
            position: Vec4::ORIGIN,
            rotation: Quaternion::IDENTITY,
            texture,
            backface_culling: false,
            model: Cell::new(Matrix4::IDENTITY),
            dirty: Cell::new(true),
        }
    }

    /// Axis-aligned cube centered on the model origin, one UV square per face.
    pub fn cube(half_size: f32) -> Self {
        let s = half_size;
        // Corners per face, counter-clockwise seen from outside
        let faces: [[(f32, f32, f32); 4]; 6] = [
            [(-s, -s, s), (s, -s, s), (s, s, s), (-s, s, s)],     // +Z
            [(s, -s, -s), (-s, -s, -s), (-s, s, -s), (s, s, -s)], // -Z
            [(s, -s, s), (s, -s, -s), (s, s, -s), (s, s, s)],     // +X
            [(-s, -s, -s), (-s, -s, s), (-s, s, s), (-s, s, -s)], // -X
            [(-s, s, s), (s, s, s), (s, s, -s), (-s, s, -s)],     // +Y
            [(-s, -s, -s), (s, -s, -s), (s, -s, s), (-s, -s, s)], // -Y
        ];
        let uvs = [
            UvCoord::new(0.0, 0.0),
            UvCoord::new(1.0, 0.0),
            UvCoord::new(1.0, 1.0),
            UvCoord::new(0.0, 1.0),
        ];

        let mut triangles = Vec::with_capacity(12);
        for face in &faces {
            let p: Vec<Vec4> = face.iter().map(|&(x, y, z)| Vec4::point(x, y, z)).collect();
            triangles.push(Triangle::with_uvs(p[0], uvs[0], p[1], uvs[1], p[2], uvs[2]));
            triangles.push(Triangle::with_uvs(p[0], uvs[0], p[2], uvs[2], p[3], uvs[3]));
        }

        let mut mesh = Self::new(triangles);
        mesh.backface_culling = true;
        mesh
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Shared handle to the triangle list, for handing to worker threads
    pub fn shared_triangles(&self) -> Arc<[Triangle]> {
        Arc::clone(&self.triangles)
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn texture(&self) -> Arc<dyn TextureSampler> {
        Arc::clone(&self.texture)
    }

    pub fn set_texture(&mut self, texture: Arc<dyn TextureSampler>) {
        self.texture = texture;
    }

    pub fn position(&self) -> Vec4 {
        self.position
    }

    pub fn rotation(&self) -> Quaternion {
        self.rotation
    }

    /// Current model matrix, recomposed only if the pose changed since the
    /// last call.
    pub fn model_matrix(&self) -> Matrix4 {
        if self.dirty.get() {
            let model = Matrix4::translation(self.position) * Matrix4::rotation(self.rotation);
            self.model.set(model);
            self.dirty.set(false);
        }
        self.model.get()
    }

    pub fn move_to(&mut self, pos: Vec4) {
        self.position = Vec4::point(pos.x, pos.y, pos.z);
        self.dirty.set(true);
    }

    pub fn translate_by(&mut self, delta: Vec4) {
        self.position.x += delta.x;
        self.position.y += delta.y;
        self.position.z += delta.z;
        self.dirty.set(true);
    }

    pub fn set_rotation(&mut self, q: Quaternion) {
        self.rotation = q;
        self.dirty.set(true);
    }

    /// Compose `delta` after the current rotation and renormalize.
    pub fn rotate_by(&mut self, delta: Quaternion) {
        self.rotation = self.rotation * delta;
        self.rotation.normalize();
        self.dirty.set(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn unit_triangle() -> Triangle {
        Triangle::new(
            Vec4::point(0.0, 0.0, 0.0),
            Vec4::point(1.0, 0.0, 0.0),
            Vec4::point(0.0, 1.0, 0.0),
        )
    }

    #[test]
    fn test_model_matrix_tracks_mutations() {
        let mut mesh = Mesh::new(vec![unit_triangle()]);
        assert_eq!(mesh.model_matrix(), Matrix4::IDENTITY);

        mesh.translate_by(Vec4::direction(1.0, 2.0, 3.0));
        let m = mesh.model_matrix();
        assert_eq!((m.m[0][3], m.m[1][3], m.m[2][3]), (1.0, 2.0, 3.0));

        mesh.move_to(Vec4::point(0.0, 0.0, -5.0));
        assert_eq!(mesh.model_matrix().m[2][3], -5.0);
        assert_eq!(mesh.model_matrix().m[0][3], 0.0);
    }

    #[test]
    fn test_rotation_is_recomposed_not_accumulated() {
        let step = Quaternion::from_axis_angle(Vec4::direction(0.0, 0.0, 1.0), 0.01);
        let mut mesh = Mesh::new(vec![unit_triangle()]);

        for _ in 0..1000 {
            mesh.rotate_by(step);
            let _ = mesh.model_matrix();
        }

        let q = mesh.rotation();
        assert_abs_diff_eq!(q.norm_squared(), 1.0, epsilon = 1e-5);

        let expected = Matrix4::translation(mesh.position()) * Matrix4::rotation(q);
        assert!(mesh.model_matrix().max_abs_diff(&expected) < 1e-6);
    }

    #[test]
    fn test_cube_normals_point_outward() {
        let cube = Mesh::cube(1.0);
        assert_eq!(cube.triangle_count(), 12);

        for tri in cube.triangles() {
            let n = (tri.b - tri.a).cross(tri.c - tri.a);
            let centroid = (tri.a + tri.b + tri.c).scale(1.0 / 3.0);
            let outward = Vec4::direction(centroid.x, centroid.y, centroid.z);
            assert!(n.dot(outward) > 0.0, "inward-facing cube triangle");
        }
    }
}
