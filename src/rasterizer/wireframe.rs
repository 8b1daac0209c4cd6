//! Single-threaded wireframe overlay for debugging

use super::camera::Camera;
use super::framebuffer::Framebuffer;
use super::vertex::{project, ClipVertex};
use crate::world::Mesh;

/// Draw the edges of every triangle of `mesh` on top of `fb`, no depth test.
///
/// Uses the same screen mapping as the vertex stage. Triangles with any
/// vertex behind the near plane are skipped rather than clipped.
pub fn render_wireframe(fb: &mut Framebuffer, mesh: &Mesh, camera: &Camera, color: u32) {
    let mvp = camera.view_projection_matrix() * mesh.model_matrix();
    let (res_x, res_y) = camera.resolution();
    let (res_x, res_y) = (res_x as f32, res_y as f32);
    let z_near = camera.z_near();

    for tri in mesh.triangles() {
        let clip = [tri.a, tri.b, tri.c].map(|p| ClipVertex {
            pos: p.transform(&mvp),
            uv: Default::default(),
        });
        if clip.iter().any(|v| v.pos.w < z_near) {
            continue;
        }

        let pts = clip.map(|v| {
            let (x, y, ..) = project(&v, res_x, res_y);
            (x, y)
        });
        for i in 0..3 {
            let (x0, y0) = pts[i];
            let (x1, y1) = pts[(i + 1) % 3];
            fb.draw_line(x0, y0, x1, y1, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::Vec4;

    #[test]
    fn test_cube_outline_is_drawn() {
        let mut camera = Camera::new(64, 64);
        camera.set_fov(90.0);
        let mut cube = Mesh::cube(1.0);
        cube.move_to(Vec4::point(0.0, 0.0, -4.0));

        let mut fb = Framebuffer::new(64, 64);
        render_wireframe(&mut fb, &cube, &camera, 0xFFFF_FFFF);
        let lit = fb.color.iter().filter(|&&c| c == 0xFFFF_FFFF).count();
        assert!(lit > 0);

        // Behind the camera: nothing
        cube.move_to(Vec4::point(0.0, 0.0, 4.0));
        let mut fb = Framebuffer::new(64, 64);
        render_wireframe(&mut fb, &cube, &camera, 0xFFFF_FFFF);
        assert!(fb.color.iter().all(|&c| c == 0));
    }
}
