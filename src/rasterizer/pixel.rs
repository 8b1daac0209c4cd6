//! Pixel stage: scan conversion into one horizontal band
//!
//! Every worker runs a `PixelStage` over the complete export list of a mesh
//! but only touches rows inside its own band. Edge positions are evaluated in
//! closed form per row, so a pixel's coverage and interpolated values do not
//! depend on where the band boundaries are.

use super::framebuffer::FrameBand;
use super::math::{barycentric, signed_area, Vec4};
use super::types::{shade_argb, TextureSampler};
use super::vertex::{ScreenTriangle, VertexExport};

/// Per-worker fragment state: band extent and lighting parameters.
#[derive(Debug, Clone)]
pub struct PixelStage {
    y_min: i32,
    y_max: i32,
    width: i32,
    light: Vec4,
    min_light: f32,
}

impl PixelStage {
    /// Stage for rows `[y_min, y_max)` of a `width` pixel wide frame.
    /// `light` must be a unit direction.
    pub fn new(y_min: usize, y_max: usize, width: usize, light: Vec4, min_light: f32) -> Self {
        Self {
            y_min: y_min as i32,
            y_max: y_max as i32,
            width: width as i32,
            light,
            min_light,
        }
    }

    pub fn rows(&self) -> (usize, usize) {
        (self.y_min as usize, self.y_max as usize)
    }

    /// Diffuse factor for a face, or `None` if it is culled.
    ///
    /// Single-sided faces whose normal points away from the camera are
    /// dropped. Double-sided faces are lit from either side.
    pub fn light_factor(&self, export: &VertexExport, backface_culling: bool) -> Option<f32> {
        let n_dot_l = export.normal.dot(self.light);
        if backface_culling {
            if export.normal.dot(export.to_camera) <= 0.0 {
                return None;
            }
            Some(n_dot_l.clamp(self.min_light, 1.0))
        } else {
            Some(n_dot_l.abs().clamp(self.min_light, 1.0))
        }
    }

    /// Rasterize one vertex export into `target`.
    pub fn draw(
        &self,
        export: &VertexExport,
        texture: &dyn TextureSampler,
        backface_culling: bool,
        target: &mut FrameBand,
    ) {
        if !export.is_visible() {
            return;
        }
        let Some(factor) = self.light_factor(export, backface_culling) else {
            return;
        };

        for tri in export.visible_triangles() {
            self.fill(tri, factor, texture, target);
        }
    }

    fn fill(&self, tri: &ScreenTriangle, factor: f32, texture: &dyn TextureSampler, target: &mut FrameBand) {
        let top_y = tri.y.iter().copied().min().unwrap_or(0);
        let bottom_y = tri.y.iter().copied().max().unwrap_or(0);
        if bottom_y <= self.y_min || top_y >= self.y_max {
            return;
        }
        if signed_area(tri.vertex(0), tri.vertex(1), tri.vertex(2)) == 0 {
            return;
        }

        // Order by y; a beats b beats c on ties since the sort is stable
        let mut order = [0usize, 1, 2];
        order.sort_by_key(|&i| tri.y[i]);
        let top = tri.vertex(order[0]);
        let mid = tri.vertex(order[1]);
        let bot = tri.vertex(order[2]);

        // (bot - top) x (mid - top): negative puts mid on the right of the long edge
        let side = signed_area(top, bot, mid);
        if side == 0 {
            return;
        }
        let mid_on_right = side < 0;

        let span = Span { top, mid, bot, mid_on_right };
        let rows_lo = top.1.max(self.y_min).max(target.y0 as i32);
        let rows_hi = bot.1.min(self.y_max).min(target.y1 as i32);

        for y in rows_lo..rows_hi {
            let Some((left, right)) = span.edges_at(y) else {
                continue;
            };
            self.fill_row(tri, y, left, right, factor, texture, target);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn fill_row(
        &self,
        tri: &ScreenTriangle,
        y: i32,
        left: f32,
        right: f32,
        factor: f32,
        texture: &dyn TextureSampler,
        target: &mut FrameBand,
    ) {
        let x_start = (left.ceil() as i32).max(0);
        let x_end = (right.ceil() as i32).min(self.width).min(target.width as i32);
        if x_start >= x_end {
            return;
        }

        let (a, b, c) = (tri.vertex(0), tri.vertex(1), tri.vertex(2));
        let (Some(w_start), Some(w_end)) = (barycentric((x_start, y), a, b, c), barycentric((x_end, y), a, b, c)) else {
            return;
        };

        let interp = |w: [f32; 3], attr: &[f32; 3]| w[0] * attr[0] + w[1] * attr[1] + w[2] * attr[2];
        let steps = (x_end - x_start) as f32;

        let mut inv_z = interp(w_start, &tri.inv_z);
        let mut u_inv_z = interp(w_start, &tri.u_inv_z);
        let mut v_inv_z = interp(w_start, &tri.v_inv_z);
        let d_inv_z = (interp(w_end, &tri.inv_z) - inv_z) / steps;
        let d_u_inv_z = (interp(w_end, &tri.u_inv_z) - u_inv_z) / steps;
        let d_v_inv_z = (interp(w_end, &tri.v_inv_z) - v_inv_z) / steps;

        let row = (y - target.y0 as i32) as usize * target.width;
        for x in x_start..x_end {
            let idx = row + x as usize;
            if target.depth_test(idx, inv_z) {
                let u = u_inv_z / inv_z;
                let v = v_inv_z / inv_z;
                target.color[idx] = shade_argb(texture.sample(u, v), factor);
            }
            inv_z += d_inv_z;
            u_inv_z += d_u_inv_z;
            v_inv_z += d_v_inv_z;
        }
    }
}

/// Sorted triangle edges. The long edge runs top to bottom; the short side
/// switches from top->mid to mid->bottom at the mid row.
struct Span {
    top: (i32, i32),
    mid: (i32, i32),
    bot: (i32, i32),
    mid_on_right: bool,
}

impl Span {
    /// Left and right x of row `y`, or `None` outside `[top, bottom)`.
    fn edges_at(&self, y: i32) -> Option<(f32, f32)> {
        if y < self.top.1 || y >= self.bot.1 {
            return None;
        }
        let long = edge_x(self.top, self.bot, y);
        let short = if y < self.mid.1 {
            edge_x(self.top, self.mid, y)
        } else {
            edge_x(self.mid, self.bot, y)
        };

        Some(if self.mid_on_right { (long, short) } else { (short, long) })
    }
}

/// X of the edge `p0 -> p1` at row `y`. Horizontal edges return `p0.x`.
fn edge_x(p0: (i32, i32), p1: (i32, i32), y: i32) -> f32 {
    let dy = p1.1 - p0.1;
    if dy == 0 {
        return p0.0 as f32;
    }
    let t = (y - p0.1) as f64 / dy as f64;
    (p0.0 as f64 + (p1.0 - p0.0) as f64 * t) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::framebuffer::CLEAR_DEPTH;

    struct Flat(u32);

    impl TextureSampler for Flat {
        fn sample(&self, _u: f32, _v: f32) -> u32 {
            self.0
        }
    }

    fn screen_tri(pts: [(i32, i32); 3], inv_z: f32) -> ScreenTriangle {
        ScreenTriangle {
            x: [pts[0].0, pts[1].0, pts[2].0],
            y: [pts[0].1, pts[1].1, pts[2].1],
            inv_z: [inv_z; 3],
            u_inv_z: [0.0; 3],
            v_inv_z: [0.0; 3],
        }
    }

    fn export(tri: ScreenTriangle, normal: Vec4, to_camera: Vec4) -> VertexExport {
        VertexExport {
            triangles: [tri, ScreenTriangle::INVALID],
            normal,
            to_camera,
        }
    }

    fn stage(width: usize, height: usize) -> PixelStage {
        PixelStage::new(0, height, width, Vec4::direction(0.0, 0.0, 1.0), 0.1)
    }

    fn covered(band: &FrameBand) -> usize {
        band.depth.iter().filter(|&&d| d > CLEAR_DEPTH).count()
    }

    #[test]
    fn test_square_from_two_triangles_has_no_gaps_or_overlap() {
        let facing = Vec4::direction(0.0, 0.0, 1.0);
        let mut band = FrameBand::new(16, 0, 16);
        let stage = stage(16, 16);

        let lower = export(screen_tri([(2, 2), (2, 10), (10, 10)], 0.5), facing, facing);
        let upper = export(screen_tri([(2, 2), (10, 10), (10, 2)], 0.5), facing, facing);
        stage.draw(&lower, &Flat(0xFF00_00FF), false, &mut band);
        stage.draw(&upper, &Flat(0xFF00_00FF), false, &mut band);

        // Top-left fill: [2, 10) x [2, 10)
        assert_eq!(covered(&band), 64);
        assert!(band.index(1, 2).map_or(false, |i| band.depth[i] == CLEAR_DEPTH));
        assert!(band.index(10, 5).map_or(false, |i| band.depth[i] == CLEAR_DEPTH));
    }

    #[test]
    fn test_backface_is_culled_only_when_single_sided() {
        let normal = Vec4::direction(0.0, 0.0, 1.0);
        let away = Vec4::direction(0.0, 0.0, -1.0);
        let tri = screen_tri([(0, 0), (0, 8), (8, 8)], 0.5);
        let stage = stage(8, 8);

        let mut band = FrameBand::new(8, 0, 8);
        stage.draw(&export(tri, normal, away), &Flat(0xFFFF_FFFF), true, &mut band);
        assert_eq!(covered(&band), 0);

        stage.draw(&export(tri, normal, away), &Flat(0xFFFF_FFFF), false, &mut band);
        assert!(covered(&band) > 0);
    }

    #[test]
    fn test_light_factor_is_clamped() {
        let stage = stage(4, 4);
        let toward = Vec4::direction(0.0, 0.0, 1.0);
        let sideways = Vec4::direction(1.0, 0.0, 0.0);
        let opposite = Vec4::direction(0.0, 0.0, -1.0);

        let lit = export(ScreenTriangle::INVALID, toward, toward);
        assert_eq!(stage.light_factor(&lit, true), Some(1.0));

        let grazing = export(ScreenTriangle::INVALID, sideways, sideways);
        assert_eq!(stage.light_factor(&grazing, true), Some(0.1));

        // Double-sided faces use |n . l|
        let flipped = export(ScreenTriangle::INVALID, opposite, toward);
        assert_eq!(stage.light_factor(&flipped, false), Some(1.0));
    }

    #[test]
    fn test_nearer_fragment_wins_in_any_order() {
        let facing = Vec4::direction(0.0, 0.0, 1.0);
        let near = export(screen_tri([(0, 0), (0, 8), (8, 8)], 0.5), facing, facing);
        let far = export(screen_tri([(0, 0), (0, 8), (8, 8)], 0.25), facing, facing);
        let stage = stage(8, 8);

        let mut first = FrameBand::new(8, 0, 8);
        stage.draw(&near, &Flat(0xFFFF_0000), false, &mut first);
        stage.draw(&far, &Flat(0xFF00_FF00), false, &mut first);

        let mut second = FrameBand::new(8, 0, 8);
        stage.draw(&far, &Flat(0xFF00_FF00), false, &mut second);
        stage.draw(&near, &Flat(0xFFFF_0000), false, &mut second);

        assert_eq!(first.color, second.color);
        assert!(first.color.iter().any(|&c| c == 0xFFFF_0000));
        assert!(!first.color.iter().any(|&c| c == 0xFF00_FF00));
    }

    #[test]
    fn test_band_only_touches_its_rows() {
        let facing = Vec4::direction(0.0, 0.0, 1.0);
        let tri = export(screen_tri([(0, 0), (0, 16), (16, 16)], 0.5), facing, facing);

        let mut whole = FrameBand::new(16, 0, 16);
        stage(16, 16).draw(&tri, &Flat(0xFFFF_FFFF), false, &mut whole);

        let mut top = FrameBand::new(16, 0, 5);
        let mut bottom = FrameBand::new(16, 5, 16);
        PixelStage::new(0, 5, 16, facing, 0.1).draw(&tri, &Flat(0xFFFF_FFFF), false, &mut top);
        PixelStage::new(5, 16, 16, facing, 0.1).draw(&tri, &Flat(0xFFFF_FFFF), false, &mut bottom);

        let mut joined = top.color.clone();
        joined.extend_from_slice(&bottom.color);
        assert_eq!(joined, whole.color);
    }

    #[test]
    fn test_degenerate_and_offscreen_are_skipped() {
        let facing = Vec4::direction(0.0, 0.0, 1.0);
        let stage = stage(8, 8);
        let mut band = FrameBand::new(8, 0, 8);

        let line = export(screen_tri([(0, 0), (4, 4), (8, 8)], 0.5), facing, facing);
        stage.draw(&line, &Flat(0xFFFF_FFFF), false, &mut band);

        let off = export(screen_tri([(-20, -20), (-20, -10), (-10, -10)], 0.5), facing, facing);
        stage.draw(&off, &Flat(0xFFFF_FFFF), false, &mut band);
        assert_eq!(covered(&band), 0);

        // Mostly off-screen, clamped to the band width
        let wide = export(screen_tri([(-100, 0), (-100, 8), (100, 8)], 0.5), facing, facing);
        stage.draw(&wide, &Flat(0xFFFF_FFFF), false, &mut band);
        assert!(covered(&band) > 0);
    }
}
