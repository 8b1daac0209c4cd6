//! Color + depth buffers, whole or split into horizontal bands
//!
//! Depth holds `1/w` of the nearest surface so far. Larger is closer; a cleared
//! buffer holds `CLEAR_DEPTH`, which every visible fragment beats.

/// Depth value of an empty pixel
pub const CLEAR_DEPTH: f32 = 0.0;

/// Full-frame color/depth pair, both indexed `y * width + x`.
#[derive(Debug, Clone, PartialEq)]
pub struct Framebuffer {
    pub width: usize,
    pub height: usize,
    pub color: Vec<u32>, // ARGB
    pub depth: Vec<f32>,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            color: vec![0; width * height],
            depth: vec![CLEAR_DEPTH; width * height],
        }
    }

    pub fn clear(&mut self, clear_color: u32) {
        self.color.fill(clear_color);
        self.depth.fill(CLEAR_DEPTH);
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        (x < self.width && y < self.height).then(|| self.color[y * self.width + x])
    }

    pub fn depth_at(&self, x: usize, y: usize) -> Option<f32> {
        (x < self.width && y < self.height).then(|| self.depth[y * self.width + x])
    }

    /// Set pixel without depth test (debug overlays)
    pub fn set_pixel(&mut self, x: usize, y: usize, color: u32) {
        if x < self.width && y < self.height {
            self.color[y * self.width + x] = color;
        }
    }

    /// Draw a line from (x0, y0) to (x1, y1) using Bresenham's algorithm.
    /// Off-screen parts are skipped.
    pub fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: u32) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let mut x = x0;
        let mut y = y0;

        loop {
            if x >= 0 && y >= 0 {
                self.set_pixel(x as usize, y as usize, color);
            }

            if x == x1 && y == y1 {
                break;
            }

            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Copy a band's rows into place.
    pub fn blit_band(&mut self, band: &FrameBand) {
        debug_assert_eq!(band.width, self.width);
        let start = band.y0 * self.width;
        let end = start + band.color.len();
        self.color[start..end].copy_from_slice(&band.color);
        self.depth[start..end].copy_from_slice(&band.depth);
    }
}

/// Owned rows `[y0, y1)` of a frame. A worker writes only into its own band,
/// so bands can be filled in parallel without sharing memory.
#[derive(Debug, Clone)]
pub struct FrameBand {
    pub width: usize,
    pub y0: usize,
    pub y1: usize,
    pub color: Vec<u32>,
    pub depth: Vec<f32>,
}

impl FrameBand {
    pub fn new(width: usize, y0: usize, y1: usize) -> Self {
        let len = width * y1.saturating_sub(y0);
        Self {
            width,
            y0,
            y1,
            color: vec![0; len],
            depth: vec![CLEAR_DEPTH; len],
        }
    }

    pub fn rows(&self) -> usize {
        self.y1 - self.y0
    }

    pub fn clear(&mut self, clear_color: u32) {
        self.color.fill(clear_color);
        self.depth.fill(CLEAR_DEPTH);
    }

    /// Local buffer index for global pixel (x, y), if it lies in this band.
    #[inline]
    pub fn index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y >= self.y0 && y < self.y1).then(|| (y - self.y0) * self.width + x)
    }

    /// Depth test at local index `idx`. Stores `inv_z` and returns true only
    /// if it is strictly nearer than what is there; the caller then writes color.
    #[inline]
    pub fn depth_test(&mut self, idx: usize, inv_z: f32) -> bool {
        if inv_z > self.depth[idx] {
            self.depth[idx] = inv_z;
            true
        } else {
            false
        }
    }
}

/// Row ranges for `count` bands: `height / count` rows each, the last band
/// also takes the remainder.
pub fn band_ranges(height: usize, count: usize) -> Vec<(usize, usize)> {
    let count = count.max(1);
    let rows = height / count;
    (0..count)
        .map(|i| {
            let y0 = i * rows;
            let y1 = if i == count - 1 { height } else { (i + 1) * rows };
            (y0, y1)
        })
        .collect()
}
