//! Core types for the rasterizer: colors, UVs and textures

use std::path::Path;

use crate::error::RasterError;

/// RGBA color (0-255 per channel)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };
    pub const RED: Color = Color { r: 255, g: 0, b: 0, a: 255 };
    pub const GREEN: Color = Color { r: 0, g: 255, b: 0, a: 255 };
    pub const BLUE: Color = Color { r: 0, g: 0, b: 255, a: 255 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn with_alpha(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Pack as `0xAARRGGBB`, the layout of the color buffer.
    pub const fn to_argb(self) -> u32 {
        ((self.a as u32) << 24) | ((self.r as u32) << 16) | ((self.g as u32) << 8) | (self.b as u32)
    }

    pub const fn from_argb(argb: u32) -> Self {
        Self {
            a: (argb >> 24) as u8,
            r: (argb >> 16) as u8,
            g: (argb >> 8) as u8,
            b: argb as u8,
        }
    }
}

/// Scale the RGB channels of a packed ARGB color, leaving alpha untouched.
/// Channels are rounded to nearest.
#[inline]
pub fn shade_argb(argb: u32, factor: f32) -> u32 {
    let f = factor.clamp(0.0, 1.0);
    let r = (((argb >> 16) & 0xFF) as f32 * f + 0.5) as u32;
    let g = (((argb >> 8) & 0xFF) as f32 * f + 0.5) as u32;
    let b = ((argb & 0xFF) as f32 * f + 0.5) as u32;

    (argb & 0xFF00_0000) | (r.min(255) << 16) | (g.min(255) << 8) | b.min(255)
}

/// Per-vertex texture coordinate. The third slot is carried but never sampled.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UvCoord {
    pub u: f32,
    pub v: f32,
    pub w: f32,
}

impl UvCoord {
    pub const ZERO: UvCoord = UvCoord { u: 0.0, v: 0.0, w: 0.0 };

    pub const fn new(u: f32, v: f32) -> Self {
        Self { u, v, w: 0.0 }
    }

    pub fn lerp(self, other: UvCoord, t: f32) -> UvCoord {
        UvCoord {
            u: self.u + (other.u - self.u) * t,
            v: self.v + (other.v - self.v) * t,
            w: self.w + (other.w - self.w) * t,
        }
    }
}

/// Anything the pixel stage can look colors up in.
///
/// Implementations bring `u, v` into `[0, 1)` themselves and return a packed
/// ARGB color.
pub trait TextureSampler: Send + Sync {
    fn sample(&self, u: f32, v: f32) -> u32;
}

/// How out-of-range UVs are brought back into the texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureWrap {
    #[default]
    Repeat,
    Clamp,
}

/// ARGB texture. `v = 0` addresses the bottom row of the image.
#[derive(Debug, Clone)]
pub struct Texture {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u32>,
    pub wrap: TextureWrap,
    pub name: String,
}

impl Texture {
    /// Single-color texture
    pub fn solid(width: usize, height: usize, color: Color) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            pixels: vec![color.to_argb(); width * height],
            wrap: TextureWrap::Repeat,
            name: String::new(),
        }
    }

    /// Build from already decoded ARGB pixels, row-major, top row first.
    pub fn from_pixels(width: usize, height: usize, pixels: Vec<u32>) -> Result<Self, RasterError> {
        if width == 0 || height == 0 || pixels.len() != width * height {
            return Err(RasterError::InvalidConfig(format!(
                "texture of {}x{} needs {} pixels, got {}",
                width,
                height,
                width * height,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
            wrap: TextureWrap::Repeat,
            name: String::new(),
        })
    }

    pub fn with_wrap(mut self, wrap: TextureWrap) -> Self {
        self.wrap = wrap;
        self
    }

    /// Load texture from an image file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RasterError> {
        let path = path.as_ref();
        let img = image::open(path)?;

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let texture = Self::from_image(img, name)?;
        log::info!("Loaded texture: {} ({}x{})", texture.name, texture.width, texture.height);
        Ok(texture)
    }

    /// Load texture from encoded image bytes
    pub fn from_bytes(bytes: &[u8], name: String) -> Result<Self, RasterError> {
        let img = image::load_from_memory(bytes)?;
        Self::from_image(img, name)
    }

    fn from_image(img: image::DynamicImage, name: String) -> Result<Self, RasterError> {
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(RasterError::InvalidConfig(format!(
                "texture '{}' is {}x{}, needs at least one pixel",
                name, width, height
            )));
        }

        let pixels = rgba
            .pixels()
            .map(|p| Color::with_alpha(p[0], p[1], p[2], p[3]).to_argb())
            .collect();

        Ok(Self {
            width: width as usize,
            height: height as usize,
            pixels,
            wrap: TextureWrap::Repeat,
            name,
        })
    }

    /// Create a checkerboard test texture
    pub fn checkerboard(width: usize, height: usize, color1: Color, color2: Color) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let checker = ((x / 4) + (y / 4)) % 2 == 0;
                pixels.push(if checker { color1 } else { color2 }.to_argb());
            }
        }
        Self {
            width,
            height,
            pixels,
            wrap: TextureWrap::Repeat,
            name: "checkerboard".to_string(),
        }
    }

    /// Get pixel at x,y coordinates (top row is y = 0)
    pub fn get_pixel(&self, x: usize, y: usize) -> Color {
        if x < self.width && y < self.height {
            Color::from_argb(self.pixels[y * self.width + x])
        } else {
            Color::BLACK
        }
    }

    #[inline]
    fn texel_index(&self, u: f32, v: f32) -> usize {
        let (w, h) = (self.width, self.height);
        let (tx, ty) = match self.wrap {
            TextureWrap::Repeat => {
                let tx = ((u * w as f32).floor() as i64).rem_euclid(w as i64) as usize;
                let ty = (((1.0 - v) * h as f32).floor() as i64).rem_euclid(h as i64) as usize;
                (tx, ty)
            }
            TextureWrap::Clamp => {
                let uc = if u.is_nan() { 0.0 } else { u.clamp(0.0, 1.0) };
                let vc = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
                let tx = ((uc * w as f32) as usize).min(w - 1);
                let ty = (((1.0 - vc) * h as f32) as usize).min(h - 1);
                (tx, ty)
            }
        };
        ty * w + tx
    }
}

impl TextureSampler for Texture {
    #[inline]
    fn sample(&self, u: f32, v: f32) -> u32 {
        self.pixels[self.texel_index(u, v)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argb_round_trip_and_shade() {
        let c = Color::with_alpha(200, 100, 50, 128);
        assert_eq!(Color::from_argb(c.to_argb()), c);

        let dimmed = Color::from_argb(shade_argb(c.to_argb(), 0.5));
        assert_eq!(dimmed, Color::with_alpha(100, 50, 25, 128));
        assert_eq!(shade_argb(c.to_argb(), 1.0), c.to_argb());
    }

    #[test]
    fn test_repeat_wraps_and_flips_v() {
        // 2x2: top row red/green, bottom row blue/white
        let tex = Texture::from_pixels(
            2,
            2,
            vec![
                Color::RED.to_argb(),
                Color::GREEN.to_argb(),
                Color::BLUE.to_argb(),
                Color::WHITE.to_argb(),
            ],
        )
        .unwrap();

        // v near 0 is the bottom row
        assert_eq!(tex.sample(0.1, 0.1), Color::BLUE.to_argb());
        assert_eq!(tex.sample(0.9, 0.9), Color::GREEN.to_argb());
        // wrap in both directions
        assert_eq!(tex.sample(1.1, 0.1), Color::BLUE.to_argb());
        assert_eq!(tex.sample(-0.4, 0.1), Color::WHITE.to_argb());
    }

    #[test]
    fn test_clamp_stays_on_edge() {
        let tex = Texture::checkerboard(8, 8, Color::RED, Color::BLUE).with_wrap(TextureWrap::Clamp);
        assert_eq!(tex.sample(5.0, 5.0), tex.sample(0.99, 0.99));
        assert_eq!(tex.sample(-3.0, -3.0), tex.sample(0.0, 0.0));
        // NaN must not index out of bounds
        let _ = tex.sample(f32::NAN, f32::NAN);
    }

    #[test]
    fn test_from_pixels_rejects_size_mismatch() {
        assert!(Texture::from_pixels(2, 2, vec![0; 3]).is_err());
        assert!(Texture::from_pixels(0, 2, vec![]).is_err());
    }

    #[test]
    fn test_empty_image_is_rejected() {
        assert!(Texture::from_image(image::DynamicImage::new_rgba8(0, 0), "empty".into()).is_err());
        assert!(Texture::from_image(image::DynamicImage::new_rgba8(3, 0), "flat".into()).is_err());

        let tex = Texture::from_image(image::DynamicImage::new_rgba8(2, 1), "tiny".into()).unwrap();
        assert_eq!((tex.width, tex.height), (2, 1));
        let _ = tex.sample(0.7, 0.3);
    }
}
