//! Renderer configuration
//!
//! Uses RON (Rusty Object Notation) so settings files stay human-editable.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RasterError;
use crate::rasterizer::Vec4;

pub const DEFAULT_POOL_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Output width in pixels
    pub width: usize,
    /// Output height in pixels
    pub height: usize,
    /// Worker count. `None` uses every available core.
    pub threads: Option<usize>,
    /// Direction toward the light, world space. Normalized on use.
    pub light_direction: [f32; 3],
    /// Lower bound of the light factor so faces never go fully black
    pub min_light: f32,
    /// ARGB color used by `Renderer::clear`
    pub clear_color: u32,
    /// Vertex export records allocated up front
    pub initial_pool_capacity: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            threads: None,
            light_direction: [0.0, 1.0, 0.5],
            min_light: 0.1,
            clear_color: 0xFFFF_FFFF,
            initial_pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

impl RenderConfig {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Resolved worker count
    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Normalized light direction. Falls back to straight up for a zero vector.
    pub fn light(&self) -> Vec4 {
        let [x, y, z] = self.light_direction;
        Vec4::direction(x, y, z)
            .try_normalize()
            .unwrap_or(Vec4::direction(0.0, 1.0, 0.0))
    }

    pub fn validate(&self) -> Result<(), RasterError> {
        if self.width == 0 || self.height == 0 {
            return Err(RasterError::InvalidConfig(format!(
                "resolution must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.threads == Some(0) {
            return Err(RasterError::InvalidConfig("thread count must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.min_light) {
            return Err(RasterError::InvalidConfig(format!(
                "min_light must be within [0, 1], got {}",
                self.min_light
            )));
        }
        Ok(())
    }

    /// Load a config from a RON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RasterError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config = Self::from_ron_str(&contents)?;
        log::debug!("Loaded render config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a config from a RON string
    pub fn from_ron_str(s: &str) -> Result<Self, RasterError> {
        let config: RenderConfig = ron::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Save a config to a RON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), RasterError> {
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(2)
            .indentor("  ".to_string());

        let contents = ron::ser::to_string_pretty(self, pretty)?;
        fs::write(path, contents)?;
        Ok(())
    }
}
