//! Error type for the fallible edges of the crate
//!
//! The render loop itself never fails; only construction, configuration and
//! asset loading return errors.

use std::fmt;

#[derive(Debug)]
pub enum RasterError {
    Io(std::io::Error),
    ConfigParse(ron::error::SpannedError),
    ConfigSerialize(ron::Error),
    Image(image::ImageError),
    InvalidConfig(String),
    ThreadSpawn(std::io::Error),
}

impl From<std::io::Error> for RasterError {
    fn from(e: std::io::Error) -> Self {
        RasterError::Io(e)
    }
}

impl From<ron::error::SpannedError> for RasterError {
    fn from(e: ron::error::SpannedError) -> Self {
        RasterError::ConfigParse(e)
    }
}

impl From<ron::Error> for RasterError {
    fn from(e: ron::Error) -> Self {
        RasterError::ConfigSerialize(e)
    }
}

impl From<image::ImageError> for RasterError {
    fn from(e: image::ImageError) -> Self {
        RasterError::Image(e)
    }
}

impl fmt::Display for RasterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RasterError::Io(e) => write!(f, "IO error: {}", e),
            RasterError::ConfigParse(e) => write!(f, "Config parse error: {}", e),
            RasterError::ConfigSerialize(e) => write!(f, "Config serialize error: {}", e),
            RasterError::Image(e) => write!(f, "Image error: {}", e),
            RasterError::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            RasterError::ThreadSpawn(e) => write!(f, "Failed to spawn render worker: {}", e),
        }
    }
}

impl std::error::Error for RasterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RasterError::Io(e) | RasterError::ThreadSpawn(e) => Some(e),
            RasterError::ConfigParse(e) => Some(e),
            RasterError::ConfigSerialize(e) => Some(e),
            RasterError::Image(e) => Some(e),
            RasterError::InvalidConfig(_) => None,
        }
    }
}
