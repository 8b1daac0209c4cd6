//! World module - meshes, scenes and spatial queries
//!
//! - Triangle meshes with a lazily recomposed model matrix
//! - A flat scene list (no parent/child transforms)
//! - Line-of-sight raycasts against scene geometry

mod mesh;
mod raycast;
mod scene;

pub use mesh::*;
pub use raycast::*;
pub use scene::*;
