//! Software rasterizer
//!
//! - Homogeneous math kernel (vectors, quaternions, row-major matrices)
//! - Perspective camera with an infinite far plane
//! - Vertex stage with near-plane clipping
//! - Scanline pixel stage with perspective-correct texturing and a 1/w depth buffer
//! - Lockstep worker pool splitting the frame into row bands

mod camera;
mod framebuffer;
mod math;
mod pixel;
mod scheduler;
mod types;
mod vertex;
mod wireframe;

pub use camera::*;
pub use framebuffer::*;
pub use math::*;
pub use pixel::*;
pub use scheduler::*;
pub use types::*;
pub use vertex::*;
pub use wireframe::*;
