//! Multithreaded CPU triangle rasterizer
//!
//! Meshes are transformed, near-plane clipped and scan converted by a fixed
//! pool of worker threads. Each worker owns a horizontal band of the frame, so
//! pixel writes never contend, and output is identical for any thread count.
//!
//! ```no_run
//! use lockstep_raster::config::RenderConfig;
//! use lockstep_raster::rasterizer::{Camera, Renderer, Vec4};
//! use lockstep_raster::world::{Mesh, World};
//!
//! let config = RenderConfig::new(320, 240);
//! let mut renderer = Renderer::new(&config)?;
//!
//! let mut world = World::new();
//! let mut cube = Mesh::cube(1.0);
//! cube.move_to(Vec4::point(0.0, 0.0, -5.0));
//! world.add_mesh(cube);
//!
//! let camera = Camera::new(320, 240);
//! renderer.render_world(&world, &camera);
//! let frame = renderer.snapshot();
//! # Ok::<(), lockstep_raster::error::RasterError>(())
//! ```

pub mod config;
pub mod error;
pub mod rasterizer;
pub mod world;

pub use config::RenderConfig;
pub use error::RasterError;
pub use rasterizer::{Camera, Framebuffer, Renderer};
pub use world::{Mesh, Triangle, World};
