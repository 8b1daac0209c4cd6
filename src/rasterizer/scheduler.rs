//! Lockstep worker pool
//!
//! N workers each own one horizontal band of the frame for their lifetime.
//! The orchestrator (the thread calling into `Renderer`) publishes a job and
//! then walks everyone through the same barrier sequence:
//!
//! - `LoadCamera`: entry -> exit
//! - `RenderMesh`: entry -> vertex stage on a slice of triangles -> mid ->
//!   pixel stage over every triangle, own band only -> exit
//!
//! All barriers have N + 1 parties. The mid barrier is the only cross-worker
//! dependency: every export is written before anyone starts reading exports.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use super::camera::Camera;
use super::framebuffer::{band_ranges, FrameBand, Framebuffer};
use super::math::Matrix4;
use super::pixel::PixelStage;
use super::types::TextureSampler;
use super::vertex::{VertexExport, VertexStage};
use crate::config::RenderConfig;
use crate::error::RasterError;
use crate::world::{Mesh, Triangle, World};

/// Work published to all workers before the entry barrier.
#[derive(Clone)]
enum Job {
    Idle,
    LoadCamera(Camera),
    RenderMesh(MeshJob),
}

#[derive(Clone)]
struct MeshJob {
    triangles: Arc<[Triangle]>,
    model: Matrix4,
    texture: Arc<dyn TextureSampler>,
    backface_culling: bool,
}

/// Contiguous triangle range vertex-processed by `worker`: `total / count`
/// each, the last worker also takes the remainder.
pub fn triangle_slice(total: usize, count: usize, worker: usize) -> (usize, usize) {
    let per = total / count;
    let start = worker * per;
    let end = if worker == count - 1 { total } else { start + per };
    (start, end)
}

/// Vertex export storage, one segment per worker so the vertex stage writes
/// without contention. Segments only ever grow.
struct ExportPool {
    segments: Vec<RwLock<Vec<VertexExport>>>,
}

impl ExportPool {
    fn new(initial_capacity: usize, workers: usize) -> Self {
        let per_worker = initial_capacity.div_ceil(workers);
        let segments = (0..workers)
            .map(|_| RwLock::new(vec![VertexExport::default(); per_worker]))
            .collect();
        Self { segments }
    }

    fn capacity(&self) -> usize {
        self.segments
            .iter()
            .map(|s| s.read().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    /// Make every segment large enough for its slice of `triangles`.
    /// Existing entries are kept.
    fn ensure_capacity(&self, triangles: usize) {
        let workers = self.segments.len();
        let before = self.capacity();
        let mut grown = false;

        for (worker, segment) in self.segments.iter().enumerate() {
            let (start, end) = triangle_slice(triangles, workers, worker);
            let mut segment = segment.write().unwrap_or_else(PoisonError::into_inner);
            if segment.len() < end - start {
                segment.resize(end - start, VertexExport::default());
                grown = true;
            }
        }

        if grown {
            log::debug!("vertex export pool grown: {} -> {}", before, self.capacity());
        }
    }
}

struct Shared {
    job: RwLock<Job>,
    running: AtomicBool,
    entry: Barrier,
    mid: Barrier,
    exit: Barrier,
    exports: ExportPool,
    bands: Vec<Mutex<FrameBand>>,
}

struct Worker {
    index: usize,
    handle: JoinHandle<()>,
}

/// Multithreaded rasterizer front door.
///
/// Owns the worker pool and the frame. Calls are synchronous: each returns
/// once every worker has passed the exit barrier.
pub struct Renderer {
    shared: Arc<Shared>,
    workers: Vec<Worker>,
    width: usize,
    height: usize,
    clear_color: u32,
    camera_loaded: bool,
}

impl Renderer {
    pub fn new(config: &RenderConfig) -> Result<Self, RasterError> {
        config.validate()?;

        let count = config.thread_count();
        let (width, height) = (config.width, config.height);
        let ranges = band_ranges(height, count);
        let light = config.light();

        let bands = ranges
            .iter()
            .map(|&(y0, y1)| {
                let mut band = FrameBand::new(width, y0, y1);
                band.clear(config.clear_color);
                Mutex::new(band)
            })
            .collect();

        let shared = Arc::new(Shared {
            job: RwLock::new(Job::Idle),
            running: AtomicBool::new(true),
            entry: Barrier::new(count + 1),
            mid: Barrier::new(count + 1),
            exit: Barrier::new(count + 1),
            exports: ExportPool::new(config.initial_pool_capacity, count),
            bands,
        });

        // Workers block on a start gate until the whole pool exists, so a
        // failed spawn can still release the ones already running.
        let mut workers = Vec::with_capacity(count);
        let mut gates = Vec::with_capacity(count);
        for (index, &(y0, y1)) in ranges.iter().enumerate() {
            let (gate_tx, gate_rx) = mpsc::channel::<()>();
            let shared = Arc::clone(&shared);
            let pixel = PixelStage::new(y0, y1, width, light, config.min_light);

            let spawned = thread::Builder::new()
                .name(format!("render-worker-{}", index))
                .spawn(move || {
                    if gate_rx.recv().is_err() {
                        return;
                    }
                    worker_loop(index, count, &shared, pixel);
                });

            match spawned {
                Ok(handle) => {
                    log::trace!("spawned render worker {} for rows {}..{}", index, y0, y1);
                    workers.push(Worker { index, handle });
                    gates.push(gate_tx);
                }
                Err(e) => {
                    log::error!("failed to spawn render worker {}: {}", index, e);
                    drop(gates);
                    for worker in workers {
                        let _ = worker.handle.join();
                    }
                    return Err(RasterError::ThreadSpawn(e));
                }
            }
        }
        for gate in gates {
            let _ = gate.send(());
        }

        log::debug!(
            "render pool started: {} workers, {}x{}, bands {:?}",
            count,
            width,
            height,
            ranges
        );

        Ok(Self {
            shared,
            workers,
            width,
            height,
            clear_color: config.clear_color,
            camera_loaded: false,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn thread_count(&self) -> usize {
        self.shared.bands.len()
    }

    /// Row range `[y0, y1)` owned by each worker
    pub fn bands(&self) -> Vec<(usize, usize)> {
        band_ranges(self.height, self.thread_count())
    }

    /// Current number of vertex export slots across all workers
    pub fn pool_capacity(&self) -> usize {
        self.shared.exports.capacity()
    }

    /// Reset every band to the clear color and empty depth.
    pub fn clear(&mut self) {
        for band in &self.shared.bands {
            band.lock().unwrap_or_else(PoisonError::into_inner).clear(self.clear_color);
        }
    }

    /// Publish the camera to every worker. Must precede `render_mesh`.
    pub fn load_camera(&mut self, camera: &Camera) {
        if camera.resolution() != (self.width, self.height) {
            log::warn!(
                "camera resolution {:?} differs from frame {}x{}",
                camera.resolution(),
                self.width,
                self.height
            );
        }

        self.publish(Job::LoadCamera(camera.clone()));
        self.shared.entry.wait();
        self.shared.exit.wait();
        self.camera_loaded = true;
    }

    /// Rasterize one mesh into the frame with the last loaded camera.
    pub fn render_mesh(&mut self, mesh: &Mesh) {
        if !self.camera_loaded {
            log::warn!("render_mesh called before load_camera, skipping");
            return;
        }
        if mesh.triangle_count() == 0 {
            return;
        }

        self.shared.exports.ensure_capacity(mesh.triangle_count());
        self.publish(Job::RenderMesh(MeshJob {
            triangles: mesh.shared_triangles(),
            model: mesh.model_matrix(),
            texture: mesh.texture(),
            backface_culling: mesh.backface_culling,
        }));

        self.shared.entry.wait();
        self.shared.mid.wait();
        self.shared.exit.wait();
    }

    /// Load `camera`, then draw every mesh of `world` in insertion order.
    pub fn render_world(&mut self, world: &World, camera: &Camera) {
        self.load_camera(camera);
        for mesh in world.meshes() {
            self.render_mesh(mesh);
        }
    }

    /// Copy of the current frame
    pub fn snapshot(&self) -> Framebuffer {
        let mut fb = Framebuffer::new(self.width, self.height);
        for band in &self.shared.bands {
            fb.blit_band(&band.lock().unwrap_or_else(PoisonError::into_inner));
        }
        fb
    }

    /// Copy the ARGB color buffer into `out`, row-major. Extra space in `out`
    /// is left untouched.
    pub fn read_pixels(&self, out: &mut [u32]) {
        for band in &self.shared.bands {
            let band = band.lock().unwrap_or_else(PoisonError::into_inner);
            let start = band.y0 * self.width;
            let end = (start + band.color.len()).min(out.len());
            if start < end {
                out[start..end].copy_from_slice(&band.color[..end - start]);
            }
        }
    }

    /// Stop and join every worker. Called on drop; safe to call twice.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        self.publish(Job::Idle);
        self.shared.running.store(false, Ordering::Release);
        self.shared.entry.wait();

        for worker in self.workers.drain(..) {
            if worker.handle.join().is_err() {
                log::error!("render worker {} panicked", worker.index);
            }
        }
        log::info!("render pool shut down");
    }

    fn publish(&self, job: Job) {
        *self.shared.job.write().unwrap_or_else(PoisonError::into_inner) = job;
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(index: usize, count: usize, shared: &Shared, pixel: PixelStage) {
    let mut vertex = VertexStage::new();

    loop {
        shared.entry.wait();
        if !shared.running.load(Ordering::Acquire) {
            break;
        }

        let job = shared.job.read().unwrap_or_else(PoisonError::into_inner).clone();
        match job {
            Job::Idle => {
                shared.exit.wait();
            }
            Job::LoadCamera(camera) => {
                vertex.load_camera(&camera);
                shared.exit.wait();
            }
            Job::RenderMesh(mesh) => {
                vertex.load_model(&mesh.model);
                run_vertex_stage(index, count, shared, &vertex, &mesh);
                shared.mid.wait();
                run_pixel_stage(index, count, shared, &pixel, &mesh);
                shared.exit.wait();
            }
        }
    }

    log::trace!("render worker {} exiting", index);
}

fn run_vertex_stage(index: usize, count: usize, shared: &Shared, vertex: &VertexStage, mesh: &MeshJob) {
    let (start, end) = triangle_slice(mesh.triangles.len(), count, index);
    let mut segment = shared.exports.segments[index]
        .write()
        .unwrap_or_else(PoisonError::into_inner);

    for (slot, tri) in segment.iter_mut().zip(&mesh.triangles[start..end]) {
        vertex.process(tri, slot);
    }
}

fn run_pixel_stage(index: usize, count: usize, shared: &Shared, pixel: &PixelStage, mesh: &MeshJob) {
    let mut band = shared.bands[index].lock().unwrap_or_else(PoisonError::into_inner);
    let total = mesh.triangles.len();

    // Segments in worker order give triangles in mesh order
    for (worker, segment) in shared.exports.segments.iter().enumerate() {
        let (start, end) = triangle_slice(total, count, worker);
        let segment = segment.read().unwrap_or_else(PoisonError::into_inner);
        for export in &segment[..end - start] {
            pixel.draw(export, mesh.texture.as_ref(), mesh.backface_culling, &mut band);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangle_slices_partition_the_mesh() {
        for (total, count) in [(10, 3), (2, 4), (100, 1), (0, 2)] {
            let mut next = 0;
            for worker in 0..count {
                let (start, end) = triangle_slice(total, count, worker);
                assert_eq!(start, next);
                assert!(end >= start);
                next = end;
            }
            assert_eq!(next, total);
        }
        assert_eq!(triangle_slice(10, 3, 2), (6, 10));
    }

    #[test]
    fn test_pool_grows_and_never_shrinks() {
        let pool = ExportPool::new(8, 2);
        assert_eq!(pool.capacity(), 8);

        pool.ensure_capacity(6);
        assert_eq!(pool.capacity(), 8);

        pool.ensure_capacity(21);
        assert!(pool.capacity() >= 21);
        let grown = pool.capacity();

        pool.ensure_capacity(3);
        assert_eq!(pool.capacity(), grown);
    }

    #[test]
    fn test_start_and_shutdown() {
        let config = RenderConfig::new(32, 16).with_threads(3);
        let mut renderer = Renderer::new(&config).unwrap();
        assert_eq!(renderer.thread_count(), 3);
        assert_eq!(renderer.bands(), vec![(0, 5), (5, 10), (10, 16)]);

        renderer.shutdown();
        renderer.shutdown();
    }

    #[test]
    fn test_render_before_camera_is_skipped() {
        let config = RenderConfig::new(8, 8).with_threads(2);
        let mut renderer = Renderer::new(&config).unwrap();
        renderer.render_mesh(&Mesh::cube(1.0));

        let frame = renderer.snapshot();
        assert!(frame.color.iter().all(|&c| c == config.clear_color));
    }
}
