//! Flat, unordered mesh collection

use super::mesh::Mesh;

/// Scene root. No hierarchy: every mesh carries its own world transform.
#[derive(Default)]
pub struct World {
    meshes: Vec<Mesh>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mesh and return its index
    pub fn add_mesh(&mut self, mesh: Mesh) -> usize {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn meshes_mut(&mut self) -> &mut [Mesh] {
        &mut self.meshes
    }

    pub fn get(&self, index: usize) -> Option<&Mesh> {
        self.meshes.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Mesh> {
        self.meshes.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Total triangles across all meshes
    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(Mesh::triangle_count).sum()
    }
}
