//! Minimal polygon mesh exchanged with skinning and scene services
//!
//! Polygon order is stable: every operation here appends, so indices handed to
//! a collaborator stay valid for classification afterwards.

use std::collections::BTreeMap;

use crate::core::types::Vec3;

/// A single n-gon referencing mesh vertices
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    pub indices: Vec<u32>,
    /// Material slot, written by surface classification
    pub material: u16,
}

/// Vertices, polygons and named vertex groups
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolyMesh {
    pub vertices: Vec<Vec3>,
    pub polygons: Vec<Polygon>,
    pub vertex_groups: BTreeMap<String, Vec<u32>>,
}

impl PolyMesh {
    /// Create an empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a vertex and return its index
    pub fn add_vertex(&mut self, position: Vec3) -> u32 {
        self.vertices.push(position);
        (self.vertices.len() - 1) as u32
    }

    /// Append a polygon over existing vertices and return its index
    pub fn add_polygon(&mut self, indices: &[u32]) -> usize {
        debug_assert!(indices.iter().all(|&i| (i as usize) < self.vertices.len()));
        self.polygons.push(Polygon {
            indices: indices.to_vec(),
            material: 0,
        });
        self.polygons.len() - 1
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of polygons
    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    /// Mean of the polygon's vertex positions
    pub fn centroid(&self, polygon: &Polygon) -> Vec3 {
        if polygon.indices.is_empty() {
            return Vec3::ZERO;
        }
        let sum: Vec3 = polygon
            .indices
            .iter()
            .map(|&i| self.vertices[i as usize])
            .sum();
        sum / polygon.indices.len() as f32
    }

    /// Append another mesh, offsetting its indices
    pub fn append(&mut self, other: &PolyMesh) {
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.polygons.extend(other.polygons.iter().map(|p| Polygon {
            indices: p.indices.iter().map(|i| i + offset).collect(),
            material: p.material,
        }));
        for (name, members) in &other.vertex_groups {
            self.vertex_groups
                .entry(name.clone())
                .or_default()
                .extend(members.iter().map(|i| i + offset));
        }
    }

    /// Replace the members of a named vertex group
    pub fn set_vertex_group(&mut self, name: impl Into<String>, mut members: Vec<u32>) {
        members.sort_unstable();
        members.dedup();
        self.vertex_groups.insert(name.into(), members);
    }

    /// Members of a named vertex group
    pub fn vertex_group(&self, name: &str) -> Option<&[u32]> {
        self.vertex_groups.get(name).map(Vec::as_slice)
    }

    /// Translate every vertex
    pub fn translate(&mut self, offset: Vec3) {
        for v in &mut self.vertices {
            *v += offset;
        }
    }
}
