//! Turning a skeleton into a surface mesh
//!
//! Skinning is a collaborator of the forest driver: anything that produces a
//! `PolyMesh` from a skeleton and per-node radii can stand in for
//! [`NativeSkinner`].

use std::f32::consts::TAU;

use crate::core::types::Vec3;
use crate::mesh::PolyMesh;
use crate::procgen::skeleton::Skeleton;

/// Produces a surface around a skeleton
pub trait Skinner: Send + Sync {
    /// `radii` holds one radius per skeleton node
    fn skin(&self, skeleton: &Skeleton, radii: &[f32]) -> PolyMesh;
}

/// Prism tubes around every internode, triangular by default
///
/// Each parent/child edge gets its own pair of rings, sized by the radius of
/// the node at that end and oriented perpendicular to the edge. Polygons are
/// quads, emitted depth-first from each root with the apex before the shoot.
#[derive(Debug, Clone, Copy)]
pub struct NativeSkinner {
    pub sides: u32,
}

impl Default for NativeSkinner {
    fn default() -> Self {
        Self { sides: 3 }
    }
}

impl NativeSkinner {
    pub fn new(sides: u32) -> Self {
        Self { sides: sides.max(3) }
    }
}

fn push_ring(mesh: &mut PolyMesh, sides: u32, center: Vec3, axis: Vec3, radius: f32) -> u32 {
    let (u, v) = axis.any_orthonormal_pair();
    let base = mesh.vertex_count() as u32;
    for k in 0..sides {
        let angle = TAU * k as f32 / sides as f32;
        mesh.add_vertex(center + (u * angle.cos() + v * angle.sin()) * radius);
    }
    base
}

impl Skinner for NativeSkinner {
    fn skin(&self, skeleton: &Skeleton, radii: &[f32]) -> PolyMesh {
        let sides = self.sides.max(3);
        let mut mesh = PolyMesh::new();
        let radius_of = |i: usize| radii.get(i).copied().unwrap_or(0.0);

        let mut stack: Vec<usize> = Vec::new();
        for root in skeleton.roots() {
            stack.push(root);
            while let Some(index) = stack.pop() {
                let node = skeleton.node(index);
                // push shoot first so the apex subtree is emitted first
                stack.extend(node.shoot);
                stack.extend(node.apex);

                let Some(parent) = node.parent else { continue };
                let from = skeleton.node(parent).position;
                let axis = (node.position - from).normalize_or_zero();
                if axis == Vec3::ZERO {
                    continue;
                }

                let lower = push_ring(&mut mesh, sides, from, axis, radius_of(parent));
                let upper = push_ring(&mut mesh, sides, node.position, axis, radius_of(index));
                for k in 0..sides {
                    let next = (k + 1) % sides;
                    mesh.add_polygon(&[lower + k, lower + next, upper + next, upper + k]);
                }
            }
        }
        mesh
    }
}
