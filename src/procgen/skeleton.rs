//! Branch skeleton produced by space colonization
//!
//! Nodes live in one flat list. Each node has at most one continuation child
//! (`apex`) and at most one lateral child (`shoot`); both slots are explicit so
//! the binary structure holds by construction.

use log::warn;

use crate::core::types::Vec3;
use crate::core::{Error, Result};
use crate::mesh::PolyMesh;
use crate::procgen::params::TaperParams;

/// Radius substituted when every tapered radius collapses to zero
pub const DEFAULT_RADIUS: f32 = 0.03;

/// Which child slot a node occupies under its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildRole {
    /// Continuation of the parent's axis
    Apex,
    /// Lateral branch
    Shoot,
}

/// A point in the grown skeleton
#[derive(Debug, Clone, PartialEq)]
pub struct BranchNode {
    pub position: Vec3,
    pub parent: Option<usize>,
    pub apex: Option<usize>,
    pub shoot: Option<usize>,
    /// Growth step that created the node (0 for starting points)
    pub generation: u32,
    /// Attraction points ever associated with this node's subtree
    pub connections: u32,
    /// Position in the flattened node list
    pub index: usize,
}

impl BranchNode {
    fn new(position: Vec3, parent: Option<usize>, generation: u32, index: usize) -> Self {
        Self {
            position,
            parent,
            apex: None,
            shoot: None,
            generation,
            connections: 0,
            index,
        }
    }

    /// Children in slot order, apex first
    pub fn children(&self) -> impl Iterator<Item = usize> {
        self.apex.into_iter().chain(self.shoot)
    }

    /// Whether both child slots are taken
    pub fn is_saturated(&self) -> bool {
        self.apex.is_some() && self.shoot.is_some()
    }

    /// Whether the node has no children
    pub fn is_leaf(&self) -> bool {
        self.apex.is_none() && self.shoot.is_none()
    }
}

/// Per-node branch radii
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusProfile {
    pub radii: Vec<f32>,
    /// Every computed radius was zero and `DEFAULT_RADIUS` was used instead
    pub degenerate: bool,
}

/// Thin quads along every node, for particle-based leaf placement
#[derive(Debug, Clone, PartialEq)]
pub struct LeafEmitter {
    pub mesh: PolyMesh,
    /// Per-vertex emission weight in `[0, 1]`, high on thin branches
    pub density: Vec<f32>,
}

/// Nodes of one growth run plus the attraction points left unclaimed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skeleton {
    nodes: Vec<BranchNode>,
    endpoints: Vec<Vec3>,
}

impl Skeleton {
    /// Create an empty skeleton
    pub fn new() -> Self {
        Self::default()
    }

    /// Skeleton with one root per starting point
    pub fn from_roots(roots: &[Vec3]) -> Self {
        let mut skeleton = Self::new();
        for &p in roots {
            skeleton.push_root(p);
        }
        skeleton
    }

    /// Add a parentless node at generation 0
    pub fn push_root(&mut self, position: Vec3) -> usize {
        let index = self.nodes.len();
        self.nodes.push(BranchNode::new(position, None, 0, index));
        index
    }

    /// Attach a child to the first free slot of `parent`, apex before shoot
    ///
    /// Returns `None` when the parent already has both children.
    pub fn attach(&mut self, parent: usize, position: Vec3, generation: u32) -> Option<usize> {
        let node = &self.nodes[parent];
        let role = if node.apex.is_none() {
            ChildRole::Apex
        } else if node.shoot.is_none() {
            ChildRole::Shoot
        } else {
            return None;
        };
        self.attach_as(parent, role, position, generation)
    }

    /// Attach a child into a specific slot; `None` if that slot is taken
    pub fn attach_as(
        &mut self,
        parent: usize,
        role: ChildRole,
        position: Vec3,
        generation: u32,
    ) -> Option<usize> {
        let index = self.nodes.len();
        let slot = match role {
            ChildRole::Apex => &mut self.nodes[parent].apex,
            ChildRole::Shoot => &mut self.nodes[parent].shoot,
        };
        if slot.is_some() {
            return None;
        }
        *slot = Some(index);
        self.nodes.push(BranchNode::new(position, Some(parent), generation, index));
        Some(index)
    }

    /// All nodes in index order
    pub fn nodes(&self) -> &[BranchNode] {
        &self.nodes
    }

    /// Node by index
    pub fn node(&self, index: usize) -> &BranchNode {
        &self.nodes[index]
    }

    /// Mutable node by index (test fixtures only)
    #[cfg(test)]
    pub(crate) fn node_mut(&mut self, index: usize) -> &mut BranchNode {
        &mut self.nodes[index]
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether there are no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Unclaimed attraction points
    pub fn endpoints(&self) -> &[Vec3] {
        &self.endpoints
    }

    pub(crate) fn set_endpoints(&mut self, endpoints: Vec<Vec3>) {
        self.endpoints = endpoints;
    }

    /// Node positions in index order
    pub fn positions(&self) -> Vec<Vec3> {
        self.nodes.iter().map(|n| n.position).collect()
    }

    /// Indices of parentless nodes
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes.iter().filter(|n| n.parent.is_none()).map(|n| n.index)
    }

    /// Role of `index` under its parent, `None` for roots
    pub fn role_of(&self, index: usize) -> Option<ChildRole> {
        let parent = &self.nodes[self.nodes[index].parent?];
        if parent.apex == Some(index) {
            Some(ChildRole::Apex)
        } else {
            Some(ChildRole::Shoot)
        }
    }

    /// Walk from `index` up to its root, excluding `index` itself
    pub fn ancestors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.nodes[index].parent, move |&i| self.nodes[i].parent)
    }

    /// Add `amount` connections to `index` and every ancestor
    pub(crate) fn propagate_connections(&mut self, index: usize, amount: u32) {
        let mut current = Some(index);
        while let Some(i) = current {
            let node = &mut self.nodes[i];
            node.connections = node.connections.saturating_add(amount);
            current = node.parent;
        }
    }

    /// Check the rooted-forest invariants
    ///
    /// Parent and child links agree, every index matches its slot, generations
    /// strictly increase from parent to child, and no node is its own ancestor.
    pub fn is_well_formed(&self) -> bool {
        for (i, node) in self.nodes.iter().enumerate() {
            if node.index != i {
                return false;
            }
            if let Some(p) = node.parent {
                let Some(parent) = self.nodes.get(p) else {
                    return false;
                };
                if parent.apex != Some(i) && parent.shoot != Some(i) {
                    return false;
                }
                if parent.generation >= node.generation {
                    return false;
                }
            }
            if node.apex.is_some() && node.apex == node.shoot {
                return false;
            }
            for child in node.children() {
                match self.nodes.get(child) {
                    Some(c) if c.parent == Some(i) => {}
                    _ => return false,
                }
            }
        }
        // Generations strictly increase along parent links, so a cycle is impossible
        // once the checks above pass.
        true
    }

    /// Drop every node below `min_generation` and re-densify indices
    ///
    /// Nodes whose parent is dropped become roots. Fewer than two remaining
    /// nodes is reported as `EmptySkeleton`.
    pub fn prune(&self, min_generation: u32) -> Result<Skeleton> {
        let mut remap = vec![None; self.nodes.len()];
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if node.generation >= min_generation {
                remap[node.index] = Some(nodes.len());
                nodes.push(node.clone());
            }
        }

        if nodes.len() < 2 {
            return Err(Error::EmptySkeleton { nodes: nodes.len() });
        }

        let translate = |link: Option<usize>| link.and_then(|i| remap[i]);
        for (i, node) in nodes.iter_mut().enumerate() {
            node.index = i;
            node.parent = translate(node.parent);
            node.apex = translate(node.apex);
            node.shoot = translate(node.shoot);
        }

        Ok(Skeleton {
            nodes,
            endpoints: self.endpoints.clone(),
        })
    }

    /// Tapered radius per node
    pub fn radii(&self, taper: &TaperParams) -> RadiusProfile {
        let radii: Vec<f32> = self
            .nodes
            .iter()
            .map(|n| (n.connections as f32).powf(taper.power) * taper.scale)
            .map(|r| if r.is_finite() { r.max(0.0) } else { 0.0 })
            .collect();

        if radii.iter().all(|&r| r <= 0.0) {
            if !radii.is_empty() {
                warn!(
                    "All {} branch radii collapsed to zero, using default radius {}",
                    radii.len(),
                    DEFAULT_RADIUS
                );
            }
            return RadiusProfile {
                radii: vec![DEFAULT_RADIUS; self.nodes.len()],
                degenerate: true,
            };
        }

        RadiusProfile {
            radii,
            degenerate: false,
        }
    }

    /// Small tetrahedron at every unclaimed attraction point
    pub fn markers_mesh(&self, scale: f32) -> PolyMesh {
        const TETRAHEDRON: [Vec3; 4] = [
            Vec3::new(-1.0, 1.0, -1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(-1.0, -1.0, 1.0),
        ];
        const FACES: [[u32; 3]; 4] = [[0, 1, 2], [0, 1, 3], [1, 2, 3], [0, 3, 2]];

        let mut mesh = PolyMesh::new();
        for &endpoint in &self.endpoints {
            let base = mesh.vertex_count() as u32;
            for corner in TETRAHEDRON {
                mesh.add_vertex(endpoint + corner * scale);
            }
            for face in FACES {
                mesh.add_polygon(&[base + face[0], base + face[1], base + face[2]]);
            }
        }
        mesh
    }

    /// Emitter geometry for leaves: a short vertical prism of height `scale` at every node
    pub fn leaf_emitter_mesh(&self, scale: f32, bleaf: f32) -> LeafEmitter {
        let max_connections = self
            .nodes
            .iter()
            .map(|n| n.connections)
            .max()
            .filter(|&m| m > 0)
            .unwrap_or(1) as f32;

        let mut mesh = PolyMesh::new();
        let mut density = Vec::with_capacity(self.nodes.len() * 6);
        let lift = Vec3::new(0.0, 0.0, scale);
        for node in &self.nodes {
            let weight = (1.0 - node.connections as f32 / max_connections).max(0.0).powf(bleaf);
            let lower = push_triangle(&mut mesh, node.position, scale);
            let upper = push_triangle(&mut mesh, node.position + lift, scale);
            for k in 0..3 {
                let next = (k + 1) % 3;
                mesh.add_polygon(&[lower[k], lower[next], upper[next], upper[k]]);
            }
            density.extend(std::iter::repeat(weight).take(6));
        }

        LeafEmitter { mesh, density }
    }
}

/// Horizontal triangle of circumradius `r` around `center`
fn push_triangle(mesh: &mut PolyMesh, center: Vec3, r: f32) -> [u32; 3] {
    [
        mesh.add_vertex(center + Vec3::new(-r, 0.0, 0.0)),
        mesh.add_vertex(center + Vec3::new(r * 0.5, -r * 0.866, 0.0)),
        mesh.add_vertex(center + Vec3::new(r * 0.5, r * 0.866, 0.0)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    /// root -> a (apex) -> b (apex), root -> c (shoot)
    fn small_tree() -> Skeleton {
        let mut skeleton = Skeleton::from_roots(&[Vec3::ZERO]);
        let a = skeleton.attach(0, Vec3::Z, 1).unwrap();
        skeleton.attach(a, Vec3::Z * 2.0, 2).unwrap();
        skeleton.attach(0, Vec3::X, 3).unwrap();
        skeleton
    }

    #[test]
    fn test_attach_fills_apex_then_shoot() {
        let mut skeleton = Skeleton::from_roots(&[Vec3::ZERO]);
        let first = skeleton.attach(0, Vec3::Z, 1).unwrap();
        let second = skeleton.attach(0, Vec3::X, 1).unwrap();
        assert_eq!(skeleton.node(0).apex, Some(first));
        assert_eq!(skeleton.node(0).shoot, Some(second));
        assert!(skeleton.attach(0, Vec3::Y, 1).is_none());
        assert_eq!(skeleton.len(), 3);
        assert_eq!(skeleton.role_of(second), Some(ChildRole::Shoot));
    }

    #[test]
    fn test_attach_as_rejects_taken_slot() {
        let mut skeleton = Skeleton::from_roots(&[Vec3::ZERO]);
        skeleton.attach_as(0, ChildRole::Shoot, Vec3::X, 1).unwrap();
        assert!(skeleton.attach_as(0, ChildRole::Shoot, Vec3::Y, 1).is_none());
        assert!(skeleton.attach_as(0, ChildRole::Apex, Vec3::Z, 1).is_some());
    }

    #[test]
    fn test_well_formed() {
        let skeleton = small_tree();
        assert!(skeleton.is_well_formed());
        assert_eq!(skeleton.roots().collect::<Vec<_>>(), vec![0]);
        assert_eq!(skeleton.ancestors(2).collect::<Vec<_>>(), vec![1, 0]);
    }

    #[test]
    fn test_generation_violation_detected() {
        let mut skeleton = small_tree();
        skeleton.nodes[1].generation = 0;
        assert!(!skeleton.is_well_formed());
    }

    #[test]
    fn test_prune_reindexes_and_detaches() {
        let skeleton = small_tree();
        let pruned = skeleton.prune(1).unwrap();
        assert_eq!(pruned.len(), 3);
        assert!(pruned.is_well_formed());
        // former node 1 is now a root
        assert_eq!(pruned.node(0).parent, None);
        assert_eq!(pruned.node(0).apex, Some(1));
        assert_eq!(pruned.node(1).parent, Some(0));
        assert_eq!(pruned.node(2).parent, None);
        assert_eq!(pruned.roots().count(), 2);
    }

    #[test]
    fn test_prune_to_single_node_is_empty() {
        let skeleton = small_tree();
        assert!(matches!(skeleton.prune(3), Err(Error::EmptySkeleton { nodes: 1 })));
        assert!(matches!(skeleton.prune(10), Err(Error::EmptySkeleton { nodes: 0 })));
    }

    #[test]
    fn test_prune_zero_keeps_everything() {
        let skeleton = small_tree();
        assert_eq!(skeleton.prune(0).unwrap(), skeleton);
    }

    #[test]
    fn test_connections_propagate_to_root() {
        let mut skeleton = small_tree();
        skeleton.propagate_connections(2, 1);
        skeleton.propagate_connections(3, 2);
        let counts: Vec<u32> = skeleton.nodes().iter().map(|n| n.connections).collect();
        assert_eq!(counts, vec![3, 1, 1, 2]);
    }

    #[test]
    fn test_connections_saturate() {
        let mut skeleton = small_tree();
        skeleton.propagate_connections(2, u32::MAX - 1);
        skeleton.propagate_connections(2, 5);
        assert_eq!(skeleton.node(2).connections, u32::MAX);
        assert_eq!(skeleton.node(0).connections, u32::MAX);
    }

    #[test]
    fn test_radii_taper_with_connections() {
        let mut skeleton = small_tree();
        skeleton.propagate_connections(2, 8);
        let profile = skeleton.radii(&TaperParams { power: 0.5, scale: 0.1 });
        assert!(!profile.degenerate);
        assert!((profile.radii[0] - 0.1 * 8f32.sqrt()).abs() < 1e-6);
        assert_eq!(profile.radii[3], 0.0);
    }

    #[test]
    fn test_degenerate_radii_use_default() {
        let skeleton = small_tree();
        let profile = skeleton.radii(&TaperParams::default());
        assert!(profile.degenerate);
        assert!(profile.radii.iter().all(|&r| r == DEFAULT_RADIUS));
    }

    #[test]
    fn test_markers_mesh() {
        let mut skeleton = small_tree();
        skeleton.set_endpoints(vec![Vec3::ONE, Vec3::NEG_ONE]);
        let mesh = skeleton.markers_mesh(0.05);
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.polygon_count(), 8);
    }

    #[test]
    fn test_leaf_emitter_density_favours_thin_nodes() {
        let mut skeleton = small_tree();
        skeleton.propagate_connections(2, 4);
        let emitter = skeleton.leaf_emitter_mesh(0.1, 4.0);
        assert_eq!(emitter.mesh.polygon_count(), 3 * skeleton.len());
        assert_eq!(emitter.density.len(), emitter.mesh.vertex_count());
        // root carries every connection, the lateral leaf none
        assert_eq!(emitter.density[0], 0.0);
        assert_eq!(emitter.density[3 * 6], 1.0);
    }
}
