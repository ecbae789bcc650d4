//! Trunk/branch labelling of skinned meshes
//!
//! The trunk is the chain from the first root up to the trunk tip; every other
//! node is a branch node. A polygon belongs to whichever surface is closer
//! once each nearest node's radius is subtracted from its distance.

use std::collections::VecDeque;

use rayon::prelude::*;

use crate::core::types::Vec3;
use crate::core::{Error, Result};
use crate::math::PointIndex;
use crate::mesh::PolyMesh;
use crate::procgen::skeleton::Skeleton;

pub const TRUNK_GROUP: &str = "TrunkGroup";
pub const BRANCH_GROUP: &str = "BranchGroup";

/// Surface a polygon is assigned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceClass {
    Trunk,
    Branch,
}

impl SurfaceClass {
    /// Polygon material slot
    pub fn material_index(self) -> u16 {
        match self {
            SurfaceClass::Trunk => 0,
            SurfaceClass::Branch => 1,
        }
    }
}

/// Top of the main stem
///
/// Breadth-first from the first root, never crossing a shoot edge; the node
/// with the fewest connections wins, earlier nodes on ties. A root without
/// apex descendants is its own tip.
pub fn find_trunk_tip(skeleton: &Skeleton) -> Result<usize> {
    let root = skeleton.roots().next().ok_or(Error::MissingTrunkTip)?;

    let mut tip = root;
    let mut queue: VecDeque<usize> = skeleton.node(root).apex.into_iter().collect();
    while let Some(index) = queue.pop_front() {
        let node = skeleton.node(index);
        if node.connections < skeleton.node(tip).connections {
            tip = index;
        }
        queue.extend(node.apex);
    }
    Ok(tip)
}

/// Trunk nodes from the tip down to the root
pub fn trunk_chain(skeleton: &Skeleton) -> Result<Vec<usize>> {
    let tip = find_trunk_tip(skeleton)?;
    Ok(std::iter::once(tip).chain(skeleton.ancestors(tip)).collect())
}

/// Nearest-node lookup for one surface class
struct SurfaceIndex {
    tree: PointIndex,
    radii: Vec<f32>,
}

impl SurfaceIndex {
    fn new(nodes: &[usize], skeleton: &Skeleton, radii: &[f32]) -> Self {
        let positions: Vec<Vec3> = nodes.iter().map(|&i| skeleton.node(i).position).collect();
        Self {
            tree: PointIndex::build(&positions),
            radii: nodes.iter().map(|&i| radii[i]).collect(),
        }
    }

    /// Distance to the nearest node's surface, `None` when the class is empty
    fn surface_distance(&self, p: Vec3) -> Option<f32> {
        self.tree
            .nearest(p)
            .map(|hit| hit.distance - self.radii[hit.index])
    }
}

/// Labels mesh polygons by nearest trunk or branch node
pub struct TrunkClassifier {
    trunk: SurfaceIndex,
    branch: SurfaceIndex,
    trunk_nodes: Vec<usize>,
}

impl TrunkClassifier {
    /// `radii` must hold one radius per skeleton node
    pub fn new(skeleton: &Skeleton, radii: &[f32]) -> Result<Self> {
        if radii.len() != skeleton.len() {
            return Err(Error::invalid(format!(
                "{} radii for {} skeleton nodes",
                radii.len(),
                skeleton.len()
            )));
        }
        let trunk_nodes = trunk_chain(skeleton)?;
        let mut is_trunk = vec![false; skeleton.len()];
        for &i in &trunk_nodes {
            is_trunk[i] = true;
        }
        let branch_nodes: Vec<usize> = (0..skeleton.len()).filter(|&i| !is_trunk[i]).collect();

        Ok(Self {
            trunk: SurfaceIndex::new(&trunk_nodes, skeleton, radii),
            branch: SurfaceIndex::new(&branch_nodes, skeleton, radii),
            trunk_nodes,
        })
    }

    /// Trunk nodes, tip first
    pub fn trunk_nodes(&self) -> &[usize] {
        &self.trunk_nodes
    }

    /// Class of a single point; ties go to the trunk
    pub fn classify_point(&self, p: Vec3) -> SurfaceClass {
        match (self.trunk.surface_distance(p), self.branch.surface_distance(p)) {
            (Some(t), Some(b)) if b < t => SurfaceClass::Branch,
            (None, Some(_)) => SurfaceClass::Branch,
            _ => SurfaceClass::Trunk,
        }
    }

    /// One label per polygon, in polygon order
    pub fn classify_mesh(&self, mesh: &PolyMesh) -> Classification {
        let labels = mesh
            .polygons
            .par_iter()
            .map(|poly| self.classify_point(mesh.centroid(poly)))
            .collect();
        Classification { labels }
    }
}

/// Per-polygon surface labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub labels: Vec<SurfaceClass>,
}

impl Classification {
    /// Every polygon labelled branch, used when no trunk can be found
    pub fn all_branch(polygons: usize) -> Self {
        Self {
            labels: vec![SurfaceClass::Branch; polygons],
        }
    }

    pub fn count(&self, class: SurfaceClass) -> usize {
        self.labels.iter().filter(|&&l| l == class).count()
    }

    /// Write polygon materials and the trunk/branch vertex groups
    ///
    /// A vertex shared by polygons of both classes lands in both groups.
    pub fn apply(&self, mesh: &mut PolyMesh) {
        let mut trunk = Vec::new();
        let mut branch = Vec::new();
        for (poly, &label) in mesh.polygons.iter_mut().zip(&self.labels) {
            poly.material = label.material_index();
            let group = match label {
                SurfaceClass::Trunk => &mut trunk,
                SurfaceClass::Branch => &mut branch,
            };
            group.extend_from_slice(&poly.indices);
        }
        mesh.set_vertex_group(TRUNK_GROUP, trunk);
        mesh.set_vertex_group(BRANCH_GROUP, branch);
    }
}
