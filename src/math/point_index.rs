//! Nearest-neighbour and radius queries over a snapshot of 3D points
//!
//! The point set changes between colonization steps, so callers rebuild the
//! index from the current positions instead of updating it in place. The
//! immutable kiddo tree is used because skeleton nodes often share a
//! coordinate on one axis (a straight trunk), which overflows the buckets of
//! the mutable tree.

use kiddo::{ImmutableKdTree, SquaredEuclidean};

use crate::core::types::Vec3;

/// Result of a nearest-neighbour query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index into the slice the index was built from
    pub index: usize,
    /// Euclidean distance to the query point
    pub distance: f32,
}

/// Kd-tree over a snapshot of points
pub struct PointIndex {
    points: Vec<Vec3>,
    tree: Option<ImmutableKdTree<f32, 3>>,
}

impl PointIndex {
    /// Build an index over `points`; indices in query results refer to this slice
    pub fn build(points: &[Vec3]) -> Self {
        let entries: Vec<[f32; 3]> = points.iter().map(|p| p.to_array()).collect();
        let tree = (!entries.is_empty()).then(|| ImmutableKdTree::new_from_slice(&entries));
        Self {
            points: points.to_vec(),
            tree,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Position of an indexed point
    pub fn point(&self, index: usize) -> Vec3 {
        self.points[index]
    }

    /// Closest point; ties resolve to the lowest index
    pub fn nearest(&self, query: Vec3) -> Option<Neighbor> {
        let tree = self.tree.as_ref()?;
        let q = query.to_array();
        let best = tree.nearest_one::<SquaredEuclidean>(&q);

        // kiddo returns any of several equidistant points
        let limit = best.distance;
        let index = tree
            .within_unsorted::<SquaredEuclidean>(&q, widen(limit))
            .into_iter()
            .filter(|n| n.distance <= limit)
            .map(|n| n.item as usize)
            .min()
            .unwrap_or(best.item as usize);

        Some(Neighbor {
            index,
            distance: limit.sqrt(),
        })
    }

    /// Closest point no farther than `max_distance`
    pub fn nearest_within(&self, query: Vec3, max_distance: f32) -> Option<Neighbor> {
        self.nearest(query).filter(|hit| hit.distance <= max_distance)
    }

    /// Indices of all points within `radius` of `query`, ascending
    pub fn within_radius(&self, query: Vec3, radius: f32) -> Vec<usize> {
        let Some(tree) = self.tree.as_ref() else {
            return Vec::new();
        };
        let limit = radius * radius;
        let mut found: Vec<usize> = tree
            .within_unsorted::<SquaredEuclidean>(&query.to_array(), widen(limit))
            .into_iter()
            .filter(|n| n.distance <= limit)
            .map(|n| n.item as usize)
            .collect();
        found.sort_unstable();
        found
    }
}

/// Slightly larger squared radius so boundary points survive kiddo's comparison
fn widen(limit: f32) -> f32 {
    limit * (1.0 + 1e-5) + f32::MIN_POSITIVE
}
