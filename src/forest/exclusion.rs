//! Active collision volumes for one growth run

use crate::core::types::Vec3;
use crate::math::Aabb;
use crate::voxel::greedy::CoarseMesh;

/// Coarse meshes of the neighbours that growth must stay out of
///
/// Built fresh for every tree, so the set of active volumes is explicit and
/// nothing has to be switched back off afterwards.
pub struct ExclusionSet<'a> {
    volumes: Vec<&'a CoarseMesh>,
    bounds: Vec<Option<Aabb>>,
}

impl<'a> ExclusionSet<'a> {
    pub fn new(volumes: impl IntoIterator<Item = &'a CoarseMesh>) -> Self {
        let volumes: Vec<&CoarseMesh> = volumes.into_iter().collect();
        let bounds = volumes.iter().map(|v| v.world_bounds()).collect();
        Self { volumes, bounds }
    }

    pub fn empty() -> Self {
        Self {
            volumes: Vec::new(),
            bounds: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Whether a world-space point lies inside any active volume
    pub fn contains(&self, world: Vec3) -> bool {
        self.volumes.iter().zip(&self.bounds).any(|(volume, bounds)| {
            bounds.as_ref().is_some_and(|b| b.contains_point(world)) && volume.contains(world)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{IVec3, UVec3};
    use crate::voxel::greedy::VoxelBox;
    use crate::voxel::template::Material;

    fn cube_at(location: Vec3) -> CoarseMesh {
        CoarseMesh {
            template_index: 0,
            location,
            cell_size: 1.0,
            boxes: vec![VoxelBox {
                origin: IVec3::new(-1, -1, 0),
                size: UVec3::splat(3),
                material: Material::Crown,
            }],
        }
    }

    #[test]
    fn test_contains_any_volume() {
        let a = cube_at(Vec3::ZERO);
        let b = cube_at(Vec3::new(10.0, 0.0, 0.0));
        let set = ExclusionSet::new([&a, &b]);
        assert_eq!(set.len(), 2);
        assert!(set.contains(Vec3::new(0.0, 0.0, 1.0)));
        assert!(set.contains(Vec3::new(11.0, 1.0, 2.0)));
        assert!(!set.contains(Vec3::new(5.0, 0.0, 1.0)));
        assert!(!set.contains(Vec3::new(0.0, 0.0, 4.0)));
    }

    #[test]
    fn test_empty_set_excludes_nothing() {
        let set = ExclusionSet::empty();
        assert!(set.is_empty());
        assert!(!set.contains(Vec3::ZERO));
    }
}
