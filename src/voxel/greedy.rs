//! Greedy box merging over dense occupancy arrays
//!
//! Three sweeps: same-material cells are joined into runs along X, runs of
//! equal extent into slabs along Y, and congruent slabs into boxes along Z.
//! Every cell ends up in exactly one run, every run in one slab and every
//! slab in one box, so the output covers the input exactly once.

use std::collections::HashMap;

use crate::core::types::{IVec3, UVec3, Vec3};
use crate::math::Aabb;
use crate::mesh::PolyMesh;
use crate::voxel::template::Material;

/// Axis-aligned block of same-material cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoxelBox {
    /// Lowest cell of the box
    pub origin: IVec3,
    /// Extent in cells, every component at least 1
    pub size: UVec3,
    pub material: Material,
}

impl VoxelBox {
    pub fn cell_count(&self) -> u32 {
        self.size.x * self.size.y * self.size.z
    }

    pub fn contains_cell(&self, cell: IVec3) -> bool {
        let rel = cell - self.origin;
        rel.cmpge(IVec3::ZERO).all() && rel.cmplt(self.size.as_ivec3()).all()
    }
}

#[derive(Clone, Copy)]
struct Run {
    x: u32,
    len: u32,
    material: Material,
}

#[derive(Clone, Copy)]
struct Slab {
    x: u32,
    len: u32,
    y: u32,
    depth: u32,
    material: Material,
}

/// Merge a dense `dims`-shaped array into boxes
///
/// Cells are indexed `x + dims.x * (y + dims.y * z)`.
pub fn greedy_boxes(dims: UVec3, cells: &[Option<Material>]) -> Vec<VoxelBox> {
    debug_assert_eq!(cells.len(), (dims.x * dims.y * dims.z) as usize);
    let at = |x: u32, y: u32, z: u32| cells[(x + dims.x * (y + dims.y * z)) as usize];

    // pass 1: runs along X for every (y, z) row
    let row_runs = |y: u32, z: u32| -> Vec<Run> {
        let mut runs = Vec::new();
        let mut x = 0;
        while x < dims.x {
            let Some(material) = at(x, y, z) else {
                x += 1;
                continue;
            };
            let start = x;
            while x < dims.x && at(x, y, z) == Some(material) {
                x += 1;
            }
            runs.push(Run { x: start, len: x - start, material });
        }
        runs
    };

    let mut boxes: Vec<VoxelBox> = Vec::new();
    // open boxes from the previous z layer, keyed by slab footprint
    let mut open_boxes: HashMap<(u32, u32, u32, u32, Material), usize> = HashMap::new();

    for z in 0..dims.z {
        // pass 2: runs with the same extent on consecutive rows become slabs
        let mut slabs: Vec<Slab> = Vec::new();
        let mut open_slabs: HashMap<(u32, u32, Material), usize> = HashMap::new();
        for y in 0..dims.y {
            let mut next_open = HashMap::new();
            for run in row_runs(y, z) {
                let key = (run.x, run.len, run.material);
                let slab = match open_slabs.get(&key) {
                    Some(&s) => {
                        slabs[s].depth += 1;
                        s
                    }
                    None => {
                        slabs.push(Slab { x: run.x, len: run.len, y, depth: 1, material: run.material });
                        slabs.len() - 1
                    }
                };
                next_open.insert(key, slab);
            }
            open_slabs = next_open;
        }

        // pass 3: congruent slabs on consecutive layers become boxes
        let mut next_open = HashMap::new();
        for slab in slabs {
            let key = (slab.x, slab.len, slab.y, slab.depth, slab.material);
            let index = match open_boxes.get(&key) {
                Some(&b) => {
                    boxes[b].size.z += 1;
                    b
                }
                None => {
                    boxes.push(VoxelBox {
                        origin: IVec3::new(slab.x as i32, slab.y as i32, z as i32),
                        size: UVec3::new(slab.len, slab.depth, 1),
                        material: slab.material,
                    });
                    boxes.len() - 1
                }
            };
            next_open.insert(key, index);
        }
        open_boxes = next_open;
    }

    boxes
}

/// Coarse collision volume of one placed instance
///
/// Boxes are in cells relative to the instance's base cell; `location` is the
/// world position of that cell's footprint centre at ground level.
#[derive(Debug, Clone, PartialEq)]
pub struct CoarseMesh {
    pub template_index: usize,
    pub location: Vec3,
    pub cell_size: f32,
    pub boxes: Vec<VoxelBox>,
}

impl CoarseMesh {
    /// Box extent in local world units
    pub fn box_bounds_local(&self, b: &VoxelBox) -> Aabb {
        let min = Vec3::new(b.origin.x as f32 - 0.5, b.origin.y as f32 - 0.5, b.origin.z as f32)
            * self.cell_size;
        Aabb::new(min, min + b.size.as_vec3() * self.cell_size)
    }

    pub fn local_bounds(&self) -> Option<Aabb> {
        self.boxes
            .iter()
            .map(|b| self.box_bounds_local(b))
            .reduce(|a, b| a.merged(&b))
    }

    pub fn world_bounds(&self) -> Option<Aabb> {
        self.local_bounds().map(|b| b.translated(self.location))
    }

    /// Bounds of the crown boxes only, in local units
    pub fn crown_bounds_local(&self) -> Option<Aabb> {
        self.boxes
            .iter()
            .filter(|b| b.material == Material::Crown)
            .map(|b| self.box_bounds_local(b))
            .reduce(|a, b| a.merged(&b))
    }

    /// Whether a local point lies in a box of the given material
    pub fn contains_local_material(&self, p: Vec3, material: Material) -> bool {
        self.boxes
            .iter()
            .filter(|b| b.material == material)
            .any(|b| self.box_bounds_local(b).contains_point(p))
    }

    pub fn contains_local(&self, p: Vec3) -> bool {
        self.boxes.iter().any(|b| self.box_bounds_local(b).contains_point(p))
    }

    /// Whether a world point lies inside any box
    pub fn contains(&self, world: Vec3) -> bool {
        self.contains_local(world - self.location)
    }

    pub fn quad_count(&self) -> usize {
        self.boxes.len() * 6
    }

    /// Six quads per box, in world space; polygon material 0 = stem, 1 = crown
    pub fn to_poly_mesh(&self) -> PolyMesh {
        const FACES: [[u32; 4]; 6] = [
            [0, 2, 3, 1], // -z
            [4, 5, 7, 6], // +z
            [0, 1, 5, 4], // -y
            [2, 6, 7, 3], // +y
            [0, 4, 6, 2], // -x
            [1, 3, 7, 5], // +x
        ];
        let mut mesh = PolyMesh::new();
        for b in &self.boxes {
            let bounds = self.box_bounds_local(b).translated(self.location);
            let base = mesh.vertex_count() as u32;
            for corner in 0..8u32 {
                let pick = |bit: u32, lo: f32, hi: f32| if corner & bit == 0 { lo } else { hi };
                mesh.add_vertex(Vec3::new(
                    pick(1, bounds.min.x, bounds.max.x),
                    pick(2, bounds.min.y, bounds.max.y),
                    pick(4, bounds.min.z, bounds.max.z),
                ));
            }
            for face in FACES {
                let poly = mesh.add_polygon(&face.map(|i| base + i));
                mesh.polygons[poly].material = match b.material {
                    Material::Stem => 0,
                    Material::Crown => 1,
                };
            }
        }
        mesh
    }
}
