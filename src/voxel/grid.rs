//! Occupancy grid and forest placement
//!
//! Every occupied cell records the instance that owns it, so a placement is
//! committed only when all of its cells are free and no two instances can
//! ever share a cell.

use log::{debug, warn};
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::core::types::{IVec3, Mat4, UVec3, Vec3};
use crate::core::{Error, Result};
use crate::voxel::greedy::{greedy_boxes, CoarseMesh};
use crate::voxel::surface::SurfaceField;
use crate::voxel::template::{Material, TemplateShape};

/// Contents of an occupied cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub instance: u32,
    pub material: Material,
}

/// A committed placement
#[derive(Debug, Clone, PartialEq)]
pub struct TreeInstance {
    pub template_index: usize,
    /// Footprint centre cell at ground level
    pub base_cell: IVec3,
    /// World position of the base cell's footprint centre on the ground
    pub location: Vec3,
    /// Inclusive cell bounds of the instance
    pub cell_min: IVec3,
    pub cell_max: IVec3,
}

impl TreeInstance {
    pub fn transform(&self) -> Mat4 {
        Mat4::from_translation(self.location)
    }
}

/// Placement inputs
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementSettings {
    pub tree_count: usize,
    /// Candidate positions tried per slot
    pub attempts: u32,
    pub cell_size: f32,
    /// Side of the flat field used when no surface is given
    pub grid_size: u32,
    pub seed: u64,
}

impl Default for PlacementSettings {
    fn default() -> Self {
        Self {
            tree_count: 10,
            attempts: 50,
            cell_size: 1.0,
            grid_size: 64,
            seed: 0,
        }
    }
}

/// Dense occupancy lattice holding every placed tree
pub struct VoxelGrid {
    dims: UVec3,
    cell_size: f32,
    cells: Vec<Option<Cell>>,
    instances: Vec<TreeInstance>,
    failures: Vec<Error>,
}

impl VoxelGrid {
    /// Place up to `settings.tree_count` trees on the surface without overlap
    ///
    /// Each slot picks a template by weight, then tries up to
    /// `settings.attempts` random ground positions. An exhausted slot is
    /// recorded in [`failures`](Self::failures) and placement carries on.
    pub fn generate_forest(
        templates: &[TemplateShape],
        weights: &[f32],
        surface: Option<SurfaceField>,
        settings: &PlacementSettings,
    ) -> Result<Self> {
        if templates.is_empty() {
            return Err(Error::invalid("at least one template is required"));
        }
        if weights.len() != templates.len() {
            return Err(Error::invalid(format!(
                "{} weights given for {} templates",
                weights.len(),
                templates.len()
            )));
        }
        if !(settings.cell_size.is_finite() && settings.cell_size > 0.0) {
            return Err(Error::invalid(format!("cell_size must be positive, got {}", settings.cell_size)));
        }
        if settings.attempts == 0 {
            return Err(Error::invalid("placement attempts must be at least 1"));
        }
        for t in templates {
            t.validate()?;
        }
        let picker = WeightedIndex::new(weights.iter().copied())
            .map_err(|e| Error::invalid(format!("template weights: {e}")))?;

        let surface = match surface {
            Some(s) => s,
            None if settings.grid_size > 0 => SurfaceField::flat(settings.grid_size, settings.grid_size),
            None => return Err(Error::invalid("grid_size must be positive without a surface field")),
        };

        let footprints: Vec<Vec<(IVec3, Material)>> =
            templates.iter().map(|t| t.rasterize(settings.cell_size)).collect();
        let tallest = templates
            .iter()
            .map(|t| t.height_cells(settings.cell_size))
            .max()
            .unwrap_or(0);
        let height = surface
            .max_elevation()
            .checked_add(tallest)
            .and_then(|h| h.checked_add(1))
            .and_then(|h| u32::try_from(h).ok())
            .ok_or_else(|| {
                Error::invalid(format!(
                    "grid height out of range: elevation {} plus tree height {} cells",
                    surface.max_elevation(),
                    tallest
                ))
            })?;

        let dims = UVec3::new(surface.width(), surface.depth(), height);
        let mut grid = Self {
            dims,
            cell_size: settings.cell_size,
            cells: vec![None; (dims.x as usize) * (dims.y as usize) * (dims.z as usize)],
            instances: Vec::new(),
            failures: Vec::new(),
        };
        debug!("Voxel grid {}x{}x{} for {} slots", dims.x, dims.y, dims.z, settings.tree_count);

        let mut rng = ChaCha8Rng::seed_from_u64(settings.seed);
        for slot in 0..settings.tree_count {
            let template = picker.sample(&mut rng);
            let footprint = &footprints[template];

            let placed = (0..settings.attempts).find_map(|_| {
                let x = rng.gen_range(0..dims.x);
                let y = rng.gen_range(0..dims.y);
                let ground = surface.elevation(x, y)?;
                let base = IVec3::new(x as i32, y as i32, ground);
                grid.fits(base, footprint).then_some(base)
            });

            match placed {
                Some(base) => grid.commit(template, base, footprint),
                None => {
                    warn!(
                        "Slot {} (template {}): no free site after {} attempts",
                        slot, template, settings.attempts
                    );
                    grid.failures.push(Error::PlacementExhausted {
                        slot,
                        template,
                        attempts: settings.attempts,
                    });
                }
            }
        }

        Ok(grid)
    }

    fn index(&self, p: IVec3) -> Option<usize> {
        if p.cmplt(IVec3::ZERO).any() || p.as_uvec3().cmpge(self.dims).any() {
            return None;
        }
        let p = p.as_uvec3();
        Some((p.x + self.dims.x * (p.y + self.dims.y * p.z)) as usize)
    }

    fn fits(&self, base: IVec3, footprint: &[(IVec3, Material)]) -> bool {
        footprint
            .iter()
            .all(|(offset, _)| self.index(base + *offset).is_some_and(|i| self.cells[i].is_none()))
    }

    fn commit(&mut self, template_index: usize, base: IVec3, footprint: &[(IVec3, Material)]) {
        let instance = self.instances.len() as u32;
        let mut cell_min = base;
        let mut cell_max = base;
        for &(offset, material) in footprint {
            let p = base + offset;
            if let Some(i) = self.index(p) {
                self.cells[i] = Some(Cell { instance, material });
                cell_min = cell_min.min(p);
                cell_max = cell_max.max(p);
            }
        }
        let location = Vec3::new(
            (base.x as f32 + 0.5) * self.cell_size,
            (base.y as f32 + 0.5) * self.cell_size,
            base.z as f32 * self.cell_size,
        );
        self.instances.push(TreeInstance {
            template_index,
            base_cell: base,
            location,
            cell_min,
            cell_max,
        });
    }

    pub fn dims(&self) -> UVec3 {
        self.dims
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn cell(&self, p: IVec3) -> Option<Cell> {
        self.index(p).and_then(|i| self.cells[i])
    }

    /// Committed instances in placement order
    pub fn instances(&self) -> &[TreeInstance] {
        &self.instances
    }

    /// One `PlacementExhausted` per slot that found no site
    pub fn failures(&self) -> &[Error] {
        &self.failures
    }

    /// Move the recorded placement failures out of the grid
    pub fn take_failures(&mut self) -> Vec<Error> {
        std::mem::take(&mut self.failures)
    }

    /// Merge instance `i`'s cells into boxes
    ///
    /// Returns the instance's template index and its coarse mesh.
    pub fn greedy_meshing(&self, i: usize) -> Result<(usize, CoarseMesh)> {
        let instance = self.instances.get(i).ok_or_else(|| {
            Error::invalid(format!("instance {i} out of range ({} placed)", self.instances.len()))
        })?;
        Ok((instance.template_index, self.coarse_mesh(i, instance)))
    }

    /// Coarse meshes for every instance, in instance order
    pub fn mesh_all(&self) -> Vec<CoarseMesh> {
        self.instances
            .par_iter()
            .enumerate()
            .map(|(i, instance)| self.coarse_mesh(i, instance))
            .collect()
    }

    fn coarse_mesh(&self, i: usize, instance: &TreeInstance) -> CoarseMesh {
        let min = instance.cell_min;
        let dims = (instance.cell_max - min + IVec3::ONE).as_uvec3();
        let mut cells = Vec::with_capacity((dims.x * dims.y * dims.z) as usize);
        for z in 0..dims.z as i32 {
            for y in 0..dims.y as i32 {
                for x in 0..dims.x as i32 {
                    let cell = self.cell(min + IVec3::new(x, y, z));
                    cells.push(cell.filter(|c| c.instance == i as u32).map(|c| c.material));
                }
            }
        }

        let offset = min - instance.base_cell;
        let mut boxes = greedy_boxes(dims, &cells);
        for b in &mut boxes {
            b.origin += offset;
        }
        CoarseMesh {
            template_index: instance.template_index,
            location: instance.location,
            cell_size: self.cell_size,
            boxes,
        }
    }
}
