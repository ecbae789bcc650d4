//! Voxel occupancy model: template rasterization, placement and greedy meshing

pub mod greedy;
pub mod grid;
pub mod surface;
pub mod template;

pub use greedy::{greedy_boxes, CoarseMesh, VoxelBox};
pub use grid::{Cell, PlacementSettings, TreeInstance, VoxelGrid};
pub use surface::SurfaceField;
pub use template::{CrownType, Material, TemplateShape};
