//! Sylvan - procedural trees and collision-free forests
//!
//! Trees are grown by space colonization inside voxel crown volumes, placed on
//! a ground surface without overlap, skinned, and split into trunk and branch
//! surfaces.

pub mod core;
pub mod math;
pub mod mesh;
pub mod procgen;
pub mod voxel;
pub mod forest;
pub mod classify;
