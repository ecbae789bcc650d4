//! Mathematical utilities and data structures

pub mod aabb;
pub mod point_index;

pub use aabb::Aabb;
pub use point_index::{Neighbor, PointIndex};
