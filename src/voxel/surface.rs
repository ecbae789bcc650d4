//! Ground elevation field used for placement

use crate::core::{Error, Result};

/// Rectangular grid of ground elevations, in cells
///
/// Rows index Y and columns index X.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceField {
    width: u32,
    depth: u32,
    heights: Vec<i32>,
}

impl SurfaceField {
    /// Build from row-major rows; every row must have the same length
    pub fn from_rows(rows: Vec<Vec<i32>>) -> Result<Self> {
        let depth = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if depth == 0 || width == 0 {
            return Err(Error::invalid("surface field is empty"));
        }
        if let Some((y, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(Error::invalid(format!(
                "surface row {y} has {} columns, expected {width}",
                row.len()
            )));
        }
        let heights: Vec<i32> = rows.into_iter().flatten().collect();
        if let Some(h) = heights.iter().find(|&&h| h < 0) {
            return Err(Error::invalid(format!("surface elevation {h} is negative")));
        }
        Ok(Self {
            width: width as u32,
            depth: depth as u32,
            heights,
        })
    }

    /// Flat ground at elevation 0
    pub fn flat(width: u32, depth: u32) -> Self {
        Self {
            width,
            depth,
            heights: vec![0; (width as usize) * (depth as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Ground elevation at column `x`, row `y`
    pub fn elevation(&self, x: u32, y: u32) -> Option<i32> {
        if x >= self.width || y >= self.depth {
            return None;
        }
        self.heights.get((y * self.width + x) as usize).copied()
    }

    pub fn max_elevation(&self) -> i32 {
        self.heights.iter().copied().max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_index_y() {
        let field = SurfaceField::from_rows(vec![vec![0, 1, 2], vec![3, 4, 5]]).unwrap();
        assert_eq!(field.width(), 3);
        assert_eq!(field.depth(), 2);
        assert_eq!(field.elevation(2, 0), Some(2));
        assert_eq!(field.elevation(0, 1), Some(3));
        assert_eq!(field.elevation(3, 0), None);
        assert_eq!(field.max_elevation(), 5);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        assert!(SurfaceField::from_rows(vec![vec![0, 1], vec![0]]).is_err());
        assert!(SurfaceField::from_rows(vec![]).is_err());
        assert!(SurfaceField::from_rows(vec![vec![-1]]).is_err());
    }

    #[test]
    fn test_flat() {
        let field = SurfaceField::flat(4, 2);
        assert_eq!(field.elevation(3, 1), Some(0));
        assert_eq!(field.max_elevation(), 0);
    }
}
