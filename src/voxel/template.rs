//! Tree template shapes and their cell rasterization

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::types::IVec3;
use crate::core::{Error, Result};

/// Material class of an occupied cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Material {
    Stem,
    Crown,
}

/// Outline of a template's crown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrownType {
    #[default]
    #[serde(alias = "ellipsoid")]
    Sphere,
    Cone,
    Cylinder,
    Box,
}

/// Coarse shape of one tree type, in world units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateShape {
    #[serde(alias = "crownWidth")]
    pub crown_width: f32,
    #[serde(alias = "crownHeight")]
    pub crown_height: f32,
    /// Height of the crown's lower edge above the ground
    #[serde(alias = "crownOffset")]
    pub crown_offset: f32,
    #[serde(alias = "crownType")]
    pub crown_type: CrownType,
    #[serde(alias = "stemHeight")]
    pub stem_height: f32,
    #[serde(alias = "stemDiameter")]
    pub stem_diameter: f32,
}

impl Default for TemplateShape {
    fn default() -> Self {
        Self {
            crown_width: 4.0,
            crown_height: 4.0,
            crown_offset: 2.0,
            crown_type: CrownType::Sphere,
            stem_height: 3.0,
            stem_diameter: 0.5,
        }
    }
}

/// Crown extents converted to cells
struct CellExtents {
    half_width: f32,
    stem_radius: f32,
    stem_height: i32,
    crown_bottom: i32,
    crown_height: i32,
}

impl TemplateShape {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("crown_width", self.crown_width),
            ("crown_height", self.crown_height),
            ("crown_offset", self.crown_offset),
            ("stem_height", self.stem_height),
            ("stem_diameter", self.stem_diameter),
        ];
        for (name, value) in fields {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::invalid(format!("{name} must be non-negative, got {value}")));
            }
        }
        if self.crown_width <= 0.0 || self.crown_height <= 0.0 {
            return Err(Error::invalid("crown must have a positive width and height"));
        }
        Ok(())
    }

    /// Largest horizontal distance from the stem axis to the crown edge
    pub fn crown_radius(&self) -> f32 {
        self.crown_width / 2.0
    }

    fn extents(&self, cell_size: f32) -> CellExtents {
        CellExtents {
            half_width: (self.crown_width / 2.0 / cell_size).max(0.5),
            stem_radius: (self.stem_diameter / 2.0 / cell_size).max(0.5),
            stem_height: (self.stem_height / cell_size).round() as i32,
            crown_bottom: (self.crown_offset / cell_size).round() as i32,
            crown_height: ((self.crown_height / cell_size).round() as i32).max(1),
        }
    }

    /// Vertical extent in cells
    pub fn height_cells(&self, cell_size: f32) -> i32 {
        let e = self.extents(cell_size);
        e.stem_height.max(e.crown_bottom + e.crown_height)
    }

    /// Occupied cells relative to the base cell, sorted by (z, y, x)
    ///
    /// The base cell is the footprint centre at ground level. Crown cells
    /// replace stem cells where the two overlap.
    pub fn rasterize(&self, cell_size: f32) -> Vec<(IVec3, Material)> {
        let e = self.extents(cell_size);
        let mut cells: BTreeMap<(i32, i32, i32), Material> = BTreeMap::new();

        let stem_reach = e.stem_radius.ceil() as i32;
        let stem_r2 = e.stem_radius * e.stem_radius;
        for z in 0..e.stem_height {
            for y in -stem_reach..=stem_reach {
                for x in -stem_reach..=stem_reach {
                    if (x * x + y * y) as f32 <= stem_r2 {
                        cells.insert((z, y, x), Material::Stem);
                    }
                }
            }
        }

        let reach = e.half_width.ceil() as i32;
        for dz in 0..e.crown_height {
            // normalized height of the layer centre inside the crown, in (0, 1)
            let t = (dz as f32 + 0.5) / e.crown_height as f32;
            for y in -reach..=reach {
                for x in -reach..=reach {
                    let (fx, fy) = (x as f32 / e.half_width, y as f32 / e.half_width);
                    let r2 = fx * fx + fy * fy;
                    let inside = match self.crown_type {
                        CrownType::Sphere => {
                            let fz = (t - 0.5) * 2.0;
                            r2 + fz * fz <= 1.0
                        }
                        CrownType::Cone => {
                            let radius = (1.0 - t).max(0.5 / e.half_width);
                            r2 <= radius * radius
                        }
                        CrownType::Cylinder => r2 <= 1.0,
                        CrownType::Box => fx.abs() <= 1.0 && fy.abs() <= 1.0,
                    };
                    if inside {
                        cells.insert((e.crown_bottom + dz, y, x), Material::Crown);
                    }
                }
            }
        }

        cells
            .into_iter()
            .map(|((z, y, x), m)| (IVec3::new(x, y, z), m))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(crown_type: CrownType) -> TemplateShape {
        TemplateShape {
            crown_width: 4.0,
            crown_height: 4.0,
            crown_offset: 2.0,
            crown_type,
            stem_height: 3.0,
            stem_diameter: 1.0,
        }
    }

    #[test]
    fn test_box_crown_is_full_cuboid() {
        let cells = shape(CrownType::Box).rasterize(1.0);
        let crown = cells.iter().filter(|(_, m)| *m == Material::Crown).count();
        assert_eq!(crown, 5 * 5 * 4);
    }

    #[test]
    fn test_crown_overwrites_stem() {
        let cells = shape(CrownType::Cylinder).rasterize(1.0);
        // stem reaches z = 2, crown starts at z = 2
        let at_axis: Vec<_> = cells.iter().filter(|(p, _)| p.x == 0 && p.y == 0).collect();
        assert_eq!(at_axis.len(), 6);
        assert_eq!(at_axis[0].1, Material::Stem);
        assert_eq!(at_axis[2].1, Material::Crown);
        let unique: std::collections::BTreeSet<_> = cells.iter().map(|(p, _)| p.to_array()).collect();
        assert_eq!(unique.len(), cells.len());
    }

    #[test]
    fn test_cone_narrows_upward() {
        let cells = shape(CrownType::Cone).rasterize(1.0);
        let layer = |z: i32| cells.iter().filter(|(p, _)| p.z == z).count();
        assert!(layer(2) > layer(5));
        assert!(layer(5) >= 1);
    }

    #[test]
    fn test_height_cells() {
        assert_eq!(shape(CrownType::Sphere).height_cells(1.0), 6);
        assert_eq!(shape(CrownType::Sphere).height_cells(0.5), 12);
    }

    #[test]
    fn test_crown_type_aliases() {
        let t: CrownType = serde_json::from_str("\"ellipsoid\"").unwrap();
        assert_eq!(t, CrownType::Sphere);
        let s: TemplateShape = serde_json::from_str(r#"{"crownType": "cone", "stem_height": 1.5}"#).unwrap();
        assert_eq!(s.crown_type, CrownType::Cone);
        assert_eq!(s.stem_height, 1.5);
        assert_eq!(s.crown_width, TemplateShape::default().crown_width);
    }

    #[test]
    fn test_validate() {
        assert!(TemplateShape::default().validate().is_ok());
        let bad = TemplateShape { crown_width: 0.0, ..TemplateShape::default() };
        assert!(bad.validate().is_err());
        let bad = TemplateShape { stem_height: f32::NAN, ..TemplateShape::default() };
        assert!(bad.validate().is_err());
    }
}
