//! Forest configuration loaded from JSON

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::procgen::params::{GrowthParams, TaperParams};
use crate::voxel::grid::PlacementSettings;
use crate::voxel::template::TemplateShape;

/// One tree type: voxel shape, growth and taper parameters in a single flat object
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeTemplate {
    pub name: String,
    #[serde(flatten)]
    pub shape: TemplateShape,
    #[serde(flatten)]
    pub growth: GrowthParams,
    #[serde(flatten)]
    pub taper: TaperParams,
}

/// Everything needed to generate a forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub seed: u64,
    #[serde(alias = "treeCount")]
    pub tree_count: usize,
    /// World units per voxel cell
    #[serde(alias = "cellSize")]
    pub cell_size: f32,
    /// Candidate sites tried per tree before giving up on it
    #[serde(alias = "placementAttempts")]
    pub placement_attempts: u32,
    /// Side of the flat ground used when no surface field is given
    #[serde(alias = "gridSize")]
    pub grid_size: u32,
    pub templates: Vec<TreeTemplate>,
    /// Selection weight per template; empty means equal weights
    pub weights: Vec<f32>,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            tree_count: 10,
            cell_size: 1.0,
            placement_attempts: 50,
            grid_size: 64,
            templates: vec![TreeTemplate::default()],
            weights: Vec::new(),
        }
    }
}

impl ForestConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read and parse a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.templates.is_empty() {
            return Err(Error::Config("no tree templates configured".into()));
        }
        if !self.weights.is_empty() && self.weights.len() != self.templates.len() {
            return Err(Error::Config(format!(
                "{} weights for {} templates",
                self.weights.len(),
                self.templates.len()
            )));
        }
        if self.weights.iter().any(|w| !(w.is_finite() && *w >= 0.0)) {
            return Err(Error::Config("template weights must be finite and non-negative".into()));
        }
        if !self.weights.is_empty() && self.weights.iter().sum::<f32>() <= 0.0 {
            return Err(Error::Config("template weights sum to zero".into()));
        }
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(Error::Config(format!("cell_size must be positive, got {}", self.cell_size)));
        }
        if self.placement_attempts == 0 {
            return Err(Error::Config("placement_attempts must be at least 1".into()));
        }
        for (i, template) in self.templates.iter().enumerate() {
            template
                .shape
                .validate()
                .and_then(|_| template.growth.validate())
                .map_err(|e| Error::Config(format!("template {i} ({}): {e}", template.name)))?;
        }
        Ok(())
    }

    /// Template weights with the empty list expanded to equal weights
    pub fn effective_weights(&self) -> Vec<f32> {
        if self.weights.is_empty() {
            vec![1.0; self.templates.len()]
        } else {
            self.weights.clone()
        }
    }

    pub fn placement(&self) -> PlacementSettings {
        PlacementSettings {
            tree_count: self.tree_count,
            attempts: self.placement_attempts,
            cell_size: self.cell_size,
            grid_size: self.grid_size,
            seed: self.seed,
        }
    }
}
