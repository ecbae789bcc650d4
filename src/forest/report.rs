//! Serializable summary of a generated forest for the host application

use serde::{Deserialize, Serialize};

use crate::classify::SurfaceClass;
use crate::forest::driver::{Forest, TreeOutcome};

/// Per-instance entry of a [`ForestReport`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeReport {
    pub instance: usize,
    pub template_index: usize,
    /// Column-major world transform
    pub transform: [f32; 16],
    pub grown: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_reason: Option<String>,
    pub nodes: usize,
    pub trunk_polygons: usize,
    pub branch_polygons: usize,
    pub coarse_boxes: usize,
}

/// What the host needs to link trees into its scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestReport {
    pub seed: u64,
    pub trees: Vec<TreeReport>,
    pub placement_failures: Vec<String>,
}

impl ForestReport {
    pub fn new(forest: &Forest, seed: u64) -> Self {
        let trees = forest
            .trees
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                let mut report = TreeReport {
                    instance: i,
                    template_index: slot.template_index,
                    transform: slot.transform.to_cols_array(),
                    grown: false,
                    skipped_reason: None,
                    nodes: 0,
                    trunk_polygons: 0,
                    branch_polygons: 0,
                    coarse_boxes: forest.coarse.get(i).map_or(0, |c| c.boxes.len()),
                };
                match &slot.outcome {
                    TreeOutcome::Grown(tree) => {
                        report.grown = true;
                        report.nodes = tree.skeleton.len();
                        report.trunk_polygons = tree.classification.count(SurfaceClass::Trunk);
                        report.branch_polygons = tree.classification.count(SurfaceClass::Branch);
                    }
                    TreeOutcome::Skipped(e) => report.skipped_reason = Some(e.to_string()),
                }
                report
            })
            .collect();

        Self {
            seed,
            trees,
            placement_failures: forest.placement_failures.iter().map(|e| e.to_string()).collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
