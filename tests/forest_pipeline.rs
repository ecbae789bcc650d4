//! End-to-end forest generation from a config file on disk

use std::collections::HashSet;

use tempfile::TempDir;

use sylvan::classify::{SurfaceClass, BRANCH_GROUP, TRUNK_GROUP};
use sylvan::core::Error;
use sylvan::forest::{ExclusionSet, ForestConfig, ForestGenerator, ForestReport, TreeOutcome};
use sylvan::voxel::SurfaceField;

const CONFIG: &str = r#"{
    "seed": 21,
    "treeCount": 6,
    "cellSize": 0.5,
    "placementAttempts": 60,
    "gridSize": 48,
    "templates": [
        {
            "name": "broadleaf",
            "crown_width": 5.0, "crown_height": 4.0, "crown_offset": 1.5,
            "crown_type": "sphere", "stem_height": 2.0, "stem_diameter": 0.5,
            "interNodeLength": 0.4, "killDistance": 1.0, "influenceRange": 10.0,
            "numberOfEndpoints": 80, "maxIterations": 40, "apicalcontrol": 0.4
        },
        {
            "name": "conifer",
            "crown_width": 3.0, "crown_height": 6.0, "crown_offset": 1.0,
            "crown_type": "cone", "stem_height": 1.5, "stem_diameter": 0.5,
            "interNodeLength": 0.4, "killDistance": 1.0, "influenceRange": 10.0,
            "numberOfEndpoints": 60, "maxIterations": 40, "tropism": 0.1
        }
    ],
    "weights": [2.0, 1.0]
}"#;

fn write_config(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("forest.json");
    std::fs::write(&path, CONFIG).expect("failed to write config");
    path
}

#[test]
fn test_load_config_from_disk() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let config = ForestConfig::load(write_config(&temp_dir)).expect("load failed");
    assert_eq!(config.templates.len(), 2);
    assert_eq!(config.templates[1].name, "conifer");
    assert_eq!(config.cell_size, 0.5);
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_config_is_io_error() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let result = ForestConfig::load(temp_dir.path().join("missing.json"));
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_full_pipeline_on_hilly_surface() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let config = ForestConfig::load(write_config(&temp_dir)).expect("load failed");

    let rows: Vec<Vec<i32>> = (0..40).map(|y| (0..40).map(|x| (x + y) / 10).collect()).collect();
    let surface = SurfaceField::from_rows(rows).expect("valid surface");

    let forest = ForestGenerator::new(config)
        .expect("valid config")
        .generate(Some(surface))
        .expect("generation failed");

    assert_eq!(forest.trees.len() + forest.placement_failures.len(), 6);
    assert!(forest.grown_count() > 0);

    // coarse volumes never share space
    let mut claimed = HashSet::new();
    for coarse in &forest.coarse {
        for b in &coarse.boxes {
            for z in 0..b.size.z as i32 {
                for y in 0..b.size.y as i32 {
                    for x in 0..b.size.x as i32 {
                        let local = b.origin + glam::IVec3::new(x, y, z);
                        let world_cell = (coarse.location / coarse.cell_size).floor().as_ivec3() + local;
                        assert!(claimed.insert(world_cell.to_array()));
                    }
                }
            }
        }
    }

    for slot in &forest.trees {
        match &slot.outcome {
            TreeOutcome::Grown(tree) => {
                assert!(tree.skeleton.is_well_formed());
                assert_eq!(tree.skeleton.roots().count(), 1);
                let labelled = tree.classification.count(SurfaceClass::Trunk)
                    + tree.classification.count(SurfaceClass::Branch);
                assert_eq!(labelled, tree.mesh.polygon_count());
                assert!(tree.mesh.vertex_group(TRUNK_GROUP).is_some());
                assert!(tree.mesh.vertex_group(BRANCH_GROUP).is_some());

                let exclusion = ExclusionSet::new(tree.neighbours.iter().map(|&n| &forest.coarse[n]));
                for &p in tree.skeleton.endpoints() {
                    assert!(!exclusion.contains(p + slot.instance.location));
                }
            }
            TreeOutcome::Skipped(e) => {
                assert!(matches!(e, Error::EmptySkeleton { .. }));
            }
        }
    }

    let report = ForestReport::new(&forest, 21);
    let out = temp_dir.path().join("report.json");
    std::fs::write(&out, report.to_json().expect("serialize failed")).expect("write failed");
    let back: ForestReport =
        serde_json::from_str(&std::fs::read_to_string(&out).expect("read failed")).expect("parse failed");
    assert_eq!(back, report);
    assert_eq!(back.trees.iter().filter(|t| t.grown).count(), forest.grown_count());
}

#[test]
fn test_pipeline_is_deterministic() {
    let config = ForestConfig::from_json_str(CONFIG).expect("valid json");
    let a = ForestGenerator::new(config.clone()).unwrap().generate(None).unwrap();
    let b = ForestGenerator::new(config).unwrap().generate(None).unwrap();

    let ra = ForestReport::new(&a, 21);
    let rb = ForestReport::new(&b, 21);
    assert_eq!(ra, rb);
}
