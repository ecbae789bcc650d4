//! Sequential forest generation
//!
//! Placement and coarse meshing run once for the whole forest. Trees are then
//! grown one at a time: each growth run sees the coarse meshes of its
//! neighbours as exclusion volumes and its own crown boxes as the volume to
//! fill. Trees are never grown concurrently.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::classify::{Classification, TrunkClassifier};
use crate::core::time::Timings;
use crate::core::types::{Mat4, Vec3};
use crate::core::{Error, Result};
use crate::forest::config::{ForestConfig, TreeTemplate};
use crate::forest::exclusion::ExclusionSet;
use crate::math::PointIndex;
use crate::mesh::PolyMesh;
use crate::procgen::colonization::{IterationStats, SpaceColonization};
use crate::procgen::params::GrowthParams;
use crate::procgen::sampler::HaltonSampler;
use crate::procgen::skeleton::{RadiusProfile, Skeleton};
use crate::procgen::skin::{NativeSkinner, Skinner};
use crate::voxel::greedy::CoarseMesh;
use crate::voxel::grid::{TreeInstance, VoxelGrid};
use crate::voxel::surface::SurfaceField;
use crate::voxel::template::Material;

/// Mixes the forest seed before it drives per-tree seeds
const TREE_SEED_MIX: u64 = 0x517cc1b727220a95;

/// Result of growing one tree
#[derive(Debug, Clone)]
pub struct GrownTree {
    /// Skeleton in tree-local space, root at the origin
    pub skeleton: Skeleton,
    /// Skinned surface in tree-local space, materials and vertex groups applied
    pub mesh: PolyMesh,
    pub classification: Classification,
    pub radii: RadiusProfile,
    pub stats: IterationStats,
    /// Neighbour coarse meshes that were active during growth
    pub neighbours: Vec<usize>,
    pub elapsed: Duration,
}

/// What happened to a placed instance
#[derive(Debug)]
pub enum TreeOutcome {
    Grown(GrownTree),
    /// Growth produced no usable geometry; the slot stays empty
    Skipped(Error),
}

/// One placed instance and its growth outcome
#[derive(Debug)]
pub struct TreeSlot {
    pub instance: TreeInstance,
    pub template_index: usize,
    pub transform: Mat4,
    pub outcome: TreeOutcome,
}

impl TreeSlot {
    pub fn grown(&self) -> Option<&GrownTree> {
        match &self.outcome {
            TreeOutcome::Grown(tree) => Some(tree),
            TreeOutcome::Skipped(_) => None,
        }
    }
}

/// A generated forest
#[derive(Debug)]
pub struct Forest {
    pub trees: Vec<TreeSlot>,
    /// One `PlacementExhausted` per slot that never found a site
    pub placement_failures: Vec<Error>,
    /// Coarse mesh per instance, in instance order
    pub coarse: Vec<CoarseMesh>,
}

impl Forest {
    pub fn grown_count(&self) -> usize {
        self.trees.iter().filter(|t| t.grown().is_some()).count()
    }
}

/// Places, grows, skins and classifies every tree of a forest
pub struct ForestGenerator<S: Skinner = NativeSkinner> {
    config: ForestConfig,
    skinner: S,
}

impl ForestGenerator<NativeSkinner> {
    pub fn new(config: ForestConfig) -> Result<Self> {
        Self::with_skinner(config, NativeSkinner::default())
    }
}

impl<S: Skinner> ForestGenerator<S> {
    /// Use a different skinning collaborator
    pub fn with_skinner(config: ForestConfig, skinner: S) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, skinner })
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Generate the whole forest on `surface` (flat ground when `None`)
    pub fn generate(&self, surface: Option<SurfaceField>) -> Result<Forest> {
        let mut timings = Timings::new();
        let shapes: Vec<_> = self.config.templates.iter().map(|t| t.shape.clone()).collect();

        let mut grid = VoxelGrid::generate_forest(
            &shapes,
            &self.config.effective_weights(),
            surface,
            &self.config.placement(),
        )?;
        timings.add("placement");
        info!(
            "Placed {} of {} trees on a {}x{} grid",
            grid.instances().len(),
            self.config.tree_count,
            grid.dims().x,
            grid.dims().y
        );

        let coarse = grid.mesh_all();
        timings.add("coarse meshing");

        let instances = grid.instances().to_vec();
        let centres: Vec<Vec3> = instances.iter().map(|i| i.location).collect();
        let centre_index = PointIndex::build(&centres);
        let crown_radius = |template: usize| self.config.templates[template].shape.crown_radius();
        let max_crown_radius = (0..self.config.templates.len())
            .map(crown_radius)
            .fold(0.0f32, f32::max);

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed.wrapping_mul(TREE_SEED_MIX));
        let mut trees = Vec::with_capacity(instances.len());

        for (i, instance) in instances.into_iter().enumerate() {
            let tree_seed = rng.next_u64();
            let own_radius = crown_radius(instance.template_index);

            let neighbours: Vec<usize> = centre_index
                .within_radius(instance.location, own_radius + max_crown_radius)
                .into_iter()
                .filter(|&n| n != i)
                .filter(|&n| {
                    let reach = own_radius + crown_radius(coarse[n].template_index);
                    centres[n].distance(instance.location) <= reach
                })
                .collect();
            let exclusion = ExclusionSet::new(neighbours.iter().map(|&n| &coarse[n]));

            let template = &self.config.templates[instance.template_index];
            let outcome = match self.grow_tree(template, &coarse[i], &exclusion, tree_seed) {
                Ok(mut tree) => {
                    tree.neighbours = neighbours;
                    info!(
                        "Tree {} (template {}): {} nodes, {} polygons in {:.1} ms",
                        i,
                        instance.template_index,
                        tree.skeleton.len(),
                        tree.mesh.polygon_count(),
                        tree.elapsed.as_secs_f64() * 1000.0
                    );
                    TreeOutcome::Grown(tree)
                }
                Err(e) => {
                    warn!("Tree {} (template {}) skipped: {}", i, instance.template_index, e);
                    TreeOutcome::Skipped(e)
                }
            };

            trees.push(TreeSlot {
                template_index: instance.template_index,
                transform: instance.transform(),
                instance,
                outcome,
            });
        }
        timings.add("growth");

        let forest = Forest {
            trees,
            placement_failures: grid.take_failures(),
            coarse,
        };
        info!(
            "Forest done: {} grown, {} skipped, {} unplaced in {:.2} s",
            forest.grown_count(),
            forest.trees.len() - forest.grown_count(),
            forest.placement_failures.len(),
            timings.total().as_secs_f64()
        );
        debug!("Forest timings:\n{}", timings);
        Ok(forest)
    }

    /// Grow, skin and classify one tree in its local frame
    fn grow_tree(
        &self,
        template: &TreeTemplate,
        own: &CoarseMesh,
        exclusion: &ExclusionSet<'_>,
        seed: u64,
    ) -> Result<GrownTree> {
        let start = Instant::now();
        let crown = own
            .crown_bounds_local()
            .ok_or_else(|| Error::invalid("instance has no crown cells"))?;

        let params = GrowthParams {
            seed,
            ..template.growth.clone()
        };
        let volume = HaltonSampler::new(crown.min, crown.size(), seed)
            .with_crown(|p| own.contains_local_material(p, Material::Crown));
        let location = own.location;

        let mut sca = SpaceColonization::new(params.clone(), volume)?
            .with_exclusion(|p| exclusion.contains(p + location));
        let stats = sca.iterate(params.new_endpoints_per_1000, params.max_time);
        debug!(
            "Growth stopped after {} steps ({:?}), {} nodes, {} endpoints left",
            stats.steps, stats.stop, stats.nodes, stats.alive_endpoints
        );

        let skeleton = sca.into_skeleton().prune(params.prune_generation)?;
        let radii = skeleton.radii(&template.taper);
        let mut mesh = self.skinner.skin(&skeleton, &radii.radii);

        let classification = match TrunkClassifier::new(&skeleton, &radii.radii) {
            Ok(classifier) => classifier.classify_mesh(&mesh),
            Err(Error::MissingTrunkTip) => {
                warn!("No trunk found, labelling every polygon as branch");
                Classification::all_branch(mesh.polygon_count())
            }
            Err(e) => return Err(e),
        };
        classification.apply(&mut mesh);

        Ok(GrownTree {
            skeleton,
            mesh,
            classification,
            radii,
            stats,
            neighbours: Vec::new(),
            elapsed: start.elapsed(),
        })
    }
}
