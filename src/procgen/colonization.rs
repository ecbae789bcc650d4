//! Space colonization growth engine
//!
//! Each step associates every alive attraction point with its nearest node,
//! grows one internode toward the mean direction of each node's points, and
//! removes the points the new nodes reached. The run is deterministic for a
//! given parameter set and sampler sequence.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::core::time::Deadline;
use crate::core::types::Vec3;
use crate::core::Result;
use crate::math::PointIndex;
use crate::procgen::params::GrowthParams;
use crate::procgen::sampler::MAX_REJECTIONS;
use crate::procgen::skeleton::{BranchNode, Skeleton};

/// Proposals closer than this fraction of the internode length to an existing
/// node are dropped
const COINCIDENT_FRACTION: f32 = 1e-4;

/// Why `iterate` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No alive attraction points and nothing left to inject
    Exhausted,
    /// Step budget reached
    MaxIterations,
    /// A step grew nothing and nothing can change before the next one
    Stalled,
    /// Wall-clock budget used up
    TimeBudget,
}

/// Summary of an `iterate` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationStats {
    pub steps: u32,
    pub nodes: usize,
    pub alive_endpoints: usize,
    pub stop: StopReason,
}

/// Per-node accumulated pull from attraction points
#[derive(Default)]
struct Influence {
    direction_sum: Vec3,
    points: u32,
}

/// One growth run over a volume sampler
pub struct SpaceColonization<'a> {
    params: GrowthParams,
    volume: Box<dyn Iterator<Item = Vec3> + 'a>,
    exclude: Box<dyn Fn(Vec3) -> bool + 'a>,
    skeleton: Skeleton,
    endpoints: Vec<Vec3>,
    populated: bool,
    volume_exhausted: bool,
    step: u32,
    injection: f32,
}

impl<'a> SpaceColonization<'a> {
    /// Create an engine with a single root at the local origin
    ///
    /// Parameters are validated here; no growth happens before `iterate`.
    pub fn new(params: GrowthParams, volume: impl Iterator<Item = Vec3> + 'a) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            volume: Box::new(volume),
            exclude: Box::new(|_| false),
            skeleton: Skeleton::from_roots(&[Vec3::ZERO]),
            endpoints: Vec::new(),
            populated: false,
            volume_exhausted: false,
            step: 0,
            injection: 0.0,
        })
    }

    /// Reject attraction points for which `exclude` returns true
    pub fn with_exclusion(mut self, exclude: impl Fn(Vec3) -> bool + 'a) -> Self {
        self.exclude = Box::new(exclude);
        self
    }

    /// Replace the default root with one root per starting point
    pub fn with_starting_points(mut self, points: &[Vec3]) -> Self {
        if !points.is_empty() {
            self.skeleton = Skeleton::from_roots(points);
        }
        self
    }

    /// Growth parameters in use
    pub fn params(&self) -> &GrowthParams {
        &self.params
    }

    /// Skeleton grown so far
    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    /// Alive attraction points
    pub fn endpoints(&self) -> &[Vec3] {
        &self.endpoints
    }

    /// Steps run so far
    pub fn steps(&self) -> u32 {
        self.step
    }

    /// Finish the run, keeping alive attraction points for debug markers
    pub fn into_skeleton(mut self) -> Skeleton {
        self.skeleton.set_endpoints(std::mem::take(&mut self.endpoints));
        self.skeleton
    }

    /// Run growth steps until a stop condition holds
    ///
    /// `max_time` is a soft wall-clock budget in seconds (`<= 0` disables it);
    /// it is checked between steps only.
    pub fn iterate(&mut self, new_endpoints_per_1000: f32, max_time: f32) -> IterationStats {
        self.populate();

        let deadline = Deadline::after_secs(max_time);
        let rate = if new_endpoints_per_1000.is_finite() {
            new_endpoints_per_1000.max(0.0) / 1000.0
        } else {
            0.0
        };

        let stop = loop {
            if self.step >= self.params.max_iterations {
                break StopReason::MaxIterations;
            }
            if self.endpoints.is_empty() && !self.injecting(rate) {
                break StopReason::Exhausted;
            }
            if deadline.expired() {
                break StopReason::TimeBudget;
            }

            let grown = self.grow_step();
            self.step += 1;
            let injected = self.inject(rate);
            debug!(
                "step {}: {} new nodes, {} injected, {} endpoints alive",
                self.step,
                grown,
                injected,
                self.endpoints.len()
            );

            if grown == 0 && !self.injecting(rate) {
                break StopReason::Stalled;
            }
        };

        IterationStats {
            steps: self.step,
            nodes: self.skeleton.len(),
            alive_endpoints: self.endpoints.len(),
            stop,
        }
    }

    /// Whether injection can still add points
    fn injecting(&self, rate: f32) -> bool {
        rate > 0.0 && !self.volume_exhausted
    }

    /// Fill the attraction point population up to `max_endpoints`, once
    fn populate(&mut self) {
        if self.populated {
            return;
        }
        self.populated = true;
        while self.endpoints.len() < self.params.max_endpoints {
            match self.draw_endpoint() {
                Some(p) => self.endpoints.push(p),
                None => break,
            }
        }
        if self.endpoints.len() < self.params.max_endpoints {
            warn!(
                "Volume yielded only {} of {} attraction points",
                self.endpoints.len(),
                self.params.max_endpoints
            );
        }
    }

    /// Pull the next non-excluded point from the volume
    fn draw_endpoint(&mut self) -> Option<Vec3> {
        if self.volume_exhausted {
            return None;
        }
        for _ in 0..MAX_REJECTIONS {
            let Some(candidate) = self.volume.next() else {
                self.volume_exhausted = true;
                return None;
            };
            if !(self.exclude)(candidate) {
                return Some(candidate);
            }
        }
        warn!("Gave up drawing an attraction point after {} excluded candidates", MAX_REJECTIONS);
        self.volume_exhausted = true;
        None
    }

    /// Add `rate` points per step through a fractional accumulator
    fn inject(&mut self, rate: f32) -> usize {
        if rate <= 0.0 {
            return 0;
        }
        self.injection += rate;
        let mut injected = 0;
        while self.injection >= 1.0 {
            self.injection -= 1.0;
            match self.draw_endpoint() {
                Some(p) => {
                    self.endpoints.push(p);
                    injected += 1;
                }
                None => break,
            }
        }
        injected
    }

    /// One colonization step, returns the number of nodes created
    fn grow_step(&mut self) -> usize {
        let d = self.params.internode_length;
        let kill = self.params.kill_radius();
        let influence_radius = self.params.influence_radius();
        let generation = self.step + 1;

        let index = PointIndex::build(&self.skeleton.positions());

        // Associate points with their nearest node; points already within kill
        // distance of a node are claimed.
        let mut influences: BTreeMap<usize, Influence> = BTreeMap::new();
        let search = influence_radius.max(kill);
        self.endpoints.retain(|&p| match index.nearest_within(p, search) {
            Some(hit) if hit.distance <= kill => false,
            Some(hit) if hit.distance <= influence_radius => {
                let entry = influences.entry(hit.index).or_default();
                entry.direction_sum += (p - index.point(hit.index)) / hit.distance;
                entry.points += 1;
                true
            }
            _ => true,
        });

        let mut created: Vec<Vec3> = Vec::new();
        for (&node_index, influence) in &influences {
            let node = self.skeleton.node(node_index);
            if node.is_saturated() {
                continue;
            }
            let Some(direction) = self.growth_direction(node, influence) else {
                continue;
            };
            let position = node.position + direction * d;

            let min_gap = d * COINCIDENT_FRACTION;
            let collides = index
                .nearest(position)
                .is_some_and(|hit| hit.distance < min_gap)
                || created.iter().any(|c| c.distance(position) < min_gap);
            if collides {
                continue;
            }

            if self.skeleton.attach(node_index, position, generation).is_some() {
                created.push(position);
            }
        }

        if !created.is_empty() && kill > 0.0 {
            let fresh = PointIndex::build(&created);
            self.endpoints
                .retain(|&p| fresh.nearest_within(p, kill).is_none());
        }

        self.update_connections(influence_radius);
        created.len()
    }

    /// Mean pull direction with tropism and apical control applied
    fn growth_direction(&self, node: &BranchNode, influence: &Influence) -> Option<Vec3> {
        let pull = (influence.direction_sum / influence.points as f32).normalize_or_zero();
        if pull == Vec3::ZERO {
            return None;
        }

        let tropism = Vec3::new(0.0, 0.0, -self.params.tropism);
        let mut direction = (pull + tropism).normalize_or_zero();
        if direction == Vec3::ZERO {
            direction = pull;
        }

        let params = &self.params;
        if params.apical_control > 0.0 && node.generation < params.apical_control_timing {
            let weight = params.apical_control
                * params.apical_control_falloff.powi(node.generation as i32);
            if let Some(axis) = self.continuation_direction(node) {
                let blended = (direction * (1.0 - weight) + axis * weight).normalize_or_zero();
                if blended != Vec3::ZERO {
                    direction = blended;
                }
            }
        }

        Some(direction)
    }

    /// Direction of the node's axis: toward its apex, else away from its parent
    fn continuation_direction(&self, node: &BranchNode) -> Option<Vec3> {
        let axis = match (node.apex, node.parent) {
            (Some(apex), _) => self.skeleton.node(apex).position - node.position,
            (None, Some(parent)) => node.position - self.skeleton.node(parent).position,
            (None, None) => return None,
        };
        let axis = axis.normalize_or_zero();
        (axis != Vec3::ZERO).then_some(axis)
    }

    /// Credit every alive point within influence to its nearest node and ancestors
    fn update_connections(&mut self, influence_radius: f32) {
        if self.endpoints.is_empty() {
            return;
        }
        let index = PointIndex::build(&self.skeleton.positions());
        let mut credits: BTreeMap<usize, u32> = BTreeMap::new();
        for &p in &self.endpoints {
            if let Some(hit) = index.nearest_within(p, influence_radius) {
                *credits.entry(hit.index).or_default() += 1;
            }
        }
        for (node, amount) in credits {
            self.skeleton.propagate_connections(node, amount);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procgen::sampler::{EllipsoidSampler, TaperedEllipsoidSampler};
    use crate::procgen::params::CrownParams;

    fn scenario_params() -> GrowthParams {
        GrowthParams {
            seed: 0,
            max_endpoints: 10,
            internode_length: 1.0,
            kill_distance: 0.5,
            influence_range: 5.0,
            max_iterations: 20,
            tropism: 0.0,
            ..GrowthParams::default()
        }
    }

    fn grow_scenario() -> Skeleton {
        let volume = TaperedEllipsoidSampler::ball(Vec3::new(0.0, 0.0, 5.0), 3.0, 0).unwrap();
        let mut sca = SpaceColonization::new(scenario_params(), volume).unwrap();
        sca.iterate(0.0, 0.0);
        sca.into_skeleton()
    }

    fn grow_crown(params: GrowthParams) -> Skeleton {
        let volume = EllipsoidSampler::from_crown(&CrownParams::default(), params.seed).unwrap();
        let mut sca = SpaceColonization::new(params, volume).unwrap();
        sca.iterate(0.0, 0.0);
        sca.into_skeleton()
    }

    #[test]
    fn test_scenario_single_root_fixed_internodes() {
        let skeleton = grow_scenario();
        assert!(skeleton.len() >= 1);
        assert_eq!(skeleton.roots().count(), 1);
        assert!(skeleton.is_well_formed());

        for node in skeleton.nodes() {
            if let Some(parent) = node.parent {
                let gap = node.position.distance(skeleton.node(parent).position);
                assert!((gap - 1.0).abs() < 1e-4, "internode length {gap}");
            }
        }
        for (i, a) in skeleton.nodes().iter().enumerate() {
            for b in &skeleton.nodes()[i + 1..] {
                assert!(a.position.distance(b.position) > 1e-4);
            }
        }
    }

    #[test]
    fn test_growth_reaches_toward_crown() {
        let params = GrowthParams { influence_range: 10.0, ..scenario_params() };
        let volume = TaperedEllipsoidSampler::ball(Vec3::new(0.0, 0.0, 5.0), 3.0, 0).unwrap();
        let mut sca = SpaceColonization::new(params, volume).unwrap();
        sca.iterate(0.0, 0.0);
        let skeleton = sca.into_skeleton();
        assert!(skeleton.len() > 1, "root should grow toward the crown");
        let top = skeleton.nodes().iter().map(|n| n.position.z).fold(f32::MIN, f32::max);
        assert!(top > 1.0);
    }

    #[test]
    fn test_same_seed_same_skeleton() {
        let params = GrowthParams { seed: 77, ..GrowthParams::default() };
        let a = grow_crown(params.clone());
        let b = grow_crown(params);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.nodes().iter().zip(b.nodes()) {
            assert_eq!(x.position.to_array(), y.position.to_array());
            assert_eq!((x.parent, x.apex, x.shoot), (y.parent, y.apex, y.shoot));
        }
    }

    #[test]
    fn test_zero_iterations_keeps_starting_points() {
        let params = GrowthParams { max_iterations: 0, ..scenario_params() };
        let volume = TaperedEllipsoidSampler::ball(Vec3::new(0.0, 0.0, 5.0), 3.0, 0).unwrap();
        let starts = [Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)];
        let mut sca = SpaceColonization::new(params, volume)
            .unwrap()
            .with_starting_points(&starts);
        let stats = sca.iterate(0.0, 0.0);
        assert_eq!(stats.stop, StopReason::MaxIterations);
        assert_eq!(stats.steps, 0);
        assert_eq!(sca.skeleton().positions(), starts.to_vec());
        assert!(sca.skeleton().nodes().iter().all(|n| n.generation == 0));
    }

    #[test]
    fn test_node_count_bounded_by_steps() {
        let params = GrowthParams { max_iterations: 5, ..GrowthParams::default() };
        let skeleton = grow_crown(params);
        // every node gains at most one child per step
        assert!(skeleton.len() <= 1 << 5);
        assert!(skeleton.nodes().iter().all(|n| n.generation <= 5));
    }

    #[test]
    fn test_crown_growth_is_well_formed() {
        let params = GrowthParams {
            max_iterations: 60,
            influence_range: 40.0,
            apical_control: 0.5,
            apical_control_falloff: 0.9,
            tropism: 0.2,
            ..GrowthParams::default()
        };
        let skeleton = grow_crown(params);
        assert!(skeleton.len() > 10);
        assert!(skeleton.is_well_formed());
        let root = skeleton.node(0);
        assert!(root.connections > 0);
        for node in skeleton.nodes() {
            if let Some(parent) = node.parent {
                assert!(skeleton.node(parent).connections >= node.connections);
            }
        }
    }

    #[test]
    fn test_exclusion_keeps_points_out() {
        let params = GrowthParams { max_iterations: 0, max_endpoints: 200, ..GrowthParams::default() };
        let volume = EllipsoidSampler::from_crown(&CrownParams::default(), 3).unwrap();
        let mut sca = SpaceColonization::new(params, volume)
            .unwrap()
            .with_exclusion(|p| p.x > 0.0);
        sca.iterate(0.0, 0.0);
        assert_eq!(sca.endpoints().len(), 200);
        assert!(sca.endpoints().iter().all(|p| p.x <= 0.0));
    }

    #[test]
    fn test_fully_excluded_volume_terminates() {
        let params = GrowthParams { max_endpoints: 5, ..GrowthParams::default() };
        let volume = EllipsoidSampler::from_crown(&CrownParams::default(), 3).unwrap();
        let mut sca = SpaceColonization::new(params, volume).unwrap().with_exclusion(|_| true);
        let stats = sca.iterate(100.0, 0.0);
        assert_eq!(stats.nodes, 1);
        assert_eq!(stats.alive_endpoints, 0);
    }

    #[test]
    fn test_points_out_of_range_stall() {
        let params = GrowthParams {
            internode_length: 1.0,
            influence_range: 2.0,
            max_endpoints: 5,
            ..GrowthParams::default()
        };
        let volume = TaperedEllipsoidSampler::ball(Vec3::new(0.0, 0.0, 50.0), 1.0, 4).unwrap();
        let mut sca = SpaceColonization::new(params, volume).unwrap();
        let stats = sca.iterate(0.0, 0.0);
        assert_eq!(stats.stop, StopReason::Stalled);
        assert_eq!(stats.nodes, 1);
        assert_eq!(stats.alive_endpoints, 5);
    }

    #[test]
    fn test_apex_filled_before_shoot() {
        // Lateral pulls cancel, so the root makes one proposal and it takes the apex slot.
        let points = vec![
            Vec3::new(0.0, 0.0, 3.0),
            Vec3::new(3.0, 0.0, 0.0),
            Vec3::new(-3.0, 0.0, 0.0),
        ];
        let params = GrowthParams {
            internode_length: 1.0,
            kill_distance: 0.5,
            influence_range: 10.0,
            max_endpoints: 3,
            max_iterations: 1,
            ..GrowthParams::default()
        };
        let mut sca = SpaceColonization::new(params, points.into_iter()).unwrap();
        sca.iterate(0.0, 0.0);
        let skeleton = sca.skeleton();
        assert_eq!(skeleton.len(), 2);
        assert_eq!(skeleton.node(0).apex, Some(1));
        assert_eq!(skeleton.node(0).shoot, None);
        assert_eq!(skeleton.node(1).generation, 1);
    }

    #[test]
    fn test_invalid_params_rejected_before_growth() {
        let params = GrowthParams { internode_length: -1.0, ..GrowthParams::default() };
        let volume = TaperedEllipsoidSampler::ball(Vec3::ZERO, 1.0, 0).unwrap();
        assert!(SpaceColonization::new(params, volume).is_err());
    }

    #[test]
    fn test_injection_adds_points() {
        let params = GrowthParams {
            max_iterations: 10,
            max_endpoints: 0,
            ..GrowthParams::default()
        };
        let volume = TaperedEllipsoidSampler::ball(Vec3::new(0.0, 0.0, 100.0), 1.0, 2).unwrap();
        let mut sca = SpaceColonization::new(params, volume).unwrap();
        let stats = sca.iterate(500.0, 0.0);
        assert_eq!(stats.stop, StopReason::MaxIterations);
        assert_eq!(stats.alive_endpoints, 5);
    }

    #[test]
    fn test_tropism_bends_growth_down() {
        let grow = |tropism: f32| {
            let params = GrowthParams {
                internode_length: 1.0,
                kill_distance: 0.5,
                influence_range: 20.0,
                max_endpoints: 1,
                max_iterations: 1,
                tropism,
                ..GrowthParams::default()
            };
            let points = vec![Vec3::new(10.0, 0.0, 0.0)];
            let mut sca = SpaceColonization::new(params, points.into_iter()).unwrap();
            sca.iterate(0.0, 0.0);
            assert_eq!(sca.skeleton().len(), 2);
            sca.skeleton().node(1).position
        };

        let level = grow(0.0);
        assert!((level - Vec3::X).length() < 1e-5);

        let bent = grow(0.5);
        assert!(bent.z < 0.0);
        assert!((bent - Vec3::new(2.0, 0.0, -1.0).normalize()).length() < 1e-5);
    }

    /// Grow one shoot from a root whose apex already points up +Z
    fn shoot_toward_side_point(apical_control: f32, apical_control_timing: u32) -> Vec3 {
        let params = GrowthParams {
            internode_length: 1.0,
            kill_distance: 0.5,
            influence_range: 10.0,
            max_endpoints: 1,
            max_iterations: 2,
            apical_control,
            apical_control_falloff: 1.0,
            apical_control_timing,
            ..GrowthParams::default()
        };
        let points = vec![Vec3::new(5.0, 0.0, 0.0)];
        let mut sca = SpaceColonization::new(params, points.into_iter()).unwrap();
        assert_eq!(sca.skeleton.attach(0, Vec3::Z, 1), Some(1));
        sca.step = 1;
        sca.iterate(0.0, 0.0);

        let shoot = sca.skeleton().node(0).shoot.expect("root should grow a shoot");
        sca.skeleton().node(shoot).position
    }

    #[test]
    fn test_apical_control_pulls_shoot_toward_axis() {
        let free = shoot_toward_side_point(0.0, 10);
        assert!((free - Vec3::X).length() < 1e-5);

        let controlled = shoot_toward_side_point(0.8, 10);
        let expected = Vec3::new(0.2, 0.0, 0.8).normalize();
        assert!((controlled - expected).length() < 1e-5);
        assert!(controlled.z > free.z);
    }

    #[test]
    fn test_apical_control_ends_at_timing() {
        // the root is generation 0, so a timing of 0 disables the apical term
        let late = shoot_toward_side_point(0.8, 0);
        assert!((late - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_time_budget_stops_growth() {
        let params = GrowthParams {
            max_endpoints: 2000,
            max_iterations: 10_000,
            influence_range: 40.0,
            ..GrowthParams::default()
        };
        let volume = EllipsoidSampler::from_crown(&CrownParams::default(), 5).unwrap();
        let mut sca = SpaceColonization::new(params, volume).unwrap();
        let stats = sca.iterate(0.0, 1e-9);
        assert_eq!(stats.stop, StopReason::TimeBudget);
        assert!(stats.steps < 10_000);
        assert!(sca.skeleton().is_well_formed());
    }

    #[test]
    fn test_finite_injection_volume_stalls() {
        let params = GrowthParams {
            internode_length: 1.0,
            influence_range: 2.0,
            max_endpoints: 0,
            max_iterations: 1000,
            ..GrowthParams::default()
        };
        let points = vec![
            Vec3::new(0.0, 0.0, 100.0),
            Vec3::new(1.0, 0.0, 100.0),
            Vec3::new(2.0, 0.0, 100.0),
        ];
        let mut sca = SpaceColonization::new(params, points.into_iter()).unwrap();
        let stats = sca.iterate(500.0, 0.0);
        assert_eq!(stats.stop, StopReason::Stalled);
        assert_eq!(stats.steps, 8);
        assert_eq!(stats.alive_endpoints, 3);
    }
}
