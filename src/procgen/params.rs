//! Parameters for space colonization growth, crown volumes and branch tapering

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Upper bound for apical control weight
pub const MAX_APICAL_CONTROL: f32 = 0.8;

/// Parameters for one space colonization run
///
/// `kill_distance` and `influence_range` are measured in internode lengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthParams {
    /// Hard step budget
    #[serde(alias = "maxIterations")]
    pub max_iterations: u32,
    /// Attraction points drawn before the first step
    #[serde(alias = "numberOfEndpoints")]
    pub max_endpoints: usize,
    /// Distance between a node and its new child
    #[serde(alias = "interNodeLength")]
    pub internode_length: f32,
    /// Points closer than this to a node are claimed
    #[serde(alias = "killDistance")]
    pub kill_distance: f32,
    /// Points farther than this from every node exert no pull
    #[serde(alias = "influenceRange")]
    pub influence_range: f32,
    /// Signed bend strength; positive values bend growth downward
    pub tropism: f32,
    /// Seed for the crown sampler
    #[serde(alias = "randomSeed")]
    pub seed: u64,
    /// Weight of the continuation direction, in `[0, 0.8]`
    #[serde(alias = "apicalcontrol")]
    pub apical_control: f32,
    /// Per-generation multiplier on `apical_control`
    #[serde(alias = "apicalcontrolfalloff")]
    pub apical_control_falloff: f32,
    /// Generations from which apical control no longer applies
    #[serde(alias = "apicalcontroltiming")]
    pub apical_control_timing: u32,
    /// Extra attraction points per 1000 steps
    #[serde(alias = "newEndPointsPer1000")]
    pub new_endpoints_per_1000: f32,
    /// Soft wall-clock budget in seconds, 0 = unlimited
    #[serde(alias = "maxTime")]
    pub max_time: f32,
    /// Nodes with a lower generation are removed after growth
    #[serde(alias = "pruningGen")]
    pub prune_generation: u32,
}

impl Default for GrowthParams {
    fn default() -> Self {
        Self {
            max_iterations: 40,
            max_endpoints: 100,
            internode_length: 0.25,
            kill_distance: 0.1,
            influence_range: 15.0,
            tropism: 0.0,
            seed: 0,
            apical_control: 0.0,
            apical_control_falloff: 1.0,
            apical_control_timing: 10,
            new_endpoints_per_1000: 0.0,
            max_time: 0.0,
            prune_generation: 0,
        }
    }
}

impl GrowthParams {
    /// Reject parameter combinations that cannot produce a valid run
    pub fn validate(&self) -> Result<()> {
        if !(self.internode_length.is_finite() && self.internode_length > 0.0) {
            return Err(Error::invalid(format!(
                "internode_length must be positive, got {}",
                self.internode_length
            )));
        }
        if !(self.kill_distance.is_finite() && self.kill_distance >= 0.0) {
            return Err(Error::invalid(format!(
                "kill_distance must be non-negative, got {}",
                self.kill_distance
            )));
        }
        if !(self.influence_range.is_finite() && self.influence_range > 0.0) {
            return Err(Error::invalid(format!(
                "influence_range must be positive, got {}",
                self.influence_range
            )));
        }
        if !self.tropism.is_finite() {
            return Err(Error::invalid("tropism must be finite"));
        }
        if !(0.0..=MAX_APICAL_CONTROL).contains(&self.apical_control) {
            return Err(Error::invalid(format!(
                "apical_control must lie in [0, {}], got {}",
                MAX_APICAL_CONTROL, self.apical_control
            )));
        }
        if !(self.apical_control_falloff.is_finite() && self.apical_control_falloff >= 0.0) {
            return Err(Error::invalid(format!(
                "apical_control_falloff must be non-negative, got {}",
                self.apical_control_falloff
            )));
        }
        if !(self.new_endpoints_per_1000.is_finite() && self.new_endpoints_per_1000 >= 0.0) {
            return Err(Error::invalid(format!(
                "new_endpoints_per_1000 must be non-negative, got {}",
                self.new_endpoints_per_1000
            )));
        }
        if self.max_time.is_nan() {
            return Err(Error::invalid("max_time must be a number"));
        }
        Ok(())
    }

    /// Kill radius in world units
    pub fn kill_radius(&self) -> f32 {
        self.kill_distance * self.internode_length
    }

    /// Influence radius in world units
    pub fn influence_radius(&self) -> f32 {
        self.influence_range * self.internode_length
    }
}

/// Ellipsoidal crown used when a tree is grown without a voxel crown volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrownParams {
    /// Vertical radius
    #[serde(alias = "crownSize")]
    pub size: f32,
    /// Horizontal radius as a multiple of `size`
    #[serde(alias = "crownShape")]
    pub shape: f32,
    /// Gap between the root and the bottom of the crown
    #[serde(alias = "crownOffset")]
    pub offset: f32,
    /// Values above 1 push points toward the crown surface
    #[serde(alias = "surfaceBias")]
    pub surface_bias: f32,
    /// Values above 1 push points toward the crown top
    #[serde(alias = "topBias")]
    pub top_bias: f32,
}

impl Default for CrownParams {
    fn default() -> Self {
        Self {
            size: 5.0,
            shape: 1.0,
            offset: 3.0,
            surface_bias: 1.0,
            top_bias: 1.0,
        }
    }
}

/// Branch radius as `connections^power * scale`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaperParams {
    pub power: f32,
    pub scale: f32,
}

impl Default for TaperParams {
    fn default() -> Self {
        Self {
            power: 0.3,
            scale: 0.01,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_are_valid() {
        assert!(GrowthParams::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_internode_length() {
        let mut params = GrowthParams::default();
        params.internode_length = 0.0;
        assert!(matches!(params.validate(), Err(Error::InvalidParameter(_))));
        params.internode_length = -1.0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_apical_control() {
        let mut params = GrowthParams::default();
        params.apical_control = 0.9;
        assert!(params.validate().is_err());
        params.apical_control = 0.8;
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_radii_scale_with_internode_length() {
        let params = GrowthParams {
            internode_length: 0.5,
            kill_distance: 2.0,
            influence_range: 10.0,
            ..GrowthParams::default()
        };
        assert_eq!(params.kill_radius(), 1.0);
        assert_eq!(params.influence_radius(), 5.0);
    }

    #[test]
    fn test_deserialize_accepts_operator_keys() {
        let params: GrowthParams = serde_json::from_str(
            r#"{ "interNodeLength": 0.5, "killDistance": 0.2, "maxIterations": 12, "apicalcontrol": 0.3 }"#,
        )
        .unwrap();
        assert_eq!(params.internode_length, 0.5);
        assert_eq!(params.kill_distance, 0.2);
        assert_eq!(params.max_iterations, 12);
        assert_eq!(params.apical_control, 0.3);
        assert_eq!(params.max_endpoints, 100);
    }
}
