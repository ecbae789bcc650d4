//! Procedural tree growth: space colonization, skeletons and skinning

pub mod colonization;
pub mod params;
pub mod sampler;
pub mod skeleton;
pub mod skin;

pub use colonization::{IterationStats, SpaceColonization, StopReason};
pub use params::{CrownParams, GrowthParams, TaperParams};
pub use sampler::{EllipsoidSampler, HaltonSampler, TaperedEllipsoidSampler};
pub use skeleton::{BranchNode, ChildRole, LeafEmitter, RadiusProfile, Skeleton};
pub use skin::{NativeSkinner, Skinner};
