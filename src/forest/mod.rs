//! Forest placement driver: places instances, then grows them one by one

pub mod config;
pub mod driver;
pub mod exclusion;
pub mod report;

pub use config::{ForestConfig, TreeTemplate};
pub use driver::{Forest, ForestGenerator, GrownTree, TreeOutcome, TreeSlot};
pub use exclusion::ExclusionSet;
pub use report::{ForestReport, TreeReport};
