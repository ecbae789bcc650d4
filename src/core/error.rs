//! Error types for forest generation

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Skeleton has {nodes} node(s), at least 2 are required")]
    EmptySkeleton { nodes: usize },

    #[error("No free site for slot {slot} (template {template}) after {attempts} attempts")]
    PlacementExhausted {
        slot: usize,
        template: usize,
        attempts: u32,
    },

    #[error("Skeleton has no root node to start the trunk search from")]
    MissingTrunkTip,

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build an `InvalidParameter` error
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidParameter(msg.into())
    }
}
