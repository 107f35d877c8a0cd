/// Input validation failures.
///
/// Every routine in this crate returns `anyhow::Result`; these errors
/// are raised before any computation starts and can be recovered by
/// `err.downcast_ref::<SpatialStatError>()`.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SpatialStatError {
    #[error("invalid neighbour policy: {0}")]
    InvalidPolicy(String),

    #[error("observation {index} has {found} coordinates, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("invalid radius schedule: {0}")]
    InvalidRadiusSchedule(String),

    #[error("no labels found")]
    EmptyLabelSet,

    #[error("number of permutations must be at least 1, but got {0}")]
    InvalidPermutationCount(usize),

    #[error("the connectivity graph has no edges")]
    EmptyGraph,

    #[error("empty observation set")]
    EmptyObservations,

    #[error("{points} observations vs. {labels} labels")]
    LengthMismatch { points: usize, labels: usize },

    #[error("invalid edge ({0}, {1}) in a graph of {2} nodes")]
    InvalidEdge(usize, usize, usize),
}
