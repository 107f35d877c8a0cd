pub mod co_occurrence; // label co-occurrence across radius intervals
pub mod common_io; // gzip-aware readers and writers
pub mod error; // typed validation errors
pub mod interaction_matrix; // label-pair edge counts
pub mod knn_match; // approximate nearest neighbours (HNSW)
pub mod labels; // categorical labels
pub mod nhood_enrichment; // permutation test over the neighbour graph
pub mod points; // spatial coordinates
pub mod radius_schedule; // distance thresholds
pub mod spatial_graph; // radius / kNN neighbour graph
pub mod spatial_grid; // uniform grid binning for range queries
pub mod utils;

pub use error::SpatialStatError;

pub type Mat = nalgebra::DMatrix<f32>;
