use crate::error::SpatialStatError;
use crate::knn_match::PointDict;
use crate::points::SpatialPoints;
use crate::spatial_grid::SpatialGrid;
use crate::utils::generate_minibatch_intervals;

use dashmap::DashMap;
use indicatif::ParallelProgressIterator;
use log::info;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use rayon::prelude::*;

/// How two observations become neighbours
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NeighborPolicy {
    /// every pair within Euclidean distance `R`
    Radius(f32),
    /// exact k nearest neighbours, ties broken by ascending index
    Knn(usize),
    /// k nearest neighbours through an HNSW index; fast for large
    /// data but ties and near-ties are not resolved exactly
    ApproxKnn(usize),
}

pub struct SpatialGraphArgs {
    pub policy: NeighborPolicy,
    pub block_size: usize,
    /// kNN policies: connect a pair only when each lists the other among
    /// its nearest neighbours (otherwise when either does)
    pub reciprocal: bool,
    /// seed of the HNSW index (`ApproxKnn` only)
    pub rseed: u64,
}

impl SpatialGraphArgs {
    pub fn new(policy: NeighborPolicy) -> Self {
        Self {
            policy,
            block_size: 1000,
            reciprocal: false,
            rseed: 42,
        }
    }

    /// Check the policy against the number of observations
    pub fn validate(&self, nn: usize) -> anyhow::Result<()> {
        match self.policy {
            NeighborPolicy::Radius(r) => {
                if !(r.is_finite() && r > 0.0) {
                    return Err(SpatialStatError::InvalidPolicy(format!(
                        "radius must be positive, but got {}",
                        r
                    ))
                    .into());
                }
            }
            NeighborPolicy::Knn(k) | NeighborPolicy::ApproxKnn(k) => {
                if k == 0 || k >= nn {
                    return Err(SpatialStatError::InvalidPolicy(format!(
                        "k must be in [1, {}), but got {}",
                        nn, k
                    ))
                    .into());
                }
            }
        }
        Ok(())
    }
}

/// Undirected spatial connectivity graph over `n_nodes` observations.
///
/// Each pair of neighbouring observations is stored once in `edges` as
/// `(i, j)` with `i < j`, in ascending order; `adjacency` holds both
/// directions with the Euclidean distance as the value.
#[derive(Debug, Clone)]
pub struct SpatialGraph {
    pub adjacency: CscMatrix<f32>,
    pub edges: Vec<(usize, usize)>,
    /// spatial distance of each edge (1 for precomputed edges)
    pub distances: Vec<f32>,
    pub n_nodes: usize,
}

impl SpatialGraph {
    /// Build a neighbour graph over `points`
    ///
    /// * `points` - spatial coordinates
    /// * `args` - neighbour policy and parallel block size
    pub fn build(points: &SpatialPoints, args: &SpatialGraphArgs) -> anyhow::Result<Self> {
        let nn = points.num_points();
        args.validate(nn)?;

        let edges = match args.policy {
            NeighborPolicy::Radius(r) => radius_edges(points, r, args.block_size)?,
            NeighborPolicy::Knn(k) => {
                let triplets = exact_knn_triplets(points, k, args.block_size);
                symmetrize(triplets, args.reciprocal)
            }
            NeighborPolicy::ApproxKnn(k) => {
                let triplets = approx_knn_triplets(points, k, args)?;
                symmetrize(triplets, args.reciprocal)
            }
        };

        info!("{} edges over {} nodes ({:?})", edges.len(), nn, args.policy);

        Ok(Self::from_canonical_edges(nn, edges))
    }

    /// Wrap a precomputed connectivity relation. Edges are made canonical
    /// `(min, max)` and deduplicated; every edge gets a unit distance.
    pub fn from_edges(n_nodes: usize, edges: &[(usize, usize)]) -> anyhow::Result<Self> {
        if n_nodes == 0 {
            return Err(SpatialStatError::EmptyObservations.into());
        }

        let mut canonical = Vec::with_capacity(edges.len());
        for &(i, j) in edges.iter() {
            if i == j || i >= n_nodes || j >= n_nodes {
                return Err(SpatialStatError::InvalidEdge(i, j, n_nodes).into());
            }
            canonical.push(((i.min(j), i.max(j)), 1.0));
        }

        canonical.sort_by_key(|&(ij, _)| ij);
        canonical.dedup_by_key(|x| x.0);

        Ok(Self::from_canonical_edges(n_nodes, canonical))
    }

    /// `edges` must be sorted `(i, j)` pairs with `i < j < nn`
    fn from_canonical_edges(nn: usize, edges: Vec<((usize, usize), f32)>) -> Self {
        let (pairs, distances): (Vec<_>, Vec<_>) = edges.into_iter().unzip();

        let mut coo = CooMatrix::new(nn, nn);
        for (&(i, j), &d_ij) in pairs.iter().zip(distances.iter()) {
            coo.push(i, j, d_ij);
            coo.push(j, i, d_ij);
        }

        SpatialGraph {
            adjacency: CscMatrix::from(&coo),
            edges: pairs,
            distances,
            n_nodes: nn,
        }
    }

    /// Observations adjacent to `node`, in ascending order
    pub fn neighbors(&self, node: usize) -> &[usize] {
        let lb = self.adjacency.col_offsets()[node];
        let ub = self.adjacency.col_offsets()[node + 1];
        &self.adjacency.row_indices()[lb..ub]
    }

    pub fn degree(&self, node: usize) -> usize {
        self.neighbors(node).len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.n_nodes
    }
}

fn radius_edges(
    points: &SpatialPoints,
    radius: f32,
    block_size: usize,
) -> anyhow::Result<Vec<((usize, usize), f32)>> {
    let nn = points.num_points();
    let grid = SpatialGrid::new(points, radius)?;
    info!("{} grid bins of width {}", grid.num_bins(), radius);

    let jobs = generate_minibatch_intervals(nn, block_size);
    let njobs = jobs.len() as u64;

    let mut edges = jobs
        .into_par_iter()
        .progress_count(njobs)
        .map(|(lb, ub)| {
            let mut local = vec![];
            for i in lb..ub {
                for (j, d_ij) in grid.within(points, i, radius) {
                    if i < j {
                        local.push(((i, j), d_ij));
                    }
                }
            }
            local
        })
        .flatten()
        .collect::<Vec<_>>();

    edges.par_sort_by_key(|&(ij, _)| ij);
    Ok(edges)
}

/// directed `i -> j` triplets for the exact k nearest neighbours of each i
fn exact_knn_triplets(
    points: &SpatialPoints,
    knn: usize,
    block_size: usize,
) -> DashMap<(usize, usize), f32> {
    let nn = points.num_points();
    let jobs = generate_minibatch_intervals(nn, block_size);
    let njobs = jobs.len() as u64;

    let triplets: DashMap<(usize, usize), f32> = DashMap::new();

    jobs.into_par_iter()
        .progress_count(njobs)
        .for_each(|(lb, ub)| {
            let mut cand: Vec<(f32, usize)> = Vec::with_capacity(nn);
            for i in lb..ub {
                cand.clear();
                cand.extend(
                    (0..nn)
                        .filter(|&j| j != i)
                        .map(|j| (points.sq_distance(i, j), j)),
                );
                let by_dist_then_index =
                    |a: &(f32, usize), b: &(f32, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
                cand.select_nth_unstable_by(knn - 1, by_dist_then_index);
                for &(d2, j) in cand[..knn].iter() {
                    triplets.insert((i, j), d2.sqrt());
                }
            }
        });

    info!("{} triplets by exact kNN matching", triplets.len());
    triplets
}

fn approx_knn_triplets(
    points: &SpatialPoints,
    knn: usize,
    args: &SpatialGraphArgs,
) -> anyhow::Result<DashMap<(usize, usize), f32>> {
    let nn = points.num_points();
    let dict = PointDict::from_points(points, args.rseed);

    let jobs = generate_minibatch_intervals(nn, args.block_size);
    let njobs = jobs.len() as u64;

    let triplets: DashMap<(usize, usize), f32> = DashMap::new();

    jobs.into_par_iter().progress_count(njobs).try_for_each(
        |(lb, ub)| -> anyhow::Result<()> {
            for i in lb..ub {
                let (indices, distances) = dict.search_others(i, knn)?;
                for (j, d_ij) in indices.into_iter().zip(distances) {
                    triplets.insert((i, j), d_ij);
                }
            }
            Ok(())
        },
    )?;

    info!("{} triplets by approximate kNN matching", triplets.len());
    Ok(triplets)
}

/// Merge directed `i -> j` matches into undirected edges.
///
/// A pair matched from both ends keeps the shorter of the two distances.
/// With `reciprocal`, pairs matched from one end only are dropped.
fn symmetrize(
    triplets: DashMap<(usize, usize), f32>,
    reciprocal: bool,
) -> Vec<((usize, usize), f32)> {
    let mut directed: Vec<((usize, usize), f32)> = triplets
        .into_par_iter()
        .map(|((i, j), d_ij)| ((i.min(j), i.max(j)), d_ij))
        .collect();

    directed.par_sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));

    // each pair shows up once or twice (i -> j, j -> i)
    let edges: Vec<((usize, usize), f32)> = directed
        .chunk_by(|a, b| a.0 == b.0)
        .filter(|matches| !reciprocal || matches.len() > 1)
        .map(|matches| matches[0])
        .collect();

    info!(
        "{} edges from {} directed matches ({})",
        edges.len(),
        directed.len(),
        if reciprocal { "reciprocal" } else { "union" }
    );
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_with_outlier() -> SpatialPoints {
        SpatialPoints::from_rows(&[
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 1.0],
            vec![10.0, 10.0],
        ])
        .unwrap()
    }

    fn policy_error(pts: &SpatialPoints, policy: NeighborPolicy) -> Option<SpatialStatError> {
        SpatialGraph::build(pts, &SpatialGraphArgs::new(policy))
            .err()
            .and_then(|e| e.downcast_ref::<SpatialStatError>().cloned())
    }

    #[test]
    fn invalid_policies() {
        let pts = square_with_outlier();
        for policy in [
            NeighborPolicy::Radius(0.0),
            NeighborPolicy::Radius(-1.0),
            NeighborPolicy::Radius(f32::NAN),
            NeighborPolicy::Knn(0),
            NeighborPolicy::Knn(5),
            NeighborPolicy::ApproxKnn(9),
        ] {
            assert!(
                matches!(
                    policy_error(&pts, policy),
                    Some(SpatialStatError::InvalidPolicy(_))
                ),
                "{:?} should be rejected",
                policy
            );
        }
    }

    #[test]
    fn radius_graph_edges() {
        let pts = square_with_outlier();
        let graph =
            SpatialGraph::build(&pts, &SpatialGraphArgs::new(NeighborPolicy::Radius(1.0))).unwrap();
        assert_eq!(graph.edges, vec![(0, 1), (0, 2), (1, 3), (2, 3)]);
        assert_eq!(graph.distances, vec![1.0; 4]);
        assert_eq!(graph.neighbors(0), &[1, 2]);
        assert_eq!(graph.degree(4), 0);
    }

    #[test]
    fn knn_ties_go_to_lower_index() {
        // point 0 is equidistant from 1, 2 and 3
        let pts = SpatialPoints::from_rows(&[
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![-1.0, 0.0],
        ])
        .unwrap();
        let triplets = exact_knn_triplets(&pts, 1, 2);
        assert!(triplets.contains_key(&(0, 1)));
        assert!(!triplets.contains_key(&(0, 2)));
        assert!(!triplets.contains_key(&(0, 3)));
    }

    #[test]
    fn merged_matches_keep_the_shorter_distance() {
        let triplets: DashMap<(usize, usize), f32> = DashMap::new();
        triplets.insert((0, 1), 2.0);
        triplets.insert((1, 0), 1.5);
        triplets.insert((2, 1), 3.0);

        let cloned = || triplets.clone();
        assert_eq!(symmetrize(cloned(), false), vec![((0, 1), 1.5), ((1, 2), 3.0)]);
        assert_eq!(symmetrize(cloned(), true), vec![((0, 1), 1.5)]);
    }

    #[test]
    fn knn_union_vs_reciprocal() {
        let pts = square_with_outlier();

        let mut args = SpatialGraphArgs::new(NeighborPolicy::Knn(1));
        args.block_size = 2;
        let union = SpatialGraph::build(&pts, &args).unwrap();
        // 0->1, 1->0, 2->0, 3->1, 4->3
        assert_eq!(union.edges, vec![(0, 1), (0, 2), (1, 3), (3, 4)]);

        args.reciprocal = true;
        let mutual = SpatialGraph::build(&pts, &args).unwrap();
        assert_eq!(mutual.edges, vec![(0, 1)]);
    }

    #[test]
    fn adjacency_is_symmetric() {
        let pts = square_with_outlier();
        let graph =
            SpatialGraph::build(&pts, &SpatialGraphArgs::new(NeighborPolicy::Knn(2))).unwrap();
        assert_eq!(graph.adjacency.nrows(), 5);
        for node in 0..graph.num_nodes() {
            for &other in graph.neighbors(node) {
                assert!(graph.neighbors(other).contains(&node));
            }
        }
    }

    #[test]
    fn precomputed_edges() {
        let graph = SpatialGraph::from_edges(4, &[(1, 0), (0, 1), (2, 3)]).unwrap();
        assert_eq!(graph.edges, vec![(0, 1), (2, 3)]);
        assert_eq!(graph.num_edges(), 2);

        let err = SpatialGraph::from_edges(4, &[(1, 1)]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<SpatialStatError>(),
            Some(&SpatialStatError::InvalidEdge(1, 1, 4))
        );
        assert!(SpatialGraph::from_edges(4, &[(0, 4)]).is_err());
    }
}
