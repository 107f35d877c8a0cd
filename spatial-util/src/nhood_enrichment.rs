use crate::error::SpatialStatError;
use crate::labels::CategoricalLabels;
use crate::spatial_graph::SpatialGraph;
use crate::utils::stream_seed;

use indicatif::ParallelProgressIterator;
use log::info;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;

pub struct NhoodEnrichmentArgs {
    pub n_permutations: usize,
    pub rseed: u64,
}

impl Default for NhoodEnrichmentArgs {
    fn default() -> Self {
        Self {
            n_permutations: 1000,
            rseed: 42,
        }
    }
}

/// Label-pair adjacency counts and their permutation statistics.
/// All matrices are indexed `[[a, b]]` and symmetric.
#[derive(Debug, Clone, Serialize)]
pub struct NhoodEnrichment {
    pub label_names: Vec<Box<str>>,
    pub n_permutations: usize,
    /// observed number of edges between labels `a` and `b`
    pub counts: Array2<u64>,
    /// `(observed - mean) / sd`; NaN where the permutation sd is zero
    pub zscores: Array2<f64>,
    pub perm_mean: Array2<f64>,
    /// sample standard deviation (n - 1 denominator)
    pub perm_sd: Array2<f64>,
    /// `(#{permuted >= observed} + 1) / (n + 1)`
    pub pvalue_enriched: Array2<f64>,
    /// `(#{permuted <= observed} + 1) / (n + 1)`
    pub pvalue_depleted: Array2<f64>,
}

impl NhoodEnrichment {
    pub fn label_index(&self, name: &str) -> Option<usize> {
        self.label_names.iter().position(|x| x.as_ref() == name)
    }

    pub fn count(&self, a: usize, b: usize) -> u64 {
        self.counts[[a, b]]
    }

    pub fn zscore(&self, a: usize, b: usize) -> f64 {
        self.zscores[[a, b]]
    }
}

/// Count edges by the unordered pair of endpoint labels. Same-label
/// edges are counted once on the diagonal; cross-label edges appear in
/// both `[[a, b]]` and `[[b, a]]`.
pub fn count_label_pairs(edges: &[(usize, usize)], codes: &[usize], nlabels: usize) -> Array2<u64> {
    let mut ret = Array2::<u64>::zeros((nlabels, nlabels));
    for &(i, j) in edges.iter() {
        let (a, b) = (codes[i], codes[j]);
        ret[[a, b]] += 1;
        if a != b {
            ret[[b, a]] += 1;
        }
    }
    ret
}

/// Running integer tallies over permutation trials; merging two is
/// exact and order-free, so results do not depend on scheduling.
struct PermTally {
    sum: Array2<u64>,
    sum_sq: Array2<u128>,
    n_ge: Array2<u64>,
    n_le: Array2<u64>,
}

impl PermTally {
    fn zeros(nlabels: usize) -> Self {
        Self {
            sum: Array2::zeros((nlabels, nlabels)),
            sum_sq: Array2::zeros((nlabels, nlabels)),
            n_ge: Array2::zeros((nlabels, nlabels)),
            n_le: Array2::zeros((nlabels, nlabels)),
        }
    }

    fn add_trial(mut self, perm: &Array2<u64>, observed: &Array2<u64>) -> Self {
        ndarray::Zip::from(&mut self.sum)
            .and(&mut self.sum_sq)
            .and(perm)
            .for_each(|s, ss, &x| {
                *s += x;
                *ss += u128::from(x) * u128::from(x);
            });
        ndarray::Zip::from(&mut self.n_ge)
            .and(&mut self.n_le)
            .and(perm)
            .and(observed)
            .for_each(|ge, le, &x, &obs| {
                *ge += (x >= obs) as u64;
                *le += (x <= obs) as u64;
            });
        self
    }

    fn merge(mut self, other: Self) -> Self {
        self.sum += &other.sum;
        self.sum_sq += &other.sum_sq;
        self.n_ge += &other.n_ge;
        self.n_le += &other.n_le;
        self
    }
}

/// Neighbourhood enrichment test
///
/// * `graph` - connectivity relation (read only)
/// * `labels` - one label per node
/// * `args` - number of permutations and random seed
///
/// Each trial shuffles the label vector over the fixed nodes with its
/// own generator seeded by `(rseed, trial)`.
pub fn nhood_enrichment(
    graph: &SpatialGraph,
    labels: &CategoricalLabels,
    args: &NhoodEnrichmentArgs,
) -> anyhow::Result<NhoodEnrichment> {
    if args.n_permutations < 1 {
        return Err(SpatialStatError::InvalidPermutationCount(args.n_permutations).into());
    }
    labels.check_len(graph.num_nodes())?;
    if graph.num_edges() == 0 {
        return Err(SpatialStatError::EmptyGraph.into());
    }

    let nlabels = labels.num_categories();
    let codes = labels.codes();
    let edges = &graph.edges;
    let nperm = args.n_permutations;

    let counts = count_label_pairs(edges, codes, nlabels);

    info!(
        "{} edges, {} labels, {} permutations",
        edges.len(),
        nlabels,
        nperm
    );

    let tally = (0..nperm)
        .into_par_iter()
        .progress_count(nperm as u64)
        .fold(
            || PermTally::zeros(nlabels),
            |tally, trial| {
                let mut rng = StdRng::seed_from_u64(stream_seed(args.rseed, trial as u64));
                let mut shuffled = codes.to_vec();
                shuffled.shuffle(&mut rng);
                let perm = count_label_pairs(edges, &shuffled, nlabels);
                tally.add_trial(&perm, &counts)
            },
        )
        .reduce(|| PermTally::zeros(nlabels), PermTally::merge);

    let n = nperm as f64;

    let perm_mean = tally.sum.mapv(|s| s as f64 / n);

    // unbiased variance from exact integer sums:
    // (n Σx² - (Σx)²) / (n (n - 1))
    let perm_sd = ndarray::Zip::from(&tally.sum)
        .and(&tally.sum_sq)
        .map_collect(|&s, &ss| {
            if nperm < 2 {
                return f64::NAN;
            }
            let num = nperm as i128 * ss as i128 - (s as i128) * (s as i128);
            (num.max(0) as f64 / (n * (n - 1.0))).sqrt()
        });

    let zscores = ndarray::Zip::from(&counts)
        .and(&perm_mean)
        .and(&perm_sd)
        .map_collect(|&obs, &mu, &sd| {
            if sd > 0.0 {
                (obs as f64 - mu) / sd
            } else {
                f64::NAN
            }
        });

    let pvalue_enriched = tally.n_ge.mapv(|x| (x as f64 + 1.0) / (n + 1.0));
    let pvalue_depleted = tally.n_le.mapv(|x| (x as f64 + 1.0) / (n + 1.0));

    Ok(NhoodEnrichment {
        label_names: labels.names().to_vec(),
        n_permutations: nperm,
        counts,
        zscores,
        perm_mean,
        perm_sd,
        pvalue_enriched,
        pvalue_depleted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn path_graph() -> (SpatialGraph, CategoricalLabels) {
        // A - A - B - B
        let graph = SpatialGraph::from_edges(4, &[(0, 1), (1, 2), (2, 3)]).unwrap();
        let labels = CategoricalLabels::from_names(&["A", "A", "B", "B"]).unwrap();
        (graph, labels)
    }

    fn enrichment_error(
        graph: &SpatialGraph,
        labels: &CategoricalLabels,
        n_permutations: usize,
    ) -> Option<SpatialStatError> {
        let args = NhoodEnrichmentArgs {
            n_permutations,
            rseed: 1,
        };
        nhood_enrichment(graph, labels, &args)
            .err()
            .and_then(|e| e.downcast_ref::<SpatialStatError>().cloned())
    }

    #[test]
    fn label_pair_counts() {
        let (graph, labels) = path_graph();
        let counts = count_label_pairs(&graph.edges, labels.codes(), 2);
        assert_eq!(counts, ndarray::array![[1u64, 1], [1, 1]]);
    }

    #[test]
    fn validation_errors() {
        let (graph, labels) = path_graph();
        assert_eq!(
            enrichment_error(&graph, &labels, 0),
            Some(SpatialStatError::InvalidPermutationCount(0))
        );

        let empty = SpatialGraph::from_edges(4, &[]).unwrap();
        assert_eq!(
            enrichment_error(&empty, &labels, 10),
            Some(SpatialStatError::EmptyGraph)
        );

        let short = CategoricalLabels::from_names(&["A", "B"]).unwrap();
        assert_eq!(
            enrichment_error(&graph, &short, 10),
            Some(SpatialStatError::LengthMismatch {
                points: 4,
                labels: 2
            })
        );
    }

    #[test]
    fn single_permutation_has_undefined_zscores() {
        let (graph, labels) = path_graph();
        let args = NhoodEnrichmentArgs {
            n_permutations: 1,
            rseed: 7,
        };
        let out = nhood_enrichment(&graph, &labels, &args).unwrap();
        assert!(out.zscores.iter().all(|z| z.is_nan()));
        assert!(out.perm_sd.iter().all(|z| z.is_nan()));
    }

    #[test]
    fn permutation_moments_are_consistent() {
        let (graph, labels) = path_graph();
        let args = NhoodEnrichmentArgs {
            n_permutations: 500,
            rseed: 3,
        };
        let out = nhood_enrichment(&graph, &labels, &args).unwrap();

        // every permutation keeps 3 edges: Σ over the upper triangle is 3
        let upper_mean = out.perm_mean[[0, 0]] + out.perm_mean[[0, 1]] + out.perm_mean[[1, 1]];
        assert_abs_diff_eq!(upper_mean, 3.0, epsilon = 1e-9);

        for a in 0..2 {
            for b in 0..2 {
                assert_eq!(out.count(a, b), out.count(b, a));
                assert!(out.pvalue_enriched[[a, b]] > 0.0);
                assert!(out.pvalue_enriched[[a, b]] <= 1.0);
            }
        }
    }

    #[test]
    fn squared_tallies_hold_large_counts() {
        // 5e9 squared does not fit into u64
        let big = 5_000_000_000_u64;
        let perm = Array2::from_elem((1, 1), big);
        let observed = Array2::from_elem((1, 1), big);

        let tally = PermTally::zeros(1)
            .add_trial(&perm, &observed)
            .merge(PermTally::zeros(1).add_trial(&perm, &observed));

        assert_eq!(tally.sum[[0, 0]], 2 * big);
        assert_eq!(tally.sum_sq[[0, 0]], 2 * u128::from(big) * u128::from(big));
        assert_eq!(tally.n_ge[[0, 0]], 2);
        assert_eq!(tally.n_le[[0, 0]], 2);
    }
}
