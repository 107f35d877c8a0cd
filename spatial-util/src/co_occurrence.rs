//! Co-occurrence of cluster labels across distance intervals.
//!
//! For anchor label `a`, neighbour label `b` and interval `k`:
//!
//! ```text
//! score(a, b, k) = p(b | a, k) / p(b)
//! p(b | a, k)    = joint(a, b, k) / Σ_c joint(a, c, k)
//! p(b)           = n_b / (N - 1)
//! ```
//!
//! where `joint(a, b, k)` counts ordered pairs `(i, j)`, `i != j`, with
//! `label(i) = a`, `label(j) = b` and `d(i, j)` in interval `k`.
//!
//! A score is NaN when either denominator is zero; a zero joint count
//! with valid denominators scores exactly 0.

use crate::labels::CategoricalLabels;
use crate::points::SpatialPoints;
use crate::radius_schedule::RadiusSchedule;
use crate::spatial_grid::SpatialGrid;
use crate::utils::generate_minibatch_intervals;

use indicatif::ParallelProgressIterator;
use log::info;
use ndarray::{s, Array2, Array3, ArrayView2};
use rayon::prelude::*;
use serde::Serialize;

pub struct CoOccurrenceArgs {
    /// number of anchor observations per parallel job
    pub block_size: usize,
}

impl Default for CoOccurrenceArgs {
    fn default() -> Self {
        Self { block_size: 1000 }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CoOccurrence {
    pub label_names: Vec<Box<str>>,
    pub schedule: RadiusSchedule,
    /// `scores[[a, b, k]]`
    pub scores: Array3<f64>,
    /// `joint_counts[[a, b, k]]`
    pub joint_counts: Array3<u64>,
    /// `anchor_totals[[a, k]]`: all neighbours of anchors labelled `a`
    /// falling into interval `k`
    pub anchor_totals: Array2<u64>,
    /// number of observations per label
    pub label_counts: Vec<usize>,
}

impl CoOccurrence {
    pub fn num_labels(&self) -> usize {
        self.label_names.len()
    }

    pub fn num_intervals(&self) -> usize {
        self.schedule.num_intervals()
    }

    pub fn label_index(&self, name: &str) -> Option<usize> {
        self.label_names.iter().position(|x| x.as_ref() == name)
    }

    pub fn score(&self, a: usize, b: usize, k: usize) -> f64 {
        self.scores[[a, b, k]]
    }

    pub fn joint_count(&self, a: usize, b: usize, k: usize) -> u64 {
        self.joint_counts[[a, b, k]]
    }

    pub fn anchor_total(&self, a: usize, k: usize) -> u64 {
        self.anchor_totals[[a, k]]
    }

    /// `(neighbour label x interval)` scores for one anchor label
    pub fn scores_for_anchor(&self, name: &str) -> Option<ArrayView2<'_, f64>> {
        self.label_index(name)
            .map(|a| self.scores.slice(s![a, .., ..]))
    }
}

/// Compute co-occurrence scores
///
/// * `points` - spatial coordinates
/// * `labels` - one label per observation
/// * `schedule` - distance interval boundaries
/// * `args` - parallel block size
///
pub fn co_occurrence(
    points: &SpatialPoints,
    labels: &CategoricalLabels,
    schedule: &RadiusSchedule,
    args: &CoOccurrenceArgs,
) -> anyhow::Result<CoOccurrence> {
    let nn = points.num_points();
    labels.check_len(nn)?;

    let nlabels = labels.num_categories();
    let nk = schedule.num_intervals();
    let rmax = schedule.max_radius();
    let codes = labels.codes();

    info!(
        "co-occurrence of {} labels over {} intervals up to {}",
        nlabels, nk, rmax
    );

    let grid = SpatialGrid::new(points, rmax)?;

    ////////////////////////////////////////////////
    // step 1: count labelled pairs per interval  //
    ////////////////////////////////////////////////

    let jobs = generate_minibatch_intervals(nn, args.block_size);
    let njobs = jobs.len() as u64;

    let joint_counts = jobs
        .into_par_iter()
        .progress_count(njobs)
        .map(|(lb, ub)| {
            let mut local = Array3::<u64>::zeros((nlabels, nlabels, nk));
            for i in lb..ub {
                let a = codes[i];
                for (j, d_ij) in grid.within(points, i, rmax) {
                    if let Some(k) = schedule.interval_of(d_ij) {
                        local[[a, codes[j], k]] += 1;
                    }
                }
            }
            local
        })
        .reduce(
            || Array3::<u64>::zeros((nlabels, nlabels, nk)),
            |mut acc, x| {
                acc += &x;
                acc
            },
        );

    ////////////////////////////////////////////////
    // step 2: conditional over marginal ratios   //
    ////////////////////////////////////////////////

    let anchor_totals = Array2::from_shape_fn((nlabels, nk), |(a, k)| {
        joint_counts.slice(s![a, .., k]).sum()
    });

    let label_counts = labels.counts();
    let n_others = nn.saturating_sub(1);

    let scores = Array3::from_shape_fn((nlabels, nlabels, nk), |(a, b, k)| {
        let total = anchor_totals[[a, k]];
        let n_b = label_counts[b];
        if total == 0 || n_others == 0 || n_b == 0 {
            f64::NAN
        } else {
            // (joint / total) / (n_b / n_others)
            (joint_counts[[a, b, k]] as f64 * n_others as f64) / (total as f64 * n_b as f64)
        }
    });

    info!("{} labelled pairs within {}", joint_counts.sum(), rmax);

    Ok(CoOccurrence {
        label_names: labels.names().to_vec(),
        schedule: schedule.clone(),
        scores,
        joint_counts,
        anchor_totals,
        label_counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn four_points() -> (SpatialPoints, CategoricalLabels) {
        let pts = SpatialPoints::from_rows(&[
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![10.0, 10.0],
        ])
        .unwrap();
        let labels = CategoricalLabels::from_names(&["A", "A", "B", "B"]).unwrap();
        (pts, labels)
    }

    #[test]
    fn four_point_scenario() {
        let (pts, labels) = four_points();
        let sched = RadiusSchedule::new(vec![1.5]).unwrap();
        let co = co_occurrence(&pts, &labels, &sched, &CoOccurrenceArgs::default()).unwrap();

        let a = co.label_index("A").unwrap();
        let b = co.label_index("B").unwrap();

        // anchor (0,0) sees (1,0)A and (0,1)B; anchor (1,0) sees (0,0)A and (0,1)B
        assert_eq!(co.joint_count(a, b, 0), 2);
        assert_eq!(co.joint_count(a, a, 0), 2);
        assert_eq!(co.anchor_total(a, 0), 4);
        // (0,1) sees both A points; (10,10) sees nothing
        assert_eq!(co.joint_count(b, a, 0), 2);
        assert_eq!(co.joint_count(b, b, 0), 0);
        assert_eq!(co.anchor_total(b, 0), 2);

        // p(B|A) = 2/4, p(B) = 2/3
        assert_abs_diff_eq!(co.score(a, b, 0), 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(co.score(a, a, 0), 0.75, epsilon = 1e-12);
        // p(A|B) = 2/2, p(A) = 2/3
        assert_abs_diff_eq!(co.score(b, a, 0), 1.5, epsilon = 1e-12);
        assert_eq!(co.score(b, b, 0), 0.0);
    }

    #[test]
    fn empty_interval_is_nan() {
        let (pts, labels) = four_points();
        let sched = RadiusSchedule::new(vec![1.5, 5.0]).unwrap();
        let co = co_occurrence(&pts, &labels, &sched, &CoOccurrenceArgs::default()).unwrap();
        assert_eq!(co.num_intervals(), 2);
        // nothing lies in (1.5, 5.0]
        for a in 0..2 {
            assert_eq!(co.anchor_total(a, 1), 0);
            for b in 0..2 {
                assert!(co.score(a, b, 1).is_nan());
            }
        }
    }

    #[test]
    fn single_observation_is_nan() {
        let pts = SpatialPoints::from_rows(&[vec![0.0, 0.0]]).unwrap();
        let labels = CategoricalLabels::from_names(&["A"]).unwrap();
        let sched = RadiusSchedule::new(vec![1.0]).unwrap();
        let co = co_occurrence(&pts, &labels, &sched, &CoOccurrenceArgs::default()).unwrap();
        assert!(co.score(0, 0, 0).is_nan());
    }

    #[test]
    fn label_length_mismatch() {
        let (pts, _) = four_points();
        let labels = CategoricalLabels::from_names(&["A", "B"]).unwrap();
        let sched = RadiusSchedule::new(vec![1.0]).unwrap();
        assert!(co_occurrence(&pts, &labels, &sched, &CoOccurrenceArgs::default()).is_err());
    }

    #[test]
    fn scores_for_anchor_view() {
        let (pts, labels) = four_points();
        let sched = RadiusSchedule::new(vec![1.5]).unwrap();
        let co = co_occurrence(&pts, &labels, &sched, &CoOccurrenceArgs::default()).unwrap();
        let view = co.scores_for_anchor("B").unwrap();
        assert_eq!(view.dim(), (2, 1));
        assert!(co.scores_for_anchor("C").is_none());
    }
}
