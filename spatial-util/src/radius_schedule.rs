use crate::error::SpatialStatError;
use crate::points::SpatialPoints;
use serde::Serialize;

/// Strictly increasing positive distance thresholds `r_1 < ... < r_K`.
///
/// Interval `k` (0-based) covers `(r_{k-1}, r_k]` with `r_0 = 0`; the
/// first interval also includes zero so that coincident observations
/// fall into it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadiusSchedule {
    thresholds: Vec<f32>,
}

impl RadiusSchedule {
    pub fn new(thresholds: Vec<f32>) -> anyhow::Result<Self> {
        if thresholds.is_empty() {
            return Err(SpatialStatError::InvalidRadiusSchedule("no thresholds".into()).into());
        }

        if let Some(r) = thresholds.iter().find(|r| !(r.is_finite() && **r > 0.0)) {
            return Err(SpatialStatError::InvalidRadiusSchedule(format!(
                "threshold {} is not a positive finite number",
                r
            ))
            .into());
        }

        if let Some(w) = thresholds.windows(2).find(|w| w[0] >= w[1]) {
            return Err(SpatialStatError::InvalidRadiusSchedule(format!(
                "thresholds must be strictly increasing, but {} >= {}",
                w[0], w[1]
            ))
            .into());
        }

        Ok(Self { thresholds })
    }

    /// `n` evenly spaced thresholds from `min` to `max` (inclusive).
    ///
    /// Steps finer than the `f32` resolution around `max` collapse onto
    /// the same value; those duplicates are dropped, so the schedule may
    /// hold fewer than `n` thresholds.
    pub fn linspace(min: f32, max: f32, n: usize) -> anyhow::Result<Self> {
        if n == 0 {
            return Err(SpatialStatError::InvalidRadiusSchedule("no thresholds".into()).into());
        }
        if n == 1 {
            return Self::new(vec![max]);
        }
        if !(min < max) {
            return Err(SpatialStatError::InvalidRadiusSchedule(format!(
                "linspace needs min < max, but got [{}, {}]",
                min, max
            ))
            .into());
        }

        let step = (max - min) / (n - 1) as f32;
        let mut thresholds: Vec<f32> = Vec::with_capacity(n);
        for k in 0..(n - 1) {
            let r = min + step * k as f32;
            if r >= max {
                break;
            }
            match thresholds.last() {
                Some(&prev) if r <= prev => {}
                _ => thresholds.push(r),
            }
        }
        thresholds.push(max);
        Self::new(thresholds)
    }

    /// A schedule spanning the extent of the observations.
    ///
    /// The upper bound is half the distance between the points with the
    /// smallest and largest coordinate sums (a corner-to-corner scale);
    /// the lower bound is the distance between the two points with the
    /// smallest coordinate sums. A degenerate lower bound falls back to
    /// `max / n`.
    pub fn from_extent(points: &SpatialPoints, n: usize) -> anyhow::Result<Self> {
        if points.num_points() < 2 {
            return Err(SpatialStatError::InvalidRadiusSchedule(
                "need at least two observations to span a schedule".into(),
            )
            .into());
        }

        let coord_sum: Vec<f32> = (0..points.num_points())
            .map(|i| points.point(i).sum())
            .collect();

        let mut order = (0..coord_sum.len()).collect::<Vec<_>>();
        order.sort_by(|&a, &b| coord_sum[a].total_cmp(&coord_sum[b]).then(a.cmp(&b)));

        let (lo1, lo2) = (order[0], order[1]);
        let hi = order[order.len() - 1];

        let max = points.distance(lo1, hi) / 2.0;
        if !(max > 0.0) {
            return Err(SpatialStatError::InvalidRadiusSchedule(
                "observations have no spatial extent".into(),
            )
            .into());
        }

        let mut min = points.distance(lo1, lo2);
        if !(min > 0.0 && min < max) {
            min = max / n.max(1) as f32;
        }

        Self::linspace(min, max, n)
    }

    pub fn thresholds(&self) -> &[f32] {
        &self.thresholds
    }

    pub fn num_intervals(&self) -> usize {
        self.thresholds.len()
    }

    /// r_K
    pub fn max_radius(&self) -> f32 {
        self.thresholds[self.thresholds.len() - 1]
    }

    /// `(lower, upper)` bounds of the k-th interval
    pub fn interval(&self, k: usize) -> (f32, f32) {
        let lb = if k == 0 { 0.0 } else { self.thresholds[k - 1] };
        (lb, self.thresholds[k])
    }

    /// Index of the interval containing `distance`, if within `r_K`
    pub fn interval_of(&self, distance: f32) -> Option<usize> {
        let k = self.thresholds.partition_point(|&r| r < distance);
        (k < self.thresholds.len()).then_some(k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule_error(thresholds: Vec<f32>) -> Option<SpatialStatError> {
        RadiusSchedule::new(thresholds)
            .err()
            .and_then(|e| e.downcast_ref::<SpatialStatError>().cloned())
    }

    #[test]
    fn invalid_schedules() {
        for bad in [vec![], vec![0.0, 1.0], vec![-1.0], vec![1.0, 1.0], vec![2.0, 1.0], vec![f32::NAN]] {
            assert!(
                matches!(
                    schedule_error(bad.clone()),
                    Some(SpatialStatError::InvalidRadiusSchedule(_))
                ),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn intervals_are_half_open() {
        let sched = RadiusSchedule::new(vec![1.0, 2.0, 4.0]).unwrap();
        assert_eq!(sched.interval_of(0.0), Some(0));
        assert_eq!(sched.interval_of(0.5), Some(0));
        assert_eq!(sched.interval_of(1.0), Some(0));
        assert_eq!(sched.interval_of(1.5), Some(1));
        assert_eq!(sched.interval_of(2.0), Some(1));
        assert_eq!(sched.interval_of(4.0), Some(2));
        assert_eq!(sched.interval_of(4.5), None);
        assert_eq!(sched.interval(0), (0.0, 1.0));
        assert_eq!(sched.interval(2), (2.0, 4.0));
        assert_eq!(sched.max_radius(), 4.0);
    }

    #[test]
    fn linspace_endpoints() {
        let sched = RadiusSchedule::linspace(1.0, 5.0, 5).unwrap();
        assert_eq!(sched.thresholds(), &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let single = RadiusSchedule::linspace(1.0, 5.0, 1).unwrap();
        assert_eq!(single.thresholds(), &[5.0]);
        assert!(RadiusSchedule::linspace(5.0, 5.0, 3).is_err());
        assert!(RadiusSchedule::linspace(5.0, 1.0, 3).is_err());
    }

    #[test]
    fn linspace_below_float_resolution() {
        // 50 steps between two adjacent f32 values
        let sched = RadiusSchedule::linspace(499.99997, 500.0, 50).unwrap();
        let thresholds = sched.thresholds();
        assert_eq!(thresholds.first(), Some(&499.99997));
        assert_eq!(thresholds.last(), Some(&500.0));
        assert!(thresholds.len() >= 2 && thresholds.len() < 50);
        assert!(thresholds.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn schedule_from_extent() {
        let pts = SpatialPoints::from_rows(&[
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![10.0, 10.0],
            vec![4.0, 6.0],
        ])
        .unwrap();
        let sched = RadiusSchedule::from_extent(&pts, 4).unwrap();
        assert_eq!(sched.num_intervals(), 4);
        assert_eq!(sched.thresholds()[0], 1.0);
        let max = (200.0_f32).sqrt() / 2.0;
        assert!((sched.max_radius() - max).abs() < 1e-6);
    }
}
