use crate::error::SpatialStatError;
use crate::Mat;

/// Spatial coordinates of N observations.
///
/// Stored as a `d x n` matrix so that each column is a point, which is
/// what the graph builders iterate over.
#[derive(Debug, Clone)]
pub struct SpatialPoints {
    coord_dn: Mat,
}

impl SpatialPoints {
    /// Build from a list of row vectors, one per observation.
    ///
    /// * `rows` - coordinates; every row must have the same length
    pub fn from_rows<R>(rows: &[R]) -> anyhow::Result<Self>
    where
        R: AsRef<[f32]>,
    {
        if rows.is_empty() {
            return Err(SpatialStatError::EmptyObservations.into());
        }

        let dim = rows[0].as_ref().len();
        if dim == 0 {
            return Err(SpatialStatError::DimensionMismatch {
                index: 0,
                expected: 1,
                found: 0,
            }
            .into());
        }

        for (index, r) in rows.iter().enumerate() {
            let found = r.as_ref().len();
            if found != dim {
                return Err(SpatialStatError::DimensionMismatch {
                    index,
                    expected: dim,
                    found,
                }
                .into());
            }
        }

        let coord_dn = Mat::from_iterator(
            dim,
            rows.len(),
            rows.iter().flat_map(|r| r.as_ref().iter().copied()),
        );

        Self::from_columns(coord_dn)
    }

    /// Build from an `n x d` matrix (one row per observation), the
    /// layout of coordinate files.
    pub fn from_row_matrix(coord_nd: &Mat) -> anyhow::Result<Self> {
        Self::from_columns(coord_nd.transpose())
    }

    /// Build from a `d x n` matrix (one column per observation).
    pub fn from_columns(coord_dn: Mat) -> anyhow::Result<Self> {
        if coord_dn.ncols() == 0 {
            return Err(SpatialStatError::EmptyObservations.into());
        }
        if coord_dn.nrows() == 0 {
            return Err(SpatialStatError::DimensionMismatch {
                index: 0,
                expected: 1,
                found: 0,
            }
            .into());
        }
        if coord_dn.iter().any(|x| !x.is_finite()) {
            return Err(anyhow::anyhow!("found non-finite coordinates"));
        }
        Ok(Self { coord_dn })
    }

    pub fn num_points(&self) -> usize {
        self.coord_dn.ncols()
    }

    pub fn dim(&self) -> usize {
        self.coord_dn.nrows()
    }

    pub fn columns(&self) -> &Mat {
        &self.coord_dn
    }

    pub fn point(&self, i: usize) -> nalgebra::DVectorView<'_, f32> {
        self.coord_dn.column(i)
    }

    pub fn sq_distance(&self, i: usize, j: usize) -> f32 {
        self.coord_dn
            .column(i)
            .iter()
            .zip(self.coord_dn.column(j).iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum()
    }

    pub fn distance(&self, i: usize, j: usize) -> f32 {
        self.sq_distance(i, j).sqrt()
    }

    /// Per-dimension `(min, max)` of the coordinates
    pub fn bounds(&self) -> Vec<(f32, f32)> {
        self.coord_dn
            .row_iter()
            .map(|row| {
                row.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &x| {
                    (lo.min(x), hi.max(x))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_become_columns() {
        let pts = SpatialPoints::from_rows(&[vec![0.0, 1.0], vec![3.0, 5.0]]).unwrap();
        assert_eq!(pts.num_points(), 2);
        assert_eq!(pts.dim(), 2);
        assert_eq!(pts.point(1)[0], 3.0);
        assert_eq!(pts.point(1)[1], 5.0);
        assert_eq!(pts.distance(0, 1), 5.0);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = SpatialPoints::from_rows(&[vec![0.0, 1.0], vec![3.0, 5.0, 1.0]]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<SpatialStatError>(),
            Some(&SpatialStatError::DimensionMismatch {
                index: 1,
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn empty_rows_are_rejected() {
        let rows: Vec<Vec<f32>> = vec![];
        let err = SpatialPoints::from_rows(&rows).unwrap_err();
        assert_eq!(
            err.downcast_ref::<SpatialStatError>(),
            Some(&SpatialStatError::EmptyObservations)
        );
    }

    #[test]
    fn row_matrix_layout() {
        // 3 points x 2 dims, column-major
        let coord_nd = Mat::from_vec(3, 2, vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        let pts = SpatialPoints::from_row_matrix(&coord_nd).unwrap();
        assert_eq!(pts.num_points(), 3);
        assert_eq!(pts.point(2)[1], 12.0);
        assert_eq!(pts.bounds(), vec![(0.0, 2.0), (10.0, 12.0)]);
    }
}
