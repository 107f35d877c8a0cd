use crate::points::SpatialPoints;
use fnv::FnvHashMap as HashMap;

/// Uniform grid binning of points for fixed-radius range queries.
///
/// A query of radius `r` only visits the bins within `ceil(r / cell_size)`
/// steps of the query's own bin, so with `cell_size >= r` at most `3^d`
/// bins are scanned.
pub struct SpatialGrid {
    cell_size: f32,
    bins: HashMap<Box<[i64]>, Vec<usize>>,
    unit_offsets: Vec<Vec<i64>>,
}

impl SpatialGrid {
    /// Bin every point of `points`
    ///
    /// * `cell_size` - side length of a bin (positive, finite)
    pub fn new(points: &SpatialPoints, cell_size: f32) -> anyhow::Result<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(anyhow::anyhow!("invalid grid cell size {}", cell_size));
        }

        // slightly wider bins so that pairs at exactly `cell_size` stay
        // within one ring despite rounding in `x / cell_size`
        let cell_size = cell_size * (1.0 + 1e-4);

        let mut bins: HashMap<Box<[i64]>, Vec<usize>> = HashMap::default();
        for i in 0..points.num_points() {
            bins.entry(bin_key(points, i, cell_size))
                .or_default()
                .push(i);
        }

        Ok(Self {
            cell_size,
            bins,
            unit_offsets: bin_offsets(points.dim(), 1),
        })
    }

    pub fn num_bins(&self) -> usize {
        self.bins.len()
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// All `(j, distance)` with `j != i` and `distance <= radius`,
    /// sorted by `j`.
    pub fn within(&self, points: &SpatialPoints, i: usize, radius: f32) -> Vec<(usize, f32)> {
        let rings = (radius / self.cell_size).ceil().max(1.0) as i64;
        let wider;
        let offsets = if rings == 1 {
            &self.unit_offsets
        } else {
            wider = bin_offsets(points.dim(), rings);
            &wider
        };

        let home = bin_key(points, i, self.cell_size);
        let mut key = home.to_vec();
        let mut ret = vec![];

        for off in offsets.iter() {
            for (k, (h, o)) in home.iter().zip(off.iter()).enumerate() {
                key[k] = h + o;
            }
            if let Some(members) = self.bins.get(key.as_slice()) {
                for &j in members.iter() {
                    if j == i {
                        continue;
                    }
                    let d_ij = points.distance(i, j);
                    if d_ij <= radius {
                        ret.push((j, d_ij));
                    }
                }
            }
        }

        ret.sort_by_key(|&(j, _)| j);
        ret
    }
}

fn bin_key(points: &SpatialPoints, i: usize, cell_size: f32) -> Box<[i64]> {
    points
        .point(i)
        .iter()
        .map(|&x| (x / cell_size).floor() as i64)
        .collect()
}

/// every offset vector in `[-rings, rings]^dim`
fn bin_offsets(dim: usize, rings: i64) -> Vec<Vec<i64>> {
    let mut ret: Vec<Vec<i64>> = vec![vec![]];
    for _ in 0..dim {
        ret = ret
            .into_iter()
            .flat_map(|prefix| {
                (-rings..=rings).map(move |o| {
                    let mut next = prefix.clone();
                    next.push(o);
                    next
                })
            })
            .collect();
    }
    ret
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_points() -> SpatialPoints {
        SpatialPoints::from_rows(&[
            vec![0.0, 0.0],
            vec![0.5, 0.0],
            vec![1.0, 0.0],
            vec![2.5, 0.0],
            vec![-0.9, 0.1],
        ])
        .unwrap()
    }

    #[test]
    fn offsets_cover_the_cube() {
        assert_eq!(bin_offsets(2, 1).len(), 9);
        assert_eq!(bin_offsets(3, 1).len(), 27);
        assert_eq!(bin_offsets(2, 2).len(), 25);
    }

    #[test]
    fn range_query_matches_brute_force() {
        let pts = line_points();
        let grid = SpatialGrid::new(&pts, 1.0).unwrap();

        for radius in [0.5_f32, 1.0, 2.0, 3.0] {
            for i in 0..pts.num_points() {
                let found: Vec<usize> = grid.within(&pts, i, radius).into_iter().map(|x| x.0).collect();
                let expected: Vec<usize> = (0..pts.num_points())
                    .filter(|&j| j != i && pts.distance(i, j) <= radius)
                    .collect();
                assert_eq!(found, expected, "radius {} point {}", radius, i);
            }
        }
    }

    #[test]
    fn invalid_cell_size() {
        let pts = line_points();
        assert!(SpatialGrid::new(&pts, 0.0).is_err());
        assert!(SpatialGrid::new(&pts, f32::NAN).is_err());
    }
}
