use crate::points::SpatialPoints;
use indicatif::ParallelProgressIterator;
use instant_distance::{Builder, HnswMap, Search};
use rayon::prelude::*;

/// An HNSW dictionary over the columns of `SpatialPoints` for fast,
/// approximate k-nearest neighbour look-up
///
pub struct PointDict {
    pub dict: HnswMap<VecPoint, usize>,
    pub data_vec: Vec<VecPoint>,
}

impl PointDict {
    /// Index every point; `rseed` fixes the layer assignment so that the
    /// same input always builds the same index.
    pub fn from_points(points: &SpatialPoints, rseed: u64) -> Self {
        let nn = points.num_points();

        let data_vec: Vec<VecPoint> = (0..nn)
            .into_par_iter()
            .progress_count(nn as u64)
            .map(|j| VecPoint {
                data: points.point(j).iter().copied().collect(),
            })
            .collect();

        let names = (0..nn).collect::<Vec<_>>();
        let dict = Builder::default()
            .seed(rseed)
            .build(data_vec.clone(), names);

        PointDict { dict, data_vec }
    }

    pub fn len(&self) -> usize {
        self.data_vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_vec.is_empty()
    }

    /// Search `knn` neighbours of the `query`-th point, excluding itself
    ///
    /// * `query` - index of the query point
    /// * `knn` - number of neighbours to return
    ///
    /// Returns indices and distances in increasing distance order.
    pub fn search_others(
        &self,
        query: usize,
        knn: usize,
    ) -> anyhow::Result<(Vec<usize>, Vec<f32>)> {
        let point = self
            .data_vec
            .get(query)
            .ok_or_else(|| anyhow::anyhow!("point {} not found", query))?;

        let mut search = Search::default();
        let nquery = (knn + 1).min(self.data_vec.len());

        let (indices, distances): (Vec<usize>, Vec<f32>) = self
            .dict
            .search(point, &mut search)
            .take(nquery)
            .filter(|item| *item.value != query)
            .map(|item| (*item.value, item.distance))
            .take(knn)
            .unzip();

        Ok((indices, distances))
    }
}

#[derive(Clone, Debug)]
/// a wrapper for Vec<f32>
pub struct VecPoint {
    pub data: Vec<f32>,
}

impl instant_distance::Point for VecPoint {
    fn distance(&self, other: &Self) -> f32 {
        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_point_is_found() {
        let pts = SpatialPoints::from_rows(&[
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![5.0, 5.0],
            vec![5.2, 5.0],
            vec![10.0, 0.0],
        ])
        .unwrap();

        let dict = PointDict::from_points(&pts, 42);
        assert_eq!(dict.len(), 5);

        let (indices, distances) = dict.search_others(0, 1).unwrap();
        assert_eq!(indices, vec![1]);
        assert!((distances[0] - 0.1).abs() < 1e-5);

        let (indices, _) = dict.search_others(3, 2).unwrap();
        assert_eq!(indices.len(), 2);
        assert_eq!(indices[0], 2);
        assert!(!indices.contains(&3));

        assert!(dict.search_others(7, 1).is_err());
    }
}
