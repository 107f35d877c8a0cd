use crate::labels::CategoricalLabels;
use crate::nhood_enrichment::count_label_pairs;
use crate::spatial_graph::SpatialGraph;
use ndarray::{Array2, Axis};

/// Number of edges between each pair of labels.
///
/// * `normalized` - scale each row to sum to one; rows of labels
///   without any edge become NaN
pub fn interaction_matrix(
    graph: &SpatialGraph,
    labels: &CategoricalLabels,
    normalized: bool,
) -> anyhow::Result<Array2<f64>> {
    labels.check_len(graph.num_nodes())?;

    let counts = count_label_pairs(&graph.edges, labels.codes(), labels.num_categories());
    let mut ret = counts.mapv(|x| x as f64);

    if normalized {
        for mut row in ret.axis_iter_mut(Axis(0)) {
            let tot = row.sum();
            if tot > 0.0 {
                row /= tot;
            } else {
                row.fill(f64::NAN);
            }
        }
    }

    Ok(ret)
}
