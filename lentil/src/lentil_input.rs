use crate::lentil_common::*;
use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct LentilInputArgs {
    #[arg(long = "coord", short = 'c', required = true,
          help = "Spatial coordinate file",
          long_help = "Spatial coordinate file (tab, comma or space separated; .gz ok).\n\
                       Each line: cell name, x, y, ... Lines starting with # are ignored.")]
    pub coord_file: Box<str>,

    #[arg(long = "coord-columns", value_delimiter(','), default_values_t = vec![1, 2],
          help = "Column indices for coordinates in the coord file (0 = cell name)")]
    pub coord_columns: Vec<usize>,

    #[arg(long,
          help = "Header row index in the coord file (0 = first line is column names)")]
    pub coord_header_row: Option<usize>,

    #[arg(long, default_value_t = 1000,
          help = "Block size for parallel processing of cells")]
    pub block_size: usize,

    #[arg(long, short = 't',
          help = "Maximum number of threads (default: all logical CPUs)")]
    pub threads: Option<usize>,

    #[arg(long, short, required = true,
          help = "Output file prefix")]
    pub out: Box<str>,

    #[arg(long, default_value_t = false,
          help = "Enable verbose logging (sets RUST_LOG=info)")]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct GraphPolicyArgs {
    #[arg(long, short = 'r',
          help = "Connect all pairs within this radius (overrides --knn)")]
    pub radius: Option<f32>,

    #[arg(short = 'k', long, default_value_t = 6,
          help = "Number of nearest neighbours for the spatial graph")]
    pub knn: usize,

    #[arg(long, default_value_t = false,
          help = "Use approximate (HNSW) nearest neighbour search")]
    pub approx: bool,

    #[arg(long, default_value_t = false,
          help = "Keep only reciprocal kNN edges (default: union)")]
    pub reciprocal: bool,

    #[arg(long, short = 'e',
          help = "Precomputed edge file (left cell, right cell per line)",
          long_help = "Precomputed edge file. Each line: left cell name, right cell name.\n\
                       When given, --radius and --knn are ignored.")]
    pub edge_file: Option<Box<str>>,

    #[arg(long, default_value_t = 42,
          help = "Random seed of the approximate kNN index")]
    pub graph_seed: u64,
}

impl GraphPolicyArgs {
    pub fn policy(&self) -> NeighborPolicy {
        match (self.radius, self.approx) {
            (Some(r), _) => NeighborPolicy::Radius(r),
            (None, true) => NeighborPolicy::ApproxKnn(self.knn),
            (None, false) => NeighborPolicy::Knn(self.knn),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "radius": self.radius,
            "knn": self.knn,
            "approx": self.approx,
            "reciprocal": self.reciprocal,
            "edge_file": self.edge_file,
            "graph_seed": self.graph_seed,
        })
    }
}

pub struct SpatialData {
    pub cells: Vec<Box<str>>,
    pub points: SpatialPoints,
}

const DELIMITERS: [char; 3] = ['\t', ',', ' '];

/// Read cell names and coordinates
pub fn read_coordinates(args: &LentilInputArgs) -> anyhow::Result<SpatialData> {
    if args.coord_columns.is_empty() {
        return Err(anyhow::anyhow!("need at least one coordinate column"));
    }
    if args.coord_columns.contains(&0) {
        return Err(anyhow::anyhow!("column 0 holds cell names"));
    }

    info!("Reading coordinate file: {}", args.coord_file);
    let skip = args.coord_header_row.map(|h| h + 1).unwrap_or(0);
    let rows = read_lines_of_words(&args.coord_file, &DELIMITERS, skip)?;

    let mut cells = Vec::with_capacity(rows.len());
    let mut coords = Vec::with_capacity(rows.len());

    for (line, words) in rows.iter().enumerate() {
        let xx = args
            .coord_columns
            .iter()
            .map(|&c| {
                let w = words.get(c).ok_or_else(|| {
                    anyhow::anyhow!("line {}: no column {} in {}", line + 1, c, args.coord_file)
                })?;
                w.parse::<f32>().map_err(|e| {
                    anyhow::anyhow!("line {}: cannot parse '{}': {}", line + 1, w, e)
                })
            })
            .collect::<anyhow::Result<Vec<f32>>>()?;
        cells.push(words[0].clone());
        coords.push(xx);
    }

    let points = SpatialPoints::from_rows(&coords)?;

    info!(
        "Read {} x {} coordinates",
        points.num_points(),
        points.dim()
    );

    Ok(SpatialData { cells, points })
}

/// Read cluster labels.
///
/// Lines of `cell label` are matched to `cells` by name; lines with a
/// single word are taken in the same order as `cells`.
pub fn read_labels(label_file: &str, cells: &[Box<str>]) -> anyhow::Result<CategoricalLabels> {
    info!("Reading label file: {}", label_file);
    let rows = read_lines_of_words(label_file, &DELIMITERS, 0)?;

    let labels: Vec<Box<str>> = if rows.iter().all(|w| w.len() == 1) {
        if rows.len() != cells.len() {
            return Err(anyhow::anyhow!(
                "# labels {} != # cells {}",
                rows.len(),
                cells.len()
            ));
        }
        rows.into_iter().map(|mut w| w.swap_remove(0)).collect()
    } else {
        let cell2label: HashMap<&str, &str> = rows
            .iter()
            .filter(|w| w.len() >= 2)
            .map(|w| (w[0].as_ref(), w[1].as_ref()))
            .collect();

        cells
            .iter()
            .map(|c| {
                cell2label
                    .get(c.as_ref())
                    .map(|&x| Box::from(x))
                    .ok_or_else(|| anyhow::anyhow!("cell '{}' not found in {}", c, label_file))
            })
            .collect::<anyhow::Result<_>>()?
    };

    let labels = CategoricalLabels::from_names(&labels)?;
    info!(
        "{} cells in {} label categories",
        labels.len(),
        labels.num_categories()
    );
    Ok(labels)
}

/// Read a precomputed edge list of cell names
pub fn read_edges(edge_file: &str, cells: &[Box<str>]) -> anyhow::Result<SpatialGraph> {
    info!("Reading edge file: {}", edge_file);

    let cell_index: HashMap<&str, usize> = cells
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_ref(), i))
        .collect();

    let lookup = |name: &str| -> anyhow::Result<usize> {
        cell_index
            .get(name)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("cell '{}' not found in the coordinates", name))
    };

    let edges = read_lines_of_words(edge_file, &DELIMITERS, 0)?
        .iter()
        .enumerate()
        .map(|(line, w)| {
            if w.len() < 2 {
                return Err(anyhow::anyhow!("line {}: need two cells", line + 1));
            }
            Ok((lookup(&w[0])?, lookup(&w[1])?))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    SpatialGraph::from_edges(cells.len(), &edges)
}

/// Either read the edge file or build a graph from the coordinates
pub fn build_spatial_graph(
    graph_args: &GraphPolicyArgs,
    data: &SpatialData,
    block_size: usize,
) -> anyhow::Result<SpatialGraph> {
    if let Some(edge_file) = graph_args.edge_file.as_ref() {
        return read_edges(edge_file, &data.cells);
    }

    SpatialGraph::build(
        &data.points,
        &SpatialGraphArgs {
            policy: graph_args.policy(),
            block_size,
            reciprocal: graph_args.reciprocal,
            rseed: graph_args.graph_seed,
        },
    )
}
