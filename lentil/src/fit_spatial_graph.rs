use crate::lentil_common::*;
use crate::lentil_input::*;
use clap::Parser;

#[derive(Parser, Debug, Clone)]
///
/// Build a spatial neighbour graph
///
pub struct SpatialGraphCmdArgs {
    #[command(flatten)]
    pub input: LentilInputArgs,

    #[command(flatten)]
    pub graph: GraphPolicyArgs,
}

pub fn fit_spatial_graph(args: &SpatialGraphCmdArgs) -> anyhow::Result<()> {
    let input = &args.input;
    init_runtime(input.verbose, input.threads)?;

    let data = read_coordinates(input)?;
    let graph = build_spatial_graph(&args.graph, &data, input.block_size)?;

    let isolated = (0..graph.num_nodes())
        .filter(|&i| graph.degree(i) == 0)
        .count();
    info!(
        "{} edges over {} cells ({} without any neighbour)",
        graph.num_edges(),
        graph.num_nodes(),
        isolated
    );

    let edge_file = write_edges(&graph, &data.cells, &input.out)?;

    write_parameters(
        &serde_json::json!({
            "command": "graph",
            "coord_file": input.coord_file,
            "graph": args.graph.to_json(),
            "n_cells": graph.num_nodes(),
            "n_edges": graph.num_edges(),
            "outputs": { "edges": edge_file },
        }),
        &input.out,
    )?;

    info!("Done");
    Ok(())
}

/// `{header}.edges.tsv.gz` with `left`, `right` and `distance` columns
pub fn write_edges(graph: &SpatialGraph, cells: &[Box<str>], header: &str) -> anyhow::Result<Box<str>> {
    let out_file = format!("{}.edges.tsv.gz", header);

    let mut lines = Vec::with_capacity(graph.num_edges() + 1);
    lines.push("left\tright\tdistance".to_string());
    lines.extend(
        graph
            .edges
            .iter()
            .zip(graph.distances.iter())
            .map(|(&(i, j), d)| format!("{}\t{}\t{}", cells[i], cells[j], d)),
    );

    write_lines(&lines, &out_file)?;
    info!("wrote {}", out_file);
    Ok(out_file.into_boxed_str())
}
