use crate::lentil_common::*;
use crate::lentil_input::*;
use clap::Parser;

#[derive(Parser, Debug, Clone)]
///
/// Neighbourhood enrichment by label permutation
///
pub struct NhoodEnrichmentCmdArgs {
    #[command(flatten)]
    pub input: LentilInputArgs,

    #[command(flatten)]
    pub graph: GraphPolicyArgs,

    #[arg(long = "label", short = 'l', required = true,
          help = "Cluster label file (cell name, label per line)")]
    pub label_file: Box<str>,

    #[arg(long, short = 'p', default_value_t = 1000,
          help = "Number of label permutations")]
    pub n_permutations: usize,

    #[arg(long, default_value_t = 42,
          help = "Random seed for the label permutations")]
    pub rseed: u64,
}

pub fn fit_nhood_enrichment(args: &NhoodEnrichmentCmdArgs) -> anyhow::Result<()> {
    let input = &args.input;
    init_runtime(input.verbose, input.threads)?;

    let data = read_coordinates(input)?;
    let labels = read_labels(&args.label_file, &data.cells)?;
    let graph = build_spatial_graph(&args.graph, &data, input.block_size)?;

    info!(
        "{} edges, {} permutations",
        graph.num_edges(),
        args.n_permutations
    );

    let out = nhood_enrichment(
        &graph,
        &labels,
        &NhoodEnrichmentArgs {
            n_permutations: args.n_permutations,
            rseed: args.rseed,
        },
    )?;

    let names = &out.label_names;
    let count_file = write_label_matrix(&out.counts, names, &input.out, "nhood_count")?;
    let zscore_file = write_label_matrix(&out.zscores, names, &input.out, "nhood_zscore")?;
    let pvalue_file =
        write_label_matrix(&out.pvalue_enriched, names, &input.out, "nhood_pvalue")?;
    let depleted_file = write_label_matrix(
        &out.pvalue_depleted,
        names,
        &input.out,
        "nhood_pvalue_depleted",
    )?;

    write_parameters(
        &serde_json::json!({
            "command": "nhood-enrichment",
            "coord_file": input.coord_file,
            "label_file": args.label_file,
            "graph": args.graph.to_json(),
            "n_cells": graph.num_nodes(),
            "n_edges": graph.num_edges(),
            "n_permutations": args.n_permutations,
            "rseed": args.rseed,
            "labels": names,
            "outputs": {
                "count": count_file,
                "zscore": zscore_file,
                "pvalue_enriched": pvalue_file,
                "pvalue_depleted": depleted_file,
            },
        }),
        &input.out,
    )?;

    info!("Done");
    Ok(())
}

#[derive(Parser, Debug, Clone)]
///
/// Label-pair edge counts
///
pub struct InteractionCmdArgs {
    #[command(flatten)]
    pub input: LentilInputArgs,

    #[command(flatten)]
    pub graph: GraphPolicyArgs,

    #[arg(long = "label", short = 'l', required = true,
          help = "Cluster label file (cell name, label per line)")]
    pub label_file: Box<str>,

    #[arg(long, default_value_t = false,
          help = "Normalise each row to sum to one")]
    pub normalized: bool,
}

pub fn fit_interaction(args: &InteractionCmdArgs) -> anyhow::Result<()> {
    let input = &args.input;
    init_runtime(input.verbose, input.threads)?;

    let data = read_coordinates(input)?;
    let labels = read_labels(&args.label_file, &data.cells)?;
    let graph = build_spatial_graph(&args.graph, &data, input.block_size)?;

    let mat = interaction_matrix(&graph, &labels, args.normalized)?;
    let out_file = write_label_matrix(&mat, labels.names(), &input.out, "interaction")?;

    write_parameters(
        &serde_json::json!({
            "command": "interaction",
            "coord_file": input.coord_file,
            "label_file": args.label_file,
            "graph": args.graph.to_json(),
            "normalized": args.normalized,
            "n_edges": graph.num_edges(),
            "outputs": { "interaction": out_file },
        }),
        &input.out,
    )?;

    info!("Done");
    Ok(())
}
