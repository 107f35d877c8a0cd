mod fit_co_occurrence;
mod fit_nhood_enrichment;
mod fit_spatial_graph;
mod lentil_common;
mod lentil_input;

use clap::{Parser, Subcommand};
use fit_co_occurrence::*;
use fit_nhood_enrichment::*;
use fit_spatial_graph::*;

/// LENTIL
#[derive(Parser, Debug)]
#[command(
    version,
    about = "LENTIL",
    long_about = "Label ENrichment in TIssue Layouts\n\n\
                  LENTIL summarises how cluster labels are arranged in space. It builds\n\
                  spatial neighbour graphs from cell coordinates, scores label\n\
                  co-occurrence across distance intervals, and tests neighbourhood\n\
                  enrichment of label pairs against label permutations.\n\n\
                  Coordinate, label and edge files are delimited text (`.gz` ok).",
    term_width = 80
)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Build a spatial neighbour graph",
        long_about = "Build an undirected spatial neighbour graph from cell coordinates.\n\n\
                      Policies:\n\
                      - --radius r: connect every pair within distance r\n\
                      - --knn k: connect each cell to its k nearest cells (union of \
                        directions, or --reciprocal)\n\
                      - --knn k --approx: same with an HNSW index\n\n\
                      Outputs:\n\
                      - {out}.edges.tsv.gz: left cell, right cell, distance\n\
                      - {out}.parameters.json: run parameters"
    )]
    Graph(SpatialGraphCmdArgs),

    #[command(
        about = "Label co-occurrence across distance intervals",
        long_about = "Co-occurrence score of label pairs across distance intervals.\n\n\
                      For anchor label a, neighbour label b and interval k:\n\
                      score = p(b | a, k) / p(b), where p(b | a, k) is the fraction of\n\
                      neighbours of a-cells at a distance in interval k that carry label b,\n\
                      and p(b) = n_b / (N - 1). Undefined ratios are written as NaN.\n\n\
                      Outputs:\n\
                      - {out}.co_occurrence.tsv.gz: anchor, neighbour, lb, ub, joint, score\n\
                      - {out}.parameters.json: run parameters and radius schedule"
    )]
    CoOccurrence(CoOccurrenceCmdArgs),

    #[command(
        about = "Neighbourhood enrichment by label permutation",
        long_about = "Neighbourhood enrichment z-scores of label pairs.\n\n\
                      Counts graph edges between every pair of labels and compares them\n\
                      with the counts after shuffling labels over cells. Each permutation\n\
                      draws from its own seeded stream, so results do not depend on the\n\
                      number of threads.\n\n\
                      Outputs:\n\
                      - {out}.nhood_count.tsv.gz: observed label-pair edge counts\n\
                      - {out}.nhood_zscore.tsv.gz: (observed - mean) / sd\n\
                      - {out}.nhood_pvalue.tsv.gz: empirical p-value of enrichment\n\
                      - {out}.nhood_pvalue_depleted.tsv.gz: empirical p-value of depletion\n\
                      - {out}.parameters.json: run parameters"
    )]
    NhoodEnrichment(NhoodEnrichmentCmdArgs),

    #[command(
        about = "Label-pair edge counts",
        long_about = "Number of graph edges between every pair of labels.\n\n\
                      With --normalized each row sums to one.\n\n\
                      Outputs:\n\
                      - {out}.interaction.tsv.gz: label x label matrix\n\
                      - {out}.parameters.json: run parameters"
    )]
    Interaction(InteractionCmdArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.commands {
        Commands::Graph(args) => {
            fit_spatial_graph(args)?;
        }
        Commands::CoOccurrence(args) => {
            fit_co_occurrence(args)?;
        }
        Commands::NhoodEnrichment(args) => {
            fit_nhood_enrichment(args)?;
        }
        Commands::Interaction(args) => {
            fit_interaction(args)?;
        }
    }

    Ok(())
}
