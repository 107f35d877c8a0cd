#![allow(dead_code)]

pub use spatial_util::co_occurrence::*;
pub use spatial_util::common_io::{open_buf_writer, read_lines_of_words, write_lines};
pub use spatial_util::interaction_matrix::interaction_matrix;
pub use spatial_util::labels::CategoricalLabels;
pub use spatial_util::nhood_enrichment::*;
pub use spatial_util::points::SpatialPoints;
pub use spatial_util::radius_schedule::RadiusSchedule;
pub use spatial_util::spatial_graph::*;

pub use fnv::FnvHashMap as HashMap;
pub use log::info;
pub use ndarray::Array2;

use std::fmt::Display;

/// Set up logging and the global rayon pool for a subcommand
pub fn init_runtime(verbose: bool, threads: Option<usize>) -> anyhow::Result<()> {
    if verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    // a second initialisation (e.g. under tests) is harmless
    let _ = env_logger::try_init();

    let max_threads = threads.unwrap_or_else(num_cpus::get).clamp(1, num_cpus::get());

    rayon::ThreadPoolBuilder::new()
        .num_threads(max_threads)
        .build_global()?;

    info!("will use {} threads", rayon::current_num_threads());
    Ok(())
}

/// Write a `label x label` matrix with row and column names:
/// `{header}.{file_name}.tsv.gz`
pub fn write_label_matrix<T>(
    mat: &Array2<T>,
    names: &[Box<str>],
    header: &str,
    file_name: &str,
) -> anyhow::Result<Box<str>>
where
    T: Display,
{
    let out_file = format!("{}.{}.tsv.gz", header, file_name);

    let mut lines = Vec::with_capacity(mat.nrows() + 1);
    lines.push(format!("label\t{}", names.join("\t")));
    for (name, row) in names.iter().zip(mat.rows()) {
        let values = row.iter().map(|x| x.to_string()).collect::<Vec<_>>();
        lines.push(format!("{}\t{}", name, values.join("\t")));
    }

    write_lines(&lines, &out_file)?;
    info!("wrote {}", out_file);
    Ok(out_file.into_boxed_str())
}

/// Record the run parameters: `{header}.parameters.json`
pub fn write_parameters(params: &serde_json::Value, header: &str) -> anyhow::Result<()> {
    let param_file = format!("{}.parameters.json", header);
    std::fs::write(&param_file, serde_json::to_string_pretty(params)?)?;
    info!("wrote parameters: {}", param_file);
    Ok(())
}
