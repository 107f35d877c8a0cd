use crate::lentil_common::*;
use crate::lentil_input::*;
use clap::Parser;

#[derive(Parser, Debug, Clone)]
///
/// Label co-occurrence across distance intervals
///
pub struct CoOccurrenceCmdArgs {
    #[command(flatten)]
    pub input: LentilInputArgs,

    #[arg(long = "label", short = 'l', required = true,
          help = "Cluster label file (cell name, label per line)",
          long_help = "Cluster label file. Each line: cell name, label.\n\
                       A file with one label per line is read in the coordinate order.")]
    pub label_file: Box<str>,

    #[arg(long, value_delimiter(','),
          help = "Interval upper bounds, strictly increasing (e.g. 10,20,50)",
          long_help = "Interval upper bounds, strictly increasing.\n\
                       Interval k covers (t[k-1], t[k]]; the first one starts at 0.\n\
                       If not given, --n-intervals bounds are spaced evenly \
                       over the extent of the coordinates.")]
    pub radius_schedule: Option<Vec<f32>>,

    #[arg(long, default_value_t = 50,
          help = "Number of distance intervals when --radius-schedule is not given")]
    pub n_intervals: usize,
}

pub fn fit_co_occurrence(args: &CoOccurrenceCmdArgs) -> anyhow::Result<()> {
    let input = &args.input;
    init_runtime(input.verbose, input.threads)?;

    let data = read_coordinates(input)?;
    let labels = read_labels(&args.label_file, &data.cells)?;

    let schedule = match args.radius_schedule.as_ref() {
        Some(thresholds) => RadiusSchedule::new(thresholds.clone())?,
        None => RadiusSchedule::from_extent(&data.points, args.n_intervals)?,
    };
    info!(
        "{} intervals up to radius {}",
        schedule.num_intervals(),
        schedule.max_radius()
    );

    let co = co_occurrence(
        &data.points,
        &labels,
        &schedule,
        &CoOccurrenceArgs {
            block_size: input.block_size,
        },
    )?;

    let score_file = write_co_occurrence(&co, &input.out)?;

    write_parameters(
        &serde_json::json!({
            "command": "co-occurrence",
            "coord_file": input.coord_file,
            "label_file": args.label_file,
            "n_cells": data.points.num_points(),
            "labels": co.label_names,
            "label_counts": co.label_counts,
            "radius_schedule": schedule.thresholds(),
            "outputs": { "co_occurrence": score_file },
        }),
        &input.out,
    )?;

    info!("Done");
    Ok(())
}

/// Long table `{header}.co_occurrence.tsv.gz`: one row per anchor,
/// neighbour and interval
pub fn write_co_occurrence(co: &CoOccurrence, header: &str) -> anyhow::Result<Box<str>> {
    let out_file = format!("{}.co_occurrence.tsv.gz", header);

    let nlabels = co.num_labels();
    let nintervals = co.num_intervals();

    let mut lines = Vec::with_capacity(nlabels * nlabels * nintervals + 1);
    lines.push("anchor\tneighbour\tlb\tub\tjoint\tscore".to_string());

    for (a, anchor) in co.label_names.iter().enumerate() {
        for (b, neighbour) in co.label_names.iter().enumerate() {
            for k in 0..nintervals {
                let (lb, ub) = co.schedule.interval(k);
                lines.push(format!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    anchor,
                    neighbour,
                    lb,
                    ub,
                    co.joint_count(a, b, k),
                    co.score(a, b, k)
                ));
            }
        }
    }

    write_lines(&lines, &out_file)?;
    info!("wrote {}", out_file);
    Ok(out_file.into_boxed_str())
}
