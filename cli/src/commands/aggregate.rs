use std::collections::HashMap;

use anyhow::{Context, Result};
use tractwalk::{Aggregation, BinSpec, GeoLevel, Observation, RunConfig};

use crate::cli::{AggregateArgs, Operation};

fn aggregation(args: &AggregateArgs, config: &RunConfig) -> Result<Aggregation> {
    let pair = || -> Result<(String, String)> {
        let numerator = args.numerator.clone().context("--numerator is required")?;
        let denominator = args.denominator.clone().context("--denominator is required")?;
        Ok((numerator, denominator))
    };

    Ok(match args.op {
        Operation::Sum => Aggregation::Sum,
        Operation::Weighted => {
            let path = args.weights.as_ref().context("--weights is required")?;
            let weights = Observation::read_csv(path)?.into_iter()
                .map(|row| (row.unit_id, row.estimate))
                .collect::<HashMap<_, _>>();
            Aggregation::WeightedMean { weights }
        }
        Operation::Ratio => {
            let (numerator, denominator) = pair()?;
            Aggregation::Ratio { numerator, denominator }
        }
        Operation::Proportion => {
            let (numerator, denominator) = pair()?;
            Aggregation::Proportion { numerator, denominator }
        }
        Operation::Median => Aggregation::Median {
            bins: args.bins.iter().map(|label| BinSpec::from_label(label)).collect::<Result<_>>()?,
            sampling_percentage: config.sampling_percentage,
        },
        Operation::SumVariables => Aggregation::SumVariables {
            variable: args.name.clone().context("--name is required")?,
            excluded: args.exclude.clone(),
        },
    })
}

pub fn run(_cli: &crate::cli::Cli, args: &AggregateArgs) -> Result<()> {
    let config = RunConfig::read(&args.config)?;
    let level = args.level.parse::<GeoLevel>()?;
    let aggregation = aggregation(args, &config)?;

    let rows = config.resolver()?.resolve(level, &args.variables, &aggregation)?;
    log::info!("[aggregate] {} {level} rows", rows.len());

    Observation::write_csv(&args.output, &rows)?;

    Ok(())
}
