use anyhow::Result;
use tractwalk::{rank_and_label, ranked_by_variable, Observation, RunConfig};

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::RankArgs) -> Result<()> {
    let mut inverted = match &args.config {
        Some(path) => RunConfig::read(path)?.inverted_set(),
        None => Default::default(),
    };
    inverted.extend(args.inverted.iter().cloned());

    let observations = Observation::read_csv(&args.input)?;
    let ranked = rank_and_label(&observations, &inverted)?;
    log::info!("[rank] ranked {} of {} rows", ranked.len(), observations.len());

    let json = ranked_by_variable(&ranked)?;
    std::fs::write(&args.output, serde_json::to_vec_pretty(&json)?)?;

    Ok(())
}
