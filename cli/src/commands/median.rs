use anyhow::Result;
use tractwalk::{approximate_median, Bin};

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::MedianArgs) -> Result<()> {
    let bins = Bin::read_csv(&args.bins)?;
    let median = approximate_median(&bins, args.sampling_percentage)?;

    match median.margin_of_error {
        Some(moe) => println!("{} ± {}", median.estimate, moe),
        None => println!("{}", median.estimate),
    }

    Ok(())
}
