use std::path::PathBuf;

/// Crosswalk and reaggregation CLI (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "tractwalk", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Build (or load from cache) a tract crosswalk
    Crosswalk(CrosswalkArgs),

    /// Aggregate observations to a geography level
    Aggregate(AggregateArgs),

    /// Rank and label observations within each variable
    Rank(RankArgs),

    /// Approximate a median from a binned distribution
    Median(MedianArgs),
}

#[derive(clap::Args, Debug)]
pub struct CrosswalkArgs {
    /// Run configuration (JSON)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Crosswalk kind: tract-neighborhood or tract-puma
    #[arg(short, long)]
    pub kind: String,

    /// Recompute even if a cached copy exists
    #[arg(long)]
    pub fresh: bool,

    /// Also write the crosswalk as GeoJSON here
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Sum,
    Weighted,
    Ratio,
    Proportion,
    Median,
    SumVariables,
}

#[derive(clap::Args, Debug)]
pub struct AggregateArgs {
    /// Run configuration (JSON)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Target level: county, tract, neighborhood or puma
    #[arg(short, long)]
    pub level: String,

    /// Statistic to compute
    #[arg(long, value_enum, default_value = "sum")]
    pub op: Operation,

    /// Variables to fetch (all when omitted)
    #[arg(long, value_delimiter = ',')]
    pub variables: Vec<String>,

    /// Numerator variable (ratio, proportion)
    #[arg(long)]
    pub numerator: Option<String>,

    /// Denominator variable (ratio, proportion)
    #[arg(long)]
    pub denominator: Option<String>,

    /// Bin variables such as 0_to_9999,10000_or_more (median)
    #[arg(long, value_delimiter = ',')]
    pub bins: Vec<String>,

    /// Observations CSV whose estimates weight each unit (weighted)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub weights: Option<PathBuf>,

    /// Output variable name (sum-variables)
    #[arg(long)]
    pub name: Option<String>,

    /// Variables kept out of the combined sum (sum-variables)
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Output observations CSV
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct RankArgs {
    /// Observations CSV
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub input: PathBuf,

    /// Run configuration supplying inverted variables
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Additional inverted variables
    #[arg(long, value_delimiter = ',')]
    pub inverted: Vec<String>,

    /// Output JSON file, grouped by variable
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct MedianArgs {
    /// Bins CSV with min, max and count columns
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub bins: PathBuf,

    /// Sampling rate in percent; enables the margin of error
    #[arg(short, long)]
    pub sampling_percentage: Option<f64>,
}
