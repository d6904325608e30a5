mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{aggregate, crosswalk, median, rank};

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    init_logging(cli.verbose);
    match &cli.command {
        Commands::Crosswalk(args) => crosswalk::run(&cli, args),
        Commands::Aggregate(args) => aggregate::run(&cli, args),
        Commands::Rank(args) => rank::run(&cli, args),
        Commands::Median(args) => median::run(&cli, args),
    }
}

fn main() -> anyhow::Result<()> { run() }
