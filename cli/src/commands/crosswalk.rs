use anyhow::Result;
use tractwalk::{CrosswalkKind, RunConfig};

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::CrosswalkArgs) -> Result<()> {
    let config = RunConfig::read(&args.config)?;
    let kind = args.kind.parse::<CrosswalkKind>()?;

    let crosswalk = config.crosswalk_builder()?.get(kind, args.fresh || config.fresh)?;
    log::info!("[crosswalk] {kind}: {} entries", crosswalk.len());

    if let Some(output) = &args.output {
        std::fs::write(output, crosswalk.to_geojson_bytes()?)?;
        log::info!("[crosswalk] wrote {}", output.display());
    }

    Ok(())
}
