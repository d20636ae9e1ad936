use std::path::PathBuf;

use anyhow::Context;
use n5meta::{
    MultiscaleAttributes, N5Attributes, SaveOptions, UnitParseError, WriteMode, parse_resolution,
    validate_unit,
};

use crate::Result;

/// Arguments of `add-downsamples`.
#[derive(clap::Args, Debug)]
#[command(
    after_help = "downsamplingFactors has one entry per scale level, starting with [1, 1, ...] for s0."
)]
pub(crate) struct Args {
    /// Path to the directory which contains the scale level arrays
    group: PathBuf,

    /// Resolution, optionally with units, of scale level 0, e.g. '1nm,2um,3GHz'.
    /// If the data are isotropic, a single length can be given
    resolution: String,

    /// Default unit for lengths given without a unit
    #[arg(short, long, value_parser = parse_unit)]
    unit: Option<String>,

    /// Add additional metadata for compatibility with n5-viewer
    #[arg(short, long)]
    n5_viewer: bool,

    /// Do not change any files, just print what would be written
    #[arg(short, long)]
    dry_run: bool,

    /// Overwrite keys which already exist in the attributes file
    #[arg(short, long)]
    force: bool,

    /// Write the attributes file without sorting keys or indentation
    #[arg(short, long)]
    compact: bool,
}

fn parse_unit(s: &str) -> std::result::Result<String, UnitParseError> {
    validate_unit(s).map(str::to_string)
}

pub(crate) fn run(args: &Args) -> Result<()> {
    let lengths = parse_resolution(&args.resolution)?;
    let multiscale = MultiscaleAttributes::infer(&args.group, &lengths, args.unit.as_deref())?;
    log::info!(
        "Found {} scale levels in {}",
        multiscale.downsampling_factors().len(),
        args.group.display()
    );

    let mut attributes = N5Attributes::from_dir(&args.group, WriteMode::from_force(args.force))?;
    multiscale
        .apply(&mut attributes, args.n5_viewer)
        .with_context(|| format!("cannot update attributes of {}", args.group.display()))?;

    let mut options = SaveOptions::default();
    options.pretty(!args.compact).dry_run(args.dry_run);
    attributes.to_dir(&args.group, &options)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use crate::{Cli, Command};

    fn parse(args: &[&str]) -> Result<super::Args, clap::Error> {
        let cli = Cli::try_parse_from(
            ["n5meta", "add-downsamples"]
                .into_iter()
                .chain(args.iter().copied()),
        )?;
        match cli.command {
            Command::AddDownsamples(args) => Ok(args),
            _ => unreachable!(),
        }
    }

    #[test]
    fn add_downsamples_args() {
        let args = parse(&["data.n5/raw", "4,4,40", "-u", "nm", "-n", "-d", "-f", "-c"]).unwrap();
        assert_eq!(args.group.to_str(), Some("data.n5/raw"));
        assert_eq!(args.resolution, "4,4,40");
        assert_eq!(args.unit.as_deref(), Some("nm"));
        assert!(args.n5_viewer && args.dry_run && args.force && args.compact);

        let args = parse(&["raw", "4nm", "--unit", "um", "--dry-run"]).unwrap();
        assert!(args.dry_run);
        assert!(!args.force);
    }

    #[test]
    fn add_downsamples_rejects_invalid_unit() {
        assert!(parse(&["raw", "4", "-u", "parsec"]).is_err());
        assert!(parse(&["raw", "4", "-u", "nmx"]).is_err());
    }

    #[test]
    fn add_downsamples_help_mentions_s0_factors() {
        let mut cli = Cli::command();
        let help = cli
            .find_subcommand_mut("add-downsamples")
            .unwrap()
            .render_long_help()
            .to_string();
        assert!(help.contains("starting with [1, 1, ...] for s0"));
    }
}
