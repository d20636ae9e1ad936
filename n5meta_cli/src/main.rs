//! Command line tools for multiscale N5 metadata.

mod add_downsamples;
mod catmaid_downsamples;
mod catmaid_orthoviews;

use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};

/// Command-line arguments of the `n5meta` binary.
#[derive(Parser, Debug)]
#[command(name = "n5meta", version)]
#[command(about = "Tools for the metadata of multiscale N5 groups")]
struct Cli {
    /// Log debug output. `RUST_LOG` takes precedence
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add the metadata required by BigDataViewer (and optionally n5-viewer) to a multiscale group
    AddDownsamples(add_downsamples::Args),
    /// Print the downsampling factors of a multiscale group for the "Custom downsampling" field of CATMAID stacks
    CatmaidDownsamples(catmaid_downsamples::Args),
    /// Print the information for the CATMAID orthoview stacks and mirrors of a multiscale group
    CatmaidOrthoviews(catmaid_orthoviews::Args),
}

type Result<T> = std::result::Result<T, anyhow::Error>;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    match &cli.command {
        Command::AddDownsamples(args) => add_downsamples::run(args),
        Command::CatmaidDownsamples(args) => catmaid_downsamples::run(args),
        Command::CatmaidOrthoviews(args) => catmaid_orthoviews::run(args),
    }
}
