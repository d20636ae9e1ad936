use std::path::{Path, PathBuf};

use n5meta::{
    orthoview::{DimensionOrder, PerAxis, format_downsampling_blocks},
    stored_downsampling_factors,
};

use crate::Result;

/// Arguments of `catmaid-downsamples`.
#[derive(clap::Args, Debug)]
pub(crate) struct Args {
    /// Path to the multiscale group
    group: PathBuf,

    /// The spatial axis of each array axis, a permutation of 'xyz'
    #[arg(short, long, default_value_t = DimensionOrder::default())]
    dimension_order: DimensionOrder,
}

/// The downsampling factors of `group` for each orthoview plane.
fn downsampling_blocks(group: &Path, order: &DimensionOrder) -> Result<String> {
    let factors = stored_downsampling_factors(group)?
        .iter()
        .map(|factor| PerAxis::from_ordered(factor, order))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(format_downsampling_blocks(&factors))
}

pub(crate) fn run(args: &Args) -> Result<()> {
    println!(
        "{}",
        downsampling_blocks(&args.group, &args.dimension_order)?
    );
    Ok(())
}
