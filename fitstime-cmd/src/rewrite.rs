use std::path::Path;

use anyhow::{Context, Result};
use fitstime::{ElementKind, Fits};
use hifitime::Epoch;
use tracing::info;

pub fn rewrite(input: &Path, output: &Path, kind: ElementKind) -> Result<()> {
    let mut fits = Fits::open(input).with_context(|| format!("reading {input:?}"))?;
    let now = Epoch::now().context("getting current time")?;
    fits.header.add_history(
        now,
        &format!(
            "{} {}: rewritten with BITPIX={}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            kind.bitpix()
        ),
    );
    fits.save(output, kind)
        .with_context(|| format!("failed to write output {output:?}"))?;
    info!("wrote {output:?}");
    Ok(())
}
