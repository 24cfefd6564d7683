use std::io::{stdout, Write};
use std::path::Path;

use anyhow::{Context, Result};
use fitstime::Fits;

pub fn cards(fpath: &Path) -> Result<()> {
    let header = Fits::open_header(fpath).with_context(|| format!("reading {fpath:?}"))?;
    let mut out = stdout().lock();
    for card in header.cards() {
        writeln!(out, "{}", card.trim_end()).context("writing to stdout")?;
    }
    Ok(())
}
