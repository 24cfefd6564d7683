#![doc = include_str!("../README.md")]

mod block;
mod error;

pub mod aggregate;
pub mod astro;
pub mod card;
pub mod diag;
pub mod extract;
pub mod fits;
pub mod reconcile;
pub mod resolve;

use std::path::Path;

pub use aggregate::{aggregate, year_hint, Candidate, Categories, Category};
pub use astro::{Almanac, Astronomy};
pub use block::BLOCK_LEN;
pub use diag::{Note, Transcript};
pub use error::{Error, Result};
pub use extract::ParseContext;
pub use fits::{ElementKind, Fits, Header};
pub use reconcile::ReconcileReport;
pub use resolve::{BaseField, NoData, Outcome, Resolution, ResolveOptions, Resolver};

/// Find the observation time of a single header.
///
/// The year hint is taken from any JD style fields, every catalogued field is parsed,
/// the best value per category is chosen and the output time is computed according
/// to `options`. A reconciliation report is included when `options.diagnostics` is
/// set.
pub fn analyze(header: &Header, options: &ResolveOptions, astro: &impl Astronomy) -> Resolution {
    let hint = year_hint(header, astro);
    let mut ctx = ParseContext::new(hint, options.date_order);
    let categories = aggregate(header, &mut ctx);
    Resolver::new(astro, options).resolve(categories, ctx.into_transcript())
}

/// Read the header of the FITS file at `path` and [analyze] it.
///
/// # Errors
/// Any [Error] reading the header. A header without usable time fields is not an
/// error; see [Outcome::NoData].
pub fn find_time<P: AsRef<Path>>(
    path: P,
    options: &ResolveOptions,
    astro: &impl Astronomy,
) -> Result<Resolution> {
    let header = Fits::open_header(path)?;
    Ok(analyze(&header, options, astro))
}
