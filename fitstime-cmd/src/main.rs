mod cards;
mod rewrite;
mod time;

use std::io::stderr;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fitstime::extract::DateOrder;
use fitstime::{BaseField, ElementKind, ResolveOptions};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Direction an offset is applied in.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Sign {
    Plus,
    Minus,
}

impl Sign {
    fn factor(sign: Option<Sign>) -> i8 {
        match sign {
            Some(Sign::Plus) => 1,
            Some(Sign::Minus) => -1,
            None => 0,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Find the observation time of FITS files.
    ///
    /// By default the heliocentric Julian Day of mid-exposure is derived from the best
    /// date and time fields. Use --base to start from a Julian Day field written in the
    /// header instead, and --helio, --exposure and --offset to shift it.
    ///
    /// Files that cannot be read are reported and skipped.
    Time {
        /// Show the chosen fields, every note and the JD cross check for each file.
        #[arg(short, long, action)]
        show: bool,

        /// Field the output time is based on: HJD_Calc, HJD, JD, MJD or MJD-OBS.
        #[arg(short, long, default_value = "HJD_Calc", value_parser = parse_base)]
        base: BaseField,

        /// Add or subtract the heliocentric correction.
        #[arg(long, value_enum)]
        helio: Option<Sign>,

        /// Add or subtract half the exposure time.
        #[arg(long, value_enum)]
        exposure: Option<Sign>,

        /// Days added to the output time.
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        offset: f64,

        /// Order of ambiguous dates with two digit years, ymd or dmy.
        ///
        /// Without this, ambiguous dates are read using a year from any JD fields, and
        /// are guessed otherwise.
        #[arg(long, value_parser = parse_order)]
        order: Option<DateOrder>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: time::Format,

        /// Input FITS files.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the header cards of a FITS file in the order they would be written.
    Cards {
        /// Input FITS file
        input: PathBuf,
    },
    /// Rewrite a FITS file with a different data type.
    ///
    /// Integer types are rescaled to use their full range. A HISTORY card recording the
    /// rewrite is added.
    Rewrite {
        /// BITPIX of the output: 16, 32, -32, or 0 to write the header only.
        #[arg(short, long, default_value_t = -32, allow_negative_numbers = true)]
        bitpix: i64,

        /// Delete output file if it already exists
        #[arg(long, action)]
        clobber: bool,

        /// Input FITS file.
        input: PathBuf,

        /// Output file path.
        output: PathBuf,
    },
}

fn parse_base(s: &str) -> Result<BaseField, String> {
    s.parse()
}

fn parse_order(s: &str) -> Result<DateOrder, String> {
    s.parse()
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_env("FITSTIME_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Time {
            show,
            base,
            helio,
            exposure,
            offset,
            order,
            format,
            files,
        } => {
            let options = ResolveOptions {
                base: *base,
                helio: Sign::factor(*helio),
                exposure: Sign::factor(*exposure),
                extra_days: *offset,
                date_order: *order,
                diagnostics: *show,
            };
            time::time(files, &options, *show, format)
        }
        Commands::Cards { input } => cards::cards(input),
        Commands::Rewrite {
            bitpix,
            clobber,
            input,
            output,
        } => {
            if !clobber && output.exists() {
                bail!("{output:?} exists; use --clobber");
            }
            let kind = ElementKind::from_bitpix(*bitpix)?;
            rewrite::rewrite(input, output, kind)
        }
    }
}
