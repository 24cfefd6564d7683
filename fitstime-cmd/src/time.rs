use std::io::{stdout, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use fitstime::resolve::ResolvedSet;
use fitstime::{find_time, Almanac, Outcome, Resolution, ResolveOptions};
use serde::Serialize;
use tracing::{debug, error};

const NO_DATA: &str = "***No Data***";

#[derive(Debug, Clone)]
pub enum Format {
    Json,
    Text,
}

impl clap::ValueEnum for Format {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Json, Self::Text]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Json => Some(clap::builder::PossibleValue::new("json")),
            Self::Text => Some(clap::builder::PossibleValue::new("text")),
        }
    }
}

#[derive(Debug, Serialize)]
struct Entry {
    filename: String,
    jd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolution: Option<Resolution>,
}

/// Chosen values rendered for display, `None` where absent.
#[derive(Debug, Serialize)]
struct Chosen {
    filename: String,
    date: Option<String>,
    time: Option<String>,
    jd: Option<String>,
    ra: String,
    dec: String,
    equinox: String,
    exposure: Option<String>,
    result: String,
}

impl Chosen {
    fn new(fpath: &Path, resolved: &ResolvedSet, outcome: &Outcome) -> Self {
        Chosen {
            filename: fpath.to_string_lossy().to_string(),
            date: resolved
                .date
                .as_ref()
                .map(|c| format!("{} ({})", c.value, c.field)),
            time: resolved
                .time
                .as_ref()
                .map(|c| format!("{} ({})", c.value, c.field)),
            jd: resolved
                .jd
                .as_ref()
                .map(|c| format!("{:.6} ({})", c.value, c.field)),
            ra: format!("{:.6}h ({})", resolved.ra.value, resolved.ra.field),
            dec: format!("{:.6}d ({})", resolved.dec.value, resolved.dec.field),
            equinox: format!("{} ({})", resolved.equinox.value, resolved.equinox.field),
            exposure: resolved
                .exposure
                .as_ref()
                .map(|c| format!("{}s ({})", c.value, c.field)),
            result: render_outcome(outcome),
        }
    }
}

fn render_outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Time(jd) => format!("{jd:.6}"),
        Outcome::NoData(_) => NO_DATA.to_string(),
    }
}

fn render_text(chosen: &Chosen) -> Result<String> {
    let mut hb = handlebars::Handlebars::new();
    hb.register_escape_fn(handlebars::no_escape);
    assert!(hb.register_template_string("chosen", TEXT_TEMPLATE).is_ok());

    hb.render("chosen", chosen).context("rendering text")
}

fn show(fpath: &Path, res: &Resolution, out: &mut impl Write) -> Result<()> {
    let chosen = Chosen::new(fpath, &res.resolved, &res.outcome);
    out.write_all(render_text(&chosen)?.as_bytes())?;
    write!(out, "{}", res.transcript)?;
    if let Some(report) = &res.report {
        writeln!(out, "-----------------------------------------------------------------")?;
        write!(out, "{report}")?;
    }
    writeln!(out)?;
    Ok(())
}

pub fn time(
    files: &[PathBuf],
    options: &ResolveOptions,
    verbose: bool,
    format: &Format,
) -> Result<()> {
    let mut out = stdout().lock();
    let mut entries = Vec::new();
    let mut failed = 0;

    for fpath in files {
        debug!("reading {fpath:?}");
        let res = match find_time(fpath, options, &Almanac) {
            Ok(res) => res,
            Err(err) => {
                error!("{fpath:?}: {err}");
                failed += 1;
                continue;
            }
        };

        match format {
            Format::Text if verbose => show(fpath, &res, &mut out)?,
            Format::Text => writeln!(
                out,
                "{} {}",
                fpath.to_string_lossy(),
                render_outcome(&res.outcome)
            )
            .context("writing to stdout")?,
            Format::Json => entries.push(Entry {
                filename: fpath.to_string_lossy().to_string(),
                jd: res.outcome.time(),
                resolution: verbose.then_some(res),
            }),
        }
    }

    if let Format::Json = format {
        serde_json::to_writer_pretty(&mut out, &entries).context("serializing to json")?;
        writeln!(out)?;
    }

    if failed > 0 {
        bail!("{failed} of {} files could not be read", files.len());
    }
    Ok(())
}

const TEXT_TEMPLATE: &str = r"{{ filename }}
=================================================================
Date:     {{ #if date }}{{ date }}{{ else }}none{{ /if }}
Time:     {{ #if time }}{{ time }}{{ else }}none{{ /if }}
JD:       {{ #if jd }}{{ jd }}{{ else }}none{{ /if }}
RA:       {{ ra }}
DEC:      {{ dec }}
Equinox:  {{ equinox }}
Exposure: {{ #if exposure }}{{ exposure }}{{ else }}none{{ /if }}
Result:   {{ result }}
-----------------------------------------------------------------
";
