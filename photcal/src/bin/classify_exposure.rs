//! Classify exposures and report what the calibration knows about them
//!
//! For every FITS file given, prints the object type and name. Standards also
//! get their catalog position, their expected flux under the filter (when a
//! filter curve is supplied) and, on request, their measured counts.

use std::path::{Path, PathBuf};

use clap::Parser;
use photcal::header::Header;
use photcal::photometry::{Filter, FilterCurve, PhotometerCommand};
use photcal::{GeometryPolicy, ReductionConfig, ReductionContext, Target, TargetError};

#[derive(Parser, Debug)]
#[command(
    name = "classify_exposure",
    about = "Classifies exposures and computes standard-star fluxes",
    long_about = None
)]
struct Args {
    /// FITS images to classify
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Reduction config (JSON); defaults are used without it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding standards.csv and standard_spectra/
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Filter name, read from the header when not given
    #[arg(long)]
    filter: Option<String>,

    /// Header keyword holding the filter name, FILTER unless configured
    #[arg(long)]
    filter_key: Option<String>,

    /// Telescope whose filter naming table applies
    #[arg(long, default_value = "OSN")]
    telescope: String,

    /// Transmittance curve of the filter, enables flux computation
    #[arg(long)]
    filter_curve: Option<PathBuf>,

    /// External aperture photometry program
    #[arg(long)]
    photometer: Option<PathBuf>,

    /// Measure counts of standards with the photometer
    #[arg(long)]
    counts: bool,

    /// Mark exposures without usable astrometry as unknown instead of failing
    #[arg(long)]
    lenient_geometry: bool,
}

/// Canonical filter of an exposure, falling back to the raw spelling
fn exposure_filter(args: &Args, header: &Header, curve: Option<&FilterCurve>) -> Filter {
    let raw = match &args.filter {
        Some(name) => name.clone(),
        None => header.filter().unwrap_or_default(),
    };

    let filter = Filter::from_header_name(&raw, &args.telescope).unwrap_or_else(|err| {
        log::warn!("{err}, keeping {raw:?}");
        Filter::new(raw.trim(), None)
    });
    match curve {
        Some(curve) => filter.with_curve(curve.clone()),
        None => filter,
    }
}

fn report(target: &Target<'_>, path: &Path, counts: bool) -> Result<(), TargetError> {
    let classification = target.classification()?;
    println!(
        "{}: {} {}",
        path.display(),
        classification.objtype,
        classification.objname
    );

    if let Some((ra, dec)) = target.coordinates()? {
        println!("  RA {ra:.5} Dec {dec:.5}");
    }
    if let Some(flux) = target.flux()? {
        println!("  flux under {}: {flux:.6e} erg/s/cm2", target.filter());
    }
    if counts {
        if let Some(counts) = target.counts()? {
            println!("  counts: {counts}");
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ReductionConfig::load_from_file(path)?,
        None => ReductionConfig::default(),
    };
    if let Some(data_dir) = &args.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(program) = &args.photometer {
        config.photometer = Some(PhotometerCommand::new(program));
    }
    if let Some(key) = &args.filter_key {
        config.keywords.filter = key.clone();
    }
    if args.lenient_geometry {
        config.geometry = GeometryPolicy::Unknown;
    }

    let context = ReductionContext::from_config(&config)?;
    if args.counts && !context.has_photometer() {
        return Err("--counts needs a photometer (--photometer or the config file)".into());
    }

    let curve = args
        .filter_curve
        .as_deref()
        .map(FilterCurve::from_path)
        .transpose()?;

    let mut failures = 0;
    for path in &args.images {
        let header = match Header::from_fits_file(path, config.keywords.clone()) {
            Ok(header) => header,
            Err(err) => {
                log::error!("Cannot read header of {}: {err}", path.display());
                failures += 1;
                continue;
            }
        };

        let filter = exposure_filter(&args, &header, curve.as_ref());
        let target = Target::new(&header, &filter, &context);
        if let Err(err) = report(&target, path, args.counts) {
            log::error!("{}: {err}", path.display());
            failures += 1;
        }
    }

    if failures > 0 {
        return Err(format!("{failures} of {} exposures failed", args.images.len()).into());
    }
    Ok(())
}
