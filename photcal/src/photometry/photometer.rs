//! Aperture photometry collaborator
//!
//! The reduction never measures fluxes on pixels itself. It hands an image and
//! a coordinate file to a [`Photometer`] and reads back a single flux count.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PhotometryError {
    #[error("Failed to launch photometry command {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Photometry command exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Unparsable photometry output: {0:?}")]
    Unparsable(String),
}

/// How the coordinates in the coordinate file are expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSystem {
    /// Sky coordinates, RA/Dec in degrees
    World,
    /// Pixel coordinates
    Logical,
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinateSystem::World => write!(f, "world"),
            CoordinateSystem::Logical => write!(f, "logical"),
        }
    }
}

/// Everything a photometer needs for one measurement
#[derive(Debug, Clone, PartialEq)]
pub struct PhotometryRequest<'a> {
    pub image: &'a Path,
    /// File holding one `ra dec` line
    pub coords_file: &'a Path,
    pub wcs_in: CoordinateSystem,
    /// Full width at half maximum of the stellar profile, same units as seeing
    pub fwhm: f64,
    pub gain: f64,
    pub exposure: f64,
    pub airmass: f64,
    /// Inner radius of the sky annulus
    pub annulus: f64,
    /// Width of the sky annulus
    pub dannulus: f64,
    /// Radius of the photometric aperture
    pub aperture: f64,
}

impl<'a> PhotometryRequest<'a> {
    /// Size aperture and sky annulus from the seeing: aperture 2×, annulus 6×,
    /// annulus width 3×
    pub fn from_seeing(
        image: &'a Path,
        coords_file: &'a Path,
        seeing: f64,
        gain: f64,
        exposure: f64,
        airmass: f64,
    ) -> Self {
        Self {
            image,
            coords_file,
            wcs_in: CoordinateSystem::World,
            fwhm: seeing,
            gain,
            exposure,
            airmass,
            annulus: 6.0 * seeing,
            dannulus: 3.0 * seeing,
            aperture: 2.0 * seeing,
        }
    }

    /// Parameters as `key=value` arguments
    pub fn key_values(&self) -> Vec<String> {
        vec![
            format!("coords={}", self.coords_file.display()),
            format!("wcsin={}", self.wcs_in),
            format!("fwhm={}", self.fwhm),
            format!("gain={}", self.gain),
            format!("exposure={}", self.exposure),
            format!("airmass={}", self.airmass),
            format!("annulus={}", self.annulus),
            format!("dannulus={}", self.dannulus),
            format!("apert={}", self.aperture),
        ]
    }
}

/// Anything able to turn an image and a sky position into a flux count
pub trait Photometer {
    fn measure(&self, request: &PhotometryRequest<'_>) -> Result<f64, PhotometryError>;
}

/// External photometry program.
///
/// Invoked as `program [args...] <image> coords=... wcsin=world fwhm=...`; it
/// must print the measured flux, and nothing else, on stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotometerCommand {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

impl PhotometerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl Photometer for PhotometerCommand {
    fn measure(&self, request: &PhotometryRequest<'_>) -> Result<f64, PhotometryError> {
        log::info!(
            "Running {} on {} (aperture {:.2})",
            self.program.display(),
            request.image.display(),
            request.aperture
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(request.image)
            .args(request.key_values())
            .output()
            .map_err(|source| PhotometryError::Launch {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(PhotometryError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_flux(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Extract the single flux value a photometer printed
pub fn parse_flux(output: &str) -> Result<f64, PhotometryError> {
    let mut values = output.lines().map(str::trim).filter(|line| !line.is_empty());

    match (values.next(), values.next()) {
        (Some(value), None) => value
            .parse::<f64>()
            .ok()
            .filter(|flux| flux.is_finite())
            .ok_or_else(|| PhotometryError::Unparsable(output.to_string())),
        _ => Err(PhotometryError::Unparsable(output.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radii_from_seeing() {
        let request = PhotometryRequest::from_seeing(
            Path::new("std.fits"),
            Path::new("std.coords"),
            1.5,
            2.0,
            30.0,
            1.2,
        );
        assert_eq!(request.aperture, 3.0);
        assert_eq!(request.annulus, 9.0);
        assert_eq!(request.dannulus, 4.5);
        assert_eq!(request.fwhm, 1.5);
        assert_eq!(request.wcs_in, CoordinateSystem::World);
        assert!(request.key_values().contains(&"wcsin=world".to_string()));
        assert!(request.key_values().contains(&"apert=3".to_string()));
    }

    #[test]
    fn test_parse_flux() {
        assert_eq!(parse_flux("12345.6\n").unwrap(), 12345.6);
        assert_eq!(parse_flux("\n  42 \n\n").unwrap(), 42.0);
        assert!(matches!(
            parse_flux("INDEF\n"),
            Err(PhotometryError::Unparsable(_))
        ));
        assert!(matches!(
            parse_flux("1.0\n2.0\n"),
            Err(PhotometryError::Unparsable(_))
        ));
        assert!(matches!(parse_flux(""), Err(PhotometryError::Unparsable(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_photometer_reads_stdout() {
        let photometer = PhotometerCommand::new("sh").with_args(["-c", "echo 1234.5"]);
        let request = PhotometryRequest::from_seeing(
            Path::new("std.fits"),
            Path::new("std.coords"),
            1.0,
            1.0,
            1.0,
            1.0,
        );
        assert_eq!(photometer.measure(&request).unwrap(), 1234.5);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_photometer_failure() {
        let photometer = PhotometerCommand::new("sh").with_args(["-c", "echo boom >&2; exit 3"]);
        let request = PhotometryRequest::from_seeing(
            Path::new("std.fits"),
            Path::new("std.coords"),
            1.0,
            1.0,
            1.0,
            1.0,
        );
        match photometer.measure(&request) {
            Err(PhotometryError::Failed { stderr, .. }) => assert_eq!(stderr, "boom"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_program() {
        let photometer = PhotometerCommand::new("/nonexistent/photometry-binary");
        let request = PhotometryRequest::from_seeing(
            Path::new("std.fits"),
            Path::new("std.coords"),
            1.0,
            1.0,
            1.0,
            1.0,
        );
        assert!(matches!(
            photometer.measure(&request),
            Err(PhotometryError::Launch { .. })
        ));
    }
}
